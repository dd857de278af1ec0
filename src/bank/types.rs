use serde::{Deserialize, Serialize};

/// One selectable answer on a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub answer_text: String,
}

/// A question served by the remote bank.
///
/// `difficulty` is the bank's own rating, which may sit anywhere inside
/// the tolerance band that was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub question_text: String,
    pub answers: Vec<AnswerOption>,
    pub difficulty: f64,
    pub explanation: String,
}

/// Request body for the judging endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JudgeAnswerRequest {
    pub question_id: String,
    pub chosen_answer_index: usize,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
}

/// Response body from the judging endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JudgeAnswerResponse {
    pub is_correct: bool,
}

/// One attempt as the scoring endpoint expects it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ScoredAttempt {
    pub question_id: String,
    pub is_correct: bool,
    pub chosen_answer_index: usize,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    pub difficulty: f64,
}

/// Request body for the scoring endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ScoreRequest {
    pub attempts: Vec<ScoredAttempt>,
    #[serde(rename = "elapsedTime")]
    pub elapsed_time_ms: u64,
}

/// Final score report computed by the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    #[serde(rename = "finalIQScore")]
    pub final_iq_score: i64,
    #[serde(rename = "normalizedIQScore")]
    pub normalized_iq_score: f64,
    pub correct_answers: usize,
    pub average_difficulty: f64,
    pub result_summary: String,
    pub elapsed_time: u64,
}
