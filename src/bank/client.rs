use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use super::types::{
    JudgeAnswerRequest, JudgeAnswerResponse, Question, ScoreRequest, ScoreReport, ScoredAttempt,
};
use crate::config::{BankConfig, RequestConfig};
use crate::error::{BankError, BankResult, ProxyError};
use crate::proxy::{ProxyHandle, ProxyRequest, ProxyResponse};
use crate::session::Attempt;

/// Client for the remote question-bank and scoring service.
#[derive(Clone)]
pub struct QuestionBankClient {
    proxy: ProxyHandle,
    base_url: String,
    request_config: RequestConfig,
}

impl QuestionBankClient {
    /// Create a new bank client routing through the given proxy.
    pub fn new(proxy: ProxyHandle, config: &BankConfig, request_config: RequestConfig) -> Self {
        Self {
            proxy,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_config,
        }
    }

    /// The configured bank base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch candidate questions within the difficulty band.
    pub async fn fetch_questions(
        &self,
        difficulty: f64,
        tolerance: f64,
        count: usize,
    ) -> BankResult<Vec<Question>> {
        let url = format!(
            "{}/api/questions?difficulty={}&tolerance={}&count={}",
            self.base_url, difficulty, tolerance, count
        );

        debug!(difficulty, tolerance, count, "Fetching questions");

        let response = self.execute(ProxyRequest::get(&url), "fetch_questions").await?;
        let questions: Vec<Question> = parse_json(&response)?;

        if questions.is_empty() {
            return Err(BankError::NoQuestions);
        }

        Ok(questions)
    }

    /// Ask the bank to judge a submitted answer.
    pub async fn judge_answer(
        &self,
        question_id: &str,
        chosen_index: usize,
        response_time_ms: u64,
    ) -> BankResult<bool> {
        let url = format!("{}/api/answers/judge", self.base_url);
        let body = encode_json(&JudgeAnswerRequest {
            question_id: question_id.to_string(),
            chosen_answer_index: chosen_index,
            response_time_ms,
        })?;

        let response = self
            .execute(ProxyRequest::post_bytes(&url, body), "judge_answer")
            .await?;
        let judged: JudgeAnswerResponse = parse_json(&response)?;

        Ok(judged.is_correct)
    }

    /// Submit the full attempt list for final scoring.
    pub async fn compute_score(
        &self,
        attempts: &[Attempt],
        elapsed_time_ms: u64,
    ) -> BankResult<ScoreReport> {
        let url = format!("{}/api/score", self.base_url);
        let body = encode_json(&ScoreRequest {
            attempts: attempts
                .iter()
                .map(|a| ScoredAttempt {
                    question_id: a.question_id.clone(),
                    is_correct: a.is_correct,
                    chosen_answer_index: a.chosen_index,
                    response_time_ms: a.response_time_ms,
                    difficulty: a.difficulty,
                })
                .collect(),
            elapsed_time_ms,
        })?;

        let response = self
            .execute(ProxyRequest::post_bytes(&url, body), "compute_score")
            .await?;
        parse_json(&response)
    }

    /// Execute one bank call with bounded retry and exponential backoff.
    ///
    /// Client errors (4xx) come back immediately; network failures,
    /// timeouts, and server errors retry up to the configured limit.
    async fn execute(&self, request: ProxyRequest, operation: &str) -> BankResult<ProxyResponse> {
        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    operation,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying question bank request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.proxy.fetch(request.clone()).await {
                Ok(response) if response.is_success() => {
                    info!(
                        operation,
                        latency_ms = start.elapsed().as_millis(),
                        "Question bank call succeeded"
                    );
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status;
                    let message = String::from_utf8_lossy(&response.body).into_owned();
                    let err = BankError::Api { status, message };

                    if status < 500 {
                        error!(operation, status, "Question bank rejected request");
                        return Err(err);
                    }

                    error!(
                        operation,
                        status,
                        retry = retries,
                        "Question bank server error"
                    );
                    last_error = Some(err);
                    retries += 1;
                }
                Err(ProxyError::Timeout { timeout_ms }) => {
                    error!(operation, timeout_ms, retry = retries, "Question bank call timed out");
                    last_error = Some(BankError::Timeout { timeout_ms });
                    retries += 1;
                }
                Err(e) => {
                    error!(
                        operation,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Question bank call failed"
                    );
                    last_error = Some(BankError::Proxy(e));
                    retries += 1;
                }
            }
        }

        Err(BankError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }
}

fn encode_json<T: serde::Serialize>(value: &T) -> BankResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| BankError::InvalidResponse {
        message: format!("Failed to encode request body: {}", e),
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(response: &ProxyResponse) -> BankResult<T> {
    serde_json::from_slice(&response.body).map_err(|e| BankError::InvalidResponse {
        message: format!("Failed to parse response: {}", e),
    })
}
