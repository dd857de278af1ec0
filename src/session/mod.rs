//! Test session state machine.
//!
//! One [`SessionEngine`] owns at most one in-progress [`TestSession`]
//! and drives it through its phases:
//!
//! ```text
//! AwaitingQuestion -> QuestionPresented -> AnswerSubmitted
//!        ^                                      |
//!        +-------------- advance() -------------+--> Complete -> Finished
//! ```
//!
//! Every transition that needs the network checks the injected
//! connectivity signal first and fails with [`SessionError::Offline`]
//! rather than attempting a doomed round trip. Remote failures leave
//! the current phase untouched, so callers can always retry the same
//! operation. A session is never persisted; only the [`TestResult`]
//! derived at finalization is.

use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;
use tracing::{debug, info};

use crate::adaptive::{next_difficulty, tolerance, AdaptiveConfig};
use crate::bank::{Question, QuestionBankClient};
use crate::error::{SessionError, SessionResult};
use crate::history::{HistoryStore, TestResult};

/// One answered question. Immutable once recorded; owned by its session
/// until folded into a [`TestResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    /// Bank identifier of the question.
    pub question_id: String,
    /// Question text, kept so history views need no network.
    pub question_text: String,
    /// The answer options, in presentation order.
    #[serde(rename = "answers")]
    pub answer_texts: Vec<String>,
    /// Index the user chose.
    #[serde(rename = "chosenAnswerIndex")]
    pub chosen_index: usize,
    /// The bank's verdict.
    pub is_correct: bool,
    /// Time from question display to submission.
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
    /// Difficulty rating of the question as served.
    pub difficulty: f64,
}

/// Phase of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionPhase {
    /// Ready to request the next question.
    AwaitingQuestion,
    /// A question is displayed and awaiting an answer.
    QuestionPresented,
    /// The last answer was judged; feedback window is open.
    AnswerSubmitted {
        /// Verdict for the answer just submitted.
        was_correct: bool,
    },
    /// Answering is done; the score has not been computed or persisted
    /// yet, so finalization can be retried without re-answering.
    Complete,
    /// Scored and persisted. Terminal.
    Finished,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionPhase::AwaitingQuestion => write!(f, "awaiting_question"),
            SessionPhase::QuestionPresented => write!(f, "question_presented"),
            SessionPhase::AnswerSubmitted { .. } => write!(f, "answer_submitted"),
            SessionPhase::Complete => write!(f, "complete"),
            SessionPhase::Finished => write!(f, "finished"),
        }
    }
}

/// The single mutable in-progress test session.
#[derive(Debug)]
pub struct TestSession {
    /// Number of questions answered so far.
    pub question_index: usize,
    /// Difficulty the next question will be requested at.
    pub current_difficulty: f64,
    /// Attempts recorded so far, in submission order.
    pub attempts: Vec<Attempt>,
    /// The question currently displayed, if any.
    pub current_question: Option<Question>,
    phase: SessionPhase,
    started_at: Instant,
    question_started_at: Option<Instant>,
}

impl TestSession {
    fn new() -> Self {
        Self {
            question_index: 0,
            current_difficulty: AdaptiveConfig::INITIAL_DIFFICULTY,
            attempts: Vec::new(),
            current_question: None,
            phase: SessionPhase::AwaitingQuestion,
            started_at: Instant::now(),
            question_started_at: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Wall-clock time since the session started, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Drives one test session against the bank, history store, and
/// connectivity signal.
pub struct SessionEngine {
    bank: QuestionBankClient,
    history: HistoryStore,
    connectivity: watch::Receiver<bool>,
    identity: Option<String>,
    session: Option<TestSession>,
    // Bumped on start/abandon; an in-flight call that resolves after
    // the session it belongs to was discarded sees a stale epoch and
    // must not apply its result.
    epoch: u64,
}

impl SessionEngine {
    /// Create an engine for the given identity.
    pub fn new(
        bank: QuestionBankClient,
        history: HistoryStore,
        connectivity: watch::Receiver<bool>,
        identity: Option<String>,
    ) -> Self {
        Self {
            bank,
            history,
            connectivity,
            identity,
            session: None,
            epoch: 0,
        }
    }

    /// Begin a new session, discarding any previous one.
    pub fn start(&mut self) {
        self.epoch += 1;
        self.session = Some(TestSession::new());
        info!(
            identity = %self.identity.as_deref().unwrap_or("anonymous"),
            "Test session started"
        );
    }

    /// The in-progress session, if any.
    pub fn session(&self) -> Option<&TestSession> {
        self.session.as_ref()
    }

    /// Last observed connectivity state.
    pub fn is_online(&self) -> bool {
        *self.connectivity.borrow()
    }

    /// `AwaitingQuestion -> QuestionPresented`: request one question at
    /// the current difficulty within the narrowing tolerance band.
    ///
    /// On any failure the phase is unchanged and a retry is safe; the
    /// attempt list is never touched here.
    pub async fn load_question(&mut self) -> SessionResult<Question> {
        self.require_online()?;

        let (difficulty, band) = {
            let session = self.require_phase(SessionPhase::AwaitingQuestion)?;
            (
                session.current_difficulty,
                tolerance(session.question_index + 1),
            )
        };

        let epoch = self.epoch;
        let questions = self.bank.fetch_questions(difficulty, band, 1).await?;
        self.guard_epoch(epoch)?;

        let question = questions
            .into_iter()
            .next()
            .ok_or(crate::error::BankError::NoQuestions)?;

        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        session.current_question = Some(question.clone());
        session.question_started_at = Some(Instant::now());
        session.phase = SessionPhase::QuestionPresented;

        debug!(
            question_id = %question.id,
            difficulty = question.difficulty,
            number = session.question_index + 1,
            "Question presented"
        );

        Ok(question)
    }

    /// `QuestionPresented -> AnswerSubmitted`: judge the chosen answer
    /// remotely, record the attempt, and adapt the difficulty.
    ///
    /// A judging failure records nothing and keeps the question
    /// presented, so the same choice can simply be resubmitted.
    pub async fn submit_answer(&mut self, chosen_index: usize) -> SessionResult<bool> {
        self.require_online()?;

        let (question, response_time_ms) = {
            let session = self.require_phase(SessionPhase::QuestionPresented)?;
            let question = session
                .current_question
                .clone()
                .ok_or(SessionError::NoSession)?;

            if chosen_index >= question.answers.len() {
                return Err(SessionError::InvalidChoice {
                    chosen: chosen_index,
                    available: question.answers.len(),
                });
            }

            let response_time_ms = session
                .question_started_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0);

            (question, response_time_ms)
        };

        let epoch = self.epoch;
        let is_correct = self
            .bank
            .judge_answer(&question.id, chosen_index, response_time_ms)
            .await?;
        self.guard_epoch(epoch)?;

        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        session.attempts.push(Attempt {
            question_id: question.id.clone(),
            question_text: question.question_text.clone(),
            answer_texts: question
                .answers
                .iter()
                .map(|a| a.answer_text.clone())
                .collect(),
            chosen_index,
            is_correct,
            response_time_ms,
            difficulty: question.difficulty,
        });
        session.question_index += 1;
        session.current_difficulty = next_difficulty(session.current_difficulty, is_correct);
        session.phase = SessionPhase::AnswerSubmitted { was_correct: is_correct };

        info!(
            question_id = %question.id,
            is_correct,
            response_time_ms,
            next_difficulty = session.current_difficulty,
            answered = session.question_index,
            "Answer recorded"
        );

        Ok(is_correct)
    }

    /// `AnswerSubmitted -> AwaitingQuestion | Complete`: close the
    /// feedback window. The caller owns the feedback timer; the engine
    /// only performs the transition.
    pub fn advance(&mut self) -> SessionResult<SessionPhase> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;

        if !matches!(session.phase, SessionPhase::AnswerSubmitted { .. }) {
            return Err(SessionError::InvalidPhase {
                phase: session.phase.to_string(),
            });
        }

        session.current_question = None;
        session.question_started_at = None;
        session.phase = if session.question_index >= AdaptiveConfig::MAX_QUESTIONS {
            SessionPhase::Complete
        } else {
            SessionPhase::AwaitingQuestion
        };

        Ok(session.phase)
    }

    /// Explicit early termination. Rejected synchronously, with no
    /// state change and no network call, until the minimum question
    /// count is reached.
    pub fn finish_early(&mut self) -> SessionResult<()> {
        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;

        if matches!(
            session.phase,
            SessionPhase::Complete | SessionPhase::Finished
        ) {
            return Err(SessionError::InvalidPhase {
                phase: session.phase.to_string(),
            });
        }

        if session.attempts.len() < AdaptiveConfig::MIN_QUESTIONS {
            return Err(SessionError::TooFewQuestions {
                answered: session.attempts.len(),
                required: AdaptiveConfig::MIN_QUESTIONS,
            });
        }

        session.current_question = None;
        session.question_started_at = None;
        session.phase = SessionPhase::Complete;
        info!(answered = session.attempts.len(), "Session finished early");

        Ok(())
    }

    /// `Complete -> Finished`: compute the final score remotely, build
    /// the [`TestResult`], and persist it under the engine's identity.
    ///
    /// If scoring or persistence fails the phase stays at `Complete`
    /// and `finalize` can be called again without re-answering.
    pub async fn finalize(&mut self) -> SessionResult<TestResult> {
        self.require_online()?;

        let (attempts, elapsed_time_ms) = {
            let session = self.require_phase(SessionPhase::Complete)?;
            (session.attempts.clone(), session.elapsed_ms())
        };

        let epoch = self.epoch;
        let report = self.bank.compute_score(&attempts, elapsed_time_ms).await?;
        self.guard_epoch(epoch)?;

        let result = TestResult {
            id: Uuid::new_v4().to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
            final_iq_score: report.final_iq_score,
            // Recomputed locally so the persisted invariants hold even
            // if the remote report disagrees.
            correct_answers: attempts.iter().filter(|a| a.is_correct).count(),
            total_questions: attempts.len(),
            elapsed_time_ms,
            average_difficulty: report.average_difficulty,
            result_summary: report.result_summary.clone(),
            attempts,
        };

        self.history
            .append(result.clone(), self.identity.as_deref())
            .await?;
        self.guard_epoch(epoch)?;

        let session = self.session.as_mut().ok_or(SessionError::NoSession)?;
        session.phase = SessionPhase::Finished;

        info!(
            result_id = %result.id,
            final_iq_score = result.final_iq_score,
            correct = result.correct_answers,
            total = result.total_questions,
            elapsed_ms = result.elapsed_time_ms,
            "Session finalized"
        );

        Ok(result)
    }

    /// Discard the in-progress session without persisting anything.
    pub fn abandon(&mut self) {
        if self.session.take().is_some() {
            self.epoch += 1;
            info!("Test session abandoned");
        }
    }

    fn require_online(&self) -> SessionResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(SessionError::Offline)
        }
    }

    fn require_phase(&self, expected: SessionPhase) -> SessionResult<&TestSession> {
        let session = self.session.as_ref().ok_or(SessionError::NoSession)?;
        if session.phase == expected {
            Ok(session)
        } else {
            Err(SessionError::InvalidPhase {
                phase: session.phase.to_string(),
            })
        }
    }

    fn guard_epoch(&self, epoch: u64) -> SessionResult<()> {
        if self.epoch == epoch && self.session.is_some() {
            Ok(())
        } else {
            Err(SessionError::NoSession)
        }
    }
}
