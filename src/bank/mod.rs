//! Remote question-bank and scoring collaborator.
//!
//! The bank owns question content, correctness judging, and final score
//! computation; this module is only its client. All traffic goes
//! through the caching proxy, so GET requests benefit from the dynamic
//! caching policy and every call feeds the connectivity signal.

mod client;
mod types;

pub use client::QuestionBankClient;
pub use types::{AnswerOption, Question, ScoreReport};
