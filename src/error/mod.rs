use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("History ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Question bank error: {0}")]
    Bank(#[from] BankError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// History ledger persistence errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Backend read failed: {message}")]
    Read { message: String },

    #[error("Backend write failed: {message}")]
    Write { message: String },

    #[error("Ledger document malformed: {message}")]
    Malformed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Remote question-bank / scoring collaborator errors
#[derive(Debug, Error)]
pub enum BankError {
    #[error("Question bank unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("No questions available in the requested difficulty band")]
    NoQuestions,

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
}

/// Caching proxy errors
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Network request failed: {message}")]
    Network { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Proxy is not running")]
    NotRunning,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Session state machine errors.
///
/// `Offline` and `Bank` are deliberately distinct variants so callers
/// can tell "reconnect to continue" apart from "backend hiccup, retry".
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Offline: cannot proceed without a network connection")]
    Offline,

    #[error("Question bank error: {0}")]
    Bank(#[from] BankError),

    #[error("Cannot finish yet: {answered} of {required} minimum questions answered")]
    TooFewQuestions { answered: usize, required: usize },

    #[error("Answer index {chosen} is out of range for {available} answers")]
    InvalidChoice { chosen: usize, available: usize },

    #[error("Operation not valid in phase {phase}")]
    InvalidPhase { phase: String },

    #[error("No active session")]
    NoSession,

    #[error("History ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Result type alias for question bank operations
pub type BankResult<T> = Result<T, BankError>;

/// Result type alias for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
