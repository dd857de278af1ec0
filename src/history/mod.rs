//! Per-identity history of completed test results.
//!
//! The whole history is one JSON document: a mapping from identity key
//! to a most-recent-first list of [`TestResult`], capped per identity.
//! Persistence goes through the [`LedgerBackend`] trait so the document
//! can live in a file in production and in memory in tests, and so the
//! serialization format never leaks into business logic.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::session::Attempt;

/// Partition key used when no authenticated identity is present.
pub const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Retention cap per identity key; the oldest entries fall off the tail.
pub const MAX_RESULTS_PER_IDENTITY: usize = 50;

/// Persisted summary of one finished test session.
///
/// Immutable once appended. Carries its attempts in full so history
/// views need no further network access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Unique result identifier.
    pub id: String,
    /// Completion time, unix milliseconds.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    /// Final IQ score computed by the remote scoring service.
    #[serde(rename = "finalIQScore")]
    pub final_iq_score: i64,
    /// How many attempts were judged correct.
    pub correct_answers: usize,
    /// Total questions answered; always equals `attempts.len()`.
    pub total_questions: usize,
    /// Wall-clock duration of the session in milliseconds.
    #[serde(rename = "elapsedTime")]
    pub elapsed_time_ms: u64,
    /// Mean difficulty across the session's attempts.
    pub average_difficulty: f64,
    /// Human-readable summary from the scoring service.
    pub result_summary: String,
    /// Every attempt of the session, in submission order.
    pub attempts: Vec<Attempt>,
}

/// The persisted identity-key → results mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLedger {
    entries: BTreeMap<String, Vec<TestResult>>,
}

impl HistoryLedger {
    /// Insert a result at the head of an identity's list, truncating to
    /// the retention cap.
    pub fn push_front(&mut self, identity: &str, result: TestResult) {
        let list = self.entries.entry(identity.to_string()).or_default();
        list.insert(0, result);
        list.truncate(MAX_RESULTS_PER_IDENTITY);
    }

    /// Results for one identity key, newest first.
    pub fn results(&self, identity: &str) -> &[TestResult] {
        self.entries.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All identity keys present in the ledger.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Persistence substrate for the ledger document.
///
/// Deals only in the opaque serialized document; parsing and the cap
/// policy live in [`HistoryStore`].
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Read the current document, or `None` if none was ever written.
    async fn read(&self) -> LedgerResult<Option<String>>;
    /// Replace the document.
    async fn write(&self, document: &str) -> LedgerResult<()>;
}

/// File-backed ledger document.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    /// Create a backend storing the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LedgerBackend for FileBackend {
    async fn read(&self) -> LedgerResult<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(document) => Ok(Some(document)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::Read {
                message: format!("{}: {}", self.path.display(), e),
            }),
        }
    }

    async fn write(&self, document: &str) -> LedgerResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::Write {
                    message: format!("Failed to create {}: {}", parent.display(), e),
                })?;
        }

        tokio::fs::write(&self.path, document)
            .await
            .map_err(|e| LedgerError::Write {
                message: format!("{}: {}", self.path.display(), e),
            })
    }
}

/// In-memory ledger document, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    document: std::sync::Mutex<Option<String>>,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend pre-seeded with a document.
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: std::sync::Mutex::new(Some(document.into())),
        }
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn read(&self) -> LedgerResult<Option<String>> {
        Ok(self
            .document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    async fn write(&self, document: &str) -> LedgerResult<()> {
        *self
            .document
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(document.to_string());
        Ok(())
    }
}

/// The history store: bounded, per-identity, append-only from the
/// caller's point of view.
#[derive(Clone)]
pub struct HistoryStore {
    backend: Arc<dyn LedgerBackend>,
    // Serializes the read-modify-write cycle so racing session
    // completions for the same process never lose an entry.
    write_lock: Arc<Mutex<()>>,
}

impl HistoryStore {
    /// Create a store over the given backend.
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            backend,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Map an optional identity to its partition key.
    pub fn resolve_identity(identity: Option<&str>) -> &str {
        match identity {
            Some(id) if !id.is_empty() => id,
            _ => ANONYMOUS_IDENTITY,
        }
    }

    /// Append a result as the new head of the identity's list.
    ///
    /// A malformed existing document is logged and replaced by a fresh
    /// ledger; a backend I/O failure propagates so the caller can retry
    /// without losing the result.
    pub async fn append(&self, result: TestResult, identity: Option<&str>) -> LedgerResult<()> {
        let key = Self::resolve_identity(identity);
        let _guard = self.write_lock.lock().await;

        let mut ledger = match self.backend.read().await? {
            Some(document) => parse_or_empty(&document),
            None => HistoryLedger::default(),
        };

        ledger.push_front(key, result);

        let document = serde_json::to_string(&ledger)?;
        self.backend.write(&document).await?;

        debug!(identity = %key, results = ledger.results(key).len(), "Appended test result");
        Ok(())
    }

    /// All results for an identity, newest first. Never fails: an
    /// unreadable or malformed ledger behaves as an empty one.
    pub async fn list(&self, identity: Option<&str>) -> Vec<TestResult> {
        let key = Self::resolve_identity(identity);

        let document = match self.backend.read().await {
            Ok(Some(document)) => document,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read history ledger, treating as empty");
                return Vec::new();
            }
        };

        parse_or_empty(&document).results(key).to_vec()
    }

    /// Find one result by identifier within an identity's list.
    pub async fn get_by_id(&self, id: &str, identity: Option<&str>) -> Option<TestResult> {
        self.list(identity)
            .await
            .into_iter()
            .find(|result| result.id == id)
    }
}

fn parse_or_empty(document: &str) -> HistoryLedger {
    match serde_json::from_str(document) {
        Ok(ledger) => ledger,
        Err(e) => {
            warn!(error = %e, "History ledger malformed, treating as empty");
            HistoryLedger::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str) -> TestResult {
        TestResult {
            id: id.to_string(),
            timestamp_ms: 0,
            final_iq_score: 100,
            correct_answers: 0,
            total_questions: 0,
            elapsed_time_ms: 0,
            average_difficulty: 5.0,
            result_summary: String::new(),
            attempts: Vec::new(),
        }
    }

    #[test]
    fn test_push_front_orders_newest_first() {
        let mut ledger = HistoryLedger::default();
        ledger.push_front("anonymous", result("a"));
        ledger.push_front("anonymous", result("b"));

        let results = ledger.results("anonymous");
        assert_eq!(results[0].id, "b");
        assert_eq!(results[1].id, "a");
    }

    #[test]
    fn test_cap_drops_oldest() {
        let mut ledger = HistoryLedger::default();
        for i in 0..=MAX_RESULTS_PER_IDENTITY {
            ledger.push_front("anonymous", result(&format!("r{}", i)));
        }

        let results = ledger.results("anonymous");
        assert_eq!(results.len(), MAX_RESULTS_PER_IDENTITY);
        // r0 was the first appended and should be the one evicted.
        assert!(results.iter().all(|r| r.id != "r0"));
        assert_eq!(results[0].id, format!("r{}", MAX_RESULTS_PER_IDENTITY));
    }

    #[test]
    fn test_identities_are_partitioned() {
        let mut ledger = HistoryLedger::default();
        ledger.push_front("alice", result("a"));
        ledger.push_front("anonymous", result("b"));

        assert_eq!(ledger.results("alice").len(), 1);
        assert_eq!(ledger.results("anonymous").len(), 1);
        assert!(ledger.results("bob").is_empty());
    }

    #[test]
    fn test_resolve_identity() {
        assert_eq!(HistoryStore::resolve_identity(None), ANONYMOUS_IDENTITY);
        assert_eq!(HistoryStore::resolve_identity(Some("")), ANONYMOUS_IDENTITY);
        assert_eq!(HistoryStore::resolve_identity(Some("alice")), "alice");
    }
}
