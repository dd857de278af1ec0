//! Integration tests for the per-identity history store.
//!
//! Exercises both the in-memory and file-backed ledger backends.

use std::sync::Arc;


use high_iq::history::{
    FileBackend, HistoryLedger, HistoryStore, MemoryBackend, TestResult,
    MAX_RESULTS_PER_IDENTITY,
};
use high_iq::session::Attempt;

fn memory_store() -> HistoryStore {
    HistoryStore::new(Arc::new(MemoryBackend::new()))
}

fn sample_attempt(correct: bool) -> Attempt {
    Attempt {
        question_id: "q-1".to_string(),
        question_text: "Which number continues the sequence 2, 4, 8?".to_string(),
        answer_texts: vec!["12".to_string(), "16".to_string()],
        chosen_index: 1,
        is_correct: correct,
        response_time_ms: 3200,
        difficulty: 5.0,
    }
}

fn sample_result(id: &str) -> TestResult {
    let attempts = vec![
        sample_attempt(true),
        sample_attempt(true),
        sample_attempt(false),
        sample_attempt(true),
        sample_attempt(false),
    ];
    TestResult {
        id: id.to_string(),
        timestamp_ms: 1_700_000_000_000,
        final_iq_score: 112,
        correct_answers: attempts.iter().filter(|a| a.is_correct).count(),
        total_questions: attempts.len(),
        elapsed_time_ms: 120_000,
        average_difficulty: 5.4,
        result_summary: "Solid performance".to_string(),
        attempts,
    }
}

mod append_and_list {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_appended_result_is_head_of_list() {
        let store = memory_store();

        store
            .append(sample_result("r-1"), Some("alice"))
            .await
            .expect("append should succeed");
        store
            .append(sample_result("r-2"), Some("alice"))
            .await
            .expect("append should succeed");

        let results = store.list(Some("alice")).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "r-2");
        assert_eq!(results[1].id, "r-1");
    }

    #[tokio::test]
    async fn test_result_fields_survive_persistence() {
        let store = memory_store();
        let result = sample_result("r-1");

        store
            .append(result.clone(), None)
            .await
            .expect("append should succeed");

        let listed = store.list(None).await;
        assert_eq!(listed[0], result);
        assert_eq!(listed[0].total_questions, listed[0].attempts.len());
        assert_eq!(listed[0].correct_answers, 3);
    }

    #[tokio::test]
    async fn test_cap_keeps_fifty_and_drops_oldest() {
        let store = memory_store();

        for i in 0..=MAX_RESULTS_PER_IDENTITY {
            store
                .append(sample_result(&format!("r-{}", i)), Some("alice"))
                .await
                .expect("append should succeed");
        }

        let results = store.list(Some("alice")).await;
        assert_eq!(results.len(), MAX_RESULTS_PER_IDENTITY);
        assert_eq!(results[0].id, format!("r-{}", MAX_RESULTS_PER_IDENTITY));
        assert!(
            results.iter().all(|r| r.id != "r-0"),
            "the oldest result should have been evicted"
        );
    }

    #[tokio::test]
    async fn test_identities_are_isolated() {
        let store = memory_store();

        store
            .append(sample_result("alice-1"), Some("alice"))
            .await
            .unwrap();
        store.append(sample_result("anon-1"), None).await.unwrap();

        assert_eq!(store.list(Some("alice")).await.len(), 1);
        assert_eq!(store.list(None).await.len(), 1);
        assert_eq!(store.list(Some("anonymous")).await.len(), 1);
        assert!(store.list(Some("bob")).await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_appends_both_survive() {
        let store = memory_store();

        let a = store.clone();
        let b = store.clone();
        let (ra, rb) = tokio::join!(
            a.append(sample_result("race-a"), Some("alice")),
            b.append(sample_result("race-b"), Some("alice")),
        );
        ra.expect("first append should succeed");
        rb.expect("second append should succeed");

        let results = store.list(Some("alice")).await;
        assert_eq!(results.len(), 2, "no append may be lost to the race");
    }
}

mod get_by_id {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_finds_matching_result() {
        let store = memory_store();
        store.append(sample_result("r-1"), None).await.unwrap();
        store.append(sample_result("r-2"), None).await.unwrap();

        let found = store.get_by_id("r-1", None).await;
        assert_eq!(found.expect("result should exist").id, "r-1");
    }

    #[tokio::test]
    async fn test_absent_for_unknown_id() {
        let store = memory_store();
        store.append(sample_result("r-1"), None).await.unwrap();

        assert!(store.get_by_id("nope", None).await.is_none());
    }

    #[tokio::test]
    async fn test_never_fails_on_empty_ledger() {
        let store = memory_store();
        assert!(store.get_by_id("anything", Some("nobody")).await.is_none());
    }
}

mod corruption {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_malformed_document_reads_as_empty() {
        let store = HistoryStore::new(Arc::new(MemoryBackend::with_document("{not json!")));

        assert!(store.list(None).await.is_empty());
        assert!(store.get_by_id("r-1", None).await.is_none());
    }

    #[tokio::test]
    async fn test_append_recovers_from_malformed_document() {
        let store = HistoryStore::new(Arc::new(MemoryBackend::with_document("[1, 2, \"oops\"")));

        store
            .append(sample_result("r-1"), None)
            .await
            .expect("append should replace the malformed ledger");

        assert_eq!(store.list(None).await.len(), 1);
    }
}

mod round_trip {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ledger_serialization_round_trip() {
        let mut ledger = HistoryLedger::default();
        ledger.push_front("alice", sample_result("r-1"));
        ledger.push_front("alice", sample_result("r-2"));
        ledger.push_front("anonymous", sample_result("r-3"));

        let document = serde_json::to_string(&ledger).expect("should serialize");
        let restored: HistoryLedger =
            serde_json::from_str(&document).expect("should deserialize");

        assert_eq!(restored, ledger);
    }

    #[test]
    fn test_document_is_a_plain_identity_map() {
        let mut ledger = HistoryLedger::default();
        ledger.push_front("alice", sample_result("r-1"));

        let value: serde_json::Value =
            serde_json::to_value(&ledger).expect("should serialize");
        assert!(value.is_object());
        assert_eq!(value["alice"][0]["id"], "r-1");
        assert_eq!(value["alice"][0]["finalIQScore"], 112);
        assert_eq!(value["alice"][0]["attempts"][0]["chosenAnswerIndex"], 1);
    }
}

mod file_backend {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_ledger_survives_store_recreation() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("history.json");

        {
            let store = HistoryStore::new(Arc::new(FileBackend::new(&path)));
            store.append(sample_result("r-1"), Some("alice")).await.unwrap();
        }

        let reopened = HistoryStore::new(Arc::new(FileBackend::new(&path)));
        let results = reopened.list(Some("alice")).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "r-1");
    }

    #[tokio::test]
    async fn test_missing_file_is_an_empty_ledger() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let store =
            HistoryStore::new(Arc::new(FileBackend::new(dir.path().join("missing.json"))));

        assert!(store.list(None).await.is_empty());
    }

    #[tokio::test]
    async fn test_parent_directories_are_created() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("nested/deeper/history.json");

        let store = HistoryStore::new(Arc::new(FileBackend::new(&path)));
        store
            .append(sample_result("r-1"), None)
            .await
            .expect("append should create parent directories");

        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("history.json");
        tokio::fs::write(&path, "definitely not json").await.unwrap();

        let store = HistoryStore::new(Arc::new(FileBackend::new(&path)));
        assert!(store.list(None).await.is_empty());
    }
}
