//! Retry and error-mapping tests for the question bank client.

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use high_iq::bank::QuestionBankClient;
use high_iq::config::{BankConfig, ProxyConfig, RequestConfig};
use high_iq::error::BankError;
use high_iq::proxy::CachingProxy;

fn test_client(server: &MockServer, max_retries: u32) -> QuestionBankClient {
    let request_config = RequestConfig {
        timeout_ms: 2_000,
        max_retries,
        retry_delay_ms: 10,
    };
    let proxy = CachingProxy::spawn(
        ProxyConfig {
            shell_cache: "test-shell-v1".to_string(),
            runtime_cache: "test-runtime-v1".to_string(),
            shell_manifest: Vec::new(),
            skip_waiting: true,
        },
        &request_config,
        server.uri(),
    )
    .expect("proxy should spawn");

    QuestionBankClient::new(
        proxy,
        &BankConfig {
            base_url: server.uri(),
        },
        request_config,
    )
}

fn questions_body() -> serde_json::Value {
    json!([{
        "id": "q-1",
        "questionText": "Which word does not belong?",
        "answers": [{"answerText": "apple"}, {"answerText": "chair"}],
        "difficulty": 4.5,
        "explanation": "Chair is not a fruit."
    }])
}

mod fetch_questions {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_requests_carry_difficulty_and_tolerance() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .and(query_param("difficulty", "5"))
            .and(query_param("tolerance", "1.95"))
            .and(query_param("count", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(questions_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, 0);
        let questions = client
            .fetch_questions(5.0, 1.95, 1)
            .await
            .expect("fetch should succeed");

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "q-1");
        assert_eq!(questions[0].answers[1].answer_text, "chair");
    }

    #[tokio::test]
    async fn test_empty_question_list_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = test_client(&server, 0);
        let err = client
            .fetch_questions(5.0, 2.0, 1)
            .await
            .expect_err("an empty bank cannot serve a session");
        assert!(matches!(err, BankError::NoQuestions));
    }
}

mod retry {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_server_errors_are_retried_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(questions_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, 2);
        let questions = client
            .fetch_questions(5.0, 2.0, 1)
            .await
            .expect("third attempt should succeed");
        assert_eq!(questions.len(), 1);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad tolerance"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, 3);
        let err = client
            .fetch_questions(5.0, -1.0, 1)
            .await
            .expect_err("a 4xx must come back immediately");

        match err {
            BankError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad tolerance");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/questions"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server, 1);
        let err = client
            .fetch_questions(5.0, 2.0, 1)
            .await
            .expect_err("every attempt fails");

        match err {
            BankError::Unavailable { retries, .. } => assert_eq!(retries, 2),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }
}

mod judge_answer {
    use super::*;

    #[tokio::test]
    async fn test_verdict_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/answers/judge"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"isCorrect": false})))
            .mount(&server)
            .await;

        let client = test_client(&server, 0);
        let correct = client
            .judge_answer("q-1", 1, 3_000)
            .await
            .expect("judging should succeed");
        assert!(!correct);
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/answers/judge"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server, 0);
        let err = client
            .judge_answer("q-1", 0, 1_000)
            .await
            .expect_err("a garbage body cannot be a verdict");
        assert!(matches!(err, BankError::InvalidResponse { .. }));
    }
}
