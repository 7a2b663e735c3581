#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end pipeline tests against a mocked Ollama server and a temporary LanceDB

mod common;

use common::{build_pdf, init_test_tracing};
use pdf_rag::RagError;
use pdf_rag::config::{Config, OllamaConfig};
use pdf_rag::pipeline::RagPipeline;
use pdf_rag::session::{Role, Turn};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMBED_MODEL: &str = "nomic-embed-text";
const CHAT_MODEL: &str = "tinyllama:1.1b";

fn test_config(port: u16) -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ollama: OllamaConfig {
            host: "127.0.0.1".to_string(),
            port,
            probe_timeout_secs: 2,
            retry_attempts: 2,
            retry_delay_secs: 0,
            ..OllamaConfig::default()
        },
        ..Config::default()
    };
    (config, temp_dir)
}

async fn mock_ollama(models: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let models = models
        .iter()
        .map(|name| serde_json::json!({ "name": name }))
        .collect::<Vec<_>>();

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "models": models })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "embedding": [0.3, 0.1, 0.4, 0.1] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "response": "The warranty lasts two years.",
            "done": true,
        })))
        .mount(&server)
        .await;

    server
}

#[tokio::test(flavor = "multi_thread")]
async fn ingest_ask_and_delete_round_trip() {
    init_test_tracing();
    let server = mock_ollama(&["nomic-embed-text:latest", CHAT_MODEL]).await;
    let (config, _temp_dir) = test_config(server.address().port());
    let pipeline = RagPipeline::from_config(&config)
        .await
        .expect("pipeline builds");

    let upload = pipeline
        .ingest(
            build_pdf(&["Product overview.", "Warranty: two years from purchase."]),
            "manual.pdf",
        )
        .await
        .expect("ingest succeeds");
    assert_eq!(upload.chunks_created, 2);

    let answer = pipeline
        .ask("How long is the warranty?", Some("support"))
        .await
        .expect("ask succeeds");
    assert_eq!(answer.response, "The warranty lasts two years.");
    assert_eq!(answer.session_id, "support");
    assert_eq!(answer.sources.len(), 2);
    assert!(answer.sources.iter().all(|s| s.starts_with("File: manual.pdf, Page: ")));

    assert_eq!(
        pipeline.get_history("support"),
        vec![
            Turn::user("How long is the warranty?"),
            Turn::assistant("The warranty lasts two years."),
        ]
    );

    assert_eq!(
        pipeline.list_document_filenames().await.expect("list"),
        vec!["manual.pdf"]
    );
    assert_eq!(
        pipeline.delete_document("manual.pdf").await.expect("delete"),
        2
    );
    assert!(
        pipeline
            .list_document_filenames()
            .await
            .expect("list")
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn stopped_ollama_fails_ingestion_without_storing() {
    init_test_tracing();
    let (config, _temp_dir) = test_config(1);
    let pipeline = RagPipeline::from_config(&config)
        .await
        .expect("pipeline builds without contacting Ollama");

    let err = pipeline
        .ingest(build_pdf(&["some text"]), "offline.pdf")
        .await
        .expect_err("Ollama is not running");

    assert!(matches!(err, RagError::Ingestion { .. }));
    assert!(matches!(
        err.innermost(),
        RagError::ServiceUnavailable { .. }
    ));
    assert_eq!(err.remediation(), Some("ollama serve"));
    assert!(
        pipeline
            .list_document_filenames()
            .await
            .expect("list")
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_embedding_model_names_pull_command() {
    init_test_tracing();
    let server = mock_ollama(&[CHAT_MODEL]).await;
    let (config, _temp_dir) = test_config(server.address().port());
    let pipeline = RagPipeline::from_config(&config)
        .await
        .expect("pipeline builds");

    let err = pipeline
        .ingest(build_pdf(&["text"]), "doc.pdf")
        .await
        .expect_err("embedding model not pulled");

    assert!(matches!(err.innermost(), RagError::ModelNotFound { .. }));
    assert_eq!(
        err.remediation(),
        Some(format!("ollama pull {}", EMBED_MODEL).as_str())
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_generation_keeps_question_in_history() {
    init_test_tracing();
    let server = mock_ollama(&[EMBED_MODEL]).await;
    let (config, _temp_dir) = test_config(server.address().port());
    let pipeline = RagPipeline::from_config(&config)
        .await
        .expect("pipeline builds");

    let err = pipeline
        .ask("Anyone there?", Some("s"))
        .await
        .expect_err("completion model missing");

    assert!(matches!(err, RagError::RagQuery { .. }));
    let history = pipeline.get_history("s");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test(flavor = "multi_thread")]
async fn health_reports_each_component() {
    init_test_tracing();
    let server = mock_ollama(&["nomic-embed-text:latest"]).await;
    let (config, _temp_dir) = test_config(server.address().port());
    let pipeline = RagPipeline::from_config(&config)
        .await
        .expect("pipeline builds");

    let report = pipeline.health().await;

    assert!(report.service.is_reachable());
    assert!(report.embedding_model.available);
    assert!(!report.completion_model.available);
    assert!(report.vector_db);
    assert!(!report.is_healthy());
}
