#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// HTTP provider clients against mock servers

use lorekeeper::LoreError;
use lorekeeper::completion::{
    AnswerService, AskOptions, ChatMessage, CompletionProvider, OpenAiCompatibleClient,
};
use lorekeeper::config::{CompletionConfig, OllamaConfig, RetrievalConfig};
use lorekeeper::database::{IndexPoint, MemoryVectorIndex, Payload, VectorIndex};
use lorekeeper::embeddings::{Embedder, HashingEmbedder, OllamaClient};
use lorekeeper::retrieval::Retriever;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ollama_client(server: &MockServer, batch_size: u32) -> OllamaClient {
    let address = server.address();
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: address.ip().to_string(),
        port: address.port(),
        model: "test-embed".to_string(),
        batch_size,
    };
    OllamaClient::new(&config)
        .expect("client should build")
        .with_retry_attempts(1)
}

fn completion_config(server: &MockServer) -> CompletionConfig {
    CompletionConfig {
        base_url: server.uri(),
        model: "test-model".to_string(),
        ..CompletionConfig::default()
    }
}

fn chat_response(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ]
    }))
}

#[tokio::test]
async fn ollama_embeds_in_configured_batches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "test-embed", "input": ["a", "b"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-embed",
            "embeddings": [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"input": ["c"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "test-embed",
            "embeddings": [[0.0, 0.0, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ollama_client(&server, 2);
    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = client.embed(&texts).await.expect("embedding should succeed");

    assert_eq!(client.model_name(), "test-embed");
    assert_eq!(vectors.len(), 3);
    assert_eq!(vectors[2], vec![0.0, 0.0, 1.0]);
}

#[tokio::test]
async fn ollama_server_errors_are_embedding_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = ollama_client(&server, 8).embed(&["a".to_string()]).await;

    assert!(matches!(result, Err(LoreError::Embedding(_))));
}

#[tokio::test]
async fn ollama_ragged_vectors_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [1.0]]
        })))
        .mount(&server)
        .await;

    let result = ollama_client(&server, 8)
        .embed(&["a".to_string(), "b".to_string()])
        .await;

    assert!(matches!(result, Err(LoreError::Embedding(_))));
}

#[tokio::test]
async fn completion_sends_credentials_headers_and_temperature() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer secret"))
        .and(header("x-world", "avalon"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "temperature": 0.25,
            "messages": [{"role": "user", "content": "hello"}]
        })))
        .respond_with(chat_response("hi there"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = completion_config(&server);
    config.api_key = Some("secret".to_string());
    config
        .headers
        .insert("X-World".to_string(), "avalon".to_string());
    let client = OpenAiCompatibleClient::new(&config).expect("client should build");

    let answer = client
        .complete(&[ChatMessage::user("hello")], 0.25)
        .await
        .expect("completion should succeed");

    assert_eq!(answer, "hi there");
}

#[tokio::test]
async fn completion_failures_are_provider_call_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"model": "test-model", "temperature": 0.5})))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.75})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let client = OpenAiCompatibleClient::new(&completion_config(&server)).expect("client");
    let messages = [ChatMessage::user("hello")];

    let status_error = client.complete(&messages, 0.5).await;
    assert!(matches!(status_error, Err(LoreError::ProviderCall(_))));

    let empty_choices = client.complete(&messages, 0.75).await;
    assert!(matches!(empty_choices, Err(LoreError::ProviderCall(_))));
}

#[tokio::test]
async fn answer_service_grounds_the_prompt_in_retrieved_chunks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(chat_response("The ferry leaves at dawn [1]."))
        .expect(1)
        .mount(&server)
        .await;

    let embedder = Arc::new(HashingEmbedder::new(64).expect("embedder"));
    let index = Arc::new(MemoryVectorIndex::new());
    index.ensure_collection("kb", 64).await.expect("collection");
    let text = "The ferry leaves the harbor at dawn.";
    let mut payload = Payload::new();
    payload.insert("chunk_id".to_string(), json!("chunk-1"));
    payload.insert("doc_id".to_string(), json!("doc-1"));
    payload.insert("text".to_string(), json!(text));
    payload.insert("source_name".to_string(), json!("Timetable"));
    index
        .upsert(
            "kb",
            vec![IndexPoint {
                id: "chunk-1".to_string(),
                vector: embedder.embed_text(text),
                payload,
            }],
        )
        .await
        .expect("upsert");

    let service = AnswerService::new(
        Retriever::new(embedder, index, &RetrievalConfig::default()),
        Arc::new(OpenAiCompatibleClient::new(&completion_config(&server)).expect("client")),
        0.7,
        None,
    );

    let answer = service
        .ask("kb", "When does the ferry leave?", &AskOptions::default())
        .await
        .expect("ask should succeed");

    assert_eq!(answer.answer, "The ferry leaves at dawn [1].");
    assert_eq!(answer.citations.len(), 1);
    assert_eq!(answer.citations[0].doc_id, "doc-1");

    let requests = server.received_requests().await.expect("recording enabled");
    let body: serde_json::Value = requests[0].body_json().expect("JSON body");
    let user_prompt = body["messages"][1]["content"].as_str().expect("user prompt");
    assert!(user_prompt.contains("[1] Timetable"));
    assert!(user_prompt.contains("The ferry leaves the harbor at dawn."));
}
