//! Integration tests for the Ollama backend against a mock HTTP server.

use instability::llm::{ChatBackend, OllamaClient};
use instability::types::config::LlmConfig;
use instability::types::messages::ChatMessage;
use instability::InstabilityError;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "qwen3:8b",
        "message": {"role": "assistant", "content": content},
        "done": true
    }))
}

#[tokio::test]
async fn chat_posts_non_streaming_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "qwen3:8b",
            "stream": false,
            "messages": [{"role": "user", "content": "ping?"}]
        })))
        .respond_with(reply("pong"))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "qwen3:8b");
    let answer = client.chat(&[ChatMessage::user("ping?")]).await.unwrap();

    assert_eq!(answer, "pong");
}

#[tokio::test]
async fn chat_sends_temperature_and_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(header("authorization", "Bearer secret"))
        .and(body_partial_json(json!({"options": {"temperature": 0.7}})))
        .respond_with(reply("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let config = LlmConfig {
        base_url: format!("{}/v1/", server.uri()),
        temperature: 0.7,
        ..LlmConfig::default()
    };
    let client = OllamaClient::from_config(&config).unwrap().with_api_key("secret");

    assert_eq!(client.chat(&[ChatMessage::user("hi")]).await.unwrap(), "ok");
}

#[tokio::test]
async fn chat_error_status_carries_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model 'nope' not found"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "nope");
    let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();

    match err {
        InstabilityError::Llm(msg) => {
            assert!(msg.contains("404"));
            assert!(msg.contains("model 'nope' not found"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn chat_without_message_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "qwen3:8b");
    let err = client.chat(&[ChatMessage::user("hi")]).await.unwrap_err();

    assert!(matches!(err, InstabilityError::Llm(_)));
}

#[tokio::test]
async fn list_models_and_availability() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "qwen3:8b"}, {"name": "llama3:latest"}]
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri(), "qwen3:8b");

    assert_eq!(client.list_models().await.unwrap(), vec!["qwen3:8b", "llama3:latest"]);
    assert!(client.is_available().await);
}

#[tokio::test]
async fn unreachable_server_is_unavailable() {
    // Bind then drop to get a port nobody listens on.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let client = OllamaClient::new(format!("http://127.0.0.1:{}", port), "qwen3:8b");

    assert!(!client.is_available().await);
    assert!(matches!(
        client.chat(&[ChatMessage::user("hi")]).await,
        Err(InstabilityError::Http(_))
    ));
}
