//! Ollama provider implementation.
//!
//! Talks to Ollama's native chat endpoint (`POST /api/chat`) with streaming
//! disabled, so every request yields exactly one JSON reply:
//!
//! ```json
//! { "model": "qwen2.5", "message": { "role": "assistant", "content": "..." }, "done": true }
//! ```
//!
//! Transport failures are classified so the caller can tell an unreachable
//! server from a slow one or from a server that answered with garbage.

use async_trait::async_trait;
use mercy_config::OllamaConfig;
use mercy_core::error::ProviderError;
use mercy_core::message::{Message, Role};
use mercy_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const CHAT_PATH: &str = "/api/chat";

/// A provider backed by an Ollama server.
pub struct OllamaProvider {
    chat_url: String,
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for a chat endpoint URL, bounding every request by `timeout`.
    pub fn new(chat_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        let chat_url = chat_url.into().trim_end_matches('/').to_string();
        let base_url = chat_url
            .strip_suffix(CHAT_PATH)
            .unwrap_or(&chat_url)
            .to_string();

        Ok(Self {
            chat_url,
            base_url,
            client,
        })
    }

    /// Create a provider from the `[ollama]` config section.
    pub fn from_config(config: &OllamaConfig) -> Result<Self, ProviderError> {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }

    /// The chat endpoint this provider posts to.
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Convert our Message types to the wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect()
    }

    /// Map a reqwest failure onto the provider error taxonomy.
    fn classify(err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::Unreachable(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }

    /// Parse a success body. The body must be a JSON object; a missing
    /// `message.content` is an empty reply, not an error.
    fn parse_chat_response(body: &str) -> Result<ChatResponse, ProviderError> {
        let value: serde_json::Value = serde_json::from_str(body)
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        if !value.is_object() {
            return Err(ProviderError::InvalidResponse(
                "Response body is not a JSON object".into(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| ProviderError::InvalidResponse(format!("Unexpected response shape: {e}")))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = ChatRequest {
            model: &request.model,
            messages: Self::to_api_messages(&request.messages),
            stream: request.stream,
            options: &request.options,
        };

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Ollama returned error");
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message: error_body,
            });
        }

        let text = response.text().await.map_err(Self::classify)?;
        let parsed = Self::parse_chat_response(&text)?;

        let content = parsed.message.and_then(|m| m.content).unwrap_or_default();
        let usage = match (parsed.prompt_eval_count, parsed.eval_count) {
            (None, None) => None,
            (prompt, completion) => Some(Usage {
                prompt_tokens: prompt.unwrap_or(0),
                completion_tokens: completion.unwrap_or(0),
            }),
        };

        if let Some(u) = &usage {
            debug!(
                prompt_tokens = u.prompt_tokens,
                completion_tokens = u.completion_tokens,
                "Chat response received"
            );
        }

        Ok(ProviderResponse {
            message: Message::new(Role::Assistant, content),
            usage,
            model: parsed.model.unwrap_or(request.model),
        })
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(Self::classify)?;

        if !response.status().is_success() {
            return Ok(Vec::new());
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.client.get(&url).send().await.map_err(Self::classify)?;
        Ok(response.status().is_success())
    }
}

// ── Wire types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api/chat")
    }

    fn request(messages: Vec<Message>) -> ProviderRequest {
        ProviderRequest {
            model: "qwen2.5".into(),
            messages,
            stream: false,
            options: GenerationOptions::default(),
        }
    }

    fn provider(url: &str) -> OllamaProvider {
        OllamaProvider::new(url, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_is_derived_from_chat_url() {
        let p = provider("http://localhost:11434/api/chat/");
        assert_eq!(p.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(p.base_url, "http://localhost:11434");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![
            Message::system("be kind"),
            Message::user("hi"),
            Message::assistant("hello!"),
        ];
        let api = OllamaProvider::to_api_messages(&messages);
        let roles: Vec<_> = api.iter().map(|m| m.role).collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
        assert_eq!(api[2].content, "hello!");
    }

    #[test]
    fn request_body_matches_wire_contract() {
        let messages = vec![Message::user("hi")];
        let options = GenerationOptions::default();
        let body = ChatRequest {
            model: "qwen2.5",
            messages: OllamaProvider::to_api_messages(&messages),
            stream: false,
            options: &options,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "qwen2.5");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hi");
        assert_eq!(json["options"]["num_predict"], 500);
        assert_eq!(json["options"]["num_ctx"], 4096);
        assert_eq!(json["options"]["top_k"], 40);
        // no timestamp leaks onto the wire
        assert!(json["messages"][0].get("timestamp").is_none());
    }

    #[test]
    fn missing_content_parses_as_empty() {
        let parsed = OllamaProvider::parse_chat_response(r#"{"model":"qwen2.5","done":true}"#).unwrap();
        assert!(parsed.message.is_none());

        let parsed = OllamaProvider::parse_chat_response(r#"{"message":{"role":"assistant"}}"#).unwrap();
        assert!(parsed.message.unwrap().content.is_none());
    }

    #[test]
    fn non_object_body_is_invalid() {
        assert!(matches!(
            OllamaProvider::parse_chat_response("[]"),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(
            OllamaProvider::parse_chat_response("<html>502</html>"),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn complete_returns_message_content() {
        let seen: Arc<Mutex<Vec<serde_json::Value>>> = Arc::default();
        let seen_in_handler = seen.clone();
        let router = Router::new().route(
            "/api/chat",
            post(move |Json(body): Json<serde_json::Value>| {
                let seen = seen_in_handler.clone();
                async move {
                    seen.lock().unwrap().push(body);
                    Json(serde_json::json!({
                        "model": "qwen2.5",
                        "message": {"role": "assistant", "content": "Hey there!"},
                        "done": true,
                        "prompt_eval_count": 42,
                        "eval_count": 7
                    }))
                }
            }),
        );
        let url = spawn_backend(router).await;

        let response = provider(&url)
            .complete(request(vec![Message::system("sys"), Message::user("hi")]))
            .await
            .unwrap();

        assert_eq!(response.message.content, "Hey there!");
        assert_eq!(response.message.role, Role::Assistant);
        let usage = response.usage.unwrap();
        assert_eq!(usage.prompt_tokens, 42);
        assert_eq!(usage.completion_tokens, 7);

        let bodies = seen.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["stream"], false);
        assert_eq!(bodies[0]["messages"].as_array().unwrap().len(), 2);
        assert_eq!(bodies[0]["options"]["top_k"], 40);
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let url = spawn_backend(router).await;

        let err = provider(&url).complete(request(vec![Message::user("hi")])).await.unwrap_err();
        match err {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "model crashed");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_maps_to_invalid_response() {
        let router = Router::new().route("/api/chat", post(|| async { "definitely not json" }));
        let url = spawn_backend(router).await;

        let err = provider(&url).complete(request(vec![Message::user("hi")])).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn slow_backend_maps_to_timeout() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(serde_json::json!({"message": {"content": "too late"}}))
            }),
        );
        let url = spawn_backend(router).await;
        let p = OllamaProvider::new(&url, Duration::from_millis(200)).unwrap();

        let err = p.complete(request(vec![Message::user("hi")])).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn closed_port_maps_to_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let p = provider(&format!("http://{addr}/api/chat"));
        let err = p.complete(request(vec![Message::user("hi")])).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unreachable(_)), "got {err:?}");
        assert!(p.health_check().await.is_err());
    }

    #[tokio::test]
    async fn list_models_reads_tags() {
        let router = Router::new().route(
            "/api/tags",
            get(|| async {
                Json(serde_json::json!({
                    "models": [{"name": "qwen2.5:latest"}, {"name": "llama3:8b"}]
                }))
            }),
        );
        let url = spawn_backend(router).await;
        let p = provider(&url);

        assert!(p.health_check().await.unwrap());
        let models = p.list_models().await.unwrap();
        assert_eq!(models, vec!["qwen2.5:latest", "llama3:8b"]);
    }
}
