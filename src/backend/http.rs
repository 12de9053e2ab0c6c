//! Backend for OpenAI-compatible HTTP endpoints.
//!
//! Loading probes `GET {base}/models`. The loaded module offers a client
//! constructor (chat completions with server-sent events, plus legacy text
//! completions) and an anonymous non-streaming chat helper.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use super::sse::event_stream;
use super::{
    BackendClient, BackendError, BackendHandle, BackendLoader, BackendModule, ChatCompletions,
    ChatHelper, ClientConstructor, Completion, GenerateText, LoadError,
};
use crate::api::extract::{completion_text, error_summary};
use crate::api::{ChatRequest, ClientOptions, GenerateTextRequest};
use crate::core::message::Message;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::endpoint_url;

const VERSION_HEADERS: &[&str] = &["x-api-version", "openai-version"];

#[derive(Clone)]
struct Endpoint {
    base_url: String,
    http: reqwest::Client,
}

impl Endpoint {
    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &T,
    ) -> Result<reqwest::Response, BackendError> {
        let url = endpoint_url(&self.base_url, path);
        debug!(url = %url, "Calling backend");
        let request = add_auth_headers(self.http.post(url), token);
        let response = request.json(body).send().await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(BackendError::Status {
        status: status.as_u16(),
        summary: summarize_error_body(&body),
    })
}

/// Short description of an error body: the JSON error message when there is
/// one, the raw text otherwise.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    serde_json::from_str::<Value>(trimmed)
        .ok()
        .and_then(|value| error_summary(&value))
        .filter(|summary| !summary.is_empty())
        .unwrap_or_else(|| trimmed.to_string())
}

pub struct HttpLoader {
    endpoint: Endpoint,
}

impl HttpLoader {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            endpoint: Endpoint {
                base_url: base_url.into(),
                http,
            },
        }
    }

    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        connect_timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        Ok(Self::new(base_url, builder.build()?))
    }
}

#[async_trait]
impl BackendLoader for HttpLoader {
    async fn load(&self) -> Result<BackendHandle, LoadError> {
        let url = endpoint_url(&self.endpoint.base_url, "models");
        debug!(url = %url, "Probing backend");
        let response = self
            .endpoint
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| LoadError::Unreachable(err.to_string()))?;

        // Auth failures still prove the backend is there; the client carries
        // the credential.
        let status = response.status();
        let reachable = status.is_success()
            || status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN;
        if !reachable {
            let body = response.text().await.unwrap_or_default();
            return Err(LoadError::Rejected {
                status: status.as_u16(),
                summary: summarize_error_body(&body),
            });
        }

        let version = VERSION_HEADERS
            .iter()
            .find_map(|name| response.headers().get(*name))
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Ok(BackendHandle::new(Arc::new(HttpModule {
            endpoint: self.endpoint.clone(),
            version,
        })))
    }
}

struct HttpModule {
    endpoint: Endpoint,
    version: Option<String>,
}

impl BackendModule for HttpModule {
    fn version(&self) -> Option<String> {
        self.version.clone()
    }

    fn client_constructor(&self) -> Option<Arc<dyn ClientConstructor>> {
        Some(Arc::new(HttpConstructor {
            endpoint: self.endpoint.clone(),
        }))
    }

    fn chat_helper(&self) -> Option<Arc<dyn ChatHelper>> {
        Some(Arc::new(HttpChatHelper {
            endpoint: self.endpoint.clone(),
        }))
    }
}

struct HttpConstructor {
    endpoint: Endpoint,
}

impl ClientConstructor for HttpConstructor {
    fn construct(&self, options: ClientOptions) -> Result<Arc<dyn BackendClient>, BackendError> {
        Ok(Arc::new(HttpClient {
            endpoint: self.endpoint.clone(),
            token: options.token,
            model: options.model,
        }))
    }
}

#[derive(Clone)]
struct HttpClient {
    endpoint: Endpoint,
    token: Option<String>,
    model: Option<String>,
}

impl HttpClient {
    fn model_or_default(&self, requested: String) -> String {
        if requested.is_empty() {
            self.model.clone().unwrap_or_default()
        } else {
            requested
        }
    }
}

impl BackendClient for HttpClient {
    fn chat_completions(&self) -> Option<Arc<dyn ChatCompletions>> {
        Some(Arc::new(self.clone()))
    }

    fn generate_text(&self) -> Option<Arc<dyn GenerateText>> {
        Some(Arc::new(self.clone()))
    }
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}

#[async_trait]
impl ChatCompletions for HttpClient {
    async fn create(&self, mut request: ChatRequest) -> Result<Completion, BackendError> {
        request.model = self.model_or_default(request.model);
        let response = self
            .endpoint
            .post("chat/completions", self.token.as_deref(), &request)
            .await?;

        if is_event_stream(&response) {
            Ok(Completion::Incremental(event_stream(response.bytes_stream())))
        } else {
            Ok(Completion::Single(response.json::<Value>().await?))
        }
    }
}

#[async_trait]
impl GenerateText for HttpClient {
    async fn generate(&self, mut request: GenerateTextRequest) -> Result<Value, BackendError> {
        request.model = self.model_or_default(request.model);
        let response = self
            .endpoint
            .post("completions", self.token.as_deref(), &request)
            .await?;
        Ok(response.json::<Value>().await?)
    }
}

struct HttpChatHelper {
    endpoint: Endpoint,
}

#[async_trait]
impl ChatHelper for HttpChatHelper {
    async fn chat(&self, messages: Vec<Message>) -> Result<Value, BackendError> {
        let body = json!({ "messages": messages, "stream": false });
        let response = self.endpoint.post("chat/completions", None, &body).await?;
        let value = response.json::<Value>().await?;
        Ok(json!({ "content": completion_text(&value) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint {
            base_url: "http://127.0.0.1:9/v1".to_string(),
            http: reqwest::Client::new(),
        }
    }

    #[test]
    fn summarize_error_body_prefers_json_message() {
        let raw = r#"{"error":{"message":"model overloaded","type":"invalid_request_error"}}"#;
        assert_eq!(summarize_error_body(raw), "model overloaded");
        assert_eq!(summarize_error_body(r#"{"status":"failed"}"#), r#"{"status":"failed"}"#);
        assert_eq!(summarize_error_body("  api failure \n"), "api failure");
        assert_eq!(summarize_error_body(""), "<empty>");
    }

    #[test]
    fn module_exposes_constructor_and_chat_helper() {
        let module = HttpModule {
            endpoint: endpoint(),
            version: Some("2024-06-01".to_string()),
        };
        assert_eq!(module.version().as_deref(), Some("2024-06-01"));
        assert!(module.chat_helper().is_some());

        let constructor = module.client_constructor().expect("constructor");
        let client = constructor
            .construct(ClientOptions {
                token: Some("key".to_string()),
                model: Some("m".to_string()),
            })
            .expect("client");
        assert!(client.chat_completions().is_some());
        assert!(client.generate_text().is_some());
    }

    #[test]
    fn empty_request_model_uses_constructor_model() {
        let client = HttpClient {
            endpoint: endpoint(),
            token: None,
            model: Some("fallback-model".to_string()),
        };
        assert_eq!(client.model_or_default(String::new()), "fallback-model");
        assert_eq!(client.model_or_default("explicit".to_string()), "explicit");
    }

    #[tokio::test]
    async fn unreachable_backend_fails_to_load() {
        let loader = HttpLoader::with_connect_timeout(
            "http://127.0.0.1:9/v1",
            Some(Duration::from_secs(2)),
        )
        .expect("client builds");
        let result = loader.load().await;
        assert!(matches!(result, Err(LoadError::Unreachable(_))));
    }
}
