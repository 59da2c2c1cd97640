//! Provider calls and the mock fallback.
//!
//! OpenRouter and Groq share the OpenAI chat-completions format. Ollama uses
//! its own non-streaming `/api/generate` endpoint. All calls go through one
//! shared `reqwest::Client` carrying the configured timeout.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::LLMConfig;
use crate::prompt::{mock_response, system_prompt, user_prompt};
use crate::types::{Generation, GenerationRequest, LLMProvider};

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 500;
const READY_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
/// Error bodies are truncated to this many characters in logs.
const ERROR_BODY_LIMIT: usize = 200;

/// Why a provider call did not produce text.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} API key not configured")]
    MissingApiKey(LLMProvider),

    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("empty completion")]
    Empty,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Request(e.to_string())
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Client for the configured provider.
pub struct LlmClient {
    config: LLMConfig,
    http: Client,
}

impl LlmClient {
    pub fn new(config: LLMConfig) -> folio_core::Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| folio_core::Error::Internal(format!("building HTTP client: {}", e)))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    pub fn provider(&self) -> LLMProvider {
        self.config.provider
    }

    /// One attempt against the configured provider. No retries.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let text = match self.config.provider {
            LLMProvider::Mock => return Ok(self.mock(request)),
            LLMProvider::OpenRouter | LLMProvider::Groq => self.openai_compat(request).await?,
            LLMProvider::Ollama => self.ollama(request).await?,
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(text.to_string())
    }

    /// Generate, falling back to the mock responder on any provider error.
    pub async fn respond(&self, request: &GenerationRequest) -> Generation {
        match self.generate(request).await {
            Ok(text) => Generation {
                text,
                provider: self.config.provider,
                fell_back: false,
            },
            Err(e) => {
                warn!(
                    "{} provider failed, answering with mock responder: {}",
                    self.config.provider, e
                );
                Generation {
                    text: self.mock(request),
                    provider: LLMProvider::Mock,
                    fell_back: true,
                }
            }
        }
    }

    /// Whether the provider looks usable right now.
    pub async fn check_ready(&self) -> bool {
        match self.config.provider {
            LLMProvider::Mock => true,
            LLMProvider::OpenRouter | LLMProvider::Groq => self.config.api_key.is_some(),
            LLMProvider::Ollama => {
                let url = format!("{}/api/tags", self.config.endpoint);
                match self.http.get(&url).timeout(READY_CHECK_TIMEOUT).send().await {
                    Ok(resp) => resp.status().is_success(),
                    Err(e) => {
                        debug!("Ollama readiness check failed: {}", e);
                        false
                    }
                }
            }
        }
    }

    fn mock(&self, request: &GenerationRequest) -> String {
        mock_response(&self.config.profile_name, &request.question, &request.context)
    }

    async fn openai_compat(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingApiKey(self.config.provider))?;

        let name = &self.config.profile_name;
        let mut messages = vec![json!({"role": "system", "content": system_prompt(name)})];
        messages.extend(
            request
                .history
                .iter()
                .map(|turn| json!({"role": turn.role.as_str(), "content": turn.text})),
        );
        messages.push(json!({
            "role": "user",
            "content": user_prompt(name, &request.question, &request.context),
        }));

        let body = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });

        debug!(
            "Calling {} at {} with model {}",
            self.config.provider, self.config.endpoint, self.config.model
        );

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response).await);
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no choices in completion".into()))?
            .message
            .content
            .ok_or(ProviderError::Empty)
    }

    async fn ollama(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let name = &self.config.profile_name;
        let mut prompt = system_prompt(name);
        prompt.push_str("\n\n");
        for turn in &request.history {
            prompt.push_str(turn.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push('\n');
        }
        prompt.push_str(&user_prompt(name, &request.question, &request.context));

        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": TEMPERATURE,
                "top_p": 0.9,
                "num_predict": MAX_TOKENS,
            },
        });

        let url = format!("{}/api/generate", self.config.endpoint);
        debug!("Calling ollama at {} with model {}", url, self.config.model);

        let response = self.http.post(&url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status.as_u16(), response).await);
        }

        let parsed: OllamaResponse = response.json().await?;
        parsed.response.ok_or(ProviderError::Empty)
    }
}

async fn status_error(status: u16, response: reqwest::Response) -> ProviderError {
    let body = response.text().await.unwrap_or_default();
    ProviderError::Status {
        status,
        body: body.chars().take(ERROR_BODY_LIMIT).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConversationTurn;
    use axum::routing::{get, post};
    use axum::{Json, Router};

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn request() -> GenerationRequest {
        GenerationRequest {
            question: "Where does Satvik work?".into(),
            context: "Satvik works at DRDO.".into(),
            history: vec![
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("hello!"),
            ],
        }
    }

    fn hosted(endpoint: String, api_key: Option<&str>) -> LlmClient {
        let mut config = LLMConfig::for_provider(LLMProvider::Groq);
        config.endpoint = endpoint;
        config.api_key = api_key.map(String::from);
        config.timeout = Duration::from_secs(2);
        LlmClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_mock_is_deterministic() {
        let client = LlmClient::new(LLMConfig::default()).unwrap();
        let a = client.respond(&request()).await;
        let b = client.respond(&request()).await;
        assert_eq!(a.text, b.text);
        assert_eq!(a.provider, LLMProvider::Mock);
        assert!(!a.fell_back);
        assert!(a.text.contains("DRDO"));
        assert!(client.check_ready().await);
    }

    #[tokio::test]
    async fn test_openai_compat_success() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|Json(body): Json<serde_json::Value>| async move {
                // system + 2 history turns + user prompt
                let count = body["messages"].as_array().map(|m| m.len()).unwrap_or(0);
                Json(json!({
                    "choices": [{"message": {"role": "assistant", "content": format!(" {} messages ", count)}}]
                }))
            }),
        );
        let base = spawn(router).await;
        let client = hosted(format!("{}/v1/chat/completions", base), Some("key"));

        let text = client.generate(&request()).await.unwrap();
        assert_eq!(text, "4 messages");

        let generation = client.respond(&request()).await;
        assert_eq!(generation.provider, LLMProvider::Groq);
        assert!(!generation.fell_back);
    }

    #[tokio::test]
    async fn test_missing_key_falls_back() {
        let client = hosted("http://127.0.0.1:1/unused".into(), None);
        assert!(matches!(
            client.generate(&request()).await,
            Err(ProviderError::MissingApiKey(LLMProvider::Groq))
        ));
        assert!(!client.check_ready().await);

        let generation = client.respond(&request()).await;
        assert!(generation.fell_back);
        assert_eq!(generation.provider, LLMProvider::Mock);
        assert!(generation.text.contains("Satvik works at DRDO."));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_falls_back() {
        let client = hosted("http://127.0.0.1:1/v1/chat/completions".into(), Some("key"));
        assert!(client.generate(&request()).await.is_err());
        let generation = client.respond(&request()).await;
        assert!(generation.fell_back);
        assert!(generation.text.contains("DRDO"));
    }

    #[tokio::test]
    async fn test_error_status_and_empty_completion() {
        let router = Router::new()
            .route(
                "/fail",
                post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad key") }),
            )
            .route(
                "/empty",
                post(|| async { Json(json!({"choices": [{"message": {"content": "   "}}]})) }),
            )
            .route("/garbage", post(|| async { "not json" }));
        let base = spawn(router).await;

        let err = hosted(format!("{}/fail", base), Some("key"))
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 401, ref body } if body == "bad key"));

        let err = hosted(format!("{}/empty", base), Some("key"))
            .generate(&request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Empty));

        let err = hosted(format!("{}/garbage", base), Some("key"))
            .generate(&request())
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let router = Router::new().route(
            "/slow",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"choices": [{"message": {"content": "late"}}]}))
            }),
        );
        let base = spawn(router).await;
        let mut config = LLMConfig::for_provider(LLMProvider::OpenRouter);
        config.endpoint = format!("{}/slow", base);
        config.api_key = Some("key".into());
        config.timeout = Duration::from_millis(200);
        let client = LlmClient::new(config).unwrap();

        assert!(matches!(
            client.generate(&request()).await,
            Err(ProviderError::Timeout)
        ));
        assert!(client.respond(&request()).await.fell_back);
    }

    #[tokio::test]
    async fn test_ollama_generate_and_readiness() {
        let router = Router::new()
            .route("/api/tags", get(|| async { Json(json!({"models": []})) }))
            .route(
                "/api/generate",
                post(|Json(body): Json<serde_json::Value>| async move {
                    let stream = body["stream"].as_bool().unwrap_or(true);
                    Json(json!({"response": format!("stream={}", stream), "done": true}))
                }),
            );
        let base = spawn(router).await;
        let mut config = LLMConfig::for_provider(LLMProvider::Ollama);
        config.endpoint = base;
        let client = LlmClient::new(config).unwrap();

        assert!(client.check_ready().await);
        assert_eq!(client.generate(&request()).await.unwrap(), "stream=false");
    }

    #[tokio::test]
    async fn test_ollama_readiness_unreachable() {
        let mut config = LLMConfig::for_provider(LLMProvider::Ollama);
        config.endpoint = "http://127.0.0.1:1".into();
        let client = LlmClient::new(config).unwrap();
        assert!(!client.check_ready().await);
    }
}
