//! Groq provider implementation.
//!
//! Groq exposes an OpenAI-compatible `/chat/completions` endpoint, so this
//! backend also works against any other OpenAI-compatible server via
//! [`GroqProvider::with_base_url`].
//!
//! The instruction is sent as a leading `system` message followed by the
//! history in order.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::message::Message;
use parley_core::provider::{Credential, GenerationRequest, Provider, ProviderId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
const DEFAULT_MAX_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f32 = 0.85;

/// An OpenAI-compatible chat completions backend, defaulting to Groq.
pub struct GroqProvider {
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl GroqProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            client: http::client(),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = http::trim_base_url(base_url);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Convert the request into OpenAI chat messages.
    fn to_api_messages(request: &GenerationRequest) -> Vec<ApiMessage> {
        std::iter::once(ApiMessage {
            role: "system".into(),
            content: request.instruction.clone(),
        })
        .chain(request.history.iter().map(|m: &Message| ApiMessage {
            role: m.role.as_str().into(),
            content: m.content.clone(),
        }))
        .collect()
    }

    fn to_api_request(&self, request: &GenerationRequest) -> ApiRequest {
        ApiRequest {
            model: self.model.clone(),
            messages: Self::to_api_messages(request),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        }
    }
}

impl Default for GroqProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a non-success response from the HTTP status.
fn classify_error(status: u16, body: &str) -> ProviderError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    match status {
        429 => ProviderError::RateLimited(message),
        401 | 403 => ProviderError::InvalidCredential(message),
        _ => ProviderError::ApiError {
            status_code: status,
            message,
        },
    }
}

fn extract_text(response: ApiResponse) -> Result<String, ProviderError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

    let text = choice.message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse(format!(
            "completion had no text (finish reason: {})",
            choice.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

#[async_trait]
impl Provider for GroqProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Groq
    }

    async fn complete(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.to_api_request(request);

        debug!(model = %self.model, messages = body.messages.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(http::transport_error)?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let err = classify_error(status, &error_body);
            warn!(status, error = %err, "Groq returned error");
            return Err(err);
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let text = extract_text(api_response)?;
        debug!(chars = text.len(), "Groq response received");
        Ok(text)
    }
}

// --- OpenAI-compatible API types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::FailureKind;

    #[test]
    fn system_message_leads_history() {
        let request = GenerationRequest::new(
            vec![Message::user("hi"), Message::assistant("hello")],
            "persona",
        );
        let messages = GroqProvider::to_api_messages(&request);

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "persona");
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[2].role, "assistant");
        assert_eq!(messages[2].content, "hello");
    }

    #[test]
    fn empty_history_sends_only_instruction() {
        let request = GenerationRequest::new(vec![], "persona");
        let messages = GroqProvider::to_api_messages(&request);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "system");
    }

    #[test]
    fn request_body_shape() {
        let provider = GroqProvider::new().with_model("llama-3.1-8b-instant").with_sampling(256, 0.5);
        let json = serde_json::to_value(provider.to_api_request(&GenerationRequest::default())).unwrap();
        assert_eq!(json["model"], "llama-3.1-8b-instant");
        assert_eq!(json["max_tokens"], 256);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn classifies_by_status() {
        let rate = r#"{"error":{"message":"Rate limit reached for model","type":"tokens","code":"rate_limit_exceeded"}}"#;
        let err = classify_error(429, rate);
        assert_eq!(err.kind(), FailureKind::RateLimited);
        assert!(err.to_string().contains("Rate limit reached"));

        let key = r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error","code":"invalid_api_key"}}"#;
        assert_eq!(classify_error(401, key).kind(), FailureKind::InvalidCredential);

        assert_eq!(classify_error(500, "oops").kind(), FailureKind::Other);
        assert_eq!(classify_error(400, "bad").kind(), FailureKind::Other);
    }

    #[test]
    fn extracts_first_choice() {
        let json = r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Hey!"},"finish_reason":"stop"}]}"#;
        let response: ApiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(response).unwrap(), "Hey!");
    }

    #[test]
    fn missing_choices_is_other() {
        let response: ApiResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(extract_text(response).unwrap_err().kind(), FailureKind::Other);
    }

    #[test]
    fn blank_content_is_other() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"  "},"finish_reason":"length"}]}"#;
        let response: ApiResponse = serde_json::from_str(json).unwrap();
        let err = extract_text(response).unwrap_err();
        assert!(err.to_string().contains("length"));
    }
}
