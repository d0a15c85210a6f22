//! Google Gemini provider implementation.
//!
//! Uses the native `generateContent` API:
//! - `x-goog-api-key` header authentication (not Bearer)
//! - Instruction as the top-level `systemInstruction`
//! - History as `contents` with `user` / `model` roles
//!
//! Failures are classified from the HTTP status and the structured
//! `error.status` / `error.details[].reason` fields of the error body.

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::message::{Message, Role};
use parley_core::provider::{Credential, GenerationRequest, Provider, ProviderId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 500;
const DEFAULT_TEMPERATURE: f32 = 0.85;

/// Gemini `generateContent` backend.
pub struct GeminiProvider {
    base_url: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
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

    pub fn with_sampling(mut self, max_output_tokens: u32, temperature: f32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self.temperature = temperature;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    /// Build the request body.
    ///
    /// An empty history still carries the instruction: it is sent as the only
    /// user turn, since Gemini rejects empty `contents`.
    fn to_api_request(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let mut contents: Vec<Content> = request.history.iter().map(Content::from_message).collect();

        if contents.is_empty() {
            contents.push(Content::text(Some("user"), &request.instruction));
        }

        GenerateContentRequest {
            contents,
            system_instruction: Some(Content::text(None, &request.instruction)),
            generation_config: GenerationConfig {
                max_output_tokens: self.max_output_tokens,
                temperature: self.temperature,
            },
        }
    }
}

impl Default for GeminiProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Classify a non-success response.
fn classify_error(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error);

    let message = detail
        .as_ref()
        .map(|d| d.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());
    let rpc_status = detail.as_ref().map(|d| d.status.as_str()).unwrap_or("");
    let key_invalid = detail
        .as_ref()
        .is_some_and(|d| d.details.iter().any(|x| x.reason == "API_KEY_INVALID"));

    if status == 429 || rpc_status == "RESOURCE_EXHAUSTED" {
        return ProviderError::RateLimited(message);
    }

    if status == 401
        || status == 403
        || key_invalid
        || rpc_status == "UNAUTHENTICATED"
        || rpc_status == "PERMISSION_DENIED"
    {
        return ProviderError::InvalidCredential(message);
    }

    ProviderError::ApiError {
        status_code: status,
        message,
    }
}

/// Pull the reply text out of a successful response.
fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".into());
        ProviderError::MalformedResponse(format!("empty Gemini response: {reason}"))
    })?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::MalformedResponse(format!(
            "Gemini returned no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(text)
}

#[async_trait]
impl Provider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    async fn complete(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<String, ProviderError> {
        let body = self.to_api_request(request);

        debug!(model = %self.model, turns = body.contents.len(), "Sending Gemini request");

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(http::transport_error)?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let err = classify_error(status, &error_body);
            warn!(status, error = %err, "Gemini returned error");
            return Err(err);
        }

        let api_response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {e}")))?;

        let text = extract_text(api_response)?;
        debug!(chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

// --- Gemini API types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(String::from),
            parts: vec![Part { text: text.into() }],
        }
    }

    fn from_message(msg: &Message) -> Self {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        Self::text(Some(role), &msg.content)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ErrorInfo>,
}

#[derive(Debug, Deserialize)]
struct ErrorInfo {
    #[serde(default)]
    reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::error::FailureKind;

    fn body_json(provider: &GeminiProvider, request: &GenerationRequest) -> serde_json::Value {
        serde_json::to_value(provider.to_api_request(request)).unwrap()
    }

    #[test]
    fn endpoint_includes_model() {
        let p = GeminiProvider::new()
            .with_base_url("http://localhost:9000/v1beta/")
            .with_model("gemini-2.0-flash");
        assert_eq!(
            p.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn history_maps_roles_in_order() {
        let request = GenerationRequest::new(
            vec![
                Message::user("hi"),
                Message::assistant("hello!"),
                Message::user("how are you?"),
            ],
            "be kind",
        );
        let json = body_json(&GeminiProvider::new(), &request);

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[1]["parts"][0]["text"], "hello!");
        assert_eq!(contents[2]["parts"][0]["text"], "how are you?");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "be kind");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 500);
    }

    #[test]
    fn empty_history_still_sends_instruction() {
        let request = GenerationRequest::new(vec![], "introduce yourself");
        let json = body_json(&GeminiProvider::new(), &request);

        let contents = json["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "introduce yourself");
    }

    #[test]
    fn classifies_quota_errors() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = classify_error(429, body);
        assert_eq!(err.kind(), FailureKind::RateLimited);
        assert!(err.to_string().contains("Quota exceeded"));
    }

    #[test]
    fn classifies_invalid_key_reported_as_400() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"@type":"type.googleapis.com/google.rpc.ErrorInfo","reason":"API_KEY_INVALID","domain":"googleapis.com"}]}}"#;
        assert_eq!(classify_error(400, body).kind(), FailureKind::InvalidCredential);
    }

    #[test]
    fn plain_bad_request_is_other() {
        let body = r#"{"error":{"code":400,"message":"Invalid JSON payload","status":"INVALID_ARGUMENT"}}"#;
        let err = classify_error(400, body);
        assert_eq!(err.kind(), FailureKind::Other);
        assert!(matches!(err, ProviderError::ApiError { status_code: 400, .. }));
    }

    #[test]
    fn unparseable_error_body_falls_back_to_status() {
        assert_eq!(classify_error(403, "forbidden").kind(), FailureKind::InvalidCredential);
        assert_eq!(classify_error(503, "<html>").kind(), FailureKind::Other);
    }

    #[test]
    fn extracts_concatenated_parts() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"},{"text":" world"}]},"finishReason":"STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(response).unwrap(), "Hello world");
    }

    #[test]
    fn blocked_prompt_is_other() {
        let json = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let err = extract_text(response).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Other);
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn blank_candidate_is_other() {
        let json = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let err = extract_text(response).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }
}
