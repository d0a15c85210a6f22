//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Provider-call failures carry a structured classification so retry and
//! rotation decisions never depend on vendor error text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Argument errors ---
    #[error("Invalid provider '{0}'. Use \"gemini\" or \"groq\".")]
    InvalidProvider(String),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// A failure reported by a single remote provider call.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Credential rejected: {0}")]
    InvalidCredential(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Classify this failure for retry and rotation decisions.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::RateLimited(_) => FailureKind::RateLimited,
            Self::InvalidCredential(_) => FailureKind::InvalidCredential,
            Self::ApiError { .. } | Self::Network(_) | Self::MalformedResponse(_) => {
                FailureKind::Other
            }
        }
    }
}

/// Classification of a failed generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    InvalidCredential,
    Other,
    /// Every credential in the pool was tried without success.
    CredentialsExhausted,
}

impl FailureKind {
    /// Whether another credential from the same pool is worth trying.
    pub fn retryable_within_pool(self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::RateLimited | Self::InvalidCredential
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::RateLimited => "rate_limited",
            Self::InvalidCredential => "invalid_credential",
            Self::Other => "other",
            Self::CredentialsExhausted => "credentials_exhausted",
        };
        f.write_str(s)
    }
}

/// The failure half of a generation result.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl GenerationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn retryable_within_pool(&self) -> bool {
        self.kind.retryable_within_pool()
    }
}

impl From<ProviderError> for GenerationFailure {
    fn from(err: ProviderError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Outcome of one adapter-level generation.
pub type GenerationResult = std::result::Result<String, GenerationFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 500,
            message: "Internal Server Error".into(),
        });
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("Internal Server Error"));
    }

    #[test]
    fn classification_of_provider_errors() {
        assert_eq!(
            ProviderError::Timeout("15s".into()).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            ProviderError::RateLimited("quota".into()).kind(),
            FailureKind::RateLimited
        );
        assert_eq!(
            ProviderError::InvalidCredential("bad key".into()).kind(),
            FailureKind::InvalidCredential
        );
        assert_eq!(
            ProviderError::Network("conn refused".into()).kind(),
            FailureKind::Other
        );
        assert_eq!(
            ProviderError::ApiError {
                status_code: 500,
                message: "boom".into()
            }
            .kind(),
            FailureKind::Other
        );
    }

    #[test]
    fn only_transient_kinds_rotate() {
        assert!(FailureKind::Timeout.retryable_within_pool());
        assert!(FailureKind::RateLimited.retryable_within_pool());
        assert!(FailureKind::InvalidCredential.retryable_within_pool());
        assert!(!FailureKind::Other.retryable_within_pool());
        assert!(!FailureKind::CredentialsExhausted.retryable_within_pool());
    }

    #[test]
    fn invalid_provider_names_the_choices() {
        let err = Error::InvalidProvider("bogus".into());
        let text = err.to_string();
        assert!(text.contains("bogus"));
        assert!(text.contains("gemini"));
        assert!(text.contains("groq"));
    }

    #[test]
    fn generation_failure_from_provider_error() {
        let failure: GenerationFailure = ProviderError::RateLimited("429".into()).into();
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert!(failure.retryable_within_pool());
        assert!(failure.to_string().starts_with("rate_limited"));
    }
}
