//! Provider trait: the abstraction over remote text-generation backends.
//!
//! A Provider knows how to turn a conversation history plus an instruction
//! into generated text with one credential. Credential rotation, timeouts and
//! fallback live above this trait, so backends stay a thin wire mapping.
//!
//! Implementations: Gemini, Groq (OpenAI-compatible).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, ProviderError};
use crate::message::Message;

/// The two interchangeable providers a reply can come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Gemini,
    Groq,
}

impl ProviderId {
    pub const ALL: [ProviderId; 2] = [ProviderId::Gemini, ProviderId::Groq];

    /// The provider tried when this one is exhausted.
    pub fn other(self) -> Self {
        match self {
            Self::Gemini => Self::Groq,
            Self::Groq => Self::Gemini,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Groq => "groq",
        }
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            _ => Err(Error::InvalidProvider(s.to_string())),
        }
    }
}

/// One secret usable against a provider.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// What a provider is asked to continue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Chronological conversation history, replayed verbatim.
    pub history: Vec<Message>,

    /// Persona / system instruction. Always delivered, even with no history.
    pub instruction: String,
}

impl GenerationRequest {
    pub fn new(history: Vec<Message>, instruction: impl Into<String>) -> Self {
        Self {
            history,
            instruction: instruction.into(),
        }
    }
}

/// The core Provider trait.
///
/// Implementations must classify failures into the structured
/// [`ProviderError`] variants at the call site (HTTP status, vendor error
/// status), never by scanning message text later.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which provider slot this backend fills.
    fn id(&self) -> ProviderId;

    /// Generate a reply using exactly one credential.
    async fn complete(
        &self,
        credential: &Credential,
        request: &GenerationRequest,
    ) -> std::result::Result<String, ProviderError>;
}
