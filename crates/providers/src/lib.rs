//! Text-generation providers for Parley.
//!
//! All backends implement the `parley_core::Provider` trait. Each is bound to
//! a [`CredentialPool`] by a [`ProviderAdapter`], and the
//! [`GenerationOrchestrator`] composes the two adapters into a single
//! primary/fallback `generate` that always returns text.

pub mod adapter;
pub mod gemini;
pub mod groq;
mod http;
pub mod orchestrator;
pub mod pool;
pub mod router;

pub use adapter::{ProviderAdapter, ProviderStats};
pub use gemini::GeminiProvider;
pub use groq::GroqProvider;
pub use orchestrator::{
    GenerationOrchestrator, LastError, OrchestratorOptions, OrchestratorStats, ProviderSwitch,
};
pub use pool::CredentialPool;
pub use router::build_from_config;
