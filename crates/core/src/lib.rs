//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley reply engine.
//! This crate has **no runtime or HTTP dependencies**; it defines the domain
//! model the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is defined here. Implementations live in their respective
//! crates, which keeps the dependency graph pointing inward and lets tests
//! swap in scripted providers.

pub mod error;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, FailureKind, GenerationFailure, GenerationResult, ProviderError, Result};
pub use message::{ConversationId, Message, Role};
pub use provider::{Credential, GenerationRequest, Provider, ProviderId};
