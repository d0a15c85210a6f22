//! Generation orchestrator: primary/fallback dispatch with bounded retry.
//!
//! Every reply is tried against the active primary provider first, retried
//! locally up to `max_retries` times, then handed to the other provider under
//! the same policy. When both are exhausted the caller gets an in-character
//! apology instead of an error: `generate` always returns text.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parley_core::error::{Error, FailureKind, GenerationFailure, GenerationResult, Result};
use parley_core::message::Message;
use parley_core::provider::ProviderId;
use rand::seq::IndexedRandom;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{error, info, warn};

use crate::adapter::{ProviderAdapter, ProviderStats};

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Extra attempts against the same provider before falling back.
    pub max_retries: u32,

    /// Replies used when every provider failed. Must not be empty.
    pub apologies: Vec<String>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        let generation = parley_config::GenerationConfig::default();
        Self {
            max_retries: generation.max_retries,
            apologies: generation.apologies,
        }
    }
}

/// The most recent provider failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastError {
    pub provider: ProviderId,
    pub kind: FailureKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of a provider switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderSwitch {
    pub previous: ProviderId,
    pub current: ProviderId,
}

/// Read-only snapshot of orchestrator state.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStats {
    pub current_provider: ProviderId,
    pub providers: Vec<ProviderStats>,
    pub fallbacks: u64,
    pub last_error: Option<LastError>,
}

impl OrchestratorStats {
    pub fn provider(&self, id: ProviderId) -> Option<&ProviderStats> {
        self.providers.iter().find(|p| p.provider == id)
    }
}

#[derive(Debug)]
struct State {
    active: ProviderId,
    fallbacks: u64,
    last_error: Option<LastError>,
}

/// Composes the Gemini and Groq adapters into one never-failing `generate`.
pub struct GenerationOrchestrator {
    gemini: ProviderAdapter,
    groq: ProviderAdapter,
    max_retries: u32,
    apologies: Vec<String>,
    state: Mutex<State>,
}

impl GenerationOrchestrator {
    /// Build from one adapter per provider (in either order).
    pub fn new(
        first: ProviderAdapter,
        second: ProviderAdapter,
        primary: ProviderId,
        options: OrchestratorOptions,
    ) -> Result<Self> {
        let (gemini, groq) = match (first.id(), second.id()) {
            (ProviderId::Gemini, ProviderId::Groq) => (first, second),
            (ProviderId::Groq, ProviderId::Gemini) => (second, first),
            (a, b) => {
                return Err(Error::config(format!(
                    "orchestrator needs one gemini and one groq adapter, got {a} and {b}"
                )));
            }
        };

        if options.apologies.is_empty() {
            return Err(Error::config("apology set must not be empty"));
        }

        Ok(Self {
            gemini,
            groq,
            max_retries: options.max_retries,
            apologies: options.apologies,
            state: Mutex::new(State {
                active: primary,
                fallbacks: 0,
                last_error: None,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn adapter(&self, id: ProviderId) -> &ProviderAdapter {
        match id {
            ProviderId::Gemini => &self.gemini,
            ProviderId::Groq => &self.groq,
        }
    }

    /// The provider tried first on the next call.
    pub fn current_provider(&self) -> ProviderId {
        self.state().active
    }

    /// Produce a reply for `history`. Never fails.
    pub async fn generate(&self, history: &[Message], instruction: &str) -> String {
        let primary = self.current_provider();
        let fallback = primary.other();

        info!(provider = %primary, "Trying primary provider");
        match self.attempt(primary, history, instruction).await {
            Ok(text) => return self.succeeded(primary, text),
            Err(failure) => {
                self.record_failure(primary, &failure);
                self.state().fallbacks += 1;
                warn!(
                    primary = %primary,
                    fallback = %fallback,
                    error = %failure,
                    "Primary provider failed, falling back"
                );
            }
        }

        match self.attempt(fallback, history, instruction).await {
            Ok(text) => self.succeeded(fallback, text),
            Err(failure) => {
                self.record_failure(fallback, &failure);
                error!(error = %failure, "Both providers failed, returning apology");
                self.apology()
            }
        }
    }

    /// One provider with bounded local retry.
    async fn attempt(
        &self,
        id: ProviderId,
        history: &[Message],
        instruction: &str,
    ) -> GenerationResult {
        let adapter = self.adapter(id);
        let mut retries = 0;

        loop {
            let result = AssertUnwindSafe(adapter.generate(history, instruction))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    Err(GenerationFailure::new(
                        FailureKind::Other,
                        format!("{id} backend panicked"),
                    ))
                });

            match result {
                Ok(text) => return Ok(text),
                Err(failure) if retries < self.max_retries => {
                    retries += 1;
                    self.record_failure(id, &failure);
                    warn!(
                        provider = %id,
                        attempt = retries,
                        max_retries = self.max_retries,
                        error = %failure,
                        "Provider failed, retrying"
                    );
                }
                Err(failure) => return Err(failure),
            }
        }
    }

    fn succeeded(&self, id: ProviderId, text: String) -> String {
        let mut state = self.state();
        if state.last_error.as_ref().is_some_and(|e| e.provider == id) {
            state.last_error = None;
        }
        text
    }

    fn record_failure(&self, id: ProviderId, failure: &GenerationFailure) {
        self.state().last_error = Some(LastError {
            provider: id,
            kind: failure.kind,
            message: failure.message.clone(),
            timestamp: Utc::now(),
        });
    }

    fn apology(&self) -> String {
        self.apologies
            .choose(&mut rand::rng())
            .cloned()
            .unwrap_or_default()
    }

    /// The configured apology replies.
    pub fn apologies(&self) -> &[String] {
        &self.apologies
    }

    /// Make `name` the primary provider.
    ///
    /// Unknown names fail with [`Error::InvalidProvider`] and change nothing.
    pub fn switch_provider(&self, name: &str) -> Result<ProviderSwitch> {
        let target: ProviderId = name.parse()?;
        let mut state = self.state();
        let previous = std::mem::replace(&mut state.active, target);
        info!(from = %previous, to = %target, "Provider switched");
        Ok(ProviderSwitch {
            previous,
            current: target,
        })
    }

    /// Snapshot of counters, credential cursors and the last error.
    pub fn stats(&self) -> OrchestratorStats {
        let state = self.state();
        OrchestratorStats {
            current_provider: state.active,
            providers: vec![self.gemini.stats(), self.groq.stats()],
            fallbacks: state.fallbacks,
            last_error: state.last_error.clone(),
        }
    }

    /// Zero all counters and clear the last error. The active provider and
    /// credential cursors are kept.
    pub fn reset_stats(&self) {
        let mut state = self.state();
        state.fallbacks = 0;
        state.last_error = None;
        self.gemini.reset_stats();
        self.groq.reset_stats();
        info!("Provider statistics reset");
    }
}
