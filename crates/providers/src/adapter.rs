//! Provider adapter: drives one backend across its credential pool.
//!
//! Each attempt uses the pool's current credential under a hard timeout.
//! Timeouts, rate limits and rejected credentials rotate to the next key;
//! anything else stops on the current key. Every credential is tried at most
//! once per `generate` call.

use parley_core::error::{FailureKind, GenerationFailure, GenerationResult, ProviderError};
use parley_core::message::Message;
use parley_core::provider::{GenerationRequest, Provider, ProviderId};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use crate::pool::CredentialPool;

/// Default hard bound on one remote call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// One provider backend bound to its credential pool.
pub struct ProviderAdapter {
    backend: Arc<dyn Provider>,
    pool: CredentialPool,
    timeout: Duration,
    success_count: AtomicU64,
    error_count: AtomicU64,
}

/// Read-only view of a provider's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStats {
    pub provider: ProviderId,
    pub credential_index: usize,
    pub credential_count: usize,
    pub success_count: u64,
    pub error_count: u64,
}

impl ProviderAdapter {
    /// Bind `backend` to `pool` with the default timeout.
    pub fn new(backend: Arc<dyn Provider>, pool: CredentialPool) -> Self {
        Self {
            backend,
            pool,
            timeout: DEFAULT_TIMEOUT,
            success_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
        }
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> ProviderId {
        self.backend.id()
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    /// Generate a reply, rotating through credentials on transient failures.
    pub async fn generate(&self, history: &[Message], instruction: &str) -> GenerationResult {
        let provider = self.id();
        let request = GenerationRequest::new(history.to_vec(), instruction);
        let total = self.pool.size();
        let mut tried = 0;

        loop {
            let key_number = self.pool.current_index() + 1;
            let outcome = self.call_once(&request).await;
            tried += 1;

            let err = match outcome {
                Ok(text) => {
                    self.success_count.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        provider = %provider,
                        key = key_number,
                        chars = text.len(),
                        "Response received"
                    );
                    return Ok(text);
                }
                Err(err) => err,
            };

            self.error_count.fetch_add(1, Ordering::Relaxed);
            let kind = err.kind();
            warn!(
                provider = %provider,
                key = key_number,
                kind = %kind,
                error = %err,
                "Credential attempt failed"
            );

            if !kind.retryable_within_pool() {
                return Err(err.into());
            }

            if tried >= total {
                return Err(GenerationFailure::new(
                    FailureKind::CredentialsExhausted,
                    format!("all {total} {provider} credential(s) exhausted; last error: {err}"),
                ));
            }

            self.pool.rotate();
        }
    }

    async fn call_once(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        let credential = self.pool.current();
        match tokio::time::timeout(self.timeout, self.backend.complete(credential, request)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "{} did not answer within {}ms",
                self.id(),
                self.timeout.as_millis()
            ))),
        }
    }

    /// Snapshot of this provider's counters and credential cursor.
    pub fn stats(&self) -> ProviderStats {
        ProviderStats {
            provider: self.id(),
            credential_index: self.pool.current_index(),
            credential_count: self.pool.size(),
            success_count: self.success_count.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
        }
    }

    /// Zero the success and error counters. The credential cursor is kept.
    pub fn reset_stats(&self) {
        self.success_count.store(0, Ordering::Relaxed);
        self.error_count.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted backends shared by the adapter and orchestrator tests.

    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What a scripted backend does for one call.
    #[derive(Clone)]
    pub enum Step {
        Reply(&'static str),
        Fail(ProviderError),
        Hang,
        Panic,
    }

    /// A backend that plays back `Step`s in order and records which
    /// credential each call used. Once the script runs out it repeats
    /// `fallback`.
    pub struct ScriptedProvider {
        id: ProviderId,
        script: Mutex<VecDeque<Step>>,
        fallback: Step,
        seen: Mutex<Vec<String>>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(id: ProviderId, script: Vec<Step>, fallback: Step) -> Self {
            Self {
                id,
                script: Mutex::new(script.into()),
                fallback,
                seen: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn always(id: ProviderId, step: Step) -> Self {
            Self::new(id, vec![], step)
        }

        pub fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        pub fn credentials_seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }

        pub fn last_request(&self) -> Option<GenerationRequest> {
            self.requests.lock().unwrap().last().cloned()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn complete(
            &self,
            credential: &parley_core::provider::Credential,
            request: &GenerationRequest,
        ) -> Result<String, ProviderError> {
            self.seen
                .lock()
                .unwrap()
                .push(credential.expose().to_string());
            self.requests.lock().unwrap().push(request.clone());
            let step = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());
            match step {
                Step::Reply(text) => Ok(text.to_string()),
                Step::Fail(err) => Err(err),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
                Step::Panic => panic!("scripted backend panic"),
            }
        }
    }

    pub fn rate_limited() -> Step {
        Step::Fail(ProviderError::RateLimited("429".into()))
    }

    pub fn bad_key() -> Step {
        Step::Fail(ProviderError::InvalidCredential("401".into()))
    }

    pub fn server_error() -> Step {
        Step::Fail(ProviderError::ApiError {
            status_code: 500,
            message: "Internal Server Error".into(),
        })
    }

    pub fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key-{i}")).collect()
    }

    pub fn adapter(backend: Arc<ScriptedProvider>, n_keys: usize) -> ProviderAdapter {
        let id = backend.id();
        ProviderAdapter::new(
            backend,
            CredentialPool::from_secrets(id, keys(n_keys)).unwrap(),
        )
    }
}
