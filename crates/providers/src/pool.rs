//! Credential pool: an ordered ring of secrets for one provider.
//!
//! The pool remembers which credential is in use across calls, so a key that
//! hit its quota stays skipped until rotation wraps back around to it.

use parley_core::error::{Error, Result};
use parley_core::provider::{Credential, ProviderId};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Ordered, fixed-size set of credentials with a circular cursor.
#[derive(Debug)]
pub struct CredentialPool {
    provider: ProviderId,
    credentials: Vec<Credential>,
    index: AtomicUsize,
}

impl CredentialPool {
    /// Create a pool. Fails when `credentials` is empty.
    pub fn new(provider: ProviderId, credentials: Vec<Credential>) -> Result<Self> {
        if credentials.is_empty() {
            return Err(Error::config(format!(
                "credential pool for {provider} must hold at least one key"
            )));
        }

        Ok(Self {
            provider,
            credentials,
            index: AtomicUsize::new(0),
        })
    }

    /// Convenience constructor from raw secret strings.
    pub fn from_secrets<I, S>(provider: ProviderId, secrets: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(provider, secrets.into_iter().map(Credential::new).collect())
    }

    /// The credential currently in use.
    pub fn current(&self) -> &Credential {
        &self.credentials[self.current_index()]
    }

    /// Index of the credential currently in use.
    pub fn current_index(&self) -> usize {
        self.index.load(Ordering::Acquire) % self.credentials.len()
    }

    /// Advance to the next credential (circular) and return the new index.
    pub fn rotate(&self) -> usize {
        let len = self.credentials.len();
        let previous = self
            .index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        let next = (previous + 1) % len;

        info!(
            provider = %self.provider,
            from = previous + 1,
            to = next + 1,
            total = len,
            "Credential rotated"
        );
        next
    }

    /// Number of credentials in the pool.
    pub fn size(&self) -> usize {
        self.credentials.len()
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }
}
