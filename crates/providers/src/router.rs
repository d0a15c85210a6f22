//! Wiring: builds the orchestrator and its adapters from configuration.

use parley_config::AppConfig;
use parley_core::error::Result;
use parley_core::provider::{Provider, ProviderId};
use std::sync::Arc;
use tracing::info;

use crate::adapter::ProviderAdapter;
use crate::gemini::GeminiProvider;
use crate::groq::GroqProvider;
use crate::orchestrator::{GenerationOrchestrator, OrchestratorOptions};
use crate::pool::CredentialPool;

/// Create the concrete backend for `id` from its provider section.
pub fn backend_for(config: &AppConfig, id: ProviderId) -> Arc<dyn Provider> {
    let section = config.providers.get(id);

    match id {
        ProviderId::Gemini => {
            let mut p = GeminiProvider::new()
                .with_sampling(section.max_output_tokens, section.temperature);
            if let Some(model) = &section.model {
                p = p.with_model(model);
            }
            if let Some(url) = &section.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderId::Groq => {
            let mut p =
                GroqProvider::new().with_sampling(section.max_output_tokens, section.temperature);
            if let Some(model) = &section.model {
                p = p.with_model(model);
            }
            if let Some(url) = &section.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
    }
}

/// Bind `backend` to the credential pool configured for its provider.
pub fn adapter_for(config: &AppConfig, backend: Arc<dyn Provider>) -> Result<ProviderAdapter> {
    let id = backend.id();
    let pool = CredentialPool::from_secrets(id, config.providers.get(id).credentials())?;
    info!(provider = %id, keys = pool.size(), "Credential pool ready");
    Ok(ProviderAdapter::new(backend, pool).with_timeout(config.timeout()))
}

/// Build the orchestrator from configuration.
///
/// Fails fast on an empty credential pool or an unknown default provider.
pub fn build_from_config(config: &AppConfig) -> Result<GenerationOrchestrator> {
    build_with_backends(
        config,
        backend_for(config, ProviderId::Gemini),
        backend_for(config, ProviderId::Groq),
    )
}

/// Build the orchestrator around caller-supplied backends.
pub fn build_with_backends(
    config: &AppConfig,
    first: Arc<dyn Provider>,
    second: Arc<dyn Provider>,
) -> Result<GenerationOrchestrator> {
    let primary = config.default_provider()?;

    GenerationOrchestrator::new(
        adapter_for(config, first)?,
        adapter_for(config, second)?,
        primary,
        OrchestratorOptions {
            max_retries: config.generation.max_retries,
            apologies: config.generation.apologies.clone(),
        },
    )
}
