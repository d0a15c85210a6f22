pub mod ask;
pub mod chat;
pub mod init;
pub mod status;

use parley_agent::{Persona, ReplyEngine};
use parley_config::AppConfig;
use parley_memory::ConversationMemory;
use std::sync::Arc;

/// Load and validate configuration, then wire memory, providers and
/// persona into a reply engine.
pub(crate) fn build_engine() -> Result<(AppConfig, ReplyEngine), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| {
        format!(
            "Failed to load config: {e}\n  Run `parley init` and edit {}",
            AppConfig::config_dir().join("config.toml").display()
        )
    })?;

    let orchestrator = parley_providers::build_from_config(&config)?;
    let memory = ConversationMemory::new(config.memory.max_messages)
        .with_idle_threshold(config.memory.idle_threshold());

    let engine = ReplyEngine::new(
        Arc::new(memory),
        Arc::new(orchestrator),
        Persona::from_config(&config.persona),
    );
    Ok((config, engine))
}
