//! `parley status`: Show configuration summary.

use parley_config::AppConfig;
use parley_core::provider::ProviderId;

fn default_model(id: ProviderId) -> &'static str {
    match id {
        ProviderId::Gemini => parley_providers::gemini::DEFAULT_MODEL,
        ProviderId::Groq => parley_providers::groq::DEFAULT_MODEL,
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");

    // Validation problems are reported below rather than aborting.
    let mut config =
        AppConfig::load_from(&config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    config.apply_env(|key| std::env::var(key).ok())?;

    println!("💬 Parley Status");
    println!("================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Primary:      {}", config.default_provider);
    for id in ProviderId::ALL {
        let section = config.providers.get(id);
        println!(
            "  {:<13} {} key(s), model {}",
            format!("{id}:"),
            section.credentials().len(),
            section.model.as_deref().unwrap_or(default_model(id))
        );
    }
    println!("  Timeout:      {} ms", config.generation.timeout_ms);
    println!("  Retries:      {}", config.generation.max_retries);
    println!("  Memory:       last {} messages", config.memory.max_messages);
    println!(
        "  Idle sweep:   every {}s, evict after {}s",
        config.memory.sweep_interval().as_secs(),
        config.memory.idle_threshold().as_secs()
    );

    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `parley init` first");
    }

    match config.validate() {
        Ok(()) => println!("  ✅ Ready to chat"),
        Err(e) => println!("  ❌ {e}"),
    }

    Ok(())
}
