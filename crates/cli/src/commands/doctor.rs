//! `medtriage doctor`: diagnose system health.

use medtriage_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 MedTriage Doctor: System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                Some(config)
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                issues += 1;
                None
            }
        }
    } else {
        println!("  ⚠️  No config file, using defaults (run `medtriage onboard`)");
        issues += 1;
        AppConfig::load().ok()
    };

    if let Some(config) = config {
        if config.has_api_key() {
            println!("  ✅ API key configured");
        } else if config.default_provider == "ollama" {
            println!("  ✅ Local provider, no API key needed");
        } else {
            println!("  ⚠️  No API key: add api_key to config.toml or export GEMINI_API_KEY");
            issues += 1;
        }

        match medtriage_triage::ReasoningEngine::from_config(&config) {
            Ok(engine) => match engine.health_check().await {
                Ok(true) => println!("  ✅ Reasoning engine reachable ({})", engine.provider_name()),
                Ok(false) => {
                    println!("  ⚠️  Reasoning engine ({}) rejected the health check", engine.provider_name());
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ Reasoning engine unreachable: {e}");
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  ❌ Reasoning engine not configured: {e}");
                issues += 1;
            }
        }

        let path = config.store.resolved_path();
        match medtriage_store::open_store(&config.store).await {
            Ok(store) => {
                let count = store.count().await?;
                println!(
                    "  ✅ Event store readable: {} ({} events)",
                    path.display(),
                    count
                );
            }
            Err(e) => {
                println!("  ❌ Event store at {} unusable: {e}", path.display());
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
