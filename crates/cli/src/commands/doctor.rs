//! `mercy doctor`: diagnose config, Ollama, and Telegram setup.

use mercy_config::AppConfig;
use mercy_core::provider::Provider;
use mercy_providers::OllamaProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Mercy Doctor: System Diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults. Run `mercy onboard` to create one");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the config file before running further checks.");
            return Ok(());
        }
    };

    let db_path = config.storage.database_path();
    match db_path.parent() {
        Some(dir) if dir.exists() => println!("  ✅ Data directory exists: {}", dir.display()),
        _ => println!("  ⚠️  Data directory missing (created on first run)"),
    }

    match OllamaProvider::from_config(&config.ollama) {
        Ok(provider) => match provider.list_models().await {
            Ok(models) => {
                println!("  ✅ Ollama reachable at {}", config.ollama.url);
                let wanted = &config.ollama.model;
                if models.iter().any(|m| m == wanted || m.starts_with(&format!("{wanted}:"))) {
                    println!("  ✅ Model '{wanted}' is installed");
                } else {
                    println!("  ❌ Model '{wanted}' not found. Try: ollama pull {wanted}");
                    issues += 1;
                }
            }
            Err(e) => {
                println!("  ❌ Ollama not reachable at {}: {e}", config.ollama.url);
                println!("     Try: ollama serve");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Could not build Ollama client: {e}");
            issues += 1;
        }
    }

    if config.has_telegram_token() {
        println!("  ✅ Telegram token configured");
    } else {
        println!("  ⚠️  No Telegram token. Set TELEGRAM_TOKEN to use `mercy run`");
        issues += 1;
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
