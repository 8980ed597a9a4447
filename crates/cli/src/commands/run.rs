//! `mercy run`: serve Telegram users until Ctrl+C.

use mercy_channels::{TelegramChannel, TelegramConfig};
use mercy_config::AppConfig;
use mercy_core::channel::Channel;
use std::sync::Arc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (config, router) = super::build_router().await?;

    let Some(telegram) = TelegramConfig::from_settings(&config.telegram) else {
        eprintln!();
        eprintln!("  ERROR: No Telegram bot token configured!");
        eprintln!();
        eprintln!("  Set the environment variable:");
        eprintln!("    export TELEGRAM_TOKEN='123456:ABC...'");
        eprintln!();
        eprintln!("  Or add it to your config file under [telegram]:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        eprintln!("  Get a token from @BotFather on Telegram.");
        eprintln!();
        return Err("No Telegram token found. See above for setup instructions.".into());
    };

    let channel: Arc<dyn Channel> = Arc::new(
        TelegramChannel::new(telegram).map_err(|e| format!("Failed to set up Telegram: {e}"))?,
    );

    println!("💜 {} is awake", config.bot.name);
    println!("   Model:  {}", config.ollama.model);
    println!("   Ollama: {}", config.ollama.url);
    println!("   Press Ctrl+C to stop.\n");

    tokio::select! {
        result = mercy_agent::serve(channel.clone(), router) => {
            result.map_err(|e| format!("Telegram stopped: {e}"))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    if let Err(e) = channel.stop().await {
        tracing::warn!(error = %e, "Channel did not stop cleanly");
    }
    println!("\n  Goodbye! 👋");

    Ok(())
}
