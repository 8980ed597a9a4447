pub mod chat;
pub mod doctor;
pub mod onboard;
pub mod run;

use mercy_agent::{CommandRouter, Companion, ConversationStore};
use mercy_config::AppConfig;
use mercy_memory::SqliteStore;
use mercy_providers::OllamaProvider;
use std::sync::Arc;

/// Load config and wire store, provider, and companion into a router.
pub async fn build_router() -> Result<(AppConfig, Arc<CommandRouter>), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let db_path = config.storage.database_path();
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .await
            .map_err(|e| format!("Failed to open database at {}: {e}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), "Record store ready");

    let provider = Arc::new(
        OllamaProvider::from_config(&config.ollama)
            .map_err(|e| format!("Failed to build Ollama client: {e}"))?,
    );
    let conversations = Arc::new(ConversationStore::new(config.conversation.max_turns));
    let companion = Arc::new(Companion::from_config(
        &config,
        provider,
        store.clone(),
        conversations,
    ));

    Ok((config, Arc::new(CommandRouter::new(store, companion))))
}
