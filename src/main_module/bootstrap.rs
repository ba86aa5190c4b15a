//! Bootstrap and application initialization logic

use log::{error, info, warn};
use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{self, DbPool};
use crate::helpdesk::escalation_worker::EscalationWorker;
use crate::triage::embedding::{EmbeddingProvider, HttpEmbeddingProvider};

/// `RUST_LOG` wins over the default `info` filter.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .write_style(env_logger::WriteStyle::Always)
        .init();
}

pub fn init_database(config: &AppConfig) -> Result<DbPool, std::io::Error> {
    let pool = utils::create_conn(&config.database).map_err(|e| {
        error!("Failed to create database pool: {}", e);
        std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            format!("Database pool creation failed: {}", e),
        )
    })?;

    if config.database.run_migrations {
        info!("Running database migrations...");
        utils::run_migrations(&pool).map_err(|e| {
            error!("Failed to run migrations: {}", e);
            std::io::Error::other(format!("Migration failed: {}", e))
        })?;
        info!("Database migrations completed successfully");
    }
    Ok(pool)
}

/// `None` disables the AI endpoints; a broken provider config is not fatal.
pub fn init_embeddings(config: &AppConfig) -> Option<Arc<dyn EmbeddingProvider>> {
    if !config.ai.enabled {
        info!("AI triage disabled by configuration");
        return None;
    }
    match HttpEmbeddingProvider::new(&config.ai) {
        Ok(provider) => {
            info!(
                "Embedding provider {} ({} dims) at {}",
                config.ai.embedding_model, config.ai.dimensions, config.ai.embedding_url
            );
            Some(Arc::new(provider))
        }
        Err(e) => {
            warn!("AI triage unavailable: {}", e);
            None
        }
    }
}

pub fn create_app_state(config: AppConfig, pool: DbPool) -> Arc<AppState> {
    let embeddings = init_embeddings(&config);
    Arc::new(AppState::new(pool, config, embeddings))
}

pub fn start_background_services(app_state: Arc<AppState>) -> Option<tokio::task::JoinHandle<()>> {
    if !app_state.config.escalation.enabled {
        info!("Escalation worker disabled");
        return None;
    }
    Some(Arc::new(EscalationWorker::new(app_state)).spawn())
}
