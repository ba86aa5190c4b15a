use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::docs::delete_guard::DeleteIntentRegistry;
use crate::helpdesk::webhooks::WebhookDispatcher;
use crate::triage::embedding::EmbeddingProvider;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    /// `None` when AI triage is disabled; analysis endpoints then answer 503.
    pub embeddings: Option<Arc<dyn EmbeddingProvider>>,
    pub webhooks: WebhookDispatcher,
    pub delete_intents: DeleteIntentRegistry,
}

impl AppState {
    pub fn new(
        conn: DbPool,
        config: AppConfig,
        embeddings: Option<Arc<dyn EmbeddingProvider>>,
    ) -> Self {
        let delete_intents = DeleteIntentRegistry::new(
            std::time::Duration::from_secs(config.docs.delete_countdown_seconds),
            std::time::Duration::from_secs(config.docs.delete_intent_ttl_seconds),
        );
        Self {
            conn,
            config,
            embeddings,
            webhooks: WebhookDispatcher::new(),
            delete_intents,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("embeddings", &self.embeddings.is_some())
            .finish()
    }
}
