use axum::{extract::State, Json};
use log::info;
use std::collections::HashMap;
use std::sync::Arc;

use super::embedding::to_pgvector_literal;
use super::error::TriageError;
use super::storage;
use super::suggestion::{suggest_routing, AnalyzeTicketRequest, RoutingSuggestion};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::core::tenant::TenantContext;
use crate::helpdesk::storage as helpdesk_storage;

pub async fn analyze_ticket(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<AnalyzeTicketRequest>,
) -> Result<Json<RoutingSuggestion>, TriageError> {
    let provider = state.embeddings.clone().ok_or(TriageError::Disabled)?;
    if req.description.trim().is_empty() {
        return Err(TriageError::Validation("description is required".to_string()));
    }

    let embedding = provider.embed(&req.embedding_text()).await?;
    let vector = to_pgvector_literal(&embedding);
    let neighbors_limit = state.config.ai.neighbors;
    let docs_limit = state.config.ai.related_docs;

    let (neighbors, graph, names, docs) = run_db(&state.conn, move |conn| {
        let neighbors = storage::nearest_tickets(conn, ctx.tenant_id, &vector, neighbors_limit)?;
        let graph = helpdesk_storage::load_graph(conn, ctx.tenant_id)
            .map_err(|e| TriageError::Database(e.to_string()))?;
        let names: HashMap<_, _> = helpdesk_storage::list_departments(conn, ctx.tenant_id)
            .map_err(|e| TriageError::Database(e.to_string()))?
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect();
        let docs = storage::nearest_pages(conn, ctx.tenant_id, &vector, docs_limit)?;
        Ok::<_, TriageError>((neighbors, graph, names, docs))
    })
    .await?;

    let mut suggestion = suggest_routing(&neighbors, &graph, &names);
    if !docs.is_empty() {
        suggestion.related_docs = Some(docs);
    }
    info!(
        "Routing suggestion for tenant {}: confidence {:.2} from {} neighbours",
        ctx.tenant_id,
        suggestion.confidence,
        neighbors.len()
    );
    Ok(Json(suggestion))
}
