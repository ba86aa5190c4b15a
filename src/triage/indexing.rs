//! Background embedding of tickets and pages for nearest-neighbour lookup.

use diesel::PgConnection;
use log::{debug, warn};
use std::sync::Arc;
use uuid::Uuid;

use super::error::TriageError;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::docs::storage as docs_storage;
use crate::tickets::storage as tickets_storage;
use crate::tickets::types::Ticket;

fn spawn_embedding<F>(state: &Arc<AppState>, label: String, text: String, store: F)
where
    F: FnOnce(&mut PgConnection, Vec<f32>) -> Result<(), TriageError> + Send + 'static,
{
    let Some(provider) = state.embeddings.clone() else {
        return;
    };
    if text.trim().is_empty() {
        return;
    }
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let embedding = match provider.embed(&text).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!("embedding {label} failed: {e}");
                return;
            }
        };
        match run_db(&state.conn, move |conn| store(conn, embedding)).await {
            Ok(()) => debug!("indexed {label}"),
            Err(e) => warn!("storing embedding for {label} failed: {e}"),
        }
    });
}

pub fn index_ticket(state: &Arc<AppState>, ticket: &Ticket) {
    let id = ticket.id;
    spawn_embedding(
        state,
        format!("ticket {}", ticket.ticket_number),
        ticket.embedding_text(),
        move |conn, embedding| {
            tickets_storage::set_embedding(conn, id, embedding)
                .map_err(|e| TriageError::Database(e.to_string()))
        },
    );
}

pub fn index_page(state: &Arc<AppState>, page_id: Uuid, title: &str, content: &str) {
    spawn_embedding(
        state,
        format!("page {page_id}"),
        format!("{title}\n\n{content}"),
        move |conn, embedding| {
            docs_storage::set_page_embedding(conn, page_id, embedding)
                .map_err(|e| TriageError::Database(e.to_string()))
        },
    );
}
