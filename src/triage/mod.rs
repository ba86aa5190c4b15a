//! AI-assisted ticket triage: embeddings, nearest-neighbour routing
//! suggestions and the client-side analysis session.

pub mod debounce;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod indexing;
pub mod slots;
pub mod storage;
pub mod suggestion;

use axum::{routing::post, Router};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::TriageError;
pub use suggestion::{ConfidenceTier, RoutingSuggestion};

pub fn configure_triage_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ai/analyze-ticket", post(handlers::analyze_ticket))
}
