//! Books and pages: hierarchy, review workflow, version snapshots,
//! comments and confirmed deletes.

pub mod autosave;
pub mod delete_guard;
pub mod error;
pub mod handlers;
pub mod storage;
pub mod tree;
pub mod types;
pub mod workflow;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::DocsError;
pub use types::{Book, Page, PageKind, PageStatus};

pub fn configure_docs_routes() -> Router<Arc<AppState>> {
    use handlers::*;

    Router::new()
        .route("/api/books", get(list_books).post(create_book))
        .route("/api/books/{id}", axum::routing::delete(delete_book))
        .route("/api/books/{id}/pages", get(list_book_pages))
        .route("/api/books/{id}/delete-intent", post(book_delete_intent))
        .route("/api/pages", post(create_page))
        .route(
            "/api/pages/{id}",
            get(get_page).patch(update_page).delete(delete_page),
        )
        .route("/api/pages/{id}/submit-review", post(submit_review))
        .route("/api/pages/{id}/approve", post(approve_page))
        .route("/api/pages/{id}/status", post(change_status))
        .route("/api/pages/{id}/delete-intent", post(page_delete_intent))
        .route("/api/pages/{id}/versions", get(list_versions))
        .route(
            "/api/pages/{id}/comments",
            get(list_comments).post(create_comment),
        )
}
