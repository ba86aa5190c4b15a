//! Tickets: creation (wizard, API, inbound email), updates with optimistic
//! versioning, comments, activity and SLA status.

pub mod activity;
pub mod error;
pub mod handlers;
pub mod inbound;
pub mod intake;
pub mod notify;
pub mod storage;
pub mod types;
pub mod wizard;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::TicketsError;
pub use types::{Ticket, TicketComment};

pub fn configure_tickets_routes() -> Router<Arc<AppState>> {
    use handlers::*;

    Router::new()
        .route("/api/tickets", get(list_tickets).post(create_ticket))
        .route("/api/tickets/{id}", get(get_ticket).patch(update_ticket))
        .route(
            "/api/tickets/{id}/comments",
            get(list_comments).post(create_comment),
        )
        .route("/api/tickets/{id}/activity", get(list_activity))
        .route("/api/tickets/{id}/sla", get(get_ticket_sla))
        .route("/api/helpdesks/{id}/inbound-email", post(inbound_email))
}
