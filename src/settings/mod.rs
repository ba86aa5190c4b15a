//! Administration: layered system settings, roles, users and invitations,
//! external links and announcements.

pub mod error;
pub mod handlers;
pub mod merge;
pub mod permissions;
pub mod storage;
pub mod types;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::SettingsError;

pub fn configure_settings_routes() -> Router<Arc<AppState>> {
    use handlers::*;

    Router::new()
        .route(
            "/api/system-settings",
            get(get_system_settings).patch(patch_system_settings),
        )
        .route("/api/roles", get(list_roles).post(create_role))
        .route("/api/roles/{id}", delete(delete_role))
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/invite", post(invite_user))
        .route("/api/external-links", get(list_links).post(create_link))
        .route(
            "/api/external-links/{id}",
            patch(update_link).delete(delete_link),
        )
        .route(
            "/api/announcements",
            get(list_announcements).post(create_announcement),
        )
        .route(
            "/api/announcements/{id}",
            patch(update_announcement).delete(delete_announcement),
        )
}
