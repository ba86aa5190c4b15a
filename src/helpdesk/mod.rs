//! Departments and per-department helpdesk configuration: SLA states and
//! policies, escalation rules, ticket forms, inbound email and webhooks.

pub mod email;
pub mod error;
pub mod escalation;
pub mod escalation_worker;
pub mod forms;
pub mod handlers;
pub mod hierarchy;
pub mod sla;
pub mod storage;
pub mod types;
pub mod webhooks;

use axum::{
    routing::{delete, get, patch},
    Router,
};
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub use error::HelpdeskError;
pub use types::Priority;

pub fn configure_helpdesk_routes() -> Router<Arc<AppState>> {
    use handlers::*;

    Router::new()
        .route("/api/departments", get(list_departments).post(create_department))
        .route("/api/departments/roots", get(list_root_departments))
        .route(
            "/api/department-hierarchy",
            get(get_hierarchy).post(create_hierarchy_edge),
        )
        .route("/api/department-hierarchy/{id}", delete(delete_hierarchy_edge))
        .route("/api/helpdesks", get(list_helpdesks).post(create_helpdesk))
        .route("/api/helpdesks/{id}", patch(update_helpdesk))
        .route(
            "/api/helpdesks/{id}/sla-states",
            get(list_sla_states).post(create_sla_state),
        )
        .route(
            "/api/helpdesks/{id}/sla-policies",
            get(list_sla_policies).post(upsert_sla_policy),
        )
        .route(
            "/api/helpdesks/{id}/escalation-rules",
            get(list_escalation_rules).post(create_escalation_rule),
        )
        .route(
            "/api/helpdesks/{id}/form-categories",
            get(list_form_categories).post(create_form_category),
        )
        .route(
            "/api/helpdesks/{id}/form-fields",
            get(list_form_fields).post(create_form_field),
        )
        .route("/api/form-categories/{id}/fields", get(list_category_fields))
        .route(
            "/api/helpdesks/{id}/email-configs",
            get(list_email_configs).post(create_email_config),
        )
        .route("/api/webhooks", get(list_webhooks).post(create_webhook))
        .route("/api/webhooks/{id}", delete(delete_webhook))
}
