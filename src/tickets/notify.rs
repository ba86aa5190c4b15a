use chrono::Utc;
use log::warn;
use serde_json::json;
use std::sync::Arc;

use super::types::Ticket;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::helpdesk::webhooks::{WebhookEvent, WebhookPayload};
use crate::helpdesk::storage as helpdesk_storage;

/// Looks up the tenant's hooks and fires `event` for `ticket`. Never fails the caller.
pub async fn ticket_event(
    state: &Arc<AppState>,
    ticket: &Ticket,
    event: WebhookEvent,
    extra: serde_json::Value,
) {
    let tenant_id = ticket.tenant_id;
    let hooks = match run_db(&state.conn, move |conn| {
        helpdesk_storage::list_webhooks(conn, tenant_id)
    })
    .await
    {
        Ok(hooks) => hooks,
        Err(e) => {
            warn!("could not load webhooks for {event}: {e}");
            return;
        }
    };
    if hooks.is_empty() {
        return;
    }

    let payload = WebhookPayload {
        event,
        tenant_id,
        helpdesk_id: ticket.helpdesk_id,
        ticket_id: ticket.id,
        occurred_at: Utc::now(),
        data: json!({ "ticket": ticket, "details": extra }),
    };
    state.webhooks.dispatch(&hooks, payload);
}
