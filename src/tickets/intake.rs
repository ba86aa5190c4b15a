//! Ticket creation, updates and comments with the helpdesk rules applied.
//!
//! Everything here runs on a pooled connection inside `run_db`; the callers
//! take care of webhooks and indexing once the rows are stored.

use chrono::{DateTime, Utc};
use diesel::{Connection, PgConnection};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::activity::{self, ActivityKind};
use super::error::TicketsError;
use super::storage::{self, TicketChanges};
use super::types::*;
use crate::helpdesk::forms::{normalize_values, validate_submission, values_to_json};
use crate::helpdesk::sla::{self, SlaEvaluation};
use crate::helpdesk::storage as helpdesk_storage;

#[derive(Debug, Clone, Default)]
pub struct TicketOrigin {
    pub source: TicketSource,
    pub email_message_id: Option<String>,
}

impl TicketOrigin {
    pub fn email(message_id: String) -> Self {
        Self {
            source: TicketSource::Email,
            email_message_id: Some(message_id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSla {
    pub ticket_id: Uuid,
    pub state_id: Option<Uuid>,
    pub in_final_state: bool,
    /// `None` when the helpdesk has no policy for the ticket's priority.
    pub evaluation: Option<SlaEvaluation>,
}

/// New `resolved_at` when the ticket moves into a state, if it changes.
pub fn resolution_change(
    resolved_at: Option<DateTime<Utc>>,
    entering_final: bool,
    now: DateTime<Utc>,
) -> Option<Option<DateTime<Utc>>> {
    match (entering_final, resolved_at) {
        (true, None) => Some(Some(now)),
        (false, Some(_)) => Some(None),
        _ => None,
    }
}

fn required_title(raw: &str) -> Result<String, TicketsError> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(TicketsError::Validation("title is required".to_string()));
    }
    Ok(title.to_string())
}

pub fn open_ticket(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    actor: Option<Uuid>,
    req: CreateTicketRequest,
    origin: TicketOrigin,
) -> Result<Ticket, TicketsError> {
    let title = required_title(&req.title)?;
    let helpdesk = helpdesk_storage::get_helpdesk(conn, tenant_id, req.helpdesk_id)?;
    if !helpdesk.enabled {
        return Err(TicketsError::Validation(format!(
            "helpdesk '{}' is not accepting tickets",
            helpdesk.name
        )));
    }

    if let Some(category_id) = req.form_category_id {
        let category = helpdesk_storage::get_category(conn, helpdesk.id, category_id)?;
        if !category.enabled {
            return Err(TicketsError::Validation(format!(
                "form category '{}' is disabled",
                category.name
            )));
        }
    }

    // mailed-in tickets cannot fill the form; agents complete it later
    let custom_fields = if origin.source == TicketSource::Email {
        json!({})
    } else {
        let fields = helpdesk_storage::list_fields(conn, helpdesk.id)?;
        let values =
            validate_submission(&fields, req.form_category_id, &normalize_values(&req.custom_fields))
                .map_err(TicketsError::InvalidFields)?;
        values_to_json(&values)
    };

    let states = helpdesk_storage::list_states(conn, helpdesk.id)?;
    let state_id = sla::initial_state(&states).map(|s| s.id);

    let department_id = match req.department_id {
        Some(id) => helpdesk_storage::get_department(conn, tenant_id, id)?.id,
        None => helpdesk.department_id,
    };

    let now = Utc::now();
    let ticket = Ticket {
        id: Uuid::new_v4(),
        tenant_id,
        helpdesk_id: helpdesk.id,
        department_id,
        form_category_id: req.form_category_id,
        ticket_number: String::new(),
        title,
        description: req.description.filter(|d| !d.trim().is_empty()),
        priority: req.priority.as_str().to_string(),
        ticket_type: req.ticket_type.as_str().to_string(),
        source: origin.source.as_str().to_string(),
        state_id,
        assignee_id: req.assignee_id,
        created_by: actor,
        custom_fields,
        email_message_id: origin.email_message_id,
        first_response_at: None,
        resolved_at: None,
        version: 1,
        embedding: None,
        created_at: now,
        updated_at: now,
    };

    conn.transaction::<_, TicketsError, _>(|conn| {
        let saved = storage::insert_ticket(conn, ticket)?;
        storage::insert_activity(
            conn,
            &activity::entry(
                saved.id,
                actor,
                ActivityKind::Created,
                json!({ "source": saved.source, "ticketNumber": saved.ticket_number }),
            ),
        )?;
        Ok(saved)
    })
}

/// Applies a PATCH. Returns the ticket before and after the change.
pub fn apply_update(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    actor: Option<Uuid>,
    req: UpdateTicketRequest,
) -> Result<(Ticket, Ticket), TicketsError> {
    let before = storage::get_ticket(conn, tenant_id, id)?;
    if before.version != req.version {
        return Err(TicketsError::Conflict(format!(
            "ticket {} is at version {}, not {}",
            before.ticket_number, before.version, req.version
        )));
    }

    let now = Utc::now();
    let mut changes = TicketChanges {
        version: req.version + 1,
        updated_at: now,
        ..TicketChanges::default()
    };
    if let Some(title) = &req.title {
        changes.title = Some(required_title(title)?);
    }
    if let Some(description) = &req.description {
        let trimmed = description.trim();
        changes.description = Some((!trimmed.is_empty()).then(|| description.clone()));
    }
    changes.priority = req.priority.map(|p| p.as_str().to_string());
    changes.ticket_type = req.ticket_type.map(|t| t.as_str().to_string());
    changes.assignee_id = req.assignee_id;

    if let Some(state_id) = req.state_id {
        let state = helpdesk_storage::get_state(conn, before.helpdesk_id, state_id)?;
        changes.state_id = Some(state.id);
        changes.resolved_at = resolution_change(before.resolved_at, state.is_final, now);
    }
    if let Some(department_id) = req.department_id {
        changes.department_id = Some(helpdesk_storage::get_department(conn, tenant_id, department_id)?.id);
    }

    let detail = activity::diff(&before, &req);
    let after = conn.transaction::<_, TicketsError, _>(|conn| {
        let after = storage::update_ticket(conn, tenant_id, id, req.version, changes)?;
        if detail.as_object().is_some_and(|d| !d.is_empty()) {
            storage::insert_activity(conn, &activity::entry(id, actor, ActivityKind::Updated, detail))?;
        }
        Ok(after)
    })?;
    Ok((before, after))
}

pub fn add_comment(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    ticket_id: Uuid,
    actor: Option<Uuid>,
    req: CreateCommentRequest,
) -> Result<(Ticket, TicketComment), TicketsError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(TicketsError::Validation("comment content is required".to_string()));
    }
    let ticket = storage::get_ticket(conn, tenant_id, ticket_id)?;
    let comment = TicketComment {
        id: Uuid::new_v4(),
        ticket_id,
        author_id: actor,
        author_name: req.author_name.filter(|n| !n.trim().is_empty()),
        content: content.to_string(),
        is_internal: req.is_internal,
        source: TicketSource::Web.as_str().to_string(),
        email_message_id: None,
        created_at: Utc::now(),
    };
    let saved = conn.transaction::<_, TicketsError, _>(|conn| {
        let saved = storage::insert_comment(conn, &ticket, &comment)?;
        storage::insert_activity(
            conn,
            &activity::entry(
                ticket_id,
                actor,
                ActivityKind::Commented,
                json!({ "commentId": saved.id, "internal": saved.is_internal }),
            ),
        )?;
        Ok(saved)
    })?;
    Ok((ticket, saved))
}

pub fn sla_status(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    ticket_id: Uuid,
) -> Result<TicketSla, TicketsError> {
    let ticket = storage::get_ticket(conn, tenant_id, ticket_id)?;
    let states = helpdesk_storage::list_states(conn, ticket.helpdesk_id)?;
    let policies = helpdesk_storage::list_policies(conn, ticket.helpdesk_id)?;

    let in_final_state = ticket
        .state_id
        .and_then(|id| states.iter().find(|s| s.id == id))
        .is_some_and(|s| s.is_final);
    let evaluation = sla::policy_for(&policies, ticket.priority())
        .map(|policy| sla::evaluate(policy, &ticket.sla_clock(in_final_state), Utc::now()));

    Ok(TicketSla {
        ticket_id,
        state_id: ticket.state_id,
        in_final_state,
        evaluation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_change() {
        let now = Utc::now();
        assert_eq!(resolution_change(None, true, now), Some(Some(now)));
        assert_eq!(resolution_change(Some(now), true, now), None);
        assert_eq!(resolution_change(Some(now), false, now), Some(None));
        assert_eq!(resolution_change(None, false, now), None);
    }

    #[test]
    fn test_title_is_trimmed_and_required() {
        assert_eq!(required_title("  Printer jam ").unwrap(), "Printer jam");
        assert!(matches!(required_title("   "), Err(TicketsError::Validation(_))));
    }

    #[test]
    fn test_email_origin() {
        let origin = TicketOrigin::email("abc@mail".to_string());
        assert_eq!(origin.source, TicketSource::Email);
        assert_eq!(origin.email_message_id.as_deref(), Some("abc@mail"));
        assert_eq!(TicketOrigin::default().source, TicketSource::Web);
    }
}
