//! Turns a parsed inbound email into a ticket comment or a new ticket.

use chrono::Utc;
use diesel::PgConnection;
use log::info;
use serde_json::json;
use uuid::Uuid;

use super::activity::{self, ActivityKind};
use super::error::TicketsError;
use super::intake::{open_ticket, TicketOrigin};
use super::storage;
use super::types::*;
use crate::helpdesk::email::{strip_quoted_reply, InboundEmail, InboundOutcome};
use crate::helpdesk::storage as helpdesk_storage;

/// Finds the ticket an email replies to: by message ids first, then by the
/// subject tag. Tickets of other helpdesks in the tenant still match.
fn thread_target(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    email: &InboundEmail,
) -> Result<Option<Ticket>, TicketsError> {
    let candidates = email.thread_candidates();
    if let Some(ticket) = storage::find_by_message_ids(conn, tenant_id, &candidates)? {
        return Ok(Some(ticket));
    }
    match email.ticket_tag() {
        Some(number) => storage::find_by_number(conn, tenant_id, &number),
        None => Ok(None),
    }
}

pub fn receive_email(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    helpdesk_id: Uuid,
    email: InboundEmail,
) -> Result<(InboundOutcome, Ticket), TicketsError> {
    let helpdesk = helpdesk_storage::get_helpdesk(conn, tenant_id, helpdesk_id)?;
    let config = helpdesk_storage::find_email_config(conn, helpdesk.id, &email.to)?
        .filter(|c| c.enabled)
        .ok_or_else(|| {
            TicketsError::Validation(format!(
                "{} is not an enabled inbound address of helpdesk '{}'",
                email.to, helpdesk.name
            ))
        })?;

    let message_id = email.normalized_message_id();
    if message_id.is_empty() {
        return Err(TicketsError::Validation("message id is required".to_string()));
    }

    if let Some(ticket) = thread_target(conn, tenant_id, &email)? {
        let reply = strip_quoted_reply(&email.body);
        let content = if reply.is_empty() {
            email.body.trim().to_string()
        } else {
            reply
        };
        let comment = TicketComment {
            id: Uuid::new_v4(),
            ticket_id: ticket.id,
            author_id: None,
            author_name: Some(email.author_label()),
            content,
            is_internal: false,
            source: TicketSource::Email.as_str().to_string(),
            email_message_id: Some(message_id.clone()),
            created_at: Utc::now(),
        };
        let saved = storage::insert_comment(conn, &ticket, &comment)?;
        storage::insert_activity(
            conn,
            &activity::entry(
                ticket.id,
                None,
                ActivityKind::EmailReceived,
                json!({ "messageId": message_id, "from": email.from_address, "commentId": saved.id }),
            ),
        )?;
        info!("Threaded email {message_id} onto {}", ticket.ticket_number);
        return Ok((
            InboundOutcome::Commented {
                ticket_id: ticket.id,
                comment_id: saved.id,
            },
            ticket,
        ));
    }

    let req = CreateTicketRequest {
        helpdesk_id: helpdesk.id,
        title: email.ticket_title(),
        description: Some(email.body.trim().to_string()),
        ..CreateTicketRequest::default()
    };
    let ticket = open_ticket(conn, tenant_id, None, req, TicketOrigin::email(message_id.clone()))?;
    storage::insert_activity(
        conn,
        &activity::entry(
            ticket.id,
            None,
            ActivityKind::EmailReceived,
            json!({
                "messageId": message_id,
                "from": email.from_address,
                "fromName": email.from_name,
                "address": config.address,
                "autoReply": config.auto_reply,
            }),
        ),
    )?;
    info!(
        "Opened {} from email {message_id} on helpdesk {}",
        ticket.ticket_number, helpdesk.id
    );
    Ok((
        InboundOutcome::Created {
            ticket_id: ticket.id,
            ticket_number: ticket.ticket_number.clone(),
        },
        ticket,
    ))
}
