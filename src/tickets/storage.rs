use chrono::{DateTime, Utc};
use diesel::pg::Pg;
use diesel::prelude::*;
use std::collections::HashSet;
use uuid::Uuid;

use super::error::TicketsError;
use super::types::*;
use crate::core::shared::schema::{ticket_activity, ticket_comments, ticket_escalations, tickets};
use crate::core::shared::utils::format_ticket_number;
use crate::search::like_pattern;

type TicketSqlType = diesel::dsl::SqlTypeOf<diesel::dsl::AsSelect<Ticket, Pg>>;

const NUMBER_ATTEMPTS: usize = 5;
const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = tickets)]
pub struct TicketChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<String>,
    pub ticket_type: Option<String>,
    pub state_id: Option<Uuid>,
    pub assignee_id: Option<Uuid>,
    pub department_id: Option<Uuid>,
    pub resolved_at: Option<Option<DateTime<Utc>>>,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

/// Inserts a ticket, picking the next free `TKT-nnnnnn` number for the tenant.
pub fn insert_ticket(conn: &mut PgConnection, mut ticket: Ticket) -> Result<Ticket, TicketsError> {
    let existing: i64 = tickets::table
        .filter(tickets::tenant_id.eq(ticket.tenant_id))
        .count()
        .get_result(conn)?;

    for attempt in 0..NUMBER_ATTEMPTS {
        ticket.ticket_number = format_ticket_number(existing + 1 + attempt as i64);
        // Savepoint per attempt so a collision does not abort an enclosing transaction.
        match conn.transaction::<Ticket, diesel::result::Error, _>(|conn| {
            diesel::insert_into(tickets::table)
                .values(&ticket)
                .returning(Ticket::as_returning())
                .get_result(conn)
        }) {
            Ok(saved) => return Ok(saved),
            Err(diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            )) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(TicketsError::Conflict(
        "could not allocate a ticket number, retry".to_string(),
    ))
}

pub fn get_ticket(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Ticket, TicketsError> {
    tickets::table
        .filter(tickets::tenant_id.eq(tenant_id))
        .filter(tickets::id.eq(id))
        .select(Ticket::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| TicketsError::NotFound(format!("ticket {id}")))
}

pub fn find_by_number(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    ticket_number: &str,
) -> Result<Option<Ticket>, TicketsError> {
    Ok(tickets::table
        .filter(tickets::tenant_id.eq(tenant_id))
        .filter(tickets::ticket_number.eq(ticket_number))
        .select(Ticket::as_select())
        .first(conn)
        .optional()?)
}

/// Ticket whose origin message, or one of whose comments, has one of `message_ids`.
pub fn find_by_message_ids(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    message_ids: &[String],
) -> Result<Option<Ticket>, TicketsError> {
    if message_ids.is_empty() {
        return Ok(None);
    }
    let direct = tickets::table
        .filter(tickets::tenant_id.eq(tenant_id))
        .filter(tickets::email_message_id.eq_any(message_ids))
        .select(Ticket::as_select())
        .first(conn)
        .optional()?;
    if direct.is_some() {
        return Ok(direct);
    }
    let via_comment: Option<Uuid> = ticket_comments::table
        .filter(ticket_comments::email_message_id.eq_any(message_ids))
        .select(ticket_comments::ticket_id)
        .first(conn)
        .optional()?;
    match via_comment {
        Some(ticket_id) => match get_ticket(conn, tenant_id, ticket_id) {
            Ok(ticket) => Ok(Some(ticket)),
            Err(TicketsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        },
        None => Ok(None),
    }
}

pub fn list_tickets(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    query: ListTicketsQuery,
) -> Result<Vec<Ticket>, TicketsError> {
    Ok(list_query(tenant_id, query).load(conn)?)
}

/// Tenant-scoped, filtered and paged ticket query. Search text matches literally.
pub fn list_query(
    tenant_id: Uuid,
    query: ListTicketsQuery,
) -> tickets::BoxedQuery<'static, Pg, TicketSqlType> {
    let mut q = tickets::table
        .filter(tickets::tenant_id.eq(tenant_id))
        .select(Ticket::as_select())
        .into_boxed();

    if let Some(helpdesk_id) = query.helpdesk_id {
        q = q.filter(tickets::helpdesk_id.eq(helpdesk_id));
    }
    if let Some(department_id) = query.department_id {
        q = q.filter(tickets::department_id.eq(department_id));
    }
    if let Some(state_id) = query.state_id {
        q = q.filter(tickets::state_id.eq(state_id));
    }
    if let Some(assignee_id) = query.assignee_id {
        q = q.filter(tickets::assignee_id.eq(assignee_id));
    }
    if let Some(priority) = query.priority {
        q = q.filter(tickets::priority.eq(priority));
    }
    if let Some(search) = query.search.filter(|s| !s.trim().is_empty()) {
        let pattern = like_pattern(search.trim());
        q = q.filter(
            tickets::title
                .ilike(pattern.clone())
                .or(tickets::description.ilike(pattern.clone()))
                .or(tickets::ticket_number.ilike(pattern)),
        );
    }

    q.order(tickets::created_at.desc())
        .limit(query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE))
        .offset(query.offset.unwrap_or(0).max(0))
}

/// Applies `changes` only if the row still carries `expected_version`.
pub fn update_ticket(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    expected_version: i32,
    changes: TicketChanges,
) -> Result<Ticket, TicketsError> {
    let updated = diesel::update(
        tickets::table
            .filter(tickets::tenant_id.eq(tenant_id))
            .filter(tickets::id.eq(id))
            .filter(tickets::version.eq(expected_version)),
    )
    .set(&changes)
    .returning(Ticket::as_returning())
    .get_result(conn)
    .optional()?;

    match updated {
        Some(ticket) => Ok(ticket),
        None => {
            let current = get_ticket(conn, tenant_id, id)?;
            Err(TicketsError::Conflict(format!(
                "ticket {} is at version {}, not {expected_version}",
                current.ticket_number, current.version
            )))
        }
    }
}

pub fn set_embedding(conn: &mut PgConnection, id: Uuid, embedding: Vec<f32>) -> Result<(), TicketsError> {
    diesel::update(tickets::table.filter(tickets::id.eq(id)))
        .set(tickets::embedding.eq(Some(embedding)))
        .execute(conn)?;
    Ok(())
}

pub fn open_tickets(conn: &mut PgConnection, helpdesk_id: Uuid) -> Result<Vec<Ticket>, TicketsError> {
    Ok(tickets::table
        .filter(tickets::helpdesk_id.eq(helpdesk_id))
        .filter(tickets::resolved_at.is_null())
        .select(Ticket::as_select())
        .load(conn)?)
}

pub fn list_comments(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    include_internal: bool,
) -> Result<Vec<TicketComment>, TicketsError> {
    let mut q = ticket_comments::table
        .filter(ticket_comments::ticket_id.eq(ticket_id))
        .into_boxed();
    if !include_internal {
        q = q.filter(ticket_comments::is_internal.eq(false));
    }
    Ok(q.order(ticket_comments::created_at.asc())
        .select(TicketComment::as_select())
        .load(conn)?)
}

/// Stores a comment. The first public reply from someone other than the
/// requester stamps `first_response_at`.
pub fn insert_comment(
    conn: &mut PgConnection,
    ticket: &Ticket,
    comment: &TicketComment,
) -> Result<TicketComment, TicketsError> {
    conn.transaction(|conn| {
        let saved: TicketComment = diesel::insert_into(ticket_comments::table)
            .values(comment)
            .returning(TicketComment::as_returning())
            .get_result(conn)?;

        let counts_as_response = !comment.is_internal
            && comment.source != TicketSource::Email.as_str()
            && comment.author_id.is_some()
            && comment.author_id != ticket.created_by;
        if counts_as_response && ticket.first_response_at.is_none() {
            diesel::update(
                tickets::table
                    .filter(tickets::id.eq(ticket.id))
                    .filter(tickets::first_response_at.is_null()),
            )
            .set(tickets::first_response_at.eq(Some(saved.created_at)))
            .execute(conn)?;
        }
        Ok(saved)
    })
}

pub fn insert_activity(conn: &mut PgConnection, activity: &TicketActivity) -> Result<(), TicketsError> {
    diesel::insert_into(ticket_activity::table)
        .values(activity)
        .execute(conn)?;
    Ok(())
}

pub fn list_activity(conn: &mut PgConnection, ticket_id: Uuid) -> Result<Vec<TicketActivity>, TicketsError> {
    Ok(ticket_activity::table
        .filter(ticket_activity::ticket_id.eq(ticket_id))
        .order(ticket_activity::created_at.asc())
        .select(TicketActivity::as_select())
        .load(conn)?)
}

pub fn applied_rules(conn: &mut PgConnection, ticket_id: Uuid) -> Result<HashSet<Uuid>, TicketsError> {
    let ids: Vec<Uuid> = ticket_escalations::table
        .filter(ticket_escalations::ticket_id.eq(ticket_id))
        .select(ticket_escalations::rule_id)
        .load(conn)?;
    Ok(ids.into_iter().collect())
}

/// Returns false when the rule was already recorded for this ticket.
pub fn record_escalation(
    conn: &mut PgConnection,
    ticket_id: Uuid,
    rule_id: Uuid,
) -> Result<bool, TicketsError> {
    let inserted = diesel::insert_into(ticket_escalations::table)
        .values(&TicketEscalation {
            id: Uuid::new_v4(),
            ticket_id,
            rule_id,
            applied_at: Utc::now(),
        })
        .on_conflict((ticket_escalations::ticket_id, ticket_escalations::rule_id))
        .do_nothing()
        .execute(conn)?;
    Ok(inserted > 0)
}
