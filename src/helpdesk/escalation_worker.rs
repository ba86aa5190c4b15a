//! Periodic escalation sweep over open tickets.

use chrono::{DateTime, Utc};
use diesel::{Connection, PgConnection};
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use super::escalation::{select_rule, EscalationAction, EscalationRule};
use super::sla::{evaluate, policy_for};
use super::storage;
use super::types::{Helpdesk, SlaPolicy, SlaState};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::helpdesk::webhooks::WebhookEvent;
use crate::tickets::activity::{self, ActivityKind};
use crate::tickets::notify::ticket_event;
use crate::tickets::storage::{self as tickets_storage, TicketChanges};
use crate::tickets::types::Ticket;
use crate::tickets::TicketsError;

pub struct EscalationWorker {
    state: Arc<AppState>,
    period: Duration,
}

impl EscalationWorker {
    pub fn new(state: Arc<AppState>) -> Self {
        let period = Duration::from_secs(state.config.escalation.interval_seconds.max(1));
        Self { state, period }
    }

    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            info!("Escalation worker started, sweeping every {:?}", self.period);
            let mut tick = interval(self.period);
            loop {
                tick.tick().await;
                match self.sweep().await {
                    Ok(0) => {}
                    Ok(n) => info!("Escalated {n} tickets"),
                    Err(e) => error!("Escalation sweep failed: {e}"),
                }
            }
        })
    }

    /// One pass over every enabled helpdesk. Returns the number of tickets escalated.
    pub async fn sweep(&self) -> Result<usize, TicketsError> {
        let now = Utc::now();
        let escalated = run_db(&self.state.conn, move |conn| sweep_all(conn, now)).await?;
        for (ticket, action) in &escalated {
            ticket_event(
                &self.state,
                ticket,
                WebhookEvent::TicketEscalated,
                json!({ "escalation": action }),
            )
            .await;
        }
        Ok(escalated.len())
    }
}

fn sweep_all(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<Vec<(Ticket, EscalationAction)>, TicketsError> {
    let mut escalated = Vec::new();
    for helpdesk in storage::list_enabled_helpdesks(conn)? {
        let rules = storage::list_rules(conn, helpdesk.id)?;
        if !rules.iter().any(|r| r.enabled) {
            continue;
        }
        let states = storage::list_states(conn, helpdesk.id)?;
        let policies = storage::list_policies(conn, helpdesk.id)?;

        for ticket in tickets_storage::open_tickets(conn, helpdesk.id)? {
            let number = ticket.ticket_number.clone();
            match escalate_ticket(conn, &helpdesk, &rules, &states, &policies, ticket, now) {
                Ok(Some(done)) => escalated.push(done),
                Ok(None) => {}
                Err(e) => warn!("Escalating {number} failed: {e}"),
            }
        }
    }
    Ok(escalated)
}

fn escalate_ticket(
    conn: &mut PgConnection,
    helpdesk: &Helpdesk,
    rules: &[EscalationRule],
    states: &[SlaState],
    policies: &[SlaPolicy],
    ticket: Ticket,
    now: DateTime<Utc>,
) -> Result<Option<(Ticket, EscalationAction)>, TicketsError> {
    let in_final_state = ticket
        .state_id
        .and_then(|id| states.iter().find(|s| s.id == id))
        .is_some_and(|s| s.is_final);
    if in_final_state {
        return Ok(None);
    }

    let breached = policy_for(policies, ticket.priority())
        .map(|p| evaluate(p, &ticket.sla_clock(false), now).is_breached())
        .unwrap_or(false);
    let snapshot = ticket.snapshot(breached);
    let applied = tickets_storage::applied_rules(conn, ticket.id)?;
    let Some(rule) = select_rule(rules, &snapshot, &applied, now) else {
        return Ok(None);
    };
    let action = EscalationAction::for_rule(rule, &snapshot);

    let result = conn.transaction::<_, TicketsError, _>(|conn| {
        // another sweeper may have recorded it first
        if !tickets_storage::record_escalation(conn, ticket.id, action.rule_id)? {
            return Ok(None);
        }
        let updated = if action.reassign_department.is_some() || action.reassign_user.is_some() {
            let changes = TicketChanges {
                department_id: action.reassign_department,
                assignee_id: action.reassign_user,
                version: ticket.version + 1,
                updated_at: now,
                ..TicketChanges::default()
            };
            tickets_storage::update_ticket(conn, helpdesk.tenant_id, ticket.id, ticket.version, changes)?
        } else {
            ticket.clone()
        };
        tickets_storage::insert_activity(
            conn,
            &activity::entry(ticket.id, None, ActivityKind::Escalated, json!(action)),
        )?;
        Ok(Some(updated))
    })?;

    let Some(updated) = result else {
        return Ok(None);
    };
    info!(
        "Rule '{}' escalated {} on helpdesk {}",
        action.rule_name, updated.ticket_number, helpdesk.name
    );
    if action.notify_managers {
        match storage::get_department(conn, helpdesk.tenant_id, updated.department_id) {
            Ok(department) => match department.head_user_id {
                Some(head) => info!(
                    "Notifying manager {head} of {} about escalation '{}'",
                    department.name, action.rule_name
                ),
                None => warn!(
                    "Escalation '{}' wants managers notified but {} has no head",
                    action.rule_name, department.name
                ),
            },
            Err(e) => warn!("Could not resolve manager for {}: {e}", updated.ticket_number),
        }
    }
    Ok(Some((updated, action)))
}
