use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use log::info;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use super::error::TicketsError;
use super::inbound::receive_email;
use super::intake::{self, TicketOrigin, TicketSla};
use super::notify::ticket_event;
use super::storage;
use super::types::*;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::core::tenant::TenantContext;
use crate::helpdesk::email::{InboundEmail, InboundOutcome};
use crate::helpdesk::webhooks::WebhookEvent;
use crate::triage::indexing;

pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Query(query): Query<ListTicketsQuery>,
) -> Result<Json<Vec<Ticket>>, TicketsError> {
    let tickets = run_db(&state.conn, move |conn| storage::list_tickets(conn, ctx.tenant_id, query)).await?;
    Ok(Json(tickets))
}

pub async fn create_ticket(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<Ticket>), TicketsError> {
    let ticket = run_db(&state.conn, move |conn| {
        intake::open_ticket(conn, ctx.tenant_id, ctx.user_id, req, TicketOrigin::default())
    })
    .await?;

    info!("Created ticket {} on helpdesk {}", ticket.ticket_number, ticket.helpdesk_id);
    indexing::index_ticket(&state, &ticket);
    ticket_event(&state, &ticket, WebhookEvent::TicketCreated, json!({})).await;
    Ok((StatusCode::CREATED, Json(ticket)))
}

pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketDetail>, TicketsError> {
    let detail = run_db(&state.conn, move |conn| {
        let ticket = storage::get_ticket(conn, ctx.tenant_id, id)?;
        let comments = storage::list_comments(conn, id, true)?;
        Ok::<_, TicketsError>(TicketDetail { ticket, comments })
    })
    .await?;
    Ok(Json(detail))
}

pub async fn update_ticket(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<Ticket>, TicketsError> {
    let (before, after) =
        run_db(&state.conn, move |conn| intake::apply_update(conn, ctx.tenant_id, id, ctx.user_id, req)).await?;

    if before.title != after.title || before.description != after.description {
        indexing::index_ticket(&state, &after);
    }
    ticket_event(
        &state,
        &after,
        WebhookEvent::TicketUpdated,
        json!({ "previousVersion": before.version }),
    )
    .await;
    Ok(Json(after))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TicketComment>>, TicketsError> {
    let comments = run_db(&state.conn, move |conn| {
        storage::get_ticket(conn, ctx.tenant_id, id)?;
        storage::list_comments(conn, id, true)
    })
    .await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<TicketComment>), TicketsError> {
    let (ticket, comment) =
        run_db(&state.conn, move |conn| intake::add_comment(conn, ctx.tenant_id, id, ctx.user_id, req)).await?;

    // internal notes stay inside the helpdesk
    if !comment.is_internal {
        ticket_event(
            &state,
            &ticket,
            WebhookEvent::TicketCommented,
            json!({ "comment": comment }),
        )
        .await;
    }
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_activity(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TicketActivity>>, TicketsError> {
    let entries = run_db(&state.conn, move |conn| {
        storage::get_ticket(conn, ctx.tenant_id, id)?;
        storage::list_activity(conn, id)
    })
    .await?;
    Ok(Json(entries))
}

pub async fn get_ticket_sla(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TicketSla>, TicketsError> {
    let sla = run_db(&state.conn, move |conn| intake::sla_status(conn, ctx.tenant_id, id)).await?;
    Ok(Json(sla))
}

pub async fn inbound_email(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(helpdesk_id): Path<Uuid>,
    Json(email): Json<InboundEmail>,
) -> Result<(StatusCode, Json<InboundOutcome>), TicketsError> {
    let (outcome, ticket) =
        run_db(&state.conn, move |conn| receive_email(conn, ctx.tenant_id, helpdesk_id, email)).await?;

    let status = match &outcome {
        InboundOutcome::Created { .. } => {
            indexing::index_ticket(&state, &ticket);
            ticket_event(&state, &ticket, WebhookEvent::TicketCreated, json!({ "via": "email" })).await;
            StatusCode::CREATED
        }
        InboundOutcome::Commented { comment_id, .. } => {
            ticket_event(
                &state,
                &ticket,
                WebhookEvent::TicketCommented,
                json!({ "via": "email", "commentId": comment_id }),
            )
            .await;
            StatusCode::OK
        }
    };
    Ok((status, Json(outcome)))
}
