use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use log::info;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::error::HelpdeskError;
use super::escalation::{CreateEscalationRuleRequest, EscalationRule};
use super::forms::{CreateFormFieldRequest, FormField};
use super::hierarchy::{build_tree, root_departments, DepartmentNode};
use super::storage;
use super::types::*;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::core::tenant::TenantContext;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyView {
    pub edges: Vec<HierarchyEdge>,
    pub tree: Vec<DepartmentNode>,
}

pub async fn list_departments(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Department>>, HelpdeskError> {
    let departments = run_db(&state.conn, move |conn| storage::list_departments(conn, ctx.tenant_id)).await?;
    Ok(Json(departments))
}

pub async fn create_department(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateDepartmentRequest>,
) -> Result<(StatusCode, Json<Department>), HelpdeskError> {
    let department =
        run_db(&state.conn, move |conn| storage::create_department(conn, ctx.tenant_id, req)).await?;
    info!("Created department {} ({})", department.name, department.id);
    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn list_root_departments(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Department>>, HelpdeskError> {
    let roots = run_db(&state.conn, move |conn| {
        let departments = storage::list_departments(conn, ctx.tenant_id)?;
        let edges = storage::list_edges(conn, ctx.tenant_id)?;
        Ok::<_, HelpdeskError>(
            root_departments(&departments, &edges)
                .into_iter()
                .cloned()
                .collect::<Vec<_>>(),
        )
    })
    .await?;
    Ok(Json(roots))
}

pub async fn get_hierarchy(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<HierarchyView>, HelpdeskError> {
    let view = run_db(&state.conn, move |conn| {
        let departments = storage::list_departments(conn, ctx.tenant_id)?;
        let edges = storage::list_edges(conn, ctx.tenant_id)?;
        let tree = build_tree(&departments, &edges);
        Ok::<_, HelpdeskError>(HierarchyView { edges, tree })
    })
    .await?;
    Ok(Json(view))
}

pub async fn create_hierarchy_edge(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateHierarchyEdgeRequest>,
) -> Result<(StatusCode, Json<HierarchyEdge>), HelpdeskError> {
    let edge = run_db(&state.conn, move |conn| storage::create_edge(conn, ctx.tenant_id, req)).await?;
    Ok((StatusCode::CREATED, Json(edge)))
}

pub async fn delete_hierarchy_edge(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HelpdeskError> {
    run_db(&state.conn, move |conn| storage::delete_edge(conn, ctx.tenant_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_helpdesks(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Helpdesk>>, HelpdeskError> {
    let helpdesks = run_db(&state.conn, move |conn| storage::list_helpdesks(conn, ctx.tenant_id)).await?;
    Ok(Json(helpdesks))
}

pub async fn create_helpdesk(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateHelpdeskRequest>,
) -> Result<(StatusCode, Json<Helpdesk>), HelpdeskError> {
    let helpdesk = run_db(&state.conn, move |conn| storage::create_helpdesk(conn, ctx.tenant_id, req)).await?;
    info!("Created helpdesk {} for department {}", helpdesk.id, helpdesk.department_id);
    Ok((StatusCode::CREATED, Json(helpdesk)))
}

pub async fn update_helpdesk(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateHelpdeskRequest>,
) -> Result<Json<Helpdesk>, HelpdeskError> {
    let helpdesk =
        run_db(&state.conn, move |conn| storage::update_helpdesk(conn, ctx.tenant_id, id, req)).await?;
    Ok(Json(helpdesk))
}

/// Runs `f` against a helpdesk the tenant owns.
async fn scoped<T, F>(state: &AppState, ctx: TenantContext, helpdesk_id: Uuid, f: F) -> Result<T, HelpdeskError>
where
    F: FnOnce(&mut diesel::PgConnection) -> Result<T, HelpdeskError> + Send + 'static,
    T: Send + 'static,
{
    run_db(&state.conn, move |conn| {
        storage::get_helpdesk(conn, ctx.tenant_id, helpdesk_id)?;
        f(conn)
    })
    .await
}

pub async fn list_sla_states(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SlaState>>, HelpdeskError> {
    let states = scoped(&state, ctx, id, move |conn| storage::list_states(conn, id)).await?;
    Ok(Json(states))
}

pub async fn create_sla_state(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateSlaStateRequest>,
) -> Result<(StatusCode, Json<SlaState>), HelpdeskError> {
    let created = scoped(&state, ctx, id, move |conn| storage::create_state(conn, id, req)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_sla_policies(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SlaPolicy>>, HelpdeskError> {
    let policies = scoped(&state, ctx, id, move |conn| storage::list_policies(conn, id)).await?;
    Ok(Json(policies))
}

pub async fn upsert_sla_policy(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpsertSlaPolicyRequest>,
) -> Result<Json<SlaPolicy>, HelpdeskError> {
    let policy = scoped(&state, ctx, id, move |conn| storage::upsert_policy(conn, id, req)).await?;
    Ok(Json(policy))
}

pub async fn list_escalation_rules(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<EscalationRule>>, HelpdeskError> {
    let rules = scoped(&state, ctx, id, move |conn| storage::list_rules(conn, id)).await?;
    Ok(Json(rules))
}

pub async fn create_escalation_rule(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateEscalationRuleRequest>,
) -> Result<(StatusCode, Json<EscalationRule>), HelpdeskError> {
    let rule = req.into_rule(id).map_err(HelpdeskError::Validation)?;
    let saved = rule.clone();
    scoped(&state, ctx, id, move |conn| storage::create_rule(conn, id, &saved)).await?;
    info!("Created escalation rule '{}' on helpdesk {id}", rule.name);
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn list_form_categories(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FormCategory>>, HelpdeskError> {
    let categories = scoped(&state, ctx, id, move |conn| storage::list_categories(conn, id)).await?;
    Ok(Json(categories))
}

pub async fn create_form_category(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateFormCategoryRequest>,
) -> Result<(StatusCode, Json<FormCategory>), HelpdeskError> {
    let category = scoped(&state, ctx, id, move |conn| storage::create_category(conn, id, req)).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn list_form_fields(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FormField>>, HelpdeskError> {
    let fields = scoped(&state, ctx, id, move |conn| storage::list_fields(conn, id)).await?;
    Ok(Json(fields))
}

pub async fn create_form_field(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateFormFieldRequest>,
) -> Result<(StatusCode, Json<FormField>), HelpdeskError> {
    let field = req.into_field(id).map_err(HelpdeskError::Validation)?;
    let created = scoped(&state, ctx, id, move |conn| storage::create_field(conn, &field)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn list_category_fields(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<FormField>>, HelpdeskError> {
    let fields = run_db(&state.conn, move |conn| {
        storage::get_category_for_tenant(conn, ctx.tenant_id, id)?;
        storage::list_category_fields(conn, id)
    })
    .await?;
    Ok(Json(fields))
}

pub async fn list_email_configs(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InboundEmailConfig>>, HelpdeskError> {
    let configs = scoped(&state, ctx, id, move |conn| storage::list_email_configs(conn, id)).await?;
    Ok(Json(configs))
}

pub async fn create_email_config(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateEmailConfigRequest>,
) -> Result<(StatusCode, Json<InboundEmailConfig>), HelpdeskError> {
    let config = scoped(&state, ctx, id, move |conn| storage::create_email_config(conn, id, req)).await?;
    Ok((StatusCode::CREATED, Json(config)))
}

pub async fn list_webhooks(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Webhook>>, HelpdeskError> {
    let hooks = run_db(&state.conn, move |conn| storage::list_webhooks(conn, ctx.tenant_id)).await?;
    Ok(Json(hooks))
}

pub async fn create_webhook(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<Webhook>), HelpdeskError> {
    let hook = run_db(&state.conn, move |conn| storage::create_webhook(conn, ctx.tenant_id, req)).await?;
    info!("Registered webhook {} -> {}", hook.id, hook.url);
    Ok((StatusCode::CREATED, Json(hook)))
}

pub async fn delete_webhook(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, HelpdeskError> {
    run_db(&state.conn, move |conn| storage::delete_webhook(conn, ctx.tenant_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
