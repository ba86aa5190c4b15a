use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use super::error::SettingsError;
use super::storage;
use super::types::*;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::core::tenant::TenantContext;

pub async fn get_system_settings(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Query(scope): Query<ScopeQuery>,
) -> Result<Json<EffectiveSettings>, SettingsError> {
    let settings = run_db(&state.conn, move |conn| {
        storage::effective_settings(conn, ctx.tenant_id, scope.department_id)
    })
    .await?;
    Ok(Json(settings))
}

pub async fn patch_system_settings(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Query(scope): Query<ScopeQuery>,
    Json(patch): Json<serde_json::Value>,
) -> Result<Json<EffectiveSettings>, SettingsError> {
    let settings = run_db(&state.conn, move |conn| {
        storage::patch_settings(conn, ctx.tenant_id, scope.department_id, patch)
    })
    .await?;
    match scope.department_id {
        Some(id) => info!("Updated settings for department {id}"),
        None => info!("Updated global settings for tenant {}", ctx.tenant_id),
    }
    Ok(Json(settings))
}

pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Role>>, SettingsError> {
    let roles = run_db(&state.conn, move |conn| storage::list_roles(conn, ctx.tenant_id)).await?;
    Ok(Json(roles))
}

pub async fn create_role(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), SettingsError> {
    let role = run_db(&state.conn, move |conn| storage::create_role(conn, ctx.tenant_id, req)).await?;
    info!("Created role '{}'", role.name);
    Ok((StatusCode::CREATED, Json(role)))
}

pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, SettingsError> {
    run_db(&state.conn, move |conn| storage::delete_role(conn, ctx.tenant_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<User>>, SettingsError> {
    let users = run_db(&state.conn, move |conn| storage::list_users(conn, ctx.tenant_id)).await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), SettingsError> {
    let user = run_db(&state.conn, move |conn| storage::create_user(conn, ctx.tenant_id, req)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn invite_user(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<InviteUserRequest>,
) -> Result<(StatusCode, Json<Invitation>), SettingsError> {
    let invitation = run_db(&state.conn, move |conn| storage::invite_user(conn, ctx.tenant_id, req)).await?;
    // delivery is handled by the mail relay watching the invitations table
    info!("Invited {} (expires {})", invitation.email, invitation.expires_at);
    Ok((StatusCode::CREATED, Json(invitation)))
}

pub async fn list_links(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<ExternalLink>>, SettingsError> {
    let links = run_db(&state.conn, move |conn| storage::list_links(conn, ctx.tenant_id)).await?;
    Ok(Json(links))
}

pub async fn create_link(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<ExternalLink>), SettingsError> {
    let link = run_db(&state.conn, move |conn| storage::create_link(conn, ctx.tenant_id, req)).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn update_link(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLinkRequest>,
) -> Result<Json<ExternalLink>, SettingsError> {
    let link = run_db(&state.conn, move |conn| storage::update_link(conn, ctx.tenant_id, id, req)).await?;
    Ok(Json(link))
}

pub async fn delete_link(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, SettingsError> {
    run_db(&state.conn, move |conn| storage::delete_link(conn, ctx.tenant_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_announcements(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Query(query): Query<AnnouncementQuery>,
) -> Result<Json<Vec<Announcement>>, SettingsError> {
    let items = run_db(&state.conn, move |conn| {
        storage::list_announcements(conn, ctx.tenant_id, query)
    })
    .await?;
    Ok(Json(items))
}

pub async fn create_announcement(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), SettingsError> {
    let item = run_db(&state.conn, move |conn| {
        storage::create_announcement(conn, ctx.tenant_id, ctx.user_id, req)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_announcement(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAnnouncementRequest>,
) -> Result<Json<Announcement>, SettingsError> {
    let item = run_db(&state.conn, move |conn| {
        storage::update_announcement(conn, ctx.tenant_id, id, req)
    })
    .await?;
    Ok(Json(item))
}

pub async fn delete_announcement(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, SettingsError> {
    run_db(&state.conn, move |conn| storage::delete_announcement(conn, ctx.tenant_id, id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
