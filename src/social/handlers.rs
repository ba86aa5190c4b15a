use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::error::SocialError;
use super::storage;
use super::trending::TrendingTopic;
use super::types::*;
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::core::tenant::TenantContext;

pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Channel>>, SocialError> {
    let channels = run_db(&state.conn, move |conn| storage::list_channels(conn, ctx.tenant_id)).await?;
    Ok(Json(channels))
}

pub async fn create_channel(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), SocialError> {
    let channel = run_db(&state.conn, move |conn| storage::create_channel(conn, ctx.tenant_id, req)).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<PostView>>, SocialError> {
    let posts = run_db(&state.conn, move |conn| storage::list_posts(conn, ctx.tenant_id, query)).await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostView>), SocialError> {
    let post = run_db(&state.conn, move |conn| {
        storage::create_post(conn, ctx.tenant_id, ctx.user_id, req)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PostComment>>, SocialError> {
    let comments = run_db(&state.conn, move |conn| storage::list_comments(conn, ctx.tenant_id, id)).await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreatePostCommentRequest>,
) -> Result<(StatusCode, Json<PostComment>), SocialError> {
    let comment = run_db(&state.conn, move |conn| {
        storage::add_comment(conn, ctx.tenant_id, id, ctx.user_id, req)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn get_trending(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<TrendingTopic>>, SocialError> {
    let now = Utc::now();
    let topics = run_db(&state.conn, move |conn| storage::trending_topics(conn, ctx.tenant_id, now)).await?;
    Ok(Json(topics))
}
