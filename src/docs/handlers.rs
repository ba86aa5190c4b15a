use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use super::delete_guard::{DeleteIntent, DeleteKind, DeleteTarget};
use super::error::DocsError;
use super::storage;
use super::types::*;
use super::workflow::{self, PublishOutcome, ReviewStore};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::run_db;
use crate::core::tenant::TenantContext;
use crate::triage::indexing;

/// Review workflow backed directly by the database for one request.
pub struct PgReviewStore {
    state: Arc<AppState>,
    ctx: TenantContext,
}

impl PgReviewStore {
    pub fn new(state: Arc<AppState>, ctx: TenantContext) -> Self {
        Self { state, ctx }
    }
}

#[async_trait]
impl ReviewStore for PgReviewStore {
    type Error = DocsError;

    async fn set_status(
        &self,
        page_id: Uuid,
        status: PageStatus,
        reviewer_id: Option<Uuid>,
    ) -> Result<Page, DocsError> {
        let tenant_id = self.ctx.tenant_id;
        run_db(&self.state.conn, move |conn| {
            storage::set_status(conn, tenant_id, page_id, status, reviewer_id)
        })
        .await
    }

    async fn add_comment(&self, page_id: Uuid, content: &str) -> Result<PageComment, DocsError> {
        let ctx = self.ctx;
        let req = CreatePageCommentRequest {
            content: content.to_string(),
            author_name: None,
        };
        run_db(&self.state.conn, move |conn| {
            storage::add_comment(conn, ctx.tenant_id, page_id, ctx.user_id, req)
        })
        .await
    }
}

pub async fn list_books(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
) -> Result<Json<Vec<Book>>, DocsError> {
    let books = run_db(&state.conn, move |conn| storage::list_books(conn, ctx.tenant_id)).await?;
    Ok(Json(books))
}

pub async fn create_book(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreateBookRequest>,
) -> Result<(StatusCode, Json<Book>), DocsError> {
    let book = run_db(&state.conn, move |conn| {
        storage::create_book(conn, ctx.tenant_id, ctx.user_id, req)
    })
    .await?;
    info!("Created book '{}' ({})", book.title, book.id);
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn book_delete_intent(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteIntent>, DocsError> {
    run_db(&state.conn, move |conn| storage::get_book(conn, ctx.tenant_id, id)).await?;
    let intent = state
        .delete_intents
        .issue(DeleteTarget {
            tenant_id: ctx.tenant_id,
            kind: DeleteKind::Book,
            id,
        })
        .await;
    Ok(Json(intent))
}

pub async fn delete_book(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Query(confirm): Query<DeleteRequest>,
) -> Result<StatusCode, DocsError> {
    state
        .delete_intents
        .consume(
            &confirm.token,
            DeleteTarget {
                tenant_id: ctx.tenant_id,
                kind: DeleteKind::Book,
                id,
            },
        )
        .await?;
    run_db(&state.conn, move |conn| storage::delete_book(conn, ctx.tenant_id, id)).await?;
    info!("Deleted book {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_book_pages(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Vec<Page>>, DocsError> {
    let pages = run_db(&state.conn, move |conn| {
        storage::list_book_pages(conn, ctx.tenant_id, book_id)
    })
    .await?;
    Ok(Json(pages))
}

pub async fn create_page(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Json(req): Json<CreatePageRequest>,
) -> Result<(StatusCode, Json<Page>), DocsError> {
    let page = run_db(&state.conn, move |conn| {
        storage::create_page(conn, ctx.tenant_id, ctx.user_id, req)
    })
    .await?;
    indexing::index_page(&state, page.id, &page.title, &page.content);
    Ok((StatusCode::CREATED, Json(page)))
}

pub async fn get_page(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Page>, DocsError> {
    let page = run_db(&state.conn, move |conn| storage::get_page(conn, ctx.tenant_id, id)).await?;
    Ok(Json(page))
}

pub async fn update_page(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePageRequest>,
) -> Result<Json<Page>, DocsError> {
    let interval = chrono::Duration::seconds(state.config.docs.snapshot_interval_seconds);
    let (before, after) = run_db(&state.conn, move |conn| {
        storage::update_page(conn, ctx.tenant_id, id, ctx.user_id, req, interval)
    })
    .await?;
    if before.title != after.title || before.content != after.content {
        indexing::index_page(&state, after.id, &after.title, &after.content);
    }
    Ok(Json(after))
}

pub async fn page_delete_intent(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteIntent>, DocsError> {
    run_db(&state.conn, move |conn| storage::get_page(conn, ctx.tenant_id, id)).await?;
    let intent = state
        .delete_intents
        .issue(DeleteTarget {
            tenant_id: ctx.tenant_id,
            kind: DeleteKind::Page,
            id,
        })
        .await;
    Ok(Json(intent))
}

pub async fn delete_page(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Query(confirm): Query<DeleteRequest>,
) -> Result<StatusCode, DocsError> {
    state
        .delete_intents
        .consume(
            &confirm.token,
            DeleteTarget {
                tenant_id: ctx.tenant_id,
                kind: DeleteKind::Page,
                id,
            },
        )
        .await?;
    run_db(&state.conn, move |conn| storage::delete_page(conn, ctx.tenant_id, id)).await?;
    info!("Deleted page {id}");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    body: Option<Json<SubmitReviewRequest>>,
) -> Result<Json<Page>, DocsError> {
    let reviewer_id = body.and_then(|Json(b)| b.reviewer_id);
    let store = PgReviewStore::new(Arc::clone(&state), ctx);
    let page = workflow::submit_for_review(&store, id, reviewer_id).await?;
    info!("Page {id} submitted for review");
    Ok(Json(page))
}

pub async fn approve_page(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PublishOutcome>, DocsError> {
    let store = PgReviewStore::new(Arc::clone(&state), ctx);
    let outcome = workflow::approve_and_publish(&store, id).await?;
    info!("Page {id} published");
    Ok(Json(outcome))
}

pub async fn change_status(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusChangeRequest>,
) -> Result<Json<Page>, DocsError> {
    let store = PgReviewStore::new(Arc::clone(&state), ctx);
    let page = store.set_status(id, req.status, req.reviewer_id).await?;
    Ok(Json(page))
}

pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PageVersion>>, DocsError> {
    let versions = run_db(&state.conn, move |conn| storage::list_versions(conn, ctx.tenant_id, id)).await?;
    Ok(Json(versions))
}

pub async fn list_comments(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PageComment>>, DocsError> {
    let comments = run_db(&state.conn, move |conn| storage::list_comments(conn, ctx.tenant_id, id)).await?;
    Ok(Json(comments))
}

pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(req): Json<CreatePageCommentRequest>,
) -> Result<(StatusCode, Json<PageComment>), DocsError> {
    let comment = run_db(&state.conn, move |conn| {
        storage::add_comment(conn, ctx.tenant_id, id, ctx.user_id, req)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}
