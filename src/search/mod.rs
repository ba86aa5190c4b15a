//! Unified substring search over pages, books, departments and page
//! versions of one tenant.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use diesel::prelude::*;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::shared::schema::{books, departments, page_versions, pages};
use crate::core::shared::state::AppState;
use crate::core::shared::utils::{run_db, snippet_around};
use crate::core::tenant::TenantContext;

pub const SNIPPET_CHARS: usize = 160;
const PER_KIND_LIMIT: i64 = 20;
const MAX_QUERY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Page,
    Book,
    Department,
    PageVersion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub kind: SearchKind,
    pub id: Uuid,
    pub title: String,
    pub snippet: String,
    /// Owning page of a version hit.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub page_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<diesel::result::Error> for SearchError {
    fn from(e: diesel::result::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<diesel::r2d2::PoolError> for SearchError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<tokio::task::JoinError> for SearchError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for SearchError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Database(msg) | Self::Internal(msg) => {
                log::error!("search failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Escapes LIKE metacharacters so user input matches literally.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

/// Snippet from the first field that contains the term, falling back to
/// the head of the last one.
fn snippet(term: &str, fields: &[&str]) -> String {
    let lower = term.to_lowercase();
    let source = fields
        .iter()
        .find(|f| f.to_lowercase().contains(&lower))
        .or(fields.last())
        .copied()
        .unwrap_or_default();
    snippet_around(source, term, SNIPPET_CHARS)
}

pub fn search(conn: &mut PgConnection, tenant_id: Uuid, term: &str) -> Result<Vec<SearchHit>, SearchError> {
    let pattern = like_pattern(term);
    let mut hits = Vec::new();

    let page_rows: Vec<(Uuid, String, String)> = pages::table
        .filter(pages::tenant_id.eq(tenant_id))
        .filter(pages::title.ilike(&pattern).or(pages::content.ilike(&pattern)))
        .order(pages::updated_at.desc())
        .limit(PER_KIND_LIMIT)
        .select((pages::id, pages::title, pages::content))
        .load(conn)?;
    hits.extend(page_rows.into_iter().map(|(id, title, content)| SearchHit {
        kind: SearchKind::Page,
        snippet: snippet(term, &[content.as_str(), title.as_str()]),
        id,
        title,
        page_id: None,
    }));

    let book_rows: Vec<(Uuid, String, Option<String>)> = books::table
        .filter(books::tenant_id.eq(tenant_id))
        .filter(books::title.ilike(&pattern))
        .order(books::title.asc())
        .limit(PER_KIND_LIMIT)
        .select((books::id, books::title, books::description))
        .load(conn)?;
    hits.extend(book_rows.into_iter().map(|(id, title, description)| SearchHit {
        kind: SearchKind::Book,
        snippet: snippet(term, &[description.as_deref().unwrap_or_default(), title.as_str()]),
        id,
        title,
        page_id: None,
    }));

    let department_rows: Vec<(Uuid, String, Option<String>)> = departments::table
        .filter(departments::tenant_id.eq(tenant_id))
        .filter(departments::name.ilike(&pattern))
        .order(departments::name.asc())
        .limit(PER_KIND_LIMIT)
        .select((departments::id, departments::name, departments::description))
        .load(conn)?;
    hits.extend(department_rows.into_iter().map(|(id, name, description)| SearchHit {
        kind: SearchKind::Department,
        snippet: snippet(term, &[description.as_deref().unwrap_or_default(), name.as_str()]),
        id,
        title: name,
        page_id: None,
    }));

    let version_rows: Vec<(Uuid, Uuid, String, String)> = page_versions::table
        .inner_join(pages::table.on(pages::id.eq(page_versions::page_id)))
        .filter(pages::tenant_id.eq(tenant_id))
        .filter(
            page_versions::title
                .ilike(&pattern)
                .or(page_versions::content.ilike(&pattern)),
        )
        .order(page_versions::created_at.desc())
        .limit(PER_KIND_LIMIT)
        .select((
            page_versions::id,
            page_versions::page_id,
            page_versions::title,
            page_versions::content,
        ))
        .load(conn)?;
    hits.extend(version_rows.into_iter().map(|(id, page_id, title, content)| SearchHit {
        kind: SearchKind::PageVersion,
        snippet: snippet(term, &[content.as_str(), title.as_str()]),
        id,
        title,
        page_id: Some(page_id),
    }));

    debug!("search '{term}' returned {} hits", hits.len());
    Ok(hits)
}

pub async fn handle_search(
    State(state): State<Arc<AppState>>,
    ctx: TenantContext,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, SearchError> {
    let term = params.q.trim().to_string();
    if term.is_empty() {
        return Err(SearchError::Validation("query parameter 'q' is required".to_string()));
    }
    if term.chars().count() > MAX_QUERY_CHARS {
        return Err(SearchError::Validation(format!(
            "query is longer than {MAX_QUERY_CHARS} characters"
        )));
    }
    let hits = run_db(&state.conn, move |conn| search(conn, ctx.tenant_id, &term)).await?;
    Ok(Json(hits))
}

pub fn configure_search_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/search", get(handle_search))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("vpn"), "%vpn%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }

    #[test]
    fn test_snippet_prefers_matching_field() {
        let content = format!("{} the VPN gateway rotates keys nightly {}", "a".repeat(200), "b".repeat(200));
        let s = snippet("vpn", &[content.as_str(), "Network runbook"]);
        assert!(s.contains("VPN gateway"));
        assert!(s.starts_with("..."));
        assert!(s.chars().count() <= SNIPPET_CHARS + 6);

        assert_eq!(snippet("runbook", &["", "Network runbook"]), "Network runbook");
    }

    #[test]
    fn test_hit_shape() {
        let hit = SearchHit {
            kind: SearchKind::PageVersion,
            id: Uuid::nil(),
            title: "Old".to_string(),
            snippet: "x".to_string(),
            page_id: Some(Uuid::nil()),
        };
        let value = serde_json::to_value(&hit).unwrap();
        assert_eq!(value["kind"], "page_version");
        assert!(value.get("pageId").is_some());
    }
}
