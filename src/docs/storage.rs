use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use std::collections::HashMap;
use uuid::Uuid;

use super::error::DocsError;
use super::tree::validate_move;
use super::types::*;
use super::workflow::check_transition;
use crate::core::shared::schema::{books, page_comments, page_versions, pages};

const DEFAULT_MAX_VERSIONS: i32 = 50;

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = pages)]
pub struct PageChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub parent_id: Option<Option<Uuid>>,
    pub status: Option<String>,
    pub reviewer_id: Option<Option<Uuid>>,
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

pub fn list_books(conn: &mut PgConnection, tenant_id: Uuid) -> Result<Vec<Book>, DocsError> {
    Ok(books::table
        .filter(books::tenant_id.eq(tenant_id))
        .order(books::title.asc())
        .select(Book::as_select())
        .load(conn)?)
}

pub fn get_book(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Book, DocsError> {
    books::table
        .filter(books::tenant_id.eq(tenant_id))
        .filter(books::id.eq(id))
        .select(Book::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DocsError::NotFound(format!("book {id}")))
}

pub fn create_book(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    actor: Option<Uuid>,
    req: CreateBookRequest,
) -> Result<Book, DocsError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(DocsError::Validation("title is required".to_string()));
    }
    let max_versions = req.max_versions.unwrap_or(DEFAULT_MAX_VERSIONS);
    if max_versions < 1 {
        return Err(DocsError::Validation("maxVersions must be at least 1".to_string()));
    }
    let now = Utc::now();
    let book = Book {
        id: Uuid::new_v4(),
        tenant_id,
        title: title.to_string(),
        description: req.description,
        department_id: req.department_id,
        versioning_enabled: req.versioning_enabled.unwrap_or(true),
        max_versions,
        created_by: actor,
        created_at: now,
        updated_at: now,
    };
    Ok(diesel::insert_into(books::table)
        .values(&book)
        .returning(Book::as_returning())
        .get_result(conn)?)
}

/// Pages, their versions and comments go with the book.
pub fn delete_book(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), DocsError> {
    let deleted = diesel::delete(
        books::table
            .filter(books::tenant_id.eq(tenant_id))
            .filter(books::id.eq(id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(DocsError::NotFound(format!("book {id}")));
    }
    Ok(())
}

pub fn list_book_pages(conn: &mut PgConnection, tenant_id: Uuid, book_id: Uuid) -> Result<Vec<Page>, DocsError> {
    get_book(conn, tenant_id, book_id)?;
    Ok(pages::table
        .filter(pages::tenant_id.eq(tenant_id))
        .filter(pages::book_id.eq(book_id))
        .order((pages::parent_id.asc(), pages::title.asc()))
        .select(Page::as_select())
        .load(conn)?)
}

pub fn get_page(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Page, DocsError> {
    pages::table
        .filter(pages::tenant_id.eq(tenant_id))
        .filter(pages::id.eq(id))
        .select(Page::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DocsError::NotFound(format!("page {id}")))
}

pub fn create_page(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    actor: Option<Uuid>,
    req: CreatePageRequest,
) -> Result<Page, DocsError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(DocsError::Validation("title is required".to_string()));
    }
    if let Some(book_id) = req.book_id {
        get_book(conn, tenant_id, book_id)?;
    }
    if let Some(parent_id) = req.parent_id {
        let parent = get_page(conn, tenant_id, parent_id)?;
        if !parent.kind().is_container() {
            return Err(DocsError::Validation(format!("'{}' is not a folder", parent.title)));
        }
        if parent.book_id != req.book_id {
            return Err(DocsError::Validation("parent belongs to another book".to_string()));
        }
    }

    let now = Utc::now();
    let page = Page {
        id: Uuid::new_v4(),
        tenant_id,
        book_id: req.book_id,
        parent_id: req.parent_id,
        kind: req.kind.as_str().to_string(),
        title: title.to_string(),
        content: req.content,
        status: PageStatus::Draft.as_str().to_string(),
        reviewer_id: None,
        version: 1,
        created_by: actor,
        embedding: None,
        created_at: now,
        updated_at: now,
    };
    Ok(diesel::insert_into(pages::table)
        .values(&page)
        .returning(Page::as_returning())
        .get_result(conn)?)
}

fn book_parents(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    book_id: Option<Uuid>,
) -> Result<HashMap<Uuid, Option<Uuid>>, DocsError> {
    let rows: Vec<(Uuid, Option<Uuid>)> = match book_id {
        Some(book_id) => pages::table
            .filter(pages::tenant_id.eq(tenant_id))
            .filter(pages::book_id.eq(book_id))
            .select((pages::id, pages::parent_id))
            .load(conn)?,
        None => pages::table
            .filter(pages::tenant_id.eq(tenant_id))
            .filter(pages::book_id.is_null())
            .select((pages::id, pages::parent_id))
            .load(conn)?,
    };
    Ok(rows.into_iter().collect())
}

/// Applies the optimistic-version row update; a concurrent writer makes
/// it match nothing.
fn write_page(
    conn: &mut PgConnection,
    page: &Page,
    expected_version: i32,
    changes: PageChanges,
) -> Result<Page, DocsError> {
    diesel::update(
        pages::table
            .filter(pages::id.eq(page.id))
            .filter(pages::version.eq(expected_version)),
    )
    .set(&changes)
    .returning(Page::as_returning())
    .get_result(conn)
    .optional()?
    .ok_or_else(|| DocsError::Conflict(format!("page {} was modified concurrently", page.id)))
}

/// Updates title, content or parent. Returns the page before and after.
pub fn update_page(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    actor: Option<Uuid>,
    req: UpdatePageRequest,
    snapshot_interval: Duration,
) -> Result<(Page, Page), DocsError> {
    conn.transaction::<_, DocsError, _>(|conn| {
        let before = get_page(conn, tenant_id, id)?;
        if before.version != req.version {
            return Err(DocsError::Conflict(format!(
                "page is at version {}, request was based on {}",
                before.version, req.version
            )));
        }
        if req.edits_text() && !before.status().is_editable() {
            return Err(DocsError::Locked("page is in review".to_string()));
        }
        if let Some(title) = &req.title {
            if title.trim().is_empty() {
                return Err(DocsError::Validation("title is required".to_string()));
            }
        }

        let parent_id = match req.parent_id {
            Some(dest) if dest != before.parent_id => {
                let destination = dest.map(|d| get_page(conn, tenant_id, d)).transpose()?;
                let parents = book_parents(conn, tenant_id, before.book_id)?;
                validate_move(&before, destination.as_ref(), &parents)?;
                Some(dest)
            }
            _ => None,
        };

        let now = Utc::now();
        let changes = PageChanges {
            title: req.title.map(|t| t.trim().to_string()),
            content: req.content,
            parent_id,
            version: before.version + 1,
            updated_at: now,
            ..PageChanges::default()
        };
        let after = write_page(conn, &before, req.version, changes)?;

        if before.content != after.content || before.title != after.title {
            maybe_snapshot(conn, tenant_id, &after, actor, snapshot_interval, now)?;
        }
        Ok((before, after))
    })
}

/// Records a version when the book versions its pages and the newest
/// snapshot is older than `interval`. Loose pages are never versioned.
fn maybe_snapshot(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    page: &Page,
    author_id: Option<Uuid>,
    interval: Duration,
    now: DateTime<Utc>,
) -> Result<bool, DocsError> {
    let Some(book_id) = page.book_id else {
        return Ok(false);
    };
    let book = get_book(conn, tenant_id, book_id)?;
    if !book.versioning_enabled {
        return Ok(false);
    }

    let last: Option<(i32, DateTime<Utc>)> = page_versions::table
        .filter(page_versions::page_id.eq(page.id))
        .order(page_versions::version_number.desc())
        .select((page_versions::version_number, page_versions::created_at))
        .first(conn)
        .optional()?;
    if let Some((_, at)) = last {
        if now - at < interval {
            return Ok(false);
        }
    }

    let snapshot = PageVersion {
        id: Uuid::new_v4(),
        page_id: page.id,
        version_number: last.map_or(1, |(n, _)| n + 1),
        title: page.title.clone(),
        content: page.content.clone(),
        author_id,
        created_at: now,
    };
    diesel::insert_into(page_versions::table)
        .values(&snapshot)
        .execute(conn)?;

    let keep: Vec<Uuid> = page_versions::table
        .filter(page_versions::page_id.eq(page.id))
        .order(page_versions::version_number.desc())
        .limit(i64::from(book.max_versions.max(1)))
        .select(page_versions::id)
        .load(conn)?;
    diesel::delete(
        page_versions::table
            .filter(page_versions::page_id.eq(page.id))
            .filter(page_versions::id.ne_all(keep)),
    )
    .execute(conn)?;
    Ok(true)
}

pub fn set_status(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    id: Uuid,
    status: PageStatus,
    reviewer_id: Option<Uuid>,
) -> Result<Page, DocsError> {
    conn.transaction::<_, DocsError, _>(|conn| {
        let page = get_page(conn, tenant_id, id)?;
        check_transition(page.status(), status).map_err(DocsError::Conflict)?;
        let reviewer = match status {
            PageStatus::InReview => Some(reviewer_id.or(page.reviewer_id)),
            PageStatus::Draft => Some(None),
            PageStatus::Published => None,
        };
        let changes = PageChanges {
            status: Some(status.as_str().to_string()),
            reviewer_id: reviewer,
            version: page.version + 1,
            updated_at: Utc::now(),
            ..PageChanges::default()
        };
        write_page(conn, &page, page.version, changes)
    })
}

pub fn delete_page(conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<(), DocsError> {
    let deleted = diesel::delete(
        pages::table
            .filter(pages::tenant_id.eq(tenant_id))
            .filter(pages::id.eq(id)),
    )
    .execute(conn)?;
    if deleted == 0 {
        return Err(DocsError::NotFound(format!("page {id}")));
    }
    Ok(())
}

pub fn list_versions(conn: &mut PgConnection, tenant_id: Uuid, page_id: Uuid) -> Result<Vec<PageVersion>, DocsError> {
    get_page(conn, tenant_id, page_id)?;
    Ok(page_versions::table
        .filter(page_versions::page_id.eq(page_id))
        .order(page_versions::version_number.desc())
        .select(PageVersion::as_select())
        .load(conn)?)
}

pub fn list_comments(conn: &mut PgConnection, tenant_id: Uuid, page_id: Uuid) -> Result<Vec<PageComment>, DocsError> {
    get_page(conn, tenant_id, page_id)?;
    Ok(page_comments::table
        .filter(page_comments::page_id.eq(page_id))
        .order(page_comments::created_at.asc())
        .select(PageComment::as_select())
        .load(conn)?)
}

pub fn add_comment(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    page_id: Uuid,
    author_id: Option<Uuid>,
    req: CreatePageCommentRequest,
) -> Result<PageComment, DocsError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(DocsError::Validation("comment is empty".to_string()));
    }
    get_page(conn, tenant_id, page_id)?;
    let comment = PageComment {
        id: Uuid::new_v4(),
        page_id,
        author_id,
        author_name: req.author_name,
        content: content.to_string(),
        created_at: Utc::now(),
    };
    Ok(diesel::insert_into(page_comments::table)
        .values(&comment)
        .returning(PageComment::as_returning())
        .get_result(conn)?)
}

pub fn set_page_embedding(conn: &mut PgConnection, page_id: Uuid, embedding: Vec<f32>) -> Result<(), DocsError> {
    diesel::update(pages::table.filter(pages::id.eq(page_id)))
        .set(pages::embedding.eq(Some(embedding)))
        .execute(conn)?;
    Ok(())
}
