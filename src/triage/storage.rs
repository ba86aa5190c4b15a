//! Nearest-neighbour lookups over the pgvector HNSW indexes.

use diesel::prelude::*;
use diesel::sql_types::{BigInt, Float8, Nullable, Text, Varchar};
use uuid::Uuid;

use super::error::TriageError;
use super::suggestion::{Neighbor, RelatedDoc};

// Must match the `vector(N)` cast used by the index expressions.
const NEAREST_TICKETS_SQL: &str = "\
    SELECT id, ticket_number, title, department_id, assignee_id, \
           1 - (embedding::vector(1536) <=> $1::vector) AS similarity \
    FROM tickets \
    WHERE tenant_id = $2 AND embedding IS NOT NULL \
    ORDER BY embedding::vector(1536) <=> $1::vector \
    LIMIT $3";

const NEAREST_PAGES_SQL: &str = "\
    SELECT id, title, 1 - (embedding::vector(1536) <=> $1::vector) AS similarity \
    FROM pages \
    WHERE tenant_id = $2 AND embedding IS NOT NULL AND status = 'published' \
    ORDER BY embedding::vector(1536) <=> $1::vector \
    LIMIT $3";

#[derive(Debug, QueryableByName)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct NeighborRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
    #[diesel(sql_type = Varchar)]
    ticket_number: String,
    #[diesel(sql_type = Varchar)]
    title: String,
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    department_id: Uuid,
    #[diesel(sql_type = Nullable<diesel::sql_types::Uuid>)]
    assignee_id: Option<Uuid>,
    #[diesel(sql_type = Float8)]
    similarity: f64,
}

#[derive(Debug, QueryableByName)]
#[diesel(check_for_backend(diesel::pg::Pg))]
struct PageRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
    #[diesel(sql_type = Varchar)]
    title: String,
    #[diesel(sql_type = Float8)]
    similarity: f64,
}

/// `vector` is a pgvector literal, see `embedding::to_pgvector_literal`.
pub fn nearest_tickets(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    vector: &str,
    limit: i64,
) -> Result<Vec<Neighbor>, TriageError> {
    let rows: Vec<NeighborRow> = diesel::sql_query(NEAREST_TICKETS_SQL)
        .bind::<Text, _>(vector)
        .bind::<diesel::sql_types::Uuid, _>(tenant_id)
        .bind::<BigInt, _>(limit.max(1))
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|r| Neighbor {
            ticket_id: r.id,
            ticket_number: r.ticket_number,
            title: r.title,
            department_id: r.department_id,
            assignee_id: r.assignee_id,
            similarity: r.similarity as f32,
        })
        .collect())
}

pub fn nearest_pages(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    vector: &str,
    limit: i64,
) -> Result<Vec<RelatedDoc>, TriageError> {
    if limit <= 0 {
        return Ok(Vec::new());
    }
    let rows: Vec<PageRow> = diesel::sql_query(NEAREST_PAGES_SQL)
        .bind::<Text, _>(vector)
        .bind::<diesel::sql_types::Uuid, _>(tenant_id)
        .bind::<BigInt, _>(limit)
        .load(conn)?;

    Ok(rows
        .into_iter()
        .map(|r| RelatedDoc {
            id: r.id,
            title: r.title,
            similarity: r.similarity as f32,
        })
        .collect())
}
