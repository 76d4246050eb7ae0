//! Generic compare-and-swap updates for versioned rows.
//!
//! Every mutable entity shares the same optimistic concurrency contract: a
//! writer supplies the version it last observed, the store issues a single
//! conditional `UPDATE ... WHERE id = ? AND version = ?`, and a zero-row
//! result is an edit conflict rather than a silent overwrite. Implementing
//! the contract once here keeps the per-entity repos free of duplicated SQL.

use crate::error::{MetadataError, MetadataResult};
use sqlx::{Pool, QueryBuilder, Sqlite};
use time::OffsetDateTime;
use uuid::Uuid;

/// A value bound into a CAS assignment.
#[derive(Clone, Debug)]
pub enum Bind {
    Text(String),
    Int(i64),
    Bool(bool),
    Timestamp(OffsetDateTime),
    Uuid(Uuid),
}

/// Conditionally update a versioned row, returning the new version.
///
/// Builds `UPDATE <table> SET <assignments>, version = version + 1
/// WHERE <id_column> = ? AND version = ? RETURNING version`. Zero matched
/// rows means the row changed, or was deleted, since the caller read it and
/// maps to [`MetadataError::EditConflict`]; on success the stored version is
/// exactly `expected_version + 1`.
///
/// `table`, `id_column`, and the assignment column names are compile-time
/// constants supplied by repo code, never request input; only the values are
/// bound as parameters.
pub async fn cas_update(
    pool: &Pool<Sqlite>,
    table: &str,
    id_column: &str,
    id: Uuid,
    expected_version: i64,
    assignments: &[(&str, Bind)],
) -> MetadataResult<i64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE ");
    qb.push(table).push(" SET ");

    for (column, value) in assignments {
        qb.push(*column).push(" = ");
        match value {
            Bind::Text(v) => qb.push_bind(v.clone()),
            Bind::Int(v) => qb.push_bind(*v),
            Bind::Bool(v) => qb.push_bind(*v),
            Bind::Timestamp(v) => qb.push_bind(*v),
            Bind::Uuid(v) => qb.push_bind(*v),
        };
        qb.push(", ");
    }

    qb.push("version = version + 1 WHERE ");
    qb.push(id_column).push(" = ").push_bind(id);
    qb.push(" AND version = ").push_bind(expected_version);
    qb.push(" RETURNING version");

    let new_version: Option<i64> = qb.build_query_scalar().fetch_optional(pool).await?;

    new_version.ok_or_else(|| {
        MetadataError::EditConflict(format!(
            "{table} row {id} was modified concurrently (expected version {expected_version})"
        ))
    })
}
