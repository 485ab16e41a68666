//! Generic row store for the six content tables.
//!
//! DESIGN
//! ======
//! Rows leave Postgres as `to_jsonb(t)`, so one set of queries serves every
//! `ContentKind`. Writes are validated against `ContentKind::fields()` and
//! built with `QueryBuilder`; table and column names only ever come from
//! those static schemas, values are always bound.
//!
//! EXCLUSIVE ACTIVATION
//! ====================
//! Slideshows and videos allow one active row per (account, branch scope).
//! Activating a row, or moving an active row into another branch scope,
//! deactivates its siblings in the target scope in the same transaction, after
//! taking a row lock on the owning account so two concurrent activations
//! serialize instead of both winning.
//!
//! Every committed change is published on the account feed as
//! `{event_prefix}:{insert|update|delete}` carrying the row.

use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use uuid::Uuid;

use crate::model::content::{ContentKind, FieldError, FieldValue, WriteMode, validate_fields};
use crate::services::feed::{self, FeedOp};
use crate::state::AppState;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: Uuid },
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("branch {0} does not belong to this account")]
    ForeignBranch(Uuid),
    #[error("reorder list must contain distinct ids of existing rows")]
    InvalidReorder,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for ContentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "E_CONTENT_NOT_FOUND",
            Self::Field(_) => "E_INVALID_FIELD",
            Self::ForeignBranch(_) => "E_FOREIGN_BRANCH",
            Self::InvalidReorder => "E_INVALID_REORDER",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Row filter for listings.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListFilter {
    #[serde(default)]
    pub active_only: bool,
    /// `Some(b)`: rows for every branch (`branch_id IS NULL`) plus rows for `b`.
    /// `None`: every row of the account.
    #[serde(default, rename = "branch")]
    pub branch_id: Option<Uuid>,
}

/// A committed write and the sibling rows it deactivated.
struct WriteOutcome {
    row: Value,
    deactivated: Vec<Value>,
}

// =============================================================================
// READS
// =============================================================================

/// Rows ordered by `display_order`, then creation time.
pub async fn list(
    pool: &PgPool,
    kind: ContentKind,
    account_id: Uuid,
    filter: ListFilter,
) -> Result<Vec<Value>, ContentError> {
    let table = kind.table();
    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT to_jsonb(t) FROM {table} t WHERE t.account_id = "));
    qb.push_bind(account_id);
    if filter.active_only {
        qb.push(" AND t.is_active");
    }
    if let Some(branch_id) = filter.branch_id {
        qb.push(" AND (t.branch_id IS NULL OR t.branch_id = ");
        qb.push_bind(branch_id);
        qb.push(")");
    }
    qb.push(" ORDER BY t.display_order, t.created_at");

    let rows = qb.build_query_scalar::<Value>().fetch_all(pool).await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, kind: ContentKind, account_id: Uuid, id: Uuid) -> Result<Value, ContentError> {
    let table = kind.table();
    sqlx::query_scalar::<_, Value>(&format!(
        "SELECT to_jsonb(t) FROM {table} t WHERE t.id = $1 AND t.account_id = $2"
    ))
    .bind(id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ContentError::NotFound { kind: kind.event_prefix(), id })
}

// =============================================================================
// WRITES
// =============================================================================

/// Insert a row from a validated body.
///
/// # Errors
///
/// Returns field validation errors, `ForeignBranch`, or a database error.
pub async fn create(
    state: &AppState,
    kind: ContentKind,
    account_id: Uuid,
    body: &Map<String, Value>,
) -> Result<Value, ContentError> {
    let mut values = validate_fields(kind, body, WriteMode::Create)?;
    if !values.iter().any(|(name, _)| *name == "is_active") {
        values.push(("is_active", FieldValue::Bool(kind.active_by_default())));
    }
    let branch_id = branch_value(&values).flatten();
    if let Some(branch_id) = branch_id {
        ensure_branch(&state.pool, account_id, branch_id).await?;
    }

    let id = Uuid::new_v4();
    let mut tx = state.pool.begin().await?;
    let deactivated = if kind.is_exclusive() && activates(&values) {
        deactivate_siblings(&mut tx, kind, account_id, branch_id, id).await?
    } else {
        Vec::new()
    };

    let table = kind.table();
    let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO {table} AS t (id, account_id"));
    for (name, _) in &values {
        qb.push(", ");
        qb.push(*name);
    }
    qb.push(") VALUES (");
    qb.push_bind(id);
    qb.push(", ");
    qb.push_bind(account_id);
    for (_, value) in &values {
        qb.push(", ");
        push_value(&mut qb, value);
    }
    qb.push(") RETURNING to_jsonb(t)");
    let row = qb.build_query_scalar::<Value>().fetch_one(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(%account_id, %id, kind = kind.event_prefix(), "content created");
    publish(state, kind, account_id, FeedOp::Insert, WriteOutcome { row: row.clone(), deactivated }).await;
    Ok(row)
}

/// Apply a partial update.
///
/// # Errors
///
/// Returns field validation errors, `NotFound`, `ForeignBranch`, or a database error.
pub async fn update(
    state: &AppState,
    kind: ContentKind,
    account_id: Uuid,
    id: Uuid,
    body: &Map<String, Value>,
) -> Result<Value, ContentError> {
    let values = validate_fields(kind, body, WriteMode::Patch)?;
    let new_branch = branch_value(&values);
    if let Some(Some(branch_id)) = new_branch {
        ensure_branch(&state.pool, account_id, branch_id).await?;
    }

    let table = kind.table();
    let mut tx = state.pool.begin().await?;
    let current: Option<(Option<Uuid>, bool)> = sqlx::query_as(&format!(
        "SELECT branch_id, is_active FROM {table} WHERE id = $1 AND account_id = $2 FOR UPDATE"
    ))
    .bind(id)
    .bind(account_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some((current_branch, currently_active)) = current else {
        return Err(ContentError::NotFound { kind: kind.event_prefix(), id });
    };

    let scope = new_branch.unwrap_or(current_branch);
    let deactivated = if kind.is_exclusive() && claims_scope(&values, currently_active, current_branch) {
        deactivate_siblings(&mut tx, kind, account_id, scope, id).await?
    } else {
        Vec::new()
    };

    if kind == ContentKind::BreakTimer {
        check_timer_window(&mut tx, id, &values).await?;
    }

    let mut qb = QueryBuilder::<Postgres>::new(format!("UPDATE {table} AS t SET updated_at = now()"));
    for (name, value) in &values {
        qb.push(", ");
        qb.push(*name);
        qb.push(" = ");
        push_value(&mut qb, value);
    }
    qb.push(" WHERE t.id = ");
    qb.push_bind(id);
    qb.push(" AND t.account_id = ");
    qb.push_bind(account_id);
    qb.push(" RETURNING to_jsonb(t)");
    let row = qb.build_query_scalar::<Value>().fetch_one(&mut *tx).await?;
    tx.commit().await?;

    tracing::info!(%account_id, %id, kind = kind.event_prefix(), fields = values.len(), "content updated");
    publish(state, kind, account_id, FeedOp::Update, WriteOutcome { row: row.clone(), deactivated }).await;
    Ok(row)
}

/// Toggle a row's active flag, honoring exclusive groups.
pub async fn set_active(
    state: &AppState,
    kind: ContentKind,
    account_id: Uuid,
    id: Uuid,
    active: bool,
) -> Result<Value, ContentError> {
    let mut body = Map::new();
    body.insert("is_active".into(), Value::Bool(active));
    update(state, kind, account_id, id, &body).await
}

pub async fn delete(state: &AppState, kind: ContentKind, account_id: Uuid, id: Uuid) -> Result<(), ContentError> {
    let table = kind.table();
    let row = sqlx::query_scalar::<_, Value>(&format!(
        "DELETE FROM {table} AS t WHERE t.id = $1 AND t.account_id = $2 RETURNING to_jsonb(t)"
    ))
    .bind(id)
    .bind(account_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ContentError::NotFound { kind: kind.event_prefix(), id })?;

    tracing::info!(%account_id, %id, kind = kind.event_prefix(), "content deleted");
    publish(state, kind, account_id, FeedOp::Delete, WriteOutcome { row, deactivated: Vec::new() }).await;
    Ok(())
}

/// Set `display_order` to each id's position in `ids`.
///
/// # Errors
///
/// Returns `InvalidReorder` if `ids` has duplicates or names rows outside the account.
pub async fn reorder(
    state: &AppState,
    kind: ContentKind,
    account_id: Uuid,
    ids: &[Uuid],
) -> Result<Vec<Value>, ContentError> {
    if !distinct(ids) {
        return Err(ContentError::InvalidReorder);
    }
    let table = kind.table();
    let mut tx = state.pool.begin().await?;
    let mut rows = Vec::with_capacity(ids.len());
    for (position, id) in ids.iter().enumerate() {
        let order = i32::try_from(position).map_err(|_| ContentError::InvalidReorder)?;
        let row = sqlx::query_scalar::<_, Value>(&format!(
            "UPDATE {table} AS t SET display_order = $3, updated_at = now()
             WHERE t.id = $1 AND t.account_id = $2
             RETURNING to_jsonb(t)"
        ))
        .bind(id)
        .bind(account_id)
        .bind(order)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ContentError::InvalidReorder)?;
        rows.push(row);
    }
    tx.commit().await?;

    tracing::info!(%account_id, kind = kind.event_prefix(), count = rows.len(), "content reordered");
    for row in &rows {
        feed::publish_change(state, account_id, kind.event_prefix(), FeedOp::Update, row.clone()).await;
    }
    Ok(rows)
}

// =============================================================================
// HELPERS
// =============================================================================

/// `Some(branch)` if the body sets `branch_id` (possibly to null).
fn branch_value(values: &[(&'static str, FieldValue)]) -> Option<Option<Uuid>> {
    values.iter().find_map(|(name, value)| match (name, value) {
        (&"branch_id", FieldValue::OptionalUuid(branch)) => Some(*branch),
        _ => None,
    })
}

fn activates(values: &[(&'static str, FieldValue)]) -> bool {
    values
        .iter()
        .any(|(name, value)| *name == "is_active" && *value == FieldValue::Bool(true))
}

/// Whether a patched row ends up active in a scope it did not already hold:
/// it is being switched on, or it is active and moves to another branch scope.
fn claims_scope(values: &[(&'static str, FieldValue)], currently_active: bool, current_branch: Option<Uuid>) -> bool {
    let ends_active = values
        .iter()
        .find_map(|(name, value)| match value {
            FieldValue::Bool(active) if *name == "is_active" => Some(*active),
            _ => None,
        })
        .unwrap_or(currently_active);
    let moves = branch_value(values).is_some_and(|scope| scope != current_branch);
    ends_active && (activates(values) || moves)
}

fn distinct(ids: &[Uuid]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(ids.len());
    ids.iter().all(|id| seen.insert(*id))
}

fn push_value(qb: &mut QueryBuilder<'_, Postgres>, value: &FieldValue) {
    match value {
        FieldValue::Text(text) => qb.push_bind(text.clone()),
        FieldValue::OptionalText(text) => qb.push_bind(text.clone()),
        FieldValue::Int(n) => qb.push_bind(*n),
        FieldValue::Bool(b) => qb.push_bind(*b),
        FieldValue::Clock(t) => qb.push_bind(*t),
        FieldValue::OptionalUuid(id) => qb.push_bind(*id),
    };
}

async fn ensure_branch(pool: &PgPool, account_id: Uuid, branch_id: Uuid) -> Result<(), ContentError> {
    if !crate::services::branch::belongs_to(pool, account_id, branch_id).await? {
        return Err(ContentError::ForeignBranch(branch_id));
    }
    Ok(())
}

async fn deactivate_siblings(
    tx: &mut Transaction<'_, Postgres>,
    kind: ContentKind,
    account_id: Uuid,
    branch_id: Option<Uuid>,
    keep: Uuid,
) -> Result<Vec<Value>, sqlx::Error> {
    sqlx::query("SELECT 1 FROM accounts WHERE id = $1 FOR UPDATE")
        .bind(account_id)
        .execute(&mut **tx)
        .await?;

    let table = kind.table();
    sqlx::query_scalar::<_, Value>(&format!(
        "UPDATE {table} AS t SET is_active = false, updated_at = now()
         WHERE t.account_id = $1
           AND t.branch_id IS NOT DISTINCT FROM $2
           AND t.id <> $3
           AND t.is_active
         RETURNING to_jsonb(t)"
    ))
    .bind(account_id)
    .bind(branch_id)
    .bind(keep)
    .fetch_all(&mut **tx)
    .await
}

/// A patch may move either end of a break timer; the stored pair must still differ.
async fn check_timer_window(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    values: &[(&'static str, FieldValue)],
) -> Result<(), ContentError> {
    let clock = |field: &str| {
        values.iter().find_map(|(name, value)| match value {
            FieldValue::Clock(t) if *name == field => Some(*t),
            _ => None,
        })
    };
    let (start, end) = (clock("start_time"), clock("end_time"));
    if start.is_none() && end.is_none() {
        return Ok(());
    }
    let (stored_start, stored_end): (time::Time, time::Time) =
        sqlx::query_as("SELECT start_time, end_time FROM break_timers WHERE id = $1")
            .bind(id)
            .fetch_one(&mut **tx)
            .await?;
    if start.unwrap_or(stored_start) == end.unwrap_or(stored_end) {
        return Err(FieldError::Invalid { field: "end_time", reason: "must differ from start_time".into() }.into());
    }
    Ok(())
}

async fn publish(state: &AppState, kind: ContentKind, account_id: Uuid, op: FeedOp, outcome: WriteOutcome) {
    let prefix = kind.event_prefix();
    for sibling in outcome.deactivated {
        feed::publish_change(state, account_id, prefix, FeedOp::Update, sibling).await;
    }
    feed::publish_change(state, account_id, prefix, op, outcome.row).await;
}

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;
