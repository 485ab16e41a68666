//! Branches: optional sub-scopes within an account.
//!
//! A kiosk opened with `?branch=<id>` shows account-wide rows plus rows
//! tagged with that branch. Deleting a branch leaves its content in place
//! with `branch_id` cleared (`ON DELETE SET NULL`).

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum BranchError {
    #[error("branch not found: {0}")]
    NotFound(Uuid),
    #[error("branch name must not be empty")]
    InvalidName,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for BranchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BRANCH_NOT_FOUND",
            Self::InvalidName => "E_INVALID_BRANCH",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Branch {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchInput {
    pub name: Option<String>,
    pub location: Option<String>,
}

fn clean_name(raw: Option<&str>) -> Result<Option<String>, BranchError> {
    match raw.map(str::trim) {
        None => Ok(None),
        Some("") => Err(BranchError::InvalidName),
        Some(name) => Ok(Some(name.to_owned())),
    }
}

/// Empty strings clear the location.
fn clean_location(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|l| !l.is_empty()).map(str::to_owned)
}

pub async fn list(pool: &PgPool, account_id: Uuid) -> Result<Vec<Branch>, BranchError> {
    let rows = sqlx::query_as::<_, Branch>(
        "SELECT id, account_id, name, location, created_at FROM branches
         WHERE account_id = $1 ORDER BY name, created_at",
    )
    .bind(account_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, account_id: Uuid, branch_id: Uuid) -> Result<Branch, BranchError> {
    sqlx::query_as::<_, Branch>(
        "SELECT id, account_id, name, location, created_at FROM branches WHERE id = $1 AND account_id = $2",
    )
    .bind(branch_id)
    .bind(account_id)
    .fetch_optional(pool)
    .await?
    .ok_or(BranchError::NotFound(branch_id))
}

/// # Errors
///
/// Returns `InvalidName` when the name is missing or blank.
pub async fn create(pool: &PgPool, account_id: Uuid, input: &BranchInput) -> Result<Branch, BranchError> {
    let name = clean_name(input.name.as_deref())?.ok_or(BranchError::InvalidName)?;
    let row = sqlx::query_as::<_, Branch>(
        "INSERT INTO branches (account_id, name, location) VALUES ($1, $2, $3)
         RETURNING id, account_id, name, location, created_at",
    )
    .bind(account_id)
    .bind(name)
    .bind(clean_location(input.location.as_deref()))
    .fetch_one(pool)
    .await?;
    tracing::info!(%account_id, branch_id = %row.id, "branch created");
    Ok(row)
}

pub async fn update(
    pool: &PgPool,
    account_id: Uuid,
    branch_id: Uuid,
    input: &BranchInput,
) -> Result<Branch, BranchError> {
    let name = clean_name(input.name.as_deref())?;
    sqlx::query_as::<_, Branch>(
        "UPDATE branches SET
             name = COALESCE($3, name),
             location = CASE WHEN $4 THEN $5 ELSE location END
         WHERE id = $1 AND account_id = $2
         RETURNING id, account_id, name, location, created_at",
    )
    .bind(branch_id)
    .bind(account_id)
    .bind(name)
    .bind(input.location.is_some())
    .bind(clean_location(input.location.as_deref()))
    .fetch_optional(pool)
    .await?
    .ok_or(BranchError::NotFound(branch_id))
}

pub async fn delete(pool: &PgPool, account_id: Uuid, branch_id: Uuid) -> Result<(), BranchError> {
    let result = sqlx::query("DELETE FROM branches WHERE id = $1 AND account_id = $2")
        .bind(branch_id)
        .bind(account_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(BranchError::NotFound(branch_id));
    }
    tracing::info!(%account_id, %branch_id, "branch deleted");
    Ok(())
}

/// Whether `branch_id` belongs to `account_id`.
pub async fn belongs_to(pool: &PgPool, account_id: Uuid, branch_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM branches WHERE id = $1 AND account_id = $2)")
        .bind(branch_id)
        .bind(account_id)
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        assert_eq!(clean_name(Some("  Downtown ")).unwrap(), Some("Downtown".into()));
        assert_eq!(clean_name(None).unwrap(), None);
        assert!(matches!(clean_name(Some("  ")), Err(BranchError::InvalidName)));
    }

    #[test]
    fn blank_location_clears() {
        assert_eq!(clean_location(Some("  ")), None);
        assert_eq!(clean_location(Some(" 2nd floor ")), Some("2nd floor".into()));
        assert_eq!(clean_location(None), None);
    }
}
