use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool};
use thiserror::Error;

use crate::types::{ResetAuditRecord, ResetLogEntry};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("Audit store unavailable: {0}")]
    Unavailable(String),
}

/// Application store holding the reset audit trail and admin accounts
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Append one record; prior rows are never modified
    async fn append(&self, record: &ResetAuditRecord) -> Result<(), AuditError>;

    async fn list_all(&self) -> Result<Vec<ResetLogEntry>, AuditError>;

    async fn check_admin_credentials(&self, username: &str, password: &str) -> Result<bool, AuditError>;

    async fn health_check(&self) -> Result<(), AuditError>;
}

#[derive(Debug, FromRow)]
struct LogRow {
    request_id: i64,
    username: String,
    server_ip: String,
    request_type: String,
    request_status: String,
    message: Option<String>,
    request_time: Option<NaiveDateTime>,
}

impl From<LogRow> for ResetLogEntry {
    fn from(row: LogRow) -> Self {
        ResetLogEntry {
            request_id: row.request_id,
            username: row.username,
            server_ip: row.server_ip,
            request_type: row.request_type,
            request_status: row.request_status,
            message: row.message.unwrap_or_default(),
            request_time: ResetLogEntry::format_request_time(row.request_time),
        }
    }
}

/// Postgres-backed audit store calling the procedures under `sql/audit`
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn append(&self, record: &ResetAuditRecord) -> Result<(), AuditError> {
        sqlx::query("CALL log_updates($1, $2, $3, $4, $5, $6)")
            .bind(&record.username)
            .bind(&record.server_ip)
            .bind(&record.request_type)
            .bind(record.status.as_str())
            .bind(record.stored_message())
            .bind(record.timestamp.naive_utc())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ResetLogEntry>, AuditError> {
        let rows: Vec<LogRow> = sqlx::query_as(
            r#"
            SELECT request_id, username, server_ip, request_type, request_status, message, request_time
            FROM get_all_logs()
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ResetLogEntry::from).collect())
    }

    async fn check_admin_credentials(&self, username: &str, password: &str) -> Result<bool, AuditError> {
        let (valid,): (Option<bool>,) = sqlx::query_as("SELECT check_admin_credentials($1, $2)")
            .bind(username)
            .bind(password)
            .fetch_one(&self.pool)
            .await?;
        Ok(valid.unwrap_or(false))
    }

    async fn health_check(&self) -> Result<(), AuditError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
