use async_trait::async_trait;
use sqlx::{Connection, PgPool};
use std::time::Duration;
use thiserror::Error;

use super::connector::TargetConnector;
use crate::types::{LoginExpirationStatus, ReplicaSet, ResetCommand, TargetCredentials};

/// SQLSTATE for a wrong password. `28000` is left out: it also covers
/// pg_hba host rejections, which are configuration faults.
const INVALID_PASSWORD: &str = "28P01";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Login '{login}' not found on server '{server}'")]
    LoginNotFound { login: String, server: String },

    #[error("Login expiration status for '{login}' is incomplete")]
    IncompleteExpirationStatus { login: String },

    #[error("Failed to connect to server '{server}': {source}")]
    Connect {
        server: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: &'static str, timeout: Duration },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Round trips against the target database-server fleet
#[async_trait]
pub trait CredentialGateway: Send + Sync {
    async fn validate_credentials(&self, username: &str, server: &str, email: &str) -> Result<bool, GatewayError>;

    /// Fails with `LoginNotFound` when the credential store has no such login
    async fn check_login_expiration(&self, username: &str, server: &str) -> Result<LoginExpirationStatus, GatewayError>;

    /// Authentication attempt against `server`. A rejected login is `Ok(false)`.
    async fn verify_old_password(
        &self,
        username: &str,
        server: &str,
        old_password: &str,
        database: &str,
    ) -> Result<bool, GatewayError>;

    async fn find_related_servers(&self, server: &str) -> Result<ReplicaSet, GatewayError>;

    /// Run the privileged reset procedure on `server` over a scoped connection
    async fn reset_password(
        &self,
        server: &str,
        command: ResetCommand<'_>,
        credentials: &TargetCredentials,
    ) -> Result<(), GatewayError>;
}

/// Gateway backed by the credential store pool plus per-server connections
pub struct PgCredentialGateway {
    pool: PgPool,
    connector: TargetConnector,
}

impl PgCredentialGateway {
    pub fn new(pool: PgPool, connector: TargetConnector) -> Self {
        Self { pool, connector }
    }
}

pub(crate) fn is_auth_rejection(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db) => db.code().map_or(false, |code| is_invalid_password_code(&code)),
        _ => false,
    }
}

fn is_invalid_password_code(code: &str) -> bool {
    code == INVALID_PASSWORD
}

#[async_trait]
impl CredentialGateway for PgCredentialGateway {
    async fn validate_credentials(&self, username: &str, server: &str, email: &str) -> Result<bool, GatewayError> {
        let (valid,): (Option<bool>,) = sqlx::query_as("SELECT validate_user_credentials($1, $2, $3)")
            .bind(username)
            .bind(server)
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(valid.unwrap_or(false))
    }

    async fn check_login_expiration(&self, username: &str, server: &str) -> Result<LoginExpirationStatus, GatewayError> {
        let row: Option<(Option<bool>, Option<bool>)> =
            sqlx::query_as("SELECT is_expired, is_valid FROM check_login_expiration($1, $2)")
                .bind(username)
                .bind(server)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            None => Err(GatewayError::LoginNotFound {
                login: username.to_string(),
                server: server.to_string(),
            }),
            Some((Some(is_expired), Some(is_valid))) => Ok(LoginExpirationStatus { is_expired, is_valid }),
            Some(_) => Err(GatewayError::IncompleteExpirationStatus { login: username.to_string() }),
        }
    }

    async fn verify_old_password(
        &self,
        username: &str,
        server: &str,
        old_password: &str,
        database: &str,
    ) -> Result<bool, GatewayError> {
        let credentials = TargetCredentials {
            username: username.to_string(),
            password: old_password.to_string(),
            database: Some(database.to_string()),
        };

        match self.connector.connect(server, &credentials).await {
            Ok(conn) => {
                if let Err(e) = conn.close().await {
                    tracing::debug!("Error closing verification connection to {}: {}", server, e);
                }
                Ok(true)
            }
            Err(e) if is_auth_rejection(&e) => {
                tracing::info!("Old password rejected by {}", server);
                Ok(false)
            }
            Err(source) => Err(GatewayError::Connect { server: server.to_string(), source }),
        }
    }

    async fn find_related_servers(&self, server: &str) -> Result<ReplicaSet, GatewayError> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT server_ip FROM find_related_servers($1)")
            .bind(server)
            .fetch_all(&self.pool)
            .await?;

        Ok(ReplicaSet::from_discovered(server, rows.into_iter().map(|(s,)| s).collect()))
    }

    async fn reset_password(
        &self,
        server: &str,
        command: ResetCommand<'_>,
        credentials: &TargetCredentials,
    ) -> Result<(), GatewayError> {
        let mut conn = self
            .connector
            .connect(server, credentials)
            .await
            .map_err(|source| GatewayError::Connect { server: server.to_string(), source })?;

        let result = sqlx::query("CALL reset_user_password($1, $2, $3, $4)")
            .bind(command.login)
            .bind(command.new_password)
            .bind(command.disable_policy)
            .bind(command.disable_expiration)
            .execute(&mut conn)
            .await;

        // Release the connection on both paths before reporting the outcome
        if let Err(e) = conn.close().await {
            tracing::debug!("Error closing reset connection to {}: {}", server, e);
        }

        result.map(|_| ()).map_err(GatewayError::from)
    }
}
