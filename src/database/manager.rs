use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Failed to connect to {store} store after {attempts} attempt(s): {source}")]
    ConnectFailed {
        store: &'static str,
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to execute SQL script {path}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Process-wide connection pools for the audit store and the credential store.
/// Built once at startup and handed to the components that need them.
pub struct DatabaseManager {
    audit_pool: PgPool,
    credential_pool: PgPool,
}

impl DatabaseManager {
    /// Connect both stores with bounded retries and fixed backoff
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let audit_url = config
            .audit
            .connection_url()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL or DB_HOST"))?;
        let credential_url = config
            .credential
            .connection_url()
            .ok_or(DatabaseError::ConfigMissing("CREDENTIAL_DATABASE_URL or CREDENTIAL_DB_HOST"))?;

        let audit_pool = Self::connect_with_retry("audit", &audit_url, config).await?;
        let credential_pool = Self::connect_with_retry("credential", &credential_url, config).await?;

        Ok(Self { audit_pool, credential_pool })
    }

    async fn connect_with_retry(
        store: &'static str,
        url: &str,
        config: &DatabaseConfig,
    ) -> Result<PgPool, DatabaseError> {
        let attempts = config.connect_retries.max(1);
        let backoff = Duration::from_secs(config.retry_backoff_secs);
        let mut attempt = 1;

        loop {
            let result = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(Duration::from_secs(config.connection_timeout))
                .connect(url)
                .await;

            match result {
                Ok(pool) => {
                    info!("Connected to {} store (attempt {}/{})", store, attempt, attempts);
                    return Ok(pool);
                }
                Err(e) if attempt < attempts => {
                    warn!("Attempt {}/{}: failed to connect to {} store: {}", attempt, attempts, store, e);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(source) => {
                    return Err(DatabaseError::ConnectFailed { store, attempts, source });
                }
            }
        }
    }

    /// Install procedures and tables, then seed the admin account if configured
    pub async fn initialize(&self, config: &DatabaseConfig) -> Result<(), DatabaseError> {
        if config.run_scripts {
            Self::run_scripts(&self.audit_pool, Path::new(&config.audit_scripts_dir)).await?;
            Self::run_scripts(&self.credential_pool, Path::new(&config.credential_scripts_dir)).await?;
        }

        sqlx::query("CALL create_pass_reset_logs_table()")
            .execute(&self.audit_pool)
            .await?;
        info!("Password reset logs table ready");

        sqlx::query("CALL create_admin_table()")
            .execute(&self.audit_pool)
            .await?;
        info!("Admin table ready");

        if let Some(seed) = &config.admin_seed {
            sqlx::query("SELECT insert_into_admin($1, $2)")
                .bind(&seed.username)
                .bind(&seed.password)
                .execute(&self.audit_pool)
                .await?;
            info!("Seeded admin account '{}'", seed.username);
        }

        Ok(())
    }

    /// Execute every `.sql` file in `dir` in file-name order
    async fn run_scripts(pool: &PgPool, dir: &Path) -> Result<(), DatabaseError> {
        let scripts = match Self::list_scripts(dir).await {
            Ok(scripts) => scripts,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("SQL script directory {} not found, skipping", dir.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        for path in scripts {
            let sql = tokio::fs::read_to_string(&path).await?;
            info!("Executing SQL script {}", path.display());
            pool.execute(sql.as_str())
                .await
                .map_err(|source| DatabaseError::Script { path: path.clone(), source })?;
        }

        Ok(())
    }

    async fn list_scripts(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut scripts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && path.extension().map_or(false, |ext| ext == "sql") {
                scripts.push(path);
            }
        }
        scripts.sort();
        Ok(scripts)
    }

    pub fn audit_pool(&self) -> PgPool {
        self.audit_pool.clone()
    }

    pub fn credential_pool(&self) -> PgPool {
        self.credential_pool.clone()
    }

    /// Close both pools (e.g., on shutdown)
    pub async fn close(&self) {
        self.audit_pool.close().await;
        info!("Closed audit store pool");
        self.credential_pool.close().await;
        info!("Closed credential store pool");
    }
}
