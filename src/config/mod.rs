use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::types::CredentialPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub target: TargetConfig,
    pub security: SecurityConfig,
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

/// Connection settings for the audit store and the credential store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub audit: StoreConnection,
    pub credential: StoreConnection,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub connect_retries: u32,
    pub retry_backoff_secs: u64,
    pub run_scripts: bool,
    pub audit_scripts_dir: String,
    pub credential_scripts_dir: String,
    pub admin_seed: Option<AdminSeed>,
}

/// Either a full URL or discrete host/port/user/password/name parts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConnection {
    pub url: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct AdminSeed {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSeed").field("username", &self.username).finish_non_exhaustive()
    }
}

/// How the reset is applied to target database servers
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub port: u16,
    pub admin_user: String,
    #[serde(skip_serializing)]
    pub admin_password: String,
    pub credential_policy: CredentialPolicy,
    pub disable_policy: bool,
    pub disable_expiration: bool,
    pub call_timeout_secs: u64,
    pub require_tls: bool,
    pub verify_old_password: bool,
}

impl std::fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetConfig")
            .field("port", &self.port)
            .field("admin_user", &self.admin_user)
            .field("credential_policy", &self.credential_policy)
            .field("disable_policy", &self.disable_policy)
            .field("disable_expiration", &self.disable_expiration)
            .field("call_timeout_secs", &self.call_timeout_secs)
            .field("require_tls", &self.require_tls)
            .field("verify_old_password", &self.verify_old_password)
            .finish_non_exhaustive()
    }
}

impl TargetConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }

    /// Reject settings that would make every reset fail at the primary server
    pub fn validate(&self) -> Result<(), String> {
        if self.credential_policy == CredentialPolicy::UseAdminCredentials
            && self.admin_user.trim().is_empty()
        {
            return Err("TARGET_ADMIN_USER is required when TARGET_CREDENTIAL_POLICY is admin".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub from_address: String,
    /// Connect and command timeout for the relay
    pub timeout_secs: u64,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("from_address", &self.from_address)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Non-empty environment variable
fn get_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(v) = get_env("APP_PORT").or_else(|| get_env("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        self.database.audit = StoreConnection::from_env("DATABASE_URL", "DB");
        self.database.credential = StoreConnection::from_env("CREDENTIAL_DATABASE_URL", "CREDENTIAL_DB");
        if let Some(v) = get_env("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = get_env("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Some(v) = get_env("DATABASE_CONNECT_RETRIES") {
            self.database.connect_retries = v.parse().unwrap_or(self.database.connect_retries);
        }
        if let Some(v) = get_env("DATABASE_RETRY_BACKOFF_SECS") {
            self.database.retry_backoff_secs = v.parse().unwrap_or(self.database.retry_backoff_secs);
        }
        if let Some(v) = get_env("DATABASE_RUN_SCRIPTS") {
            self.database.run_scripts = v.parse().unwrap_or(self.database.run_scripts);
        }
        if let Some(v) = get_env("AUDIT_SCRIPTS_DIR") {
            self.database.audit_scripts_dir = v;
        }
        if let Some(v) = get_env("CREDENTIAL_SCRIPTS_DIR") {
            self.database.credential_scripts_dir = v;
        }
        if let (Some(username), Some(password)) = (get_env("ADMIN_SEED_USERNAME"), get_env("ADMIN_SEED_PASSWORD")) {
            self.database.admin_seed = Some(AdminSeed { username, password });
        }

        // Target overrides
        if let Some(v) = get_env("TARGET_DB_PORT") {
            self.target.port = v.parse().unwrap_or(self.target.port);
        }
        if let Some(v) = get_env("TARGET_ADMIN_USER") {
            self.target.admin_user = v;
        }
        if let Some(v) = get_env("TARGET_ADMIN_PASSWORD") {
            self.target.admin_password = v;
        }
        if let Some(v) = get_env("TARGET_CREDENTIAL_POLICY") {
            match v.parse() {
                Ok(policy) => self.target.credential_policy = policy,
                Err(e) => tracing::warn!("Ignoring TARGET_CREDENTIAL_POLICY: {}", e),
            }
        }
        if let Some(v) = get_env("TARGET_DISABLE_POLICY") {
            self.target.disable_policy = v.parse().unwrap_or(self.target.disable_policy);
        }
        if let Some(v) = get_env("TARGET_DISABLE_EXPIRATION") {
            self.target.disable_expiration = v.parse().unwrap_or(self.target.disable_expiration);
        }
        if let Some(v) = get_env("TARGET_CALL_TIMEOUT_SECS") {
            self.target.call_timeout_secs = v.parse().unwrap_or(self.target.call_timeout_secs);
        }
        if let Some(v) = get_env("TARGET_REQUIRE_TLS") {
            self.target.require_tls = v.parse().unwrap_or(self.target.require_tls);
        }
        if let Some(v) = get_env("RESET_VERIFY_OLD_PASSWORD") {
            self.target.verify_old_password = v.parse().unwrap_or(self.target.verify_old_password);
        }

        // Security overrides
        if let Some(v) = get_env("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = parse_origins(&v);
        }

        self.smtp = SmtpConfig::from_env();

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 8080 },
            database: DatabaseConfig {
                audit: StoreConnection::default(),
                credential: StoreConnection::default(),
                max_connections: 5,
                connection_timeout: 30,
                connect_retries: 5,
                retry_backoff_secs: 2,
                run_scripts: true,
                audit_scripts_dir: "sql/audit".to_string(),
                credential_scripts_dir: "sql/credential".to_string(),
                admin_seed: None,
            },
            target: TargetConfig {
                port: 5432,
                admin_user: String::new(),
                admin_password: String::new(),
                credential_policy: CredentialPolicy::UseAdminCredentials,
                disable_policy: false,
                disable_expiration: false,
                call_timeout_secs: 30,
                require_tls: false,
                verify_old_password: true,
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:5173".to_string()],
            },
            smtp: None,
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 10;
        config.database.connection_timeout = 10;
        config.target.call_timeout_secs = 15;
        config.target.require_tls = true;
        config.security.cors_origins = vec![];
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 20;
        config.database.connection_timeout = 5;
        config.database.run_scripts = false;
        config.target.call_timeout_secs = 10;
        config.target.require_tls = true;
        config.security.cors_origins = vec![];
        config
    }
}

impl StoreConnection {
    /// Read `<url_key>` or, failing that, `<prefix>_HOST/_PORT/_USER/_PASSWORD/_NAME`
    fn from_env(url_key: &str, prefix: &str) -> Self {
        Self {
            url: get_env(url_key),
            host: get_env(&format!("{}_HOST", prefix)),
            port: get_env(&format!("{}_PORT", prefix)).and_then(|v| v.parse().ok()),
            user: get_env(&format!("{}_USER", prefix)),
            password: get_env(&format!("{}_PASSWORD", prefix)),
            name: get_env(&format!("{}_NAME", prefix)),
        }
    }

    /// Resolve to a postgres connection URL
    pub fn connection_url(&self) -> Option<String> {
        if let Some(url) = &self.url {
            return Some(url.clone());
        }

        let host = self.host.as_deref()?;
        let mut url = url::Url::parse(&format!("postgres://{}", host)).ok()?;
        url.set_port(Some(self.port.unwrap_or(5432))).ok()?;
        if let Some(user) = &self.user {
            url.set_username(user).ok()?;
        }
        if let Some(password) = &self.password {
            url.set_password(Some(password)).ok()?;
        }
        if let Some(name) = &self.name {
            url.set_path(&format!("/{}", name));
        }
        url.query_pairs_mut().append_pair("sslmode", "prefer");
        Some(url.into())
    }
}

impl SmtpConfig {
    /// Requires SMTP_SERVER and SMTP_FROM; SMTP_USERNAME defaults to SMTP_FROM
    pub fn from_env() -> Option<Self> {
        let host = get_env("SMTP_SERVER")?;
        let from_address = get_env("SMTP_FROM")?;
        let username = get_env("SMTP_USERNAME").unwrap_or_else(|| from_address.clone());
        let password = get_env("SMTP_PASSWORD").unwrap_or_default();
        let port = get_env("SMTP_PORT").and_then(|s| s.parse().ok()).unwrap_or(587);
        let timeout_secs = get_env("SMTP_TIMEOUT_SECS").and_then(|s| s.parse().ok()).unwrap_or(10);

        Some(Self { host, port, username, password, from_address, timeout_secs })
    }
}

fn parse_origins(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
