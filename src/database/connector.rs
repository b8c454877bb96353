use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{ConnectOptions, PgConnection};

use crate::types::{split_target, TargetCredentials};

const APPLICATION_NAME: &str = "dba-self-service";

/// Opens short-lived connections to individual target database servers.
/// Callers own the returned connection and must close it.
#[derive(Debug, Clone)]
pub struct TargetConnector {
    default_port: u16,
    require_tls: bool,
}

impl TargetConnector {
    pub fn new(default_port: u16, require_tls: bool) -> Self {
        Self { default_port, require_tls }
    }

    pub fn options(&self, server: &str, credentials: &TargetCredentials) -> PgConnectOptions {
        let (host, port) = split_target(server);
        let mut options = PgConnectOptions::new()
            .host(host)
            .port(port.unwrap_or(self.default_port))
            .username(&credentials.username)
            .password(&credentials.password)
            .application_name(APPLICATION_NAME)
            .ssl_mode(if self.require_tls { PgSslMode::Require } else { PgSslMode::Prefer });

        if let Some(database) = &credentials.database {
            options = options.database(database);
        }

        options
    }

    pub async fn connect(
        &self,
        server: &str,
        credentials: &TargetCredentials,
    ) -> Result<PgConnection, sqlx::Error> {
        tracing::debug!("Opening connection to {} as {}", server, credentials.username);
        self.options(server, credentials).connect().await
    }
}
