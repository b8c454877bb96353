use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use dba_self_service::config::AppConfig;
use dba_self_service::database::{DatabaseManager, PgAuditStore, PgCredentialGateway, TargetConnector};
use dba_self_service::email::{ConsoleEmailSender, EmailSender, SmtpEmailSender};
use dba_self_service::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SMTP_SERVER, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    config
        .target
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid target configuration")?;
    tracing::info!("Starting DBA self-service backend in {:?} mode", config.environment);

    let database = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to the audit and credential stores")?;
    database
        .initialize(&config.database)
        .await
        .context("failed to initialize store procedures")?;

    let audit_store = Arc::new(PgAuditStore::new(database.audit_pool()));
    let gateway = Arc::new(PgCredentialGateway::new(
        database.credential_pool(),
        TargetConnector::new(config.target.port, config.target.require_tls),
    ));

    let state = Arc::new(AppState::new(gateway, audit_store, email_sender(&config), &config.target));
    let router = app(state, &config.security);

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("DBA self-service backend listening on http://{}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    database.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

fn email_sender(config: &AppConfig) -> Arc<dyn EmailSender> {
    match &config.smtp {
        Some(smtp) => match SmtpEmailSender::new(smtp) {
            Ok(sender) => Arc::new(sender),
            Err(e) => {
                tracing::warn!("{}; falling back to console email sender", e);
                Arc::new(ConsoleEmailSender::new())
            }
        },
        None => {
            tracing::info!("SMTP not configured, confirmation emails go to the log");
            Arc::new(ConsoleEmailSender::new())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
