#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use dba_self_service::database::{AuditError, AuditStore, CredentialGateway, GatewayError};
use dba_self_service::email::EmailSender;
use dba_self_service::services::ResetSettings;
use dba_self_service::types::{
    AuditStatus, CredentialPolicy, LoginExpirationStatus, PasswordResetRequest, ReplicaSet,
    ResetAuditRecord, ResetCommand, ResetLogEntry, TargetCredentials,
};
use dba_self_service::AppState;

pub const USERNAME: &str = "app_login";
pub const PRIMARY: &str = "10.0.0.5";
pub const EMAIL: &str = "owner@example.com";
pub const OLD_PASSWORD: &str = "Old#Pass1";
pub const NEW_PASSWORD: &str = "New#Pass2";

pub fn request() -> PasswordResetRequest {
    PasswordResetRequest {
        username: USERNAME.into(),
        email: EMAIL.into(),
        old_password: OLD_PASSWORD.into(),
        new_password: NEW_PASSWORD.into(),
        server_ip: PRIMARY.into(),
        database: "sales".into(),
    }
}

pub fn settings() -> ResetSettings {
    ResetSettings {
        credential_policy: CredentialPolicy::UseAdminCredentials,
        admin_credentials: TargetCredentials {
            username: "sa_reset".into(),
            password: "admin-pass".into(),
            database: None,
        },
        disable_policy: false,
        disable_expiration: false,
        verify_old_password: false,
        call_timeout: Duration::from_secs(2),
    }
}

/// One `reset_password` round trip as seen by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetCall {
    pub server: String,
    pub login: String,
    pub connect_as: String,
}

/// In-memory credential store and target fleet
pub struct FakeGateway {
    pub credentials_valid: Mutex<bool>,
    pub validate_fails: Mutex<bool>,
    pub expiration: Mutex<Option<LoginExpirationStatus>>,
    pub expiration_fails: Mutex<bool>,
    pub old_password_accepted: Mutex<bool>,
    pub old_password_fails: Mutex<bool>,
    pub discovery_fails: Mutex<bool>,
    pub discovered: Mutex<Vec<String>>,
    pub failing_servers: Mutex<HashSet<String>>,
    pub slow_servers: Mutex<HashMap<String, Duration>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub resets: Mutex<Vec<ResetCall>>,
    /// Current password per (server, login)
    pub passwords: Mutex<HashMap<(String, String), String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            credentials_valid: Mutex::new(true),
            validate_fails: Mutex::new(false),
            expiration: Mutex::new(Some(LoginExpirationStatus { is_expired: false, is_valid: true })),
            expiration_fails: Mutex::new(false),
            old_password_accepted: Mutex::new(true),
            old_password_fails: Mutex::new(false),
            discovery_fails: Mutex::new(false),
            discovered: Mutex::new(Vec::new()),
            failing_servers: Mutex::new(HashSet::new()),
            slow_servers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            resets: Mutex::new(Vec::new()),
            passwords: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_replicas(replicas: &[&str]) -> Self {
        let gateway = Self::new();
        *gateway.discovered.lock().unwrap() = replicas.iter().map(|s| s.to_string()).collect();
        gateway
    }

    pub fn fail_on(&self, server: &str) {
        self.failing_servers.lock().unwrap().insert(server.to_string());
    }

    pub fn slow_on(&self, server: &str, delay: Duration) {
        self.slow_servers.lock().unwrap().insert(server.to_string(), delay);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_servers(&self) -> Vec<String> {
        self.resets.lock().unwrap().iter().map(|c| c.server.clone()).collect()
    }

    pub fn resets(&self) -> Vec<ResetCall> {
        self.resets.lock().unwrap().clone()
    }

    pub fn password_on(&self, server: &str) -> Option<String> {
        self.passwords
            .lock()
            .unwrap()
            .get(&(server.to_string(), USERNAME.to_string()))
            .cloned()
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CredentialGateway for FakeGateway {
    async fn validate_credentials(&self, _username: &str, _server: &str, _email: &str) -> Result<bool, GatewayError> {
        self.record("validate_credentials");
        if *self.validate_fails.lock().unwrap() {
            return Err(GatewayError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        Ok(*self.credentials_valid.lock().unwrap())
    }

    async fn check_login_expiration(&self, username: &str, server: &str) -> Result<LoginExpirationStatus, GatewayError> {
        self.record("check_login_expiration");
        if *self.expiration_fails.lock().unwrap() {
            return Err(GatewayError::IncompleteExpirationStatus { login: username.to_string() });
        }
        let status = *self.expiration.lock().unwrap();
        status.ok_or_else(|| GatewayError::LoginNotFound {
            login: username.to_string(),
            server: server.to_string(),
        })
    }

    async fn verify_old_password(
        &self,
        _username: &str,
        server: &str,
        _old_password: &str,
        _database: &str,
    ) -> Result<bool, GatewayError> {
        self.record("verify_old_password");
        if *self.old_password_fails.lock().unwrap() {
            return Err(GatewayError::Connect {
                server: server.to_string(),
                source: sqlx::Error::PoolTimedOut,
            });
        }
        Ok(*self.old_password_accepted.lock().unwrap())
    }

    async fn find_related_servers(&self, server: &str) -> Result<ReplicaSet, GatewayError> {
        self.record("find_related_servers");
        if *self.discovery_fails.lock().unwrap() {
            return Err(GatewayError::Sqlx(sqlx::Error::PoolTimedOut));
        }
        let discovered = self.discovered.lock().unwrap().clone();
        Ok(ReplicaSet::from_discovered(server, discovered))
    }

    async fn reset_password(
        &self,
        server: &str,
        command: ResetCommand<'_>,
        credentials: &TargetCredentials,
    ) -> Result<(), GatewayError> {
        self.record("reset_password");
        self.resets.lock().unwrap().push(ResetCall {
            server: server.to_string(),
            login: command.login.to_string(),
            connect_as: credentials.username.clone(),
        });

        let delay = self.slow_servers.lock().unwrap().get(server).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_servers.lock().unwrap().contains(server) {
            return Err(GatewayError::Connect {
                server: server.to_string(),
                source: sqlx::Error::PoolTimedOut,
            });
        }

        self.passwords.lock().unwrap().insert(
            (server.to_string(), command.login.to_string()),
            command.new_password.to_string(),
        );
        Ok(())
    }
}

/// Audit store that keeps records in memory
pub struct FakeAuditStore {
    pub records: Mutex<Vec<ResetAuditRecord>>,
    pub admins: Mutex<HashMap<String, String>>,
    pub unavailable: Mutex<bool>,
}

impl FakeAuditStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            admins: Mutex::new(HashMap::new()),
            unavailable: Mutex::new(false),
        }
    }

    pub fn with_admin(username: &str, password: &str) -> Self {
        let store = Self::new();
        store.admins.lock().unwrap().insert(username.to_string(), password.to_string());
        store
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn records(&self) -> Vec<ResetAuditRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn terminal_records(&self) -> Vec<ResetAuditRecord> {
        self.records().into_iter().filter(|r| r.status.is_terminal()).collect()
    }

    pub fn last_status(&self) -> Option<AuditStatus> {
        self.records().last().map(|r| r.status.clone())
    }

    fn check_available(&self) -> Result<(), AuditError> {
        if *self.unavailable.lock().unwrap() {
            return Err(AuditError::Unavailable("audit store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuditStore for FakeAuditStore {
    async fn append(&self, record: &ResetAuditRecord) -> Result<(), AuditError> {
        self.check_available()?;
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ResetLogEntry>, AuditError> {
        self.check_available()?;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .enumerate()
            .rev()
            .map(|(i, r)| ResetLogEntry {
                request_id: i as i64 + 1,
                username: r.username.clone(),
                server_ip: r.server_ip.clone(),
                request_type: r.request_type.clone(),
                request_status: r.status.as_str().to_string(),
                message: r.stored_message(),
                request_time: ResetLogEntry::format_request_time(Some(r.timestamp.naive_utc())),
            })
            .collect())
    }

    async fn check_admin_credentials(&self, username: &str, password: &str) -> Result<bool, AuditError> {
        self.check_available()?;
        Ok(self.admins.lock().unwrap().get(username).map_or(false, |p| p == password))
    }

    async fn health_check(&self) -> Result<(), AuditError> {
        self.check_available()
    }
}

/// Email sender that remembers what it was asked to send
pub struct MockEmailSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
    /// Blocks the sending thread, like a relay that never answers
    pub delay: Option<Duration>,
}

impl MockEmailSender {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail: false, delay: None }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn stalled(delay: Duration) -> Self {
        Self { delay: Some(delay), ..Self::new() }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Sends happen off the request path; poll until `count` have arrived
    pub async fn wait_for(&self, count: usize) -> Vec<(String, String)> {
        for _ in 0..100 {
            if self.sent.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.sent()
    }
}

impl EmailSender for MockEmailSender {
    fn send_reset_confirmation(&self, email: &str, username: &str) -> Result<(), String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.sent.lock().unwrap().push((email.to_string(), username.to_string()));
        if self.fail {
            return Err("SMTP relay refused connection".to_string());
        }
        Ok(())
    }
}

/// Everything a test needs to drive the service and inspect collaborators
pub struct Harness {
    pub gateway: Arc<FakeGateway>,
    pub audit: Arc<FakeAuditStore>,
    pub email: Arc<MockEmailSender>,
    pub state: Arc<AppState>,
}

impl Harness {
    pub fn new(gateway: FakeGateway) -> Self {
        Self::build(gateway, FakeAuditStore::new(), MockEmailSender::new(), settings())
    }

    pub fn build(
        gateway: FakeGateway,
        audit: FakeAuditStore,
        email: MockEmailSender,
        settings: ResetSettings,
    ) -> Self {
        let gateway = Arc::new(gateway);
        let audit = Arc::new(audit);
        let email = Arc::new(email);
        let state = Arc::new(AppState::with_settings(
            gateway.clone(),
            audit.clone(),
            email.clone(),
            settings,
        ));
        Self { gateway, audit, email, state }
    }
}
