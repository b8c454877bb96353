/// Shared types used across the codebase

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Request type recorded in the audit log for every reset attempt
pub const REQUEST_TYPE_PASSWORD_UPDATE: &str = "Password Update";

/// Body of `PUT /update-password`
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PasswordResetRequest {
    pub username: String,
    #[serde(rename = "emailID")]
    pub email: String,
    pub old_password: String,
    pub new_password: String,
    #[serde(rename = "serverIP")]
    pub server_ip: String,
    pub database: String,
}

impl fmt::Debug for PasswordResetRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordResetRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("old_password", &"<redacted>")
            .field("new_password", &"<redacted>")
            .field("server_ip", &self.server_ip)
            .field("database", &self.database)
            .finish()
    }
}

impl PasswordResetRequest {
    /// Check field presence and shape. Returns a client-safe reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("username", &self.username),
            ("emailID", &self.email),
            ("oldPassword", &self.old_password),
            ("newPassword", &self.new_password),
            ("serverIP", &self.server_ip),
            ("database", &self.database),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("Field '{}' is required", field));
            }
        }

        validate_email_format(&self.email)?;
        validate_server_identifier(&self.server_ip)?;

        Ok(())
    }

    pub fn passwords_distinct(&self) -> bool {
        self.old_password != self.new_password
    }
}

/// Basic email shape check: exactly one '@' with non-empty local part and a dotted domain
pub fn validate_email_format(email: &str) -> Result<(), String> {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err("Invalid email format".to_string());
    }
    let domain = parts[1];
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

/// Accepts host names and IPv4/IPv6 literals, each with an optional port
/// (`db01:6432`, `[fe80::1]:5433`), plus an optional `\INSTANCE` suffix.
pub fn validate_server_identifier(server: &str) -> Result<(), String> {
    let instance = server.split_once('\\').map(|(_, instance)| instance);
    let (host, _) = split_target(server);

    if host.is_empty() || host.len() > 253 {
        return Err("Invalid server identifier".to_string());
    }
    if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
    {
        return Err("Invalid server identifier".to_string());
    }
    if let Some(instance) = instance {
        if instance.is_empty()
            || !instance.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        {
            return Err("Invalid server instance name".to_string());
        }
    }
    Ok(())
}

/// Split `host[:port]`, dropping a trailing `\INSTANCE` name. IPv6 literals
/// are taken as-is unless bracketed (`[::1]:5433`).
pub fn split_target(server: &str) -> (&str, Option<u16>) {
    let server = server.split('\\').next().unwrap_or(server);

    if let Some(rest) = server.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host, port);
        }
    }

    if server.parse::<std::net::IpAddr>().is_ok() {
        return (server, None);
    }

    match server.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, Some(port)),
            Err(_) => (server, None),
        },
        None => (server, None),
    }
}

/// Expiration flags reported by the credential store for one login
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginExpirationStatus {
    pub is_expired: bool,
    pub is_valid: bool,
}

impl LoginExpirationStatus {
    pub fn is_usable(&self) -> bool {
        self.is_valid && !self.is_expired
    }
}

/// Servers related to a primary, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaSet(Vec<String>);

impl ReplicaSet {
    /// Build from raw discovery rows, dropping blanks and the primary itself.
    pub fn from_discovered(primary: &str, servers: Vec<String>) -> Self {
        let replicas = servers
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(primary))
            .collect();
        Self(replicas)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Steps of the password reset pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStep {
    Received,
    InputValidated,
    CredentialsValidated,
    PasswordsDistinct,
    LoginUsable,
    OldPasswordConfirmed,
    ReplicasDiscovered,
    PrimaryUpdated,
    ReplicasUpdated,
}

impl ResetStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetStep::Received => "request received",
            ResetStep::InputValidated => "input validation",
            ResetStep::CredentialsValidated => "credential validation",
            ResetStep::PasswordsDistinct => "password comparison",
            ResetStep::LoginUsable => "login expiration check",
            ResetStep::OldPasswordConfirmed => "old password verification",
            ResetStep::ReplicasDiscovered => "replica discovery",
            ResetStep::PrimaryUpdated => "primary password update",
            ResetStep::ReplicasUpdated => "replica password update",
        }
    }
}

impl fmt::Display for ResetStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of an audit record. Rendered to text only when written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditStatus {
    Pending,
    Succeeded,
    FailedAt(ResetStep, String),
}

impl AuditStatus {
    /// Value stored in the `request_status` column
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Pending => "Pending",
            AuditStatus::Succeeded => "Success",
            AuditStatus::FailedAt(..) => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AuditStatus::Pending)
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditStatus::FailedAt(step, reason) => write!(f, "Failed at {}: {}", step, reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One append-only row of the reset audit trail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetAuditRecord {
    pub username: String,
    pub server_ip: String,
    pub request_type: String,
    pub status: AuditStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ResetAuditRecord {
    pub fn new(
        username: impl Into<String>,
        server_ip: impl Into<String>,
        status: AuditStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            server_ip: server_ip.into(),
            request_type: REQUEST_TYPE_PASSWORD_UPDATE.to_string(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Message column text; failures carry the step that failed
    pub fn stored_message(&self) -> String {
        match &self.status {
            AuditStatus::FailedAt(step, reason) if self.message.is_empty() => {
                format!("{} failed: {}", step, reason)
            }
            AuditStatus::FailedAt(step, reason) => {
                format!("{} ({} failed: {})", self.message, step, reason)
            }
            _ => self.message.clone(),
        }
    }
}

/// Row returned by `GET /getAllResetReq`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResetLogEntry {
    #[serde(rename = "requestID")]
    pub request_id: i64,
    pub username: String,
    #[serde(rename = "serverIP")]
    pub server_ip: String,
    #[serde(rename = "requestType")]
    pub request_type: String,
    #[serde(rename = "requestStatus")]
    pub request_status: String,
    pub message: String,
    #[serde(rename = "requestTime")]
    pub request_time: String,
}

impl ResetLogEntry {
    pub fn format_request_time(time: Option<NaiveDateTime>) -> String {
        match time {
            Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "N/A".to_string(),
        }
    }
}

/// Which login is used when connecting to a target server to apply a reset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialPolicy {
    /// Shared administrative login; forces the reset
    UseAdminCredentials,
    /// The end user's own login and old password; minimum privilege
    UseCallerCredentials,
}

impl FromStr for CredentialPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "use_admin_credentials" => Ok(CredentialPolicy::UseAdminCredentials),
            "caller" | "user" | "use_caller_credentials" => Ok(CredentialPolicy::UseCallerCredentials),
            other => Err(format!("unknown credential policy '{}'", other)),
        }
    }
}

/// Login used to open a connection against a target server
#[derive(Clone, PartialEq, Eq)]
pub struct TargetCredentials {
    pub username: String,
    pub password: String,
    pub database: Option<String>,
}

impl fmt::Debug for TargetCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Arguments of the privileged reset procedure
#[derive(Clone, Copy)]
pub struct ResetCommand<'a> {
    pub login: &'a str,
    pub new_password: &'a str,
    pub disable_policy: bool,
    pub disable_expiration: bool,
}

impl fmt::Debug for ResetCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetCommand")
            .field("login", &self.login)
            .field("new_password", &"<redacted>")
            .field("disable_policy", &self.disable_policy)
            .field("disable_expiration", &self.disable_expiration)
            .finish()
    }
}
