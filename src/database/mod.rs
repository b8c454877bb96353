pub mod audit;
pub mod connector;
pub mod credential;
pub mod manager;

pub use audit::{AuditError, AuditStore, PgAuditStore};
pub use connector::TargetConnector;
pub use credential::{CredentialGateway, GatewayError, PgCredentialGateway};
pub use manager::{DatabaseError, DatabaseManager};
