// handlers/mod.rs - HTTP handlers
//
// Public (no auth): password reset, admin login, service info and health.
// The audit listing is read-only and sits behind the admin login redirect.

pub mod admin;
pub mod health;
pub mod password;
pub mod reset_requests;

pub use admin::admin_login;
pub use health::{actuator_info, health};
pub use password::update_password;
pub use reset_requests::get_all_reset_requests;
