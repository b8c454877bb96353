pub mod app;
pub mod config;
pub mod database;
pub mod email;
pub mod error;
pub mod handlers;
pub mod services;
pub mod state;
pub mod types;

pub use app::app;
pub use state::AppState;
