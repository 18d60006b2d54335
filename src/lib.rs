pub mod app;
pub mod auth_middleware;
pub mod banner;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod notifier;
pub mod routes;
pub mod shutdown;
pub mod tunnel;

pub use app::build_app;
