//! HTTP surface (Axum). Handlers are thin pass-throughs to the core.

pub mod api;
pub mod router;
pub mod server;
pub mod state;

pub use router::create_app_router;
pub use server::{run_server, WebServerConfig};
pub use state::AppState;
