//! `minirag-server` exposes document upload and question answering over HTTP.
//! Each browser session owns its own index.

pub mod protocol;
pub mod server;
pub mod session;

pub use server::{ApiError, AppState, ServerConfig, app_router, run_server};
