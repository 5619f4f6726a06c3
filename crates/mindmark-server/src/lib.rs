pub mod accounts;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod session;
pub mod store;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: store::Store,
    pub sessions: session::SessionTokens,
    /// Public base URL that share links are built on.
    pub base_url: String,
}

impl AppState {
    pub fn shareable_url(&self, hash: &str) -> String {
        format!("{}/shared/{}", self.base_url.trim_end_matches('/'), hash)
    }
}

pub use error::{AppError, FieldError};
pub use server::{read_secret_file, resolve_data_dir, router, run, ServerConfig};
