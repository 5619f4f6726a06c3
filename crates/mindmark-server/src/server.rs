use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use directories::ProjectDirs;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    auth::require_session,
    handlers::{
        create_content, create_share_link, delete_content, health, list_content,
        open_share_link, signin, signup,
    },
    session::SessionTokens,
    store::Store,
    AppState,
};

const DB_FILE: &str = "mindmark.db";

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding the database file ($MINDMARK_DATA_DIR).
    pub data_dir: Option<PathBuf>,
    /// Session signing secret ($MINDMARK_JWT_SECRET). See `resolve_jwt_secret`.
    pub jwt_secret: Option<String>,
    /// Public base URL for share links ($MINDMARK_BASE_URL).
    pub base_url: Option<String>,
    pub cors_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: std::env::var("MINDMARK_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("MINDMARK_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            data_dir: std::env::var("MINDMARK_DATA_DIR").ok().map(PathBuf::from),
            jwt_secret: std::env::var("MINDMARK_JWT_SECRET").ok(),
            base_url: std::env::var("MINDMARK_BASE_URL").ok(),
            cors_origins: std::env::var("MINDMARK_CORS_ORIGINS").ok(),
        }
    }
}

impl ServerConfig {
    /// Share links point here unless `base_url` is set.
    pub fn effective_base_url(&self) -> String {
        match &self.base_url {
            Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_owned(),
            _ => {
                let host = match self.host.as_str() {
                    "0.0.0.0" | "::" | "" => "localhost",
                    h => h,
                };
                format!("http://{host}:{}", self.port)
            }
        }
    }
}

/// Read a secret from a file, trimming surrounding whitespace.
/// Fails if the file cannot be read or is empty after trimming.
pub fn read_secret_file(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read secret file: {}", path.display()))?;
    let secret = content.trim().to_string();
    if secret.is_empty() {
        anyhow::bail!("secret file is empty: {}", path.display());
    }
    Ok(secret)
}

/// Resolve the signing secret from `MINDMARK_JWT_SECRET_FILE` (preferred) or
/// the configured value. Emptiness is checked by `SessionTokens::new`.
pub fn resolve_jwt_secret(configured: Option<&str>) -> Result<String> {
    if let Ok(path) = std::env::var("MINDMARK_JWT_SECRET_FILE") {
        let secret = read_secret_file(Path::new(&path))?;
        if configured.is_some() {
            warn!("both MINDMARK_JWT_SECRET and MINDMARK_JWT_SECRET_FILE are set; using file");
        }
        return Ok(secret);
    }
    Ok(configured.unwrap_or_default().to_owned())
}

/// Resolve (and create) the data directory: explicit path first, then the
/// platform data dir (`~/.local/share/mindmark/`, etc.).
pub fn resolve_data_dir(data_dir: Option<&PathBuf>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(d) => d.clone(),
        None => ProjectDirs::from("", "", "mindmark")
            .context("could not determine platform data directory")?
            .data_dir()
            .to_owned(),
    };
    std::fs::create_dir_all(&dir).context("create data dir")?;
    Ok(dir)
}

/// Build the API router. Everything under `/api/v1` except signup and
/// signin sits behind the session gate.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/api/v1/signup", post(signup))
        .route("/api/v1/signin", post(signin));

    let protected = Router::new()
        .route(
            "/api/v1/content",
            get(list_content).post(create_content).delete(delete_content),
        )
        .route("/api/v1/brain/share", post(create_share_link))
        .route("/api/v1/brain/{share_link}", get(open_share_link))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .with_state(state)
}

pub async fn run(cfg: ServerConfig) -> Result<()> {
    let data_dir = resolve_data_dir(cfg.data_dir.as_ref())?;
    info!(data_dir = %data_dir.display(), "using data directory");

    let secret = resolve_jwt_secret(cfg.jwt_secret.as_deref())?;
    let sessions = SessionTokens::new(&secret)?;

    let store = Store::open(&data_dir.join(DB_FILE)).context("open store")?;

    let base_url = cfg.effective_base_url();
    info!(%base_url, "share links use base url");

    let state = AppState {
        store,
        sessions,
        base_url,
    };

    let app = router(state)
        .layer(build_cors(cfg.cors_origins.as_deref()))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .context("invalid host/port")?;

    info!(%addr, "mindmark server listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind listener")?;

    axum::serve(listener, app).await.context("server error")
}

fn build_cors(origins: Option<&str>) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::DELETE,
            http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    match origins {
        Some(o) => {
            let origins: Vec<_> = o.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            cors.allow_origin(origins)
        }
        None => cors.allow_origin(Any),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, base_url: Option<&str>) -> ServerConfig {
        ServerConfig {
            host: host.into(),
            port: 3000,
            data_dir: None,
            jwt_secret: None,
            base_url: base_url.map(Into::into),
            cors_origins: None,
        }
    }

    #[test]
    fn base_url_defaults_to_localhost() {
        assert_eq!(
            config("0.0.0.0", None).effective_base_url(),
            "http://localhost:3000"
        );
        assert_eq!(
            config("10.0.0.5", None).effective_base_url(),
            "http://10.0.0.5:3000"
        );
    }

    #[test]
    fn configured_base_url_drops_trailing_slash() {
        assert_eq!(
            config("0.0.0.0", Some("https://brain.example/")).effective_base_url(),
            "https://brain.example"
        );
    }

    #[test]
    fn secret_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jwt.secret");
        std::fs::write(&path, "  s3cret\n").unwrap();
        assert_eq!(read_secret_file(&path).unwrap(), "s3cret");

        std::fs::write(&path, "\n").unwrap();
        assert!(read_secret_file(&path).is_err());
    }

    #[test]
    fn explicit_data_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        assert_eq!(resolve_data_dir(Some(&nested)).unwrap(), nested);
        assert!(nested.is_dir());
    }
}
