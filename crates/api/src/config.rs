use std::path::PathBuf;
use std::time::Duration;

use explorer_core::merge::DEFAULT_REMOTE_TIMEOUT;

/// Server configuration loaded from environment variables.
///
/// All fields except the admin token have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound on a single relational store call in seconds (default: `5`).
    pub remote_timeout_secs: u64,
    /// Directory holding the local cache blobs.
    pub local_cache_dir: PathBuf,
    /// Static guide collection (JSON array).
    pub guides_path: PathBuf,
    /// Curated seed comments (JSON array).
    pub seed_comments_path: PathBuf,
    /// Shared secret expected in the `x-admin-token` header. Admin routes
    /// refuse every request while unset.
    pub admin_token: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                       |
    /// |-----------------------------|-------------------------------|
    /// | `HOST`                      | `0.0.0.0`                     |
    /// | `PORT`                      | `3000`                        |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`       |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                          |
    /// | `REMOTE_FETCH_TIMEOUT_SECS` | `5`                           |
    /// | `LOCAL_CACHE_DIR`           | `./data/local`                |
    /// | `GUIDES_PATH`               | `./data/guides.json`          |
    /// | `SEED_COMMENTS_PATH`        | `./data/seed_comments.json`   |
    /// | `ADMIN_TOKEN`               | unset                         |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let remote_timeout_secs: u64 = std::env::var("REMOTE_FETCH_TIMEOUT_SECS")
            .ok()
            .map(|v| v.parse().expect("REMOTE_FETCH_TIMEOUT_SECS must be a valid u64"))
            .unwrap_or(DEFAULT_REMOTE_TIMEOUT.as_secs());

        let path_var = |name: &str, default: &str| -> PathBuf {
            std::env::var(name)
                .unwrap_or_else(|_| default.into())
                .into()
        };

        let admin_token = std::env::var("ADMIN_TOKEN")
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            remote_timeout_secs,
            local_cache_dir: path_var("LOCAL_CACHE_DIR", "./data/local"),
            guides_path: path_var("GUIDES_PATH", "./data/guides.json"),
            seed_comments_path: path_var("SEED_COMMENTS_PATH", "./data/seed_comments.json"),
            admin_token,
        }
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_secs(self.remote_timeout_secs)
    }
}
