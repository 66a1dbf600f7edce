//! Server configuration loaded from environment variables.

use std::path::PathBuf;

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};

pub const DEFAULT_PORT: u16 = 3000;

/// Runtime configuration for the board server.
#[derive(Clone, Debug, PartialEq)]
pub struct BoardConfig {
    /// SQLite file (from SPRINTBOARD_DB_PATH). `None` uses the platform data dir.
    pub db_path: Option<PathBuf>,
    /// HTTP port (from SPRINTBOARD_PORT)
    pub port: u16,
    /// Allowed CORS origins (from SPRINTBOARD_CORS_ORIGINS, comma-separated).
    /// `None` allows any origin.
    pub cors_origins: Option<Vec<String>>,
}

impl BoardConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("SPRINTBOARD_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let port = lookup("SPRINTBOARD_PORT")
            .and_then(|s| s.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let cors_origins = lookup("SPRINTBOARD_CORS_ORIGINS").map(|s| {
            s.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            db_path,
            port,
            cors_origins,
        }
    }

    /// CORS layer for the configured origins.
    pub fn cors_layer(&self) -> CorsLayer {
        match &self.cors_origins {
            None => CorsLayer::permissive(),
            Some(origins) => {
                let allowed: Vec<HeaderValue> = origins
                    .iter()
                    .filter_map(|o| match o.parse() {
                        Ok(v) => Some(v),
                        Err(_) => {
                            tracing::warn!("Ignoring invalid CORS origin: {}", o);
                            None
                        }
                    })
                    .collect();
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(allowed))
                    .allow_methods(tower_http::cors::Any)
                    .allow_headers(tower_http::cors::Any)
            }
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            port: DEFAULT_PORT,
            cors_origins: None,
        }
    }
}
