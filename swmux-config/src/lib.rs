//! Shared configuration library for swmux.
//!
//! Centralizes environment-driven configuration so the server binary and
//! tests share one source of truth for defaults and directory preparation.

use std::{env, path::PathBuf};

use serde::Deserialize;

/// Server configuration loaded from environment variables (with `.env`
/// support).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Server settings
    pub server_host: String,
    pub server_port: u16,

    /// The host application's canonical root path; the default worker scope.
    pub site_root: String,

    /// Relative URL of the fixed dispatch endpoint.
    pub dispatch_path: String,

    // Static file settings (filesystem backend)
    pub public_dir: PathBuf,
    pub public_url_path: String,

    // Cache and data settings
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,

    // CORS settings
    pub cors_allowed_origins: Vec<String>,

    // Development settings
    pub demo_producer: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            site_root: env::var("SITE_ROOT").unwrap_or_else(|_| "/".to_string()),
            dispatch_path: env::var("DISPATCH_PATH")
                .unwrap_or_else(|_| "/swmux/dispatch".to_string()),

            public_dir: env::var("PUBLIC_DIR")
                .unwrap_or_else(|_| "./public".to_string())
                .into(),
            public_url_path: env::var("PUBLIC_URL_PATH")
                .unwrap_or_else(|_| "/static".to_string()),

            cache_dir: env::var("CACHE_DIR")
                .unwrap_or_else(|_| "./cache".to_string())
                .into(),
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "./data".to_string())
                .into(),

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            demo_producer: env::var("SWMUX_DEMO")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        })
    }

    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.cache_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.public_dir)?;
        Ok(())
    }

    /// Location of the persisted settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            site_root: "/".to_string(),
            dispatch_path: "/swmux/dispatch".to_string(),
            public_dir: "./public".into(),
            public_url_path: "/static".to_string(),
            cache_dir: "./cache".into(),
            data_dir: "./data".into(),
            cors_allowed_origins: Vec::new(),
            demo_producer: false,
        }
    }
}
