use anyhow::{Context, Result};
use clap::Parser;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::services::thumbnail_pipeline::ThumbnailConfig;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub bucket: String,
    pub thumbnail_width: u32,
    pub jpeg_quality: u8,
    pub event_budget_secs: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Photo vault API with thumbnail generation")]
pub struct Args {
    /// Host to bind to (overrides PHOTOVAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTOVAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides PHOTOVAULT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides PHOTOVAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Logical bucket name in event notifications (overrides PHOTOVAULT_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Thumbnail width cap in pixels (overrides PHOTOVAULT_THUMBNAIL_WIDTH)
    #[arg(long)]
    pub thumbnail_width: Option<u32>,

    /// Thumbnail JPEG quality, 1-100 (overrides PHOTOVAULT_JPEG_QUALITY)
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Per-event processing budget in seconds (overrides PHOTOVAULT_EVENT_BUDGET_SECS)
    #[arg(long)]
    pub event_budget_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("PHOTOVAULT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("PHOTOVAULT_PORT", 3000)?;
        let env_storage =
            env::var("PHOTOVAULT_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("PHOTOVAULT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/photovault.db".into());
        let env_bucket = env::var("PHOTOVAULT_BUCKET").unwrap_or_else(|_| "photovault".into());
        let env_width = parse_env("PHOTOVAULT_THUMBNAIL_WIDTH", 400)?;
        let env_quality = parse_env("PHOTOVAULT_JPEG_QUALITY", 80)?;
        let env_budget = parse_env("PHOTOVAULT_EVENT_BUDGET_SECS", 60)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            bucket: args.bucket.unwrap_or(env_bucket),
            thumbnail_width: args.thumbnail_width.unwrap_or(env_width),
            jpeg_quality: args.jpeg_quality.unwrap_or(env_quality).clamp(1, 100),
            event_budget_secs: args.event_budget_secs.unwrap_or(env_budget),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The pipeline's deployment parameters.
    pub fn thumbnail_config(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            max_width: self.thumbnail_width,
            jpeg_quality: self.jpeg_quality,
            event_budget: Duration::from_secs(self.event_budget_secs),
        }
    }
}

fn parse_env<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).context(format!("reading {}", name)),
    }
}
