use std::env;

use anyhow::{Context, Result};
use clap::Parser;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    /// Bucket used when a request does not name one.
    pub bucket: String,
    /// Base URL for redirect locations when a request does not supply one.
    pub public_url: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "On-demand image derivative API")]
pub struct Args {
    /// Host to bind to (overrides IMAGE_DERIVATIVES_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_DERIVATIVES_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where objects are stored (overrides IMAGE_DERIVATIVES_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Default bucket for requests (overrides IMAGE_DERIVATIVES_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Base URL for redirect locations (overrides IMAGE_DERIVATIVES_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("IMAGE_DERIVATIVES_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("IMAGE_DERIVATIVES_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing IMAGE_DERIVATIVES_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading IMAGE_DERIVATIVES_PORT"),
        };
        let env_storage =
            env::var("IMAGE_DERIVATIVES_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_bucket = env::var("IMAGE_DERIVATIVES_BUCKET").unwrap_or_else(|_| "images".into());
        let env_public_url = env::var("IMAGE_DERIVATIVES_PUBLIC_URL").ok();

        // --- Merge ---
        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let storage_dir = args.storage_dir.unwrap_or(env_storage);
        let bucket = args.bucket.unwrap_or(env_bucket);
        // The default redirect base points at this service's own serving
        // route, so a bare deployment is closed-loop.
        let public_url = args
            .public_url
            .or(env_public_url)
            .unwrap_or_else(|| format!("http://localhost:{}/{}", port, bucket));

        Ok(Self {
            host,
            port,
            storage_dir,
            bucket,
            public_url,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
