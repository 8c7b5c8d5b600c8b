//! Server configuration.
//!
//! Every flag can also be supplied through its environment variable; the
//! binary loads `.env` before parsing.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid bind address '{0}': {1}")]
    InvalidBind(String, std::net::AddrParseError),

    #[error("--max-connections must be at least 1")]
    NoConnections,

    #[error("--max-upload-bytes must be at least 1")]
    NoUploadBudget,

    #[error("seed file {0} does not exist")]
    MissingSeed(PathBuf),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "grc_server")]
#[command(about = "REST server for the GRC tracker")]
#[command(long_about = None)]
pub struct ServerArgs {
    /// Listen address
    #[arg(long, env = "GRC_BIND_ADDR", default_value = "0.0.0.0:4200")]
    pub bind: String,

    /// Postgres connection string; the in-memory store is used when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Postgres pool size
    #[arg(long, env = "GRC_DB_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Directory for evidence attachments
    #[arg(long, env = "GRC_MEDIA_ROOT", default_value = "./media")]
    pub media_root: PathBuf,

    /// YAML seed bundle of frameworks and controls to load at startup
    #[arg(long, env = "GRC_SEED_FILE")]
    pub seed: Option<PathBuf>,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "GRC_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl ServerArgs {
    pub fn validate(&self) -> Result<SocketAddr, ConfigError> {
        let addr = self
            .bind
            .parse()
            .map_err(|e| ConfigError::InvalidBind(self.bind.clone(), e))?;
        if self.max_connections == 0 {
            return Err(ConfigError::NoConnections);
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::NoUploadBudget);
        }
        if let Some(seed) = &self.seed {
            if !seed.exists() {
                return Err(ConfigError::MissingSeed(seed.clone()));
            }
        }
        Ok(addr)
    }
}
