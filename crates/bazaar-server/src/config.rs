use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Secret used when none is configured. Fine for local runs only.
pub const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("BAZAAR_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                warn!("BAZAAR_JWT_SECRET is unset, falling back to the development secret");
                DEV_SECRET.into()
            });
        let db_path: PathBuf = lookup("BAZAAR_DB_PATH").unwrap_or_else(|| "bazaar.db".into()).into();
        let host = lookup("BAZAAR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = lookup("BAZAAR_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse::<u16>()
            .context("BAZAAR_PORT must be a port number")?;

        Ok(Self {
            jwt_secret,
            db_path,
            host,
            port,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}
