use anyhow::{Context, Result};
use claim_flow::EngineConfig;
use std::path::PathBuf;

/// Configuration for the claims console service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub port: u16,
    /// JSON claim store; in-memory demo claims when unset.
    pub store_path: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .parse()
                .with_context(|| format!("PORT must be a port number, got {raw:?}"))?,
            Err(_) => 3000,
        };
        let store_path = std::env::var("CLAIMS_STORE_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port,
            store_path,
            engine: EngineConfig::from_env(),
        })
    }
}
