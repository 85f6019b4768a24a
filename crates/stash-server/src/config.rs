use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use stash_gate::GateConfig;
use stash_store::StorageConfig;

use crate::error::{ServerError, ServerResult};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "STASH_CONFIG";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Deployment environment. `"dev"` turns on debug logging.
    pub env: String,
    pub bind_addr: SocketAddr,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_artifact_size: u64,
    pub allowed_extensions: BTreeSet<String>,
    /// Shared by uploads and downloads.
    pub max_concurrent_transfers: usize,
    pub max_concurrent_lists: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            env: "local".into(),
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 44044)),
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let gate = GateConfig::default();
        Self {
            max_artifact_size: gate.max_artifact_size,
            allowed_extensions: gate.allowed_extensions,
            max_concurrent_transfers: 10,
            max_concurrent_lists: 100,
        }
    }
}

impl ServerConfig {
    /// Read and validate a TOML configuration file.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| ServerError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServerResult<()> {
        let limits = &self.limits;
        if limits.max_artifact_size == 0 {
            return Err(ServerError::Config("limits.max_artifact_size must be positive".into()));
        }
        if limits.max_concurrent_transfers == 0 {
            return Err(ServerError::Config(
                "limits.max_concurrent_transfers must be at least 1".into(),
            ));
        }
        if limits.max_concurrent_lists == 0 {
            return Err(ServerError::Config(
                "limits.max_concurrent_lists must be at least 1".into(),
            ));
        }
        if self.gate_config().allowed_extensions.is_empty() {
            return Err(ServerError::Config(
                "limits.allowed_extensions must name at least one extension".into(),
            ));
        }
        if self.storage.staging_path == self.storage.completed_path {
            return Err(ServerError::Config(
                "storage.staging_path and storage.completed_path must differ".into(),
            ));
        }
        Ok(())
    }

    pub fn is_dev(&self) -> bool {
        self.env == "dev"
    }

    /// Validation settings derived from the limits section.
    pub fn gate_config(&self) -> GateConfig {
        GateConfig::new(
            self.limits.max_artifact_size,
            self.limits.allowed_extensions.iter().cloned(),
        )
    }
}
