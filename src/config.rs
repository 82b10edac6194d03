use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["tx-intent-lab.toml", "config/tx-intent-lab.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Ledger network the service builds for and submits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Preprod,
    Preview,
}

impl Network {
    /// Network nibble carried in the header byte of every shelley address.
    pub fn network_id(self) -> u8 {
        match self {
            Network::Mainnet => 1,
            Network::Preprod | Network::Preview => 0,
        }
    }

    pub fn address_hrp(self) -> &'static str {
        match self {
            Network::Mainnet => "addr",
            Network::Preprod | Network::Preview => "addr_test",
        }
    }

    pub fn maestro_base_url(self) -> String {
        format!("https://{self}.gomaestro-api.org/v1")
    }

    pub fn explorer_tx_url(self, tx_hash: &str) -> String {
        match self {
            Network::Mainnet => format!("https://cardanoscan.io/transaction/{tx_hash}"),
            _ => format!("https://{self}.cardanoscan.io/transaction/{tx_hash}"),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Mainnet => "mainnet",
            Network::Preprod => "preprod",
            Network::Preview => "preview",
        })
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Network::Mainnet),
            "preprod" => Ok(Network::Preprod),
            "preview" => Ok(Network::Preview),
            other => Err(format!("unknown network `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    pub network: Network,
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub protocol: ProtocolParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Prometheus exporter address; the exporter stays off when unset.
    pub metrics_listen: Option<SocketAddr>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            metrics_listen: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Overrides the per-network Maestro endpoint.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_ms: 30_000,
        }
    }
}

/// Subset of the ledger protocol parameters the builder needs for fees and
/// minimum output values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolParams {
    pub min_fee_a: u64,
    pub min_fee_b: u64,
    pub coins_per_utxo_byte: u64,
    pub max_tx_size: usize,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            coins_per_utxo_byte: 4_310,
            max_tx_size: 16_384,
        }
    }
}

pub fn load_config(path: Option<PathBuf>) -> Result<LabConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(LabConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<LabConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: LabConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}
