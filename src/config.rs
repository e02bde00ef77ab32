use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use crate::chains::{self, ARC_TESTNET_CHAIN_ID};
use crate::wallet::WalletConfig;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;
const DEFAULT_COLD_START_LOOKBACK: u64 = 1000;

/// Application configuration, loaded from the environment (and `.env`)
#[derive(Clone)]
pub struct Config {
    pub chain_id: u64,
    pub rpc_url: String,
    pub registry_address: Option<String>,
    pub wallet: WalletConfig,
    pub poll_interval_secs: u64,
    /// Blocks scanned behind head when no watcher state exists yet
    pub cold_start_lookback: u64,
    pub state_file: PathBuf,
    pub redis_url: Option<String>,
    pub messaging_api_url: String,
    pub messaging_api_key: Option<String>,
    pub ipfs_api_url: String,
    pub ipfs_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(&|key: &str| std::env::var(key).ok())
    }

    pub fn from_vars(get: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        let wallet = WalletConfig::from_vars(get)?;

        let chain_id = parse_or(get, "CHAIN_ID", ARC_TESTNET_CHAIN_ID)?;

        let rpc_url = chains::resolve_rpc_url(chain_id, get)
            .ok_or_else(|| anyhow!("No RPC configured for chain {}: set RPC_URL", chain_id))?;

        let registry_address = get("REGISTRY_ADDRESS").or_else(|| {
            chains::get_chain(chain_id)
                .and_then(|c| c.registry_address)
                .map(str::to_string)
        });

        let poll_interval_secs = parse_or(get, "POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?;
        if poll_interval_secs == 0 {
            return Err(anyhow!("POLL_INTERVAL_SECS must be greater than zero"));
        }

        Ok(Self {
            chain_id,
            rpc_url,
            registry_address,
            wallet,
            poll_interval_secs,
            cold_start_lookback: parse_or(get, "COLD_START_LOOKBACK", DEFAULT_COLD_START_LOOKBACK)?,
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("watcher-state.json")),
            redis_url: get("REDIS_URL"),
            messaging_api_url: get("MESSAGING_API_URL")
                .unwrap_or_else(|| "http://localhost:5555".to_string()),
            messaging_api_key: get("MESSAGING_API_KEY"),
            ipfs_api_url: get("IPFS_API_URL")
                .unwrap_or_else(|| "https://api.pinata.cloud".to_string()),
            ipfs_api_key: get("IPFS_API_KEY"),
        })
    }

    /// Registry address, required by every command that touches the contract
    pub fn require_registry(&self) -> Result<&str> {
        self.registry_address
            .as_deref()
            .ok_or_else(|| anyhow!("REGISTRY_ADDRESS is not set for chain {}", self.chain_id))
    }

    pub fn signer_address(&self) -> Option<&str> {
        self.wallet.address.as_deref()
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: '{}'", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        Config::from_vars(&|key: &str| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.chain_id, ARC_TESTNET_CHAIN_ID);
        assert_eq!(config.rpc_url, "https://rpc.testnet.arc.network");
        assert_eq!(config.poll_interval_secs, 15);
        assert_eq!(config.cold_start_lookback, 1000);
        assert_eq!(config.state_file, PathBuf::from("watcher-state.json"));
        assert!(config.registry_address.is_none());
        assert!(config.require_registry().is_err());
        assert!(config.signer_address().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            ("CHAIN_ID", "31337"),
            ("REGISTRY_ADDRESS", "0x5FbDB2315678afecb367f032d93F642f64180aa3"),
            ("COLD_START_LOOKBACK", "250"),
            ("POLL_INTERVAL_SECS", "5"),
            ("STATE_FILE", "/var/lib/arc/state.json"),
        ])
        .unwrap();
        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.cold_start_lookback, 250);
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(
            config.require_registry().unwrap(),
            "0x5FbDB2315678afecb367f032d93F642f64180aa3"
        );
        assert_eq!(config.state_file, PathBuf::from("/var/lib/arc/state.json"));
    }

    #[test]
    fn test_invalid_numbers_are_fatal() {
        let err = config_with(&[("COLD_START_LOOKBACK", "a lot")]).err().unwrap();
        assert!(err.to_string().contains("COLD_START_LOOKBACK"));
        assert!(config_with(&[("POLL_INTERVAL_SECS", "0")]).is_err());
    }

    #[test]
    fn test_unknown_chain_requires_rpc() {
        assert!(config_with(&[("CHAIN_ID", "424242")]).is_err());
        let config = config_with(&[("CHAIN_ID", "424242"), ("RPC_URL", "http://node:8545")]).unwrap();
        assert_eq!(config.rpc_url, "http://node:8545");
    }
}
