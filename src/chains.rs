use std::collections::HashMap;
use std::sync::LazyLock;

/// Arc testnet chain id
pub const ARC_TESTNET_CHAIN_ID: u64 = 5042002;

/// Configuration for a supported chain
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: &'static str,
    /// Deployed Arc ID registry, when known for this chain
    pub registry_address: Option<&'static str>,
    pub rpcs: Vec<&'static str>,
    pub block_explorer: Option<&'static str>,
}

impl ChainConfig {
    pub fn primary_rpc(&self) -> Option<&str> {
        self.rpcs.first().copied()
    }

    /// Env var that overrides the RPC for this chain, e.g. RPC_URL_ARC_TESTNET
    pub fn rpc_env_key(&self) -> String {
        format!("RPC_URL_{}", self.name.to_uppercase().replace('-', "_"))
    }

    /// Explorer link for a transaction hash
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.block_explorer.map(|base| format!("{}/tx/{}", base, tx_hash))
    }
}

pub static CHAINS: LazyLock<HashMap<u64, ChainConfig>> = LazyLock::new(|| {
    let chains = vec![
        ChainConfig {
            chain_id: ARC_TESTNET_CHAIN_ID,
            name: "arc-testnet",
            // Supplied per deployment through REGISTRY_ADDRESS
            registry_address: None,
            rpcs: vec!["https://rpc.testnet.arc.network"],
            block_explorer: Some("https://testnet.arcscan.app"),
        },
        ChainConfig {
            chain_id: 31337,
            name: "anvil",
            registry_address: None,
            rpcs: vec!["http://127.0.0.1:8545"],
            block_explorer: None,
        },
    ];

    chains.into_iter().map(|c| (c.chain_id, c)).collect()
});

pub fn get_chain(chain_id: u64) -> Option<&'static ChainConfig> {
    CHAINS.get(&chain_id)
}

pub fn supported_chain_ids() -> Vec<u64> {
    let mut ids: Vec<u64> = CHAINS.keys().copied().collect();
    ids.sort_unstable();
    ids
}

/// RPC URL for a chain: explicit RPC_URL, then RPC_URL_{CHAIN_NAME}, then the table default
pub fn resolve_rpc_url(chain_id: u64, get: &impl Fn(&str) -> Option<String>) -> Option<String> {
    if let Some(url) = get("RPC_URL") {
        return Some(url);
    }

    let chain = get_chain(chain_id)?;
    if let Some(url) = get(&chain.rpc_env_key()) {
        return Some(url);
    }

    chain.primary_rpc().map(|s| s.to_string())
}
