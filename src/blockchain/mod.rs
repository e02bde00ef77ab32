pub mod registry;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::types::RelayError;
use crate::watcher::events::{BlockRange, EventKind, RegistryEvent};

pub use registry::{RegistryClient, TxOutcome};

/// Read side of the registry as seen by the watcher
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Current chain head height
    async fn head_height(&self) -> Result<u64, RelayError>;

    /// Logs of one kind in `range`, in block then log-index order
    async fn query_events(
        &self,
        kind: EventKind,
        range: BlockRange,
    ) -> Result<Vec<RegistryEvent>, RelayError>;

    /// Passport URI via `getAgentById`
    async fn agent_uri_by_id(&self, agent_id: U256) -> Result<String, RelayError>;

    /// Passport URI via `getAgentByAddress`
    async fn agent_uri_by_address(&self, agent: Address) -> Result<String, RelayError>;
}
