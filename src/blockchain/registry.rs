use alloy::{
    network::{Ethereum, EthereumWallet, TransactionBuilder},
    primitives::{Address, U256},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::types::TransactionRequest,
    sol_types::SolCall,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use serde::Serialize;
use std::str::FromStr;
use tracing::{debug, info, warn};
use url::Url;

use crate::abi::IArcIdRegistry::{self, IArcIdRegistryInstance};
use crate::blockchain::Ledger;
use crate::types::RelayError;
use crate::wallet::parse_signer;
use crate::watcher::events::{BlockRange, EventKind, RegistryEvent};

type HttpProvider = RootProvider<Http<Client>, Ethereum>;

/// Optional registry methods, detected once against the deployed contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryCapabilities {
    pub is_registered: bool,
}

/// Agent record as returned by the registry accessors
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub token_id: String,
    pub agent_addr: String,
    pub creator: String,
    #[serde(rename = "agentURI")]
    pub agent_uri: String,
    pub suspended: bool,
    pub endorsements: String,
}

impl From<IArcIdRegistry::Agent> for AgentRecord {
    fn from(agent: IArcIdRegistry::Agent) -> Self {
        Self {
            token_id: agent.tokenId.to_string(),
            agent_addr: agent.agentAddr.to_string(),
            creator: agent.creator.to_string(),
            agent_uri: agent.agentURI,
            suspended: agent.suspended,
            endorsements: agent.endorsements.to_string(),
        }
    }
}

/// Result of a mined registry transaction
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub tx_hash: String,
    pub block_number: Option<u64>,
}

/// Arc ID registry contract client
pub struct RegistryClient {
    rpc_url: Url,
    registry_address: Address,
}

impl RegistryClient {
    pub fn new(rpc_url: &str, registry_address: &str) -> Result<Self, RelayError> {
        let url = Url::parse(rpc_url)
            .map_err(|e| RelayError::InvalidRequest(format!("Invalid RPC URL: {}", e)))?;

        let address = Address::from_str(registry_address)
            .map_err(|e| RelayError::InvalidAddress(format!("Invalid registry address: {}", e)))?;

        Ok(Self {
            rpc_url: url,
            registry_address: address,
        })
    }

    fn provider(&self) -> HttpProvider {
        ProviderBuilder::new().on_http(self.rpc_url.clone())
    }

    fn contract(&self) -> IArcIdRegistryInstance<Http<Client>, HttpProvider> {
        IArcIdRegistryInstance::new(self.registry_address, self.provider())
    }

    pub fn registry_address(&self) -> &Address {
        &self.registry_address
    }

    /// Probe optional methods. Any failure marks the method as absent.
    pub async fn detect_capabilities(&self) -> RegistryCapabilities {
        let is_registered = match self.contract().isRegistered(Address::ZERO).call().await {
            Ok(_) => true,
            Err(e) => {
                warn!("isRegistered not available on {}: {}", self.registry_address, e);
                false
            }
        };

        let caps = RegistryCapabilities { is_registered };
        info!("Registry capabilities: {:?}", caps);
        caps
    }

    pub async fn agent_by_id(&self, agent_id: U256) -> Result<AgentRecord, RelayError> {
        debug!("Fetching agent #{}", agent_id);

        let agent = self
            .contract()
            .getAgentById(agent_id)
            .call()
            .await
            .map_err(|e| lookup_error(&format!("#{}", agent_id), "getAgentById", e))?;

        Ok(agent._0.into())
    }

    pub async fn agent_by_address(&self, agent: Address) -> Result<AgentRecord, RelayError> {
        debug!("Fetching agent {}", agent);

        let record = self
            .contract()
            .getAgentByAddress(agent)
            .call()
            .await
            .map_err(|e| lookup_error(&agent.to_string(), "getAgentByAddress", e))?;

        Ok(record._0.into())
    }

    pub async fn is_registered(&self, agent: Address) -> Result<bool, RelayError> {
        let registered = self
            .contract()
            .isRegistered(agent)
            .call()
            .await
            .map_err(|e| RelayError::BlockchainError(format!("isRegistered failed: {}", e)))?;

        Ok(registered._0)
    }

    /// Register an agent directly; returns the minted token id
    pub async fn register_agent(
        &self,
        private_key: &str,
        caps: RegistryCapabilities,
        agent: Address,
        agent_uri: &str,
    ) -> Result<(U256, TxOutcome), RelayError> {
        if caps.is_registered && self.is_registered(agent).await? {
            return Err(RelayError::InvalidRequest(format!(
                "Agent {} is already registered",
                agent
            )));
        }

        let call = IArcIdRegistry::registerCall {
            agentAddr: agent,
            agentURI: agent_uri.to_string(),
        };
        let (outcome, receipt) = self.send("register", private_key, call.abi_encode()).await?;

        let token_id = receipt
            .inner
            .logs()
            .iter()
            .find_map(|log| log.log_decode::<IArcIdRegistry::AgentRegistered>().ok())
            .map(|decoded| decoded.inner.data.tokenId)
            .ok_or_else(|| {
                RelayError::BlockchainError("No AgentRegistered event in receipt".to_string())
            })?;

        info!("Agent {} registered as #{} (tx: {})", agent, token_id, outcome.tx_hash);
        Ok((token_id, outcome))
    }

    /// Agent side of the application flow: ask `deployer` to approve
    pub async fn submit_application(
        &self,
        private_key: &str,
        deployer: Address,
        agent_uri: &str,
    ) -> Result<TxOutcome, RelayError> {
        let call = IArcIdRegistry::submitApplicationCall {
            deployer,
            agentURI: agent_uri.to_string(),
        };
        let (outcome, _) = self
            .send("submitApplication", private_key, call.abi_encode())
            .await?;
        Ok(outcome)
    }

    pub async fn approve_application(
        &self,
        private_key: &str,
        agent: Address,
    ) -> Result<TxOutcome, RelayError> {
        let call = IArcIdRegistry::approveApplicationCall { agentAddr: agent };
        let (outcome, _) = self
            .send("approveApplication", private_key, call.abi_encode())
            .await?;
        Ok(outcome)
    }

    pub async fn request_endorsement(
        &self,
        private_key: &str,
        agent_id: U256,
        endorser: Address,
    ) -> Result<TxOutcome, RelayError> {
        let call = IArcIdRegistry::requestEndorsementCall {
            agentId: agent_id,
            endorser,
        };
        let (outcome, _) = self
            .send("requestEndorsement", private_key, call.abi_encode())
            .await?;
        Ok(outcome)
    }

    pub async fn endorse(&self, private_key: &str, agent_id: U256) -> Result<TxOutcome, RelayError> {
        let call = IArcIdRegistry::endorseCall { agentId: agent_id };
        let (outcome, _) = self.send("endorse", private_key, call.abi_encode()).await?;
        Ok(outcome)
    }

    /// Sign, send and wait for the receipt of a registry call
    async fn send(
        &self,
        method: &str,
        private_key: &str,
        calldata: Vec<u8>,
    ) -> Result<(TxOutcome, alloy::rpc::types::TransactionReceipt), RelayError> {
        let signer = parse_signer(private_key).map_err(|e| RelayError::Internal(e.to_string()))?;
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(wallet)
            .on_http(self.rpc_url.clone());

        let tx = TransactionRequest::default()
            .with_to(self.registry_address)
            .with_input(calldata);

        let pending = provider.send_transaction(tx).await.map_err(|e| {
            RelayError::BlockchainError(format!("{} failed: {}", method, revert_reason(&e.to_string())))
        })?;

        let tx_hash = format!("0x{}", hex::encode(pending.tx_hash().as_slice()));
        info!("{} transaction sent: {}", method, tx_hash);

        let receipt = pending.get_receipt().await.map_err(|e| {
            RelayError::BlockchainError(format!("Failed to get receipt: {}", e))
        })?;

        if !receipt.status() {
            return Err(RelayError::BlockchainError(format!(
                "{} transaction reverted ({})",
                method, tx_hash
            )));
        }

        let outcome = TxOutcome {
            tx_hash,
            block_number: receipt.block_number,
        };
        info!(
            "{} confirmed (tx: {}, block: {})",
            method,
            outcome.tx_hash,
            outcome.block_number.unwrap_or_default()
        );

        Ok((outcome, receipt))
    }
}

#[async_trait]
impl Ledger for RegistryClient {
    async fn head_height(&self) -> Result<u64, RelayError> {
        self.provider()
            .get_block_number()
            .await
            .map_err(|e| RelayError::BlockchainError(format!("get_block_number failed: {}", e)))
    }

    async fn query_events(
        &self,
        kind: EventKind,
        range: BlockRange,
    ) -> Result<Vec<RegistryEvent>, RelayError> {
        let contract = self.contract();
        let query_err =
            |e: alloy::contract::Error| RelayError::BlockchainError(format!("{} query failed: {}", kind, e));

        let events = match kind {
            EventKind::EndorsementRequested => contract
                .EndorsementRequested_filter()
                .from_block(range.from)
                .to_block(range.to)
                .query()
                .await
                .map_err(query_err)?
                .into_iter()
                .map(|(event, _)| RegistryEvent::EndorsementRequested {
                    agent_id: event.agentId,
                    agent: event.agentAddr,
                    endorser: event.endorser,
                })
                .collect(),
            EventKind::ApplicationSubmitted => contract
                .ApplicationSubmitted_filter()
                .from_block(range.from)
                .to_block(range.to)
                .query()
                .await
                .map_err(query_err)?
                .into_iter()
                .map(|(event, _)| RegistryEvent::ApplicationSubmitted {
                    agent: event.agentAddr,
                    deployer: event.deployer,
                    agent_uri: event.agentURI,
                })
                .collect(),
            EventKind::AgentRegistered => contract
                .AgentRegistered_filter()
                .from_block(range.from)
                .to_block(range.to)
                .query()
                .await
                .map_err(query_err)?
                .into_iter()
                .map(|(event, _)| RegistryEvent::AgentRegistered {
                    token_id: event.tokenId,
                    agent: event.agentAddr,
                    creator: event.creator,
                    agent_uri: event.agentURI,
                })
                .collect(),
        };

        Ok(events)
    }

    async fn agent_uri_by_id(&self, agent_id: U256) -> Result<String, RelayError> {
        Ok(self.agent_by_id(agent_id).await?.agent_uri)
    }

    async fn agent_uri_by_address(&self, agent: Address) -> Result<String, RelayError> {
        Ok(self.agent_by_address(agent).await?.agent_uri)
    }
}

fn lookup_error(subject: &str, method: &str, e: alloy::contract::Error) -> RelayError {
    let err_str = e.to_string();
    if err_str.contains("AgentNotFound") {
        RelayError::AgentNotFound(subject.to_string())
    } else {
        RelayError::BlockchainError(format!("{} failed: {}", method, err_str))
    }
}

/// Shorten node errors to the part after "execution reverted" when present
fn revert_reason(message: &str) -> &str {
    match message.find("execution reverted") {
        Some(idx) => &message[idx..],
        None => message,
    }
}
