use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::signal;
use tracing::info;

mod abi;
mod blockchain;
mod chains;
mod config;
mod ipfs;
mod messaging;
mod types;
mod wallet;
mod watcher;

use blockchain::{RegistryClient, TxOutcome};
use config::Config;
use ipfs::IpfsClient;
use messaging::HttpMessenger;
use watcher::{JsonFileStore, RedisStateStore, StateStore, Watcher};

#[derive(Parser)]
#[command(name = "arc-id-relay", version, about = "Arc ID registry watcher and transaction tool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Poll registry events and notify counterparties (default)
    Watch,
    /// Register an agent directly
    Register {
        #[arg(value_parser = parse_address)]
        agent: Address,
        /// Passport URI, e.g. ipfs://<cid>
        uri: String,
    },
    /// Submit an application for a deployer to approve
    SubmitApplication {
        #[arg(value_parser = parse_address)]
        deployer: Address,
        uri: String,
    },
    /// Approve a pending application as its deployer
    ApproveApplication {
        #[arg(value_parser = parse_address)]
        agent: Address,
    },
    /// Ask an endorser to endorse an agent
    RequestEndorsement {
        #[arg(value_parser = parse_token_id)]
        agent_id: U256,
        #[arg(value_parser = parse_address)]
        endorser: Address,
    },
    /// Endorse an agent
    Endorse {
        #[arg(value_parser = parse_token_id)]
        agent_id: U256,
    },
    /// Show an agent record by token id or address
    Agent { id_or_address: String },
    /// Pin a passport JSON document to IPFS
    Pin {
        file: PathBuf,
        /// Pin name; defaults to the file stem
        #[arg(long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arc_id_relay=debug".parse()?),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    info!("arc-id-relay v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Chain {} via {} (known chains: {:?})",
        config.chain_id,
        config.rpc_url,
        chains::supported_chain_ids()
    );
    info!(
        "Wallet mode: {} (address: {})",
        config.wallet.mode.as_str(),
        config.signer_address().unwrap_or("none")
    );

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch(&config).await,
        Command::Register { agent, uri } => {
            let (key, _) = config.wallet.require_signer()?;
            let registry = registry(&config)?;
            let caps = registry.detect_capabilities().await;
            let (token_id, outcome) = registry.register_agent(key, caps, agent, &uri).await?;
            print_outcome(&config, &outcome, Some(token_id))
        }
        Command::SubmitApplication { deployer, uri } => {
            let (key, _) = config.wallet.require_signer()?;
            let outcome = registry(&config)?
                .submit_application(key, deployer, &uri)
                .await?;
            print_outcome(&config, &outcome, None)
        }
        Command::ApproveApplication { agent } => {
            let (key, _) = config.wallet.require_signer()?;
            let outcome = registry(&config)?.approve_application(key, agent).await?;
            print_outcome(&config, &outcome, None)
        }
        Command::RequestEndorsement { agent_id, endorser } => {
            let (key, _) = config.wallet.require_signer()?;
            let outcome = registry(&config)?
                .request_endorsement(key, agent_id, endorser)
                .await?;
            print_outcome(&config, &outcome, None)
        }
        Command::Endorse { agent_id } => {
            let (key, _) = config.wallet.require_signer()?;
            let outcome = registry(&config)?.endorse(key, agent_id).await?;
            print_outcome(&config, &outcome, None)
        }
        Command::Agent { id_or_address } => {
            let registry = registry(&config)?;
            let record = match Address::from_str(&id_or_address) {
                Ok(address) => registry.agent_by_address(address).await?,
                Err(_) => {
                    let id = parse_token_id(&id_or_address).map_err(anyhow::Error::msg)?;
                    registry.agent_by_id(id).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::Pin { file, name } => pin(&config, &file, name).await,
    }
}

fn registry(config: &Config) -> Result<RegistryClient> {
    Ok(RegistryClient::new(&config.rpc_url, config.require_registry()?)?)
}

/// Run the event watcher until the process is stopped
async fn watch(config: &Config) -> Result<()> {
    // The messaging identity is the signer; nothing runs without it
    let (_, sender) = config.wallet.require_signer()?;
    let registry = registry(config)?;

    let messenger = HttpMessenger::connect(
        &config.messaging_api_url,
        config.messaging_api_key.clone(),
        sender,
    );

    info!(
        "Watching registry {} every {}s (messaging relay: {})",
        registry.registry_address(),
        config.poll_interval_secs,
        config.messaging_api_url
    );

    match &config.redis_url {
        Some(url) => {
            let scope = format!("{}:{}", config.chain_id, registry.registry_address());
            let store = RedisStateStore::connect(url, &scope).await?;
            run_watcher(config, registry, messenger, store).await
        }
        None => {
            let store = JsonFileStore::new(&config.state_file);
            run_watcher(config, registry, messenger, store).await
        }
    }
}

async fn run_watcher<S: StateStore>(
    config: &Config,
    registry: RegistryClient,
    messenger: HttpMessenger,
    store: S,
) -> Result<()> {
    let watcher = Watcher::new(registry, messenger, store, config.cold_start_lookback).await?;
    let period = Duration::from_secs(config.poll_interval_secs);

    tokio::select! {
        _ = watcher.run(period) => {}
        _ = shutdown_signal() => {}
    }

    info!("Watcher stopped");
    Ok(())
}

async fn pin(config: &Config, file: &Path, name: Option<String>) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let document: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", file.display()))?;

    let name = name.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "passport".to_string())
    });

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()?;
    let client = IpfsClient::new(http_client, &config.ipfs_api_url, config.ipfs_api_key.clone());
    let pinned = client.pin_json(&document, &name).await?;

    println!("{}", serde_json::to_string_pretty(&pinned)?);
    Ok(())
}

fn print_outcome(config: &Config, outcome: &TxOutcome, token_id: Option<U256>) -> Result<()> {
    let explorer = chains::get_chain(config.chain_id).and_then(|c| c.tx_url(&outcome.tx_hash));

    let summary = serde_json::json!({
        "txHash": outcome.tx_hash,
        "blockNumber": outcome.block_number,
        "tokenId": token_id.map(|id| id.to_string()),
        "explorer": explorer,
    });

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_address(raw: &str) -> Result<Address, String> {
    Address::from_str(raw).map_err(|e| format!("invalid address '{}': {}", raw, e))
}

fn parse_token_id(raw: &str) -> Result<U256, String> {
    U256::from_str_radix(raw.trim_start_matches('#'), 10)
        .map_err(|e| format!("invalid token id '{}': {}", raw, e))
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, stopping"),
        _ = terminate => info!("Received SIGTERM, stopping"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_watch() {
        let cli = Cli::try_parse_from(["arc-id-relay"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parses_endorsement_request() {
        let cli = Cli::try_parse_from([
            "arc-id-relay",
            "request-endorsement",
            "#7",
            "0x000000000000000000000000000000000000000b",
        ])
        .unwrap();
        match cli.command {
            Some(Command::RequestEndorsement { agent_id, endorser }) => {
                assert_eq!(agent_id, U256::from(7));
                assert_eq!(
                    endorser,
                    parse_address("0x000000000000000000000000000000000000000b").unwrap()
                );
            }
            _ => panic!("expected request-endorsement"),
        }
    }

    #[test]
    fn test_cli_rejects_bad_address() {
        assert!(Cli::try_parse_from(["arc-id-relay", "approve-application", "0x12"]).is_err());
        assert!(Cli::try_parse_from(["arc-id-relay", "endorse", "seven"]).is_err());
    }
}
