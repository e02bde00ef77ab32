//! Signer configuration
//!
//! The relay signs registry transactions and identifies itself to the
//! messaging relay with the same key. Two sources are supported:
//! - `private_key`: hex key from PRIVATE_KEY
//! - `mnemonic`: BIP-39 phrase from MNEMONIC, derived at DERIVATION_INDEX

use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use tracing::info;

/// Where the signing key comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMode {
    PrivateKey,
    Mnemonic,
    None,
}

impl KeyMode {
    /// Pick the key mode from an explicit KEY_MODE, else from whichever secret is present
    pub fn detect(get: &impl Fn(&str) -> Option<String>) -> Self {
        if let Some(mode) = get("KEY_MODE") {
            match mode.to_lowercase().as_str() {
                "mnemonic" => return KeyMode::Mnemonic,
                "private_key" | "privatekey" | "key" => return KeyMode::PrivateKey,
                _ => {}
            }
        }

        if get("MNEMONIC").is_some() {
            KeyMode::Mnemonic
        } else if get("PRIVATE_KEY").is_some() {
            KeyMode::PrivateKey
        } else {
            KeyMode::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KeyMode::PrivateKey => "private_key",
            KeyMode::Mnemonic => "mnemonic",
            KeyMode::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub mode: KeyMode,
    pub private_key: Option<String>,
    pub address: Option<String>,
}

impl WalletConfig {
    /// Build the wallet from a variable lookup (the process env in production)
    pub fn from_vars(get: &impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mode = KeyMode::detect(get);

        match mode {
            KeyMode::Mnemonic => {
                let mnemonic = get("MNEMONIC")
                    .ok_or_else(|| anyhow::anyhow!("MNEMONIC env var required for mnemonic mode"))?;

                let index: u32 = match get("DERIVATION_INDEX") {
                    Some(raw) => raw
                        .parse()
                        .map_err(|e| anyhow::anyhow!("Invalid DERIVATION_INDEX '{}': {}", raw, e))?,
                    None => 0,
                };

                let (private_key, address) = derive_from_mnemonic(&mnemonic, index)?;
                info!("Wallet derived from mnemonic (index: {}, address: {})", index, address);

                Ok(Self {
                    mode,
                    private_key: Some(private_key),
                    address: Some(address),
                })
            }
            KeyMode::PrivateKey => {
                let private_key = get("PRIVATE_KEY").ok_or_else(|| {
                    anyhow::anyhow!("PRIVATE_KEY env var required for private_key mode")
                })?;

                let address = derive_address(&private_key)?;
                info!("Wallet loaded from private key (address: {})", address);

                Ok(Self {
                    mode,
                    private_key: Some(private_key),
                    address: Some(address),
                })
            }
            KeyMode::None => Ok(Self {
                mode,
                private_key: None,
                address: None,
            }),
        }
    }

    /// Private key and address, or an error naming the missing credential
    pub fn require_signer(&self) -> anyhow::Result<(&str, &str)> {
        match (self.private_key.as_deref(), self.address.as_deref()) {
            (Some(key), Some(address)) => Ok((key, address)),
            _ => Err(anyhow::anyhow!(
                "No signer configured: set PRIVATE_KEY or MNEMONIC"
            )),
        }
    }
}

/// Derive key and address on the Ethereum path m/44'/60'/0'/0/{index}
fn derive_from_mnemonic(mnemonic: &str, index: u32) -> anyhow::Result<(String, String)> {
    let signer = MnemonicBuilder::<English>::default()
        .phrase(mnemonic)
        .index(index)
        .map_err(|e| anyhow::anyhow!("Invalid derivation index: {}", e))?
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to derive from mnemonic: {}", e))?;

    let private_key = format!("0x{}", hex::encode(signer.credential().to_bytes()));
    let address = format!("{:?}", signer.address());

    Ok((private_key, address))
}

fn derive_address(private_key: &str) -> anyhow::Result<String> {
    let signer = parse_signer(private_key)?;
    Ok(format!("{:?}", signer.address()))
}

/// Parse a hex private key, with or without 0x prefix
pub fn parse_signer(private_key: &str) -> anyhow::Result<PrivateKeySigner> {
    let key = private_key.strip_prefix("0x").unwrap_or(private_key);
    key.parse()
        .map_err(|e| anyhow::anyhow!("Invalid private key: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ANVIL_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_private_key_mode() {
        let wallet = WalletConfig::from_vars(&lookup(&[("PRIVATE_KEY", ANVIL_KEY)])).unwrap();
        assert_eq!(wallet.mode, KeyMode::PrivateKey);
        assert_eq!(
            wallet.address.unwrap().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_mnemonic_takes_precedence() {
        let wallet = WalletConfig::from_vars(&lookup(&[
            ("PRIVATE_KEY", ANVIL_KEY),
            ("MNEMONIC", TEST_MNEMONIC),
            ("DERIVATION_INDEX", "1"),
        ]))
        .unwrap();
        assert_eq!(wallet.mode, KeyMode::Mnemonic);
        // Second anvil account
        assert_eq!(
            wallet.address.unwrap().to_lowercase(),
            "0x70997970c51812dc3a010c7d01b50e0d17dc79c8"
        );
    }

    #[test]
    fn test_explicit_key_mode_override() {
        let wallet = WalletConfig::from_vars(&lookup(&[
            ("KEY_MODE", "private_key"),
            ("PRIVATE_KEY", ANVIL_KEY),
            ("MNEMONIC", TEST_MNEMONIC),
        ]))
        .unwrap();
        assert_eq!(wallet.mode, KeyMode::PrivateKey);
    }

    #[test]
    fn test_no_signer_is_reported() {
        let wallet = WalletConfig::from_vars(&lookup(&[])).unwrap();
        assert_eq!(wallet.mode, KeyMode::None);
        let err = wallet.require_signer().unwrap_err();
        assert!(err.to_string().contains("PRIVATE_KEY or MNEMONIC"));
    }

    #[test]
    fn test_bad_derivation_index_rejected() {
        let result = WalletConfig::from_vars(&lookup(&[
            ("MNEMONIC", TEST_MNEMONIC),
            ("DERIVATION_INDEX", "first"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_signer_accepts_unprefixed_key() {
        let prefixed = parse_signer(ANVIL_KEY).unwrap();
        let bare = parse_signer(ANVIL_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(prefixed.address(), bare.address());
    }
}
