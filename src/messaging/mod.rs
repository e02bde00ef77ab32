pub mod client;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::types::RelayError;

pub use client::HttpMessenger;

/// Open direct conversation with one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub peer: Address,
    pub conversation_id: String,
}

/// Peer-to-peer messaging transport
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn open_direct_channel(&self, peer: Address) -> Result<ChannelHandle, RelayError>;

    async fn send_text(&self, channel: &ChannelHandle, text: &str) -> Result<(), RelayError>;
}
