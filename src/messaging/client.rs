use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChannelHandle, Messenger};
use crate::types::RelayError;

/// Messaging relay reached over HTTP
///
/// The relay holds the wallet-bound messaging identity; this client only
/// opens conversations and posts text on behalf of `sender`.
pub struct HttpMessenger {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    sender: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OpenConversation<'a> {
    peer_address: String,
    sender_address: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConversationResponse {
    conversation_id: String,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    content: &'a str,
}

impl HttpMessenger {
    pub fn new(
        http_client: reqwest::Client,
        api_url: &str,
        api_key: Option<String>,
        sender: &str,
    ) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            sender: sender.to_string(),
        }
    }

    /// Messenger on its own HTTP client with no request deadline; a slow
    /// relay holds the cycle until the transport gives up
    pub fn connect(api_url: &str, api_key: Option<String>, sender: &str) -> Self {
        Self::new(reqwest::Client::new(), api_url, api_key, sender)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http_client.post(format!("{}{}", self.api_url, path));
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }
}

#[async_trait]
impl Messenger for HttpMessenger {
    async fn open_direct_channel(&self, peer: Address) -> Result<ChannelHandle, RelayError> {
        let response = self
            .post("/v1/conversations")
            .json(&OpenConversation {
                peer_address: peer.to_string(),
                sender_address: &self.sender,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::MessagingError(format!(
                "Opening conversation with {} failed: {} - {}",
                peer, status, body
            )));
        }

        let conversation: ConversationResponse = response.json().await.map_err(|e| {
            RelayError::MessagingError(format!("Failed to parse conversation response: {}", e))
        })?;

        debug!("Conversation {} open with {}", conversation.conversation_id, peer);

        Ok(ChannelHandle {
            peer,
            conversation_id: conversation.conversation_id,
        })
    }

    async fn send_text(&self, channel: &ChannelHandle, text: &str) -> Result<(), RelayError> {
        let response = self
            .post(&format!("/v1/conversations/{}/messages", channel.conversation_id))
            .json(&OutgoingMessage { content: text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RelayError::MessagingError(format!(
                "Sending to {} failed: {}",
                channel.peer,
                response.status()
            )));
        }

        Ok(())
    }
}
