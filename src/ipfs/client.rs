use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::RelayError;

const PUBLIC_GATEWAY: &str = "https://ipfs.io/ipfs";

/// Pins JSON documents (agent passports) to IPFS
///
/// Supports Pinata (`pinJSONToIPFS`) and any node exposing the Kubo
/// `/api/v0/add` endpoint.
pub struct IpfsClient {
    http_client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
}

/// Where a pinned document can be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinnedDocument {
    pub cid: String,
    pub uri: String,
    pub gateway_url: String,
}

impl PinnedDocument {
    fn from_cid(cid: String) -> Self {
        Self {
            uri: format!("ipfs://{}", cid),
            gateway_url: format!("{}/{}", PUBLIC_GATEWAY, cid),
            cid,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PinataUpload<'a> {
    pinata_content: &'a serde_json::Value,
    pinata_metadata: PinataMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct PinataMetadata<'a> {
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct PinataResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Debug, Deserialize)]
struct KuboAddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

impl IpfsClient {
    pub fn new(http_client: reqwest::Client, api_url: &str, api_key: Option<String>) -> Self {
        Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn is_pinata(&self) -> bool {
        self.api_url.contains("pinata")
    }

    /// Pin a JSON document under `name`
    pub async fn pin_json(
        &self,
        content: &serde_json::Value,
        name: &str,
    ) -> Result<PinnedDocument, RelayError> {
        debug!("Pinning {} to {}", name, self.api_url);

        let cid = if self.is_pinata() {
            self.pin_pinata(content, name).await?
        } else {
            self.pin_kubo(content, name).await?
        };

        info!("Pinned {} as {}", name, cid);
        Ok(PinnedDocument::from_cid(cid))
    }

    async fn pin_pinata(
        &self,
        content: &serde_json::Value,
        name: &str,
    ) -> Result<String, RelayError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| RelayError::IpfsError("Pinata API key required".to_string()))?;

        let response = self
            .http_client
            .post(format!("{}/pinning/pinJSONToIPFS", self.api_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&PinataUpload {
                pinata_content: content,
                pinata_metadata: PinataMetadata { name },
            })
            .send()
            .await
            .map_err(|e| RelayError::IpfsError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::IpfsError(format!(
                "Pinata upload failed: {} - {}",
                status, body
            )));
        }

        let pinned: PinataResponse = response
            .json()
            .await
            .map_err(|e| RelayError::IpfsError(format!("Failed to parse Pinata response: {}", e)))?;

        Ok(pinned.ipfs_hash)
    }

    async fn pin_kubo(&self, content: &serde_json::Value, name: &str) -> Result<String, RelayError> {
        let json_bytes = serde_json::to_vec(content)
            .map_err(|e| RelayError::IpfsError(format!("JSON serialization failed: {}", e)))?;

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(json_bytes)
                .file_name(format!("{}.json", name))
                .mime_str("application/json")
                .map_err(|e| RelayError::IpfsError(e.to_string()))?,
        );

        let mut request = self
            .http_client
            .post(format!("{}/api/v0/add?pin=true", self.api_url))
            .multipart(form);

        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::IpfsError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::IpfsError(format!(
                "IPFS add failed: {}",
                response.status()
            )));
        }

        let added: KuboAddResponse = response
            .json()
            .await
            .map_err(|e| RelayError::IpfsError(format!("Failed to parse IPFS response: {}", e)))?;

        Ok(added.hash)
    }
}
