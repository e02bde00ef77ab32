use async_trait::async_trait;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::types::RelayError;

/// Redis key holding the watcher record
const STATE_KEY_PREFIX: &str = "arc_id_relay:watcher:";

/// Persisted watermark: `{ "lastBlock": <n> | null }`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherState {
    #[serde(rename = "lastBlock", default)]
    pub last_processed_block: Option<u64>,
}

impl WatcherState {
    pub fn at(block: u64) -> Self {
        Self {
            last_processed_block: Some(block),
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.last_processed_block.is_none()
    }

    /// Record as stored by every backend
    fn to_json(&self) -> Result<String, RelayError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RelayError::StateError(format!("Failed to serialize state: {}", e)))
    }

    /// Parse a stored record; `origin` names where it came from in the error
    fn from_json(raw: &[u8], origin: &str) -> Result<Self, RelayError> {
        serde_json::from_slice(raw)
            .map_err(|e| RelayError::StateError(format!("Corrupt state in {}: {}", origin, e)))
    }
}

/// Redis key for a watcher scope (chain id and registry address)
fn state_key(scope: &str) -> String {
    format!("{}{}", STATE_KEY_PREFIX, scope.to_lowercase())
}

/// Durable home of the watcher record
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Current record; a store that was never written yields the fresh state
    async fn load(&self) -> Result<WatcherState, RelayError>;

    /// Replace the record wholesale
    async fn save(&self, state: &WatcherState) -> Result<(), RelayError>;

    fn describe(&self) -> String;
}

/// JSON document on local disk
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "watcher-state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<WatcherState, RelayError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => WatcherState::from_json(&bytes, &self.describe()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", self.path.display());
                Ok(WatcherState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &WatcherState) -> Result<(), RelayError> {
        let json = state.to_json()?;

        // Rename over the old record so a crash never leaves half a file
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!("State written to {}", self.path.display());
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Watcher record kept under one Redis key
pub struct RedisStateStore {
    conn: RwLock<redis::aio::ConnectionManager>,
    key: String,
}

impl RedisStateStore {
    /// Connect; `scope` keeps watchers for different registries apart
    pub async fn connect(url: &str, scope: &str) -> Result<Self, RelayError> {
        let client = Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        info!("Connected to Redis at {}", url);

        Ok(Self {
            conn: RwLock::new(conn),
            key: state_key(scope),
        })
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn load(&self) -> Result<WatcherState, RelayError> {
        let mut conn = self.conn.write().await;
        let raw: Option<String> = conn.get(&self.key).await?;

        match raw {
            Some(json) => WatcherState::from_json(json.as_bytes(), &self.describe()),
            None => Ok(WatcherState::default()),
        }
    }

    async fn save(&self, state: &WatcherState) -> Result<(), RelayError> {
        let json = state.to_json()?;

        let mut conn = self.conn.write().await;
        conn.set::<_, _, ()>(&self.key, json).await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("redis key {}", self.key)
    }
}

/// Process-local store
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStateStore {
    state: RwLock<WatcherState>,
    writes: RwLock<u64>,
}

#[cfg(test)]
impl MemoryStateStore {
    pub fn with_state(state: WatcherState) -> Self {
        Self {
            state: RwLock::new(state),
            writes: RwLock::new(0),
        }
    }

    pub async fn snapshot(&self) -> WatcherState {
        *self.state.read().await
    }

    /// Number of successful saves
    pub async fn writes(&self) -> u64 {
        *self.writes.read().await
    }
}

#[cfg(test)]
#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<WatcherState, RelayError> {
        Ok(*self.state.read().await)
    }

    async fn save(&self, state: &WatcherState) -> Result<(), RelayError> {
        *self.state.write().await = *state;
        *self.writes.write().await += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}
