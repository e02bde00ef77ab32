use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Blockchain error: {0}")]
    BlockchainError(String),

    #[error("Messaging error: {0}")]
    MessagingError(String),

    #[error("IPFS error: {0}")]
    IpfsError(String),

    #[error("State error: {0}")]
    StateError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the failure came from a remote collaborator rather than local input
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            RelayError::BlockchainError(_) | RelayError::MessagingError(_) | RelayError::IpfsError(_)
        )
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        RelayError::MessagingError(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::InvalidRequest(format!("JSON parse error: {}", err))
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::StateError(err.to_string())
    }
}

impl From<redis::RedisError> for RelayError {
    fn from(err: redis::RedisError) -> Self {
        RelayError::StateError(format!("Redis: {}", err))
    }
}
