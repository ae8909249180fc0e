use crate::config::ConfigError;
use crate::stomp::StompError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("Invalid response from {url}: {reason}")]
    InvalidResponse { url: String, reason: String },

    #[error("Realtime channel: {0}")]
    Stomp(#[from] StompError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fragment task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown dataset `{0}`")]
    UnknownDataset(String),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
