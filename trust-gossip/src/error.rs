//! Error types for trust-gossip nodes.

use thiserror::Error;

/// Node error type
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Control-plane request was missing or had a malformed field
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Core model error
    #[error(transparent)]
    Core(#[from] trust_gossip_core::Error),

    /// Transport error
    #[error(transparent)]
    Net(#[from] trust_gossip_net::Error),
}

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, Error>;
