//! # Trust Gossip Network
//!
//! Network transport abstractions for trust-gossip.
//!
//! This crate provides:
//! - `GossipTransport` trait for point-to-point delivery
//! - `InboundHandler` trait for accepted messages
//! - JSON wire codec with a payload size cap
//! - TCP transport (one message per connection)
//! - In-memory mock network for tests and simulations

pub mod protocol;
pub mod traits;

#[cfg(feature = "tcp-transport")]
pub mod tcp;

#[cfg(feature = "mock-transport")]
mod mock;
#[cfg(feature = "mock-transport")]
pub use mock::{MockNetwork, MockTransport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::protocol::*;
    pub use crate::traits::*;
    #[cfg(feature = "tcp-transport")]
    pub use crate::tcp::{ListenerHandle, TcpTransport};
}

/// Result type for network operations
pub type Result<T> = core::result::Result<T, Error>;

/// Network error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connecting to or writing to a peer failed
    #[error("delivery to {peer} failed: {source}")]
    Delivery {
        peer: String,
        #[source]
        source: std::io::Error,
    },
    /// Connect or write did not finish in time
    #[error("delivery to {peer} timed out")]
    Timeout { peer: String },
    /// Peer is not reachable (mock network)
    #[error("peer {0} unreachable")]
    PeerUnreachable(String),
    /// Message could not be serialized
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
    /// Inbound payload failed to parse or validate
    #[error(transparent)]
    Malformed(#[from] trust_gossip_core::Error),
    /// Inbound payload exceeded the size cap
    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },
    /// Listener could not bind
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this is an outbound delivery failure
    ///
    /// Delivery failures are logged and dropped; gossip is best-effort.
    pub fn is_delivery(&self) -> bool {
        matches!(
            self,
            Error::Delivery { .. } | Error::Timeout { .. } | Error::PeerUnreachable(_)
        )
    }
}
