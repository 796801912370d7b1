//! # Trust Gossip Core
//!
//! Core data model and algorithms for the trust-gossip network.
//!
//! This crate provides:
//! - Peer identities and the fixed membership set
//! - The `GossipMessage` wire record and `Amount` value type
//! - The per-round message log
//! - Majority detection and trust verdicts
//! - The per-peer trust store and audit snapshots
//! - Bounded duplicate-suppression caches
//!
//! Nothing in here does I/O; transports live in `trust-gossip-net` and the
//! engine that ties everything together lives in `trust-gossip`.

pub mod consensus;
pub mod identity;
pub mod message;
pub mod round;
pub mod seen;
pub mod trust;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::consensus::{ConsensusValidator, PeerVerdict, RoundOutcome, Verdict};
    pub use crate::identity::{PeerIdentity, PeerSet};
    pub use crate::message::{Amount, GossipMessage, NodeId};
    pub use crate::round::{RoundLog, RoundPhase};
    pub use crate::seen::{DeliveryKey, SeenCache};
    pub use crate::trust::{TrustSnapshot, TrustStore};
}

/// Result type for core operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error type for core operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Inbound message failed validation
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    /// Peer identity could not be parsed
    #[error("invalid peer identity: {0}")]
    InvalidPeer(String),
    /// Peer is not part of the configured membership
    #[error("unknown peer: {0}")]
    UnknownPeer(String),
    /// A bounded structure was configured with zero capacity
    #[error("capacity must be non-zero")]
    ZeroCapacity,
}
