//! # Trust Gossip
//!
//! **Gossip flooding with majority-based peer trust scoring for Byzantine network simulations.**
//!
//! Every node floods numeric amounts to a fixed, known peer set. Each node
//! logs the last amount it saw from every immediate sender; once a full
//! round of senders has been logged, the majority amount is taken as truth
//! and every sender's trust score is refreshed. Traitor nodes corrupt what
//! they relay by ±50, and honest nodes see their trust drop.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use trust_gossip::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = NodeConfig::builder()
//!         .node_id(0)
//!         .listen_addr("127.0.0.1:8000".parse()?)
//!         .peers(vec!["127.0.0.1:8000".parse()?, "127.0.0.1:8001".parse()?])
//!         .build();
//!
//!     let engine = Arc::new(GossipEngine::new(&config, TcpTransport::default(), TokioRuntime::new())?);
//!     let _listener = TcpTransport::listen(config.listen_addr, engine.clone(), DEFAULT_TIMEOUT).await?;
//!     engine.originate(Amount::from(100)).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `control-http` (default): axum control surface and the `trust_gossip_node` binary
//!
//! ## Crate Structure
//!
//! - [`trust_gossip_core`]: data model, round log, consensus and trust store
//! - [`trust_gossip_net`]: transport traits, JSON codec, TCP and mock transports
//! - [`trust_gossip_runtime`]: clock and task spawning (Tokio / mock)

#![forbid(unsafe_code)]

// Re-export sub-crates
pub use trust_gossip_core as core;
pub use trust_gossip_net as net;
pub use trust_gossip_runtime as runtime;

pub use trust_gossip_core::{
    consensus::{ConsensusValidator, RoundOutcome, Verdict},
    identity::{PeerIdentity, PeerSet},
    message::{Amount, GossipMessage, NodeId},
    trust::{TrustSnapshot, TrustStore},
};

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;

/// HTTP control surface (`POST /send`, `GET /metrics`).
#[cfg(feature = "control-http")]
pub mod control;

pub use config::{NodeConfig, NodeConfigBuilder};
pub use engine::{Disposition, EngineStats, GossipEngine, Originated};
pub use error::{Error, Result};

/// Prelude module for convenient imports
///
/// ```rust,ignore
/// use trust_gossip::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::core::prelude::*;
    pub use crate::net::prelude::*;
    pub use crate::runtime::tokio_runtime::TokioRuntime;
    pub use crate::runtime::NodeRuntime;

    pub use crate::audit::{AuditLog, AuditWriter};
    pub use crate::{Error, GossipEngine, NodeConfig, Result};
}
