//! Transport traits and types
//!
//! This module defines the core transport abstraction.

use trust_gossip_core::identity::PeerIdentity;
use trust_gossip_core::message::GossipMessage;

use crate::Result;

/// Statistics from a fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Number of peers a send was attempted to
    pub peers_sent: usize,
    /// Number of sends that completed
    pub delivered: usize,
    /// Number of failed sends
    pub failed: usize,
}

/// Point-to-point delivery of gossip messages
#[async_trait::async_trait]
pub trait GossipTransport: Send + Sync + 'static {
    /// Deliver `message` to exactly one peer
    ///
    /// A failure is a delivery error for this peer only; it is never
    /// retried by the transport.
    async fn send_to(&self, peer: &PeerIdentity, message: &GossipMessage) -> Result<()>;
}

/// Receiver of validated inbound messages
#[async_trait::async_trait]
pub trait InboundHandler: Send + Sync + 'static {
    /// Handle one inbound message
    async fn on_message(&self, message: GossipMessage);
}
