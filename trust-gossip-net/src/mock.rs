//! Mock transport for testing
//!
//! An in-process network: every node registers its inbound handler under
//! its peer identity, and `MockTransport::send_to` hands the message to the
//! target's handler on a fresh task. Messages still go through the JSON
//! codec so the wire contract is exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use trust_gossip_core::identity::PeerIdentity;
use trust_gossip_core::message::GossipMessage;

use crate::protocol::{decode, encode};
use crate::traits::{GossipTransport, InboundHandler};
use crate::{Error, Result};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Inner {
    nodes: Mutex<HashMap<PeerIdentity, Arc<dyn InboundHandler>>>,
    offline: Mutex<HashSet<PeerIdentity>>,
    delivered: Mutex<Vec<(PeerIdentity, GossipMessage)>>,
    in_flight: AtomicUsize,
    latency: Mutex<Duration>,
}

/// A network of interconnected mock transports for testing
#[derive(Clone, Default)]
pub struct MockNetwork {
    inner: Arc<Inner>,
}

impl core::fmt::Debug for MockNetwork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MockNetwork")
            .field("nodes", &lock(&self.inner.nodes).len())
            .field("in_flight", &self.inner.in_flight.load(Ordering::SeqCst))
            .finish()
    }
}

impl MockNetwork {
    /// Create an empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simulated per-delivery latency
    pub fn with_latency(self, latency: Duration) -> Self {
        *lock(&self.inner.latency) = latency;
        self
    }

    /// Attach a node's inbound handler under its identity
    pub fn register(&self, peer: PeerIdentity, handler: Arc<dyn InboundHandler>) {
        lock(&self.inner.nodes).insert(peer, handler);
    }

    /// Take a peer offline (or bring it back); sends to it fail
    pub fn set_offline(&self, peer: &PeerIdentity, offline: bool) {
        let mut set = lock(&self.inner.offline);
        if offline {
            set.insert(peer.clone());
        } else {
            set.remove(peer);
        }
    }

    /// Transport handle bound to this network
    pub fn transport(&self) -> MockTransport {
        MockTransport {
            network: self.clone(),
        }
    }

    /// Every accepted delivery so far, in send order
    pub fn delivered(&self) -> Vec<(PeerIdentity, GossipMessage)> {
        lock(&self.inner.delivered).clone()
    }

    /// Messages accepted for one peer
    pub fn delivered_to(&self, peer: &PeerIdentity) -> Vec<GossipMessage> {
        lock(&self.inner.delivered)
            .iter()
            .filter(|(to, _)| to == peer)
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Number of deliveries whose handler has not returned yet
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until every delivery, including the ones they trigger, is handled
    pub async fn settle(&self) {
        while self.in_flight() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

/// Mock transport for testing without real networking
#[derive(Debug, Clone)]
pub struct MockTransport {
    network: MockNetwork,
}

#[async_trait::async_trait]
impl GossipTransport for MockTransport {
    async fn send_to(&self, peer: &PeerIdentity, message: &GossipMessage) -> Result<()> {
        let payload = encode(message)?;

        let handler = {
            if lock(&self.network.inner.offline).contains(peer) {
                return Err(Error::PeerUnreachable(peer.key()));
            }
            match lock(&self.network.inner.nodes).get(peer) {
                Some(handler) => Arc::clone(handler),
                None => return Err(Error::PeerUnreachable(peer.key())),
            }
        };

        let message = decode(&payload)?;
        lock(&self.network.inner.delivered).push((peer.clone(), message.clone()));

        // Counted before spawning so `settle` never observes a gap.
        let inner = Arc::clone(&self.network.inner);
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        let latency = *lock(&inner.latency);
        tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            handler.on_message(message).await;
            inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trust_gossip_core::message::Amount;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<GossipMessage>>);

    #[async_trait::async_trait]
    impl InboundHandler for Recorder {
        async fn on_message(&self, message: GossipMessage) {
            lock(&self.0).push(message);
        }
    }

    #[tokio::test]
    async fn delivers_to_registered_peer() {
        let network = MockNetwork::new();
        let peer = PeerIdentity::new("node-1", 8001);
        let recorder = Arc::new(Recorder::default());
        network.register(peer.clone(), recorder.clone());

        let msg = GossipMessage::originate(0, &peer, Amount::from(5), "m");
        network.transport().send_to(&peer, &msg).await.unwrap();
        network.settle().await;

        assert_eq!(lock(&recorder.0).as_slice(), &[msg]);
        assert_eq!(network.delivered_to(&peer).len(), 1);
    }

    #[tokio::test]
    async fn offline_and_unknown_peers_fail() {
        let network = MockNetwork::new();
        let peer = PeerIdentity::new("node-1", 8001);
        network.register(peer.clone(), Arc::new(Recorder::default()));
        network.set_offline(&peer, true);

        let msg = GossipMessage::originate(0, &peer, Amount::from(5), "m");
        let transport = network.transport();
        assert!(matches!(
            transport.send_to(&peer, &msg).await,
            Err(Error::PeerUnreachable(_))
        ));
        assert!(matches!(
            transport.send_to(&PeerIdentity::new("ghost", 1), &msg).await,
            Err(Error::PeerUnreachable(_))
        ));

        network.set_offline(&peer, false);
        assert!(transport.send_to(&peer, &msg).await.is_ok());
        network.settle().await;
    }
}
