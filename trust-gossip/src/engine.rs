//! Gossip engine
//!
//! One [`GossipEngine`] per node. It owns the node's private state (round
//! log, de-duplication caches, trust store) behind a single mutex, so the
//! "log, test boundary, maybe validate" step is atomic per message. Network
//! fan-out happens after the lock is released.
//!
//! Inbound flow for a valid message:
//!
//! 1. drop it if this exact `(sender, messageId)` pair was already delivered
//! 2. record `(sender, amount)` in the round log, validating at a boundary
//! 3. stop if `messageId` is already in the seen set
//! 4. otherwise re-flood to every peer except the immediate sender

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::Rng;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use trust_gossip_core::consensus::{ConsensusValidator, RoundOutcome};
use trust_gossip_core::identity::{PeerIdentity, PeerSet};
use trust_gossip_core::message::{Amount, GossipMessage, NodeId};
use trust_gossip_core::round::{RoundLog, RoundPhase};
use trust_gossip_core::seen::{DeliveryKey, SeenCache};
use trust_gossip_core::trust::{TrustSnapshot, TrustStore};
use trust_gossip_net::traits::{BroadcastStats, GossipTransport, InboundHandler};
use trust_gossip_runtime::NodeRuntime;

use crate::audit::AuditWriter;
use crate::config::NodeConfig;
use crate::error::Result;

/// Magnitude of a traitor's perturbation
pub const TRAITOR_OFFSET: f64 = 50.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-node mutable state
#[derive(Debug)]
struct NodeState {
    round_log: RoundLog,
    seen: SeenCache<String>,
    delivered: SeenCache<DeliveryKey>,
    trust: TrustStore,
}

/// Result of [`GossipEngine::originate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originated {
    /// Identity shared by every copy of the new flood
    pub message_id: String,
    /// Fan-out outcome; failures are already logged
    pub broadcast: BroadcastStats,
}

/// What happened to one inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Failed validation and was dropped
    Malformed,
    /// Exact re-delivery from the same sender; nothing changed
    Duplicate,
    /// Recorded in the round log; message id already seen, not re-flooded
    Logged,
    /// Recorded and re-flooded
    Forwarded(BroadcastStats),
}

/// Counters since the engine was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub received: u64,
    pub duplicates_dropped: u64,
    pub forwarded: u64,
    pub delivery_failures: u64,
    pub rounds_completed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    received: AtomicU64,
    duplicates_dropped: AtomicU64,
    forwarded: AtomicU64,
    delivery_failures: AtomicU64,
    rounds_completed: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> EngineStats {
        EngineStats {
            received: self.received.load(Ordering::Relaxed),
            duplicates_dropped: self.duplicates_dropped.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            rounds_completed: self.rounds_completed.load(Ordering::Relaxed),
        }
    }
}

/// Flooding, round tracking and trust maintenance for one node
pub struct GossipEngine<T: GossipTransport, R: NodeRuntime> {
    node_id: NodeId,
    identity: PeerIdentity,
    peers: PeerSet,
    traitor: bool,
    transport: Arc<T>,
    runtime: R,
    validator: ConsensusValidator,
    state: Mutex<NodeState>,
    audit: Option<Arc<AuditWriter>>,
    counters: Counters,
}

impl<T: GossipTransport, R: NodeRuntime> std::fmt::Debug for GossipEngine<T, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipEngine")
            .field("node_id", &self.node_id)
            .field("identity", &self.identity)
            .field("peers", &self.peers.len())
            .field("traitor", &self.traitor)
            .finish()
    }
}

impl<T: GossipTransport, R: NodeRuntime> GossipEngine<T, R> {
    /// Build an engine from a validated configuration
    pub fn new(config: &NodeConfig, transport: T, runtime: R) -> Result<Self> {
        config.validate()?;
        let peers = config.peer_set();
        let state = NodeState {
            round_log: RoundLog::new(peers.len()),
            seen: SeenCache::with_capacity(config.seen_capacity)?,
            delivered: SeenCache::with_capacity(config.seen_capacity)?,
            trust: TrustStore::new(&peers),
        };

        Ok(Self {
            node_id: config.node_id,
            identity: config.identity(),
            peers,
            traitor: config.traitor,
            transport: Arc::new(transport),
            runtime,
            validator: ConsensusValidator::default(),
            state: Mutex::new(state),
            audit: None,
            counters: Counters::default(),
        })
    }

    /// Send a snapshot to `writer` after every completed round
    pub fn with_audit(mut self, writer: AuditWriter) -> Self {
        self.audit = Some(Arc::new(writer));
        self
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub fn is_traitor(&self) -> bool {
        self.traitor
    }

    /// Start a new flood of `amount` to every configured peer
    ///
    /// Returns once every send has been attempted. Individual delivery
    /// failures are logged and counted but never fail the call.
    pub async fn originate(&self, amount: Amount) -> Originated {
        let message_id = Uuid::new_v4().to_string();
        lock(&self.state).seen.insert(message_id.clone());

        let message =
            GossipMessage::originate(self.node_id, &self.identity, amount, message_id.clone());
        info!(node_id = self.node_id, message_id = %message_id, amount = %amount, "originating broadcast");

        let broadcast = self.flood(&message, None).await;
        Originated {
            message_id,
            broadcast,
        }
    }

    /// Handle one inbound message
    pub async fn on_message_received(&self, message: GossipMessage) -> Disposition {
        if message.validate().is_err() {
            return Disposition::Malformed;
        }
        Counters::bump(&self.counters.received, 1);

        let sender = message.sender();
        debug!(
            node_id = self.node_id,
            sender = %sender,
            message_id = %message.message_id,
            amount = %message.amount,
            "received message"
        );

        let should_forward = {
            let mut state = lock(&self.state);
            if !state
                .delivered
                .insert((sender.clone(), message.message_id.clone()))
            {
                drop(state);
                Counters::bump(&self.counters.duplicates_dropped, 1);
                debug!(sender = %sender, message_id = %message.message_id, "duplicate delivery dropped");
                return Disposition::Duplicate;
            }

            self.record_locked(&mut state, sender.clone(), message.amount);
            state.seen.insert(message.message_id.clone())
        };

        if !should_forward {
            return Disposition::Logged;
        }

        let copy = message.forwarded_by(self.node_id, &self.identity, message.amount);
        let stats = self.flood(&copy, Some(&sender)).await;
        Counters::bump(&self.counters.forwarded, 1);
        Disposition::Forwarded(stats)
    }

    /// Record `amount` for `sender`, validating the round at a boundary
    pub fn log_message(&self, sender: PeerIdentity, amount: Amount) -> Option<RoundOutcome> {
        let mut state = lock(&self.state);
        self.record_locked(&mut state, sender, amount)
    }

    fn record_locked(
        &self,
        state: &mut NodeState,
        sender: PeerIdentity,
        amount: Amount,
    ) -> Option<RoundOutcome> {
        if let RoundPhase::Collecting(_) = state.round_log.record(sender, amount) {
            return None;
        }

        let entries = state.round_log.take();
        let outcome = self.validator.validate(&entries, &mut state.trust)?;
        Counters::bump(&self.counters.rounds_completed, 1);
        info!(
            node_id = self.node_id,
            majority = %outcome.majority,
            senders = entries.len(),
            dissenters = outcome.dissenters().count(),
            "round complete"
        );

        if let Some(audit) = &self.audit {
            audit.submit(TrustSnapshot::capture(&state.trust, self.runtime.now_millis()));
        }
        Some(outcome)
    }

    /// Amount placed on the wire for one outgoing copy
    fn outgoing_amount(&self, amount: Amount) -> Amount {
        if !self.traitor {
            return amount;
        }
        if rand::thread_rng().gen_bool(0.5) {
            amount.offset(TRAITOR_OFFSET)
        } else {
            amount.offset(-TRAITOR_OFFSET)
        }
    }

    /// Concurrently send a copy of `message` to every peer but `exclude`
    async fn flood(&self, message: &GossipMessage, exclude: Option<&PeerIdentity>) -> BroadcastStats {
        let mut sends = JoinSet::new();
        for peer in self.peers.iter() {
            if Some(peer) == exclude {
                continue;
            }
            let mut copy = message.clone();
            copy.amount = self.outgoing_amount(message.amount);

            let transport = Arc::clone(&self.transport);
            let peer = peer.clone();
            sends.spawn(async move {
                let result = transport.send_to(&peer, &copy).await;
                (peer, result)
            });
        }

        let mut stats = BroadcastStats {
            peers_sent: sends.len(),
            ..BroadcastStats::default()
        };
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((_, Ok(()))) => stats.delivered += 1,
                Ok((peer, Err(e))) => {
                    stats.failed += 1;
                    warn!(node_id = self.node_id, peer = %peer, error = %e, "failed to send message");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(node_id = self.node_id, error = %e, "send task failed");
                }
            }
        }

        Counters::bump(&self.counters.delivery_failures, stats.failed as u64);
        stats
    }

    /// Current trust scores stamped with the runtime clock
    pub fn trust_snapshot(&self) -> TrustSnapshot {
        TrustSnapshot::capture(&lock(&self.state).trust, self.runtime.now_millis())
    }

    pub fn trust_score(&self, peer: &PeerIdentity) -> Option<f64> {
        lock(&self.state).trust.get(peer)
    }

    /// Number of senders in the open round
    pub fn round_log_len(&self) -> usize {
        lock(&self.state).round_log.len()
    }

    /// Amount logged for `sender` in the open round
    pub fn round_log_amount(&self, sender: &PeerIdentity) -> Option<Amount> {
        lock(&self.state).round_log.get(sender)
    }

    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    /// Wait until every queued audit snapshot is written
    pub async fn flush_audit(&self) {
        if let Some(audit) = &self.audit {
            audit.flush().await;
        }
    }

    /// Stop the audit writer after draining it
    pub async fn close_audit(&self) {
        if let Some(audit) = &self.audit {
            audit.close().await;
        }
    }
}

#[async_trait::async_trait]
impl<T: GossipTransport, R: NodeRuntime> InboundHandler for GossipEngine<T, R> {
    async fn on_message(&self, message: GossipMessage) {
        self.on_message_received(message).await;
    }
}
