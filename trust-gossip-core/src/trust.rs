//! Per-peer trust scores
//!
//! Scores live in `[0.0, 1.0]` and start at `1.0` for every configured
//! peer. They only change when a round completes (see
//! [`crate::consensus::ConsensusValidator::apply_verdicts`]).

use std::collections::HashMap;

use serde::Serialize;

use crate::identity::{PeerIdentity, PeerSet};
use crate::{Error, Result};

/// Initial and fully-restored trust score
pub const FULL_TRUST: f64 = 1.0;
/// Lowest possible trust score
pub const NO_TRUST: f64 = 0.0;

/// Round a score to one decimal place
pub fn round_score(score: f64) -> f64 {
    (score * 10.0).round() / 10.0
}

/// Trust scores for the fixed peer set
#[derive(Debug, Clone)]
pub struct TrustStore {
    order: Vec<PeerIdentity>,
    scores: HashMap<PeerIdentity, f64>,
}

impl TrustStore {
    /// Start every peer at full trust
    pub fn new(peers: &PeerSet) -> Self {
        let order: Vec<PeerIdentity> = peers.iter().cloned().collect();
        let scores = order.iter().map(|p| (p.clone(), FULL_TRUST)).collect();
        Self { order, scores }
    }

    pub fn get(&self, peer: &PeerIdentity) -> Option<f64> {
        self.scores.get(peer).copied()
    }

    /// Set a peer's score, clamped to `[0.0, 1.0]`
    ///
    /// Peers outside the configured set are rejected; the membership is fixed.
    pub fn set(&mut self, peer: &PeerIdentity, score: f64) -> Result<()> {
        match self.scores.get_mut(peer) {
            Some(slot) => {
                *slot = score.clamp(NO_TRUST, FULL_TRUST);
                Ok(())
            }
            None => Err(Error::UnknownPeer(peer.key())),
        }
    }

    /// Scores in configured peer order
    pub fn snapshot(&self) -> Vec<(PeerIdentity, f64)> {
        self.order
            .iter()
            .map(|p| (p.clone(), self.scores.get(p).copied().unwrap_or(FULL_TRUST)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Point-in-time copy of a trust store, stamped for audit output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustSnapshot {
    /// Unix milliseconds at which the snapshot was taken
    pub taken_at_millis: u64,
    /// `(peer, score)` in configured order
    pub scores: Vec<(PeerIdentity, f64)>,
}

impl TrustSnapshot {
    pub fn capture(store: &TrustStore, taken_at_millis: u64) -> Self {
        Self {
            taken_at_millis,
            scores: store.snapshot(),
        }
    }
}
