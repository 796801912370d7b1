//! Round consensus and trust verdicts
//!
//! When a round closes, the majority (mode) amount of the round log is
//! taken as the agreed value. Every sender is then classified:
//!
//! - **agree**: trust snaps back to `1.0`
//! - **dissent**: trust drops by a fixed penalty, rounded to one decimal and
//!   floored at `0.0`
//!
//! Scores are not averaged across rounds. One disagreement always costs the
//! same penalty and one agreement always restores full trust.
//!
//! ## Tie-break
//!
//! When several amounts share the highest count, the amount that was
//! encountered first while walking the round log in insertion order wins.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::identity::PeerIdentity;
use crate::message::Amount;
use crate::trust::{round_score, TrustStore, FULL_TRUST, NO_TRUST};

/// Trust lost on a single disagreement
pub const DEFAULT_PENALTY: f64 = 0.2;

/// Classification of one sender in a closed round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Reported the majority amount
    Agree,
    /// Reported something else
    Dissent,
}

/// Verdict applied to one peer, with the score change it caused
#[derive(Debug, Clone, PartialEq)]
pub struct PeerVerdict {
    pub peer: PeerIdentity,
    pub amount: Amount,
    pub verdict: Verdict,
    pub previous: f64,
    pub updated: f64,
}

/// Result of validating one round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// Agreed amount
    pub majority: Amount,
    /// Verdicts for configured peers, in round-log order
    pub verdicts: Vec<PeerVerdict>,
}

impl RoundOutcome {
    /// Peers that disagreed with the majority
    pub fn dissenters(&self) -> impl Iterator<Item = &PeerIdentity> {
        self.verdicts
            .iter()
            .filter(|v| v.verdict == Verdict::Dissent)
            .map(|v| &v.peer)
    }
}

/// Majority detection and trust refresh
#[derive(Debug, Clone)]
pub struct ConsensusValidator {
    penalty: f64,
}

impl Default for ConsensusValidator {
    fn default() -> Self {
        Self::new(DEFAULT_PENALTY)
    }
}

impl ConsensusValidator {
    /// Create a validator with a custom penalty (clamped to `[0.0, 1.0]`)
    pub fn new(penalty: f64) -> Self {
        Self {
            penalty: penalty.clamp(NO_TRUST, FULL_TRUST),
        }
    }

    /// Most frequent amount in `entries`, first-encountered on ties
    ///
    /// Returns `None` for an empty round.
    pub fn compute_consensus(&self, entries: &[(PeerIdentity, Amount)]) -> Option<Amount> {
        let mut tally: Vec<(Amount, usize)> = Vec::new();
        let mut index: HashMap<Amount, usize> = HashMap::new();

        for (_, amount) in entries {
            match index.get(amount) {
                Some(&slot) => tally[slot].1 += 1,
                None => {
                    index.insert(*amount, tally.len());
                    tally.push((*amount, 1));
                }
            }
        }

        // Strictly-greater keeps the earliest amount on ties.
        let mut best: Option<(Amount, usize)> = None;
        for (amount, count) in tally {
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((amount, count)),
            }
        }
        best.map(|(amount, _)| amount)
    }

    /// Apply agree/dissent verdicts for `entries` against `majority`
    ///
    /// Senders outside the configured peer set are skipped.
    pub fn apply_verdicts(
        &self,
        entries: &[(PeerIdentity, Amount)],
        majority: Amount,
        store: &mut TrustStore,
    ) -> Vec<PeerVerdict> {
        let mut verdicts = Vec::with_capacity(entries.len());

        for (peer, amount) in entries {
            let Some(previous) = store.get(peer) else {
                warn!(peer = %peer, "trust key not found for sender, skipping verdict");
                continue;
            };

            let (verdict, updated) = if *amount == majority {
                (Verdict::Agree, FULL_TRUST)
            } else {
                let lowered = round_score(previous - self.penalty).max(NO_TRUST);
                (Verdict::Dissent, lowered)
            };

            if store.set(peer, updated).is_err() {
                continue;
            }

            match verdict {
                Verdict::Agree => debug!(peer = %peer, "peer sent correct value"),
                Verdict::Dissent => info!(
                    peer = %peer,
                    reported = %amount,
                    majority = %majority,
                    trust = updated,
                    "lowering trust in peer"
                ),
            }

            verdicts.push(PeerVerdict {
                peer: peer.clone(),
                amount: *amount,
                verdict,
                previous,
                updated,
            });
        }

        verdicts
    }

    /// Compute the majority and apply verdicts in one step
    pub fn validate(
        &self,
        entries: &[(PeerIdentity, Amount)],
        store: &mut TrustStore,
    ) -> Option<RoundOutcome> {
        let majority = self.compute_consensus(entries)?;
        let verdicts = self.apply_verdicts(entries, majority, store);
        Some(RoundOutcome { majority, verdicts })
    }
}
