//! Per-round message log
//!
//! A round is a window of `|peers|` logged senders. Rounds are counted by
//! the number of distinct senders in the log, not tagged with an id, so a
//! late message from an earlier flood lands in whatever window is open.

use crate::identity::PeerIdentity;
use crate::message::Amount;

/// Phase of the per-node round state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Accumulating amounts; holds the current log size
    Collecting(usize),
    /// Boundary reached, consensus must run before the next message
    Validating,
}

/// Last amount observed from each immediate sender in the current round
///
/// Iteration follows first-insertion order. Overwriting a sender keeps its
/// original position; consensus tie-breaking depends on this order.
#[derive(Debug, Clone)]
pub struct RoundLog {
    entries: Vec<(PeerIdentity, Amount)>,
    round_size: usize,
}

impl RoundLog {
    /// Create an empty log whose boundary is every `round_size` senders
    ///
    /// A `round_size` of zero is treated as one.
    pub fn new(round_size: usize) -> Self {
        Self {
            entries: Vec::with_capacity(round_size),
            round_size: round_size.max(1),
        }
    }

    /// Record `amount` for `sender`, replacing any earlier amount from it
    pub fn record(&mut self, sender: PeerIdentity, amount: Amount) -> RoundPhase {
        match self.entries.iter_mut().find(|(peer, _)| *peer == sender) {
            Some(slot) => slot.1 = amount,
            None => self.entries.push((sender, amount)),
        }
        self.phase()
    }

    /// Current phase derived from the log size
    pub fn phase(&self) -> RoundPhase {
        if self.is_boundary() {
            RoundPhase::Validating
        } else {
            RoundPhase::Collecting(self.entries.len())
        }
    }

    /// Whether `|log| mod round_size == 0` with a non-empty log
    pub fn is_boundary(&self) -> bool {
        !self.entries.is_empty() && self.entries.len() % self.round_size == 0
    }

    /// Amount last recorded for `sender`
    pub fn get(&self, sender: &PeerIdentity) -> Option<Amount> {
        self.entries
            .iter()
            .find(|(peer, _)| peer == sender)
            .map(|(_, amount)| *amount)
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[(PeerIdentity, Amount)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn round_size(&self) -> usize {
        self.round_size
    }

    /// Drain the log, leaving it empty for the next round
    pub fn take(&mut self) -> Vec<(PeerIdentity, Amount)> {
        core::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(n: u16) -> PeerIdentity {
        PeerIdentity::new("10.0.0.1", 8000 + n)
    }

    #[test]
    fn boundary_every_round_size_senders() {
        let mut log = RoundLog::new(5);
        for i in 0..4 {
            assert_eq!(log.record(peer(i), Amount::from(100)), RoundPhase::Collecting(i as usize + 1));
        }
        assert_eq!(log.record(peer(4), Amount::from(100)), RoundPhase::Validating);

        let drained = log.take();
        assert_eq!(drained.len(), 5);
        assert!(log.is_empty());
        assert_eq!(log.phase(), RoundPhase::Collecting(0));

        assert_eq!(log.record(peer(5), Amount::from(100)), RoundPhase::Collecting(1));
    }

    #[test]
    fn same_sender_overwrites_in_place() {
        let mut log = RoundLog::new(3);
        log.record(peer(1), Amount::from(100));
        log.record(peer(2), Amount::from(100));
        log.record(peer(1), Amount::from(200));

        assert_eq!(log.len(), 2);
        assert_eq!(log.get(&peer(1)), Some(Amount::from(200)));
        assert_eq!(log.entries()[0].0, peer(1));
    }

    #[test]
    fn empty_log_is_not_a_boundary() {
        let log = RoundLog::new(1);
        assert!(!log.is_boundary());
    }

    #[test]
    fn zero_round_size_behaves_as_one() {
        let mut log = RoundLog::new(0);
        assert_eq!(log.round_size(), 1);
        assert_eq!(log.record(peer(0), Amount::from(1)), RoundPhase::Validating);
    }
}
