//! Peer identity
//!
//! A peer is identified by the `(address, port)` pair it listens on. The
//! canonical `"address:port"` string is the key used in round logs, trust
//! stores and audit output.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Identity of a peer in the fixed membership set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Host name or IP address
    pub address: String,
    /// Listening port
    pub port: u16,
}

impl PeerIdentity {
    /// Create a new peer identity
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Canonical `"address:port"` key
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for PeerIdentity {
    type Err = Error;

    /// Parse `"address:port"`. The port is taken after the last colon so
    /// that bracket-less IPv6 hosts still split correctly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::InvalidPeer(format!("missing port in {s:?}")))?;
        if address.is_empty() {
            return Err(Error::InvalidPeer(format!("missing address in {s:?}")));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| Error::InvalidPeer(format!("invalid port in {s:?}: {e}")))?;
        Ok(Self::new(address, port))
    }
}

/// Ordered, fixed membership view of the network
///
/// Order is the configured order and is preserved in trust snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    members: Vec<PeerIdentity>,
}

impl PeerSet {
    /// Build a peer set, dropping repeated entries while keeping first-seen order
    pub fn new(members: impl IntoIterator<Item = PeerIdentity>) -> Self {
        let mut unique: Vec<PeerIdentity> = Vec::new();
        for peer in members {
            if !unique.contains(&peer) {
                unique.push(peer);
            }
        }
        Self { members: unique }
    }

    /// Number of peers (`|peers|`)
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if a peer is part of the membership
    pub fn contains(&self, peer: &PeerIdentity) -> bool {
        self.members.contains(peer)
    }

    /// Iterate in configured order
    pub fn iter(&self) -> impl Iterator<Item = &PeerIdentity> {
        self.members.iter()
    }

    /// Members as a slice
    pub fn as_slice(&self) -> &[PeerIdentity] {
        &self.members
    }
}

impl FromIterator<PeerIdentity> for PeerSet {
    fn from_iter<T: IntoIterator<Item = PeerIdentity>>(iter: T) -> Self {
        Self::new(iter)
    }
}
