//! Gossip message and amount types
//!
//! These are the records that travel between nodes. The JSON field names
//! (`senderId`, `originId`, ...) are part of the wire contract and must not
//! change.

use core::fmt;
use core::hash::{Hash, Hasher};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::identity::PeerIdentity;
use crate::{Error, Result};

/// Integer identifier of a node
pub type NodeId = u32;

/// Largest magnitude at which every integer is exactly representable in `f64`
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// The value under consensus
///
/// Wraps a finite `f64` so that integer and fractional amounts share one
/// type. Equality and hashing are bitwise on the normalized value (`-0.0`
/// equals `0.0`), which makes amounts usable as tally keys.
#[derive(Debug, Clone, Copy)]
pub struct Amount(f64);

impl Amount {
    /// Create an amount, rejecting NaN and infinities
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() {
            Ok(Self(if value == 0.0 { 0.0 } else { value }))
        } else {
            Err(Error::MalformedMessage(format!(
                "amount must be finite, got {value}"
            )))
        }
    }

    /// Raw value
    pub fn value(self) -> f64 {
        self.0
    }

    /// Shift the amount by `delta`, saturating to the finite range
    pub fn offset(self, delta: f64) -> Self {
        let shifted = self.0 + delta;
        if shifted.is_finite() {
            Self(if shifted == 0.0 { 0.0 } else { shifted })
        } else {
            Self(f64::MAX.copysign(shifted))
        }
    }

    fn as_exact_integer(self) -> Option<i64> {
        if self.0.fract() == 0.0 && self.0.abs() < MAX_EXACT_INTEGER {
            Some(self.0 as i64)
        } else {
            None
        }
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Amount {}

impl Hash for Amount {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<i32> for Amount {
    fn from(value: i32) -> Self {
        Self(f64::from(value))
    }
}

impl TryFrom<f64> for Amount {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_exact_integer() {
            Some(i) => write!(f, "{i}"),
            None => write!(f, "{}", self.0),
        }
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        // Integral amounts go out as JSON integers (`100`, not `100.0`).
        match self.as_exact_integer() {
            Some(i) => serializer.serialize_i64(i),
            None => serializer.serialize_f64(self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Amount::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Wire record flooded between nodes
///
/// `message_id` is generated once at origination and is shared by every
/// copy of the flood. `sender_*` fields describe the immediate sender of
/// this copy, not the origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GossipMessage {
    /// Node that produced this copy
    pub sender_id: NodeId,
    /// Node that first created the value (informational)
    pub origin_id: NodeId,
    /// Value under consensus
    pub amount: Amount,
    /// Opaque flood identity
    pub message_id: String,
    /// Immediate sender's advertised address
    pub sender_address: String,
    /// Immediate sender's listening port
    pub sender_port: u16,
}

impl GossipMessage {
    /// Build the first copy of a new flood
    pub fn originate(
        self_id: NodeId,
        self_identity: &PeerIdentity,
        amount: Amount,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: self_id,
            origin_id: self_id,
            amount,
            message_id: message_id.into(),
            sender_address: self_identity.address.clone(),
            sender_port: self_identity.port,
        }
    }

    /// Derive the copy this node forwards: same origin and message id,
    /// sender fields rewritten to the forwarding node.
    pub fn forwarded_by(
        &self,
        self_id: NodeId,
        self_identity: &PeerIdentity,
        amount: Amount,
    ) -> Self {
        Self {
            sender_id: self_id,
            origin_id: self.origin_id,
            amount,
            message_id: self.message_id.clone(),
            sender_address: self_identity.address.clone(),
            sender_port: self_identity.port,
        }
    }

    /// Identity of the immediate sender
    pub fn sender(&self) -> PeerIdentity {
        PeerIdentity::new(self.sender_address.clone(), self.sender_port)
    }

    /// Check the fields serde cannot enforce
    pub fn validate(&self) -> Result<()> {
        if self.message_id.trim().is_empty() {
            return Err(Error::MalformedMessage("empty messageId".into()));
        }
        if self.sender_address.trim().is_empty() {
            return Err(Error::MalformedMessage("empty senderAddress".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GossipMessage {
        GossipMessage {
            sender_id: 2,
            origin_id: 0,
            amount: Amount::from(100),
            message_id: "b0c5".into(),
            sender_address: "10.0.0.2".into(),
            sender_port: 8000,
        }
    }

    #[test]
    fn wire_uses_camel_case_and_integer_amounts() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "senderId": 2,
                "originId": 0,
                "amount": 100,
                "messageId": "b0c5",
                "senderAddress": "10.0.0.2",
                "senderPort": 8000
            })
        );
    }

    #[test]
    fn fractional_amount_survives_decoding() {
        let raw = r#"{"senderId":1,"originId":1,"amount":12.5,"messageId":"x","senderAddress":"h","senderPort":1}"#;
        let msg: GossipMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.amount, Amount::new(12.5).unwrap());
        assert_eq!(msg.amount.to_string(), "12.5");
    }

    #[test]
    fn missing_field_fails_to_decode() {
        let raw = r#"{"senderId":1,"originId":1,"messageId":"x","senderAddress":"h","senderPort":1}"#;
        assert!(serde_json::from_str::<GossipMessage>(raw).is_err());
    }

    #[test]
    fn validate_rejects_blank_identifiers() {
        let mut msg = sample();
        msg.message_id = "  ".into();
        assert!(matches!(msg.validate(), Err(Error::MalformedMessage(_))));

        let mut msg = sample();
        msg.sender_address.clear();
        assert!(matches!(msg.validate(), Err(Error::MalformedMessage(_))));

        assert!(sample().validate().is_ok());
    }

    #[test]
    fn forwarded_copy_keeps_origin_and_id() {
        let me = PeerIdentity::new("10.0.0.9", 9000);
        let fwd = sample().forwarded_by(9, &me, Amount::from(150));

        assert_eq!(fwd.sender_id, 9);
        assert_eq!(fwd.origin_id, 0);
        assert_eq!(fwd.message_id, "b0c5");
        assert_eq!(fwd.sender(), me);
        assert_eq!(fwd.amount, Amount::from(150));
    }

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(Amount::new(-0.0).unwrap(), Amount::from(0));
        assert_eq!(Amount::from(50).offset(-50.0), Amount::from(0));
    }

    #[test]
    fn equal_amounts_share_one_tally_key() {
        let keys: std::collections::HashSet<Amount> = [
            Amount::new(-0.0).unwrap(),
            Amount::from(0),
            Amount::new(100.0).unwrap(),
            Amount::from(100),
            Amount::new(100.5).unwrap(),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys.len(), 3);
        assert_ne!(Amount::new(100.5).unwrap(), Amount::from(100));
    }

    #[test]
    fn non_finite_amount_rejected() {
        assert!(Amount::new(f64::NAN).is_err());
        assert!(Amount::new(f64::INFINITY).is_err());
    }
}
