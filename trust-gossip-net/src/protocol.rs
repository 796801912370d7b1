//! Wire codec
//!
//! One JSON-encoded `GossipMessage` per connection:
//!
//! ```text
//! {"senderId":1,"originId":0,"amount":100,"messageId":"…","senderAddress":"10.0.0.1","senderPort":8000}
//! ```
//!
//! There is no framing and no acknowledgement; the connection is closed
//! after the payload is written.

use trust_gossip_core::message::GossipMessage;

use crate::{Error, Result};

/// Largest inbound payload accepted, in bytes
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Serialize a message to its wire form
pub fn encode(message: &GossipMessage) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(message)?)
}

/// Parse and validate an inbound payload
///
/// Any failure maps to [`Error::Malformed`] or [`Error::PayloadTooLarge`];
/// callers drop these silently.
pub fn decode(bytes: &[u8]) -> Result<GossipMessage> {
    if bytes.len() > MAX_MESSAGE_SIZE {
        return Err(Error::PayloadTooLarge {
            limit: MAX_MESSAGE_SIZE,
        });
    }
    let message: GossipMessage = serde_json::from_slice(bytes)
        .map_err(|e| trust_gossip_core::Error::MalformedMessage(e.to_string()))?;
    message.validate()?;
    Ok(message)
}
