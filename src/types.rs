//! Common type definitions used throughout the bot
//!
//! Newtype wrappers keep messaging addresses and ticket references from being
//! mixed up with ordinary strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a chat user, as reported by the messaging channel
///
/// For WhatsApp over Twilio this is the sender address, e.g.
/// `whatsapp:+14155238886`. It is also the booking cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a UserId from a sender address
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Get the underlying address
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl From<&str> for UserId {
    fn from(address: &str) -> Self {
        Self(address.to_string())
    }
}

/// Reference printed on an issued ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TicketId(Uuid);

impl TicketId {
    /// Create a new random TicketId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Parse a ticket reference from its hyphenated string form
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TicketId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
