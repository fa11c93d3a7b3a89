//! Messaging transport boundary
//!
//! The bot only ever sends; inbound messages arrive through the webhook.

use crate::error::TransportError;
use crate::types::UserId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod twilio;

/// Message sent to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub body: String,
    /// Publicly reachable URL of an attached image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
}

impl OutboundMessage {
    /// Plain text message
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            media_url: None,
        }
    }

    /// Text message with an attached image
    pub fn with_media(body: impl Into<String>, media_url: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            media_url: Some(media_url.into()),
        }
    }
}

/// Trait for messaging transports
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Send a message to a user
    ///
    /// # Arguments
    ///
    /// * `to` - Recipient address
    /// * `message` - Text and optional media
    async fn send(&self, to: &UserId, message: OutboundMessage) -> Result<(), TransportError>;
}
