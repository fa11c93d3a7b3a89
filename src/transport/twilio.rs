//! Twilio Programmable Messaging transport
//!
//! Sends WhatsApp messages through the Twilio Messages REST API. The sender
//! number must carry the channel prefix, e.g. `whatsapp:+14155238886`.

use crate::error::TransportError;
use crate::transport::{MessagingTransport, OutboundMessage};
use crate::types::UserId;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Production Twilio API base URL
pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Twilio REST client
#[derive(Debug, Clone)]
pub struct TwilioTransport {
    client: reqwest::Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioTransport {
    /// Create a transport for the given account and sender
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: TWILIO_API_BASE.to_string(),
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from: from.into(),
        }
    }

    /// Point the client at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.account_sid
        )
    }
}

#[async_trait]
impl MessagingTransport for TwilioTransport {
    async fn send(&self, to: &UserId, message: OutboundMessage) -> Result<(), TransportError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("From", self.from.as_str()),
            ("To", to.as_str()),
            ("Body", message.body.as_str()),
        ];
        if let Some(ref media_url) = message.media_url {
            form.push(("MediaUrl", media_url.as_str()));
        }

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                to = %to,
                status = status.as_u16(),
                "Twilio rejected message"
            );
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            to = %to,
            has_media = message.media_url.is_some(),
            "Message sent"
        );

        Ok(())
    }
}
