//! Rasa NLU client
//!
//! Talks to a Rasa server's `/model/parse` endpoint.

use crate::error::NluError;
use crate::nlu::{NluGateway, NluResult};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, trace, warn};

/// Default parse endpoint of a local Rasa server
pub const DEFAULT_RASA_URL: &str = "http://localhost:5005/model/parse";

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    text: &'a str,
}

/// HTTP client for a Rasa NLU server
#[derive(Debug, Clone)]
pub struct RasaClient {
    client: reqwest::Client,
    url: String,
}

impl RasaClient {
    /// Create a client for the given parse endpoint URL
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a client reusing an existing HTTP client
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Parse endpoint this client posts to
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for RasaClient {
    fn default() -> Self {
        Self::new(DEFAULT_RASA_URL)
    }
}

#[async_trait]
impl NluGateway for RasaClient {
    async fn classify(&self, text: &str) -> Result<NluResult, NluError> {
        trace!(url = %self.url, "Sending message to Rasa");

        let response = self
            .client
            .post(&self.url)
            .json(&ParseRequest { text })
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Error connecting to Rasa server");
                NluError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Rasa server returned an error status");
            return Err(NluError::Status {
                status: status.as_u16(),
            });
        }

        let result: NluResult = response.json().await.map_err(|e| {
            warn!(error = %e, "Error parsing Rasa response");
            NluError::Malformed(e.to_string())
        })?;

        debug!(
            intent = %result.intent.name,
            confidence = result.intent.confidence,
            entity_count = result.entities.len(),
            "Message classified"
        );

        Ok(result)
    }
}
