//! Webhook handler
//!
//! Glue between an inbound message and the collaborators: classify the text,
//! load the cached booking, let the [`ConversationEngine`] decide, persist the
//! result, reply, and deliver the ticket when the engine asks for it.
//!
//! Messages from the same user are handled one at a time. The cached state is
//! always written before the reply goes out, so a duplicate delivery that was
//! waiting on the user's lock sees the updated booking.

use crate::booking::BookingState;
use crate::config::BotConfig;
use crate::engine::{ConversationEngine, Effect};
use crate::error::{BotError, NluError, RenderError, Result, TransportError};
use crate::nlu::{NluGateway, NluResult};
use crate::payment::PaymentGateway;
use crate::storage::memory::InMemoryBookingStore;
use crate::storage::BookingStore;
use crate::ticket::{MediaStore, QrTicketRenderer, StoredMedia, TicketRenderer};
use crate::transport::{MessagingTransport, OutboundMessage};
use crate::types::{TicketId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Reply sent when the NLU service cannot be reached or answers garbage
pub const NLU_UNAVAILABLE: &str =
    "Sorry, I'm having trouble understanding. Please try again later.";

/// What happened while handling one inbound message
#[derive(Debug, Clone, PartialEq)]
pub struct MessageOutcome {
    /// Text sent (or attempted) back to the user
    pub reply: String,
    /// Effect the engine signaled; `None` if the engine was skipped
    pub effect: Effect,
    /// Whether the transport accepted the reply
    pub reply_sent: bool,
    /// Ticket reference, set only when the ticket was delivered and the
    /// booking cleared
    pub ticket_id: Option<TicketId>,
}

impl MessageOutcome {
    fn new(reply: String, effect: Effect, reply_sent: bool) -> Self {
        Self {
            reply,
            effect,
            reply_sent,
            ticket_id: None,
        }
    }
}

/// One user's lock and the number of turns holding or waiting on it
#[derive(Default)]
struct UserSlot {
    lock: Arc<Mutex<()>>,
    turns: usize,
}

type UserLocks = StdMutex<HashMap<UserId, UserSlot>>;

/// A user's place in line; the user is forgotten when the last turn drops
///
/// Dropping also covers a cancelled `handle` future, whether it was waiting
/// for the lock or holding it.
struct UserTurn<'a> {
    locks: &'a UserLocks,
    user_id: UserId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for UserTurn<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = locks.get_mut(&self.user_id) {
            slot.turns = slot.turns.saturating_sub(1);
            if slot.turns == 0 {
                locks.remove(&self.user_id);
            }
        }
    }
}

/// Per-message orchestration over the bot's collaborators
pub struct WebhookHandler {
    nlu: Arc<dyn NluGateway>,
    store: Arc<dyn BookingStore>,
    transport: Arc<dyn MessagingTransport>,
    renderer: Arc<dyn TicketRenderer>,
    engine: ConversationEngine,
    media: MediaStore,
    public_base_url: String,
    nlu_timeout: Duration,
    render_timeout: Duration,
    transport_timeout: Duration,
    user_locks: UserLocks,
}

impl WebhookHandler {
    pub fn builder() -> WebhookHandlerBuilder {
        WebhookHandlerBuilder::new()
    }

    /// Store holding rendered tickets, shared with the media route
    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Public URL a rendered ticket is served from
    pub fn media_url(&self, ticket_id: &TicketId) -> String {
        format!("{}/media/{}.png", self.public_base_url, ticket_id)
    }

    /// Handle one inbound message
    ///
    /// # Arguments
    ///
    /// * `user_id` - Sender address, used as the booking cache key
    /// * `text` - Message body exactly as received
    ///
    /// # Returns
    ///
    /// The outcome of the turn. Only a booking cache failure is returned as an
    /// error; NLU and delivery problems are handled here and logged.
    pub async fn handle(&self, user_id: &UserId, text: &str) -> Result<MessageOutcome> {
        info!(user_id = %user_id, "Received message");
        debug!(user_id = %user_id, body = %text, "Message body");

        let turn = self.lock_user(user_id).await;
        let result = self.handle_locked(user_id, text).await;
        drop(turn);

        if let Err(e) = &result {
            warn!(user_id = %user_id, error = %e, "Failed to handle message");
        }

        result
    }

    async fn handle_locked(&self, user_id: &UserId, text: &str) -> Result<MessageOutcome> {
        let nlu = match self.classify(text).await {
            Ok(nlu) => nlu,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "NLU unavailable, skipping conversation");
                let sent = self
                    .send(user_id, OutboundMessage::text(NLU_UNAVAILABLE))
                    .await;
                return Ok(MessageOutcome::new(
                    NLU_UNAVAILABLE.to_string(),
                    Effect::None,
                    sent,
                ));
            }
        };

        let current = self.store.get_state(user_id).await?;
        let route = self.engine.route(&nlu, current.is_some());
        let turn = self.engine.advance(route, current, &nlu, text).await;

        match (&turn.effect, &turn.state) {
            (Effect::ClearCache, _) => self.store.clear(user_id).await?,
            (_, Some(state)) => self.store.set(user_id, state.clone()).await?,
            (_, None) => {}
        }

        let sent = self
            .send(user_id, OutboundMessage::text(turn.reply.as_str()))
            .await;
        let mut outcome = MessageOutcome::new(turn.reply, turn.effect, sent);

        if turn.effect == Effect::DeliverTicket {
            match self.deliver_ticket(user_id, turn.state.as_ref()).await {
                Ok(ticket_id) => {
                    info!(user_id = %user_id, ticket_id = %ticket_id, "Ticket delivered, booking completed");
                    outcome.ticket_id = Some(ticket_id);
                }
                Err(e) => {
                    warn!(
                        user_id = %user_id,
                        error = %e,
                        "Ticket delivery failed, booking kept for retry"
                    );
                }
            }
        }

        Ok(outcome)
    }

    async fn classify(&self, text: &str) -> std::result::Result<NluResult, NluError> {
        match timeout(self.nlu_timeout, self.nlu.classify(text)).await {
            Ok(result) => result,
            Err(_) => Err(NluError::Timeout {
                timeout_ms: self.nlu_timeout.as_millis() as u64,
            }),
        }
    }

    /// Send a message, logging rather than returning a failure
    async fn send(&self, user_id: &UserId, message: OutboundMessage) -> bool {
        match self.try_send(user_id, message).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to send reply");
                false
            }
        }
    }

    async fn try_send(
        &self,
        user_id: &UserId,
        message: OutboundMessage,
    ) -> std::result::Result<(), TransportError> {
        match timeout(self.transport_timeout, self.transport.send(user_id, message)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                timeout_ms: self.transport_timeout.as_millis() as u64,
            }),
        }
    }

    /// Render, host and send the ticket, then drop the completed booking
    async fn deliver_ticket(
        &self,
        user_id: &UserId,
        state: Option<&BookingState>,
    ) -> Result<TicketId> {
        let ticket_id = TicketId::new();
        let payload = state
            .and_then(|s| s.ticket_payload(ticket_id))
            .ok_or_else(|| RenderError::IncompleteBooking(user_id.to_string()))?;

        let bytes = match timeout(self.render_timeout, self.renderer.render(&payload)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RenderError::Timeout {
                    timeout_ms: self.render_timeout.as_millis() as u64,
                }
                .into())
            }
        };

        self.media
            .put(
                ticket_id,
                StoredMedia {
                    content_type: self.renderer.content_type(),
                    bytes,
                },
            )
            .await;

        let caption = match state {
            Some(state) => format!("Your metro ticket. {}. Ref: {}", state.details(), ticket_id),
            None => format!("Your metro ticket. Ref: {}", ticket_id),
        };
        let message = OutboundMessage::with_media(caption, self.media_url(&ticket_id));
        self.try_send(user_id, message).await?;

        self.store.clear(user_id).await?;
        Ok(ticket_id)
    }

    async fn lock_user(&self, user_id: &UserId) -> UserTurn<'_> {
        let lock = {
            let mut locks = self.user_locks.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = locks.entry(user_id.clone()).or_default();
            slot.turns += 1;
            slot.lock.clone()
        };

        let mut turn = UserTurn {
            locks: &self.user_locks,
            user_id: user_id.clone(),
            guard: None,
        };
        turn.guard = Some(lock.lock_owned().await);
        turn
    }

    #[cfg(test)]
    fn tracked_users(&self) -> usize {
        self.user_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Builder for WebhookHandler
pub struct WebhookHandlerBuilder {
    nlu: Option<Arc<dyn NluGateway>>,
    payment: Option<Arc<dyn PaymentGateway>>,
    transport: Option<Arc<dyn MessagingTransport>>,
    store: Option<Arc<dyn BookingStore>>,
    renderer: Option<Arc<dyn TicketRenderer>>,
    media: Option<MediaStore>,
    public_base_url: String,
    confidence_threshold: f64,
    nlu_timeout: Duration,
    payment_timeout: Duration,
    render_timeout: Duration,
    transport_timeout: Duration,
}

impl WebhookHandlerBuilder {
    pub fn new() -> Self {
        Self {
            nlu: None,
            payment: None,
            transport: None,
            store: None,
            renderer: None,
            media: None,
            public_base_url: "http://localhost:8000".to_string(),
            confidence_threshold: crate::engine::DEFAULT_CONFIDENCE_THRESHOLD,
            nlu_timeout: Duration::from_secs(10),
            payment_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(10),
            transport_timeout: Duration::from_secs(10),
        }
    }

    pub fn nlu(mut self, nlu: Arc<dyn NluGateway>) -> Self {
        self.nlu = Some(nlu);
        self
    }

    pub fn payment(mut self, payment: Arc<dyn PaymentGateway>) -> Self {
        self.payment = Some(payment);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn MessagingTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(mut self, store: Arc<dyn BookingStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn TicketRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn media(mut self, media: MediaStore) -> Self {
        self.media = Some(media);
        self
    }

    pub fn public_base_url(mut self, url: impl Into<String>) -> Self {
        self.public_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn nlu_timeout(mut self, nlu_timeout: Duration) -> Self {
        self.nlu_timeout = nlu_timeout;
        self
    }

    pub fn payment_timeout(mut self, payment_timeout: Duration) -> Self {
        self.payment_timeout = payment_timeout;
        self
    }

    pub fn render_timeout(mut self, render_timeout: Duration) -> Self {
        self.render_timeout = render_timeout;
        self
    }

    pub fn transport_timeout(mut self, transport_timeout: Duration) -> Self {
        self.transport_timeout = transport_timeout;
        self
    }

    /// Apply the base URL, threshold and timeouts from a loaded configuration
    pub fn config(self, config: &BotConfig) -> Self {
        self.public_base_url(config.public_base_url.as_str())
            .confidence_threshold(config.confidence_threshold)
            .nlu_timeout(config.nlu_timeout)
            .payment_timeout(config.payment_timeout)
            .render_timeout(config.render_timeout)
            .transport_timeout(config.transport_timeout)
    }

    pub fn build(self) -> Result<WebhookHandler> {
        let nlu = self
            .nlu
            .ok_or_else(|| BotError::Configuration("NLU gateway is required".to_string()))?;

        let payment = self
            .payment
            .ok_or_else(|| BotError::Configuration("Payment gateway is required".to_string()))?;

        let transport = self.transport.ok_or_else(|| {
            BotError::Configuration("Messaging transport is required".to_string())
        })?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryBookingStore::new()));

        let renderer = self
            .renderer
            .unwrap_or_else(|| Arc::new(QrTicketRenderer::default()));

        let engine = ConversationEngine::new(payment)
            .with_payment_timeout(self.payment_timeout)
            .with_confidence_threshold(self.confidence_threshold);

        Ok(WebhookHandler {
            nlu,
            store,
            transport,
            renderer,
            engine,
            media: self.media.unwrap_or_default(),
            public_base_url: self.public_base_url,
            nlu_timeout: self.nlu_timeout,
            render_timeout: self.render_timeout,
            transport_timeout: self.transport_timeout,
            user_locks: StdMutex::new(HashMap::new()),
        })
    }
}

impl Default for WebhookHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
