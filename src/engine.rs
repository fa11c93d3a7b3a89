//! Conversation engine
//!
//! Decides, for one inbound message, what the booking becomes, what to say
//! back, and which side effect the caller has to carry out. The engine never
//! touches the cache or the messaging channel; the only collaborator it calls
//! is the payment gateway.
//!
//! # Flow
//!
//! ```text
//!  source? ──► destination? ──► date? ──► seats? ──► summary ──► "confirm" ──► payment
//!     │             │             │          │       (confirmed)                 │
//!   prompt        prompt        prompt     prompt                       success / failed
//! ```

use crate::booking::{BookingState, PaymentStatus, Slot};
use crate::error::PaymentError;
use crate::nlu::{extract_slots, NluResult};
use crate::payment::PaymentGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Intent that always routes into the booking flow
pub const BOOK_TICKET: &str = "book_ticket";
pub const CANCEL_TICKET: &str = "cancel_ticket";
pub const CHECK_AVAILABILITY: &str = "check_availability";
pub const HELP: &str = "help";

/// Below this confidence a message from a user without a booking is treated
/// as a booking message
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.8;

pub const ASK_SOURCE: &str = "Welcome to Metro Ticket Booking! Where would you like to start your journey? (e.g., from Central Station)";
pub const NOT_UNDERSTOOD: &str =
    "I'm sorry, I didn't understand that. Please try again or type 'cancel' to start over.";
pub const PAYMENT_FAILED: &str = "Payment failed. Please try again by replying 'confirm'.";
pub const PAYMENT_UNAVAILABLE: &str =
    "We couldn't process your payment right now. Please try again by replying 'confirm'.";
pub const BOOKING_CANCELLED: &str =
    "Your booking has been cancelled. Feel free to start a new booking anytime.";
pub const ROUTES_AVAILABLE: &str =
    "All routes are currently available. Please proceed with your booking.";
pub const HELP_TEXT: &str = "You can book a ticket by telling me your source, destination, date, and number of seats. You can also check availability or cancel your current booking.";
pub const UNKNOWN_INTENT: &str =
    "I'm not sure how to help with that. You can ask me to book a ticket.";

/// Which sub-flow handles a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Booking,
    Other,
}

/// Side effect the caller must perform after persisting the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Effect {
    #[default]
    None,
    /// Remove the user's booking record
    ClearCache,
    /// Render and send the ticket, then remove the record
    DeliverTicket,
}

/// Result of one conversation turn
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    /// State to persist; `None` when there is nothing to store
    pub state: Option<BookingState>,
    pub reply: String,
    pub effect: Effect,
}

impl Turn {
    fn reply(state: BookingState, reply: impl Into<String>) -> Self {
        Self {
            state: Some(state),
            reply: reply.into(),
            effect: Effect::None,
        }
    }

    fn keep(state: Option<BookingState>, reply: impl Into<String>) -> Self {
        Self {
            state,
            reply: reply.into(),
            effect: Effect::None,
        }
    }
}

/// Slot-filling booking state machine
pub struct ConversationEngine {
    payment: Arc<dyn PaymentGateway>,
    payment_timeout: Duration,
    confidence_threshold: f64,
}

impl ConversationEngine {
    /// Create an engine charging through the given gateway
    pub fn new(payment: Arc<dyn PaymentGateway>) -> Self {
        Self {
            payment,
            payment_timeout: Duration::from_secs(10),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        }
    }

    /// Set the maximum time to wait for the payment gateway
    pub fn with_payment_timeout(mut self, payment_timeout: Duration) -> Self {
        self.payment_timeout = payment_timeout;
        self
    }

    /// Set the low-confidence threshold used by [`route`](Self::route)
    ///
    /// Values are clamped to [0, 1]; NaN keeps the current threshold.
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        if threshold.is_nan() {
            warn!("Ignoring NaN confidence threshold");
            return self;
        }
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Pick the sub-flow for a message
    ///
    /// `book_ticket` always books. A low-confidence classification is taken
    /// as booking only when the user has no booking yet; with a booking in
    /// progress it goes to the other-intents flow like any other intent.
    pub fn route(&self, nlu: &NluResult, has_booking: bool) -> Route {
        if nlu.intent.name == BOOK_TICKET
            || (nlu.intent.confidence < self.confidence_threshold && !has_booking)
        {
            Route::Booking
        } else {
            Route::Other
        }
    }

    /// Advance the conversation by one message
    ///
    /// # Arguments
    ///
    /// * `route` - Sub-flow chosen by [`route`](Self::route)
    /// * `current` - Cached booking, if any
    /// * `nlu` - Interpretation of the message
    /// * `raw_text` - Message exactly as the user sent it
    pub async fn advance(
        &self,
        route: Route,
        current: Option<BookingState>,
        nlu: &NluResult,
        raw_text: &str,
    ) -> Turn {
        debug!(
            route = ?route,
            intent = %nlu.intent.name,
            confidence = nlu.intent.confidence,
            has_booking = current.is_some(),
            "Advancing conversation"
        );

        match route {
            Route::Booking => self.book(current, nlu, raw_text).await,
            Route::Other => self.other(current, &nlu.intent.name),
        }
    }

    async fn book(&self, current: Option<BookingState>, nlu: &NluResult, raw_text: &str) -> Turn {
        let values = extract_slots(&nlu.entities);
        let state = current.unwrap_or_default().with_slots(&values);

        if let Some(slot) = state.missing_slot() {
            debug!(slot = %slot, "Prompting for missing slot");
            let reply = prompt_for(slot, &state, values.invalid_seats.as_deref());
            return Turn::reply(state, reply);
        }

        if !state.confirmed {
            info!("All booking details collected, asking for confirmation");
            let state = state.mark_confirmed();
            let reply = state.summary();
            return Turn::reply(state, reply);
        }

        if raw_text.to_lowercase().contains("confirm") {
            return self.pay(state).await;
        }

        Turn::reply(state, NOT_UNDERSTOOD)
    }

    async fn pay(&self, state: BookingState) -> Turn {
        if state.is_paid() {
            info!("Payment already captured, retrying ticket delivery");
            return paid(state);
        }

        let outcome = match timeout(self.payment_timeout, self.payment.charge()).await {
            Ok(result) => result,
            Err(_) => Err(PaymentError::Timeout {
                timeout_ms: self.payment_timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(true) => {
                info!("Payment succeeded");
                paid(state.with_payment(PaymentStatus::Success))
            }
            Ok(false) => {
                info!("Payment declined");
                Turn::reply(state.with_payment(PaymentStatus::Failed), PAYMENT_FAILED)
            }
            Err(e) => {
                warn!(error = %e, "Payment not completed, booking left unchanged");
                Turn::reply(state, PAYMENT_UNAVAILABLE)
            }
        }
    }

    fn other(&self, current: Option<BookingState>, intent: &str) -> Turn {
        match intent {
            CANCEL_TICKET => {
                info!(had_booking = current.is_some(), "Booking cancelled");
                Turn {
                    state: None,
                    reply: BOOKING_CANCELLED.to_string(),
                    effect: Effect::ClearCache,
                }
            }
            CHECK_AVAILABILITY => Turn::keep(current, ROUTES_AVAILABLE),
            HELP => Turn::keep(current, HELP_TEXT),
            _ => Turn::keep(current, UNKNOWN_INTENT),
        }
    }
}

fn paid(state: BookingState) -> Turn {
    let reply = format!(
        "Payment successful! Your ticket is confirmed. Details: {}. A QR code will be sent shortly.",
        state.details()
    );

    Turn {
        state: Some(state),
        reply,
        effect: Effect::DeliverTicket,
    }
}

/// Question asking for `slot`, echoing what is already known
fn prompt_for(slot: Slot, state: &BookingState, invalid_seats: Option<&str>) -> String {
    let source = state.source.as_deref().unwrap_or_default();
    let destination = state.destination.as_deref().unwrap_or_default();
    let date = state.date.as_deref().unwrap_or_default();

    match slot {
        Slot::Source => ASK_SOURCE.to_string(),
        Slot::Destination => format!(
            "Got it, you're starting from {}. Where are you heading? (e.g., to Downtown)",
            source
        ),
        Slot::Date => format!(
            "Okay, from {} to {}. When do you want to travel? (e.g., today, tomorrow at 5 PM)",
            source, destination
        ),
        Slot::Seats => {
            let question = format!(
                "Great! Traveling from {} to {} on {}. How many seats do you need?",
                source, destination, date
            );
            match invalid_seats {
                Some(value) => format!("\"{}\" isn't a valid number of seats. {}", value, question),
                None => question,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::{Entity, Intent};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedPayment {
        approve: bool,
        calls: AtomicUsize,
    }

    impl FixedPayment {
        fn new(approve: bool) -> Arc<Self> {
            Arc::new(Self {
                approve,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PaymentGateway for FixedPayment {
        async fn charge(&self) -> Result<bool, PaymentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.approve)
        }
    }

    struct BrokenPayment;

    #[async_trait]
    impl PaymentGateway for BrokenPayment {
        async fn charge(&self) -> Result<bool, PaymentError> {
            Err(PaymentError::Unavailable("gateway down".to_string()))
        }
    }

    fn nlu(intent: &str, confidence: f64) -> NluResult {
        NluResult::new("", Intent::new(intent, confidence))
    }

    fn ready() -> BookingState {
        BookingState {
            source: Some("Central".to_string()),
            destination: Some("Downtown".to_string()),
            date: Some("today".to_string()),
            seats: Some(2),
            confirmed: false,
            payment_status: None,
        }
    }

    #[test]
    fn test_route_book_ticket_always_books() {
        let engine = ConversationEngine::new(FixedPayment::new(true));
        assert_eq!(engine.route(&nlu(BOOK_TICKET, 0.3), true), Route::Booking);
        assert_eq!(engine.route(&nlu(BOOK_TICKET, 0.99), false), Route::Booking);
    }

    #[test]
    fn test_route_low_confidence_depends_on_existing_booking() {
        let engine = ConversationEngine::new(FixedPayment::new(true));
        assert_eq!(engine.route(&nlu("greet", 0.5), false), Route::Booking);
        assert_eq!(engine.route(&nlu("greet", 0.5), true), Route::Other);
        assert_eq!(engine.route(&nlu("greet", 0.8), false), Route::Other);
    }

    #[test]
    fn test_route_threshold_is_configurable() {
        let engine =
            ConversationEngine::new(FixedPayment::new(true)).with_confidence_threshold(0.5);
        assert_eq!(engine.route(&nlu("greet", 0.6), false), Route::Other);
        assert_eq!(engine.route(&nlu("greet", 0.4), false), Route::Booking);
    }

    #[test]
    fn test_nan_threshold_keeps_default() {
        let engine =
            ConversationEngine::new(FixedPayment::new(true)).with_confidence_threshold(f64::NAN);
        assert_eq!(engine.route(&nlu("greet", 0.79), false), Route::Booking);
        assert_eq!(engine.route(&nlu("greet", 0.8), false), Route::Other);
    }

    #[tokio::test]
    async fn test_empty_booking_asks_for_source() {
        let engine = ConversationEngine::new(FixedPayment::new(true));
        let turn = engine
            .advance(Route::Booking, None, &nlu(BOOK_TICKET, 0.9), "hi")
            .await;

        assert_eq!(turn.reply, ASK_SOURCE);
        assert_eq!(turn.state, Some(BookingState::new()));
        assert_eq!(turn.effect, Effect::None);
    }

    #[tokio::test]
    async fn test_invalid_seats_reprompts_with_note() {
        let engine = ConversationEngine::new(FixedPayment::new(true));
        let current = BookingState {
            seats: None,
            ..ready()
        };
        let message = nlu(BOOK_TICKET, 0.9).with_entity(Entity::new("seats", "lots"));

        let turn = engine
            .advance(Route::Booking, Some(current.clone()), &message, "lots")
            .await;

        assert!(turn.reply.starts_with("\"lots\" isn't a valid number of seats."));
        assert!(turn.reply.ends_with("How many seats do you need?"));
        assert_eq!(turn.state, Some(current));
    }

    #[tokio::test]
    async fn test_invalid_seats_keeps_previous_count() {
        let engine = ConversationEngine::new(FixedPayment::new(true));
        let message = nlu(BOOK_TICKET, 0.9).with_entity(Entity::new("seats", "zero"));

        let turn = engine
            .advance(Route::Booking, Some(ready()), &message, "zero")
            .await;

        let state = turn.state.unwrap();
        assert_eq!(state.seats, Some(2));
        assert!(state.confirmed);
    }

    #[tokio::test]
    async fn test_confirm_is_case_insensitive() {
        let payment = FixedPayment::new(false);
        let engine = ConversationEngine::new(payment.clone());
        let current = ready().mark_confirmed();

        let turn = engine
            .advance(Route::Booking, Some(current), &nlu(BOOK_TICKET, 0.9), "Yes, CONFIRM it")
            .await;

        assert_eq!(payment.calls.load(Ordering::SeqCst), 1);
        assert_eq!(turn.reply, PAYMENT_FAILED);
    }

    #[tokio::test]
    async fn test_gateway_error_leaves_state_untouched() {
        let engine = ConversationEngine::new(Arc::new(BrokenPayment));
        let current = ready().mark_confirmed();

        let turn = engine
            .advance(Route::Booking, Some(current.clone()), &nlu(BOOK_TICKET, 0.9), "confirm")
            .await;

        assert_eq!(turn.state, Some(current));
        assert_eq!(turn.reply, PAYMENT_UNAVAILABLE);
        assert_eq!(turn.effect, Effect::None);
    }

    #[tokio::test]
    async fn test_paid_booking_redelivers_without_charging() {
        let payment = FixedPayment::new(true);
        let engine = ConversationEngine::new(payment.clone());
        let current = ready()
            .mark_confirmed()
            .with_payment(PaymentStatus::Success);

        let turn = engine
            .advance(Route::Booking, Some(current.clone()), &nlu(BOOK_TICKET, 0.9), "confirm")
            .await;

        assert_eq!(payment.calls.load(Ordering::SeqCst), 0);
        assert_eq!(turn.effect, Effect::DeliverTicket);
        assert_eq!(turn.state, Some(current));
    }

    #[tokio::test]
    async fn test_other_intents_keep_booking() {
        let engine = ConversationEngine::new(FixedPayment::new(true));

        for (intent, reply) in [
            (CHECK_AVAILABILITY, ROUTES_AVAILABLE),
            (HELP, HELP_TEXT),
            ("goodbye", UNKNOWN_INTENT),
        ] {
            let turn = engine
                .advance(Route::Other, Some(ready()), &nlu(intent, 0.95), "")
                .await;
            assert_eq!(turn.reply, reply);
            assert_eq!(turn.state, Some(ready()));
            assert_eq!(turn.effect, Effect::None);
        }
    }

    #[test]
    fn test_prompt_echoes_known_slots() {
        let state = ready();
        assert_eq!(
            prompt_for(Slot::Destination, &state, None),
            "Got it, you're starting from Central. Where are you heading? (e.g., to Downtown)"
        );
        assert_eq!(
            prompt_for(Slot::Date, &state, None),
            "Okay, from Central to Downtown. When do you want to travel? (e.g., today, tomorrow at 5 PM)"
        );
        assert_eq!(
            prompt_for(Slot::Seats, &state, None),
            "Great! Traveling from Central to Downtown on today. How many seats do you need?"
        );
    }
}
