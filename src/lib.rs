//! # Metrobot - WhatsApp Metro Ticket Booking
//!
//! Metrobot is a chat assistant that books metro tickets over WhatsApp. It
//! collects the journey details through NLU-driven slot filling, asks for
//! confirmation, takes a (simulated) payment and sends the ticket back as a
//! QR code image.
//!
//! ## Features
//!
//! - 🗺️ **Slot Filling**: Source, destination, date and seat count gathered over several messages
//! - 🧠 **Rasa NLU**: Intent and entity extraction through a Rasa `/model/parse` endpoint
//! - 💳 **Payment Step**: Trait-based gateway, simulated by default
//! - 🎫 **QR Tickets**: PNG tickets rendered in-process and served for Twilio to fetch
//! - 💾 **Booking Cache**: In-memory default, optional Redis backend
//! - 🔒 **Per-User Ordering**: Concurrent deliveries from one user never race on the cache
//!
//! ## Quick Start
//!
//! ```no_run
//! use metrobot::{
//!     BotConfig, RasaClient, SimulatedPayment, TwilioTransport, UserId, WebhookHandler,
//! };
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BotConfig::from_env()?;
//!
//! let handler = WebhookHandler::builder()
//!     .config(&config)
//!     .nlu(Arc::new(RasaClient::new(config.rasa_url.as_str())))
//!     .payment(Arc::new(SimulatedPayment::default()))
//!     .transport(Arc::new(TwilioTransport::new(
//!         config.twilio.account_sid.as_str(),
//!         config.twilio.auth_token.as_str(),
//!         config.twilio.phone_number.as_str(),
//!     )))
//!     .build()?;
//!
//! let outcome = handler
//!     .handle(&UserId::new("whatsapp:+15550001111"), "book a ticket from Central")
//!     .await?;
//!
//! println!("Bot: {}", outcome.reply);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                  HTTP server (axum)                   │
//! │   POST /whatsapp     GET /media/:file     GET /       │
//! └───────────┬───────────────────▲───────────────────────┘
//!             │                   │
//! ┌───────────▼───────────────────┴───────────────────────┐
//! │                   WebhookHandler                      │
//! │  per-user lock ─► NLU ─► cache ─► engine ─► persist   │
//! │                   ─► reply ─► ticket ─► clear         │
//! │  ┌────────────────┐  ┌────────────────┐               │
//! │  │ Conversation   │  │ Ticket         │               │
//! │  │ Engine         │  │ Renderer (QR)  │               │
//! │  │  - routing     │  │  + MediaStore  │               │
//! │  │  - slots       │  └────────────────┘               │
//! │  │  - payment ────┼──► PaymentGateway                 │
//! │  └────────────────┘                                   │
//! │  ┌──────────────┐ ┌──────────────┐ ┌───────────────┐  │
//! │  │ NluGateway   │ │ BookingStore │ │ Messaging     │  │
//! │  │  - Rasa      │ │  - Memory    │ │ Transport     │  │
//! │  │              │ │  - Redis     │ │  - Twilio     │  │
//! │  └──────────────┘ └──────────────┘ └───────────────┘  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`engine`]: Routing rule and slot-filling state machine
//! - [`handler`]: Per-message orchestration and ticket delivery
//! - [`booking`]: Booking state and its functional updates
//! - [`nlu`]: NLU result shapes, gateway trait and slot extraction
//! - [`payment`]: Payment gateway trait and simulated gateway
//! - [`ticket`]: QR ticket rendering and media hosting
//! - [`transport`]: Outbound messaging (Twilio)
//! - [`storage`]: Booking cache backends
//! - [`server`]: HTTP routes
//! - [`config`]: Environment-driven configuration
//! - [`error`]: Error types and result aliases
//!
//! ## License
//!
//! Licensed under either of Apache License 2.0 or MIT license at your option.

// Core type definitions
pub mod types;

// Error types
pub mod error;

// Booking state
pub mod booking;

// NLU abstraction
pub mod nlu;

// Conversation engine
pub mod engine;

// Payment gateway
pub mod payment;

// Ticket rendering
pub mod ticket;

// Outbound messaging
pub mod transport;

// Storage backends
pub mod storage;

// Webhook orchestration
pub mod handler;

// Configuration
pub mod config;

// HTTP server
pub mod server;

pub use booking::{BookingState, PaymentStatus, Slot, SlotValues};
pub use config::{BotConfig, LogLevel, TwilioConfig};
pub use engine::{ConversationEngine, Effect, Route, Turn};
pub use error::{
    BotError, NluError, PaymentError, RenderError, Result, SlotError, StorageError,
    TransportError,
};
pub use handler::{MessageOutcome, WebhookHandler, WebhookHandlerBuilder};
pub use nlu::rasa::RasaClient;
pub use nlu::{extract_slots, Entity, Intent, NluGateway, NluResult};
pub use payment::{PaymentGateway, SimulatedPayment};
pub use storage::{memory::InMemoryBookingStore, BookingRecord, BookingStore};
pub use ticket::{MediaStore, QrTicketRenderer, StoredMedia, TicketRenderer};
pub use transport::twilio::TwilioTransport;
pub use transport::{MessagingTransport, OutboundMessage};
pub use types::*;

#[cfg(feature = "redis-storage")]
pub use storage::redis::RedisBookingStore;
