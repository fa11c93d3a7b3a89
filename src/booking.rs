//! Booking state carried between conversation turns
//!
//! A [`BookingState`] is a plain value. Each turn produces a new value from
//! the previous one instead of mutating a shared instance, so the cached copy
//! and the in-flight copy can never alias.

use crate::types::TicketId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of the payment step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
}

/// A named piece of booking information filled over the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Source,
    Destination,
    Date,
    Seats,
}

impl Slot {
    /// Slots in the order they are asked for
    pub const FILL_ORDER: [Slot; 4] = [Slot::Source, Slot::Destination, Slot::Date, Slot::Seats];

    /// Entity type name the NLU model uses for this slot
    pub fn entity_name(&self) -> &'static str {
        match self {
            Slot::Source => "source",
            Slot::Destination => "destination",
            Slot::Date => "date",
            Slot::Seats => "seats",
        }
    }

    /// Map an NLU entity type to a slot
    pub fn from_entity(name: &str) -> Option<Slot> {
        Self::FILL_ORDER
            .into_iter()
            .find(|slot| slot.entity_name() == name)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_name())
    }
}

/// Slot values extracted from a single message
///
/// `None` means the message did not mention the slot (or mentioned it with an
/// unusable value); the booking keeps whatever it had.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotValues {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub date: Option<String>,
    pub seats: Option<u32>,
    /// Set when a seats entity was present but not a positive number
    pub invalid_seats: Option<String>,
}

/// In-progress booking for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingState {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    /// Travel date expression, kept as the user phrased it
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub seats: Option<u32>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
}

impl BookingState {
    /// Create an empty booking
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay the values mentioned in this turn onto the booking
    pub fn with_slots(&self, values: &SlotValues) -> Self {
        Self {
            source: values.source.clone().or_else(|| self.source.clone()),
            destination: values
                .destination
                .clone()
                .or_else(|| self.destination.clone()),
            date: values.date.clone().or_else(|| self.date.clone()),
            seats: values.seats.or(self.seats),
            ..self.clone()
        }
    }

    /// First slot in fill order that still has no value
    pub fn missing_slot(&self) -> Option<Slot> {
        Slot::FILL_ORDER.into_iter().find(|slot| match slot {
            Slot::Source => self.source.is_none(),
            Slot::Destination => self.destination.is_none(),
            Slot::Date => self.date.is_none(),
            Slot::Seats => self.seats.is_none(),
        })
    }

    /// Mark the booking as summarized and awaiting "confirm"
    pub fn mark_confirmed(self) -> Self {
        Self {
            confirmed: true,
            ..self
        }
    }

    /// Record the payment outcome
    pub fn with_payment(self, status: PaymentStatus) -> Self {
        Self {
            payment_status: Some(status),
            ..self
        }
    }

    /// Whether payment went through and only delivery remains
    pub fn is_paid(&self) -> bool {
        self.payment_status == Some(PaymentStatus::Success)
    }

    /// One-line journey details, e.g. `From: A, To: B, Date: today, Seats: 2`
    pub fn details(&self) -> String {
        format!(
            "From: {}, To: {}, Date: {}, Seats: {}",
            display(&self.source),
            display(&self.destination),
            display(&self.date),
            self.seats.map(|s| s.to_string()).unwrap_or_default()
        )
    }

    /// Confirmation request listing every slot
    pub fn summary(&self) -> String {
        format!(
            "Please confirm your booking:\n\
             - From: {}\n\
             - To: {}\n\
             - Date: {}\n\
             - Seats: {}\n\n\
             Reply 'confirm' to proceed to payment.",
            display(&self.source),
            display(&self.destination),
            display(&self.date),
            self.seats.map(|s| s.to_string()).unwrap_or_default()
        )
    }

    /// Text encoded into the ticket QR code
    ///
    /// Returns `None` while any slot is still unfilled.
    pub fn ticket_payload(&self, ticket_id: TicketId) -> Option<String> {
        let source = self.source.as_deref()?;
        let destination = self.destination.as_deref()?;
        let date = self.date.as_deref()?;
        let seats = self.seats?;

        Some(format!(
            "From:{},To:{},Date:{},Seats:{},Ref:{}",
            source, destination, date, seats, ticket_id
        ))
    }
}

fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> BookingState {
        BookingState {
            source: Some("Central".to_string()),
            destination: Some("Downtown".to_string()),
            date: Some("tomorrow at 5 PM".to_string()),
            seats: Some(2),
            confirmed: false,
            payment_status: None,
        }
    }

    #[test]
    fn test_missing_slot_follows_fill_order() {
        let mut state = BookingState::new();
        assert_eq!(state.missing_slot(), Some(Slot::Source));

        state.source = Some("Central".to_string());
        assert_eq!(state.missing_slot(), Some(Slot::Destination));

        // A later slot being filled does not skip an earlier one
        state.seats = Some(1);
        assert_eq!(state.missing_slot(), Some(Slot::Destination));

        state.destination = Some("Downtown".to_string());
        state.date = Some("today".to_string());
        assert_eq!(state.missing_slot(), None);
    }

    #[test]
    fn test_with_slots_keeps_unmentioned_values() {
        let state = BookingState {
            source: Some("Central".to_string()),
            ..Default::default()
        };
        let values = SlotValues {
            destination: Some("Downtown".to_string()),
            ..Default::default()
        };

        let next = state.with_slots(&values);
        assert_eq!(next.source.as_deref(), Some("Central"));
        assert_eq!(next.destination.as_deref(), Some("Downtown"));
        // Original value is untouched
        assert!(state.destination.is_none());
    }

    #[test]
    fn test_with_slots_overwrites_mentioned_values() {
        let values = SlotValues {
            source: Some("Airport".to_string()),
            seats: Some(4),
            ..Default::default()
        };

        let next = complete().mark_confirmed().with_slots(&values);
        assert_eq!(next.source.as_deref(), Some("Airport"));
        assert_eq!(next.seats, Some(4));
        assert!(next.confirmed);
    }

    #[test]
    fn test_slot_from_entity() {
        assert_eq!(Slot::from_entity("source"), Some(Slot::Source));
        assert_eq!(Slot::from_entity("seats"), Some(Slot::Seats));
        assert_eq!(Slot::from_entity("station"), None);
    }

    #[test]
    fn test_summary_lists_every_slot() {
        let summary = complete().summary();
        assert!(summary.contains("- From: Central"));
        assert!(summary.contains("- To: Downtown"));
        assert!(summary.contains("- Date: tomorrow at 5 PM"));
        assert!(summary.contains("- Seats: 2"));
        assert!(summary.ends_with("Reply 'confirm' to proceed to payment."));
    }

    #[test]
    fn test_ticket_payload_requires_all_slots() {
        let ticket_id = TicketId::new();
        let payload = complete().ticket_payload(ticket_id).unwrap();
        assert_eq!(
            payload,
            format!(
                "From:Central,To:Downtown,Date:tomorrow at 5 PM,Seats:2,Ref:{}",
                ticket_id
            )
        );

        let partial = BookingState {
            seats: None,
            ..complete()
        };
        assert!(partial.ticket_payload(ticket_id).is_none());
    }

    #[test]
    fn test_payment_status_serialization() {
        let state = complete().mark_confirmed().with_payment(PaymentStatus::Failed);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["payment_status"], "failed");
        assert_eq!(json["confirmed"], true);

        let back: BookingState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_deserialize_sparse_record() {
        let state: BookingState = serde_json::from_str(r#"{"source":"Central"}"#).unwrap();
        assert_eq!(state.source.as_deref(), Some("Central"));
        assert!(!state.confirmed);
        assert!(state.payment_status.is_none());
    }
}
