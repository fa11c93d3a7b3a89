//! Error types for the metro ticket bot
//!
//! One error enum per collaborator boundary, all folding into [`BotError`].

use thiserror::Error;

/// Main error type for bot operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BotError {
    /// Booking cache error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Ticket rendering error
    #[error("Ticket rendering error: {0}")]
    Render(#[from] RenderError),

    /// Messaging transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Booking cache errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StorageError {
    /// Connection failed
    #[error("Storage connection failed: {0}")]
    Connection(String),

    /// Query failed
    #[error("Storage query failed: {0}")]
    Query(String),

    /// Serialization failed
    #[error("Storage serialization failed: {0}")]
    Serialization(String),

    /// Deserialization failed
    #[error("Storage deserialization failed: {0}")]
    Deserialization(String),

    /// Storage backend not available
    #[error("Storage backend not available: {0}")]
    BackendUnavailable(String),
}

/// NLU gateway errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum NluError {
    /// Request could not be delivered
    #[error("NLU request failed: {0}")]
    Transport(String),

    /// Service answered with a non-success status
    #[error("NLU service returned status {status}")]
    Status { status: u16 },

    /// Response body did not match the expected shape
    #[error("NLU response malformed: {0}")]
    Malformed(String),

    /// No answer within the configured timeout
    #[error("NLU request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Payment gateway errors
///
/// A declined charge is not an error; gateways report it as `Ok(false)`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PaymentError {
    /// Gateway could not be reached or refused to answer
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    /// No answer within the configured timeout
    #[error("Payment timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Ticket rendering errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RenderError {
    /// Payload could not be encoded as a QR code
    #[error("QR encoding failed: {0}")]
    Encoding(String),

    /// Image could not be written
    #[error("Image encoding failed: {0}")]
    Image(String),

    /// Rendering exceeded the configured timeout
    #[error("Ticket rendering timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Booking is missing details required on the ticket
    #[error("Booking is incomplete: {0}")]
    IncompleteBooking(String),
}

/// Messaging transport errors
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// Request could not be delivered
    #[error("Message delivery failed: {0}")]
    Request(String),

    /// Provider rejected the message
    #[error("Message rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// No answer within the configured timeout
    #[error("Message delivery timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Entity values that cannot fill a booking slot
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SlotError {
    /// Seat count is not a positive whole number
    #[error("Invalid seat count: {value:?}")]
    InvalidSeats { value: String },

    /// Entity value has a JSON type the slot cannot hold
    #[error("Unsupported value for slot {slot}: {value}")]
    UnsupportedValue { slot: String, value: String },
}

/// Type alias for bot Result
pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::Connection("connection refused".to_string());
        let display = format!("{}", err);
        assert!(display.contains("Storage connection failed"));
        assert!(display.contains("connection refused"));
    }

    #[test]
    fn test_nlu_timeout_display() {
        let err = NluError::Timeout { timeout_ms: 5000 };
        let display = format!("{}", err);
        assert!(display.contains("timed out"));
        assert!(display.contains("5000ms"));
    }

    #[test]
    fn test_transport_rejected_display() {
        let err = TransportError::Rejected {
            status: 400,
            body: "invalid To".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("400"));
        assert!(display.contains("invalid To"));
    }

    #[test]
    fn test_slot_error_display() {
        let err = SlotError::InvalidSeats {
            value: "a few".to_string(),
        };
        assert_eq!(format!("{}", err), "Invalid seat count: \"a few\"");
    }

    #[test]
    fn test_error_conversion_storage_to_bot() {
        let storage_err = StorageError::Connection("test".to_string());
        let bot_err: BotError = storage_err.into();
        assert!(matches!(bot_err, BotError::Storage(_)));
    }

    #[test]
    fn test_error_conversion_render_to_bot() {
        let render_err = RenderError::Timeout { timeout_ms: 10 };
        let bot_err: BotError = render_err.into();
        assert!(matches!(bot_err, BotError::Render(_)));
    }

    #[test]
    fn test_every_bot_error_comes_from_a_boundary() {
        let errors: Vec<BotError> = vec![
            StorageError::Query("timeout".to_string()).into(),
            RenderError::Encoding("too long".to_string()).into(),
            TransportError::Request("reset".to_string()).into(),
            BotError::Configuration("missing".to_string()),
        ];

        for err in errors {
            let label = match err {
                BotError::Storage(_) => "storage",
                BotError::Render(_) => "render",
                BotError::Transport(_) => "transport",
                BotError::Configuration(_) => "configuration",
            };
            assert!(!label.is_empty());
        }
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<()> {
            Ok(())
        }

        assert!(returns_result().is_ok());
    }
}
