//! Natural-language understanding boundary
//!
//! The bot does not classify text itself. An [`NluGateway`] turns a message
//! into an [`NluResult`] (intent, confidence, entities), and
//! [`extract_slots`] turns the entities into typed booking slot values.

use crate::booking::{Slot, SlotValues};
use crate::error::{NluError, SlotError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod rasa;

/// Intent classification with its confidence (0.0-1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub name: String,
    pub confidence: f64,
}

impl Intent {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Typed value extracted from the message text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Entity type name, e.g. `source`
    pub entity: String,
    /// Extracted value; usually a string, numbers come through as numbers
    pub value: serde_json::Value,
    #[serde(default)]
    pub start: usize,
    #[serde(default)]
    pub end: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_entity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extractor: Option<String>,
}

impl Entity {
    /// Entity with a string value and no span information
    pub fn new(entity: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
            start: 0,
            end: 0,
            confidence_entity: None,
            extractor: None,
        }
    }
}

/// Full interpretation of one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NluResult {
    /// Text that was classified
    pub text: String,
    pub intent: Intent,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Candidate intents, best first (not enforced)
    #[serde(default)]
    pub intent_ranking: Vec<Intent>,
}

impl NluResult {
    /// Result with a single intent and no entities
    pub fn new(text: impl Into<String>, intent: Intent) -> Self {
        Self {
            text: text.into(),
            intent_ranking: vec![intent.clone()],
            intent,
            entities: Vec::new(),
        }
    }

    /// Add an extracted entity
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }
}

/// Trait for NLU service implementations
#[async_trait]
pub trait NluGateway: Send + Sync {
    /// Classify a message
    ///
    /// # Arguments
    ///
    /// * `text` - Raw message text as received from the user
    ///
    /// # Returns
    ///
    /// The intent and entities, or an error if the service is unreachable or
    /// answers with something that is not an NLU result
    async fn classify(&self, text: &str) -> Result<NluResult, NluError>;
}

/// Extract typed slot values from this turn's entities
///
/// Later entities of the same type win. Entities that do not name a slot are
/// ignored, as are empty values. A seats value that is not a positive whole
/// number is reported in [`SlotValues::invalid_seats`] and never fills the slot.
pub fn extract_slots(entities: &[Entity]) -> SlotValues {
    let mut values = SlotValues::default();

    for entity in entities {
        let Some(slot) = Slot::from_entity(&entity.entity) else {
            continue;
        };

        let target = match slot {
            Slot::Source => &mut values.source,
            Slot::Destination => &mut values.destination,
            Slot::Date => &mut values.date,
            Slot::Seats => {
                match parse_seats(&entity.value) {
                    Ok(Some(seats)) => {
                        values.seats = Some(seats);
                        values.invalid_seats = None;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(error = %err, "Discarding seats entity");
                        values.seats = None;
                        values.invalid_seats = Some(raw_text(&entity.value));
                    }
                }
                continue;
            }
        };

        match text_value(slot, &entity.value) {
            Ok(Some(text)) => *target = Some(text),
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Discarding entity"),
        }
    }

    debug!(
        source = ?values.source,
        destination = ?values.destination,
        date = ?values.date,
        seats = ?values.seats,
        "Extracted slot values"
    );

    values
}

/// Read a text slot; numbers are accepted and rendered as text
fn text_value(slot: Slot, value: &serde_json::Value) -> Result<Option<String>, SlotError> {
    use serde_json::Value;

    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s.trim().to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Null => Ok(None),
        other => Err(SlotError::UnsupportedValue {
            slot: slot.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Parse a seat count from a string or number entity value
pub fn parse_seats(value: &serde_json::Value) -> Result<Option<u32>, SlotError> {
    use serde_json::Value;

    let invalid = || SlotError::InvalidSeats {
        value: raw_text(value),
    };

    let seats = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.trim().parse::<u32>().map_err(|_| invalid())?,
        Value::Number(n) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(invalid)?,
        _ => return Err(invalid()),
    };

    if seats == 0 {
        return Err(invalid());
    }

    Ok(Some(seats))
}

fn raw_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
