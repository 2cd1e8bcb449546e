//! Webhook event model
//!
//! Upstream producers hand the worker `(type, message)` pairs. The type name
//! selects an [`EventKind`]; the message is kept verbatim as a JSON field map
//! and is what endpoints eventually receive.
//!
//! ## Wire envelope
//!
//! ```json
//! {"type": "pokemon", "message": {"encounter_id": "abc", "pokemon_id": 1}}
//! ```
//!
//! A missing `type` makes the envelope unusable and it is rejected. A missing
//! identity field is *not* an envelope error: such events are delivered
//! without deduplication.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// Significant fields for location-point (`pokemon`) events
const POKEMON_FIELDS: &[&str] = &[
    "spawnpoint_id",
    "pokemon_id",
    "latitude",
    "longitude",
    "disappear_time",
    "move_1",
    "move_2",
    "individual_stamina",
    "individual_defense",
    "individual_attack",
];

/// Significant fields for point-of-interest (`pokestop`) events.
/// `lure_expiration` is a UTC timestamp, so it compares stably.
const POKESTOP_FIELDS: &[&str] = &[
    "enabled",
    "latitude",
    "longitude",
    "lure_expiration",
    "active_fort_modifier",
];

/// Significant fields for contested-area (`gym`) events
const GYM_FIELDS: &[&str] = &[
    "team_id",
    "guard_pokemon_id",
    "gym_points",
    "enabled",
    "latitude",
    "longitude",
];

/// Notification category of an event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Location-point sighting
    Pokemon,
    /// Point-of-interest state
    Pokestop,
    /// Contested-area state
    Gym,
    /// Any type name the worker does not know
    Other(String),
}

impl EventKind {
    /// Map a wire type name to a kind
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "pokemon" => EventKind::Pokemon,
            "pokestop" => EventKind::Pokestop,
            "gym" => EventKind::Gym,
            other => EventKind::Other(other.to_string()),
        }
    }

    /// Wire type name of this kind
    pub fn type_name(&self) -> &str {
        match self {
            EventKind::Pokemon => "pokemon",
            EventKind::Pokestop => "pokestop",
            EventKind::Gym => "gym",
            EventKind::Other(name) => name,
        }
    }

    /// Field carrying the stable identity of objects of this kind
    pub fn identity_field(&self) -> Option<&'static str> {
        match self {
            EventKind::Pokemon => Some("encounter_id"),
            EventKind::Pokestop => Some("pokestop_id"),
            EventKind::Gym => Some("gym_id"),
            EventKind::Other(_) => None,
        }
    }

    /// Fields whose change justifies re-notification.
    ///
    /// Empty for unknown kinds.
    pub fn significant_fields(&self) -> &'static [&'static str] {
        match self {
            EventKind::Pokemon => POKEMON_FIELDS,
            EventKind::Pokestop => POKESTOP_FIELDS,
            EventKind::Gym => GYM_FIELDS,
            EventKind::Other(_) => &[],
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Dedup identity of an event: its kind plus the rendered identity value
///
/// A string id `"1"` and a numeric id `1` are different identities; only the
/// rendered text is shared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    kind: EventKind,
    id: String,
    textual: bool,
}

impl IdentityKey {
    /// Create an identity key for a string id
    pub fn new(kind: EventKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            textual: true,
        }
    }

    /// Create an identity key from an id value of any JSON type
    pub fn from_value(kind: EventKind, id: &Value) -> Self {
        match id {
            Value::String(s) => Self::new(kind, s.clone()),
            other => Self {
                kind,
                id: other.to_string(),
                textual: false,
            },
        }
    }

    /// Kind part of the key
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Identity value part of the key
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the id was a JSON string on the wire
    pub fn is_textual(&self) -> bool {
        self.textual
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A typed domain event as received from the queue
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    kind: EventKind,
    fields: Map<String, Value>,
    received_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Create an event from a kind and its raw field map
    pub fn new(kind: EventKind, fields: Map<String, Value>) -> Self {
        Self {
            kind,
            fields,
            received_at: Utc::now(),
        }
    }

    /// Parse a `{"type": ..., "message": {...}}` envelope
    ///
    /// # Errors
    ///
    /// - `Error::InvalidEvent` if `type` is missing or not a string
    /// - `Error::InvalidEvent` if `message` is missing or not an object
    pub fn from_envelope(envelope: Value) -> Result<Self> {
        let Value::Object(mut envelope) = envelope else {
            return Err(Error::invalid_event("envelope is not a JSON object"));
        };

        let kind = match envelope.get("type") {
            Some(Value::String(name)) => EventKind::from_type_name(name),
            Some(_) => return Err(Error::invalid_event("`type` is not a string")),
            None => return Err(Error::invalid_event("missing `type`")),
        };

        match envelope.remove("message") {
            Some(Value::Object(fields)) => Ok(Self::new(kind, fields)),
            Some(_) => Err(Error::invalid_event(format!(
                "`message` of {} event is not an object",
                kind
            ))),
            None => Err(Error::invalid_event(format!(
                "missing `message` for {} event",
                kind
            ))),
        }
    }

    /// Parse one line of newline-delimited JSON envelopes
    pub fn from_json_line(line: &str) -> Result<Self> {
        let envelope: Value = serde_json::from_str(line)?;
        Self::from_envelope(envelope)
    }

    /// Event kind
    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// Raw field map, exactly as received
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Look up a field. `null` reads the same as an absent field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|value| !value.is_null())
    }

    /// Time the worker created this event
    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Derive the dedup identity, if the kind has one and it is present
    pub fn identity(&self) -> Option<IdentityKey> {
        let field = self.kind.identity_field()?;
        let id = self.field(field)?;
        Some(IdentityKey::from_value(self.kind.clone(), id))
    }

    /// JSON text of the raw field map (the delivered `content`)
    pub fn fields_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}
