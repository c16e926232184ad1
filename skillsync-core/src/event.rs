//! Inbound "sync user skills" event.
//!
//! Events are validated in full before the pipeline touches any remote
//! system: every top-level field and `payload.handle` must be present, and
//! required strings must be non-empty. Unknown payload fields are kept
//! verbatim so an event can be forwarded unchanged.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::EventError;

/// A validated sync event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub topic: String,
    pub originator: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "mime-type")]
    pub mime_type: String,
    pub payload: SyncPayload,
}

/// Event payload. Only `handle` is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SyncEvent {
    /// Build an event for `handle` on `topic`, stamped now.
    pub fn for_handle(topic: &str, originator: &str, handle: &str) -> Self {
        Self {
            topic: topic.to_string(),
            originator: originator.to_string(),
            timestamp: Utc::now(),
            mime_type: "application/json".to_string(),
            payload: SyncPayload {
                handle: handle.to_string(),
                id: None,
                first_name: None,
                last_name: None,
                extra: Map::new(),
            },
        }
    }

    /// Parse and validate an event from an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let event: SyncEvent = serde_json::from_value(value)?;
        event.validate()?;
        Ok(event)
    }

    /// Parse and validate an event from raw JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, EventError> {
        let event: SyncEvent = serde_json::from_str(text)?;
        event.validate()?;
        Ok(event)
    }

    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), EventError> {
        let required = [
            ("topic", self.topic.as_str()),
            ("originator", self.originator.as_str()),
            ("mime-type", self.mime_type.as_str()),
            ("payload.handle", self.payload.handle.as_str()),
        ];
        for (field, value) in required {
            if value.is_empty() {
                return Err(EventError::EmptyField { field });
            }
        }

        let optional = [
            ("payload.id", &self.payload.id),
            ("payload.firstName", &self.payload.first_name),
            ("payload.lastName", &self.payload.last_name),
        ];
        for (field, value) in optional {
            if value.as_deref() == Some("") {
                return Err(EventError::EmptyField { field });
            }
        }
        Ok(())
    }

    pub fn handle(&self) -> &str {
        &self.payload.handle
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

/// Accept an RFC 3339 string, a naive `YYYY-MM-DDTHH:MM:SS[.fff]` (read as
/// UTC), a plain `YYYY-MM-DD`, or integer epoch milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {ms}"))),
        RawTimestamp::Text(text) => parse_timestamp(&text)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: '{text}'"))),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
