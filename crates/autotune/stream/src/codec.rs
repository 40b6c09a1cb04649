//! Field-map encoding of learning events.
//!
//! An event travels as the JSON field `event`. The `type` field mirrors the
//! event type so cheap producers and filters need not parse JSON.

use crate::entry::{EntryId, StreamEntry};
use crate::error::StreamError;
use autotune_types::LearningEvent;
use std::collections::BTreeMap;

pub const EVENT_FIELD: &str = "event";
pub const TYPE_FIELD: &str = "type";

pub fn encode_event(event: &LearningEvent) -> Result<BTreeMap<String, String>, StreamError> {
    let json = serde_json::to_string(event).map_err(|e| StreamError::Malformed {
        entry: event.id.to_string(),
        reason: e.to_string(),
    })?;
    let mut fields = BTreeMap::new();
    fields.insert(EVENT_FIELD.to_string(), json);
    fields.insert(TYPE_FIELD.to_string(), event.event_type.to_string());
    Ok(fields)
}

pub fn decode_entry(entry: &StreamEntry) -> Result<LearningEvent, StreamError> {
    let malformed = |reason: String| StreamError::Malformed {
        entry: entry.id.to_string(),
        reason,
    };
    let json = entry
        .field(EVENT_FIELD)
        .ok_or_else(|| malformed(format!("missing field `{EVENT_FIELD}`")))?;
    let event: LearningEvent =
        serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
    if let Some(mirrored) = entry.field(TYPE_FIELD) {
        if mirrored != event.event_type.as_str() {
            return Err(malformed(format!(
                "type field {mirrored} disagrees with event type {}",
                event.event_type
            )));
        }
    }
    Ok(event)
}

/// A batch split into decoded events and per-entry failures.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<(EntryId, LearningEvent)>,
    pub failures: Vec<StreamError>,
    /// Id of the last entry seen, decodable or not.
    pub last_id: Option<EntryId>,
}

pub fn decode_batch(entries: &[StreamEntry]) -> DecodedBatch {
    let mut batch = DecodedBatch::default();
    for entry in entries {
        batch.last_id = Some(entry.id);
        match decode_entry(entry) {
            Ok(event) => batch.events.push((entry.id, event)),
            Err(e) => batch.failures.push(e),
        }
    }
    batch
}
