//! Timeline events and the room state they are formatted against.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why an encrypted event could not be decrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionError {
    /// A machine-readable error code, e.g., `UNKNOWN_INBOUND_SESSION_ID`.
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Unsigned {
    #[serde(default)]
    prev_content: Option<Value>,
}

/// A single room event, as received from the homeserver.
///
/// Events are never modified while being formatted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawEvent")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub sender: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_key: Option<String>,
    pub content: Value,
    /// The content this state event replaced, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_content: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decryption_error: Option<DecryptionError>,
}

/// The wire shape of an event, where `prev_content` may live under `unsigned`.
#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    event_id: Option<String>,
    #[serde(default)]
    sender: String,
    #[serde(default)]
    state_key: Option<String>,
    #[serde(default)]
    content: Value,
    #[serde(default)]
    prev_content: Option<Value>,
    #[serde(default)]
    unsigned: Option<Unsigned>,
    #[serde(default)]
    decryption_error: Option<DecryptionError>,
}

impl From<RawEvent> for Event {
    fn from(raw: RawEvent) -> Self {
        let prev_content = raw.prev_content
            .or_else(|| raw.unsigned.and_then(|u| u.prev_content));
        Self {
            event_type: raw.event_type,
            event_id: raw.event_id,
            sender: raw.sender,
            state_key: raw.state_key,
            content: raw.content,
            prev_content,
            decryption_error: raw.decryption_error,
        }
    }
}

impl Event {
    /// Creates a new event of the given type with the given content.
    pub fn new(event_type: impl Into<String>, sender: impl Into<String>, content: Value) -> Self {
        Self {
            event_type: event_type.into(),
            event_id: None,
            sender: sender.into(),
            state_key: None,
            content,
            prev_content: None,
            decryption_error: None,
        }
    }

    pub fn with_state_key(mut self, state_key: impl Into<String>) -> Self {
        self.state_key = Some(state_key.into());
        self
    }

    pub fn with_prev_content(mut self, prev_content: Value) -> Self {
        self.prev_content = Some(prev_content);
        self
    }

    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    pub fn with_decryption_error(mut self, error: DecryptionError) -> Self {
        self.decryption_error = Some(error);
        self
    }

    /// Returns this event's ID, or a placeholder for logging.
    pub fn id_for_logs(&self) -> &str {
        self.event_id.as_deref().unwrap_or("<no event id>")
    }
}

/// A read-only view of a room's state, queried while formatting its events.
pub trait RoomState {
    /// Returns the display name of the given room member, if known.
    fn member_display_name(&self, user_id: &str) -> Option<String>;

    /// Returns all state events of the given type in the order they arrived.
    fn state_events_of_type(&self, event_type: &str) -> Vec<&Event>;

    /// Returns the member's display name, or their user ID if they have none.
    fn member_name(&self, user_id: &str) -> String {
        self.member_display_name(user_id)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user_id.to_owned())
    }
}

/// A simple in-memory [`RoomState`].
#[derive(Debug, Clone, Default)]
pub struct RoomStateSnapshot {
    display_names: BTreeMap<String, String>,
    state_events: IndexMap<String, Vec<Event>>,
}

impl RoomStateSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the display name of a room member.
    pub fn set_display_name(&mut self, user_id: impl Into<String>, display_name: impl Into<String>) {
        self.display_names.insert(user_id.into(), display_name.into());
    }

    /// Appends a state event to this room's history.
    pub fn push_state_event(&mut self, event: Event) {
        self.state_events
            .entry(event.event_type.clone())
            .or_default()
            .push(event);
    }
}

impl RoomState for RoomStateSnapshot {
    fn member_display_name(&self, user_id: &str) -> Option<String> {
        self.display_names.get(user_id).cloned()
    }

    fn state_events_of_type(&self, event_type: &str) -> Vec<&Event> {
        self.state_events
            .get(event_type)
            .map(|events| events.iter().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn deserializes_prev_content_from_unsigned() {
        let event: Event = serde_json::from_value(json!({
            "type": "m.room.member",
            "event_id": "$1",
            "sender": "@alice:example.org",
            "state_key": "@alice:example.org",
            "content": { "membership": "join", "displayname": "Alice" },
            "unsigned": { "prev_content": { "membership": "invite" } }
        })).unwrap();
        assert_eq!(event.event_type, "m.room.member");
        assert_eq!(event.state_key.as_deref(), Some("@alice:example.org"));
        assert_eq!(event.prev_content, Some(json!({ "membership": "invite" })));
        assert_eq!(event.decryption_error, None);
    }

    #[test]
    fn top_level_prev_content_wins() {
        let event: Event = serde_json::from_value(json!({
            "type": "m.room.topic",
            "sender": "@bob:example.org",
            "content": { "topic": "new" },
            "prev_content": { "topic": "old" },
            "unsigned": { "prev_content": { "topic": "ignored" } }
        })).unwrap();
        assert_eq!(event.prev_content, Some(json!({ "topic": "old" })));
    }

    #[test]
    fn snapshot_keeps_arrival_order_per_type() {
        let mut state = RoomStateSnapshot::new();
        state.push_state_event(Event::new("t", "@a:x", json!({ "n": 1 })));
        state.push_state_event(Event::new("other", "@a:x", json!({})));
        state.push_state_event(Event::new("t", "@a:x", json!({ "n": 2 })));

        let events = state.state_events_of_type("t");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].content, json!({ "n": 1 }));
        assert_eq!(events[1].content, json!({ "n": 2 }));
        assert!(state.state_events_of_type("missing").is_empty());
    }

    #[test]
    fn member_name_falls_back_to_user_id() {
        let mut state = RoomStateSnapshot::new();
        state.set_display_name("@alice:example.org", "Alice");
        state.set_display_name("@blank:example.org", "");
        assert_eq!(state.member_name("@alice:example.org"), "Alice");
        assert_eq!(state.member_name("@blank:example.org"), "@blank:example.org");
        assert_eq!(state.member_name("@carol:example.org"), "@carol:example.org");
    }
}
