//! Remembers which widget a "widget removed" event is closing.
//!
//! A widget is removed by sending a widget state event with empty content,
//! which says nothing about what kind of widget it was.
//! To name it, we look back through the room's widget state history
//! for the event that originally added a widget under the same state key.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Mutex,
};

use tracing::debug;

use crate::{
    content::{WIDGET_EVENT_TYPE, WidgetContent},
    event::{Event, RoomState},
};

/// The widget type shown when the closed widget cannot be determined.
pub const UNKNOWN_WIDGET_TYPE: &str = "undefined";

/// A cache of the widget events being closed by later removal events, keyed by state key.
///
/// Once a state key has been resolved, its entry is never replaced or evicted.
/// This cache is meant to be shared (e.g., in an `Arc`) across all formatting calls.
#[derive(Debug, Default)]
pub struct ClosingWidgetCache {
    closing_events: Mutex<BTreeMap<String, Event>>,
}

impl ClosingWidgetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the human-readable type of the widget closed by a removal event
    /// with the given `state_key`, or `None` if it cannot be determined.
    ///
    /// On a cache miss, the room's widget state history is scanned in arrival order
    /// and the *first* non-empty widget event with the same state key is used,
    /// such that the widget's original type wins over any later updates.
    pub fn resolve_closing_widget(&self, state_key: &str, room_state: &dyn RoomState) -> Option<String> {
        // A poisoned lock still holds a consistent map, since entries are only ever inserted.
        let mut closing_events = self.closing_events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match closing_events.entry(state_key.to_owned()) {
            Entry::Occupied(occupied) => {
                debug!("resolve_closing_widget(): cache hit for state key {state_key:?}");
                Some(WidgetContent::new(&occupied.get().content).human_name())
            }
            Entry::Vacant(vacant) => {
                let found = room_state
                    .state_events_of_type(WIDGET_EVENT_TYPE)
                    .into_iter()
                    .find(|widget_event|
                        widget_event.state_key.as_deref() == Some(state_key)
                            && !WidgetContent::new(&widget_event.content).is_empty()
                    )?;
                debug!("resolve_closing_widget(): resolved state key {state_key:?} from room state");
                let closing_event = vacant.insert(found.clone());
                Some(WidgetContent::new(&closing_event.content).human_name())
            }
        }
    }

    /// Like [`Self::resolve_closing_widget()`], but falls back to [`UNKNOWN_WIDGET_TYPE`].
    pub fn resolve_closing_widget_type(&self, state_key: &str, room_state: &dyn RoomState) -> String {
        self.resolve_closing_widget(state_key, room_state)
            .unwrap_or_else(|| UNKNOWN_WIDGET_TYPE.to_owned())
    }

    /// Returns the number of state keys that have been resolved.
    pub fn len(&self) -> usize {
        self.closing_events
            .lock()
            .map(|events| events.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    };

    use serde_json::json;

    use super::*;
    use crate::event::RoomStateSnapshot;

    /// A room state that counts how many times its widget history was scanned.
    struct CountingRoomState {
        inner: RoomStateSnapshot,
        scans: AtomicUsize,
    }

    impl CountingRoomState {
        fn new(inner: RoomStateSnapshot) -> Self {
            Self { inner, scans: AtomicUsize::new(0) }
        }
    }

    impl RoomState for CountingRoomState {
        fn member_display_name(&self, user_id: &str) -> Option<String> {
            self.inner.member_display_name(user_id)
        }

        fn state_events_of_type(&self, event_type: &str) -> Vec<&Event> {
            self.scans.fetch_add(1, Ordering::SeqCst);
            self.inner.state_events_of_type(event_type)
        }
    }

    fn widget(state_key: &str, content: serde_json::Value) -> Event {
        Event::new(WIDGET_EVENT_TYPE, "@admin:example.org", content).with_state_key(state_key)
    }

    fn history() -> RoomStateSnapshot {
        let mut state = RoomStateSnapshot::new();
        state.push_state_event(widget("other", json!({ "type": "Z" })));
        state.push_state_event(widget("w1", json!({ "type": "A" })));
        state.push_state_event(widget("w1", json!({ "type": "B" })));
        state.push_state_event(widget("w1", json!({})));
        state
    }

    #[test]
    fn first_matching_widget_wins_and_is_cached() {
        let room_state = CountingRoomState::new(history());
        let cache = ClosingWidgetCache::new();

        assert_eq!(cache.resolve_closing_widget_type("w1", &room_state), "A widget");
        assert_eq!(room_state.scans.load(Ordering::SeqCst), 1);

        assert_eq!(cache.resolve_closing_widget_type("w1", &room_state), "A widget");
        assert_eq!(room_state.scans.load(Ordering::SeqCst), 1, "second lookup must not rescan");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn unknown_state_key_is_undefined_and_not_cached() {
        let room_state = CountingRoomState::new(history());
        let cache = ClosingWidgetCache::new();

        assert_eq!(cache.resolve_closing_widget_type("nope", &room_state), UNKNOWN_WIDGET_TYPE);
        assert!(cache.is_empty());
        assert_eq!(cache.resolve_closing_widget("nope", &room_state), None);
        assert_eq!(room_state.scans.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn only_removal_history_is_undefined() {
        let mut state = RoomStateSnapshot::new();
        state.push_state_event(widget("w2", json!({})));
        let cache = ClosingWidgetCache::new();
        assert_eq!(cache.resolve_closing_widget_type("w2", &state), "undefined");
    }

    #[test]
    fn cached_entry_is_never_replaced() {
        let cache = ClosingWidgetCache::new();
        assert_eq!(cache.resolve_closing_widget_type("w1", &history()), "A widget");

        // A different room state that would resolve differently doesn't matter anymore.
        let mut later = RoomStateSnapshot::new();
        later.push_state_event(widget("w1", json!({ "type": "C" })));
        assert_eq!(cache.resolve_closing_widget_type("w1", &later), "A widget");
    }

    #[test]
    fn concurrent_first_resolution_agrees() {
        let room_state = CountingRoomState::new(history());
        let cache = Arc::new(ClosingWidgetCache::new());
        let barrier = Barrier::new(2);
        let (barrier, cache_ref, room_state_ref) = (&barrier, &cache, &room_state);

        let results: Vec<String> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..2)
                .map(|_| s.spawn(move || {
                    barrier.wait();
                    cache_ref.resolve_closing_widget_type("w1", room_state_ref)
                }))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results, vec!["A widget".to_owned(), "A widget".to_owned()]);
        assert_eq!(cache.len(), 1);
        assert_eq!(room_state.scans.load(Ordering::SeqCst), 1);
    }
}
