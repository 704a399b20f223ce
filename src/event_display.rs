//! The top-level event display engine.
//!
//! [`EventDisplay`] decides how an event should be shown:
//! widget state events get "added"/"removed" text, replies are shown without
//! their embedded reply fallback, and everything else is handed to an [`EventFormatter`].

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    config::EventDisplayConfig,
    content::{ROOM_MESSAGE_EVENT_TYPE, WIDGET_EVENT_TYPE, WidgetContent, string_field},
    error::{DisplayError, Outcome},
    event::{Event, RoomState},
    event_preview::BasicEventFormatter,
    html::HtmlToolbox,
    quote::{self, QuoteResult},
    widget_cache::ClosingWidgetCache,
};

/// Formats any event that has no special display rules.
pub trait EventFormatter {
    /// Returns the display text of the given event, or `None` if it shouldn't be shown.
    ///
    /// `display_name_color` is the `0xRRGGBB` color in which to highlight the sender's name.
    fn format(
        &self,
        display_name_color: Option<u32>,
        event: &Event,
        room_state: &dyn RoomState,
    ) -> Option<String>;
}

/// Receives reports of events that could not be decrypted.
pub trait DecryptionFailureSink {
    fn report_unable_to_decrypt(&self, event: &Event, room_state: &dyn RoomState, viewer_id: &str);
}

/// The display text produced for an event, by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayText {
    /// A widget was added, updated or removed.
    Widget(String),
    /// A reply, with the sender's name styled separately.
    Quote(QuoteResult),
    /// Text produced by the fallback [`EventFormatter`].
    Formatted(String),
}

impl DisplayText {
    pub fn text(&self) -> &str {
        match self {
            DisplayText::Widget(text) | DisplayText::Formatted(text) => text,
            DisplayText::Quote(quote) => &quote.text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            DisplayText::Widget(text) | DisplayText::Formatted(text) => text,
            DisplayText::Quote(quote) => quote.text,
        }
    }
}

/// Turns room events into display text.
///
/// An `EventDisplay` is cheap to share: all of its collaborators are immutable,
/// and the [`ClosingWidgetCache`] it uses is internally synchronized.
pub struct EventDisplay {
    /// The user ID of the logged-in user viewing these events.
    viewer_id: String,
    formatter: Box<dyn EventFormatter + Send + Sync>,
    html_toolbox: Option<Box<dyn HtmlToolbox + Send + Sync>>,
    decryption_failure_sink: Option<Box<dyn DecryptionFailureSink + Send + Sync>>,
    closing_widgets: Arc<ClosingWidgetCache>,
    config: EventDisplayConfig,
}

impl EventDisplay {
    /// Creates a new event display for the given viewer, using the [`BasicEventFormatter`]
    /// and a fresh [`ClosingWidgetCache`].
    pub fn new(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            formatter: Box::new(BasicEventFormatter),
            html_toolbox: None,
            decryption_failure_sink: None,
            closing_widgets: Arc::new(ClosingWidgetCache::new()),
            config: EventDisplayConfig::default(),
        }
    }

    pub fn with_formatter(mut self, formatter: impl EventFormatter + Send + Sync + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    pub fn with_html_toolbox(mut self, toolbox: impl HtmlToolbox + Send + Sync + 'static) -> Self {
        self.html_toolbox = Some(Box::new(toolbox));
        self
    }

    pub fn with_decryption_failure_sink(mut self, sink: impl DecryptionFailureSink + Send + Sync + 'static) -> Self {
        self.decryption_failure_sink = Some(Box::new(sink));
        self
    }

    /// Uses the given cache, e.g., one shared with other `EventDisplay`s.
    pub fn with_closing_widget_cache(mut self, cache: Arc<ClosingWidgetCache>) -> Self {
        self.closing_widgets = cache;
        self
    }

    pub fn with_config(mut self, config: EventDisplayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn closing_widget_cache(&self) -> &Arc<ClosingWidgetCache> {
        &self.closing_widgets
    }

    pub fn config(&self) -> &EventDisplayConfig {
        &self.config
    }

    /// Returns the display text of the given event, or `None` if there is none.
    ///
    /// This never panics or fails: any problem is logged and results in `None`.
    pub fn textual_display(
        &self,
        display_name_color: Option<u32>,
        event: &Event,
        room_state: &dyn RoomState,
    ) -> Option<String> {
        match self.display(display_name_color, event, room_state) {
            Outcome::Rendered(text) => Some(text.into_text()),
            Outcome::NotApplicable => None,
            Outcome::Failed(e) => {
                error!("textual_display(): failed to display event {}: {e}", event.id_for_logs());
                None
            }
        }
    }

    /// Like [`Self::textual_display()`], but keeps the kind of text
    /// and the reason why no text was produced.
    pub fn display(
        &self,
        display_name_color: Option<u32>,
        event: &Event,
        room_state: &dyn RoomState,
    ) -> Outcome<DisplayText> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(||
            self.display_inner(display_name_color, event, room_state)
        ))
        .unwrap_or_else(|payload| Outcome::Failed(DisplayError::Panicked(panic_message(&*payload))));

        if event.decryption_error.is_some() {
            self.report_decryption_failure(event, room_state);
        }
        outcome
    }

    fn display_inner(
        &self,
        display_name_color: Option<u32>,
        event: &Event,
        room_state: &dyn RoomState,
    ) -> Outcome<DisplayText> {
        match event.event_type.as_str() {
            WIDGET_EVENT_TYPE => self.widget_text(event, room_state).map(DisplayText::Widget),
            ROOM_MESSAGE_EVENT_TYPE => {
                let sender_display_name = room_state.member_name(&event.sender);
                let toolbox = self.html_toolbox.as_deref().map(|t| t as &dyn HtmlToolbox);
                match quote::extract(&event.sender, &sender_display_name, &event.content, toolbox) {
                    Outcome::Rendered(mut quote) => {
                        quote.sender_name_size = self.config.sender_name_size;
                        Outcome::Rendered(DisplayText::Quote(quote))
                    }
                    Outcome::NotApplicable => self.fallback(display_name_color, event, room_state),
                    Outcome::Failed(e) => {
                        warn!("display_inner(): failed to display reply {}, falling back: {e}", event.id_for_logs());
                        self.fallback(display_name_color, event, room_state)
                    }
                }
            }
            _ => self.fallback(display_name_color, event, room_state),
        }
    }

    /// Returns the "widget added" or "widget removed" text for the given widget event.
    fn widget_text(&self, event: &Event, room_state: &dyn RoomState) -> Outcome<String> {
        let sender_display_name = sender_display_name(event, room_state);
        let widget = WidgetContent::new(&event.content);
        if widget.is_empty() {
            let Some(state_key) = event.state_key.as_deref() else {
                return Outcome::Failed(DisplayError::MissingStateKey);
            };
            let widget_type = self.closing_widgets
                .resolve_closing_widget(state_key, room_state)
                .unwrap_or_else(|| self.config.unknown_widget_type.clone());
            Outcome::Rendered(self.config.widget_removed(&widget_type, &sender_display_name))
        } else {
            Outcome::Rendered(self.config.widget_added(&widget.human_name(), &sender_display_name))
        }
    }

    fn fallback(
        &self,
        display_name_color: Option<u32>,
        event: &Event,
        room_state: &dyn RoomState,
    ) -> Outcome<DisplayText> {
        match self.formatter.format(display_name_color, event, room_state) {
            Some(text) => Outcome::Rendered(DisplayText::Formatted(text)),
            None => {
                debug!("fallback(): no display text for {} event {}", event.event_type, event.id_for_logs());
                Outcome::NotApplicable
            }
        }
    }

    fn report_decryption_failure(&self, event: &Event, room_state: &dyn RoomState) {
        let Some(sink) = self.decryption_failure_sink.as_deref() else { return };
        let reported = panic::catch_unwind(AssertUnwindSafe(||
            sink.report_unable_to_decrypt(event, room_state, &self.viewer_id)
        ));
        if let Err(payload) = reported {
            error!("report_decryption_failure(): failed to report decryption failure of event {}: {}",
                event.id_for_logs(),
                panic_message(&*payload),
            );
        }
    }
}

/// Returns the name to show for the sender of the given (state) event.
///
/// This is the sender's current name in the room, unless the event's content
/// (or else its previous content) shows the sender as joined with a non-empty display name,
/// in which case that name is used so that names stay consistent while membership is changing.
pub fn sender_display_name(event: &Event, room_state: &dyn RoomState) -> String {
    fn joined_name(content: &Value) -> Option<&str> {
        if string_field(content, "membership").present() != Some("join") {
            return None;
        }
        string_field(content, "displayname").present().filter(|name| !name.is_empty())
    }
    joined_name(&event.content)
        .or_else(|| event.prev_content.as_ref().and_then(joined_name))
        .map(str::to_owned)
        .unwrap_or_else(|| room_state.member_name(&event.sender))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}
