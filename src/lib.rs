//! Turns Matrix room events into display text, independent of any UI toolkit.
//!
//! The main entry point is [`EventDisplay::textual_display()`].

/// The top-level event display engine.
pub mod event_display;
/// Generating text previews of events that have no special display rules.
pub mod event_preview;
/// Showing replies without their embedded reply fallback.
pub mod quote;
/// Naming the widget that a "widget removed" event closes.
pub mod widget_cache;
/// Deterministic per-sender username colors.
pub mod sender_color;

// Data model
pub mod content;
pub mod event;
pub mod html;

pub mod config;
pub mod error;
pub mod utils;

pub use config::EventDisplayConfig;
pub use error::{DisplayError, Outcome};
pub use event::{DecryptionError, Event, RoomState, RoomStateSnapshot};
pub use event_display::{DecryptionFailureSink, DisplayText, EventDisplay, EventFormatter};
pub use event_preview::BasicEventFormatter;
pub use html::HtmlToolbox;
pub use quote::QuoteResult;
pub use sender_color::{ColorBucket, bucket_for};
pub use widget_cache::ClosingWidgetCache;
