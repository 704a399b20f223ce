//! Displaying replies ("quotes") without the reply fallback the sender embedded.
//!
//! Senders of a reply prepend an `<mx-reply>` block containing a copy of the
//! original message, for the benefit of clients that don't understand replies.
//! Reply-aware clients must drop that block and show only the new text.

use std::ops::Range;

use serde_json::Value;

use crate::{
    content::{MessageContent, REPLY_FALLBACK_END},
    error::{DisplayError, Outcome},
    event::{Event, RoomState},
    html::{self, HtmlToolbox},
    sender_color::{self, ColorBucket},
};

/// The font size of the sender's name above a quote.
pub const DEFAULT_SENDER_NAME_SIZE: u32 = 14;

/// Display text for a reply or quoted message, prefixed by its sender's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteResult {
    /// The sender's display name, a newline, then the message text.
    pub text: String,
    /// The byte range of `text` holding the sender's display name.
    pub sender_name_span: Range<usize>,
    /// The color in which to draw the sender's display name.
    pub sender_color: ColorBucket,
    /// The font size in which to draw the sender's display name.
    pub sender_name_size: u32,
}

impl QuoteResult {
    fn new(sender_id: &str, sender_display_name: &str, body: &str) -> Self {
        Self {
            text: format!("{sender_display_name}\n{body}"),
            sender_name_span: 0..sender_display_name.len(),
            sender_color: sender_color::bucket_for(sender_id),
            sender_name_size: DEFAULT_SENDER_NAME_SIZE,
        }
    }

    /// Returns the sender's display name portion of the text.
    pub fn sender_name(&self) -> &str {
        &self.text[self.sender_name_span.clone()]
    }

    /// Returns the message portion of the text, after the sender's name.
    pub fn body(&self) -> &str {
        &self.text[self.sender_name_span.end + 1..]
    }
}

/// Returns the given HTML with the reply fallback (and everything before it) removed.
///
/// If there is no reply fallback, the HTML is returned as is.
pub fn strip_reply_fallback(html: &str) -> &str {
    match html.find(REPLY_FALLBACK_END) {
        Some(i) => &html[i + REPLY_FALLBACK_END.len()..],
        None => html,
    }
}

/// Extracts the display text of a reply message.
///
/// Returns [`Outcome::NotApplicable`] if the content is not an HTML-formatted reply,
/// or if nothing remains of it once the reply fallback is removed.
pub fn extract(
    sender_id: &str,
    sender_display_name: &str,
    content: &Value,
    toolbox: Option<&dyn HtmlToolbox>,
) -> Outcome<QuoteResult> {
    let message = MessageContent::new(content);
    match message.in_reply_to().require() {
        Outcome::Rendered(()) => { }
        Outcome::NotApplicable => return Outcome::NotApplicable,
        Outcome::Failed(e) => return Outcome::Failed(e),
    }
    let html_body = match message.html_body() {
        Outcome::Rendered(html_body) => html_body,
        Outcome::NotApplicable => return Outcome::NotApplicable,
        Outcome::Failed(e) => return Outcome::Failed(e),
    };

    let body = match html_to_text(strip_reply_fallback(html_body), toolbox) {
        Ok(body) => body,
        Err(e) => return Outcome::Failed(e),
    };
    // Block elements like blockquotes leave newlines at the end.
    let body = body.trim_end_matches('\n');
    if body.is_empty() {
        return Outcome::NotApplicable;
    }
    Outcome::Rendered(QuoteResult::new(sender_id, sender_display_name, body))
}

fn html_to_text(html: &str, toolbox: Option<&dyn HtmlToolbox>) -> Result<String, DisplayError> {
    match toolbox {
        Some(toolbox) => {
            let converted = toolbox.convert(html);
            if converted.is_empty() {
                return Ok(String::new());
            }
            toolbox.render_text(&converted)
        }
        None => Ok(html::to_plain_text(html)),
    }
}

/// Builds the quote block for the given event, as shown above a reply being composed.
///
/// Returns `None` if the event has no plain-text body to quote.
pub fn quote_block(event: &Event, room_state: &dyn RoomState) -> Option<QuoteResult> {
    let body = MessageContent::new(&event.content).body().present()?;
    if body.is_empty() {
        return None;
    }
    let display_name = room_state.member_name(&event.sender);
    Some(QuoteResult::new(&event.sender, &display_name, body))
}
