//! Defensive views over untyped event content JSON.
//!
//! Content arrives as arbitrary JSON, so every field lookup distinguishes
//! between a field that is absent, one that is present but has the wrong shape,
//! and one that is present and usable.

use serde_json::{Map, Value};

use crate::error::{DisplayError, Outcome};

/// The event type of widget state events.
pub const WIDGET_EVENT_TYPE: &str = "im.vector.modular.widgets";
/// The event type of room messages.
pub const ROOM_MESSAGE_EVENT_TYPE: &str = "m.room.message";
/// The `format` value marking a `formatted_body` as Matrix HTML.
pub const HTML_FORMAT: &str = "org.matrix.custom.html";
/// Closing tag of the reply fallback that senders embed ahead of the actual reply.
pub const REPLY_FALLBACK_END: &str = "</mx-reply>";

const RELATES_TO: &str = "m.relates_to";
const IN_REPLY_TO: &str = "m.in_reply_to";

/// The decoded state of a single content field.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    Absent,
    /// The field exists but is not of the expected JSON type.
    Malformed {
        field: &'static str,
        expected: &'static str,
    },
    Present(T),
}

impl<T> Field<T> {
    pub fn present(self) -> Option<T> {
        match self {
            Field::Present(value) => Some(value),
            _ => None,
        }
    }

    /// Requires this field to be present, turning it into a stage [`Outcome`].
    ///
    /// An absent field means the stage is not applicable,
    /// while a malformed field is a failure.
    pub fn require(self) -> Outcome<T> {
        match self {
            Field::Present(value) => Outcome::Rendered(value),
            Field::Absent => Outcome::NotApplicable,
            Field::Malformed { field, expected } => {
                Outcome::Failed(DisplayError::MalformedField { field, expected })
            }
        }
    }
}

/// Looks up a string field of a JSON object.
pub fn string_field<'a>(object: &'a Value, field: &'static str) -> Field<&'a str> {
    match object.get(field) {
        None | Some(Value::Null) => Field::Absent,
        Some(Value::String(s)) => Field::Present(s.as_str()),
        Some(_) => Field::Malformed { field, expected: "a string" },
    }
}

/// Looks up an object field of a JSON object.
pub fn object_field<'a>(object: &'a Value, field: &'static str) -> Field<&'a Map<String, Value>> {
    match object.get(field) {
        None | Some(Value::Null) => Field::Absent,
        Some(Value::Object(map)) => Field::Present(map),
        Some(_) => Field::Malformed { field, expected: "an object" },
    }
}

/// Returns `true` if the given content is missing or an empty JSON object.
///
/// Widget state events with empty content signal that the widget was removed.
pub fn is_empty_content(content: &Value) -> bool {
    match content {
        Value::Object(map) => map.is_empty(),
        Value::Null => true,
        _ => false,
    }
}

/// A view over the content of an `m.room.message` event.
#[derive(Debug, Clone, Copy)]
pub struct MessageContent<'a> {
    content: &'a Value,
}

impl<'a> MessageContent<'a> {
    pub fn new(content: &'a Value) -> Self {
        Self { content }
    }

    pub fn msgtype(&self) -> Field<&'a str> {
        string_field(self.content, "msgtype")
    }

    pub fn body(&self) -> Field<&'a str> {
        string_field(self.content, "body")
    }

    pub fn format(&self) -> Field<&'a str> {
        string_field(self.content, "format")
    }

    pub fn formatted_body(&self) -> Field<&'a str> {
        string_field(self.content, "formatted_body")
    }

    /// Whether this message is a reply, i.e., `m.relates_to` holds an `m.in_reply_to`.
    ///
    /// Only presence matters; the contents of `m.in_reply_to` are not inspected.
    pub fn in_reply_to(&self) -> Field<()> {
        match object_field(self.content, RELATES_TO) {
            Field::Present(relates_to) if relates_to.contains_key(IN_REPLY_TO) => Field::Present(()),
            Field::Present(_) | Field::Absent => Field::Absent,
            Field::Malformed { field, expected } => Field::Malformed { field, expected },
        }
    }

    /// Returns the HTML `formatted_body`, if this message's `format` is Matrix HTML.
    pub fn html_body(&self) -> Outcome<&'a str> {
        let format = match self.format().require() {
            Outcome::Rendered(format) => format,
            Outcome::NotApplicable => return Outcome::NotApplicable,
            Outcome::Failed(e) => return Outcome::Failed(e),
        };
        if format != HTML_FORMAT {
            return Outcome::NotApplicable;
        }
        self.formatted_body().require()
    }
}

/// A view over the content of a widget state event.
#[derive(Debug, Clone, Copy)]
pub struct WidgetContent<'a> {
    content: &'a Value,
}

impl<'a> WidgetContent<'a> {
    pub fn new(content: &'a Value) -> Self {
        Self { content }
    }

    /// Whether this content is empty, which marks the widget as removed.
    pub fn is_empty(&self) -> bool {
        is_empty_content(self.content)
    }

    pub fn widget_type(&self) -> Option<&'a str> {
        string_field(self.content, "type").present().filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&'a str> {
        string_field(self.content, "name").present().filter(|s| !s.is_empty())
    }

    pub fn id(&self) -> Option<&'a str> {
        string_field(self.content, "id").present().filter(|s| !s.is_empty())
    }

    pub fn url(&self) -> Option<&'a str> {
        string_field(self.content, "url").present().filter(|s| !s.is_empty())
    }

    /// Returns a human-readable name for this widget, e.g., "Jitsi widget".
    pub fn human_name(&self) -> String {
        if let Some(name) = self.name() {
            format!("{name} widget")
        } else if let Some(widget_type) = self.widget_type() {
            if widget_type.contains("widget") {
                widget_type.to_owned()
            } else if let Some(id) = self.id() {
                format!("{widget_type} {id}")
            } else {
                format!("{widget_type} widget")
            }
        } else {
            format!("Widget {}", self.id().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn string_field_distinguishes_absent_malformed_present() {
        let content = json!({ "body": "hi", "format": 7, "formatted_body": null });
        assert_eq!(string_field(&content, "body"), Field::Present("hi"));
        assert_eq!(string_field(&content, "missing"), Field::Absent);
        assert_eq!(string_field(&content, "formatted_body"), Field::Absent);
        assert!(matches!(string_field(&content, "format"), Field::Malformed { field: "format", .. }));
    }

    #[test]
    fn reply_detection_requires_in_reply_to() {
        let reply = json!({ "m.relates_to": { "m.in_reply_to": { "event_id": "$abc" } } });
        assert_eq!(MessageContent::new(&reply).in_reply_to(), Field::Present(()));

        let thread = json!({ "m.relates_to": { "rel_type": "m.thread" } });
        assert_eq!(MessageContent::new(&thread).in_reply_to(), Field::Absent);

        let plain = json!({ "body": "hello" });
        assert_eq!(MessageContent::new(&plain).in_reply_to(), Field::Absent);

        let broken = json!({ "m.relates_to": "oops" });
        assert!(matches!(MessageContent::new(&broken).in_reply_to(), Field::Malformed { .. }));
    }

    #[test]
    fn html_body_requires_matrix_html_format() {
        let html = json!({ "format": HTML_FORMAT, "formatted_body": "<b>hi</b>" });
        assert!(matches!(MessageContent::new(&html).html_body(), Outcome::Rendered("<b>hi</b>")));

        let other = json!({ "format": "text/markdown", "formatted_body": "**hi**" });
        assert!(matches!(MessageContent::new(&other).html_body(), Outcome::NotApplicable));

        let unformatted = json!({ "body": "hi" });
        assert!(matches!(MessageContent::new(&unformatted).html_body(), Outcome::NotApplicable));

        let bad_body = json!({ "format": HTML_FORMAT, "formatted_body": ["x"] });
        assert!(matches!(MessageContent::new(&bad_body).html_body(), Outcome::Failed(_)));
    }

    #[test]
    fn widget_human_names() {
        let named = json!({ "type": "jitsi", "name": "Jitsi", "id": "w1" });
        assert_eq!(WidgetContent::new(&named).human_name(), "Jitsi widget");

        let typed = json!({ "type": "m.custom" });
        assert_eq!(WidgetContent::new(&typed).human_name(), "m.custom widget");

        let typed_with_id = json!({ "type": "etherpad", "id": "pad1" });
        assert_eq!(WidgetContent::new(&typed_with_id).human_name(), "etherpad pad1");

        let already_widget = json!({ "type": "customwidget", "id": "x" });
        assert_eq!(WidgetContent::new(&already_widget).human_name(), "customwidget");

        let bare = json!({ "id": "w9" });
        assert_eq!(WidgetContent::new(&bare).human_name(), "Widget w9");
    }

    #[test]
    fn empty_widget_content_marks_removal() {
        assert!(WidgetContent::new(&json!({})).is_empty());
        assert!(WidgetContent::new(&Value::Null).is_empty());
        assert!(!WidgetContent::new(&json!({ "type": "a" })).is_empty());
    }
}
