//! Host-configurable display strings.

use serde::{Deserialize, Serialize};

use crate::{error::DisplayError, quote::DEFAULT_SENDER_NAME_SIZE, widget_cache::UNKNOWN_WIDGET_TYPE};

/// Settings that control the text produced for widget events and quotes.
///
/// Templates may contain the `{widget}` and `{sender}` placeholders;
/// any other text, including unknown placeholders, is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventDisplayConfig {
    pub widget_added_template: String,
    pub widget_removed_template: String,
    /// The widget type shown when a removed widget's type cannot be determined.
    pub unknown_widget_type: String,
    pub sender_name_size: u32,
}

impl Default for EventDisplayConfig {
    fn default() -> Self {
        Self {
            widget_added_template: String::from("{widget} added by {sender}"),
            widget_removed_template: String::from("{widget} removed by {sender}"),
            unknown_widget_type: String::from(UNKNOWN_WIDGET_TYPE),
            sender_name_size: DEFAULT_SENDER_NAME_SIZE,
        }
    }
}

impl EventDisplayConfig {
    /// Parses a config from JSON; missing fields take their default values.
    pub fn from_json_str(json: &str) -> Result<Self, DisplayError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn widget_added(&self, widget: &str, sender: &str) -> String {
        fill_template(&self.widget_added_template, widget, sender)
    }

    pub fn widget_removed(&self, widget: &str, sender: &str) -> String {
        fill_template(&self.widget_removed_template, widget, sender)
    }
}

/// Substitutes the placeholders of a widget template in a single pass,
/// so that placeholder-like text within the values is left alone.
fn fill_template(template: &str, widget: &str, sender: &str) -> String {
    let mut out = String::with_capacity(template.len() + widget.len() + sender.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let candidate = &rest[start..];
        if let Some(after) = candidate.strip_prefix("{widget}") {
            out.push_str(widget);
            rest = after;
        } else if let Some(after) = candidate.strip_prefix("{sender}") {
            out.push_str(sender);
            rest = after;
        } else {
            out.push('{');
            rest = &candidate[1..];
        }
    }
    out.push_str(rest);
    out
}
