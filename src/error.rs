//! Error and outcome types threaded through each formatting stage.

use thiserror::Error;

/// Why a formatting stage could not produce text.
///
/// None of these ever reach callers of [`crate::EventDisplay::textual_display()`];
/// they are logged and inspectable through [`crate::EventDisplay::display()`].
#[derive(Debug, Error)]
pub enum DisplayError {
    /// A content field was present but did not have the expected JSON shape.
    #[error("content field `{field}` is malformed: expected {expected}")]
    MalformedField {
        field: &'static str,
        expected: &'static str,
    },
    /// The HTML toolbox failed to turn a formatted body into text.
    #[error("HTML conversion failed: {0}")]
    HtmlConversion(String),
    /// A widget state event had no state key.
    #[error("widget event has no state key")]
    MissingStateKey,
    /// A collaborator panicked while formatting.
    #[error("formatting panicked: {0}")]
    Panicked(String),
    /// The display configuration could not be parsed.
    #[error("invalid display config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

/// The result of one formatting stage.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The stage produced a value.
    Rendered(T),
    /// The stage does not apply to this event; the next stage should be tried.
    NotApplicable,
    /// The stage applied but failed.
    Failed(DisplayError),
}

impl<T> Outcome<T> {
    /// Converts this outcome into an `Option`, discarding the failure reason.
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Rendered(value) => Some(value),
            Outcome::NotApplicable | Outcome::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Rendered(value) => Outcome::Rendered(f(value)),
            Outcome::NotApplicable => Outcome::NotApplicable,
            Outcome::Failed(e) => Outcome::Failed(e),
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, Outcome::Rendered(_))
    }
}

impl<T> From<Result<T, DisplayError>> for Outcome<T> {
    fn from(result: Result<T, DisplayError>) -> Self {
        match result {
            Ok(value) => Outcome::Rendered(value),
            Err(e) => Outcome::Failed(e),
        }
    }
}
