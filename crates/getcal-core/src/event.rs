//! Event records as fetched from the calendar.
//!
//! Records keep the provider's start specifier as raw text so the formatter
//! can still show something useful when a timestamp does not parse.

use serde::{Deserialize, Serialize};

/// Title shown for events without a usable summary.
pub const NO_TITLE: &str = "(no title)";

/// How an event's start was specified by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EventStart {
    /// An exact instant with an offset, e.g. `2025-02-05T10:00:00+01:00`.
    Instant(String),
    /// A calendar date for all-day events, e.g. `2025-02-05`.
    Date(String),
    /// The provider sent neither.
    #[default]
    Unspecified,
}

impl EventStart {
    /// Builds a start from the provider's optional `dateTime` and `date`
    /// fields. Empty strings count as absent and `dateTime` wins.
    pub fn from_parts(date_time: Option<String>, date: Option<String>) -> Self {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());
        match (non_empty(date_time), non_empty(date)) {
            (Some(dt), _) => Self::Instant(dt),
            (None, Some(d)) => Self::Date(d),
            (None, None) => Self::Unspecified,
        }
    }
}

/// A single event as returned by the day query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Provider identifier, only used in diagnostics.
    pub id: Option<String>,
    /// When the event starts.
    pub start: EventStart,
    /// Display title.
    pub summary: Option<String>,
    /// Deep link to the event in the calendar UI.
    pub html_link: Option<String>,
}

impl EventRecord {
    /// Creates a record with the given start and nothing else.
    pub fn new(start: EventStart) -> Self {
        Self {
            start,
            ..Self::default()
        }
    }

    /// Builder method to set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder method to set the summary.
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Builder method to set the deep link.
    pub fn with_html_link(mut self, link: impl Into<String>) -> Self {
        self.html_link = Some(link.into());
        self
    }

    /// Returns the title, falling back to [`NO_TITLE`] when absent or empty.
    pub fn title(&self) -> &str {
        self.summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(NO_TITLE)
    }

    /// Returns the deep link if one is present and non-empty.
    pub fn link(&self) -> Option<&str> {
        self.html_link.as_deref().filter(|s| !s.is_empty())
    }
}
