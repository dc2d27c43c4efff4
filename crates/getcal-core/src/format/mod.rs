//! Plain-text and HTML rendering of a day's events.
//!
//! Both renderers keep the order they are given; the fetch already sorts
//! by start time.
//!
//! # Example
//!
//! ```rust
//! use getcal_core::{EventRecord, EventStart, LocalZone, RenderedOutput};
//!
//! let zone = LocalZone::from_name("UTC").unwrap();
//! let events = vec![
//!     EventRecord::new(EventStart::Instant("2025-02-05T10:00:00Z".into()))
//!         .with_summary("Standup"),
//! ];
//!
//! let output = RenderedOutput::render(&events, &zone);
//! assert_eq!(output.text, "2025-02-05 10:00 (UTC) - Standup");
//! ```


use chrono::DateTime;

use crate::event::{EventRecord, EventStart};
use crate::time::LocalZone;

/// Text rendered when the day has no events.
pub const NO_EVENTS_TEXT: &str = "No events.";

/// HTML rendered when the day has no events.
pub const NO_EVENTS_HTML: &str = "<p>No events.</p>";

/// The plain-text and HTML forms of a day's events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedOutput {
    /// Plain text, one event per line.
    pub text: String,
    /// An HTML document, one paragraph per event.
    pub html: String,
}

impl RenderedOutput {
    /// Renders both forms.
    pub fn render(events: &[EventRecord], zone: &LocalZone) -> Self {
        Self {
            text: to_text(events, zone),
            html: to_html(events, zone),
        }
    }
}

/// Renders the start of an event for display.
///
/// Timed events become `YYYY-MM-DD HH:MM (ABBR)` in the local zone, all-day
/// events keep their date with an `(all-day)` suffix. A timestamp that does
/// not parse is shown as-is with a `(raw)` suffix.
pub fn format_start(start: &EventStart, zone: &LocalZone) -> String {
    match start {
        EventStart::Instant(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => {
                let local = zone.localize(&parsed);
                let abbreviation = local.format("%Z").to_string();
                let label = if abbreviation.is_empty() {
                    zone.name().to_string()
                } else {
                    abbreviation
                };
                format!("{} ({})", local.format("%Y-%m-%d %H:%M"), label)
            }
            Err(e) => {
                tracing::debug!(value = %raw, error = %e, "unparsable event start");
                format!("{} (raw)", raw)
            }
        },
        EventStart::Date(date) => format!("{} (all-day)", date),
        EventStart::Unspecified => "?".to_string(),
    }
}

/// Renders events as plain text, one `start - title` line per event.
///
/// Linked titles use Markdown link syntax.
pub fn to_text(events: &[EventRecord], zone: &LocalZone) -> String {
    if events.is_empty() {
        return NO_EVENTS_TEXT.to_string();
    }

    events
        .iter()
        .map(|event| {
            let start = format_start(&event.start, zone);
            let title = match event.link() {
                Some(url) => markdown_link(event.title(), url),
                None => event.title().to_string(),
            };
            format!("{} - {}", start, title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders events as an HTML document with one paragraph per event.
pub fn to_html(events: &[EventRecord], zone: &LocalZone) -> String {
    if events.is_empty() {
        return NO_EVENTS_HTML.to_string();
    }

    let mut html = String::from("<html><body>");
    for event in events {
        let start = html_escape(&format_start(&event.start, zone));
        let title = html_escape(event.title());
        let title = match event.link() {
            Some(url) => format!("<a href=\"{}\">{}</a>", html_escape(url), title),
            None => title,
        };
        html.push_str(&format!("<p><strong>{}</strong> - {}</p>", start, title));
    }
    html.push_str("</body></html>");
    html
}

/// Creates a Markdown inline link.
pub fn markdown_link(label: &str, url: &str) -> String {
    format!("[{}]({})", label, url)
}

/// Escapes text for HTML display and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
