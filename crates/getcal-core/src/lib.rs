//! Core types: local zone, day window, event records, formatting

pub mod event;
pub mod format;
pub mod time;
pub mod tracing;

pub use event::{EventRecord, EventStart, NO_TITLE};
pub use format::{
    NO_EVENTS_HTML, NO_EVENTS_TEXT, RenderedOutput, format_start, html_escape, markdown_link,
    to_html, to_text,
};
pub use time::{DayWindow, LocalZone, TimeError};
pub use self::tracing::{LogFormat, TracingConfig, TracingError, init_tracing};
