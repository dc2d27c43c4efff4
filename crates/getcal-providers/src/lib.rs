//! Calendar access for getcal.
//!
//! - [`EventSource`] - lists the events of one [`DayWindow`](getcal_core::DayWindow)
//! - [`google`] - the Google Calendar implementation with its OAuth
//!   credential lifecycle
//! - [`ProviderError`] - error type for provider operations
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌──────────────┐
//! │  CredentialManager   │────▶│ TokenStorage │  token.json
//! └──────────┬───────────┘     └──────────────┘
//!            │ access token (OAuthFlow: refresh / consent)
//!            ▼
//! ┌──────────────────────┐
//! │ GoogleCalendarClient │── EventSource ──▶ Vec<EventRecord>
//! └──────────────────────┘
//! ```

pub mod error;
pub mod google;
pub mod provider;

pub use error::{ProviderError, ProviderErrorKind, ProviderResult};
pub use provider::{BoxFuture, EventSource};
