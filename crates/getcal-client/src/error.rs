//! Client error types.

use thiserror::Error;

use getcal_core::TimeError;
use getcal_providers::ProviderError;
use getcal_providers::google::CredentialError;

use crate::clipboard::ClipboardError;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that end a getcal run.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The date argument is not an ISO date.
    #[error("invalid date '{value}': {reason} (expected YYYY-MM-DD)")]
    InvalidDate {
        /// The value given on the command line.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable credential.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The calendar query failed.
    #[error("calendar query failed: {0}")]
    Provider(#[from] ProviderError),

    /// An HTTP client could not be built; no request was sent.
    #[error("cannot set up the HTTP client: {0}")]
    HttpSetup(#[source] ProviderError),

    /// Every clipboard tier failed.
    #[error("clipboard write failed: {0}")]
    Clipboard(#[from] ClipboardError),

    /// Date arithmetic failed.
    #[error(transparent)]
    Time(#[from] TimeError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
