//! Errors from the calendar provider.
//!
//! One error type covers the Calendar query, the OAuth token endpoints and
//! the credential files. [`ProviderErrorKind`] says which of these went wrong
//! so callers can phrase the diagnostic; the message carries the details.

use std::fmt;

use thiserror::Error;

/// What kind of provider failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// The access token or the token exchange was rejected.
    Authentication,
    /// The user or client may not access the resource, or denied consent.
    Authorization,
    /// The request never got a response.
    Network,
    /// Quota exhausted (HTTP 429).
    RateLimited,
    /// Any other non-success HTTP status.
    Server,
    /// The body could not be decoded.
    InvalidResponse,
    /// A local file or setting is missing or unusable.
    Configuration,
    /// Something that should not happen.
    Internal,
}

impl ProviderErrorKind {
    /// Short snake_case label used in messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Authentication => "authentication_failed",
            Self::Authorization => "authorization_failed",
            Self::Network => "network_error",
            Self::RateLimited => "rate_limited",
            Self::Server => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::Configuration => "configuration_error",
            Self::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A provider failure, displayed as `[provider] kind: message`.
#[derive(Debug, Error)]
#[error("{}{kind}: {message}", provider_prefix(.provider))]
pub struct ProviderError {
    kind: ProviderErrorKind,
    message: String,
    provider: Option<&'static str>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

fn provider_prefix(provider: &Option<&'static str>) -> String {
    provider.map(|p| format!("[{}] ", p)).unwrap_or_default()
}

macro_rules! kind_constructors {
    ($($(#[$doc:meta])* $name:ident => $kind:ident,)*) => {
        $(
            $(#[$doc])*
            pub fn $name(message: impl Into<String>) -> Self {
                Self::new(ProviderErrorKind::$kind, message)
            }
        )*
    };
}

impl ProviderError {
    /// Creates an error of the given kind.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    kind_constructors! {
        /// Rejected token or token exchange.
        authentication => Authentication,
        /// Access denied.
        authorization => Authorization,
        /// Transport failure.
        network => Network,
        /// Quota exhausted.
        rate_limited => RateLimited,
        /// Unexpected HTTP status.
        server => Server,
        /// Undecodable body.
        invalid_response => InvalidResponse,
        /// Bad local file or setting.
        configuration => Configuration,
        /// Bug or impossible state.
        internal => Internal,
    }

    /// Tags the error with the provider that produced it.
    pub fn with_provider(mut self, provider: &'static str) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Attaches the underlying error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the kind.
    pub fn kind(&self) -> ProviderErrorKind {
        self.kind
    }

    /// Returns the message without the kind or provider prefix.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
