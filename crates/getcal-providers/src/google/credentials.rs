//! Credential lifecycle: load, refresh or authorize.
//!
//! [`CredentialManager::obtain_credentials`] walks the stored credential
//! through these states:
//!
//! ```text
//! stored token ──valid──────────────────────────────▶ return as is
//!      │
//!      ├─expired + refresh token ──refresh ok──▶ save, return
//!      │                              │
//!      │                              └─failed─┐
//!      ▼                                       ▼
//! no usable token ──non-interactive──▶ ConsentRequired
//!      │
//!      └─interactive──▶ client secret ──▶ consent flow ──▶ save, return
//! ```

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::ProviderError;

use super::config::{GoogleConfig, OAuthCredentials};
use super::oauth::OAuthFlow;
use super::tokens::{TokenInfo, TokenStorage};

/// Why no usable credential could be produced.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The client secret file needed for authorization is absent.
    #[error(
        "client secret file not found at {path}; download the OAuth desktop client secret \
         from Google Cloud Console and save it there"
    )]
    MissingClientSecret {
        /// Expected location.
        path: String,
    },

    /// The client secret file exists but cannot be used.
    #[error("invalid client secret file {path}: {reason}")]
    InvalidClientSecret {
        /// File location.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Consent is needed but interactive authorization was disabled.
    #[error("{}", consent_message(.refresh_failure))]
    ConsentRequired {
        /// Error text of the refresh attempt that was made first, if any.
        refresh_failure: Option<String>,
    },

    /// The interactive authorization flow failed.
    #[error("authorization failed: {0}")]
    Authorization(#[source] ProviderError),

    /// The credential could not be written.
    #[error("failed to store credential: {0}")]
    Storage(#[source] ProviderError),
}

fn consent_message(refresh_failure: &Option<String>) -> String {
    let base = "authorization required; run again without --non-interactive to grant access";
    match refresh_failure {
        Some(reason) => format!("{} (token refresh failed: {})", base, reason),
        None => base.to_string(),
    }
}

/// What the stored credential allows.
#[derive(Debug)]
enum StoredState {
    /// No credential file, or one that could not be read.
    Missing,
    /// Usable as is.
    Valid(TokenInfo),
    /// Expired, but carries a refresh token.
    Refreshable(TokenInfo),
    /// Present but useless: expired without refresh token, or scopes too narrow.
    Unusable(&'static str),
}

/// Produces a usable access token from disk, a refresh or user consent.
#[derive(Debug)]
pub struct CredentialManager<F> {
    config: GoogleConfig,
    storage: TokenStorage,
    flow: F,
}

impl<F: OAuthFlow> CredentialManager<F> {
    /// Creates a manager storing its credential at `config.token_path`.
    pub fn new(config: GoogleConfig, flow: F) -> Self {
        let storage = TokenStorage::new(&config.token_path);
        Self {
            config,
            storage,
            flow,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }

    /// Returns a credential that is valid for the configured scopes.
    ///
    /// Refreshing is attempted even when `interactive` is false; only the
    /// browser consent flow is gated by it.
    pub async fn obtain_credentials(
        &self,
        interactive: bool,
    ) -> Result<TokenInfo, CredentialError> {
        let mut refresh_failure = None;

        match self.classify() {
            StoredState::Valid(token) => {
                debug!("using stored credential");
                return Ok(token);
            }
            StoredState::Refreshable(token) => match self.refresh(token).await {
                Ok(token) => return Ok(token),
                Err(reason) => {
                    warn!(error = %reason, "token refresh failed");
                    refresh_failure = Some(reason);
                }
            },
            StoredState::Unusable(reason) => debug!(reason, "stored credential not usable"),
            StoredState::Missing => debug!("no stored credential"),
        }

        if !interactive {
            return Err(CredentialError::ConsentRequired { refresh_failure });
        }

        let client = self.load_client_secret()?;
        let token = self
            .flow
            .authorize(&client, &self.config.scopes)
            .await
            .map_err(CredentialError::Authorization)?;

        self.storage.save(&token).map_err(CredentialError::Storage)?;
        info!(path = %self.storage.path().display(), "stored new credential");
        Ok(token)
    }

    fn classify(&self) -> StoredState {
        let token = match self.storage.load() {
            Ok(Some(token)) => token,
            Ok(None) => return StoredState::Missing,
            Err(e) => {
                warn!(error = %e, "ignoring unreadable credential file");
                return StoredState::Missing;
            }
        };

        if !token.has_scopes(&self.config.scopes) {
            return StoredState::Unusable("missing required scope");
        }
        if !token.is_expired() {
            return StoredState::Valid(token);
        }
        if token.refresh_token().is_some() {
            StoredState::Refreshable(token)
        } else {
            StoredState::Unusable("expired without refresh token")
        }
    }

    /// Refreshes and persists `token`. Errors are returned as text since a
    /// failed refresh only feeds into the consent decision.
    async fn refresh(&self, mut token: TokenInfo) -> Result<TokenInfo, String> {
        let client = match token.client() {
            Some(client) => client,
            None => self.load_client_secret().map_err(|e| e.to_string())?,
        };
        let refresh_token = token
            .refresh_token()
            .ok_or_else(|| "no refresh token".to_string())?
            .to_string();

        debug!("refreshing expired access token");
        let grant = self
            .flow
            .refresh(&client, &refresh_token)
            .await
            .map_err(|e| e.to_string())?;

        token.apply_refresh(grant);
        if token.client().is_none() {
            token = token.with_client(&client);
        }

        self.storage.save(&token).map_err(|e| e.to_string())?;
        info!(path = %self.storage.path().display(), "stored refreshed credential");
        Ok(token)
    }

    fn load_client_secret(&self) -> Result<OAuthCredentials, CredentialError> {
        let path = &self.config.client_secret_path;
        if !path.exists() {
            return Err(CredentialError::MissingClientSecret {
                path: path.display().to_string(),
            });
        }
        OAuthCredentials::from_file(path).map_err(|reason| CredentialError::InvalidClientSecret {
            path: path.display().to_string(),
            reason,
        })
    }
}
