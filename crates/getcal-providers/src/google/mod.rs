//! Google Calendar access.
//!
//! - [`OAuthCredentials`] / [`GoogleConfig`]: the client secret file and the
//!   locations and settings used by the rest of the module
//! - [`TokenInfo`] / [`TokenStorage`]: the persisted credential
//! - [`OAuthClient`]: the PKCE loopback consent flow and token refresh
//! - [`CredentialManager`]: decides between reuse, refresh and consent
//! - [`GoogleCalendarClient`]: the `events.list` query for one day
//!
//! # Example
//!
//! ```ignore
//! use getcal_providers::google::{CredentialManager, GoogleCalendarClient, GoogleConfig, OAuthClient};
//!
//! let config = GoogleConfig::in_dir(install_dir);
//! let flow = OAuthClient::new(&config.user_agent, config.loopback_port_range)?;
//! let manager = CredentialManager::new(config, flow);
//!
//! let token = manager.obtain_credentials(true).await?;
//! let client = GoogleCalendarClient::from_token(&token, "primary", "getcal")?;
//! let events = client.list_day(&window).await?;
//! ```

mod client;
mod config;
mod credentials;
mod oauth;
mod tokens;

pub use client::GoogleCalendarClient;
pub use config::{GoogleConfig, OAuthCredentials};
pub use credentials::{CredentialError, CredentialManager};
pub use oauth::{OAuthClient, OAuthFlow, PkceFlow};
pub use tokens::{TokenGrant, TokenInfo, TokenStorage};
