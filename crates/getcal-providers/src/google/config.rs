//! Where the Google credentials live and what to ask Google for.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// The desktop OAuth client registered by the user in Google Cloud Console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Suffix every Google OAuth client id carries.
const CLIENT_ID_SUFFIX: &str = ".apps.googleusercontent.com";

/// Layouts of the downloaded client secret file.
///
/// The console wraps the pair in an `installed` (desktop) or `web` object;
/// hand-written files often put it at the top level.
#[derive(Deserialize)]
#[serde(untagged)]
enum ClientSecretFile {
    Flat(ClientPair),
    Wrapped {
        installed: Option<ClientPair>,
        web: Option<ClientPair>,
    },
}

#[derive(Deserialize)]
struct ClientPair {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads and checks a client secret file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, String> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| format!("cannot read file: {}", e))?;
        Self::from_json(&json)
    }

    /// Parses a client secret document in any of the accepted layouts.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let file: ClientSecretFile =
            serde_json::from_str(json).map_err(|e| format!("cannot parse JSON: {}", e))?;

        let pair = match file {
            ClientSecretFile::Flat(pair) => pair,
            ClientSecretFile::Wrapped { installed, web } => installed.or(web).ok_or_else(|| {
                "expected client_id and client_secret, at the top level or under \
                 \"installed\" or \"web\""
                    .to_string()
            })?,
        };

        let credentials = Self::new(pair.client_id, pair.client_secret);
        credentials.validate()?;
        Ok(credentials)
    }

    /// Rejects empty values and ids that are not Google client ids.
    pub fn validate(&self) -> Result<(), String> {
        if !self.client_id.ends_with(CLIENT_ID_SUFFIX) || self.client_id == CLIENT_ID_SUFFIX {
            return Err(format!(
                "client_id {:?} is not a Google OAuth client id (expected *{})",
                self.client_id, CLIENT_ID_SUFFIX
            ));
        }
        if self.client_secret.trim().is_empty() {
            return Err("client_secret is empty".to_string());
        }
        Ok(())
    }
}

/// Settings for one getcal run against Google Calendar.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// Downloaded client secret; only ever read.
    pub client_secret_path: PathBuf,
    /// Stored credential; rewritten after every refresh or consent.
    pub token_path: PathBuf,
    pub calendar_id: String,
    pub user_agent: String,
    /// Inclusive range tried for the consent callback listener.
    pub loopback_port_range: (u16, u16),
    pub scopes: Vec<String>,
}

impl GoogleConfig {
    /// Read-only access to calendars and events.
    pub const DEFAULT_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";
    pub const CLIENT_SECRET_FILE: &'static str = "credentials.json";
    pub const TOKEN_FILE: &'static str = "token.json";

    pub fn new(client_secret_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            client_secret_path: client_secret_path.into(),
            token_path: token_path.into(),
            calendar_id: "primary".to_string(),
            user_agent: concat!("getcal/", env!("CARGO_PKG_VERSION")).to_string(),
            loopback_port_range: (8080, 8090),
            scopes: vec![Self::DEFAULT_SCOPE.to_string()],
        }
    }

    /// Both files under their default names in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self::new(dir.join(Self::CLIENT_SECRET_FILE), dir.join(Self::TOKEN_FILE))
    }

    pub fn with_loopback_port_range(mut self, first: u16, last: u16) -> Self {
        self.loopback_port_range = (first, last);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        let (first, last) = self.loopback_port_range;
        if first > last {
            return Err(format!("loopback port range {}-{} is empty", first, last));
        }
        if self.scopes.is_empty() {
            return Err("no OAuth scope configured".to_string());
        }
        Ok(())
    }
}
