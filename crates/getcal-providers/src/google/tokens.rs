//! The stored Google credential.
//!
//! `token.json` holds one [`TokenInfo`]: the access token, the refresh token,
//! the expiry and the scopes, plus the client id and secret that obtained
//! them. Keeping the client alongside lets a refresh succeed even after the
//! client secret file has been moved away.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderResult};

use super::config::OAuthCredentials;

/// An access token this close to its expiry is already considered expired.
const EXPIRY_MARGIN: Duration = Duration::seconds(60);

/// Body of a successful token endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present on consent; Google omits it on most refreshes.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Seconds until `access_token` expires.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Space separated.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenGrant {
    pub fn scopes(&self) -> Option<Vec<String>> {
        let scope = self.scope.as_deref()?;
        Some(scope.split_whitespace().map(String::from).collect())
    }

    fn expiry(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in.map(|secs| now + Duration::seconds(secs))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// `None` when Google did not say; such a token is never considered expired.
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    pub last_refresh: DateTime<Utc>,
}

impl TokenInfo {
    /// Builds the credential from a consent grant. Google may leave out the
    /// granted scopes, in which case the requested ones are recorded.
    pub fn from_grant(grant: TokenGrant, requested_scopes: &[String]) -> Self {
        let now = Utc::now();
        Self {
            expires_at: grant.expiry(now),
            scopes: grant
                .scopes()
                .unwrap_or_else(|| requested_scopes.to_vec()),
            access_token: grant.access_token,
            refresh_token: grant.refresh_token,
            client_id: None,
            client_secret: None,
            last_refresh: now,
        }
    }

    pub fn with_client(self, credentials: &OAuthCredentials) -> Self {
        Self {
            client_id: Some(credentials.client_id.clone()),
            client_secret: Some(credentials.client_secret.clone()),
            ..self
        }
    }

    /// The client that obtained this credential, when both halves are stored.
    pub fn client(&self) -> Option<OAuthCredentials> {
        let id = self.client_id.as_deref().filter(|id| !id.is_empty())?;
        let secret = self.client_secret.as_deref().filter(|s| !s.is_empty())?;
        Some(OAuthCredentials::new(id, secret))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now + EXPIRY_MARGIN >= expires_at)
    }

    pub fn has_scopes(&self, wanted: &[String]) -> bool {
        wanted.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Empty strings count as missing.
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Folds a refresh response in. The refresh token and scopes only change
    /// when the response carries new ones.
    pub fn apply_refresh(&mut self, grant: TokenGrant) {
        let now = Utc::now();
        self.expires_at = grant.expiry(now);
        if let Some(scopes) = grant.scopes() {
            self.scopes = scopes;
        }
        if let Some(rotated) = grant.refresh_token {
            self.refresh_token = Some(rotated);
        }
        self.access_token = grant.access_token;
        self.last_refresh = now;
    }
}

/// The token file. Writes go through a sibling temp file and a rename, so a
/// crash never leaves a half-written credential behind.
#[derive(Debug, Clone)]
pub struct TokenStorage {
    path: PathBuf,
}

impl TokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Ok(None)` when there is no file yet.
    pub fn load(&self) -> ProviderResult<Option<TokenInfo>> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no stored credential");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error("read", e)),
        };

        let token = serde_json::from_str(&json).map_err(|e| {
            ProviderError::configuration(format!(
                "{} is not a stored credential: {}",
                self.path.display(),
                e
            ))
        })?;
        debug!(path = %self.path.display(), "stored credential loaded");
        Ok(Some(token))
    }

    /// Replaces the file with `token`, readable by the owner only.
    pub fn save(&self, token: &TokenInfo) -> ProviderResult<()> {
        let json = serde_json::to_vec_pretty(token)
            .map_err(|e| ProviderError::internal("cannot encode credential").with_source(e))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| self.io_error("create directory for", e))?;
        }

        let staging = self.staging_path();
        let _ = fs::remove_file(&staging);
        write_private(&staging, &json).map_err(|e| self.io_error("write", e))?;
        if let Err(e) = fs::rename(&staging, &self.path) {
            let _ = fs::remove_file(&staging);
            return Err(self.io_error("replace", e));
        }

        debug!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, action: &str, e: io::Error) -> ProviderError {
        ProviderError::configuration(format!(
            "cannot {} {}: {}",
            action,
            self.path.display(),
            e
        ))
        .with_source(e)
    }
}

fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";

    fn consent(expires_in: Option<i64>) -> TokenGrant {
        TokenGrant {
            access_token: "ya29.first".into(),
            refresh_token: Some("1//refresh".into()),
            expires_in,
            scope: None,
        }
    }

    #[test]
    fn consent_grant_falls_back_to_requested_scopes() {
        let token = TokenInfo::from_grant(consent(Some(3599)), &[SCOPE.to_string()]);
        assert_eq!(token.refresh_token(), Some("1//refresh"));
        assert_eq!(token.scopes, vec![SCOPE.to_string()]);
        assert!(!token.is_expired());

        let granted = TokenGrant {
            scope: Some(format!("openid {}", SCOPE)),
            ..consent(None)
        };
        let token = TokenInfo::from_grant(granted, &[]);
        assert_eq!(token.scopes, vec!["openid".to_string(), SCOPE.to_string()]);
        assert!(token.has_scopes(&[SCOPE.to_string()]));
        assert!(!token.has_scopes(&["https://www.googleapis.com/auth/calendar".to_string()]));
    }

    #[test]
    fn expiry_uses_a_minute_of_margin() {
        let expires_at = Utc.with_ymd_and_hms(2025, 2, 5, 12, 0, 0).unwrap();
        let token = TokenInfo {
            expires_at: Some(expires_at),
            ..TokenInfo::from_grant(consent(None), &[])
        };

        assert!(!token.is_expired_at(expires_at - Duration::seconds(61)));
        assert!(token.is_expired_at(expires_at - Duration::seconds(60)));
        assert!(token.is_expired_at(expires_at + Duration::hours(1)));

        let open_ended = TokenInfo::from_grant(consent(None), &[]);
        assert!(!open_ended.is_expired_at(expires_at + Duration::days(365)));
    }

    #[test]
    fn refresh_keeps_what_google_leaves_out() {
        let mut token = TokenInfo::from_grant(consent(Some(5)), &[SCOPE.to_string()]);
        assert!(token.is_expired());

        token.apply_refresh(TokenGrant {
            access_token: "ya29.second".into(),
            expires_in: Some(3599),
            ..TokenGrant::default()
        });
        assert_eq!(token.access_token, "ya29.second");
        assert_eq!(token.refresh_token(), Some("1//refresh"));
        assert_eq!(token.scopes, vec![SCOPE.to_string()]);
        assert!(!token.is_expired());

        token.apply_refresh(TokenGrant {
            access_token: "ya29.third".into(),
            refresh_token: Some("1//rotated".into()),
            ..TokenGrant::default()
        });
        assert_eq!(token.refresh_token(), Some("1//rotated"));
        assert_eq!(token.expires_at, None);
    }

    #[test]
    fn client_needs_id_and_secret() {
        let token = TokenInfo::from_grant(consent(None), &[]);
        assert_eq!(token.client(), None);

        let creds = OAuthCredentials::new("7.apps.googleusercontent.com", "shh");
        let token = token.with_client(&creds);
        assert_eq!(token.client(), Some(creds));

        let half = TokenInfo {
            client_secret: Some(String::new()),
            ..token
        };
        assert_eq!(half.client(), None);
    }

    #[test]
    fn storage_roundtrip_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("nested/token.json"));
        assert_eq!(storage.load().unwrap(), None);

        let token = TokenInfo::from_grant(consent(Some(3599)), &[SCOPE.to_string()]);
        storage.save(&token).unwrap();
        assert_eq!(storage.load().unwrap(), Some(token.clone()));

        let names: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["token.json"]);

        let rewritten = TokenInfo {
            access_token: "ya29.second".into(),
            ..token
        };
        storage.save(&rewritten).unwrap();
        assert_eq!(storage.load().unwrap(), Some(rewritten));
    }

    #[cfg(unix)]
    #[test]
    fn storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let storage = TokenStorage::new(dir.path().join("token.json"));
        storage.save(&TokenInfo::from_grant(consent(None), &[])).unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn unreadable_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, r#"{"access_token": 1"#).unwrap();

        let err = TokenStorage::new(&path).load().unwrap_err();
        assert!(err.message().contains("not a stored credential"));
    }
}
