//! Client configuration.
//!
//! Settings live in an optional `getcal.toml` next to the `getcal`
//! executable. Every setting has a default, so the file is only needed to
//! move the credential files or to swap the clipboard commands (for example
//! `wl-copy` on Wayland).
//!
//! ```toml
//! [paths]
//! credentials_file = "credentials.json"
//! token_file = "token.json"
//!
//! [oauth]
//! port_range = [8080, 8090]
//!
//! [clipboard]
//! converter = ["textutil", "-convert", "rtf", "-stdin", "-stdout", "-format", "html"]
//! rich_text_copy = ["pbcopy", "-Prefer", "rtf"]
//! plain_text_copy = ["pbcopy"]
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use getcal_providers::google::GoogleConfig;

use crate::clipboard::CommandBackend;
use crate::error::{ClientError, ClientResult};

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "getcal.toml";

/// Configuration for the getcal client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Credential file locations.
    pub paths: PathSettings,

    /// OAuth consent flow settings.
    pub oauth: OAuthSettings,

    /// Clipboard commands.
    pub clipboard: ClipboardSettings,
}

/// Credential file locations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// OAuth client secret file.
    pub credentials_file: Option<PathBuf>,

    /// Stored credential file.
    pub token_file: Option<PathBuf>,
}

/// OAuth consent flow settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSettings {
    /// Inclusive port range for the loopback callback listener.
    pub port_range: (u16, u16),
}

impl Default for OAuthSettings {
    fn default() -> Self {
        Self {
            port_range: (8080, 8090),
        }
    }
}

/// External commands used to reach the clipboard, as argv arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardSettings {
    /// Reads HTML on stdin, writes rich text on stdout.
    pub converter: Vec<String>,

    /// Reads rich text on stdin and puts it on the clipboard.
    pub rich_text_copy: Vec<String>,

    /// Reads plain text on stdin and puts it on the clipboard.
    pub plain_text_copy: Vec<String>,
}

impl Default for ClipboardSettings {
    fn default() -> Self {
        let argv = |args: &[&str]| args.iter().map(|s| s.to_string()).collect();
        Self {
            converter: argv(&[
                "textutil", "-convert", "rtf", "-stdin", "-stdout", "-format", "html",
            ]),
            rich_text_copy: argv(&["pbcopy", "-Prefer", "rtf"]),
            plain_text_copy: argv(&["pbcopy"]),
        }
    }
}

impl ClipboardSettings {
    /// Builds the process-based clipboard backend.
    pub fn backend(&self) -> ClientResult<CommandBackend> {
        for (name, argv) in [
            ("converter", &self.converter),
            ("rich_text_copy", &self.rich_text_copy),
            ("plain_text_copy", &self.plain_text_copy),
        ] {
            if argv.first().is_none_or(|program| program.is_empty()) {
                return Err(ClientError::Config(format!(
                    "clipboard.{} must name a program",
                    name
                )));
            }
        }

        Ok(CommandBackend::new(
            self.converter.clone(),
            self.rich_text_copy.clone(),
            self.plain_text_copy.clone(),
        ))
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!(path = %path.display(), "no configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Self = toml::from_str(&content).map_err(|e| {
            ClientError::Config(format!("failed to parse {}: {}", path.display(), e))
        })?;

        if let Some(dir) = path.parent() {
            config.paths.resolve_relative_to(dir);
        }
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> ClientResult<PathBuf> {
        Ok(install_dir()?.join(CONFIG_FILE))
    }

    /// Builds the Google settings. Explicit overrides win over the file,
    /// the file wins over files in `install_dir`.
    pub fn google_config(
        &self,
        install_dir: &Path,
        credentials_file: Option<PathBuf>,
        token_file: Option<PathBuf>,
    ) -> ClientResult<GoogleConfig> {
        let credentials = credentials_file
            .or_else(|| self.paths.credentials_file.clone())
            .unwrap_or_else(|| install_dir.join(GoogleConfig::CLIENT_SECRET_FILE));
        let token = token_file
            .or_else(|| self.paths.token_file.clone())
            .unwrap_or_else(|| install_dir.join(GoogleConfig::TOKEN_FILE));

        let (start, end) = self.oauth.port_range;
        let config = GoogleConfig::new(credentials, token).with_loopback_port_range(start, end);
        config.validate().map_err(ClientError::Config)?;
        Ok(config)
    }
}

impl PathSettings {
    fn resolve_relative_to(&mut self, dir: &Path) {
        for path in [&mut self.credentials_file, &mut self.token_file]
            .into_iter()
            .flatten()
        {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }
}

/// Directory containing the running executable.
pub fn install_dir() -> ClientResult<PathBuf> {
    let exe = std::env::current_exe()?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ClientError::Config(format!(
            "cannot determine directory of {}",
            exe.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.oauth.port_range, (8080, 8090));
        assert_eq!(config.clipboard.plain_text_copy, vec!["pbcopy".to_string()]);
    }

    #[test]
    fn parse_all_sections() {
        let config: ClientConfig = toml::from_str(
            r#"
[paths]
credentials_file = "/etc/getcal/credentials.json"

[oauth]
port_range = [9000, 9005]

[clipboard]
converter = ["pandoc", "-f", "html", "-t", "rtf"]
rich_text_copy = ["xclip", "-selection", "clipboard", "-t", "text/rtf"]
plain_text_copy = ["xclip", "-selection", "clipboard"]
"#,
        )
        .unwrap();

        assert_eq!(
            config.paths.credentials_file,
            Some(PathBuf::from("/etc/getcal/credentials.json"))
        );
        assert!(config.paths.token_file.is_none());
        assert_eq!(config.oauth.port_range, (9000, 9005));
        assert_eq!(config.clipboard.converter[0], "pandoc");
        assert_eq!(config.clipboard.plain_text_copy.len(), 3);
    }

    #[test]
    fn unknown_section_is_ignored() {
        let config: ClientConfig = toml::from_str("[display]\nwidth = 3\n").unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn load_from_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "[paths]\ncredentials_file = \"secrets/client.json\"\ntoken_file = \"/var/lib/getcal/token.json\"\n",
        )
        .unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(
            config.paths.credentials_file,
            Some(dir.path().join("secrets/client.json"))
        );
        assert_eq!(
            config.paths.token_file,
            Some(PathBuf::from("/var/lib/getcal/token.json"))
        );
    }

    #[test]
    fn load_from_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = ClientConfig::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ClientError::Config(_)));

        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[oauth]\nport_range = \"all\"\n").unwrap();
        let invalid = ClientConfig::load_from(&path).unwrap_err();
        assert!(invalid.to_string().contains("failed to parse"));
    }

    #[test]
    fn google_config_precedence() {
        let install = Path::new("/opt/getcal");
        let config = ClientConfig {
            paths: PathSettings {
                credentials_file: Some(PathBuf::from("/etc/getcal/credentials.json")),
                token_file: None,
            },
            ..ClientConfig::default()
        };

        let google = config.google_config(install, None, None).unwrap();
        assert_eq!(
            google.client_secret_path,
            PathBuf::from("/etc/getcal/credentials.json")
        );
        assert_eq!(google.token_path, PathBuf::from("/opt/getcal/token.json"));
        assert_eq!(google.loopback_port_range, (8080, 8090));

        let google = config
            .google_config(install, Some(PathBuf::from("/tmp/c.json")), Some(PathBuf::from("/tmp/t.json")))
            .unwrap();
        assert_eq!(google.client_secret_path, PathBuf::from("/tmp/c.json"));
        assert_eq!(google.token_path, PathBuf::from("/tmp/t.json"));
    }

    #[test]
    fn google_config_rejects_reversed_ports() {
        let config = ClientConfig {
            oauth: OAuthSettings {
                port_range: (9000, 8000),
            },
            ..ClientConfig::default()
        };
        let err = config
            .google_config(Path::new("/opt/getcal"), None, None)
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn clipboard_backend_requires_programs() {
        assert!(ClipboardSettings::default().backend().is_ok());

        let settings = ClipboardSettings {
            converter: vec![],
            ..ClipboardSettings::default()
        };
        let err = settings.backend().unwrap_err();
        assert!(err.to_string().contains("clipboard.converter"));
    }
}
