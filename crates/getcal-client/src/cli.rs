//! Command-line interface definition.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use getcal_core::LogFormat;

use crate::error::{ClientError, ClientResult};

/// Layout of the diagnostics written to stderr.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogStyle {
    /// One line per event
    #[default]
    Compact,
    /// Multi-line, easier to read
    Pretty,
    /// One JSON object per event
    Json,
}

impl From<LogStyle> for LogFormat {
    fn from(style: LogStyle) -> Self {
        match style {
            LogStyle::Compact => LogFormat::Compact,
            LogStyle::Pretty => LogFormat::Pretty,
            LogStyle::Json => LogFormat::Json,
        }
    }
}

/// getcal - Copy one day of your Google Calendar to the clipboard
#[derive(Debug, Parser)]
#[command(name = "getcal")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Day to fetch (YYYY-MM-DD), defaults to today in the local timezone
    pub date: Option<String>,

    /// Never open the browser; fail if authorization is required
    #[arg(long)]
    pub non_interactive: bool,

    /// Print the events instead of copying them to the clipboard
    #[arg(long)]
    pub dry_run: bool,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Diagnostics layout on stderr
    #[arg(long, value_enum, default_value_t, env = "GETCAL_LOG_FORMAT")]
    pub log_format: LogStyle,

    /// Path to configuration file
    #[arg(long, short, env = "GETCAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the OAuth client secret file
    #[arg(long, env = "GETCAL_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Path to the stored credential file
    #[arg(long, env = "GETCAL_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,
}

impl Cli {
    /// Returns the requested date, if one was given.
    pub fn target_date(&self) -> ClientResult<Option<NaiveDate>> {
        self.date.as_deref().map(parse_date).transpose()
    }
}

/// Parses an ISO `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> ClientResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| ClientError::InvalidDate {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
