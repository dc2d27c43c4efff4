//! The day command: fetch one day, render it, copy it.

use std::io::Write;

use chrono::NaiveDate;
use tracing::{debug, info};

use getcal_core::{DayWindow, LocalZone, RenderedOutput};
use getcal_providers::EventSource;
use getcal_providers::google::{CredentialManager, GoogleCalendarClient, OAuthClient};

use crate::cli::Cli;
use crate::clipboard::{ClipboardBackend, ClipboardWriter};
use crate::config::{ClientConfig, install_dir};
use crate::error::{ClientError, ClientResult};

/// Where the rendered day goes.
pub enum Output<'a, B> {
    /// Print the plain text to stdout.
    DryRun,
    /// Publish to the clipboard.
    Clipboard(&'a ClipboardWriter<B>),
}

/// Runs the whole pipeline for the parsed command line.
pub async fn run(cli: Cli, config: &ClientConfig) -> ClientResult<()> {
    let zone = LocalZone::detect_or_utc();
    let date = match cli.target_date()? {
        Some(date) => date,
        None => zone.today(),
    };
    debug!(%date, zone = zone.name(), "resolved target day");

    let google = config.google_config(&install_dir()?, cli.credentials_file, cli.token_file)?;
    let flow = OAuthClient::new(&google.user_agent, google.loopback_port_range)
        .map_err(ClientError::HttpSetup)?;
    let manager = CredentialManager::new(google, flow);
    let token = manager.obtain_credentials(!cli.non_interactive).await?;

    let google = manager.config();
    let source = GoogleCalendarClient::from_token(&token, &google.calendar_id, &google.user_agent)
        .map_err(ClientError::HttpSetup)?;

    let writer;
    let output = if cli.dry_run {
        Output::DryRun
    } else {
        writer = ClipboardWriter::new(config.clipboard.backend()?);
        Output::Clipboard(&writer)
    };

    let mut stdout = std::io::stdout().lock();
    fetch_and_publish(&source, &zone, date, output, &mut stdout).await?;
    Ok(())
}

/// Fetches the events of `date`, writes the summary line and delivers the
/// rendering. Returns the number of events.
pub async fn fetch_and_publish<S, B>(
    source: &S,
    zone: &LocalZone,
    date: NaiveDate,
    output: Output<'_, B>,
    out: &mut dyn Write,
) -> ClientResult<usize>
where
    S: EventSource,
    B: ClipboardBackend,
{
    let window = DayWindow::for_date(date, zone)?;
    debug!(
        date = %window.date(),
        start = %window.start(),
        end = %window.end(),
        hours = window.elapsed().num_hours(),
        "query window"
    );
    let events = source.fetch_day(&window).await?;
    let rendered = RenderedOutput::render(&events, zone);
    let count = events.len();

    writeln!(out, "Fetched {} event(s) for {}:", count, date)?;
    match output {
        Output::DryRun => writeln!(out, "{}", rendered.text)?,
        Output::Clipboard(writer) => {
            let outcome = writer.publish(&rendered.text, &rendered.html)?;
            info!(degraded = outcome.is_degraded(), "clipboard updated");
            writeln!(out, "Copied {} event(s) for {} to clipboard.", count, date)?;
        }
    }

    Ok(count)
}
