//! Clipboard publishing.
//!
//! The rendered day goes to the clipboard as rich text when the HTML can be
//! converted, and as plain text otherwise:
//!
//! 1. convert HTML to RTF, write it with the rich text format hint
//! 2. on a missing converter, a failed conversion or a failed rich write,
//!    warn and write the plain text
//! 3. a failed plain write is fatal, as is a missing clipboard program
//!    during the rich write (the plain write would use it too)
//!
//! Process invocation sits behind [`ClipboardBackend`].

use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

use thiserror::Error;
use tracing::{debug, warn};

/// Errors from clipboard helper programs.
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// The program is not installed.
    #[error("`{tool}` not found")]
    ToolMissing {
        /// Program name.
        tool: String,
    },

    /// The program ran and failed.
    #[error("`{tool}` failed ({status}): {stderr}")]
    ToolFailed {
        /// Program name.
        tool: String,
        /// Exit status description.
        status: String,
        /// First line of its stderr.
        stderr: String,
    },

    /// Talking to the program failed.
    #[error("`{tool}` I/O error: {source}")]
    Io {
        /// Program name.
        tool: String,
        /// Underlying error.
        #[source]
        source: io::Error,
    },
}

/// Format hint for a clipboard write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardFormat {
    /// RTF bytes.
    RichText,
    /// UTF-8 text.
    PlainText,
}

/// Access to the system's converter and clipboard.
pub trait ClipboardBackend {
    /// Converts an HTML document to rich text bytes.
    fn convert_html_to_rich_text(&self, html: &str) -> Result<Vec<u8>, ClipboardError>;

    /// Puts `payload` on the clipboard.
    fn write(&self, payload: &[u8], format: ClipboardFormat) -> Result<(), ClipboardError>;
}

/// What ended up on the clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Rich text was written.
    RichText,
    /// Plain text was written after rich text failed.
    PlainText {
        /// Why rich text was skipped.
        reason: String,
    },
}

impl PublishOutcome {
    /// Returns true if the run fell back to plain text.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::PlainText { .. })
    }
}

/// Writes rendered output to the clipboard with the plain text fallback.
#[derive(Debug)]
pub struct ClipboardWriter<B> {
    backend: B,
}

impl<B: ClipboardBackend> ClipboardWriter<B> {
    /// Creates a writer over `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Publishes `html` as rich text, or `plain` if that is not possible.
    pub fn publish(&self, plain: &str, html: &str) -> Result<PublishOutcome, ClipboardError> {
        let reason = match self.try_rich_text(html) {
            Ok(()) => {
                debug!("copied rich text");
                return Ok(PublishOutcome::RichText);
            }
            Err(RichTextFailure::Fatal(e)) => return Err(e),
            Err(RichTextFailure::Degrade(e)) => e.to_string(),
        };

        warn!(reason = %reason, "rich text unavailable, copying plain text");
        self.backend
            .write(plain.as_bytes(), ClipboardFormat::PlainText)?;
        Ok(PublishOutcome::PlainText { reason })
    }

    fn try_rich_text(&self, html: &str) -> Result<(), RichTextFailure> {
        let rtf = self
            .backend
            .convert_html_to_rich_text(html)
            .map_err(RichTextFailure::Degrade)?;

        match self.backend.write(&rtf, ClipboardFormat::RichText) {
            Ok(()) => Ok(()),
            Err(e @ ClipboardError::ToolMissing { .. }) => Err(RichTextFailure::Fatal(e)),
            Err(e) => Err(RichTextFailure::Degrade(e)),
        }
    }
}

enum RichTextFailure {
    Degrade(ClipboardError),
    Fatal(ClipboardError),
}

/// Runs external programs, `textutil` and `pbcopy` by default.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    converter: Vec<String>,
    rich_text_copy: Vec<String>,
    plain_text_copy: Vec<String>,
}

impl CommandBackend {
    /// Creates a backend from argv arrays. Each must have a program name.
    pub fn new(
        converter: Vec<String>,
        rich_text_copy: Vec<String>,
        plain_text_copy: Vec<String>,
    ) -> Self {
        Self {
            converter,
            rich_text_copy,
            plain_text_copy,
        }
    }
}

impl ClipboardBackend for CommandBackend {
    fn convert_html_to_rich_text(&self, html: &str) -> Result<Vec<u8>, ClipboardError> {
        run(&self.converter, html.as_bytes())
    }

    fn write(&self, payload: &[u8], format: ClipboardFormat) -> Result<(), ClipboardError> {
        let argv = match format {
            ClipboardFormat::RichText => &self.rich_text_copy,
            ClipboardFormat::PlainText => &self.plain_text_copy,
        };
        run(argv, payload).map(|_| ())
    }
}

/// Runs `argv` with `input` on stdin and returns its stdout.
fn run(argv: &[String], input: &[u8]) -> Result<Vec<u8>, ClipboardError> {
    let (program, args) = argv.split_first().ok_or_else(|| ClipboardError::ToolMissing {
        tool: String::new(),
    })?;
    let io_err = |source| ClipboardError::Io {
        tool: program.clone(),
        source,
    };

    debug!(program, ?args, "running clipboard helper");
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ClipboardError::ToolMissing {
                tool: program.clone(),
            },
            _ => io_err(e),
        })?;

    // stdin is fed from its own thread: a filter like `cat` writes output
    // while still reading, and both pipes would fill up otherwise.
    let stdin = child.stdin.take();
    let (output, written) = thread::scope(|scope| {
        let writer = stdin.map(|mut pipe| scope.spawn(move || pipe.write_all(input)));
        let output = child.wait_with_output();
        let written = match writer {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
            None => Ok(()),
        };
        (output, written)
    });

    let output = output.map_err(io_err)?;
    if !output.status.success() {
        return Err(failed(program, output.status, &output.stderr));
    }
    match written {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(io_err(e)),
        _ => Ok(output.stdout),
    }
}

fn failed(program: &str, status: ExitStatus, stderr: &[u8]) -> ClipboardError {
    let stderr = String::from_utf8_lossy(stderr);
    ClipboardError::ToolFailed {
        tool: program.to_string(),
        status: status.to_string(),
        stderr: stderr.lines().next().unwrap_or_default().trim().to_string(),
    }
}
