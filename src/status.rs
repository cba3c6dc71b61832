//! Status line shown to the user.

use std::io::Write;

/// How a status message should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Informational, detection not running
    Neutral,
    /// Detection running, guidance is current
    Live,
    /// Something failed and needs user action
    Error,
}

/// A status message plus its severity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub severity: Severity,
}

impl Status {
    pub fn neutral(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Neutral,
        }
    }

    pub fn live(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Live,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Receives status updates from the detection loop.
pub trait StatusSink {
    fn update(&mut self, status: &Status);

    /// Toggle the "request in flight" indicator.
    fn set_busy(&mut self, _busy: bool) {}
}

/// Prints status changes as single lines.
///
/// Repeated identical updates are printed once.
pub struct ConsoleStatus<W: Write> {
    out: W,
    last: Option<Status>,
}

impl ConsoleStatus<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleStatus<W> {
    pub fn new(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StatusSink for ConsoleStatus<W> {
    fn update(&mut self, status: &Status) {
        if self.last.as_ref() == Some(status) {
            return;
        }
        let tag = match status.severity {
            Severity::Neutral => "     ",
            Severity::Live => "LIVE ",
            Severity::Error => "ERROR",
        };
        let _ = writeln!(self.out, "[{}] {}", tag, status.message);
        let _ = self.out.flush();
        self.last = Some(status.clone());
    }
}
