//! Best-effort user notifications.

use std::process::Command;
use tracing::{error, info, warn};

/// How urgent a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Routine progress.
    Normal,
    /// A failure the user must look at.
    Critical,
}

/// Sink for user-facing notifications.
///
/// Notifying never fails from the caller's point of view: a broken notifier
/// must not hide the outcome it was reporting.
pub trait Notifier {
    /// Sends a notification.
    fn notify(&self, message: &str, severity: Severity);
}

/// Desktop notifications through `notify-send`.
#[derive(Debug, Clone)]
pub struct DesktopNotifier {
    program: String,
}

impl DesktopNotifier {
    /// Creates a notifier using `notify-send`.
    pub fn new() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }

    /// Overrides the program.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        let mut command = Command::new(&self.program);
        if severity == Severity::Critical {
            command.args(["-u", "critical"]);
        }
        match command.arg(message).status() {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(program = %self.program, %status, "notification failed"),
            Err(e) => warn!(program = %self.program, error = %e, "notification failed"),
        }
    }
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Normal => info!("{message}"),
            Severity::Critical => error!("{message}"),
        }
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, message: &str, severity: Severity) {
        (**self).notify(message, severity);
    }
}
