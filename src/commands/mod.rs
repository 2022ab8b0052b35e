//! Privileged command gateway for hostdeck
//!
//! Control requests are turned into a [`CommandSpec`] only after their
//! parameters pass validation, then run by an [`Execute`] implementation that
//! always resolves to a [`CommandOutcome`].

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::Duration;

pub mod actions;
pub mod executor;
pub mod package_management;
pub mod service_control;

pub use actions::{ActionResult, ControlAction, ControlActions};
pub use executor::CommandExecutor;

/// Failure classes surfaced by the command gateway
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Parameters failed validation; nothing was spawned
    InvalidInput,

    /// Deadline exceeded; the process was killed
    Timeout,

    /// The tool ran and reported failure
    NonZeroExit,

    /// The tool could not be started (missing binary, permission denied)
    SpawnFailure,
}

/// A program invocation built from already validated parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    elevated: bool,
}

impl CommandSpec {
    pub(crate) fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
            elevated: false,
        }
    }

    pub(crate) fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub(crate) fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run through the configured privilege escalation program
    pub(crate) fn elevated(mut self) -> Self {
        self.elevated = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn uses_privilege_escalation(&self) -> bool {
        self.elevated
    }

    /// Human readable command line, for logs only
    pub fn display_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Result of running a [`CommandSpec`]
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Whether the command exited with status zero
    pub succeeded: bool,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Failure class, `None` on success
    pub error_kind: Option<ErrorKind>,

    /// Exit code if the process exited normally
    pub exit_code: Option<i32>,

    /// Wall-clock execution time in milliseconds
    pub execution_time_ms: u64,
}

impl CommandOutcome {
    /// Outcome of a process that ran to completion
    pub fn completed(stdout: String, stderr: String, exit_code: Option<i32>, elapsed: Duration) -> Self {
        let succeeded = exit_code == Some(0);
        Self {
            succeeded,
            stdout,
            stderr,
            error_kind: if succeeded { None } else { Some(ErrorKind::NonZeroExit) },
            exit_code,
            execution_time_ms: elapsed.as_millis() as u64,
        }
    }

    /// Outcome of a process that never ran or never finished
    pub fn failed(kind: ErrorKind, message: String, elapsed: Duration) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: message,
            error_kind: Some(kind),
            exit_code: None,
            execution_time_ms: elapsed.as_millis() as u64,
        }
    }

    /// Stdout followed by stderr, as shown in the terminal view
    pub fn combined_output(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Runs command specs; every failure is folded into the returned outcome
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, spec: &CommandSpec) -> CommandOutcome;
}

/// User-facing failure of a control action
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ActionError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }

    pub fn from_outcome(outcome: &CommandOutcome, message: impl Into<String>) -> Self {
        Self {
            kind: outcome.error_kind.unwrap_or(ErrorKind::NonZeroExit),
            message: message.into(),
        }
    }
}

/// Log a command about to be executed
pub fn log_command_execution(spec: &CommandSpec) {
    if spec.uses_privilege_escalation() {
        info!("Executing elevated command: {}", spec.display_line());
    } else {
        debug!("Executing command: {} (timeout {:?})", spec.display_line(), spec.timeout());
    }
}

/// Log the result of an executed command
pub fn log_command_outcome(spec: &CommandSpec, outcome: &CommandOutcome) {
    match outcome.error_kind {
        None => debug!(
            "Command '{}' completed in {}ms",
            spec.program(),
            outcome.execution_time_ms
        ),
        Some(kind) => warn!(
            "Command '{}' failed ({:?}, exit code {:?}): {}",
            spec.program(),
            kind,
            outcome.exit_code,
            outcome.stderr.trim()
        ),
    }
}
