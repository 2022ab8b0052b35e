//! Bounded subprocess execution
//!
//! Programs are spawned directly, never through a shell, with their output
//! captured and their runtime capped by the command's timeout.

use super::{log_command_execution, log_command_outcome, CommandOutcome, CommandSpec, ErrorKind, Execute};
use async_trait::async_trait;
use log::{error, warn};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Default privilege escalation program
pub const DEFAULT_ESCALATION_PROGRAM: &str = "sudo";

/// Runs elevated tools under their own deadline, since a root process
/// cannot be killed from an unprivileged dashboard
pub const DEFAULT_DEADLINE_PROGRAM: &str = "timeout";

/// How long a killed child gets to be reaped before it is abandoned
const REAP_GRACE: Duration = Duration::from_secs(2);

/// Executor that runs command specs as child processes
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    escalation_program: String,
    escalation_args: Vec<String>,
    deadline_program: Option<String>,
}

impl CommandExecutor {
    /// Create an executor escalating with `sudo -n`, which fails instead of
    /// prompting when no password-less rule exists
    pub fn new() -> Self {
        Self::with_escalation(DEFAULT_ESCALATION_PROGRAM, vec!["-n".to_string()])
    }

    /// Create an executor with a custom escalation wrapper
    pub fn with_escalation(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            escalation_program: program.into(),
            escalation_args: args,
            deadline_program: Some(DEFAULT_DEADLINE_PROGRAM.to_string()),
        }
    }

    /// Program wrapping elevated commands as `<program> -k <grace> <timeout>`,
    /// or `None` to rely on the executor's own kill
    pub fn with_deadline_program(mut self, program: Option<String>) -> Self {
        self.deadline_program = program;
        self
    }

    /// Build the process for a spec, prefixing the escalation wrapper if needed
    fn build_command(&self, spec: &CommandSpec) -> Command {
        let mut cmd = if spec.uses_privilege_escalation() {
            let mut cmd = Command::new(&self.escalation_program);
            cmd.args(&self.escalation_args);
            if let Some(deadline) = &self.deadline_program {
                cmd.arg(deadline)
                    .arg("-k")
                    .arg(format!("{}s", REAP_GRACE.as_secs()))
                    .arg(format!("{}s", spec.timeout().as_secs_f64()));
            }
            cmd.arg(spec.program());
            cmd
        } else {
            Command::new(spec.program())
        };

        cmd.args(spec.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }

    fn spawned_program<'a>(&'a self, spec: &'a CommandSpec) -> &'a str {
        if spec.uses_privilege_escalation() {
            &self.escalation_program
        } else {
            spec.program()
        }
    }

    async fn run(&self, spec: &CommandSpec) -> CommandOutcome {
        let start_time = Instant::now();

        let mut child = match self.build_command(spec).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn '{}': {}", self.spawned_program(spec), e);
                return CommandOutcome::failed(
                    ErrorKind::SpawnFailure,
                    format!("Failed to start {}: {}", self.spawned_program(spec), e),
                    start_time.elapsed(),
                );
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let result = tokio::time::timeout(spec.timeout(), async {
            tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr))
        })
        .await;

        match result {
            Ok((Ok(status), stdout, stderr)) => {
                CommandOutcome::completed(stdout, stderr, status.code(), start_time.elapsed())
            }
            Ok((Err(e), _, _)) => {
                error!("Failed to wait for '{}': {}", spec.program(), e);
                CommandOutcome::failed(
                    ErrorKind::SpawnFailure,
                    format!("Failed to wait for {}: {}", spec.program(), e),
                    start_time.elapsed(),
                )
            }
            Err(_) => {
                warn!(
                    "Command '{}' timed out after {:?}, killing PID {:?}",
                    spec.program(),
                    spec.timeout(),
                    child.id()
                );

                if let Err(e) = child.start_kill() {
                    warn!("Failed to kill timed out process: {}", e);
                }
                if !reap(&mut child, REAP_GRACE).await {
                    warn!(
                        "Process {:?} still running {:?} after kill, abandoning it",
                        child.id(),
                        REAP_GRACE
                    );
                }

                CommandOutcome::failed(
                    ErrorKind::Timeout,
                    format!("Command timed out after {} seconds", spec.timeout().as_secs_f64()),
                    start_time.elapsed(),
                )
            }
        }
    }
}

impl Default for CommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Execute for CommandExecutor {
    async fn execute(&self, spec: &CommandSpec) -> CommandOutcome {
        log_command_execution(spec);
        let outcome = self.run(spec).await;
        log_command_outcome(spec, &outcome);
        outcome
    }
}

/// Wait up to `grace` for `child` to exit; false if it is still running
async fn reap(child: &mut Child, grace: Duration) -> bool {
    matches!(tokio::time::timeout(grace, child.wait()).await, Ok(Ok(_)))
}

/// Drain a child's output stream, lossily decoded
async fn read_stream<R>(stream: Option<R>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        if let Err(e) = stream.read_to_end(&mut buf).await {
            warn!("Failed to read command output: {}", e);
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
