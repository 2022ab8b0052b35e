//! Named control actions
//!
//! Each [`ControlAction`] validates its parameters, builds a [`CommandSpec`],
//! hands it to the executor and maps the outcome to an [`ActionResult`].
//! Validation failures return before anything is spawned.

use super::package_management::{self, PackageOperation, PACKAGE_LIST_LIMIT};
use super::service_control::{self, ServiceOperation};
use super::{ActionError, CommandExecutor, CommandOutcome, CommandSpec, ErrorKind, Execute};
use crate::config::ToolConfig;
use crate::validation::{RuleKind, ValidatedInput};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;

/// Deadline for network and web vulnerability scans
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(300);

/// Deadline for ad-hoc shell lines
pub const SHELL_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for reading the system log
pub const LOG_TAIL_TIMEOUT: Duration = Duration::from_secs(10);

/// Lines shown by the log view
pub const LOG_TAIL_LINES: usize = 100;

/// Supported scanners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTool {
    /// Network scanner, `nmap -sS <target>`
    Nmap,
    /// Web vulnerability scanner, `nikto -h <target>`
    Nikto,
}

impl ScanTool {
    /// Parse the `tool` form field
    pub fn parse(tool: &str) -> Option<Self> {
        match tool {
            "nmap" => Some(Self::Nmap),
            "nikto" => Some(Self::Nikto),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nmap => "nmap",
            Self::Nikto => "nikto",
        }
    }
}

/// Every operation the dashboard can run on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    ServiceControl { service: String, operation: ServiceOperation },
    ServiceStatus { service: String },
    PackageControl { package: String, operation: PackageOperation },
    PackageList,
    Scan { tool: ScanTool, target: String },
    Shell { command: String },
    LogTail,
}

impl ControlAction {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::ServiceControl { .. } => "service-control",
            Self::ServiceStatus { .. } => "service-status",
            Self::PackageControl { .. } => "package-control",
            Self::PackageList => "package-list",
            Self::Scan { .. } => "scan",
            Self::Shell { .. } => "shell",
            Self::LogTail => "log-tail",
        }
    }
}

/// Successful result of a control action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionResult {
    /// A state change finished; carries the confirmation message
    Completed(String),
    /// Raw tool output
    Output(String),
    /// Result of a service status check
    Active(bool),
    /// Installed package names
    Packages(Vec<String>),
    /// Log lines, oldest first
    Lines(Vec<String>),
}

fn checked(text: &str, kind: RuleKind, what: &str) -> Result<ValidatedInput, ActionError> {
    ValidatedInput::check(text, kind).ok_or_else(|| {
        warn!("Rejected {}: {:?}", what, text);
        ActionError::invalid_input(format!("Invalid {}", what))
    })
}

/// Runs [`ControlAction`]s through an executor
pub struct ControlActions<E = CommandExecutor> {
    executor: E,
    tools: ToolConfig,
    syslog_path: PathBuf,
    scan_timeout: Duration,
}

impl<E: Execute> ControlActions<E> {
    pub fn new(executor: E, tools: ToolConfig, syslog_path: PathBuf) -> Self {
        Self {
            executor,
            tools,
            syslog_path,
            scan_timeout: SCAN_TIMEOUT,
        }
    }

    /// Replace the [`SCAN_TIMEOUT`] deadline given to scanners
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Validate an action's parameters and build its command
    pub fn plan(&self, action: &ControlAction) -> Result<CommandSpec, ActionError> {
        let spec = match action {
            ControlAction::ServiceControl { service, operation } => {
                let service = checked(service, RuleKind::Identifier, "service name")?;
                service_control::control_spec(&self.tools.service_manager, &service, *operation)
            }
            ControlAction::ServiceStatus { service } => {
                let service = checked(service, RuleKind::Identifier, "service name")?;
                service_control::status_spec(&self.tools.service_manager, &service)
            }
            ControlAction::PackageControl { package, operation } => {
                let package = checked(package, RuleKind::Identifier, "package name")?;
                package_management::control_spec(&self.tools.package_manager, &package, *operation)
            }
            ControlAction::PackageList => package_management::list_spec(&self.tools.package_lister),
            ControlAction::Scan { tool, target } => {
                let target = checked(target, RuleKind::ScanTarget, "target")?;
                match tool {
                    ScanTool::Nmap => CommandSpec::new(&self.tools.network_scanner, self.scan_timeout)
                        .args(["-sS", target.as_str()]),
                    ScanTool::Nikto => CommandSpec::new(&self.tools.web_scanner, self.scan_timeout)
                        .args(["-h", target.as_str()]),
                }
            }
            ControlAction::Shell { command } => {
                let command = checked(command, RuleKind::ShellLine, "command")?;
                audit_shell_command(command.as_str());
                CommandSpec::new(&self.tools.shell, SHELL_TIMEOUT)
                    .arg("-c")
                    .arg(command.as_str())
            }
            ControlAction::LogTail => CommandSpec::new(&self.tools.log_reader, LOG_TAIL_TIMEOUT)
                .args(["-n".to_string(), LOG_TAIL_LINES.to_string()])
                .arg(self.syslog_path.to_string_lossy()),
        };

        Ok(spec)
    }

    /// Validate, execute and report a single action
    pub async fn run(&self, action: ControlAction) -> Result<ActionResult, ActionError> {
        let spec = self.plan(&action)?;
        let outcome = self.executor.execute(&spec).await;
        report(&action, outcome)
    }

    /// Check every service in `services`, keeping the given order
    pub async fn service_statuses(&self, services: &[String]) -> Vec<(String, bool)> {
        let mut statuses = Vec::with_capacity(services.len());
        for service in services {
            let action = ControlAction::ServiceStatus {
                service: service.clone(),
            };
            let active = matches!(self.run(action).await, Ok(ActionResult::Active(true)));
            statuses.push((service.clone(), active));
        }
        statuses
    }
}

/// Map a command outcome to the action's user-facing result
fn report(action: &ControlAction, outcome: CommandOutcome) -> Result<ActionResult, ActionError> {
    match action {
        ControlAction::ServiceControl { service, operation } => {
            if outcome.succeeded {
                info!("Service {} {}", service, operation.past_tense());
                Ok(ActionResult::Completed(format!(
                    "Service {} {}",
                    service,
                    operation.past_tense()
                )))
            } else {
                error!(
                    "Failed to {} service {}: {}",
                    operation.verb(),
                    service,
                    outcome.stderr.trim()
                );
                Err(ActionError::from_outcome(
                    &outcome,
                    format!("Failed to {} service", operation.verb()),
                ))
            }
        }
        ControlAction::ServiceStatus { .. } => {
            Ok(ActionResult::Active(service_control::is_active(&outcome)))
        }
        ControlAction::PackageControl { package, operation } => {
            if outcome.succeeded {
                info!("Package {} {}", package, operation.past_tense());
                Ok(ActionResult::Completed(format!(
                    "Package {} {}",
                    package,
                    operation.past_tense()
                )))
            } else {
                error!(
                    "Failed to {} package {}: {}",
                    operation.verb(),
                    package,
                    outcome.stderr.trim()
                );
                Err(ActionError::from_outcome(
                    &outcome,
                    format!("Failed to {} package", operation.verb()),
                ))
            }
        }
        ControlAction::PackageList => match outcome.error_kind {
            None | Some(ErrorKind::NonZeroExit) => Ok(ActionResult::Packages(
                package_management::parse_dpkg_list(&outcome.stdout, PACKAGE_LIST_LIMIT),
            )),
            Some(_) => Err(ActionError::from_outcome(&outcome, "Failed to list packages")),
        },
        ControlAction::Scan { tool, .. } => match outcome.error_kind {
            None | Some(ErrorKind::NonZeroExit) => Ok(ActionResult::Output(outcome.stdout)),
            Some(_) => {
                error!("{} error: {}", tool.name(), outcome.stderr);
                Err(ActionError::from_outcome(
                    &outcome,
                    format!("Error: {}", outcome.stderr),
                ))
            }
        },
        ControlAction::Shell { .. } => match outcome.error_kind {
            None | Some(ErrorKind::NonZeroExit) => Ok(ActionResult::Output(outcome.combined_output())),
            Some(_) => {
                error!("Terminal error: {}", outcome.stderr);
                Err(ActionError::from_outcome(&outcome, outcome.stderr.clone()))
            }
        },
        ControlAction::LogTail => {
            if outcome.succeeded {
                Ok(ActionResult::Lines(
                    outcome.stdout.lines().map(str::to_string).collect(),
                ))
            } else {
                error!("Failed to read logs: {}", outcome.stderr.trim());
                Err(ActionError::from_outcome(&outcome, "Error reading logs"))
            }
        }
    }
}

/// Audit trail for ad-hoc shell lines
fn audit_shell_command(command: &str) {
    warn!("===== SHELL COMMAND AUDIT =====");
    warn!("Timestamp: {}", chrono::Utc::now().to_rfc3339());
    warn!("Command: {}", command);
    warn!("Timeout: {} seconds", SHELL_TIMEOUT.as_secs());
}
