//! Service lifecycle commands
//!
//! Uses the systemd service manager (`systemctl`): `start`/`stop` run with
//! privilege escalation, `is-active` checks run unprivileged.

use super::{CommandOutcome, CommandSpec};
use crate::validation::ValidatedInput;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deadline for start/stop
pub const SERVICE_CONTROL_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for status checks
pub const SERVICE_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Service operations
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceOperation {
    Start,
    Stop,
}

impl ServiceOperation {
    /// Parse the `action` form field
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
        }
    }
}

/// `<tool> start|stop <service>` under privilege escalation
pub fn control_spec(tool: &str, service: &ValidatedInput, operation: ServiceOperation) -> CommandSpec {
    CommandSpec::new(tool, SERVICE_CONTROL_TIMEOUT)
        .arg(operation.verb())
        .arg(service.as_str())
        .elevated()
}

/// `<tool> is-active <service>`
pub fn status_spec(tool: &str, service: &ValidatedInput) -> CommandSpec {
    CommandSpec::new(tool, SERVICE_STATUS_TIMEOUT)
        .arg("is-active")
        .arg(service.as_str())
}

/// `is-active` exits non-zero for inactive units, so only stdout is inspected
pub fn is_active(outcome: &CommandOutcome) -> bool {
    outcome.stdout.trim() == "active"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RuleKind;

    fn name(text: &str) -> ValidatedInput {
        ValidatedInput::check(text, RuleKind::Identifier).unwrap()
    }

    #[test]
    fn test_control_spec_shape() {
        let spec = control_spec("systemctl", &name("nginx"), ServiceOperation::Stop);
        assert_eq!(spec.program(), "systemctl");
        assert_eq!(spec.arguments(), &["stop".to_string(), "nginx".to_string()]);
        assert!(spec.uses_privilege_escalation());
        assert_eq!(spec.timeout(), SERVICE_CONTROL_TIMEOUT);
    }

    #[test]
    fn test_status_spec_is_unprivileged() {
        let spec = status_spec("systemctl", &name("ssh"));
        assert_eq!(spec.arguments(), &["is-active".to_string(), "ssh".to_string()]);
        assert!(!spec.uses_privilege_escalation());
    }

    #[test]
    fn test_is_active_reads_stdout_only() {
        let active = CommandOutcome::completed("active\n".into(), String::new(), Some(0), Duration::ZERO);
        let inactive = CommandOutcome::completed("inactive\n".into(), String::new(), Some(3), Duration::ZERO);
        let activating = CommandOutcome::completed("activating\n".into(), String::new(), Some(3), Duration::ZERO);

        assert!(is_active(&active));
        assert!(!is_active(&inactive));
        assert!(!is_active(&activating));
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!(ServiceOperation::parse("start"), Some(ServiceOperation::Start));
        assert_eq!(ServiceOperation::parse("stop"), Some(ServiceOperation::Stop));
        assert_eq!(ServiceOperation::parse("restart"), None);
        assert_eq!(ServiceOperation::parse("START"), None);
    }
}
