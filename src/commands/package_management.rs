//! Package management commands for Debian-family hosts
//!
//! Install/remove go through `apt` with privilege escalation; the installed
//! list comes from `dpkg -l`.

use super::CommandSpec;
use crate::validation::ValidatedInput;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Deadline for install/remove; downloads can be slow
pub const PACKAGE_CONTROL_TIMEOUT: Duration = Duration::from_secs(600);

/// Deadline for listing installed packages
pub const PACKAGE_LIST_TIMEOUT: Duration = Duration::from_secs(30);

/// Number of packages shown on the packages page
pub const PACKAGE_LIST_LIMIT: usize = 50;

/// Package operations
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackageOperation {
    Install,
    Remove,
}

impl PackageOperation {
    /// Parse the `action` form field
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "install" => Some(Self::Install),
            "remove" => Some(Self::Remove),
            _ => None,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Remove => "remove",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Self::Install => "installed",
            Self::Remove => "removed",
        }
    }
}

/// `<tool> install|remove -y <package>` under privilege escalation
pub fn control_spec(tool: &str, package: &ValidatedInput, operation: PackageOperation) -> CommandSpec {
    CommandSpec::new(tool, PACKAGE_CONTROL_TIMEOUT)
        .args([operation.verb(), "-y", package.as_str()])
        .elevated()
}

/// `<tool> -l`
pub fn list_spec(tool: &str) -> CommandSpec {
    CommandSpec::new(tool, PACKAGE_LIST_TIMEOUT).arg("-l")
}

/// Parse `dpkg -l` output into package names.
///
/// Only rows with the `ii` (desired install, currently installed) marker
/// count; the name is the second whitespace-separated token.
pub fn parse_dpkg_list(output: &str, limit: usize) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.starts_with("ii"))
        .filter_map(|line| line.split_whitespace().nth(1))
        .take(limit)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RuleKind;

    const DPKG_OUTPUT: &str = "\
Desired=Unknown/Install/Remove/Purge/Hold
| Status=Not/Inst/Conf-files/Unpacked/halF-conf/Half-inst/trig-aWait/Trig-pend
|/ Err?=(none)/Reinst-required (Status,Err: uppercase=bad)
||/ Name           Version      Architecture Description
+++-==============-============-============-=================================
ii  adduser        3.134        all          add and remove users and groups
rc  apache2        2.4.57-2     amd64        Apache HTTP Server
ii  bash           5.2.15-2+b2  amd64        GNU Bourne Again SHell
iU  broken-pkg     1.0          amd64        half configured
ii  libc6:amd64    2.36-9       amd64        GNU C Library: Shared libraries
";

    #[test]
    fn test_parse_dpkg_list_keeps_installed_rows() {
        let packages = parse_dpkg_list(DPKG_OUTPUT, PACKAGE_LIST_LIMIT);
        assert_eq!(packages, vec!["adduser", "bash", "libc6:amd64"]);
    }

    #[test]
    fn test_parse_dpkg_list_applies_limit() {
        let output: String = (0..80)
            .map(|i| format!("ii  pkg{}  1.0  amd64  package {}\n", i, i))
            .collect();

        let packages = parse_dpkg_list(&output, PACKAGE_LIST_LIMIT);
        assert_eq!(packages.len(), 50);
        assert_eq!(packages[0], "pkg0");
        assert_eq!(packages[49], "pkg49");
    }

    #[test]
    fn test_parse_dpkg_list_empty_output_is_empty_success() {
        assert!(parse_dpkg_list("", PACKAGE_LIST_LIMIT).is_empty());
        assert!(parse_dpkg_list("ii\n", PACKAGE_LIST_LIMIT).is_empty());
    }

    #[test]
    fn test_control_spec_shape() {
        let package = ValidatedInput::check("vim", RuleKind::Identifier).unwrap();
        let spec = control_spec("apt", &package, PackageOperation::Install);

        assert_eq!(spec.program(), "apt");
        assert_eq!(spec.arguments(), &["install".to_string(), "-y".to_string(), "vim".to_string()]);
        assert!(spec.uses_privilege_escalation());
    }

    #[test]
    fn test_operation_parsing() {
        assert_eq!(PackageOperation::parse("install"), Some(PackageOperation::Install));
        assert_eq!(PackageOperation::parse("remove"), Some(PackageOperation::Remove));
        assert_eq!(PackageOperation::parse("purge"), None);
    }
}
