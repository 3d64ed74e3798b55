//! Doctor command logic
//!
//! Checks the development environment without changing it and reports
//! issues with suggestions.

use std::path::Path;

use serde::Serialize;

use crate::config::defaults::{TOOLCHAIN_MANAGER, VIPER_TOOLS_DIR};
use crate::core::platform::{detect_os_family, OsFamily, PackageManager};
use crate::core::toolchain::ToolchainSpec;
use crate::core::viper::{self, InstallStamp};

/// Result of a single dependency check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the dependency being checked
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Version if available
    pub version: Option<String>,
    /// Error message if check failed
    pub error: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
    /// Whether this is a required or optional dependency
    pub required: bool,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, version: Option<String>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            version,
            error: None,
            suggestion: None,
            required,
        }
    }

    /// Create a failing check result
    pub fn fail(name: &str, error: &str, suggestion: Option<&str>, required: bool) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            version: None,
            error: Some(error.to_string()),
            suggestion: suggestion.map(String::from),
            required,
        }
    }
}

/// Overall doctor report
#[derive(Debug, Default)]
pub struct DoctorReport {
    /// Detected OS family
    pub os_family: String,
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Configuration issues found
    pub config_issues: Vec<String>,
}

impl DoctorReport {
    /// Create a new empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a check result
    pub fn add_check(&mut self, result: CheckResult) {
        self.checks.push(result);
    }

    /// Add a configuration issue
    pub fn add_config_issue(&mut self, issue: String) {
        self.config_issues.push(issue);
    }

    /// Check if all checks passed (including optional)
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed) && self.config_issues.is_empty()
    }

    /// Count passed checks
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Get all failed required checks
    pub fn failed_required(&self) -> Vec<&CheckResult> {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .collect()
    }

    /// Overall verdict: `success`, `warning` (only optional problems) or `error`
    pub fn status(&self) -> &'static str {
        if self.all_passed() {
            "success"
        } else if self.failed_required().is_empty() {
            "warning"
        } else {
            "error"
        }
    }
}

/// Check if a command is available in PATH, returning its version
pub fn check_command_available(command: &str) -> Option<String> {
    std::process::Command::new(command)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                extract_version(&format!("{stdout}{stderr}"))
            } else {
                None
            }
        })
}

/// Extract version string from command output
fn extract_version(output: &str) -> Option<String> {
    // Try to find version patterns like "1.2.3" or "v1.2.3"
    let version_regex = regex::Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").ok()?;
    version_regex
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Check the native package manager for `os`
pub fn check_package_manager(os: &OsFamily) -> CheckResult {
    let Some(manager) = os.package_manager() else {
        return CheckResult::fail(
            "Package manager",
            &format!("No supported package manager for '{os}'"),
            Some("Install a C toolchain, pkg-config, OpenSSL headers and a JDK manually (optional)"),
            false,
        );
    };
    let name = format!("Package manager ({})", manager.program());
    if which::which(manager.program()).is_ok() {
        CheckResult::pass(&name, check_command_available(manager.program()), false)
    } else {
        CheckResult::fail(
            &name,
            &format!("{} not found in PATH", manager.program()),
            Some(match manager {
                PackageManager::Homebrew => "Install Homebrew from https://brew.sh (optional)",
                PackageManager::Apt => "Install the native packages manually and use --rustup-only (optional)",
            }),
            false,
        )
    }
}

/// Check rustup availability
pub fn check_rustup() -> CheckResult {
    match check_command_available(TOOLCHAIN_MANAGER) {
        Some(version) => CheckResult::pass("rustup", Some(version), true),
        None => CheckResult::fail(
            "rustup",
            "rustup not found in PATH",
            Some("Install rustup from https://rustup.rs"),
            true,
        ),
    }
}

/// Check Java availability (the Viper backends run on the JVM)
pub fn check_java() -> CheckResult {
    match check_command_available("java") {
        Some(version) => CheckResult::pass("Java", Some(version), true),
        None => CheckResult::fail(
            "Java",
            "java not found in PATH",
            Some("Run 'prusti-setup setup' or install a JDK (11 or newer)"),
            true,
        ),
    }
}

/// Check the Viper tools install under `project_dir`
pub fn check_viper_tools(project_dir: &Path) -> CheckResult {
    let dir = project_dir.join(VIPER_TOOLS_DIR);
    if !dir.is_dir() {
        return CheckResult::fail(
            "Viper tools",
            &format!("{} does not exist", dir.display()),
            Some("Run 'prusti-setup setup'"),
            true,
        );
    }

    let missing = viper::missing_layout(&dir);
    if !missing.is_empty() {
        return CheckResult::fail(
            "Viper tools",
            &format!("{} is incomplete, missing: {}", dir.display(), missing.join(", ")),
            Some("Run 'prusti-setup setup' to reinstall"),
            true,
        );
    }

    let origin = InstallStamp::read(&dir).map(|stamp| stamp.url);
    CheckResult::pass("Viper tools", origin, true)
}

/// Check the toolchain pin file
pub fn check_project_config(project_dir: &Path) -> Vec<String> {
    match ToolchainSpec::load(project_dir) {
        Ok(_) => Vec::new(),
        Err(e) => vec![e.to_string()],
    }
}

/// Run all doctor checks
pub fn run_doctor(project_dir: &Path) -> DoctorReport {
    run_doctor_for(project_dir, &detect_os_family())
}

/// Run all doctor checks as if on `os`
pub fn run_doctor_for(project_dir: &Path, os: &OsFamily) -> DoctorReport {
    let mut report = DoctorReport::new();
    report.os_family = os.to_string();

    // Check required dependencies
    report.add_check(check_rustup());
    report.add_check(check_java());
    report.add_check(check_viper_tools(project_dir));

    // Check optional dependencies
    report.add_check(check_package_manager(os));

    for issue in check_project_config(project_dir) {
        report.add_config_issue(issue);
    }

    report
}
