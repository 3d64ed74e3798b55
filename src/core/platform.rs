//! Host OS detection and native dependency tables
//!
//! The OS family is detected once per run and every phase branches on the
//! closed [`OsFamily`] enum instead of probing the host again.

use std::fmt;
use std::path::Path;

use crate::config::defaults::{LINUX_PACKAGES, MACOS_PACKAGES};
use crate::infra::process::ShellCommand;

/// Host OS family as far as native package installation is concerned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OsFamily {
    /// apt-based Linux (Debian, Ubuntu and derivatives)
    Linux,
    /// macOS with Homebrew
    MacOS,
    /// Anything else; native packages must be installed by hand
    Unsupported(String),
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsFamily::Linux => write!(f, "linux-debian-like"),
            OsFamily::MacOS => write!(f, "macos"),
            OsFamily::Unsupported(s) => write!(f, "{s}"),
        }
    }
}

impl OsFamily {
    /// Native packages required on this family, `None` when unsupported
    pub fn native_dependencies(&self) -> Option<&'static [&'static str]> {
        match self {
            OsFamily::Linux => Some(LINUX_PACKAGES),
            OsFamily::MacOS => Some(MACOS_PACKAGES),
            OsFamily::Unsupported(_) => None,
        }
    }

    /// Package manager used on this family
    pub fn package_manager(&self) -> Option<PackageManager> {
        match self {
            OsFamily::Linux => Some(PackageManager::Apt),
            OsFamily::MacOS => Some(PackageManager::Homebrew),
            OsFamily::Unsupported(_) => None,
        }
    }
}

/// Detect the OS family of the running host
pub fn detect_os_family() -> OsFamily {
    let os_release = std::fs::read_to_string("/etc/os-release").ok();
    classify(
        std::env::consts::OS,
        os_release.as_deref(),
        Path::new("/etc/debian_version").exists(),
    )
}

/// Classify an OS name plus Linux distribution hints
pub fn classify(os: &str, os_release: Option<&str>, has_debian_version: bool) -> OsFamily {
    match os {
        "macos" => OsFamily::MacOS,
        "linux" if has_debian_version || os_release.is_some_and(is_debian_like) => OsFamily::Linux,
        "linux" => {
            let distro = os_release
                .and_then(|content| os_release_field(content, "ID"))
                .unwrap_or_else(|| "unknown".to_string());
            OsFamily::Unsupported(format!("linux-{distro}"))
        }
        other => OsFamily::Unsupported(other.to_string()),
    }
}

fn is_debian_like(os_release: &str) -> bool {
    ["ID", "ID_LIKE"].iter().any(|key| {
        os_release_field(os_release, key).is_some_and(|value| {
            value
                .split_whitespace()
                .any(|id| id == "debian" || id == "ubuntu")
        })
    })
}

/// Value of `key` in an os-release file, unquoted
fn os_release_field(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (k, v) = line.split_once('=')?;
        (k.trim() == key).then(|| v.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
    })
}

/// OS package managers the bootstrapper drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// Debian/Ubuntu `apt-get`
    Apt,
    /// macOS Homebrew
    Homebrew,
}

impl PackageManager {
    /// Executable name
    pub fn program(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Homebrew => "brew",
        }
    }

    /// Whether this package manager needs root privileges
    pub fn needs_root(self) -> bool {
        matches!(self, PackageManager::Apt)
    }

    /// Commands that install `packages`, in order
    ///
    /// Both managers treat an already-installed package as success, so the
    /// plan can be re-run safely.
    pub fn install_commands(self, packages: &[&str], elevate: bool) -> Vec<ShellCommand> {
        match self {
            PackageManager::Apt => vec![
                ShellCommand::new(self.program())
                    .arg("update")
                    .elevated(elevate),
                ShellCommand::new(self.program())
                    .args(["install", "-y"])
                    .args(packages.iter().copied())
                    .elevated(elevate),
            ],
            PackageManager::Homebrew => vec![ShellCommand::new(self.program())
                .arg("install")
                .args(packages.iter().copied())],
        }
    }
}
