//! Viper tools bundle
//!
//! Selects the bundle for the host, and records what was installed in a
//! stamp file inside `viper_tools/` so re-runs can skip the download.
//! The verifier finds its backends and the Z3 solver under that directory,
//! so a layout check guards every install.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defaults::{VIPER_TOOLS_DIR, VIPER_TOOLS_REQUIRED_DIRS, VIPER_TOOLS_STAMP};
use crate::config::urls;
use crate::core::platform::OsFamily;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Where the bundle comes from and where it goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    /// Archive URL
    pub url: String,
    /// Directory that receives the extracted bundle
    pub destination_dir: PathBuf,
}

impl DownloadTarget {
    /// Target for `project_dir`, using `url_override` when given
    pub fn for_project(project_dir: &Path, os: &OsFamily, url_override: Option<&str>) -> Self {
        Self {
            url: url_override.map_or_else(|| default_url(os).to_string(), ToString::to_string),
            destination_dir: project_dir.join(VIPER_TOOLS_DIR),
        }
    }
}

/// Pinned bundle URL for an OS family
///
/// Unsupported families get the Linux bundle, except Windows which has its
/// own.
pub fn default_url(os: &OsFamily) -> &'static str {
    match os {
        OsFamily::MacOS => urls::VIPER_TOOLS_MACOS,
        OsFamily::Unsupported(name) if name == "windows" => urls::VIPER_TOOLS_WINDOWS,
        OsFamily::Linux | OsFamily::Unsupported(_) => urls::VIPER_TOOLS_LINUX,
    }
}

/// Record of a completed install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallStamp {
    /// URL the archive was downloaded from
    pub url: String,
    /// SHA256 of the archive
    pub sha256: String,
}

impl InstallStamp {
    /// Read the stamp in `dir`, `None` if absent or unreadable
    pub fn read(dir: &Path) -> Option<Self> {
        let content = filesystem::read_file(&dir.join(VIPER_TOOLS_STAMP)).ok()?;
        toml::from_str(&content).ok()
    }

    /// Write the stamp into `dir`
    pub fn write(&self, dir: &Path) -> Result<(), FilesystemError> {
        let path = dir.join(VIPER_TOOLS_STAMP);
        let content = toml::to_string(self).map_err(|e| FilesystemError::WriteFile {
            path: path.clone(),
            error: e.to_string(),
        })?;
        filesystem::write_file(&path, &content)
    }

    /// Whether this stamp describes the install `url`/`expected_sha256` asks for
    pub fn matches(&self, url: &str, expected_sha256: Option<&str>) -> bool {
        self.url == url && expected_sha256.map_or(true, |sha| self.sha256.eq_ignore_ascii_case(sha))
    }
}

/// Required bundle entries missing from `dir`
pub fn missing_layout(dir: &Path) -> Vec<String> {
    VIPER_TOOLS_REQUIRED_DIRS
        .iter()
        .filter(|entry| !dir.join(entry).is_dir())
        .map(ToString::to_string)
        .collect()
}

/// Whether `dir` already holds the requested bundle
pub fn is_installed(dir: &Path, url: &str, expected_sha256: Option<&str>) -> bool {
    InstallStamp::read(dir).is_some_and(|stamp| stamp.matches(url, expected_sha256))
        && missing_layout(dir).is_empty()
}
