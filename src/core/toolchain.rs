//! Toolchain pin file and rustup command plan
//!
//! The project pins its compiler in `rust-toolchain` (or
//! `rust-toolchain.toml`). Two forms are accepted:
//!
//! ```text
//! nightly-2023-06-15
//! ```
//!
//! ```toml
//! [toolchain]
//! channel = "nightly-2023-06-15"
//! components = ["rustc-dev", "llvm-tools-preview"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::defaults::{
    OPTIONAL_FORMATTER_COMPONENT, REQUIRED_COMPONENTS, TOOLCHAIN_MANAGER, TOOLCHAIN_PIN_FILE,
    TOOLCHAIN_PIN_FILE_TOML,
};
use crate::error::PinFileError;
use crate::infra::process::ShellCommand;

/// Toolchain requested by the pin file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainSpec {
    /// Channel or version, passed to rustup verbatim
    pub channel: String,
    /// Extra components listed in the pin file
    pub components: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct PinFile {
    toolchain: Option<PinToolchain>,
}

#[derive(Debug, Deserialize)]
struct PinToolchain {
    channel: Option<String>,
    #[serde(default)]
    components: Vec<String>,
}

impl ToolchainSpec {
    /// Load the pin file from `project_dir`
    ///
    /// `rust-toolchain` wins over `rust-toolchain.toml`, matching rustup.
    pub fn load(project_dir: &Path) -> Result<(Self, PathBuf), PinFileError> {
        let candidates = [
            project_dir.join(TOOLCHAIN_PIN_FILE),
            project_dir.join(TOOLCHAIN_PIN_FILE_TOML),
        ];

        let Some(path) = candidates.iter().find(|p| p.is_file()) else {
            return Err(PinFileError::Missing {
                searched: candidates.to_vec(),
            });
        };

        let content = std::fs::read_to_string(path).map_err(|e| PinFileError::Read {
            path: path.clone(),
            error: e.to_string(),
        })?;

        let spec = Self::parse(&content, path)?;
        Ok((spec, path.clone()))
    }

    /// Parse pin file content; `path` is only used in errors
    pub fn parse(content: &str, path: &Path) -> Result<Self, PinFileError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(PinFileError::Empty {
                path: path.to_path_buf(),
            });
        }

        if trimmed.contains('[') || trimmed.contains('=') {
            return Self::parse_toml(trimmed, path);
        }

        let mut lines = trimmed
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));
        let channel = lines.next().ok_or_else(|| PinFileError::Empty {
            path: path.to_path_buf(),
        })?;

        if channel.contains(char::is_whitespace) || lines.next().is_some() {
            return Err(PinFileError::Parse {
                path: path.to_path_buf(),
                error: "expected a single channel or version name".to_string(),
            });
        }

        Ok(Self {
            channel: channel.to_string(),
            components: BTreeSet::new(),
        })
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self, PinFileError> {
        let pin: PinFile = toml::from_str(content).map_err(|e| PinFileError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let toolchain = pin.toolchain.ok_or_else(|| PinFileError::MissingChannel {
            path: path.to_path_buf(),
        })?;
        let channel = toolchain
            .channel
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PinFileError::MissingChannel {
                path: path.to_path_buf(),
            })?;

        Ok(Self {
            channel,
            components: toolchain
                .components
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
        })
    }

    /// Components whose installation failure aborts setup
    ///
    /// The built-in set plus anything the pin file lists, minus the
    /// optional formatter.
    pub fn required_components(&self) -> BTreeSet<String> {
        REQUIRED_COMPONENTS
            .iter()
            .map(ToString::to_string)
            .chain(self.components.iter().cloned())
            .filter(|c| c != OPTIONAL_FORMATTER_COMPONENT)
            .collect()
    }

    /// `rustup toolchain install <channel>`
    pub fn install_command(&self) -> ShellCommand {
        ShellCommand::new(TOOLCHAIN_MANAGER).args(["toolchain", "install", self.channel.as_str()])
    }

    /// `rustup component add --toolchain <channel> <component>`
    pub fn component_command(&self, component: &str) -> ShellCommand {
        ShellCommand::new(TOOLCHAIN_MANAGER).args([
            "component",
            "add",
            "--toolchain",
            self.channel.as_str(),
            component,
        ])
    }
}
