//! Error types for prusti-setup
//!
//! Domain-specific error types using thiserror. Each setup phase surfaces
//! one [`SetupError`] variant that names the phase and wraps the
//! underlying error.

use std::path::PathBuf;
use thiserror::Error;

/// External process errors
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Program is not on PATH
    #[error("'{program}' not found in PATH")]
    NotFound { program: String },

    /// Process could not be started
    #[error("Failed to run '{command}': {error}")]
    SpawnFailed { command: String, error: String },

    /// Process exited unsuccessfully
    #[error("'{command}' exited with {}: {stderr}", code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Download errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Network error
    #[error("Network error downloading '{url}': {error}")]
    NetworkError { url: String, error: String },

    /// Server answered with a non-success status
    #[error("Server returned HTTP {status} for '{url}'")]
    HttpStatus { url: String, status: u16 },

    /// Response body was empty
    #[error("Downloaded archive from '{url}' is empty")]
    EmptyBody { url: String },

    /// Checksum verification failed
    #[error("Checksum mismatch for '{file}': expected {expected}, got {actual}")]
    ChecksumFailed {
        file: String,
        expected: String,
        actual: String,
    },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },

    /// Max retries exceeded
    #[error("Download failed after {retries} retries: {url}")]
    MaxRetriesExceeded { url: String, retries: u32 },
}

/// Archive extraction errors
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Archive could not be read or is corrupt
    #[error("Corrupt or unreadable archive '{archive}': {error}")]
    Corrupt { archive: PathBuf, error: String },

    /// Archive format not recognised from its name
    #[error("Unsupported archive format for '{name}' (expected .zip or .tar.gz)")]
    UnsupportedFormat { name: String },

    /// Extracted bundle lacks expected entries
    #[error("Extracted Viper tools in '{dir}' are incomplete, missing: {}", missing.join(", "))]
    IncompleteLayout { dir: PathBuf, missing: Vec<String> },

    /// IO error
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove a file or directory
    #[error("Failed to remove '{path}': {error}")]
    Remove { path: PathBuf, error: String },

    /// Failed to rename
    #[error("Failed to move '{from}' to '{to}': {error}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },
}

/// Toolchain pin file errors
#[derive(Error, Debug)]
pub enum PinFileError {
    /// Neither pin file exists
    #[error("Toolchain pin file not found (looked for {})", searched.iter().map(|p| format!("'{}'", p.display())).collect::<Vec<_>>().join(", "))]
    Missing { searched: Vec<PathBuf> },

    /// Pin file exists but names nothing
    #[error("Toolchain pin file '{path}' is empty")]
    Empty { path: PathBuf },

    /// Pin file could not be parsed
    #[error("Failed to parse toolchain pin file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// TOML form without a channel
    #[error("Toolchain pin file '{path}' has no [toolchain] channel")]
    MissingChannel { path: PathBuf },

    /// Pin file could not be read
    #[error("Failed to read toolchain pin file '{path}': {error}")]
    Read { path: PathBuf, error: String },
}

/// Toolchain manager configuration errors
#[derive(Error, Debug)]
pub enum ToolchainConfigError {
    /// Pin file problem
    #[error(transparent)]
    PinFile(#[from] PinFileError),

    /// Toolchain manager missing
    #[error("Toolchain manager '{program}' not found in PATH. Install it from https://rustup.rs")]
    ManagerNotFound { program: String },

    /// Requested channel could not be installed
    #[error("Toolchain '{channel}' is unavailable: {error}")]
    ToolchainUnavailable { channel: String, error: String },

    /// Required component could not be installed
    #[error("Component '{component}' is unavailable for toolchain '{channel}': {error}")]
    ComponentUnavailable {
        channel: String,
        component: String,
        error: String,
    },
}

/// Top-level setup error; the first fatal error aborts the run
#[derive(Error, Debug)]
pub enum SetupError {
    /// Phase 2 failure
    #[error("Native dependency installation failed: {0}")]
    NativeInstall(#[source] ProcessError),

    /// Phase 3 download failure
    #[error("Viper tools download failed: {0}")]
    Download(#[from] DownloadError),

    /// Phase 3 extraction failure
    #[error("Viper tools extraction failed: {0}")]
    Extract(#[from] ExtractError),

    /// Phase 3 filesystem failure outside extraction
    #[error("Viper tools installation failed: {0}")]
    Filesystem(#[from] FilesystemError),

    /// Phase 4 failure
    #[error("Toolchain configuration failed: {0}")]
    ToolchainConfig(#[from] ToolchainConfigError),

    /// Run interrupted by the user
    #[error("Interrupted during phase '{phase}'; re-run setup to continue")]
    Interrupted { phase: String },
}

impl From<PinFileError> for SetupError {
    fn from(e: PinFileError) -> Self {
        Self::ToolchainConfig(ToolchainConfigError::PinFile(e))
    }
}
