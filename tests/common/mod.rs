//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Toolchain channel pinned by [`TestProject::with_pin_file`]
pub const CHANNEL: &str = "nightly-2023-06-15";

/// Test project context
///
/// Creates a temporary project root and provides utilities for setting up
/// test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create a project pinning [`CHANNEL`] through a plain `rust-toolchain` file
    pub fn with_pin_file() -> Self {
        let project = Self::new();
        project.create_file("rust-toolchain", &format!("{CHANNEL}\n"));
        project
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Sorted names of the project root entries
    pub fn entries(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.dir.path())
            .expect("Failed to list project")
            .map(|e| {
                e.expect("Failed to read entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    /// Run the binary with `args` against this project
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_prusti-setup"))
            .current_dir(self.dir.path())
            .env_remove("PRUSTI_SETUP_PROJECT_DIR")
            .env_remove("PRUSTI_SETUP_VIPER_TOOLS_URL")
            .env_remove("PRUSTI_SETUP_VIPER_TOOLS_SHA256")
            .args(args)
            .output()
            .expect("Failed to execute prusti-setup")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a zip archive holding `entries`, each with a small payload
pub fn zip_bundle(entries: &[&str]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for name in entries {
        writer.start_file(*name, options).expect("Failed to start zip entry");
        writer.write_all(b"payload").expect("Failed to write zip entry");
    }
    writer
        .finish()
        .expect("Failed to finish zip archive")
        .into_inner()
}

/// A Viper tools bundle with the expected layout
pub fn viper_bundle() -> Vec<u8> {
    zip_bundle(&["backends/silicon.jar", "z3/bin/z3", "boogie/Boogie"])
}

/// Combined stdout and stderr
pub fn combined(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}
