//! Prusti setup - development environment bootstrapper
//!
//! Prepares a machine for building and running the Prusti verifier:
//! installs native dependencies, fetches the Viper tools bundle into the
//! project tree and configures the pinned Rust toolchain through rustup.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Setup phases and environment checks
//! - [`infra`] - Infrastructure layer (network, archives, filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
