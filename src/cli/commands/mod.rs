//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod doctor;
pub mod setup;

use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install native dependencies, Viper tools and the pinned toolchain
    Setup(SetupArgs),

    /// Check the development environment without changing it
    Doctor,
}

/// Arguments of `prusti-setup setup`
#[derive(Args, Debug, Clone, Default)]
pub struct SetupArgs {
    /// Only configure the Rust toolchain (skip native packages and Viper tools)
    #[arg(long)]
    pub rustup_only: bool,

    /// Print every mutating step instead of executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Download Viper tools from this URL instead of the pinned release
    #[arg(long, env = "PRUSTI_SETUP_VIPER_TOOLS_URL")]
    pub viper_tools_url: Option<String>,

    /// Expected SHA256 of the Viper tools archive
    #[arg(long, env = "PRUSTI_SETUP_VIPER_TOOLS_SHA256")]
    pub viper_tools_sha256: Option<String>,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, project_dir: &Path) -> Result<()> {
        match self {
            Self::Setup(args) => setup::execute(project_dir, args).await,
            Self::Doctor => doctor::execute(project_dir).await,
        }
    }
}
