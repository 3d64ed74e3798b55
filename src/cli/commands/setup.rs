//! CLI command for `prusti-setup setup`
//!
//! Builds the run configuration from the flags, drives the bootstrapper and
//! renders its report.

use std::path::Path;

use anyhow::Result;

use super::SetupArgs;
use crate::cli::output::{
    create_download_bar, is_json, is_quiet, print_detail, print_info, print_success,
    print_warning, status,
};
use crate::core::setup::{self, Bootstrapper, PhaseOutcome, RunConfig, SetupReport};
use crate::infra::download::ProgressCallback;
use crate::infra::process::RecordingExecutor;

/// Execute the setup command
pub async fn execute(project_dir: &Path, args: SetupArgs) -> Result<()> {
    let config = RunConfig {
        rustup_only: args.rustup_only,
        dry_run: args.dry_run,
        project_dir: project_dir.to_path_buf(),
        viper_tools_url: args.viper_tools_url,
        viper_tools_sha256: args.viper_tools_sha256,
    };
    tracing::debug!("Setup configuration: {config:?}");

    if config.dry_run {
        // Actions are collected instead of echoed when JSON or quiet output is requested
        let executor = if is_json() || is_quiet() {
            RecordingExecutor::new()
        } else {
            RecordingExecutor::echoing()
        };
        let report = Bootstrapper::new(&config, &executor).run().await?;
        render(&report, &executor.recorded());
        return Ok(());
    }

    let bar = create_download_bar();
    let progress_bar = bar.clone();
    let progress: ProgressCallback = Box::new(move |downloaded, total| {
        if total > 0 {
            progress_bar.set_length(total);
        }
        progress_bar.set_position(downloaded);
    });

    let result = setup::run_with_progress(&config, Some(progress)).await;
    bar.finish_and_clear();

    render(&result?, &[]);
    Ok(())
}

fn render(report: &SetupReport, actions: &[String]) {
    if is_json() {
        let json_result = serde_json::json!({
            "status": if report.warnings().is_empty() { "success" } else { "warning" },
            "os_family": report.os_family,
            "dry_run": report.dry_run,
            "phases": report.phases,
            "actions": actions,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json_result).unwrap_or_default()
        );
        return;
    }

    if report.dry_run {
        print_info("Dry run: nothing was changed");
    }
    for phase in &report.phases {
        match &phase.outcome {
            PhaseOutcome::Completed(detail) => {
                print_success(&format!("{}: {detail}", phase.phase));
            }
            PhaseOutcome::Skipped(detail) => {
                print_detail(&format!("{} {}: {detail}", status::SKIPPED, phase.phase));
            }
            PhaseOutcome::Warned(detail) => {
                print_warning(&format!("{}: {detail}", phase.phase));
            }
        }
    }

    if report.warnings().is_empty() {
        print_success("Setup finished");
    } else {
        print_warning(&format!(
            "Setup finished with {} warning(s)",
            report.warnings().len()
        ));
    }
}
