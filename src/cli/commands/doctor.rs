//! CLI command for `prusti-setup doctor`

use std::path::Path;

use anyhow::{bail, Result};

use crate::cli::output::{
    is_json, is_quiet, print_detail, print_info, print_success, print_warning, status,
};
use crate::core::doctor::{run_doctor, CheckResult, DoctorReport};

/// Execute the doctor command
pub async fn execute(project_dir: &Path) -> Result<()> {
    let report = run_doctor(project_dir);

    if is_json() {
        print_json(&report);
    } else if is_quiet() {
        for check in report.failed_required() {
            eprintln!("{} Missing required: {}", status::ERROR, check.name);
        }
    } else {
        print_report(project_dir, &report);
    }

    if !report.failed_required().is_empty() {
        bail!("Missing required dependencies. Run 'prusti-setup doctor' for details.");
    }
    Ok(())
}

fn print_json(report: &DoctorReport) {
    let json_result = serde_json::json!({
        "status": report.status(),
        "os_family": report.os_family,
        "checks": report.checks,
        "config_issues": report.config_issues,
        "passed_count": report.passed_count(),
        "total_count": report.checks.len(),
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&json_result).unwrap_or_default()
    );
}

fn print_check(check: &CheckResult) {
    let optional = if check.required { "" } else { " [optional]" };
    if check.passed {
        let version = check
            .version
            .as_ref()
            .map(|v| format!(" ({v})"))
            .unwrap_or_default();
        println!("  {} {}{version}{optional}", status::SUCCESS, check.name);
        return;
    }

    println!("  {} {}{optional}", status::ERROR, check.name);
    if let Some(error) = &check.error {
        print_detail(&format!("Error: {error}"));
    }
    if let Some(suggestion) = &check.suggestion {
        print_detail(&format!("Suggestion: {suggestion}"));
    }
}

fn print_report(project_dir: &Path, report: &DoctorReport) {
    print_info(&format!(
        "Checking {} on {}",
        project_dir.display(),
        report.os_family
    ));
    println!();
    report.checks.iter().for_each(print_check);

    if !report.config_issues.is_empty() {
        println!();
        print_warning("Configuration issues:");
        for issue in &report.config_issues {
            print_detail(&format!("• {issue}"));
        }
    }

    println!();
    let summary = format!("{}/{} checks passed", report.passed_count(), report.checks.len());
    match report.status() {
        "success" => print_success(&summary),
        "warning" => print_warning(&format!("{summary}; only optional items need attention")),
        _ => {
            println!("{} {summary}", status::ERROR);
            for check in report.failed_required() {
                if let Some(suggestion) = &check.suggestion {
                    print_detail(&format!("• {}: {suggestion}", check.name));
                }
            }
        }
    }
}
