//! Bootstrap orchestration
//!
//! Runs the four setup phases strictly in order:
//!
//! 1. OS detection
//! 2. Native dependency installation (skipped with `--rustup-only`)
//! 3. Viper tools download and extraction (skipped with `--rustup-only`)
//! 4. Toolchain configuration through rustup
//!
//! The first fatal error aborts the remaining phases. Everything that
//! mutates the host goes through a [`CommandExecutor`], so a dry run only
//! needs a recording executor.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::defaults::{
    DOWNLOAD_TEMP_FILE, OPTIONAL_FORMATTER_COMPONENT, STAGING_PREFIX, TOOLCHAIN_MANAGER,
};
use crate::core::platform::{detect_os_family, OsFamily};
use crate::core::toolchain::ToolchainSpec;
use crate::core::viper::{self, DownloadTarget, InstallStamp};
use crate::error::{ExtractError, ProcessError, SetupError, ToolchainConfigError};
use crate::infra::archive::{self, ArchiveFormat};
use crate::infra::download::{DownloadManager, ProgressCallback};
use crate::infra::filesystem;
use crate::infra::process::{
    running_as_root, CommandExecutor, RecordingExecutor, ShellCommand, SystemExecutor,
};

/// Settings for one invocation; never modified once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Only configure the toolchain
    pub rustup_only: bool,
    /// Print mutating steps instead of running them
    pub dry_run: bool,
    /// Project root holding the pin file and `viper_tools/`
    pub project_dir: PathBuf,
    /// Replaces the pinned Viper tools URL
    pub viper_tools_url: Option<String>,
    /// Expected SHA256 of the Viper tools archive
    pub viper_tools_sha256: Option<String>,
}

impl RunConfig {
    /// Full setup of `project_dir` with default sources
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            rustup_only: false,
            dry_run: false,
            project_dir: project_dir.into(),
            viper_tools_url: None,
            viper_tools_sha256: None,
        }
    }
}

/// Setup phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    OsDetection,
    NativeDependencies,
    ViperTools,
    Toolchain,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::OsDetection => write!(f, "OS detection"),
            Phase::NativeDependencies => write!(f, "native dependencies"),
            Phase::ViperTools => write!(f, "Viper tools"),
            Phase::Toolchain => write!(f, "toolchain configuration"),
        }
    }
}

/// How a phase ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "kebab-case")]
pub enum PhaseOutcome {
    /// Phase did its work
    Completed(String),
    /// Phase had nothing to do
    Skipped(String),
    /// Phase finished but something non-fatal went wrong
    Warned(String),
}

/// Outcome of one phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub phase: Phase,
    #[serde(flatten)]
    pub outcome: PhaseOutcome,
}

/// Summary of a successful run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SetupReport {
    /// Detected OS family
    pub os_family: String,
    /// Whether nothing was actually executed
    pub dry_run: bool,
    /// One entry per phase, in execution order
    pub phases: Vec<PhaseReport>,
}

impl SetupReport {
    fn push(&mut self, phase: Phase, outcome: PhaseOutcome) {
        self.phases.push(PhaseReport { phase, outcome });
    }

    /// Outcome recorded for `phase`
    pub fn outcome(&self, phase: Phase) -> Option<&PhaseOutcome> {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .map(|p| &p.outcome)
    }

    /// Warning messages, in phase order
    pub fn warnings(&self) -> Vec<&str> {
        self.phases
            .iter()
            .filter_map(|p| match &p.outcome {
                PhaseOutcome::Warned(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Run setup with the executor `config` calls for
pub async fn run(config: &RunConfig) -> Result<SetupReport, SetupError> {
    run_with_progress(config, None).await
}

/// Like [`run`], reporting archive download progress to `progress`
pub async fn run_with_progress(
    config: &RunConfig,
    progress: Option<ProgressCallback>,
) -> Result<SetupReport, SetupError> {
    if config.dry_run {
        let executor = RecordingExecutor::echoing();
        Bootstrapper::new(config, &executor).run().await
    } else {
        let executor = SystemExecutor::new();
        let mut bootstrapper = Bootstrapper::new(config, &executor);
        if let Some(progress) = progress {
            bootstrapper = bootstrapper.with_progress(progress);
        }
        bootstrapper.run().await
    }
}

/// Executes the setup phases against one executor
pub struct Bootstrapper<'a, E> {
    config: &'a RunConfig,
    executor: &'a E,
    downloads: DownloadManager,
    os_family: Option<OsFamily>,
    progress: Option<ProgressCallback>,
}

impl<'a, E: CommandExecutor> Bootstrapper<'a, E> {
    /// Create a bootstrapper for `config` that acts through `executor`
    pub fn new(config: &'a RunConfig, executor: &'a E) -> Self {
        Self {
            config,
            executor,
            downloads: DownloadManager::new(),
            os_family: None,
            progress: None,
        }
    }

    /// Use `os_family` instead of detecting the host
    #[must_use]
    pub fn with_os_family(mut self, os_family: OsFamily) -> Self {
        self.os_family = Some(os_family);
        self
    }

    /// Use a specific download manager
    #[must_use]
    pub fn with_download_manager(mut self, downloads: DownloadManager) -> Self {
        self.downloads = downloads;
        self
    }

    /// Report archive download progress
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run all phases; the first fatal error aborts the rest
    pub async fn run(mut self) -> Result<SetupReport, SetupError> {
        let mut report = SetupReport {
            dry_run: self.config.dry_run,
            ..SetupReport::default()
        };

        let os = self.os_family.take().unwrap_or_else(detect_os_family);
        tracing::info!("Detected OS family: {os}");
        report.os_family = os.to_string();
        report.push(Phase::OsDetection, PhaseOutcome::Completed(os.to_string()));

        if self.config.rustup_only {
            tracing::info!("--rustup-only: skipping native dependencies and Viper tools");
            let reason = "--rustup-only".to_string();
            report.push(Phase::NativeDependencies, PhaseOutcome::Skipped(reason.clone()));
            report.push(Phase::ViperTools, PhaseOutcome::Skipped(reason));
        } else {
            let outcome = interruptible(
                Phase::NativeDependencies,
                self.install_native_dependencies(&os),
            )
            .await?;
            report.push(Phase::NativeDependencies, outcome);

            let outcome = interruptible(Phase::ViperTools, self.install_viper_tools(&os)).await?;
            report.push(Phase::ViperTools, outcome);
        }

        let outcome = interruptible(Phase::Toolchain, self.configure_toolchain()).await?;
        report.push(Phase::Toolchain, outcome);

        Ok(report)
    }

    async fn install_native_dependencies(&self, os: &OsFamily) -> Result<PhaseOutcome, SetupError> {
        let (Some(manager), Some(packages)) = (os.package_manager(), os.native_dependencies())
        else {
            let message = format!(
                "Automatic native dependency installation is not supported on '{os}'; \
                 install a C toolchain, pkg-config, OpenSSL headers and a JDK manually"
            );
            tracing::warn!("{message}");
            return Ok(PhaseOutcome::Warned(message));
        };

        if !self.executor.locate(manager.program()) {
            return Err(SetupError::NativeInstall(ProcessError::NotFound {
                program: manager.program().to_string(),
            }));
        }

        let elevate = manager.needs_root() && !running_as_root() && self.executor.locate("sudo");

        for command in manager.install_commands(packages, elevate) {
            tracing::info!("Running {command}");
            self.executor
                .run(&command)
                .await
                .and_then(|output| output.into_result(&command))
                .map_err(SetupError::NativeInstall)?;
        }

        Ok(PhaseOutcome::Completed(format!(
            "{} packages via {}",
            packages.len(),
            manager.program()
        )))
    }

    async fn install_viper_tools(&mut self, os: &OsFamily) -> Result<PhaseOutcome, SetupError> {
        let target = DownloadTarget::for_project(
            &self.config.project_dir,
            os,
            self.config.viper_tools_url.as_deref(),
        );
        let expected_sha256 = self.config.viper_tools_sha256.as_deref();
        let format = ArchiveFormat::from_name(&target.url)?;

        if !self.config.dry_run {
            archive::recover_interrupted(&target.destination_dir, STAGING_PREFIX)?;
        }

        if viper::is_installed(&target.destination_dir, &target.url, expected_sha256) {
            tracing::info!(
                "Viper tools from {} already installed in {}",
                target.url,
                target.destination_dir.display()
            );
            return Ok(PhaseOutcome::Skipped("already installed".to_string()));
        }

        let parent = target
            .destination_dir
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let archive_path = parent.join(DOWNLOAD_TEMP_FILE);

        self.executor.describe(&format!(
            "download {} -> {}",
            target.url,
            archive_path.display()
        ));
        self.executor.describe(&format!(
            "extract {} -> {}",
            archive_path.display(),
            target.destination_dir.display()
        ));
        if self.config.dry_run {
            return Ok(PhaseOutcome::Completed(format!(
                "would install into {}",
                target.destination_dir.display()
            )));
        }

        filesystem::remove_file(&archive_path)?;

        let progress = self.progress.take();
        let downloaded = match expected_sha256 {
            Some(sha) => {
                self.downloads
                    .download_verified(&target.url, &archive_path, sha, progress)
                    .await?
            }
            None => self.downloads.download(&target.url, &archive_path, progress).await?,
        };
        tracing::info!(
            "Downloaded {} bytes from {} (sha256 {})",
            downloaded.size,
            target.url,
            downloaded.checksum
        );

        let dest = target.destination_dir.clone();
        let source = archive_path.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            archive::extract_replacing(
                &source,
                format,
                &dest,
                STAGING_PREFIX,
                viper::missing_layout,
            )
        })
        .await
        .map_err(|e| ExtractError::IoError {
            path: archive_path.clone(),
            error: e.to_string(),
        })?;
        let _ = filesystem::remove_file(&archive_path);
        let files = extracted?;

        InstallStamp {
            url: target.url,
            sha256: downloaded.checksum,
        }
        .write(&target.destination_dir)?;

        Ok(PhaseOutcome::Completed(format!(
            "{files} files in {}",
            target.destination_dir.display()
        )))
    }

    async fn configure_toolchain(&self) -> Result<PhaseOutcome, SetupError> {
        let (spec, pin_path) = ToolchainSpec::load(&self.config.project_dir)?;
        tracing::info!(
            "Toolchain '{}' pinned by {}",
            spec.channel,
            pin_path.display()
        );

        if !self.executor.locate(TOOLCHAIN_MANAGER) {
            return Err(ToolchainConfigError::ManagerNotFound {
                program: TOOLCHAIN_MANAGER.to_string(),
            }
            .into());
        }

        self.run_manager(&spec.install_command())
            .await
            .map_err(|error| ToolchainConfigError::ToolchainUnavailable {
                channel: spec.channel.clone(),
                error,
            })?;

        let required = spec.required_components();
        for component in &required {
            self.run_manager(&spec.component_command(component))
                .await
                .map_err(|error| ToolchainConfigError::ComponentUnavailable {
                    channel: spec.channel.clone(),
                    component: component.clone(),
                    error,
                })?;
        }

        let formatter = spec.component_command(OPTIONAL_FORMATTER_COMPONENT);
        if let Err(error) = self.run_manager(&formatter).await {
            let message = format!(
                "Optional component '{OPTIONAL_FORMATTER_COMPONENT}' is unavailable for '{}': {error}",
                spec.channel
            );
            tracing::warn!("{message}");
            return Ok(PhaseOutcome::Warned(message));
        }

        Ok(PhaseOutcome::Completed(format!(
            "{} with {} components",
            spec.channel,
            required.len() + 1
        )))
    }

    async fn run_manager(&self, command: &ShellCommand) -> Result<(), String> {
        tracing::info!("Running {command}");
        self.executor
            .run(command)
            .await
            .and_then(|output| output.into_result(command))
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Await `work`, aborting it when the user presses Ctrl-C
async fn interruptible<T>(
    phase: Phase,
    work: impl Future<Output = Result<T, SetupError>>,
) -> Result<T, SetupError> {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler: never interrupt
            std::future::pending::<()>().await;
        }
    };
    cancellable(phase, work, ctrl_c).await
}

/// Await `work` unless `cancel` completes first
async fn cancellable<T>(
    phase: Phase,
    work: impl Future<Output = Result<T, SetupError>>,
    cancel: impl Future<Output = ()>,
) -> Result<T, SetupError> {
    tokio::select! {
        biased;
        result = work => result,
        () = cancel => {
            tracing::warn!("Interrupted during {phase}");
            Err(SetupError::Interrupted { phase: phase.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DownloadError, PinFileError};
    use crate::infra::process::CommandOutput;
    use std::io::Write;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CHANNEL: &str = "nightly-2023-06-15";

    fn bundle(entries: &[&str]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for name in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(b"payload").unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn viper_bundle() -> Vec<u8> {
        bundle(&["backends/silicon.jar", "z3/bin/z3", "boogie/Boogie"])
    }

    fn project() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("rust-toolchain"), format!("{CHANNEL}\n")).unwrap();
        temp
    }

    async fn serve(body: Vec<u8>, times: u64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ViperToolsLinux.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(times)
            .mount(&server)
            .await;
        server
    }

    fn config(project: &TempDir, server: &MockServer) -> RunConfig {
        RunConfig {
            viper_tools_url: Some(format!("{}/ViperToolsLinux.zip", server.uri())),
            ..RunConfig::new(project.path())
        }
    }

    async fn run_with(
        config: &RunConfig,
        executor: &RecordingExecutor,
        os: OsFamily,
    ) -> Result<SetupReport, SetupError> {
        Bootstrapper::new(config, executor)
            .with_os_family(os)
            .with_download_manager(DownloadManager::with_config(1, 10))
            .run()
            .await
    }

    fn dir_listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    fn count_matching(lines: &[String], needle: &str) -> usize {
        lines.iter().filter(|l| l.contains(needle)).count()
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::NativeDependencies.to_string(), "native dependencies");
        assert_eq!(Phase::Toolchain.to_string(), "toolchain configuration");
    }

    #[test]
    fn test_report_serializes_phase_outcomes() {
        let mut report = SetupReport::default();
        report.push(Phase::ViperTools, PhaseOutcome::Skipped("already installed".into()));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["phases"][0]["phase"], "viper-tools");
        assert_eq!(json["phases"][0]["status"], "skipped");
        assert_eq!(json["phases"][0]["detail"], "already installed");
    }

    #[tokio::test]
    async fn test_full_run_on_linux() {
        let project = project();
        let server = serve(viper_bundle(), 1).await;
        let config = config(&project, &server);
        let executor = RecordingExecutor::new();

        let report = run_with(&config, &executor, OsFamily::Linux).await.unwrap();

        let recorded = executor.recorded();
        assert!(recorded[0].ends_with("apt-get update"));
        assert!(recorded[1].contains("apt-get install -y build-essential"));
        assert!(recorded.iter().any(|l| l == &format!("rustup toolchain install {CHANNEL}")));
        for component in ["rust-src", "rustc-dev", "llvm-tools-preview", "rustfmt"] {
            let line = format!("rustup component add --toolchain {CHANNEL} {component}");
            assert_eq!(count_matching(&recorded, &line), 1, "missing {line}");
        }

        let tools = project.path().join("viper_tools");
        assert!(tools.join("z3/bin/z3").exists());
        assert!(tools.join("backends/silicon.jar").exists());
        assert!(InstallStamp::read(&tools).is_some());
        assert_eq!(dir_listing(project.path()), vec!["rust-toolchain", "viper_tools"]);
        assert!(report.warnings().is_empty());
        assert_eq!(report.phases.len(), 4);
    }

    #[tokio::test]
    async fn test_dry_run_touches_nothing() {
        let project = project();
        // Nothing listens here; a dry run must not connect
        let config = RunConfig {
            dry_run: true,
            viper_tools_url: Some("http://127.0.0.1:9/ViperToolsLinux.zip".to_string()),
            ..RunConfig::new(project.path())
        };
        let executor = RecordingExecutor::new();

        let report = run_with(&config, &executor, OsFamily::Linux).await.unwrap();

        assert!(report.dry_run);
        assert_eq!(dir_listing(project.path()), vec!["rust-toolchain"]);

        let recorded = executor.recorded();
        assert_eq!(count_matching(&recorded, "apt-get update"), 1);
        assert_eq!(count_matching(&recorded, "apt-get install"), 1);
        assert_eq!(count_matching(&recorded, "download http://127.0.0.1:9/"), 1);
        assert_eq!(count_matching(&recorded, "extract "), 1);
        assert_eq!(count_matching(&recorded, "rustup toolchain install"), 1);
        assert_eq!(count_matching(&recorded, "rustup component add"), 4);
        assert_eq!(recorded.len(), 9);
    }

    #[tokio::test]
    async fn test_dry_run_still_rejects_malformed_pin_file() {
        let project = TempDir::new().unwrap();
        std::fs::write(project.path().join("rust-toolchain"), "stable beta\n").unwrap();
        let config = RunConfig {
            dry_run: true,
            rustup_only: true,
            ..RunConfig::new(project.path())
        };
        let executor = RecordingExecutor::new();

        let err = run_with(&config, &executor, OsFamily::Linux).await.unwrap_err();
        assert!(matches!(
            err,
            SetupError::ToolchainConfig(ToolchainConfigError::PinFile(PinFileError::Parse { .. }))
        ));
    }

    #[tokio::test]
    async fn test_rustup_only_skips_packages_and_download() {
        let project = project();
        let server = serve(viper_bundle(), 0).await;
        let config = RunConfig {
            rustup_only: true,
            ..config(&project, &server)
        };
        let executor = RecordingExecutor::new();

        let report = run_with(&config, &executor, OsFamily::Linux).await.unwrap();

        let recorded = executor.recorded();
        assert_eq!(count_matching(&recorded, "apt-get"), 0);
        assert_eq!(count_matching(&recorded, "download"), 0);
        assert!(recorded.iter().all(|l| l.starts_with("rustup ")));
        assert!(!project.path().join("viper_tools").exists());
        assert_eq!(
            report.outcome(Phase::ViperTools),
            Some(&PhaseOutcome::Skipped("--rustup-only".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unsupported_os_warns_and_continues() {
        let project = project();
        let server = serve(viper_bundle(), 1).await;
        let config = config(&project, &server);
        let executor = RecordingExecutor::new();

        let report = run_with(
            &config,
            &executor,
            OsFamily::Unsupported("freebsd".to_string()),
        )
        .await
        .unwrap();

        assert!(matches!(
            report.outcome(Phase::NativeDependencies),
            Some(PhaseOutcome::Warned(_))
        ));
        assert!(project.path().join("viper_tools/z3").is_dir());
        assert_eq!(count_matching(&executor.recorded(), "rustup component add"), 4);
        assert_eq!(report.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_download_not_found_aborts_before_toolchain() {
        let project = project();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let config = config(&project, &server);
        let executor = RecordingExecutor::new();

        let err = run_with(&config, &executor, OsFamily::Linux).await.unwrap_err();

        assert!(matches!(
            err,
            SetupError::Download(DownloadError::HttpStatus { status: 404, .. })
        ));
        assert_eq!(count_matching(&executor.recorded(), "rustup"), 0);
        assert!(!project.path().join("viper_tools").exists());
        assert!(!project.path().join(DOWNLOAD_TEMP_FILE).exists());
    }

    #[tokio::test]
    async fn test_formatter_failure_is_only_a_warning() {
        let project = project();
        let config = RunConfig {
            rustup_only: true,
            ..RunConfig::new(project.path())
        };
        let executor = RecordingExecutor::new().respond(
            &format!("rustup component add --toolchain {CHANNEL} rustfmt"),
            CommandOutput::failed(1, "error: component 'rustfmt' is unavailable"),
        );

        let report = run_with(&config, &executor, OsFamily::Linux).await.unwrap();

        match report.outcome(Phase::Toolchain) {
            Some(PhaseOutcome::Warned(message)) => assert!(message.contains("rustfmt")),
            other => panic!("Expected warning, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_required_component_failure_is_fatal() {
        let project = project();
        let config = RunConfig {
            rustup_only: true,
            ..RunConfig::new(project.path())
        };
        let executor = RecordingExecutor::new().respond(
            &format!("rustup component add --toolchain {CHANNEL} rustc-dev"),
            CommandOutput::failed(1, "error: component 'rustc-dev' is unavailable"),
        );

        let err = run_with(&config, &executor, OsFamily::Linux).await.unwrap_err();
        match err {
            SetupError::ToolchainConfig(ToolchainConfigError::ComponentUnavailable {
                component,
                ..
            }) => assert_eq!(component, "rustc-dev"),
            e => panic!("Expected ComponentUnavailable, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_channel_is_fatal() {
        let project = project();
        let config = RunConfig {
            rustup_only: true,
            ..RunConfig::new(project.path())
        };
        let executor = RecordingExecutor::new().respond(
            &format!("rustup toolchain install {CHANNEL}"),
            CommandOutput::failed(1, "error: toolchain not found"),
        );

        let err = run_with(&config, &executor, OsFamily::Linux).await.unwrap_err();
        assert!(matches!(
            err,
            SetupError::ToolchainConfig(ToolchainConfigError::ToolchainUnavailable { .. })
        ));
        assert_eq!(count_matching(&executor.recorded(), "component add"), 0);
    }

    #[tokio::test]
    async fn test_missing_pin_file_fails_before_rustup() {
        let project = TempDir::new().unwrap();
        let config = RunConfig {
            rustup_only: true,
            ..RunConfig::new(project.path())
        };
        let executor = RecordingExecutor::new();

        let err = run_with(&config, &executor, OsFamily::Linux).await.unwrap_err();

        assert!(matches!(
            err,
            SetupError::ToolchainConfig(ToolchainConfigError::PinFile(PinFileError::Missing { .. }))
        ));
        assert!(executor.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_missing_rustup() {
        let project = project();
        let config = RunConfig {
            rustup_only: true,
            ..RunConfig::new(project.path())
        };
        let executor = RecordingExecutor::new().without_program("rustup");

        let err = run_with(&config, &executor, OsFamily::Linux).await.unwrap_err();
        assert!(matches!(
            err,
            SetupError::ToolchainConfig(ToolchainConfigError::ManagerNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_package_manager_missing() {
        let project = project();
        let server = serve(viper_bundle(), 0).await;
        let config = config(&project, &server);
        let executor = RecordingExecutor::new().without_program("brew");

        let err = run_with(&config, &executor, OsFamily::MacOS).await.unwrap_err();
        assert!(matches!(
            err,
            SetupError::NativeInstall(ProcessError::NotFound { ref program }) if program == "brew"
        ));
        assert!(executor.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_package_install_failure_aborts() {
        let project = project();
        let server = serve(viper_bundle(), 0).await;
        let config = config(&project, &server);
        let executor = RecordingExecutor::new().respond(
            "brew install pkg-config openssl openjdk@11",
            CommandOutput::failed(1, "Error: No available formula"),
        );

        let err = run_with(&config, &executor, OsFamily::MacOS).await.unwrap_err();
        assert!(matches!(
            err,
            SetupError::NativeInstall(ProcessError::Failed { code: Some(1), .. })
        ));
        assert_eq!(count_matching(&executor.recorded(), "download"), 0);
    }

    #[tokio::test]
    async fn test_second_run_is_a_no_op_for_the_archive() {
        let project = project();
        let server = serve(viper_bundle(), 1).await;
        let config = config(&project, &server);

        let first = RecordingExecutor::new();
        run_with(&config, &first, OsFamily::Linux).await.unwrap();

        let second = RecordingExecutor::new();
        let report = run_with(&config, &second, OsFamily::Linux).await.unwrap();

        assert_eq!(
            report.outcome(Phase::ViperTools),
            Some(&PhaseOutcome::Skipped("already installed".to_string()))
        );
        let commands = |e: &RecordingExecutor| -> Vec<String> {
            e.recorded()
                .into_iter()
                .filter(|l| !l.starts_with("download ") && !l.starts_with("extract "))
                .collect()
        };
        assert_eq!(commands(&first), commands(&second));
        assert_eq!(count_matching(&second.recorded(), "download"), 0);
    }

    #[tokio::test]
    async fn test_reinstall_replaces_incomplete_tree() {
        let project = project();
        let server = serve(viper_bundle(), 1).await;
        let config = config(&project, &server);

        let tools = project.path().join("viper_tools");
        std::fs::create_dir_all(tools.join("backends")).unwrap();
        std::fs::write(tools.join("stale.txt"), "old").unwrap();
        std::fs::create_dir_all(project.path().join(format!("{STAGING_PREFIX}1234"))).unwrap();

        run_with(&config, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap();

        assert!(!tools.join("stale.txt").exists());
        assert!(tools.join("z3/bin/z3").exists());
        assert_eq!(dir_listing(project.path()), vec!["rust-toolchain", "viper_tools"]);
    }

    #[tokio::test]
    async fn test_checksum_mismatch() {
        let project = project();
        let server = serve(viper_bundle(), 1).await;
        let config = RunConfig {
            viper_tools_sha256: Some("00".repeat(32)),
            ..config(&project, &server)
        };

        let err = run_with(&config, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SetupError::Download(DownloadError::ChecksumFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_corrupt_archive() {
        let project = project();
        let server = serve(b"this is not a zip".to_vec(), 1).await;
        let config = config(&project, &server);

        let err = run_with(&config, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap_err();
        assert!(matches!(err, SetupError::Extract(ExtractError::Corrupt { .. })));
        assert_eq!(dir_listing(project.path()), vec!["rust-toolchain"]);
    }

    #[tokio::test]
    async fn test_incomplete_bundle() {
        let project = project();
        let server = serve(bundle(&["backends/silicon.jar", "boogie/Boogie"]), 1).await;
        let config = config(&project, &server);

        let err = run_with(&config, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap_err();
        match err {
            SetupError::Extract(ExtractError::IncompleteLayout { missing, .. }) => {
                assert_eq!(missing, vec!["z3"]);
            }
            e => panic!("Expected IncompleteLayout, got: {e:?}"),
        }
        assert!(InstallStamp::read(&project.path().join("viper_tools")).is_none());
    }

    #[tokio::test]
    async fn test_unsupported_archive_url() {
        let project = project();
        let config = RunConfig {
            dry_run: true,
            viper_tools_url: Some("http://host/tools.rar".to_string()),
            ..RunConfig::new(project.path())
        };

        let err = run_with(&config, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SetupError::Extract(ExtractError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_reinstall_keeps_working_install() {
        let project = project();
        let server = serve(viper_bundle(), 1).await;
        Mock::given(method("GET"))
            .and(path("/bad.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bundle(&["backends/x.jar"])))
            .expect(1)
            .mount(&server)
            .await;
        let good = config(&project, &server);
        run_with(&good, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap();

        let bad = RunConfig {
            viper_tools_url: Some(format!("{}/bad.zip", server.uri())),
            ..good.clone()
        };
        let err = run_with(&bad, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap_err();

        match err {
            SetupError::Extract(ExtractError::IncompleteLayout { missing, .. }) => {
                assert_eq!(missing, vec!["z3"]);
            }
            e => panic!("Expected IncompleteLayout, got: {e:?}"),
        }
        let tools = project.path().join("viper_tools");
        assert!(tools.join("z3/bin/z3").exists());
        assert!(!tools.join("x.jar").exists());
        assert_eq!(
            InstallStamp::read(&tools).map(|stamp| stamp.url),
            good.viper_tools_url
        );
        assert_eq!(dir_listing(project.path()), vec!["rust-toolchain", "viper_tools"]);
    }

    #[tokio::test]
    async fn test_restores_install_parked_by_interrupted_run() {
        let project = project();
        let server = serve(viper_bundle(), 1).await;
        let config = config(&project, &server);
        run_with(&config, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap();

        // Interrupted between moving the old tree aside and moving the new one in
        let tools = project.path().join("viper_tools");
        std::fs::rename(&tools, project.path().join(format!("{STAGING_PREFIX}old-1"))).unwrap();
        std::fs::create_dir_all(project.path().join(format!("{STAGING_PREFIX}1/backends"))).unwrap();

        let report = run_with(&config, &RecordingExecutor::new(), OsFamily::Linux)
            .await
            .unwrap();

        assert_eq!(
            report.outcome(Phase::ViperTools),
            Some(&PhaseOutcome::Skipped("already installed".to_string()))
        );
        assert!(tools.join("z3/bin/z3").exists());
        assert_eq!(dir_listing(project.path()), vec!["rust-toolchain", "viper_tools"]);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_phase() {
        let err = cancellable(
            Phase::ViperTools,
            std::future::pending::<Result<(), SetupError>>(),
            async {},
        )
        .await
        .unwrap_err();

        match err {
            SetupError::Interrupted { phase } => assert_eq!(phase, "Viper tools"),
            e => panic!("Expected Interrupted, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_finished_work_wins_over_cancel() {
        let result = cancellable(Phase::Toolchain, async { Ok(7) }, async {}).await;
        assert_eq!(result.unwrap(), 7);
    }
}
