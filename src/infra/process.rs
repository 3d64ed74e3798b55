//! External process execution
//!
//! Every command that mutates the host goes through a [`CommandExecutor`].
//! Two implementations exist:
//!
//! - [`SystemExecutor`] spawns the process and captures its output
//! - [`RecordingExecutor`] appends a description to a log instead of
//!   spawning, used for `--dry-run` and in tests
//!
//! Steps that are not processes (download, extraction) are reported through
//! [`CommandExecutor::describe`] so a dry run lists them too.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::process::Stdio;
use std::sync::Mutex;

use crate::error::ProcessError;

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
}

impl ShellCommand {
    /// Create a command for `program` with no arguments
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run this command through `sudo` when `elevate` is set
    #[must_use]
    pub fn elevated(self, elevate: bool) -> Self {
        if !elevate {
            return self;
        }
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
        }
    }

    /// Program name
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments
    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a process that exited with status 0
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    /// Output of a process that exited with `code` and wrote `stderr`
    pub fn failed(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Convert a non-zero exit into a [`ProcessError::Failed`]
    pub fn into_result(self, command: &ShellCommand) -> Result<Self, ProcessError> {
        if self.success() {
            Ok(self)
        } else {
            Err(ProcessError::Failed {
                command: command.to_string(),
                code: self.code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Capability to perform mutating host operations
#[allow(async_fn_in_trait)]
pub trait CommandExecutor {
    /// Whether `program` can be found on PATH
    fn locate(&self, program: &str) -> bool;

    /// Run `command` to completion
    ///
    /// A non-zero exit is reported in the returned [`CommandOutput`], not as
    /// an error; errors mean the process could not run at all.
    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ProcessError>;

    /// Report a mutating step that is not a process invocation
    fn describe(&self, step: &str);
}

/// Executor that spawns real processes
#[derive(Debug, Clone, Default)]
pub struct SystemExecutor;

impl SystemExecutor {
    /// Create a new system executor
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemExecutor {
    fn locate(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ProcessError> {
        tracing::debug!("Running: {command}");

        let output = tokio::process::Command::new(command.program())
            .args(command.arguments())
            .stdin(Stdio::inherit())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ProcessError::NotFound {
                        program: command.program().to_string(),
                    }
                } else {
                    ProcessError::SpawnFailed {
                        command: command.to_string(),
                        error: e.to_string(),
                    }
                }
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        for line in stdout.lines() {
            tracing::debug!("  {line}");
        }

        Ok(CommandOutput {
            code: output.status.code(),
            stdout,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn describe(&self, step: &str) {
        tracing::info!("{step}");
    }
}

/// Executor that records commands instead of running them
///
/// Responses can be scripted per command line so callers can exercise
/// failure paths without touching the host.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    log: Mutex<Vec<String>>,
    echo: bool,
    responses: HashMap<String, CommandOutput>,
    missing: HashSet<String>,
}

impl RecordingExecutor {
    /// Create a silent recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder that also prints every entry to stdout
    pub fn echoing() -> Self {
        Self {
            echo: true,
            ..Self::default()
        }
    }

    /// Answer `command_line` with `output` instead of success
    #[must_use]
    pub fn respond(mut self, command_line: &str, output: CommandOutput) -> Self {
        self.responses.insert(command_line.to_string(), output);
        self
    }

    /// Pretend `program` is not installed
    #[must_use]
    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    /// Everything recorded so far, in order
    pub fn recorded(&self) -> Vec<String> {
        self.log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    fn push(&self, line: String) {
        if self.echo {
            println!("[dry-run] {line}");
        }
        if let Ok(mut log) = self.log.lock() {
            log.push(line);
        }
    }
}

impl CommandExecutor for RecordingExecutor {
    fn locate(&self, program: &str) -> bool {
        !self.missing.contains(program)
    }

    async fn run(&self, command: &ShellCommand) -> Result<CommandOutput, ProcessError> {
        if self.missing.contains(command.program()) {
            return Err(ProcessError::NotFound {
                program: command.program().to_string(),
            });
        }
        let line = command.to_string();
        let output = self
            .responses
            .get(&line)
            .cloned()
            .unwrap_or_else(CommandOutput::ok);
        self.push(line);
        Ok(output)
    }

    fn describe(&self, step: &str) {
        self.push(step.to_string());
    }
}

/// Whether the current process runs with effective uid 0
#[cfg(unix)]
pub fn running_as_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// Whether the current process runs with effective uid 0
#[cfg(not(unix))]
pub fn running_as_root() -> bool {
    false
}
