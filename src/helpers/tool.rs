//! External tool invocation
//!
//! Installer extraction and patching shell out to 7-Zip and `patch`. They go
//! through the `ToolRunner` trait so tests can substitute a recording fake.

use crate::error::{SyncError, SyncResult};
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;

/// A command line to run: program, arguments and optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Human-readable command line for error messages.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Exit status and captured output of a finished tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands to completion.
pub trait ToolRunner {
    /// Run `command`, returning `Err` only when it could not be started.
    fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, command: &ToolCommand) -> std::io::Result<ToolOutput> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output()?;
        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Run `command` and require a zero exit status.
pub fn run_checked(runner: &dyn ToolRunner, command: &ToolCommand) -> SyncResult<ToolOutput> {
    let output = runner.run(command).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            SyncError::ToolMissing {
                tool: command.program.clone(),
            }
        } else {
            SyncError::Io {
                action: "cannot execute",
                path: command.program.clone(),
                source: e,
            }
        }
    })?;

    if !output.success() {
        return Err(SyncError::ToolFailed {
            cmd: command.display(),
            code: output.code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}
