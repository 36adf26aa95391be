//! Subprocess execution.
//!
//! Every external program reqsmith talks to (`nvidia-smi`, the Python
//! interpreter, pip) goes through [`CommandRunner`], so the probe, the
//! environment guard and the install loop can be exercised with fakes.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// A program invocation: executable plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner {
    /// Run to completion with stdout/stderr captured.
    fn output(&self, cmd: &CommandSpec) -> std::io::Result<CommandOutput>;

    /// Run to completion with stdio inherited from reqsmith, so pip's
    /// progress reaches the terminal. Returns the exit code, `None` when
    /// the process was killed by a signal.
    fn status(&self, cmd: &CommandSpec) -> std::io::Result<Option<i32>>;
}

/// Runs commands on the host with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn output(&self, cmd: &CommandSpec) -> std::io::Result<CommandOutput> {
        tracing::debug!("exec (captured): {}", cmd);
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    fn status(&self, cmd: &CommandSpec) -> std::io::Result<Option<i32>> {
        tracing::debug!("exec: {}", cmd);
        let status = Command::new(&cmd.program).args(&cmd.args).status()?;
        Ok(status.code())
    }
}
