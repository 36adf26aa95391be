//! Python environment discovery and the isolation guard.
//!
//! Two interpreters matter: the one on `PATH` (or given explicitly), whose
//! prefixes tell us whether we are inside a virtualenv, and a project-local
//! venv interpreter which, when present, receives the installs instead.

use std::path::{Path, PathBuf};

use crate::error::{ReqsmithError, Result};
use crate::process::{CommandRunner, CommandSpec};
use crate::prompt::ConfirmPrompt;

#[cfg(target_os = "windows")]
const PYTHON_CANDIDATES: &[&str] = &["python"];

#[cfg(not(target_os = "windows"))]
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

const PREFIX_QUERY: &str =
    "import sys; print(sys.prefix); print(getattr(sys, 'base_prefix', sys.prefix))";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentContext {
    /// Interpreter found on PATH or configured
    pub current: Option<PathBuf>,
    /// Whether `current` runs inside a virtualenv
    pub isolated: bool,
    /// Interpreter of a venv inside the project directory
    pub local_venv: Option<PathBuf>,
}

impl EnvironmentContext {
    /// Inspect the host. Fails only when no interpreter can be used at all.
    pub fn detect(
        runner: &dyn CommandRunner,
        explicit_python: Option<&str>,
        project_root: &Path,
        venv_dirs: &[String],
    ) -> Result<Self> {
        let current = find_python(explicit_python);
        let local_venv = find_project_venv(project_root, venv_dirs);

        if current.is_none() && local_venv.is_none() {
            let tried = match explicit_python {
                Some(python) => python.to_string(),
                None => PYTHON_CANDIDATES.join(", "),
            };
            return Err(ReqsmithError::InterpreterNotFound(tried));
        }

        for var in ["VIRTUAL_ENV", "CONDA_PREFIX"] {
            if let Ok(value) = std::env::var(var) {
                tracing::debug!("{}={}", var, value);
            }
        }

        let isolated = current
            .as_deref()
            .map(|python| is_isolated(runner, python))
            .unwrap_or(false);

        Ok(Self {
            current,
            isolated,
            local_venv,
        })
    }

    /// Interpreter that runs pip: the project venv first, then the current one.
    pub fn install_interpreter(&self) -> Option<&Path> {
        self.local_venv.as_deref().or(self.current.as_deref())
    }
}

/// Locate the interpreter to query, preferring an explicit path.
pub fn find_python(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(python) = explicit {
        let expanded = shellexpand::tilde(python);
        return match which::which(&*expanded) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!("configured interpreter '{}' not usable: {}", python, e);
                None
            }
        };
    }

    PYTHON_CANDIDATES
        .iter()
        .find_map(|candidate| which::which(candidate).ok())
}

/// Interpreter path inside a virtualenv directory.
pub fn venv_python(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts").join("python.exe")
    } else {
        let bin = env_dir.join("bin");
        let python3 = bin.join("python3");
        if python3.exists() {
            python3
        } else {
            bin.join("python")
        }
    }
}

/// First configured venv directory under `root` whose interpreter exists.
pub fn find_project_venv(root: &Path, venv_dirs: &[String]) -> Option<PathBuf> {
    venv_dirs
        .iter()
        .map(|dir| venv_python(&root.join(dir)))
        .find(|python| python.exists())
}

/// Ask the interpreter whether `sys.prefix` differs from `sys.base_prefix`.
///
/// Any failure counts as not isolated.
pub fn is_isolated(runner: &dyn CommandRunner, python: &Path) -> bool {
    let cmd = CommandSpec::new(python).args(["-c", PREFIX_QUERY]);

    let output = match runner.output(&cmd) {
        Ok(output) if output.success => output,
        Ok(output) => {
            tracing::debug!("prefix query exited with {:?}: {}", output.code, output.stderr.trim());
            return false;
        }
        Err(e) => {
            tracing::debug!("prefix query failed: {}", e);
            return false;
        }
    };

    let mut lines = output.stdout.lines().map(str::trim);
    match (lines.next(), lines.next()) {
        (Some(prefix), Some(base_prefix)) if !prefix.is_empty() => {
            tracing::debug!("sys.prefix={} sys.base_prefix={}", prefix, base_prefix);
            prefix != base_prefix
        }
        _ => false,
    }
}

/// Stop unless the environment is isolated or the operator agrees to go on.
pub fn guard(context: &EnvironmentContext, prompt: &dyn ConfirmPrompt) -> Result<()> {
    if context.isolated {
        return Ok(());
    }

    prompt.warn(
        "Not running in a virtual environment. Installing into the system interpreter may \
         conflict with packages other tools rely on.",
    );

    if prompt.confirm("Continue without a virtual environment?", false)? {
        tracing::debug!("operator chose to continue outside a virtual environment");
        Ok(())
    } else {
        Err(ReqsmithError::NotIsolated)
    }
}
