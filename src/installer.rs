//! The install loop.
//!
//! One `pip install` per resolved entry, strictly in sequence. A failing
//! entry is reported and skipped; nothing here aborts the batch.

use std::path::{Path, PathBuf};

use console::style;
use serde::Serialize;

use crate::config::AcceleratedFamily;
use crate::hardware::Capability;
use crate::process::{CommandRunner, CommandSpec};
use crate::resolve::{ResolvedRequirement, Resolution};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedInstall {
    pub spec: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub installed: Vec<String>,
    pub failed: Vec<FailedInstall>,
    /// Entries printed but not run under `--dry-run`
    pub planned: Vec<String>,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct Installer<'a> {
    runner: &'a dyn CommandRunner,
    python: PathBuf,
    family: &'a AcceleratedFamily,
    pip_options: Vec<String>,
    dry_run: bool,
}

impl<'a> Installer<'a> {
    pub fn new(runner: &'a dyn CommandRunner, python: &Path, family: &'a AcceleratedFamily) -> Self {
        Self {
            runner,
            python: python.to_path_buf(),
            family,
            pip_options: Vec::new(),
            dry_run: false,
        }
    }

    /// Extra pip arguments appended to every invocation.
    pub fn with_pip_options(mut self, options: Vec<String>) -> Self {
        self.pip_options = options;
        self
    }

    /// Print commands instead of running them.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// pip invocation for one entry; `None` when the entry has no specifiers.
    pub fn command_for(
        &self,
        entry: &ResolvedRequirement,
        capability: Capability,
    ) -> Option<CommandSpec> {
        let specifiers = entry.specifiers();
        if specifiers.is_empty() {
            return None;
        }

        let cmd = CommandSpec::new(&self.python)
            .args(["-m", "pip", "install"])
            .args(specifiers);

        // pip uses the last --index-url; the CPU one must be the only one.
        if entry.accelerated && !capability.has_gpu() {
            return Some(
                cmd.args(without_index_url(&self.pip_options))
                    .args(["--index-url", self.family.cpu_index_url.as_str()]),
            );
        }

        Some(cmd.args(self.pip_options.iter().cloned()))
    }

    pub fn install_all(&self, resolution: &Resolution) -> InstallReport {
        let mut report = InstallReport::default();

        for entry in &resolution.entries {
            let Some(cmd) = self.command_for(entry, resolution.capability) else {
                continue;
            };

            if self.dry_run {
                println!("  {} {}", style("would run").dim(), cmd);
                report.planned.push(entry.spec.clone());
                continue;
            }

            println!("{} {}...", style("Installing").cyan().bold(), entry.spec);

            match self.runner.status(&cmd) {
                Ok(Some(0)) => report.installed.push(entry.spec.clone()),
                Ok(code) => {
                    let reason = match code {
                        Some(code) => format!("pip exited with status {}", code),
                        None => "pip was terminated by a signal".to_string(),
                    };
                    report.failed.push(self.failed(entry, cmd, reason));
                }
                Err(e) => {
                    let reason = format!("could not run {}: {}", self.python.display(), e);
                    report.failed.push(self.failed(entry, cmd, reason));
                }
            }
        }

        report
    }

    fn failed(&self, entry: &ResolvedRequirement, cmd: CommandSpec, reason: String) -> FailedInstall {
        tracing::warn!("`{}` failed: {}", cmd, reason);
        println!(
            "{} Failed to install {}. Continuing with next dependency.",
            style("✗").red().bold(),
            style(&entry.spec).bold()
        );
        FailedInstall {
            spec: entry.spec.clone(),
            reason,
        }
    }
}

/// Drop `--index-url`/`-i` and their values, in every spelling pip accepts.
fn without_index_url(options: &[String]) -> Vec<String> {
    let mut kept = Vec::with_capacity(options.len());
    let mut iter = options.iter();

    while let Some(opt) = iter.next() {
        if opt == "--index-url" || opt == "-i" {
            iter.next();
            continue;
        }
        if opt.starts_with("--index-url=") || (opt.starts_with("-i") && !opt.starts_with("--")) {
            continue;
        }
        kept.push(opt.clone());
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use crate::resolve::resolve;
    use std::cell::RefCell;
    use std::io;

    /// Records every pip call and fails the ones whose args contain `fail_on`.
    struct PipRunner {
        fail_on: Option<&'static str>,
        calls: RefCell<Vec<CommandSpec>>,
    }

    impl PipRunner {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                fail_on,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for PipRunner {
        fn output(&self, _cmd: &CommandSpec) -> io::Result<CommandOutput> {
            unreachable!("installs stream their output")
        }

        fn status(&self, cmd: &CommandSpec) -> io::Result<Option<i32>> {
            self.calls.borrow_mut().push(cmd.clone());
            match self.fail_on {
                Some(bad) if cmd.args.iter().any(|a| a == bad) => Ok(Some(1)),
                _ => Ok(Some(0)),
            }
        }
    }

    fn reqs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn has_index(cmd: &CommandSpec) -> bool {
        cmd.args.iter().any(|a| a == "--index-url")
    }

    #[test]
    fn test_cpu_family_install_uses_cpu_index() {
        let family = AcceleratedFamily::default();
        let runner = PipRunner::new(None);
        let resolution = resolve(&reqs(&["numpy", "torch"]), &family, Capability::Cpu);

        let report = Installer::new(&runner, Path::new("/venv/bin/python"), &family).install_all(&resolution);
        assert!(report.is_clean());

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args, vec!["-m", "pip", "install", "numpy"]);
        assert_eq!(
            calls[1].args,
            vec![
                "-m",
                "pip",
                "install",
                "torch",
                "torchvision",
                "torchaudio",
                "--index-url",
                "https://download.pytorch.org/whl/cpu",
            ]
        );
    }

    #[test]
    fn test_gpu_family_install_has_no_index() {
        let family = AcceleratedFamily::default();
        let runner = PipRunner::new(None);
        let resolution = resolve(&reqs(&["torch", "numpy"]), &family, Capability::Cuda);

        Installer::new(&runner, Path::new("python3"), &family).install_all(&resolution);

        assert!(runner.calls.borrow().iter().all(|c| !has_index(c)));
    }

    #[test]
    fn test_every_cpu_family_entry_gets_index() {
        let family = AcceleratedFamily {
            cpu_spec: "torch".to_string(),
            ..Default::default()
        };
        let runner = PipRunner::new(None);
        let resolution = resolve(&reqs(&["torch", "torchaudio", "requests"]), &family, Capability::Cpu);

        Installer::new(&runner, Path::new("python3"), &family).install_all(&resolution);

        let calls = runner.calls.borrow();
        assert!(has_index(&calls[0]));
        assert!(has_index(&calls[1]));
        assert!(!has_index(&calls[2]));
    }

    #[test]
    fn test_failure_does_not_stop_the_batch() {
        let family = AcceleratedFamily::default();
        let runner = PipRunner::new(Some("broken-pkg"));
        let resolution = resolve(&reqs(&["numpy", "broken-pkg", "scipy"]), &family, Capability::Cuda);

        let report = Installer::new(&runner, Path::new("python3"), &family).install_all(&resolution);

        assert_eq!(runner.calls.borrow().len(), 3);
        assert_eq!(report.installed, vec!["numpy", "scipy"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].spec, "broken-pkg");
        assert!(report.failed[0].reason.contains("status 1"));
    }

    #[test]
    fn test_spawn_error_is_recorded() {
        struct Unspawnable;
        impl CommandRunner for Unspawnable {
            fn output(&self, _cmd: &CommandSpec) -> io::Result<CommandOutput> {
                unreachable!()
            }
            fn status(&self, _cmd: &CommandSpec) -> io::Result<Option<i32>> {
                Err(io::Error::new(io::ErrorKind::NotFound, "no such file"))
            }
        }

        let family = AcceleratedFamily::default();
        let resolution = resolve(&reqs(&["numpy", "scipy"]), &family, Capability::Cpu);
        let report = Installer::new(&Unspawnable, Path::new("/missing/python"), &family).install_all(&resolution);

        assert_eq!(report.failed.len(), 2);
        assert!(report.failed[0].reason.contains("/missing/python"));
    }

    #[test]
    fn test_pip_options_appended() {
        let family = AcceleratedFamily::default();
        let runner = PipRunner::new(None);
        let resolution = resolve(&reqs(&["requests"]), &family, Capability::Cpu);

        Installer::new(&runner, Path::new("python3"), &family)
            .with_pip_options(reqs(&["--prefer-binary"]))
            .install_all(&resolution);

        assert_eq!(
            runner.calls.borrow()[0].args,
            vec!["-m", "pip", "install", "requests", "--prefer-binary"]
        );
    }

    #[test]
    fn test_dry_run_spawns_nothing() {
        let family = AcceleratedFamily::default();
        let runner = PipRunner::new(None);
        let resolution = resolve(&reqs(&["numpy", "torch"]), &family, Capability::Cpu);

        let report = Installer::new(&runner, Path::new("python3"), &family)
            .dry_run(true)
            .install_all(&resolution);

        assert!(runner.calls.borrow().is_empty());
        assert!(report.installed.is_empty());
        assert_eq!(report.planned, vec!["numpy", "torch torchvision torchaudio"]);
    }

    #[test]
    fn test_manifest_index_cannot_replace_cpu_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "--index-url https://pypi.org/simple\ntorch\nnumpy\n").unwrap();
        let manifest = crate::manifest::Manifest::load(&path).unwrap();

        let family = AcceleratedFamily::default();
        let runner = PipRunner::new(None);
        let resolution = resolve(&manifest.requirements, &family, Capability::Cpu);

        Installer::new(&runner, Path::new("python3"), &family)
            .with_pip_options(manifest.pip_options)
            .install_all(&resolution);

        let calls = runner.calls.borrow();
        let torch = &calls[0].args;
        let indexes: Vec<_> = torch
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--index-url")
            .map(|(i, _)| torch[i + 1].as_str())
            .collect();
        assert_eq!(indexes, vec!["https://download.pytorch.org/whl/cpu"]);
        assert_eq!(torch.last().map(String::as_str), Some("https://download.pytorch.org/whl/cpu"));

        // Entries outside the family keep the manifest's index
        assert_eq!(
            calls[1].args,
            vec!["-m", "pip", "install", "numpy", "--index-url", "https://pypi.org/simple"]
        );
    }

    #[test]
    fn test_without_index_url_spellings() {
        let opts = reqs(&[
            "-i",
            "https://a",
            "--prefer-binary",
            "--index-url=https://b",
            "-ihttps://c",
            "--extra-index-url",
            "https://d",
        ]);
        assert_eq!(
            without_index_url(&opts),
            vec!["--prefer-binary", "--extra-index-url", "https://d"]
        );
    }

    #[test]
    fn test_blank_entry_skipped() {
        let family = AcceleratedFamily::default();
        let runner = PipRunner::new(None);
        let installer = Installer::new(&runner, Path::new("python3"), &family);
        let entry = ResolvedRequirement {
            spec: "   ".to_string(),
            accelerated: false,
        };
        assert!(installer.command_for(&entry, Capability::Cpu).is_none());
    }
}
