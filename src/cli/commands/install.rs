//! `reqsmith install`: probe, guard, resolve, install, report.

use std::path::Path;

use console::style;

use crate::config::AppConfig;
use crate::environment::{self, EnvironmentContext};
use crate::error::{ReqsmithError, Result};
use crate::hardware::{self, Capability};
use crate::installer::{InstallReport, Installer};
use crate::manifest::Manifest;
use crate::process::{CommandRunner, SystemRunner};
use crate::prompt::{AutoConfirmPrompt, ConfirmPrompt, TerminalPrompt};
use crate::resolve::resolve;

pub fn execute(
    config: &AppConfig,
    manifest: Option<String>,
    python: Option<String>,
    yes: bool,
    forced: Option<Capability>,
    dry_run: bool,
) -> Result<()> {
    let runner = SystemRunner;
    let manifest_path = super::manifest_path(config, manifest);

    println!("{}", style("Checking for CUDA GPU...").dim());
    let capability = hardware::resolve_capability(&runner, &config.probe, forced);
    print_capability(capability, &config.accelerated.name);

    let python = python.or_else(|| config.python.clone());
    let context = EnvironmentContext::detect(
        &runner,
        python.as_deref(),
        &config.project_root(),
        &config.venv_dirs,
    )?;

    let prompt: &dyn ConfirmPrompt = if yes { &AutoConfirmPrompt } else { &TerminalPrompt };

    let report = run(
        config,
        &manifest_path,
        &context,
        capability,
        &runner,
        prompt,
        dry_run,
    )?;

    print_report(&report, dry_run);
    Ok(())
}

/// Everything after the probe, with collaborators passed in.
pub(crate) fn run(
    config: &AppConfig,
    manifest_path: &Path,
    context: &EnvironmentContext,
    capability: Capability,
    runner: &dyn CommandRunner,
    prompt: &dyn ConfirmPrompt,
    dry_run: bool,
) -> Result<InstallReport> {
    environment::guard(context, prompt)?;

    let python = context
        .install_interpreter()
        .ok_or_else(|| ReqsmithError::InterpreterNotFound("python3, python".to_string()))?;
    if context.local_venv.is_some() {
        println!(
            "Using project environment {}",
            style(python.display()).dim()
        );
    }

    let manifest = Manifest::load(manifest_path)?;
    let resolution = resolve(&manifest.requirements, &config.accelerated, capability);
    tracing::debug!("resolved for {}: {:?}", capability, resolution.specs());

    println!("{}", style("Installing dependencies...").bold());
    let report = Installer::new(runner, python, &config.accelerated)
        .with_pip_options(manifest.pip_options)
        .dry_run(dry_run)
        .install_all(&resolution);

    Ok(report)
}

fn print_capability(capability: Capability, family: &str) {
    match capability {
        Capability::Cuda => println!(
            "{} CUDA GPU detected. Installing {} with CUDA support.",
            style("✓").green().bold(),
            style(family).bold()
        ),
        Capability::Cpu => println!(
            "{} No CUDA GPU detected. Installing the CPU-only build of {}.",
            style("●").yellow().bold(),
            style(family).bold()
        ),
    }
}

fn print_report(report: &InstallReport, dry_run: bool) {
    println!();

    if dry_run {
        println!(
            "{}",
            style(format!("Dry run: {} pip command(s) planned.", report.planned.len())).dim()
        );
        return;
    }

    if !report.is_clean() {
        println!(
            "{}",
            style(format!("{} dependency(ies) failed:", report.failed.len()))
                .red()
                .bold()
        );
        for failure in &report.failed {
            println!(
                "  {} {} {}",
                style("✗").red(),
                failure.spec,
                style(format!("({})", failure.reason)).dim()
            );
        }
        println!();
    }

    println!("{}", style("Dependency installation complete.").green().bold());
}
