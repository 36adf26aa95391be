pub mod commands;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::error::Result;
use crate::hardware::Capability;

#[derive(Parser)]
#[command(name = "reqsmith")]
#[command(version)]
#[command(about = "Install Python requirements with the right PyTorch build for this machine")]
#[command(long_about = "Reads requirements.txt, checks for a CUDA GPU with nvidia-smi, and installs \
each requirement with pip, swapping PyTorch for its CPU-only build when no GPU is found.\n\n\
A failing package is reported and skipped; the rest still get installed.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install every requirement in the manifest
    Install {
        /// Requirements file, `-` for stdin (default: from reqsmith.yaml, else requirements.txt)
        manifest: Option<String>,

        /// Interpreter to use when the project has no local venv
        #[arg(long, env = "REQSMITH_PYTHON")]
        python: Option<String>,

        /// Continue outside a virtual environment without asking
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        capability: CapabilityArgs,

        /// Print pip commands instead of running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the requirement list that would be installed
    Resolve {
        /// Requirements file, `-` for stdin (default: from reqsmith.yaml, else requirements.txt)
        manifest: Option<String>,

        #[command(flatten)]
        capability: CapabilityArgs,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check whether a CUDA GPU is available
    Probe,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Skip the probe and pick a build explicitly.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct CapabilityArgs {
    /// Install CPU-only builds
    #[arg(long, conflicts_with = "gpu")]
    pub cpu: bool,

    /// Install CUDA builds
    #[arg(long)]
    pub gpu: bool,
}

impl CapabilityArgs {
    pub fn forced(self) -> Option<Capability> {
        match (self.cpu, self.gpu) {
            (true, _) => Some(Capability::Cpu),
            (_, true) => Some(Capability::Cuda),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default reqsmith.yaml in the current directory
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Install {
                manifest,
                python,
                yes,
                capability,
                dry_run,
            } => {
                let config = AppConfig::load_from_cwd()?;
                commands::install::execute(&config, manifest, python, yes, capability.forced(), dry_run)
            }
            Commands::Resolve {
                manifest,
                capability,
                json,
            } => {
                let config = AppConfig::load_from_cwd()?;
                commands::resolve::execute(&config, manifest, capability.forced(), json)
            }
            Commands::Probe => {
                let config = AppConfig::load_from_cwd()?;
                commands::probe::execute(&config)
            }
            Commands::Config { command } => match command {
                ConfigCommands::Show => commands::config::show(),
                ConfigCommands::Init { force } => commands::config::init(force),
            },
        }
    }
}
