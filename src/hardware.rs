//! CUDA capability probe.
//!
//! The probe asks `nvidia-smi` (or the configured replacement) whether a
//! driver is loaded. Anything short of a successful run with the expected
//! banner means no GPU: a missing binary, a crash and unexpected output all
//! downgrade silently to CPU.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ProbeConfig;
use crate::process::{CommandRunner, CommandSpec};

/// Which build of the accelerated family the host should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Cuda,
    Cpu,
}

impl Capability {
    pub fn from_gpu(detected: bool) -> Self {
        if detected {
            Capability::Cuda
        } else {
            Capability::Cpu
        }
    }

    pub fn has_gpu(self) -> bool {
        matches!(self, Capability::Cuda)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Cuda => write!(f, "cuda"),
            Capability::Cpu => write!(f, "cpu"),
        }
    }
}

/// Run the GPU management tool and report whether it recognised a GPU.
pub fn detect_cuda(runner: &dyn CommandRunner, probe: &ProbeConfig) -> bool {
    let cmd = CommandSpec::new(&probe.command);

    match runner.output(&cmd) {
        Ok(output) if output.success && output.stdout.contains(&probe.marker) => {
            tracing::debug!("{} reported a GPU", probe.command);
            true
        }
        Ok(output) => {
            tracing::debug!(
                "{} exited with {:?} without '{}' in its output",
                probe.command,
                output.code,
                probe.marker
            );
            false
        }
        Err(e) => {
            tracing::debug!("{} unavailable: {}", probe.command, e);
            false
        }
    }
}

/// Probe the host unless the operator forced a capability.
pub fn resolve_capability(
    runner: &dyn CommandRunner,
    probe: &ProbeConfig,
    forced: Option<Capability>,
) -> Capability {
    match forced {
        Some(capability) => {
            tracing::debug!("capability forced to {}", capability);
            capability
        }
        None => Capability::from_gpu(detect_cuda(runner, probe)),
    }
}
