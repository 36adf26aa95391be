//! Requirement resolution.
//!
//! Turns the manifest's entries into the list handed to pip: entries for the
//! accelerated family collapse into a single capability-specific entry and
//! duplicates are dropped. Pure; the capability comes in as a value.

use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::Serialize;

use crate::config::AcceleratedFamily;
use crate::hardware::Capability;

/// One logical pip invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRequirement {
    /// Whitespace-separated specifiers installed together
    pub spec: String,
    /// Touches the accelerated family (gets the CPU index when no GPU)
    pub accelerated: bool,
}

impl ResolvedRequirement {
    pub fn specifiers(&self) -> Vec<&str> {
        self.spec.split_whitespace().collect()
    }
}

impl fmt::Display for ResolvedRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub capability: Capability,
    pub entries: Vec<ResolvedRequirement>,
}

impl Resolution {
    pub fn specs(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.spec.as_str()).collect()
    }
}

impl AcceleratedFamily {
    /// Replacement entry for this capability.
    pub fn spec_for(&self, capability: Capability) -> &str {
        match capability {
            Capability::Cuda => &self.gpu_spec,
            Capability::Cpu => &self.cpu_spec,
        }
    }

    /// Normalised names of the primary and related packages.
    pub fn members(&self) -> HashSet<String> {
        std::iter::once(&self.name)
            .chain(self.related.iter())
            .map(|name| normalize_name(name))
            .collect()
    }
}

/// Rewrite and deduplicate manifest entries for a capability.
///
/// An entry is replaced by the family's spec when it names the primary
/// package or any package the spec already installs. Related packages the
/// spec leaves out stay as they are but are still marked accelerated.
pub fn resolve(
    requirements: &[String],
    family: &AcceleratedFamily,
    capability: Capability,
) -> Resolution {
    let replacement = collapse_whitespace(family.spec_for(capability));
    let primary = normalize_name(&family.name);
    let members = family.members();

    let mut covered: HashSet<String> = replacement
        .split_whitespace()
        .filter_map(package_name)
        .map(|name| normalize_name(&name))
        .collect();
    covered.insert(primary);

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for raw in requirements {
        let requirement = collapse_whitespace(raw);
        if requirement.is_empty() {
            continue;
        }

        let name = first_package_name(&requirement).map(|n| normalize_name(&n));

        let entry = match name {
            Some(ref name) if covered.contains(name) => {
                if requirement != replacement {
                    tracing::debug!("'{}' -> '{}' ({})", requirement, replacement, capability);
                }
                ResolvedRequirement {
                    spec: replacement.clone(),
                    accelerated: true,
                }
            }
            Some(ref name) if members.contains(name) => ResolvedRequirement {
                spec: requirement,
                accelerated: true,
            },
            _ => ResolvedRequirement {
                spec: requirement,
                accelerated: false,
            },
        };

        if seen.insert(entry.spec.clone()) {
            entries.push(entry);
        } else {
            tracing::debug!("dropping duplicate '{}'", entry.spec);
        }
    }

    Resolution {
        capability,
        entries,
    }
}

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?").expect("valid package name regex")
    })
}

/// Distribution name at the start of a single requirement specifier.
///
/// Returns `None` for options, paths and URLs.
pub fn package_name(specifier: &str) -> Option<String> {
    let specifier = specifier.trim();
    if specifier.starts_with('-') || specifier.contains("://") || specifier.starts_with('.') {
        return None;
    }
    if specifier.starts_with('/') {
        return None;
    }
    name_regex().find(specifier).map(|m| m.as_str().to_string())
}

fn first_package_name(requirement: &str) -> Option<String> {
    requirement.split_whitespace().next().and_then(package_name)
}

/// PEP 503 normalisation: lowercase, runs of `-`, `_` and `.` become `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_separator = false;

    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            if !in_separator {
                out.push('-');
            }
            in_separator = true;
        } else {
            out.push(c.to_ascii_lowercase());
            in_separator = false;
        }
    }

    out
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
