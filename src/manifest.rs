//! Requirements manifest parsing.
//!
//! One requirement per line. `#` starts a comment anywhere on the line and
//! blank lines are dropped. `-r FILE` pulls in another manifest at that
//! position; other option lines are kept aside as pip arguments, with file
//! arguments anchored at the manifest that names them.

use std::io::Read;
use std::path::{Path, PathBuf};

use crate::config::resolve_path;
use crate::error::{ReqsmithError, Result};

const COMMENT_MARKER: char = '#';
const STDIN_PATH: &str = "-";

/// Options whose value is a path relative to the manifest.
const PATH_OPTIONS: &[&str] = &["-c", "--constraint", "-f", "--find-links"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub path: PathBuf,
    /// Requirement entries in file order
    pub requirements: Vec<String>,
    /// Option lines (`--extra-index-url ...`) split into pip arguments
    pub pip_options: Vec<String>,
}

enum Line<'a> {
    Requirement(&'a str),
    Include(&'a str),
    Options(&'a str),
}

impl Manifest {
    /// Read a manifest and everything it includes. `-` reads stdin.
    pub fn load(path: &Path) -> Result<Self> {
        if path == Path::new(STDIN_PATH) {
            return Self::from_reader(std::io::stdin());
        }

        let mut manifest = Manifest {
            path: path.to_path_buf(),
            ..Default::default()
        };
        let mut stack = Vec::new();
        manifest.read_file(path, &mut stack)?;

        tracing::debug!(
            "{}: {} requirement(s), {} pip option(s)",
            path.display(),
            manifest.requirements.len(),
            manifest.pip_options.len()
        );
        Ok(manifest)
    }

    /// Read a manifest streamed in rather than stored in a file, as `-` does.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let content = std::io::read_to_string(reader)
            .map_err(|e| ReqsmithError::manifest(STDIN_PATH, e.to_string()))?;
        Ok(Manifest {
            path: PathBuf::from(STDIN_PATH),
            ..Self::parse(&content)
        })
    }

    /// Parse manifest text that has no includes to follow. Relative option
    /// paths are left for pip to resolve against the working directory.
    pub fn parse(content: &str) -> Self {
        let mut manifest = Manifest::default();
        for raw in content.lines() {
            match classify(raw) {
                Some(Line::Requirement(req)) => manifest.requirements.push(req.to_string()),
                Some(Line::Options(opts)) => manifest.push_options(opts, None),
                Some(Line::Include(target)) => {
                    tracing::warn!("ignoring include of {} outside a manifest file", target)
                }
                None => {}
            }
        }
        manifest
    }

    fn read_file(&mut self, path: &Path, stack: &mut Vec<PathBuf>) -> Result<()> {
        let canonical = path
            .canonicalize()
            .map_err(|e| ReqsmithError::manifest(path, e.to_string()))?;

        if stack.contains(&canonical) {
            return Err(ReqsmithError::IncludeCycle(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ReqsmithError::manifest(path, e.to_string()))?;

        stack.push(canonical);
        let base = path.parent().unwrap_or_else(|| Path::new("."));

        for raw in content.lines() {
            match classify(raw) {
                Some(Line::Requirement(req)) => self.requirements.push(req.to_string()),
                Some(Line::Options(opts)) => self.push_options(opts, Some(base)),
                Some(Line::Include(target)) => {
                    let included = resolve_path(base, target);
                    tracing::debug!("{} includes {}", path.display(), included.display());
                    self.read_file(&included, stack)?;
                }
                None => {}
            }
        }

        stack.pop();
        Ok(())
    }

    fn push_options(&mut self, opts: &str, base: Option<&Path>) {
        let mut tokens = opts.split_whitespace();

        while let Some(token) = tokens.next() {
            if PATH_OPTIONS.contains(&token) {
                self.pip_options.push(token.to_string());
                if let Some(value) = tokens.next() {
                    self.pip_options.push(anchor(base, value));
                }
                continue;
            }

            match split_path_option(token) {
                Some((flag, value)) => {
                    self.pip_options.push(format!("{}{}", flag, anchor(base, value)))
                }
                None => self.pip_options.push(token.to_string()),
            }
        }
    }
}

/// `--constraint=FILE` or `-cFILE` split into the flag prefix and the value.
fn split_path_option(token: &str) -> Option<(&str, &str)> {
    PATH_OPTIONS.iter().find_map(|flag| {
        let value = if flag.starts_with("--") {
            token.strip_prefix(*flag)?.strip_prefix('=')?
        } else if token.starts_with("--") {
            return None;
        } else {
            token.strip_prefix(*flag).filter(|rest| !rest.is_empty())?
        };
        Some(token.split_at(token.len() - value.len()))
    })
}

/// Resolve a file argument against the manifest's directory. URLs pass through.
fn anchor(base: Option<&Path>, value: &str) -> String {
    match base {
        Some(base) if !value.contains("://") => {
            resolve_path(base, value).to_string_lossy().into_owned()
        }
        _ => value.to_string(),
    }
}

/// Strip the comment from a line and trim it. `None` for nothing left.
pub fn strip_comment(line: &str) -> Option<&str> {
    let content = match line.find(COMMENT_MARKER) {
        Some(idx) => &line[..idx],
        None => line,
    };
    let content = content.trim();
    if content.is_empty() {
        None
    } else {
        Some(content)
    }
}

fn classify(raw: &str) -> Option<Line<'_>> {
    let line = strip_comment(raw)?;

    if let Some(target) = include_target(line) {
        return Some(Line::Include(target));
    }

    // Editable installs are requirements even though they look like options
    if line.starts_with('-') && !line.starts_with("-e") && !line.starts_with("--editable") {
        return Some(Line::Options(line));
    }

    Some(Line::Requirement(line))
}

fn include_target(line: &str) -> Option<&str> {
    let rest = if let Some(rest) = line.strip_prefix("--requirement") {
        rest.strip_prefix('=').unwrap_or(rest)
    } else {
        line.strip_prefix("-r")?
    };

    let target = rest.trim();
    if target.is_empty() {
        None
    } else {
        Some(target)
    }
}
