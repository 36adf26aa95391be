pub mod config;
pub mod install;
pub mod probe;
pub mod resolve;

use std::path::PathBuf;

use crate::config::{resolve_path, AppConfig};

/// Manifest from the command line (relative to cwd, `-` for stdin) or from config.
pub(crate) fn manifest_path(config: &AppConfig, arg: Option<String>) -> PathBuf {
    match arg {
        Some(path) if path == "-" => PathBuf::from(path),
        Some(path) => {
            let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            resolve_path(&cwd, &path)
        }
        None => config.manifest_path(),
    }
}
