//! Project configuration from reqsmith.yaml
//!
//! Every field has a default, so a project without a config file installs
//! `requirements.txt` from the current directory with the PyTorch family
//! as the accelerated package set.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReqsmithError, Result};

pub const CONFIG_FILE_NAME: &str = "reqsmith.yaml";
const ALT_CONFIG_FILE_NAME: &str = "reqsmith.yml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Requirements manifest, relative to the config file's directory
    pub manifest: String,

    /// Directory names checked for a project-local virtual environment
    pub venv_dirs: Vec<String>,

    /// Interpreter used when no project-local venv exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<String>,

    pub probe: ProbeConfig,

    pub accelerated: AcceleratedFamily,

    /// Directory the config was loaded from (cwd when none was found)
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            manifest: "requirements.txt".to_string(),
            venv_dirs: vec!["venv".to_string(), ".venv".to_string(), "env".to_string()],
            python: None,
            probe: ProbeConfig::default(),
            accelerated: AcceleratedFamily::default(),
            base_dir: None,
        }
    }
}

/// GPU management tool used for the capability probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub command: String,
    /// Text that must appear in the tool's stdout
    pub marker: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command: "nvidia-smi".to_string(),
            marker: "NVIDIA-SMI".to_string(),
        }
    }
}

/// Package family that ships separate CPU and CUDA builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceleratedFamily {
    /// Primary package name (e.g. `torch`)
    pub name: String,
    /// Companion packages built against the primary one
    pub related: Vec<String>,
    /// Installed when a CUDA GPU is present
    pub gpu_spec: String,
    /// Installed otherwise, from `cpu_index_url`
    pub cpu_spec: String,
    pub cpu_index_url: String,
}

impl Default for AcceleratedFamily {
    fn default() -> Self {
        Self {
            name: "torch".to_string(),
            related: vec!["torchvision".to_string(), "torchaudio".to_string()],
            gpu_spec: "torch torchvision torchaudio".to_string(),
            cpu_spec: "torch torchvision torchaudio".to_string(),
            cpu_index_url: "https://download.pytorch.org/whl/cpu".to_string(),
        }
    }
}

impl AppConfig {
    /// Look for reqsmith.yaml in the current directory or parent directories
    pub fn discover() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?;
        discover_from(&cwd)
    }

    /// Load configuration from a path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReqsmithError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut config: AppConfig = serde_yaml::from_str(&content)
            .map_err(|e| ReqsmithError::Config(format!("Invalid {}: {}", path.display(), e)))?;

        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    /// Discovered config (or defaults) with environment overrides applied.
    pub fn load_from_cwd() -> Result<Self> {
        let mut config = match Self::discover() {
            Some(path) => {
                tracing::debug!("using config {}", path.display());
                Self::load(&path)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `REQSMITH_*` overrides from the given lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(manifest) = lookup("REQSMITH_MANIFEST") {
            self.manifest = manifest;
        }
        if let Some(url) = lookup("REQSMITH_CPU_INDEX_URL") {
            self.accelerated.cpu_index_url = url;
        }
        if let Some(python) = lookup("REQSMITH_PYTHON") {
            self.python = Some(python);
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let family = &self.accelerated;

        if family.name.trim().is_empty() {
            return Err(ReqsmithError::Config(
                "accelerated.name must not be empty".to_string(),
            ));
        }

        if family.gpu_spec.trim().is_empty() || family.cpu_spec.trim().is_empty() {
            return Err(ReqsmithError::Config(format!(
                "accelerated.gpu_spec and accelerated.cpu_spec must name at least one package for '{}'",
                family.name
            )));
        }

        if family.cpu_index_url.trim().is_empty() {
            return Err(ReqsmithError::Config(
                "accelerated.cpu_index_url must not be empty".to_string(),
            ));
        }

        if self.probe.command.trim().is_empty() {
            return Err(ReqsmithError::Config(
                "probe.command must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Root used for relative paths and venv discovery.
    pub fn project_root(&self) -> PathBuf {
        self.base_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn manifest_path(&self) -> PathBuf {
        resolve_path(&self.project_root(), &self.manifest)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_yaml()?)?;
        Ok(())
    }
}

/// Walk from `start` towards the filesystem root looking for a config file.
fn discover_from(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            return Some(config_path);
        }

        let alt_path = current.join(ALT_CONFIG_FILE_NAME);
        if alt_path.exists() {
            return Some(alt_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Expand `~` and anchor relative paths at `base`.
pub fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.manifest, "requirements.txt");
        assert_eq!(config.venv_dirs, vec!["venv", ".venv", "env"]);
        assert_eq!(config.probe.command, "nvidia-smi");
        assert_eq!(config.accelerated.name, "torch");
        assert_eq!(
            config.accelerated.cpu_index_url,
            "https://download.pytorch.org/whl/cpu"
        );
        assert!(config.python.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
manifest: deps/requirements-dev.txt
accelerated:
  cpu_spec: torch
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.manifest, "deps/requirements-dev.txt");
        assert_eq!(config.accelerated.cpu_spec, "torch");
        assert_eq!(config.accelerated.gpu_spec, "torch torchvision torchaudio");
        assert_eq!(config.accelerated.related, vec!["torchvision", "torchaudio"]);
        assert_eq!(config.probe.marker, "NVIDIA-SMI");
    }

    #[test]
    fn test_config_serialization() {
        let yaml = AppConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("manifest: requirements.txt"));
        assert!(yaml.contains("cpu_index_url: https://download.pytorch.org/whl/cpu"));
        // python should not appear when None
        assert!(!yaml.contains("python:"));
        assert!(!yaml.contains("base_dir"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("REQSMITH_MANIFEST", "other.txt"),
            ("REQSMITH_CPU_INDEX_URL", "https://mirror.example/whl/cpu"),
            ("REQSMITH_PYTHON", "/opt/python/bin/python3"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.manifest, "other.txt");
        assert_eq!(config.accelerated.cpu_index_url, "https://mirror.example/whl/cpu");
        assert_eq!(config.python.as_deref(), Some("/opt/python/bin/python3"));
    }

    #[test]
    fn test_no_env_overrides_leaves_config() {
        let mut config = AppConfig::default();
        config.apply_overrides(|_| None);
        assert_eq!(config.manifest, "requirements.txt");
        assert!(config.python.is_none());
    }

    #[test]
    fn test_validate_empty_family_name() {
        let mut config = AppConfig::default();
        config.accelerated.name = "  ".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("accelerated.name"));
    }

    #[test]
    fn test_validate_empty_spec() {
        let mut config = AppConfig::default();
        config.accelerated.cpu_spec = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_index_url() {
        let mut config = AppConfig::default();
        config.accelerated.cpu_index_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_sets_base_dir_and_manifest_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "manifest: reqs/base.txt\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.base_dir.as_deref(), Some(dir.path()));
        assert_eq!(config.manifest_path(), dir.path().join("reqs/base.txt"));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "venv_dirs: {not: [a list\n").unwrap();

        let result = AppConfig::load(&path);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid"));
    }

    #[test]
    fn test_discover_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(ALT_CONFIG_FILE_NAME), "").unwrap();

        let found = discover_from(&nested).unwrap();
        assert_eq!(found, dir.path().join(ALT_CONFIG_FILE_NAME));
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = AppConfig::default();
        config.venv_dirs = vec![".env".to_string()];
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.venv_dirs, vec![".env"]);
    }

    #[test]
    fn test_resolve_path_absolute_untouched() {
        let base = Path::new("/project");
        assert_eq!(resolve_path(base, "/etc/reqs.txt"), PathBuf::from("/etc/reqs.txt"));
        assert_eq!(resolve_path(base, "reqs.txt"), PathBuf::from("/project/reqs.txt"));
    }
}
