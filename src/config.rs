use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, DescriptorSpec, builtin_specs};
use crate::common::paths;

#[cfg(windows)]
pub const DEFAULT_TARGET_ROOT: &str = r"D:\packages";
#[cfg(not(windows))]
pub const DEFAULT_TARGET_ROOT: &str = "/mnt/dev/packages";

/// What to do with a source directory after a verified copy.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CleanupMode {
    #[default]
    Ask,
    Always,
    Never,
}

fn default_target_root() -> PathBuf {
    PathBuf::from(DEFAULT_TARGET_ROOT)
}

fn default_strict_copy() -> bool {
    true
}

fn default_probe_timeout_secs() -> u64 {
    30
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_target_root")]
    pub target_root: PathBuf,
    /// Managers never touched, by name.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Fail a move when any single entry could not be copied.
    #[serde(default = "default_strict_copy")]
    pub strict_copy: bool,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default)]
    pub cleanup: CleanupMode,
    /// Extra managers appended after the built-in ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom: Vec<DescriptorSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_root: default_target_root(),
            exclude: Vec::new(),
            strict_copy: default_strict_copy(),
            probe_timeout_secs: default_probe_timeout_secs(),
            cleanup: CleanupMode::default(),
            custom: Vec::new(),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        Ok(paths::devcache_config_dir()?.join("config.toml"))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let s = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&s)
            .with_context(|| format!("parsing config toml {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config directory {}", parent.display()))?;
        }
        let toml = toml::to_string_pretty(self).context("serializing config to toml")?;
        fs::write(path, toml).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_root.as_os_str().is_empty() {
            bail!("target_root must not be empty");
        }
        if !self.target_root.is_absolute() {
            bail!(
                "target_root must be an absolute path, got {}",
                self.target_root.display()
            );
        }
        if self.probe_timeout_secs == 0 {
            bail!("probe_timeout_secs must be at least 1");
        }
        // Surfaces duplicate names and malformed custom entries early
        self.build_catalog(None)?;
        Ok(())
    }

    /// Built-in plus custom descriptors under `target_root` (or the
    /// override), minus the excluded ones.
    pub fn build_catalog(&self, target_root: Option<&Path>) -> Result<Catalog> {
        let root = target_root.unwrap_or(&self.target_root);
        let mut specs = builtin_specs();
        specs.extend(self.custom.iter().cloned());
        let catalog = Catalog::new(root, specs).context("building package manager catalog")?;
        Ok(catalog.exclude(&self.exclude))
    }
}
