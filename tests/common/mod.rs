#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use devcache::catalog::{Catalog, DescriptorSpec};
use devcache::env::{EnvConfigurator, MemoryEnvStore};

/// Scratch home and target volume for one test.
pub struct TestEnvironment {
    temp_dir: TempDir,
    pub store: Arc<MemoryEnvStore>,
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir()?;
        fs::create_dir_all(temp_dir.path().join("home"))?;
        Ok(Self {
            temp_dir,
            store: Arc::new(MemoryEnvStore::new()),
        })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn home(&self) -> PathBuf {
        self.path().join("home")
    }

    pub fn target_root(&self) -> PathBuf {
        self.path().join("packages")
    }

    pub fn env(&self) -> EnvConfigurator {
        EnvConfigurator::new(self.store.clone())
    }

    /// Create `files` (relative path, size in bytes) under `root`.
    pub fn write_tree(&self, root: &Path, files: &[(&str, usize)]) -> Result<()> {
        for (relative, size) in files {
            let path = root.join(relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, vec![0x5a; *size])?;
        }
        Ok(())
    }

    pub fn catalog(&self, specs: Vec<DescriptorSpec>) -> Result<Catalog> {
        Ok(Catalog::new(self.target_root(), specs)?)
    }
}

/// Descriptor detected through an existing path instead of a command so the
/// tests do not depend on what is installed on the machine.
pub fn descriptor(
    name: &str,
    env_var: &str,
    marker: &Path,
    sources: &[PathBuf],
) -> DescriptorSpec {
    DescriptorSpec {
        name: name.to_string(),
        detection_commands: vec![],
        detection_paths: vec![marker.display().to_string()],
        env_var: env_var.to_string(),
        env_value_template: None,
        target: name.to_string(),
        source_paths: sources.iter().map(|p| p.display().to_string()).collect(),
        probe: None,
    }
}
