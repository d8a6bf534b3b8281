//! Machine-scope environment variables.
//!
//! # Architecture
//!
//! - [`EnvStore`]: raw get/set of one variable at system scope
//! - [`RegistryEnvStore`]: Windows machine environment in the registry
//! - [`EnvironmentFileStore`]: `/etc/environment` on Unix systems
//! - [`MemoryEnvStore`]: process-local store for tests and previews
//! - [`EnvConfigurator`]: descriptor-aware layer that renders and parses
//!   templated values
//!
//! Writes never touch the current process environment. Shells and services
//! that are already running keep their old values until restarted.

mod etc_environment;
mod registry;

pub use etc_environment::EnvironmentFileStore;
pub use registry::RegistryEnvStore;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::catalog::CacheDescriptor;
use crate::error::EngineError;

pub trait EnvStore: Send + Sync {
    /// Human readable location of the store, used in messages.
    fn location(&self) -> String;

    /// Read a variable. Empty values are reported as absent.
    fn get(&self, name: &str) -> Result<Option<String>, EngineError>;

    /// Write a variable in one step; readers see either the old or the new value.
    fn set(&self, name: &str, value: &str) -> Result<(), EngineError>;
}

/// The durable machine-wide store for this platform.
pub fn system_store() -> Arc<dyn EnvStore> {
    if cfg!(windows) {
        Arc::new(RegistryEnvStore)
    } else {
        Arc::new(EnvironmentFileStore::system())
    }
}

#[derive(Debug, Default)]
pub struct MemoryEnvStore {
    vars: Mutex<BTreeMap<String, String>>,
}

impl MemoryEnvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: Mutex::new(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.vars.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl EnvStore for MemoryEnvStore {
    fn location(&self) -> String {
        "in-memory environment".to_string()
    }

    fn get(&self, name: &str) -> Result<Option<String>, EngineError> {
        let vars = self.vars.lock().map_err(|_| EngineError::EnvReadFailed {
            name: name.to_string(),
            reason: "store lock poisoned".into(),
        })?;
        Ok(vars.get(name).filter(|v| !v.trim().is_empty()).cloned())
    }

    fn set(&self, name: &str, value: &str) -> Result<(), EngineError> {
        validate_value(name, value)?;
        let mut vars = self.vars.lock().map_err(|_| EngineError::EnvWriteFailed {
            name: name.to_string(),
            reason: "store lock poisoned".into(),
        })?;
        vars.insert(name.to_string(), value.to_string());
        Ok(())
    }
}

/// Values are single-line strings on every supported store.
pub(crate) fn validate_value(name: &str, value: &str) -> Result<(), EngineError> {
    if value.contains(['\n', '\r', '\0']) {
        return Err(EngineError::EnvWriteFailed {
            name: name.to_string(),
            reason: "value contains a line break or NUL character".into(),
        });
    }
    Ok(())
}

/// Reads and writes descriptor variables, honouring value templates.
#[derive(Clone)]
pub struct EnvConfigurator {
    store: Arc<dyn EnvStore>,
}

impl EnvConfigurator {
    pub fn new(store: Arc<dyn EnvStore>) -> Self {
        Self { store }
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    pub fn get(&self, name: &str) -> Result<Option<String>, EngineError> {
        self.store.get(name)
    }

    pub fn set(&self, name: &str, value: &str) -> Result<(), EngineError> {
        self.store.set(name, value)
    }

    /// The value `configure` would write, without writing it.
    pub fn planned_value(
        &self,
        descriptor: &CacheDescriptor,
        path: &Path,
    ) -> Result<String, EngineError> {
        match &descriptor.env_value_template {
            Some(template) => {
                let existing = self.store.get(&descriptor.env_var)?;
                Ok(template.render(existing.as_deref(), path))
            }
            None => Ok(path.display().to_string()),
        }
    }

    /// Point the descriptor's variable at `path`. Returns the value written.
    pub fn configure(
        &self,
        descriptor: &CacheDescriptor,
        path: &Path,
    ) -> Result<String, EngineError> {
        let value = self.planned_value(descriptor, path)?;
        self.store.set(&descriptor.env_var, &value)?;
        Ok(value)
    }

    /// Path the descriptor's variable currently points at, if set.
    ///
    /// For templated variables this is the embedded path; a variable that is
    /// set but lacks the embedded option counts as not set.
    pub fn configured_path(
        &self,
        descriptor: &CacheDescriptor,
    ) -> Result<Option<PathBuf>, EngineError> {
        let Some(value) = self.store.get(&descriptor.env_var)? else {
            return Ok(None);
        };
        Ok(match &descriptor.env_value_template {
            Some(template) => template.extract(&value),
            None => Some(PathBuf::from(value.trim())),
        })
    }
}
