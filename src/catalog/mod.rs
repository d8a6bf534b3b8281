//! Package-manager descriptors and the validated catalog built from them.
//!
//! # Architecture
//!
//! - [`DescriptorSpec`]: descriptor as written in the built-in table or in the
//!   config file, with the target still relative to the target root
//! - [`CacheDescriptor`]: resolved, validated descriptor the engine works with
//! - [`Catalog`]: ordered set of descriptors with unique names and variables
//!
//! Per-manager differences are data, not code: a templated environment value
//! ([`ValueTemplate`]) and an optional external probe ([`ProbeKind`]) cover
//! everything the built-in managers need.

mod builtin;
pub mod pattern;
mod template;

pub use builtin::{BUILTINS, BuiltinDescriptor, builtin_specs};
pub use template::{PATH_PLACEHOLDER, ValueTemplate};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// External status queries for managers whose sub-tools may ignore the
/// environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeKind {
    /// `dotnet nuget locals global-packages --list`
    DotnetNugetLocals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSpec {
    /// Display identifier, unique in the catalog.
    pub name: String,
    /// Executables whose presence on PATH means the manager is installed.
    #[serde(default)]
    pub detection_commands: Vec<String>,
    /// Path patterns whose existence means the manager is installed.
    #[serde(default)]
    pub detection_paths: Vec<String>,
    /// Variable the manager reads its cache location from.
    pub env_var: String,
    /// Set when the variable holds an option string rather than a bare path.
    #[serde(default)]
    pub env_value_template: Option<String>,
    /// Cache location, relative to the target root unless absolute.
    pub target: String,
    /// Candidate locations to migrate from; the first existing one wins.
    #[serde(default)]
    pub source_paths: Vec<String>,
    #[serde(default)]
    pub probe: Option<ProbeKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheDescriptor {
    pub name: String,
    pub detection_commands: Vec<String>,
    pub detection_paths: Vec<String>,
    pub env_var: String,
    pub env_value_template: Option<ValueTemplate>,
    pub target_path: PathBuf,
    pub source_paths: Vec<String>,
    pub probe: Option<ProbeKind>,
}

impl CacheDescriptor {
    fn resolve(spec: DescriptorSpec, target_root: &Path) -> Result<Self, EngineError> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            return Err(EngineError::ConfigInvalid(
                "descriptor with an empty name".into(),
            ));
        }

        let env_var = spec.env_var.trim().to_string();
        if env_var.is_empty()
            || env_var.contains('=')
            || env_var.chars().any(char::is_whitespace)
        {
            return Err(EngineError::ConfigInvalid(format!(
                "{}: invalid environment variable name '{}'",
                name, spec.env_var
            )));
        }

        let target = spec.target.trim();
        if target.is_empty() {
            return Err(EngineError::ConfigInvalid(format!(
                "{}: target path is empty",
                name
            )));
        }
        let target = Path::new(target);
        let target_path = if target.is_absolute() {
            target.to_path_buf()
        } else {
            target_root.join(target)
        };

        let env_value_template = spec
            .env_value_template
            .as_deref()
            .map(ValueTemplate::parse)
            .transpose()
            .map_err(|e| EngineError::ConfigInvalid(format!("{}: {}", name, e)))?;

        Ok(Self {
            name,
            detection_commands: spec.detection_commands,
            detection_paths: spec.detection_paths,
            env_var,
            env_value_template,
            target_path,
            source_paths: spec.source_paths,
            probe: spec.probe,
        })
    }

    /// First existing source candidate, if any.
    ///
    /// Later candidates are never considered even when they exist too.
    pub fn locate_source(&self) -> Option<PathBuf> {
        self.source_paths
            .iter()
            .flat_map(|pattern| pattern::existing_matches(pattern))
            .find(|path| path.is_dir())
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    target_root: PathBuf,
    descriptors: Vec<CacheDescriptor>,
}

impl Catalog {
    /// Validate and resolve `specs` against `target_root`.
    ///
    /// Names and variable names are compared case-insensitively: Windows
    /// treats environment variable names that way.
    pub fn new(
        target_root: impl Into<PathBuf>,
        specs: impl IntoIterator<Item = DescriptorSpec>,
    ) -> Result<Self, EngineError> {
        let target_root = target_root.into();
        if target_root.as_os_str().is_empty() {
            return Err(EngineError::ConfigInvalid("target root is empty".into()));
        }

        let mut names = HashSet::new();
        let mut env_vars = HashSet::new();
        let mut descriptors = Vec::new();

        for spec in specs {
            let descriptor = CacheDescriptor::resolve(spec, &target_root)?;
            if !names.insert(descriptor.name.to_lowercase()) {
                return Err(EngineError::ConfigInvalid(format!(
                    "duplicate package manager name: {}",
                    descriptor.name
                )));
            }
            if !env_vars.insert(descriptor.env_var.to_uppercase()) {
                return Err(EngineError::ConfigInvalid(format!(
                    "{}: environment variable {} is already used by another descriptor",
                    descriptor.name, descriptor.env_var
                )));
            }
            descriptors.push(descriptor);
        }

        Ok(Self {
            target_root,
            descriptors,
        })
    }

    pub fn builtin(target_root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        Self::new(target_root, builtin_specs())
    }

    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn descriptors(&self) -> &[CacheDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&CacheDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Keep only the named descriptors. Unknown names are a configuration error.
    pub fn select<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, EngineError> {
        if let Some(unknown) = names.iter().find(|n| self.get(n.as_ref()).is_none()) {
            return Err(EngineError::ConfigInvalid(format!(
                "unknown package manager: {}",
                unknown.as_ref()
            )));
        }
        self.descriptors
            .retain(|d| names.iter().any(|n| d.name.eq_ignore_ascii_case(n.as_ref())));
        Ok(self)
    }

    /// Drop the named descriptors; unknown names are ignored.
    pub fn exclude<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.descriptors
            .retain(|d| !names.iter().any(|n| d.name.eq_ignore_ascii_case(n.as_ref())));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn spec(name: &str, env_var: &str) -> DescriptorSpec {
        DescriptorSpec {
            name: name.into(),
            detection_commands: vec![],
            detection_paths: vec![],
            env_var: env_var.into(),
            env_value_template: None,
            target: name.into(),
            source_paths: vec![],
            probe: None,
        }
    }

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin("/mnt/dev/packages").unwrap();
        assert_eq!(catalog.len(), BUILTINS.len());

        let maven = catalog.get("maven").unwrap();
        assert!(maven.env_value_template.is_some());
        assert_eq!(maven.target_path, Path::new("/mnt/dev/packages").join("maven"));

        let nuget = catalog.get("NuGet").unwrap();
        assert_eq!(nuget.probe, Some(ProbeKind::DotnetNugetLocals));
        assert_eq!(
            catalog
                .descriptors()
                .iter()
                .filter(|d| d.probe.is_some())
                .count(),
            1
        );
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Catalog::new("/dev", vec![spec("npm", "A"), spec("NPM", "B")]).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn duplicate_env_vars_are_rejected_case_insensitively() {
        let err = Catalog::new("/dev", vec![spec("a", "CACHE"), spec("b", "cache")]).unwrap_err();
        assert!(matches!(err, EngineError::ConfigInvalid(_)));
    }

    #[test]
    fn invalid_env_var_and_template_are_rejected() {
        assert!(Catalog::new("/dev", vec![spec("a", "BAD NAME")]).is_err());
        assert!(Catalog::new("/dev", vec![spec("a", "")]).is_err());

        let mut templated = spec("a", "OPTS");
        templated.env_value_template = Some("-Dno.placeholder".into());
        assert!(Catalog::new("/dev", vec![templated]).is_err());
    }

    #[test]
    fn absolute_target_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = spec("custom", "CUSTOM_CACHE");
        s.target = dir.path().join("elsewhere").display().to_string();
        let catalog = Catalog::new("/dev", vec![s]).unwrap();
        assert_eq!(
            catalog.get("custom").unwrap().target_path,
            dir.path().join("elsewhere")
        );
    }

    #[test]
    fn select_and_exclude() {
        let catalog = Catalog::builtin("/dev").unwrap();
        let picked = catalog.clone().select(&["npm", "Maven"]).unwrap();
        assert_eq!(picked.len(), 2);
        assert!(catalog.clone().select(&["not-a-manager"]).is_err());

        let rest = catalog.exclude(&["npm"]);
        assert!(rest.get("npm").is_none());
        assert_eq!(rest.len(), BUILTINS.len() - 1);
    }

    #[test]
    fn only_first_existing_source_is_located() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        fs::create_dir(&first).unwrap();
        fs::create_dir(&second).unwrap();

        let mut s = spec("x", "X_CACHE");
        s.source_paths = vec![
            dir.path().join("missing").display().to_string(),
            first.display().to_string(),
            second.display().to_string(),
        ];
        let catalog = Catalog::new("/dev", vec![s]).unwrap();
        assert_eq!(catalog.get("x").unwrap().locate_source(), Some(first));
    }

    #[test]
    fn plain_file_is_not_a_source() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();

        let mut s = spec("x", "X_CACHE");
        s.source_paths = vec![file.display().to_string()];
        let catalog = Catalog::new("/dev", vec![s]).unwrap();
        assert_eq!(catalog.get("x").unwrap().locate_source(), None);
    }
}
