//! Stateless re-derivation of the configuration state of every descriptor.
//!
//! Nothing here mutates the system, and nothing depends on what an earlier
//! migration did in memory: two calls with no change in between return equal
//! results.

mod probe;

pub use probe::{
    CacheProbe, DotnetNugetProbe, ProbeOutcome, ProbeRegistry, ProbeReport, ProbeStatus,
    classify, parse_nuget_locals,
};

use futures_util::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::catalog::{CacheDescriptor, Catalog};
use crate::env::EnvConfigurator;
use crate::error::{EngineError, Stage, StageFailure};
use crate::mover::dir_size;
use crate::ui::prelude::*;
use crate::volume::same_volume;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvStatus {
    /// Set and resolving onto the destination volume.
    Passed,
    /// Set but pointing elsewhere (or unreadable).
    Failed,
    NotSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvCheck {
    pub manager: String,
    pub env_var: String,
    pub status: EnvStatus,
    pub value: Option<String>,
    pub configured_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirCheck {
    pub manager: String,
    pub path: PathBuf,
    pub exists: bool,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub target_root: PathBuf,
    pub env_checks: Vec<EnvCheck>,
    pub dir_checks: Vec<DirCheck>,
    pub total_cache_size_bytes: u64,
    pub probes: Vec<ProbeReport>,
    pub failures: Vec<StageFailure>,
}

impl VerificationResult {
    fn managers_with_env(&self, status: EnvStatus) -> Vec<&str> {
        self.env_checks
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.manager.as_str())
            .collect()
    }

    pub fn env_vars_passed(&self) -> Vec<&str> {
        self.managers_with_env(EnvStatus::Passed)
    }

    pub fn env_vars_failed(&self) -> Vec<&str> {
        self.managers_with_env(EnvStatus::Failed)
    }

    pub fn env_vars_not_set(&self) -> Vec<&str> {
        self.managers_with_env(EnvStatus::NotSet)
    }

    pub fn dirs_exist(&self) -> Vec<&str> {
        self.dir_checks
            .iter()
            .filter(|c| c.exists)
            .map(|c| c.manager.as_str())
            .collect()
    }

    pub fn dirs_missing(&self) -> Vec<&str> {
        self.dir_checks
            .iter()
            .filter(|c| !c.exists)
            .map(|c| c.manager.as_str())
            .collect()
    }

    /// Every variable passes, every directory exists and no probe disagrees.
    pub fn is_fully_configured(&self) -> bool {
        self.env_checks.iter().all(|c| c.status == EnvStatus::Passed)
            && self.dir_checks.iter().all(|c| c.exists)
            && self.probes.iter().all(|p| p.status == ProbeStatus::Ok)
    }
}

#[derive(Clone)]
pub struct VerificationEngine {
    env: EnvConfigurator,
    probes: ProbeRegistry,
}

impl VerificationEngine {
    pub fn new(env: EnvConfigurator, probes: ProbeRegistry) -> Self {
        Self { env, probes }
    }

    /// Classify one descriptor's variable. Read errors count as `Failed`
    /// and are returned alongside so they can be attributed.
    pub fn check_env(
        &self,
        descriptor: &CacheDescriptor,
        destination_root: &Path,
    ) -> (EnvCheck, Option<StageFailure>) {
        let mut check = EnvCheck {
            manager: descriptor.name.clone(),
            env_var: descriptor.env_var.clone(),
            status: EnvStatus::NotSet,
            value: None,
            configured_path: None,
        };

        let value = match self.env.get(&descriptor.env_var) {
            Ok(value) => value,
            Err(err) => {
                check.status = EnvStatus::Failed;
                let failure = StageFailure::new(&descriptor.name, Stage::VerifyEnv, err);
                return (check, Some(failure));
            }
        };
        let Some(value) = value else {
            return (check, None);
        };

        let configured = match self.env.configured_path(descriptor) {
            Ok(path) => path,
            Err(err) => {
                check.status = EnvStatus::Failed;
                check.value = Some(value);
                let failure = StageFailure::new(&descriptor.name, Stage::VerifyEnv, err);
                return (check, Some(failure));
            }
        };

        check.status = match &configured {
            None if descriptor.env_value_template.is_some() => EnvStatus::NotSet,
            Some(path) if same_volume(path, destination_root) => EnvStatus::Passed,
            _ => EnvStatus::Failed,
        };
        check.value = Some(value);
        check.configured_path = configured;
        (check, None)
    }

    pub fn check_dir(descriptor: &CacheDescriptor) -> DirCheck {
        let exists = descriptor.target_path.is_dir();
        DirCheck {
            manager: descriptor.name.clone(),
            path: descriptor.target_path.clone(),
            exists,
            size_bytes: if exists {
                dir_size(&descriptor.target_path)
            } else {
                0
            },
        }
    }

    pub async fn verify(&self, catalog: &Catalog) -> VerificationResult {
        let root = catalog.target_root().to_path_buf();

        let handles = catalog.descriptors().iter().cloned().map(|descriptor| {
            let engine = self.clone();
            let root = root.clone();
            tokio::task::spawn_blocking(move || {
                let (env_check, failure) = engine.check_env(&descriptor, &root);
                (env_check, Self::check_dir(&descriptor), failure)
            })
        });
        let joined = join_all(handles).await;

        let mut result = VerificationResult {
            target_root: root.clone(),
            env_checks: Vec::with_capacity(catalog.len()),
            dir_checks: Vec::with_capacity(catalog.len()),
            total_cache_size_bytes: 0,
            probes: Vec::new(),
            failures: Vec::new(),
        };

        for (outcome, descriptor) in joined.into_iter().zip(catalog.descriptors()) {
            let (env_check, dir_check, failure) = match outcome {
                Ok(checks) => checks,
                Err(join_err) => {
                    // A panicking check still has to land in exactly one class
                    let failure =
                        StageFailure::new(&descriptor.name, Stage::VerifyDir, join_err);
                    (
                        EnvCheck {
                            manager: descriptor.name.clone(),
                            env_var: descriptor.env_var.clone(),
                            status: EnvStatus::Failed,
                            value: None,
                            configured_path: None,
                        },
                        DirCheck {
                            manager: descriptor.name.clone(),
                            path: descriptor.target_path.clone(),
                            exists: false,
                            size_bytes: 0,
                        },
                        Some(failure),
                    )
                }
            };

            emit(
                Level::Debug,
                "verify.descriptor",
                &format!(
                    "{} {}: env {:?}, dir {}",
                    char::from(NerdFont::Search),
                    descriptor.name,
                    env_check.status,
                    if dir_check.exists { "exists" } else { "missing" }
                ),
                None,
            );

            result.total_cache_size_bytes += dir_check.size_bytes;
            result.failures.extend(failure);
            result.env_checks.push(env_check);
            result.dir_checks.push(dir_check);
        }

        for descriptor in catalog.descriptors() {
            let Some(kind) = descriptor.probe else {
                continue;
            };
            let env_passed = result
                .env_checks
                .iter()
                .any(|c| c.manager == descriptor.name && c.status == EnvStatus::Passed);

            let report = match self.probes.get(kind) {
                Some(probe) => {
                    let outcome = probe.query().await;
                    let (status, detail) = classify(&outcome, &root, env_passed);
                    let reported_path = match outcome {
                        ProbeOutcome::Reported(path) => Some(path),
                        _ => None,
                    };
                    ProbeReport {
                        manager: descriptor.name.clone(),
                        kind,
                        status,
                        reported_path,
                        detail,
                    }
                }
                None => ProbeReport {
                    manager: descriptor.name.clone(),
                    kind,
                    status: ProbeStatus::Unknown,
                    reported_path: None,
                    detail: Some("no probe available".into()),
                },
            };

            if report.status == ProbeStatus::Error {
                let err = EngineError::ProbeFailed(report.detail.clone().unwrap_or_default());
                emit(
                    Level::Warn,
                    "verify.probe.error",
                    &format!(
                        "{} {}: {}",
                        char::from(NerdFont::Warning),
                        descriptor.name,
                        err
                    ),
                    None,
                );
                result
                    .failures
                    .push(StageFailure::new(&descriptor.name, Stage::Probe, err));
            }
            result.probes.push(report);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DescriptorSpec, ProbeKind};
    use crate::env::MemoryEnvStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedProbe(ProbeOutcome);

    #[async_trait]
    impl CacheProbe for FixedProbe {
        fn kind(&self) -> ProbeKind {
            ProbeKind::DotnetNugetLocals
        }

        async fn query(&self) -> ProbeOutcome {
            self.0.clone()
        }
    }

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

    fn engine(store: Arc<MemoryEnvStore>, probe: Option<ProbeOutcome>) -> VerificationEngine {
        let mut probes = ProbeRegistry::new();
        if let Some(outcome) = probe {
            probes.register(Arc::new(FixedProbe(outcome)));
        }
        VerificationEngine::new(EnvConfigurator::new(store), probes)
    }

    #[tokio::test]
    async fn unconfigured_machine_is_all_not_set_and_missing() {
        let root = tempfile::tempdir().unwrap();
        let catalog = Catalog::builtin(root.path().join("packages")).unwrap();
        let result = engine(Arc::new(MemoryEnvStore::new()), None)
            .verify(&catalog)
            .await;

        assert_eq!(result.env_vars_not_set().len(), catalog.len());
        assert_eq!(result.dirs_missing().len(), catalog.len());
        assert!(result.env_vars_passed().is_empty());
        assert!(result.dirs_exist().is_empty());
        assert_eq!(result.total_cache_size_bytes, 0);
        assert_eq!(result.probes.len(), 1);
        assert_eq!(result.probes[0].status, ProbeStatus::Unknown);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn env_and_directory_checks_are_independent() {
        let root = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(root.path(), vec![spec("npm", "NPM_CONFIG_CACHE")]).unwrap();
        let target = root.path().join("npm");
        let store = Arc::new(MemoryEnvStore::with_vars([(
            "NPM_CONFIG_CACHE",
            target.display().to_string(),
        )]));

        // Variable points at the destination volume but the directory is gone
        let result = engine(store, None).verify(&catalog).await;
        assert_eq!(result.env_vars_passed(), ["npm"]);
        assert_eq!(result.dirs_missing(), ["npm"]);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn variable_on_another_volume_fails() {
        let root = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(root.path(), vec![spec("pip", "PIP_CACHE_DIR")]).unwrap();
        let store = Arc::new(MemoryEnvStore::with_vars([(
            "PIP_CACHE_DIR",
            "/proc/pip-cache",
        )]));

        let result = engine(store, None).verify(&catalog).await;
        assert_eq!(result.env_vars_failed(), ["pip"]);
        assert!(result.failures.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sizes_are_summed_and_results_are_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let catalog = Catalog::new(
            root.path(),
            vec![spec("a", "A_CACHE"), spec("b", "B_CACHE"), spec("c", "C_CACHE")],
        )
        .unwrap();
        std::fs::create_dir_all(root.path().join("a/sub")).unwrap();
        std::fs::write(root.path().join("a/sub/f"), vec![0u8; 700]).unwrap();
        std::fs::create_dir_all(root.path().join("b")).unwrap();
        std::fs::write(root.path().join("b/g"), vec![0u8; 300]).unwrap();

        let store = Arc::new(MemoryEnvStore::with_vars([
            ("A_CACHE", root.path().join("a").display().to_string()),
            ("B_CACHE", "relative/path".to_string()),
        ]));
        let engine = engine(store, None);

        let first = engine.verify(&catalog).await;
        let second = engine.verify(&catalog).await;
        assert_eq!(first, second);

        assert_eq!(first.total_cache_size_bytes, 1000);
        assert_eq!(first.dirs_exist(), ["a", "b"]);
        assert_eq!(first.dirs_missing(), ["c"]);
        assert_eq!(first.env_vars_passed(), ["a"]);
        assert_eq!(first.env_vars_failed(), ["b"]);
        assert_eq!(first.env_vars_not_set(), ["c"]);

        // Each descriptor lands in exactly one class of each kind
        for d in catalog.descriptors() {
            let env_hits = [
                first.env_vars_passed(),
                first.env_vars_failed(),
                first.env_vars_not_set(),
            ]
            .iter()
            .filter(|set| set.contains(&d.name.as_str()))
            .count();
            let dir_hits = [first.dirs_exist(), first.dirs_missing()]
                .iter()
                .filter(|set| set.contains(&d.name.as_str()))
                .count();
            assert_eq!((env_hits, dir_hits), (1, 1));
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn templated_variable_is_matched_by_embedded_path() {
        let root = tempfile::tempdir().unwrap();
        let mut maven = spec("maven", "MAVEN_OPTS");
        maven.env_value_template = Some("-Dmaven.repo.local={path}".into());
        let catalog = Catalog::new(root.path(), vec![maven]).unwrap();

        let store = Arc::new(MemoryEnvStore::with_vars([(
            "MAVEN_OPTS",
            format!("-Xmx1g -Dmaven.repo.local={}", root.path().join("maven").display()),
        )]));
        let result = engine(store, None).verify(&catalog).await;
        assert_eq!(result.env_vars_passed(), ["maven"]);

        let store = Arc::new(MemoryEnvStore::with_vars([("MAVEN_OPTS", "-Xmx1g")]));
        let result = engine(store, None).verify(&catalog).await;
        assert_eq!(result.env_vars_not_set(), ["maven"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn probe_reports_pending_restart_when_env_is_already_correct() {
        let root = tempfile::tempdir().unwrap();
        let mut nuget = spec("nuget", "NUGET_PACKAGES");
        nuget.probe = Some(ProbeKind::DotnetNugetLocals);
        let catalog = Catalog::new(root.path(), vec![nuget]).unwrap();
        let store = Arc::new(MemoryEnvStore::with_vars([(
            "NUGET_PACKAGES",
            root.path().join("nuget").display().to_string(),
        )]));

        let stale = ProbeOutcome::Reported(PathBuf::from("relative/.nuget/packages"));
        let result = engine(store.clone(), Some(stale)).verify(&catalog).await;
        assert_eq!(result.probes[0].status, ProbeStatus::PendingRestart);
        assert_eq!(
            result.probes[0].reported_path.as_deref(),
            Some(Path::new("relative/.nuget/packages"))
        );

        let fresh = ProbeOutcome::Reported(root.path().join("nuget"));
        let result = engine(store.clone(), Some(fresh)).verify(&catalog).await;
        assert_eq!(result.probes[0].status, ProbeStatus::Ok);

        let broken = ProbeOutcome::Failed("exit 1".into());
        let result = engine(store, Some(broken)).verify(&catalog).await;
        assert_eq!(result.probes[0].status, ProbeStatus::Error);
        assert_eq!(result.failures[0].stage, Stage::Probe);
        assert_eq!(result.failures[0].message, "external probe failed: exit 1");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn nuget_lookup_on_unconfigured_machine_is_not_a_failure() {
        let root = tempfile::tempdir().unwrap();
        let mut nuget = spec("nuget", "NUGET_PACKAGES");
        nuget.probe = Some(ProbeKind::DotnetNugetLocals);
        let catalog = Catalog::new(root.path(), vec![nuget]).unwrap();

        // /proc is never on the same device as a temp directory
        let elsewhere = ProbeOutcome::Reported(PathBuf::from("/proc/home/.nuget/packages"));
        let result = engine(Arc::new(MemoryEnvStore::new()), Some(elsewhere))
            .verify(&catalog)
            .await;

        assert_eq!(result.env_vars_not_set(), ["nuget"]);
        assert_eq!(result.probes[0].status, ProbeStatus::Unknown);
        assert_eq!(
            result.probes[0].reported_path.as_deref(),
            Some(Path::new("/proc/home/.nuget/packages"))
        );
        assert!(result.failures.is_empty());
    }
}
