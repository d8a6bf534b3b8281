//! External status queries for managers that may not honour their variable
//! in every sub-tool.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command as TokioCommand;

use crate::catalog::ProbeKind;
use crate::volume::same_volume;

/// What the external tool said.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The tool is not installed.
    ToolMissing,
    /// The tool ran but the query failed or timed out.
    Failed(String),
    /// The cache path the tool is currently using.
    Reported(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    Ok,
    /// Variable is correct but the tool still reports the old path; new
    /// shells will pick it up.
    PendingRestart,
    Error,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub manager: String,
    pub kind: ProbeKind,
    pub status: ProbeStatus,
    pub reported_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[async_trait]
pub trait CacheProbe: Send + Sync {
    fn kind(&self) -> ProbeKind;

    async fn query(&self) -> ProbeOutcome;
}

/// Map a probe outcome onto a status, given whether the descriptor's
/// variable already points at the destination volume. Only a failed query
/// is an `Error`; a machine that was never migrated is `Unknown`.
pub fn classify(
    outcome: &ProbeOutcome,
    destination_root: &Path,
    env_passed: bool,
) -> (ProbeStatus, Option<String>) {
    match outcome {
        ProbeOutcome::ToolMissing => (ProbeStatus::Unknown, Some("tool not installed".into())),
        ProbeOutcome::Failed(reason) => (ProbeStatus::Error, Some(reason.clone())),
        ProbeOutcome::Reported(path) if same_volume(path, destination_root) => {
            (ProbeStatus::Ok, None)
        }
        ProbeOutcome::Reported(path) if env_passed => (
            ProbeStatus::PendingRestart,
            Some(format!(
                "still reports {}; restart open shells and IDEs",
                path.display()
            )),
        ),
        ProbeOutcome::Reported(path) => (
            ProbeStatus::Unknown,
            Some(format!("variable not configured; reports {}", path.display())),
        ),
    }
}

/// `dotnet nuget locals global-packages --list`
#[derive(Debug, Clone)]
pub struct DotnetNugetProbe {
    timeout: Duration,
}

impl DotnetNugetProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CacheProbe for DotnetNugetProbe {
    fn kind(&self) -> ProbeKind {
        ProbeKind::DotnetNugetLocals
    }

    async fn query(&self) -> ProbeOutcome {
        let Ok(dotnet) = which::which("dotnet") else {
            return ProbeOutcome::ToolMissing;
        };

        let run = TokioCommand::new(dotnet)
            .args(["nuget", "locals", "global-packages", "--list"])
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ProbeOutcome::Failed(format!("failed to run dotnet: {}", e)),
            Err(_) => {
                return ProbeOutcome::Failed(format!(
                    "dotnet did not answer within {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return ProbeOutcome::Failed(format!(
                "dotnet exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_nuget_locals(&stdout) {
            Some(path) => ProbeOutcome::Reported(path),
            None => ProbeOutcome::Failed("unexpected output from dotnet nuget locals".into()),
        }
    }
}

/// Parse `global-packages: C:\Users\me\.nuget\packages\`.
pub fn parse_nuget_locals(stdout: &str) -> Option<PathBuf> {
    stdout.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("global-packages:")?;
        let path = rest.trim();
        (!path.is_empty()).then(|| PathBuf::from(path))
    })
}

/// Probe implementations keyed by kind.
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: HashMap<ProbeKind, Arc<dyn CacheProbe>>,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in probe, each bounded by `timeout`.
    pub fn with_defaults(timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DotnetNugetProbe::new(timeout)));
        registry
    }

    pub fn register(&mut self, probe: Arc<dyn CacheProbe>) {
        self.probes.insert(probe.kind(), probe);
    }

    pub fn get(&self, kind: ProbeKind) -> Option<Arc<dyn CacheProbe>> {
        self.probes.get(&kind).cloned()
    }
}
