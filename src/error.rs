use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the engine can attribute to a single descriptor.
///
/// Only `ConfigInvalid` is fatal for a whole run; everything else is caught at
/// the orchestrator or verification boundary and recorded as a [`StageFailure`].
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("source not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error(
        "size mismatch: source is {source_bytes} bytes, destination is {destination_bytes} bytes"
    )]
    SizeMismatch {
        source_bytes: u64,
        destination_bytes: u64,
    },

    #[error("copy failed at {}: {reason}", .path.display())]
    CopyFailed { path: PathBuf, reason: String },

    #[error("failed to write environment variable {name}: {reason}")]
    EnvWriteFailed { name: String, reason: String },

    #[error("failed to read environment variable {name}: {reason}")]
    EnvReadFailed { name: String, reason: String },

    #[error("external probe failed: {0}")]
    ProbeFailed(String),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    EnsureTargetDir,
    SetEnv,
    Move,
    Cleanup,
    VerifyEnv,
    VerifyDir,
    Probe,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::EnsureTargetDir => "ensure-target-dir",
            Stage::SetEnv => "set-env",
            Stage::Move => "move",
            Stage::Cleanup => "cleanup",
            Stage::VerifyEnv => "verify-env",
            Stage::VerifyDir => "verify-dir",
            Stage::Probe => "probe",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure bound to the descriptor and stage that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub manager: String,
    pub stage: Stage,
    pub message: String,
}

impl StageFailure {
    pub fn new(manager: &str, stage: Stage, error: impl fmt::Display) -> Self {
        Self {
            manager: manager.to_string(),
            stage,
            message: error.to_string(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.manager, self.stage, self.message)
    }
}
