//! Final run summary and its renderers.

mod json;
mod text;

pub use json::JsonPresenter;
pub use text::TextPresenter;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::detect::Detection;
use crate::error::StageFailure;
use crate::migrate::{MigrationRecord, RunMode};
use crate::ui::OutputFormat;
use crate::verify::VerificationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Migrate,
    Verify,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub command: Command,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RunMode>,
    pub target_root: PathBuf,
    pub env_location: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detections: Vec<Detection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub migrations: Vec<MigrationRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationResult>,
}

impl RunReport {
    pub fn new(command: Command, target_root: PathBuf, env_location: String) -> Self {
        Self {
            generated_at: Utc::now(),
            command,
            mode: None,
            target_root,
            env_location,
            detections: Vec::new(),
            migrations: Vec::new(),
            verification: None,
        }
    }

    /// Every recorded failure, migration first then verification.
    pub fn failures(&self) -> Vec<&StageFailure> {
        self.migrations
            .iter()
            .filter_map(|m| m.failure.as_ref())
            .chain(self.verification.iter().flat_map(|v| v.failures.iter()))
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }

    /// A dry run never touches the system, so reporting its verification
    /// as a regression would be misleading.
    pub fn is_dry_run(&self) -> bool {
        self.mode == Some(RunMode::DryRun)
    }
}

pub trait Presenter {
    fn render(&self, report: &RunReport) -> Result<()>;
}

pub fn presenter_for(format: OutputFormat) -> Box<dyn Presenter> {
    match format {
        OutputFormat::Text => Box::new(TextPresenter),
        OutputFormat::Json => Box::new(JsonPresenter),
    }
}
