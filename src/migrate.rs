//! End-to-end migration of detected package managers.
//!
//! Per descriptor the steps run strictly in order:
//! detected? -> ensure target dir -> set variable -> locate source -> move ->
//! optional cleanup. A failing step ends that descriptor's run and is
//! recorded; the remaining descriptors are still processed.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{CacheDescriptor, Catalog};
use crate::detect::Detection;
use crate::env::EnvConfigurator;
use crate::error::{EngineError, Stage, StageFailure};
use crate::mover::{DirectoryMover, MoveReport, dir_size};
use crate::ui::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Apply,
    /// Read and plan everything, mutate nothing.
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Done,
    Planned,
    Skipped(String),
    Failed(String),
    /// An earlier step failed.
    NotReached,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum CleanupOutcome {
    NotOffered,
    Declined,
    Removed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    pub manager: String,
    pub detected: bool,
    pub target_path: PathBuf,
    pub target_dir: StepOutcome,
    pub env_var: String,
    pub env_value: Option<String>,
    pub env: StepOutcome,
    /// The source actually chosen; `None` when no candidate exists.
    pub source: Option<PathBuf>,
    pub moved: StepOutcome,
    pub move_report: Option<MoveReport>,
    /// Bytes a dry run would move.
    pub planned_bytes: Option<u64>,
    pub cleanup: CleanupOutcome,
    pub failure: Option<StageFailure>,
}

impl MigrationRecord {
    fn new(descriptor: &CacheDescriptor, detected: bool) -> Self {
        let initial = if detected {
            StepOutcome::NotReached
        } else {
            StepOutcome::Skipped("not installed".into())
        };
        Self {
            manager: descriptor.name.clone(),
            detected,
            target_path: descriptor.target_path.clone(),
            target_dir: initial.clone(),
            env_var: descriptor.env_var.clone(),
            env_value: None,
            env: initial.clone(),
            source: None,
            moved: initial,
            move_report: None,
            planned_bytes: None,
            cleanup: CleanupOutcome::NotOffered,
            failure: None,
        }
    }

    pub fn processed(&self) -> bool {
        self.detected
    }

    pub fn succeeded(&self) -> bool {
        self.detected && self.failure.is_none()
    }

    fn fail(&mut self, stage: Stage, error: impl std::fmt::Display) -> StepOutcome {
        let failure = StageFailure::new(&self.manager, stage, error);
        emit(
            Level::Error,
            &format!("migrate.{}.failed", stage.as_str()),
            &format!("{} {}", char::from(NerdFont::Cross), failure),
            serde_json::to_value(&failure).ok(),
        );
        let outcome = StepOutcome::Failed(failure.message.clone());
        self.failure = Some(failure);
        outcome
    }
}

/// Decides whether a successfully migrated source may be deleted.
pub trait CleanupPolicy {
    fn confirm_cleanup(&self, descriptor: &CacheDescriptor, report: &MoveReport) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysCleanup;

impl CleanupPolicy for AlwaysCleanup {
    fn confirm_cleanup(&self, _descriptor: &CacheDescriptor, _report: &MoveReport) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCleanup;

impl CleanupPolicy for NeverCleanup {
    fn confirm_cleanup(&self, _descriptor: &CacheDescriptor, _report: &MoveReport) -> bool {
        false
    }
}

pub struct MigrationOrchestrator<'a> {
    env: &'a EnvConfigurator,
    mover: DirectoryMover,
    cleanup: &'a dyn CleanupPolicy,
    mode: RunMode,
}

impl<'a> MigrationOrchestrator<'a> {
    pub fn new(
        env: &'a EnvConfigurator,
        mover: DirectoryMover,
        cleanup: &'a dyn CleanupPolicy,
        mode: RunMode,
    ) -> Self {
        Self {
            env,
            mover,
            cleanup,
            mode,
        }
    }

    /// Process every descriptor in catalog order. Descriptors without a
    /// detection entry are treated as not installed.
    pub fn run(&self, catalog: &Catalog, detections: &[Detection]) -> Vec<MigrationRecord> {
        catalog
            .descriptors()
            .iter()
            .map(|descriptor| {
                let detected = detections
                    .iter()
                    .any(|d| d.manager == descriptor.name && d.installed);
                self.migrate_one(descriptor, detected)
            })
            .collect()
    }

    pub fn migrate_one(&self, descriptor: &CacheDescriptor, detected: bool) -> MigrationRecord {
        let mut record = MigrationRecord::new(descriptor, detected);
        if !detected {
            emit(
                Level::Debug,
                "migrate.skip",
                &format!("{} not installed, skipping", descriptor.name),
                None,
            );
            return record;
        }

        emit(
            Level::Info,
            "migrate.start",
            &format!(
                "{} {} {} {}",
                char::from(NerdFont::Package),
                descriptor.name,
                char::from(NerdFont::ArrowRight),
                descriptor.target_path.display()
            ),
            None,
        );

        record.target_dir = self.ensure_target_dir(descriptor, &mut record);
        if record.failure.is_some() {
            return record;
        }

        record.env = self.set_env(descriptor, &mut record);
        if record.failure.is_some() {
            return record;
        }

        record.source = descriptor.locate_source();
        let Some(source) = record.source.clone() else {
            record.moved = StepOutcome::Skipped("no existing cache to migrate".into());
            emit(
                Level::Info,
                "migrate.source.none",
                &format!(
                    "{} {}: no existing cache found, configured for a fresh start",
                    char::from(NerdFont::Info),
                    descriptor.name
                ),
                None,
            );
            return record;
        };

        record.moved = self.move_source(descriptor, &source, &mut record);
        if let (StepOutcome::Done, Some(report)) = (&record.moved, &record.move_report) {
            record.cleanup = self.cleanup_source(descriptor, report);
        }
        record
    }

    fn ensure_target_dir(
        &self,
        descriptor: &CacheDescriptor,
        record: &mut MigrationRecord,
    ) -> StepOutcome {
        let target = &descriptor.target_path;
        if target.is_dir() {
            return StepOutcome::Skipped("already exists".into());
        }
        if self.mode == RunMode::DryRun {
            return StepOutcome::Planned;
        }
        match fs::create_dir_all(target) {
            Ok(()) => {
                emit(
                    Level::Debug,
                    "migrate.target.created",
                    &format!(
                        "{} created {}",
                        char::from(NerdFont::Folder),
                        target.display()
                    ),
                    None,
                );
                StepOutcome::Done
            }
            Err(e) => record.fail(
                Stage::EnsureTargetDir,
                format!("creating {}: {}", target.display(), e),
            ),
        }
    }

    fn set_env(&self, descriptor: &CacheDescriptor, record: &mut MigrationRecord) -> StepOutcome {
        let target = &descriptor.target_path;
        let result = match self.mode {
            RunMode::DryRun => self.env.planned_value(descriptor, target),
            RunMode::Apply => self.env.configure(descriptor, target),
        };

        match result {
            Ok(value) => {
                emit(
                    Level::Success,
                    "migrate.env.set",
                    &format!(
                        "{} {}{}={}",
                        char::from(NerdFont::Key),
                        if self.mode == RunMode::DryRun {
                            "would set "
                        } else {
                            ""
                        },
                        descriptor.env_var,
                        value
                    ),
                    None,
                );
                record.env_value = Some(value);
                match self.mode {
                    RunMode::DryRun => StepOutcome::Planned,
                    RunMode::Apply => StepOutcome::Done,
                }
            }
            Err(e) => record.fail(Stage::SetEnv, e),
        }
    }

    fn move_source(
        &self,
        descriptor: &CacheDescriptor,
        source: &Path,
        record: &mut MigrationRecord,
    ) -> StepOutcome {
        let target = &descriptor.target_path;
        match overlap(source, target) {
            Overlap::Same => return StepOutcome::Skipped("source already is the target".into()),
            Overlap::Nested => {
                return record.fail(
                    Stage::Move,
                    EngineError::CopyFailed {
                        path: source.to_path_buf(),
                        reason: format!(
                            "source and target {} contain each other",
                            target.display()
                        ),
                    },
                );
            }
            Overlap::Disjoint => {}
        }

        if self.mode == RunMode::DryRun {
            let bytes = dir_size(source);
            record.planned_bytes = Some(bytes);
            emit(
                Level::Info,
                "migrate.move.planned",
                &format!(
                    "{} would copy {} ({}) to {}",
                    char::from(NerdFont::Info),
                    source.display(),
                    format_bytes(bytes),
                    target.display()
                ),
                None,
            );
            return StepOutcome::Planned;
        }

        match self.mover.move_tree(source, target) {
            Ok(report) => {
                emit(
                    Level::Success,
                    "migrate.move.done",
                    &format!(
                        "{} copied {} ({} files) from {}",
                        char::from(NerdFont::Check),
                        format_bytes(report.bytes_copied),
                        report.files_copied,
                        source.display()
                    ),
                    serde_json::to_value(&report).ok(),
                );
                for skipped in &report.skipped {
                    emit(
                        Level::Warn,
                        "migrate.move.skipped",
                        &format!(
                            "{} not copied: {} ({})",
                            char::from(NerdFont::Warning),
                            skipped.path.display(),
                            skipped.reason
                        ),
                        None,
                    );
                }
                record.move_report = Some(report);
                StepOutcome::Done
            }
            Err(e) => record.fail(Stage::Move, e),
        }
    }

    fn cleanup_source(&self, descriptor: &CacheDescriptor, report: &MoveReport) -> CleanupOutcome {
        if !self.cleanup.confirm_cleanup(descriptor, report) {
            return CleanupOutcome::Declined;
        }

        match fs::remove_dir_all(&report.source) {
            Ok(()) => {
                emit(
                    Level::Success,
                    "migrate.cleanup.done",
                    &format!(
                        "{} removed {}",
                        char::from(NerdFont::Trash),
                        report.source.display()
                    ),
                    None,
                );
                CleanupOutcome::Removed
            }
            Err(e) => {
                // The migration itself stands; only the old copy lingers
                let failure = StageFailure::new(
                    &descriptor.name,
                    Stage::Cleanup,
                    format!("removing {}: {}", report.source.display(), e),
                );
                emit(
                    Level::Warn,
                    "migrate.cleanup.failed",
                    &format!("{} {}", char::from(NerdFont::Warning), failure),
                    None,
                );
                CleanupOutcome::Failed(failure.message)
            }
        }
    }
}

enum Overlap {
    Same,
    Nested,
    Disjoint,
}

fn overlap(source: &Path, target: &Path) -> Overlap {
    let source = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
    let target = resolve_existing_prefix(target);
    if source == target {
        Overlap::Same
    } else if source.starts_with(&target) || target.starts_with(&source) {
        Overlap::Nested
    } else {
        Overlap::Disjoint
    }
}

/// Canonicalize the longest existing prefix of `path` and re-append the rest.
fn resolve_existing_prefix(path: &Path) -> PathBuf {
    let mut missing = Vec::new();
    let mut current = path.to_path_buf();
    loop {
        if let Ok(resolved) = fs::canonicalize(&current) {
            return missing
                .iter()
                .rev()
                .fold(resolved, |acc: PathBuf, part| acc.join(part));
        }
        match (current.file_name().map(|n| n.to_os_string()), current.parent()) {
            (Some(name), Some(parent)) => {
                missing.push(name);
                current = parent.to_path_buf();
            }
            _ => return path.to_path_buf(),
        }
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
