//! Copying a cache tree to its new home and checking the copy.
//!
//! The source is never deleted here; removing it is a separate step the
//! orchestrator only takes after a successful move and an explicit yes.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::EngineError;

/// Maximum relative difference between source and destination size.
pub const SIZE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub source_bytes: u64,
    pub destination_bytes: u64,
    pub bytes_copied: u64,
    pub files_copied: u64,
    /// Entries that could not be copied; only non-empty in lenient mode.
    pub skipped: Vec<SkippedEntry>,
}

#[derive(Debug, Clone, Copy)]
pub struct DirectoryMover {
    strict: bool,
}

impl Default for DirectoryMover {
    fn default() -> Self {
        Self { strict: true }
    }
}

impl DirectoryMover {
    /// In strict mode every file must copy completely; otherwise individual
    /// failures are tolerated as long as the aggregate size check passes.
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    /// Copy `source` into `destination`, preserving relative structure.
    ///
    /// A partial destination is left in place on failure so it can be
    /// inspected.
    pub fn move_tree(&self, source: &Path, destination: &Path) -> Result<MoveReport, EngineError> {
        if !source.is_dir() {
            return Err(EngineError::NotFound(source.to_path_buf()));
        }

        fs::create_dir_all(destination).map_err(|e| copy_failed(destination, e))?;

        let mut report = MoveReport {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            source_bytes: 0,
            destination_bytes: 0,
            bytes_copied: 0,
            files_copied: 0,
            skipped: Vec::new(),
        };

        for entry in WalkDir::new(source).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().unwrap_or(source).to_path_buf();
                    report.skipped.push(SkippedEntry {
                        path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };

            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| copy_failed(entry.path(), io::Error::other(e)))?;
            let target = destination.join(relative);

            let outcome = if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map(|_| ())
            } else if entry.file_type().is_symlink() {
                copy_symlink(entry.path(), &target)
            } else {
                copy_file(entry.path(), &target).map(|(expected, copied, on_disk)| {
                    report.source_bytes += expected;
                    report.bytes_copied += copied;
                    report.destination_bytes += on_disk;
                    report.files_copied += 1;
                    if copied != expected {
                        report.skipped.push(SkippedEntry {
                            path: entry.path().to_path_buf(),
                            reason: format!("copied {} of {} bytes", copied, expected),
                        });
                    }
                })
            };

            if let Err(err) = outcome {
                if entry.depth() == 0 {
                    // The root itself could not be mirrored: nothing else can succeed
                    return Err(copy_failed(&target, err));
                }
                report.skipped.push(SkippedEntry {
                    path: entry.path().to_path_buf(),
                    reason: err.to_string(),
                });
                // Still count what the source holds so the size check sees the gap
                if entry.file_type().is_file() {
                    report.source_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                }
            }
        }

        self.check(&report)?;
        Ok(report)
    }

    /// Decide whether a finished copy counts as a successful move.
    pub fn check(&self, report: &MoveReport) -> Result<(), EngineError> {
        if self.strict
            && let Some(first) = report.skipped.first()
        {
            return Err(EngineError::CopyFailed {
                path: first.path.clone(),
                reason: format!(
                    "{} ({} entr{} could not be copied)",
                    first.reason,
                    report.skipped.len(),
                    if report.skipped.len() == 1 { "y" } else { "ies" }
                ),
            });
        }

        if !within_tolerance(report.source_bytes, report.destination_bytes) {
            return Err(EngineError::SizeMismatch {
                source_bytes: report.source_bytes,
                destination_bytes: report.destination_bytes,
            });
        }

        Ok(())
    }
}

/// `|destination - source| / source <= 1%`; an empty source only matches an
/// empty destination.
pub fn within_tolerance(source_bytes: u64, destination_bytes: u64) -> bool {
    if source_bytes == 0 {
        return destination_bytes == 0;
    }
    let diff = source_bytes.abs_diff(destination_bytes) as f64;
    diff / source_bytes as f64 <= SIZE_TOLERANCE
}

/// Total size of all regular files below `path`. Symlinks are not followed
/// and unreadable entries are skipped.
pub fn dir_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Returns (source length, bytes copied, destination length after copy).
fn copy_file(source: &Path, target: &Path) -> io::Result<(u64, u64, u64)> {
    let expected = fs::metadata(source)?.len();
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let copied = fs::copy(source, target)?;
    let on_disk = fs::metadata(target)?.len();
    Ok((expected, copied, on_disk))
}

fn copy_symlink(source: &Path, target: &Path) -> io::Result<()> {
    let link_target = fs::read_link(source)?;
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target)?;
    }
    create_symlink(&link_target, target)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let resolved = link
        .parent()
        .map(|parent| parent.join(target))
        .unwrap_or_else(|| target.to_path_buf());
    if resolved.is_dir() {
        symlink_dir(target, link)
    } else {
        symlink_file(target, link)
    }
}

fn copy_failed(path: &Path, err: io::Error) -> EngineError {
    EngineError::CopyFailed {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
