//! Interactive answers through dialoguer.

use anyhow::Result;
use dialoguer::{Confirm, MultiSelect};

use crate::catalog::CacheDescriptor;
use crate::detect::Detection;
use crate::migrate::{CleanupPolicy, format_bytes};
use crate::mover::MoveReport;
use crate::ui::prelude::*;

/// Asks before deleting each migrated source. Any prompt error (no TTY,
/// Ctrl-C) counts as "no".
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfirmCleanup;

impl CleanupPolicy for ConfirmCleanup {
    fn confirm_cleanup(&self, descriptor: &CacheDescriptor, report: &MoveReport) -> bool {
        let prompt = format!(
            "{} Delete the old {} cache at {} ({})?",
            char::from(NerdFont::Trash),
            descriptor.name,
            report.source.display(),
            format_bytes(report.source_bytes)
        );
        match Confirm::new().with_prompt(prompt).default(false).interact() {
            Ok(answer) => answer,
            Err(e) => {
                emit(
                    Level::Warn,
                    "prompt.cleanup.unavailable",
                    &format!(
                        "{} Could not ask about cleanup ({}), keeping {}",
                        char::from(NerdFont::Warning),
                        e,
                        report.source.display()
                    ),
                    None,
                );
                false
            }
        }
    }
}

/// Let the user pick which detected managers to migrate. All are
/// preselected; returns the chosen names.
pub fn choose_managers(detections: &[Detection]) -> Result<Vec<String>> {
    let installed: Vec<&Detection> = detections.iter().filter(|d| d.installed).collect();
    if installed.is_empty() {
        return Ok(Vec::new());
    }

    let items: Vec<&str> = installed.iter().map(|d| d.manager.as_str()).collect();
    let defaults = vec![true; items.len()];
    let picked = MultiSelect::new()
        .with_prompt(format!(
            "{} Package managers to migrate (space toggles, enter confirms)",
            char::from(NerdFont::Package)
        ))
        .items(&items)
        .defaults(&defaults)
        .interact()?;

    Ok(picked
        .into_iter()
        .map(|index| items[index].to_string())
        .collect())
}
