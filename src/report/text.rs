use anyhow::Result;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use super::{Presenter, RunReport};
use crate::migrate::{CleanupOutcome, MigrationRecord, StepOutcome, format_bytes};
use crate::ui::prelude::*;
use crate::verify::{EnvStatus, ProbeStatus, VerificationResult};

/// Human-readable tables on stdout.
pub struct TextPresenter;

impl Presenter for TextPresenter {
    fn render(&self, report: &RunReport) -> Result<()> {
        println!();
        println!(
            "{} {}",
            char::from(NerdFont::HardDrive),
            format!("Target root: {}", report.target_root.display()).bold()
        );
        println!(
            "{} Environment store: {}",
            char::from(NerdFont::Key),
            report.env_location
        );

        if !report.migrations.is_empty() {
            separator(true);
            let title = if report.is_dry_run() {
                "Migration plan (dry run, nothing was changed)"
            } else {
                "Migration"
            };
            println!("{}", title.bold());
            println!("{}", migration_table(&report.migrations));
        }

        if let Some(verification) = &report.verification {
            separator(true);
            println!("{}", "Verification".bold());
            println!("{}", verification_table(verification));
            if !verification.probes.is_empty() {
                println!("{}", probe_table(verification));
            }
            print_summary(verification, report.is_dry_run());
        }

        let failures = report.failures();
        if !failures.is_empty() {
            separator(true);
            println!("{}", "Failures".red().bold());
            for failure in failures {
                println!("  {} {}", char::from(NerdFont::Cross).to_string().red(), failure);
            }
        }
        Ok(())
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn step_cell(step: &StepOutcome) -> Cell {
    match step {
        StepOutcome::Done => Cell::new("done").fg(Color::Green),
        StepOutcome::Planned => Cell::new("planned").fg(Color::Cyan),
        StepOutcome::Skipped(reason) => Cell::new(format!("skipped: {}", reason)),
        StepOutcome::Failed(reason) => Cell::new(format!("failed: {}", reason)).fg(Color::Red),
        StepOutcome::NotReached => Cell::new("-"),
    }
}

fn moved_cell(record: &MigrationRecord) -> Cell {
    match (&record.moved, &record.move_report, record.planned_bytes) {
        (StepOutcome::Done, Some(report), _) => {
            let mut text = format!(
                "{} from {}",
                format_bytes(report.bytes_copied),
                report.source.display()
            );
            if !report.skipped.is_empty() {
                text.push_str(&format!(" ({} entries skipped)", report.skipped.len()));
            }
            Cell::new(text).fg(Color::Green)
        }
        (StepOutcome::Planned, _, Some(bytes)) => {
            let source = record
                .source
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            Cell::new(format!("{} from {}", format_bytes(bytes), source)).fg(Color::Cyan)
        }
        (step, _, _) => step_cell(step),
    }
}

fn cleanup_cell(cleanup: &CleanupOutcome) -> Cell {
    match cleanup {
        CleanupOutcome::NotOffered => Cell::new("-"),
        CleanupOutcome::Declined => Cell::new("kept"),
        CleanupOutcome::Removed => Cell::new("removed").fg(Color::Green),
        CleanupOutcome::Failed(reason) => {
            Cell::new(format!("failed: {}", reason)).fg(Color::Yellow)
        }
    }
}

fn migration_table(records: &[MigrationRecord]) -> Table {
    let mut table = new_table(vec!["Manager", "Target dir", "Variable", "Cache", "Cleanup"]);
    for record in records {
        if !record.processed() {
            table.add_row(vec![
                Cell::new(&record.manager).fg(Color::DarkGrey),
                Cell::new("not installed").fg(Color::DarkGrey),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ]);
            continue;
        }
        let variable = match &record.env_value {
            Some(value) => Cell::new(format!("{}={}", record.env_var, value)),
            None => step_cell(&record.env),
        };
        table.add_row(vec![
            Cell::new(&record.manager),
            step_cell(&record.target_dir),
            variable,
            moved_cell(record),
            cleanup_cell(&record.cleanup),
        ]);
    }
    table
}

fn verification_table(result: &VerificationResult) -> Table {
    let mut table = new_table(vec!["Manager", "Variable", "Status", "Directory", "Size"]);
    for (env, dir) in result.env_checks.iter().zip(&result.dir_checks) {
        let status = match env.status {
            EnvStatus::Passed => Cell::new(format!("{} passed", char::from(NerdFont::Check)))
                .fg(Color::Green),
            EnvStatus::Failed => Cell::new(format!(
                "{} {}",
                char::from(NerdFont::Cross),
                env.value.as_deref().unwrap_or("unreadable")
            ))
            .fg(Color::Red),
            EnvStatus::NotSet => Cell::new("not set").fg(Color::Yellow),
        };
        let directory = if dir.exists {
            Cell::new(dir.path.display()).fg(Color::Green)
        } else {
            Cell::new(format!("{} (missing)", dir.path.display())).fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(&env.manager),
            Cell::new(&env.env_var),
            status,
            directory,
            Cell::new(if dir.exists {
                format_bytes(dir.size_bytes)
            } else {
                String::new()
            }),
        ]);
    }
    table
}

fn probe_table(result: &VerificationResult) -> Table {
    let mut table = new_table(vec!["Manager", "Probe", "Status", "Detail"]);
    for probe in &result.probes {
        let status = match probe.status {
            ProbeStatus::Ok => Cell::new("OK").fg(Color::Green),
            ProbeStatus::PendingRestart => Cell::new("PENDING_RESTART").fg(Color::Yellow),
            ProbeStatus::Error => Cell::new("ERROR").fg(Color::Red),
            ProbeStatus::Unknown => Cell::new("UNKNOWN").fg(Color::DarkGrey),
        };
        let kind = serde_json::to_value(probe.kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(&probe.manager),
            Cell::new(kind),
            status,
            Cell::new(probe.detail.as_deref().unwrap_or("")),
        ]);
    }
    table
}

fn print_summary(result: &VerificationResult, dry_run: bool) {
    let passed = result.env_vars_passed().len();
    let total = result.env_checks.len();
    println!(
        "{} {}/{} variables point at the target volume, {} of {} directories exist, {} cached",
        char::from(NerdFont::Info),
        passed,
        total,
        result.dirs_exist().len(),
        result.dir_checks.len(),
        format_bytes(result.total_cache_size_bytes)
    );

    if result.is_fully_configured() {
        println!(
            "{} {}",
            char::from(NerdFont::Check).to_string().green(),
            "All package managers are relocated".green()
        );
    } else if dry_run {
        println!(
            "{} Verification reflects the current state; the plan above was not applied",
            char::from(NerdFont::Info)
        );
    } else if passed > 0 {
        println!(
            "{} Open a new shell (or sign out) so running tools pick up the new variables",
            char::from(NerdFont::Warning).to_string().yellow()
        );
    }
}
