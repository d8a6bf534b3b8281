//! Command handlers behind the CLI.

use anyhow::{Context, Result, bail};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::Catalog;
use crate::cli::{Cli, Commands, ConfigCommands, MigrateArgs};
use crate::common::paths::expand_user_path;
use crate::common::progress::{create_spinner, finish_spinner};
use crate::config::{CleanupMode, Config};
use crate::detect::detect_all;
use crate::env::{EnvConfigurator, system_store};
use crate::migrate::{
    AlwaysCleanup, CleanupPolicy, MigrationOrchestrator, NeverCleanup, RunMode,
};
use crate::mover::DirectoryMover;
use crate::privileges;
use crate::prompt::{ConfirmCleanup, choose_managers};
use crate::report::{Command, RunReport, presenter_for};
use crate::ui::prelude::*;
use crate::verify::{ProbeRegistry, VerificationEngine};

/// Settings resolved from global flags and the config file.
pub struct AppContext {
    pub config_path: PathBuf,
    pub config: Config,
    pub target_root: Option<PathBuf>,
}

impl AppContext {
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = match &cli.config {
            Some(raw) => expand_user_path(raw),
            None => Config::default_path()?,
        };
        let config = Config::load_from_path(&config_path)?;
        let target_root = cli.target_root.as_deref().map(expand_user_path);
        if let Some(root) = &target_root
            && !root.is_absolute()
        {
            bail!("--target-root must be an absolute path, got {}", root.display());
        }
        Ok(Self {
            config_path,
            config,
            target_root,
        })
    }

    pub fn catalog(&self) -> Result<Catalog> {
        self.config.build_catalog(self.target_root.as_deref())
    }

    fn verification_engine(&self, env: EnvConfigurator) -> VerificationEngine {
        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        VerificationEngine::new(env, ProbeRegistry::with_defaults(timeout))
    }
}

/// Run the selected command. Returns whether any stage failure was recorded.
pub async fn dispatch(cli: Cli) -> Result<bool> {
    let context = AppContext::load(&cli)?;
    match cli.command {
        None => handle_migrate(&context, MigrateArgs::default()).await,
        Some(Commands::Migrate(args)) => handle_migrate(&context, args).await,
        Some(Commands::Verify) => handle_verify(&context).await,
        Some(Commands::List) => handle_list(&context).map(|_| false),
        Some(Commands::Config { command }) => handle_config(&context, command).map(|_| false),
    }
}

fn cleanup_policy(mode: CleanupMode) -> Box<dyn CleanupPolicy> {
    match mode {
        CleanupMode::Ask => Box::new(ConfirmCleanup),
        CleanupMode::Always => Box::new(AlwaysCleanup),
        CleanupMode::Never => Box::new(NeverCleanup),
    }
}

pub async fn handle_migrate(context: &AppContext, args: MigrateArgs) -> Result<bool> {
    let mode = if args.dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    };
    if mode == RunMode::Apply {
        privileges::require_elevation()?;
    }

    let mut catalog = context.catalog()?;
    if !args.only.is_empty() {
        catalog = catalog.select(&args.only)?;
    }

    let spinner = create_spinner("Detecting package managers...".to_string());
    let mut detections = detect_all(&catalog).await;
    finish_spinner(spinner);

    if args.choose {
        let chosen = choose_managers(&detections)?;
        catalog = catalog.select(&chosen)?;
        detections.retain(|d| chosen.iter().any(|name| name == &d.manager));
    }

    let installed = detections.iter().filter(|d| d.installed).count();
    emit(
        Level::Info,
        "detect.summary",
        &format!(
            "{} {} of {} package managers installed",
            char::from(NerdFont::Search),
            installed,
            catalog.len()
        ),
        None,
    );

    let env = EnvConfigurator::new(system_store());
    let mover = DirectoryMover::new(context.config.strict_copy);
    let cleanup = cleanup_policy(args.cleanup.unwrap_or(context.config.cleanup));
    let orchestrator = MigrationOrchestrator::new(&env, mover, cleanup.as_ref(), mode);

    // Copies and prompts block; keep the runtime's other workers free
    let migrations = tokio::task::block_in_place(|| orchestrator.run(&catalog, &detections));

    let spinner = create_spinner("Verifying configuration...".to_string());
    let verification = context.verification_engine(env.clone()).verify(&catalog).await;
    finish_spinner(spinner);

    let mut report = RunReport::new(
        Command::Migrate,
        catalog.target_root().to_path_buf(),
        env.location(),
    );
    report.mode = Some(mode);
    report.detections = detections;
    report.migrations = migrations;
    report.verification = Some(verification);

    presenter_for(get_output_format()).render(&report)?;
    Ok(report.has_failures())
}

pub async fn handle_verify(context: &AppContext) -> Result<bool> {
    let catalog = context.catalog()?;
    let env = EnvConfigurator::new(system_store());

    let spinner = create_spinner("Verifying configuration...".to_string());
    let verification = context.verification_engine(env.clone()).verify(&catalog).await;
    finish_spinner(spinner);

    let mut report = RunReport::new(
        Command::Verify,
        catalog.target_root().to_path_buf(),
        env.location(),
    );
    report.verification = Some(verification);

    presenter_for(get_output_format()).render(&report)?;
    Ok(report.has_failures())
}

pub fn handle_list(context: &AppContext) -> Result<()> {
    let catalog = context.catalog()?;

    if matches!(get_output_format(), OutputFormat::Json) {
        for descriptor in catalog.descriptors() {
            emit(
                Level::Info,
                "list.descriptor",
                &descriptor.name,
                Some(serde_json::to_value(descriptor).context("serializing descriptor")?),
            );
        }
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Manager", "Variable", "Target", "Sources", "Detected by"]);
    for descriptor in catalog.descriptors() {
        let variable = match &descriptor.env_value_template {
            Some(template) => format!("{} ({})", descriptor.env_var, template),
            None => descriptor.env_var.clone(),
        };
        let detected_by: Vec<&str> = descriptor
            .detection_commands
            .iter()
            .chain(&descriptor.detection_paths)
            .map(String::as_str)
            .collect();
        table.add_row(vec![
            descriptor.name.clone(),
            variable,
            descriptor.target_path.display().to_string(),
            descriptor.source_paths.join("\n"),
            detected_by.join("\n"),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub fn handle_config(context: &AppContext, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            println!("{}", context.config_path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let mut effective = context.config.clone();
            if let Some(root) = &context.target_root {
                effective.target_root = root.clone();
            }
            let toml = toml::to_string_pretty(&effective).context("serializing config to toml")?;
            print!("{}", toml);
            Ok(())
        }
        ConfigCommands::Init { force } => init_config(&context.config_path, force),
    }
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }
    Config::default().save_to_path(path)?;
    emit(
        Level::Success,
        "config.init",
        &format!(
            "{} Wrote default config to {}",
            char::from(NerdFont::Check),
            path.display()
        ),
        None,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devcache/config.toml");

        init_config(&path, false).unwrap();
        assert!(path.exists());
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();
        assert_eq!(Config::load_from_path(&path).unwrap(), Config::default());
    }

    #[test]
    fn relative_target_root_flag_is_rejected() {
        let cli = Cli {
            debug: false,
            output: OutputFormat::Text,
            no_color: true,
            config: Some("/nonexistent/devcache.toml".into()),
            target_root: Some("relative/root".into()),
            command: None,
        };
        assert!(AppContext::load(&cli).is_err());
    }
}
