use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CleanupMode;
use crate::ui::OutputFormat;

/// Relocate package-manager caches to another volume and verify the result
#[derive(Parser, Debug)]
#[command(name = "devcache", author, version, about, long_about = None)]
pub struct Cli {
    /// Show debug events
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Destination root, overrides `target_root` from the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub target_root: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Detect installed package managers, move their caches and verify (default)
    Migrate(MigrateArgs),
    /// Report the current configuration state without changing anything
    Verify,
    /// Show every known package manager with its variable and locations
    List,
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct MigrateArgs {
    /// Plan the migration and report it without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only migrate the named package manager (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    pub only: Vec<String>,

    /// Pick the package managers to migrate interactively
    #[arg(long)]
    pub choose: bool,

    /// Whether to delete the old cache after a verified copy
    #[arg(long, value_enum)]
    pub cleanup: Option<CleanupMode>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommands {
    /// Print the config file location
    Path,
    /// Print the effective configuration as TOML
    Show,
    /// Write a config file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_parses() {
        let cli = Cli::try_parse_from(["devcache", "--debug"]).unwrap();
        assert!(cli.debug);
        assert!(cli.command.is_none());
    }

    #[test]
    fn migrate_flags() {
        let cli = Cli::try_parse_from([
            "devcache",
            "migrate",
            "--dry-run",
            "--only",
            "npm",
            "--only",
            "pip",
            "--cleanup",
            "never",
            "--output",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.output, OutputFormat::Json));
        match cli.command {
            Some(Commands::Migrate(args)) => {
                assert!(args.dry_run);
                assert_eq!(args.only, vec!["npm", "pip"]);
                assert_eq!(args.cleanup, Some(CleanupMode::Never));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
