use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// tapflow - declarative UI automation pipelines for Android devices
#[derive(Parser)]
#[command(name = "tapflow")]
#[command(about = "Run scripted UI automation pipelines against an Android device over adb")]
#[command(version)]
pub struct Cli {
    /// Log at debug level (RUST_LOG still takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a pipeline
    Run {
        /// Pipeline document (.yaml/.yml, anything else is read as JSON)
        config: PathBuf,

        /// Engine settings file (adb path, serial, OCR program, delays)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Device serial, overrides the settings file
        #[arg(long)]
        serial: Option<String>,

        /// Path to the adb binary, overrides the settings file
        #[arg(long)]
        adb: Option<PathBuf>,

        /// Dry-run mode: log device commands instead of sending them.
        ///
        /// Screen captures are blank and OCR finds nothing, so text lookups
        /// fail; waits and conditions behave normally.
        #[arg(long)]
        dry_run: bool,

        /// Write the run report (outcome, variables, history) as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Validate a pipeline document without running it
    Validate {
        /// Pipeline document to validate
        config: PathBuf,
    },
    /// List the available action types
    Actions,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["tapflow"]).is_err());
    }

    #[test]
    fn test_cli_run_with_options() {
        let cli = Cli::try_parse_from([
            "tapflow",
            "run",
            "pipeline.yaml",
            "--settings",
            "device.yaml",
            "--serial",
            "emulator-5554",
            "--dry-run",
            "--report",
            "out.json",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Run {
                config,
                settings,
                serial,
                adb,
                dry_run,
                report,
            } => {
                assert_eq!(config, PathBuf::from("pipeline.yaml"));
                assert_eq!(settings, Some(PathBuf::from("device.yaml")));
                assert_eq!(serial.as_deref(), Some("emulator-5554"));
                assert!(adb.is_none());
                assert!(dry_run);
                assert_eq!(report, Some(PathBuf::from("out.json")));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_validate_command() {
        let cli = Cli::try_parse_from(["tapflow", "validate", "/path/to/pipeline.json"]).unwrap();
        match cli.command {
            Commands::Validate { config } => {
                assert_eq!(config.to_str().unwrap(), "/path/to/pipeline.json");
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_cli_actions_command() {
        let cli = Cli::try_parse_from(["tapflow", "actions"]).unwrap();
        assert!(matches!(cli.command, Commands::Actions));
        assert!(!cli.verbose);
    }
}
