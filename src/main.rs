//! tapflow - Main entry point
//!
//! Maps the command line onto the library: `run` drives a pipeline through
//! the engine, `validate` checks a document, `actions` lists action types.
//! Exit codes: 0 success, 1 failed run, 2 configuration error.

use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use tracing::Dispatch;
use tracing_subscriber::EnvFilter;

use tapflow::cli::{Cli, Commands};
use tapflow::ocr::recognizer_from_settings;
use tapflow::{
    ActionKind, ActionRegistry, AdbDevice, Device, DryRunDevice, EngineSettings, NullRecognizer,
    PipelineConfig, PipelineEngine, RunOutcome, TextRecognizer,
};

const EXIT_RUN_FAILED: i32 = 1;
const EXIT_CONFIG_ERROR: i32 = 2;

/// Build the subscriber handed to the engine.
///
/// `RUST_LOG` wins when set; otherwise `-v` selects debug and the default is info.
fn build_dispatch(verbose: bool) -> Dispatch {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    Dispatch::new(subscriber)
}

fn main() {
    let cli = Cli::parse_args();

    let code = match cli.command {
        Commands::Run {
            config,
            settings,
            serial,
            adb,
            dry_run,
            report,
        } => {
            let options = RunOptions {
                settings,
                serial,
                adb,
                dry_run,
                report,
            };
            run_pipeline(&config, options, build_dispatch(cli.verbose))
        }
        Commands::Validate { config } => validate_pipeline(&config),
        Commands::Actions => {
            list_actions();
            0
        }
    };

    std::process::exit(code);
}

struct RunOptions {
    settings: Option<PathBuf>,
    serial: Option<String>,
    adb: Option<PathBuf>,
    dry_run: bool,
    report: Option<PathBuf>,
}

fn load_settings(options: &RunOptions) -> tapflow::Result<EngineSettings> {
    let mut settings = match &options.settings {
        Some(path) => EngineSettings::load_from_file(path)?,
        None => EngineSettings::default(),
    };
    if let Some(serial) = &options.serial {
        settings.serial = Some(serial.clone());
    }
    if let Some(adb) = &options.adb {
        settings.adb_path = adb.clone();
    }
    Ok(settings)
}

fn run_pipeline(config: &Path, options: RunOptions, dispatch: Dispatch) -> i32 {
    let settings = match load_settings(&options) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("✗ Failed to load settings: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };

    let (device, recognizer): (Box<dyn Device>, Box<dyn TextRecognizer>) = if options.dry_run {
        println!("🔍 Dry run: device commands are logged, not sent");
        (Box::new(DryRunDevice::default()), Box::new(NullRecognizer))
    } else {
        (
            Box::new(AdbDevice::from_settings(&settings)),
            recognizer_from_settings(&settings.ocr),
        )
    };

    let mut engine = PipelineEngine::new(device, recognizer, settings).with_dispatch(dispatch);
    if let Err(e) = engine.load_config(config) {
        eprintln!("✗ Failed to load pipeline: {}", e);
        return EXIT_CONFIG_ERROR;
    }

    let report = engine.run();
    if let Some(path) = &options.report {
        if let Err(e) = report.save(path) {
            eprintln!("✗ Failed to write run report: {}", e);
        }
    }

    let pipeline = report.pipeline.as_deref().unwrap_or_default();
    match &report.outcome {
        RunOutcome::Completed => {
            println!(
                "✓ Pipeline '{}' completed ({} steps, {} ms)",
                pipeline,
                report.context.history().len(),
                report.elapsed_ms
            );
            0
        }
        RunOutcome::Aborted { step, name } => {
            eprintln!("✗ Pipeline '{}' aborted at step {} ({})", pipeline, step, name);
            EXIT_RUN_FAILED
        }
        RunOutcome::NotLoaded => {
            eprintln!("✗ No pipeline loaded");
            EXIT_RUN_FAILED
        }
    }
}

fn validate_pipeline(path: &Path) -> i32 {
    let config = match PipelineConfig::load_from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ Failed to load pipeline: {}", e);
            return EXIT_CONFIG_ERROR;
        }
    };
    if let Err(e) = config.validate() {
        eprintln!("✗ Pipeline validation failed: {}", e);
        return EXIT_CONFIG_ERROR;
    }

    let unknown = config.unknown_action_types(&ActionRegistry::builtin());
    if !unknown.is_empty() {
        eprintln!("✗ Unknown action types: {}", unknown.join(", "));
        return EXIT_CONFIG_ERROR;
    }

    println!(
        "✓ Pipeline '{}' is valid ({} steps, {} including branches)",
        config.name,
        config.actions.len(),
        config.step_count()
    );
    0
}

fn list_actions() {
    for kind in ActionKind::iter() {
        println!("{:<36} {}", kind.tag(), kind.description());
    }
}
