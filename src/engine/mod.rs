//! Pipeline engine, the top-level driver.
//!
//! Loads a pipeline document, seeds a fresh context, and runs the steps in
//! order through an [`ActionExecutor`]. The first failed step halts the run.
//! Nothing is rolled back: device side effects and context writes made
//! before the failure stay as they are.

pub mod state;

pub use state::{EngineState, EngineTransitionError, StateTracker};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{Dispatch, dispatcher, error, info, warn};

use crate::config_file::PipelineConfig;
use crate::context::ExecutionContext;
use crate::device::Device;
use crate::error::{PipelineError, Result};
use crate::executor::ActionExecutor;
use crate::ocr::TextRecognizer;
use crate::registry::ActionRegistry;
use crate::settings::EngineSettings;

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step returned success
    Completed,

    /// Step `step` (1-based) failed; later steps were never attempted
    Aborted { step: usize, name: String },

    /// `run` was called before any pipeline was loaded
    NotLoaded,
}

/// Result of one call to [`PipelineEngine::run`].
///
/// Owns the context the run used; the engine starts every run with a new one.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub pipeline: Option<String>,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub context: ExecutionContext,
}

impl RunReport {
    fn not_loaded() -> Self {
        Self {
            pipeline: None,
            outcome: RunOutcome::NotLoaded,
            started_at: Utc::now(),
            elapsed_ms: 0,
            context: ExecutionContext::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Outcome, final variables, OCR result-sets and step history as JSON
    pub fn to_json(&self) -> Value {
        json!({
            "pipeline": self.pipeline,
            "success": self.is_success(),
            "outcome": self.outcome,
            "started_at": self.started_at,
            "elapsed_ms": self.elapsed_ms,
            "variables": self.context.variables(),
            "ocr_results": self.context.ocr_results(),
            "history": self.context.history(),
        })
    }

    /// Write [`RunReport::to_json`] to `path`, pretty-printed
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(&self.to_json()).map_err(|source| PipelineError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, content).map_err(|e| PipelineError::io(path, e))?;
        info!("Run report written to {}", path.display());
        Ok(())
    }
}

/// Runs one loaded pipeline at a time against a device.
pub struct PipelineEngine {
    registry: ActionRegistry,
    device: Box<dyn Device>,
    recognizer: Box<dyn TextRecognizer>,
    settings: EngineSettings,
    dispatch: Option<Dispatch>,
    config: Option<PipelineConfig>,
    state: StateTracker,
}

impl PipelineEngine {
    /// Engine with the built-in action registry and no logger of its own
    pub fn new(
        device: Box<dyn Device>,
        recognizer: Box<dyn TextRecognizer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            registry: ActionRegistry::builtin(),
            device,
            recognizer,
            settings,
            dispatch: None,
            config: None,
            state: StateTracker::new(),
        }
    }

    pub fn with_registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Route the engine's logging to `dispatch` while it loads and runs.
    ///
    /// Without one, events go to whatever subscriber is current for the
    /// calling thread.
    pub fn with_dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    pub fn state(&self) -> EngineState {
        self.state.current()
    }

    pub fn state_history(&self) -> &[(EngineState, DateTime<Utc>)] {
        self.state.history()
    }

    pub fn config(&self) -> Option<&PipelineConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Load and validate a pipeline document.
    ///
    /// On error the engine keeps its previous pipeline and state.
    pub fn load_config<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let dispatch = self.dispatch.clone();
        scoped(dispatch.as_ref(), || {
            let config = PipelineConfig::load_from_file(path)?;
            self.load(config)
        })
    }

    /// Install an already-parsed pipeline.
    pub fn load(&mut self, config: PipelineConfig) -> Result<()> {
        config.validate()?;
        if !self.state.current().can_transition_to(EngineState::Loaded) {
            return Err(EngineTransitionError::Invalid {
                from: self.state.current(),
                to: EngineState::Loaded,
            }
            .into());
        }

        let unknown = config.unknown_action_types(&self.registry);
        if !unknown.is_empty() {
            warn!(
                pipeline = %config.name,
                "Pipeline uses unknown action types: {}; the run will halt there",
                unknown.join(", ")
            );
        }

        self.state.transition_to(EngineState::Loaded)?;
        self.config = Some(config);
        Ok(())
    }

    /// Run the loaded pipeline with a fresh context.
    ///
    /// Never fails: a missing pipeline is reported as
    /// [`RunOutcome::NotLoaded`], a failed step as [`RunOutcome::Aborted`].
    pub fn run(&mut self) -> RunReport {
        let dispatch = self.dispatch.clone();
        scoped(dispatch.as_ref(), || self.run_loaded())
    }

    fn run_loaded(&mut self) -> RunReport {
        let Some(config) = self.config.as_ref() else {
            error!("No pipeline loaded, nothing to run");
            return RunReport::not_loaded();
        };
        if let Err(e) = self.state.transition_to(EngineState::Running) {
            error!("Cannot start pipeline '{}': {}", config.name, e);
            return RunReport::not_loaded();
        }

        let started_at = Utc::now();
        let clock = Instant::now();
        let mut ctx = ExecutionContext::new();
        for (key, value) in &config.variables {
            ctx.set_variable(key.clone(), value.clone());
        }

        let executor = ActionExecutor::new(
            &self.registry,
            self.device.as_ref(),
            self.recognizer.as_ref(),
            &self.settings,
        );

        let total = config.actions.len();
        info!(pipeline = %config.name, "Starting pipeline with {} steps", total);

        let mut outcome = RunOutcome::Completed;
        for (i, step) in config.actions.iter().enumerate() {
            info!(
                pipeline = %config.name,
                "Executing action {}/{}: {}",
                i + 1,
                total,
                step.display_name()
            );
            if !executor.execute_action(step, &mut ctx) {
                error!(
                    pipeline = %config.name,
                    "Step {} ({}) failed, halting pipeline",
                    i + 1,
                    step.display_name()
                );
                outcome = RunOutcome::Aborted {
                    step: i + 1,
                    name: step.display_name().to_string(),
                };
                break;
            }
        }

        let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
        let finished = match outcome {
            RunOutcome::Completed => {
                info!(pipeline = %config.name, "Pipeline completed in {} ms", elapsed_ms);
                EngineState::Completed
            }
            _ => EngineState::Aborted,
        };
        let pipeline = Some(config.name.clone());

        if let Err(e) = self.state.transition_to(finished) {
            error!("Cannot finish pipeline: {}", e);
        }

        RunReport {
            pipeline,
            outcome,
            started_at,
            elapsed_ms,
            context: ctx,
        }
    }
}

/// Run `f` with `dispatch` as the thread's default subscriber, if given
fn scoped<R>(dispatch: Option<&Dispatch>, f: impl FnOnce() -> R) -> R {
    match dispatch {
        Some(dispatch) => dispatcher::with_default(dispatch, f),
        None => f(),
    }
}
