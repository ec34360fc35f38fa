//! tapflow library
//!
//! Pipeline execution engine for scripted Android UI automation: pipeline
//! documents, the action set, the executor and engine, and the device and
//! OCR collaborators they drive.

pub mod actions;
pub mod cli;
pub mod config_file;
pub mod context;
pub mod device;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expression;
pub mod ocr;
pub mod registry;
pub mod resolve;
pub mod settings;

// Re-export main types for convenience
pub use actions::{Action, ActionKind};
pub use config_file::{ActionDescriptor, PipelineConfig};
pub use context::{ExecutionContext, HistoryEntry, OcrResults, Point, TextMatch};
pub use device::{AdbDevice, Device, DryRunDevice, ShellOutput, UiNode};
pub use engine::{EngineState, PipelineEngine, RunOutcome, RunReport};
pub use error::{PipelineError, Result};
pub use executor::ActionExecutor;
pub use expression::{Expression, ExpressionError, evaluate_condition};
pub use ocr::{CommandRecognizer, NullRecognizer, TextRecognizer};
pub use registry::ActionRegistry;
pub use settings::{EngineSettings, OcrSettings};
