//! Action executor
//!
//! Builds and runs one descriptor at a time against a context. Whatever
//! happens inside a step (unknown type, bad parameters, device error) ends
//! up as a logged `false` and a history entry; the executor itself never
//! fails.

use chrono::Utc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config_file::ActionDescriptor;
use crate::context::{ExecutionContext, HistoryEntry};
use crate::device::Device;
use crate::ocr::TextRecognizer;
use crate::registry::ActionRegistry;
use crate::settings::EngineSettings;

/// Everything a step needs besides the context.
///
/// Actions receive the executor so they can reach the device and recognizer
/// and run nested steps through the same path as top-level ones.
pub struct ActionExecutor<'a> {
    registry: &'a ActionRegistry,
    device: &'a dyn Device,
    recognizer: &'a dyn TextRecognizer,
    settings: &'a EngineSettings,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        registry: &'a ActionRegistry,
        device: &'a dyn Device,
        recognizer: &'a dyn TextRecognizer,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            registry,
            device,
            recognizer,
            settings,
        }
    }

    pub fn device(&self) -> &dyn Device {
        self.device
    }

    pub fn recognizer(&self) -> &dyn TextRecognizer {
        self.recognizer
    }

    pub fn settings(&self) -> &EngineSettings {
        self.settings
    }

    pub fn registry(&self) -> &ActionRegistry {
        self.registry
    }

    /// Run one descriptor and record it in the history.
    ///
    /// The entry is appended when the step finishes, so steps nested in a
    /// branch appear before the step that ran them.
    pub fn execute_action(
        &self,
        descriptor: &ActionDescriptor,
        ctx: &mut ExecutionContext,
    ) -> bool {
        let name = descriptor.display_name();
        let action_type = descriptor.action_type.as_str();
        info!(action = name, "Executing action {} ({})", name, action_type);

        let started_at = Utc::now();
        let clock = Instant::now();

        let success = match self.registry.get(action_type) {
            None => {
                warn!(action = name, "Unknown action type: {}", action_type);
                false
            }
            Some(kind) => match kind.build(name, &descriptor.params) {
                Ok(action) => action.execute(ctx, self),
                Err(e) => {
                    error!(action = name, "Cannot build action: {:#}", e);
                    false
                }
            },
        };

        ctx.record(HistoryEntry {
            action_type: action_type.to_string(),
            name: name.to_string(),
            success,
            started_at,
            elapsed_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
        success
    }

    /// Run descriptors in order, stopping at the first failure.
    pub fn execute_sequence(&self, steps: &[ActionDescriptor], ctx: &mut ExecutionContext) -> bool {
        steps.iter().all(|step| self.execute_action(step, ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DryRunDevice;
    use crate::ocr::NullRecognizer;
    use serde_json::json;

    fn pause(name: &str) -> ActionDescriptor {
        ActionDescriptor::new("wait")
            .with_name(name)
            .with_param("seconds", json!(0))
    }

    fn run(steps: &[ActionDescriptor]) -> (bool, ExecutionContext) {
        let registry = ActionRegistry::builtin();
        let device = DryRunDevice::default();
        let settings = EngineSettings::immediate();
        let executor = ActionExecutor::new(&registry, &device, &NullRecognizer, &settings);
        let mut ctx = ExecutionContext::new();
        let ok = executor.execute_sequence(steps, &mut ctx);
        (ok, ctx)
    }

    #[test]
    fn test_sequence_stops_at_first_failure() {
        let (ok, ctx) = run(&[
            pause("first"),
            ActionDescriptor::new("teleport"),
            pause("never"),
        ]);
        assert!(!ok);
        let names: Vec<_> = ctx.history().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["first", "teleport"]);
        assert!(ctx.history()[0].success);
        assert!(!ctx.history()[1].success);
    }

    #[test]
    fn test_empty_sequence_succeeds() {
        let (ok, ctx) = run(&[]);
        assert!(ok);
        assert!(ctx.history().is_empty());
    }

    #[test]
    fn test_build_failure_is_recorded() {
        let bad = ActionDescriptor::new("wait").with_param("seconds", json!("soon"));
        let (ok, ctx) = run(&[bad]);
        assert!(!ok);
        assert_eq!(ctx.history().len(), 1);
        assert_eq!(ctx.history()[0].action_type, "wait");
        assert_eq!(ctx.history()[0].name, "wait");
    }
}
