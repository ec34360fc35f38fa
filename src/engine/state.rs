//! Engine State Machine
//!
//! The engine owns its lifecycle state and only moves along these edges:
//!
//! ```text
//! Unloaded ──load──▶ Loaded ──run──▶ Running ──▶ Completed
//!                     ▲  │                  └──▶ Aborted
//!                     └──┘ (reload)
//!
//! Completed / Aborted ──run──▶ Running (fresh context)
//! Completed / Aborted ──load─▶ Loaded
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::error::PipelineError;

/// Lifecycle of a [`PipelineEngine`](super::PipelineEngine)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No pipeline loaded yet
    Unloaded,

    /// A pipeline is loaded and ready to run
    Loaded,

    /// Steps are executing
    Running,

    /// The last run finished with every step succeeding
    Completed,

    /// The last run halted at a failed step
    Aborted,
}

impl EngineState {
    pub const fn description(self) -> &'static str {
        match self {
            Self::Unloaded => "No pipeline loaded",
            Self::Loaded => "Pipeline loaded",
            Self::Running => "Pipeline running",
            Self::Completed => "Pipeline completed",
            Self::Aborted => "Pipeline aborted",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `to`
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Unloaded, Self::Loaded)
                | (Self::Loaded, Self::Loaded)
                | (Self::Loaded, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Aborted)
                | (Self::Completed | Self::Aborted, Self::Running)
                | (Self::Completed | Self::Aborted, Self::Loaded)
        )
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors from invalid lifecycle moves
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineTransitionError {
    #[error("No pipeline loaded (cannot move to {to})")]
    NotLoaded { to: EngineState },

    #[error("Pipeline is already running")]
    AlreadyRunning,

    #[error("Cannot move from {from} to {to}")]
    Invalid { from: EngineState, to: EngineState },
}

impl From<EngineTransitionError> for PipelineError {
    fn from(e: EngineTransitionError) -> Self {
        PipelineError::state(e.to_string())
    }
}

/// Current state plus a timestamped record of every transition.
#[derive(Debug, Clone)]
pub struct StateTracker {
    current: EngineState,
    history: Vec<(EngineState, DateTime<Utc>)>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            current: EngineState::Unloaded,
            history: Vec::new(),
        }
    }

    #[inline]
    pub fn current(&self) -> EngineState {
        self.current
    }

    /// Every state entered so far, oldest first
    pub fn history(&self) -> &[(EngineState, DateTime<Utc>)] {
        &self.history
    }

    /// Move to `to` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// - `NotLoaded` when running or finishing without a pipeline
    /// - `AlreadyRunning` when starting a run while one is in progress
    /// - `Invalid` for every other disallowed edge
    pub fn transition_to(&mut self, to: EngineState) -> Result<(), EngineTransitionError> {
        let from = self.current;
        if !from.can_transition_to(to) {
            return Err(match (from, to) {
                (EngineState::Unloaded, _) => EngineTransitionError::NotLoaded { to },
                (EngineState::Running, EngineState::Running) => {
                    EngineTransitionError::AlreadyRunning
                }
                _ => EngineTransitionError::Invalid { from, to },
            });
        }

        tracing::debug!("Engine state: {:?} -> {:?}", from, to);
        self.history.push((to, Utc::now()));
        self.current = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================================================
    // Transition table
    // ========================================================================

    #[test]
    fn test_initial_state() {
        let tracker = StateTracker::new();
        assert_eq!(tracker.current(), EngineState::Unloaded);
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut tracker = StateTracker::new();
        tracker.transition_to(EngineState::Loaded).unwrap();
        tracker.transition_to(EngineState::Running).unwrap();
        tracker.transition_to(EngineState::Aborted).unwrap();
        tracker.transition_to(EngineState::Running).unwrap();
        tracker.transition_to(EngineState::Completed).unwrap();
        tracker.transition_to(EngineState::Loaded).unwrap();

        let states: Vec<_> = tracker.history().iter().map(|(s, _)| *s).collect();
        assert_eq!(
            states,
            vec![
                EngineState::Loaded,
                EngineState::Running,
                EngineState::Aborted,
                EngineState::Running,
                EngineState::Completed,
                EngineState::Loaded,
            ]
        );
    }

    #[test]
    fn test_run_without_pipeline() {
        let mut tracker = StateTracker::new();
        let err = tracker.transition_to(EngineState::Running).unwrap_err();
        assert_eq!(
            err,
            EngineTransitionError::NotLoaded {
                to: EngineState::Running
            }
        );
        assert_eq!(tracker.current(), EngineState::Unloaded);
    }

    #[test]
    fn test_invalid_edges() {
        let mut tracker = StateTracker::new();
        tracker.transition_to(EngineState::Loaded).unwrap();
        assert!(matches!(
            tracker.transition_to(EngineState::Completed),
            Err(EngineTransitionError::Invalid { .. })
        ));

        tracker.transition_to(EngineState::Running).unwrap();
        assert_eq!(
            tracker.transition_to(EngineState::Running),
            Err(EngineTransitionError::AlreadyRunning)
        );
        assert!(tracker.transition_to(EngineState::Loaded).is_err());
        assert!(tracker.transition_to(EngineState::Unloaded).is_err());
        assert_eq!(tracker.current(), EngineState::Running);
    }

    #[test]
    fn test_error_converts_to_pipeline_error() {
        let err: PipelineError = EngineTransitionError::AlreadyRunning.into();
        assert!(matches!(err, PipelineError::State(_)));
        assert!(err.to_string().contains("already running"));
    }

    #[test]
    fn test_state_descriptions() {
        assert_eq!(EngineState::Unloaded.to_string(), "No pipeline loaded");
        assert_eq!(EngineState::Loaded.to_string(), "Pipeline loaded");
    }
}
