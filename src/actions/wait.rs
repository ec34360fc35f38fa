use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::Action;
use crate::config_file::ActionDescriptor;
use crate::context::ExecutionContext;
use crate::executor::ActionExecutor;
use crate::expression::Expression;

fn default_seconds() -> f64 {
    1.0
}

fn default_timeout() -> f64 {
    30.0
}

fn default_interval() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct WaitParams {
    #[serde(default = "default_seconds")]
    pub seconds: f64,

    /// Expression to wait for instead of a fixed pause
    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout: f64,

    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Steps run before every evaluation, typically an `ocr` refresh
    #[serde(default)]
    pub poll: Vec<ActionDescriptor>,
}

/// Pause for a fixed time, or until a condition holds.
///
/// A condition that is still false when the timeout expires fails the step.
pub struct WaitAction {
    name: String,
    params: WaitParams,
}

fn seconds(label: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("'{label}' must be a non-negative number of seconds, got {value}"))
}

impl WaitAction {
    pub fn new(name: String, params: WaitParams) -> Self {
        Self { name, params }
    }

    fn wait_for(
        &self,
        condition: &str,
        ctx: &mut ExecutionContext,
        executor: &ActionExecutor<'_>,
    ) -> Result<()> {
        let expression = Expression::parse(condition)?;
        let timeout = seconds("timeout", self.params.timeout)?;
        let interval = seconds("interval", self.params.interval)?;
        let deadline = Instant::now() + timeout;

        loop {
            if !executor.execute_sequence(&self.params.poll, ctx) {
                bail!("A poll step failed while waiting for '{condition}'");
            }
            match expression.is_true(ctx.variables()) {
                Ok(true) => {
                    info!(action = %self.name, "Condition '{}' met", condition);
                    return Ok(());
                }
                Ok(false) => {}
                Err(e) => debug!(
                    action = %self.name,
                    "Condition '{}' not evaluable yet: {}", condition, e
                ),
            }

            let now = Instant::now();
            if now >= deadline {
                bail!("Condition '{condition}' not met within {timeout:?}");
            }
            thread::sleep(interval.min(deadline - now));
        }
    }
}

impl Action for WaitAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        match &self.params.condition {
            Some(condition) => self.wait_for(condition, ctx, executor),
            None => {
                let pause = seconds("seconds", self.params.seconds)?;
                info!(action = %self.name, "Waiting {:?}", pause);
                thread::sleep(pause);
                Ok(())
            }
        }
    }
}
