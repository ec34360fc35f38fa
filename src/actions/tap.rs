use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use serde_json::Value;
use std::thread;
use tracing::info;

use super::Action;
use crate::context::{ExecutionContext, Point};
use crate::executor::ActionExecutor;
use crate::resolve::{resolve_braces, resolve_position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressKind {
    #[default]
    Tap,
    LongPress,
}

impl PressKind {
    /// Synthesize the press on the executor's device and let the UI settle.
    pub(crate) fn perform(self, at: Point, executor: &ActionExecutor<'_>) -> Result<()> {
        let device = executor.device();
        match self {
            Self::Tap => device.tap(at)?,
            Self::LongPress => device.long_press(at, executor.settings().long_press())?,
        }
        thread::sleep(executor.settings().settle_delay());
        Ok(())
    }
}

/// `at` moved by `offset`; a target outside the coordinate range fails the step.
pub(crate) fn shifted(at: Point, offset: Point) -> Result<Point> {
    at.offset(offset)
        .ok_or_else(|| anyhow!("Tap target {at} shifted by {offset} is out of range"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClickParams {
    #[serde(default)]
    pub position: Option<Value>,

    /// Text to find in the stored OCR results; takes precedence over `position`
    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub offset: Option<Value>,

    /// Search only this result-set
    #[serde(default)]
    pub result_set: Option<String>,

    #[serde(default, rename = "action")]
    pub press: PressKind,
}

/// Tap (or long-press) recognized text or a fixed position.
pub struct ClickAction {
    name: String,
    params: ClickParams,
}

impl ClickAction {
    pub fn new(name: String, params: ClickParams) -> Self {
        Self { name, params }
    }

    fn target(&self, ctx: &ExecutionContext) -> Result<Point> {
        let vars = ctx.variables();
        let offset = match &self.params.offset {
            Some(value) => resolve_position(value, vars)?,
            None => Point::default(),
        };

        if let Some(text) = self.params.text.as_deref().filter(|t| !t.is_empty()) {
            let wanted = resolve_braces(text, vars);
            let hit = ctx
                .find_text(&wanted, self.params.result_set.as_deref())
                .ok_or_else(|| anyhow!("Text '{wanted}' not found in OCR results"))?;
            let at = hit.tap_point(offset).ok_or_else(|| {
                anyhow!("Tap target for '{wanted}' shifted by {offset} is out of range")
            })?;
            info!(
                action = %self.name,
                "Found {} match for '{}' in '{}': '{}' at {}, tapping {}",
                hit.kind,
                wanted,
                hit.result_set,
                hit.text_match.text(),
                hit.text_match.center(),
                at
            );
            return Ok(at);
        }

        match &self.params.position {
            Some(position) => shifted(resolve_position(position, vars)?, offset),
            None => bail!("Neither text nor position given"),
        }
    }
}

impl Action for ClickAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let at = self.target(ctx)?;
        info!(action = %self.name, "{:?} at {}", self.params.press, at);
        self.params.press.perform(at, executor)
    }
}
