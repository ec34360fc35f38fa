use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::tap::shifted;
use super::{Action, PressKind, SETTINGS};
use crate::context::{ExecutionContext, Point};
use crate::device::UiNode;
use crate::executor::ActionExecutor;
use crate::resolve::{resolve_braces, resolve_position};

fn default_intent() -> String {
    SETTINGS.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSettingsParams {
    #[serde(default = "default_intent")]
    pub intent: String,
}

/// Start an activity by intent action.
pub struct OpenActivityAction {
    name: String,
    intent: String,
}

impl OpenActivityAction {
    pub fn new(name: String, intent: impl Into<String>) -> Self {
        Self {
            name,
            intent: intent.into(),
        }
    }

    pub fn from_params(name: String, params: OpenSettingsParams) -> Self {
        Self::new(name, params.intent)
    }
}

impl Action for OpenActivityAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let intent = resolve_braces(&self.intent, ctx.variables());
        info!(action = %self.name, "Opening {}", intent);
        executor.device().start_activity(&intent)
    }
}

fn default_stop() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchAppParams {
    pub package: String,

    /// Force-stop the app first so it opens on its main screen
    #[serde(default = "default_stop")]
    pub stop: bool,
}

pub struct LaunchAppAction {
    name: String,
    params: LaunchAppParams,
}

impl LaunchAppAction {
    pub fn new(name: String, params: LaunchAppParams) -> Self {
        Self { name, params }
    }
}

impl Action for LaunchAppAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let package = resolve_braces(&self.params.package, ctx.variables());
        if package.trim().is_empty() {
            bail!("Package name is empty");
        }
        info!(action = %self.name, "Launching {} (stop first: {})", package, self.params.stop);
        executor.device().launch_app(&package, self.params.stop)
    }
}

/// One string or a list of alternatives
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextChoice {
    One(String),
    Any(Vec<String>),
}

impl TextChoice {
    fn alternatives(&self) -> &[String] {
        match self {
            Self::One(s) => std::slice::from_ref(s),
            Self::Any(list) => list,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiClickParams {
    /// Exact view text, or a list of accepted texts
    #[serde(default)]
    pub text: Option<TextChoice>,

    #[serde(default)]
    pub resource_id: Option<String>,

    /// View class, e.g. `android.widget.Switch`
    #[serde(default)]
    pub class_name: Option<String>,

    #[serde(default)]
    pub offset: Option<Value>,

    #[serde(default, rename = "action")]
    pub press: PressKind,
}

/// Tap the first view in the UI hierarchy matching every given criterion.
pub struct UiClickAction {
    name: String,
    params: UiClickParams,
}

impl UiClickAction {
    pub fn new(name: String, params: UiClickParams) -> Self {
        Self { name, params }
    }

    fn matches(&self, node: &UiNode, texts: &[String]) -> bool {
        let p = &self.params;
        (texts.is_empty() || texts.iter().any(|t| *t == node.text || *t == node.content_desc))
            && p.resource_id.as_ref().is_none_or(|id| *id == node.resource_id)
            && p.class_name.as_ref().is_none_or(|c| *c == node.class)
    }
}

impl Action for UiClickAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let p = &self.params;
        if p.text.is_none() && p.resource_id.is_none() && p.class_name.is_none() {
            bail!("ui_click needs at least one of text, resource_id or class_name");
        }

        let vars = ctx.variables();
        let texts: Vec<String> = p
            .text
            .as_ref()
            .map(|t| t.alternatives().iter().map(|s| resolve_braces(s, vars)).collect())
            .unwrap_or_default();
        let offset = match &p.offset {
            Some(value) => resolve_position(value, vars)?,
            None => Point::default(),
        };

        let nodes = executor.device().ui_dump()?;
        let node = nodes
            .iter()
            .find(|n| self.matches(n, &texts))
            .ok_or_else(|| anyhow!("No view matches {:?} among {} views", texts, nodes.len()))?;

        let at = shifted(node.bounds.center(), offset)?;
        info!(
            action = %self.name,
            "Found {} '{}' at {:?}, tapping {}",
            node.class,
            node.text,
            node.bounds,
            at
        );
        p.press.perform(at, executor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Bounds, DryRunDevice};
    use crate::ocr::NullRecognizer;
    use crate::registry::ActionRegistry;
    use crate::settings::EngineSettings;
    use serde_json::json;

    fn ui_click(params: Value) -> UiClickAction {
        UiClickAction::new("ui".to_string(), serde_json::from_value(params).unwrap())
    }

    fn view(class: &str, text: &str, resource_id: &str) -> UiNode {
        UiNode {
            text: text.to_string(),
            class: class.to_string(),
            resource_id: resource_id.to_string(),
            bounds: Bounds {
                left: 0,
                top: 0,
                right: 10,
                bottom: 10,
            },
            ..UiNode::default()
        }
    }

    #[test]
    fn test_text_choice_decoding() {
        let one: TextChoice = serde_json::from_value(json!("OK")).unwrap();
        assert_eq!(one.alternatives(), ["OK".to_string()]);
        let any: TextChoice = serde_json::from_value(json!(["OK", "确定"])).unwrap();
        assert_eq!(any.alternatives().len(), 2);
        assert!(serde_json::from_value::<TextChoice>(json!(3)).is_err());
    }

    #[test]
    fn test_every_criterion_must_match() {
        let action = ui_click(json!({"class_name": "android.widget.Button", "resource_id": "ok"}));
        let texts: Vec<String> = Vec::new();
        assert!(action.matches(&view("android.widget.Button", "", "ok"), &texts));
        assert!(!action.matches(&view("android.widget.Button", "", "cancel"), &texts));
        assert!(!action.matches(&view("android.widget.TextView", "", "ok"), &texts));

        let texts = vec!["确定".to_string(), "OK".to_string()];
        let by_text = ui_click(json!({"text": ["确定", "OK"]}));
        assert!(by_text.matches(&view("android.widget.Button", "OK", ""), &texts));
        let mut described = view("android.widget.ImageView", "", "");
        described.content_desc = "确定".to_string();
        assert!(by_text.matches(&described, &texts));
        assert!(!by_text.matches(&view("android.widget.Button", "Cancel", ""), &texts));
    }

    #[test]
    fn test_steps_reject_missing_targets() {
        let registry = ActionRegistry::builtin();
        let device = DryRunDevice::default();
        let settings = EngineSettings::immediate();
        let executor = ActionExecutor::new(&registry, &device, &NullRecognizer, &settings);
        let mut ctx = ExecutionContext::new();

        let err = ui_click(json!({"action": "tap"})).run(&mut ctx, &executor).unwrap_err();
        assert!(err.to_string().contains("at least one of"));

        // the dry-run hierarchy is empty
        let err = ui_click(json!({"text": "OK"})).run(&mut ctx, &executor).unwrap_err();
        assert!(err.to_string().contains("No view matches"));

        let empty = LaunchAppAction::new(
            "launch".to_string(),
            serde_json::from_value(json!({"package": " "})).unwrap(),
        );
        assert!(empty.run(&mut ctx, &executor).is_err());
    }

    #[test]
    fn test_open_settings_defaults() {
        let params: OpenSettingsParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(params.intent, SETTINGS);
        let launch: LaunchAppParams =
            serde_json::from_value(json!({"package": "com.example"})).unwrap();
        assert!(launch.stop);
    }
}
