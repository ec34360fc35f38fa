//! Pipeline document handling.
//!
//! A pipeline is a named, ordered list of action descriptors plus optional
//! seed variables. Documents are read from YAML (`.yaml`/`.yml`) or JSON
//! (anything else).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::registry::ActionRegistry;

/// Document syntax, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// `version: 1.0` in YAML arrives as a number
fn scalar_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// One step of a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Registry tag selecting the action variant
    #[serde(rename = "type")]
    pub action_type: String,

    /// Label used in logs and history; defaults to the type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub params: Map<String, Value>,
}

impl ActionDescriptor {
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            name: None,
            params: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Name if given, otherwise the type tag
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.action_type)
    }

    /// Decode a branch parameter (`if_true`/`if_false`) into descriptors.
    ///
    /// Absent or null means an empty branch.
    pub fn branch(&self, key: &str) -> std::result::Result<Vec<ActionDescriptor>, String> {
        match self.params.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                format!(
                    "'{key}' of '{}' is not a list of actions: {e}",
                    self.display_name()
                )
            }),
        }
    }
}

/// A complete pipeline document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(
        default,
        deserialize_with = "scalar_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Seed variables written into the context before the first step
    #[serde(default, deserialize_with = "null_as_default")]
    pub variables: Map<String, Value>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<ActionDescriptor>,
}

const BRANCH_KEYS: [&str; 2] = ["if_true", "if_false"];

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: None,
            variables: Map::new(),
            actions: Vec::new(),
        }
    }

    /// Load a pipeline from a YAML or JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;

        let config: Self = match ConfigFormat::from_path(path) {
            ConfigFormat::Yaml => {
                serde_yaml::from_str(&content).map_err(|source| PipelineError::Yaml {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|source| PipelineError::Json {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };

        info!(
            pipeline = %config.name,
            steps = config.actions.len(),
            "Loaded pipeline from {}",
            path.display()
        );
        Ok(config)
    }

    /// Check the document's structure.
    ///
    /// Walks condition branches recursively. Unknown action types are not
    /// an error here; see [`PipelineConfig::unknown_action_types`].
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::config("Pipeline name must not be empty"));
        }
        validate_steps(&self.actions, "actions")
    }

    /// Action types (including nested branch steps) the registry does not know
    pub fn unknown_action_types(&self, registry: &ActionRegistry) -> Vec<String> {
        let mut unknown = Vec::new();
        collect_unknown(&self.actions, registry, &mut unknown);
        unknown
    }

    /// Total number of descriptors including nested branch steps
    pub fn step_count(&self) -> usize {
        count_steps(&self.actions)
    }
}

fn validate_steps(steps: &[ActionDescriptor], location: &str) -> Result<()> {
    for (i, step) in steps.iter().enumerate() {
        if step.action_type.trim().is_empty() {
            return Err(PipelineError::config(format!(
                "{location}[{i}] has an empty action type"
            )));
        }
        for key in BRANCH_KEYS {
            let nested = step.branch(key).map_err(PipelineError::config)?;
            validate_steps(&nested, &format!("{location}[{i}].params.{key}"))?;
        }
    }
    debug!("{} step(s) in {} are well-formed", steps.len(), location);
    Ok(())
}

fn collect_unknown(steps: &[ActionDescriptor], registry: &ActionRegistry, out: &mut Vec<String>) {
    for step in steps {
        if !registry.contains(&step.action_type) && !out.contains(&step.action_type) {
            out.push(step.action_type.clone());
        }
        for key in BRANCH_KEYS {
            if let Ok(nested) = step.branch(key) {
                collect_unknown(&nested, registry, out);
            }
        }
    }
}

fn count_steps(steps: &[ActionDescriptor]) -> usize {
    steps
        .iter()
        .map(|step| {
            1 + BRANCH_KEYS
                .iter()
                .filter_map(|key| step.branch(key).ok())
                .map(|nested| count_steps(&nested))
                .sum::<usize>()
        })
        .sum()
}
