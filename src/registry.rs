//! Action registry
//!
//! Maps descriptor `type` tags to action variants. The registry is filled
//! before a run starts and only read while it runs; the executor holds it by
//! shared reference.

use std::collections::HashMap;
use strum::IntoEnumIterator;

use crate::actions::ActionKind;

/// Registry of action types known to the executor
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    kinds: HashMap<String, ActionKind>,
}

impl ActionRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in action under its own tag
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in ActionKind::iter() {
            registry.register(kind.tag(), kind);
        }
        // Older pipelines name the toggle by its second revision
        registry.register("toggle_bluetooth_v2", ActionKind::ToggleBluetooth);
        registry
    }

    /// Register `kind` under `tag`, returning what the tag mapped to before.
    ///
    /// Extra tags act as aliases for an existing variant.
    pub fn register(&mut self, tag: impl Into<String>, kind: ActionKind) -> Option<ActionKind> {
        self.kinds.insert(tag.into(), kind)
    }

    pub fn get(&self, tag: &str) -> Option<ActionKind> {
        self.kinds.get(tag).copied()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.kinds.contains_key(tag)
    }

    /// All registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.kinds.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}
