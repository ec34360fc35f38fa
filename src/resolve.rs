//! Variable substitution
//!
//! Two placeholder syntaxes are understood:
//!
//! - `{{name}}` used by most actions
//! - `${name}` used by text input
//!
//! Both replace a token with the variable's display form. A token whose
//! variable is not defined stays in the output untouched so the unresolved
//! text is visible to whatever consumes it next.

use crate::context::Point;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

static DOUBLE_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("static pattern"));

static DOLLAR_BRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\s*([^{}]+?)\s*\}").expect("static pattern"));

/// Errors raised while turning parameters into coordinates
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("expected a two-element [x, y] sequence, got {0}")]
    NotAPair(String),

    #[error("coordinate {0} is not an integer")]
    NotAnInteger(String),
}

/// Render a variable the way it is substituted into text.
///
/// Strings are inserted verbatim, everything else in its JSON form.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn substitute(pattern: &Regex, text: &str, variables: &HashMap<String, Value>) -> String {
    pattern
        .replace_all(text, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => display_value(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Replace every `{{name}}` token in `text`.
pub fn resolve_braces(text: &str, variables: &HashMap<String, Value>) -> String {
    substitute(&DOUBLE_BRACE, text, variables)
}

/// Replace every `${name}` token in `text`.
pub fn resolve_dollar(text: &str, variables: &HashMap<String, Value>) -> String {
    substitute(&DOLLAR_BRACE, text, variables)
}

/// Variable name when `text` is exactly one `{{name}}` token.
pub fn whole_token(text: &str) -> Option<&str> {
    let caps = DOUBLE_BRACE.captures(text.trim())?;
    let full = caps.get(0)?;
    if full.as_str().len() != text.trim().len() {
        return None;
    }
    caps.get(1).map(|m| m.as_str())
}

fn integer_of(value: &Value) -> Result<i64, ResolveError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| ResolveError::NotAnInteger(n.to_string())),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ResolveError::NotAnInteger(format!("{s:?}"))),
        other => Err(ResolveError::NotAnInteger(other.to_string())),
    }
}

/// Resolve one coordinate element.
///
/// A lone `{{name}}` token is replaced by the raw variable value so typed
/// numbers survive; anything else goes through text substitution first.
pub fn resolve_coordinate(
    value: &Value,
    variables: &HashMap<String, Value>,
) -> Result<i64, ResolveError> {
    match value {
        Value::String(s) => match whole_token(s).and_then(|name| variables.get(name)) {
            Some(bound) => integer_of(bound),
            None => integer_of(&Value::String(resolve_braces(s, variables))),
        },
        other => integer_of(other),
    }
}

/// Resolve an `[x, y]` parameter into a point.
pub fn resolve_position(
    value: &Value,
    variables: &HashMap<String, Value>,
) -> Result<Point, ResolveError> {
    match value.as_array().map(Vec::as_slice) {
        Some([x, y]) => Ok(Point::new(
            resolve_coordinate(x, variables)?,
            resolve_coordinate(y, variables)?,
        )),
        _ => Err(ResolveError::NotAPair(value.to_string())),
    }
}
