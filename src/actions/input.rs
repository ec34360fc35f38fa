use anyhow::Result;
use serde::Deserialize;
use tracing::info;

use super::Action;
use crate::context::ExecutionContext;
use crate::executor::ActionExecutor;
use crate::resolve::resolve_dollar;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputParams {
    /// Text to type; `${name}` tokens are substituted
    #[serde(default)]
    pub text: String,
}

/// Escape text for `input text` inside double quotes on the device shell.
///
/// Spaces become `%s`. Backslashes, quotes, `$` and backticks are
/// backslashed so the remote `sh` passes them through literally.
pub fn escape_input_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' ' => escaped.push_str("%s"),
            '\\' | '"' | '$' | '`' => {
                escaped.push('\\');
                escaped.push(c);
            }
            _ => escaped.push(c),
        }
    }
    escaped
}

pub struct InputAction {
    name: String,
    params: InputParams,
}

impl InputAction {
    pub fn new(name: String, params: InputParams) -> Self {
        Self { name, params }
    }
}

impl Action for InputAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, ctx: &mut ExecutionContext, executor: &ActionExecutor<'_>) -> Result<()> {
        let resolved = resolve_dollar(&self.params.text, ctx.variables());
        info!(action = %self.name, "Typing {:?}", resolved);
        executor.device().input_text(&escape_input_text(&resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_input_text() {
        assert_eq!(escape_input_text("hello world"), "hello%sworld");
        assert_eq!(escape_input_text(r#"say "hi""#), r#"say%s\"hi\""#);
        assert_eq!(escape_input_text("plain"), "plain");
    }

    #[test]
    fn test_escape_shell_expansion() {
        assert_eq!(escape_input_text("${user}"), r"\${user}");
        assert_eq!(escape_input_text("`id`"), r"\`id\`");
        assert_eq!(escape_input_text(r"C:\temp"), r"C:\\temp");
        assert_eq!(escape_input_text(r#"\""#), r#"\\\""#);
    }
}
