//! What one key (or one Ex line) produces for the host.

use core_events::{ConcreteCommand, KeyToken};
use core_ex::ExError;
use serde_json::{Value, json};

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchResult {
    /// More keys are needed; nothing to do yet.
    NeedMore,
    Dispatched(ConcreteCommand),
    /// Keys matched nothing; the host should blink. State has been reset.
    Unmapped,
    /// Text-entry key the host inserts (or otherwise handles) itself.
    Passthrough(KeyToken),
    /// Command-line prompt contents including its leader (`:`, `/`, `?`).
    /// Empty once the prompt closes without submitting.
    Prompt(String),
    /// Consumed entirely by the input layer (mapping edits, `:let`).
    Handled,
    ExFailed(ExError),
}

impl DispatchResult {
    pub fn command(&self) -> Option<&ConcreteCommand> {
        match self {
            DispatchResult::Dispatched(cmd) => Some(cmd),
            _ => None,
        }
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self, DispatchResult::Dispatched(_))
    }

    /// Express the result as host commands, used when folding several
    /// results into one `sequence`.
    pub(crate) fn into_commands(self) -> Vec<ConcreteCommand> {
        match self {
            DispatchResult::NeedMore | DispatchResult::Handled => Vec::new(),
            DispatchResult::Dispatched(cmd) => vec![cmd],
            DispatchResult::Unmapped => vec![ConcreteCommand::new("blink")],
            DispatchResult::Passthrough(key) => {
                vec![ConcreteCommand::new("insert-key").with_arg("key", key.to_string())]
            }
            DispatchResult::Prompt(text) => {
                vec![ConcreteCommand::new("show-prompt").with_arg("text", text)]
            }
            DispatchResult::ExFailed(err) => vec![
                ConcreteCommand::new("show-error")
                    .with_arg("code", err.code())
                    .with_arg("message", err.to_string()),
            ],
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            DispatchResult::NeedMore => json!({ "result": "need-more" }),
            DispatchResult::Dispatched(cmd) => json!({ "result": "dispatched", "command": cmd.to_value() }),
            DispatchResult::Unmapped => json!({ "result": "unmapped" }),
            DispatchResult::Passthrough(key) => json!({ "result": "passthrough", "key": key.to_string() }),
            DispatchResult::Prompt(text) => json!({ "result": "prompt", "text": text }),
            DispatchResult::Handled => json!({ "result": "handled" }),
            DispatchResult::ExFailed(err) => json!({
                "result": "ex-error",
                "code": err.code(),
                "message": err.to_string(),
            }),
        }
    }
}

/// Fold the results of feeding several keys into one.
///
/// Intermediate prompt echoes are dropped; a single remaining result is
/// returned as-is unless `undo_group` asks for a grouped sequence.
pub(crate) fn combine(results: Vec<DispatchResult>, undo_group: bool) -> DispatchResult {
    let mut significant: Vec<DispatchResult> = results
        .into_iter()
        .filter(|r| !matches!(r, DispatchResult::NeedMore))
        .collect();
    let last = significant.len().saturating_sub(1);
    let mut index = 0;
    significant.retain(|r| {
        let keep = index == last || !matches!(r, DispatchResult::Prompt(_));
        index += 1;
        keep
    });
    if significant.is_empty() {
        return DispatchResult::NeedMore;
    }
    if significant.len() == 1 && !undo_group {
        return significant.remove(0);
    }
    let commands: Vec<ConcreteCommand> = significant
        .into_iter()
        .flat_map(DispatchResult::into_commands)
        .collect();
    if commands.is_empty() {
        return DispatchResult::Handled;
    }
    DispatchResult::Dispatched(ConcreteCommand::sequence(commands, undo_group))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_result_passes_through() {
        let cmd = ConcreteCommand::new("undo");
        let out = combine(
            vec![DispatchResult::NeedMore, DispatchResult::Dispatched(cmd.clone())],
            false,
        );
        assert_eq!(out, DispatchResult::Dispatched(cmd));
    }

    #[test]
    fn prompt_echoes_are_dropped_before_a_result() {
        let out = combine(
            vec![
                DispatchResult::Prompt(":".into()),
                DispatchResult::Prompt(":w".into()),
                DispatchResult::Dispatched(ConcreteCommand::new("ex-write")),
            ],
            false,
        );
        assert_eq!(out.command().map(|c| c.name.as_str()), Some("ex-write"));
    }

    #[test]
    fn grouped_results_form_an_undo_sequence() {
        let out = combine(
            vec![
                DispatchResult::Dispatched(ConcreteCommand::new("delete")),
                DispatchResult::Passthrough(KeyToken::Char('a')),
            ],
            true,
        );
        let cmd = out.command().unwrap();
        assert_eq!(cmd.name, core_events::SEQUENCE_COMMAND);
        assert_eq!(cmd.arg("undo_group"), Some(&Value::Bool(true)));
        let names: Vec<String> = cmd.steps().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["delete", "insert-key"]);
    }

    #[test]
    fn nothing_significant_needs_more() {
        assert_eq!(combine(vec![DispatchResult::NeedMore], false), DispatchResult::NeedMore);
        assert_eq!(combine(vec![], true), DispatchResult::NeedMore);
    }
}
