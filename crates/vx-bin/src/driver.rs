//! Line driver shared by `--script` runs and the stdin REPL.
//!
//! Every line is an Ex line (leading `:`), a host report (a JSON object such
//! as `{"selection": {"line_span": 3, "column_span": 5, "mode": "visual"}}` or
//! `{"cursor": {"row": 4, "col": 7}}`), or key notation fed to the machine key
//! by key. Each result other than "need more keys" is written as one JSON
//! object per output line.

use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Result;
use core_actions::{CommandStateMachine, DispatchResult, MachineError, Session};
use core_events::{KeyToken, Mode};
use core_state::VisualRepeatInfo;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Dispatches that end an interactive session.
const QUIT_COMMANDS: &[&str] = &[
    "ex-quit",
    "ex-qall",
    "ex-wq",
    "ex-xit",
    "write-quit",
    "quit-no-write",
];

/// What the host says about its view between key presses.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct HostReport {
    /// `null` clears a previously reported selection.
    #[serde(default, deserialize_with = "present")]
    selection: Option<Option<VisualRepeatInfo>>,
    #[serde(default)]
    cursor: Option<CursorReport>,
}

#[derive(Debug, Deserialize)]
struct CursorReport {
    row: u32,
    col: u32,
}

/// Distinguishes an explicit `null` from a missing key.
fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

pub struct Driver {
    machine: CommandStateMachine,
    session: Session,
}

impl Driver {
    pub fn new(session: Session, mode: Mode) -> Self {
        let mut machine = CommandStateMachine::new();
        if mode != Mode::Normal {
            machine.set_mode(mode);
        }
        Self { machine, session }
    }

    pub fn mode(&self) -> Mode {
        self.machine.mode()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.machine.pending_deadline(&self.session)
    }

    pub fn feed_key(&mut self, key: KeyToken) -> Result<DispatchResult, MachineError> {
        self.machine.feed(&mut self.session, key)
    }

    pub fn flush_pending(&mut self) -> Result<DispatchResult, MachineError> {
        self.machine.flush_pending(&mut self.session)
    }

    /// Selection shape used when a Visual-mode command is recorded for `.`.
    pub fn set_selection(&mut self, selection: Option<VisualRepeatInfo>) {
        self.machine.set_selection(selection);
    }

    fn apply_report(&mut self, line: &str) -> Option<Value> {
        let report: HostReport = match serde_json::from_str(line) {
            Ok(report) => report,
            Err(err) => {
                warn!(target: "runtime", line, error = %err, "bad_host_report");
                return Some(json!({ "result": "error", "message": format!("host report: {err}") }));
            }
        };
        if let Some(selection) = report.selection {
            debug!(target: "runtime", ?selection, "selection_reported");
            self.set_selection(selection);
        }
        if let Some(cursor) = report.cursor {
            debug!(target: "runtime", row = cursor.row, col = cursor.col, "cursor_reported");
            self.session.cursor.row = cursor.row;
            self.session.cursor.col = cursor.col;
        }
        None
    }

    /// Results of one input line, `NeedMore` dropped.
    pub fn run_line(&mut self, line: &str) -> Vec<Value> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Vec::new();
        }
        if line.starts_with(':') {
            return vec![self.machine.run_ex(&mut self.session, line).to_json()];
        }
        if line.starts_with('{') {
            return self.apply_report(line).into_iter().collect();
        }
        let keys = match core_input::tokenize(line) {
            Ok(keys) => keys,
            Err(err) => {
                warn!(target: "runtime", line, error = %err, "bad_key_notation");
                return vec![error_json(&MachineError::from(err))];
            }
        };
        let mut out = Vec::new();
        for key in keys {
            match self.feed_key(key) {
                Ok(DispatchResult::NeedMore) => {}
                Ok(result) => out.push(result.to_json()),
                Err(err) => out.push(error_json(&err)),
            }
        }
        out
    }

    /// Run every line of `input`, writing JSON results to `out`.
    pub fn run_lines(&mut self, input: impl BufRead, out: &mut impl Write) -> Result<()> {
        let mut lines = 0usize;
        for line in input.lines() {
            let line = line?;
            lines += 1;
            for value in self.run_line(&line) {
                writeln!(out, "{value}")?;
            }
        }
        out.flush()?;
        debug!(target: "runtime", lines, mode = %self.mode(), "input_exhausted");
        Ok(())
    }
}

pub fn error_json(err: &MachineError) -> Value {
    json!({ "result": "error", "message": err.to_string() })
}

pub fn is_quit(result: &DispatchResult) -> bool {
    result
        .command()
        .is_some_and(|cmd| QUIT_COMMANDS.contains(&cmd.name.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn driver() -> Driver {
        Driver::new(Session::new().unwrap(), Mode::Normal)
    }

    #[test]
    fn key_lines_drop_need_more() {
        let mut d = driver();
        let out = d.run_line("2dd");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["result"], "dispatched");
        assert_eq!(out[0]["command"]["name"], "delete-lines");
    }

    #[test]
    fn colon_lines_are_ex() {
        let mut d = driver();
        let out = d.run_line(":w");
        assert_eq!(out[0]["command"]["name"], "ex-write");
    }

    #[test]
    fn commands_span_lines() {
        let mut d = driver();
        assert!(d.run_line("d").is_empty());
        let out = d.run_line("w");
        assert_eq!(out[0]["command"]["name"], "delete");
    }

    #[test]
    fn bad_notation_is_reported_not_fatal() {
        let mut d = driver();
        let out = d.run_line("<C-");
        assert_eq!(out[0]["result"], "error");
        assert_eq!(d.run_line("x")[0]["result"], "dispatched");
    }

    #[test]
    fn starting_mode_is_honoured() {
        let mut d = Driver::new(Session::new().unwrap(), Mode::Insert);
        assert_eq!(d.mode(), Mode::Insert);
        let out = d.run_line("a");
        assert_eq!(out[0]["result"], "passthrough");
    }

    #[test]
    fn run_lines_writes_one_object_per_result() {
        let mut d = driver();
        let mut out = Vec::new();
        d.run_lines("x\n\n:q\n".as_bytes(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let last: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(last["command"]["name"], "ex-quit");
    }

    #[test]
    fn reported_selection_shapes_visual_repeat() {
        let mut d = driver();
        assert_eq!(d.run_line("v").len(), 1);
        assert!(
            d.run_line(r#"{"selection": {"line_span": 3, "column_span": 5, "mode": "visual"}}"#)
                .is_empty()
        );
        assert_eq!(d.run_line("d")[0]["command"]["name"], "delete");
        let out = d.run_line(".");
        let select = &out[0]["command"]["args"]["commands"][0];
        assert_eq!(select["name"], "select-like-previous");
        assert_eq!(select["args"]["line_span"], 3);
        assert_eq!(select["args"]["column_span"], 5);
    }

    #[test]
    fn reported_cursor_seeds_the_sticky_column() {
        let mut d = driver();
        assert!(d.run_line(r#"{"cursor": {"row": 1, "col": 7}}"#).is_empty());
        let out = d.run_line("j");
        assert_eq!(out[0]["command"]["args"]["xpos"], 7);
    }

    #[test]
    fn malformed_report_is_an_error_line() {
        let mut d = driver();
        let out = d.run_line(r#"{"selection": 3}"#);
        assert_eq!(out[0]["result"], "error");
        let out = d.run_line(r#"{"scroll": 1}"#);
        assert_eq!(out[0]["result"], "error");
    }

    #[test]
    fn quit_commands_are_recognised() {
        let mut d = driver();
        let quit = d.machine.run_ex(&mut d.session, ":q");
        assert!(is_quit(&quit));
        let write = d.machine.run_ex(&mut d.session, ":w");
        assert!(!is_quit(&write));
    }
}
