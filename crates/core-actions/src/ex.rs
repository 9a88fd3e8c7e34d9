//! Running submitted Ex lines.
//!
//! Mapping edits, register and mark listings, `:let @r` and substitute
//! bookkeeping are handled here because they touch session state. Every
//! other command is forwarded to the host as `ex-<name>` with its parsed
//! arguments, bang flag and range (plus resolved lines when the host has
//! supplied a line context).

use std::collections::BTreeMap;

use core_events::{ConcreteCommand, Mode, notation};
use core_ex::{ExError, ExErrorKind, ParsedExCommand, parse_command_line};
use core_keymap::{Mapping, MappingScope, MappingTarget};
use core_state::registers::REG_LAST_EX;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::dispatch::DispatchResult;
use crate::session::Session;

const SUBSTITUTE_TARGET: &str = "ex-substitute";

const VISUAL_MODES: &[Mode] = &[Mode::Visual, Mode::VisualLine, Mode::VisualBlock];
const MAP_MODES: &[Mode] = &[
    Mode::Normal,
    Mode::Visual,
    Mode::VisualLine,
    Mode::VisualBlock,
    Mode::OperatorPending,
];
const MAP_BANG_MODES: &[Mode] = &[Mode::Insert, Mode::CommandLine];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapFamily {
    Map { recursive: bool },
    Unmap,
}

/// `nnoremap` -> (`Map { recursive: false }`, `[Normal]`).
fn map_family(name: &str, forced: bool) -> Option<(MapFamily, &'static [Mode])> {
    let (family, prefix) = if let Some(p) = name.strip_suffix("unmap") {
        (MapFamily::Unmap, p)
    } else if let Some(p) = name.strip_suffix("noremap") {
        (MapFamily::Map { recursive: false }, p)
    } else if let Some(p) = name.strip_suffix("map") {
        (MapFamily::Map { recursive: true }, p)
    } else {
        return None;
    };
    let modes: &'static [Mode] = match prefix {
        "" if forced => MAP_BANG_MODES,
        "" => MAP_MODES,
        "n" => &[Mode::Normal],
        "v" => VISUAL_MODES,
        "o" => &[Mode::OperatorPending],
        "i" => &[Mode::Insert],
        _ => return None,
    };
    Some((family, modes))
}

/// Parse and run one command line. The line is remembered in the `:` register.
pub fn run_ex_line(session: &mut Session, line: &str) -> DispatchResult {
    let line = line.trim_start_matches(':');
    if let Err(err) = session.registers.set_special(REG_LAST_EX, vec![line.to_string()]) {
        warn!(target: "ex.dispatch", error = %err, "last_ex_register_failed");
    }
    let commands = match parse_command_line(&session.ex_table, line) {
        Ok(commands) => commands,
        Err(err) => {
            debug!(target: "ex.dispatch", line, error = %err, "ex_line_rejected");
            return DispatchResult::ExFailed(err);
        }
    };
    if commands.is_empty() {
        return DispatchResult::Handled;
    }

    let mut dispatched = Vec::new();
    for command in &commands {
        if let Some(err) = command.parse_errors.first() {
            return DispatchResult::ExFailed(err.clone());
        }
        match dispatch_command(session, command) {
            Ok(Some(cmd)) => dispatched.push(cmd),
            Ok(None) => {}
            Err(err) => {
                debug!(target: "ex.dispatch", name = %command.name, error = %err, "ex_command_failed");
                return DispatchResult::ExFailed(err);
            }
        }
    }
    match dispatched.len() {
        0 => DispatchResult::Handled,
        1 => DispatchResult::Dispatched(dispatched.remove(0)),
        _ => DispatchResult::Dispatched(ConcreteCommand::sequence(dispatched, false)),
    }
}

/// Normal-mode `&`: the last substitute again, without its flags.
pub(crate) fn repeat_substitute(session: &Session) -> DispatchResult {
    match substitute_args(session, "&", &BTreeMap::new()) {
        Ok(args) => DispatchResult::Dispatched(string_args(ConcreteCommand::new(SUBSTITUTE_TARGET), &args)),
        Err(err) => DispatchResult::ExFailed(err),
    }
}

fn dispatch_command(
    session: &mut Session,
    command: &ParsedExCommand,
) -> Result<Option<ConcreteCommand>, ExError> {
    if let Some((family, modes)) = map_family(&command.name, command.forced) {
        return match family {
            MapFamily::Map { recursive } => map(session, command, modes, recursive),
            MapFamily::Unmap => unmap(session, command, modes).map(|()| None),
        };
    }
    match command.name.as_str() {
        "registers" | "display" => Ok(Some(show_registers(session, command.arg("argument")))),
        "marks" => Ok(Some(show_marks(session, command.arg("argument")))),
        "let" => let_register(session, command).map(|()| None),
        "mark" | "k" if command.line_range.is_empty() => {
            let name = command.arg("mark").and_then(|m| m.chars().next());
            let Some(name) = name else {
                return Err(ExError::new(ExErrorKind::ArgumentRequired));
            };
            session
                .marks
                .set(name, session.cursor)
                .map_err(|_| ExError::with_token(ExErrorKind::InvalidArgument, name.to_string()))?;
            Ok(None)
        }
        "substitute" | "&" => {
            let args = substitute_args(session, &command.name, &command.args)?;
            if command.name == "substitute" && command.args.contains_key("pattern") {
                let mut remembered = args.clone();
                remembered.remove("count");
                session.last_substitute = Some(remembered);
            }
            forward(session, command, SUBSTITUTE_TARGET, &args).map(Some)
        }
        _ => forward(session, command, &command.target, &command.args).map(Some),
    }
}

fn forward(
    session: &Session,
    command: &ParsedExCommand,
    target: &str,
    args: &BTreeMap<String, String>,
) -> Result<ConcreteCommand, ExError> {
    let mut cmd = string_args(ConcreteCommand::new(target), args).with_arg("forced", command.forced);
    if !command.line_range.is_empty() {
        let range = serde_json::to_value(&command.line_range).unwrap_or_default();
        cmd = cmd.with_arg("range", range);
        if let Some(ctx) = session.line_context() {
            let spans = command.line_range.resolve(ctx)?;
            let lines: Vec<Value> = spans.iter().map(|s| json!([s.start, s.end])).collect();
            cmd = cmd.with_arg("lines", lines);
        }
    }
    debug!(target: "ex.dispatch", name = %command.name, target_command = %cmd.name, "ex_forwarded");
    Ok(cmd)
}

fn string_args(mut cmd: ConcreteCommand, args: &BTreeMap<String, String>) -> ConcreteCommand {
    for (key, value) in args {
        cmd = cmd.with_arg(key, value.as_str());
    }
    cmd
}

/// Fill in what `:s` without a pattern, `:&` and `:&&` inherit from the
/// last substitute. A leading `&` flag keeps the previous flags.
fn substitute_args(
    session: &Session,
    name: &str,
    args: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>, ExError> {
    let flags = args.get("flags").map(String::as_str).unwrap_or("");
    let (keep_flags, extra_flags) = match flags.strip_prefix('&') {
        Some(rest) => (true, rest),
        None => (false, flags),
    };
    let fresh = name == "substitute" && args.contains_key("pattern");
    let last = session.last_substitute.as_ref();
    if !fresh && last.is_none() {
        return Err(ExError::new(ExErrorKind::NoPreviousRegex));
    }

    let mut merged = BTreeMap::new();
    let mut new_flags = String::new();
    if keep_flags && let Some(previous) = last.and_then(|l| l.get("flags")) {
        new_flags.push_str(previous);
    }
    new_flags.push_str(extra_flags);

    if fresh {
        merged.extend(args.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.entry("replacement".to_string()).or_default();
    } else if let Some(last) = last {
        for key in ["pattern", "replacement"] {
            if let Some(value) = last.get(key) {
                merged.insert(key.to_string(), value.clone());
            }
        }
        if let Some(count) = args.get("count") {
            merged.insert("count".to_string(), count.clone());
        }
    }
    if new_flags.is_empty() {
        merged.remove("flags");
    } else {
        merged.insert("flags".to_string(), new_flags);
    }
    Ok(merged)
}

fn map(
    session: &mut Session,
    command: &ParsedExCommand,
    modes: &[Mode],
    recursive: bool,
) -> Result<Option<ConcreteCommand>, ExError> {
    let argument = command.arg("argument").unwrap_or("").trim();
    let (lhs, rhs) = match argument.split_once(char::is_whitespace) {
        Some((lhs, rhs)) => (lhs, rhs.trim_start()),
        None => (argument, ""),
    };
    if rhs.is_empty() {
        return Ok(Some(show_mappings(session, modes, lhs)));
    }
    let mapping = Mapping::parse(lhs, rhs, recursive, MappingScope::User, &session.registry)
        .map_err(|err| {
            debug!(target: "ex.dispatch", lhs, rhs, error = %err, "mapping_rejected");
            ExError::with_token(ExErrorKind::InvalidArgument, argument)
        })?;
    for mode in modes {
        session.mappings.add(*mode, mapping.clone());
    }
    Ok(None)
}

fn unmap(session: &mut Session, command: &ParsedExCommand, modes: &[Mode]) -> Result<(), ExError> {
    let lhs = command.arg("argument").unwrap_or("").trim();
    let keys = core_input::tokenize(lhs)
        .map_err(|_| ExError::with_token(ExErrorKind::InvalidArgument, lhs))?;
    let removed = modes
        .iter()
        .filter(|mode| session.mappings.remove(**mode, &keys).is_some())
        .count();
    if removed == 0 {
        return Err(ExError::with_token(ExErrorKind::NoSuchMapping, lhs));
    }
    Ok(())
}

fn show_mappings(session: &Session, modes: &[Mode], lhs_prefix: &str) -> ConcreteCommand {
    let prefix = core_input::tokenize(lhs_prefix).unwrap_or_default();
    let mut rows = Vec::new();
    for mode in modes {
        for mapping in session.mappings.list(*mode) {
            if !mapping.lhs.starts_with(&prefix) {
                continue;
            }
            let mut row = json!({
                "mode": mode.as_str(),
                "lhs": notation(&mapping.lhs),
                "rhs": mapping.rhs_notation(),
                "recursive": mapping.recursive,
                "scope": match mapping.scope {
                    MappingScope::Default => "default",
                    MappingScope::User => "user",
                },
            });
            // Command targets also show where the command already lives.
            if let MappingTarget::Command(command) = &mapping.target {
                let builtin: Vec<String> = session
                    .registry
                    .keys_for(*mode, *command)
                    .into_iter()
                    .map(notation)
                    .collect();
                row["builtin_keys"] = json!(builtin);
            }
            rows.push(row);
        }
    }
    ConcreteCommand::new("show-mappings").with_arg("mappings", rows)
}

fn show_registers(session: &Session, filter: Option<&str>) -> ConcreteCommand {
    let wanted: Option<Vec<char>> = filter.map(|f| f.chars().filter(|c| !c.is_whitespace()).collect());
    let rows: Vec<Value> = session
        .registers
        .snapshot()
        .into_iter()
        .filter(|(name, _)| wanted.as_ref().is_none_or(|w| w.contains(name)))
        .map(|(name, values)| json!({ "name": name.to_string(), "values": values }))
        .collect();
    ConcreteCommand::new("show-registers").with_arg("registers", rows)
}

fn show_marks(session: &Session, filter: Option<&str>) -> ConcreteCommand {
    let rows: Vec<Value> = session
        .marks
        .list()
        .into_iter()
        .filter(|(name, _)| filter.is_none_or(|f| f.contains(*name)))
        .map(|(name, mark)| {
            json!({
                "name": name.to_string(),
                "window_id": mark.window_id,
                "view_id": mark.view_id,
                "row": mark.row,
                "col": mark.col,
            })
        })
        .collect();
    ConcreteCommand::new("show-marks").with_arg("marks", rows)
}

fn let_register(session: &mut Session, command: &ParsedExCommand) -> Result<(), ExError> {
    let register = command.arg("register").and_then(|r| r.chars().next());
    let Some(register) = register else {
        return Err(ExError::new(ExErrorKind::ArgumentRequired));
    };
    let value = match (command.arg("value"), command.arg("literal")) {
        (Some(quoted), _) => unescape(quoted),
        (None, Some(literal)) => literal.to_string(),
        (None, None) => String::new(),
    };
    session
        .registers
        .set(register, vec![value])
        .map_err(|err| ExError::with_token(ExErrorKind::InvalidArgument, err.to_string()))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::new().unwrap()
    }

    #[test]
    fn map_families_pick_modes() {
        assert_eq!(
            map_family("nnoremap", false),
            Some((MapFamily::Map { recursive: false }, &[Mode::Normal][..]))
        );
        assert_eq!(map_family("map", true).map(|(_, m)| m), Some(MAP_BANG_MODES));
        assert_eq!(map_family("vunmap", false).map(|(f, _)| f), Some(MapFamily::Unmap));
        assert_eq!(map_family("write", false), None);
    }

    #[test]
    fn nnoremap_then_unmap() {
        let mut s = session();
        assert_eq!(run_ex_line(&mut s, "nnoremap Q gq"), DispatchResult::Handled);
        let keys = core_input::tokenize("Q").unwrap();
        assert!(s.mappings.exact(Mode::Normal, &keys, true).is_some());
        assert_eq!(run_ex_line(&mut s, "nunmap Q"), DispatchResult::Handled);
        assert!(s.mappings.exact(Mode::Normal, &keys, true).is_none());
        match run_ex_line(&mut s, "nunmap Q") {
            DispatchResult::ExFailed(err) => assert_eq!(err.code(), 31),
            other => panic!("expected E31, got {other:?}"),
        }
    }

    #[test]
    fn map_without_rhs_lists() {
        let mut s = session();
        run_ex_line(&mut s, "nmap ,a dd");
        let out = run_ex_line(&mut s, "nmap ,");
        let cmd = out.command().unwrap();
        assert_eq!(cmd.name, "show-mappings");
        let rows = cmd.arg("mappings").and_then(Value::as_array).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["rhs"], "dd");
        assert_eq!(rows[0]["scope"], "user");
        assert!(rows[0].get("builtin_keys").is_none());
    }

    #[test]
    fn command_mappings_list_their_builtin_keys() {
        let mut s = session();
        assert_eq!(run_ex_line(&mut s, "nnoremap ,w :focus-pane-next"), DispatchResult::Handled);
        let out = run_ex_line(&mut s, "nmap ,w");
        let rows = out.command().unwrap().arg("mappings").and_then(Value::as_array).unwrap().clone();
        assert_eq!(rows[0]["rhs"], ":focus-pane-next");
        assert_eq!(rows[0]["builtin_keys"], json!(["<C-w>w", "<C-w><C-w>"]));
    }

    #[test]
    fn let_sets_a_register() {
        let mut s = session();
        assert_eq!(run_ex_line(&mut s, r#"let @a = "one\ttwo""#), DispatchResult::Handled);
        assert_eq!(s.registers.peek('a'), Some(vec!["one\ttwo".to_string()]));
        run_ex_line(&mut s, r"let @b = 'raw\t'");
        assert_eq!(s.registers.peek('b'), Some(vec![r"raw\t".to_string()]));
    }

    #[test]
    fn substitute_is_remembered_for_ampersand() {
        let mut s = session();
        match run_ex_line(&mut s, "&") {
            DispatchResult::ExFailed(err) => assert_eq!(err.code(), 35),
            other => panic!("expected E35, got {other:?}"),
        }
        run_ex_line(&mut s, "s/foo/bar/g");
        let again = run_ex_line(&mut s, "&&");
        let cmd = again.command().unwrap();
        assert_eq!(cmd.name, "ex-substitute");
        assert_eq!(cmd.arg_str("pattern"), Some("foo"));
        assert_eq!(cmd.arg_str("replacement"), Some("bar"));
        assert_eq!(cmd.arg_str("flags"), Some("g"));

        let plain = run_ex_line(&mut s, "&");
        assert_eq!(plain.command().unwrap().arg_str("flags"), None);
    }

    #[test]
    fn other_commands_are_forwarded_with_range() {
        let mut s = session();
        let out = run_ex_line(&mut s, "2,3d a");
        let cmd = out.command().unwrap();
        assert_eq!(cmd.name, "ex-delete");
        assert_eq!(cmd.arg_str("register"), Some("a"));
        assert_eq!(cmd.arg("forced"), Some(&Value::Bool(false)));
        assert_eq!(cmd.arg("range").unwrap()["raw_text"], "2,3");
        assert_eq!(s.registers.peek(':'), Some(vec!["2,3d a".to_string()]));
    }

    #[test]
    fn parse_errors_abort_the_line() {
        let mut s = session();
        match run_ex_line(&mut s, "3quit") {
            DispatchResult::ExFailed(err) => assert_eq!(err.code(), 481),
            other => panic!("expected E481, got {other:?}"),
        }
    }

    #[test]
    fn bar_separates_commands() {
        let mut s = session();
        let out = run_ex_line(&mut s, "write | quit");
        let names: Vec<String> = out.command().unwrap().steps().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["ex-write", "ex-quit"]);
    }
}
