use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::{ExError, ExErrorKind};
use crate::range::{ExAddressRange, ExRangeParser};
use crate::table::{ErrorPolicy, ExCommandDef, ExCommandTable};

/// Name used when a line holds only a range (`:42`).
pub const GOTO_COMMAND: &str = "goto";

/// One Ex command after range, name, bang and argument parsing.
///
/// Policy violations do not abort parsing; they are collected in
/// `parse_errors` so the caller decides whether to run the command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedExCommand {
    pub name: String,
    pub target: String,
    pub forced: bool,
    pub args: BTreeMap<String, String>,
    pub parse_errors: Vec<ExError>,
    pub line_range: ExAddressRange,
    pub can_have_range: bool,
}

impl ParsedExCommand {
    pub fn arg(&self, key: &str) -> Option<&str> {
        self.args.get(key).map(String::as_str)
    }

    pub fn is_valid(&self) -> bool {
        self.parse_errors.is_empty()
    }
}

/// The command name at the start of `rest`: `&`, `!` or a run of letters.
fn command_name(rest: &str) -> &str {
    match rest.chars().next() {
        Some(c @ ('&' | '!')) => &rest[..c.len_utf8()],
        _ => {
            let end = rest
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(rest.len());
            &rest[..end]
        }
    }
}

/// Split at the first `|` not preceded by a backslash.
fn split_bar(line: &str) -> (&str, Option<&str>) {
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            '|' if !escaped => return (&line[..i], Some(&line[i + 1..])),
            _ => escaped = false,
        }
    }
    (line, None)
}

fn match_arguments(def: &ExCommandDef, text: &str) -> Option<BTreeMap<String, String>> {
    def.patterns.iter().find_map(|re| {
        let caps = re.captures(text)?;
        let args = re
            .capture_names()
            .flatten()
            .filter_map(|name| Some((name.to_string(), caps.name(name)?.as_str().to_string())))
            .collect();
        Some(args)
    })
}

pub struct ExCommandParser<'t> {
    table: &'t ExCommandTable,
}

impl<'t> ExCommandParser<'t> {
    pub fn new(table: &'t ExCommandTable) -> Self {
        Self { table }
    }

    /// Parse one bar-free segment. `Ok(None)` means the name is unknown or
    /// the segment is empty.
    pub fn parse(&self, segment: &str) -> Result<Option<ParsedExCommand>, ExError> {
        let segment = segment.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
        let (range, rest) = ExRangeParser::parse(segment)?;
        let typed = command_name(rest);
        let name = if typed.is_empty() {
            if range.is_empty() {
                return Ok(None);
            }
            GOTO_COMMAND
        } else {
            typed
        };
        let Some(def) = self.table.find(name) else {
            debug!(target: "ex.parse", name, "unknown_command");
            return Ok(None);
        };

        let mut after = &rest[typed.len()..];
        let mut forced = false;
        if def.name != "!" && after.starts_with('!') {
            forced = true;
            after = &after[1..];
        }
        let text = after.trim();

        let mut parse_errors = Vec::new();
        let policy = def.policy;
        if policy.contains(ErrorPolicy::NO_RANGE) && !range.is_empty() {
            parse_errors.push(ExError::with_token(
                ExErrorKind::NoRangeAllowed,
                range.raw_text.clone(),
            ));
        }
        if policy.contains(ErrorPolicy::NO_BANG) && forced {
            parse_errors.push(ExError::new(ExErrorKind::NoBangAllowed));
        }

        let mut args = BTreeMap::new();
        if text.is_empty() && policy.contains(ErrorPolicy::ARGUMENT_REQUIRED) {
            parse_errors.push(ExError::new(ExErrorKind::ArgumentRequired));
        } else if def.patterns.is_empty() {
            if !text.is_empty() {
                if policy.contains(ErrorPolicy::TRAILING_CHARS) {
                    parse_errors.push(ExError::with_token(ExErrorKind::TrailingCharacters, text));
                } else {
                    args.insert("argument".to_string(), text.to_string());
                }
            }
        } else {
            match match_arguments(def, text) {
                Some(matched) => args = matched,
                None => {
                    let kind = if policy.contains(ErrorPolicy::ADDRESS_REQUIRED) {
                        ExErrorKind::AddressRequired
                    } else if policy.contains(ErrorPolicy::INVALID_RANGE) {
                        ExErrorKind::InvalidRange
                    } else {
                        ExErrorKind::InvalidArgument
                    };
                    parse_errors.push(ExError::with_token(kind, text));
                }
            }
        }

        if !parse_errors.is_empty() {
            warn!(
                target: "ex.parse",
                name = def.name,
                errors = parse_errors.len(),
                first = %parse_errors[0],
                "ex_command_invalid"
            );
        }
        debug!(
            target: "ex.parse",
            name = def.name,
            target_command = %def.target,
            forced,
            range = %range.raw_text,
            "ex_command_parsed"
        );
        Ok(Some(ParsedExCommand {
            name: def.name.to_string(),
            target: def.target.clone(),
            forced,
            args,
            parse_errors,
            can_have_range: def.can_have_range(),
            line_range: range,
        }))
    }

    /// Parse a full command line: leading `:` are skipped and `|` separates
    /// commands unless the command owns the rest of the line.
    pub fn parse_line(&self, line: &str) -> Result<Vec<ParsedExCommand>, ExError> {
        let mut commands = Vec::new();
        let mut remaining = Some(line);
        while let Some(text) = remaining {
            let text = text.trim_start_matches(|c: char| c == ':' || c.is_whitespace());
            if text.is_empty() {
                break;
            }
            let (_, rest) = ExRangeParser::parse(text)?;
            let name = command_name(rest);
            let takes_bar = self.table.find(name).is_some_and(|def| def.takes_bar);
            let (segment, next) = if takes_bar {
                (text, None)
            } else {
                split_bar(text)
            };
            remaining = next;
            if segment.trim().is_empty() {
                continue;
            }
            match self.parse(segment)? {
                Some(command) => commands.push(command),
                None => {
                    let token = if name.is_empty() { segment.trim() } else { name };
                    return Err(ExError::with_token(ExErrorKind::UnknownCommand, token));
                }
            }
        }
        debug!(target: "ex.parse", line, commands = commands.len(), "ex_line_parsed");
        Ok(commands)
    }
}

/// Parse `line` against the built-in table.
pub fn parse_command_line(
    table: &ExCommandTable,
    line: &str,
) -> Result<Vec<ParsedExCommand>, ExError> {
    ExCommandParser::new(table).parse_line(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressRef;
    use pretty_assertions::assert_eq;

    fn table() -> ExCommandTable {
        ExCommandTable::builtin().unwrap()
    }

    fn one(line: &str) -> ParsedExCommand {
        let t = table();
        let mut cmds = parse_command_line(&t, line).unwrap();
        assert_eq!(cmds.len(), 1, "{line}");
        cmds.remove(0)
    }

    fn codes(cmd: &ParsedExCommand) -> Vec<u16> {
        cmd.parse_errors.iter().map(ExError::code).collect()
    }

    #[test]
    fn substitute_arguments() {
        let cmd = one("%s/a\\/b/c/gi 3");
        assert_eq!(cmd.arg("pattern"), Some("a\\/b"));
        assert_eq!(cmd.arg("replacement"), Some("c"));
        assert_eq!(cmd.arg("flags"), Some("gi"));
        assert_eq!(cmd.arg("count"), Some("3"));
        assert_eq!(cmd.line_range.left.reference, Some(AddressRef::WholeFile));

        let bare = one("s/x");
        assert_eq!(bare.arg("pattern"), Some("x"));
        assert_eq!(bare.arg("replacement"), None);
    }

    #[test]
    fn bang_and_args() {
        let cmd = one("w! out.txt");
        assert!(cmd.forced);
        assert_eq!(cmd.arg("argument"), Some("out.txt"));
        assert!(cmd.is_valid());
        assert!(one("q!").forced);
    }

    #[test]
    fn policy_errors_are_collected() {
        assert_eq!(codes(&one("3quit")), vec![481]);
        assert_eq!(codes(&one("undo!")), vec![477]);
        assert_eq!(codes(&one("quit now")), vec![488]);
        assert_eq!(codes(&one("normal")), vec![471]);
        assert_eq!(codes(&one("copy")), vec![14]);
        assert_eq!(codes(&one("s/a/b/zz")), vec![16]);
        assert_eq!(codes(&one("mark 12")), vec![474]);
    }

    #[test]
    fn bar_separates_commands() {
        let t = table();
        let cmds = parse_command_line(&t, ":w | q").unwrap();
        let names: Vec<_> = cmds.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["write", "quit"]);
        assert!(cmds.iter().all(ParsedExCommand::is_valid));
    }

    #[test]
    fn some_commands_own_the_bar() {
        let cmd = one("g/x/s/a/b/|d");
        assert_eq!(cmd.name, "global");
        assert_eq!(cmd.arg("argument"), Some("/x/s/a/b/|d"));

        let cmd = one("nnoremap <leader>x :w<cr>|:q<cr>");
        assert_eq!(cmd.arg("argument"), Some("<leader>x :w<cr>|:q<cr>"));
    }

    #[test]
    fn escaped_bar_stays_in_argument() {
        let cmd = one(r"s/a\|b/c/");
        assert_eq!(cmd.arg("pattern"), Some(r"a\|b"));
    }

    #[test]
    fn range_only_is_goto() {
        let cmd = one("42");
        assert_eq!(cmd.name, GOTO_COMMAND);
        assert_eq!(cmd.target, "ex-goto");
        assert_eq!(cmd.line_range.left.offset, Some(42));
    }

    #[test]
    fn unknown_and_ambiguous_names() {
        let t = table();
        let err = parse_command_line(&t, "frobnicate").unwrap_err();
        assert_eq!(err.code(), 492);
        assert_eq!(err.token.as_deref(), Some("frobnicate"));
        assert!(parse_command_line(&t, "m").is_err());
        assert_eq!(parse_command_line(&t, "").unwrap(), vec![]);
    }

    #[test]
    fn shell_takes_the_rest() {
        let cmd = one("!ls -l | wc");
        assert_eq!(cmd.name, "!");
        assert!(!cmd.forced);
        assert_eq!(cmd.arg("argument"), Some("ls -l | wc"));
    }
}
