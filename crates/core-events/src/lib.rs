//! Core vocabulary shared by every vintage crate.
//!
//! Three families of types live here because everything else depends on them:
//! * `Mode`: the closed set of editing modes a view can be in.
//! * `KeyToken` (+ `NamedKey`, `ModMask`): canonical logical keys. Notation
//!   parsing lives in `core-input`; this crate only knows how to *print* a
//!   token back in canonical Vim notation.
//! * `ConcreteCommand`: the `(name, args)` pair handed to the external editing
//!   layer. Arguments are JSON values so nested invocations (an operator
//!   carrying its motion, a macro replay carrying its steps) stay structural.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

// -------------------------------------------------------------------------------------------------
// Mode
// -------------------------------------------------------------------------------------------------

/// Editing mode of a single view.
///
/// `InternalNormal` is transient: it is only active while an operator (or an
/// operator + motion pair) is being translated and is never left as the mode
/// reported to the user.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Normal,
    Insert,
    Visual,
    VisualLine,
    VisualBlock,
    OperatorPending,
    Replace,
    Select,
    InternalNormal,
    CommandLine,
    Unknown,
}

impl Mode {
    pub const ALL: [Mode; 11] = [
        Mode::Normal,
        Mode::Insert,
        Mode::Visual,
        Mode::VisualLine,
        Mode::VisualBlock,
        Mode::OperatorPending,
        Mode::Replace,
        Mode::Select,
        Mode::InternalNormal,
        Mode::CommandLine,
        Mode::Unknown,
    ];

    pub fn is_visual(self) -> bool {
        matches!(self, Mode::Visual | Mode::VisualLine | Mode::VisualBlock)
    }

    /// Modes where unmapped printable keys are text, not commands.
    pub fn is_text_entry(self) -> bool {
        matches!(self, Mode::Insert | Mode::Replace | Mode::Select)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Insert => "insert",
            Mode::Visual => "visual",
            Mode::VisualLine => "visual_line",
            Mode::VisualBlock => "visual_block",
            Mode::OperatorPending => "operator_pending",
            Mode::Replace => "replace",
            Mode::Select => "select",
            Mode::InternalNormal => "internal_normal",
            Mode::CommandLine => "command_line",
            Mode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode name: {0}")]
pub struct UnknownMode(pub String);

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

// -------------------------------------------------------------------------------------------------
// Key tokens
// -------------------------------------------------------------------------------------------------

bitflags::bitflags! {
    /// Modifier set of a chord. Bit order matches canonical notation order (`C-`, `M-`, `S-`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ModMask: u8 { const CTRL=1; const ALT=2; const SHIFT=4; }
}

impl ModMask {
    /// Canonical prefix, e.g. `C-S-` for CTRL|SHIFT.
    pub fn notation(self) -> String {
        let mut out = String::new();
        if self.contains(ModMask::CTRL) {
            out.push_str("C-");
        }
        if self.contains(ModMask::ALT) {
            out.push_str("M-");
        }
        if self.contains(ModMask::SHIFT) {
            out.push_str("S-");
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Enter,
    Esc,
    Backspace,
    Tab,
    F(u8),
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
}

impl NamedKey {
    /// Canonical lowercase name used inside `<...>`.
    pub fn name(self) -> String {
        match self {
            NamedKey::Enter => "cr".into(),
            NamedKey::Esc => "esc".into(),
            NamedKey::Backspace => "bs".into(),
            NamedKey::Tab => "tab".into(),
            NamedKey::F(n) => format!("f{n}"),
            NamedKey::Up => "up".into(),
            NamedKey::Down => "down".into(),
            NamedKey::Left => "left".into(),
            NamedKey::Right => "right".into(),
            NamedKey::Home => "home".into(),
            NamedKey::End => "end".into(),
            NamedKey::PageUp => "pageup".into(),
            NamedKey::PageDown => "pagedown".into(),
            NamedKey::Insert => "insert".into(),
            NamedKey::Delete => "del".into(),
        }
    }
}

/// Canonical logical key token.
///
/// `KeyToken::Chord` wraps a base token (a character or a named key) plus a
/// non-empty modifier mask, so `<C-w>` and `<S-f2>` compare structurally.
/// A space is always `Char(' ')` and `<` is always `Char('<')`; their notation
/// forms (`<space>`, `<lt>`) are a printing concern only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyToken {
    Char(char),
    Named(NamedKey),
    Chord { base: Box<KeyToken>, mods: ModMask },
}

impl KeyToken {
    pub const ESC: KeyToken = KeyToken::Named(NamedKey::Esc);
    pub const ENTER: KeyToken = KeyToken::Named(NamedKey::Enter);

    pub fn chord(mods: ModMask, base: KeyToken) -> Self {
        if mods.is_empty() {
            return base;
        }
        KeyToken::Chord {
            base: Box::new(base),
            mods,
        }
    }

    pub fn ctrl(c: char) -> Self {
        Self::chord(ModMask::CTRL, KeyToken::Char(c))
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            KeyToken::Char(c) => Some(*c),
            _ => None,
        }
    }

    pub fn is_digit(&self) -> bool {
        matches!(self, KeyToken::Char(c) if c.is_ascii_digit())
    }

    /// Character this key inserts when typed as text (`<tab>` is a tab, `<cr>` a newline).
    pub fn text(&self) -> Option<char> {
        match self {
            KeyToken::Char(c) => Some(*c),
            KeyToken::Named(NamedKey::Tab) => Some('\t'),
            KeyToken::Named(NamedKey::Enter) => Some('\n'),
            _ => None,
        }
    }

    fn base_name(&self) -> String {
        match self {
            KeyToken::Char(' ') => "space".into(),
            KeyToken::Char('<') => "lt".into(),
            KeyToken::Char(c) => c.to_string(),
            KeyToken::Named(k) => k.name(),
            KeyToken::Chord { base, .. } => base.base_name(),
        }
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyToken::Char(' ') => f.write_str("<space>"),
            KeyToken::Char('<') => f.write_str("<lt>"),
            KeyToken::Char(c) => write!(f, "{c}"),
            KeyToken::Named(k) => write!(f, "<{}>", k.name()),
            KeyToken::Chord { base, mods } => write!(f, "<{}{}>", mods.notation(), base.base_name()),
        }
    }
}

/// Render a token slice back into canonical notation.
pub fn notation(tokens: &[KeyToken]) -> String {
    tokens.iter().map(ToString::to_string).collect()
}

// -------------------------------------------------------------------------------------------------
// Editing-layer interface
// -------------------------------------------------------------------------------------------------

/// Name of the composite command used for grouped invocations.
pub const SEQUENCE_COMMAND: &str = "sequence";

/// A single invocation handed to the external editing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteCommand {
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ConcreteCommand {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    /// Group several invocations; `undo_group` asks the host to undo them as one step.
    pub fn sequence(commands: Vec<ConcreteCommand>, undo_group: bool) -> Self {
        let steps: Vec<Value> = commands.iter().map(ConcreteCommand::to_value).collect();
        Self::new(SEQUENCE_COMMAND)
            .with_arg("commands", steps)
            .with_arg("undo_group", undo_group)
    }

    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.args.get(key).and_then(Value::as_str)
    }

    pub fn arg_u64(&self, key: &str) -> Option<u64> {
        self.args.get(key).and_then(Value::as_u64)
    }

    /// Decode a nested invocation stored under `key` (e.g. an operator's `motion`).
    pub fn nested(&self, key: &str) -> Option<ConcreteCommand> {
        self.args
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Steps of a `sequence` command; a plain command is its own single step.
    pub fn steps(&self) -> Vec<ConcreteCommand> {
        if self.name != SEQUENCE_COMMAND {
            return vec![self.clone()];
        }
        self.args
            .get("commands")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("args".into(), Value::Object(self.args.clone()));
        Value::Object(obj)
    }
}

impl fmt::Display for ConcreteCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, Value::Object(self.args.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn mode_names_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
        }
        assert!("nope".parse::<Mode>().is_err());
    }

    #[test]
    fn visual_family() {
        assert!(Mode::Visual.is_visual());
        assert!(Mode::VisualBlock.is_visual());
        assert!(!Mode::OperatorPending.is_visual());
    }

    #[test]
    fn chord_notation_orders_modifiers() {
        let tok = KeyToken::chord(ModMask::SHIFT | ModMask::CTRL, KeyToken::Named(NamedKey::F(2)));
        assert_eq!(tok.to_string(), "<C-S-f2>");
        assert_eq!(KeyToken::ctrl('w').to_string(), "<C-w>");
    }

    #[test]
    fn special_chars_print_as_named_keys() {
        assert_eq!(KeyToken::Char(' ').to_string(), "<space>");
        assert_eq!(KeyToken::Char('<').to_string(), "<lt>");
        assert_eq!(KeyToken::chord(ModMask::CTRL, KeyToken::Char(' ')).to_string(), "<C-space>");
        assert_eq!(notation(&[KeyToken::Char('d'), KeyToken::ESC]), "d<esc>");
    }

    #[test]
    fn empty_mask_chord_collapses_to_base() {
        assert_eq!(KeyToken::chord(ModMask::empty(), KeyToken::Char('x')), KeyToken::Char('x'));
    }

    #[test]
    fn nested_commands_decode() {
        let motion = ConcreteCommand::new("word-forward").with_arg("count", 2);
        let op = ConcreteCommand::new("delete").with_arg("motion", motion.to_value());
        assert_eq!(op.nested("motion"), Some(motion.clone()));
        let seq = ConcreteCommand::sequence(vec![motion.clone(), op.clone()], true);
        assert_eq!(seq.steps(), vec![motion, op]);
        assert_eq!(seq.arg("undo_group"), Some(&Value::Bool(true)));
    }
}
