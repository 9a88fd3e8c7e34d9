//! Built-in command registry: one key trie per mode.
//!
//! The table is plain data (`BUILTIN`) compiled into per-mode tries when the
//! registry is built. Later entries for the same sequence override earlier
//! ones (logged at TRACE), which lets the Visual rows below reuse keys the
//! Normal rows already claimed.

use std::collections::HashMap;

use core_events::{KeyToken, Mode};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::KeymapError;
use crate::command::{
    CommandDef, InsertKind, Motion, Operator, OperatorKind, Scroll, VisualKind, WindowCommand,
};

bitflags::bitflags! {
    /// Set of modes a registry entry is available in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModeSet: u16 {
        const NORMAL = 1;
        const OPERATOR_PENDING = 1 << 1;
        const VISUAL = 1 << 2;
        const VISUAL_LINE = 1 << 3;
        const VISUAL_BLOCK = 1 << 4;
        const INSERT = 1 << 5;
        const REPLACE = 1 << 6;
        const SELECT = 1 << 7;
        const VISUALS = Self::VISUAL.bits() | Self::VISUAL_LINE.bits() | Self::VISUAL_BLOCK.bits();
        const MOTION = Self::NORMAL.bits() | Self::OPERATOR_PENDING.bits() | Self::VISUALS.bits();
        const ACTION = Self::NORMAL.bits() | Self::VISUALS.bits();
    }
}

impl ModeSet {
    /// Registry mode set for a view mode. `InternalNormal` shares Normal's table.
    pub fn of(mode: Mode) -> ModeSet {
        match mode {
            Mode::Normal | Mode::InternalNormal => ModeSet::NORMAL,
            Mode::OperatorPending => ModeSet::OPERATOR_PENDING,
            Mode::Visual => ModeSet::VISUAL,
            Mode::VisualLine => ModeSet::VISUAL_LINE,
            Mode::VisualBlock => ModeSet::VISUAL_BLOCK,
            Mode::Insert => ModeSet::INSERT,
            Mode::Replace => ModeSet::REPLACE,
            Mode::Select => ModeSet::SELECT,
            Mode::CommandLine | Mode::Unknown => ModeSet::empty(),
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Built-in table
// -------------------------------------------------------------------------------------------------
use CommandDef::{Motion as Mo, Operator as Op};
use OperatorKind as K;

const MOTION: ModeSet = ModeSet::MOTION;
const ACTION: ModeSet = ModeSet::ACTION;
const NORMAL: ModeSet = ModeSet::NORMAL;
const VISUALS: ModeSet = ModeSet::VISUALS;
const OBJECTS: ModeSet = ModeSet::OPERATOR_PENDING.union(ModeSet::VISUALS);

const BUILTIN: &[(&str, ModeSet, CommandDef)] = &[
    // motions
    ("h", MOTION, Mo(Motion::Left)),
    ("<left>", MOTION, Mo(Motion::Left)),
    ("<bs>", MOTION, Mo(Motion::Left)),
    ("j", MOTION, Mo(Motion::Down)),
    ("<down>", MOTION, Mo(Motion::Down)),
    ("k", MOTION, Mo(Motion::Up)),
    ("<up>", MOTION, Mo(Motion::Up)),
    ("l", MOTION, Mo(Motion::Right)),
    ("<right>", MOTION, Mo(Motion::Right)),
    ("<space>", MOTION, Mo(Motion::Right)),
    ("w", MOTION, Mo(Motion::WordForward)),
    ("W", MOTION, Mo(Motion::BigWordForward)),
    ("b", MOTION, Mo(Motion::WordBackward)),
    ("B", MOTION, Mo(Motion::BigWordBackward)),
    ("e", MOTION, Mo(Motion::WordEnd)),
    ("E", MOTION, Mo(Motion::BigWordEnd)),
    ("ge", MOTION, Mo(Motion::WordEndBackward)),
    ("gE", MOTION, Mo(Motion::BigWordEndBackward)),
    ("0", MOTION, Mo(Motion::LineStart)),
    ("<home>", MOTION, Mo(Motion::LineStart)),
    ("^", MOTION, Mo(Motion::FirstNonBlank)),
    ("$", MOTION, Mo(Motion::LineEnd)),
    ("<end>", MOTION, Mo(Motion::LineEnd)),
    ("gg", MOTION, Mo(Motion::FileStart)),
    ("G", MOTION, Mo(Motion::FileEnd)),
    ("}", MOTION, Mo(Motion::ParagraphForward)),
    ("{", MOTION, Mo(Motion::ParagraphBackward)),
    (")", MOTION, Mo(Motion::SentenceForward)),
    ("(", MOTION, Mo(Motion::SentenceBackward)),
    ("%", MOTION, Mo(Motion::MatchPair)),
    ("H", MOTION, Mo(Motion::ScreenTop)),
    ("M", MOTION, Mo(Motion::ScreenMiddle)),
    ("L", MOTION, Mo(Motion::ScreenBottom)),
    ("n", MOTION, Mo(Motion::SearchNext)),
    ("N", MOTION, Mo(Motion::SearchPrev)),
    ("*", MOTION, Mo(Motion::SearchWordForward)),
    ("#", MOTION, Mo(Motion::SearchWordBackward)),
    (";", MOTION, Mo(Motion::RepeatCharSearch)),
    (",", MOTION, Mo(Motion::RepeatCharSearchReverse)),
    ("f", MOTION, Mo(Motion::FindForward)),
    ("F", MOTION, Mo(Motion::FindBackward)),
    ("t", MOTION, Mo(Motion::TillForward)),
    ("T", MOTION, Mo(Motion::TillBackward)),
    ("`", MOTION, Mo(Motion::MarkExact)),
    ("'", MOTION, Mo(Motion::MarkLine)),
    ("/", MOTION, Mo(Motion::SearchForward)),
    ("?", MOTION, Mo(Motion::SearchBackward)),
    ("<C-d>", MOTION, Mo(Motion::HalfPageDown)),
    ("<C-u>", MOTION, Mo(Motion::HalfPageUp)),
    ("<C-f>", MOTION, Mo(Motion::PageDown)),
    ("<C-b>", MOTION, Mo(Motion::PageUp)),
    ("+", MOTION, Mo(Motion::NextLineStart)),
    ("<cr>", MOTION, Mo(Motion::NextLineStart)),
    ("-", MOTION, Mo(Motion::PrevLineStart)),
    ("_", MOTION, Mo(Motion::CurrentLineStart)),
    ("|", MOTION, Mo(Motion::Column)),
    ("gj", MOTION, Mo(Motion::DisplayDown)),
    ("gk", MOTION, Mo(Motion::DisplayUp)),
    ("i", OBJECTS, Mo(Motion::TextObject { inner: true })),
    ("a", OBJECTS, Mo(Motion::TextObject { inner: false })),
    // operators
    ("d", ACTION, Op(Operator::Apply(K::Delete))),
    ("y", ACTION, Op(Operator::Apply(K::Yank))),
    ("c", ACTION, Op(Operator::Apply(K::Change))),
    (">", ACTION, Op(Operator::Apply(K::Indent))),
    ("<lt>", ACTION, Op(Operator::Apply(K::Unindent))),
    ("=", ACTION, Op(Operator::Apply(K::Reindent))),
    ("gU", ACTION, Op(Operator::Apply(K::Uppercase))),
    ("gu", ACTION, Op(Operator::Apply(K::Lowercase))),
    ("g~", ACTION, Op(Operator::Apply(K::ToggleCase))),
    ("gq", ACTION, Op(Operator::Apply(K::Format))),
    ("dd", NORMAL, Op(Operator::Linewise(K::Delete))),
    ("yy", NORMAL, Op(Operator::Linewise(K::Yank))),
    ("cc", NORMAL, Op(Operator::Linewise(K::Change))),
    (">>", NORMAL, Op(Operator::Linewise(K::Indent))),
    ("<lt><lt>", NORMAL, Op(Operator::Linewise(K::Unindent))),
    ("==", NORMAL, Op(Operator::Linewise(K::Reindent))),
    ("gUU", NORMAL, Op(Operator::Linewise(K::Uppercase))),
    ("gUgU", NORMAL, Op(Operator::Linewise(K::Uppercase))),
    ("guu", NORMAL, Op(Operator::Linewise(K::Lowercase))),
    ("gugu", NORMAL, Op(Operator::Linewise(K::Lowercase))),
    ("g~~", NORMAL, Op(Operator::Linewise(K::ToggleCase))),
    ("g~g~", NORMAL, Op(Operator::Linewise(K::ToggleCase))),
    ("gqq", NORMAL, Op(Operator::Linewise(K::Format))),
    ("gqgq", NORMAL, Op(Operator::Linewise(K::Format))),
    ("ys", NORMAL, Op(Operator::Surround)),
    ("~", NORMAL, Op(Operator::ToggleCaseChar)),
    ("r", ACTION, Op(Operator::ReplaceChar)),
    ("p", ACTION, Op(Operator::PasteAfter)),
    ("P", ACTION, Op(Operator::PasteBefore)),
    ("J", ACTION, Op(Operator::JoinLines)),
    ("gJ", ACTION, Op(Operator::JoinLinesRaw)),
    ("i", NORMAL, Op(Operator::Insert(InsertKind::Before))),
    ("a", NORMAL, Op(Operator::Insert(InsertKind::After))),
    ("I", NORMAL, Op(Operator::Insert(InsertKind::LineStart))),
    ("A", NORMAL, Op(Operator::Insert(InsertKind::LineEnd))),
    ("o", NORMAL, Op(Operator::Insert(InsertKind::OpenBelow))),
    ("O", NORMAL, Op(Operator::Insert(InsertKind::OpenAbove))),
    ("R", NORMAL, Op(Operator::EnterReplace)),
    ("u", NORMAL, Op(Operator::Undo)),
    ("<C-r>", NORMAL, Op(Operator::Redo)),
    (".", NORMAL, Op(Operator::RepeatLast)),
    ("q", NORMAL, Op(Operator::RecordMacro)),
    ("@", NORMAL, Op(Operator::PlayMacro)),
    ("m", ACTION, Op(Operator::SetMark)),
    ("v", ACTION, Op(Operator::Visual(VisualKind::Char))),
    ("V", ACTION, Op(Operator::Visual(VisualKind::Line))),
    ("<C-v>", ACTION, Op(Operator::Visual(VisualKind::Block))),
    ("gv", ACTION, Op(Operator::Reselect)),
    (":", ACTION, Op(Operator::CommandLine)),
    ("zz", ACTION, Op(Operator::Scroll(Scroll::Center))),
    ("zt", ACTION, Op(Operator::Scroll(Scroll::Top))),
    ("zb", ACTION, Op(Operator::Scroll(Scroll::Bottom))),
    ("<C-e>", ACTION, Op(Operator::Scroll(Scroll::LineDown))),
    ("<C-y>", ACTION, Op(Operator::Scroll(Scroll::LineUp))),
    ("<C-w>h", NORMAL, Op(Operator::Window(WindowCommand::FocusLeft))),
    ("<C-w>j", NORMAL, Op(Operator::Window(WindowCommand::FocusDown))),
    ("<C-w>k", NORMAL, Op(Operator::Window(WindowCommand::FocusUp))),
    ("<C-w>l", NORMAL, Op(Operator::Window(WindowCommand::FocusRight))),
    ("<C-w>s", NORMAL, Op(Operator::Window(WindowCommand::SplitHorizontal))),
    ("<C-w>v", NORMAL, Op(Operator::Window(WindowCommand::SplitVertical))),
    ("<C-w>q", NORMAL, Op(Operator::Window(WindowCommand::Quit))),
    ("<C-w>o", NORMAL, Op(Operator::Window(WindowCommand::Only))),
    ("<C-w>w", NORMAL, Op(Operator::Window(WindowCommand::Next))),
    ("<C-w><C-w>", NORMAL, Op(Operator::Window(WindowCommand::Next))),
    ("<C-w>c", NORMAL, Op(Operator::Window(WindowCommand::Close))),
    ("<C-w>n", NORMAL, Op(Operator::Window(WindowCommand::New))),
    ("<C-a>", NORMAL, Op(Operator::Increment)),
    ("<C-x>", NORMAL, Op(Operator::Decrement)),
    ("ZZ", NORMAL, Op(Operator::WriteQuit)),
    ("ZQ", NORMAL, Op(Operator::QuitNoWrite)),
    ("<C-g>", NORMAL, Op(Operator::ShowFileInfo)),
    ("&", NORMAL, Op(Operator::RepeatSubstitute)),
    // visual-only forms
    ("x", VISUALS, Op(Operator::Apply(K::Delete))),
    ("X", VISUALS, Op(Operator::Linewise(K::Delete))),
    ("D", VISUALS, Op(Operator::Linewise(K::Delete))),
    ("Y", VISUALS, Op(Operator::Linewise(K::Yank))),
    ("s", VISUALS, Op(Operator::Apply(K::Change))),
    ("C", VISUALS, Op(Operator::Linewise(K::Change))),
    ("S", VISUALS, Op(Operator::Linewise(K::Change))),
    ("R", VISUALS, Op(Operator::Linewise(K::Change))),
    ("~", VISUALS, Op(Operator::Apply(K::ToggleCase))),
    ("u", VISUALS, Op(Operator::Apply(K::Lowercase))),
    ("U", VISUALS, Op(Operator::Apply(K::Uppercase))),
    ("o", VISUALS, Op(Operator::SwapSelectionEnds)),
    ("O", VISUALS, Op(Operator::SwapSelectionEnds)),
    // insert mode
    ("<C-r>", ModeSet::INSERT, Op(Operator::InsertRegister)),
];

// -------------------------------------------------------------------------------------------------
// Trie Representation
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone)]
struct Edge {
    key: KeyToken,
    next: usize,
}

#[derive(Debug, Clone)]
struct Node {
    terminal: Option<CommandDef>,
    edges: SmallVec<[Edge; 4]>,
}

impl Node {
    fn new() -> Self {
        Self {
            terminal: None,
            edges: SmallVec::new(),
        }
    }
}

/// Result of walking a key sequence through one mode's trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Exact {
        command: CommandDef,
        /// Longer sequences share this one as a prefix (`d` vs `dd`).
        ambiguous: bool,
    },
    /// Strict prefix of one or more entries (`g`, `z`, `<C-w>`).
    Prefix,
    Miss,
}

#[derive(Debug, Clone)]
pub struct CommandTrie {
    nodes: Vec<Node>,
}

impl Default for CommandTrie {
    fn default() -> Self {
        Self {
            nodes: vec![Node::new()],
        }
    }
}

impl CommandTrie {
    fn insert(&mut self, keys: &[KeyToken], command: CommandDef) {
        let mut cur = 0usize;
        for key in keys {
            let next = if let Some(e) = self.nodes[cur].edges.iter().find(|e| e.key == *key) {
                e.next
            } else {
                let new_idx = self.nodes.len();
                self.nodes.push(Node::new());
                self.nodes[cur].edges.push(Edge {
                    key: key.clone(),
                    next: new_idx,
                });
                new_idx
            };
            cur = next;
        }
        if let Some(previous) = self.nodes[cur].terminal {
            trace!(target: "input.map", previous = previous.name(), command = command.name(), "terminal_override");
        }
        self.nodes[cur].terminal = Some(command);
    }

    pub fn lookup(&self, keys: &[KeyToken]) -> Lookup {
        if keys.is_empty() {
            return Lookup::Miss;
        }
        let mut node_idx = 0usize;
        for (i, key) in keys.iter().enumerate() {
            let Some(edge) = self.nodes[node_idx].edges.iter().find(|e| e.key == *key) else {
                trace!(target: "input.map", step = i, key = %key, "miss");
                return Lookup::Miss;
            };
            node_idx = edge.next;
            trace!(target: "input.map", step = i, key = %key, node = node_idx, "advance");
        }
        let node = &self.nodes[node_idx];
        match node.terminal {
            Some(command) => Lookup::Exact {
                command,
                ambiguous: !node.edges.is_empty(),
            },
            None => Lookup::Prefix,
        }
    }
}

// -------------------------------------------------------------------------------------------------
// Registry
// -------------------------------------------------------------------------------------------------
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    tries: HashMap<ModeSet, CommandTrie>,
    entries: Vec<(Vec<KeyToken>, ModeSet, CommandDef)>,
}

const SINGLE_MODES: [ModeSet; 8] = [
    ModeSet::NORMAL,
    ModeSet::OPERATOR_PENDING,
    ModeSet::VISUAL,
    ModeSet::VISUAL_LINE,
    ModeSet::VISUAL_BLOCK,
    ModeSet::INSERT,
    ModeSet::REPLACE,
    ModeSet::SELECT,
];

impl CommandRegistry {
    /// Compile the built-in table. Fails if any entry's notation is malformed.
    pub fn builtin() -> Result<Self, KeymapError> {
        let mut registry = Self::default();
        for (notation, modes, command) in BUILTIN {
            let keys = core_input::tokenize(notation).map_err(|source| KeymapError::Notation {
                context: format!("built-in entry '{notation}'"),
                source,
            })?;
            registry.insert(keys, *modes, *command);
        }
        debug!(target: "input.map", entries = registry.entries.len(), "registry_built");
        Ok(registry)
    }

    pub fn insert(&mut self, keys: Vec<KeyToken>, modes: ModeSet, command: CommandDef) {
        for single in SINGLE_MODES.into_iter().filter(|m| modes.contains(*m)) {
            self.tries.entry(single).or_default().insert(&keys, command);
        }
        self.entries.push((keys, modes, command));
    }

    pub fn lookup(&self, mode: Mode, keys: &[KeyToken]) -> Lookup {
        self.tries
            .get(&ModeSet::of(mode))
            .map_or(Lookup::Miss, |trie| trie.lookup(keys))
    }

    /// Find a command by its concrete name (e.g. `focus-pane-left`).
    pub fn command_named(&self, name: &str) -> Result<CommandDef, KeymapError> {
        self.entries
            .iter()
            .map(|(_, _, command)| *command)
            .find(|command| command.name() == name)
            .ok_or_else(|| KeymapError::UnknownCommand(name.to_string()))
    }

    /// Key sequences bound to `command` in `mode`.
    pub fn keys_for(&self, mode: Mode, command: CommandDef) -> Vec<&[KeyToken]> {
        let set = ModeSet::of(mode);
        self.entries
            .iter()
            .filter(|(keys, modes, c)| {
                *c == command
                    && !set.is_empty()
                    && modes.contains(set)
                    && matches!(self.lookup(mode, keys), Lookup::Exact { command: found, .. } if found == command)
            })
            .map(|(keys, _, _)| keys.as_slice())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_input::tokenize;
    use pretty_assertions::assert_eq;

    fn lookup(mode: Mode, notation: &str) -> Lookup {
        let registry = CommandRegistry::builtin().unwrap();
        registry.lookup(mode, &tokenize(notation).unwrap())
    }

    #[test]
    fn single_key_motion() {
        assert_eq!(
            lookup(Mode::Normal, "w"),
            Lookup::Exact {
                command: Mo(Motion::WordForward),
                ambiguous: false
            }
        );
    }

    #[test]
    fn operator_is_exact_but_ambiguous() {
        assert_eq!(
            lookup(Mode::Normal, "d"),
            Lookup::Exact {
                command: Op(Operator::Apply(K::Delete)),
                ambiguous: true
            }
        );
    }

    #[test]
    fn namespaces_are_prefixes() {
        assert_eq!(lookup(Mode::Normal, "g"), Lookup::Prefix);
        assert_eq!(lookup(Mode::Normal, "<C-w>"), Lookup::Prefix);
        assert_eq!(
            lookup(Mode::Normal, "<C-w>h"),
            Lookup::Exact {
                command: Op(Operator::Window(WindowCommand::FocusLeft)),
                ambiguous: false
            }
        );
    }

    #[test]
    fn modes_have_separate_tables() {
        assert!(matches!(
            lookup(Mode::Visual, "u"),
            Lookup::Exact { command: Op(Operator::Apply(K::Lowercase)), .. }
        ));
        assert!(matches!(
            lookup(Mode::Normal, "u"),
            Lookup::Exact { command: Op(Operator::Undo), .. }
        ));
        assert_eq!(lookup(Mode::OperatorPending, "d"), Lookup::Miss);
        assert!(matches!(
            lookup(Mode::OperatorPending, "i"),
            Lookup::Exact { command: Mo(Motion::TextObject { inner: true }), .. }
        ));
        assert_eq!(lookup(Mode::CommandLine, "w"), Lookup::Miss);
    }

    #[test]
    fn internal_normal_shares_normal_table() {
        assert_eq!(lookup(Mode::InternalNormal, "dd"), lookup(Mode::Normal, "dd"));
    }

    #[test]
    fn unmapped_key_misses() {
        assert_eq!(lookup(Mode::Normal, "Q"), Lookup::Miss);
        assert_eq!(lookup(Mode::Normal, "gZ"), Lookup::Miss);
    }

    #[test]
    fn commands_by_name() {
        let registry = CommandRegistry::builtin().unwrap();
        assert_eq!(
            registry.command_named("focus-pane-left").unwrap(),
            Op(Operator::Window(WindowCommand::FocusLeft))
        );
        assert!(matches!(
            registry.command_named("no-such-thing"),
            Err(KeymapError::UnknownCommand(_))
        ));
        let keys = registry.keys_for(Mode::Normal, Op(Operator::Linewise(K::Uppercase)));
        assert_eq!(keys.len(), 2);
    }
}
