//! Closed command vocabulary: every key the registry knows resolves to one of
//! these variants. Metadata (input needs, motion requirement, repeatability,
//! mode after execution, concrete command name) lives on the enums so the
//! state machine never has to look anything up by string.

use core_events::Mode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    Left,
    Down,
    Up,
    Right,
    WordForward,
    BigWordForward,
    WordBackward,
    BigWordBackward,
    WordEnd,
    BigWordEnd,
    WordEndBackward,
    BigWordEndBackward,
    LineStart,
    FirstNonBlank,
    LineEnd,
    FileStart,
    FileEnd,
    ParagraphForward,
    ParagraphBackward,
    SentenceForward,
    SentenceBackward,
    MatchPair,
    ScreenTop,
    ScreenMiddle,
    ScreenBottom,
    SearchNext,
    SearchPrev,
    SearchWordForward,
    SearchWordBackward,
    RepeatCharSearch,
    RepeatCharSearchReverse,
    FindForward,
    FindBackward,
    TillForward,
    TillBackward,
    MarkExact,
    MarkLine,
    SearchForward,
    SearchBackward,
    HalfPageDown,
    HalfPageUp,
    PageDown,
    PageUp,
    NextLineStart,
    PrevLineStart,
    CurrentLineStart,
    Column,
    DisplayDown,
    DisplayUp,
    TextObject { inner: bool },
}

/// The part of an operator that acts on a range of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Delete,
    Yank,
    Change,
    Indent,
    Unindent,
    Reindent,
    Uppercase,
    Lowercase,
    ToggleCase,
    Format,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualKind {
    Char,
    Line,
    Block,
}

impl VisualKind {
    pub fn mode(self) -> Mode {
        match self {
            VisualKind::Char => Mode::Visual,
            VisualKind::Line => Mode::VisualLine,
            VisualKind::Block => Mode::VisualBlock,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertKind {
    Before,
    After,
    LineStart,
    LineEnd,
    OpenBelow,
    OpenAbove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scroll {
    Center,
    Top,
    Bottom,
    LineDown,
    LineUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowCommand {
    FocusLeft,
    FocusDown,
    FocusUp,
    FocusRight,
    SplitHorizontal,
    SplitVertical,
    Quit,
    Only,
    Next,
    Close,
    New,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `d{motion}`, `y{motion}`, ... and their Visual-mode forms.
    Apply(OperatorKind),
    /// `dd`, `yy`, `gUU`, ... and linewise Visual forms (`D`, `Y`, `S`).
    Linewise(OperatorKind),
    /// `ys{motion}{char}`.
    Surround,
    ToggleCaseChar,
    ReplaceChar,
    PasteAfter,
    PasteBefore,
    JoinLines,
    JoinLinesRaw,
    Insert(InsertKind),
    EnterReplace,
    Undo,
    Redo,
    RepeatLast,
    RecordMacro,
    PlayMacro,
    SetMark,
    Visual(VisualKind),
    Reselect,
    SwapSelectionEnds,
    CommandLine,
    Scroll(Scroll),
    Window(WindowCommand),
    Increment,
    Decrement,
    WriteQuit,
    QuitNoWrite,
    ShowFileInfo,
    RepeatSubstitute,
    InsertRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandDef {
    Motion(Motion),
    Operator(Operator),
}

/// How a command collects the extra input it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// The very next key (`f{char}`, `m{mark}`, `q{register}`).
    Immediate,
    /// A whole line submitted with `<cr>` (`/`, `?`, `:`).
    ViaExternalPrompt,
    /// One key, collected only after the operator's motion is known.
    AfterMotion,
}

/// Which characters a command accepts as its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputClass {
    AnyChar,
    Mark,
    Register,
    MacroRegister,
    TextObject,
    Line,
}

impl InputClass {
    pub fn accepts(self, c: char) -> bool {
        match self {
            InputClass::AnyChar | InputClass::Line => true,
            InputClass::Mark => c.is_ascii_alphabetic() || "'`<>[]".contains(c),
            InputClass::Register => c.is_ascii_alphanumeric() || c == '"',
            InputClass::MacroRegister => c.is_ascii_alphanumeric() || "\"@:".contains(c),
            InputClass::TextObject => "wWsp\"'`()bB{}[]<>t".contains(c),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSpec {
    pub kind: InputKind,
    pub class: InputClass,
}

impl InputSpec {
    const fn immediate(class: InputClass) -> Option<Self> {
        Some(Self {
            kind: InputKind::Immediate,
            class,
        })
    }

    const fn prompt() -> Option<Self> {
        Some(Self {
            kind: InputKind::ViaExternalPrompt,
            class: InputClass::Line,
        })
    }
}

impl OperatorKind {
    pub fn name(self) -> &'static str {
        match self {
            OperatorKind::Delete => "delete",
            OperatorKind::Yank => "yank",
            OperatorKind::Change => "change",
            OperatorKind::Indent => "indent",
            OperatorKind::Unindent => "unindent",
            OperatorKind::Reindent => "reindent",
            OperatorKind::Uppercase => "uppercase",
            OperatorKind::Lowercase => "lowercase",
            OperatorKind::ToggleCase => "toggle-case",
            OperatorKind::Format => "format",
        }
    }

    pub fn modifies_buffer(self) -> bool {
        !matches!(self, OperatorKind::Yank)
    }
}

impl Motion {
    pub fn name(self) -> &'static str {
        match self {
            Motion::Left => "left",
            Motion::Down => "down",
            Motion::Up => "up",
            Motion::Right => "right",
            Motion::WordForward => "word-forward",
            Motion::BigWordForward => "big-word-forward",
            Motion::WordBackward => "word-backward",
            Motion::BigWordBackward => "big-word-backward",
            Motion::WordEnd => "word-end",
            Motion::BigWordEnd => "big-word-end",
            Motion::WordEndBackward => "word-end-backward",
            Motion::BigWordEndBackward => "big-word-end-backward",
            Motion::LineStart => "line-start",
            Motion::FirstNonBlank => "first-non-blank",
            Motion::LineEnd => "line-end",
            Motion::FileStart => "goto-first-line",
            Motion::FileEnd => "goto-last-line",
            Motion::ParagraphForward => "paragraph-forward",
            Motion::ParagraphBackward => "paragraph-backward",
            Motion::SentenceForward => "sentence-forward",
            Motion::SentenceBackward => "sentence-backward",
            Motion::MatchPair => "match-pair",
            Motion::ScreenTop => "screen-top",
            Motion::ScreenMiddle => "screen-middle",
            Motion::ScreenBottom => "screen-bottom",
            Motion::SearchNext => "search-next",
            Motion::SearchPrev => "search-prev",
            Motion::SearchWordForward => "search-word-forward",
            Motion::SearchWordBackward => "search-word-backward",
            Motion::RepeatCharSearch => "repeat-char-search",
            Motion::RepeatCharSearchReverse => "repeat-char-search-reverse",
            Motion::FindForward => "find-char-forward",
            Motion::FindBackward => "find-char-backward",
            Motion::TillForward => "till-char-forward",
            Motion::TillBackward => "till-char-backward",
            Motion::MarkExact => "goto-mark",
            Motion::MarkLine => "goto-mark-line",
            Motion::SearchForward => "search-forward",
            Motion::SearchBackward => "search-backward",
            Motion::HalfPageDown => "half-page-down",
            Motion::HalfPageUp => "half-page-up",
            Motion::PageDown => "page-down",
            Motion::PageUp => "page-up",
            Motion::NextLineStart => "next-line-start",
            Motion::PrevLineStart => "prev-line-start",
            Motion::CurrentLineStart => "current-line-start",
            Motion::Column => "goto-column",
            Motion::DisplayDown => "display-line-down",
            Motion::DisplayUp => "display-line-up",
            Motion::TextObject { inner: true } => "inner-text-object",
            Motion::TextObject { inner: false } => "text-object",
        }
    }

    pub fn input(self) -> Option<InputSpec> {
        match self {
            Motion::FindForward | Motion::FindBackward | Motion::TillForward | Motion::TillBackward => {
                InputSpec::immediate(InputClass::AnyChar)
            }
            Motion::MarkExact | Motion::MarkLine => InputSpec::immediate(InputClass::Mark),
            Motion::TextObject { .. } => InputSpec::immediate(InputClass::TextObject),
            Motion::SearchForward | Motion::SearchBackward => InputSpec::prompt(),
            _ => None,
        }
    }

    /// Motions whose input is a character search remembered for `;` and `,`.
    pub fn is_char_search(self) -> bool {
        matches!(
            self,
            Motion::FindForward | Motion::FindBackward | Motion::TillForward | Motion::TillBackward
        )
    }

    /// The same character search in the opposite direction.
    pub fn reversed(self) -> Motion {
        match self {
            Motion::FindForward => Motion::FindBackward,
            Motion::FindBackward => Motion::FindForward,
            Motion::TillForward => Motion::TillBackward,
            Motion::TillBackward => Motion::TillForward,
            Motion::SearchForward => Motion::SearchBackward,
            Motion::SearchBackward => Motion::SearchForward,
            other => other,
        }
    }
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::Apply(kind) => kind.name(),
            Operator::Linewise(kind) => match kind {
                OperatorKind::Delete => "delete-lines",
                OperatorKind::Yank => "yank-lines",
                OperatorKind::Change => "change-lines",
                OperatorKind::Indent => "indent-lines",
                OperatorKind::Unindent => "unindent-lines",
                OperatorKind::Reindent => "reindent-lines",
                OperatorKind::Uppercase => "uppercase-lines",
                OperatorKind::Lowercase => "lowercase-lines",
                OperatorKind::ToggleCase => "toggle-case-lines",
                OperatorKind::Format => "format-lines",
            },
            Operator::Surround => "surround",
            Operator::ToggleCaseChar => "toggle-case-char",
            Operator::ReplaceChar => "replace-char",
            Operator::PasteAfter => "paste-after",
            Operator::PasteBefore => "paste-before",
            Operator::JoinLines => "join-lines",
            Operator::JoinLinesRaw => "join-lines-raw",
            Operator::Insert(kind) => match kind {
                InsertKind::Before => "enter-insert-mode",
                InsertKind::After => "append",
                InsertKind::LineStart => "insert-line-start",
                InsertKind::LineEnd => "append-line-end",
                InsertKind::OpenBelow => "open-line-below",
                InsertKind::OpenAbove => "open-line-above",
            },
            Operator::EnterReplace => "enter-replace-mode",
            Operator::Undo => "undo",
            Operator::Redo => "redo",
            Operator::RepeatLast => "repeat",
            Operator::RecordMacro => "record-macro",
            Operator::PlayMacro => "play-macro",
            Operator::SetMark => "set-mark",
            Operator::Visual(kind) => match kind {
                VisualKind::Char => "enter-visual-mode",
                VisualKind::Line => "enter-visual-line-mode",
                VisualKind::Block => "enter-visual-block-mode",
            },
            Operator::Reselect => "reselect",
            Operator::SwapSelectionEnds => "swap-selection-ends",
            Operator::CommandLine => "command-line",
            Operator::Scroll(s) => match s {
                Scroll::Center => "scroll-cursor-center",
                Scroll::Top => "scroll-cursor-top",
                Scroll::Bottom => "scroll-cursor-bottom",
                Scroll::LineDown => "scroll-line-down",
                Scroll::LineUp => "scroll-line-up",
            },
            Operator::Window(w) => match w {
                WindowCommand::FocusLeft => "focus-pane-left",
                WindowCommand::FocusDown => "focus-pane-down",
                WindowCommand::FocusUp => "focus-pane-up",
                WindowCommand::FocusRight => "focus-pane-right",
                WindowCommand::SplitHorizontal => "split-pane-horizontal",
                WindowCommand::SplitVertical => "split-pane-vertical",
                WindowCommand::Quit => "quit-pane",
                WindowCommand::Only => "only-pane",
                WindowCommand::Next => "focus-pane-next",
                WindowCommand::Close => "close-pane",
                WindowCommand::New => "new-pane",
            },
            Operator::Increment => "increment",
            Operator::Decrement => "decrement",
            Operator::WriteQuit => "write-quit",
            Operator::QuitNoWrite => "quit-no-write",
            Operator::ShowFileInfo => "show-file-info",
            Operator::RepeatSubstitute => "repeat-substitute",
            Operator::InsertRegister => "insert-register",
        }
    }

    pub fn input(self) -> Option<InputSpec> {
        match self {
            Operator::ReplaceChar => InputSpec::immediate(InputClass::AnyChar),
            Operator::SetMark => InputSpec::immediate(InputClass::Mark),
            Operator::RecordMacro | Operator::InsertRegister => {
                InputSpec::immediate(InputClass::Register)
            }
            Operator::PlayMacro => InputSpec::immediate(InputClass::MacroRegister),
            Operator::CommandLine => InputSpec::prompt(),
            Operator::Surround => Some(InputSpec {
                kind: InputKind::AfterMotion,
                class: InputClass::AnyChar,
            }),
            _ => None,
        }
    }

    /// Whether the operator needs a motion outside Visual modes.
    pub fn motion_required(self) -> bool {
        matches!(self, Operator::Apply(_) | Operator::Surround)
    }

    /// Whether `.` may replay this command.
    pub fn repeatable(self) -> bool {
        match self {
            Operator::Apply(kind) | Operator::Linewise(kind) => kind.modifies_buffer(),
            Operator::Surround
            | Operator::ToggleCaseChar
            | Operator::ReplaceChar
            | Operator::PasteAfter
            | Operator::PasteBefore
            | Operator::JoinLines
            | Operator::JoinLinesRaw
            | Operator::Insert(_)
            | Operator::EnterReplace
            | Operator::Increment
            | Operator::Decrement
            | Operator::RepeatSubstitute => true,
            _ => false,
        }
    }

    /// Whether the concrete command carries the selected register.
    pub fn uses_register(self) -> bool {
        matches!(
            self,
            Operator::Apply(_)
                | Operator::Linewise(_)
                | Operator::PasteAfter
                | Operator::PasteBefore
        )
    }

    /// Mode the view is left in after this operator runs from `before`.
    pub fn mode_after(self, before: Mode) -> Mode {
        match self {
            Operator::Apply(OperatorKind::Change)
            | Operator::Linewise(OperatorKind::Change)
            | Operator::Insert(_)
            | Operator::InsertRegister => Mode::Insert,
            Operator::EnterReplace => Mode::Replace,
            Operator::Visual(kind) if before == kind.mode() => Mode::Normal,
            Operator::Visual(kind) => kind.mode(),
            Operator::Reselect => Mode::Visual,
            Operator::SwapSelectionEnds => before,
            Operator::RecordMacro | Operator::PlayMacro | Operator::SetMark if before.is_visual() => {
                before
            }
            _ => Mode::Normal,
        }
    }
}

impl CommandDef {
    pub fn name(self) -> &'static str {
        match self {
            CommandDef::Motion(m) => m.name(),
            CommandDef::Operator(op) => op.name(),
        }
    }

    pub fn input(self) -> Option<InputSpec> {
        match self {
            CommandDef::Motion(m) => m.input(),
            CommandDef::Operator(op) => op.input(),
        }
    }

    pub fn accepts_input(self) -> bool {
        self.input().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_kinds_have_line_variants() {
        assert_eq!(Operator::Apply(OperatorKind::Delete).name(), "delete");
        assert_eq!(Operator::Linewise(OperatorKind::Delete).name(), "delete-lines");
        assert_eq!(Operator::Linewise(OperatorKind::Uppercase).name(), "uppercase-lines");
    }

    #[test]
    fn change_and_insert_leave_insert_mode() {
        assert_eq!(Operator::Apply(OperatorKind::Change).mode_after(Mode::Normal), Mode::Insert);
        assert_eq!(Operator::Insert(InsertKind::OpenBelow).mode_after(Mode::Normal), Mode::Insert);
        assert_eq!(Operator::Apply(OperatorKind::Delete).mode_after(Mode::Visual), Mode::Normal);
    }

    #[test]
    fn visual_toggle_exits_same_kind() {
        let v = Operator::Visual(VisualKind::Char);
        assert_eq!(v.mode_after(Mode::Normal), Mode::Visual);
        assert_eq!(v.mode_after(Mode::Visual), Mode::Normal);
        assert_eq!(v.mode_after(Mode::VisualLine), Mode::Visual);
    }

    #[test]
    fn yank_is_not_repeatable() {
        assert!(!Operator::Apply(OperatorKind::Yank).repeatable());
        assert!(Operator::Linewise(OperatorKind::Delete).repeatable());
        assert!(!Operator::Undo.repeatable());
    }

    #[test]
    fn input_classes() {
        assert!(InputClass::Mark.accepts('<'));
        assert!(!InputClass::Mark.accepts('1'));
        assert!(InputClass::MacroRegister.accepts('@'));
        assert!(!InputClass::Register.accepts('@'));
        assert!(InputClass::TextObject.accepts('w'));
        assert!(!InputClass::TextObject.accepts('z'));
    }

    #[test]
    fn char_search_reversal() {
        assert_eq!(Motion::FindForward.reversed(), Motion::FindBackward);
        assert_eq!(Motion::TillBackward.reversed(), Motion::TillForward);
        assert!(!Motion::SearchForward.is_char_search());
    }
}
