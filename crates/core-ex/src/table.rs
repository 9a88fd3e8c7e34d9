//! Built-in Ex command table.

use bitflags::bitflags;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

bitflags! {
    /// Which argument checks a command opts into.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ErrorPolicy: u8 {
        /// A range is an error (E481).
        const NO_RANGE = 1 << 0;
        /// `!` is an error (E477).
        const NO_BANG = 1 << 1;
        /// Arguments on a pattern-less command are an error (E488).
        const TRAILING_CHARS = 1 << 2;
        /// A pattern miss reports E14.
        const ADDRESS_REQUIRED = 1 << 3;
        /// A pattern miss reports E16.
        const INVALID_RANGE = 1 << 4;
        /// Missing arguments are an error (E471).
        const ARGUMENT_REQUIRED = 1 << 5;
    }
}

#[derive(Debug, Error)]
pub enum ExTableError {
    #[error("invalid argument pattern for `{command}`: {source}")]
    Pattern {
        command: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// One row of the command table.
#[derive(Debug)]
pub struct ExCommandDef {
    pub name: &'static str,
    pub short: &'static str,
    /// Concrete command dispatched by the host.
    pub target: String,
    pub patterns: Vec<Regex>,
    pub policy: ErrorPolicy,
    /// The rest of the line, `|` included, belongs to this command.
    pub takes_bar: bool,
}

impl ExCommandDef {
    pub fn can_have_range(&self) -> bool {
        !self.policy.contains(ErrorPolicy::NO_RANGE)
    }
}

struct Row {
    name: &'static str,
    short: &'static str,
    patterns: &'static [&'static str],
    policy: ErrorPolicy,
    takes_bar: bool,
}

const fn row(name: &'static str, short: &'static str, policy: ErrorPolicy) -> Row {
    Row {
        name,
        short,
        patterns: &[],
        policy,
        takes_bar: false,
    }
}

const fn bar(name: &'static str, short: &'static str, policy: ErrorPolicy) -> Row {
    Row {
        name,
        short,
        patterns: &[],
        policy,
        takes_bar: true,
    }
}

const fn with_patterns(
    name: &'static str,
    short: &'static str,
    patterns: &'static [&'static str],
    policy: ErrorPolicy,
) -> Row {
    Row {
        name,
        short,
        patterns,
        policy,
        takes_bar: false,
    }
}

const SUBSTITUTE_PATTERNS: &[&str] = &[
    r"^/(?P<pattern>(?:\\.|[^\\/])*)/(?P<replacement>(?:\\.|[^\\/])*)(?:/(?P<flags>[&cegiInp#lr]*))?(?:\s*(?P<count>\d+))?\s*$",
    r"^/(?P<pattern>(?:\\.|[^\\/])+)/?$",
    r"^(?P<flags>[&cegiInp#lr]*)(?:\s*(?P<count>\d+))?\s*$",
];

const AMP_PATTERNS: &[&str] = &[r"^(?P<flags>[&cegiInp#lr]*)(?:\s*(?P<count>\d+))?\s*$"];

const MARK_PATTERNS: &[&str] = &[r"^(?P<mark>[a-zA-Z'`<>\[\]])$"];

/// A leading digit is always the count; numbered registers cannot be named here.
const COUNT_PATTERNS: &[&str] = &[r"^(?P<register>[a-zA-Z\x22*+_-])?\s*(?P<count>\d+)?$"];

const PUT_PATTERNS: &[&str] = &[r"^(?P<register>[a-zA-Z0-9\x22*+_.:%#=/-])?$"];

const JOIN_PATTERNS: &[&str] = &[r"^(?P<count>\d+)?\s*(?P<flags>[#lp]+)?$"];

const LINE_TARGET_PATTERNS: &[&str] = &[r"^(?P<address>\S.*)$"];

const LET_PATTERNS: &[&str] = &[
    r#"^@(?P<register>[a-zA-Z0-9\x22*+/:.-])\s*=\s*"(?P<value>(?:\\.|[^\\"])*)"\s*$"#,
    r"^@(?P<register>[a-zA-Z0-9\x22*+/:.-])\s*=\s*'(?P<literal>[^']*)'\s*$",
];

const NONE: ErrorPolicy = ErrorPolicy::empty();
const NR: ErrorPolicy = ErrorPolicy::NO_RANGE;
const NB: ErrorPolicy = ErrorPolicy::NO_BANG;
const TC: ErrorPolicy = ErrorPolicy::TRAILING_CHARS;

const fn or(a: ErrorPolicy, b: ErrorPolicy) -> ErrorPolicy {
    ErrorPolicy::from_bits_truncate(a.bits() | b.bits())
}

const NR_TC: ErrorPolicy = or(NR, TC);
const NR_NB_TC: ErrorPolicy = or(NR_TC, NB);
const NB_TC: ErrorPolicy = or(NB, TC);
const NR_NB: ErrorPolicy = or(NR, NB);
const NR_ARG: ErrorPolicy = or(NR, ErrorPolicy::ARGUMENT_REQUIRED);

const BUILTIN: &[Row] = &[
    row("write", "w", NONE),
    row("wall", "wa", NR_TC),
    row("wq", "wq", NONE),
    row("xit", "x", NONE),
    row("exit", "exi", NONE),
    row("quit", "q", NR_TC),
    row("qall", "qa", NR_TC),
    row("wqall", "wqa", NR_TC),
    row("xall", "xa", NR_TC),
    row("edit", "e", NR),
    row("enew", "ene", NR_TC),
    row("new", "new", NR),
    row("vnew", "vne", NR),
    row("split", "sp", NR),
    row("vsplit", "vs", NR),
    row("only", "on", NR_TC),
    row("close", "clo", NR_TC),
    with_patterns(
        "substitute",
        "s",
        SUBSTITUTE_PATTERNS,
        ErrorPolicy::INVALID_RANGE,
    ),
    with_patterns("&", "&", AMP_PATTERNS, or(NB, ErrorPolicy::INVALID_RANGE)),
    bar("global", "g", ErrorPolicy::ARGUMENT_REQUIRED),
    bar("vglobal", "v", or(NB, ErrorPolicy::ARGUMENT_REQUIRED)),
    with_patterns("delete", "d", COUNT_PATTERNS, or(NB, ErrorPolicy::INVALID_RANGE)),
    with_patterns("yank", "y", COUNT_PATTERNS, or(NB, ErrorPolicy::INVALID_RANGE)),
    with_patterns("put", "pu", PUT_PATTERNS, ErrorPolicy::INVALID_RANGE),
    with_patterns(
        "copy",
        "co",
        LINE_TARGET_PATTERNS,
        or(NB, ErrorPolicy::ADDRESS_REQUIRED),
    ),
    with_patterns("t", "t", LINE_TARGET_PATTERNS, or(NB, ErrorPolicy::ADDRESS_REQUIRED)),
    with_patterns(
        "move",
        "move",
        LINE_TARGET_PATTERNS,
        or(NB, ErrorPolicy::ADDRESS_REQUIRED),
    ),
    with_patterns("mark", "ma", MARK_PATTERNS, or(NB, ErrorPolicy::ARGUMENT_REQUIRED)),
    with_patterns("k", "k", MARK_PATTERNS, or(NB, ErrorPolicy::ARGUMENT_REQUIRED)),
    with_patterns("join", "j", JOIN_PATTERNS, ErrorPolicy::INVALID_RANGE),
    bar("normal", "norm", ErrorPolicy::ARGUMENT_REQUIRED),
    row("set", "se", NR),
    row("setlocal", "setl", NR),
    with_patterns("let", "let", LET_PATTERNS, NR_ARG),
    bar("map", "map", NR),
    bar("nmap", "nm", NR_NB),
    bar("vmap", "vm", NR_NB),
    bar("omap", "om", NR_NB),
    bar("imap", "im", NR_NB),
    bar("noremap", "no", NR),
    bar("nnoremap", "nn", NR_NB),
    bar("vnoremap", "vn", NR_NB),
    bar("onoremap", "ono", NR_NB),
    bar("inoremap", "ino", NR_NB),
    bar("unmap", "unm", NR_ARG),
    bar("nunmap", "nun", or(NR_NB, ErrorPolicy::ARGUMENT_REQUIRED)),
    bar("vunmap", "vu", or(NR_NB, ErrorPolicy::ARGUMENT_REQUIRED)),
    bar("ounmap", "ou", or(NR_NB, ErrorPolicy::ARGUMENT_REQUIRED)),
    bar("iunmap", "iu", or(NR_NB, ErrorPolicy::ARGUMENT_REQUIRED)),
    row("registers", "reg", NR_NB),
    row("display", "di", NR_NB),
    row("marks", "marks", NR_NB),
    row("buffers", "buffers", NR),
    row("ls", "ls", NR),
    row("files", "files", NR),
    row("bnext", "bn", NR_TC),
    row("bprevious", "bp", NR_TC),
    row("bfirst", "bf", NR_TC),
    row("blast", "bl", NR_TC),
    row("tabnew", "tabnew", NR),
    row("tabnext", "tabn", NR_TC),
    row("tabprevious", "tabp", NR_TC),
    row("tabclose", "tabc", NR_TC),
    row("read", "r", NONE),
    row("cquit", "cq", NR_TC),
    row("nohlsearch", "noh", NR_NB_TC),
    row("print", "p", NB_TC),
    row("undo", "u", NR_NB_TC),
    row("redo", "red", NR_NB_TC),
    row("shell", "sh", NR_NB_TC),
    bar("!", "!", NONE),
    row("file", "f", NR),
    row("goto", "go", NB_TC),
    row("cd", "cd", NR),
    row("pwd", "pw", NR_NB_TC),
    row("help", "h", NR),
    row("sort", "sor", NONE),
];

/// Compiled command table with name and abbreviation lookup.
#[derive(Debug)]
pub struct ExCommandTable {
    defs: Vec<ExCommandDef>,
}

impl ExCommandTable {
    /// Compile the built-in table; every argument pattern is checked here.
    pub fn builtin() -> Result<Self, ExTableError> {
        let mut defs = Vec::with_capacity(BUILTIN.len());
        for row in BUILTIN {
            let patterns = row
                .patterns
                .iter()
                .map(|p| Regex::new(p))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|source| ExTableError::Pattern {
                    command: row.name,
                    source,
                })?;
            defs.push(ExCommandDef {
                name: row.name,
                short: row.short,
                target: format!("ex-{}", target_suffix(row.name)),
                patterns,
                policy: row.policy,
                takes_bar: row.takes_bar,
            });
        }
        debug!(target: "ex.parse", commands = defs.len(), "command_table_built");
        Ok(Self { defs })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExCommandDef> {
        self.defs.iter()
    }

    /// Exact long or short name first, then a unique prefix of either.
    pub fn find(&self, name: &str) -> Option<&ExCommandDef> {
        if name.is_empty() {
            return None;
        }
        if let Some(def) = self.defs.iter().find(|d| d.name == name || d.short == name) {
            return Some(def);
        }
        let mut candidates = self
            .defs
            .iter()
            .filter(|d| d.name.starts_with(name) && name.starts_with(d.short));
        let first = candidates.next()?;
        if candidates.next().is_some() {
            return None;
        }
        Some(first)
    }
}

fn target_suffix(name: &'static str) -> &'static str {
    match name {
        "&" => "repeat-substitute",
        "!" => "bang",
        "t" => "copy",
        "k" => "mark",
        other => other,
    }
}
