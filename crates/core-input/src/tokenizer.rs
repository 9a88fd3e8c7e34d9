//! Vim key-notation tokenizer.
//!
//! Grammar handled here:
//! * Any character other than `<` is a one-character token, verbatim.
//! * `<` opens a named key: zero or more modifier pairs (`C-`, `M-`, `S-`,
//!   case-insensitive, each at most once) followed by either one character
//!   (only legal when at least one modifier is present) or a key name from
//!   `KEY_NAMES` / `f1`..`f15`, then `>`.
//!
//! The tokenizer is an iterator so callers can stop early; it is `Clone`, and
//! `reset` rewinds it, which is all "restartable" needs. After the first error
//! it yields nothing further.

use core_events::{KeyToken, ModMask, NamedKey};
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyNotationError {
    #[error("expected '>' to close key name opened at index {index}")]
    Unterminated { index: usize },
    #[error("'{name}' is not a known key (index {index})")]
    UnknownKey { name: String, index: usize },
    #[error("modifier '{modifier}-' repeated in key name at index {index}")]
    RepeatedModifier { modifier: char, index: usize },
    #[error("'<{key}>' needs at least one modifier (index {index})")]
    MissingModifier { key: char, index: usize },
}

impl KeyNotationError {
    /// Byte offset in the source where the offending key started.
    pub fn index(&self) -> usize {
        match self {
            KeyNotationError::Unterminated { index }
            | KeyNotationError::UnknownKey { index, .. }
            | KeyNotationError::RepeatedModifier { index, .. }
            | KeyNotationError::MissingModifier { index, .. } => *index,
        }
    }
}

const KEY_NAMES: &[(&str, KeyToken)] = &[
    ("esc", KeyToken::Named(NamedKey::Esc)),
    ("bs", KeyToken::Named(NamedKey::Backspace)),
    ("cr", KeyToken::Named(NamedKey::Enter)),
    ("enter", KeyToken::Named(NamedKey::Enter)),
    ("return", KeyToken::Named(NamedKey::Enter)),
    ("tab", KeyToken::Named(NamedKey::Tab)),
    ("space", KeyToken::Char(' ')),
    ("sp", KeyToken::Char(' ')),
    ("lt", KeyToken::Char('<')),
    ("bar", KeyToken::Char('|')),
    ("bslash", KeyToken::Char('\\')),
    ("home", KeyToken::Named(NamedKey::Home)),
    ("end", KeyToken::Named(NamedKey::End)),
    ("up", KeyToken::Named(NamedKey::Up)),
    ("down", KeyToken::Named(NamedKey::Down)),
    ("left", KeyToken::Named(NamedKey::Left)),
    ("right", KeyToken::Named(NamedKey::Right)),
    ("pageup", KeyToken::Named(NamedKey::PageUp)),
    ("pagedown", KeyToken::Named(NamedKey::PageDown)),
    ("insert", KeyToken::Named(NamedKey::Insert)),
    ("del", KeyToken::Named(NamedKey::Delete)),
];

fn lookup_key_name(name: &str) -> Option<KeyToken> {
    let lower = name.to_ascii_lowercase();
    if let Some((_, tok)) = KEY_NAMES.iter().find(|(n, _)| *n == lower) {
        return Some(tok.clone());
    }
    let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
    (1..=15)
        .contains(&n)
        .then_some(KeyToken::Named(NamedKey::F(n)))
}

fn modifier_bit(c: char) -> Option<ModMask> {
    match c.to_ascii_uppercase() {
        'C' => Some(ModMask::CTRL),
        'M' => Some(ModMask::ALT),
        'S' => Some(ModMask::SHIFT),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct KeyTokenizer<'a> {
    source: &'a str,
    pos: usize,
    failed: bool,
}

impl<'a> KeyTokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            failed: false,
        }
    }

    /// Rewind to the start of the source.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.failed = false;
    }

    fn named_key(&mut self, open: usize) -> Result<KeyToken, KeyNotationError> {
        let mut mods = ModMask::empty();
        loop {
            let rest = &self.source[self.pos..];
            let mut it = rest.chars();
            match (it.next(), it.next(), it.next()) {
                // `X-` is a modifier only when the dash is not the last character.
                (Some(c), Some('-'), Some(_)) => {
                    let Some(bit) = modifier_bit(c) else { break };
                    if mods.contains(bit) {
                        return Err(KeyNotationError::RepeatedModifier {
                            modifier: c.to_ascii_uppercase(),
                            index: open,
                        });
                    }
                    mods |= bit;
                    self.pos += c.len_utf8() + 1;
                }
                _ => break,
            }
        }

        let rest = &self.source[self.pos..];
        if !mods.is_empty() && rest.starts_with(">>") {
            self.pos += 2;
            return Ok(KeyToken::chord(mods, KeyToken::Char('>')));
        }
        let close = rest
            .find('>')
            .ok_or(KeyNotationError::Unterminated { index: open })?;
        let name = &rest[..close];
        self.pos += close + 1;

        let mut chars = name.chars();
        let token = match (chars.next(), chars.next()) {
            (Some(c), None) => {
                if mods.is_empty() {
                    return Err(KeyNotationError::MissingModifier { key: c, index: open });
                }
                KeyToken::Char(c)
            }
            _ => lookup_key_name(name).ok_or_else(|| KeyNotationError::UnknownKey {
                name: name.to_string(),
                index: open,
            })?,
        };
        Ok(KeyToken::chord(mods, token))
    }
}

impl Iterator for KeyTokenizer<'_> {
    type Item = Result<KeyToken, KeyNotationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let c = self.source[self.pos..].chars().next()?;
        let start = self.pos;
        self.pos += c.len_utf8();
        let item = if c == '<' {
            self.named_key(start)
        } else {
            Ok(KeyToken::Char(c))
        };
        match &item {
            Ok(tok) => trace!(target: "input.tokenize", index = start, token = %tok, "token"),
            Err(err) => {
                self.failed = true;
                trace!(target: "input.tokenize", index = start, %err, "token_error");
            }
        }
        Some(item)
    }
}

/// Tokenize a whole notation string, failing on the first malformed key.
pub fn tokenize(source: &str) -> Result<Vec<KeyToken>, KeyNotationError> {
    KeyTokenizer::new(source).collect()
}
