//! Registers: named text slots, one string per selection at write time.
//!
//! Write rules:
//! - `_` swallows everything; reading it always yields nothing.
//! - `A`-`Z` append to their lowercase slot index by index (zip-padded).
//! - Every successful write except to `"`, `_` and `=` mirrors into `"`.
//! - `%`, `#`, `.`, `:` are read-only to `set`; the host updates them through
//!   `set_special`.
//! - `*` and `+` go through a `ClipboardProvider`.
//! - Reading `"` while `=` holds a value returns that value and clears `=`.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::StateError;

pub const REG_UNNAMED: char = '"';
pub const REG_BLACK_HOLE: char = '_';
pub const REG_SMALL_DELETE: char = '-';
pub const REG_EXPRESSION: char = '=';
pub const REG_YANK: char = '0';
pub const REG_CLIPBOARD: char = '*';
pub const REG_SYS_CLIPBOARD: char = '+';
pub const REG_LAST_INSERTED: char = '.';
pub const REG_FILE_NAME: char = '%';
pub const REG_ALT_FILE_NAME: char = '#';
pub const REG_LAST_EX: char = ':';

const READ_ONLY: [char; 4] = [REG_FILE_NAME, REG_ALT_FILE_NAME, REG_LAST_INSERTED, REG_LAST_EX];

/// Listing order used by `:registers`.
const DISPLAY_ORDER: &str = "\"0123456789abcdefghijklmnopqrstuvwxyz-.:%#=*+";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterError {
    #[error("invalid register name: '{0}'")]
    Invalid(char),
    #[error("register '{0}' is read-only")]
    ReadOnly(char),
}

impl From<RegisterError> for StateError {
    fn from(err: RegisterError) -> Self {
        StateError::Register(err)
    }
}

/// Host clipboard backing the `*` and `+` registers.
pub trait ClipboardProvider: fmt::Debug {
    fn get(&self) -> Option<Vec<String>>;
    fn set(&mut self, values: Vec<String>);
}

/// Process-local clipboard used when the host provides none.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    contents: Option<Vec<String>>,
}

impl ClipboardProvider for MemoryClipboard {
    fn get(&self) -> Option<Vec<String>> {
        self.contents.clone()
    }

    fn set(&mut self, values: Vec<String>) {
        self.contents = Some(values);
    }
}

#[derive(Debug)]
pub struct Registers {
    slots: HashMap<char, Vec<String>>,
    clipboard: Box<dyn ClipboardProvider>,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers {
    /// Capacity of the numbered delete ring (`1`-`9`).
    pub const NUMBERED: usize = 9;

    pub fn new() -> Self {
        Self::with_clipboard(Box::new(MemoryClipboard::default()))
    }

    pub fn with_clipboard(clipboard: Box<dyn ClipboardProvider>) -> Self {
        Self {
            slots: HashMap::new(),
            clipboard,
        }
    }

    pub fn is_valid_name(name: char) -> bool {
        name.is_ascii_alphanumeric() || "\"-_=*+.%#:".contains(name)
    }

    fn check(name: char) -> Result<char, RegisterError> {
        if Self::is_valid_name(name) {
            Ok(if name.is_ascii_uppercase() {
                name.to_ascii_lowercase()
            } else {
                name
            })
        } else {
            Err(RegisterError::Invalid(name))
        }
    }

    /// Read a register. Reading `"` consumes a pending expression value.
    pub fn get(&mut self, name: char) -> Result<Option<Vec<String>>, RegisterError> {
        let slot = Self::check(name)?;
        if slot == REG_UNNAMED
            && let Some(expr) = self.slots.remove(&REG_EXPRESSION)
            && !expr.is_empty()
        {
            debug!(target: "registers", name = %name, lines = expr.len(), "expression_consumed");
            return Ok(Some(expr));
        }
        Ok(self.peek(slot))
    }

    /// Read without side effects.
    pub fn peek(&self, name: char) -> Option<Vec<String>> {
        let slot = Self::check(name).ok()?;
        match slot {
            REG_BLACK_HOLE => None,
            REG_CLIPBOARD | REG_SYS_CLIPBOARD => self.clipboard.get(),
            _ => self.slots.get(&slot).cloned(),
        }
    }

    /// Replace a register's contents (uppercase names append).
    pub fn set(&mut self, name: char, values: Vec<String>) -> Result<(), RegisterError> {
        let slot = Self::check(name)?;
        if READ_ONLY.contains(&slot) {
            return Err(RegisterError::ReadOnly(name));
        }
        if name.is_ascii_uppercase() {
            return self.append(name, values);
        }
        self.write(slot, values);
        Ok(())
    }

    /// Append index by index to an existing value, padding the shorter side
    /// with empty strings.
    pub fn append(&mut self, name: char, values: Vec<String>) -> Result<(), RegisterError> {
        let slot = Self::check(name)?;
        if READ_ONLY.contains(&slot) {
            return Err(RegisterError::ReadOnly(name));
        }
        let merged = self.merged(slot, values);
        self.write(slot, merged);
        Ok(())
    }

    /// Store recorded keys. Same naming rules as `set`, but `"` is left alone.
    pub fn store_macro(&mut self, name: char, values: Vec<String>) -> Result<(), RegisterError> {
        let slot = Self::check(name)?;
        if READ_ONLY.contains(&slot) {
            return Err(RegisterError::ReadOnly(name));
        }
        let values = if name.is_ascii_uppercase() {
            self.merged(slot, values)
        } else {
            values
        };
        match slot {
            REG_BLACK_HOLE => {}
            REG_CLIPBOARD | REG_SYS_CLIPBOARD => self.clipboard.set(values),
            _ => {
                debug!(target: "registers", name = %slot, lines = values.len(), "macro_write");
                self.slots.insert(slot, values);
            }
        }
        Ok(())
    }

    fn merged(&self, slot: char, values: Vec<String>) -> Vec<String> {
        let existing = self.peek(slot).unwrap_or_default();
        let len = existing.len().max(values.len());
        (0..len)
            .map(|i| {
                let mut s = existing.get(i).cloned().unwrap_or_default();
                s.push_str(values.get(i).map(String::as_str).unwrap_or(""));
                s
            })
            .collect()
    }

    fn write(&mut self, slot: char, values: Vec<String>) {
        match slot {
            REG_BLACK_HOLE => {
                debug!(target: "registers", "black_hole_write");
                return;
            }
            REG_CLIPBOARD | REG_SYS_CLIPBOARD => self.clipboard.set(values.clone()),
            _ => {
                self.slots.insert(slot, values.clone());
            }
        }
        debug!(target: "registers", name = %slot, lines = values.len(), "register_write");
        if !matches!(slot, REG_UNNAMED | REG_EXPRESSION) {
            self.slots.insert(REG_UNNAMED, values);
        }
    }

    /// Host-side update of a read-only register (`%`, `#`, `.`, `:`).
    pub fn set_special(&mut self, name: char, values: Vec<String>) -> Result<(), RegisterError> {
        if !READ_ONLY.contains(&name) {
            return Err(RegisterError::Invalid(name));
        }
        debug!(target: "registers", name = %name, lines = values.len(), "special_write");
        self.slots.insert(name, values);
        Ok(())
    }

    /// Yank into `target`, or into `0` and `"` when no register was selected.
    pub fn record_yank(&mut self, target: char, values: Vec<String>) -> Result<(), RegisterError> {
        if target == REG_UNNAMED {
            self.write(REG_YANK, values);
            return Ok(());
        }
        self.set(target, values)
    }

    /// Record deleted text. Without an explicit register, multi-line deletes
    /// shift the numbered ring and small deletes go to `-`.
    pub fn record_delete(
        &mut self,
        target: char,
        values: Vec<String>,
        linewise: bool,
    ) -> Result<(), RegisterError> {
        if target != REG_UNNAMED {
            return self.set(target, values);
        }
        let multiline = linewise || values.iter().any(|v| v.contains('\n'));
        if multiline {
            self.unshift_numbered(values);
        } else {
            self.write(REG_SMALL_DELETE, values);
        }
        Ok(())
    }

    fn unshift_numbered(&mut self, values: Vec<String>) {
        for n in (1..Self::NUMBERED).rev() {
            let from = char::from(b'0' + n as u8);
            let to = char::from(b'0' + n as u8 + 1);
            match self.slots.remove(&from) {
                Some(v) => self.slots.insert(to, v),
                None => self.slots.remove(&to),
            };
        }
        self.write('1', values);
    }

    /// Non-empty registers in display order.
    pub fn snapshot(&self) -> Vec<(char, Vec<String>)> {
        DISPLAY_ORDER
            .chars()
            .filter_map(|c| self.peek(c).filter(|v| !v.is_empty()).map(|v| (c, v)))
            .collect()
    }

    pub fn clipboard_mut(&mut self) -> &mut dyn ClipboardProvider {
        self.clipboard.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lowercase_write_mirrors_unnamed() {
        let mut r = Registers::new();
        r.set('a', v(&["foo"])).unwrap();
        assert_eq!(r.get('a').unwrap(), Some(v(&["foo"])));
        assert_eq!(r.get('"').unwrap(), Some(v(&["foo"])));
    }

    #[test]
    fn uppercase_appends_zip_padded() {
        let mut r = Registers::new();
        r.set('a', v(&["x", "y"])).unwrap();
        r.set('A', v(&["1", "2", "3"])).unwrap();
        assert_eq!(r.get('a').unwrap(), Some(v(&["x1", "y2", "3"])));
        assert_eq!(r.get('"').unwrap(), Some(v(&["x1", "y2", "3"])));
    }

    #[test]
    fn macros_do_not_touch_unnamed() {
        let mut r = Registers::new();
        r.set('"', v(&["keep"])).unwrap();
        r.store_macro('q', v(&["dd"])).unwrap();
        r.store_macro('Q', v(&["j"])).unwrap();
        assert_eq!(r.peek('q'), Some(v(&["ddj"])));
        assert_eq!(r.peek('"'), Some(v(&["keep"])));
        assert!(r.store_macro('%', v(&["x"])).is_err());
    }

    #[test]
    fn black_hole_is_noop() {
        let mut r = Registers::new();
        r.set('"', v(&["keep"])).unwrap();
        r.set('_', v(&["gone"])).unwrap();
        assert_eq!(r.get('_').unwrap(), None);
        assert_eq!(r.get('"').unwrap(), Some(v(&["keep"])));
    }

    #[test]
    fn expression_register_is_consumed_by_unnamed_read() {
        let mut r = Registers::new();
        r.set('"', v(&["plain"])).unwrap();
        r.set('=', v(&["42"])).unwrap();
        assert_eq!(r.peek('"'), Some(v(&["plain"])));
        assert_eq!(r.get('"').unwrap(), Some(v(&["42"])));
        assert_eq!(r.get('"').unwrap(), Some(v(&["plain"])));
        assert_eq!(r.get('=').unwrap(), None);
    }

    #[test]
    fn read_only_and_invalid_names() {
        let mut r = Registers::new();
        assert_eq!(r.set('%', v(&["x"])), Err(RegisterError::ReadOnly('%')));
        assert_eq!(r.set('!', v(&["x"])), Err(RegisterError::Invalid('!')));
        r.set_special('%', v(&["main.rs"])).unwrap();
        assert_eq!(r.get('%').unwrap(), Some(v(&["main.rs"])));
    }

    #[test]
    fn clipboard_registers_use_provider() {
        let mut r = Registers::new();
        r.set('+', v(&["clip"])).unwrap();
        assert_eq!(r.get('*').unwrap(), Some(v(&["clip"])));
        assert_eq!(r.clipboard_mut().get(), Some(v(&["clip"])));
        assert_eq!(r.get('"').unwrap(), Some(v(&["clip"])));
    }

    #[test]
    fn yank_and_delete_routing() {
        let mut r = Registers::new();
        r.record_yank('"', v(&["yanked"])).unwrap();
        assert_eq!(r.peek('0'), Some(v(&["yanked"])));
        r.record_delete('"', v(&["word"]), false).unwrap();
        assert_eq!(r.peek('-'), Some(v(&["word"])));
        assert_eq!(r.peek('1'), None);
        r.record_delete('"', v(&["line one\n"]), true).unwrap();
        r.record_delete('"', v(&["line two\n"]), true).unwrap();
        assert_eq!(r.peek('1'), Some(v(&["line two\n"])));
        assert_eq!(r.peek('2'), Some(v(&["line one\n"])));
        assert_eq!(r.peek('0'), Some(v(&["yanked"])));
        assert_eq!(r.peek('"'), Some(v(&["line two\n"])));
    }

    #[test]
    fn numbered_ring_drops_oldest() {
        let mut r = Registers::new();
        for i in 0..12 {
            r.record_delete('"', vec![format!("{i}\n")], true).unwrap();
        }
        assert_eq!(r.peek('1'), Some(vec!["11\n".to_string()]));
        assert_eq!(r.peek('9'), Some(vec!["3\n".to_string()]));
    }

    #[test]
    fn named_delete_skips_ring() {
        let mut r = Registers::new();
        r.record_delete('a', v(&["x\n"]), true).unwrap();
        assert_eq!(r.peek('1'), None);
        assert_eq!(r.peek('a'), Some(v(&["x\n"])));
    }

    #[test]
    fn snapshot_lists_non_empty_in_order() {
        let mut r = Registers::new();
        r.set('b', v(&["B"])).unwrap();
        r.set('a', v(&["A"])).unwrap();
        let names: Vec<char> = r.snapshot().into_iter().map(|(c, _)| c).collect();
        assert_eq!(names, vec!['"', 'a', 'b']);
    }
}
