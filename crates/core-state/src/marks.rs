use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::StateError;

/// Saved cursor position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Mark {
    pub window_id: u64,
    pub view_id: u64,
    pub row: u32,
    pub col: u32,
}

/// Named marks plus the implicit "previous context" mark reachable as `'` and `` ` ``.
#[derive(Debug, Default, Clone)]
pub struct Marks {
    named: BTreeMap<char, Mark>,
    previous: Option<Mark>,
}

impl Marks {
    pub fn is_valid_name(name: char) -> bool {
        name.is_ascii_alphabetic() || "<>[]'`".contains(name)
    }

    fn is_previous(name: char) -> bool {
        matches!(name, '\'' | '`')
    }

    pub fn set(&mut self, name: char, mark: Mark) -> Result<(), StateError> {
        if !Self::is_valid_name(name) {
            return Err(StateError::InvalidMark(name));
        }
        debug!(target: "marks", name = %name, row = mark.row, col = mark.col, "mark_set");
        if Self::is_previous(name) {
            self.previous = Some(mark);
        } else {
            self.named.insert(name, mark);
        }
        Ok(())
    }

    pub fn get(&self, name: char) -> Option<Mark> {
        if Self::is_previous(name) {
            self.previous
        } else {
            self.named.get(&name).copied()
        }
    }

    /// Remember where the cursor was before a jump.
    pub fn set_previous_context(&mut self, mark: Mark) {
        self.previous = Some(mark);
    }

    pub fn remove(&mut self, name: char) -> Option<Mark> {
        if Self::is_previous(name) {
            self.previous.take()
        } else {
            self.named.remove(&name)
        }
    }

    /// All set marks, `'` first, then by name.
    pub fn list(&self) -> Vec<(char, Mark)> {
        self.previous
            .map(|m| ('\'', m))
            .into_iter()
            .chain(self.named.iter().map(|(c, m)| (*c, *m)))
            .collect()
    }
}
