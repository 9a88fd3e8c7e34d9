//! core-state: the mutable pieces of an input session.
//!
//! `InputState` is per view; `Registers` and `Marks` are shared by every view
//! of a session and owned by it (no globals).

mod input_state;
pub mod marks;
pub mod registers;

pub use input_state::{
    InputSlot, InputState, MAX_COUNT, PendingInput, RepeatData, RepeatKind, VisualRepeatInfo,
};
pub use marks::{Mark, Marks};
pub use registers::{ClipboardProvider, MemoryClipboard, RegisterError, Registers};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("invalid count: '{0}'")]
    InvalidCount(String),
    #[error("an action is already set ({existing}), cannot add {new}")]
    TooManyActions {
        existing: &'static str,
        new: &'static str,
    },
    #[error("a motion is already set ({existing}), cannot add {new}")]
    TooManyMotions {
        existing: &'static str,
        new: &'static str,
    },
    #[error("invalid mark name: '{0}'")]
    InvalidMark(char),
    #[error(transparent)]
    Register(RegisterError),
}
