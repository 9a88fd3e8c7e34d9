use core_ex::ExTableError;
use core_input::KeyNotationError;
use core_keymap::KeymapError;
use core_state::{RegisterError, StateError};

/// Failures surfaced by `CommandStateMachine::feed` and session setup.
///
/// Every feed error leaves the machine idle in Normal mode.
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error(transparent)]
    Notation(#[from] KeyNotationError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Register(#[from] RegisterError),
    #[error("runnable command left in operator-pending mode")]
    RunnableInOperatorPending,
    #[error("recursive mapping exceeded depth {limit}")]
    MappingDepth { limit: u32 },
    #[error("macro replay exceeded depth {limit}")]
    MacroDepth { limit: u32 },
    #[error(transparent)]
    Keymap(#[from] KeymapError),
    #[error("mapping #{index} ('{lhs}'): {source}")]
    InvalidMapping {
        index: usize,
        lhs: String,
        #[source]
        source: KeymapError,
    },
    #[error(transparent)]
    ExTable(#[from] ExTableError),
    #[error("encoding command argument: {0}")]
    Payload(#[from] serde_json::Error),
}
