use core_input::KeyNotationError;

#[derive(Debug, thiserror::Error)]
pub enum KeymapError {
    #[error("invalid key notation in {context}: {source}")]
    Notation {
        context: String,
        #[source]
        source: KeyNotationError,
    },
    #[error("unknown command name: {0}")]
    UnknownCommand(String),
    #[error("mapping lhs must not be empty")]
    EmptyLhs,
}
