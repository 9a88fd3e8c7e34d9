use std::fmt;

/// Ex error kinds, numbered like the editor's own messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    AddressRequired,
    InvalidRange,
    MarkNotSet,
    NoSuchMapping,
    NoPreviousRegex,
    Unsaved,
    ArgumentRequired,
    InvalidArgument,
    NoBangAllowed,
    NoRangeAllowed,
    PatternNotFound,
    TrailingCharacters,
    UnknownCommand,
    BackwardsRange,
}

impl ExErrorKind {
    pub fn code(self) -> u16 {
        match self {
            ExErrorKind::AddressRequired => 14,
            ExErrorKind::InvalidRange => 16,
            ExErrorKind::MarkNotSet => 20,
            ExErrorKind::NoSuchMapping => 31,
            ExErrorKind::NoPreviousRegex => 35,
            ExErrorKind::Unsaved => 37,
            ExErrorKind::ArgumentRequired => 471,
            ExErrorKind::InvalidArgument => 474,
            ExErrorKind::NoBangAllowed => 477,
            ExErrorKind::NoRangeAllowed => 481,
            ExErrorKind::PatternNotFound => 486,
            ExErrorKind::TrailingCharacters => 488,
            ExErrorKind::UnknownCommand => 492,
            ExErrorKind::BackwardsRange => 493,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ExErrorKind::AddressRequired => "Invalid address",
            ExErrorKind::InvalidRange => "Invalid range",
            ExErrorKind::MarkNotSet => "Mark not set",
            ExErrorKind::NoSuchMapping => "No such mapping",
            ExErrorKind::NoPreviousRegex => "No previous regular expression",
            ExErrorKind::Unsaved => "No write since last change (add ! to override)",
            ExErrorKind::ArgumentRequired => "Argument required",
            ExErrorKind::InvalidArgument => "Invalid argument",
            ExErrorKind::NoBangAllowed => "No ! allowed",
            ExErrorKind::NoRangeAllowed => "No range allowed",
            ExErrorKind::PatternNotFound => "Pattern not found",
            ExErrorKind::TrailingCharacters => "Trailing characters",
            ExErrorKind::UnknownCommand => "Not an editor command",
            ExErrorKind::BackwardsRange => "Backwards range given",
        }
    }
}

/// An Ex error with the offending token, rendered as `E<code>: <message>[: <token>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExError {
    pub kind: ExErrorKind,
    pub token: Option<String>,
}

impl ExError {
    pub fn new(kind: ExErrorKind) -> Self {
        Self { kind, token: None }
    }

    pub fn with_token(kind: ExErrorKind, token: impl Into<String>) -> Self {
        Self {
            kind,
            token: Some(token.into()),
        }
    }

    pub fn code(&self) -> u16 {
        self.kind.code()
    }
}

impl fmt::Display for ExError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}: {}", self.kind.code(), self.kind.message())?;
        if let Some(token) = &self.token {
            write!(f, ": {token}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_code_message_and_token() {
        let err = ExError::with_token(ExErrorKind::UnknownCommand, "foo");
        assert_eq!(err.to_string(), "E492: Not an editor command: foo");
        assert_eq!(ExError::new(ExErrorKind::NoBangAllowed).to_string(), "E477: No ! allowed");
    }

    #[test]
    fn address_required_and_out_of_bounds_are_distinct() {
        assert_ne!(
            ExErrorKind::AddressRequired.code(),
            ExErrorKind::InvalidRange.code()
        );
    }
}
