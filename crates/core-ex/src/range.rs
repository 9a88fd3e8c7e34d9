use serde::Serialize;
use tracing::debug;

use crate::address::{AddressRef, ExAddress, ExAddressParser};
use crate::error::{ExError, ExErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Separator {
    /// `,` keeps both addresses relative to the cursor.
    #[serde(rename = ",")]
    Comma,
    /// `;` moves the cursor to the left address before the right is evaluated.
    #[serde(rename = ";")]
    Semicolon,
}

impl Separator {
    pub fn as_char(self) -> char {
        match self {
            Separator::Comma => ',',
            Separator::Semicolon => ';',
        }
    }
}

/// Parsed `addr ( sep addr )?` prefix of an Ex command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExAddressRange {
    pub left: ExAddress,
    pub separator: Option<Separator>,
    pub right: ExAddress,
    /// The exact text the range was parsed from.
    pub raw_text: String,
}

impl ExAddressRange {
    /// No address was typed at all.
    pub fn is_empty(&self) -> bool {
        self.raw_text.is_empty()
    }

    /// `'<,'>` as inserted by `:` from Visual mode.
    pub fn is_visual_selection(&self) -> bool {
        self.left.reference == Some(AddressRef::Mark('<'))
            && self.right.reference == Some(AddressRef::Mark('>'))
            && self.left.offset.is_none()
            && self.right.offset.is_none()
            && self.left.search_offsets.is_empty()
            && self.right.search_offsets.is_empty()
    }
}

/// Splits a command line into its range and the remainder.
pub struct ExRangeParser;

impl ExRangeParser {
    /// Parse the range at the start of `line`; returns the range and the
    /// unparsed rest with leading whitespace removed.
    ///
    /// The rest must be empty or start with a command name, `&`, `!` or `|`.
    pub fn parse(line: &str) -> Result<(ExAddressRange, &str), ExError> {
        let mut parser = ExAddressParser::new(line);
        let left = parser.parse_address()?;
        let mut range = ExAddressRange {
            left,
            ..Default::default()
        };

        let separator = match parser.peek() {
            Some(',') => Some(Separator::Comma),
            Some(';') => Some(Separator::Semicolon),
            _ => None,
        };
        if let Some(sep) = separator {
            parser.bump();
            range.separator = Some(sep);
            range.right = parser.parse_address()?;
            if range.left.is_empty() {
                range.left.reference = Some(AddressRef::CurrentLine);
            }
            if range.right.is_empty() {
                range.right.reference = Some(AddressRef::CurrentLine);
            }
        }
        range.raw_text = line[..parser.position()].to_string();

        let rest = parser.rest().trim_start();
        match rest.chars().next() {
            None => {}
            Some(c) if c.is_ascii_alphabetic() || matches!(c, '&' | '!' | '|') => {}
            Some(_) => {
                return Err(ExError::with_token(ExErrorKind::UnknownCommand, line.trim()));
            }
        }
        debug!(target: "ex.range", raw = %range.raw_text, rest, "range_parsed");
        Ok((range, rest))
    }
}
