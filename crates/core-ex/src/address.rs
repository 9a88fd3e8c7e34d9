//! Single Ex line address: `ref? offset* search_offset*`.
//!
//! * `ref` is `.`, `$`, `%` or `'x` (`x` alphabetic, `<` or `>`).
//! * `offset` is a run of signed or unsigned numbers; a bare sign counts as 1
//!   (`++` is +2, `+-101` is -100, `99+` is 100).
//! * `search_offset` is `/pat/` or `?pat?` followed by an optional offset run.
//!   Inside the pattern `\` escapes the delimiter and itself; any other `\x`
//!   decays to `x`. End of input closes an open pattern.
//!
//! An address that starts with a sign and has no ref is relative to `.`;
//! one that starts with a digit is absolute.

use serde::Serialize;
use tracing::trace;

use crate::error::{ExError, ExErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "mark")]
pub enum AddressRef {
    CurrentLine,
    LastLine,
    WholeFile,
    Mark(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchDirection {
    Forward,
    Backward,
}

impl SearchDirection {
    pub fn delimiter(self) -> char {
        match self {
            SearchDirection::Forward => '/',
            SearchDirection::Backward => '?',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOffset {
    pub direction: SearchDirection,
    pub pattern: String,
    pub offset: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExAddress {
    pub reference: Option<AddressRef>,
    pub offset: Option<i64>,
    pub search_offsets: Vec<SearchOffset>,
}

impl ExAddress {
    /// Neither a ref nor any offset was given.
    pub fn is_empty(&self) -> bool {
        self.reference.is_none() && self.offset.is_none() && self.search_offsets.is_empty()
    }
}

fn syntax_error(token: &str) -> ExError {
    ExError::with_token(ExErrorKind::UnknownCommand, token)
}

/// Cursor over a command line that parses address terms.
#[derive(Debug, Clone)]
pub struct ExAddressParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> ExAddressParser<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Byte offset of the next unconsumed character.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub(crate) fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn digits(&mut self) -> Option<i64> {
        let run = self.rest().bytes().take_while(u8::is_ascii_digit).count();
        if run == 0 {
            return None;
        }
        let text = &self.rest()[..run];
        self.pos += run;
        Some(text.parse().unwrap_or(i64::MAX))
    }

    fn offset_run(&mut self) -> Option<i64> {
        let mut total: Option<i64> = None;
        loop {
            let step = match self.peek() {
                Some(sign @ ('+' | '-')) => {
                    self.bump();
                    let n = self.digits().unwrap_or(1);
                    if sign == '+' { n } else { -n }
                }
                Some(c) if c.is_ascii_digit() => self.digits().unwrap_or(0),
                _ => break,
            };
            total = Some(total.unwrap_or(0).saturating_add(step));
        }
        total
    }

    fn search_offset(&mut self, direction: SearchDirection) -> SearchOffset {
        let delim = direction.delimiter();
        let mut pattern = String::new();
        while let Some(c) = self.bump() {
            match c {
                '\\' => {
                    if let Some(escaped) = self.bump() {
                        pattern.push(escaped);
                    }
                }
                c if c == delim => break,
                c => pattern.push(c),
            }
        }
        let offset = self.offset_run().unwrap_or(0);
        SearchOffset {
            direction,
            pattern,
            offset,
        }
    }

    /// Parse one address term starting at the current position.
    pub fn parse_address(&mut self) -> Result<ExAddress, ExError> {
        let start = self.pos;
        let mut address = ExAddress::default();
        match self.peek() {
            Some('.') => {
                self.bump();
                address.reference = Some(AddressRef::CurrentLine);
            }
            Some('$') => {
                self.bump();
                address.reference = Some(AddressRef::LastLine);
            }
            Some('%') => {
                self.bump();
                if matches!(self.peek(), Some(c) if "+-/?".contains(c) || c.is_ascii_digit()) {
                    return Err(syntax_error(&self.src[start..]));
                }
                address.reference = Some(AddressRef::WholeFile);
                trace!(target: "ex.range", raw = "%", "address");
                return Ok(address);
            }
            Some('\'') => {
                self.bump();
                match self.bump() {
                    Some(c) if c.is_ascii_alphabetic() || c == '<' || c == '>' => {
                        address.reference = Some(AddressRef::Mark(c));
                    }
                    _ => return Err(syntax_error(&self.src[start..])),
                }
            }
            _ => {}
        }

        let signed_start = matches!(self.peek(), Some('+' | '-'));
        address.offset = self.offset_run();
        if address.reference.is_none() && signed_start {
            address.reference = Some(AddressRef::CurrentLine);
        }

        while let Some(c @ ('/' | '?')) = self.peek() {
            self.bump();
            let direction = if c == '/' {
                SearchDirection::Forward
            } else {
                SearchDirection::Backward
            };
            let search = self.search_offset(direction);
            address.search_offsets.push(search);
        }
        trace!(target: "ex.range", raw = &self.src[start..self.pos], "address");
        Ok(address)
    }
}

/// Parse a whole string as one address, failing if anything is left over.
pub fn parse_address(src: &str) -> Result<ExAddress, ExError> {
    let mut parser = ExAddressParser::new(src);
    let address = parser.parse_address()?;
    if parser.rest().is_empty() {
        Ok(address)
    } else {
        Err(syntax_error(parser.rest()))
    }
}
