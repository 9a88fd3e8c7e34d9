//! Turning a parsed range into concrete line numbers.
//!
//! Lines are 1-based; line 0 is accepted as "before the first line".

use serde::Serialize;
use tracing::trace;

use crate::address::{AddressRef, ExAddress, SearchDirection};
use crate::error::{ExError, ExErrorKind};
use crate::range::{ExAddressRange, Separator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    pub start: u32,
    pub end: u32,
}

impl LineSpan {
    pub fn line(line: u32) -> Self {
        Self {
            start: line,
            end: line,
        }
    }
}

/// What the host knows about the buffer a range is evaluated against.
pub trait LineContext {
    fn current_line(&self) -> u32;
    fn line_count(&self) -> u32;
    fn mark_line(&self, mark: char) -> Option<u32>;
    /// First line after (or before) `from` matching `pattern`, wrapping.
    fn search(&self, direction: SearchDirection, pattern: &str, from: u32) -> Option<u32>;
    fn last_search_pattern(&self) -> Option<String>;
    /// Line spans of the current (or last) Visual selections.
    fn selections(&self) -> Vec<LineSpan>;
}

fn resolve_address(
    address: &ExAddress,
    base: u32,
    ctx: &dyn LineContext,
) -> Result<u32, ExError> {
    let mut line = match address.reference {
        Some(AddressRef::CurrentLine) => i64::from(base),
        Some(AddressRef::LastLine) => i64::from(ctx.line_count()),
        Some(AddressRef::Mark(c)) => match ctx.mark_line(c) {
            Some(l) => i64::from(l),
            None => return Err(ExError::with_token(ExErrorKind::MarkNotSet, c.to_string())),
        },
        Some(AddressRef::WholeFile) => {
            return Err(ExError::with_token(ExErrorKind::InvalidRange, "%"));
        }
        None if address.offset.is_some() => 0,
        None => i64::from(base),
    };
    line = line.saturating_add(address.offset.unwrap_or(0));

    for search in &address.search_offsets {
        let pattern = if search.pattern.is_empty() {
            ctx.last_search_pattern()
                .ok_or_else(|| ExError::new(ExErrorKind::NoPreviousRegex))?
        } else {
            search.pattern.clone()
        };
        let from = clamp_line(line, ctx)?;
        let found = ctx
            .search(search.direction, &pattern, from)
            .ok_or_else(|| ExError::with_token(ExErrorKind::PatternNotFound, pattern.clone()))?;
        line = i64::from(found).saturating_add(search.offset);
    }
    clamp_line(line, ctx)
}

fn clamp_line(line: i64, ctx: &dyn LineContext) -> Result<u32, ExError> {
    if line < 0 || line > i64::from(ctx.line_count()) {
        return Err(ExError::new(ExErrorKind::InvalidRange));
    }
    Ok(line as u32)
}

impl ExAddressRange {
    /// Evaluate the range. An empty range is the current line; `'<,'>`
    /// yields one span per selection.
    pub fn resolve(&self, ctx: &dyn LineContext) -> Result<Vec<LineSpan>, ExError> {
        let current = ctx.current_line();
        if self.is_empty() {
            return Ok(vec![LineSpan::line(current)]);
        }
        if self.is_visual_selection() {
            let spans = ctx.selections();
            if spans.is_empty() {
                return Err(ExError::with_token(ExErrorKind::MarkNotSet, "<"));
            }
            return Ok(spans);
        }
        if self.separator.is_none() && self.left.reference == Some(AddressRef::WholeFile) {
            let count = ctx.line_count();
            return Ok(vec![LineSpan {
                start: count.min(1),
                end: count,
            }]);
        }

        let start = resolve_address(&self.left, current, ctx)?;
        let end = match self.separator {
            None => start,
            Some(Separator::Comma) => resolve_address(&self.right, current, ctx)?,
            Some(Separator::Semicolon) => resolve_address(&self.right, start, ctx)?,
        };
        if end < start {
            return Err(ExError::new(ExErrorKind::BackwardsRange));
        }
        trace!(target: "ex.range", raw = %self.raw_text, start, end, "range_resolved");
        Ok(vec![LineSpan { start, end }])
    }
}
