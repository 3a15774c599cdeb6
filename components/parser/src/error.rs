//! Parser error helpers.

use core_types::{ParseError, ParseErrorKind};

/// Create a parse error at a given token position.
pub fn parse_error(kind: ParseErrorKind, line: u32, column: u32) -> ParseError {
    ParseError { kind, line, column }
}
