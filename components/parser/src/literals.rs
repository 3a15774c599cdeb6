//! The literal pool.
//!
//! Every identifier, string, number, function and regexp the code
//! refers to becomes a record in the pool. Identifiers and strings
//! are deduplicated; numbers, functions and regexps are not. During
//! parsing, instructions address literals by their pool position; the
//! final grouped indices are computed by post processing.

use crate::lexer::{decode_ident, decode_string, LitLocation, LiteralKind};
use crate::parser::ParserContext;
use cbc::code::{CompiledCode, MAX_LITERALS};
use core_types::{ParseError, ParseErrorKind};

/// The literal is bound by a `var` declaration or is a function
/// argument.
pub(crate) const FLAG_VAR: u8 = 0x01;
/// The literal must not be stored in a register.
pub(crate) const FLAG_NO_REG_STORE: u8 = 0x02;
/// The literal is initialized when the function is entered.
pub(crate) const FLAG_INITIALIZED: u8 = 0x04;

/// Classification of an identifier for strict-mode checks and direct
/// eval detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdentClass {
    Any,
    Eval,
    Arguments,
}

/// Payload of a literal record.
#[derive(Debug)]
pub(crate) enum LiteralData {
    Bytes(Vec<u8>),
    Number(f64),
    /// Compiled sub-function; `None` while the function is being
    /// compiled.
    Function(Option<Box<CompiledCode>>),
}

/// One literal record.
#[derive(Debug)]
pub(crate) struct Literal {
    pub kind: LiteralKind,
    pub flags: u8,
    /// Final literal index, computed by post processing.
    pub index: u16,
    /// For function declarations: pool position of the name literal.
    pub name_index: Option<u16>,
    pub data: LiteralData,
}

impl Literal {
    pub(crate) fn bytes(&self) -> &[u8] {
        match &self.data {
            LiteralData::Bytes(bytes) => bytes,
            _ => &[],
        }
    }
}

/// The pool itself: append-only list of records.
#[derive(Debug, Default)]
pub(crate) struct LiteralPool {
    pub items: Vec<Literal>,
}

impl LiteralPool {
    pub(crate) fn count(&self) -> u16 {
        self.items.len() as u16
    }

    pub(crate) fn get(&self, index: u16) -> &Literal {
        &self.items[index as usize]
    }

    pub(crate) fn get_mut(&mut self, index: u16) -> &mut Literal {
        &mut self.items[index as usize]
    }

    /// Find an existing ident/string record with the same contents.
    fn find(&self, kind: LiteralKind, bytes: &[u8]) -> Option<u16> {
        self.items
            .iter()
            .position(|item| item.kind == kind && item.bytes() == bytes)
            .map(|position| position as u16)
    }
}

/// The most recently constructed literal record, used by the emitter
/// for operand bookkeeping.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LitObject {
    pub index: u16,
    pub class: IdentClass,
}

fn classify_ident(bytes: &[u8]) -> IdentClass {
    match bytes {
        b"eval" => IdentClass::Eval,
        b"arguments" => IdentClass::Arguments,
        _ => IdentClass::Any,
    }
}

/// Numeric value of a validated number literal.
fn parse_number_value(bytes: &[u8]) -> f64 {
    if bytes.len() > 2 && bytes[0] == b'0' && (bytes[1] | 0x20) == b'x' {
        return bytes[2..].iter().fold(0.0, |value, &byte| {
            let digit = match byte {
                b'0'..=b'9' => byte - b'0',
                b'a'..=b'f' => byte - b'a' + 10,
                _ => byte - b'A' + 10,
            };
            value * 16.0 + digit as f64
        });
    }
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.parse().ok())
        .unwrap_or(f64::NAN)
}

impl<'a> ParserContext<'a> {
    /// Construct (or find) the literal record for an identifier or
    /// string token and remember it in `lit_object`.
    pub(crate) fn construct_literal_object(
        &mut self,
        lit: LitLocation,
        as_kind: LiteralKind,
    ) -> Result<(), ParseError> {
        let bytes = match lit.kind {
            LiteralKind::Ident => decode_ident(self.source, &lit),
            _ => decode_string(self.source, &lit),
        };

        let class = if lit.kind == LiteralKind::Ident {
            classify_ident(&bytes)
        } else {
            IdentClass::Any
        };

        let index = match self.literal_pool.find(as_kind, &bytes) {
            Some(index) => index,
            None => {
                if self.literal_pool.count() >= MAX_LITERALS {
                    return Err(self.error(ParseErrorKind::LiteralLimitReached));
                }
                self.literal_pool.items.push(Literal {
                    kind: as_kind,
                    flags: 0,
                    index: 0,
                    name_index: None,
                    data: LiteralData::Bytes(bytes),
                });
                self.literal_pool.count() - 1
            }
        };

        if lit.kind == LiteralKind::Ident && self.in_with() {
            self.literal_pool.get_mut(index).flags |= FLAG_NO_REG_STORE;
        }

        self.lit_object = LitObject { index, class };
        Ok(())
    }

    /// Construct the literal record for the current number token.
    /// Numbers are never deduplicated.
    pub(crate) fn construct_number_object(&mut self) -> Result<(), ParseError> {
        if self.literal_pool.count() >= MAX_LITERALS {
            return Err(self.error(ParseErrorKind::LiteralLimitReached));
        }

        let value = parse_number_value(&self.source[self.token.lit.start..self.token.lit.end]);
        self.literal_pool.items.push(Literal {
            kind: LiteralKind::Number,
            flags: 0,
            index: 0,
            name_index: None,
            data: LiteralData::Number(value),
        });

        self.lit_object = LitObject {
            index: self.literal_pool.count() - 1,
            class: IdentClass::Any,
        };
        Ok(())
    }

    /// Append a regexp literal record covering the given source range.
    pub(crate) fn append_regexp_literal(
        &mut self,
        start: usize,
        end: usize,
    ) -> Result<u16, ParseError> {
        if self.literal_pool.count() >= MAX_LITERALS {
            return Err(self.error(ParseErrorKind::LiteralLimitReached));
        }
        self.literal_pool.items.push(Literal {
            kind: LiteralKind::Regexp,
            flags: 0,
            index: 0,
            name_index: None,
            data: LiteralData::Bytes(self.source[start..end].to_vec()),
        });
        Ok(self.literal_pool.count() - 1)
    }

    /// Compile a nested function and append it to the pool.
    ///
    /// For function declarations `name_index` is the pool position of
    /// the hoisted name; post processing emits the initializer for it.
    /// Compiling any closure forces the enclosing function's variables
    /// out of registers.
    pub(crate) fn construct_function_object(
        &mut self,
        name_index: Option<u16>,
        extra_status_flags: u32,
    ) -> Result<(), ParseError> {
        if self.literal_pool.count() >= MAX_LITERALS {
            return Err(self.error(ParseErrorKind::LiteralLimitReached));
        }

        self.literal_pool.items.push(Literal {
            kind: LiteralKind::Function,
            flags: 0,
            index: 0,
            name_index,
            data: LiteralData::Function(None),
        });
        let position = self.literal_pool.count() - 1;

        let compiled = self.parse_function(extra_status_flags)?;
        self.literal_pool.get_mut(position).data =
            LiteralData::Function(Some(Box::new(compiled)));

        self.set_no_reg_store();
        Ok(())
    }

    /// Set `lit_object` to a plain (non-identifier) literal index.
    pub(crate) fn set_lit_object_plain(&mut self, index: u16) {
        self.lit_object = LitObject {
            index,
            class: IdentClass::Any,
        };
    }

    /// The strict-mode error for the last constructed identifier, when
    /// it is `eval` or `arguments`.
    pub(crate) fn lit_object_strict_error(&self) -> Option<ParseErrorKind> {
        match self.lit_object.class {
            IdentClass::Eval => Some(ParseErrorKind::EvalNotAllowed),
            IdentClass::Arguments => Some(ParseErrorKind::ArgumentsNotAllowed),
            IdentClass::Any => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_value() {
        assert_eq!(parse_number_value(b"42"), 42.0);
        assert_eq!(parse_number_value(b"3.5"), 3.5);
        assert_eq!(parse_number_value(b"1e3"), 1000.0);
        assert_eq!(parse_number_value(b"0x1f"), 31.0);
        assert_eq!(parse_number_value(b"0xFF"), 255.0);
    }

    #[test]
    fn test_classify_ident() {
        assert_eq!(classify_ident(b"eval"), IdentClass::Eval);
        assert_eq!(classify_ident(b"arguments"), IdentClass::Arguments);
        assert_eq!(classify_ident(b"x"), IdentClass::Any);
    }

    #[test]
    fn test_pool_dedup() {
        let mut pool = LiteralPool::default();
        pool.items.push(Literal {
            kind: LiteralKind::Ident,
            flags: 0,
            index: 0,
            name_index: None,
            data: LiteralData::Bytes(b"x".to_vec()),
        });
        assert_eq!(pool.find(LiteralKind::Ident, b"x"), Some(0));
        assert_eq!(pool.find(LiteralKind::String, b"x"), None);
        assert_eq!(pool.find(LiteralKind::Ident, b"y"), None);
    }
}
