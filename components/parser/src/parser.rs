//! The parser context and compilation driver.
//!
//! One `ParserContext` exists per compilation. It owns the lexer
//! cursor, the statement stack, the byte-code buffer and the literal
//! pool; nested functions save and restore the per-function parts
//! around their own compilation. After the statement pass, post
//! processing computes the final literal indices, emits the variable
//! initializer prefix, relocates the instruction stream to its final
//! operand encoding and assembles the compiled-code blob.

use crate::emit::LastOpcode;
use crate::error::parse_error;
use crate::lexer::{LiteralKind, SourceRange, Token, TokenType};
use crate::literals::{
    IdentClass, LitObject, Literal, LiteralData, LiteralPool, FLAG_INITIALIZED,
    FLAG_NO_REG_STORE, FLAG_VAR,
};
use crate::stack::StatementStack;
use cbc::code::{
    status_flags, CompiledCode, LiteralEncoding, MAX_CODE_SIZE, MAX_REGISTERS,
    MAX_SMALL_ENCODING_LITERALS, MAX_STACK_LIMIT,
};
use cbc::opcode::{flags, CbcOp, ExtOpcode, Opcode};
use cbc::value::Value;
use core_types::{ParseError, ParseErrorKind};

/// The code is compiled in strict mode.
pub(crate) const IS_STRICT: u32 = 0x1;
/// The code is a function body.
pub(crate) const IS_FUNCTION: u32 = 0x2;
/// The code is a nested function whose `}` ends the body.
pub(crate) const IS_CLOSURE: u32 = 0x4;
/// The code is a function expression.
pub(crate) const IS_FUNC_EXPRESSION: u32 = 0x8;
/// The code is a property getter.
pub(crate) const IS_PROPERTY_GETTER: u32 = 0x10;
/// The code is a property setter.
pub(crate) const IS_PROPERTY_SETTER: u32 = 0x20;
/// An argument is named `eval` or `arguments`, or arguments are
/// duplicated; forbidden in strict mode.
pub(crate) const HAS_NON_STRICT_ARG: u32 = 0x40;
/// A with statement is open.
pub(crate) const IN_WITH: u32 = 0x80;
/// Variables must not be stored in registers.
pub(crate) const NO_REG_STORE: u32 = 0x100;

/// What kind of code a source buffer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A whole script.
    Global,
    /// Code compiled by `eval`.
    Eval,
    /// The body of a function (without the surrounding braces).
    FunctionBody,
}

/// Compilation state, one per invocation.
pub(crate) struct ParserContext<'a> {
    /// Source bytes.
    pub(crate) source: &'a [u8],
    /// Cursor into `source`.
    pub(crate) cursor: usize,
    /// End of the currently parsed region; ranges recorded by the
    /// pre-scanner temporarily shrink it.
    pub(crate) end: usize,
    pub(crate) line: u32,
    pub(crate) column: u32,
    /// The current token.
    pub(crate) token: Token,
    /// Real token type behind a synthetic `ExpressionStart`.
    pub(crate) stashed_token_kind: TokenType,
    /// The most recently constructed literal.
    pub(crate) lit_object: LitObject,
    pub(crate) status_flags: u32,
    /// Nominal value-stack depth of the emitted code.
    pub(crate) stack_depth: i32,
    /// High-water mark of `stack_depth`.
    pub(crate) stack_limit: i32,
    /// Depth contributed by with/for-in/try contexts; must equal
    /// `stack_depth` at every statement boundary.
    pub(crate) context_stack_depth: i32,
    pub(crate) argument_count: u16,
    pub(crate) register_count: u16,
    pub(crate) literal_pool: LiteralPool,
    /// Parse-time instruction stream.
    pub(crate) byte_code: Vec<u8>,
    /// The pending instruction of the emitter.
    pub(crate) last_cbc: Option<LastOpcode>,
    /// Open statements.
    pub(crate) stack: StatementStack,
}

/// Saved per-function parts of the context, restored after a nested
/// function is compiled.
struct SavedFunctionState {
    status_flags: u32,
    stack_depth: i32,
    stack_limit: i32,
    context_stack_depth: i32,
    argument_count: u16,
    register_count: u16,
    literal_pool: LiteralPool,
    byte_code: Vec<u8>,
    last_cbc: Option<LastOpcode>,
    stack: StatementStack,
}

impl<'a> ParserContext<'a> {
    pub(crate) fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            cursor: 0,
            end: source.len(),
            line: 1,
            column: 1,
            token: Token::start(),
            stashed_token_kind: TokenType::Eos,
            lit_object: LitObject {
                index: 0,
                class: IdentClass::Any,
            },
            status_flags: 0,
            stack_depth: 0,
            stack_limit: 0,
            context_stack_depth: 0,
            argument_count: 0,
            register_count: 0,
            literal_pool: LiteralPool::default(),
            byte_code: Vec::new(),
            last_cbc: None,
            stack: StatementStack::default(),
        }
    }

    /// A parse error pinned to the current token.
    pub(crate) fn error(&self, kind: ParseErrorKind) -> ParseError {
        parse_error(kind, self.token.line, self.token.column)
    }

    pub(crate) fn is_strict(&self) -> bool {
        self.status_flags & IS_STRICT != 0
    }

    pub(crate) fn set_strict(&mut self) {
        self.status_flags |= IS_STRICT;
    }

    pub(crate) fn is_function(&self) -> bool {
        self.status_flags & IS_FUNCTION != 0
    }

    pub(crate) fn is_closure(&self) -> bool {
        self.status_flags & IS_CLOSURE != 0
    }

    pub(crate) fn in_with(&self) -> bool {
        self.status_flags & IN_WITH != 0
    }

    pub(crate) fn set_in_with(&mut self) {
        self.status_flags |= IN_WITH;
    }

    pub(crate) fn clear_in_with(&mut self) {
        self.status_flags &= !IN_WITH;
    }

    pub(crate) fn set_no_reg_store(&mut self) {
        self.status_flags |= NO_REG_STORE;
    }

    pub(crate) fn has_non_strict_arg(&self) -> bool {
        self.status_flags & HAS_NON_STRICT_ARG != 0
    }

    /// Record the current position together with an explicit region
    /// end.
    pub(crate) fn save_range(&self, end: usize) -> SourceRange {
        SourceRange {
            start: self.cursor,
            end,
            line: self.line,
            column: self.column,
        }
    }

    /// Re-enter a recorded region.
    pub(crate) fn set_range(&mut self, range: &SourceRange) {
        self.cursor = range.start;
        self.end = range.end;
        self.line = range.line;
        self.column = range.column;
    }

    /// Compile a nested function. The private parts of the context
    /// are saved, reset for the function, and restored afterwards.
    pub(crate) fn parse_function(
        &mut self,
        extra_status_flags: u32,
    ) -> Result<CompiledCode, ParseError> {
        debug_assert!(self.last_cbc.is_none());
        debug_assert!(extra_status_flags & IS_FUNCTION != 0);

        let saved = SavedFunctionState {
            status_flags: self.status_flags,
            stack_depth: self.stack_depth,
            stack_limit: self.stack_limit,
            context_stack_depth: self.context_stack_depth,
            argument_count: self.argument_count,
            register_count: self.register_count,
            literal_pool: std::mem::take(&mut self.literal_pool),
            byte_code: std::mem::take(&mut self.byte_code),
            last_cbc: self.last_cbc.take(),
            stack: std::mem::take(&mut self.stack),
        };

        // Strict mode is inherited; everything else starts fresh.
        self.status_flags = (saved.status_flags & IS_STRICT) | extra_status_flags;
        self.stack_depth = 0;
        self.stack_limit = 0;
        self.context_stack_depth = 0;
        self.argument_count = 0;
        self.register_count = 0;

        let result = self.parse_function_inner();

        self.status_flags = saved.status_flags;
        self.stack_depth = saved.stack_depth;
        self.stack_limit = saved.stack_limit;
        self.context_stack_depth = saved.context_stack_depth;
        self.argument_count = saved.argument_count;
        self.register_count = saved.register_count;
        self.literal_pool = saved.literal_pool;
        self.byte_code = saved.byte_code;
        self.last_cbc = saved.last_cbc;
        self.stack = saved.stack;

        result
    }

    fn parse_function_inner(&mut self) -> Result<CompiledCode, ParseError> {
        self.next_token()?;

        if self.status_flags & IS_FUNC_EXPRESSION != 0
            && self.token.kind == TokenType::Literal
            && self.token.lit.kind == LiteralKind::Ident
        {
            // TODO: bind the name of a named function expression in
            // its own scope.
            self.next_token()?;
        }

        if self.token.kind != TokenType::LeftParen {
            return Err(self.error(ParseErrorKind::ArgumentListExpected));
        }

        self.next_token()?;

        if self.token.kind != TokenType::RightParen {
            loop {
                let literal_count = self.literal_pool.count();

                if self.token.kind != TokenType::Literal
                    || self.token.lit.kind != LiteralKind::Ident
                {
                    return Err(self.error(ParseErrorKind::IdentifierExpected));
                }

                self.construct_literal_object(self.token.lit, LiteralKind::Ident)?;

                if self.token.is_reserved || self.lit_object.class != IdentClass::Any {
                    self.status_flags |= HAS_NON_STRICT_ARG;
                }

                self.literal_pool.get_mut(self.lit_object.index).flags = FLAG_VAR;

                if literal_count == self.literal_pool.count() {
                    // Duplicated argument name: the name moves to a
                    // fresh record, so the later position wins.
                    let data = {
                        let old = self.literal_pool.get_mut(self.lit_object.index);
                        std::mem::replace(&mut old.data, LiteralData::Bytes(Vec::new()))
                    };
                    self.literal_pool.items.push(Literal {
                        kind: LiteralKind::Ident,
                        flags: FLAG_VAR,
                        index: 0,
                        name_index: None,
                        data,
                    });
                    self.status_flags |= HAS_NON_STRICT_ARG;
                }

                if literal_count >= MAX_REGISTERS {
                    return Err(self.error(ParseErrorKind::RegisterLimitReached));
                }

                self.next_token()?;

                if self.token.kind != TokenType::Comma {
                    break;
                }

                self.next_token()?;
            }
        }

        if self.token.kind != TokenType::RightParen {
            return Err(self.error(ParseErrorKind::RightParenExpected));
        }

        self.next_token()?;

        self.register_count = self.literal_pool.count();
        self.argument_count = self.literal_pool.count();

        if self.status_flags & IS_PROPERTY_GETTER != 0 && self.argument_count != 0 {
            return Err(self.error(ParseErrorKind::NoArgumentsExpected));
        }
        if self.status_flags & IS_PROPERTY_SETTER != 0 && self.argument_count != 1 {
            return Err(self.error(ParseErrorKind::OneArgumentExpected));
        }

        if self.token.kind != TokenType::LeftBrace {
            return Err(self.error(ParseErrorKind::LeftBraceExpected));
        }

        self.next_token()?;
        self.parse_statements()?;
        self.post_processing()
    }

    /// Compute the final literal indices.
    ///
    /// The index groups, in order: arguments, register-stored
    /// variables, hoisted variables (uninitialized, then initialized),
    /// plain identifiers, strings and numbers, then functions and
    /// regexps. Returns `(register_end, uninitialized_var_end,
    /// ident_end)`.
    fn compute_literal_indices(&mut self) -> (u16, u16, u16) {
        let no_reg_store = self.status_flags & NO_REG_STORE != 0;
        let argument_count = self.argument_count;

        let mut register_count = self.register_count;
        let mut uninitialized_var_count = 0u16;
        let mut initialized_var_count = 0u16;
        let mut ident_count = 0u16;
        let mut const_literal_count = 0u16;

        for (position, literal) in self.literal_pool.items.iter_mut().enumerate() {
            match literal.kind {
                LiteralKind::Ident => {
                    if literal.flags & FLAG_VAR != 0 {
                        if no_reg_store {
                            literal.flags |= FLAG_NO_REG_STORE;
                        }

                        if (position as u16) < argument_count {
                            // Arguments keep their position.
                        } else if literal.flags & FLAG_NO_REG_STORE == 0
                            && register_count < MAX_REGISTERS
                        {
                            register_count += 1;
                        } else if literal.flags & FLAG_INITIALIZED != 0 {
                            initialized_var_count += 1;
                        } else {
                            uninitialized_var_count += 1;
                        }
                    } else {
                        ident_count += 1;
                    }
                }
                LiteralKind::String | LiteralKind::Number => const_literal_count += 1,
                LiteralKind::Function | LiteralKind::Regexp => {}
            }
        }

        let register_end = register_count;
        let uninitialized_var_end = register_end + uninitialized_var_count;
        let initialized_var_end = uninitialized_var_end + initialized_var_count;
        let ident_end = initialized_var_end + ident_count;
        let const_literal_end = ident_end + const_literal_count;

        let mut register_index = self.register_count;
        let mut uninitialized_var_index = register_end;
        let mut initialized_var_index = uninitialized_var_end;
        let mut ident_index = initialized_var_end;
        let mut const_literal_index = ident_end;
        let mut literal_index = const_literal_end;

        for (position, literal) in self.literal_pool.items.iter_mut().enumerate() {
            match literal.kind {
                LiteralKind::Ident => {
                    if literal.flags & FLAG_VAR != 0 {
                        if (position as u16) < argument_count {
                            literal.index = position as u16;
                        } else if literal.flags & FLAG_NO_REG_STORE == 0
                            && register_index < MAX_REGISTERS
                        {
                            literal.index = register_index;
                            register_index += 1;
                        } else if literal.flags & FLAG_INITIALIZED != 0 {
                            literal.index = initialized_var_index;
                            initialized_var_index += 1;
                        } else {
                            literal.index = uninitialized_var_index;
                            uninitialized_var_index += 1;
                        }
                    } else {
                        literal.index = ident_index;
                        ident_index += 1;
                    }
                }
                LiteralKind::String | LiteralKind::Number => {
                    literal.index = const_literal_index;
                    const_literal_index += 1;
                }
                LiteralKind::Function | LiteralKind::Regexp => {
                    literal.index = literal_index;
                    literal_index += 1;
                }
            }
        }

        debug_assert_eq!(register_index, register_end);
        debug_assert_eq!(uninitialized_var_index, uninitialized_var_end);
        debug_assert_eq!(initialized_var_index, initialized_var_end);
        debug_assert_eq!(ident_index, initialized_var_end + ident_count);
        debug_assert_eq!(const_literal_index, const_literal_end);
        debug_assert_eq!(literal_index, self.literal_pool.count());

        self.register_count = register_end;
        (register_end, uninitialized_var_end, ident_end)
    }

    /// Emit the initializer prefix: the hoisted-variable declaration
    /// and one initializer per function declaration.
    fn generate_initializers(
        &self,
        encoding: LiteralEncoding,
        register_end: u16,
        uninitialized_var_end: u16,
    ) -> Vec<u8> {
        let mut prefix = Vec::new();

        if uninitialized_var_end > register_end {
            prefix.push(Opcode::DefineVars as u8);
            encoding.encode_index(uninitialized_var_end - 1, &mut prefix);
        }

        for literal in &self.literal_pool.items {
            if literal.kind != LiteralKind::Function {
                continue;
            }
            if let Some(name_position) = literal.name_index {
                let name_index = self.literal_pool.get(name_position).index;
                prefix.push(Opcode::InitializeVar as u8);
                encoding.encode_index(name_index, &mut prefix);
                encoding.encode_index(literal.index, &mut prefix);
            }
        }

        prefix
    }

    /// Relocate the parse-time stream: literal operands are re-encoded
    /// from raw two-byte pool positions to their final width, and
    /// branch displacements are rewritten through an offset map.
    fn relocate_byte_code(
        &self,
        old: &[u8],
        encoding: LiteralEncoding,
        out: &mut Vec<u8>,
    ) {
        // First pass: the new offset of every instruction start.
        let mut map = vec![0u32; old.len() + 1];
        let mut new_size = 0u32;
        let mut cursor = 0;

        while cursor < old.len() {
            map[cursor] = new_size;
            let (op, old_size, new_instr_size) = self.raw_instr_sizes(old, cursor, encoding);
            let _ = op;
            cursor += old_size;
            new_size += new_instr_size as u32;
        }
        map[old.len()] = new_size;

        // Second pass: copy and rewrite.
        cursor = 0;
        while cursor < old.len() {
            let (op, _, _) = self.raw_instr_sizes(old, cursor, encoding);
            let op_flags = op.flags();
            let mut read = cursor + op.opcode_size();

            match op {
                CbcOp::Plain(opcode) => out.push(opcode as u8),
                CbcOp::Ext(ext) => {
                    out.push(Opcode::ExtOpcode as u8);
                    out.push(ext as u8);
                }
            }

            if op_flags & flags::BYTE_ARG != 0 {
                out.push(old[read]);
                read += 1;
            }

            if op_flags & flags::LITERAL_ARG != 0 {
                let raw = u16::from_be_bytes([old[read], old[read + 1]]);
                encoding.encode_index(self.literal_pool.get(raw).index, out);
                read += 2;
            }

            if op_flags & flags::LITERAL_ARG2 != 0 {
                let raw = u16::from_be_bytes([old[read], old[read + 1]]);
                encoding.encode_index(self.literal_pool.get(raw).index, out);
                read += 2;
            }

            if op_flags & flags::BRANCH_ARG != 0 {
                let width = op.branch_offset_length() as usize;
                let mut displacement = 0u32;
                for _ in 0..width {
                    displacement = (displacement << 8) | old[read] as u32;
                    read += 1;
                }

                let target = if op.is_forward_branch() {
                    cursor + displacement as usize
                } else {
                    cursor - displacement as usize
                };
                let new_displacement = if op.is_forward_branch() {
                    map[target] - map[cursor]
                } else {
                    map[cursor] - map[target]
                };

                for shift in (0..width).rev() {
                    out.push((new_displacement >> (shift * 8)) as u8);
                }
            }

            cursor = read;
        }
    }

    /// Decode one instruction of the parse-time stream: its opcode,
    /// its size there, and its size after relocation.
    fn raw_instr_sizes(
        &self,
        bytes: &[u8],
        cursor: usize,
        encoding: LiteralEncoding,
    ) -> (CbcOp, usize, usize) {
        let op = if bytes[cursor] == Opcode::ExtOpcode as u8 {
            CbcOp::Ext(ExtOpcode::from_byte(bytes[cursor + 1]).unwrap())
        } else {
            CbcOp::Plain(Opcode::from_byte(bytes[cursor]).unwrap())
        };

        let op_flags = op.flags();
        let mut old_size = op.opcode_size();
        let mut new_size = op.opcode_size();

        if op_flags & flags::BYTE_ARG != 0 {
            old_size += 1;
            new_size += 1;
        }
        if op_flags & flags::LITERAL_ARG != 0 {
            let raw = u16::from_be_bytes([bytes[cursor + old_size], bytes[cursor + old_size + 1]]);
            old_size += 2;
            new_size += encoding.index_size(self.literal_pool.get(raw).index);
        }
        if op_flags & flags::LITERAL_ARG2 != 0 {
            let raw = u16::from_be_bytes([bytes[cursor + old_size], bytes[cursor + old_size + 1]]);
            old_size += 2;
            new_size += encoding.index_size(self.literal_pool.get(raw).index);
        }
        if op_flags & flags::BRANCH_ARG != 0 {
            let width = op.branch_offset_length() as usize;
            old_size += width;
            new_size += width;
        }

        (op, old_size, new_size)
    }

    /// Assemble the compiled-code blob from the parse results.
    pub(crate) fn post_processing(&mut self) -> Result<CompiledCode, ParseError> {
        if self.stack_limit + self.register_count as i32 > MAX_STACK_LIMIT as i32 {
            return Err(self.error(ParseErrorKind::StackLimitReached));
        }

        let literal_count = self.literal_pool.count();
        let encoding = if literal_count <= MAX_SMALL_ENCODING_LITERALS {
            LiteralEncoding::Small
        } else {
            LiteralEncoding::Full
        };

        let (register_end, uninitialized_var_end, ident_end) = self.compute_literal_indices();

        let mut code = self.generate_initializers(encoding, register_end, uninitialized_var_end);

        let old = std::mem::take(&mut self.byte_code);
        self.relocate_byte_code(&old, encoding, &mut code);

        let ends_with_return = old
            .last()
            .map(|_| {
                // Walk the stream to find the final instruction.
                let mut cursor = 0;
                let mut last = None;
                while cursor < old.len() {
                    let (op, old_size, _) = self.raw_instr_sizes(&old, cursor, encoding);
                    last = Some(op);
                    cursor += old_size;
                }
                matches!(
                    last,
                    Some(CbcOp::Plain(Opcode::Return))
                        | Some(CbcOp::Plain(Opcode::ReturnWithUndefined))
                )
            })
            .unwrap_or(false);

        if !ends_with_return {
            code.push(Opcode::ReturnWithUndefined as u8);
        }

        if code.len() as u32 > MAX_CODE_SIZE {
            return Err(self.error(ParseErrorKind::CodeSizeLimitReached));
        }

        let mut header_flags = 0u16;
        if self.status_flags & IS_STRICT != 0 {
            header_flags |= status_flags::STRICT_MODE;
        }
        if encoding == LiteralEncoding::Full {
            header_flags |= status_flags::FULL_LITERAL_ENCODING;
        }
        if self.status_flags & IS_FUNCTION != 0 {
            header_flags |= status_flags::FUNCTION;
        }
        if self.status_flags & IS_FUNC_EXPRESSION != 0 {
            header_flags |= status_flags::FUNCTION_EXPRESSION;
        }
        if self.status_flags & IS_PROPERTY_GETTER != 0 {
            header_flags |= status_flags::PROPERTY_GETTER;
        }
        if self.status_flags & IS_PROPERTY_SETTER != 0 {
            header_flags |= status_flags::PROPERTY_SETTER;
        }

        let mut slots: Vec<Option<Value>> = Vec::with_capacity(literal_count as usize);
        slots.resize_with(literal_count as usize, || None);

        for literal in self.literal_pool.items.drain(..) {
            let index = literal.index as usize;
            let value = match (literal.kind, literal.data) {
                (LiteralKind::Ident, LiteralData::Bytes(bytes)) => Value::Ident(bytes),
                (LiteralKind::String, LiteralData::Bytes(bytes)) => Value::String(bytes),
                (LiteralKind::Regexp, LiteralData::Bytes(bytes)) => Value::Regexp(bytes),
                (_, LiteralData::Number(value)) => Value::Number(value),
                (_, LiteralData::Function(code)) => match code {
                    Some(code) => Value::Function(code),
                    None => continue,
                },
                _ => continue,
            };
            slots[index] = Some(value);
        }

        let literals: Vec<Value> = slots.into_iter().flatten().collect();
        debug_assert_eq!(literals.len(), literal_count as usize);

        Ok(CompiledCode {
            status_flags: header_flags,
            argument_end: self.argument_count,
            register_end,
            ident_end,
            literal_end: literal_count,
            literals,
            code,
        })
    }
}

/// Compile ECMAScript source text into byte code.
///
/// One error aborts the whole compilation; there is no partial
/// recovery.
///
/// # Examples
///
/// ```
/// use parser::{parse, SourceKind};
///
/// let code = parse("if (a) b();", SourceKind::Global).unwrap();
/// assert!(code.code_size() > 0);
///
/// let error = parse("break;", SourceKind::Global).unwrap_err();
/// assert_eq!(error.line, 1);
/// ```
pub fn parse(source: &str, kind: SourceKind) -> Result<CompiledCode, ParseError> {
    parse_bytes(source.as_bytes(), kind)
}

/// Compile ECMAScript source bytes into byte code.
///
/// The buffer is read as UTF-8 without validation; string literal
/// contents pass through byte for byte. [`parse`] is the convenience
/// wrapper for string slices.
pub fn parse_bytes(source: &[u8], kind: SourceKind) -> Result<CompiledCode, ParseError> {
    let mut context = ParserContext::new(source);

    context.status_flags = match kind {
        // Global and eval variables live in the global object, never
        // in registers.
        SourceKind::Global | SourceKind::Eval => NO_REG_STORE,
        SourceKind::FunctionBody => IS_FUNCTION,
    };

    context.next_token()?;
    context.parse_statements()?;

    debug_assert!(context.last_cbc.is_none());
    debug_assert!(context.stack.is_empty());

    context.post_processing()
}

#[cfg(test)]
pub(crate) fn test_context(source: &str) -> ParserContext<'_> {
    ParserContext::new(source.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbc::disasm;

    fn names(source: &str, kind: SourceKind) -> Vec<&'static str> {
        let code = parse(source, kind).expect(source);
        disasm::opcode_names(&code).unwrap()
    }

    fn error_kind(source: &str) -> ParseErrorKind {
        parse(source, SourceKind::Global).unwrap_err().kind
    }

    #[test]
    fn test_empty_program() {
        let code = parse("", SourceKind::Global).unwrap();
        assert_eq!(
            disasm::opcode_names(&code).unwrap(),
            vec!["ReturnWithUndefined"]
        );
        assert_eq!(code.literal_end, 0);
    }

    #[test]
    fn test_var_with_initializer_fuses_assignment() {
        let code = parse("var x = 1 + 2;", SourceKind::FunctionBody).unwrap();
        assert_eq!(
            disasm::opcode_names(&code).unwrap(),
            vec!["AddTwoLiterals", "AssignIdent", "ReturnWithUndefined"]
        );
        assert!(code.literal_end >= 3);
    }

    #[test]
    fn test_global_expression_keeps_block_value() {
        assert_eq!(
            names("x = 1;", SourceKind::Global),
            vec![
                "AssignIdentLiteralPushResult",
                "PopBlock",
                "ReturnWithUndefined"
            ]
        );
    }

    #[test]
    fn test_while_true_folds_to_plain_jump() {
        let code = parse("while(true){}", SourceKind::Global).unwrap();
        let instructions = disasm::decode(&code).unwrap();
        assert_eq!(instructions[0].opcode.name(), "JumpForward2");
        assert_eq!(instructions[1].opcode.name(), "JumpBackward");
        // The forward jump lands on the backward jump, which targets
        // itself (an empty infinite loop).
        assert_eq!(instructions[0].branch_target(), Some(instructions[1].offset));
        assert_eq!(instructions[1].branch_target(), Some(instructions[1].offset));
    }

    #[test]
    fn test_while_number_condition_does_not_fold() {
        assert_eq!(
            names("while(1){}", SourceKind::Global),
            vec![
                "JumpForward2",
                "PushLiteral",
                "BranchIfTrueBackward",
                "ReturnWithUndefined"
            ]
        );
    }

    #[test]
    fn test_while_not_condition_inverts_branch() {
        // The logical not is elided and the branch polarity inverted.
        assert_eq!(
            names("while(!(a + b)){}", SourceKind::Global),
            vec![
                "JumpForward2",
                "AddTwoLiterals",
                "BranchIfFalseBackward",
                "ReturnWithUndefined"
            ]
        );
        // A not applied to a fused literal operand stays.
        assert_eq!(
            names("while(!a){}", SourceKind::Global),
            vec![
                "JumpForward2",
                "LogicalNotLiteral",
                "BranchIfTrueBackward",
                "ReturnWithUndefined"
            ]
        );
    }

    #[test]
    fn test_if_else_branches() {
        let code = parse("if(a)b;else c;", SourceKind::FunctionBody).unwrap();
        let instructions = disasm::decode(&code).unwrap();
        let names: Vec<_> = instructions.iter().map(|i| i.opcode.name()).collect();
        assert_eq!(
            names,
            vec![
                "PushIdent",
                "BranchIfFalseForward2",
                "PushIdent",
                "Pop",
                "JumpForward2",
                "PushIdent",
                "Pop",
                "ReturnWithUndefined"
            ]
        );
        // The conditional branch skips past b, the jump past c.
        assert_eq!(instructions[1].branch_target(), Some(instructions[5].offset));
        assert_eq!(instructions[4].branch_target(), Some(instructions[7].offset));
    }

    #[test]
    fn test_for_loop_break_targets_loop_end() {
        let code = parse("for(var i=0;i<3;i++)break;", SourceKind::Global).unwrap();
        let instructions = disasm::decode(&code).unwrap();
        let names: Vec<_> = instructions.iter().map(|i| i.opcode.name()).collect();
        assert_eq!(
            names,
            vec![
                "AssignIdentLiteral",
                "JumpForward2",
                "JumpForward2",
                "PostIncrIdent",
                "LessTwoLiterals",
                "BranchIfTrueBackward",
                "ReturnWithUndefined"
            ]
        );
        // The first jump skips the body to the condition; the break
        // lands just after the back edge; the back edge returns to the
        // continue point before the update expression.
        assert_eq!(instructions[1].branch_target(), Some(instructions[4].offset));
        assert_eq!(instructions[2].branch_target(), Some(instructions[6].offset));
        assert_eq!(instructions[5].branch_target(), Some(instructions[2].offset));
    }

    #[test]
    fn test_do_while() {
        let code = parse("do a(); while (b);", SourceKind::Global).unwrap();
        let instructions = disasm::decode(&code).unwrap();
        let names: Vec<_> = instructions.iter().map(|i| i.opcode.name()).collect();
        assert_eq!(
            names,
            vec![
                "CallIdentPushResult",
                "PopBlock",
                "PushIdent",
                "BranchIfTrueBackward",
                "ReturnWithUndefined"
            ]
        );
        assert_eq!(instructions[3].branch_target(), Some(0));
    }

    #[test]
    fn test_try_catch_finally_order() {
        let code = parse("try{}catch(e){}finally{}", SourceKind::Global).unwrap();
        assert_eq!(
            disasm::opcode_names(&code).unwrap(),
            vec![
                "TryCreateContext2",
                "Catch2",
                "AssignIdent",
                "Finally2",
                "ContextEnd",
                "ReturnWithUndefined"
            ]
        );
    }

    #[test]
    fn test_switch_with_default() {
        let code = parse("switch(x){case 1:break;default:}", SourceKind::Global).unwrap();
        let instructions = disasm::decode(&code).unwrap();
        let names: Vec<_> = instructions.iter().map(|i| i.opcode.name()).collect();
        assert_eq!(
            names,
            vec![
                "PushIdent",
                "PushLiteral",
                "StrictEqual",
                "BranchIfTrueForward2",
                "JumpForward2",
                "JumpForward2",
                "ReturnWithUndefined"
            ]
        );
        let end = instructions[6].offset;
        // The break and the default branch both land after the switch.
        assert_eq!(instructions[5].branch_target(), Some(end));
        assert_eq!(instructions[4].branch_target(), Some(end));
    }

    #[test]
    fn test_empty_switch_reduces_to_block() {
        assert_eq!(
            names("switch(x){}", SourceKind::Global),
            vec!["PushIdent", "Pop", "ReturnWithUndefined"]
        );
    }

    #[test]
    fn test_for_in_emission() {
        let code = parse("for (var k in o) {}", SourceKind::Global).unwrap();
        let instructions = disasm::decode(&code).unwrap();
        let names: Vec<_> = instructions.iter().map(|i| i.opcode.name()).collect();
        assert_eq!(
            names,
            vec![
                "PushIdent",
                "ForInCreateContext2",
                "ForInGetNext",
                "AssignIdent",
                "BranchIfForInHasNext",
                "ReturnWithUndefined"
            ]
        );
        // The create-context branch exits the loop; the back edge
        // returns to the get-next instruction.
        assert_eq!(instructions[1].branch_target(), Some(instructions[5].offset));
        assert_eq!(instructions[4].branch_target(), Some(instructions[2].offset));
    }

    #[test]
    fn test_function_declaration_initializer() {
        let code = parse("function f() { return 1; }", SourceKind::Global).unwrap();
        let instruction_names = disasm::opcode_names(&code).unwrap();
        assert_eq!(
            instruction_names,
            vec!["InitializeVar", "ReturnWithUndefined"]
        );

        let function = code
            .literals
            .iter()
            .find_map(|value| value.as_function())
            .unwrap();
        assert_eq!(
            disasm::opcode_names(function).unwrap(),
            vec!["PushLiteral", "Return"]
        );
        assert!(function.status_flags & status_flags::FUNCTION != 0);
    }

    #[test]
    fn test_define_vars_prefix() {
        let code = parse("var a, b;", SourceKind::Global).unwrap();
        let instructions = disasm::decode(&code).unwrap();
        assert_eq!(instructions[0].opcode.name(), "DefineVars");
        // Global variables cannot live in registers, so both names are
        // in the identifier group.
        assert_eq!(code.register_end, 0);
        assert_eq!(code.ident_end, 2);
    }

    #[test]
    fn test_use_strict_directive_sets_header_flag() {
        let code = parse("'use strict'; x;", SourceKind::Global).unwrap();
        assert!(code.is_strict());

        // Anywhere else it is an ordinary expression statement.
        let code = parse("x; 'use strict';", SourceKind::Global).unwrap();
        assert!(!code.is_strict());
    }

    #[test]
    fn test_directive_prologue_reinjection() {
        // The second string is not a directive: it starts a member
        // expression.
        let code = parse("'a'; 'use strict' .length;", SourceKind::Global).unwrap();
        assert!(!code.is_strict());
        let instruction_names = disasm::opcode_names(&code).unwrap();
        assert!(instruction_names.contains(&"PropStringGet"));
    }

    #[test]
    fn test_strict_mode_errors() {
        assert_eq!(
            parse("'use strict'; with (a) {}", SourceKind::Global)
                .unwrap_err()
                .kind,
            ParseErrorKind::WithNotAllowed
        );
        assert_eq!(
            parse("'use strict'; eval = 1;", SourceKind::Global)
                .unwrap_err()
                .kind,
            ParseErrorKind::EvalCannotAssigned
        );
        assert_eq!(
            parse("'use strict'; var yield;", SourceKind::Global)
                .unwrap_err()
                .kind,
            ParseErrorKind::StrictIdentNotAllowed
        );
        assert_eq!(
            parse(
                "function f(eval) { 'use strict'; }",
                SourceKind::Global
            )
            .unwrap_err()
            .kind,
            ParseErrorKind::NonStrictArgDefinition
        );
    }

    #[test]
    fn test_break_continue_errors() {
        assert_eq!(error_kind("break;"), ParseErrorKind::InvalidBreak);
        assert_eq!(error_kind("continue;"), ParseErrorKind::InvalidContinue);
        assert_eq!(
            error_kind("while(a) break missing;"),
            ParseErrorKind::InvalidBreakLabel
        );
        assert_eq!(
            error_kind("lbl: { continue lbl; }"),
            ParseErrorKind::InvalidContinueLabel
        );
    }

    #[test]
    fn test_continue_label_must_precede_loop() {
        // A label directly before a loop is a valid continue target.
        assert!(parse("lbl: while(a) continue lbl;", SourceKind::Global).is_ok());
        assert!(parse("a: b: while(c) continue a;", SourceKind::Global).is_ok());
    }

    #[test]
    fn test_label_errors() {
        assert_eq!(
            error_kind("x: y: x: a;"),
            ParseErrorKind::DuplicatedLabel
        );
        assert_eq!(
            error_kind("switch(a){default:;default:;}"),
            ParseErrorKind::MultipleDefaultsNotAllowed
        );
        assert_eq!(
            error_kind("default: a;"),
            ParseErrorKind::DefaultNotInSwitch
        );
        assert_eq!(error_kind("case 1: a;"), ParseErrorKind::CaseNotInSwitch);
    }

    #[test]
    fn test_return_outside_function() {
        assert_eq!(error_kind("return 1;"), ParseErrorKind::InvalidReturn);
        assert!(parse("return 1;", SourceKind::FunctionBody).is_ok());
    }

    #[test]
    fn test_try_errors() {
        assert_eq!(
            error_kind("try {} junk;"),
            ParseErrorKind::CatchFinallyExpected
        );
    }

    #[test]
    fn test_asi() {
        assert!(parse("a()\nb()", SourceKind::Global).is_ok());
        assert_eq!(error_kind("a() b()"), ParseErrorKind::SemicolonExpected);
    }

    #[test]
    fn test_error_position() {
        let error = parse("a;\n   !;", SourceKind::Global).unwrap_err();
        assert_eq!(error.line, 2);
        assert!(error.column > 1);
    }

    #[test]
    fn test_nested_function_restores_state() {
        let code = parse("var a = 1; function f() { var b = 2; } var c = 3;", SourceKind::Global)
            .unwrap();
        // Literals of f's body stay in f's pool.
        assert!(code
            .literals
            .iter()
            .any(|value| value.as_function().is_some()));
        assert!(code.literals.iter().any(|value| value.is_ident("a")));
        assert!(code.literals.iter().any(|value| value.is_ident("c")));
        assert!(!code.literals.iter().any(|value| value.is_ident("b")));
    }

    #[test]
    fn test_function_arguments_are_registers() {
        let source = "function f(p, q) { return p; }";
        let code = parse(source, SourceKind::Global).unwrap();
        let function = code
            .literals
            .iter()
            .find_map(|value| value.as_function())
            .unwrap();
        assert_eq!(function.argument_end, 2);
        assert!(function.register_end >= 2);
    }

    #[test]
    fn test_no_unresolved_forward_branches() {
        let sources = [
            "if (a) { b; } else if (c) { d; }",
            "x: while (a) { if (b) break x; continue; }",
            "switch (a) { case 1: case 2: b; break; default: c; }",
            "try { a; } catch (e) { b; } finally { c; }",
            "a && b || c ? d : e;",
            "for (i = 0; i < 10; i++) for (j in k) if (j) continue; else break;",
        ];
        for source in sources {
            let code = parse(source, SourceKind::Global).expect(source);
            for instr in disasm::decode(&code).unwrap() {
                if instr.opcode.is_forward_branch() {
                    assert!(
                        instr.branch_offset.unwrap() > 0,
                        "unpatched branch in {:?}",
                        source
                    );
                }
            }
        }
    }

    #[test]
    fn test_eval_call_uses_ext_opcode() {
        let instruction_names = names("eval('x');", SourceKind::Global);
        assert!(instruction_names.contains(&"CallEvalPushResult"));
    }

    #[test]
    fn test_getter_setter_arity_errors() {
        assert_eq!(
            error_kind("({ get x(a) { return 1; } });"),
            ParseErrorKind::NoArgumentsExpected
        );
        assert_eq!(
            error_kind("({ set x() {} });"),
            ParseErrorKind::OneArgumentExpected
        );
        assert!(parse("({ get x() {}, set x(v) {} });", SourceKind::Global).is_ok());
    }
}
