//! Expression parsing.
//!
//! Operator-precedence parsing with an explicit operator stack. The
//! primary/postfix machinery feeds the emitter's one-instruction
//! cache, which is where operand fusion happens: a pending push of a
//! literal can merge into the following unary, binary, member or
//! assignment instruction.

use crate::emit::LastOpcode;
use crate::lexer::{
    is_binary_lvalue_token, is_binary_op_token, is_unary_lvalue_op_token, is_unary_op_token,
    LiteralKind, TokenType,
};
use crate::literals::{IdentClass, FLAG_VAR};
use crate::parser::{
    ParserContext, IS_CLOSURE, IS_FUNCTION, IS_FUNC_EXPRESSION, IS_PROPERTY_GETTER,
    IS_PROPERTY_SETTER,
};
use crate::stack::Branch;
use cbc::opcode::{flags, CbcOp, ExtOpcode, Opcode};
use core_types::{ParseError, ParseErrorKind};

/// Plain expression: the value is left on the stack.
pub(crate) const PARSE_EXPR: u8 = 0;
/// Expression statement: the value is dropped.
pub(crate) const PARSE_EXPR_STATEMENT: u8 = 0x1;
/// Expression statement of global or eval code: the value becomes the
/// statement completion value.
pub(crate) const PARSE_EXPR_BLOCK: u8 = 0x2;
/// Stop at a top-level comma.
pub(crate) const PARSE_EXPR_NO_COMMA: u8 = 0x4;
/// The first primary expression is already in the opcode cache.
pub(crate) const PARSE_EXPR_HAS_LITERAL: u8 = 0x8;

/// One entry of the operator stack.
#[derive(Debug)]
enum ExprOp {
    /// Grouping parenthesis.
    LeftParen,
    /// A collected prefix operator (including `new`).
    Unary(TokenType),
    /// An ordinary binary operator.
    Binary(TokenType),
    /// An assignment operator with its captured target.
    BinaryLvalue {
        token: TokenType,
        opcode: Opcode,
        literal: Option<u16>,
    },
    /// `&&` or `||` with its short-circuit branch.
    Logical { token: TokenType, branch: Branch },
}

impl ExprOp {
    fn binary_token(&self) -> Option<TokenType> {
        match self {
            ExprOp::Binary(token) => Some(*token),
            ExprOp::BinaryLvalue { token, .. } => Some(*token),
            ExprOp::Logical { token, .. } => Some(*token),
            _ => None,
        }
    }
}

/// Binding power of a binary operator. Assignment and the logical
/// operators are right-associative; the callers add one to the
/// threshold for them.
fn precedence(token: TokenType) -> u8 {
    use TokenType::*;
    match token {
        Assign | AssignAdd | AssignSubtract | AssignMultiply | AssignDivide | AssignModulo
        | AssignLeftShift | AssignRightShift | AssignUnsRightShift | AssignBitAnd
        | AssignBitOr | AssignBitXor => 3,
        QuestionMark => 4,
        LogicalOr => 5,
        LogicalAnd => 6,
        BitOr => 7,
        BitXor => 8,
        BitAnd => 9,
        Equal | NotEqual | StrictEqual | StrictNotEqual => 10,
        Less | Greater | LessEqual | GreaterEqual | KeywIn | KeywInstanceof => 11,
        LeftShift | RightShift | UnsRightShift => 12,
        Add | Subtract => 13,
        Multiply | Divide | Modulo => 14,
        _ => 0,
    }
}

fn unary_token_opcode(token: TokenType) -> Opcode {
    match token {
        TokenType::Plus => Opcode::Plus,
        TokenType::Negate => Opcode::Negate,
        TokenType::LogicalNot => Opcode::LogicalNot,
        TokenType::BitNot => Opcode::BitNot,
        TokenType::KeywVoid => Opcode::Void,
        _ => Opcode::TypeOf,
    }
}

fn unary_lvalue_token_opcode(token: TokenType) -> Opcode {
    match token {
        TokenType::KeywDelete => Opcode::Delete,
        TokenType::Increase => Opcode::PreIncr,
        _ => Opcode::PreDecr,
    }
}

fn binary_token_opcode(token: TokenType) -> Opcode {
    use TokenType::*;
    match token {
        BitOr => Opcode::BitOr,
        BitXor => Opcode::BitXor,
        BitAnd => Opcode::BitAnd,
        Equal => Opcode::Equal,
        NotEqual => Opcode::NotEqual,
        StrictEqual => Opcode::StrictEqual,
        StrictNotEqual => Opcode::StrictNotEqual,
        Less => Opcode::Less,
        Greater => Opcode::Greater,
        LessEqual => Opcode::LessEqual,
        GreaterEqual => Opcode::GreaterEqual,
        KeywIn => Opcode::In,
        KeywInstanceof => Opcode::InstanceOf,
        LeftShift => Opcode::LeftShift,
        RightShift => Opcode::RightShift,
        UnsRightShift => Opcode::UnsRightShift,
        Add => Opcode::Add,
        Subtract => Opcode::Subtract,
        Multiply => Opcode::Multiply,
        Divide => Opcode::Divide,
        _ => Opcode::Modulo,
    }
}

fn binary_lvalue_token_opcode(token: TokenType) -> Opcode {
    use TokenType::*;
    match token {
        Assign => Opcode::Assign,
        AssignAdd => Opcode::AssignAdd,
        AssignSubtract => Opcode::AssignSubtract,
        AssignMultiply => Opcode::AssignMultiply,
        AssignDivide => Opcode::AssignDivide,
        AssignModulo => Opcode::AssignModulo,
        AssignLeftShift => Opcode::AssignLeftShift,
        AssignRightShift => Opcode::AssignRightShift,
        AssignUnsRightShift => Opcode::AssignUnsRightShift,
        AssignBitAnd => Opcode::AssignBitAnd,
        AssignBitOr => Opcode::AssignBitOr,
        _ => Opcode::AssignBitXor,
    }
}

impl<'a> ParserContext<'a> {
    fn strict_assignment_error(&self, class: IdentClass) -> Option<ParseErrorKind> {
        if !self.is_strict() {
            return None;
        }
        match class {
            IdentClass::Eval => Some(ParseErrorKind::EvalCannotAssigned),
            IdentClass::Arguments => Some(ParseErrorKind::ArgumentsCannotAssigned),
            IdentClass::Any => None,
        }
    }

    /// Merge the cached single-literal push and a new literal into a
    /// two-literal push.
    fn merge_push_two_literals(&mut self, second: u16, kind: LiteralKind, class: IdentClass) {
        let Some(last) = self.last_cbc else { return };
        self.last_cbc = Some(LastOpcode {
            op: CbcOp::Plain(Opcode::PushTwoLiterals),
            literal: last.literal,
            value: second,
            lit_kind: kind,
            ident_class: class,
        });
    }

    /// Emit the code of a unary operator that writes its operand:
    /// delete, pre/post increment and decrement. `opcode` is the base
    /// form; the target shape comes from the cached instruction.
    fn emit_unary_lvalue_opcode(&mut self, opcode: Opcode) -> Result<(), ParseError> {
        if self.last_is(Opcode::PushIdent) {
            let class = self
                .last_cbc
                .map(|last| last.ident_class)
                .unwrap_or(IdentClass::Any);
            if let Some(kind) = self.strict_assignment_error(class) {
                return Err(self.error(kind));
            }
            if let Some(last) = self.last_cbc.as_mut() {
                last.op = CbcOp::Plain(opcode.to_unary_lvalue_ident());
            }
        } else if self.last_is(Opcode::PropGet) {
            if let Some(last) = self.last_cbc.as_mut() {
                last.op = CbcOp::Plain(opcode);
            }
        } else if self.last_is(Opcode::PropStringGet) {
            if let Some(last) = self.last_cbc.as_mut() {
                last.op = CbcOp::Plain(opcode.to_unary_lvalue_prop_string());
            }
        } else {
            // Not an lvalue at all; the emitted form fails at runtime.
            self.emit_cbc_ext(ExtOpcode::PushUndefinedBase)?;
            self.emit_cbc(opcode)?;
        }
        Ok(())
    }

    /// Parse prefix operators and the primary expression after them.
    fn parse_unary_expression(
        &mut self,
        grouping_level: &mut usize,
        ops: &mut Vec<ExprOp>,
    ) -> Result<(), ParseError> {
        let mut new_was_seen = false;

        loop {
            // Additive binary tokens turn into unary operators here.
            if self.token.kind == TokenType::Add {
                self.token.kind = TokenType::Plus;
            } else if self.token.kind == TokenType::Subtract {
                self.token.kind = TokenType::Negate;
            }

            if self.token.kind == TokenType::LeftParen {
                *grouping_level += 1;
                new_was_seen = false;
                ops.push(ExprOp::LeftParen);
            } else if self.token.kind == TokenType::KeywNew {
                // Unary operators cannot follow 'new'.
                new_was_seen = true;
                ops.push(ExprOp::Unary(TokenType::KeywNew));
            } else if new_was_seen || !is_unary_op_token(self.token.kind) {
                break;
            } else {
                ops.push(ExprOp::Unary(self.token.kind));
            }
            self.next_token()?;
        }

        match self.token.kind {
            TokenType::Literal => {
                match self.token.lit.kind {
                    LiteralKind::Ident | LiteralKind::String => {
                        self.construct_literal_object(self.token.lit, self.token.lit.kind)?;
                    }
                    LiteralKind::Number => {
                        self.construct_number_object()?;
                    }
                    _ => {}
                }

                if self.last_is_push_literal() && self.lit_object.class != IdentClass::Eval {
                    self.merge_push_two_literals(
                        self.lit_object.index,
                        self.token.lit.kind,
                        self.lit_object.class,
                    );
                } else {
                    let opcode = if self.token.lit.kind == LiteralKind::Ident {
                        Opcode::PushIdent
                    } else {
                        Opcode::PushLiteral
                    };
                    self.emit_cbc_literal_from_token(opcode)?;
                }
            }

            TokenType::KeywFunction => {
                let mut prev_literal = None;
                if self.last_is_push_literal() {
                    prev_literal = self.last_cbc.map(|last| last.literal);
                    self.drop_last_cbc();
                } else {
                    self.flush_cbc()?;
                }

                self.construct_function_object(
                    None,
                    IS_FUNCTION | IS_FUNC_EXPRESSION | IS_CLOSURE,
                )?;
                debug_assert!(self.last_cbc.is_none());

                let function_index = self.literal_pool.count() - 1;
                if let Some(prev) = prev_literal {
                    let mut last = LastOpcode::new(CbcOp::Plain(Opcode::PushTwoLiterals));
                    last.literal = prev;
                    last.value = function_index;
                    self.last_cbc = Some(last);
                } else {
                    self.emit_cbc_literal(Opcode::PushLiteral, function_index)?;
                }
            }

            TokenType::LeftBrace => self.parse_object_literal()?,
            TokenType::LeftSquare => self.parse_array_literal()?,

            TokenType::Divide | TokenType::AssignDivide => {
                self.construct_regexp_object(false)?;
                let index = self.literal_pool.count() - 1;
                if self.last_is_push_literal() {
                    self.merge_push_two_literals(index, LiteralKind::Regexp, IdentClass::Any);
                } else {
                    self.emit_cbc_literal(Opcode::PushLiteral, index)?;
                }
            }

            TokenType::KeywThis => self.emit_cbc(Opcode::PushThis)?,
            TokenType::LitTrue => self.emit_cbc(Opcode::PushTrue)?,
            TokenType::LitFalse => self.emit_cbc(Opcode::PushFalse)?,
            TokenType::LitNull => self.emit_cbc(Opcode::PushNull)?,

            _ => return Err(self.error(ParseErrorKind::PrimaryExpExpected)),
        }
        self.next_token()
    }

    /// Parse the postfix part of a primary expression (member access,
    /// calls, `new` completion, postfix increment/decrement), then
    /// apply the collected prefix operators.
    fn process_unary_expression(&mut self, ops: &mut Vec<ExprOp>) -> Result<(), ParseError> {
        loop {
            match self.token.kind {
                TokenType::Dot => {
                    self.push_result()?;
                    // Keywords are valid property names.
                    self.expect_identifier(LiteralKind::String)?;
                    self.emit_cbc_literal_from_token(Opcode::PropStringGet)?;
                    self.next_token()?;
                    continue;
                }

                TokenType::LeftSquare => {
                    self.push_result()?;
                    self.next_token()?;
                    self.parse_expression(PARSE_EXPR)?;
                    if self.token.kind != TokenType::RightSquare {
                        return Err(self.error(ParseErrorKind::RightSquareExpected));
                    }
                    self.next_token()?;

                    let folds = self
                        .last_cbc
                        .map(|last| {
                            last.op == CbcOp::Plain(Opcode::PushLiteral)
                                && last.lit_kind == LiteralKind::String
                        })
                        .unwrap_or(false);
                    if folds {
                        if let Some(last) = self.last_cbc.as_mut() {
                            last.op = CbcOp::Plain(Opcode::PropStringGet);
                        }
                    } else {
                        self.emit_cbc(Opcode::PropGet)?;
                    }
                    continue;
                }

                TokenType::LeftParen => {
                    self.push_result()?;

                    let mut literal = 0;
                    let opcode;

                    if matches!(ops.last(), Some(ExprOp::Unary(TokenType::KeywNew))) {
                        ops.pop();
                        if self.last_is(Opcode::PushIdent) {
                            literal = self.last_cbc.map(|last| last.literal).unwrap_or(0);
                            self.drop_last_cbc();
                            opcode = CbcOp::Plain(Opcode::NewIdent);
                        } else {
                            opcode = CbcOp::Plain(Opcode::New);
                        }
                    } else if self.last_is(Opcode::PushIdent) {
                        let last = self.last_cbc.take();
                        let last = last.map(|l| (l.literal, l.ident_class));
                        let (index, class) = last.unwrap_or((0, IdentClass::Any));
                        literal = index;
                        if class == IdentClass::Eval {
                            self.set_no_reg_store();
                            opcode = CbcOp::Ext(ExtOpcode::CallEval);
                        } else {
                            opcode = CbcOp::Plain(Opcode::CallIdent);
                        }
                    } else if self.last_is(Opcode::PropGet) {
                        self.drop_last_cbc();
                        opcode = CbcOp::Plain(Opcode::CallProp);
                    } else if self.last_is(Opcode::PropStringGet) {
                        literal = self.last_cbc.map(|last| last.literal).unwrap_or(0);
                        self.drop_last_cbc();
                        opcode = CbcOp::Plain(Opcode::CallPropString);
                    } else {
                        opcode = CbcOp::Plain(Opcode::Call);
                    }

                    self.next_token()?;

                    let mut call_arguments: u16 = 0;
                    if self.token.kind != TokenType::RightParen {
                        loop {
                            call_arguments += 1;
                            if call_arguments > 255 {
                                return Err(self.error(ParseErrorKind::ArgumentLimitReached));
                            }
                            self.parse_expression(PARSE_EXPR_NO_COMMA)?;
                            if self.token.kind != TokenType::Comma {
                                break;
                            }
                            self.next_token()?;
                        }
                        if self.token.kind != TokenType::RightParen {
                            return Err(self.error(ParseErrorKind::RightParenExpected));
                        }
                    }
                    self.next_token()?;
                    self.flush_cbc()?;

                    // Push the call instruction manually.
                    let mut last = LastOpcode::new(opcode);
                    last.literal = literal;
                    last.value = call_arguments;
                    self.last_cbc = Some(last);
                    continue;
                }

                _ => {
                    if matches!(ops.last(), Some(ExprOp::Unary(TokenType::KeywNew))) {
                        // 'new' without an argument list.
                        if self.last_is(Opcode::PushIdent) {
                            if let Some(last) = self.last_cbc.as_mut() {
                                last.op = CbcOp::Plain(Opcode::NewIdent);
                                last.value = 0;
                            }
                        } else {
                            self.emit_cbc_call(Opcode::New, 0)?;
                        }
                        ops.pop();
                        continue;
                    }

                    if !self.token.was_newline
                        && matches!(self.token.kind, TokenType::Increase | TokenType::Decrease)
                    {
                        let opcode = if self.token.kind == TokenType::Increase {
                            Opcode::PostIncr
                        } else {
                            Opcode::PostDecr
                        };
                        self.push_result()?;
                        self.emit_unary_lvalue_opcode(opcode)?;
                        self.next_token()?;
                    }
                    break;
                }
            }
        }

        // Apply the collected prefix operators, innermost first.
        loop {
            let token = match ops.last() {
                Some(ExprOp::Unary(token)) if is_unary_op_token(*token) => *token,
                _ => break,
            };
            self.push_result()?;
            ops.pop();

            if is_unary_lvalue_op_token(token) {
                self.emit_unary_lvalue_opcode(unary_lvalue_token_opcode(token))?;
            } else {
                let opcode = unary_token_opcode(token);
                if self.last_is_push_literal() {
                    if let Some(last) = self.last_cbc.as_mut() {
                        last.op = CbcOp::Plain(opcode.to_literal_arg());
                    }
                } else {
                    self.emit_cbc(opcode)?;
                }
            }
        }
        Ok(())
    }

    /// Record a binary operator, capturing assignment targets and
    /// emitting short-circuit branches.
    fn append_binary_token(&mut self, ops: &mut Vec<ExprOp>) -> Result<(), ParseError> {
        let token = self.token.kind;
        debug_assert!(is_binary_op_token(token));

        self.push_result()?;

        if is_binary_lvalue_token(token) {
            let opcode = binary_lvalue_token_opcode(token);

            if self.last_is(Opcode::PushIdent) {
                let last = self.last_cbc.map(|l| (l.literal, l.ident_class));
                let (literal, class) = last.unwrap_or((0, IdentClass::Any));
                if let Some(kind) = self.strict_assignment_error(class) {
                    return Err(self.error(kind));
                }
                ops.push(ExprOp::BinaryLvalue {
                    token,
                    opcode: opcode.to_assign_ident(),
                    literal: Some(literal),
                });
                self.drop_last_cbc();
            } else if self.last_is(Opcode::PropGet) {
                ops.push(ExprOp::BinaryLvalue {
                    token,
                    opcode,
                    literal: None,
                });
                self.drop_last_cbc();
            } else if self.last_is(Opcode::PropStringGet) {
                let literal = self.last_cbc.map(|last| last.literal).unwrap_or(0);
                ops.push(ExprOp::BinaryLvalue {
                    token,
                    opcode: opcode.to_assign_prop_string(),
                    literal: Some(literal),
                });
                self.drop_last_cbc();
            } else {
                // Not an lvalue; the emitted form fails at runtime.
                self.emit_cbc_ext(ExtOpcode::PushUndefinedBase)?;
                ops.push(ExprOp::BinaryLvalue {
                    token,
                    opcode,
                    literal: None,
                });
            }
        } else if token == TokenType::LogicalOr || token == TokenType::LogicalAnd {
            let opcode = if token == TokenType::LogicalOr {
                Opcode::BranchIfLogicalTrue
            } else {
                Opcode::BranchIfLogicalFalse
            };
            let branch = self.emit_cbc_forward_branch(opcode)?;
            ops.push(ExprOp::Logical { token, branch });
        } else {
            ops.push(ExprOp::Binary(token));
        }
        Ok(())
    }

    /// Emit the recorded binary operators whose precedence is at least
    /// `min_prec_threshold`.
    fn process_binary_opcodes(
        &mut self,
        ops: &mut Vec<ExprOp>,
        min_prec_threshold: u8,
    ) -> Result<(), ParseError> {
        loop {
            let Some(token) = ops.last().and_then(|op| op.binary_token()) else {
                return Ok(());
            };
            if precedence(token) < min_prec_threshold {
                return Ok(());
            }

            self.push_result()?;

            match ops.pop() {
                Some(ExprOp::BinaryLvalue {
                    opcode, literal, ..
                }) => {
                    if opcode.is_assign_ident() && self.last_is_push_literal() {
                        // ASSIGN_IDENT plus a pending literal push
                        // fuses into the ident-literal form.
                        let value = self.last_cbc.map(|last| last.literal).unwrap_or(0);
                        let mut last = LastOpcode::new(CbcOp::Plain(opcode.to_assign_ident_literal()));
                        last.literal = literal.unwrap_or(0);
                        last.value = value;
                        self.last_cbc = Some(last);
                        continue;
                    }

                    if opcode.flags() & flags::LITERAL_ARG != 0 {
                        self.emit_cbc_literal(opcode, literal.unwrap_or(0))?;
                    } else {
                        self.emit_cbc(opcode)?;
                    }
                }

                Some(ExprOp::Logical { branch, .. }) => {
                    self.set_branch_to_current_position(&branch)?;
                }

                Some(ExprOp::Binary(token)) => {
                    let opcode = binary_token_opcode(token);
                    if self.last_is_push_literal() {
                        if let Some(last) = self.last_cbc.as_mut() {
                            last.op = CbcOp::Plain(opcode.to_literal_arg());
                        }
                    } else if self.last_opcode() == Some(CbcOp::Plain(Opcode::PushTwoLiterals)) {
                        if let Some(last) = self.last_cbc.as_mut() {
                            last.op = CbcOp::Plain(opcode.to_two_literals());
                        }
                    } else {
                        self.emit_cbc(opcode)?;
                    }
                }

                _ => return Ok(()),
            }
        }
    }

    /// Parse an expression.
    pub(crate) fn parse_expression(&mut self, options: u8) -> Result<(), ParseError> {
        let mut options = options;
        let mut grouping_level = 0usize;
        let mut ops: Vec<ExprOp> = Vec::new();

        loop {
            if options & PARSE_EXPR_HAS_LITERAL != 0 {
                debug_assert!(self.last_is_push_literal());
                // Only true for the first primary expression.
                options &= !PARSE_EXPR_HAS_LITERAL;
            } else {
                self.parse_unary_expression(&mut grouping_level, &mut ops)?;
            }

            loop {
                self.process_unary_expression(&mut ops)?;

                let min_prec_threshold = if is_binary_op_token(self.token.kind) {
                    let mut threshold = precedence(self.token.kind);
                    if is_binary_lvalue_token(self.token.kind)
                        || self.token.kind == TokenType::LogicalOr
                        || self.token.kind == TokenType::LogicalAnd
                    {
                        // Right-to-left evaluation order.
                        threshold += 1;
                    }
                    threshold
                } else {
                    0
                };

                self.process_binary_opcodes(&mut ops, min_prec_threshold)?;

                if self.token.kind == TokenType::RightParen
                    && matches!(ops.last(), Some(ExprOp::LeftParen))
                {
                    debug_assert!(grouping_level > 0);
                    grouping_level -= 1;
                    ops.pop();
                    self.next_token()?;
                    continue;
                }

                if self.token.kind == TokenType::QuestionMark {
                    self.push_result()?;

                    let mut opcode = Opcode::BranchIfFalseForward;
                    if self.last_is(Opcode::LogicalNot) {
                        self.drop_last_cbc();
                        opcode = Opcode::BranchIfTrueForward;
                    }
                    let cond_branch = self.emit_cbc_forward_branch(opcode)?;

                    self.next_token()?;
                    self.parse_expression(PARSE_EXPR_NO_COMMA)?;
                    let uncond_branch = self.emit_cbc_forward_branch(Opcode::JumpForward)?;
                    self.set_branch_to_current_position(&cond_branch)?;

                    // Only one of the two branches executes, so the
                    // tracked depth counts its value once.
                    debug_assert!(self.stack_depth > 0);
                    self.stack_depth -= 1;

                    if self.token.kind != TokenType::Colon {
                        return Err(self.error(ParseErrorKind::ColonForConditionalExpected));
                    }
                    self.next_token()?;

                    self.parse_expression(PARSE_EXPR_NO_COMMA)?;
                    self.set_branch_to_current_position(&uncond_branch)?;

                    // The result may come from the first branch, so a
                    // last-opcode rewrite is not allowed.
                    self.flush_cbc()?;
                    continue;
                }
                break;
            }

            if self.token.kind == TokenType::Comma
                && (options & PARSE_EXPR_NO_COMMA == 0 || grouping_level > 0)
            {
                if !self.last_opcode().map_or(false, |op| op.is_no_result()) {
                    self.emit_cbc(Opcode::Pop)?;
                }
                self.next_token()?;
                continue;
            }
            if is_binary_op_token(self.token.kind) {
                self.append_binary_token(&mut ops)?;
                self.next_token()?;
                continue;
            }
            break;
        }

        if grouping_level != 0 {
            return Err(self.error(ParseErrorKind::RightParenExpected));
        }
        debug_assert!(ops.is_empty());

        if options & PARSE_EXPR_STATEMENT != 0 {
            if !self.last_opcode().map_or(false, |op| op.is_no_result()) {
                self.emit_cbc(Opcode::Pop)?;
            }
        } else if options & PARSE_EXPR_BLOCK != 0 {
            self.push_result()?;
            self.emit_cbc(Opcode::PopBlock)?;
        } else {
            self.push_result()?;
        }
        Ok(())
    }

    /// Parse an array literal.
    fn parse_array_literal(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.token.kind == TokenType::LeftSquare);

        self.emit_cbc(Opcode::CreateArray)?;
        self.next_token()?;

        let mut pushed_items: u16 = 0;

        loop {
            if self.token.kind == TokenType::RightSquare {
                if pushed_items > 0 {
                    self.emit_cbc_call(Opcode::ArrayAppend, pushed_items)?;
                }
                return Ok(());
            }

            pushed_items += 1;

            if self.token.kind == TokenType::Comma {
                self.emit_cbc(Opcode::PushElision)?;
                self.next_token()?;
            } else {
                self.parse_expression(PARSE_EXPR_NO_COMMA)?;

                if self.token.kind == TokenType::Comma {
                    self.next_token()?;
                } else if self.token.kind != TokenType::RightSquare {
                    return Err(self.error(ParseErrorKind::ArrayItemSeparatorExpected));
                }
            }

            if pushed_items >= 64 {
                self.emit_cbc_call(Opcode::ArrayAppend, pushed_items)?;
                pushed_items = 0;
            }
        }
    }

    /// Parse an object literal.
    fn parse_object_literal(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.token.kind == TokenType::LeftBrace);

        self.emit_cbc(Opcode::CreateObject)?;

        loop {
            self.expect_object_literal_id(false)?;

            if self.token.kind == TokenType::RightBrace {
                return Ok(());
            }

            if matches!(
                self.token.kind,
                TokenType::PropertyGetter | TokenType::PropertySetter
            ) {
                let (status_flags, opcode) = if self.token.kind == TokenType::PropertyGetter {
                    (
                        IS_FUNCTION | IS_CLOSURE | IS_PROPERTY_GETTER,
                        ExtOpcode::SetGetter,
                    )
                } else {
                    (
                        IS_FUNCTION | IS_CLOSURE | IS_PROPERTY_SETTER,
                        ExtOpcode::SetSetter,
                    )
                };

                self.expect_object_literal_id(true)?;
                let literal_index = self.lit_object.index;

                self.flush_cbc()?;
                self.construct_function_object(None, status_flags)?;

                self.emit_cbc_literal(Opcode::PushLiteral, self.literal_pool.count() - 1)?;
                self.emit_cbc_ext_literal(opcode, literal_index)?;

                self.next_token()?;
            } else {
                let literal_index = self.lit_object.index;

                self.next_token()?;
                if self.token.kind != TokenType::Colon {
                    return Err(self.error(ParseErrorKind::ColonExpected));
                }

                self.next_token()?;
                self.parse_expression(PARSE_EXPR_NO_COMMA)?;

                self.emit_cbc_literal(Opcode::SetProperty, literal_index)?;
            }

            if self.token.kind == TokenType::RightBrace {
                return Ok(());
            }
            if self.token.kind != TokenType::Comma {
                return Err(self.error(ParseErrorKind::ObjectItemSeparatorExpected));
            }
        }
    }

    /// Mark the current variable literal, used by var statements and
    /// for-in heads.
    pub(crate) fn mark_var_literal(&mut self) {
        self.literal_pool.get_mut(self.lit_object.index).flags |= FLAG_VAR;
    }
}
