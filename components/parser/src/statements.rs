//! Statement parsing.
//!
//! `parse_statements` drives one streaming pass over the statement
//! grammar. Open statements are frames on the statement stack; after
//! each statement body a terminator loop closes every frame whose body
//! just ended, which is where loop conditions are revisited, branches
//! are patched and break/continue sets are drained.

use crate::emit::LastOpcode;
use crate::expr::{
    PARSE_EXPR, PARSE_EXPR_BLOCK, PARSE_EXPR_HAS_LITERAL, PARSE_EXPR_NO_COMMA,
    PARSE_EXPR_STATEMENT,
};
use crate::lexer::{decode_ident, is_binary_op_token, LitLocation, LiteralKind, TokenType};
use crate::literals::{IdentClass, FLAG_INITIALIZED, FLAG_VAR};
use crate::parser::{ParserContext, HAS_NON_STRICT_ARG, IS_CLOSURE, IS_FUNCTION};
use crate::stack::{
    Branch, BranchItem, DoWhileFrame, ForFrame, ForInFrame, FrameKind, LabelFrame, LoopFrame,
    StatementFrame, SwitchFrame, TryFrame, TryPhase, WhileFrame, CONTINUE_MARKER,
};
use cbc::opcode::{CbcOp, ExtOpcode, Opcode};
use core_types::{ParseError, ParseErrorKind};

/// Runtime context slots allocated by a `with` statement.
pub(crate) const WITH_CONTEXT_STACK_ALLOCATION: i32 = 2;
/// Runtime context slots allocated by a for-in statement.
pub(crate) const FOR_IN_CONTEXT_STACK_ALLOCATION: i32 = 3;
/// Runtime context slots allocated by a try statement.
pub(crate) const TRY_CONTEXT_STACK_ALLOCATION: i32 = 3;

const USE_STRICT: &[u8] = b"use strict";

impl<'a> ParserContext<'a> {
    /// Parse an expression enclosed in parens; the current token is
    /// the statement keyword before the `(`.
    fn parse_enclosed_expr(&mut self) -> Result<(), ParseError> {
        self.next_token()?;

        if self.token.kind != TokenType::LeftParen {
            return Err(self.error(ParseErrorKind::LeftParenExpected));
        }

        self.next_token()?;
        self.parse_expression(PARSE_EXPR)?;

        if self.token.kind != TokenType::RightParen {
            return Err(self.error(ParseErrorKind::RightParenExpected));
        }
        self.next_token()
    }

    /// Parse a var statement (or the var head of a for statement).
    fn parse_var_statement(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.token.kind == TokenType::KeywVar);

        loop {
            self.expect_identifier(LiteralKind::Ident)?;
            self.mark_var_literal();

            self.emit_cbc_literal_from_token(Opcode::PushIdent)?;

            self.next_token()?;

            if self.token.kind == TokenType::Assign {
                self.parse_expression(
                    PARSE_EXPR_STATEMENT | PARSE_EXPR_NO_COMMA | PARSE_EXPR_HAS_LITERAL,
                )?;
            } else {
                debug_assert!(self.last_is(Opcode::PushIdent));
                // Nothing is assigned to this variable.
                self.drop_last_cbc();
            }

            if self.token.kind != TokenType::Comma {
                return Ok(());
            }
        }
    }

    /// Parse a function declaration: the binding hoists, and the
    /// sub-function is compiled immediately.
    fn parse_function_statement(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.token.kind == TokenType::KeywFunction);

        self.expect_identifier(LiteralKind::Ident)?;
        let name_index = self.lit_object.index;
        self.literal_pool.get_mut(name_index).flags |= FLAG_VAR | FLAG_INITIALIZED;

        let mut status_flags = IS_FUNCTION | IS_CLOSURE;
        if self.lit_object.class != IdentClass::Any {
            status_flags |= HAS_NON_STRICT_ARG;
        }

        self.construct_function_object(Some(name_index), status_flags)?;
        self.next_token()
    }

    fn parse_if_statement_start(&mut self) -> Result<(), ParseError> {
        self.parse_enclosed_expr()?;

        let branch = self.emit_cbc_forward_branch(Opcode::BranchIfFalseForward)?;
        self.stack.push(StatementFrame::If(branch));
        Ok(())
    }

    /// Close an if statement. Returns true when an else branch opens.
    fn parse_if_statement_end(&mut self) -> Result<bool, ParseError> {
        debug_assert!(self.stack.top_kind() == FrameKind::If);

        let StatementFrame::If(if_branch) = self.stack.pop() else {
            return Ok(false);
        };

        if self.token.kind != TokenType::KeywElse {
            self.set_branch_to_current_position(&if_branch)?;
            return Ok(false);
        }

        let else_branch = self.emit_cbc_forward_branch(Opcode::JumpForward)?;
        self.set_branch_to_current_position(&if_branch)?;
        self.stack.push(StatementFrame::Else(else_branch));

        self.next_token()?;
        Ok(true)
    }

    fn parse_with_statement_start(&mut self) -> Result<(), ParseError> {
        if self.is_strict() {
            return Err(self.error(ParseErrorKind::WithNotAllowed));
        }

        self.parse_enclosed_expr()?;

        self.context_stack_depth += WITH_CONTEXT_STACK_ALLOCATION;
        self.set_in_with();
        let branch = self.emit_cbc_ext_forward_branch(ExtOpcode::WithCreateContext)?;

        self.stack.push(StatementFrame::With(branch));
        Ok(())
    }

    fn parse_with_statement_end(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.in_with());

        let StatementFrame::With(branch) = self.stack.pop() else {
            return Ok(());
        };

        self.flush_cbc()?;
        self.stack_depth -= WITH_CONTEXT_STACK_ALLOCATION;
        self.context_stack_depth -= WITH_CONTEXT_STACK_ALLOCATION;

        self.emit_cbc(Opcode::ContextEnd)?;
        self.set_branch_to_current_position(&branch)?;

        // The flag stays set while an enclosing with is open.
        for frame in self.stack.frames.iter().rev() {
            match frame.kind() {
                FrameKind::With => return Ok(()),
                FrameKind::Start => break,
                _ => {}
            }
        }
        self.clear_in_with();
        Ok(())
    }

    fn parse_do_while_statement_end(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.stack.top_kind() == FrameKind::DoWhile);

        if self.token.kind != TokenType::KeywWhile {
            return Err(self.error(ParseErrorKind::WhileExpected));
        }

        let StatementFrame::DoWhile(DoWhileFrame {
            start_offset,
            iteration,
        }) = self.stack.pop()
        else {
            return Ok(());
        };

        self.set_continues_to_current_position(&iteration.branch_list)?;

        self.parse_enclosed_expr()?;

        if !self.last_is(Opcode::PushFalse) {
            let mut opcode = Opcode::BranchIfTrueBackward;
            if self.last_is(Opcode::LogicalNot) {
                self.drop_last_cbc();
                opcode = Opcode::BranchIfFalseBackward;
            } else if self.last_is(Opcode::PushTrue) {
                self.drop_last_cbc();
                opcode = Opcode::JumpBackward;
            }
            self.emit_cbc_backward_branch(opcode, start_offset)?;
        } else {
            self.drop_last_cbc();
        }

        self.set_breaks_to_current_position(iteration.branch_list)
    }

    fn parse_while_statement_start(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.token.kind == TokenType::KeywWhile);
        self.next_token()?;

        if self.token.kind != TokenType::LeftParen {
            return Err(self.error(ParseErrorKind::LeftParenExpected));
        }

        let branch = self.emit_cbc_forward_branch(Opcode::JumpForward)?;

        debug_assert!(self.last_cbc.is_none());
        let start_offset = self.byte_code_size();

        // The conditional part is processed at the end.
        let condition_range = self.scan_until(TokenType::RightParen)?;
        self.next_token()?;

        self.stack.push(StatementFrame::While(WhileFrame {
            branch,
            condition_range,
            start_offset,
            iteration: LoopFrame::default(),
        }));
        Ok(())
    }

    fn parse_while_statement_end(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.stack.top_kind() == FrameKind::While);

        let StatementFrame::While(WhileFrame {
            branch,
            condition_range,
            start_offset,
            iteration,
        }) = self.stack.pop()
        else {
            return Ok(());
        };

        let saved_range = self.save_range(self.end);
        let saved_token = self.token;

        self.set_branch_to_current_position(&branch)?;
        self.set_continues_to_current_position(&iteration.branch_list)?;

        self.set_range(&condition_range);
        self.next_token()?;

        self.parse_expression(PARSE_EXPR)?;
        if self.token.kind != TokenType::Eos {
            return Err(self.error(ParseErrorKind::InvalidExpression));
        }

        let mut opcode = Opcode::BranchIfTrueBackward;
        if self.last_is(Opcode::LogicalNot) {
            self.drop_last_cbc();
            opcode = Opcode::BranchIfFalseBackward;
        } else if self.last_is(Opcode::PushTrue) {
            self.drop_last_cbc();
            opcode = Opcode::JumpBackward;
        }

        self.emit_cbc_backward_branch(opcode, start_offset)?;
        self.set_breaks_to_current_position(iteration.branch_list)?;

        self.set_range(&saved_range);
        self.token = saved_token;
        Ok(())
    }

    fn parse_for_statement_start(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.token.kind == TokenType::KeywFor);
        self.next_token()?;

        if self.token.kind != TokenType::LeftParen {
            return Err(self.error(ParseErrorKind::LeftParenExpected));
        }

        // The scan tells a for-in head from a plain one: it stops at
        // `in` or at the first `;`.
        let mut start_range = self.scan_until(TokenType::KeywIn)?;

        if self.token.kind == TokenType::KeywIn {
            self.next_token()?;
            self.parse_expression(PARSE_EXPR)?;

            if self.token.kind != TokenType::RightParen {
                return Err(self.error(ParseErrorKind::RightParenExpected));
            }

            self.context_stack_depth += FOR_IN_CONTEXT_STACK_ALLOCATION;
            let branch = self.emit_cbc_ext_forward_branch(ExtOpcode::ForInCreateContext)?;

            debug_assert!(self.last_cbc.is_none());
            let start_offset = self.byte_code_size();

            let body_range = self.save_range(self.end);
            self.set_range(&start_range);
            self.next_token()?;

            if self.token.kind == TokenType::KeywVar {
                self.expect_identifier(LiteralKind::Ident)?;
                self.mark_var_literal();
                let literal_index = self.lit_object.index;

                self.next_token()?;

                if self.token.kind == TokenType::Assign {
                    // The initialiser is never executed.
                    let skip = self.emit_cbc_forward_branch(Opcode::JumpForward)?;
                    self.next_token()?;
                    self.parse_expression(PARSE_EXPR_STATEMENT | PARSE_EXPR_NO_COMMA)?;
                    self.set_branch_to_current_position(&skip)?;
                }

                self.emit_cbc_ext(ExtOpcode::ForInGetNext)?;
                self.emit_cbc_literal(Opcode::AssignIdent, literal_index)?;
            } else {
                self.parse_expression(PARSE_EXPR)?;

                let saved = self.last_cbc;
                let opcode = if self.last_is(Opcode::PushIdent) {
                    self.drop_last_cbc();
                    Opcode::AssignIdent
                } else if self.last_is(Opcode::PropGet) {
                    self.drop_last_cbc();
                    Opcode::Assign
                } else if self.last_is(Opcode::PropStringGet) {
                    self.drop_last_cbc();
                    Opcode::AssignPropString
                } else {
                    // Not assignable; fails on the first iteration.
                    self.emit_cbc_ext(ExtOpcode::PushUndefinedBase)?;
                    Opcode::Assign
                };

                self.emit_cbc_ext(ExtOpcode::ForInGetNext)?;
                self.flush_cbc()?;

                let mut last = saved.unwrap_or_else(|| LastOpcode::new(CbcOp::Plain(opcode)));
                last.op = CbcOp::Plain(opcode);
                self.last_cbc = Some(last);
            }

            if self.token.kind != TokenType::Eos {
                return Err(self.error(ParseErrorKind::InExpected));
            }

            self.flush_cbc()?;
            self.set_range(&body_range);
            self.next_token()?;

            self.stack.push(StatementFrame::ForIn(ForInFrame {
                branch,
                start_offset,
                iteration: LoopFrame::default(),
            }));
            Ok(())
        } else {
            // Plain for: the init part is parsed in stream order.
            start_range.end = self.end;
            self.set_range(&start_range);
            self.next_token()?;

            if self.token.kind != TokenType::Semicolon {
                if self.token.kind == TokenType::KeywVar {
                    self.parse_var_statement()?;
                } else {
                    self.parse_expression(PARSE_EXPR_STATEMENT)?;
                }

                if self.token.kind != TokenType::Semicolon {
                    return Err(self.error(ParseErrorKind::SemicolonExpected));
                }
            }

            let branch = self.emit_cbc_forward_branch(Opcode::JumpForward)?;

            debug_assert!(self.last_cbc.is_none());
            let start_offset = self.byte_code_size();

            // The conditional and update parts are processed at the
            // end.
            let condition_range = self.scan_until(TokenType::Semicolon)?;
            let expression_range = self.scan_until(TokenType::RightParen)?;
            self.next_token()?;

            self.stack.push(StatementFrame::For(ForFrame {
                branch,
                condition_range,
                expression_range,
                start_offset,
                iteration: LoopFrame::default(),
            }));
            Ok(())
        }
    }

    fn parse_for_statement_end(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.stack.top_kind() == FrameKind::For);

        let StatementFrame::For(ForFrame {
            branch,
            condition_range,
            expression_range,
            start_offset,
            iteration,
        }) = self.stack.pop()
        else {
            return Ok(());
        };

        let saved_range = self.save_range(self.end);
        let saved_token = self.token;

        self.set_range(&expression_range);
        self.next_token()?;

        self.set_continues_to_current_position(&iteration.branch_list)?;

        if self.token.kind != TokenType::Eos {
            self.parse_expression(PARSE_EXPR_STATEMENT)?;

            if self.token.kind != TokenType::Eos {
                return Err(self.error(ParseErrorKind::InvalidExpression));
            }
        }

        self.set_branch_to_current_position(&branch)?;

        self.set_range(&condition_range);
        self.next_token()?;

        let opcode;
        if self.token.kind != TokenType::Eos {
            self.parse_expression(PARSE_EXPR)?;

            if self.token.kind != TokenType::Eos {
                return Err(self.error(ParseErrorKind::InvalidExpression));
            }

            opcode = if self.last_is(Opcode::LogicalNot) {
                self.drop_last_cbc();
                Opcode::BranchIfFalseBackward
            } else if self.last_is(Opcode::PushTrue) {
                self.drop_last_cbc();
                Opcode::JumpBackward
            } else {
                Opcode::BranchIfTrueBackward
            };
        } else {
            opcode = Opcode::JumpBackward;
        }

        self.emit_cbc_backward_branch(opcode, start_offset)?;
        self.set_breaks_to_current_position(iteration.branch_list)?;

        self.set_range(&saved_range);
        self.token = saved_token;
        Ok(())
    }

    fn parse_switch_statement_start(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.token.kind == TokenType::KeywSwitch);

        self.parse_enclosed_expr()?;

        if self.token.kind != TokenType::LeftBrace {
            return Err(self.error(ParseErrorKind::LeftBraceExpected));
        }

        let switch_body_start = self.save_range(self.end);
        self.next_token()?;

        if self.token.kind == TokenType::RightBrace {
            // A switch without cases reduces to a block; only the
            // scrutinee value must go.
            self.emit_cbc(Opcode::Pop)?;
            self.flush_cbc()?;
            self.stack.push(StatementFrame::Block);
            return Ok(());
        }

        if self.token.kind != TokenType::KeywCase && self.token.kind != TokenType::KeywDefault {
            return Err(self.error(ParseErrorKind::InvalidSwitch));
        }

        // The frame is pushed before the case pre-pass so every case
        // branch is owned by it from the moment it exists.
        self.stack.push(StatementFrame::Switch(SwitchFrame {
            default_branch: None,
            case_branches: Vec::new(),
            iteration: LoopFrame::default(),
        }));

        let mut switch_case_was_found = false;
        let mut default_case_was_found = false;

        loop {
            self.scan_until(TokenType::KeywCase)?;

            if self.token.kind == TokenType::KeywDefault {
                if default_case_was_found {
                    return Err(self.error(ParseErrorKind::MultipleDefaultsNotAllowed));
                }

                self.next_token()?;
                if self.token.kind != TokenType::Colon {
                    return Err(self.error(ParseErrorKind::ColonExpected));
                }

                default_case_was_found = true;
            } else if self.token.kind == TokenType::KeywCase
                || self.token.kind == TokenType::RightBrace
            {
                if switch_case_was_found {
                    let mut opcode = Opcode::BranchIfStrictEqual;

                    if self.token.kind != TokenType::KeywCase {
                        // The value is not duplicated for the last
                        // case.
                        self.emit_cbc(Opcode::StrictEqual)?;
                        opcode = Opcode::BranchIfTrueForward;
                    }

                    let item = self.emit_cbc_forward_branch_item(opcode)?;
                    if let Some(StatementFrame::Switch(frame)) = self.stack.frames.last_mut() {
                        frame.case_branches.push(item);
                    }
                }

                if self.token.kind == TokenType::RightBrace {
                    break;
                }

                self.next_token()?;
                self.parse_expression(PARSE_EXPR)?;

                if self.token.kind != TokenType::Colon {
                    return Err(self.error(ParseErrorKind::ColonExpected));
                }
                switch_case_was_found = true;
            }

            self.next_token()?;
        }

        debug_assert!(switch_case_was_found || default_case_was_found);

        if !switch_case_was_found {
            // No case compares against the scrutinee, so it must be
            // popped explicitly.
            self.emit_cbc(Opcode::Pop)?;
        }

        let default_branch = self.emit_cbc_forward_branch(Opcode::JumpForward)?;
        if let Some(StatementFrame::Switch(frame)) = self.stack.frames.last_mut() {
            frame.default_branch = Some(default_branch);
        }

        if !default_case_was_found {
            if let StatementFrame::Switch(frame) = self.stack.pop() {
                self.stack.push(StatementFrame::SwitchNoDefault(frame));
            }
        }

        self.set_range(&switch_body_start);
        self.next_token()
    }

    fn parse_default_statement(&mut self) -> Result<(), ParseError> {
        if !matches!(
            self.stack.top_kind(),
            FrameKind::Switch | FrameKind::SwitchNoDefault
        ) {
            return Err(self.error(ParseErrorKind::DefaultNotInSwitch));
        }

        self.next_token()?;
        // Already validated by the case pre-pass.
        debug_assert!(self.token.kind == TokenType::Colon);
        self.next_token()?;

        let branch = match self.stack.frames.last() {
            Some(StatementFrame::Switch(frame))
            | Some(StatementFrame::SwitchNoDefault(frame)) => frame.default_branch,
            _ => None,
        };
        if let Some(branch) = branch {
            self.set_branch_to_current_position(&branch)?;
        }
        Ok(())
    }

    fn parse_case_statement(&mut self) -> Result<(), ParseError> {
        if !matches!(
            self.stack.top_kind(),
            FrameKind::Switch | FrameKind::SwitchNoDefault
        ) {
            return Err(self.error(ParseErrorKind::CaseNotInSwitch));
        }

        // The case expression was compiled by the pre-pass; skip it.
        self.scan_until(TokenType::Colon)?;
        self.next_token()?;

        let item = match self.stack.frames.last_mut() {
            Some(StatementFrame::Switch(frame))
            | Some(StatementFrame::SwitchNoDefault(frame)) => {
                debug_assert!(!frame.case_branches.is_empty());
                frame.case_branches.remove(0)
            }
            _ => return Ok(()),
        };

        self.set_branch_to_current_position(&Branch {
            offset: item.offset,
        })
    }

    fn parse_try_statement_end(&mut self) -> Result<(), ParseError> {
        debug_assert!(self.stack.top_kind() == FrameKind::Try);

        let (mut phase, branch) = match self.stack.frames.last() {
            Some(StatementFrame::Try(frame)) => (frame.phase, frame.branch),
            _ => return Ok(()),
        };

        self.next_token()?;

        if phase == TryPhase::Finally {
            self.flush_cbc()?;
            self.stack_depth -= TRY_CONTEXT_STACK_ALLOCATION;
            self.context_stack_depth -= TRY_CONTEXT_STACK_ALLOCATION;

            self.emit_cbc(Opcode::ContextEnd)?;
            self.set_branch_to_current_position(&branch)?;
        } else {
            self.set_branch_to_current_position(&branch)?;

            if phase == TryPhase::Catch {
                if self.token.kind != TokenType::KeywFinally {
                    self.flush_cbc()?;
                    self.stack_depth -= TRY_CONTEXT_STACK_ALLOCATION;
                    self.context_stack_depth -= TRY_CONTEXT_STACK_ALLOCATION;

                    self.emit_cbc(Opcode::ContextEnd)?;
                    self.flush_cbc()?;
                    phase = TryPhase::Finally;
                }
            } else if self.token.kind != TokenType::KeywCatch
                && self.token.kind != TokenType::KeywFinally
            {
                return Err(self.error(ParseErrorKind::CatchFinallyExpected));
            }
        }

        if phase == TryPhase::Finally {
            self.stack.pop();
            return Ok(());
        }

        let new_frame;
        if self.token.kind == TokenType::KeywCatch {
            self.next_token()?;

            if self.token.kind != TokenType::LeftParen {
                return Err(self.error(ParseErrorKind::LeftParenExpected));
            }

            self.expect_identifier(LiteralKind::Ident)?;
            let literal_index = self.lit_object.index;

            self.next_token()?;

            if self.token.kind != TokenType::RightParen {
                return Err(self.error(ParseErrorKind::RightParenExpected));
            }

            self.next_token()?;

            if self.token.kind != TokenType::LeftBrace {
                return Err(self.error(ParseErrorKind::LeftBraceExpected));
            }

            let catch_branch = self.emit_cbc_ext_forward_branch(ExtOpcode::Catch)?;
            self.emit_cbc_literal(Opcode::AssignIdent, literal_index)?;
            self.flush_cbc()?;

            new_frame = TryFrame {
                phase: TryPhase::Catch,
                branch: catch_branch,
            };
        } else {
            debug_assert!(self.token.kind == TokenType::KeywFinally);

            self.next_token()?;

            if self.token.kind != TokenType::LeftBrace {
                return Err(self.error(ParseErrorKind::LeftBraceExpected));
            }

            let finally_branch = self.emit_cbc_ext_forward_branch(ExtOpcode::Finally)?;
            new_frame = TryFrame {
                phase: TryPhase::Finally,
                branch: finally_branch,
            };
        }

        if let Some(StatementFrame::Try(frame)) = self.stack.frames.last_mut() {
            *frame = new_frame;
        }
        self.next_token()
    }

    fn parse_break_statement(&mut self) -> Result<(), ParseError> {
        self.next_token()?;

        let mut opcode = Opcode::JumpForward;

        if !self.token.was_newline
            && self.token.kind == TokenType::Literal
            && self.token.lit.kind == LiteralKind::Ident
        {
            let target = decode_ident(self.source, &self.token.lit);

            for index in (0..self.stack.frames.len()).rev() {
                let kind = self.stack.frames[index].kind();

                if kind == FrameKind::Start {
                    return Err(self.error(ParseErrorKind::InvalidBreakLabel));
                }

                if kind.has_runtime_context() {
                    opcode = Opcode::JumpForwardExitContext;
                }

                if kind == FrameKind::Label {
                    let found = matches!(
                        &self.stack.frames[index],
                        StatementFrame::Label(label) if label.ident == target
                    );
                    if found {
                        let item = self.emit_cbc_forward_branch_item(opcode)?;
                        if let StatementFrame::Label(label) = &mut self.stack.frames[index] {
                            label.break_list.push(item);
                        }
                        return self.next_token();
                    }
                }
            }
            return Err(self.error(ParseErrorKind::InvalidBreakLabel));
        }

        for index in (0..self.stack.frames.len()).rev() {
            let kind = self.stack.frames[index].kind();

            if kind == FrameKind::Start {
                return Err(self.error(ParseErrorKind::InvalidBreak));
            }

            if kind.has_runtime_context() {
                opcode = Opcode::JumpForwardExitContext;
            }

            if kind.is_break_target() {
                let item = self.emit_cbc_forward_branch_item(opcode)?;
                if let Some(list) = self.stack.frames[index].loop_list_mut() {
                    list.push(item);
                }
                return Ok(());
            }
        }
        Err(self.error(ParseErrorKind::InvalidBreak))
    }

    fn parse_continue_statement(&mut self) -> Result<(), ParseError> {
        self.next_token()?;

        let mut opcode = Opcode::JumpForward;

        if !self.token.was_newline
            && self.token.kind == TokenType::Literal
            && self.token.lit.kind == LiteralKind::Ident
        {
            let target = decode_ident(self.source, &self.token.lit);
            let mut loop_index: Option<usize> = None;
            let mut for_in_was_seen = false;

            for index in (0..self.stack.frames.len()).rev() {
                let kind = self.stack.frames[index].kind();

                if kind == FrameKind::Start {
                    return Err(self.error(ParseErrorKind::InvalidContinueLabel));
                }

                // Only labels that label a loop can be targeted.
                if loop_index.is_some() && kind == FrameKind::Label {
                    let found = matches!(
                        &self.stack.frames[index],
                        StatementFrame::Label(label) if label.ident == target
                    );
                    if found {
                        let item = self.emit_cbc_forward_branch_item(opcode)?;
                        let item = BranchItem {
                            offset: item.offset | CONTINUE_MARKER,
                        };
                        let target_index = loop_index.unwrap_or(index);
                        if let Some(list) = self.stack.frames[target_index].loop_list_mut() {
                            list.push(item);
                        }
                        return self.next_token();
                    }
                    // A run of labels shares the loop below it.
                    continue;
                }

                if kind == FrameKind::With || kind == FrameKind::Try || for_in_was_seen {
                    opcode = Opcode::JumpForwardExitContext;
                } else if kind == FrameKind::ForIn {
                    for_in_was_seen = true;
                }

                if kind.is_continue_target() {
                    loop_index = Some(index);
                } else {
                    loop_index = None;
                }
            }
            return Err(self.error(ParseErrorKind::InvalidContinueLabel));
        }

        for index in (0..self.stack.frames.len()).rev() {
            let kind = self.stack.frames[index].kind();

            if kind == FrameKind::Start {
                return Err(self.error(ParseErrorKind::InvalidContinue));
            }

            if kind.is_continue_target() {
                let item = self.emit_cbc_forward_branch_item(opcode)?;
                let item = BranchItem {
                    offset: item.offset | CONTINUE_MARKER,
                };
                if let Some(list) = self.stack.frames[index].loop_list_mut() {
                    list.push(item);
                }
                return Ok(());
            }

            if kind == FrameKind::With || kind == FrameKind::Try {
                opcode = Opcode::JumpForwardExitContext;
            }
        }
        Err(self.error(ParseErrorKind::InvalidContinue))
    }

    fn parse_label(&mut self, label_literal: &LitLocation) -> Result<(), ParseError> {
        let ident = decode_ident(self.source, label_literal);

        for frame in self.stack.frames.iter().rev() {
            match frame {
                StatementFrame::Start => break,
                StatementFrame::Label(label) if label.ident == ident => {
                    return Err(self.error(ParseErrorKind::DuplicatedLabel));
                }
                _ => {}
            }
        }

        self.stack.push(StatementFrame::Label(LabelFrame {
            ident,
            break_list: Vec::new(),
        }));
        Ok(())
    }

    fn parse_expression_statement(&mut self) -> Result<(), ParseError> {
        let mut options = if self.is_function() {
            PARSE_EXPR_STATEMENT
        } else {
            PARSE_EXPR_BLOCK
        };

        if self.token.kind == TokenType::ExpressionStart {
            self.token.kind = self.stashed_token_kind;
            options |= PARSE_EXPR_HAS_LITERAL;
        }

        self.parse_expression(options)
    }

    /// Parse the statements of a function body, eval code or global
    /// code. For closures the terminating `}` is left unconsumed; it
    /// belongs to the parent context.
    pub(crate) fn parse_statements(&mut self) -> Result<(), ParseError> {
        self.stack.push(StatementFrame::Start);

        // Directive prologue: leading bare string literal statements.
        while self.token.kind == TokenType::Literal
            && self.token.lit.kind == LiteralKind::String
        {
            debug_assert!(self.stack_depth == 0);

            let lit = self.token.lit;
            self.next_token()?;

            if self.token.kind != TokenType::Semicolon
                && self.token.kind != TokenType::RightBrace
                && (!self.token.was_newline
                    || is_binary_op_token(self.token.kind)
                    || matches!(
                        self.token.kind,
                        TokenType::LeftParen | TokenType::LeftSquare | TokenType::Dot
                    ))
            {
                // Not a directive after all: the string literal is the
                // start of an expression. Re-inject it and bail out.
                self.construct_literal_object(lit, LiteralKind::String)?;
                self.emit_cbc_literal(Opcode::PushLiteral, self.lit_object.index)?;
                if let Some(last) = self.last_cbc.as_mut() {
                    last.lit_kind = LiteralKind::String;
                }
                self.stashed_token_kind = self.token.kind;
                self.token.kind = TokenType::ExpressionStart;
                break;
            }

            if lit.end - lit.start == USE_STRICT.len()
                && !lit.has_escape
                && &self.source[lit.start..lit.end] == USE_STRICT
            {
                self.set_strict();

                if self.token.kind == TokenType::Literal
                    && self.token.lit.kind == LiteralKind::Ident
                    && self.token.is_reserved
                {
                    return Err(self.error(ParseErrorKind::StrictIdentNotAllowed));
                }
            }

            if self.token.kind == TokenType::Semicolon {
                self.next_token()?;
            }
        }

        if self.is_strict() && self.has_non_strict_arg() {
            return Err(self.error(ParseErrorKind::NonStrictArgDefinition));
        }

        while !(self.token.kind == TokenType::Eos
            && self.stack.top_kind() == FrameKind::Start)
        {
            debug_assert_eq!(self.stack_depth, self.context_stack_depth);

            match self.token.kind {
                TokenType::Semicolon => {}

                TokenType::RightBrace => {
                    if matches!(
                        self.stack.top_kind(),
                        FrameKind::Label
                            | FrameKind::If
                            | FrameKind::Else
                            | FrameKind::DoWhile
                            | FrameKind::While
                            | FrameKind::For
                            | FrameKind::ForIn
                            | FrameKind::With
                    ) {
                        return Err(self.error(ParseErrorKind::StatementExpected));
                    }
                }

                TokenType::LeftBrace => {
                    self.stack.push(StatementFrame::Block);
                    self.next_token()?;
                    continue;
                }

                TokenType::KeywVar => self.parse_var_statement()?,

                TokenType::KeywFunction => {
                    self.parse_function_statement()?;
                    continue;
                }

                TokenType::KeywIf => {
                    self.parse_if_statement_start()?;
                    continue;
                }

                TokenType::KeywSwitch => {
                    self.parse_switch_statement_start()?;
                    continue;
                }

                TokenType::KeywDo => {
                    debug_assert!(self.last_cbc.is_none());
                    self.stack.push(StatementFrame::DoWhile(DoWhileFrame {
                        start_offset: self.byte_code_size(),
                        iteration: LoopFrame::default(),
                    }));
                    self.next_token()?;
                    continue;
                }

                TokenType::KeywWhile => {
                    self.parse_while_statement_start()?;
                    continue;
                }

                TokenType::KeywFor => {
                    self.parse_for_statement_start()?;
                    continue;
                }

                TokenType::KeywWith => {
                    self.parse_with_statement_start()?;
                    continue;
                }

                TokenType::KeywTry => {
                    self.next_token()?;

                    if self.token.kind != TokenType::LeftBrace {
                        return Err(self.error(ParseErrorKind::LeftBraceExpected));
                    }

                    self.context_stack_depth += TRY_CONTEXT_STACK_ALLOCATION;
                    let branch =
                        self.emit_cbc_ext_forward_branch(ExtOpcode::TryCreateContext)?;

                    self.stack.push(StatementFrame::Try(TryFrame {
                        phase: TryPhase::Try,
                        branch,
                    }));
                    self.next_token()?;
                    continue;
                }

                TokenType::KeywDefault => {
                    self.parse_default_statement()?;
                    continue;
                }

                TokenType::KeywCase => {
                    self.parse_case_statement()?;
                    continue;
                }

                TokenType::KeywBreak => self.parse_break_statement()?,
                TokenType::KeywContinue => self.parse_continue_statement()?,

                TokenType::KeywThrow => {
                    self.next_token()?;
                    if self.token.was_newline {
                        return Err(self.error(ParseErrorKind::ExpressionExpected));
                    }
                    self.parse_expression(PARSE_EXPR)?;
                    self.emit_cbc(Opcode::Throw)?;
                }

                TokenType::KeywReturn => {
                    if !self.is_function() {
                        return Err(self.error(ParseErrorKind::InvalidReturn));
                    }

                    self.next_token()?;
                    if self.token.was_newline
                        || self.token.kind == TokenType::Semicolon
                        || self.token.kind == TokenType::RightBrace
                    {
                        self.emit_cbc(Opcode::ReturnWithUndefined)?;
                    } else {
                        self.parse_expression(PARSE_EXPR)?;
                        self.emit_cbc(Opcode::Return)?;
                    }
                }

                TokenType::KeywDebugger => {
                    self.emit_cbc_ext(ExtOpcode::Debugger)?;
                    self.next_token()?;
                }

                TokenType::Literal if self.token.lit.kind == LiteralKind::Ident => {
                    let lit = self.token.lit;

                    self.next_token()?;

                    if self.token.kind == TokenType::Colon {
                        self.parse_label(&lit)?;
                        self.next_token()?;
                        continue;
                    }

                    self.construct_literal_object(lit, LiteralKind::Ident)?;
                    self.emit_cbc_literal(Opcode::PushIdent, self.lit_object.index)?;
                    if let Some(last) = self.last_cbc.as_mut() {
                        last.lit_kind = LiteralKind::Ident;
                        last.ident_class = self.lit_object.class;
                    }
                    self.stashed_token_kind = self.token.kind;
                    self.token.kind = TokenType::ExpressionStart;

                    self.parse_expression_statement()?;
                }

                _ => self.parse_expression_statement()?,
            }

            self.flush_cbc()?;

            let mut statement_terminator_required = true;
            loop {
                if statement_terminator_required {
                    if self.token.kind == TokenType::RightBrace {
                        match self.stack.top_kind() {
                            FrameKind::Block => {
                                self.stack.pop();
                                self.next_token()?;
                            }
                            FrameKind::Switch | FrameKind::SwitchNoDefault => {
                                let has_default =
                                    self.stack.top_kind() == FrameKind::Switch;
                                let frame = match self.stack.pop() {
                                    StatementFrame::Switch(frame)
                                    | StatementFrame::SwitchNoDefault(frame) => frame,
                                    _ => unreachable!(),
                                };

                                debug_assert!(frame.case_branches.is_empty());

                                if !has_default {
                                    if let Some(branch) = frame.default_branch {
                                        self.set_branch_to_current_position(&branch)?;
                                    }
                                }

                                self.set_breaks_to_current_position(
                                    frame.iteration.branch_list,
                                )?;
                                self.next_token()?;
                            }
                            FrameKind::Try => self.parse_try_statement_end()?,
                            FrameKind::Start => {
                                if self.is_closure() {
                                    self.stack.pop();
                                    debug_assert!(self.stack_depth == 0);
                                    debug_assert!(self.context_stack_depth == 0);
                                    // The next token belongs to the
                                    // parent context.
                                    return Ok(());
                                }
                                return Err(self.error(ParseErrorKind::InvalidRightBrace));
                            }
                            _ => {}
                        }
                    } else if self.token.kind == TokenType::Semicolon {
                        self.next_token()?;
                    } else if self.token.kind != TokenType::Eos && !self.token.was_newline {
                        return Err(self.error(ParseErrorKind::SemicolonExpected));
                    }
                }

                statement_terminator_required = false;

                match self.stack.top_kind() {
                    FrameKind::Label => {
                        if let StatementFrame::Label(label) = self.stack.pop() {
                            self.set_breaks_to_current_position(label.break_list)?;
                        }
                        continue;
                    }

                    FrameKind::If => {
                        if self.parse_if_statement_end()? {
                            break;
                        }
                        continue;
                    }

                    FrameKind::Else => {
                        if let StatementFrame::Else(branch) = self.stack.pop() {
                            self.set_branch_to_current_position(&branch)?;
                        }
                        continue;
                    }

                    FrameKind::DoWhile => {
                        self.parse_do_while_statement_end()?;
                        statement_terminator_required = true;
                        continue;
                    }

                    FrameKind::While => {
                        self.parse_while_statement_end()?;
                        continue;
                    }

                    FrameKind::For => {
                        self.parse_for_statement_end()?;
                        continue;
                    }

                    FrameKind::ForIn => {
                        if let StatementFrame::ForIn(ForInFrame {
                            branch,
                            start_offset,
                            iteration,
                        }) = self.stack.pop()
                        {
                            self.set_continues_to_current_position(&iteration.branch_list)?;

                            self.flush_cbc()?;
                            self.stack_depth -= FOR_IN_CONTEXT_STACK_ALLOCATION;
                            self.context_stack_depth -= FOR_IN_CONTEXT_STACK_ALLOCATION;

                            self.emit_cbc_ext_backward_branch(
                                ExtOpcode::BranchIfForInHasNext,
                                start_offset,
                            )?;

                            self.set_breaks_to_current_position(iteration.branch_list)?;
                            self.set_branch_to_current_position(&branch)?;
                        }
                        continue;
                    }

                    FrameKind::With => {
                        self.parse_with_statement_end()?;
                        continue;
                    }

                    _ => break,
                }
            }
        }

        debug_assert!(self.stack_depth == 0);
        debug_assert!(self.context_stack_depth == 0);

        self.stack.pop();

        if self.is_closure() {
            // End of source inside a function body.
            return Err(self.error(ParseErrorKind::StatementExpected));
        }
        Ok(())
    }
}
