//! The pre-scanner.
//!
//! `scan_until` walks tokens across arbitrarily nested expressions
//! without emitting code, to locate a delimiter the statement parser
//! needs before it can emit anything: the `)` of a `while`/`for`
//! head, the `;` terminators inside a `for` head, the `in` of a
//! for-in, or the `case`/`default`/`}` labels of a switch body. Its
//! only output is the source range that was skipped; the main pass
//! re-enters that range later.
//!
//! The scanner is a mode-driven pushdown automaton: opening brackets
//! push a symbol describing what their closing bracket means, closing
//! brackets pop it and select the follow-up mode. Object literals
//! alternate between property-name and expression scanning.

use crate::lexer::{
    is_binary_op_token, is_unary_op_token, LiteralKind, SourceRange, TokenType,
};
use crate::parser::ParserContext;
use core_types::{ParseError, ParseErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    PrimaryExpression,
    PrimaryExpressionAfterNew,
    PostPrimaryExpression,
    PrimaryExpressionEnd,
    Statement,
    FunctionArguments,
    PropertyName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanStack {
    Head,
    ParenExpression,
    ParenStatement,
    ColonExpression,
    ColonStatement,
    SquareBracketedExpression,
    ObjectLiteral,
    BlockStatement,
    BlockExpression,
    BlockProperty,
}

impl<'a> ParserContext<'a> {
    /// Scan forward until `end_type` (or its context-dependent
    /// alternate) is the current token at nesting depth zero, and
    /// return the range that was skipped.
    ///
    /// `KeywCase` requests switch-body scanning: the scan starts in
    /// statement mode and stops at `case`, `default` or `}`.
    /// `KeywIn` accepts `;` as the alternate terminator, which is how
    /// for-in and plain `for` heads are told apart.
    pub(crate) fn scan_until(&mut self, end_type: TokenType) -> Result<SourceRange, ParseError> {
        let mut range = SourceRange {
            start: self.cursor,
            end: self.cursor,
            line: self.line,
            column: self.column,
        };

        let mut mode = ScanMode::PrimaryExpression;
        let mut end_type = end_type;
        let mut end_type_b = end_type;

        if end_type == TokenType::KeywCase {
            end_type = TokenType::ScanSwitch;
            end_type_b = TokenType::ScanSwitch;
            mode = ScanMode::Statement;
        } else {
            self.next_token()?;

            if end_type == TokenType::KeywIn {
                end_type_b = TokenType::Semicolon;
                if self.token.kind == TokenType::KeywVar {
                    self.next_token()?;
                }
            }
        }

        let mut stack = vec![ScanStack::Head];

        loop {
            let token_type = self.token.kind;
            let stack_top = *stack.last().unwrap_or(&ScanStack::Head);

            if token_type == TokenType::Eos {
                return Err(self.error(ParseErrorKind::ExpressionExpected));
            }

            if stack_top == ScanStack::Head
                && (token_type == end_type || token_type == end_type_b)
            {
                stack.pop();
                return Ok(range);
            }

            match mode {
                ScanMode::PrimaryExpression | ScanMode::PrimaryExpressionAfterNew => {
                    let unary_allowed = mode == ScanMode::PrimaryExpression;
                    if unary_allowed
                        && (token_type == TokenType::Add
                            || token_type == TokenType::Subtract
                            || is_unary_op_token(token_type))
                    {
                        // Unary prefixes are skipped.
                    } else if self.scan_primary_expression(
                        token_type,
                        stack_top,
                        &mut stack,
                        &mut mode,
                    )? {
                        continue;
                    }
                }

                ScanMode::PostPrimaryExpression | ScanMode::PrimaryExpressionEnd => {
                    let mut advance = false;
                    if mode == ScanMode::PostPrimaryExpression {
                        advance =
                            self.scan_post_primary_expression(token_type, &mut stack, &mut mode)?;
                    }
                    if !advance
                        && self.scan_primary_expression_end(
                            token_type,
                            stack_top,
                            end_type,
                            &mut stack,
                            &mut mode,
                        )?
                    {
                        continue;
                    }
                }

                ScanMode::Statement => {
                    if end_type == TokenType::ScanSwitch
                        && stack_top == ScanStack::Head
                        && matches!(
                            token_type,
                            TokenType::KeywDefault | TokenType::KeywCase | TokenType::RightBrace
                        )
                    {
                        stack.pop();
                        return Ok(range);
                    }

                    if self.scan_statement(token_type, stack_top, &mut stack, &mut mode)? {
                        continue;
                    }
                }

                ScanMode::FunctionArguments => {
                    debug_assert!(matches!(
                        stack_top,
                        ScanStack::BlockStatement
                            | ScanStack::BlockExpression
                            | ScanStack::BlockProperty
                    ));

                    if self.token.kind == TokenType::Literal
                        && self.token.lit.kind == LiteralKind::Ident
                    {
                        self.next_token()?;
                    }

                    if self.token.kind != TokenType::LeftParen {
                        return Err(self.error(ParseErrorKind::ArgumentListExpected));
                    }
                    self.next_token()?;

                    if self.token.kind != TokenType::RightParen {
                        loop {
                            if self.token.kind != TokenType::Literal
                                || self.token.lit.kind != LiteralKind::Ident
                            {
                                return Err(self.error(ParseErrorKind::IdentifierExpected));
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

                    if self.token.kind != TokenType::LeftBrace {
                        return Err(self.error(ParseErrorKind::LeftBraceExpected));
                    }
                    mode = ScanMode::Statement;
                }

                ScanMode::PropertyName => {
                    debug_assert!(stack_top == ScanStack::ObjectLiteral);

                    self.scan_identifier(true)?;

                    if self.token.kind == TokenType::RightBrace {
                        stack.pop();
                        mode = ScanMode::PostPrimaryExpression;
                    } else if matches!(
                        self.token.kind,
                        TokenType::PropertyGetter | TokenType::PropertySetter
                    ) {
                        stack.push(ScanStack::BlockProperty);
                        mode = ScanMode::FunctionArguments;
                    } else {
                        self.next_token()?;
                        if self.token.kind != TokenType::Colon {
                            return Err(self.error(ParseErrorKind::ColonExpected));
                        }
                        mode = ScanMode::PrimaryExpression;
                    }
                }
            }

            range.end = self.cursor;
            self.next_token()?;
        }
    }

    /// Returns true when the current token must be reprocessed.
    fn scan_primary_expression(
        &mut self,
        token_type: TokenType,
        stack_top: ScanStack,
        stack: &mut Vec<ScanStack>,
        mode: &mut ScanMode,
    ) -> Result<bool, ParseError> {
        match token_type {
            TokenType::KeywNew => {
                *mode = ScanMode::PrimaryExpressionAfterNew;
            }
            TokenType::Divide | TokenType::AssignDivide => {
                self.construct_regexp_object(true)?;
                *mode = ScanMode::PostPrimaryExpression;
            }
            TokenType::KeywFunction => {
                stack.push(ScanStack::BlockExpression);
                *mode = ScanMode::FunctionArguments;
            }
            TokenType::LeftParen => {
                stack.push(ScanStack::ParenExpression);
                *mode = ScanMode::PrimaryExpression;
            }
            TokenType::LeftSquare => {
                stack.push(ScanStack::SquareBracketedExpression);
                *mode = ScanMode::PrimaryExpression;
            }
            TokenType::LeftBrace => {
                stack.push(ScanStack::ObjectLiteral);
                *mode = ScanMode::PropertyName;
                return Ok(true);
            }
            TokenType::Literal
            | TokenType::KeywThis
            | TokenType::LitTrue
            | TokenType::LitFalse
            | TokenType::LitNull => {
                *mode = ScanMode::PostPrimaryExpression;
            }
            TokenType::RightSquare => {
                if stack_top != ScanStack::SquareBracketedExpression {
                    return Err(self.error(ParseErrorKind::PrimaryExpExpected));
                }
                stack.pop();
                *mode = ScanMode::PostPrimaryExpression;
            }
            TokenType::Comma => {
                // Array elision.
                if stack_top != ScanStack::SquareBracketedExpression {
                    return Err(self.error(ParseErrorKind::PrimaryExpExpected));
                }
                *mode = ScanMode::PrimaryExpression;
            }
            TokenType::RightParen => {
                *mode = ScanMode::PostPrimaryExpression;
                if stack_top == ScanStack::ParenStatement {
                    *mode = ScanMode::Statement;
                } else if stack_top != ScanStack::ParenExpression {
                    return Err(self.error(ParseErrorKind::PrimaryExpExpected));
                }
                stack.pop();
            }
            TokenType::Semicolon => {
                // Needed by for (;;) statements.
                if stack_top != ScanStack::ParenStatement {
                    return Err(self.error(ParseErrorKind::PrimaryExpExpected));
                }
                *mode = ScanMode::PrimaryExpression;
            }
            _ => {
                return Err(self.error(ParseErrorKind::PrimaryExpExpected));
            }
        }
        Ok(false)
    }

    /// Returns true when the token was fully handled (advance).
    fn scan_post_primary_expression(
        &mut self,
        token_type: TokenType,
        stack: &mut Vec<ScanStack>,
        mode: &mut ScanMode,
    ) -> Result<bool, ParseError> {
        match token_type {
            TokenType::Dot => {
                self.scan_identifier(false)?;
                Ok(true)
            }
            TokenType::LeftParen => {
                stack.push(ScanStack::ParenExpression);
                *mode = ScanMode::PrimaryExpression;
                Ok(true)
            }
            TokenType::LeftSquare => {
                stack.push(ScanStack::SquareBracketedExpression);
                *mode = ScanMode::PrimaryExpression;
                Ok(true)
            }
            TokenType::Increase | TokenType::Decrease => {
                if !self.token.was_newline {
                    *mode = ScanMode::PrimaryExpressionEnd;
                    return Ok(true);
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Returns true when the current token must be reprocessed.
    fn scan_primary_expression_end(
        &mut self,
        token_type: TokenType,
        stack_top: ScanStack,
        end_type: TokenType,
        stack: &mut Vec<ScanStack>,
        mode: &mut ScanMode,
    ) -> Result<bool, ParseError> {
        match token_type {
            TokenType::QuestionMark => {
                stack.push(ScanStack::ColonExpression);
                *mode = ScanMode::PrimaryExpression;
                return Ok(false);
            }
            TokenType::Comma => {
                if stack_top == ScanStack::ObjectLiteral {
                    *mode = ScanMode::PropertyName;
                    return Ok(true);
                }
                *mode = ScanMode::PrimaryExpression;
                return Ok(false);
            }
            TokenType::Colon => {
                if stack_top == ScanStack::ColonExpression
                    || stack_top == ScanStack::ColonStatement
                {
                    *mode = if stack_top == ScanStack::ColonExpression {
                        ScanMode::PrimaryExpression
                    } else {
                        ScanMode::Statement
                    };
                    stack.pop();
                    return Ok(false);
                }
            }
            _ => {}
        }

        if is_binary_op_token(token_type)
            || (token_type == TokenType::Semicolon && stack_top == ScanStack::ParenStatement)
        {
            *mode = ScanMode::PrimaryExpression;
            return Ok(false);
        }

        if (token_type == TokenType::RightSquare
            && stack_top == ScanStack::SquareBracketedExpression)
            || (token_type == TokenType::RightParen && stack_top == ScanStack::ParenExpression)
            || (token_type == TokenType::RightBrace && stack_top == ScanStack::ObjectLiteral)
        {
            stack.pop();
            *mode = ScanMode::PostPrimaryExpression;
            return Ok(false);
        }

        *mode = ScanMode::Statement;
        if token_type == TokenType::RightParen && stack_top == ScanStack::ParenStatement {
            stack.pop();
            return Ok(false);
        }

        // Statement mode is only reachable inside statement-owned
        // blocks or at the head of a switch-body scan.
        if stack_top != ScanStack::BlockStatement
            && stack_top != ScanStack::BlockExpression
            && !(stack_top == ScanStack::Head && end_type == TokenType::ScanSwitch)
        {
            return Err(self.error(ParseErrorKind::InvalidExpression));
        }

        if token_type == TokenType::RightBrace || self.token.was_newline {
            return Ok(true);
        }

        if token_type != TokenType::Semicolon {
            return Err(self.error(ParseErrorKind::InvalidExpression));
        }

        Ok(false)
    }

    /// Returns true when the current token must be reprocessed.
    fn scan_statement(
        &mut self,
        token_type: TokenType,
        stack_top: ScanStack,
        stack: &mut Vec<ScanStack>,
        mode: &mut ScanMode,
    ) -> Result<bool, ParseError> {
        match token_type {
            TokenType::Semicolon
            | TokenType::KeywElse
            | TokenType::KeywDo
            | TokenType::KeywReturn
            | TokenType::KeywTry
            | TokenType::KeywFinally
            | TokenType::KeywDebugger => {
                return Ok(false);
            }
            TokenType::KeywIf
            | TokenType::KeywWhile
            | TokenType::KeywWith
            | TokenType::KeywSwitch
            | TokenType::KeywCatch => {
                self.next_token()?;
                if self.token.kind != TokenType::LeftParen {
                    return Err(self.error(ParseErrorKind::LeftParenExpected));
                }
                stack.push(ScanStack::ParenStatement);
                *mode = ScanMode::PrimaryExpression;
                return Ok(false);
            }
            TokenType::KeywFor => {
                self.next_token()?;
                if self.token.kind != TokenType::LeftParen {
                    return Err(self.error(ParseErrorKind::LeftParenExpected));
                }
                self.next_token()?;
                stack.push(ScanStack::ParenStatement);
                *mode = ScanMode::PrimaryExpression;

                if self.token.kind == TokenType::KeywVar {
                    return Ok(false);
                }
                return Ok(true);
            }
            TokenType::KeywVar | TokenType::KeywThrow => {
                *mode = ScanMode::PrimaryExpression;
                return Ok(false);
            }
            TokenType::KeywBreak | TokenType::KeywContinue => {
                self.next_token()?;
                if !self.token.was_newline
                    && self.token.kind == TokenType::Literal
                    && self.token.lit.kind == LiteralKind::Ident
                {
                    return Ok(false);
                }
                return Ok(true);
            }
            TokenType::KeywDefault => {
                self.next_token()?;
                if self.token.kind != TokenType::Colon {
                    return Err(self.error(ParseErrorKind::ColonExpected));
                }
                return Ok(false);
            }
            TokenType::KeywCase => {
                stack.push(ScanStack::ColonStatement);
                *mode = ScanMode::PrimaryExpression;
                return Ok(false);
            }
            TokenType::RightBrace => {
                if matches!(
                    stack_top,
                    ScanStack::BlockStatement | ScanStack::BlockExpression | ScanStack::BlockProperty
                ) {
                    stack.pop();

                    if stack_top == ScanStack::BlockExpression {
                        *mode = ScanMode::PostPrimaryExpression;
                    } else if stack_top == ScanStack::BlockProperty {
                        *mode = ScanMode::PostPrimaryExpression;
                        self.next_token()?;
                        if self.token.kind != TokenType::Comma
                            && self.token.kind != TokenType::RightBrace
                        {
                            return Err(self.error(ParseErrorKind::ObjectItemSeparatorExpected));
                        }
                        return Ok(true);
                    }
                    return Ok(false);
                }
            }
            TokenType::LeftBrace => {
                stack.push(ScanStack::BlockStatement);
                return Ok(false);
            }
            TokenType::KeywFunction => {
                stack.push(ScanStack::BlockStatement);
                *mode = ScanMode::FunctionArguments;
                return Ok(false);
            }
            _ => {}
        }

        *mode = ScanMode::PrimaryExpression;

        if token_type == TokenType::Literal && self.token.lit.kind == LiteralKind::Ident {
            self.next_token()?;
            if self.token.kind == TokenType::Colon {
                *mode = ScanMode::Statement;
                return Ok(false);
            }
            *mode = ScanMode::PostPrimaryExpression;
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_context;

    fn scan(source: &str, end_type: TokenType) -> (String, TokenType) {
        let mut context = test_context(source);
        context.next_token().unwrap();
        let range = context.scan_until(end_type).unwrap();
        let text = String::from_utf8(context.source[range.start..range.end].to_vec()).unwrap();
        (text, context.token.kind)
    }

    fn scan_error(source: &str, end_type: TokenType) -> ParseErrorKind {
        let mut context = test_context(source);
        context.next_token().unwrap();
        context.scan_until(end_type).unwrap_err().kind
    }

    #[test]
    fn test_scan_while_condition() {
        // The current token is the `(` of the head; the scan stops at
        // the matching `)`.
        let (text, kind) = scan("(a < (b + 1)) {}", TokenType::RightParen);
        assert_eq!(text.trim_end(), "a < (b + 1)");
        assert_eq!(kind, TokenType::RightParen);
    }

    #[test]
    fn test_scan_for_in_detection() {
        let (text, kind) = scan("(var x in obj)", TokenType::KeywIn);
        assert_eq!(kind, TokenType::KeywIn);
        assert_eq!(text.trim_end(), "var x");

        // A plain for head terminates at the first `;` instead.
        let (_, kind) = scan("(var x = 1; x < 2; x++)", TokenType::KeywIn);
        assert_eq!(kind, TokenType::Semicolon);
    }

    #[test]
    fn test_scan_nested_brackets() {
        let (text, _) = scan("(a[b in c] in d)", TokenType::KeywIn);
        assert_eq!(text.trim_end(), "a[b in c]");
    }

    #[test]
    fn test_scan_object_literal() {
        let (text, kind) = scan("({x: 1, 'y': {z: 2}} in d)", TokenType::KeywIn);
        assert_eq!(text.trim_end(), "{x: 1, 'y': {z: 2}}");
        assert_eq!(kind, TokenType::KeywIn);
    }

    #[test]
    fn test_scan_function_expression() {
        let (_, kind) = scan(
            "(function f(a, b) { return a; } in d)",
            TokenType::KeywIn,
        );
        assert_eq!(kind, TokenType::KeywIn);
    }

    #[test]
    fn test_scan_regexp_not_division() {
        let (_, kind) = scan("(/a[/]b/g in d)", TokenType::KeywIn);
        assert_eq!(kind, TokenType::KeywIn);
    }

    #[test]
    fn test_scan_switch_body() {
        let mut context = test_context("case 1: break; default: }");
        context.next_token().unwrap();
        // Statement-mode scan stops immediately at `case`.
        context.scan_until(TokenType::KeywCase).unwrap();
        assert_eq!(context.token.kind, TokenType::KeywCase);
    }

    #[test]
    fn test_scan_switch_body_skips_statements() {
        let mut context = test_context("while (a) { b; } case 2: }");
        context.next_token().unwrap();
        context.scan_until(TokenType::KeywCase).unwrap();
        assert_eq!(context.token.kind, TokenType::KeywCase);
    }

    #[test]
    fn test_scan_errors() {
        assert_eq!(
            scan_error("(a +", TokenType::RightParen),
            ParseErrorKind::ExpressionExpected
        );
        assert_eq!(
            scan_error("(a ])", TokenType::RightParen),
            ParseErrorKind::InvalidExpression
        );
        assert_eq!(
            scan_error("(])", TokenType::RightParen),
            ParseErrorKind::PrimaryExpExpected
        );
    }
}
