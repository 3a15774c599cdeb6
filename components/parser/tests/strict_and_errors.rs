//! Strict Mode and Error Reporting Integration Tests
//!
//! Exercises the error taxonomy end to end: every failure aborts the
//! whole compilation and reports the offending token position.

use core_types::ParseErrorKind;
use parser::{parse, SourceKind};

fn error_kind(source: &str) -> ParseErrorKind {
    parse(source, SourceKind::Global).expect_err(source).kind
}

#[test]
fn test_expected_token_errors() {
    assert_eq!(error_kind("if a) {}"), ParseErrorKind::LeftParenExpected);
    assert_eq!(error_kind("if (a {}"), ParseErrorKind::RightParenExpected);
    assert_eq!(error_kind("try a;"), ParseErrorKind::LeftBraceExpected);
    assert_eq!(
        error_kind("switch(a){case 1 break;}"),
        ParseErrorKind::ColonExpected
    );
    assert_eq!(error_kind("do a; until (b);"), ParseErrorKind::WhileExpected);
    assert_eq!(error_kind("a b"), ParseErrorKind::SemicolonExpected);
    assert_eq!(error_kind("var 1;"), ParseErrorKind::IdentifierExpected);
    assert_eq!(error_kind("x = {a 1};"), ParseErrorKind::ColonExpected);
    assert_eq!(
        error_kind("x = [1 2];"),
        ParseErrorKind::ArrayItemSeparatorExpected
    );
    assert_eq!(
        error_kind("x = {a: 1 b: 2};"),
        ParseErrorKind::ObjectItemSeparatorExpected
    );
}

#[test]
fn test_grammar_errors() {
    assert_eq!(error_kind("}"), ParseErrorKind::InvalidRightBrace);
    assert_eq!(error_kind("if (a) }"), ParseErrorKind::StatementExpected);
    assert_eq!(error_kind("x = ;"), ParseErrorKind::PrimaryExpExpected);
    assert_eq!(error_kind("throw\nx;"), ParseErrorKind::ExpressionExpected);
    assert_eq!(error_kind("switch (a) { b; }"), ParseErrorKind::InvalidSwitch);
    assert_eq!(
        error_kind("try {} finally junk;"),
        ParseErrorKind::LeftBraceExpected
    );
    assert_eq!(error_kind("a ? b;"), ParseErrorKind::ColonForConditionalExpected);
    assert_eq!(error_kind("x = (a;"), ParseErrorKind::RightParenExpected);
}

#[test]
fn test_break_continue_label_errors() {
    assert_eq!(error_kind("break;"), ParseErrorKind::InvalidBreak);
    assert_eq!(error_kind("break x;"), ParseErrorKind::InvalidBreakLabel);
    assert_eq!(error_kind("continue;"), ParseErrorKind::InvalidContinue);
    assert_eq!(
        error_kind("x: continue x;"),
        ParseErrorKind::InvalidContinueLabel
    );
    assert_eq!(error_kind("x: x: a;"), ParseErrorKind::DuplicatedLabel);
    assert_eq!(
        error_kind("switch(a){default:;default:;}"),
        ParseErrorKind::MultipleDefaultsNotAllowed
    );
    assert_eq!(error_kind("return;"), ParseErrorKind::InvalidReturn);
}

#[test]
fn test_strict_mode_restrictions() {
    assert_eq!(
        error_kind("'use strict'; with (a) {}"),
        ParseErrorKind::WithNotAllowed
    );
    assert_eq!(
        error_kind("'use strict'; eval = 1;"),
        ParseErrorKind::EvalCannotAssigned
    );
    assert_eq!(
        error_kind("'use strict'; arguments = 1;"),
        ParseErrorKind::ArgumentsCannotAssigned
    );
    assert_eq!(
        error_kind("'use strict'; eval++;"),
        ParseErrorKind::EvalCannotAssigned
    );
    assert_eq!(
        error_kind("'use strict'; var interface;"),
        ParseErrorKind::StrictIdentNotAllowed
    );
    assert_eq!(
        error_kind("'use strict'; var eval;"),
        ParseErrorKind::EvalNotAllowed
    );
    assert_eq!(
        error_kind("function f(a, a) { 'use strict'; }"),
        ParseErrorKind::NonStrictArgDefinition
    );
}

#[test]
fn test_non_strict_allows_the_same() {
    assert!(parse("with (a) {}", SourceKind::Global).is_ok());
    assert!(parse("eval = 1;", SourceKind::Global).is_ok());
    assert!(parse("var interface;", SourceKind::Global).is_ok());
    assert!(parse("function f(a, a) { return a; }", SourceKind::Global).is_ok());
}

#[test]
fn test_strict_mode_is_inherited_by_nested_functions() {
    assert_eq!(
        error_kind("'use strict'; function f() { with (a) {} }"),
        ParseErrorKind::WithNotAllowed
    );
    // A nested directive does not leak outward.
    assert!(parse(
        "function f() { 'use strict'; } with (a) {}",
        SourceKind::Global
    )
    .is_ok());
}

#[test]
fn test_directive_must_be_exact() {
    // An escape sequence disqualifies the directive.
    assert!(parse("'use strict\\u0020trailing'; with (a) {}", SourceKind::Global).is_ok());
    assert!(parse("'USE STRICT'; with (a) {}", SourceKind::Global).is_ok());
}

#[test]
fn test_error_positions_point_at_offending_token() {
    let error = parse("var x = 1;\nvar y = ;", SourceKind::Global).unwrap_err();
    assert_eq!(error.line, 2);
    assert_eq!(error.column, 9);

    let error = parse("  break;", SourceKind::Global).unwrap_err();
    assert_eq!(error.line, 1);
    assert_eq!(error.column, 3);
}

#[test]
fn test_lexical_errors_surface() {
    assert_eq!(error_kind("var x = 'abc"), ParseErrorKind::UnterminatedString);
    assert_eq!(error_kind("/* comment"), ParseErrorKind::UnterminatedMultilineComment);
    assert_eq!(error_kind("x = /abc"), ParseErrorKind::UnterminatedRegexp);
    assert_eq!(error_kind("x = /a/gg;"), ParseErrorKind::DuplicatedRegexpFlag);
    assert_eq!(error_kind("x = /a/q;"), ParseErrorKind::UnknownRegexpFlag);
    assert_eq!(error_kind("var x = 09;"), ParseErrorKind::InvalidNumber);
    assert_eq!(error_kind("x = @;"), ParseErrorKind::InvalidCharacter);
}

#[test]
fn test_eval_and_function_body_kinds() {
    assert!(parse("x + 1;", SourceKind::Eval).is_ok());
    assert!(parse("return x;", SourceKind::FunctionBody).is_ok());
    assert_eq!(
        parse("return x;", SourceKind::Eval).unwrap_err().kind,
        ParseErrorKind::InvalidReturn
    );
}
