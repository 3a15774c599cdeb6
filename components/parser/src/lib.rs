//! Single-pass ECMAScript 5.1 parser for the Quill JavaScript engine.
//!
//! The parser translates source text directly into compact byte code
//! (CBC) in one streaming pass, without building a syntax tree. Nested
//! statements live on an explicit statement stack; constructs that
//! need lookahead (loop heads, switch bodies, for-in detection) are
//! handled by a pre-scanner that records source ranges for the main
//! pass to revisit.
//!
//! # Overview
//!
//! - [`parse`] / [`parse_bytes`] - Compile a script, eval code or a
//!   function body
//! - [`SourceKind`] - What kind of code the source text is
//! - [`lexer`] - Tokens and token classification
//!
//! # Example
//!
//! ```
//! use parser::{parse, SourceKind};
//!
//! let code = parse("var x = 1 + 2;", SourceKind::Global).unwrap();
//! assert!(code.literal_end >= 3);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod lexer;

mod emit;
mod expr;
mod literals;
mod parser;
mod scanner;
mod stack;
mod statements;

pub use parser::{parse, parse_bytes, SourceKind};
