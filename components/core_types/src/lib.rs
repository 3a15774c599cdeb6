//! Core types for the Quill JavaScript engine.
//!
//! This crate provides the foundational types shared by the compiler
//! components: error kinds, the compile error record, and source
//! location tracking.
//!
//! # Overview
//!
//! - [`ParseError`] - A compilation failure with its source position
//! - [`ParseErrorKind`] - Every way a compilation can fail
//! - [`SourcePosition`] - Source code location
//!
//! # Examples
//!
//! ```
//! use core_types::{ParseError, ParseErrorKind};
//!
//! let error = ParseError {
//!     kind: ParseErrorKind::SemicolonExpected,
//!     line: 3,
//!     column: 14,
//! };
//!
//! assert_eq!(error.kind.message(), "Expected ';' token");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;

pub use error::{ParseError, ParseErrorKind};
pub use source::SourcePosition;
