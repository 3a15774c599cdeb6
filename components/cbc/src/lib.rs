//! Compact byte code (CBC) for the Quill JavaScript engine.
//!
//! CBC is a byte code representation of ECMAScript designed for low
//! memory environments. Most instructions are one or two bytes long.
//! The execution model is a stack machine whose maximum stack depth is
//! known in advance for each function.
//!
//! # Overview
//!
//! - [`Opcode`] / [`ExtOpcode`] - The instruction set, with operand
//!   flags, stack deltas and branch-offset widths
//! - [`CbcOp`] - Either a plain or an extended opcode
//! - [`CompiledCode`] - A compiled function or script: header, literal
//!   pool and instruction stream
//! - [`Value`] - A literal pool entry
//! - [`disasm`] - Instruction decoder and human-readable dump
//!
//! # Encoding
//!
//! Each instruction starts with one opcode byte; the distinguished
//! byte 0 (`CBC_EXT_OPCODE`) introduces a second byte selecting an
//! extended opcode. Operands follow as described by the opcode flags:
//! a one-byte immediate, one or two literal indices (one or two bytes
//! each, depending on the literal encoding mode), or a branch
//! displacement of one to three bytes, higher bytes first. Branch
//! displacements are positive; the direction is implied by the opcode.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod code;
pub mod disasm;
pub mod opcode;
pub mod value;

pub use code::{status_flags, CompiledCode, LiteralEncoding};
pub use opcode::{flags, CbcOp, ExtOpcode, Opcode};
pub use value::Value;
