//! Instruction decoder and byte code dump.
//!
//! The decoder turns the raw instruction stream of a compiled-code
//! blob back into structured instructions; the dump renders them as
//! text. Tests use the decoder to assert on emitted opcode sequences.

use crate::code::CompiledCode;
use crate::opcode::{flags, CbcOp, ExtOpcode, Opcode};
use crate::value::Value;

use std::fmt::Write;

/// A decoded CBC instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedInstr {
    /// Byte offset of the instruction start
    pub offset: usize,
    /// The decoded opcode
    pub opcode: CbcOp,
    /// One-byte immediate, when the opcode has one
    pub byte_arg: Option<u8>,
    /// Decoded literal indices, in operand order
    pub literals: Vec<u16>,
    /// Branch displacement, when the opcode is a branch
    pub branch_offset: Option<u32>,
}

impl DecodedInstr {
    /// Absolute target offset of a branch instruction.
    pub fn branch_target(&self) -> Option<usize> {
        let displacement = self.branch_offset? as usize;
        if self.opcode.is_forward_branch() {
            Some(self.offset + displacement)
        } else {
            Some(self.offset - displacement)
        }
    }
}

/// Decode the instruction stream of a compiled-code blob.
///
/// Returns an error description when the stream is malformed
/// (unknown opcode byte or truncated operand).
pub fn decode(code: &CompiledCode) -> Result<Vec<DecodedInstr>, String> {
    let encoding = code.literal_encoding();
    let bytes = &code.code;
    let mut instructions = Vec::new();
    let mut cursor = 0;

    while cursor < bytes.len() {
        let offset = cursor;
        let opcode = if bytes[cursor] == Opcode::ExtOpcode as u8 {
            let ext_byte = *bytes
                .get(cursor + 1)
                .ok_or_else(|| format!("Truncated extended opcode at offset {}", offset))?;
            let ext = ExtOpcode::from_byte(ext_byte)
                .ok_or_else(|| format!("Unknown extended opcode {} at offset {}", ext_byte, offset))?;
            cursor += 2;
            CbcOp::Ext(ext)
        } else {
            let op = Opcode::from_byte(bytes[cursor])
                .ok_or_else(|| format!("Unknown opcode {} at offset {}", bytes[cursor], offset))?;
            cursor += 1;
            CbcOp::Plain(op)
        };

        let op_flags = opcode.flags();
        let mut byte_arg = None;
        let mut literals = Vec::new();
        let mut branch_offset = None;

        if op_flags & flags::BYTE_ARG != 0 {
            byte_arg = Some(
                *bytes
                    .get(cursor)
                    .ok_or_else(|| format!("Truncated byte argument at offset {}", offset))?,
            );
            cursor += 1;
        }

        if op_flags & flags::LITERAL_ARG != 0 {
            let (index, consumed) = encoding
                .decode_index(&bytes[cursor..])
                .ok_or_else(|| format!("Truncated literal argument at offset {}", offset))?;
            literals.push(index);
            cursor += consumed;
        }

        if op_flags & flags::LITERAL_ARG2 != 0 {
            let (index, consumed) = encoding
                .decode_index(&bytes[cursor..])
                .ok_or_else(|| format!("Truncated literal argument at offset {}", offset))?;
            literals.push(index);
            cursor += consumed;
        }

        if op_flags & flags::BRANCH_ARG != 0 {
            let length = opcode.branch_offset_length() as usize;
            if cursor + length > bytes.len() {
                return Err(format!("Truncated branch argument at offset {}", offset));
            }
            let mut displacement: u32 = 0;
            for _ in 0..length {
                displacement = (displacement << 8) | bytes[cursor] as u32;
                cursor += 1;
            }
            branch_offset = Some(displacement);
        }

        instructions.push(DecodedInstr {
            offset,
            opcode,
            byte_arg,
            literals,
            branch_offset,
        });
    }

    Ok(instructions)
}

/// The opcode names of the instruction stream, in order.
///
/// Convenience wrapper over [`decode`] for tests.
pub fn opcode_names(code: &CompiledCode) -> Result<Vec<&'static str>, String> {
    Ok(decode(code)?.iter().map(|i| i.opcode.name()).collect())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Ident(bytes) => format!("ident({})", String::from_utf8_lossy(bytes)),
        Value::String(bytes) => format!("string({:?})", String::from_utf8_lossy(bytes)),
        Value::Number(n) => format!("number({})", n),
        Value::Function(_) => "function".to_string(),
        Value::Regexp(bytes) => format!("regexp({})", String::from_utf8_lossy(bytes)),
    }
}

/// Render a compiled-code blob as text: header summary, then one line
/// per instruction with decoded operands.
pub fn dump(code: &CompiledCode) -> Result<String, String> {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Literal encoding: {}",
        match code.literal_encoding() {
            crate::code::LiteralEncoding::Small => "small",
            crate::code::LiteralEncoding::Full => "full",
        }
    );
    let _ = writeln!(out, "Argument range end: {}", code.argument_end);
    let _ = writeln!(out, "Register range end: {}", code.register_end);
    let _ = writeln!(out, "Identifier range end: {}", code.ident_end);
    let _ = writeln!(out, "Literal range end: {}", code.literal_end);
    out.push('\n');

    for instr in decode(code)? {
        let _ = write!(out, " {:3} : {}", instr.offset, instr.opcode.name());

        if let Some(byte) = instr.byte_arg {
            let _ = write!(out, " byte_arg:{}", byte);
        }

        for &index in &instr.literals {
            let _ = write!(out, " idx:{}({})", index, code.index_group(index));
            if let Some(value) = code.literals.get(index as usize) {
                let _ = write!(out, "->{}", render_value(value));
            }
        }

        if let Some(displacement) = instr.branch_offset {
            // branch_target is always available here
            let target = instr.branch_target().unwrap_or(0);
            let _ = write!(out, " offset:{}(->{})", displacement, target);
        }

        out.push('\n');
    }

    Ok(out)
}
