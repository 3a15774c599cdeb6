//! The CBC instruction set.
//!
//! Opcodes are defined in one table carrying three properties per
//! instruction: operand flags, stack delta, and branch-offset width.
//! The numeric layout of the table is part of the contract:
//!
//! - byte 0 is the extended-opcode prefix;
//! - branch instructions come in groups of three (one, two and three
//!   byte offsets), so `base as u8 + (width - 1)` selects the width;
//! - operations with a no-result and a push-result form are adjacent,
//!   so `base as u8 + 1` converts the first into the second;
//! - unary operations are followed by their `*_LITERAL` form, binary
//!   operations by their `*_RIGHT_LITERAL` and `*_TWO_LITERALS` forms;
//! - the twelve assignment families in the plain and the extended
//!   table use the same internal order, so the push-result form of a
//!   plain assignment is found at the same family offset in the
//!   extended table.
//!
//! Unit tests at the bottom of this module pin the layout down.

/// Operand description bits for an opcode.
pub mod flags {
    /// The instruction is followed by a one-byte immediate.
    pub const BYTE_ARG: u8 = 0x01;
    /// The instruction is followed by a literal index.
    pub const LITERAL_ARG: u8 = 0x02;
    /// The instruction is followed by a second literal index.
    pub const LITERAL_ARG2: u8 = 0x04;
    /// The instruction is followed by a branch displacement.
    pub const BRANCH_ARG: u8 = 0x08;
    /// The branch displacement is forward (otherwise backward).
    pub const FORWARD_BRANCH: u8 = 0x10;
    /// The byte immediate is a pop count for the value stack.
    pub const POP_STACK_BYTE_ARG: u8 = 0x20;
}

const NONE: u8 = 0;
const BYTE: u8 = flags::BYTE_ARG;
const LIT: u8 = flags::LITERAL_ARG;
const LIT2: u8 = flags::LITERAL_ARG2;
const BRANCH: u8 = flags::BRANCH_ARG;
const FWD: u8 = flags::FORWARD_BRANCH;
const POPS: u8 = flags::POP_STACK_BYTE_ARG;

macro_rules! define_opcodes {
    (
        $(#[$enum_attr:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident => ($flags:expr, $delta:expr, $width:expr), )*
        }
    ) => {
        $(#[$enum_attr])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        #[allow(missing_docs)]
        $vis enum $name {
            $( $variant, )*
        }

        impl $name {
            const TABLE: &'static [$name] = &[ $( $name::$variant, )* ];
            const FLAGS: &'static [u8] = &[ $( $flags, )* ];
            const DELTAS: &'static [i8] = &[ $( $delta, )* ];
            const WIDTHS: &'static [u8] = &[ $( $width, )* ];
            const NAMES: &'static [&'static str] = &[ $( stringify!($variant), )* ];

            /// Number of defined opcodes.
            pub const COUNT: usize = Self::TABLE.len();

            /// Decode an opcode byte.
            pub fn from_byte(byte: u8) -> Option<Self> {
                Self::TABLE.get(byte as usize).copied()
            }

            /// Operand description bits.
            pub fn flags(self) -> u8 {
                Self::FLAGS[self as usize]
            }

            /// Net effect of the instruction on the value stack.
            ///
            /// Instructions with a pop-count byte immediate additionally
            /// pop that many values.
            pub fn stack_delta(self) -> i8 {
                Self::DELTAS[self as usize]
            }

            /// Width in bytes of the branch displacement (0 for
            /// non-branch instructions).
            pub fn branch_offset_length(self) -> u8 {
                Self::WIDTHS[self as usize]
            }

            /// Instruction name for dumps.
            pub fn name(self) -> &'static str {
                Self::NAMES[self as usize]
            }

            /// True when the instruction carries a branch displacement.
            pub fn has_branch_arg(self) -> bool {
                self.flags() & BRANCH != 0
            }

            /// True for forward branches.
            pub fn is_forward_branch(self) -> bool {
                self.flags() & (BRANCH | FWD) == (BRANCH | FWD)
            }

            /// Select the form of this branch instruction with the
            /// given displacement width (1, 2 or 3 bytes).
            ///
            /// Must be called on the one-byte base form.
            pub fn widen(self, width: u8) -> Self {
                debug_assert!(self.branch_offset_length() == 1);
                debug_assert!((1..=3).contains(&width));
                Self::TABLE[self as usize + (width as usize - 1)]
            }
        }
    };
}

define_opcodes! {
    /// A plain (single byte) CBC opcode.
    pub enum Opcode {
        // Byte 0 is the extended opcode prefix.
        ExtOpcode => (NONE, 0, 0),

        // Branch instructions, in groups of three offset widths.
        JumpForward => (BRANCH | FWD, 0, 1),
        JumpForward2 => (BRANCH | FWD, 0, 2),
        JumpForward3 => (BRANCH | FWD, 0, 3),
        JumpBackward => (BRANCH, 0, 1),
        JumpBackward2 => (BRANCH, 0, 2),
        JumpBackward3 => (BRANCH, 0, 3),
        BranchIfTrueForward => (BRANCH | FWD, -1, 1),
        BranchIfTrueForward2 => (BRANCH | FWD, -1, 2),
        BranchIfTrueForward3 => (BRANCH | FWD, -1, 3),
        BranchIfTrueBackward => (BRANCH, -1, 1),
        BranchIfTrueBackward2 => (BRANCH, -1, 2),
        BranchIfTrueBackward3 => (BRANCH, -1, 3),
        BranchIfFalseForward => (BRANCH | FWD, -1, 1),
        BranchIfFalseForward2 => (BRANCH | FWD, -1, 2),
        BranchIfFalseForward3 => (BRANCH | FWD, -1, 3),
        BranchIfFalseBackward => (BRANCH, -1, 1),
        BranchIfFalseBackward2 => (BRANCH, -1, 2),
        BranchIfFalseBackward3 => (BRANCH, -1, 3),
        JumpForwardExitContext => (BRANCH | FWD, 0, 1),
        JumpForwardExitContext2 => (BRANCH | FWD, 0, 2),
        JumpForwardExitContext3 => (BRANCH | FWD, 0, 3),
        BranchIfLogicalTrue => (BRANCH | FWD, -1, 1),
        BranchIfLogicalTrue2 => (BRANCH | FWD, -1, 2),
        BranchIfLogicalTrue3 => (BRANCH | FWD, -1, 3),
        BranchIfLogicalFalse => (BRANCH | FWD, -1, 1),
        BranchIfLogicalFalse2 => (BRANCH | FWD, -1, 2),
        BranchIfLogicalFalse3 => (BRANCH | FWD, -1, 3),
        BranchIfStrictEqual => (BRANCH | FWD, -1, 1),
        BranchIfStrictEqual2 => (BRANCH | FWD, -1, 2),
        BranchIfStrictEqual3 => (BRANCH | FWD, -1, 3),

        // Basic instructions.
        Pop => (NONE, -1, 0),
        PopBlock => (NONE, -1, 0),
        Return => (NONE, -1, 0),
        ReturnWithUndefined => (NONE, 0, 0),
        Throw => (NONE, -1, 0),
        ContextEnd => (NONE, 0, 0),
        PushIdent => (LIT, 1, 0),
        PushLiteral => (LIT, 1, 0),
        PushTwoLiterals => (LIT | LIT2, 2, 0),
        PushUndefined => (NONE, 1, 0),
        PushTrue => (NONE, 1, 0),
        PushFalse => (NONE, 1, 0),
        PushNull => (NONE, 1, 0),
        PushThis => (NONE, 1, 0),
        PropGet => (NONE, -1, 0),
        PropStringGet => (LIT, 0, 0),
        CreateObject => (NONE, 1, 0),
        SetProperty => (LIT, -1, 0),
        CreateArray => (NONE, 1, 0),
        ArrayAppend => (BYTE | POPS, 0, 0),
        PushElision => (NONE, 1, 0),
        New => (BYTE | POPS, 0, 0),
        NewIdent => (LIT | BYTE | POPS, 1, 0),
        DefineVars => (LIT, 0, 0),
        InitializeVar => (LIT | LIT2, 0, 0),

        // Unary operations: base form, then the fused-literal form.
        Plus => (NONE, 0, 0),
        PlusLiteral => (LIT, 1, 0),
        Negate => (NONE, 0, 0),
        NegateLiteral => (LIT, 1, 0),
        LogicalNot => (NONE, 0, 0),
        LogicalNotLiteral => (LIT, 1, 0),
        BitNot => (NONE, 0, 0),
        BitNotLiteral => (LIT, 1, 0),
        Void => (NONE, 0, 0),
        VoidLiteral => (LIT, 1, 0),
        TypeOf => (NONE, 0, 0),
        TypeOfLiteral => (LIT, 1, 0),

        // Binary operations: base, right-literal, two-literals.
        BitOr => (NONE, -1, 0),
        BitOrRightLiteral => (LIT, 0, 0),
        BitOrTwoLiterals => (LIT | LIT2, 1, 0),
        BitXor => (NONE, -1, 0),
        BitXorRightLiteral => (LIT, 0, 0),
        BitXorTwoLiterals => (LIT | LIT2, 1, 0),
        BitAnd => (NONE, -1, 0),
        BitAndRightLiteral => (LIT, 0, 0),
        BitAndTwoLiterals => (LIT | LIT2, 1, 0),
        Equal => (NONE, -1, 0),
        EqualRightLiteral => (LIT, 0, 0),
        EqualTwoLiterals => (LIT | LIT2, 1, 0),
        NotEqual => (NONE, -1, 0),
        NotEqualRightLiteral => (LIT, 0, 0),
        NotEqualTwoLiterals => (LIT | LIT2, 1, 0),
        StrictEqual => (NONE, -1, 0),
        StrictEqualRightLiteral => (LIT, 0, 0),
        StrictEqualTwoLiterals => (LIT | LIT2, 1, 0),
        StrictNotEqual => (NONE, -1, 0),
        StrictNotEqualRightLiteral => (LIT, 0, 0),
        StrictNotEqualTwoLiterals => (LIT | LIT2, 1, 0),
        Less => (NONE, -1, 0),
        LessRightLiteral => (LIT, 0, 0),
        LessTwoLiterals => (LIT | LIT2, 1, 0),
        Greater => (NONE, -1, 0),
        GreaterRightLiteral => (LIT, 0, 0),
        GreaterTwoLiterals => (LIT | LIT2, 1, 0),
        LessEqual => (NONE, -1, 0),
        LessEqualRightLiteral => (LIT, 0, 0),
        LessEqualTwoLiterals => (LIT | LIT2, 1, 0),
        GreaterEqual => (NONE, -1, 0),
        GreaterEqualRightLiteral => (LIT, 0, 0),
        GreaterEqualTwoLiterals => (LIT | LIT2, 1, 0),
        In => (NONE, -1, 0),
        InRightLiteral => (LIT, 0, 0),
        InTwoLiterals => (LIT | LIT2, 1, 0),
        InstanceOf => (NONE, -1, 0),
        InstanceOfRightLiteral => (LIT, 0, 0),
        InstanceOfTwoLiterals => (LIT | LIT2, 1, 0),
        LeftShift => (NONE, -1, 0),
        LeftShiftRightLiteral => (LIT, 0, 0),
        LeftShiftTwoLiterals => (LIT | LIT2, 1, 0),
        RightShift => (NONE, -1, 0),
        RightShiftRightLiteral => (LIT, 0, 0),
        RightShiftTwoLiterals => (LIT | LIT2, 1, 0),
        UnsRightShift => (NONE, -1, 0),
        UnsRightShiftRightLiteral => (LIT, 0, 0),
        UnsRightShiftTwoLiterals => (LIT | LIT2, 1, 0),
        Add => (NONE, -1, 0),
        AddRightLiteral => (LIT, 0, 0),
        AddTwoLiterals => (LIT | LIT2, 1, 0),
        Subtract => (NONE, -1, 0),
        SubtractRightLiteral => (LIT, 0, 0),
        SubtractTwoLiterals => (LIT | LIT2, 1, 0),
        Multiply => (NONE, -1, 0),
        MultiplyRightLiteral => (LIT, 0, 0),
        MultiplyTwoLiterals => (LIT | LIT2, 1, 0),
        Divide => (NONE, -1, 0),
        DivideRightLiteral => (LIT, 0, 0),
        DivideTwoLiterals => (LIT | LIT2, 1, 0),
        Modulo => (NONE, -1, 0),
        ModuloRightLiteral => (LIT, 0, 0),
        ModuloTwoLiterals => (LIT | LIT2, 1, 0),

        // Unary lvalue operations: no-result and push-result forms
        // interleaved, for the plain, ident and prop-string targets.
        Delete => (NONE, -2, 0),
        DeletePushResult => (NONE, -1, 0),
        DeleteIdent => (LIT, 0, 0),
        DeleteIdentPushResult => (LIT, 1, 0),
        DeletePropString => (LIT, -1, 0),
        DeletePropStringPushResult => (LIT, 0, 0),
        PreIncr => (NONE, -2, 0),
        PreIncrPushResult => (NONE, -1, 0),
        PreIncrIdent => (LIT, 0, 0),
        PreIncrIdentPushResult => (LIT, 1, 0),
        PreIncrPropString => (LIT, -1, 0),
        PreIncrPropStringPushResult => (LIT, 0, 0),
        PreDecr => (NONE, -2, 0),
        PreDecrPushResult => (NONE, -1, 0),
        PreDecrIdent => (LIT, 0, 0),
        PreDecrIdentPushResult => (LIT, 1, 0),
        PreDecrPropString => (LIT, -1, 0),
        PreDecrPropStringPushResult => (LIT, 0, 0),
        PostIncr => (NONE, -2, 0),
        PostIncrPushResult => (NONE, -1, 0),
        PostIncrIdent => (LIT, 0, 0),
        PostIncrIdentPushResult => (LIT, 1, 0),
        PostIncrPropString => (LIT, -1, 0),
        PostIncrPropStringPushResult => (LIT, 0, 0),
        PostDecr => (NONE, -2, 0),
        PostDecrPushResult => (NONE, -1, 0),
        PostDecrIdent => (LIT, 0, 0),
        PostDecrIdentPushResult => (LIT, 1, 0),
        PostDecrPropString => (LIT, -1, 0),
        PostDecrPropStringPushResult => (LIT, 0, 0),

        // Call operations, no-result and push-result interleaved.
        Call => (BYTE | POPS, -1, 0),
        CallPushResult => (BYTE | POPS, 0, 0),
        CallIdent => (LIT | BYTE | POPS, 0, 0),
        CallIdentPushResult => (LIT | BYTE | POPS, 1, 0),
        CallProp => (BYTE | POPS, -2, 0),
        CallPropPushResult => (BYTE | POPS, -1, 0),
        CallPropString => (LIT | BYTE | POPS, -1, 0),
        CallPropStringPushResult => (LIT | BYTE | POPS, 0, 0),

        // Assignment operations: base, ident, ident-literal and
        // prop-string targets. Push-result forms live in the extended
        // table at the same family offsets.
        Assign => (NONE, -3, 0),
        AssignIdent => (LIT, -1, 0),
        AssignIdentLiteral => (LIT | LIT2, 0, 0),
        AssignPropString => (LIT, -2, 0),
        AssignAdd => (NONE, -3, 0),
        AssignAddIdent => (LIT, -1, 0),
        AssignAddIdentLiteral => (LIT | LIT2, 0, 0),
        AssignAddPropString => (LIT, -2, 0),
        AssignSubtract => (NONE, -3, 0),
        AssignSubtractIdent => (LIT, -1, 0),
        AssignSubtractIdentLiteral => (LIT | LIT2, 0, 0),
        AssignSubtractPropString => (LIT, -2, 0),
        AssignMultiply => (NONE, -3, 0),
        AssignMultiplyIdent => (LIT, -1, 0),
        AssignMultiplyIdentLiteral => (LIT | LIT2, 0, 0),
        AssignMultiplyPropString => (LIT, -2, 0),
        AssignDivide => (NONE, -3, 0),
        AssignDivideIdent => (LIT, -1, 0),
        AssignDivideIdentLiteral => (LIT | LIT2, 0, 0),
        AssignDividePropString => (LIT, -2, 0),
        AssignModulo => (NONE, -3, 0),
        AssignModuloIdent => (LIT, -1, 0),
        AssignModuloIdentLiteral => (LIT | LIT2, 0, 0),
        AssignModuloPropString => (LIT, -2, 0),
        AssignLeftShift => (NONE, -3, 0),
        AssignLeftShiftIdent => (LIT, -1, 0),
        AssignLeftShiftIdentLiteral => (LIT | LIT2, 0, 0),
        AssignLeftShiftPropString => (LIT, -2, 0),
        AssignRightShift => (NONE, -3, 0),
        AssignRightShiftIdent => (LIT, -1, 0),
        AssignRightShiftIdentLiteral => (LIT | LIT2, 0, 0),
        AssignRightShiftPropString => (LIT, -2, 0),
        AssignUnsRightShift => (NONE, -3, 0),
        AssignUnsRightShiftIdent => (LIT, -1, 0),
        AssignUnsRightShiftIdentLiteral => (LIT | LIT2, 0, 0),
        AssignUnsRightShiftPropString => (LIT, -2, 0),
        AssignBitAnd => (NONE, -3, 0),
        AssignBitAndIdent => (LIT, -1, 0),
        AssignBitAndIdentLiteral => (LIT | LIT2, 0, 0),
        AssignBitAndPropString => (LIT, -2, 0),
        AssignBitOr => (NONE, -3, 0),
        AssignBitOrIdent => (LIT, -1, 0),
        AssignBitOrIdentLiteral => (LIT | LIT2, 0, 0),
        AssignBitOrPropString => (LIT, -2, 0),
        AssignBitXor => (NONE, -3, 0),
        AssignBitXorIdent => (LIT, -1, 0),
        AssignBitXorIdentLiteral => (LIT | LIT2, 0, 0),
        AssignBitXorPropString => (LIT, -2, 0),
    }
}

define_opcodes! {
    /// An extended CBC opcode, selected by a second instruction byte.
    pub enum ExtOpcode {
        Nop => (NONE, 0, 0),

        // Context-creating branch instructions. The stack deltas
        // include the context allocations of the interpreter.
        WithCreateContext => (BRANCH | FWD, 1, 1),
        WithCreateContext2 => (BRANCH | FWD, 1, 2),
        WithCreateContext3 => (BRANCH | FWD, 1, 3),
        ForInGetNext => (NONE, 1, 0),
        ForInCreateContext => (BRANCH | FWD, 2, 1),
        ForInCreateContext2 => (BRANCH | FWD, 2, 2),
        ForInCreateContext3 => (BRANCH | FWD, 2, 3),
        SetGetter => (LIT, -1, 0),
        BranchIfForInHasNext => (BRANCH, 0, 1),
        BranchIfForInHasNext2 => (BRANCH, 0, 2),
        BranchIfForInHasNext3 => (BRANCH, 0, 3),
        SetSetter => (LIT, -1, 0),
        TryCreateContext => (BRANCH | FWD, 3, 1),
        TryCreateContext2 => (BRANCH | FWD, 3, 2),
        TryCreateContext3 => (BRANCH | FWD, 3, 3),
        PushUndefinedBase => (NONE, 1, 0),
        Catch => (BRANCH | FWD, 1, 1),
        Catch2 => (BRANCH | FWD, 1, 2),
        Catch3 => (BRANCH | FWD, 1, 3),
        Debugger => (NONE, 0, 0),
        Finally => (BRANCH | FWD, 0, 1),
        Finally2 => (BRANCH | FWD, 0, 2),
        Finally3 => (BRANCH | FWD, 0, 3),

        // Direct eval calls.
        CallEval => (BYTE | POPS, 0, 0),
        CallEvalPushResult => (BYTE | POPS, 1, 0),

        // Push-result forms of the assignment operations, in the same
        // family order as the plain table.
        AssignPushResult => (NONE, -2, 0),
        AssignIdentPushResult => (LIT, 0, 0),
        AssignIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignPropStringPushResult => (LIT, -1, 0),
        AssignAddPushResult => (NONE, -2, 0),
        AssignAddIdentPushResult => (LIT, 0, 0),
        AssignAddIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignAddPropStringPushResult => (LIT, -1, 0),
        AssignSubtractPushResult => (NONE, -2, 0),
        AssignSubtractIdentPushResult => (LIT, 0, 0),
        AssignSubtractIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignSubtractPropStringPushResult => (LIT, -1, 0),
        AssignMultiplyPushResult => (NONE, -2, 0),
        AssignMultiplyIdentPushResult => (LIT, 0, 0),
        AssignMultiplyIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignMultiplyPropStringPushResult => (LIT, -1, 0),
        AssignDividePushResult => (NONE, -2, 0),
        AssignDivideIdentPushResult => (LIT, 0, 0),
        AssignDivideIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignDividePropStringPushResult => (LIT, -1, 0),
        AssignModuloPushResult => (NONE, -2, 0),
        AssignModuloIdentPushResult => (LIT, 0, 0),
        AssignModuloIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignModuloPropStringPushResult => (LIT, -1, 0),
        AssignLeftShiftPushResult => (NONE, -2, 0),
        AssignLeftShiftIdentPushResult => (LIT, 0, 0),
        AssignLeftShiftIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignLeftShiftPropStringPushResult => (LIT, -1, 0),
        AssignRightShiftPushResult => (NONE, -2, 0),
        AssignRightShiftIdentPushResult => (LIT, 0, 0),
        AssignRightShiftIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignRightShiftPropStringPushResult => (LIT, -1, 0),
        AssignUnsRightShiftPushResult => (NONE, -2, 0),
        AssignUnsRightShiftIdentPushResult => (LIT, 0, 0),
        AssignUnsRightShiftIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignUnsRightShiftPropStringPushResult => (LIT, -1, 0),
        AssignBitAndPushResult => (NONE, -2, 0),
        AssignBitAndIdentPushResult => (LIT, 0, 0),
        AssignBitAndIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignBitAndPropStringPushResult => (LIT, -1, 0),
        AssignBitOrPushResult => (NONE, -2, 0),
        AssignBitOrIdentPushResult => (LIT, 0, 0),
        AssignBitOrIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignBitOrPropStringPushResult => (LIT, -1, 0),
        AssignBitXorPushResult => (NONE, -2, 0),
        AssignBitXorIdentPushResult => (LIT, 0, 0),
        AssignBitXorIdentLiteralPushResult => (LIT | LIT2, 1, 0),
        AssignBitXorPropStringPushResult => (LIT, -1, 0),
    }
}

impl Opcode {
    fn in_family(self, first: Opcode, last: Opcode, stride: u8, offset: u8) -> bool {
        let b = self as u8;
        b >= first as u8 && b <= last as u8 && (b - first as u8) % stride == offset
    }

    /// True for the base form of a unary or binary operation that can
    /// take its operand from a fused push-literal.
    pub fn has_literal_form(self) -> bool {
        self.in_family(Opcode::Plus, Opcode::TypeOfLiteral, 2, 0)
            || self.in_family(Opcode::BitOr, Opcode::ModuloTwoLiterals, 3, 0)
    }

    /// The fused-literal form of a base unary or binary operation.
    pub fn to_literal_arg(self) -> Opcode {
        debug_assert!(self.has_literal_form());
        Opcode::TABLE[self as usize + 1]
    }

    /// The two-literal form of a base binary operation.
    pub fn to_two_literals(self) -> Opcode {
        debug_assert!(self.in_family(Opcode::BitOr, Opcode::ModuloTwoLiterals, 3, 0));
        Opcode::TABLE[self as usize + 2]
    }

    /// The ident-target form of a base unary lvalue operation.
    pub fn to_unary_lvalue_ident(self) -> Opcode {
        debug_assert!(self.in_family(
            Opcode::Delete,
            Opcode::PostDecrPropStringPushResult,
            6,
            0
        ));
        Opcode::TABLE[self as usize + 2]
    }

    /// The prop-string-target form of a base unary lvalue operation.
    pub fn to_unary_lvalue_prop_string(self) -> Opcode {
        debug_assert!(self.in_family(
            Opcode::Delete,
            Opcode::PostDecrPropStringPushResult,
            6,
            0
        ));
        Opcode::TABLE[self as usize + 4]
    }

    /// The ident-target form of a base assignment operation.
    pub fn to_assign_ident(self) -> Opcode {
        debug_assert!(self.in_family(Opcode::Assign, Opcode::AssignBitXorPropString, 4, 0));
        Opcode::TABLE[self as usize + 1]
    }

    /// The ident-literal form of an ident-target assignment operation.
    pub fn to_assign_ident_literal(self) -> Opcode {
        debug_assert!(self.is_assign_ident());
        Opcode::TABLE[self as usize + 1]
    }

    /// The prop-string-target form of a base assignment operation.
    pub fn to_assign_prop_string(self) -> Opcode {
        debug_assert!(self.in_family(Opcode::Assign, Opcode::AssignBitXorPropString, 4, 0));
        Opcode::TABLE[self as usize + 3]
    }

    /// True for the ident-target form of an assignment operation.
    pub fn is_assign_ident(self) -> bool {
        self.in_family(Opcode::Assign, Opcode::AssignBitXorPropString, 4, 1)
    }
}

/// A plain or extended opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CbcOp {
    /// Single byte instruction.
    Plain(Opcode),
    /// Two byte instruction (`CBC_EXT_OPCODE` prefix).
    Ext(ExtOpcode),
}

impl CbcOp {
    /// Operand description bits.
    pub fn flags(self) -> u8 {
        match self {
            CbcOp::Plain(op) => op.flags(),
            CbcOp::Ext(op) => op.flags(),
        }
    }

    /// Net effect on the value stack (before pop-count immediates).
    pub fn stack_delta(self) -> i8 {
        match self {
            CbcOp::Plain(op) => op.stack_delta(),
            CbcOp::Ext(op) => op.stack_delta(),
        }
    }

    /// Width in bytes of the branch displacement.
    pub fn branch_offset_length(self) -> u8 {
        match self {
            CbcOp::Plain(op) => op.branch_offset_length(),
            CbcOp::Ext(op) => op.branch_offset_length(),
        }
    }

    /// Instruction name for dumps.
    pub fn name(self) -> &'static str {
        match self {
            CbcOp::Plain(op) => op.name(),
            CbcOp::Ext(op) => op.name(),
        }
    }

    /// True for forward branches.
    pub fn is_forward_branch(self) -> bool {
        self.flags() & (BRANCH | FWD) == (BRANCH | FWD)
    }

    /// Encoded size of the opcode itself (1 or 2 bytes).
    pub fn opcode_size(self) -> usize {
        match self {
            CbcOp::Plain(_) => 1,
            CbcOp::Ext(_) => 2,
        }
    }

    /// The push-result counterpart of a no-result operation, if this
    /// is one.
    ///
    /// Only the code generator ever holds a no-result form in its
    /// last-opcode cache, so this conversion is the single place where
    /// a result form can be produced; the result form must be flushed
    /// immediately after.
    pub fn to_push_result(self) -> Option<CbcOp> {
        match self {
            CbcOp::Plain(op) => {
                let b = op as u8;
                let first_lvalue = Opcode::Delete as u8;
                let last_lvalue = Opcode::PostDecrPropStringPushResult as u8;
                let first_call = Opcode::Call as u8;
                let last_call = Opcode::CallPropStringPushResult as u8;
                let first_assign = Opcode::Assign as u8;
                let last_assign = Opcode::AssignBitXorPropString as u8;

                if (first_lvalue..=last_lvalue).contains(&b) {
                    if (b - first_lvalue) % 2 == 0 {
                        return Opcode::from_byte(b + 1).map(CbcOp::Plain);
                    }
                    return None;
                }
                if (first_call..=last_call).contains(&b) {
                    if (b - first_call) % 2 == 0 {
                        return Opcode::from_byte(b + 1).map(CbcOp::Plain);
                    }
                    return None;
                }
                if (first_assign..=last_assign).contains(&b) {
                    let ext = ExtOpcode::AssignPushResult as u8 + (b - first_assign);
                    return ExtOpcode::from_byte(ext).map(CbcOp::Ext);
                }
                None
            }
            CbcOp::Ext(ExtOpcode::CallEval) => Some(CbcOp::Ext(ExtOpcode::CallEvalPushResult)),
            CbcOp::Ext(_) => None,
        }
    }

    /// True for operations that leave no result on the stack.
    pub fn is_no_result(self) -> bool {
        self.to_push_result().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_opcode_is_byte_zero() {
        assert_eq!(Opcode::ExtOpcode as u8, 0);
        assert_eq!(Opcode::from_byte(0), Some(Opcode::ExtOpcode));
    }

    #[test]
    fn test_table_fits_in_a_byte() {
        assert!(Opcode::COUNT <= 256);
        assert!(ExtOpcode::COUNT <= 256);
    }

    #[test]
    fn test_branch_widen() {
        assert_eq!(Opcode::JumpForward.widen(2), Opcode::JumpForward2);
        assert_eq!(Opcode::JumpBackward.widen(3), Opcode::JumpBackward3);
        assert_eq!(
            Opcode::BranchIfTrueBackward.widen(1),
            Opcode::BranchIfTrueBackward
        );
        assert_eq!(
            ExtOpcode::BranchIfForInHasNext.widen(2),
            ExtOpcode::BranchIfForInHasNext2
        );
    }

    #[test]
    fn test_branch_offset_lengths() {
        assert_eq!(Opcode::JumpForward.branch_offset_length(), 1);
        assert_eq!(Opcode::JumpForward2.branch_offset_length(), 2);
        assert_eq!(Opcode::JumpForward3.branch_offset_length(), 3);
        assert_eq!(Opcode::Pop.branch_offset_length(), 0);
    }

    #[test]
    fn test_branch_direction() {
        assert!(Opcode::JumpForward2.is_forward_branch());
        assert!(!Opcode::JumpBackward2.is_forward_branch());
        assert!(Opcode::JumpBackward2.has_branch_arg());
        assert!(CbcOp::Ext(ExtOpcode::TryCreateContext2).is_forward_branch());
        assert!(!CbcOp::Ext(ExtOpcode::BranchIfForInHasNext).is_forward_branch());
    }

    #[test]
    fn test_literal_forms() {
        assert_eq!(Opcode::LogicalNot.to_literal_arg(), Opcode::LogicalNotLiteral);
        assert_eq!(Opcode::Add.to_literal_arg(), Opcode::AddRightLiteral);
        assert_eq!(Opcode::Add.to_two_literals(), Opcode::AddTwoLiterals);
        assert_eq!(Opcode::Modulo.to_two_literals(), Opcode::ModuloTwoLiterals);
        assert!(Opcode::Add.has_literal_form());
        assert!(!Opcode::AddRightLiteral.has_literal_form());
    }

    #[test]
    fn test_lvalue_forms() {
        assert_eq!(Opcode::Delete.to_unary_lvalue_ident(), Opcode::DeleteIdent);
        assert_eq!(
            Opcode::PostIncr.to_unary_lvalue_prop_string(),
            Opcode::PostIncrPropString
        );
        assert_eq!(Opcode::Assign.to_assign_ident(), Opcode::AssignIdent);
        assert_eq!(
            Opcode::AssignIdent.to_assign_ident_literal(),
            Opcode::AssignIdentLiteral
        );
        assert_eq!(
            Opcode::AssignBitXor.to_assign_prop_string(),
            Opcode::AssignBitXorPropString
        );
        assert!(Opcode::AssignAddIdent.is_assign_ident());
        assert!(!Opcode::AssignAdd.is_assign_ident());
    }

    #[test]
    fn test_push_result_conversions() {
        assert_eq!(
            CbcOp::Plain(Opcode::Call).to_push_result(),
            Some(CbcOp::Plain(Opcode::CallPushResult))
        );
        assert_eq!(
            CbcOp::Plain(Opcode::DeleteIdent).to_push_result(),
            Some(CbcOp::Plain(Opcode::DeleteIdentPushResult))
        );
        assert_eq!(
            CbcOp::Plain(Opcode::AssignIdent).to_push_result(),
            Some(CbcOp::Ext(ExtOpcode::AssignIdentPushResult))
        );
        assert_eq!(
            CbcOp::Plain(Opcode::AssignBitXorPropString).to_push_result(),
            Some(CbcOp::Ext(ExtOpcode::AssignBitXorPropStringPushResult))
        );
        assert_eq!(
            CbcOp::Ext(ExtOpcode::CallEval).to_push_result(),
            Some(CbcOp::Ext(ExtOpcode::CallEvalPushResult))
        );
        assert_eq!(CbcOp::Plain(Opcode::PushIdent).to_push_result(), None);
        assert_eq!(
            CbcOp::Plain(Opcode::CallPushResult).to_push_result(),
            None
        );
    }

    #[test]
    fn test_no_result_classification() {
        assert!(CbcOp::Plain(Opcode::Assign).is_no_result());
        assert!(CbcOp::Plain(Opcode::CallIdent).is_no_result());
        assert!(!CbcOp::Plain(Opcode::PushLiteral).is_no_result());
        assert!(!CbcOp::Plain(Opcode::Add).is_no_result());
    }

    #[test]
    fn test_stack_deltas() {
        assert_eq!(Opcode::PushTwoLiterals.stack_delta(), 2);
        assert_eq!(Opcode::Assign.stack_delta(), -3);
        assert_eq!(ExtOpcode::TryCreateContext2.stack_delta(), 3);
        assert_eq!(ExtOpcode::ForInCreateContext2.stack_delta(), 2);
        assert_eq!(ExtOpcode::WithCreateContext2.stack_delta(), 1);
    }
}
