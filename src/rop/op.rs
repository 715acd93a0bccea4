//! Opcodes of the register IR.
//!
//! The IR is deliberately small: enough opcodes to express the dataflow
//! shapes the SSA passes care about (definitions, moves, arithmetic,
//! branches, calls) without modeling a full instruction set. Each opcode
//! reports its [`Branchingness`], which drives block-termination checks and
//! successor-list layout.

use std::fmt;

/// How an instruction ends (or does not end) a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Branchingness {
    /// Flows to the next instruction; cannot end a block.
    None,
    /// Returns from the method. No successors.
    Return,
    /// Unconditional branch. Exactly one successor.
    Goto,
    /// Two-way conditional branch. Two successors, taken edge first.
    If,
    /// Multi-way branch. One successor per case plus the default last.
    Switch,
    /// May throw. Successors are exception handlers, plus the fall-through
    /// edge as primary when execution can continue.
    Throws,
}

/// A two-operand arithmetic or bitwise operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum BinOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division. Throws on integral division by zero.
    Div,
    /// Remainder. Throws on integral remainder by zero.
    Rem,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Left shift.
    Shl,
    /// Arithmetic right shift.
    Shr,
    /// Logical right shift.
    Ushr,
}

impl BinOp {
    /// Returns `true` if this operation can throw at runtime.
    #[must_use]
    pub const fn can_throw(self) -> bool {
        matches!(self, Self::Div | Self::Rem)
    }
}

/// A one-operand operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum UnOp {
    /// Arithmetic negation.
    Neg,
    /// Bitwise not.
    Not,
}

/// The comparison of a conditional branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Cmp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
}

impl Cmp {
    /// Evaluates the comparison on a signed ordering value
    /// (`a - b` collapsed to sign).
    #[must_use]
    pub const fn evaluate(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => matches!(ordering, Equal),
            Self::Ne => !matches!(ordering, Equal),
            Self::Lt => matches!(ordering, Less),
            Self::Ge => matches!(ordering, Greater | Equal),
            Self::Le => matches!(ordering, Less | Equal),
            Self::Gt => matches!(ordering, Greater),
        }
    }
}

/// An instruction opcode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Load a constant into the result register.
    Const,
    /// Copy a register.
    Move,
    /// Read an incoming method parameter.
    MoveParam,
    /// Capture the in-flight exception at the head of a handler block.
    MoveException,
    /// Two-operand arithmetic.
    BinOp(BinOp),
    /// One-operand arithmetic.
    UnOp(UnOp),
    /// Unconditional branch.
    Goto,
    /// Conditional branch comparing one source against zero, or two sources
    /// against each other.
    If(Cmp),
    /// Multi-way branch on an integer key.
    Switch(Vec<i32>),
    /// Return from the method, with an optional value source.
    Return,
    /// Throw the exception object in the source register.
    Throw,
    /// Call a method. May throw; the result, if any, lands in the primary
    /// successor via a subsequent move-result convention folded into this
    /// opcode's result slot.
    Invoke,
}

impl Opcode {
    /// Returns how this opcode terminates (or does not terminate) a block.
    ///
    /// Throwing arithmetic counts as [`Branchingness::Throws`] so that
    /// blocks are split around the potential exception edge.
    #[must_use]
    pub fn branchingness(&self) -> Branchingness {
        match self {
            Self::Const | Self::Move | Self::MoveParam | Self::MoveException | Self::UnOp(_) => {
                Branchingness::None
            }
            Self::BinOp(op) => {
                if op.can_throw() {
                    Branchingness::Throws
                } else {
                    Branchingness::None
                }
            }
            Self::Goto => Branchingness::Goto,
            Self::If(_) => Branchingness::If,
            Self::Switch(_) => Branchingness::Switch,
            Self::Return => Branchingness::Return,
            Self::Throw | Self::Invoke => Branchingness::Throws,
        }
    }

    /// Returns `true` if this opcode can end a basic block.
    #[must_use]
    pub fn can_terminate_block(&self) -> bool {
        self.branchingness() != Branchingness::None
    }

    /// Returns `true` for the register-to-register copy family whose
    /// definitions SSA renaming may elide.
    #[must_use]
    pub const fn is_move_like(&self) -> bool {
        matches!(self, Self::Move | Self::MoveParam | Self::MoveException)
    }

    /// Returns `true` if the instruction only transfers control and neither
    /// reads nor writes registers.
    #[must_use]
    pub const fn is_pure_control_transfer(&self) -> bool {
        matches!(self, Self::Goto)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Const => write!(f, "const"),
            Self::Move => write!(f, "move"),
            Self::MoveParam => write!(f, "move-param"),
            Self::MoveException => write!(f, "move-exception"),
            Self::BinOp(op) => write!(f, "{}", op.to_string().to_lowercase()),
            Self::UnOp(op) => write!(f, "{}", op.to_string().to_lowercase()),
            Self::Goto => write!(f, "goto"),
            Self::If(cmp) => write!(f, "if-{}", cmp.to_string().to_lowercase()),
            Self::Switch(keys) => write!(f, "switch({} cases)", keys.len()),
            Self::Return => write!(f, "return"),
            Self::Throw => write!(f, "throw"),
            Self::Invoke => write!(f, "invoke"),
        }
    }
}
