//! Elementwise operation table.
//!
//! Every operation carries an OpenCL C statement that computes the output
//! value from the named inputs. Unary statements read `a` and assign `b`;
//! binary statements read `a`, `b` and assign `c`.

use std::fmt;

/// Type of the value an operation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    /// Same element type as the inputs
    SameAsInput,
    /// `bool` regardless of the input type
    Bool,
}

/// Closed set of elementwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    Plus,
    Minus,
    Times,
    Divide,
    Mod,
    Negate,
    Increment,
    Decrement,
    Equals,
    NotEquals,
    Greater,
    Lesser,
    GreaterEqual,
    LesserEqual,
    LogicalAnd,
    LogicalOr,
    LogicalNot,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    BitwiseNot,
    LeftShift,
    RightShift,
}

impl Operation {
    pub const ALL: [Operation; 23] = [
        Operation::Plus,
        Operation::Minus,
        Operation::Times,
        Operation::Divide,
        Operation::Mod,
        Operation::Negate,
        Operation::Increment,
        Operation::Decrement,
        Operation::Equals,
        Operation::NotEquals,
        Operation::Greater,
        Operation::Lesser,
        Operation::GreaterEqual,
        Operation::LesserEqual,
        Operation::LogicalAnd,
        Operation::LogicalOr,
        Operation::LogicalNot,
        Operation::BitwiseAnd,
        Operation::BitwiseOr,
        Operation::BitwiseXor,
        Operation::BitwiseNot,
        Operation::LeftShift,
        Operation::RightShift,
    ];

    /// Snake-case name, used in kernel entry names and error context.
    pub const fn name(self) -> &'static str {
        match self {
            Operation::Plus => "plus",
            Operation::Minus => "minus",
            Operation::Times => "times",
            Operation::Divide => "divide",
            Operation::Mod => "mod",
            Operation::Negate => "negate",
            Operation::Increment => "increment",
            Operation::Decrement => "decrement",
            Operation::Equals => "equals",
            Operation::NotEquals => "not_equals",
            Operation::Greater => "greater",
            Operation::Lesser => "lesser",
            Operation::GreaterEqual => "greater_equal",
            Operation::LesserEqual => "lesser_equal",
            Operation::LogicalAnd => "logical_and",
            Operation::LogicalOr => "logical_or",
            Operation::LogicalNot => "logical_not",
            Operation::BitwiseAnd => "bitwise_and",
            Operation::BitwiseOr => "bitwise_or",
            Operation::BitwiseXor => "bitwise_xor",
            Operation::BitwiseNot => "bitwise_not",
            Operation::LeftShift => "left_shift",
            Operation::RightShift => "right_shift",
        }
    }

    /// Number of array operands.
    pub const fn arity(self) -> usize {
        match self {
            Operation::Negate
            | Operation::Increment
            | Operation::Decrement
            | Operation::LogicalNot
            | Operation::BitwiseNot => 1,
            _ => 2,
        }
    }

    pub const fn result_kind(self) -> ResultKind {
        match self {
            Operation::Equals
            | Operation::NotEquals
            | Operation::Greater
            | Operation::Lesser
            | Operation::GreaterEqual
            | Operation::LesserEqual
            | Operation::LogicalAnd
            | Operation::LogicalOr
            | Operation::LogicalNot => ResultKind::Bool,
            _ => ResultKind::SameAsInput,
        }
    }

    /// OpenCL C statement computing one output element.
    pub const fn fragment(self) -> &'static str {
        match self {
            Operation::Plus => "c = a + b;",
            Operation::Minus => "c = a - b;",
            Operation::Times => "c = a * b;",
            Operation::Divide => "c = a / b;",
            Operation::Mod => "c = a % b;",
            Operation::Negate => "b = -a;",
            Operation::Increment => "b = a + 1;",
            Operation::Decrement => "b = a - 1;",
            Operation::Equals => "c = (a == b);",
            Operation::NotEquals => "c = (a != b);",
            Operation::Greater => "c = (a > b);",
            Operation::Lesser => "c = (a < b);",
            Operation::GreaterEqual => "c = (a >= b);",
            Operation::LesserEqual => "c = (a <= b);",
            Operation::LogicalAnd => "c = a && b;",
            Operation::LogicalOr => "c = a || b;",
            Operation::LogicalNot => "b = !a;",
            Operation::BitwiseAnd => "c = a & b;",
            Operation::BitwiseOr => "c = a | b;",
            Operation::BitwiseXor => "c = a ^ b;",
            Operation::BitwiseNot => "b = ~a;",
            Operation::LeftShift => "c = a << b;",
            Operation::RightShift => "c = a >> b;",
        }
    }

    /// Whether the operation can fold a reduction.
    pub const fn is_associative(self) -> bool {
        matches!(
            self,
            Operation::Plus
                | Operation::Times
                | Operation::BitwiseAnd
                | Operation::BitwiseOr
                | Operation::BitwiseXor
                | Operation::LogicalAnd
                | Operation::LogicalOr
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
