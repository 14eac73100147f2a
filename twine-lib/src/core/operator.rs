//! operators as they appear in tokens, AST nodes and instructions

use serde::{Deserialize, Serialize};

/// The highest precedence category a binary operator can have
pub const MAX_CATEGORY: u8 = 6;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum BinaryOperator {
    #[strum(serialize = "*")]
    Mul,
    #[strum(serialize = "/")]
    Div,
    #[strum(serialize = "%")]
    Mod,
    #[strum(serialize = "+")]
    Add,
    #[strum(serialize = "-")]
    Sub,
    #[strum(serialize = "<<")]
    Shl,
    #[strum(serialize = ">>")]
    Shr,
    #[strum(serialize = "&")]
    BitAnd,
    #[strum(serialize = "|")]
    BitOr,
    #[strum(serialize = "^")]
    BitXor,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Neq,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Lte,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Gte,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
}

impl BinaryOperator {
    /// The precedence category. Operators of a lower category bind tighter.
    pub fn category(self) -> u8 {
        use BinaryOperator::*;
        match self {
            Mul | Div | Mod => 0,
            Add | Sub => 1,
            Shl | Shr => 2,
            BitAnd | BitOr | BitXor => 3,
            Eq | Neq | Lt | Lte | Gt | Gte => 4,
            And => 5,
            Or => 6,
        }
    }

    /// `&&` and `||` don't evaluate their right side unconditionally, so they are not compiled
    /// into a plain binary-op instruction
    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "!")]
    Not,
}
