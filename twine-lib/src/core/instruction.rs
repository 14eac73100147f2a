//! The instructions of the stack machine that executes compiled scripts.
//!
//! Stack effects are noted as `[inputs] -> [outputs]`, the rightmost entry being the top.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::{BinaryOperator, UnaryOperator};

/// Where a jump goes. Everything but `Address` only exists while the program is being built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum JumpTarget {
    /// Not known yet. Structured control flow and labels patch this later.
    #[display(fmt = "<unresolved>")]
    Unresolved,
    /// the end of the innermost loop or switch
    #[display(fmt = "<break>")]
    Break,
    /// the continue point of the innermost loop
    #[display(fmt = "<continue>")]
    Continue,
    #[display(fmt = "{:04}", _0)]
    Address(usize),
}

impl JumpTarget {
    pub fn address(&self) -> Option<usize> {
        match self {
            JumpTarget::Address(addr) => Some(*addr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Instruction {
    /// [] -> [null]
    #[display(fmt = "push_null")]
    PushNull,
    /// [] -> [number]
    #[display(fmt = "push_number {}", _0)]
    PushNumber(OrderedFloat<f64>),
    /// [] -> [string]
    #[display(fmt = "push_string {:?}", _0)]
    PushString(String),
    /// looks up a variable at runtime. [] -> [value]
    #[display(fmt = "push_identifier {}", _0)]
    PushIdentifier(String),
    /// [receiver] -> [value]
    #[display(fmt = "push_field {}", _0)]
    PushField(String),
    /// pushes the nth argument of the running function. [] -> [value]
    #[display(fmt = "push_argument {}", _0)]
    PushArgument(usize),
    /// [value] -> []
    #[display(fmt = "set_identifier {}", _0)]
    SetIdentifier(String),
    /// [receiver, value] -> []
    #[display(fmt = "set_field {}", _0)]
    SetField(String),
    /// calls a script function, host function or builtin. [arg0..argN] -> [result]
    #[display(fmt = "call {} ({} args)", name, argc)]
    Call { name: String, argc: usize },
    /// [receiver, arg0..argN] -> [result]
    #[display(fmt = "call_instance {} ({} args)", name, argc)]
    CallInstance { name: String, argc: usize },
    /// [arg0..argN] -> [result]
    #[display(fmt = "call_static {}.{} ({} args)", template, name, argc)]
    CallStatic {
        template: String,
        name: String,
        argc: usize,
    },
    /// [a] -> [a, a]
    #[display(fmt = "duplicate")]
    Duplicate,
    /// [a] -> []
    #[display(fmt = "discard")]
    Discard,
    /// [a] -> [op a]
    #[display(fmt = "unary_op {}", _0)]
    UnaryOp(UnaryOperator),
    /// [a, b] -> [a op b]
    #[display(fmt = "binary_op {}", _0)]
    BinaryOp(BinaryOperator),
    /// If `a` is falsy, pushes false and jumps, otherwise continues with the right operand.
    /// [a] -> [] or [false]
    #[display(fmt = "binary_and {}", _0)]
    BinaryAnd(JumpTarget),
    /// If `a` is truthy, pushes true and jumps, otherwise continues with the right operand.
    /// [a] -> [] or [true]
    #[display(fmt = "binary_or {}", _0)]
    BinaryOr(JumpTarget),
    #[display(fmt = "jump {}", _0)]
    Jump(JumpTarget),
    /// [condition] -> []
    #[display(fmt = "jump_if {}", _0)]
    JumpIf(JumpTarget),
    /// [condition] -> []
    #[display(fmt = "jump_unless {}", _0)]
    JumpUnless(JumpTarget),
    /// remembers the address of the next instruction, then jumps
    #[display(fmt = "jump_push {}", _0)]
    JumpPush(JumpTarget),
    /// jumps to the most recently remembered address
    #[display(fmt = "jump_pop")]
    JumpPop,
    /// Compares a case value with the switch value below it. On a match both are
    /// removed and the jump is taken. [value, case] -> [value] or []
    #[display(fmt = "switch_jump {}", _0)]
    SwitchJump(JumpTarget),
    /// [result] -> []
    #[display(fmt = "return")]
    Return,
}

impl Instruction {
    pub fn jump_target(&self) -> Option<&JumpTarget> {
        use Instruction::*;
        match self {
            BinaryAnd(target) | BinaryOr(target) | Jump(target) | JumpIf(target)
            | JumpUnless(target) | JumpPush(target) | SwitchJump(target) => Some(target),
            _ => None,
        }
    }

    pub fn jump_target_mut(&mut self) -> Option<&mut JumpTarget> {
        use Instruction::*;
        match self {
            BinaryAnd(target) | BinaryOr(target) | Jump(target) | JumpIf(target)
            | JumpUnless(target) | JumpPush(target) | SwitchJump(target) => Some(target),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        matches!(self, Instruction::Return)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_targets() {
        let mut jump = Instruction::JumpUnless(JumpTarget::Unresolved);
        *jump.jump_target_mut().unwrap() = JumpTarget::Address(12);
        assert_eq!(jump.jump_target().and_then(JumpTarget::address), Some(12));
        assert!(Instruction::JumpPop.jump_target().is_none());
        assert!(Instruction::Return.jump_target().is_none());
    }

    #[test]
    fn test_disassembly() {
        let call = Instruction::Call {
            name: "add".into(),
            argc: 2,
        };
        assert_eq!(call.to_string(), "call add (2 args)");
        assert_eq!(
            Instruction::Jump(JumpTarget::Address(7)).to_string(),
            "jump 0007"
        );
        assert_eq!(
            Instruction::SwitchJump(JumpTarget::Break).to_string(),
            "switch_jump <break>"
        );
        assert_eq!(
            Instruction::PushNumber(OrderedFloat(2.5)).to_string(),
            "push_number 2.5"
        );
    }
}
