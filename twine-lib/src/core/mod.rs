//! contains all important data structures

pub mod location;
pub use location::*;

pub mod operator;
pub use operator::*;

pub mod token;
pub use token::*;

pub mod ast;
pub use ast::*;

pub mod instruction;
pub use instruction::*;

pub mod function;
pub use function::*;

pub mod bytecode_builder;
pub use bytecode_builder::*;

pub mod program;
pub use program::*;
