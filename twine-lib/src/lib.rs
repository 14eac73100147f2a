//! The compiler for Twine, a small scripting language that is embedded into a host program.
//!
//! Compiling a script goes through these steps, all of which operate on a
//! [`context::CompileContext`]:
//! 1. [`lexer::tokenize`] splits the source into tokens,
//! 1. a [`environment::Preprocessor`] may rewrite those tokens,
//! 1. [`parser::build`] turns the tokens into an AST,
//! 1. [`compiler::compile_root`] generates instructions for a stack machine,
//! 1. [`context::CompileContext::finish`] links labels, checks calls and returns the
//!    [`core::Program`].
//!
//! Everything the host predefines for a script is described by an [`environment::Environment`].
//! The easiest way to get one is [`environment::StaticEnvironment`]:
//!
//! ```
//! use twine_lib::environment::StaticEnvironment;
//! use twine_lib::context::CompileOptions;
//!
//! let env = StaticEnvironment::default().with_global_function("print", 1, None);
//! let program = twine_lib::compile("x = 2 * 3; print(x);", &env, CompileOptions::default())
//!     .unwrap();
//! assert!(!program.instructions.is_empty());
//! ```
pub mod compiler;
pub mod context;
pub mod core;
pub mod environment;
pub mod lexer;
pub mod parser;
pub mod utils;

use crate::context::{CompileContext, CompileOptions};
use crate::environment::{Environment, NoPreprocessor, Preprocessor};

pub use crate::compiler::{CompilationError, Result};
pub use crate::core::{Program, ProgramLoadError};

/// Compiles `source` without any preprocessing
pub fn compile(source: &str, env: &dyn Environment, options: CompileOptions) -> Result<Program> {
    compile_with(source, env, &NoPreprocessor, options)
}

/// Compiles `source`, running `preprocessor` over the tokens before the AST is built
pub fn compile_with(
    source: &str,
    env: &dyn Environment,
    preprocessor: &dyn Preprocessor,
    options: CompileOptions,
) -> Result<Program> {
    let mut ctx = CompileContext::new(env, options);
    ctx.tokenize(source)?;
    preprocessor.run(&mut ctx)?;
    parser::build(&mut ctx)?;
    compiler::compile_root(&mut ctx)?;
    ctx.finish()
}
