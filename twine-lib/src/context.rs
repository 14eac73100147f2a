//! The state that is shared between lexing, parsing and code generation of one script

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::compiler::{compiler_bug, syntax_error, Result};
use crate::core::*;
use crate::environment::Environment;
use crate::lexer;
use crate::utils;

/// Settings for compiling one script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// shows up in error messages and in the code sources of the program
    pub source_name: Option<String>,
    /// the line number of the first line, for scripts that are embedded in another file
    pub starting_line: usize,
    /// The names of the arguments the script itself is called with. Outside of functions
    /// they are read-only, just like function parameters inside of them.
    pub main_argument_names: Vec<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            source_name: None,
            starting_line: 1,
            main_argument_names: vec![],
        }
    }
}

pub struct CompileContext<'env> {
    env: &'env dyn Environment,
    options: CompileOptions,
    source: Option<Arc<str>>,
    tokens: Vec<Token>,
    cursor: usize,
    /// returned by the cursor functions once the tokens ran out
    eof: Token,
    /// whether `break` is legal at the current position
    pub can_break: bool,
    /// whether `continue` is legal at the current position
    pub can_continue: bool,
    root: Option<Node>,
    pub(crate) builder: ByteCodeBuilder,
    code_sources: CodeSources,
    /// jumps that wait for a label to be declared
    label_jumps: BTreeMap<String, Vec<(usize, Location)>>,
    labels: BTreeMap<String, usize>,
    pub(crate) functions: FunctionTable,
    /// parameters of the function that is being compiled, `None` at top level
    parameters: Option<Vec<String>>,
}

impl<'env> CompileContext<'env> {
    pub fn new(env: &'env dyn Environment, options: CompileOptions) -> Self {
        let source: Option<Arc<str>> = options.source_name.as_deref().map(Arc::from);
        let eof = Token::new(
            TokenKind::Eof,
            Location::new(source.clone(), options.starting_line, 1),
        );
        Self {
            env,
            options,
            source,
            tokens: vec![],
            cursor: 0,
            eof,
            can_break: false,
            can_continue: false,
            root: None,
            builder: ByteCodeBuilder::default(),
            code_sources: CodeSources::default(),
            label_jumps: BTreeMap::new(),
            labels: BTreeMap::new(),
            functions: FunctionTable::default(),
            parameters: None,
        }
    }

    /// throws away everything about the last script, so the context can compile another one
    pub fn reset(&mut self) {
        *self = Self::new(self.env, self.options.clone());
    }

    pub fn env(&self) -> &'env dyn Environment {
        self.env
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn tokenize(&mut self, source: &str) -> Result<()> {
        self.tokens = lexer::tokenize(source, self.source.clone(), self.options.starting_line)?;
        if let Some(last) = self.tokens.last() {
            self.eof = last.clone();
        }
        self.cursor = 0;
        Ok(())
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// for preprocessors that rewrite the token stream
    pub fn tokens_mut(&mut self) -> &mut Vec<Token> {
        &mut self.tokens
    }

    pub fn has_more_tokens(&self) -> bool {
        self.current_token().kind != TokenKind::Eof
    }

    pub fn current_token(&self) -> &Token {
        self.peek(0)
    }

    /// returns the current token and moves past it
    pub fn current_token_increment(&mut self) -> Token {
        let token = self.current_token().clone();
        self.increment_token();
        token
    }

    /// the token `offset` positions after the current one
    pub fn peek(&self, offset: usize) -> &Token {
        self.tokens.get(self.cursor + offset).unwrap_or(&self.eof)
    }

    pub fn increment_token(&mut self) {
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
    }

    pub fn decrement_token(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn set_root(&mut self, root: Node) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    pub(crate) fn take_root(&mut self) -> Option<Node> {
        self.root.take()
    }

    /// appends an instruction and returns its address
    pub fn emit(&mut self, instruction: Instruction, location: &Location) -> usize {
        let code_location = self.code_sources.code_location(location);
        self.builder.emit(instruction, code_location)
    }

    /// the address the next instruction will get
    pub fn next_address(&self) -> usize {
        self.builder.len()
    }

    pub fn function(&self, name: &str, argc: usize) -> Option<&ScriptFunction> {
        self.functions.find(name, argc)
    }

    pub(crate) fn declare_label(&mut self, name: &str, location: &Location) -> Result<()> {
        if self.labels.contains_key(name) {
            syntax_error!(location, "Label '{}' is defined more than once.", name);
        }
        let address = self.builder.len();
        trace!("label '{}' is at {}", name, address);
        self.labels.insert(name.to_string(), address);
        Ok(())
    }

    /// remembers that the jump at `address` goes to the label `name`
    pub(crate) fn add_label_jump(&mut self, name: &str, address: usize, location: &Location) {
        self.label_jumps
            .entry(name.to_string())
            .or_default()
            .push((address, location.clone()));
    }

    /// The names that resolve to arguments at the current position
    pub(crate) fn parameters(&self) -> &[String] {
        self.parameters
            .as_deref()
            .unwrap_or(&self.options.main_argument_names)
    }

    /// sets the parameters of the function that is compiled next, returns the previous ones
    pub(crate) fn replace_parameters(&mut self, parameters: Option<Vec<String>>) -> Option<Vec<String>> {
        std::mem::replace(&mut self.parameters, parameters)
    }

    /// Like [`ByteCodeBuilder::falls_off_end`], but also true if a label was declared at the
    /// end. Jumps to labels are only linked in [`Self::finish`].
    pub(crate) fn falls_off_end(&self, start: usize) -> bool {
        let end = self.builder.len();
        self.builder.falls_off_end(start)
            || self
                .labels
                .values()
                .any(|&address| address >= start && address == end)
    }

    /// Points all label jumps to their labels. Fails if a label was never declared.
    fn link_labels(&mut self) -> Result<()> {
        let label_jumps = std::mem::take(&mut self.label_jumps);
        for (name, jumps) in label_jumps {
            for (address, location) in jumps {
                let Some(&target) = self.labels.get(&name) else {
                    syntax_error!(location, "Referenced an undeclared label '{}'.", name);
                };
                trace!("linking jump at {} to label '{}' ({})", address, name, target);
                if !self.builder.set_target(address, JumpTarget::Address(target)) {
                    compiler_bug!(location, "no jump instruction at {} for label '{}'", address, name);
                }
            }
        }
        Ok(())
    }

    /// the location an already emitted instruction was generated from
    fn instruction_location(&self, address: usize) -> Location {
        match self.builder.locations.get(address) {
            Some(code_location) => self.code_sources.location(code_location),
            None => self.eof.location.clone(),
        }
    }

    /// Every jump has to end up inside the program
    fn check_jump_targets(&self) -> Result<()> {
        let len = self.builder.len();
        for (address, instruction) in self.builder.text.iter().enumerate() {
            match instruction.jump_target() {
                None => {}
                Some(JumpTarget::Address(target)) if *target < len => {}
                Some(target) => compiler_bug!(
                    self.instruction_location(address),
                    "jump at {} has the invalid target {}",
                    address,
                    target
                ),
            }
        }
        Ok(())
    }

    /// Every call has to go to a script function, a host function or a builtin
    fn check_calls(&self) -> Result<()> {
        for (address, instruction) in self.builder.text.iter().enumerate() {
            if let Instruction::Call { name, argc } = instruction {
                let resolved = self.functions.find(name, *argc).is_some()
                    || self
                        .env
                        .global_function(name)
                        .map_or(false, |f| f.accepts(*argc))
                    || self.env.builtin(name, *argc).is_some();
                if !resolved {
                    syntax_error!(
                        self.instruction_location(address),
                        "Cannot resolve function '{}' with {} argument(s).",
                        name,
                        argc
                    );
                }
            }
        }
        Ok(())
    }

    /// Links the labels, validates the instructions and hands out the finished program
    pub fn finish(mut self) -> Result<Program> {
        self.link_labels()?;
        if self.falls_off_end(0) {
            let location = self.eof.location.clone();
            self.emit(Instruction::PushNull, &location);
            self.emit(Instruction::Return, &location);
        }
        self.check_jump_targets()?;
        self.check_calls()?;

        debug!(
            "finished program: {} instructions, {} functions, {} labels",
            self.builder.len(),
            self.functions.len(),
            self.labels.len()
        );
        let (instructions, locations) = self.builder.build();
        Ok(Program {
            version: utils::get_version(),
            instructions,
            locations,
            code_sources: self.code_sources.into_names(),
            functions: self.functions.into_table(),
            labels: self.labels,
        })
    }
}

impl std::fmt::Debug for CompileContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileContext")
            .field("options", &self.options)
            .field("cursor", &self.cursor)
            .field("tokens", &self.tokens.len())
            .field("instructions", &self.builder.len())
            .finish_non_exhaustive()
    }
}
