//! The interface to everything around the compiler: names the host program defines, and the
//! hooks of the preprocessor.
//!
//! The compiler never executes anything, it only needs to know which names exist and how many
//! arguments they take, so it can reject illegal assignments and calls to unknown functions.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::compiler::{syntax_error, Result};
use crate::context::CompileContext;
use crate::core::*;

/// A value that is known at compile time and inlined wherever its name is read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constant {
    Number(OrderedFloat<f64>),
    String(String),
}

impl Constant {
    pub fn to_instruction(&self) -> Instruction {
        match self {
            Constant::Number(n) => Instruction::PushNumber(*n),
            Constant::String(s) => Instruction::PushString(s.clone()),
        }
    }
}

/// A name together with the number of arguments it takes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub argc: usize,
}

impl Signature {
    pub fn new(name: &str, argc: usize) -> Self {
        Self {
            name: name.to_string(),
            argc,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({} args)", self.name, self.argc)
    }
}

/// A function the host exposes to every script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostFunction {
    pub name: String,
    #[serde(default)]
    pub min_args: usize,
    /// `None` means any number of arguments
    #[serde(default)]
    pub max_args: Option<usize>,
}

impl HostFunction {
    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min_args && self.max_args.map_or(true, |max| argc <= max)
    }
}

/// An object type of the host that scripts can construct and call static functions on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default)]
    pub static_functions: Vec<Signature>,
}

impl Template {
    /// the static function `new Template(...)` calls
    pub const CONSTRUCTOR: &'static str = "new";

    pub fn static_function(&self, name: &str, argc: usize) -> Option<&Signature> {
        self.static_functions
            .iter()
            .find(|f| f.name == name && f.argc == argc)
    }
}

/// A preprocessor directive that survived preprocessing and shows up in the AST
pub trait Directive: fmt::Debug {
    fn name(&self) -> &str;

    /// Most directives only matter at compile time and emit nothing
    fn compile(&self, _ctx: &mut CompileContext<'_>, _location: &Location) -> Result<()> {
        Ok(())
    }
}

/// Runs after the source was tokenized and before the AST is built. May rewrite the tokens
/// of the context in place, e.g. to expand macros.
pub trait Preprocessor {
    fn run(&self, ctx: &mut CompileContext<'_>) -> Result<()>;
}

/// A preprocessor that leaves the tokens alone
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPreprocessor;

impl Preprocessor for NoPreprocessor {
    fn run(&self, _ctx: &mut CompileContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// The names that are predefined for a script
pub trait Environment {
    fn constant(&self, _name: &str) -> Option<Constant> {
        None
    }

    fn is_system_macro(&self, _name: &str) -> bool {
        false
    }

    /// the instructions that replace a read of the system macro `name`
    fn expand_system_macro(&self, _name: &str, _location: &Location) -> Vec<Instruction> {
        vec![]
    }

    fn global_function(&self, _name: &str) -> Option<&HostFunction> {
        None
    }

    fn template(&self, _name: &str) -> Option<&Template> {
        None
    }

    fn builtin(&self, _name: &str, _argc: usize) -> Option<Signature> {
        None
    }

    /// preprocessor macros, which share the name space of script functions
    fn macro_signature(&self, _name: &str, _argc: usize) -> Option<Signature> {
        None
    }

    /// Parses the directive `#name`. The cursor of `ctx` stands right after the name, the
    /// directive consumes whatever arguments it takes.
    fn parse_directive(
        &self,
        name: &Token,
        _ctx: &mut CompileContext<'_>,
    ) -> Result<Rc<dyn Directive>> {
        syntax_error!(
            name.location,
            "Invalid preprocessor directive '#{}'.",
            name
        )
    }
}

/// An environment without any predefined names
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyEnvironment;

impl Environment for EmptyEnvironment {}

/// A directive that consists of nothing but its name, like `#strict`
#[derive(Debug, Clone)]
pub struct MarkerDirective {
    pub name: String,
}

impl Directive for MarkerDirective {
    fn name(&self) -> &str {
        &self.name
    }
}

/// An environment that is described completely by data, e.g. loaded from a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticEnvironment {
    pub constants: BTreeMap<String, Constant>,
    pub system_macros: BTreeMap<String, Vec<Instruction>>,
    pub global_functions: Vec<HostFunction>,
    pub builtins: Vec<Signature>,
    pub macros: Vec<Signature>,
    pub templates: Vec<Template>,
    /// names of directives that take no arguments and emit nothing
    pub directives: Vec<String>,
}

impl StaticEnvironment {
    pub fn with_constant(mut self, name: &str, value: Constant) -> Self {
        self.constants.insert(name.to_string(), value);
        self
    }

    pub fn with_system_macro(mut self, name: &str, expansion: Vec<Instruction>) -> Self {
        self.system_macros.insert(name.to_string(), expansion);
        self
    }

    pub fn with_global_function(
        mut self,
        name: &str,
        min_args: usize,
        max_args: Option<usize>,
    ) -> Self {
        self.global_functions.push(HostFunction {
            name: name.to_string(),
            min_args,
            max_args,
        });
        self
    }

    pub fn with_builtin(mut self, name: &str, argc: usize) -> Self {
        self.builtins.push(Signature::new(name, argc));
        self
    }

    pub fn with_macro(mut self, name: &str, argc: usize) -> Self {
        self.macros.push(Signature::new(name, argc));
        self
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.templates.push(template);
        self
    }

    pub fn with_directive(mut self, name: &str) -> Self {
        self.directives.push(name.to_string());
        self
    }
}

impl Environment for StaticEnvironment {
    fn constant(&self, name: &str) -> Option<Constant> {
        self.constants.get(name).cloned()
    }

    fn is_system_macro(&self, name: &str) -> bool {
        self.system_macros.contains_key(name)
    }

    fn expand_system_macro(&self, name: &str, _location: &Location) -> Vec<Instruction> {
        self.system_macros.get(name).cloned().unwrap_or_default()
    }

    fn global_function(&self, name: &str) -> Option<&HostFunction> {
        self.global_functions.iter().find(|f| f.name == name)
    }

    fn template(&self, name: &str) -> Option<&Template> {
        self.templates.iter().find(|t| t.name == name)
    }

    fn builtin(&self, name: &str, argc: usize) -> Option<Signature> {
        self.builtins
            .iter()
            .find(|b| b.name == name && b.argc == argc)
            .cloned()
    }

    fn macro_signature(&self, name: &str, argc: usize) -> Option<Signature> {
        self.macros
            .iter()
            .find(|m| m.name == name && m.argc == argc)
            .cloned()
    }

    fn parse_directive(
        &self,
        name: &Token,
        _ctx: &mut CompileContext<'_>,
    ) -> Result<Rc<dyn Directive>> {
        let directive_name = name.to_string();
        if !self.directives.contains(&directive_name) {
            syntax_error!(
                name.location,
                "Invalid preprocessor directive '#{}'.",
                directive_name
            );
        }
        Ok(Rc::new(MarkerDirective {
            name: directive_name,
        }))
    }
}
