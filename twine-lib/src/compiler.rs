//! Generates instructions from the AST.
//!
//! Structured control flow is backpatched as soon as the target is emitted. `break` and
//! `continue` are emitted with [`JumpTarget::Break`] and [`JumpTarget::Continue`], and the
//! enclosing loop or switch resolves them once its body is complete. Jumps to named labels are
//! linked in [`CompileContext::finish`].

use log::debug;
use thiserror::Error;

use crate::context::CompileContext;
use crate::core::*;

pub type Result<T> = std::result::Result<T, CompilationError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompilationError {
    #[error("{location}: {message}")]
    Lexical { location: Location, message: String },

    #[error("{location}: {message}")]
    Syntax { location: Location, message: String },

    #[error("{location}: A compiler bug was detected: {message}")]
    CompilerBug { location: Location, message: String },
}

impl CompilationError {
    pub fn location(&self) -> &Location {
        match self {
            CompilationError::Lexical { location, .. }
            | CompilationError::Syntax { location, .. }
            | CompilationError::CompilerBug { location, .. } => location,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            CompilationError::Lexical { message, .. }
            | CompilationError::Syntax { message, .. }
            | CompilationError::CompilerBug { message, .. } => message,
        }
    }
}

macro_rules! lexical_error {
    ($location:expr, $msg:literal $(, $args:expr)* $(,)?) => {
        return Err($crate::compiler::CompilationError::Lexical {
            location: ($location).clone(),
            message: format!($msg $(, $args)*),
        })
    };
}

macro_rules! syntax_error {
    ($location:expr, $msg:literal $(, $args:expr)* $(,)?) => {
        return Err($crate::compiler::CompilationError::Syntax {
            location: ($location).clone(),
            message: format!($msg $(, $args)*),
        })
    };
}

macro_rules! compiler_bug {
    ($location:expr, $msg:literal $(, $args:expr)* $(,)?) => {
        return Err($crate::compiler::CompilationError::CompilerBug {
            location: ($location).clone(),
            message: format!($msg $(, $args)*),
        })
    };
}

pub(crate) use {compiler_bug, lexical_error, syntax_error};

/// compiles the AST the parser left in the context
pub fn compile_root(ctx: &mut CompileContext<'_>) -> Result<()> {
    let Some(root) = ctx.take_root() else {
        compiler_bug!(ctx.current_token().location, "there is no AST to compile");
    };
    let result = compile_node(ctx, &root);
    ctx.set_root(root);
    result?;
    debug!("generated {} instructions", ctx.next_address());
    Ok(())
}

pub fn compile_node(ctx: &mut CompileContext<'_>, node: &Node) -> Result<()> {
    match node {
        Node::Null(location) => {
            ctx.emit(Instruction::PushNull, location);
        }
        Node::Number(location, n) => {
            ctx.emit(Instruction::PushNumber(*n), location);
        }
        Node::Str(location, s) => {
            ctx.emit(Instruction::PushString(s.clone()), location);
        }
        Node::Identifier(location, name) => compile_identifier(ctx, location, name),
        Node::EvaluationChain { .. } => {
            let last = compile_chain_receiver(ctx, node)?;
            compile_chain_link(ctx, last)?;
        }
        Node::Call {
            location,
            name,
            arguments,
        } => {
            compile_arguments(ctx, arguments)?;
            let call = Instruction::Call {
                name: name.clone(),
                argc: arguments.len(),
            };
            ctx.emit(call, location);
        }
        Node::StaticCall {
            location,
            template,
            name,
            arguments,
        } => compile_static_call(ctx, location, template, name, arguments)?,
        Node::Unary {
            location,
            operator,
            operand,
        } => {
            compile_node(ctx, operand)?;
            ctx.emit(Instruction::UnaryOp(*operator), location);
        }
        Node::Binary {
            location,
            operator,
            left,
            right,
        } => compile_binary(ctx, location, *operator, left, right)?,
        Node::Block { statements, .. } => {
            for statement in statements {
                compile_node(ctx, statement)?;
            }
        }
        Node::Return { location, value } => {
            match value {
                Some(value) => compile_node(ctx, value)?,
                None => {
                    ctx.emit(Instruction::PushNull, location);
                }
            }
            ctx.emit(Instruction::Return, location);
        }
        Node::Discard { location, value } => {
            compile_node(ctx, value)?;
            ctx.emit(Instruction::Discard, location);
        }
        Node::If {
            location,
            condition,
            then,
            otherwise,
        } => {
            compile_node(ctx, condition)?;
            let skip_then = ctx.emit(Instruction::JumpUnless(JumpTarget::Unresolved), location);
            compile_node(ctx, then)?;
            match otherwise {
                Some(otherwise) => {
                    let skip_else = ctx.emit(Instruction::Jump(JumpTarget::Unresolved), location);
                    patch_to_here(ctx, skip_then);
                    compile_node(ctx, otherwise)?;
                    patch_to_here(ctx, skip_else);
                }
                None => patch_to_here(ctx, skip_then),
            }
        }
        Node::Switch(switch) => compile_switch(ctx, switch)?,
        Node::Set {
            location,
            operator,
            target,
            value,
        } => compile_set(ctx, location, *operator, target, value)?,
        Node::Adjust {
            location,
            kind,
            target,
            delta,
        } => compile_adjust(ctx, location, *kind, target, *delta)?,
        Node::While {
            location,
            condition,
            body,
        } => {
            let start = ctx.next_address();
            compile_node(ctx, condition)?;
            let exit = ctx.emit(Instruction::JumpUnless(JumpTarget::Unresolved), location);
            let body_start = ctx.next_address();
            compile_node(ctx, body)?;
            ctx.emit(Instruction::Jump(JumpTarget::Address(start)), location);
            let end = ctx.next_address();
            patch_to_here(ctx, exit);
            ctx.builder
                .patch_special_jumps(body_start, end, Some(end), Some(start));
        }
        Node::DoWhile {
            location,
            body,
            condition,
        } => {
            let start = ctx.next_address();
            compile_node(ctx, body)?;
            let check = ctx.next_address();
            compile_node(ctx, condition)?;
            ctx.emit(Instruction::JumpIf(JumpTarget::Address(start)), location);
            let end = ctx.next_address();
            ctx.builder
                .patch_special_jumps(start, check, Some(end), Some(check));
        }
        Node::For {
            location,
            init,
            condition,
            post,
            body,
        } => {
            compile_node(ctx, init)?;
            let start = ctx.next_address();
            compile_node(ctx, condition)?;
            let exit = ctx.emit(Instruction::JumpUnless(JumpTarget::Unresolved), location);
            let body_start = ctx.next_address();
            compile_node(ctx, body)?;
            let post_start = ctx.next_address();
            compile_node(ctx, post)?;
            ctx.emit(Instruction::Jump(JumpTarget::Address(start)), location);
            let end = ctx.next_address();
            patch_to_here(ctx, exit);
            ctx.builder
                .patch_special_jumps(body_start, end, Some(end), Some(post_start));
        }
        Node::Break(location) => {
            ctx.emit(Instruction::Jump(JumpTarget::Break), location);
        }
        Node::Continue(location) => {
            ctx.emit(Instruction::Jump(JumpTarget::Continue), location);
        }
        Node::Label {
            location,
            name,
            statement,
        } => {
            ctx.declare_label(name, location)?;
            compile_node(ctx, statement)?;
        }
        Node::Jump { location, label } => {
            let address = ctx.emit(Instruction::Jump(JumpTarget::Unresolved), location);
            ctx.add_label_jump(label, address, location);
        }
        Node::JumpPush { location, label } => {
            let address = ctx.emit(Instruction::JumpPush(JumpTarget::Unresolved), location);
            ctx.add_label_jump(label, address, location);
        }
        Node::JumpPop(location) => {
            ctx.emit(Instruction::JumpPop, location);
        }
        Node::Directive {
            location,
            directive,
        } => directive.compile(ctx, location)?,
        Node::FunctionDefinition {
            location,
            id,
            name,
            parameters,
            body,
        } => compile_function(ctx, location, *id, name, parameters, body)?,
    }
    Ok(())
}

/// points the jump at `address` to the next instruction that will be emitted
fn patch_to_here(ctx: &mut CompileContext<'_>, address: usize) {
    let here = ctx.next_address();
    ctx.builder.set_target(address, JumpTarget::Address(here));
}

fn compile_arguments(ctx: &mut CompileContext<'_>, arguments: &[Node]) -> Result<()> {
    for argument in arguments {
        compile_node(ctx, argument)?;
    }
    Ok(())
}

/// Constants are inlined, system macros expanded, parameters read by index. Everything else is
/// looked up by name at runtime.
fn compile_identifier(ctx: &mut CompileContext<'_>, location: &Location, name: &str) {
    let env = ctx.env();
    if let Some(constant) = env.constant(name) {
        ctx.emit(constant.to_instruction(), location);
    } else if env.is_system_macro(name) {
        for instruction in env.expand_system_macro(name, location) {
            ctx.emit(instruction, location);
        }
    } else if let Some(index) = ctx.parameters().iter().position(|p| p == name) {
        ctx.emit(Instruction::PushArgument(index), location);
    } else {
        ctx.emit(Instruction::PushIdentifier(name.to_string()), location);
    }
}

/// the instruction that stores into the variable `name`
fn identifier_setter(
    ctx: &CompileContext<'_>,
    location: &Location,
    name: &str,
) -> Result<Instruction> {
    let env = ctx.env();
    if env.constant(name).is_some() {
        syntax_error!(location, "Cannot modify read-only constant '{}'.", name);
    }
    if env.is_system_macro(name) {
        syntax_error!(location, "Cannot modify read-only system macro '{}'.", name);
    }
    if ctx.parameters().iter().any(|p| p == name) {
        syntax_error!(location, "Cannot modify read-only argument '{}'.", name);
    }
    Ok(Instruction::SetIdentifier(name.to_string()))
}

/// Emits the base and all links but the last one of an evaluation chain, which is returned.
fn compile_chain_receiver<'n>(ctx: &mut CompileContext<'_>, chain: &'n Node) -> Result<&'n Node> {
    let Node::EvaluationChain { current, remaining, .. } = chain else {
        compiler_bug!(chain.location(), "expected an evaluation chain, got a {}", chain.kind_name());
    };
    compile_node(ctx, current)?;
    let mut remaining: &Node = remaining;
    while let Node::EvaluationChain {
        current,
        remaining: rest,
        ..
    } = remaining
    {
        compile_chain_link(ctx, current)?;
        remaining = &**rest;
    }
    Ok(remaining)
}

/// a field access or instance call on the value on top of the stack
fn compile_chain_link(ctx: &mut CompileContext<'_>, link: &Node) -> Result<()> {
    match link {
        Node::Identifier(location, name) => {
            ctx.emit(Instruction::PushField(name.clone()), location);
        }
        Node::Call {
            location,
            name,
            arguments,
        } => {
            compile_arguments(ctx, arguments)?;
            let call = Instruction::CallInstance {
                name: name.clone(),
                argc: arguments.len(),
            };
            ctx.emit(call, location);
        }
        other => syntax_error!(
            other.location(),
            "A {} can not be part of an evaluation chain.",
            other.kind_name()
        ),
    }
    Ok(())
}

/// Emits whatever has to be on the stack before the value is pushed, and returns the
/// instruction that performs the assignment.
fn compile_setter(ctx: &mut CompileContext<'_>, target: &Node) -> Result<Instruction> {
    match target {
        Node::Identifier(location, name) => identifier_setter(ctx, location, name),
        Node::EvaluationChain { .. } => match compile_chain_receiver(ctx, target)? {
            Node::Identifier(_, name) => Ok(Instruction::SetField(name.clone())),
            other => syntax_error!(
                other.location(),
                "A {} can not be set to a value.",
                other.kind_name()
            ),
        },
        other => syntax_error!(
            other.location(),
            "A {} can not be set to a value.",
            other.kind_name()
        ),
    }
}

/// Like [`compile_setter`], but also pushes the current value of the target. For fields the
/// receiver is duplicated, since both reading and writing consume it.
fn compile_getter_and_setter(ctx: &mut CompileContext<'_>, target: &Node) -> Result<Instruction> {
    match target {
        Node::Identifier(location, name) => {
            let setter = identifier_setter(ctx, location, name)?;
            compile_identifier(ctx, location, name);
            Ok(setter)
        }
        Node::EvaluationChain { .. } => match compile_chain_receiver(ctx, target)? {
            Node::Identifier(location, name) => {
                ctx.emit(Instruction::Duplicate, location);
                ctx.emit(Instruction::PushField(name.clone()), location);
                Ok(Instruction::SetField(name.clone()))
            }
            other => syntax_error!(
                other.location(),
                "A {} can not be set to a value.",
                other.kind_name()
            ),
        },
        other => syntax_error!(
            other.location(),
            "A {} can not be set to a value.",
            other.kind_name()
        ),
    }
}

fn compile_set(
    ctx: &mut CompileContext<'_>,
    location: &Location,
    operator: Option<BinaryOperator>,
    target: &Node,
    value: &Node,
) -> Result<()> {
    let setter = match operator {
        None => {
            let setter = compile_setter(ctx, target)?;
            compile_node(ctx, value)?;
            setter
        }
        Some(operator) => {
            let setter = compile_getter_and_setter(ctx, target)?;
            compile_node(ctx, value)?;
            ctx.emit(Instruction::BinaryOp(operator), location);
            setter
        }
    };
    ctx.emit(setter, location);
    Ok(())
}

fn compile_adjust(
    ctx: &mut CompileContext<'_>,
    location: &Location,
    kind: AdjustKind,
    target: &Node,
    delta: i8,
) -> Result<()> {
    if kind != AdjustKind::Statement && matches!(target, Node::EvaluationChain { .. }) {
        syntax_error!(
            location,
            "Incrementing a field is only possible as a statement of its own."
        );
    }
    let setter = compile_getter_and_setter(ctx, target)?;
    if kind == AdjustKind::Postfix {
        ctx.emit(Instruction::Duplicate, location);
    }
    ctx.emit(Instruction::PushNumber(f64::from(delta).into()), location);
    ctx.emit(Instruction::BinaryOp(BinaryOperator::Add), location);
    if kind == AdjustKind::Prefix {
        ctx.emit(Instruction::Duplicate, location);
    }
    ctx.emit(setter, location);
    Ok(())
}

fn compile_binary(
    ctx: &mut CompileContext<'_>,
    location: &Location,
    operator: BinaryOperator,
    left: &Node,
    right: &Node,
) -> Result<()> {
    compile_node(ctx, left)?;
    if operator.is_short_circuit() {
        let instruction = match operator {
            BinaryOperator::And => Instruction::BinaryAnd(JumpTarget::Unresolved),
            _ => Instruction::BinaryOr(JumpTarget::Unresolved),
        };
        let short_circuit = ctx.emit(instruction, location);
        compile_node(ctx, right)?;
        patch_to_here(ctx, short_circuit);
    } else {
        compile_node(ctx, right)?;
        ctx.emit(Instruction::BinaryOp(operator), location);
    }
    Ok(())
}

fn compile_static_call(
    ctx: &mut CompileContext<'_>,
    location: &Location,
    template: &str,
    name: &str,
    arguments: &[Node],
) -> Result<()> {
    let Some(host_template) = ctx.env().template(template) else {
        syntax_error!(location, "Unknown template '{}'.", template);
    };
    if host_template
        .static_function(name, arguments.len())
        .is_none()
    {
        syntax_error!(
            location,
            "Template '{}' has no static function '{}' taking {} argument(s).",
            template,
            name,
            arguments.len()
        );
    }
    compile_arguments(ctx, arguments)?;
    let call = Instruction::CallStatic {
        template: template.to_string(),
        name: name.to_string(),
        argc: arguments.len(),
    };
    ctx.emit(call, location);
    Ok(())
}

/// The case values are compared one after another, then the case bodies follow in order.
/// Without an implicit break, a switch case falls through into the next one.
fn compile_switch(ctx: &mut CompileContext<'_>, switch: &Switch) -> Result<()> {
    let location = &switch.location;
    compile_node(ctx, &switch.value)?;
    let mut case_jumps = Vec::with_capacity(switch.cases.len());
    for case in &switch.cases {
        compile_node(ctx, &case.value)?;
        let jump = ctx.emit(Instruction::SwitchJump(JumpTarget::Unresolved), case.value.location());
        case_jumps.push(jump);
    }
    ctx.emit(Instruction::Discard, location);
    let default_jump = ctx.emit(Instruction::Jump(JumpTarget::Unresolved), location);

    let start = ctx.next_address();
    for (case, jump) in switch.cases.iter().zip(case_jumps) {
        patch_to_here(ctx, jump);
        compile_node(ctx, &case.body)?;
        if switch.kind == SwitchKind::Select {
            ctx.emit(Instruction::Jump(JumpTarget::Break), case.body.location());
        }
    }
    patch_to_here(ctx, default_jump);
    if let Some(default) = &switch.default {
        compile_node(ctx, default)?;
    }
    let end = ctx.next_address();
    ctx.builder.patch_special_jumps(start, end, Some(end), None);
    Ok(())
}

/// The body is placed inline, behind a jump that skips it.
fn compile_function(
    ctx: &mut CompileContext<'_>,
    location: &Location,
    id: FunctionId,
    name: &str,
    parameters: &[String],
    body: &Node,
) -> Result<()> {
    let skip = ctx.emit(Instruction::Jump(JumpTarget::Unresolved), location);
    let start = ctx.next_address();

    let outer_parameters = ctx.replace_parameters(Some(parameters.to_vec()));
    let result = compile_node(ctx, body);
    ctx.replace_parameters(outer_parameters);
    result?;

    if ctx.falls_off_end(start) {
        ctx.emit(Instruction::PushNull, location);
        ctx.emit(Instruction::Return, location);
    }
    let end = ctx.next_address() - 1;
    patch_to_here(ctx, skip);

    let Some(function) = ctx.functions.get_mut(id) else {
        compiler_bug!(location, "function '{}' was never registered", name);
    };
    function.start = start;
    function.end = end;
    Ok(())
}
