//! Builds the AST from the tokens of a [`CompileContext`].
//!
//! Statements are parsed by recursive descent. Binary operators are collected into a flat list
//! first and then folded by precedence category, see [`build_operators`].

use log::{debug, trace};

use crate::compiler::{compiler_bug, syntax_error, Result};
use crate::context::CompileContext;
use crate::core::*;
use crate::environment::{Signature, Template};

/// Parses all tokens of the context into a block, which becomes the root node
pub fn build(ctx: &mut CompileContext<'_>) -> Result<()> {
    ctx.can_break = false;
    ctx.can_continue = false;
    let location = ctx.current_token().location.clone();
    let mut statements = vec![];
    while ctx.has_more_tokens() {
        statements.push(build_statement(ctx)?);
    }
    debug!(
        "built AST with {} top-level statements and {} functions",
        statements.len(),
        ctx.functions.len()
    );
    ctx.set_root(Node::Block {
        location,
        statements,
    });
    Ok(())
}

/// consumes the current token if it is of the given kind
fn eat(ctx: &mut CompileContext<'_>, kind: &TokenKind) -> bool {
    if &ctx.current_token().kind == kind {
        ctx.increment_token();
        true
    } else {
        false
    }
}

fn expect(ctx: &mut CompileContext<'_>, kind: TokenKind) -> Result<Token> {
    let token = ctx.current_token_increment();
    if token.kind != kind {
        syntax_error!(
            token.location,
            "Expected '{}', but got '{}' instead.",
            kind,
            token
        );
    }
    Ok(token)
}

pub fn build_statement(ctx: &mut CompileContext<'_>) -> Result<Node> {
    let token = ctx.current_token_increment();
    let location = token.location.clone();
    let node = match token.kind {
        TokenKind::Keyword(Keyword::Return) => {
            let value = match ctx.current_token().kind {
                TokenKind::Semicolon | TokenKind::CubClose | TokenKind::Eof => None,
                _ => Some(Box::new(build_expression(ctx, true)?)),
            };
            Node::Return { location, value }
        }
        TokenKind::Keyword(Keyword::If) => {
            let condition = Box::new(build_expression(ctx, true)?);
            let then = Box::new(build_statement(ctx)?);
            let otherwise = if eat(ctx, &TokenKind::Keyword(Keyword::Else)) {
                Some(Box::new(build_statement(ctx)?))
            } else {
                None
            };
            Node::If {
                location,
                condition,
                then,
                otherwise,
            }
        }
        TokenKind::Keyword(Keyword::Switch) => build_switch(ctx, location, SwitchKind::Switch)?,
        TokenKind::Keyword(Keyword::Select) => build_switch(ctx, location, SwitchKind::Select)?,
        TokenKind::CubOpen => build_block(ctx, location)?,
        TokenKind::Keyword(Keyword::While) => {
            let condition = Box::new(build_expression(ctx, true)?);
            let body = Box::new(build_loop_body(ctx)?);
            Node::While {
                location,
                condition,
                body,
            }
        }
        TokenKind::Keyword(Keyword::Do) => {
            let body = Box::new(build_loop_body(ctx)?);
            expect(ctx, TokenKind::Keyword(Keyword::While))?;
            let condition = Box::new(build_expression(ctx, true)?);
            Node::DoWhile {
                location,
                body,
                condition,
            }
        }
        TokenKind::Keyword(Keyword::For) => build_for(ctx, location)?,
        TokenKind::Keyword(Keyword::Break) => {
            if !ctx.can_break {
                syntax_error!(location, "'break' is only allowed inside of a loop or switch.");
            }
            Node::Break(location)
        }
        TokenKind::Keyword(Keyword::Continue) => {
            if !ctx.can_continue {
                syntax_error!(location, "'continue' is only allowed inside of a loop.");
            }
            Node::Continue(location)
        }
        TokenKind::Keyword(Keyword::Label) => {
            let name = build_label_name(ctx)?;
            eat(ctx, &TokenKind::Colon);
            let statement = match ctx.current_token().kind {
                TokenKind::CubClose | TokenKind::Eof => {
                    Node::empty_block(ctx.current_token().location.clone())
                }
                _ => build_statement(ctx)?,
            };
            Node::Label {
                location,
                name,
                statement: Box::new(statement),
            }
        }
        TokenKind::Keyword(Keyword::Jump) => Node::Jump {
            location,
            label: build_label_name(ctx)?,
        },
        TokenKind::Keyword(Keyword::Call) => Node::JumpPush {
            location,
            label: build_label_name(ctx)?,
        },
        TokenKind::Keyword(Keyword::Back) => Node::JumpPop(location),
        TokenKind::Keyword(Keyword::Function) => build_function_definition(ctx, location)?,
        TokenKind::Pound => build_directive(ctx, location)?,
        _ => {
            ctx.decrement_token();
            build_expression_statement(ctx, location)?
        }
    };
    eat(ctx, &TokenKind::Semicolon);
    Ok(node)
}

/// the rest of a block, after its `{`
fn build_block(ctx: &mut CompileContext<'_>, location: Location) -> Result<Node> {
    let mut statements = vec![];
    loop {
        match ctx.current_token().kind {
            TokenKind::CubClose => {
                ctx.increment_token();
                break;
            }
            TokenKind::Eof => syntax_error!(location, "Block is never closed, expected '}}'."),
            _ => statements.push(build_statement(ctx)?),
        }
    }
    Ok(Node::Block {
        location,
        statements,
    })
}

/// a statement in which `break` and `continue` are allowed
fn build_loop_body(ctx: &mut CompileContext<'_>) -> Result<Node> {
    let (could_break, could_continue) = (ctx.can_break, ctx.can_continue);
    ctx.can_break = true;
    ctx.can_continue = true;
    let body = build_statement(ctx);
    ctx.can_break = could_break;
    ctx.can_continue = could_continue;
    body
}

/// `for (init; condition; post) body`, the parentheses are optional
fn build_for(ctx: &mut CompileContext<'_>, location: Location) -> Result<Node> {
    let parenthesized = eat(ctx, &TokenKind::ParOpen);
    let init = Box::new(build_statement(ctx)?);
    let condition = Box::new(build_expression(ctx, true)?);
    eat(ctx, &TokenKind::Semicolon);

    // a break in the post statement leaves this loop, a continue would never get past it
    let (could_break, could_continue) = (ctx.can_break, ctx.can_continue);
    ctx.can_break = true;
    ctx.can_continue = false;
    let post = build_statement(ctx);
    ctx.can_break = could_break;
    ctx.can_continue = could_continue;
    let post = Box::new(post?);

    if parenthesized {
        expect(ctx, TokenKind::ParClose)?;
    }
    let body = Box::new(build_loop_body(ctx)?);
    Ok(Node::For {
        location,
        init,
        condition,
        post,
        body,
    })
}

/// Switch and select only differ in that select cases end with an implicit break. That's
/// also why `break` isn't allowed in a select case.
fn build_switch(ctx: &mut CompileContext<'_>, location: Location, kind: SwitchKind) -> Result<Node> {
    let value = Box::new(build_expression(ctx, true)?);
    expect(ctx, TokenKind::CubOpen)?;

    let could_break = ctx.can_break;
    ctx.can_break = kind == SwitchKind::Switch;
    let result = build_switch_cases(ctx, &location);
    ctx.can_break = could_break;
    let (cases, default) = result?;

    Ok(Node::Switch(Switch {
        location,
        kind,
        value,
        cases,
        default,
    }))
}

type SwitchCases = (Vec<SwitchCase>, Option<Box<Node>>);

fn build_switch_cases(ctx: &mut CompileContext<'_>, location: &Location) -> Result<SwitchCases> {
    let mut cases = vec![];
    let mut default = None;
    loop {
        let token = ctx.current_token_increment();
        match token.kind {
            TokenKind::Keyword(Keyword::Case) => {
                let value = build_expression(ctx, true)?;
                expect(ctx, TokenKind::Colon)?;
                let body = build_case_body(ctx, token.location, location)?;
                cases.push(SwitchCase { value, body });
            }
            TokenKind::Keyword(Keyword::Default) => {
                if default.is_some() {
                    syntax_error!(token.location, "There can only be one default case.");
                }
                expect(ctx, TokenKind::Colon)?;
                default = Some(Box::new(build_case_body(ctx, token.location, location)?));
            }
            TokenKind::CubClose => break,
            _ => syntax_error!(
                token.location,
                "Expected 'case', 'default' or '}}', but got '{}' instead.",
                token
            ),
        }
    }
    Ok((cases, default))
}

/// the statements up to the next case, default or the end of the switch
fn build_case_body(
    ctx: &mut CompileContext<'_>,
    location: Location,
    switch_location: &Location,
) -> Result<Node> {
    let mut statements = vec![];
    loop {
        match ctx.current_token().kind {
            TokenKind::Keyword(Keyword::Case)
            | TokenKind::Keyword(Keyword::Default)
            | TokenKind::CubClose => break,
            TokenKind::Eof => syntax_error!(switch_location, "Switch is never closed, expected '}}'."),
            _ => statements.push(build_statement(ctx)?),
        }
    }
    Ok(Node::Block {
        location,
        statements,
    })
}

/// labels can be named by an identifier or a string
fn build_label_name(ctx: &mut CompileContext<'_>) -> Result<String> {
    let token = ctx.current_token_increment();
    match token.kind {
        TokenKind::Identifier(name) | TokenKind::Str(name) => Ok(name),
        _ => syntax_error!(
            token.location,
            "Expected a label name, but got '{}' instead.",
            token
        ),
    }
}

fn build_directive(ctx: &mut CompileContext<'_>, location: Location) -> Result<Node> {
    let name = ctx.current_token_increment();
    if !matches!(name.kind, TokenKind::Identifier(_) | TokenKind::Keyword(_)) {
        syntax_error!(
            name.location,
            "Expected a directive name after '#', but got '{}' instead.",
            name
        );
    }
    let env = ctx.env();
    let directive = env.parse_directive(&name, ctx)?;
    trace!("parsed directive #{} at {}", directive.name(), location);
    Ok(Node::Directive {
        location,
        directive,
    })
}

/// `function name(a, b) { ... }`
fn build_function_definition(ctx: &mut CompileContext<'_>, location: Location) -> Result<Node> {
    let name_token = ctx.current_token_increment();
    let TokenKind::Identifier(name) = name_token.kind else {
        syntax_error!(
            name_token.location,
            "Expected a function name, but got '{}' instead.",
            name_token
        );
    };

    expect(ctx, TokenKind::ParOpen)?;
    let mut parameters: Vec<String> = vec![];
    if !eat(ctx, &TokenKind::ParClose) {
        loop {
            let token = ctx.current_token_increment();
            let TokenKind::Identifier(parameter) = token.kind else {
                syntax_error!(
                    token.location,
                    "Expected a parameter name, but got '{}' instead.",
                    token
                );
            };
            if parameters.contains(&parameter) {
                syntax_error!(
                    token.location,
                    "Parameter '{}' of function '{}' is declared more than once.",
                    parameter,
                    name
                );
            }
            parameters.push(parameter);

            let separator = ctx.current_token_increment();
            match separator.kind {
                TokenKind::Comma => {}
                TokenKind::ParClose => break,
                _ => syntax_error!(
                    separator.location,
                    "Expected ',' or ')', but got '{}' instead.",
                    separator
                ),
            }
        }
    }

    if ctx.current_token().kind != TokenKind::CubOpen {
        syntax_error!(
            ctx.current_token().location,
            "Expected '{{' to start the body of function '{}', but got '{}' instead.",
            name,
            ctx.current_token()
        );
    }
    let (could_break, could_continue) = (ctx.can_break, ctx.can_continue);
    ctx.can_break = false;
    ctx.can_continue = false;
    let body = build_statement(ctx);
    ctx.can_break = could_break;
    ctx.can_continue = could_continue;
    let body = body?;

    // calls are resolved in `CompileContext::finish`, so the body may call the function itself
    verify_name_is_available(ctx, &name, parameters.len(), &name_token.location)?;
    let id = ctx.functions.register(&name, parameters.clone());
    trace!("registered function {}({} args)", name, parameters.len());

    Ok(Node::FunctionDefinition {
        location,
        id,
        name,
        parameters,
        body: Box::new(body),
    })
}

/// Script functions share their name space with macros, builtins, compiler constants and host
/// functions. Only script functions can be overloaded by arity.
fn verify_name_is_available(
    ctx: &CompileContext<'_>,
    name: &str,
    argc: usize,
    location: &Location,
) -> Result<()> {
    let signature = Signature::new(name, argc);
    let env = ctx.env();
    if let Some(existing) = ctx.function(name, argc) {
        syntax_error!(
            location,
            "Function '{}' conflicts with the script function '{}' that is already defined.",
            signature,
            existing
        );
    }
    if let Some(existing) = env.macro_signature(name, argc) {
        syntax_error!(
            location,
            "Function '{}' conflicts with the macro '{}'.",
            signature,
            existing
        );
    }
    if let Some(existing) = env.builtin(name, argc) {
        syntax_error!(
            location,
            "Function '{}' conflicts with the builtin '{}'.",
            signature,
            existing
        );
    }
    if argc == 0 && env.constant(name).is_some() {
        syntax_error!(
            location,
            "Function '{}' conflicts with the compiler constant '{}'.",
            signature,
            name
        );
    }
    if let Some(existing) = env.global_function(name) {
        syntax_error!(
            location,
            "Function '{}' conflicts with the host function '{}'.",
            signature,
            existing.name
        );
    }
    Ok(())
}

/// A statement that starts like an expression: an assignment, an increment or a call
fn build_expression_statement(ctx: &mut CompileContext<'_>, location: Location) -> Result<Node> {
    let expression = build_expression(ctx, false)?;
    if let TokenKind::Set(operator) = ctx.current_token().kind {
        ctx.increment_token();
        let value = build_expression(ctx, true)?;
        return Ok(Node::Set {
            location,
            operator,
            target: Box::new(expression),
            value: Box::new(value),
        });
    }
    match expression {
        Node::Adjust {
            location,
            target,
            delta,
            ..
        } => Ok(Node::Adjust {
            location,
            kind: AdjustKind::Statement,
            target,
            delta,
        }),
        Node::Call { .. } | Node::StaticCall { .. } | Node::EvaluationChain { .. } => {
            Ok(Node::Discard {
                location,
                value: Box::new(expression),
            })
        }
        other => syntax_error!(
            other.location(),
            "Expected a statement, but got a {} instead.",
            other.kind_name()
        ),
    }
}

/// Reads one operand and, if `operators` is set, the binary operators that follow it.
pub fn build_expression(ctx: &mut CompileContext<'_>, operators: bool) -> Result<Node> {
    let token = ctx.current_token_increment();
    let location = token.location.clone();
    let mut node = match token.kind {
        TokenKind::Keyword(Keyword::Null) => Node::Null(location),
        TokenKind::Number(n) => Node::Number(location, n),
        TokenKind::Str(s) => Node::Str(location, s),
        TokenKind::Identifier(name) => build_identifier_expression(ctx, location, name)?,
        TokenKind::ParOpen => {
            let inner = build_expression(ctx, true)?;
            expect(ctx, TokenKind::ParClose)?;
            inner
        }
        TokenKind::Operator(BinaryOperator::Sub) => Node::Unary {
            location,
            operator: UnaryOperator::Negate,
            operand: Box::new(build_expression(ctx, false)?),
        },
        TokenKind::Operator(op) => {
            syntax_error!(location, "'{}' can not be used as a unary operator.", op)
        }
        TokenKind::Unary(operator) => Node::Unary {
            location,
            operator,
            operand: Box::new(build_expression(ctx, false)?),
        },
        TokenKind::Adjust(delta) => Node::Adjust {
            location,
            kind: AdjustKind::Prefix,
            target: Box::new(build_expression(ctx, false)?),
            delta,
        },
        TokenKind::Keyword(Keyword::New) => build_new(ctx, location)?,
        kind => syntax_error!(
            location,
            "Expected an expression, but got '{}' instead.",
            kind
        ),
    };

    if let TokenKind::Adjust(delta) = ctx.current_token().kind {
        ctx.increment_token();
        node = Node::Adjust {
            location: node.location().clone(),
            kind: AdjustKind::Postfix,
            target: Box::new(node),
            delta,
        };
    }

    if operators {
        if let TokenKind::Operator(operator) = ctx.current_token().kind {
            ctx.increment_token();
            node = build_operators(ctx, node, operator)?;
        }
    }
    Ok(node)
}

/// Collects `operand (operator operand)*` and folds it into a tree. Each pass over the list
/// folds all operators of one precedence category from left to right, starting with the
/// category that binds tightest.
fn build_operators(
    ctx: &mut CompileContext<'_>,
    first: Node,
    first_operator: BinaryOperator,
) -> Result<Node> {
    let mut nodes = vec![first];
    let mut operators = vec![first_operator];
    loop {
        nodes.push(build_expression(ctx, false)?);
        match ctx.current_token().kind {
            TokenKind::Operator(operator) => {
                ctx.increment_token();
                operators.push(operator);
            }
            _ => break,
        }
    }

    for category in 0..=MAX_CATEGORY {
        let mut i = 0;
        while i < operators.len() {
            if operators[i].category() != category {
                i += 1;
                continue;
            }
            let operator = operators.remove(i);
            let right = nodes.remove(i + 1);
            let left = nodes.remove(i);
            let location = left.location().clone();
            nodes.insert(
                i,
                Node::Binary {
                    location,
                    operator,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            );
        }
    }

    let location = ctx.current_token().location.clone();
    match (nodes.pop(), nodes.is_empty()) {
        (Some(node), true) => Ok(node),
        _ => compiler_bug!(location, "operators were not folded into one node"),
    }
}

/// An identifier, a call, a static call on a template, or the start of an evaluation chain
fn build_identifier_expression(
    ctx: &mut CompileContext<'_>,
    location: Location,
    name: String,
) -> Result<Node> {
    let env = ctx.env();
    let base = if ctx.current_token().kind == TokenKind::ParOpen {
        let arguments = build_arguments(ctx)?;
        Node::Call {
            location: location.clone(),
            name,
            arguments,
        }
    } else if ctx.current_token().kind == TokenKind::Period
        && env.template(&name).is_some()
        && ctx.peek(1).identifier().is_some()
    {
        ctx.increment_token();
        let function = ctx.current_token_increment();
        let function_name = function.identifier().unwrap_or_default().to_string();
        let arguments = build_arguments(ctx)?;
        Node::StaticCall {
            location: location.clone(),
            template: name,
            name: function_name,
            arguments,
        }
    } else {
        Node::Identifier(location.clone(), name)
    };
    continue_chain(ctx, location, base)
}

/// if a `.` follows, `base` becomes the start of an evaluation chain
fn continue_chain(ctx: &mut CompileContext<'_>, location: Location, base: Node) -> Result<Node> {
    if !eat(ctx, &TokenKind::Period) {
        return Ok(base);
    }
    let remaining = build_chain_link(ctx)?;
    Ok(Node::EvaluationChain {
        location,
        current: Box::new(base),
        remaining: Box::new(remaining),
    })
}

/// a field or instance call after a `.`, and the rest of the chain behind it
fn build_chain_link(ctx: &mut CompileContext<'_>) -> Result<Node> {
    let token = ctx.current_token_increment();
    let TokenKind::Identifier(name) = token.kind else {
        syntax_error!(
            token.location,
            "Expected a field or function name after '.', but got '{}' instead.",
            token
        );
    };
    let location = token.location;
    let link = if ctx.current_token().kind == TokenKind::ParOpen {
        Node::Call {
            location: location.clone(),
            name,
            arguments: build_arguments(ctx)?,
        }
    } else {
        Node::Identifier(location.clone(), name)
    };
    if !eat(ctx, &TokenKind::Period) {
        return Ok(link);
    }
    let remaining = build_chain_link(ctx)?;
    Ok(Node::EvaluationChain {
        location,
        current: Box::new(link),
        remaining: Box::new(remaining),
    })
}

/// `(a, b, c)`
fn build_arguments(ctx: &mut CompileContext<'_>) -> Result<Vec<Node>> {
    let open = expect(ctx, TokenKind::ParOpen)?;
    let mut arguments = vec![];
    if eat(ctx, &TokenKind::ParClose) {
        return Ok(arguments);
    }
    loop {
        arguments.push(build_expression(ctx, true)?);
        let separator = ctx.current_token_increment();
        match separator.kind {
            TokenKind::Comma => {}
            TokenKind::ParClose => break,
            TokenKind::Eof => syntax_error!(open.location, "Argument list is never closed."),
            _ => syntax_error!(
                separator.location,
                "Expected ',' or ')', but got '{}' instead.",
                separator
            ),
        }
    }
    Ok(arguments)
}

/// `new Template(args)` or `new Template.constructor(args)`
fn build_new(ctx: &mut CompileContext<'_>, location: Location) -> Result<Node> {
    let token = ctx.current_token_increment();
    let TokenKind::Identifier(template_name) = token.kind else {
        syntax_error!(
            token.location,
            "Expected a template name after 'new', but got '{}' instead.",
            token
        );
    };
    let Some(template) = ctx.env().template(&template_name) else {
        syntax_error!(token.location, "Unknown template '{}'.", template_name);
    };

    let constructor = if eat(ctx, &TokenKind::Period) {
        let token = ctx.current_token_increment();
        match token.kind {
            TokenKind::Identifier(name) => name,
            _ => syntax_error!(
                token.location,
                "Expected a constructor name, but got '{}' instead.",
                token
            ),
        }
    } else {
        Template::CONSTRUCTOR.to_string()
    };
    let arguments = build_arguments(ctx)?;
    if template
        .static_function(&constructor, arguments.len())
        .is_none()
    {
        syntax_error!(
            location,
            "Template '{}' has no constructor '{}' taking {} argument(s).",
            template_name,
            constructor,
            arguments.len()
        );
    }

    let call = Node::StaticCall {
        location: location.clone(),
        template: template_name,
        name: constructor,
        arguments,
    };
    continue_chain(ctx, location, call)
}
