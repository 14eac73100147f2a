//! Contains the AST types. Every node carries the location of its leading token.

use ordered_float::OrderedFloat;

use std::rc::Rc;

use crate::core::{BinaryOperator, FunctionId, Location, UnaryOperator};
use crate::environment::Directive;

#[derive(Debug, Clone)]
pub enum Node {
    Null(Location),
    Number(Location, OrderedFloat<f64>),
    Str(Location, String),
    Identifier(Location, String),
    /// `current.remaining`, where `remaining` is either the last link or another chain
    EvaluationChain {
        location: Location,
        current: Box<Node>,
        remaining: Box<Node>,
    },
    /// `name(args)`, resolved against script, host and builtin functions
    Call {
        location: Location,
        name: String,
        arguments: Vec<Node>,
    },
    /// `Template.name(args)` and `new Template(args)`
    StaticCall {
        location: Location,
        template: String,
        name: String,
        arguments: Vec<Node>,
    },
    Unary {
        location: Location,
        operator: UnaryOperator,
        operand: Box<Node>,
    },
    Binary {
        location: Location,
        operator: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },
    Block {
        location: Location,
        statements: Vec<Node>,
    },
    Return {
        location: Location,
        value: Option<Box<Node>>,
    },
    /// evaluates an expression and drops the result
    Discard {
        location: Location,
        value: Box<Node>,
    },
    If {
        location: Location,
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    Switch(Switch),
    /// `target = value` or, with an operator, `target op= value`
    Set {
        location: Location,
        operator: Option<BinaryOperator>,
        target: Box<Node>,
        value: Box<Node>,
    },
    Adjust {
        location: Location,
        kind: AdjustKind,
        target: Box<Node>,
        delta: i8,
    },
    While {
        location: Location,
        condition: Box<Node>,
        body: Box<Node>,
    },
    DoWhile {
        location: Location,
        body: Box<Node>,
        condition: Box<Node>,
    },
    For {
        location: Location,
        init: Box<Node>,
        condition: Box<Node>,
        post: Box<Node>,
        body: Box<Node>,
    },
    Break(Location),
    Continue(Location),
    Label {
        location: Location,
        name: String,
        statement: Box<Node>,
    },
    Jump {
        location: Location,
        label: String,
    },
    /// `call label`: remembers where to come back to, then jumps
    JumpPush {
        location: Location,
        label: String,
    },
    /// `back`
    JumpPop(Location),
    Directive {
        location: Location,
        directive: Rc<dyn Directive>,
    },
    FunctionDefinition {
        location: Location,
        id: FunctionId,
        name: String,
        parameters: Vec<String>,
        body: Box<Node>,
    },
}

/// Whether the old or the new value of an incremented variable is the result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustKind {
    /// `++a`, yields the new value
    Prefix,
    /// `a++`, yields the old value
    Postfix,
    /// `a++;` as a whole statement, yields nothing
    Statement,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// cases fall through into the next case
    Switch,
    /// every case ends with an implicit break
    Select,
}

#[derive(Debug, Clone)]
pub struct Switch {
    pub location: Location,
    pub kind: SwitchKind,
    pub value: Box<Node>,
    pub cases: Vec<SwitchCase>,
    pub default: Option<Box<Node>>,
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    pub value: Node,
    pub body: Node,
}

impl Node {
    pub fn location(&self) -> &Location {
        use Node::*;
        match self {
            Null(location)
            | Number(location, _)
            | Str(location, _)
            | Identifier(location, _)
            | Break(location)
            | Continue(location)
            | JumpPop(location) => location,
            Node::Switch(switch) => &switch.location,
            EvaluationChain { location, .. }
            | Call { location, .. }
            | StaticCall { location, .. }
            | Unary { location, .. }
            | Binary { location, .. }
            | Block { location, .. }
            | Return { location, .. }
            | Discard { location, .. }
            | If { location, .. }
            | Set { location, .. }
            | Adjust { location, .. }
            | While { location, .. }
            | DoWhile { location, .. }
            | For { location, .. }
            | Label { location, .. }
            | Jump { location, .. }
            | JumpPush { location, .. }
            | Node::Directive { location, .. }
            | FunctionDefinition { location, .. } => location,
        }
    }

    /// a short name for the kind of node, used in error messages
    pub fn kind_name(&self) -> &'static str {
        use Node::*;
        match self {
            Null(_) => "null",
            Number(..) => "number",
            Str(..) => "string",
            Identifier(..) => "identifier",
            EvaluationChain { .. } => "evaluation chain",
            Call { .. } => "function call",
            StaticCall { .. } => "static function call",
            Unary { .. } => "unary operation",
            Binary { .. } => "binary operation",
            Block { .. } => "block",
            Return { .. } => "return",
            Discard { .. } => "discard",
            If { .. } => "if",
            Node::Switch(switch) => match switch.kind {
                SwitchKind::Switch => "switch",
                SwitchKind::Select => "select",
            },
            Set { .. } => "assignment",
            Adjust { .. } => "increment",
            While { .. } => "while",
            DoWhile { .. } => "do-while",
            For { .. } => "for",
            Break(_) => "break",
            Continue(_) => "continue",
            Label { .. } => "label",
            Jump { .. } => "jump",
            JumpPush { .. } => "call",
            JumpPop(_) => "back",
            Node::Directive { .. } => "directive",
            FunctionDefinition { .. } => "function definition",
        }
    }

    pub fn empty_block(location: Location) -> Self {
        Node::Block {
            location,
            statements: vec![],
        }
    }
}
