//! A tiny evaluator for compiled programs. It only knows numbers, strings and null, so it can
//! run everything but field accesses and template calls.

#![allow(dead_code)]

use std::collections::HashMap;

use twine_lib::context::CompileOptions;
use twine_lib::core::*;
use twine_lib::environment::StaticEnvironment;

const MAX_STEPS: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Str(String),
}

impl Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
        }
    }

    fn number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            other => panic!("expected a number, got {:?}", other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

struct Frame {
    return_address: usize,
    arguments: Vec<Value>,
}

/// The result of running a program: its return value, the arguments of every `print` call
/// and the globals it left behind
#[derive(Debug)]
pub struct Outcome {
    pub result: Value,
    pub printed: Vec<Value>,
    pub globals: HashMap<String, Value>,
}

/// the environment the integration tests compile against
pub fn env() -> StaticEnvironment {
    StaticEnvironment::default()
        .with_global_function("print", 1, Some(1))
        .with_global_function("a", 0, Some(0))
        .with_global_function("b", 0, Some(0))
}

pub fn compile(source: &str) -> Program {
    twine_lib::compile(source, &env(), CompileOptions::default()).unwrap()
}

pub fn run(program: &Program, arguments: Vec<Value>) -> Outcome {
    let mut stack: Vec<Value> = vec![];
    let mut frames = vec![Frame {
        return_address: usize::MAX,
        arguments,
    }];
    let mut jump_stack = vec![];
    let mut globals = HashMap::new();
    let mut printed = vec![];
    let mut pc = 0;

    for _ in 0..MAX_STEPS {
        let Some(instruction) = program.instructions.get(pc) else {
            panic!("program counter {} ran past the end", pc);
        };
        pc += 1;
        match instruction {
            Instruction::PushNull => stack.push(Value::Null),
            Instruction::PushNumber(n) => stack.push(Value::Number(n.0)),
            Instruction::PushString(s) => stack.push(Value::Str(s.clone())),
            Instruction::PushIdentifier(name) => {
                stack.push(globals.get(name).cloned().unwrap_or(Value::Null))
            }
            Instruction::PushArgument(index) => {
                let frame = frames.last().unwrap();
                stack.push(frame.arguments.get(*index).cloned().unwrap_or(Value::Null));
            }
            Instruction::SetIdentifier(name) => {
                let value = stack.pop().unwrap();
                globals.insert(name.clone(), value);
            }
            Instruction::Call { name, argc } => {
                let arguments = stack.split_off(stack.len() - argc);
                if let Some(function) = program.function(name, *argc) {
                    frames.push(Frame {
                        return_address: pc,
                        arguments,
                    });
                    pc = function.start;
                } else if name == "print" {
                    printed.extend(arguments);
                    stack.push(Value::Null);
                } else {
                    stack.push(Value::Null);
                }
            }
            Instruction::Duplicate => {
                let top = stack.last().unwrap().clone();
                stack.push(top);
            }
            Instruction::Discard => {
                stack.pop().unwrap();
            }
            Instruction::UnaryOp(op) => {
                let value = stack.pop().unwrap();
                stack.push(match op {
                    UnaryOperator::Negate => Value::Number(-value.number()),
                    UnaryOperator::Not => Value::from(!value.is_truthy()),
                });
            }
            Instruction::BinaryOp(op) => {
                let right = stack.pop().unwrap();
                let left = stack.pop().unwrap();
                stack.push(binary_op(*op, left, right));
            }
            Instruction::BinaryAnd(target) => {
                if !stack.pop().unwrap().is_truthy() {
                    stack.push(Value::from(false));
                    pc = address(target);
                }
            }
            Instruction::BinaryOr(target) => {
                if stack.pop().unwrap().is_truthy() {
                    stack.push(Value::from(true));
                    pc = address(target);
                }
            }
            Instruction::Jump(target) => pc = address(target),
            Instruction::JumpIf(target) => {
                if stack.pop().unwrap().is_truthy() {
                    pc = address(target);
                }
            }
            Instruction::JumpUnless(target) => {
                if !stack.pop().unwrap().is_truthy() {
                    pc = address(target);
                }
            }
            Instruction::JumpPush(target) => {
                jump_stack.push(pc);
                pc = address(target);
            }
            Instruction::JumpPop => pc = jump_stack.pop().unwrap(),
            Instruction::SwitchJump(target) => {
                let case = stack.pop().unwrap();
                if stack.last() == Some(&case) {
                    stack.pop();
                    pc = address(target);
                }
            }
            Instruction::Return => {
                let result = stack.pop().unwrap();
                let frame = frames.pop().unwrap();
                if frames.is_empty() {
                    return Outcome {
                        result,
                        printed,
                        globals,
                    };
                }
                pc = frame.return_address;
                stack.push(result);
            }
            other => panic!("the test evaluator can't run {}", other),
        }
    }
    panic!("program did not finish within {} steps", MAX_STEPS);
}

fn address(target: &JumpTarget) -> usize {
    target
        .address()
        .unwrap_or_else(|| panic!("unresolved jump target {}", target))
}

fn binary_op(op: BinaryOperator, left: Value, right: Value) -> Value {
    use BinaryOperator::*;
    match (op, &left, &right) {
        (Add, Value::Str(l), r) => Value::Str(format!("{}{}", l, display(r))),
        (Eq, _, _) => Value::from(left == right),
        (Neq, _, _) => Value::from(left != right),
        _ => {
            let (l, r) = (left.number(), right.number());
            match op {
                Mul => Value::Number(l * r),
                Div => Value::Number(l / r),
                Mod => Value::Number(l % r),
                Add => Value::Number(l + r),
                Sub => Value::Number(l - r),
                Shl => Value::Number(((l as i64) << (r as i64)) as f64),
                Shr => Value::Number(((l as i64) >> (r as i64)) as f64),
                BitAnd => Value::Number(((l as i64) & (r as i64)) as f64),
                BitOr => Value::Number(((l as i64) | (r as i64)) as f64),
                BitXor => Value::Number(((l as i64) ^ (r as i64)) as f64),
                Lt => Value::from(l < r),
                Lte => Value::from(l <= r),
                Gt => Value::from(l > r),
                Gte => Value::from(l >= r),
                Eq | Neq | And | Or => unreachable!("handled above or short-circuited"),
            }
        }
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Number(n) => n.to_string(),
        Value::Str(s) => s.clone(),
    }
}

/// evaluates a script and returns what it returned
pub fn eval(source: &str) -> Value {
    run(&compile(source), vec![]).result
}
