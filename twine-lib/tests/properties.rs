mod common;

use ordered_float::OrderedFloat;

use std::rc::Rc;

use common::{compile, env, eval, run, Value};
use twine_lib::context::{CompileContext, CompileOptions};
use twine_lib::core::*;
use twine_lib::environment::{Constant, Directive, Environment, Preprocessor, StaticEnvironment};
use twine_lib::{CompilationError, Program};

fn compile_error(source: &str) -> CompilationError {
    twine_lib::compile(source, &env(), CompileOptions::default()).unwrap_err()
}

fn position(program: &Program, predicate: impl Fn(&Instruction) -> bool) -> usize {
    program
        .instructions
        .iter()
        .position(predicate)
        .expect("instruction not found")
}

#[test]
fn test_compiling_twice_gives_identical_programs() {
    let source = r#"
        function f(a) { return a; }
        function f(a, b) { return a + b; }
        label top:
        x = f(1) + f(2, 3);
        if x > 10 jump top;
        call "sub";
        return x;
        label sub: back
    "#;
    let first = compile(source);
    let second = compile(source);
    assert_eq!(first, second);
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());

    let loaded = Program::from_bytes(&first.to_bytes().unwrap()).unwrap();
    assert_eq!(loaded, first);
}

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    let program = compile("return 2 + 3 * 4;");
    let mul = position(&program, |i| *i == Instruction::BinaryOp(BinaryOperator::Mul));
    let add = position(&program, |i| *i == Instruction::BinaryOp(BinaryOperator::Add));
    assert!(mul < add);
    assert_eq!(run(&program, vec![]).result, Value::Number(14.0));

    assert_eq!(eval("return (2 + 3) * 4;"), Value::Number(20.0));
    assert_eq!(eval("return 10 - 4 - 3;"), Value::Number(3.0));
    assert_eq!(eval("return 1 + 2 == 3 && 1 << 2 == 4;"), Value::Number(1.0));
}

#[test]
fn test_functions() {
    assert_eq!(
        eval("function add(a,b){ return a+b; } return add(2,3);"),
        Value::Number(5.0)
    );
    assert_eq!(
        eval(
            "function fac(n) { if n <= 1 return 1; return n * fac(n - 1); }
             function fac() { return fac(5); }
             return fac();"
        ),
        Value::Number(120.0)
    );
    // a body without a return yields null
    assert_eq!(eval("function f() { x = 1; } return f();"), Value::Null);
}

#[test]
fn test_right_side_of_and_is_skipped() {
    let program = compile("x = a() && b();");
    let and = position(&program, |i| matches!(i, Instruction::BinaryAnd(_)));
    let call_b = position(&program, |i| matches!(i, Instruction::Call { name, .. } if name == "b"));
    let Instruction::BinaryAnd(JumpTarget::Address(target)) = program.instructions[and] else {
        panic!("short circuit jump is not resolved");
    };
    // all of b() lies between the short circuit and its target
    assert!(and < call_b && call_b < target);
    assert_eq!(program.instructions[target], Instruction::SetIdentifier("x".into()));

    let outcome = run(&compile("x = 0 && print(1); y = 1 || print(2);"), vec![]);
    assert!(outcome.printed.is_empty());
    assert_eq!(outcome.globals["x"], Value::Number(0.0));
    assert_eq!(outcome.globals["y"], Value::Number(1.0));
}

#[test]
fn test_labels() {
    let program = compile(r#"jump "foo"; label foo: return;"#);
    let foo = program.label("foo").unwrap();
    assert_eq!(program.instructions[0], Instruction::Jump(JumpTarget::Address(foo)));

    let err = compile_error("jump bar;");
    assert!(matches!(err, CompilationError::Syntax { .. }));
    assert!(err.message().contains("undeclared label 'bar'"));

    let err = compile_error("label a: label a: return;");
    assert!(err.message().contains("more than once"));

    // a label at the end of a function body stays inside the function
    assert_eq!(
        eval("function f() { jump out; return 1; label out: } x = f(); return x;"),
        Value::Null
    );

    assert_eq!(
        eval("call sub; return r; label sub: r = 7; back"),
        Value::Number(7.0)
    );
}

#[test]
fn test_break_and_continue() {
    assert!(compile_error("break;").message().contains("'break'"));
    assert!(compile_error("if 1 { continue; }").message().contains("'continue'"));

    // continue goes to the post statement, otherwise this would never end
    let outcome = run(
        &compile("for (i = 0; i < 4; i++) { if i == 1 continue; if i == 3 break; print(i); }"),
        vec![],
    );
    assert_eq!(outcome.printed, vec![Value::Number(0.0), Value::Number(2.0)]);

    let outcome = run(
        &compile("i = 0; while 1 { i++; if i < 3 continue; break; } do { i--; } while i > 1"),
        vec![],
    );
    assert_eq!(outcome.globals["i"], Value::Number(1.0));
    // a break in the post statement leaves the for loop, not the enclosing one
    let outcome = run(
        &compile("n = 0; while n < 2 { n++; for (i = 0; i < 3; break) { print(i); } print(10); }"),
        vec![],
    );
    let printed: Vec<_> = [0.0, 10.0, 0.0, 10.0].into_iter().map(Value::Number).collect();
    assert_eq!(outcome.printed, printed);
}

#[test]
fn test_function_name_conflicts() {
    let env = StaticEnvironment::default()
        .with_builtin("len", 1)
        .with_macro("max", 2)
        .with_constant("PI", Constant::Number(OrderedFloat(3.0)));
    let compile = |source: &str| twine_lib::compile(source, &env, CompileOptions::default());

    let err = compile("function len(s) { }").unwrap_err();
    assert!(err.message().contains("builtin 'len(1 args)'"));
    let err = compile("function max(a, b) { }").unwrap_err();
    assert!(err.message().contains("macro 'max(2 args)'"));
    let err = compile("function PI() { }").unwrap_err();
    assert!(err.message().contains("compiler constant 'PI'"));

    let program = compile("function f(a) { } function f(a, b) { } return f(1) + f(1, 2);").unwrap();
    assert_eq!(program.functions["f"].len(), 2);
    assert_eq!(program.function("f", 2).map(|f| f.parameters.len()), Some(2));

    let err = compile("return g(1);").unwrap_err();
    assert!(err.message().contains("Cannot resolve function 'g' with 1 argument(s)"));
}

#[test]
fn test_switch_falls_through_and_select_does_not() {
    let body = "{ case 1: r = r + 1; case 2: r = r + 10; default: r = r + 100; } return r;";
    assert_eq!(eval(&format!("r = 0; switch 1 {}", body)), Value::Number(111.0));
    assert_eq!(eval(&format!("r = 0; select 1 {}", body)), Value::Number(1.0));
    assert_eq!(eval(&format!("r = 0; select 2 {}", body)), Value::Number(10.0));
    assert_eq!(eval(&format!("r = 0; switch 5 {}", body)), Value::Number(100.0));
    assert_eq!(
        eval("r = 0; switch 1 { case 1: r = 1; break; case 2: r = 2; } return r;"),
        Value::Number(1.0)
    );
    assert!(compile_error("select 1 { case 1: break; }").message().contains("'break'"));
}

#[test]
fn test_script_arguments_are_read_only() {
    let options = CompileOptions {
        main_argument_names: vec!["n".into()],
        ..CompileOptions::default()
    };
    let program = twine_lib::compile("return n * 2;", &env(), options.clone()).unwrap();
    assert_eq!(program.instructions[0], Instruction::PushArgument(0));
    assert_eq!(run(&program, vec![Value::Number(21.0)]).result, Value::Number(42.0));

    let err = twine_lib::compile("n = 1;", &env(), options).unwrap_err();
    assert!(err.message().contains("read-only argument 'n'"));
}

#[test]
fn test_errors_carry_the_source_location() {
    let options = CompileOptions {
        source_name: Some("script.twn".into()),
        ..CompileOptions::default()
    };
    let err = twine_lib::compile("x = 1;\ny = ;", &env(), options).unwrap_err();
    assert_eq!(
        err.to_string(),
        "script.twn:2:5: Expected an expression, but got ';' instead."
    );

    let program = compile("x = 1;\nprint(x);");
    let call = position(&program, |i| matches!(i, Instruction::Call { .. }));
    let location = program.location_of(call).unwrap();
    assert_eq!((location.line, location.column), (2, 1));
}

/// `#set name value` assigns a number to a variable
#[derive(Debug)]
struct SetDirective {
    name: String,
    value: OrderedFloat<f64>,
}

impl Directive for SetDirective {
    fn name(&self) -> &str {
        "set"
    }

    fn compile(&self, ctx: &mut CompileContext<'_>, location: &Location) -> twine_lib::Result<()> {
        ctx.emit(Instruction::PushNumber(self.value), location);
        ctx.emit(Instruction::SetIdentifier(self.name.clone()), location);
        Ok(())
    }
}

struct DirectiveEnvironment;

impl Environment for DirectiveEnvironment {
    fn parse_directive(
        &self,
        name: &Token,
        ctx: &mut CompileContext<'_>,
    ) -> twine_lib::Result<Rc<dyn Directive>> {
        let variable = ctx.current_token_increment();
        let value = ctx.current_token_increment();
        match (name.identifier(), variable.kind, value.kind) {
            (Some("set"), TokenKind::Identifier(name), TokenKind::Number(value)) => {
                Ok(Rc::new(SetDirective { name, value }))
            }
            _ => Err(CompilationError::Syntax {
                location: name.location.clone(),
                message: "bad directive".into(),
            }),
        }
    }
}

#[test]
fn test_directives_can_emit_instructions() {
    let program =
        twine_lib::compile("#set x 5\nreturn x;", &DirectiveEnvironment, CompileOptions::default())
            .unwrap();
    assert_eq!(run(&program, vec![]).result, Value::Number(5.0));

    let err = twine_lib::compile("#set 1 2", &DirectiveEnvironment, CompileOptions::default())
        .unwrap_err();
    assert_eq!(err.message(), "bad directive");
}

/// replaces every `ANSWER` with 42
struct AnswerPreprocessor;

impl Preprocessor for AnswerPreprocessor {
    fn run(&self, ctx: &mut CompileContext<'_>) -> twine_lib::Result<()> {
        for token in ctx.tokens_mut() {
            if token.identifier() == Some("ANSWER") {
                token.kind = TokenKind::Number(OrderedFloat(42.0));
            }
        }
        Ok(())
    }
}

#[test]
fn test_preprocessor_rewrites_tokens() {
    let program = twine_lib::compile_with(
        "return ANSWER + 1;",
        &env(),
        &AnswerPreprocessor,
        CompileOptions::default(),
    )
    .unwrap();
    assert_eq!(run(&program, vec![]).result, Value::Number(43.0));
}
