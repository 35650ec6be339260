use insta::assert_yaml_snapshot;
use quill_frontend::pretty::pretty_print;
use quill_frontend::reader::SourceReader;
use quill_frontend::{
    ParseMode, DEFAULT_MAX_IDENTIFIER_LEN, DEFAULT_MAX_NESTING_DEPTH, DEFAULT_MAX_SYNTAX_ERRORS,
};
use quill_ir::bytecode::Program;
use quill_session::diagnostics::{Diagnostic, ErrorKind};
use quill_session::include::MapIncludeResolver;
use quill_vm::{ErrorCode, Value, Vm, VmOptions};

use crate::{CompileOptions, CompileOutput, Compiler};

fn compiler() -> Compiler<Vec<Diagnostic>> {
    Compiler::new(Vec::<Diagnostic>::new(), CompileOptions::default())
}

fn compile(source: &str) -> CompileOutput {
    compiler().compile_program("main", source).unwrap()
}

fn test_compiles(source: &str, should_compile: bool) {
    let output = compile(source);

    match (output.success, should_compile) {
        (false, true) => panic!("failed to compile: {source:?}\n{:#?}", output.errors),
        (true, false) => panic!("unexpectedly compiled: {source:?}"),
        _ => {}
    }
}

struct Run {
    code: ErrorCode,
    output: String,
    stack: Vec<Value>,
}

fn execute(program: &Program, input: &str) -> Run {
    let mut output = vec![];

    let (code, stack) = {
        let mut vm = Vm::new(
            program,
            VmOptions::default(),
            input.as_bytes(),
            &mut output,
            Vec::<u8>::new(),
        );
        let code = vm.run(program.start(), false);
        (code, vm.stack().to_vec())
    };

    Run {
        code,
        output: String::from_utf8(output).unwrap(),
        stack,
    }
}

fn run_with_input(source: &str, input: &str) -> Run {
    let compiled = compile(source);
    assert!(compiled.success, "{:#?}", compiled.errors);
    execute(&compiled.program.unwrap(), input)
}

fn run(source: &str) -> Run {
    run_with_input(source, "")
}

fn kinds(output: &CompileOutput) -> Vec<ErrorKind> {
    output.errors.iter().map(|error| error.kind).collect()
}

#[test]
fn basic_programs() {
    test_compiles("int x = 1;", true);
    test_compiles("float f = 2; f = f * 1.5;", true);
    test_compiles(r#"string s = "a" + "b";"#, true);
    test_compiles(r#"int x = 2 + "x";"#, false);
    test_compiles("int a[] = {1, 2, 3};", true);
    test_compiles("int a[];", false);
    test_compiles("int x = 1", false);
    test_compiles("void f() { return 1; }", false);
}

#[test]
fn ref_parameters_alias_the_argument() {
    let outcome = run("void f(ref int x) { x = x + 1; } int y = 5; f(y); print(y);");

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "6");
}

#[test]
fn while_runs_its_body_three_times() {
    let outcome = run("
int i = 0;
int n = 0;
while (i < 3) {
    i = i + 1;
    n = n + 1;
    print(i);
}
print(n);
");

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "1233");
}

#[test]
fn nested_calls_leave_the_stack_balanced() {
    let outcome = run("
int sq(int x) { return x * x; }
int sum3(int a, int b, int c) { return sq(a) + sq(b) + sq(c); }
void show(int v) { println(v); }
int r = sum3(1, 2, 3);
show(sum3(r, 0, 1));
sum3(1, 1, 1);
");

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "197\n");
    assert_eq!(outcome.stack, vec![Value::Address(0), Value::Int(14)]);
}

#[test]
fn arrays_passed_by_reference_share_storage() {
    let outcome = run("
void fill(ref int v[3]) {
    int i = 0;
    while (i < 3) {
        v[i] = i * 10;
        i = i + 1;
    }
}
int a[3];
fill(a);
print(a[0] + a[1] + a[2]);
");

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "30");
}

#[test]
fn whole_vectors_are_copied() {
    let outcome = run("
float a[2][2] = {{1.0, 2.0}, {3.0, 4.5}};
float b[2][2];
b = a;
a[1][1] = 0;
println(b[1][1]);
println(a[1][1]);
");

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "4.5\n0\n");
}

#[test]
fn recursion() {
    let outcome = run("
int fib(int n) {
    if (n < 2) return n;
    return fib(n - 1) + fib(n - 2);
}
print(fib(10));
");

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "55");
}

#[test]
fn strings_and_input() {
    let outcome = run_with_input(
        r#"
int n = readInt();
string s = readString();
println(s + " " + toString(n * 2));
println(substring(s, 1, 2));
"#,
        "21\nhello\n",
    );

    assert_eq!(outcome.code, ErrorCode::None);
    assert_eq!(outcome.output, "hello 42\nel\n");
}

#[test]
fn runtime_faults_become_the_error_code() {
    let outcome = run("int a[2]; int i = 2; a[i] = 1;");
    assert_eq!(outcome.code, ErrorCode::IndexOutOfRange);

    let outcome = run("int z = 0; print(1 / z);");
    assert_eq!(outcome.code, ErrorCode::InvalidOperand);

    let outcome = run("int f(int n) { return f(n + 1); } print(f(0));");
    assert_eq!(outcome.code, ErrorCode::StackOverflow);
}

#[test]
fn one_error_per_non_boolean_condition() {
    let output = compile("int x = 0; if (1) { x = 2; }");

    assert!(!output.success);
    assert!(output.program.is_none());
    assert_eq!(kinds(&output), vec![ErrorKind::Semantic]);
}

#[test]
fn only_one_phase_reports() {
    // a lexer error hides the later type error
    let output = compile(r#"int x = 1 $ 2; int y = 2 + "x";"#);
    assert!(!kinds(&output).is_empty());
    assert!(kinds(&output).iter().all(|kind| *kind == ErrorKind::Lex));

    // a syntax error hides the later type error
    let output = compile(r#"int x = ; int y = 2 + "x";"#);
    assert!(!kinds(&output).is_empty());
    assert!(kinds(&output).iter().all(|kind| *kind == ErrorKind::Syntax));
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let n = 20_000;
    let output = compile(&format!("int x = {}1{};", "(".repeat(n), ")".repeat(n)));

    assert!(!output.success);
    assert_eq!(kinds(&output), vec![ErrorKind::Syntax]);
}

#[test]
fn program_capacity_is_a_diagnostic() {
    let options = CompileOptions {
        program_capacity: 4,
        ..CompileOptions::default()
    };
    let output = Compiler::new(Vec::<Diagnostic>::new(), options)
        .compile_program("main", "int x = 1; x = x + 1;")
        .unwrap();

    assert!(!output.success);
    assert!(output.program.is_none());
    assert_eq!(kinds(&output), vec![ErrorKind::Codegen]);
    assert_eq!(
        output.errors[0].message,
        "program exceeds its capacity of 4 instructions"
    );
}

#[test]
fn missing_endif_is_one_preprocessor_error() {
    let output = compile("int x = 1;\n#ifdef DEBUG\nprint(x);\n");

    assert!(!output.success);
    assert_yaml_snapshot!(output.errors, @r###"
    ---
    - kind: Preprocessor
      message: "`#ifdef` without matching `#endif`"
      file: main
      line: 2
      column: 1
      text: "#ifdef DEBUG"
      notes: []
    "###);
}

#[test]
fn diagnostics_reach_the_emitter() {
    let mut compiler = compiler();
    let output = compiler.compile_program("main", "int x = true;").unwrap();

    assert!(!output.success);
    assert_eq!(compiler.session.diagnostics, output.errors);
    assert_eq!(compiler.session.sources.len(), 1);
}

#[test]
fn includes_are_spliced() {
    let resolver = MapIncludeResolver::default()
        .with_library("util", "int double(int x) { return x + x; }")
        .with_url("https://example.com/greet.q", r#"string greeting = "hi";"#);

    let mut compiler = compiler().with_resolver(resolver);
    let source = "
#include <util>
#include \"https://example.com/greet.q\"
#define LOUD
#ifdef LOUD
println(greeting);
#else
print(greeting);
#endif
print(double(21));
";
    let output = compiler.compile_program("main", source).unwrap();

    assert!(output.success, "{:#?}", output.errors);
    assert_eq!(compiler.session.sources.len(), 3);

    let outcome = execute(&output.program.unwrap(), "");
    assert_eq!(outcome.output, "hi\n42");
}

#[test]
fn missing_include_is_reported() {
    let output = compile("#include <nowhere>\nint x = 1;");

    assert_eq!(kinds(&output), vec![ErrorKind::Preprocessor]);
}

#[test]
fn statements_and_globals() {
    let mut compiler = compiler();

    let output = compiler
        .compile_statements("main", "println(1 + 2);")
        .unwrap();
    assert_eq!(execute(&output.program.unwrap(), "").output, "3\n");

    let output = compiler
        .compile_statements("main", "int x = 1;")
        .unwrap();
    assert!(!output.success);
    assert!(kinds(&output).iter().all(|kind| *kind == ErrorKind::Syntax));

    let output = compiler
        .compile_globals("main", "int a = 2; float b = a * 1.5;")
        .unwrap();
    assert!(output.success, "{:#?}", output.errors);
    let outcome = execute(&output.program.unwrap(), "");
    assert_eq!(
        outcome.stack,
        vec![Value::Address(0), Value::Int(2), Value::Float(3.0)]
    );
}

#[test]
fn libraries_list_their_functions() {
    let output = compiler()
        .compile_library(
            "math",
            "int sq(int x) { return x * x; } int twice(int x) { return x + x; }",
        )
        .unwrap();

    assert!(output.success, "{:#?}", output.errors);
    let names: Vec<_> = output
        .entry_points
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["sq", "twice"]);
    assert_eq!(output.entry_points[0].1, 0);
}

#[test]
fn entry_points_share_globals() {
    let output = compiler()
        .compile_entry_points(
            "app",
            "int clicks = 0; void bump(int by) { clicks = clicks + by; }",
            &[
                ("onClick", "bump(1); println(clicks);"),
                ("onReset", "clicks = 0;"),
            ],
        )
        .unwrap();
    assert!(output.success, "{:#?}", output.errors);

    let program = output.program.unwrap();
    let entry = output.entry.unwrap();
    let on_click = output.entry_points[0].1;
    let on_reset = output.entry_points[1].1;
    assert_eq!(output.entry_points[0].0, "onClick");

    let mut stdout = vec![];
    {
        let mut vm = Vm::new(
            &program,
            VmOptions::default(),
            "".as_bytes(),
            &mut stdout,
            Vec::<u8>::new(),
        );

        assert_eq!(vm.run(entry, false), ErrorCode::None);
        assert_eq!(vm.run(on_click, false), ErrorCode::None);
        assert_eq!(vm.run(on_click, false), ErrorCode::None);
        assert_eq!(vm.run(on_reset, false), ErrorCode::None);
        assert_eq!(vm.run(on_click, false), ErrorCode::None);
        assert_eq!(vm.stack(), &[Value::Address(0), Value::Int(1)]);
    }
    assert_eq!(String::from_utf8(stdout).unwrap(), "1\n2\n1\n");
}

#[test]
fn handlers_report_under_their_own_name() {
    let output = compiler()
        .compile_entry_points("app", "int clicks = 0;", &[("onClick", "click = 1;")])
        .unwrap();

    assert_eq!(kinds(&output), vec![ErrorKind::Semantic]);
    assert_eq!(output.errors[0].file, "onClick");
}

fn reparse(source: &str) -> String {
    let parsed = quill_frontend::parse(
        SourceReader::new("main", source),
        ParseMode::Program,
        DEFAULT_MAX_IDENTIFIER_LEN,
        DEFAULT_MAX_SYNTAX_ERRORS,
        DEFAULT_MAX_NESTING_DEPTH,
    );
    assert!(parsed.parse_errors.is_empty(), "{:?}", parsed.parse_errors);
    pretty_print(&parsed.program)
}

#[test]
fn pretty_printing_round_trips() {
    let source = r#"
float avg(ref int v[4], int n) {
    int i = 0;
    float sum = 0;
    while (i < n) { sum = sum + v[i]; i = i + 1; }
    return sum / n;
}
int v[] = {1, 2, 3, 4};
bool big = avg(v, 4) > 2 && !(v[0] == 1 || -v[1] < 3 - 1 - 1);
if (big) println("big"); else { println("small"); }
"#;

    let printed = reparse(source);
    assert_eq!(reparse(&printed), printed);

    let original = compile(source);
    let reprinted = compile(&printed);
    assert!(original.success, "{:#?}", original.errors);
    assert_eq!(
        original.program.map(|program| program.listing()),
        reprinted.program.map(|program| program.listing())
    );
}
