use insta::assert_snapshot;
use quill_frontend::reader::SourceReader;
use quill_frontend::{
    ParseMode, DEFAULT_MAX_IDENTIFIER_LEN, DEFAULT_MAX_NESTING_DEPTH, DEFAULT_MAX_SYNTAX_ERRORS,
};
use quill_ir::bytecode::ProgramFull;
use quill_middle::scope::Scopes;

use crate::{Codegen, CodegenError, CodegenResult};

fn compile_with_capacity(source: &str, capacity: usize) -> CodegenResult<String> {
    let parsed = quill_frontend::parse(
        SourceReader::new("main", source),
        ParseMode::Program,
        DEFAULT_MAX_IDENTIFIER_LEN,
        DEFAULT_MAX_SYNTAX_ERRORS,
        DEFAULT_MAX_NESTING_DEPTH,
    );
    assert!(parsed.parse_errors.is_empty(), "{:?}", parsed.parse_errors);

    let mut scopes = Scopes::new();
    let (annotations, errors) = quill_middle::analyze(&mut scopes, &parsed.program);
    assert!(errors.is_empty(), "{errors:?}");

    let mut codegen = Codegen::new(&scopes, capacity);
    codegen.emit_functions(&parsed.program, &annotations)?;
    let start = codegen.emit_main(&parsed.program, &annotations)?;

    Ok(codegen.finish(start).listing())
}

fn compile(source: &str) -> String {
    compile_with_capacity(source, 1024).unwrap()
}

#[test]
fn mixed_arithmetic_converts() {
    assert_snapshot!(compile("float x = 1 + 2.5; print(x);"), @r###"
    SIZE 9
    START 0
    ENTER #1
    CONST #1
    ITOF #1
    CONST %2.5
    ADDF
    STOREG #1
    LOADG #1
    SYSCALL #0
    HALT
    "###);
}

#[test]
fn ref_parameter_goes_through_its_address() {
    let source = "
void inc(ref int x) { x = x + 1; }
int y = 5;
inc(y);
";

    assert_snapshot!(compile(source), @r###"
    SIZE 15
    START 8
    ENTER #0
    LOADL #-2
    LOADL #-2
    LOADI
    CONST #1
    ADDI
    STOREI
    RETURN #0
    ENTER #1
    CONST #5
    STOREG #1
    ADDRG #1
    CALL #0
    ADJUST #-1
    HALT
    "###);
}

#[test]
fn result_slot_and_argument_cleanup() {
    let source = "
int add(int a, int b) { int c = a + b; return c; }
int r = add(1, 2);
";

    assert_snapshot!(compile(source), @r###"
    SIZE 16
    START 8
    ENTER #1
    LOADL #-3
    LOADL #-2
    ADDI
    STOREL #1
    LOADL #1
    STOREL #-4
    RETURN #1
    ENTER #1
    ADJUST #1
    CONST #1
    CONST #2
    CALL #0
    ADJUST #-2
    STOREG #1
    HALT
    "###);
}

#[test]
fn jumps_are_patched() {
    let source = r#"
int i = 0;
while (i < 3) i = i + 1;
if (i == 3) print("ok"); else print("no");
"#;

    assert_snapshot!(compile(source), @r###"
    SIZE 22
    START 0
    ENTER #1
    CONST #0
    STOREG #1
    LOADG #1
    CONST #3
    LT
    JUMPF #12
    LOADG #1
    CONST #1
    ADDI
    STOREG #1
    JUMP #3
    LOADG #1
    CONST #3
    EQ
    JUMPF #19
    CONST "ok
    SYSCALL #0
    JUMP #21
    CONST "no
    SYSCALL #0
    HALT
    "###);
}

#[test]
fn indexing_checks_every_dimension() {
    let source = "int m[2][3]; m[1][2] = 7; int k = m[1][2];";

    assert_snapshot!(compile(source), @r###"
    SIZE 24
    START 0
    ENTER #7
    ADDRG #1
    CONST #1
    CHECK #2
    CONST #3
    MULI
    ADDA
    CONST #2
    CHECK #3
    ADDA
    CONST #7
    STOREI
    ADDRG #1
    CONST #1
    CHECK #2
    CONST #3
    MULI
    ADDA
    CONST #2
    CHECK #3
    ADDA
    LOADI
    STOREG #7
    HALT
    "###);
}

#[test]
fn tuples_are_stored_as_blocks() {
    assert_snapshot!(compile("float v[3] = {1, 2.5, 3};"), @r###"
    SIZE 9
    START 0
    ENTER #3
    ADDRG #1
    CONST #1
    ITOF #1
    CONST %2.5
    CONST #3
    ITOF #1
    STOREB #3
    HALT
    "###);
}

#[test]
fn builtin_results_are_discarded_as_statements() {
    assert_snapshot!(compile(r#"readInt(); int n = strlen("abc");"#), @r###"
    SIZE 7
    START 0
    ENTER #1
    READ 'i
    ADJUST #-1
    CONST "abc
    SYSCALL #3
    STOREG #1
    HALT
    "###);
}

#[test]
fn constants_and_logic() {
    assert_snapshot!(compile("bool a = true; bool b = !(a && false) || a;"), @r###"
    SIZE 11
    START 0
    ENTER #2
    CONST :true
    STOREG #1
    LOADG #1
    CONST :false
    AND
    NOT
    LOADG #1
    OR
    STOREG #2
    HALT
    "###);
}

#[test]
fn capacity_is_reported() {
    assert_eq!(
        compile_with_capacity("int x = 1; x = x + 1;", 4),
        Err(CodegenError::ProgramFull(ProgramFull { capacity: 4 }))
    );
}
