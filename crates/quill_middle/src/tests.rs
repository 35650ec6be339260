use insta::assert_snapshot;
use quill_frontend::ast::{Item, Program, StmtKind};
use quill_frontend::reader::SourceReader;
use quill_frontend::{
    ParseMode, DEFAULT_MAX_IDENTIFIER_LEN, DEFAULT_MAX_NESTING_DEPTH, DEFAULT_MAX_SYNTAX_ERRORS,
};
use quill_ir::{BinOp, Type};

use crate::scope::{Scopes, SymbolKind};
use crate::{analyze, dyadic_type, unify, Annotations, SemanticError, SemanticErrorKind as K};

fn parse(source: &str) -> Program {
    let parsed = quill_frontend::parse(
        SourceReader::new("main", source),
        ParseMode::Program,
        DEFAULT_MAX_IDENTIFIER_LEN,
        DEFAULT_MAX_SYNTAX_ERRORS,
        DEFAULT_MAX_NESTING_DEPTH,
    );
    assert!(parsed.lexer_errors.is_empty(), "{:?}", parsed.lexer_errors);
    assert!(parsed.parse_errors.is_empty(), "{:?}", parsed.parse_errors);
    parsed.program
}

fn check(source: &str) -> (Scopes, Annotations, Vec<SemanticError>) {
    let program = parse(source);
    let mut scopes = Scopes::new();
    let (annotations, errors) = analyze(&mut scopes, &program);
    (scopes, annotations, errors)
}

fn kinds(source: &str) -> Vec<K> {
    check(source).2.into_iter().map(|err| err.kind).collect()
}

fn messages(source: &str) -> String {
    check(source)
        .2
        .iter()
        .map(|err| format!("{}: {}", err.token.location, err.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

fn global_type(scopes: &Scopes, name: &str) -> Type {
    let symbol = scopes.lookup_local(scopes.global(), name).unwrap();
    scopes.symbol(symbol).value_type().unwrap().clone()
}

#[test]
fn condition_must_be_bool() {
    assert_snapshot!(
        messages("int x; if (1) x = 1;"),
        @"main:1:12: condition must be of type bool, found `int`"
    );

    assert!(kinds("int x; while (x < 3 && true) x = x + 1;").is_empty());
}

#[test]
fn open_array_size() {
    assert_eq!(kinds("int a[];"), vec![K::MissingSize("a".into())]);
    assert_eq!(kinds("int a[] = 5;"), vec![K::MissingSize("a".into())]);

    let (scopes, _, errors) = check("int a[] = {1, 2, 3}; float m[][2] = {{1, 2}, {3, 4.5}};");
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(global_type(&scopes, "a").to_string(), "int[3]");
    assert_eq!(global_type(&scopes, "m").to_string(), "float[2][2]");
}

#[test]
fn operand_types() {
    assert!(kinds(r#"string s = "a" + "b"; bool c = s < "c";"#).is_empty());
    assert!(kinds("float g = 1 + 2.5; int m = 7 % 2; bool b = !(1 == 2.0);").is_empty());

    assert_eq!(
        kinds(r#"int x = 2 + "x";"#),
        vec![K::InvalidOperands {
            op: "+",
            lhs: Type::Int,
            rhs: Type::String,
        }]
    );
    assert_eq!(
        kinds("int m = 5 % 2.0;"),
        vec![K::InvalidOperands {
            op: "%",
            lhs: Type::Int,
            rhs: Type::Float,
        }]
    );
    assert_eq!(
        kinds("bool b = !1; int n = -true;"),
        vec![
            K::InvalidOperand {
                op: "!",
                ty: Type::Int,
            },
            K::InvalidOperand {
                op: "-",
                ty: Type::Bool,
            },
        ]
    );
    assert_eq!(
        kinds("bool b = 1 && true;"),
        vec![K::InvalidOperands {
            op: "&&",
            lhs: Type::Int,
            rhs: Type::Bool,
        }]
    );
}

#[test]
fn assignment_compatibility() {
    assert_eq!(
        kinds("float f = 1; int i = 1.5;"),
        vec![K::TypeMismatch {
            expected: Type::Int,
            found: Type::Float,
        }]
    );

    assert_eq!(
        kinds("int z[3] = {1, 2};"),
        vec![K::TypeMismatch {
            expected: Type::vector(Type::Int, Some(3)),
            found: Type::vector(Type::Int, Some(2)),
        }]
    );
}

#[test]
fn errors_do_not_cascade() {
    assert_eq!(
        kinds("int y = z + 1; y = -z * 2; if (z) y = 1;"),
        vec![
            K::Undeclared("z".into()),
            K::Undeclared("z".into()),
            K::Undeclared("z".into()),
        ]
    );
}

#[test]
fn names() {
    assert_eq!(
        kinds("x = 1; int y = print; y = true; true = false;"),
        vec![
            K::Undeclared("x".into()),
            K::NotAVariable("print".into()),
            K::TypeMismatch {
                expected: Type::Int,
                found: Type::Bool,
            },
            K::AssignToConstant("true".into()),
        ]
    );

    assert_eq!(kinds("int y; y(1);"), vec![K::NotAFunction("y".into())]);
}

#[test]
fn duplicates() {
    assert_eq!(
        kinds("int a; float a; void f(int p, int p) { int p; } void f() { }"),
        vec![
            K::Duplicate("a".into()),
            K::Duplicate("p".into()),
            K::Duplicate("p".into()),
            K::Duplicate("f".into()),
        ]
    );

    // built-ins and globals may be shadowed
    assert!(kinds("int print; int g; void f(int g) { int print; }").is_empty());
}

#[test]
fn ref_arguments() {
    let source = "
void inc(ref int x) { x = x + 1; }
int a; float b; int v[3];
inc(a); inc(1); inc(b); inc(v[0]); inc(a + 1);
";

    assert_eq!(
        kinds(source),
        vec![
            K::RefArgumentNotLvalue {
                name: "inc".into(),
                position: 1,
            },
            K::ArgumentType {
                name: "inc".into(),
                position: 1,
                expected: "`int`".into(),
                found: Type::Float,
            },
            K::RefArgumentNotLvalue {
                name: "inc".into(),
                position: 1,
            },
        ]
    );
}

#[test]
fn value_arguments_widen() {
    let source = "
float half(float x) { return x / 2; }
float h = half(3);
int n = half(3);
";

    assert_eq!(
        kinds(source),
        vec![K::TypeMismatch {
            expected: Type::Int,
            found: Type::Float,
        }]
    );
}

#[test]
fn argument_count() {
    assert_eq!(
        kinds(r#"int n = strlen("a", 1);"#),
        vec![K::ArgumentCount {
            name: "strlen".into(),
            expected: 1,
            found: 2,
        }]
    );
}

#[test]
fn builtin_int_vector_parameter() {
    let source = r#"
int cs[3] = {104, 105, 33};
string s = buildStringFromChars(cs, 3);
s = buildStringFromChars(s, 1);
"#;

    assert_eq!(
        kinds(source),
        vec![K::ArgumentType {
            name: "buildStringFromChars".into(),
            position: 1,
            expected: "`int[]`".into(),
            found: Type::String,
        }]
    );

    assert!(kinds(r#"print(1); print("a"); print(1.5); println(true);"#).is_empty());
}

#[test]
fn array_parameters() {
    assert_eq!(
        kinds("void f(int v[3]) { }"),
        vec![K::ArrayParamNotRef("v".into())]
    );
    assert!(kinds("void f(ref int v[3]) { v[0] = 1; }").is_empty());
}

#[test]
fn void_values() {
    assert_eq!(
        kinds("void f() { } int x = f(); print(f());"),
        vec![K::VoidValue("f".into()), K::VoidValue("f".into())]
    );
    assert_eq!(kinds("void v;"), vec![K::VoidVariable("v".into())]);
}

#[test]
fn returns() {
    let source = "
return;
void f() { return 1; }
int g() { return; }
int h() { return 1.5; }
float k() { return 1; }
int m(int x) { if (x > 0) return 1; }
int n(int x) { if (x > 0) return 1; else { return 2; } }
";

    assert_eq!(
        kinds(source),
        vec![
            K::ReturnOutsideFunction,
            K::ReturnValueInVoid("f".into()),
            K::MissingReturnValue {
                name: "g".into(),
                ty: Type::Int,
            },
            K::TypeMismatch {
                expected: Type::Int,
                found: Type::Float,
            },
            K::TypeMismatch {
                expected: Type::Float,
                found: Type::Int,
            },
            K::MissingReturn {
                name: "m".into(),
                ty: Type::Int,
            },
        ]
    );
}

#[test]
fn recursion() {
    let source = "int fact(int n) { if (n <= 1) return 1; return n * fact(n - 1); }";
    assert!(kinds(source).is_empty());
}

#[test]
fn indexing() {
    assert_eq!(
        kinds("int v[3]; v[1.5] = 1; v[0][0] = 1; int x = 1; x[0] = 2;"),
        vec![
            K::IndexNotInt(Type::Float),
            K::TooManyIndices {
                name: "v".into(),
                dims: 1,
            },
            K::TooManyIndices {
                name: "x".into(),
                dims: 0,
            },
        ]
    );
}

#[test]
fn tuples() {
    assert!(kinds("int t[2][2] = {{1, 2}, {3, 4}}; float u[2] = {1, 2.5};").is_empty());

    assert_eq!(
        kinds(r#"int w[2] = {1, "x"};"#),
        vec![K::InconsistentTuple(Type::Int, Type::String)]
    );
}

#[test]
fn annotations() {
    let program = parse("int a; a = a + 1;");
    let mut scopes = Scopes::new();
    let (annotations, errors) = analyze(&mut scopes, &program);
    assert!(errors.is_empty());

    let Item::Stmt(stmt) = &program.items[1] else {
        panic!("expected a statement");
    };
    let StmtKind::Assign { target, value } = &stmt.kind else {
        panic!("expected an assignment");
    };

    let a = scopes.lookup_local(scopes.global(), "a").unwrap();
    assert_eq!(annotations.symbol_of(target.id), a);
    assert_eq!(annotations.type_of(value), &Type::Int);
    assert!(matches!(scopes.symbol(a).kind, SymbolKind::Variable { .. }));
}

#[test]
fn globals_persist_across_programs() {
    let mut scopes = Scopes::new();

    let (_, errors) = analyze(&mut scopes, &parse("int g; void bump() { g = g + 1; }"));
    assert!(errors.is_empty());

    let (_, errors) = analyze(&mut scopes, &parse("bump(); g = 2;"));
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn type_rules() {
    assert_eq!(dyadic_type(BinOp::Div, &Type::Int, &Type::Int), Some(Type::Int));
    assert_eq!(dyadic_type(BinOp::Sub, &Type::Int, &Type::Float), Some(Type::Float));
    assert_eq!(dyadic_type(BinOp::Eq, &Type::Bool, &Type::Bool), Some(Type::Bool));
    assert_eq!(dyadic_type(BinOp::Lt, &Type::Bool, &Type::Bool), None);
    assert_eq!(dyadic_type(BinOp::Sub, &Type::String, &Type::String), None);

    let ints = Type::vector(Type::Int, Some(2));
    let floats = Type::vector(Type::Float, Some(2));
    assert_eq!(unify(&ints, &floats), Some(floats.clone()));
    assert_eq!(unify(&ints, &Type::vector(Type::Int, Some(3))), None);
}
