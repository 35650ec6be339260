use insta::assert_snapshot;

use super::{
    ParseErrorKind, ParseMode, Parsed, DEFAULT_MAX_NESTING_DEPTH, DEFAULT_MAX_SYNTAX_ERRORS,
};
use crate::ast::{ExprKind, Item, StmtKind};
use crate::pretty::pretty_print;
use crate::reader::SourceReader;
use crate::DEFAULT_MAX_IDENTIFIER_LEN;

fn parse_mode(source: &str, mode: ParseMode) -> Parsed {
    let reader = SourceReader::new("main", source);
    crate::parse(
        reader,
        mode,
        DEFAULT_MAX_IDENTIFIER_LEN,
        DEFAULT_MAX_SYNTAX_ERRORS,
        DEFAULT_MAX_NESTING_DEPTH,
    )
}

fn pretty(source: &str) -> String {
    let parsed = parse_mode(source, ParseMode::Program);
    assert!(parsed.lexer_errors.is_empty(), "{:?}", parsed.lexer_errors);
    assert!(parsed.parse_errors.is_empty(), "{:?}", parsed.parse_errors);

    pretty_print(&parsed.program)
}

fn errors(source: &str, mode: ParseMode) -> String {
    let parsed = parse_mode(source, mode);

    parsed
        .parse_errors
        .iter()
        .map(|err| format!("{}: {}", err.token.location, err.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn arithmetic_precedence() {
    assert_snapshot!(pretty("x = 1 + 2 * 3 - 4 % y / 2;"), @"x = ((1 + (2 * 3)) - ((4 % y) / 2));");
}

#[test]
fn relational_and_logical() {
    assert_snapshot!(
        pretty("b = !a && c || d; e = a + 1 < 2 * c;"),
        @r###"
    b = (!(a) && (c || d));
    e = ((a + 1) < (2 * c));
    "###
    );
}

#[test]
fn unary_minus() {
    assert_snapshot!(pretty("x = -1 - -y * -(a + b);"), @"x = (-1 - (-y * -((a + b))));");
}

#[test]
fn declarations() {
    let source = r#"
int a, b[3] = {1, 2, 3};
float m[2][2] = {{1.0, 2.0}, {3.0, 4.5}};
string s = "hi\n";
int c[] = {4, 5};
"#;

    assert_snapshot!(pretty(source), @r###"
    int a, b[3] = {1, 2, 3};
    float m[2][2] = {{1.0, 2.0}, {3.0, 4.5}};
    string s = "hi\n";
    int c[] = {4, 5};
    "###);
}

#[test]
fn function_and_statements() {
    let source = "
int sum(ref int v[3], int n) {
    int i = 0, total = 0;
    while (i < n) { total = total + v[i]; i = i + 1; }
    if (total > 10) return 10; else { return total; }
}
void log(string s) { println(s); ; }
";

    assert_snapshot!(pretty(source), @r###"
    int sum(ref int v[3], int n) {
        int i = 0, total = 0;
        while ((i < n)) {
            total = (total + v[i]);
            i = (i + 1);
        }
        if ((total > 10)) return 10;
        else {
            return total;
        }
    }
    void log(string s) {
        println(s);
        ;
    }
    "###);
}

#[test]
fn pretty_output_parses_back() {
    let source = "
float f(float x, int k) { return x * k - (x + 1.5) / 2.0; }
int a[2][3] = {{1, 2, 3}, {4, 5, 6}};
a[1][2] = a[0][1] + 3;
if (!(a[0][0] == 1) || a[1][1] >= 2 && a[0][2] != 3) print(f(2.0, a[1][0]));
";

    let once = pretty(source);
    let twice = pretty(&once);
    assert_eq!(once, twice);
}

#[test]
fn call_statement_and_assignment_shapes() {
    let parsed = parse_mode("foo(1, 2); v[i][j] = {1, 2};", ParseMode::Program);
    assert!(parsed.parse_errors.is_empty());

    let Item::Stmt(call) = &parsed.program.items[0] else {
        panic!("expected a statement");
    };
    assert!(matches!(&call.kind, StmtKind::Call(args) if args.len() == 2));
    assert_eq!(call.name(), "foo");

    let Item::Stmt(assign) = &parsed.program.items[1] else {
        panic!("expected a statement");
    };
    let StmtKind::Assign { target, value } = &assign.kind else {
        panic!("expected an assignment");
    };
    assert!(matches!(&target.kind, ExprKind::Index(indices) if indices.len() == 2));
    assert!(matches!(&value.kind, ExprKind::Tuple(elements) if elements.len() == 2));
}

#[test]
fn node_ids_are_unique() {
    let parsed = parse_mode("x = 1 + 2; y = x;", ParseMode::Program);

    let mut ids = vec![];
    for item in &parsed.program.items {
        let Item::Stmt(stmt) = item else { continue };
        ids.push(stmt.id);
        if let StmtKind::Assign { target, value } = &stmt.kind {
            ids.push(target.id);
            ids.push(value.id);
        }
    }

    let count = ids.len();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), count);
}

#[test]
fn missing_semicolon() {
    assert_snapshot!(
        errors("int x = 1\nint y;", ParseMode::Program),
        @"main:2:1: expected `;`, found keyword `int`"
    );
}

#[test]
fn missing_expression() {
    assert_snapshot!(
        errors("x = ;\ny = 2 +;\nz = 3;", ParseMode::Program),
        @r###"
    main:1:5: expected an expression, found `;`
    main:2:8: expected an expression, found `;`
    "###
    );
}

#[test]
fn recovery_inside_blocks() {
    assert_snapshot!(
        errors("void f() { x = ; while (a b) { y = 1; } }\nint z;", ParseMode::Program),
        @r###"
    main:1:16: expected an expression, found `;`
    main:1:27: expected `)`, found identifier
    "###
    );
}

#[test]
fn misplaced_items() {
    assert_snapshot!(
        errors("int g;\nvoid f() { { int x; } int h() { } }", ParseMode::Program),
        @r###"
    main:2:14: declarations in nested blocks are not allowed here
    main:2:27: nested functions are not allowed here
    "###
    );

    assert_snapshot!(
        errors("int g;\nx = 1;", ParseMode::Declarations),
        @"main:2:1: statements are not allowed here"
    );

    assert_snapshot!(
        errors("int g;\nx = 1;", ParseMode::Statements),
        @"main:1:1: declarations are not allowed here"
    );
}

#[test]
fn array_dimensions() {
    assert_snapshot!(
        errors("int a[2][] = {1}; int b[0];", ParseMode::Program),
        @r###"
    main:1:9: only the first dimension may omit its size
    main:1:25: array size must be at least 1
    "###
    );

    // rejected later, once the missing initializer is known
    assert_eq!(errors("int a[];", ParseMode::Program), "");
}

#[test]
fn error_ceiling() {
    let source = "x;\n".repeat(DEFAULT_MAX_SYNTAX_ERRORS + 5);
    let parsed = parse_mode(&source, ParseMode::Program);

    assert_eq!(parsed.parse_errors.len(), DEFAULT_MAX_SYNTAX_ERRORS + 1);
    assert_eq!(
        parsed.parse_errors.last().map(|err| &err.kind),
        Some(&ParseErrorKind::TooManyErrors)
    );
}

fn error_kinds(source: &str) -> Vec<ParseErrorKind> {
    parse_mode(source, ParseMode::Program)
        .parse_errors
        .into_iter()
        .map(|err| err.kind)
        .collect()
}

#[test]
fn nesting_limit() {
    let too_deep = vec![ParseErrorKind::TooDeep(DEFAULT_MAX_NESTING_DEPTH)];
    let n = 20_000;

    let parens = format!("int x = {}1{};", "(".repeat(n), ")".repeat(n));
    assert_eq!(error_kinds(&parens), too_deep);

    let chain = format!("x = {}1;", "1 + ".repeat(n));
    assert_eq!(error_kinds(&chain), too_deep);

    let logic = format!("x = {}1;", "1 && ".repeat(n));
    assert_eq!(error_kinds(&logic), too_deep);

    let negated = format!("x = {}1;", "-".repeat(n));
    assert_eq!(error_kinds(&negated), too_deep);

    let loops = format!("{};", "while (1) ".repeat(n));
    assert_eq!(error_kinds(&loops), too_deep);

    let blocks = format!("{}{}", "{".repeat(n), "}".repeat(n));
    assert_eq!(error_kinds(&blocks), too_deep);

    let tuples = format!("int a[1] = {}1{};", "{".repeat(n), "}".repeat(n));
    assert_eq!(error_kinds(&tuples), too_deep);
}

#[test]
fn nesting_below_the_limit() {
    let n = DEFAULT_MAX_NESTING_DEPTH / 2;

    assert_snapshot!(pretty(&format!("x = {}1{};", "(".repeat(n), ")".repeat(n))), @"x = 1;");
    assert!(error_kinds(&format!("x = {}1;", "1 - ".repeat(n))).is_empty());
    assert!(error_kinds(&format!("{}x = 1;{}", "{".repeat(n), "}".repeat(n))).is_empty());
}

#[test]
fn lexer_errors_are_collected() {
    let parsed = parse_mode("int x = 1 @ 2;", ParseMode::Program);
    assert_eq!(parsed.lexer_errors.len(), 1);
}
