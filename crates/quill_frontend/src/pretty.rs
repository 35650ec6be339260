//! Renders an AST back to source text.
//!
//! Every dyadic operation is fully parenthesized, so the output parses back to
//! the same tree regardless of precedence and associativity.

use std::fmt::Write;

use quill_ir::UnOp;

use crate::ast::*;

const INDENT: &str = "    ";

pub fn pretty_print(program: &Program) -> String {
    let mut printer = PrettyPrinter::default();
    for item in &program.items {
        printer.item(item);
    }
    printer.out
}

#[derive(Default)]
struct PrettyPrinter {
    out: String,
    depth: usize,
}

impl PrettyPrinter {
    fn line_start(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
    }

    fn item(&mut self, item: &Item) {
        match item {
            Item::Vars(vars) => self.var_list(vars),
            Item::Func(func) => self.func(func),
            Item::Stmt(stmt) => self.stmt(stmt),
        }
    }

    fn var_list(&mut self, list: &VarList) {
        self.line_start();
        self.out.push_str(list.ty.base.as_str());
        self.out.push(' ');

        for (i, var) in list.vars.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }

            self.out.push_str(&var.name.text);
            for dim in &var.dims {
                match dim {
                    Some(size) => {
                        let _ = write!(self.out, "[{size}]");
                    }
                    None => self.out.push_str("[]"),
                }
            }

            if let Some(init) = &var.init {
                self.out.push_str(" = ");
                self.expr(init);
            }
        }

        self.out.push_str(";\n");
    }

    fn func(&mut self, func: &FuncDecl) {
        self.line_start();
        let _ = write!(self.out, "{} {}(", func.ret.base.as_str(), func.name.text);

        for (i, param) in func.params.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            if param.by_ref {
                self.out.push_str("ref ");
            }

            let _ = write!(self.out, "{} {}", param.ty.base.as_str(), param.name.text);
            for size in &param.dims {
                let _ = write!(self.out, "[{size}]");
            }
        }

        self.out.push_str(") {\n");

        self.depth += 1;
        for item in &func.body {
            self.item(item);
        }
        self.depth -= 1;

        self.line_start();
        self.out.push_str("}\n");
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.line_start();
        self.stmt_inline(stmt);
    }

    /// Prints a statement whose indentation has already been written.
    fn stmt_inline(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Compound(stmts) => {
                self.out.push_str("{\n");

                self.depth += 1;
                for stmt in stmts {
                    self.stmt(stmt);
                }
                self.depth -= 1;

                self.line_start();
                self.out.push_str("}\n");
            }

            StmtKind::Assign { target, value } => {
                self.expr(target);
                self.out.push_str(" = ");
                self.expr(value);
                self.out.push_str(";\n");
            }

            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.out.push_str("if (");
                self.expr(cond);
                self.out.push_str(") ");
                self.stmt_inline(then);

                if let Some(otherwise) = otherwise {
                    self.line_start();
                    self.out.push_str("else ");
                    self.stmt_inline(otherwise);
                }
            }

            StmtKind::While { cond, body } => {
                self.out.push_str("while (");
                self.expr(cond);
                self.out.push_str(") ");
                self.stmt_inline(body);
            }

            StmtKind::Return(value) => {
                self.out.push_str("return");
                if let Some(value) = value {
                    self.out.push(' ');
                    self.expr(value);
                }
                self.out.push_str(";\n");
            }

            StmtKind::Call(args) => {
                self.call(stmt.name(), args);
                self.out.push_str(";\n");
            }

            StmtKind::Empty => self.out.push_str(";\n"),

            StmtKind::ParseError => self.out.push_str("<error>;\n"),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Constant(literal) => self.literal(literal),

            ExprKind::Variable => self.out.push_str(expr.name()),

            ExprKind::Unary { op, operand } => {
                self.out.push_str(op.as_str());
                match (op, &operand.kind) {
                    (UnOp::Negate, ExprKind::Constant(_) | ExprKind::Variable) => {
                        self.expr(operand);
                    }
                    _ => {
                        self.out.push('(');
                        self.expr(operand);
                        self.out.push(')');
                    }
                }
            }

            ExprKind::Dyadic { op, lhs, rhs } => {
                self.out.push('(');
                self.expr(lhs);
                let _ = write!(self.out, " {} ", op.as_str());
                self.expr(rhs);
                self.out.push(')');
            }

            ExprKind::Index(indices) => {
                self.out.push_str(expr.name());
                for index in indices {
                    self.out.push('[');
                    self.expr(index);
                    self.out.push(']');
                }
            }

            ExprKind::Call(args) => self.call(expr.name(), args),

            ExprKind::Tuple(elements) => {
                self.out.push('{');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(element);
                }
                self.out.push('}');
            }

            ExprKind::ParseError => self.out.push_str("<error>"),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) {
        self.out.push_str(name);
        self.out.push('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }
            self.expr(arg);
        }
        self.out.push(')');
    }

    fn literal(&mut self, literal: &Literal) {
        match literal {
            Literal::Int(n) => {
                let _ = write!(self.out, "{n}");
            }
            Literal::Float(x) => {
                let text = x.to_string();
                self.out.push_str(&text);
                if !text.contains('.') {
                    self.out.push_str(".0");
                }
            }
            Literal::String(s) => {
                self.out.push('"');
                for ch in s.chars() {
                    match ch {
                        '\n' => self.out.push_str("\\n"),
                        '\t' => self.out.push_str("\\t"),
                        '"' => self.out.push_str("\\\""),
                        '\\' => self.out.push_str("\\\\"),
                        ch => self.out.push(ch),
                    }
                }
                self.out.push('"');
            }
        }
    }
}
