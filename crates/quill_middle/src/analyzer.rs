use std::collections::HashMap;

use quill_frontend::ast::*;
use quill_frontend::token::Token;
use quill_ir::builtins::{Builtin, BuiltinParam, ParamType};
use quill_ir::{BinOp, Type, UnOp};
use quill_session::diagnostics::{Diagnostic, IntoDiagnostic};

use crate::scope::{ScopeId, Scopes, SymbolId, SymbolKind};

#[derive(Debug, Clone, PartialEq)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub token: Token,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SemanticErrorKind {
    #[error("`{0}` is already declared in this scope")]
    Duplicate(String),

    #[error("`{0}` is not declared")]
    Undeclared(String),

    #[error("`{0}` is not a variable")]
    NotAVariable(String),

    #[error("`{0}` is not a function")]
    NotAFunction(String),

    #[error("cannot assign to constant `{0}`")]
    AssignToConstant(String),

    #[error("expected type `{expected}`, found `{found}`")]
    TypeMismatch { expected: Type, found: Type },

    #[error("cannot apply `{op}` to `{lhs}` and `{rhs}`")]
    InvalidOperands {
        op: &'static str,
        lhs: Type,
        rhs: Type,
    },

    #[error("cannot apply `{op}` to `{ty}`")]
    InvalidOperand { op: &'static str, ty: Type },

    #[error("condition must be of type bool, found `{0}`")]
    ConditionNotBool(Type),

    #[error("`{name}` takes {expected} argument(s) but {found} were supplied")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("argument {position} of `{name}` must be {expected}, found `{found}`")]
    ArgumentType {
        name: String,
        position: usize,
        expected: String,
        found: Type,
    },

    #[error("argument {position} of `{name}` is passed by reference and must be a variable or array element")]
    RefArgumentNotLvalue { name: String, position: usize },

    #[error("array parameter `{0}` must be declared `ref`")]
    ArrayParamNotRef(String),

    #[error("`{0}` returns void and has no value")]
    VoidValue(String),

    #[error("`{0}` cannot have type void")]
    VoidVariable(String),

    #[error("size of `{0}` must be given or inferred from a tuple initializer")]
    MissingSize(String),

    #[error("`{name}` has {dims} dimension(s)")]
    TooManyIndices { name: String, dims: usize },

    #[error("index must be of type int, found `{0}`")]
    IndexNotInt(Type),

    #[error("tuple elements have incompatible types `{0}` and `{1}`")]
    InconsistentTuple(Type, Type),

    #[error("`return` outside of a function")]
    ReturnOutsideFunction,

    #[error("void function `{0}` cannot return a value")]
    ReturnValueInVoid(String),

    #[error("function `{name}` must return a value of type `{ty}`")]
    MissingReturnValue { name: String, ty: Type },

    #[error("function `{name}` may finish without returning a value of type `{ty}`")]
    MissingReturn { name: String, ty: Type },
}

impl IntoDiagnostic for SemanticError {
    fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::semantic(self.kind.to_string()).at(&self.token.location, self.token.text)
    }
}

/// Side tables produced for one parsed program.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    /// The type of every expression.
    pub types: HashMap<NodeId, Type>,
    /// The symbol named by every variable, indexing, call expression and call statement.
    pub resolutions: HashMap<NodeId, SymbolId>,
}

impl Annotations {
    pub fn type_of(&self, expr: &Expr) -> &Type {
        self.types
            .get(&expr.id)
            .unwrap_or_else(|| panic!("expression `{}` was never typed", expr.token.text))
    }

    pub fn symbol_of(&self, id: NodeId) -> SymbolId {
        self.resolutions
            .get(&id)
            .copied()
            .unwrap_or_else(|| panic!("node {id:?} was never resolved"))
    }
}

struct FunctionContext {
    name: String,
    ret: Type,
}

pub struct Analyzer<'s> {
    scopes: &'s mut Scopes,
    annotations: Annotations,
    errors: Vec<SemanticError>,

    scope: ScopeId,
    function: Option<FunctionContext>,
}

impl<'s> Analyzer<'s> {
    pub fn new(scopes: &'s mut Scopes) -> Self {
        let scope = scopes.global();

        Self {
            scopes,
            annotations: Annotations::default(),
            errors: vec![],

            scope,
            function: None,
        }
    }

    pub fn run(mut self, program: &Program) -> (Annotations, Vec<SemanticError>) {
        for item in &program.items {
            self.check_item(item);
        }

        (self.annotations, self.errors)
    }

    fn check_item(&mut self, item: &Item) {
        match item {
            Item::Vars(vars) => self.check_var_list(vars),
            Item::Func(func) => self.check_func(func),
            Item::Stmt(stmt) => self.check_stmt(stmt),
        }
    }

    fn check_var_list(&mut self, list: &VarList) {
        for var in &list.vars {
            self.check_var(list.ty.base, var);
        }
    }

    fn check_var(&mut self, base: BaseType, var: &VarDecl) {
        let name = &var.name.text;

        if self.scopes.lookup_local(self.scope, name).is_some() {
            self.report(SemanticErrorKind::Duplicate(name.clone()), &var.name);
            if let Some(init) = &var.init {
                self.check_expr(init);
            }
            return;
        }

        let mut ty = Type::with_dims(base.to_type(), &var.dims);

        if base == BaseType::Void {
            self.report(SemanticErrorKind::VoidVariable(name.clone()), &var.name);
            ty = Type::Wrong;
        }

        if let Some(init) = &var.init {
            let init_ty = self.check_expr(init).clone();
            ty = self.infer_size(ty, var, init, &init_ty);

            if !ty.is_wrong() && !init_ty.is_wrong() && !ty.accepts(&init_ty) {
                let kind = SemanticErrorKind::TypeMismatch {
                    expected: ty.clone(),
                    found: init_ty,
                };
                self.report(kind, &init.token);
            }
        } else if var.dims.first() == Some(&None) {
            self.report(SemanticErrorKind::MissingSize(name.clone()), &var.name);
            ty = Type::Wrong;
        }

        let location = Some(var.name.location.clone());
        self.scopes
            .insert(self.scope, name, SymbolKind::Variable { ty }, location);
    }

    /// Fills in an omitted outer size from a tuple initializer.
    fn infer_size(&mut self, ty: Type, var: &VarDecl, init: &Expr, init_ty: &Type) -> Type {
        let Type::Vector(vector) = &ty else {
            return ty;
        };
        if vector.size.is_some() {
            return ty;
        }

        match (&init.kind, init_ty) {
            (ExprKind::Tuple(_), Type::Vector(init_vector)) => {
                Type::vector(vector.element.clone(), init_vector.size)
            }
            (_, Type::Wrong) => Type::Wrong,
            _ => {
                self.report(SemanticErrorKind::MissingSize(var.name.text.clone()), &var.name);
                Type::Wrong
            }
        }
    }

    fn check_func(&mut self, func: &FuncDecl) {
        let name = &func.name.text;
        let ret = func.ret.base.to_type();

        let global = self.scopes.global();
        let scope = self.scopes.push_scope(global);

        let kind = SymbolKind::Function {
            ret: ret.clone(),
            params: vec![],
            scope,
        };
        let location = Some(func.name.location.clone());
        let symbol = self.scopes.insert(global, name, kind, location);
        if symbol.is_none() {
            self.report(SemanticErrorKind::Duplicate(name.clone()), &func.name);
        }

        let params: Vec<SymbolId> = func
            .params
            .iter()
            .filter_map(|param| self.check_param(scope, param))
            .collect();

        if let Some(symbol) = symbol {
            let kind = SymbolKind::Function {
                ret: ret.clone(),
                params,
                scope,
            };
            self.scopes.update(symbol, kind);
        }

        let outer = std::mem::replace(&mut self.scope, scope);
        self.function = Some(FunctionContext {
            name: name.clone(),
            ret: ret.clone(),
        });

        for item in &func.body {
            self.check_item(item);
        }

        self.function = None;
        self.scope = outer;

        if ret != Type::Void && !items_return(&func.body) {
            self.report(
                SemanticErrorKind::MissingReturn {
                    name: name.clone(),
                    ty: ret,
                },
                &func.name,
            );
        }
    }

    fn check_param(&mut self, scope: ScopeId, param: &Param) -> Option<SymbolId> {
        let name = &param.name.text;

        let dims: Vec<Option<usize>> = param.dims.iter().map(|&size| Some(size)).collect();
        let mut ty = Type::with_dims(param.ty.base.to_type(), &dims);

        if param.ty.base == BaseType::Void {
            self.report(SemanticErrorKind::VoidVariable(name.clone()), &param.name);
            ty = Type::Wrong;
        }
        if !dims.is_empty() && !param.by_ref {
            self.report(SemanticErrorKind::ArrayParamNotRef(name.clone()), &param.name);
        }

        let kind = SymbolKind::Parameter {
            ty,
            by_ref: param.by_ref,
        };
        let location = Some(param.name.location.clone());

        let symbol = self.scopes.insert(scope, name, kind, location);
        if symbol.is_none() {
            self.report(SemanticErrorKind::Duplicate(name.clone()), &param.name);
        }
        symbol
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Compound(stmts) => {
                for stmt in stmts {
                    self.check_stmt(stmt);
                }
            }

            StmtKind::Assign { target, value } => {
                let target_ty = self.check_lvalue(target).clone();
                let value_ty = self.check_expr(value).clone();

                if !target_ty.is_wrong() && !value_ty.is_wrong() && !target_ty.accepts(&value_ty) {
                    let kind = SemanticErrorKind::TypeMismatch {
                        expected: target_ty,
                        found: value_ty,
                    };
                    self.report(kind, &value.token);
                }
            }

            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.check_condition(cond);
                self.check_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.check_stmt(otherwise);
                }
            }

            StmtKind::While { cond, body } => {
                self.check_condition(cond);
                self.check_stmt(body);
            }

            StmtKind::Return(value) => self.check_return(stmt, value.as_ref()),

            StmtKind::Call(args) => {
                self.check_call(stmt.id, &stmt.token, args);
            }

            StmtKind::Empty => {}

            StmtKind::ParseError => {
                unreachable!("parse error statement at {} reached analysis", stmt.token.location)
            }
        }
    }

    fn check_condition(&mut self, cond: &Expr) {
        let ty = self.check_expr(cond).clone();
        if !ty.is_wrong() && ty != Type::Bool {
            self.report(SemanticErrorKind::ConditionNotBool(ty), &cond.token);
        }
    }

    fn check_return(&mut self, stmt: &Stmt, value: Option<&Expr>) {
        let value_ty = value.map(|value| self.check_expr(value).clone());

        let Some(function) = &self.function else {
            self.report(SemanticErrorKind::ReturnOutsideFunction, &stmt.token);
            return;
        };

        let kind = match (&function.ret, value_ty) {
            (Type::Void, None) => return,
            (Type::Void, Some(_)) => SemanticErrorKind::ReturnValueInVoid(function.name.clone()),
            (ret, None) => SemanticErrorKind::MissingReturnValue {
                name: function.name.clone(),
                ty: ret.clone(),
            },
            (_, Some(Type::Wrong)) => return,
            (ret, Some(found)) if *ret == found => return,
            (ret, Some(found)) => SemanticErrorKind::TypeMismatch {
                expected: ret.clone(),
                found,
            },
        };

        let token = value.map_or(&stmt.token, |value| &value.token);
        self.report(kind, token);
    }

    /// Types an assignment target, requiring it to name a variable or parameter.
    fn check_lvalue(&mut self, target: &Expr) -> &Type {
        let constant = self
            .scopes
            .lookup(self.scope, target.name())
            .is_some_and(|symbol| {
                matches!(self.scopes.symbol(symbol).kind, SymbolKind::Constant { .. })
            });

        if constant {
            let kind = SemanticErrorKind::AssignToConstant(target.name().to_owned());
            self.report(kind, &target.token);
            return self.set_type(target, Type::Wrong);
        }

        self.check_expr(target)
    }

    /// Computes, records and returns the type of `expr`.
    fn check_expr(&mut self, expr: &Expr) -> &Type {
        let ty = match &expr.kind {
            ExprKind::Constant(literal) => match literal {
                Literal::Int(_) => Type::Int,
                Literal::Float(_) => Type::Float,
                Literal::String(_) => Type::String,
            },

            ExprKind::Variable => self.check_variable(expr),

            ExprKind::Unary { op, operand } => {
                let operand_ty = self.check_expr(operand).clone();

                match (op, &operand_ty) {
                    (_, Type::Wrong) => Type::Wrong,
                    (UnOp::Negate, Type::Int | Type::Float) => operand_ty,
                    (UnOp::Not, Type::Bool) => Type::Bool,
                    _ => {
                        let kind = SemanticErrorKind::InvalidOperand {
                            op: op.as_str(),
                            ty: operand_ty,
                        };
                        self.report(kind, &expr.token);
                        Type::Wrong
                    }
                }
            }

            ExprKind::Dyadic { op, lhs, rhs } => {
                let lhs_ty = self.check_expr(lhs).clone();
                let rhs_ty = self.check_expr(rhs).clone();

                if lhs_ty.is_wrong() || rhs_ty.is_wrong() {
                    Type::Wrong
                } else if let Some(ty) = dyadic_type(*op, &lhs_ty, &rhs_ty) {
                    ty
                } else {
                    let kind = SemanticErrorKind::InvalidOperands {
                        op: op.as_str(),
                        lhs: lhs_ty,
                        rhs: rhs_ty,
                    };
                    self.report(kind, &expr.token);
                    Type::Wrong
                }
            }

            ExprKind::Index(indices) => self.check_index(expr, indices),

            ExprKind::Call(args) => match self.check_call(expr.id, &expr.token, args) {
                Some(Type::Void) => {
                    let kind = SemanticErrorKind::VoidValue(expr.name().to_owned());
                    self.report(kind, &expr.token);
                    Type::Wrong
                }
                Some(ty) => ty,
                None => Type::Wrong,
            },

            ExprKind::Tuple(elements) => self.check_tuple(elements),

            ExprKind::ParseError => {
                unreachable!("parse error expression at {} reached analysis", expr.token.location)
            }
        };

        self.set_type(expr, ty)
    }

    fn set_type(&mut self, expr: &Expr, ty: Type) -> &Type {
        self.annotations.types.insert(expr.id, ty);
        &self.annotations.types[&expr.id]
    }

    fn resolve(&mut self, id: NodeId, token: &Token) -> Option<SymbolId> {
        match self.scopes.lookup(self.scope, &token.text) {
            Some(symbol) => {
                self.annotations.resolutions.insert(id, symbol);
                Some(symbol)
            }
            None => {
                self.report(SemanticErrorKind::Undeclared(token.text.clone()), token);
                None
            }
        }
    }

    fn check_variable(&mut self, expr: &Expr) -> Type {
        let Some(symbol) = self.resolve(expr.id, &expr.token) else {
            return Type::Wrong;
        };

        match self.scopes.symbol(symbol).value_type() {
            Some(ty) => ty.clone(),
            None => {
                let kind = SemanticErrorKind::NotAVariable(expr.name().to_owned());
                self.report(kind, &expr.token);
                Type::Wrong
            }
        }
    }

    fn check_index(&mut self, expr: &Expr, indices: &[Expr]) -> Type {
        let base_ty = self.check_variable(expr);

        let mut index_ok = true;
        for index in indices {
            let ty = self.check_expr(index).clone();
            if !ty.is_wrong() && ty != Type::Int {
                self.report(SemanticErrorKind::IndexNotInt(ty), &index.token);
                index_ok = false;
            }
        }

        if base_ty.is_wrong() {
            return Type::Wrong;
        }

        if indices.len() > base_ty.num_dims() {
            let kind = SemanticErrorKind::TooManyIndices {
                name: expr.name().to_owned(),
                dims: base_ty.num_dims(),
            };
            self.report(kind, &expr.token);
            return Type::Wrong;
        }

        if !index_ok {
            return Type::Wrong;
        }

        let mut ty = &base_ty;
        for _ in indices {
            if let Type::Vector(vector) = ty {
                ty = &vector.element;
            }
        }
        ty.clone()
    }

    fn check_tuple(&mut self, elements: &[Expr]) -> Type {
        let mut unified: Option<Type> = None;
        let mut wrong = false;

        for element in elements {
            let ty = self.check_expr(element).clone();
            if ty.is_wrong() {
                wrong = true;
                continue;
            }

            unified = match unified {
                None => Some(ty),
                Some(prev) => match unify(&prev, &ty) {
                    Some(ty) => Some(ty),
                    None => {
                        let kind = SemanticErrorKind::InconsistentTuple(prev, ty);
                        self.report(kind, &element.token);
                        return Type::Wrong;
                    }
                },
            };
        }

        match unified {
            Some(element) if !wrong => Type::vector(element, Some(elements.len())),
            _ => Type::Wrong,
        }
    }

    /// Checks a call and returns the callee's result type, or `None` after an error.
    fn check_call(&mut self, id: NodeId, name: &Token, args: &[Expr]) -> Option<Type> {
        let arg_types: Vec<Type> = args.iter().map(|arg| self.check_expr(arg).clone()).collect();

        let symbol = self.resolve(id, name)?;

        let (ret, params) = match &self.scopes.symbol(symbol).kind {
            SymbolKind::Function { ret, params, .. } => {
                let params = params
                    .iter()
                    .map(|&param| {
                        let symbol = self.scopes.symbol(param);
                        let ty = symbol.value_type().cloned().unwrap_or(Type::Wrong);
                        Expected::Type(ty, symbol.is_by_ref())
                    })
                    .collect::<Vec<_>>();
                (ret.clone(), params)
            }

            SymbolKind::Predefined(builtin) => {
                let params = builtin_params(builtin);
                (builtin.ret_type(), params)
            }

            _ => {
                self.report(SemanticErrorKind::NotAFunction(name.text.clone()), name);
                return None;
            }
        };

        if params.len() != args.len() {
            let kind = SemanticErrorKind::ArgumentCount {
                name: name.text.clone(),
                expected: params.len(),
                found: args.len(),
            };
            self.report(kind, name);
            return None;
        }

        let mut ok = true;
        for (position, ((expected, arg), arg_ty)) in params.iter().zip(args).zip(arg_types).enumerate() {
            let position = position + 1;

            if arg_ty.is_wrong() {
                ok = false;
                continue;
            }

            if expected.by_ref() && !self.is_assignable(arg) {
                let kind = SemanticErrorKind::RefArgumentNotLvalue {
                    name: name.text.clone(),
                    position,
                };
                self.report(kind, &arg.token);
                ok = false;
                continue;
            }

            if !expected.accepts(&arg_ty) {
                let kind = SemanticErrorKind::ArgumentType {
                    name: name.text.clone(),
                    position,
                    expected: expected.describe(),
                    found: arg_ty,
                };
                self.report(kind, &arg.token);
                ok = false;
            }
        }

        ok.then_some(ret)
    }

    /// Whether an already checked expression names a storage location.
    fn is_assignable(&self, expr: &Expr) -> bool {
        expr.is_lvalue()
            && self
                .annotations
                .resolutions
                .get(&expr.id)
                .is_some_and(|&symbol| self.scopes.symbol(symbol).is_assignable())
    }

    fn report(&mut self, kind: SemanticErrorKind, token: &Token) {
        self.errors.push(SemanticError {
            kind,
            token: token.clone(),
        });
    }
}

/// What a parameter accepts.
enum Expected {
    /// A user function parameter: by-value arguments must be assignable to
    /// it, by-reference arguments must match exactly.
    Type(Type, bool),
    Builtin(BuiltinParam),
}

impl Expected {
    fn by_ref(&self) -> bool {
        match self {
            Expected::Type(_, by_ref) => *by_ref,
            Expected::Builtin(param) => param.by_ref,
        }
    }

    fn accepts(&self, ty: &Type) -> bool {
        match self {
            Expected::Type(expected, true) => expected == ty,
            Expected::Type(expected, false) => expected.accepts(ty),
            Expected::Builtin(param) => param.ty.accepts(ty),
        }
    }

    fn describe(&self) -> String {
        match self {
            Expected::Type(ty, _) => format!("`{ty}`"),
            Expected::Builtin(param) => match param.ty {
                ParamType::AnyPrimitive => param.ty.describe().to_owned(),
                _ => format!("`{}`", param.ty.describe()),
            },
        }
    }
}

fn builtin_params(builtin: &Builtin) -> Vec<Expected> {
    builtin.params.iter().copied().map(Expected::Builtin).collect()
}

/// The result type of a dyadic operation, or `None` if the operands don't fit.
pub fn dyadic_type(op: BinOp, lhs: &Type, rhs: &Type) -> Option<Type> {
    let numeric = lhs.is_numeric() && rhs.is_numeric();
    let both = |ty: &Type| lhs == ty && rhs == ty;

    match op {
        BinOp::Add if both(&Type::String) => Some(Type::String),
        BinOp::Mod => both(&Type::Int).then_some(Type::Int),
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div if numeric => {
            Some(if both(&Type::Int) { Type::Int } else { Type::Float })
        }
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => None,

        BinOp::Eq | BinOp::NotEq if both(&Type::Bool) => Some(Type::Bool),
        BinOp::Eq | BinOp::NotEq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
            (numeric || both(&Type::String)).then_some(Type::Bool)
        }

        BinOp::And | BinOp::Or => both(&Type::Bool).then_some(Type::Bool),
    }
}

/// The common type of two tuple elements.
pub fn unify(a: &Type, b: &Type) -> Option<Type> {
    match (a, b) {
        (a, b) if a == b => Some(a.clone()),
        (Type::Int, Type::Float) | (Type::Float, Type::Int) => Some(Type::Float),
        (Type::Vector(a), Type::Vector(b)) if a.size == b.size => {
            unify(&a.element, &b.element).map(|element| Type::vector(element, a.size))
        }
        _ => None,
    }
}

fn items_return(items: &[Item]) -> bool {
    match items.last() {
        Some(Item::Stmt(stmt)) => stmt_returns(stmt),
        _ => false,
    }
}

fn stmt_returns(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::Compound(stmts) => stmts.last().is_some_and(stmt_returns),
        StmtKind::If {
            then,
            otherwise: Some(otherwise),
            ..
        } => stmt_returns(then) && stmt_returns(otherwise),
        _ => false,
    }
}
