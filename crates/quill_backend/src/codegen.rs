//! Lowers checked programs to bytecode.
//!
//! Functions are emitted before the code that calls them. A frame with `P`
//! parameters and `L` locals looks like this, relative to `base`:
//!
//! ```text
//! -P-2        result slot, reserved by the caller for non-void functions
//! -P-1 .. -2  parameters, left to right
//! -1          return address
//!  0          saved base
//!  1 .. L     locals
//! ```
//!
//! Top-level code runs in a frame of its own entered on an empty stack, so
//! globals sit at absolute addresses `1 ..= G`.

use std::collections::HashMap;

use quill_frontend::ast::*;
use quill_frontend::token::Token;
use quill_ir::builtins::{BuiltinKind, ParamType};
use quill_ir::bytecode::{self, Instruction, Opcode, Operand, ProgramBuilder};
use quill_ir::{BinOp, Type, UnOp};
use quill_middle::scope::{ScopeId, Scopes, SymbolId, SymbolKind, GLOBAL_LEVEL};
use quill_middle::Annotations;

use crate::CodegenResult;

pub struct Codegen<'s> {
    scopes: &'s Scopes,
    builder: ProgramBuilder,
    functions: HashMap<SymbolId, usize>,
}

impl<'s> Codegen<'s> {
    pub fn new(scopes: &'s Scopes, capacity: usize) -> Self {
        Self {
            scopes,
            builder: ProgramBuilder::new(capacity),
            functions: HashMap::new(),
        }
    }

    pub fn next_address(&self) -> usize {
        self.builder.next_address()
    }

    /// Emits every function declared in `program`, returning their names and start addresses.
    pub fn emit_functions(
        &mut self,
        program: &Program,
        annotations: &Annotations,
    ) -> CodegenResult<Vec<(String, usize)>> {
        let mut starts = vec![];

        for item in &program.items {
            if let Item::Func(func) = item {
                let start = self.emit_function(func, annotations)?;
                starts.push((func.name.text.clone(), start));
            }
        }

        Ok(starts)
    }

    /// Emits the top-level declarations and statements of `program` in a frame
    /// holding every global, followed by `HALT`.
    pub fn emit_main(&mut self, program: &Program, annotations: &Annotations) -> CodegenResult<usize> {
        let globals = self.scopes.layout(self.scopes.global()).locals_size;

        let mut emitter = self.emitter(annotations, self.scopes.global(), None);
        let start = emitter.emit_int(Opcode::Enter, globals as i64)?;
        emitter.emit_top_level(program)?;

        Ok(start)
    }

    /// Emits the top-level statements of `program` followed by `HALT`, to run
    /// on a stack already holding the globals.
    pub fn emit_handler(
        &mut self,
        program: &Program,
        annotations: &Annotations,
    ) -> CodegenResult<usize> {
        let start = self.builder.next_address();

        let mut emitter = self.emitter(annotations, self.scopes.global(), None);
        emitter.emit_top_level(program)?;

        Ok(start)
    }

    pub fn finish(self, start: usize) -> bytecode::Program {
        self.builder.freeze(start)
    }

    fn emit_function(&mut self, func: &FuncDecl, annotations: &Annotations) -> CodegenResult<usize> {
        let scopes = self.scopes;

        let symbol = scopes
            .lookup_local(scopes.global(), &func.name.text)
            .unwrap_or_else(|| panic!("function `{}` was never declared", func.name.text));
        let SymbolKind::Function { ret, scope, .. } = &scopes.symbol(symbol).kind else {
            panic!("`{}` is not a function", func.name.text);
        };

        let layout = scopes.layout(*scope);
        let frame = Frame {
            locals_size: layout.locals_size,
            return_address: layout.return_address(),
            ret: ret.clone(),
        };

        // registered first so that recursive calls can find it
        let start = self.builder.next_address();
        self.functions.insert(symbol, start);

        let mut emitter = self.emitter(annotations, *scope, Some(frame));
        emitter.emit_int(Opcode::Enter, layout.locals_size as i64)?;

        for item in &func.body {
            match item {
                Item::Vars(vars) => emitter.emit_var_list(vars)?,
                Item::Stmt(stmt) => {
                    emitter.emit_stmt(stmt)?;
                }
                Item::Func(nested) => {
                    unreachable!("nested function `{}` reached codegen", nested.name.text)
                }
            }
        }

        let ends_in_return = matches!(
            func.body.last(),
            Some(Item::Stmt(Stmt {
                kind: StmtKind::Return(_),
                ..
            }))
        );
        if !ends_in_return {
            emitter.emit_int(Opcode::Return, layout.locals_size as i64)?;
        }

        Ok(start)
    }

    fn emitter<'c>(
        &'c mut self,
        annotations: &'c Annotations,
        scope: ScopeId,
        frame: Option<Frame>,
    ) -> Emitter<'c> {
        Emitter {
            scopes: self.scopes,
            builder: &mut self.builder,
            functions: &self.functions,
            annotations,
            scope,
            frame,
        }
    }
}

struct Frame {
    locals_size: usize,
    return_address: i64,
    ret: Type,
}

/// Where a variable's storage lives.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Global(i64),
    Local(i64),
    /// A frame cell holding the address of the storage.
    Ref(i64),
}

impl Slot {
    fn direct(self) -> Option<(Opcode, Opcode, i64)> {
        match self {
            Slot::Global(address) => Some((Opcode::LoadG, Opcode::StoreG, address)),
            Slot::Local(offset) => Some((Opcode::LoadL, Opcode::StoreL, offset)),
            Slot::Ref(_) => None,
        }
    }
}

struct Emitter<'c> {
    scopes: &'c Scopes,
    builder: &'c mut ProgramBuilder,
    functions: &'c HashMap<SymbolId, usize>,
    annotations: &'c Annotations,

    scope: ScopeId,
    frame: Option<Frame>,
}

impl<'c> Emitter<'c> {
    fn emit_top_level(&mut self, program: &Program) -> CodegenResult<()> {
        for item in &program.items {
            match item {
                Item::Vars(vars) => self.emit_var_list(vars)?,
                Item::Stmt(stmt) => {
                    self.emit_stmt(stmt)?;
                }
                Item::Func(_) => {}
            }
        }

        self.emit(Opcode::Halt)?;
        Ok(())
    }

    fn emit_var_list(&mut self, list: &VarList) -> CodegenResult<()> {
        for var in &list.vars {
            let Some(init) = &var.init else {
                continue;
            };

            let symbol = self
                .scopes
                .lookup_local(self.scope, &var.name.text)
                .unwrap_or_else(|| panic!("variable `{}` was never declared", var.name.text));
            let ty = self.value_type(symbol).clone();

            self.emit_store(symbol, &[], &ty, init)?;
        }

        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> CodegenResult<usize> {
        let start = self.builder.next_address();

        match &stmt.kind {
            StmtKind::Compound(stmts) => {
                for stmt in stmts {
                    self.emit_stmt(stmt)?;
                }
            }

            StmtKind::Assign { target, value } => {
                let symbol = self.annotations.symbol_of(target.id);
                let ty = self.annotations.type_of(target).clone();

                let indices = match &target.kind {
                    ExprKind::Index(indices) => indices.as_slice(),
                    _ => &[],
                };
                self.emit_store(symbol, indices, &ty, value)?;
            }

            StmtKind::If {
                cond,
                then,
                otherwise,
            } => {
                self.emit_expr(cond)?;
                let jump_else = self.emit(Opcode::JumpF)?;

                self.emit_stmt(then)?;

                match otherwise {
                    Some(otherwise) => {
                        let jump_end = self.emit(Opcode::Jump)?;
                        self.patch(jump_else);

                        self.emit_stmt(otherwise)?;
                        self.patch(jump_end);
                    }
                    None => self.patch(jump_else),
                }
            }

            StmtKind::While { cond, body } => {
                let top = self.emit_expr(cond)?;
                let jump_end = self.emit(Opcode::JumpF)?;

                self.emit_stmt(body)?;
                self.emit_int(Opcode::Jump, top as i64)?;

                self.patch(jump_end);
            }

            StmtKind::Return(value) => {
                let frame = self
                    .frame
                    .as_ref()
                    .unwrap_or_else(|| panic!("return at {} outside a function", stmt.token.location));
                let (locals_size, return_address, ret) =
                    (frame.locals_size, frame.return_address, frame.ret.clone());

                if let Some(value) = value {
                    self.emit_value(value, &ret)?;
                    self.emit_int(Opcode::StoreL, return_address)?;
                }
                self.emit_int(Opcode::Return, locals_size as i64)?;
            }

            StmtKind::Call(args) => {
                self.emit_call(stmt.id, &stmt.token, args, true)?;
            }

            StmtKind::Empty => {}

            StmtKind::ParseError => {
                unreachable!("parse error statement at {} reached codegen", stmt.token.location)
            }
        }

        Ok(start)
    }

    /// Emits `expr`, converting int cells to float where `want` has floats.
    fn emit_value(&mut self, expr: &Expr, want: &Type) -> CodegenResult<usize> {
        if let ExprKind::Tuple(elements) = &expr.kind {
            let start = self.builder.next_address();
            let element_ty = match want {
                Type::Vector(vector) => &vector.element,
                ty => panic!("tuple stored into `{ty}`"),
            };

            for element in elements {
                self.emit_value(element, element_ty)?;
            }
            return Ok(start);
        }

        let start = self.emit_expr(expr)?;

        let annotations = self.annotations;
        let ty = annotations.type_of(expr);
        if want.base() == &Type::Float && ty.base() == &Type::Int {
            self.emit_int(Opcode::IToF, ty.cells() as i64)?;
        }

        Ok(start)
    }

    fn emit_expr(&mut self, expr: &Expr) -> CodegenResult<usize> {
        let start = self.builder.next_address();
        let annotations = self.annotations;

        match &expr.kind {
            ExprKind::Constant(literal) => {
                let operand = match literal {
                    Literal::Int(n) => Operand::Int(*n),
                    Literal::Float(x) => Operand::Float(*x),
                    Literal::String(s) => Operand::String(s.clone()),
                };
                self.emit_with(Opcode::Const, operand)?;
            }

            ExprKind::Variable => self.emit_load(expr)?,

            ExprKind::Unary { op, operand } => {
                self.emit_expr(operand)?;

                let opcode = match (op, annotations.type_of(operand)) {
                    (UnOp::Negate, Type::Int) => Opcode::NegI,
                    (UnOp::Negate, _) => Opcode::NegF,
                    (UnOp::Not, _) => Opcode::Not,
                };
                self.emit(opcode)?;
            }

            ExprKind::Dyadic { op, lhs, rhs } => {
                let lhs_ty = annotations.type_of(lhs);
                let rhs_ty = annotations.type_of(rhs);

                let operand_ty = if lhs_ty.is_numeric() && rhs_ty.is_numeric() {
                    if lhs_ty == &Type::Int && rhs_ty == &Type::Int {
                        Type::Int
                    } else {
                        Type::Float
                    }
                } else {
                    lhs_ty.clone()
                };

                self.emit_value(lhs, &operand_ty)?;
                self.emit_value(rhs, &operand_ty)?;
                self.emit(dyadic_opcode(*op, &operand_ty))?;
            }

            ExprKind::Index(_) => {
                self.emit_address(expr)?;
                let ty = annotations.type_of(expr);
                self.emit_load_indirect(ty)?;
            }

            ExprKind::Call(args) => {
                self.emit_call(expr.id, &expr.token, args, false)?;
            }

            ExprKind::Tuple(_) => {
                let ty = annotations.type_of(expr);
                self.emit_value(expr, ty)?;
            }

            ExprKind::ParseError => {
                unreachable!("parse error expression at {} reached codegen", expr.token.location)
            }
        }

        Ok(start)
    }

    fn emit_load(&mut self, expr: &Expr) -> CodegenResult<()> {
        let symbol = self.annotations.symbol_of(expr.id);

        if let SymbolKind::Constant { value, .. } = self.scopes.symbol(symbol).kind {
            self.emit_with(Opcode::Const, Operand::Bool(value))?;
            return Ok(());
        }

        let ty = self.value_type(symbol);
        let slot = self.slot(symbol);

        match slot.direct() {
            Some((load, _, address)) if ty.cells() == 1 => {
                self.emit_int(load, address)?;
            }
            _ => {
                self.emit_slot_address(slot)?;
                self.emit_load_indirect(ty)?;
            }
        }

        Ok(())
    }

    fn emit_load_indirect(&mut self, ty: &Type) -> CodegenResult<()> {
        match ty.cells() {
            1 => self.emit(Opcode::LoadI)?,
            cells => self.emit_int(Opcode::LoadB, cells as i64)?,
        };
        Ok(())
    }

    /// Stores `value` into the variable `symbol`, indexed by `indices`, whose
    /// element type is `ty`.
    fn emit_store(
        &mut self,
        symbol: SymbolId,
        indices: &[Expr],
        ty: &Type,
        value: &Expr,
    ) -> CodegenResult<()> {
        let slot = self.slot(symbol);

        if indices.is_empty() && ty.cells() == 1 {
            if let Some((_, store, address)) = slot.direct() {
                self.emit_value(value, ty)?;
                self.emit_int(store, address)?;
                return Ok(());
            }
        }

        self.emit_slot_address(slot)?;
        self.emit_offsets(self.value_type(symbol), indices)?;
        self.emit_value(value, ty)?;

        match ty.cells() {
            1 => self.emit(Opcode::StoreI)?,
            cells => self.emit_int(Opcode::StoreB, cells as i64)?,
        };

        Ok(())
    }

    /// Pushes the address of a variable or indexed element.
    fn emit_address(&mut self, expr: &Expr) -> CodegenResult<()> {
        let symbol = self.annotations.symbol_of(expr.id);

        self.emit_slot_address(self.slot(symbol))?;
        if let ExprKind::Index(indices) = &expr.kind {
            self.emit_offsets(self.value_type(symbol), indices)?;
        }

        Ok(())
    }

    fn emit_slot_address(&mut self, slot: Slot) -> CodegenResult<()> {
        match slot {
            Slot::Global(address) => self.emit_int(Opcode::AddrG, address)?,
            Slot::Local(offset) => self.emit_int(Opcode::AddrL, offset)?,
            Slot::Ref(offset) => self.emit_int(Opcode::LoadL, offset)?,
        };
        Ok(())
    }

    /// Advances the address on top of the stack by each index in turn.
    fn emit_offsets(&mut self, mut ty: &Type, indices: &[Expr]) -> CodegenResult<()> {
        for index in indices {
            let Type::Vector(vector) = ty else {
                panic!("indexing into `{ty}`");
            };

            self.emit_expr(index)?;
            if let Some(size) = vector.size {
                self.emit_int(Opcode::Check, size as i64)?;
            }

            let stride = vector.element.cells();
            if stride != 1 {
                self.emit_int(Opcode::Const, stride as i64)?;
                self.emit(Opcode::MulI)?;
            }
            self.emit(Opcode::AddA)?;

            ty = &vector.element;
        }

        Ok(())
    }

    fn emit_call(
        &mut self,
        id: NodeId,
        name: &Token,
        args: &[Expr],
        discard: bool,
    ) -> CodegenResult<()> {
        let scopes = self.scopes;
        let annotations = self.annotations;
        let symbol = annotations.symbol_of(id);

        match &scopes.symbol(symbol).kind {
            SymbolKind::Function { ret, params, .. } => {
                let returns = ret != &Type::Void;
                if returns {
                    self.emit_int(Opcode::Adjust, 1)?;
                }

                for (arg, &param) in args.iter().zip(params) {
                    let param = scopes.symbol(param);
                    if param.is_by_ref() {
                        self.emit_address(arg)?;
                    } else {
                        let ty = param
                            .value_type()
                            .unwrap_or_else(|| panic!("parameter `{}` has no type", param.name));
                        self.emit_value(arg, ty)?;
                    }
                }

                let address = self
                    .functions
                    .get(&symbol)
                    .copied()
                    .unwrap_or_else(|| panic!("`{}` called before it was emitted", name.text));
                self.emit_int(Opcode::Call, address as i64)?;

                if !params.is_empty() {
                    self.emit_int(Opcode::Adjust, -(params.len() as i64))?;
                }
                if discard && returns {
                    self.emit_int(Opcode::Adjust, -1)?;
                }
            }

            SymbolKind::Predefined(builtin) => {
                for (arg, param) in args.iter().zip(builtin.params) {
                    if param.by_ref {
                        self.emit_address(arg)?;
                        continue;
                    }

                    let want = match param.ty {
                        ParamType::Float => Type::Float,
                        _ => annotations.type_of(arg).clone(),
                    };
                    self.emit_value(arg, &want)?;
                }

                match builtin.kind {
                    BuiltinKind::Syscall => self.emit_int(Opcode::Syscall, i64::from(builtin.code))?,
                    BuiltinKind::Read(kind) => self.emit_with(Opcode::Read, Operand::Char(kind))?,
                };

                if discard && builtin.ret_type() != Type::Void {
                    self.emit_int(Opcode::Adjust, -1)?;
                }
            }

            _ => unreachable!("call to `{}`, which is not a function", name.text),
        }

        Ok(())
    }

    fn slot(&self, symbol: SymbolId) -> Slot {
        let address = self
            .scopes
            .address(symbol)
            .unwrap_or_else(|| panic!("`{}` has no storage", self.scopes.symbol(symbol).name));

        if self.scopes.symbol(symbol).is_by_ref() {
            Slot::Ref(address)
        } else if self.scopes.level_of(symbol) == GLOBAL_LEVEL {
            Slot::Global(address)
        } else {
            Slot::Local(address)
        }
    }

    fn value_type(&self, symbol: SymbolId) -> &'c Type {
        let symbol = self.scopes.symbol(symbol);
        symbol
            .value_type()
            .unwrap_or_else(|| panic!("`{}` is not a variable", symbol.name))
    }

    fn patch(&mut self, address: usize) {
        let target = self.builder.next_address();
        self.builder.patch(address, Operand::Int(target as i64));
    }

    fn emit(&mut self, opcode: Opcode) -> CodegenResult<usize> {
        Ok(self.builder.emit(Instruction::new(opcode))?)
    }

    fn emit_with(&mut self, opcode: Opcode, operand: Operand) -> CodegenResult<usize> {
        Ok(self.builder.emit(Instruction::with_operand(opcode, operand))?)
    }

    fn emit_int(&mut self, opcode: Opcode, n: i64) -> CodegenResult<usize> {
        self.emit_with(opcode, Operand::Int(n))
    }
}

fn dyadic_opcode(op: BinOp, operand: &Type) -> Opcode {
    match (op, operand) {
        (BinOp::Add, Type::String) => Opcode::Concat,

        (BinOp::Add, Type::Int) => Opcode::AddI,
        (BinOp::Sub, Type::Int) => Opcode::SubI,
        (BinOp::Mul, Type::Int) => Opcode::MulI,
        (BinOp::Div, Type::Int) => Opcode::DivI,
        (BinOp::Mod, Type::Int) => Opcode::ModI,

        (BinOp::Add, Type::Float) => Opcode::AddF,
        (BinOp::Sub, Type::Float) => Opcode::SubF,
        (BinOp::Mul, Type::Float) => Opcode::MulF,
        (BinOp::Div, Type::Float) => Opcode::DivF,

        (BinOp::Eq, _) => Opcode::Eq,
        (BinOp::NotEq, _) => Opcode::Ne,
        (BinOp::Lt, _) => Opcode::Lt,
        (BinOp::LtEq, _) => Opcode::Le,
        (BinOp::Gt, _) => Opcode::Gt,
        (BinOp::GtEq, _) => Opcode::Ge,

        (BinOp::And, _) => Opcode::And,
        (BinOp::Or, _) => Opcode::Or,

        (op, ty) => unreachable!("`{}` applied to `{ty}`", op.as_str()),
    }
}
