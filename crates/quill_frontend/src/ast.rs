use quill_ir::{BinOp, Type, UnOp};
use quill_utils::declare_key_type;

use crate::token::Token;
use crate::{Node, NodeCopy};

declare_key_type! {
    /// Identifies an expression or statement in the side tables built by later passes.
    pub struct NodeId;
}

#[derive(Node!)]
pub struct Program {
    pub items: Vec<Item>,
}

#[derive(Node!)]
pub enum Item {
    Vars(VarList),
    Func(FuncDecl),
    Stmt(Stmt),
}

#[derive(NodeCopy!)]
pub enum BaseType {
    Int,
    Float,
    Bool,
    String,
    Void,
}

impl BaseType {
    pub fn to_type(self) -> Type {
        match self {
            BaseType::Int => Type::Int,
            BaseType::Float => Type::Float,
            BaseType::Bool => Type::Bool,
            BaseType::String => Type::String,
            BaseType::Void => Type::Void,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BaseType::Int => "int",
            BaseType::Float => "float",
            BaseType::Bool => "bool",
            BaseType::String => "string",
            BaseType::Void => "void",
        }
    }
}

/// The type keyword starting a declaration.
#[derive(Node!)]
pub struct TypeDecl {
    pub token: Token,
    pub base: BaseType,
}

/// `int a, b[2] = {1, 2};`
#[derive(Node!)]
pub struct VarList {
    pub ty: TypeDecl,
    pub vars: Vec<VarDecl>,
}

#[derive(Node!)]
pub struct VarDecl {
    pub name: Token,
    /// Outermost first. `None` for `[]`.
    pub dims: Vec<Option<usize>>,
    pub init: Option<Expr>,
}

#[derive(Node!)]
pub struct FuncDecl {
    pub ret: TypeDecl,
    pub name: Token,
    pub params: Vec<Param>,
    pub body: Vec<Item>,
}

#[derive(Node!)]
pub struct Param {
    pub by_ref: bool,
    pub ty: TypeDecl,
    pub name: Token,
    pub dims: Vec<usize>,
}

#[derive(Node!)]
pub struct Expr {
    pub id: NodeId,
    /// The token diagnostics point at.
    pub token: Token,
    pub kind: ExprKind,
}

#[derive(Node!)]
pub enum ExprKind {
    Constant(Literal),
    Variable,
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Dyadic {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `name[i][j]`, the name being the node's token.
    Index(Vec<Expr>),
    Call(Vec<Expr>),
    Tuple(Vec<Expr>),

    ParseError,
}

#[derive(Node!)]
pub enum Literal {
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Node!)]
pub struct Stmt {
    pub id: NodeId,
    pub token: Token,
    pub kind: StmtKind,
}

#[derive(Node!)]
pub enum StmtKind {
    Compound(Vec<Stmt>),
    Assign {
        target: Expr,
        value: Expr,
    },
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return(Option<Expr>),
    /// A call whose result, if any, is discarded. Arguments only; the name is the token.
    Call(Vec<Expr>),
    Empty,

    ParseError,
}

impl Expr {
    pub fn name(&self) -> &str {
        &self.token.text
    }

    pub fn is_lvalue(&self) -> bool {
        matches!(self.kind, ExprKind::Variable | ExprKind::Index(_))
    }
}

impl Stmt {
    pub fn name(&self) -> &str {
        &self.token.text
    }
}
