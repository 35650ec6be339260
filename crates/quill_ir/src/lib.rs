//! Types shared by every stage of the pipeline, from the parser down to the VM.

#[macro_use]
extern crate macro_rules_attribute;

pub mod builtins;
pub mod bytecode;

use std::fmt;

derive_alias! {
    #[derive(NodeTraits!)] = #[derive(Debug, Clone, PartialEq, Eq, Hash)];
    #[derive(NodeCopyTraits!)] = #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)];
}

#[derive(NodeCopyTraits!)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    And,
    Or,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::NotEq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(NodeCopyTraits!)]
pub enum UnOp {
    Negate,
    Not,
}

impl UnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnOp::Negate => "-",
            UnOp::Not => "!",
        }
    }
}

/// A value type.
///
/// `Wrong` marks an expression whose error has already been reported.
#[derive(NodeTraits!)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Void,
    Wrong,
    Vector(Box<VectorType>),
}

#[derive(NodeTraits!)]
pub struct VectorType {
    pub element: Type,
    /// `None` only while the outer size is still to be inferred from an initializer.
    pub size: Option<usize>,
}

impl Type {
    pub fn vector(element: Type, size: Option<usize>) -> Self {
        Type::Vector(Box::new(VectorType { element, size }))
    }

    /// Builds `base[d0][d1]...`, outermost dimension first.
    pub fn with_dims(base: Type, dims: &[Option<usize>]) -> Self {
        dims.iter()
            .rev()
            .fold(base, |element, &size| Type::vector(element, size))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Int | Type::Float | Type::Bool | Type::String)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_wrong(&self) -> bool {
        matches!(self, Type::Wrong)
    }

    /// The innermost element type.
    pub fn base(&self) -> &Type {
        match self {
            Type::Vector(vector) => vector.element.base(),
            ty => ty,
        }
    }

    pub fn num_dims(&self) -> usize {
        match self {
            Type::Vector(vector) => 1 + vector.element.num_dims(),
            _ => 0,
        }
    }

    /// Number of stack cells a value of this type occupies.
    pub fn cells(&self) -> usize {
        match self {
            Type::Vector(vector) => vector.size.unwrap_or(0) * vector.element.cells(),
            Type::Void | Type::Wrong => 0,
            _ => 1,
        }
    }

    /// Whether a value of type `source` may be stored into a location of this type.
    pub fn accepts(&self, source: &Type) -> bool {
        match (self, source) {
            (Type::Int, Type::Int)
            | (Type::Float, Type::Float | Type::Int)
            | (Type::Bool, Type::Bool)
            | (Type::String, Type::String) => true,

            (Type::Vector(target), Type::Vector(source)) => {
                target.size.is_some()
                    && target.size == source.size
                    && target.element.accepts(&source.element)
            }

            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::Bool => f.write_str("bool"),
            Type::String => f.write_str("string"),
            Type::Void => f.write_str("void"),
            Type::Wrong => f.write_str("<error>"),
            Type::Vector(_) => {
                write!(f, "{}", self.base())?;

                let mut ty = self;
                while let Type::Vector(vector) = ty {
                    match vector.size {
                        Some(size) => write!(f, "[{size}]")?,
                        None => f.write_str("[]")?,
                    }
                    ty = &vector.element;
                }

                Ok(())
            }
        }
    }
}
