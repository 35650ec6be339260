use std::fmt;

use crate::{VmError, VmResult};

/// One stack cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A reserved cell that was never written.
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Address(usize),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::String(_) => "string",
            Value::Address(_) => "address",
        }
    }

    fn mismatch<T>(&self, expected: &'static str) -> VmResult<T> {
        match self {
            Value::Null => Err(VmError::NullOperand),
            _ => Err(VmError::InvalidOperand {
                expected,
                found: self.type_name(),
            }),
        }
    }

    pub fn as_int(&self) -> VmResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            _ => self.mismatch("int"),
        }
    }

    pub fn as_float(&self) -> VmResult<f64> {
        match self {
            Value::Float(x) => Ok(*x),
            _ => self.mismatch("float"),
        }
    }

    pub fn as_bool(&self) -> VmResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => self.mismatch("bool"),
        }
    }

    pub fn as_str(&self) -> VmResult<&str> {
        match self {
            Value::String(s) => Ok(s),
            _ => self.mismatch("string"),
        }
    }

    pub fn into_string(self) -> VmResult<String> {
        match self {
            Value::String(s) => Ok(s),
            other => other.mismatch("string"),
        }
    }

    pub fn as_address(&self) -> VmResult<usize> {
        match self {
            Value::Address(address) => Ok(*address),
            _ => self.mismatch("address"),
        }
    }

    /// Fails on `Null`, which no instruction may consume.
    pub fn initialized(self) -> VmResult<Self> {
        match self {
            Value::Null => Err(VmError::NullOperand),
            value => Ok(value),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
            Value::Address(address) => write!(f, "@{address}"),
        }
    }
}
