use std::fmt;

use quill_ir::bytecode::Opcode;

/// The status a run finishes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    None = 0,
    InvalidAddress = 1,
    InvalidOperand = 2,
    InvalidOpcode = 3,
    IndexOutOfRange = 4,
    StackOverflow = 5,
    StackUnderflow = 6,
    IntegerOverflow = 7,
    NullOperand = 8,
    Unknown = 9,
}

impl ErrorCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::None => "none",
            ErrorCode::InvalidAddress => "invalid address",
            ErrorCode::InvalidOperand => "invalid operand",
            ErrorCode::InvalidOpcode => "invalid opcode",
            ErrorCode::IndexOutOfRange => "index out of range",
            ErrorCode::StackOverflow => "stack overflow",
            ErrorCode::StackUnderflow => "stack underflow",
            ErrorCode::IntegerOverflow => "integer overflow",
            ErrorCode::NullOperand => "null operand",
            ErrorCode::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum VmError {
    #[error("address {0} is outside the stack")]
    InvalidAddress(i64),

    #[error("expected {expected}, found {found}")]
    InvalidOperand {
        expected: &'static str,
        found: &'static str,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot read {kind} from {text:?}")]
    BadInput { kind: &'static str, text: String },

    #[error("`{0}` is missing its operand")]
    MissingOperand(Opcode),

    #[error("no instruction at {0}")]
    ProgramCounter(usize),

    #[error("no built-in with code {0}")]
    UnknownBuiltin(i64),

    #[error("index {index} is out of range for size {size}")]
    IndexOutOfRange { index: i64, size: i64 },

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("operand was never initialized")]
    NullOperand,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl VmError {
    pub fn code(&self) -> ErrorCode {
        match self {
            VmError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            VmError::InvalidOperand { .. } | VmError::DivisionByZero | VmError::BadInput { .. } => {
                ErrorCode::InvalidOperand
            }
            VmError::MissingOperand(_) | VmError::ProgramCounter(_) | VmError::UnknownBuiltin(_) => {
                ErrorCode::InvalidOpcode
            }
            VmError::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,
            VmError::StackOverflow => ErrorCode::StackOverflow,
            VmError::StackUnderflow => ErrorCode::StackUnderflow,
            VmError::IntegerOverflow => ErrorCode::IntegerOverflow,
            VmError::NullOperand => ErrorCode::NullOperand,
            VmError::Io(_) => ErrorCode::Unknown,
        }
    }
}

pub type VmResult<T> = Result<T, VmError>;
