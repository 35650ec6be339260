pub mod codegen;

#[cfg(test)]
mod tests;

pub use codegen::Codegen;
use quill_ir::bytecode::ProgramFull;
use quill_session::diagnostics::{Diagnostic, IntoDiagnostic};

/// Room for this many instructions unless configured otherwise.
pub const DEFAULT_PROGRAM_CAPACITY: usize = 1 << 16;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenError {
    #[error(transparent)]
    ProgramFull(#[from] ProgramFull),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

impl IntoDiagnostic for CodegenError {
    fn into_diagnostic(self) -> Diagnostic {
        match self {
            CodegenError::ProgramFull(_) => Diagnostic::codegen(self.to_string())
                .with_note("raise `program_capacity` or split the program"),
        }
    }
}
