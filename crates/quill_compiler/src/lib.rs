//! The quill toolchain: compile sources to bytecode through every phase.

mod compiler;

#[cfg(test)]
mod tests;

pub use compiler::{
    CompileMode, CompileOptions, CompileOutput, Compiler, CompilerError, CompilerResult,
};
