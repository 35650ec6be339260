//! Name resolution, type checking and storage layout.

mod analyzer;
pub mod scope;

#[cfg(test)]
mod tests;

pub use analyzer::{dyadic_type, unify, Annotations, SemanticError, SemanticErrorKind};

use quill_frontend::ast::Program;
use scope::Scopes;

/// Checks `program`, declaring its globals and functions in `scopes`.
///
/// The same `scopes` may be passed for several programs in turn, so that later
/// ones see the globals declared by earlier ones.
pub fn analyze(scopes: &mut Scopes, program: &Program) -> (Annotations, Vec<SemanticError>) {
    analyzer::Analyzer::new(scopes).run(program)
}
