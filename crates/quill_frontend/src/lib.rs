#[macro_use]
extern crate macro_rules_attribute;

mod lexer;
mod parser;
mod preprocessor;

pub mod ast;
pub mod pretty;
pub mod reader;
pub mod token;

pub use lexer::{LexerError, LexerErrorKind, LexerResult, DEFAULT_MAX_IDENTIFIER_LEN};
pub use parser::{
    ParseError, ParseErrorKind, ParseMode, Parsed, DEFAULT_MAX_NESTING_DEPTH,
    DEFAULT_MAX_SYNTAX_ERRORS,
};
pub use preprocessor::{PreprocessorError, PreprocessorErrorKind, DEFAULT_MAX_INCLUDE_DEPTH};

use std::collections::HashSet;

use lexer::Lexer;
use parser::Parser;
use preprocessor::Preprocessor;
use quill_session::include::IncludeResolver;
use reader::SourceReader;

derive_alias! {
    #[derive(Node!)] = #[derive(Debug, Clone, PartialEq)];
    #[derive(NodeCopy!)] = #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)];
}

/// Realizes directives by registering deviations on `reader`.
pub fn preprocess<R: IncludeResolver + ?Sized>(
    reader: &mut SourceReader,
    resolver: &R,
    max_include_depth: usize,
) -> (HashSet<String>, Vec<PreprocessorError>) {
    Preprocessor::new(resolver, max_include_depth).run(reader)
}

/// Lexes and parses the preprocessed contents of `reader`.
pub fn parse(
    reader: SourceReader,
    mode: ParseMode,
    max_identifier_len: usize,
    max_syntax_errors: usize,
    max_nesting_depth: usize,
) -> Parsed {
    let lexer = Lexer::new(reader, max_identifier_len);
    Parser::new(lexer, max_syntax_errors, max_nesting_depth).parse(mode)
}

pub fn lex(reader: SourceReader, max_identifier_len: usize) -> (Vec<token::Token>, Vec<LexerError>) {
    Lexer::new(reader, max_identifier_len).lex()
}
