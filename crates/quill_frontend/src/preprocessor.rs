//! Directive handling on top of [`SourceReader`] deviations.
//!
//! The preprocessor walks the logical line sequence once, from the start of
//! the root buffer, following every deviation registered so far. Each
//! directive line it meets gets a deviation of its own, so the lexer never
//! sees a line starting with `#`.

use std::collections::{HashMap, HashSet};

use quill_diagnostic::Location;
use quill_session::diagnostics::{Diagnostic, IntoDiagnostic};
use quill_session::include::IncludeResolver;

use crate::reader::{BufferId, Position, SourceReader};

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessorError {
    pub kind: PreprocessorErrorKind,
    pub location: Location,
    pub text: String,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PreprocessorErrorKind {
    #[error("unknown directive `#{0}`")]
    UnknownDirective(String),

    #[error("`#{0}` is missing its target")]
    MissingTarget(&'static str),

    #[error("`{0}` is already defined")]
    AlreadyDefined(String),

    #[error("`{0}` is not defined")]
    NotDefined(String),

    #[error("malformed `#include`, expected `\"url\"` or `<library>`")]
    MalformedInclude,

    #[error("cannot include `{name}`: {reason}")]
    IncludeFailed { name: String, reason: String },

    #[error("includes nested deeper than {0} levels")]
    IncludeTooDeep(usize),

    #[error("`#{0}` without matching `#endif`")]
    Unterminated(&'static str),

    #[error("`#{0}` without matching `#ifdef` or `#ifndef`")]
    Unmatched(&'static str),

    #[error("duplicate `#else`")]
    DuplicateElse,

    #[error("line redirects form a cycle")]
    DeviationLoop,
}

impl IntoDiagnostic for PreprocessorError {
    fn into_diagnostic(self) -> Diagnostic {
        Diagnostic::preprocessor(self.kind.to_string()).at(&self.location, self.text)
    }
}

/// An open `#ifdef`/`#ifndef` whose active branch is being walked.
#[derive(Debug, Clone, Copy)]
struct Conditional {
    buffer: BufferId,
    /// Line of the matching `#else`, while walking the first branch.
    else_line: Option<usize>,
    endif_line: usize,
}

/// Lines of the `#else`/`#endif` matching a conditional.
#[derive(Debug, Clone, Copy)]
struct Branches {
    else_line: Option<usize>,
    endif_line: usize,
}

enum Flow {
    Continue,
    Stop,
}

pub struct Preprocessor<'r, R: IncludeResolver + ?Sized> {
    resolver: &'r R,
    max_include_depth: usize,

    defined: HashSet<String>,
    conditionals: Vec<Conditional>,
    /// `#else` lines already reported as duplicates.
    duplicate_elses: HashSet<Position>,
    include_depth: HashMap<BufferId, usize>,

    errors: Vec<PreprocessorError>,
}

impl<'r, R: IncludeResolver + ?Sized> Preprocessor<'r, R> {
    pub fn new(resolver: &'r R, max_include_depth: usize) -> Self {
        Self {
            resolver,
            max_include_depth,

            defined: HashSet::new(),
            conditionals: vec![],
            duplicate_elses: HashSet::new(),
            include_depth: HashMap::new(),

            errors: vec![],
        }
    }

    /// Registers deviations for every directive reachable from the start of
    /// the root buffer. Returns the set of words still defined at the end.
    pub fn run(mut self, reader: &mut SourceReader) -> (HashSet<String>, Vec<PreprocessorError>) {
        let mut position = reader.start();

        loop {
            position = match reader.resolve(position) {
                Ok(position) => position,
                Err(deviation_loop) => {
                    self.report(
                        reader,
                        deviation_loop.start,
                        PreprocessorErrorKind::DeviationLoop,
                    );
                    break;
                }
            };

            let Some(line) = reader.line_text(position) else {
                break;
            };

            let Some(directive) = line.trim_start().strip_prefix('#') else {
                position = position.next_line();
                continue;
            };

            if let Flow::Stop = self.directive(reader, position, directive) {
                break;
            }

            if reader.deviation(position).is_none() {
                reader.deviate(position, position.next_line());
            }
        }

        (self.defined, self.errors)
    }

    fn directive(&mut self, reader: &mut SourceReader, at: Position, directive: &str) -> Flow {
        let (name, rest) = split_word(directive);

        match name {
            "define" => {
                match word_argument(rest) {
                    None => self.report(reader, at, PreprocessorErrorKind::MissingTarget("define")),
                    Some(word) if self.defined.contains(word) => {
                        let kind = PreprocessorErrorKind::AlreadyDefined(word.to_owned());
                        self.report(reader, at, kind);
                    }
                    Some(word) => {
                        self.defined.insert(word.to_owned());
                    }
                }
                Flow::Continue
            }

            "undef" => {
                match word_argument(rest) {
                    None => self.report(reader, at, PreprocessorErrorKind::MissingTarget("undef")),
                    Some(word) => {
                        if !self.defined.remove(word) {
                            let kind = PreprocessorErrorKind::NotDefined(word.to_owned());
                            self.report(reader, at, kind);
                        }
                    }
                }
                Flow::Continue
            }

            "include" => {
                self.include(reader, at, rest);
                Flow::Continue
            }

            "ifdef" => self.conditional(reader, at, rest, "ifdef", true),
            "ifndef" => self.conditional(reader, at, rest, "ifndef", false),

            "else" => {
                match self.conditionals.last() {
                    Some(open) if open.buffer == at.buffer && open.else_line == Some(at.line) => {
                        // end of the active first branch
                        let endif = Position::new(at.buffer, open.endif_line);
                        reader.deviate(at, endif.next_line());
                        self.conditionals.pop();
                    }
                    _ if self.duplicate_elses.contains(&at) => {}
                    _ => self.report(reader, at, PreprocessorErrorKind::Unmatched("else")),
                }
                Flow::Continue
            }

            "endif" => {
                match self.conditionals.last() {
                    Some(open) if open.buffer == at.buffer && open.endif_line == at.line => {
                        self.conditionals.pop();
                    }
                    _ => self.report(reader, at, PreprocessorErrorKind::Unmatched("endif")),
                }
                Flow::Continue
            }

            other => {
                let kind = PreprocessorErrorKind::UnknownDirective(other.to_owned());
                self.report(reader, at, kind);
                Flow::Continue
            }
        }
    }

    fn include(&mut self, reader: &mut SourceReader, at: Position, argument: &str) {
        let argument = argument.trim();

        let (name, result) = if let Some(url) = delimited(argument, '"', '"') {
            (url, self.resolver.fetch_url(url))
        } else if let Some(library) = delimited(argument, '<', '>') {
            (library, self.resolver.resolve_library(library))
        } else {
            self.report(reader, at, PreprocessorErrorKind::MalformedInclude);
            return;
        };

        let depth = self.include_depth.get(&at.buffer).copied().unwrap_or(0) + 1;
        if depth > self.max_include_depth {
            let kind = PreprocessorErrorKind::IncludeTooDeep(self.max_include_depth);
            self.report(reader, at, kind);
            return;
        }

        let text = match result {
            Ok(text) => text,
            Err(err) => {
                let kind = PreprocessorErrorKind::IncludeFailed {
                    name: name.to_owned(),
                    reason: err.to_string(),
                };
                self.report(reader, at, kind);
                return;
            }
        };

        let buffer = reader.add_buffer(name, text);
        let end = reader.buffer(buffer).num_lines();
        self.include_depth.insert(buffer, depth);

        reader.deviate(at, Position::new(buffer, 0));
        reader.deviate(Position::new(buffer, end), at.next_line());
    }

    fn conditional(
        &mut self,
        reader: &mut SourceReader,
        at: Position,
        argument: &str,
        directive: &'static str,
        when_defined: bool,
    ) -> Flow {
        let Some(word) = word_argument(argument) else {
            self.report(reader, at, PreprocessorErrorKind::MissingTarget(directive));
            return Flow::Continue;
        };
        let active = self.defined.contains(word) == when_defined;

        let Some(branches) = self.find_branches(reader, at) else {
            self.report(reader, at, PreprocessorErrorKind::Unterminated(directive));
            return Flow::Stop;
        };

        let open = Conditional {
            buffer: at.buffer,
            else_line: branches.else_line,
            endif_line: branches.endif_line,
        };

        if active {
            reader.deviate(at, at.next_line());
            self.conditionals.push(open);
        } else if let Some(else_line) = branches.else_line {
            reader.deviate(at, Position::new(at.buffer, else_line + 1));
            self.conditionals.push(Conditional {
                else_line: None,
                ..open
            });
        } else {
            reader.deviate(at, Position::new(at.buffer, branches.endif_line + 1));
        }

        Flow::Continue
    }

    /// Scans forward in the conditional's own buffer, counting nested opens.
    fn find_branches(&mut self, reader: &SourceReader, at: Position) -> Option<Branches> {
        let mut depth = 0_usize;
        let mut else_line = None;

        let mut line = at.line + 1;
        while let Some(text) = reader.line_text(Position::new(at.buffer, line)) {
            if let Some(directive) = text.trim_start().strip_prefix('#') {
                match split_word(directive).0 {
                    "ifdef" | "ifndef" => depth += 1,
                    "endif" if depth == 0 => {
                        return Some(Branches {
                            else_line,
                            endif_line: line,
                        });
                    }
                    "endif" => depth -= 1,
                    "else" if depth == 0 => {
                        if else_line.is_some() {
                            let position = Position::new(at.buffer, line);
                            self.report(reader, position, PreprocessorErrorKind::DuplicateElse);
                            self.duplicate_elses.insert(position);
                        } else {
                            else_line = Some(line);
                        }
                    }
                    _ => {}
                }
            }

            line += 1;
        }

        None
    }

    fn report(&mut self, reader: &SourceReader, at: Position, kind: PreprocessorErrorKind) {
        let text = reader.line_text(at).unwrap_or_default();
        let indent = text.chars().take_while(|ch| ch.is_whitespace()).count();

        let buffer = reader.buffer(at.buffer);
        self.errors.push(PreprocessorError {
            kind,
            location: Location::new(buffer.name.clone(), at.line + 1, indent + 1),
            text: text.trim().to_owned(),
        });
    }
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    let end = s
        .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
        .unwrap_or(s.len());
    s.split_at(end)
}

fn word_argument(s: &str) -> Option<&str> {
    let (word, _) = split_word(s);
    (!word.is_empty()).then_some(word)
}

fn delimited(s: &str, open: char, close: char) -> Option<&str> {
    let inner = s.strip_prefix(open)?;
    let end = inner.find(close)?;
    let inner = &inner[..end];
    (!inner.is_empty()).then_some(inner)
}
