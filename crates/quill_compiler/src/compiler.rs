use quill_backend::{Codegen, CodegenResult, DEFAULT_PROGRAM_CAPACITY};
use quill_frontend::ast;
use quill_frontend::reader::SourceReader;
use quill_frontend::{
    ParseMode, DEFAULT_MAX_IDENTIFIER_LEN, DEFAULT_MAX_INCLUDE_DEPTH, DEFAULT_MAX_NESTING_DEPTH,
    DEFAULT_MAX_SYNTAX_ERRORS,
};
use quill_ir::bytecode::Program;
use quill_middle::scope::Scopes;
use quill_middle::Annotations;
use quill_session::diagnostics::{Diagnostic, DiagnosticEmitter, IntoDiagnostic};
use quill_session::include::{IncludeResolver, NoIncludes};
use quill_session::sourcemap::Source;
use quill_session::Session;

#[derive(thiserror::Error, Debug)]
pub enum CompilerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("errors while compiling")]
    HadErrors,
}

pub type CompilerResult<T> = Result<T, CompilerError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Most instructions a compiled program may hold.
    pub program_capacity: usize,
    /// Parsing stops after this many syntax errors.
    pub max_syntax_errors: usize,
    /// Deeper statements or expressions are a syntax error.
    pub max_nesting_depth: usize,
    pub max_identifier_len: usize,
    pub max_include_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            program_capacity: DEFAULT_PROGRAM_CAPACITY,
            max_syntax_errors: DEFAULT_MAX_SYNTAX_ERRORS,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_identifier_len: DEFAULT_MAX_IDENTIFIER_LEN,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// What a single source is compiled as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CompileMode {
    /// Declarations and statements.
    Program,
    /// Global declarations only.
    Globals,
    /// A bare statement sequence.
    Statements,
    /// Declarations only, with every function listed as an entry point.
    Library,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompileOutput {
    pub success: bool,
    pub program: Option<Program>,
    /// The diagnostics of the one phase that failed, if any.
    pub errors: Vec<Diagnostic>,
    /// Where execution starts: the global initialisation code.
    pub entry: Option<usize>,
    pub entry_points: Vec<(String, usize)>,
}

impl CompileOutput {
    fn failed(errors: Vec<Diagnostic>) -> Self {
        Self {
            success: false,
            program: None,
            errors,
            entry: None,
            entry_points: vec![],
        }
    }
}

/// One named source of a compilation.
#[derive(Debug, Clone, Copy)]
struct Chunk<'a> {
    name: &'a str,
    source: &'a str,
    mode: ParseMode,
}

struct Built {
    program: Program,
    entry: usize,
    entry_points: Vec<(String, usize)>,
}

pub struct Compiler<D: DiagnosticEmitter, R: IncludeResolver = NoIncludes> {
    pub session: Session<D>,
    pub options: CompileOptions,

    resolver: R,
}

impl<D: DiagnosticEmitter> Compiler<D> {
    pub fn new(diagnostics: D, options: CompileOptions) -> Self {
        Self {
            session: Session::new(diagnostics),
            options,

            resolver: NoIncludes,
        }
    }
}

impl<D: DiagnosticEmitter, R: IncludeResolver> Compiler<D, R> {
    pub fn with_resolver<R2: IncludeResolver>(self, resolver: R2) -> Compiler<D, R2> {
        Compiler {
            session: self.session,
            options: self.options,

            resolver,
        }
    }

    pub fn compile(
        &mut self,
        mode: CompileMode,
        name: &str,
        source: &str,
    ) -> CompilerResult<CompileOutput> {
        match mode {
            CompileMode::Program => self.compile_program(name, source),
            CompileMode::Globals => self.compile_globals(name, source),
            CompileMode::Statements => self.compile_statements(name, source),
            CompileMode::Library => self.compile_library(name, source),
        }
    }

    pub fn compile_program(&mut self, name: &str, source: &str) -> CompilerResult<CompileOutput> {
        self.compile_chunks(&[chunk(name, source, ParseMode::Program)], false)
    }

    pub fn compile_globals(&mut self, name: &str, source: &str) -> CompilerResult<CompileOutput> {
        self.compile_chunks(&[chunk(name, source, ParseMode::Declarations)], false)
    }

    pub fn compile_statements(&mut self, name: &str, source: &str) -> CompilerResult<CompileOutput> {
        self.compile_chunks(&[chunk(name, source, ParseMode::Statements)], false)
    }

    /// Like [`Self::compile_globals`], but every function's start address
    /// is returned in `entry_points`.
    pub fn compile_library(&mut self, name: &str, source: &str) -> CompilerResult<CompileOutput> {
        self.compile_chunks(&[chunk(name, source, ParseMode::Declarations)], true)
    }

    /// Compiles `globals` together with a statement sequence per handler.
    ///
    /// All handlers see the same globals. Run `entry` once, then any handler
    /// any number of times on the same VM.
    pub fn compile_entry_points(
        &mut self,
        name: &str,
        globals: &str,
        handlers: &[(&str, &str)],
    ) -> CompilerResult<CompileOutput> {
        let chunks: Vec<_> = std::iter::once(chunk(name, globals, ParseMode::Declarations))
            .chain(
                handlers
                    .iter()
                    .map(|&(name, source)| chunk(name, source, ParseMode::Statements)),
            )
            .collect();

        self.compile_chunks(&chunks, false)
    }

    fn compile_chunks(&mut self, chunks: &[Chunk], library: bool) -> CompilerResult<CompileOutput> {
        let mut errors = vec![];

        match self.build(chunks, library, &mut errors) {
            Ok(built) => Ok(CompileOutput {
                success: true,
                program: Some(built.program),
                errors,
                entry: Some(built.entry),
                entry_points: built.entry_points,
            }),
            Err(CompilerError::HadErrors) => Ok(CompileOutput::failed(errors)),
            Err(err) => Err(err),
        }
    }

    fn build(
        &mut self,
        chunks: &[Chunk],
        library: bool,
        errors: &mut Vec<Diagnostic>,
    ) -> CompilerResult<Built> {
        let programs = self.parse(chunks, errors)?;

        let mut scopes = Scopes::new();
        let mut annotations = Vec::with_capacity(programs.len());
        let mut semantic_errors = vec![];

        for program in &programs {
            let (program_annotations, program_errors) = quill_middle::analyze(&mut scopes, program);
            annotations.push(program_annotations);
            semantic_errors.extend(program_errors);
        }

        self.report(semantic_errors, errors)?;

        let capacity = self.options.program_capacity;
        match generate(&scopes, &programs, &annotations, chunks, library, capacity) {
            Ok(built) => Ok(built),
            Err(err) => {
                self.report([err], errors)?;
                Err(CompilerError::HadErrors)
            }
        }
    }

    /// Preprocesses, lexes and parses every chunk, one phase at a time.
    fn parse(
        &mut self,
        chunks: &[Chunk],
        errors: &mut Vec<Diagnostic>,
    ) -> CompilerResult<Vec<ast::Program>> {
        let mut readers = Vec::with_capacity(chunks.len());
        let mut preprocessor_errors = vec![];

        for chunk in chunks {
            let mut reader = SourceReader::new(chunk.name, chunk.source);
            let (_, chunk_errors) = quill_frontend::preprocess(
                &mut reader,
                &self.resolver,
                self.options.max_include_depth,
            );

            for buffer in reader.buffers() {
                let source = Source::new(buffer.name.clone(), buffer.text.clone());
                self.session.sources.insert_or_replace(source);
            }

            preprocessor_errors.extend(chunk_errors);
            readers.push(reader);
        }

        self.report(preprocessor_errors, errors)?;

        let mut programs = Vec::with_capacity(chunks.len());
        let mut lexer_errors = vec![];
        let mut parse_errors = vec![];

        for (reader, chunk) in readers.into_iter().zip(chunks) {
            let parsed = quill_frontend::parse(
                reader,
                chunk.mode,
                self.options.max_identifier_len,
                self.options.max_syntax_errors,
                self.options.max_nesting_depth,
            );

            programs.push(parsed.program);
            lexer_errors.extend(parsed.lexer_errors);
            parse_errors.extend(parsed.parse_errors);
        }

        self.report(lexer_errors, errors)?;
        self.report(parse_errors, errors)?;

        Ok(programs)
    }

    fn report<I>(&mut self, diagnostics: I, errors: &mut Vec<Diagnostic>) -> CompilerResult<()>
    where
        I: IntoIterator,
        I::Item: IntoDiagnostic,
    {
        let diagnostics: Vec<_> = diagnostics
            .into_iter()
            .map(IntoDiagnostic::into_diagnostic)
            .collect();
        errors.extend(diagnostics.iter().cloned());

        self.session
            .report_all(diagnostics)
            .map_err(|_| CompilerError::HadErrors)
    }
}

/// Emits functions and main code of the first chunk, then one handler per
/// remaining chunk.
fn generate(
    scopes: &Scopes,
    programs: &[ast::Program],
    annotations: &[Annotations],
    chunks: &[Chunk],
    library: bool,
    capacity: usize,
) -> CodegenResult<Built> {
    let mut codegen = Codegen::new(scopes, capacity);
    let mut units = programs.iter().zip(annotations).zip(chunks);

    let ((main, main_annotations), _) = units.next().expect("compiled without a main chunk");
    let functions = codegen.emit_functions(main, main_annotations)?;
    let entry = codegen.emit_main(main, main_annotations)?;

    let mut entry_points = if library { functions } else { vec![] };
    for ((program, annotations), chunk) in units {
        let address = codegen.emit_handler(program, annotations)?;
        entry_points.push((chunk.name.to_owned(), address));
    }

    Ok(Built {
        program: codegen.finish(entry),
        entry,
        entry_points,
    })
}

fn chunk<'a>(name: &'a str, source: &'a str, mode: ParseMode) -> Chunk<'a> {
    Chunk { name, source, mode }
}
