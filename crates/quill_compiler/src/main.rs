mod cli;

use std::io;
use std::process::ExitCode;

use clap::Parser as _;
use cli::{Cli, Command, IncludeArgs};
use quill_compiler::{CompileMode, CompileOptions, Compiler, CompilerError, CompilerResult};
use quill_ir::bytecode::Program;
use quill_session::diagnostics::PrettyDiagnosticEmitter;
use quill_session::include::FsIncludeResolver;
use quill_vm::{Vm, VmOptions};

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> CompilerResult<u8> {
    let cli = Cli::parse();

    match cli.command {
        Command::Build {
            input,
            source,
            mode,
            output,
            includes,
        } => {
            let (name, source) = read_input(input, source)?;
            let program = compile(includes, mode, &name, &source)?;

            match output {
                Some(path) => std::fs::write(path, program.listing())?,
                None => print!("{}", program.listing()),
            }

            Ok(0)
        }

        Command::Run {
            input,
            source,
            debug,
            stack_size,
            includes,
        } => {
            let (name, source) = read_input(input, source)?;
            let program = compile(includes, CompileMode::Program, &name, &source)?;

            let mut vm = Vm::new(
                &program,
                VmOptions { stack_size },
                io::stdin().lock(),
                io::stdout().lock(),
                io::stderr().lock(),
            );
            let code = vm.run(program.start(), debug);
            let fault = vm.fault().map(ToString::to_string);
            drop(vm);

            if let Some(fault) = fault {
                eprintln!("runtime error {}: {fault}", code.as_u8());
            }

            Ok(code.as_u8())
        }
    }
}

fn read_input(input: String, is_source: bool) -> CompilerResult<(String, String)> {
    if is_source {
        Ok(("<unnamed>".to_owned(), input))
    } else {
        let source = std::fs::read_to_string(&input)?;
        Ok((input, source))
    }
}

fn compile(
    includes: IncludeArgs,
    mode: CompileMode,
    name: &str,
    source: &str,
) -> CompilerResult<Program> {
    let resolver = FsIncludeResolver {
        url_root: includes.include_dir,
        library_root: includes.library_dir,
    };

    let mut compiler = Compiler::new(PrettyDiagnosticEmitter::default(), CompileOptions::default())
        .with_resolver(resolver);

    compiler
        .compile(mode, name, source)?
        .program
        .ok_or(CompilerError::HadErrors)
}
