use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use quill_compiler::CompileMode;
use quill_vm::DEFAULT_STACK_SIZE;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Compile a program and print its bytecode listing.
    Build {
        /// The input file.
        input: String,

        /// Whether the given input should be used directly as the source instead
        /// of as the source file path.
        #[clap(long, short, action)]
        source: bool,

        /// What the input is compiled as.
        #[arg(long, value_enum, default_value_t = CompileMode::Program)]
        mode: CompileMode,

        /// The output file. If not specified, prints the listing to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        includes: IncludeArgs,
    },

    /// Compile a program and run it. Exits with the VM's error code.
    Run {
        /// The input file.
        input: String,

        /// Whether the given input should be used directly as the source instead
        /// of as the source file path.
        #[clap(long, short, action)]
        source: bool,

        /// Trace every executed instruction to stderr.
        #[arg(long)]
        debug: bool,

        /// Stack size in cells.
        #[arg(long, default_value_t = DEFAULT_STACK_SIZE)]
        stack_size: usize,

        #[command(flatten)]
        includes: IncludeArgs,
    },
}

#[derive(Args)]
pub struct IncludeArgs {
    /// Directory that `#include "url"` paths are resolved against.
    #[arg(long, default_value = ".")]
    pub include_dir: PathBuf,

    /// Directory searched by `#include <library>`.
    #[arg(long, default_value = ".")]
    pub library_dir: PathBuf,
}
