//! Command-line surface. Deliberately narrow: a single input file, a
//! choice of what to do with it, and the handful of checker strictness
//! flags a one-file driver can meaningfully expose. Watch mode, project
//! references, incremental builds and the language server are a different,
//! much larger program this crate does not attempt to be.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "tsz", about = "Type-check and run a single TypeScript file")]
pub struct CliArgs {
    /// The `.ts` file to compile.
    pub input: PathBuf,

    /// What to do with the file once it type-checks.
    #[arg(long, value_enum, default_value_t = Mode::Interpret)]
    pub mode: Mode,

    /// Render diagnostics with source snippets (`file:line:col - ...`)
    /// instead of the single-line `file(line,col): ...` form.
    #[arg(long)]
    pub pretty: bool,

    /// Where to write the emitted artifact (`--mode emit`). Defaults to
    /// stdout.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Enable the `--strict` family of checker options.
    #[arg(long)]
    pub strict: bool,

    /// Enable Sound Mode's additional unsoundness checks.
    #[arg(long)]
    pub sound: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum Mode {
    /// Run the program through the tree-walking interpreter.
    #[default]
    Interpret,
    /// Compile to a loadable bytecode artifact.
    Emit,
}
