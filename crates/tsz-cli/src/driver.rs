//! Thin pipeline wiring: read the input file, run it through
//! `parse -> bind -> check`, then hand the checked program to either the
//! interpreter or the bytecode emitter depending on `--mode`. Multi-file
//! projects, incremental rebuilds and a language server are a different,
//! much larger program; this one drives a single file start to finish and
//! returns the process exit code the checked program earned.

use std::io::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use tsz_common::{CheckerOptions, Diagnostic};
use tsz_interpreter::{AtomTable, Completion};
use tsz_parser::Parser;

use crate::args::{CliArgs, Mode};
use crate::reporter::Reporter;

/// Runs the pipeline for `args`, printing diagnostics as it goes, and
/// returns the process exit code: `0` on a clean run, `1` if checking
/// failed or the interpreted program ended in an uncaught throw.
pub fn run(args: &CliArgs) -> Result<i32> {
    let file = args.input.display().to_string();
    let source = std::fs::read_to_string(&args.input).with_context(|| format!("reading {file}"))?;

    let parser = Parser::new(&source, file.clone());
    let (program, arena, atoms, parse_diagnostics) = parser.parse_program();

    let reporter = Reporter::new(args.pretty);
    if !parse_diagnostics.is_empty() {
        print!("{}", reporter.render(&parse_diagnostics));
        if parse_diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(1);
        }
    }

    let binder = tsz_binder::bind_program(&arena, &atoms, program, file.clone());
    let types = tsz_solver::TypeInterner::new();
    let mut options = CheckerOptions { strict: args.strict, sound_mode: args.sound, ..CheckerOptions::default() };
    options = options.apply_strict_defaults();

    let type_map = match tsz_checker::check(&arena, &atoms, &types, &binder, program, options, file.clone()) {
        Ok(map) => map,
        Err(err) => {
            debug!(file, errors = err.diagnostics.len(), "type check failed");
            print!("{}", reporter.render(&err.diagnostics));
            return Ok(1);
        }
    };

    match args.mode {
        Mode::Interpret => run_interpreted(arena, &atoms, &type_map, program),
        Mode::Emit => emit_artifact(args, &arena, &atoms, &binder, program, &type_map),
    }
}

fn run_interpreted(arena: tsz_parser::NodeArena, atoms: &tsz_common::Interner, type_map: &tsz_checker::TypeMap, program: tsz_parser::NodeIndex) -> Result<i32> {
    let arena = Arc::new(arena);
    let atom_table = AtomTable::snapshot(atoms);
    match tsz_interpreter::interpret(arena, atom_table, type_map, program) {
        Completion::Throw(value) => {
            eprintln!("Uncaught {}", value.to_js_string());
            Ok(1)
        }
        _ => Ok(0),
    }
}

fn emit_artifact(
    args: &CliArgs,
    arena: &tsz_parser::NodeArena,
    atoms: &tsz_common::Interner,
    binder: &tsz_binder::BinderState,
    program: tsz_parser::NodeIndex,
    type_map: &tsz_checker::TypeMap,
) -> Result<i32> {
    let artifact = tsz_emitter::emit(arena, atoms, binder, program, type_map).context("emitting bytecode artifact")?;
    let bytes = bincode::serialize(&artifact).context("serializing bytecode artifact")?;
    match &args.output {
        Some(path) => std::fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?,
        None => std::io::stdout().write_all(&bytes).context("writing artifact to stdout")?,
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_script(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::with_suffix(".ts").expect("temp file");
        f.write_all(contents.as_bytes()).expect("write temp file");
        f
    }

    #[test]
    fn interprets_a_clean_program_and_returns_zero() {
        let file = write_script("let x: number = 1 + 2;\n");
        let args = CliArgs { input: file.path().to_path_buf(), mode: Mode::Interpret, pretty: false, output: None, strict: false, sound: false };
        let code = run(&args).expect("driver run");
        assert_eq!(code, 0);
    }

    #[test]
    fn type_errors_short_circuit_before_interpretation() {
        let file = write_script("let x: number = \"not a number\";\n");
        let args = CliArgs { input: file.path().to_path_buf(), mode: Mode::Interpret, pretty: false, output: None, strict: false, sound: false };
        let code = run(&args).expect("driver run");
        assert_eq!(code, 1);
    }

    #[test]
    fn emit_mode_produces_a_serialized_artifact_on_disk() {
        let file = write_script("function id(x: number): number { return x; }\n");
        let out = tempfile::NamedTempFile::new().expect("temp out file");
        let args = CliArgs { input: file.path().to_path_buf(), mode: Mode::Emit, pretty: false, output: Some(out.path().to_path_buf()), strict: false, sound: false };
        let code = run(&args).expect("driver run");
        assert_eq!(code, 0);
        let bytes = std::fs::read(out.path()).expect("read artifact");
        assert!(!bytes.is_empty());
    }
}
