//! The Type Checker: walks the
//! bound AST, calls into `tsz-solver` for every type relation, and populates
//! a `TypeMap` side table keyed by AST node identity.
//!
//! Module layout: `context` (shared walk state), `dispatch` (node-kind ->
//! check-method dispatch), `expr`/`declarations`/`control_flow` (the
//! statement and expression rules themselves), `generic_checker`
//! (type-argument inference at call sites), `module_checker` (cross-module
//! ordering).

pub mod context;
pub mod control_flow;
pub mod declarations;
pub mod dispatch;
pub mod expr;
pub mod generic_checker;
pub mod module_checker;

pub use context::{CheckerState, TypeCheckError, TypeMap};
pub use module_checker::check_modules;

use tsz_binder::BinderState;
use tsz_common::{CheckerOptions, Interner};
use tsz_parser::{NodeArena, NodeIndex};
use tsz_solver::TypeInterner;

/// `check(ast) -> TypeMap | TypeCheckError`.
///
/// Errors are collected per top-level statement; this entry point only turns into `Err` when at least one
/// diagnostic reached `Error` severity.
pub fn check(
    arena: &NodeArena,
    atoms: &Interner,
    types: &TypeInterner,
    binder: &BinderState,
    program: NodeIndex,
    options: CheckerOptions,
    file: impl Into<String>,
) -> Result<TypeMap, TypeCheckError> {
    let mut state = CheckerState::new(arena, atoms, types, binder, options, file);
    state.closures = tsz_lowering::plan_closures(arena, binder, program);
    control_flow::check_program(&mut state, program);
    if state.diagnostics.iter().any(|d| d.is_error()) {
        return Err(TypeCheckError {
            diagnostics: state.diagnostics,
        });
    }
    Ok(state.type_map)
}
