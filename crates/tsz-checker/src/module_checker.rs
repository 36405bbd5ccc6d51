//! The Module Graph: canonical-path import
//! resolution, cycle detection, and the reverse-topological execution
//! order. `check_modules` is the cross-module counterpart of `check`: each
//! module's imports are resolved against the other modules in the graph,
//! dependencies are checked before dependents, and a circular import is
//! reported as `MODULE_CYCLE` rather than looped on forever.

use rustc_hash::FxHashMap;

use tsz_binder::BinderState;
use tsz_common::{diagnostics::codes, CheckerOptions, Diagnostic, Interner, Span};
use tsz_parser::{Node, NodeArena, NodeIndex};
use tsz_solver::TypeInterner;

use crate::context::TypeMap;
use crate::control_flow;
use crate::CheckerState;

/// One module in the graph: its canonical path, parsed program, and the
/// already-built `BinderState` for it (binding happens per-module, ahead of
/// `check_modules`, exactly as it does for the single-module `check` entry
/// point).
pub struct ModuleUnit<'a> {
    pub path: String,
    pub arena: &'a NodeArena,
    pub binder: &'a BinderState,
    pub program: NodeIndex,
}

/// Raised when the graph cannot be ordered (a cycle) or when any module
/// fails to type-check. Carries every diagnostic collected across every
/// module, batched the same way a single module's errors are.
#[derive(Debug, Clone)]
pub struct ModuleCheckError {
    pub diagnostics: Vec<Diagnostic>,
}

impl std::fmt::Display for ModuleCheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for d in &self.diagnostics {
            writeln!(f, "{}: {}", d.code, d.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ModuleCheckError {}

/// Built-in modules are named by a reserved prefix; their
/// bodies are supplied by the host's built-in module registry collaborator,
/// never parsed as source, so they never participate in cycle detection or
/// ordering.
#[must_use]
pub fn is_builtin_specifier(specifier: &str) -> bool {
    specifier.starts_with("builtin:")
}

/// Resolve an import specifier written in `importer_path` to a canonical
/// module path: relative specifiers (`./x`, `../x`) are joined against the
/// importer's directory with `.`/`..` segments collapsed and a directory-index
/// fallback (`./x` resolving to `./x.ts` when there is no extension);
/// bare specifiers are left for the host's configurable bare-specifier
/// resolver collaborator and returned unchanged.
#[must_use]
pub fn resolve_specifier(importer_path: &str, specifier: &str) -> String {
    if is_builtin_specifier(specifier) || !specifier.starts_with('.') {
        return specifier.to_string();
    }
    let mut segments: Vec<&str> = importer_path.split('/').collect();
    segments.pop();
    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    let mut joined = segments.join("/");
    if !joined.ends_with(".ts") && !joined.ends_with(".tsx") {
        joined.push_str(".ts");
    }
    joined
}

fn module_import_specifiers(atoms: &Interner, arena: &NodeArena, program: NodeIndex) -> Vec<String> {
    let Node::Program(stmts) = arena.get(program) else {
        return Vec::new();
    };
    let mut specifiers = Vec::new();
    for &stmt in stmts {
        match arena.get(stmt) {
            Node::Import { module, .. } => specifiers.push(atoms.resolve(*module).to_string()),
            Node::Export { from_module: Some(module), .. } => {
                specifiers.push(atoms.resolve(*module).to_string());
            }
            _ => {}
        }
    }
    specifiers
}

/// Build the dependency graph (edges point from an importing module to the
/// modules it imports), detect cycles, and return a dependency-first
/// execution order: a module's imports are ordered before it, so that by
/// the time a module's statements run, every binding it imports already
/// exists.
pub fn execution_order(atoms: &Interner, modules: &[ModuleUnit]) -> Result<Vec<usize>, ModuleCheckError> {
    let index_by_path: FxHashMap<&str, usize> = modules
        .iter()
        .enumerate()
        .map(|(i, m)| (m.path.as_str(), i))
        .collect();

    let mut deps: Vec<Vec<usize>> = vec![Vec::new(); modules.len()];
    for (i, module) in modules.iter().enumerate() {
        for specifier in module_import_specifiers(atoms, module.arena, module.program) {
            if is_builtin_specifier(&specifier) {
                continue;
            }
            let resolved = resolve_specifier(&module.path, &specifier);
            if let Some(&dep_idx) = index_by_path.get(resolved.as_str()) {
                deps[i].push(dep_idx);
            }
            // Bare specifiers / paths outside `modules` resolve through an
            // external collaborator (built-in registry or host loader) and
            // are not part of this graph's ordering.
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Color {
        White,
        Gray,
        Black,
    }
    let mut color = vec![Color::White; modules.len()];
    let mut order = Vec::with_capacity(modules.len());
    let mut stack_path: Vec<usize> = Vec::new();

    fn visit(
        i: usize,
        deps: &[Vec<usize>],
        color: &mut [Color],
        order: &mut Vec<usize>,
        stack_path: &mut Vec<usize>,
        modules: &[ModuleUnit],
    ) -> Result<(), ModuleCheckError> {
        match color[i] {
            Color::Black => return Ok(()),
            Color::Gray => {
                let cycle: Vec<&str> = stack_path
                    .iter()
                    .skip_while(|&&s| s != i)
                    .map(|&s| modules[s].path.as_str())
                    .collect();
                let mut names = cycle.join(" -> ");
                names.push_str(" -> ");
                names.push_str(&modules[i].path);
                return Err(ModuleCheckError {
                    diagnostics: vec![Diagnostic::error(
                        codes::MODULE_CYCLE,
                        modules[i].path.clone(),
                        Span::dummy(),
                        format!("Circular module dependency: {names}"),
                    )],
                });
            }
            Color::White => {}
        }
        color[i] = Color::Gray;
        stack_path.push(i);
        for &dep in &deps[i] {
            visit(dep, deps, color, order, stack_path, modules)?;
        }
        stack_path.pop();
        color[i] = Color::Black;
        order.push(i);
        Ok(())
    }

    for i in 0..modules.len() {
        visit(i, &deps, &mut color, &mut order, &mut stack_path, modules)?;
    }
    Ok(order)
}

/// `check_modules(module_list) -> TypeMap`.
/// Checks every module in dependency-first order, aggregating each
/// module's `TypeMap` into one keyed by canonical path. A type error in one
/// module does not prevent the others from being checked; the whole call only fails once every module has
/// been attempted and at least one produced an error-level diagnostic, or
/// the graph itself could not be ordered (a cycle).
pub fn check_modules(
    atoms: &Interner,
    types: &TypeInterner,
    options: CheckerOptions,
    modules: &[ModuleUnit],
) -> Result<FxHashMap<String, TypeMap>, ModuleCheckError> {
    let order = execution_order(atoms, modules)?;

    let mut results = FxHashMap::default();
    let mut diagnostics = Vec::new();
    for idx in order {
        let module = &modules[idx];
        let mut state = CheckerState::new(
            module.arena,
            atoms,
            types,
            module.binder,
            options.clone(),
            module.path.clone(),
        );
        control_flow::check_program(&mut state, module.program);
        diagnostics.extend(state.diagnostics.iter().cloned());
        results.insert(module.path.clone(), state.type_map);
    }

    if diagnostics.iter().any(Diagnostic::is_error) {
        return Err(ModuleCheckError { diagnostics });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_specifier_resolves_against_importer_directory() {
        assert_eq!(resolve_specifier("src/a.ts", "./b"), "src/b.ts");
        assert_eq!(resolve_specifier("src/nested/a.ts", "../b"), "src/b.ts");
    }

    #[test]
    fn builtin_and_bare_specifiers_pass_through() {
        assert_eq!(resolve_specifier("src/a.ts", "builtin:fs"), "builtin:fs");
        assert_eq!(resolve_specifier("src/a.ts", "lodash"), "lodash");
    }

    fn program(arena: &mut NodeArena, stmts: Vec<NodeIndex>) -> NodeIndex {
        arena.alloc(Node::Program(stmts), Span::dummy())
    }

    fn import_stmt(arena: &mut NodeArena, atoms: &Interner, module: &str) -> NodeIndex {
        arena.alloc(
            Node::Import {
                default: None,
                namespace: None,
                named: Vec::new(),
                module: atoms.intern(module),
                type_only: false,
            },
            Span::dummy(),
        )
    }

    #[test]
    fn detects_a_direct_cycle() {
        let atoms = Interner::new();
        let mut arena_a = NodeArena::new();
        let import_b = import_stmt(&mut arena_a, &atoms, "./b");
        let program_a = program(&mut arena_a, vec![import_b]);
        let binder_a = tsz_binder::bind_program(&arena_a, &atoms, program_a, "a.ts");

        let mut arena_b = NodeArena::new();
        let import_a = import_stmt(&mut arena_b, &atoms, "./a");
        let program_b = program(&mut arena_b, vec![import_a]);
        let binder_b = tsz_binder::bind_program(&arena_b, &atoms, program_b, "b.ts");

        let modules = vec![
            ModuleUnit { path: "a.ts".into(), arena: &arena_a, binder: &binder_a, program: program_a },
            ModuleUnit { path: "b.ts".into(), arena: &arena_b, binder: &binder_b, program: program_b },
        ];
        let err = execution_order(&atoms, &modules).unwrap_err();
        assert!(err.diagnostics.iter().any(|d| d.code == codes::MODULE_CYCLE));
    }

    #[test]
    fn orders_dependencies_before_dependents() {
        let atoms = Interner::new();
        let mut arena_a = NodeArena::new();
        let program_a = program(&mut arena_a, vec![]);
        let binder_a = tsz_binder::bind_program(&arena_a, &atoms, program_a, "a.ts");

        let mut arena_b = NodeArena::new();
        let import_a = import_stmt(&mut arena_b, &atoms, "./a");
        let program_b = program(&mut arena_b, vec![import_a]);
        let binder_b = tsz_binder::bind_program(&arena_b, &atoms, program_b, "b.ts");

        let modules = vec![
            ModuleUnit { path: "b.ts".into(), arena: &arena_b, binder: &binder_b, program: program_b },
            ModuleUnit { path: "a.ts".into(), arena: &arena_a, binder: &binder_a, program: program_a },
        ];
        let order = execution_order(&atoms, &modules).unwrap();
        // "a.ts" (index 1) is `b.ts`'s dependency, so it must execute first.
        assert_eq!(order, vec![1, 0]);
    }
}
