//! Statement-level type checking and the Narrowing Engine's join-point
//! merges. Per-expression narrowing
//! combinators live in `expr::narrow_condition`; this module is where the
//! results of `if`/`while`/`for`/`switch` branches get folded back into a
//! single `state.narrowing` as control flow rejoins.

use rustc_hash::FxHashMap;

use tsz_common::{diagnostics::codes, Atom};
use tsz_parser::{Node, NodeIndex, ObjectPatternProperty, PatternElement, VarKind};
use tsz_solver::{widen_type, TypeData, TypeId};

use crate::context::CheckerState;
use crate::declarations::resolve_type_node;
use crate::expr::{check_expr, narrow_condition};

/// `check(ast) -> TypeMap` entry point: walks every top-level
/// statement in source order. Forward references between sibling top-level
/// declarations (a function calling another declared later in the same
/// file) resolve against whatever has been registered in `symbol_types` so
/// far and degrade to `any` rather than running a fixpoint pass — see
/// DESIGN.md's Open Question on hoisting order.
pub fn check_program(state: &mut CheckerState, program: NodeIndex) {
    let Node::Program(stmts) = state.arena.get(program).clone() else {
        return;
    };
    check_stmt_list(state, &stmts);
}

/// Type-checks a block's statements in order and reports whether the block
/// always diverges (every reachable path out of it ends in a `return`,
/// `throw`, `break`, or `continue`) — the signal `check_if`'s join-point
/// merge needs to know which branch's narrowings actually reach the code
/// after the `if`.
pub fn check_block(state: &mut CheckerState, block: NodeIndex) -> bool {
    let Node::Block(stmts) = state.arena.get(block).clone() else {
        return false;
    };
    check_stmt_list(state, &stmts)
}

/// Checks each statement in order (so unreachable code after an early
/// divergence still gets type-checked, matching a compiler that merely
/// warns on unreachable code rather than refusing to check it) and returns
/// whether any of them diverges.
fn check_stmt_list(state: &mut CheckerState, stmts: &[NodeIndex]) -> bool {
    let mut terminates = false;
    for &stmt in stmts {
        if check_stmt(state, stmt) {
            terminates = true;
        }
    }
    terminates
}

fn empty_type_scope() -> FxHashMap<Atom, TypeId> {
    FxHashMap::default()
}

/// Type-checks one statement and reports whether it always diverges
/// (`return`/`throw`/`break`/`continue` on every path through it).
pub fn check_stmt(state: &mut CheckerState, node: NodeIndex) -> bool {
    match state.arena.get(node).clone() {
        Node::VarDecl { kind, declarations } => {
            check_var_decl(state, kind, &declarations);
            false
        }
        Node::ExprStmt(e) => {
            check_expr(state, e);
            false
        }
        Node::If { cond, then_branch, else_branch } => check_if(state, cond, then_branch, else_branch),
        Node::While { cond, body } => {
            check_while(state, cond, body);
            false
        }
        Node::DoWhile { body, cond } => {
            check_stmt(state, body);
            check_expr(state, cond);
            false
        }
        Node::For { init, test, update, body } => {
            check_for(state, init, test, update, body);
            false
        }
        Node::ForOf { is_await, decl_kind, pattern, iterable, body } => {
            check_for_of(state, node, is_await, decl_kind, pattern, iterable, body);
            false
        }
        Node::ForIn { decl_kind, pattern, object, body } => {
            check_for_in(state, decl_kind, pattern, object, body);
            false
        }
        Node::Block(stmts) => check_stmt_list(state, &stmts),
        Node::Sequence(items) => {
            for item in items {
                check_expr(state, item);
            }
            false
        }
        Node::Return(value) => {
            let ty = value.map(|v| check_expr(state, v)).unwrap_or(TypeId::VOID);
            if let Some(frame) = state.functions.last_mut() {
                frame.returned_types.push(ty);
            }
            true
        }
        Node::Break(_) | Node::Continue(_) => true,
        Node::Empty => false,
        Node::TryCatch { try_block, catch_param, catch_type_ann, catch_block, finally_block } => {
            check_try_catch(state, try_block, catch_param, catch_type_ann, catch_block, finally_block);
            false
        }
        Node::Throw(e) => {
            check_expr(state, e);
            true
        }
        Node::Switch { discriminant, cases } => {
            check_switch(state, discriminant, &cases);
            false
        }
        Node::LabeledStatement { body, .. } => check_stmt(state, body),
        Node::Function(sig) => {
            let ty = crate::declarations::check_function_sig(state, node, &sig);
            bind_named_declaration(state, node, ty);
            false
        }
        Node::Class { .. } => {
            crate::declarations::check_class(state, node);
            false
        }
        Node::Interface { .. } => {
            crate::declarations::check_interface(state, node);
            false
        }
        Node::Enum { .. } => {
            crate::declarations::check_enum(state, node);
            false
        }
        Node::TypeAlias { .. } => {
            crate::declarations::check_type_alias(state, node);
            false
        }
        Node::Namespace { body, .. } => {
            for s in body {
                check_stmt(state, s);
            }
            false
        }
        Node::Import { .. } | Node::Export { .. } | Node::ImportAlias { .. } => {
            // Module linking and re-export resolution are out of scope
            //.
            false
        }
        _ => {
            // A bare expression reached in statement position (shouldn't
            // happen from a well-formed parse); type-check it anyway rather
            // than silently dropping it.
            check_expr(state, node);
            false
        }
    }
}

fn bind_named_declaration(state: &mut CheckerState, node: NodeIndex, ty: TypeId) {
    if let Some(sym) = state.binder.references.get(&node).copied() {
        state.symbol_types.insert(sym, ty);
    }
}

fn check_var_decl(
    state: &mut CheckerState,
    kind: VarKind,
    declarations: &[(NodeIndex, Option<NodeIndex>, Option<NodeIndex>)],
) {
    let scope = empty_type_scope();
    for &(pattern, type_ann, init) in declarations {
        let declared_ty = type_ann.map(|t| resolve_type_node(state, &scope, t));
        let init_ty = init.map(|i| check_expr(state, i));

        if let (Some(declared), Some(actual)) = (declared_ty, init_ty) {
            if !tsz_solver::compatible(state.types, declared, actual) {
                state.not_assignable(state.arena.span(init.unwrap()), declared, actual);
            }
        }

        let final_ty = match (declared_ty, init_ty) {
            (Some(declared), _) => declared,
            (None, Some(actual)) => {
                // Literal widening: `let`/`var` without an
                // annotation widens; `const` keeps the literal type.
                if kind == VarKind::Const {
                    actual
                } else {
                    widen_type(state.types, actual)
                }
            }
            (None, None) => TypeId::ANY,
        };
        bind_pattern(state, pattern, final_ty);
    }
}

fn bind_pattern(state: &mut CheckerState, pattern: NodeIndex, ty: TypeId) {
    match state.arena.get(pattern).clone() {
        Node::Identifier(_) => {
            bind_named_declaration(state, pattern, ty);
            state.record_type(pattern, ty);
        }
        Node::ArrayPattern { elements, rest } => {
            let elem_ty = match state.types.lookup(ty) {
                Some(TypeData::Array(e)) => e,
                Some(TypeData::Tuple(list)) => {
                    let elems = state.types.tuple_list(list);
                    let members: Vec<TypeId> = elems.into_iter().map(|e| e.type_id).collect();
                    state.types.union(members)
                }
                _ => TypeId::ANY,
            };
            bind_array_pattern_elements(state, &elements, elem_ty);
            if let Some(rest_pattern) = rest {
                let rest_array = state.types.array(elem_ty);
                bind_pattern(state, rest_pattern, rest_array);
            }
        }
        Node::ObjectPattern { properties, rest } => {
            bind_object_pattern_properties(state, &properties, ty);
            if let Some(rest_pattern) = rest {
                bind_pattern(state, rest_pattern, state.types.object(vec![]));
            }
        }
        _ => {}
    }
}

fn bind_array_pattern_elements(state: &mut CheckerState, elements: &[Option<PatternElement>], elem_ty: TypeId) {
    for element in elements.iter().flatten() {
        let ty = element
            .default
            .map(|d| check_expr(state, d))
            .map(|default_ty| state.types.union2(elem_ty, default_ty))
            .unwrap_or(elem_ty);
        bind_pattern(state, element.pattern, ty);
    }
}

fn bind_object_pattern_properties(state: &mut CheckerState, properties: &[ObjectPatternProperty], source_ty: TypeId) {
    for prop in properties {
        let name = match &prop.key {
            tsz_parser::PropertyKey::Ident(a) | tsz_parser::PropertyKey::StringLit(a) => Some(*a),
            _ => None,
        };
        let prop_ty = name.map(|n| crate::expr_member_type_for_pattern(state, source_ty, n)).unwrap_or(TypeId::ANY);
        let ty = prop
            .default
            .map(|d| check_expr(state, d))
            .map(|default_ty| state.types.union2(prop_ty, default_ty))
            .unwrap_or(prop_ty);
        bind_pattern(state, prop.value, ty);
    }
}

/// `if (cond) then_branch [else else_branch]`. When one branch always
/// diverges (`return`/`throw`/`break`/`continue`), only the other branch's
/// context can actually reach the code after the `if` — merging both would
/// union back in narrowings from a path that never falls through, e.g.
/// `if (x === null) return; x.length` would otherwise leave `x` as
/// `string | null` instead of `string` after the early return.
fn check_if(state: &mut CheckerState, cond: NodeIndex, then_branch: NodeIndex, else_branch: Option<NodeIndex>) -> bool {
    check_expr(state, cond);
    let (pos, neg) = narrow_condition(state, cond);

    state.narrowing = pos;
    let then_terminates = check_stmt(state, then_branch);
    let after_then = state.narrowing.clone();

    let (after_else, else_terminates) = if let Some(else_branch) = else_branch {
        state.narrowing = neg;
        let terminates = check_stmt(state, else_branch);
        (state.narrowing.clone(), terminates)
    } else {
        (neg, false)
    };

    state.narrowing = match (then_terminates, else_terminates) {
        (true, false) => after_else,
        (false, true) => after_then,
        (true, true) => after_then.merge(&after_else, state.types),
        (false, false) => after_then.merge(&after_else, state.types),
    };
    then_terminates && else_terminates
}

fn check_while(state: &mut CheckerState, cond: NodeIndex, body: NodeIndex) {
    check_expr(state, cond);
    let saved = state.narrowing.clone();
    let (pos, neg) = narrow_condition(state, cond);
    state.narrowing = pos;
    check_stmt(state, body);
    state.narrowing = neg.merge(&saved, state.types);
}

fn check_for(
    state: &mut CheckerState,
    init: Option<NodeIndex>,
    test: Option<NodeIndex>,
    update: Option<NodeIndex>,
    body: NodeIndex,
) {
    let saved = state.narrowing.clone();
    if let Some(init) = init {
        check_stmt(state, init);
    }
    if let Some(test) = test {
        check_expr(state, test);
    }
    check_stmt(state, body);
    if let Some(update) = update {
        check_expr(state, update);
    }
    state.narrowing = saved;
}

fn check_for_of(
    state: &mut CheckerState,
    node: NodeIndex,
    is_await: bool,
    decl_kind: Option<VarKind>,
    pattern: NodeIndex,
    iterable: NodeIndex,
    body: NodeIndex,
) {
    let iterable_ty = check_expr(state, iterable);
    if is_await {
        let is_async_fn = state.functions.last().map(|f| f.is_async).unwrap_or(false);
        if !is_async_fn {
            state.error(
                codes::FOR_OF_ASYNC_ITERABLE_IN_SYNC_FUNCTION,
                state.arena.span(node),
                "'for await' loops are only allowed within async functions.",
            );
        }
    }
    let element_ty = iteration_element_type(state, iterable_ty, is_await);
    let _ = decl_kind;
    bind_pattern(state, pattern, element_ty);
    check_stmt(state, body);
}

/// Element type an iteration protocol yields: `Array<T>`/`T[]` and `Generator<T>`/`AsyncGenerator<T>` unwrap
/// directly; anything else falls back to `any` rather than modeling the
/// full `Symbol.iterator`/`Symbol.asyncIterator` protocol structurally.
fn iteration_element_type(state: &mut CheckerState, iterable_ty: TypeId, is_await: bool) -> TypeId {
    match state.types.lookup(iterable_ty) {
        Some(TypeData::Array(elem)) => elem,
        Some(TypeData::Tuple(list)) => {
            let elems = state.types.tuple_list(list);
            let members: Vec<TypeId> = elems.into_iter().map(|e| e.type_id).collect();
            state.types.union(members)
        }
        Some(TypeData::Generator(elem)) => elem,
        Some(TypeData::AsyncGenerator(elem)) => {
            if is_await {
                elem
            } else {
                state.types.promise(elem)
            }
        }
        _ => TypeId::ANY,
    }
}

fn check_for_in(
    state: &mut CheckerState,
    decl_kind: Option<VarKind>,
    pattern: NodeIndex,
    object: NodeIndex,
    body: NodeIndex,
) {
    check_expr(state, object);
    let _ = decl_kind;
    bind_pattern(state, pattern, TypeId::STRING);
    check_stmt(state, body);
}

fn check_try_catch(
    state: &mut CheckerState,
    try_block: NodeIndex,
    catch_param: Option<NodeIndex>,
    catch_type_ann: Option<NodeIndex>,
    catch_block: Option<NodeIndex>,
    finally_block: Option<NodeIndex>,
) {
    check_stmt(state, try_block);
    if let Some(catch_block) = catch_block {
        if let Some(param) = catch_param {
            let scope = empty_type_scope();
            let ty = catch_type_ann.map(|t| resolve_type_node(state, &scope, t)).unwrap_or_else(|| {
                if state.options.use_unknown_in_catch_variables {
                    TypeId::UNKNOWN
                } else {
                    TypeId::ANY
                }
            });
            bind_pattern(state, param, ty);
        }
        check_stmt(state, catch_block);
    }
    if let Some(finally_block) = finally_block {
        check_stmt(state, finally_block);
    }
}

fn check_switch(state: &mut CheckerState, discriminant: NodeIndex, cases: &[tsz_parser::SwitchCase]) {
    check_expr(state, discriminant);
    let saved = state.narrowing.clone();
    for case in cases {
        state.narrowing = saved.clone();
        if let Some(test) = case.test {
            check_expr(state, test);
        }
        for &stmt in &case.body {
            check_stmt(state, stmt);
        }
    }
    state.narrowing = saved;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsz_common::CheckerOptions;
    use tsz_parser::{NodeArena, Parser};
    use tsz_solver::TypeInterner;

    /// Walks down through the handful of statement/expression shapes this
    /// test's source can take to find the `object` of a `foo.length`
    /// property access.
    fn find_length_access_object(arena: &NodeArena, atoms: &tsz_common::Interner, node: NodeIndex) -> Option<NodeIndex> {
        match arena.get(node).clone() {
            Node::Program(stmts) | Node::Block(stmts) => stmts.into_iter().find_map(|s| find_length_access_object(arena, atoms, s)),
            Node::Function(sig) => sig.body.and_then(|b| find_length_access_object(arena, atoms, b)),
            Node::If { then_branch, else_branch, .. } => find_length_access_object(arena, atoms, then_branch)
                .or_else(|| else_branch.and_then(|e| find_length_access_object(arena, atoms, e))),
            Node::Return(Some(expr)) => find_length_access_object(arena, atoms, expr),
            Node::Get { object, name, .. } if atoms.resolve(name) == "length" => Some(object),
            _ => None,
        }
    }

    fn check_source(src: &str) -> (NodeArena, tsz_common::Interner, NodeIndex, crate::TypeMap) {
        let parser = Parser::new(src, "test.ts".to_string());
        let (program, arena, atoms, parse_diagnostics) = parser.parse_program();
        assert!(parse_diagnostics.iter().all(|d| !d.is_error()), "unexpected parse errors: {parse_diagnostics:?}");

        let binder = tsz_binder::bind_program(&arena, &atoms, program, "test.ts");
        let types = TypeInterner::new();
        let type_map = crate::check(&arena, &atoms, &types, &binder, program, CheckerOptions::default(), "test.ts")
            .unwrap_or_else(|e| panic!("unexpected type errors: {e}"));
        (arena, atoms, program, type_map)
    }

    #[test]
    fn terminating_then_branch_narrows_the_else_context_past_the_if() {
        let src = "function f(x: string | null): number { if (x === null) { return 0; } return x.length; }";
        let (arena, atoms, program, type_map) = check_source(src);

        let object = find_length_access_object(&arena, &atoms, program).expect("x.length access not found");
        assert_eq!(type_map.get(&object).copied(), Some(TypeId::STRING));
    }

    #[test]
    fn non_terminating_branches_still_merge_both_sides() {
        let src = "function f(x: string | null): number { if (x === null) { x; } return x.length; }";
        let (arena, atoms, program, type_map) = check_source(src);

        let object = find_length_access_object(&arena, &atoms, program).expect("x.length access not found");
        // Neither branch diverges, so the join point still unions the
        // `then` branch's `null` narrowing back in with the fall-through
        // `string` narrowing — `x` stays `string | null` here, unlike the
        // terminating-branch case above where it narrows down to `string`.
        assert_ne!(type_map.get(&object).copied(), Some(TypeId::STRING));
    }
}
