//! Closure / Display-Class Planner.
//!
//! Converts lexical capture into an explicit plan the emitter/interpreter
//! can act on without re-deriving scope information: for every function
//! node, which free variables it reads from an enclosing scope, which
//! outer environments it must hold a reference to, and — for the scope
//! that *defines* a captured variable — the display class synthesized to
//! hold it.
//!
//! The planner performs its own walk of the AST rather than reusing the
//! binder's statement/expression dispatch: it only needs to find
//! `Identifier`/`This` reads and function boundaries, and it needs to carry
//! a stack of enclosing function contexts that the binder itself never
//! materializes (the binder resolves each reference independently against
//! the scope chain and moves on).

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use tsz_binder::{BinderState, ScopeId, SymbolId};
use tsz_common::Atom;
use tsz_parser::{ArrayElement, FunctionSig, Node, NodeArena, NodeIndex, PropertyKey};

/// Identifies a synthesized display class. Stable only within one
/// `ClosurePlanner` run; not persisted across files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvId(pub u32);

/// Identifies a field within a display class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

/// The planner's output for a single function node.
#[derive(Debug, Clone, Default)]
pub struct ClosurePlan {
    /// Free variables this function (or one of its nested functions) reads
    /// from an enclosing scope.
    pub captures: BTreeSet<Atom>,
    /// Whether any nested arrow (or this function itself, if it is a plain
    /// function) reads the enclosing lexical `this`.
    pub captures_this: bool,
    /// The display class this function's *own* scope synthesizes to hold
    /// variables captured by its nested functions. `None` if nothing nested
    /// inside it captures anything it defines.
    pub environment_class: Option<EnvId>,
    /// Field layout of `environment_class`, by captured name.
    pub environment_fields: FxHashMap<Atom, FieldId>,
    /// Field `this` uses in `environment_class`, if `this` was promoted.
    pub environment_this_field: Option<FieldId>,
    /// The immediate enclosing function's environment, if it has one — this
    /// function threads a reference to it so its own nested functions (or
    /// itself) can reach captures defined there.
    pub parent_environment: Option<EnvId>,
    /// Every outer environment (not just the immediate parent's) this
    /// function's body actually reads from, in discovery order. The emitter
    /// stores a non-owning reference to each one at construction time.
    pub uses_outer_environments: Vec<EnvId>,
}

/// The full output of a closure-planning pass over one program: one
/// `ClosurePlan` per `Function`/`ArrowFunction` node, plus the synthetic
/// top-level plan.
#[derive(Debug, Clone, Default)]
pub struct ClosurePlanResult {
    pub functions: FxHashMap<NodeIndex, ClosurePlan>,
    pub top_level: ClosurePlan,
}

struct Frame {
    /// `None` for the synthetic top-level frame.
    node: Option<NodeIndex>,
    fn_scope: ScopeId,
    /// The nearest enclosing non-arrow function's `this`-owning scope, or
    /// `None` at top level (bare `this` there is not meaningfully captured).
    this_owner: Option<ScopeId>,
    captures: BTreeSet<Atom>,
    captures_this: bool,
    uses_outer: Vec<ScopeId>,
}

impl Frame {
    fn top_level(fn_scope: ScopeId) -> Self {
        Frame { node: None, fn_scope, this_owner: None, captures: BTreeSet::new(), captures_this: false, uses_outer: Vec::new() }
    }

    fn nested(node: NodeIndex, fn_scope: ScopeId, this_owner: Option<ScopeId>) -> Self {
        Frame { node: Some(node), fn_scope, this_owner, captures: BTreeSet::new(), captures_this: false, uses_outer: Vec::new() }
    }
}

pub struct ClosurePlanner<'a> {
    arena: &'a NodeArena,
    binder: &'a BinderState,
    stack: Vec<Frame>,
    /// Per owning scope, the set of variables (by name) captured from it by
    /// *some* descendant, in first-discovered order (`FxHashMap` doesn't
    /// preserve order, so field ids are assigned from a side counter).
    owner_fields: FxHashMap<ScopeId, FxHashMap<Atom, FieldId>>,
    owner_this_field: FxHashMap<ScopeId, FieldId>,
    next_field: FxHashMap<ScopeId, u32>,
    owner_env: FxHashMap<ScopeId, EnvId>,
    next_env: u32,
    /// Finished frames, keyed by the frame's own node (`None` -> top level).
    finished: FxHashMap<Option<NodeIndex>, (ScopeId, ClosurePlan)>,
}

impl<'a> ClosurePlanner<'a> {
    #[must_use]
    pub fn new(arena: &'a NodeArena, binder: &'a BinderState) -> Self {
        ClosurePlanner {
            arena,
            binder,
            stack: Vec::new(),
            owner_fields: FxHashMap::default(),
            owner_this_field: FxHashMap::default(),
            next_field: FxHashMap::default(),
            owner_env: FxHashMap::default(),
            next_env: 0,
            finished: FxHashMap::default(),
        }
    }

    fn field_for(&mut self, owner: ScopeId, name: Atom) -> FieldId {
        let counter = self.next_field.entry(owner).or_insert(0);
        let fields = self.owner_fields.entry(owner).or_default();
        *fields.entry(name).or_insert_with(|| {
            let id = FieldId(*counter);
            *counter += 1;
            id
        })
    }

    fn this_field_for(&mut self, owner: ScopeId) -> FieldId {
        let counter = self.next_field.entry(owner).or_insert(0);
        *self.owner_this_field.entry(owner).or_insert_with(|| {
            let id = FieldId(*counter);
            *counter += 1;
            id
        })
    }

    fn env_for(&mut self, owner: ScopeId) -> EnvId {
        let next = &mut self.next_env;
        *self.owner_env.entry(owner).or_insert_with(|| {
            let id = EnvId(*next);
            *next += 1;
            id
        })
    }

    /// Record that a symbol declared in `owner` was read from the current
    /// (innermost) frame. Marks every frame from the defining frame
    /// (exclusive) down to the innermost frame (inclusive) as capturing it.
    fn record_variable_capture(&mut self, owner: ScopeId, name: Atom) {
        let Some(owner_index) = self.stack.iter().position(|f| f.fn_scope == owner) else {
            return; // Resolved outside any tracked frame (shouldn't happen for non-global symbols).
        };
        if owner_index == self.stack.len() - 1 {
            return; // Declared in the innermost function itself: not a capture.
        }
        self.env_for(owner);
        self.field_for(owner, name);
        for frame in &mut self.stack[owner_index + 1..] {
            frame.captures.insert(name);
            if !frame.uses_outer.contains(&owner) {
                frame.uses_outer.push(owner);
            }
        }
    }

    fn record_this_capture(&mut self, owner: ScopeId) {
        let Some(owner_index) = self.stack.iter().position(|f| f.fn_scope == owner) else {
            return;
        };
        if owner_index == self.stack.len() - 1 {
            return;
        }
        self.env_for(owner);
        self.this_field_for(owner);
        for frame in &mut self.stack[owner_index + 1..] {
            frame.captures_this = true;
            if !frame.uses_outer.contains(&owner) {
                frame.uses_outer.push(owner);
            }
        }
    }

    fn visit_identifier(&mut self, node: NodeIndex) {
        let Some(&sym) = self.binder.references.get(&node) else {
            return; // unresolved reference; binder already reported it
        };
        let Some(&declared_scope) = self.binder.symbol_scope.get(&sym) else {
            return;
        };
        if declared_scope == self.binder.global {
            return; // ambient globals are always reachable, never captured
        }
        let owner = self.binder.scopes.nearest_var_scope(declared_scope);
        self.record_variable_capture(owner, self.binder.symbol(sym).name);
    }

    fn visit_this(&mut self) {
        let Some(owner) = self.stack.last().and_then(|f| f.this_owner) else {
            return;
        };
        self.record_this_capture(owner);
    }

    fn finish_top_frame(&mut self) {
        let frame = self.stack.pop().expect("finish_top_frame called with empty stack");
        let env = self.owner_env.get(&frame.fn_scope).copied();
        let fields = self.owner_fields.get(&frame.fn_scope).cloned().unwrap_or_default();
        let this_field = self.owner_this_field.get(&frame.fn_scope).copied();
        let parent_environment = self.stack.last().and_then(|parent| self.owner_env.get(&parent.fn_scope).copied());
        let uses_outer_environments =
            frame.uses_outer.iter().filter_map(|s| self.owner_env.get(s).copied()).collect();
        let plan = ClosurePlan {
            captures: frame.captures,
            captures_this: frame.captures_this,
            environment_class: env,
            environment_fields: fields,
            environment_this_field: this_field,
            parent_environment,
            uses_outer_environments,
        };
        self.finished.insert(frame.node, (frame.fn_scope, plan));
    }

    fn walk_function_sig(&mut self, node: NodeIndex, sig: &FunctionSig, is_arrow: bool) {
        let fn_scope = *self
            .binder
            .node_scope
            .get(&node)
            .unwrap_or_else(|| panic!("function node {node:?} missing from node_scope"));
        let this_owner = if is_arrow {
            self.stack.last().and_then(|f| f.this_owner)
        } else {
            Some(fn_scope)
        };
        self.stack.push(Frame::nested(node, fn_scope, this_owner));
        for param in &sig.params {
            if let Some(default) = param.default {
                self.walk_expr(default);
            }
        }
        if let Some(body) = sig.body {
            match self.arena.get(body) {
                Node::Block(_) => self.walk_statement(body),
                _ => self.walk_expr(body),
            }
        }
        self.finish_top_frame();
    }

    fn walk_statement(&mut self, stmt: NodeIndex) {
        match self.arena.get(stmt).clone() {
            Node::Program(stmts) | Node::Block(stmts) => {
                for s in stmts {
                    self.walk_statement(s);
                }
            }
            Node::VarDecl { declarations, .. } => {
                for (_, _, init) in declarations {
                    if let Some(init) = init {
                        self.walk_expr(init);
                    }
                }
            }
            Node::ExprStmt(e) | Node::Throw(e) => self.walk_expr(e),
            Node::If { cond, then_branch, else_branch } => {
                self.walk_expr(cond);
                self.walk_statement(then_branch);
                if let Some(e) = else_branch {
                    self.walk_statement(e);
                }
            }
            Node::While { cond, body } | Node::DoWhile { body, cond } => {
                self.walk_expr(cond);
                self.walk_statement(body);
            }
            Node::For { init, test, update, body } => {
                if let Some(i) = init {
                    self.walk_statement(i);
                }
                if let Some(t) = test {
                    self.walk_expr(t);
                }
                if let Some(u) = update {
                    self.walk_expr(u);
                }
                self.walk_statement(body);
            }
            Node::ForOf { pattern, iterable, body, .. } => {
                self.walk_expr(iterable);
                self.walk_assignment_pattern(pattern);
                self.walk_statement(body);
            }
            Node::ForIn { pattern, object, body, .. } => {
                self.walk_expr(object);
                self.walk_assignment_pattern(pattern);
                self.walk_statement(body);
            }
            Node::Return(e) => {
                if let Some(e) = e {
                    self.walk_expr(e);
                }
            }
            Node::TryCatch { try_block, catch_block, finally_block, .. } => {
                self.walk_statement(try_block);
                if let Some(c) = catch_block {
                    self.walk_statement(c);
                }
                if let Some(f) = finally_block {
                    self.walk_statement(f);
                }
            }
            Node::Switch { discriminant, cases } => {
                self.walk_expr(discriminant);
                for case in cases {
                    if let Some(t) = case.test {
                        self.walk_expr(t);
                    }
                    for s in case.body {
                        self.walk_statement(s);
                    }
                }
            }
            Node::LabeledStatement { body, .. } => self.walk_statement(body),
            Node::Function(sig) => self.walk_function_sig(stmt, &sig, false),
            Node::Class { members, super_class, .. } => {
                if let Some(sup) = super_class {
                    self.walk_expr(sup);
                }
                for member in members {
                    if let Some(init) = member.initializer {
                        self.walk_expr(init);
                    }
                    if let Some(sig) = member.sig {
                        if let Some(body) = sig.body {
                            // Class methods don't introduce their own
                            // `node_scope`/frame.
                            self.walk_statement(body);
                        }
                    }
                }
            }
            Node::Enum { members, .. } => {
                for (_, init) in members {
                    if let Some(init) = init {
                        self.walk_expr(init);
                    }
                }
            }
            Node::Namespace { body, .. } => {
                for s in body {
                    self.walk_statement(s);
                }
            }
            Node::Export { decl, .. } => {
                if let Some(d) = decl {
                    self.walk_statement(d);
                }
            }
            _ => {}
        }
    }

    fn walk_assignment_pattern(&mut self, pattern: NodeIndex) {
        match self.arena.get(pattern).clone() {
            Node::Identifier(_) => self.walk_expr(pattern),
            Node::ArrayPattern { elements, rest } => {
                for el in elements.into_iter().flatten() {
                    self.walk_assignment_pattern(el.pattern);
                    if let Some(d) = el.default {
                        self.walk_expr(d);
                    }
                }
                if let Some(r) = rest {
                    self.walk_assignment_pattern(r);
                }
            }
            Node::ObjectPattern { properties, rest } => {
                for prop in properties {
                    if let PropertyKey::Computed(c) = prop.key {
                        self.walk_expr(c);
                    }
                    self.walk_assignment_pattern(prop.value);
                    if let Some(d) = prop.default {
                        self.walk_expr(d);
                    }
                }
                if let Some(r) = rest {
                    self.walk_assignment_pattern(r);
                }
            }
            _ => self.walk_expr(pattern),
        }
    }

    fn walk_expr(&mut self, expr: NodeIndex) {
        match self.arena.get(expr).clone() {
            Node::Identifier(_) => self.visit_identifier(expr),
            Node::This => self.visit_this(),
            Node::Binary { left, right, .. } | Node::Logical { left, right, .. } | Node::NullishCoalescing { left, right } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Node::Unary { operand, .. }
            | Node::Grouping(operand)
            | Node::Spread(operand)
            | Node::Await(operand)
            | Node::NonNullAssertion(operand)
            | Node::PrefixIncrement { operand, .. }
            | Node::PostfixIncrement { operand, .. } => self.walk_expr(operand),
            Node::Call { callee, args, .. } | Node::New { callee, args, .. } => {
                self.walk_expr(callee);
                for a in args {
                    self.walk_expr(a.value);
                }
            }
            Node::Get { object, .. } => self.walk_expr(object),
            Node::GetIndex { object, index, .. } => {
                self.walk_expr(object);
                self.walk_expr(index);
            }
            Node::Assign { target, value } => {
                self.walk_assignment_pattern(target);
                self.walk_expr(value);
            }
            Node::CompoundSet { target, value, .. } => {
                self.walk_expr(target);
                self.walk_expr(value);
            }
            Node::Ternary { cond, then_expr, else_expr } => {
                self.walk_expr(cond);
                self.walk_expr(then_expr);
                self.walk_expr(else_expr);
            }
            Node::TemplateLiteral { expressions, .. } => {
                for e in expressions {
                    self.walk_expr(e);
                }
            }
            Node::TaggedTemplate { tag, quasi } => {
                self.walk_expr(tag);
                self.walk_expr(quasi);
            }
            Node::ArrayLiteral(elements) => {
                for el in elements {
                    match el {
                        ArrayElement::Item(e) | ArrayElement::Spread(e) => self.walk_expr(e),
                        ArrayElement::Hole => {}
                    }
                }
            }
            Node::ObjectLiteral(props) => {
                for p in props {
                    if let PropertyKey::Computed(c) = p.key {
                        self.walk_expr(c);
                    }
                    self.walk_expr(p.value);
                }
            }
            Node::ArrowFunction(sig) => self.walk_function_sig(expr, &sig, true),
            Node::Yield { argument, .. } => {
                if let Some(a) = argument {
                    self.walk_expr(a);
                }
            }
            Node::TypeAssertion { expr: inner, .. } => self.walk_expr(inner),
            Node::ArrayPattern { .. } | Node::ObjectPattern { .. } => self.walk_assignment_pattern(expr),
            _ => {}
        }
    }
}

/// Run the closure planner over an entire program, producing one plan per
/// `Function`/`ArrowFunction` node and the synthetic top-level plan.
#[must_use]
pub fn plan_closures(arena: &NodeArena, binder: &BinderState, program: NodeIndex) -> ClosurePlanResult {
    let module_scope = *binder.node_scope.get(&program).unwrap_or(&binder.global);
    let mut planner = ClosurePlanner::new(arena, binder);
    planner.stack.push(Frame::top_level(module_scope));
    planner.walk_statement(program);
    planner.finish_top_frame();

    let mut result = ClosurePlanResult::default();
    for (node, (_, plan)) in planner.finished {
        match node {
            Some(n) => {
                result.functions.insert(n, plan);
            }
            None => result.top_level = plan,
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsz_binder::bind_program;
    use tsz_parser::Parser;

    fn plan(src: &str) -> (ClosurePlanResult, NodeArena, NodeIndex) {
        let parser = Parser::new(src, "test.ts");
        let (program, arena, interner, parse_diags) = parser.parse_program();
        assert!(parse_diags.is_empty(), "parse errors: {parse_diags:?}");
        let binder = bind_program(&arena, &interner, program, "test.ts");
        assert!(binder.diagnostics.is_empty(), "bind errors: {:?}", binder.diagnostics);
        let result = plan_closures(&arena, &binder, program);
        (result, arena, program)
    }

    #[test]
    fn function_with_no_nested_closures_has_no_environment() {
        let (result, _, _) = plan("function f(x: number) { return x + 1; }");
        assert!(result.functions.values().all(|p| p.environment_class.is_none()));
        assert!(result.top_level.environment_class.is_none());
    }

    #[test]
    fn nested_arrow_capturing_outer_local_gets_an_environment() {
        let src = "function mk() { let c = 0; return () => ++c; }";
        let (result, arena, _) = plan(src);
        // `mk`'s own plan should have synthesized an environment (its local `c` is captured).
        let mk_plan = result
            .functions
            .values()
            .find(|p| p.environment_class.is_some())
            .expect("mk should own an environment");
        assert_eq!(mk_plan.environment_fields.len(), 1);

        // The nested arrow should list `c` in its captures and reference mk's environment.
        let arrow_plan = result
            .functions
            .iter()
            .find(|(n, _)| matches!(arena.get(**n), Node::ArrowFunction(_)))
            .map(|(_, p)| p)
            .expect("arrow plan present");
        assert_eq!(arrow_plan.captures.len(), 1);
        assert!(!arrow_plan.uses_outer_environments.is_empty());
    }

    #[test]
    fn arrow_captures_enclosing_this() {
        let src = "class C { m() { return () => this; } }";
        let (result, arena, _) = plan(src);
        let arrow_plan = result
            .functions
            .iter()
            .find(|(n, _)| matches!(arena.get(**n), Node::ArrowFunction(_)))
            .map(|(_, p)| p)
            .expect("arrow plan present");
        assert!(arrow_plan.captures_this);
    }

    #[test]
    fn top_level_captures_are_grouped_under_the_synthetic_top_level_plan() {
        let src = "let n = 0; function bump() { n++; }";
        let (result, _, _) = plan(src);
        assert!(result.top_level.environment_class.is_some());
        assert_eq!(result.top_level.environment_fields.len(), 1);
    }
}
