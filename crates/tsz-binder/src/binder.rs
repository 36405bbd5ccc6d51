//! The binder: walks the AST once, creating the lexically nested scope
//! chain and declaring/resolving every name.
//!
//! Resolution results are recorded as side tables keyed by `NodeIndex`
//!: `node_scope`
//! remembers which `ScopeId` a scope-introducing node pushed, and
//! `references` remembers which `SymbolId` an `Identifier`/`This` read
//! resolved to, so the checker and lowering passes never re-walk scopes.

use rustc_hash::FxHashMap;
use tracing::debug;
use tsz_common::diagnostics::codes;
use tsz_common::{Atom, Diagnostic, Interner, Span};
use tsz_parser::{Node, NodeArena, NodeIndex, Param, PropertyKey, VarKind};

use crate::scope::{ScopeArena, ScopeId, ScopeKind};
use crate::symbol::{Symbol, SymbolFlags, SymbolId};

/// Language-feature flags the checker/lowering passes query without
/// re-walking the AST: a bitflags summary computed once during binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileFeatures(u8);

impl FileFeatures {
    pub const NONE: Self = Self(0);
    pub const GENERATORS: Self = Self(1 << 0);
    pub const ASYNC: Self = Self(1 << 1);
    pub const ASYNC_GENERATORS: Self = Self(1 << 2);

    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        (self.0 & flag.0) != 0
    }

    pub const fn set(&mut self, flag: Self) {
        self.0 |= flag.0;
    }
}

const KNOWN_GLOBALS: &[&str] = &[
    "console", "Promise", "Symbol", "Array", "Object", "Math", "JSON", "Error", "globalThis",
    "undefined", "NaN", "Infinity", "process", "Map", "Set", "WeakMap", "WeakSet", "Reflect",
    "Proxy", "RegExp", "Date", "Number", "String", "Boolean", "BigInt", "Function", "parseInt",
    "parseFloat", "isNaN", "isFinite", "setTimeout", "clearTimeout", "structuredClone",
];

pub struct BinderState {
    pub scopes: ScopeArena,
    pub symbols: Vec<Symbol>,
    pub global: ScopeId,
    pub diagnostics: Vec<Diagnostic>,
    pub features: FileFeatures,
    /// Which `ScopeId` a `Function`/`ArrowFunction`/`Block`/`Class`/
    /// `Namespace`/`TryCatch` node introduced.
    pub node_scope: FxHashMap<NodeIndex, ScopeId>,
    /// Which `SymbolId` an `Identifier`/`This`-bearing reference resolved to.
    pub references: FxHashMap<NodeIndex, SymbolId>,
    /// The scope a symbol was declared into. Lets a consumer ask "is this
    /// reference's symbol defined inside or outside the current function's
    /// scope subtree" without re-walking the scope chain — the question the
    /// closure planner's free-variable analysis asks for
    /// every identifier a nested function reads.
    pub symbol_scope: FxHashMap<SymbolId, ScopeId>,
    file: String,
}

impl BinderState {
    #[must_use]
    pub fn new(file: impl Into<String>) -> Self {
        let mut scopes = ScopeArena::new();
        let global = scopes.push(ScopeKind::Global, None);
        BinderState {
            scopes,
            symbols: Vec::new(),
            global,
            diagnostics: Vec::new(),
            features: FileFeatures::NONE,
            node_scope: FxHashMap::default(),
            references: FxHashMap::default(),
            symbol_scope: FxHashMap::default(),
            file: file.into(),
        }
    }

    fn declare_global_builtins(&mut self, interner: &Interner) {
        for name in KNOWN_GLOBALS {
            let atom = interner.intern(name);
            let sym = self.new_symbol(atom, SymbolFlags::VARIABLE);
            self.scopes.get_mut(self.global).declare_own(atom, sym);
            self.symbol_scope.insert(sym, self.global);
        }
    }

    fn new_symbol(&mut self, name: Atom, flags: SymbolFlags) -> SymbolId {
        let id = SymbolId(u32::try_from(self.symbols.len()).expect("symbol table overflow"));
        self.symbols.push(Symbol::new(name, flags));
        id
    }

    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    fn declare(
        &mut self,
        scope: ScopeId,
        name: Atom,
        flags: SymbolFlags,
        decl: NodeIndex,
        span: Span,
    ) -> SymbolId {
        if let Some(existing) = self.scopes.get(scope).get_own(name) {
            let sym = &mut self.symbols[existing.0 as usize];
            let mergeable = (sym.flags.contains(SymbolFlags::FUNCTION) && flags.contains(SymbolFlags::FUNCTION))
                || (sym.flags.contains(SymbolFlags::INTERFACE) && flags.contains(SymbolFlags::INTERFACE));
            if mergeable {
                sym.declarations.push(decl);
                return existing;
            }
            self.diagnostics.push(Diagnostic::error(
                codes::DUPLICATE_IDENTIFIER,
                self.file.clone(),
                span,
                "Duplicate identifier.",
            ));
            return existing;
        }
        let id = self.new_symbol(name, flags);
        self.symbols[id.0 as usize].declarations.push(decl);
        self.scopes.get_mut(scope).declare_own(name, id);
        self.symbol_scope.insert(id, scope);
        id
    }

    fn push_scope(&mut self, kind: ScopeKind, parent: ScopeId, node: NodeIndex) -> ScopeId {
        let id = self.scopes.push(kind, Some(parent));
        self.node_scope.insert(node, id);
        id
    }

    fn resolve_reference(&mut self, scope: ScopeId, name: Atom, node: NodeIndex, span: Span) {
        match self.scopes.resolve(scope, name) {
            Some(sym) => {
                self.references.insert(node, sym);
            }
            None => {
                self.diagnostics.push(Diagnostic::error(
                    codes::CANNOT_FIND_NAME,
                    self.file.clone(),
                    span,
                    "Cannot find name.",
                ));
            }
        }
    }
}

/// Bind an entire program, returning the populated `BinderState`.
pub fn bind_program(arena: &NodeArena, interner: &Interner, program: NodeIndex, file: impl Into<String>) -> BinderState {
    let mut state = BinderState::new(file);
    state.declare_global_builtins(interner);
    let module_scope = state.scopes.push(ScopeKind::Module, Some(state.global));
    state.node_scope.insert(program, module_scope);

    let Node::Program(stmts) = arena.get(program).clone() else {
        return state;
    };

    hoist_statements(&mut state, arena, &stmts, module_scope);
    for &stmt in &stmts {
        bind_statement(&mut state, arena, stmt, module_scope);
    }
    state
}

/// First pass: declare hoisted names (`var`, `function`, `class`, `interface`,
/// `enum`, `type`, `namespace`, `import`) before the second pass resolves
/// references, so forward references to hoisted declarations work.
fn hoist_statements(state: &mut BinderState, arena: &NodeArena, stmts: &[NodeIndex], scope: ScopeId) {
    for &stmt in stmts {
        hoist_statement(state, arena, stmt, scope);
    }
}

fn hoist_statement(state: &mut BinderState, arena: &NodeArena, stmt: NodeIndex, scope: ScopeId) {
    let span = arena.span(stmt);
    match arena.get(stmt).clone() {
        Node::VarDecl { kind, declarations } => {
            for (pattern, _, _) in declarations {
                declare_pattern(state, arena, pattern, kind, stmt, scope);
            }
        }
        Node::Function(sig) => {
            if let Some(name) = sig.name {
                state.declare(scope, name, SymbolFlags::FUNCTION, stmt, span);
            }
        }
        Node::Class { name: Some(name), .. } => {
            state.declare(scope, name, SymbolFlags::CLASS, stmt, span);
        }
        Node::Interface { name, .. } => {
            state.declare(scope, name, SymbolFlags::INTERFACE, stmt, span);
        }
        Node::Enum { name, .. } => {
            state.declare(scope, name, SymbolFlags::ENUM, stmt, span);
        }
        Node::TypeAlias { name, .. } => {
            state.declare(scope, name, SymbolFlags::TYPE_ALIAS, stmt, span);
        }
        Node::Namespace { name, .. } => {
            state.declare(scope, name, SymbolFlags::NAMESPACE, stmt, span);
        }
        Node::Import { default, namespace, named, .. } => {
            if let Some(name) = default {
                state.declare(scope, name, SymbolFlags::IMPORT, stmt, span);
            }
            if let Some(name) = namespace {
                state.declare(scope, name, SymbolFlags::IMPORT, stmt, span);
            }
            for (_, local) in named {
                state.declare(scope, local, SymbolFlags::IMPORT, stmt, span);
            }
        }
        _ => {}
    }
}

fn declare_pattern(
    state: &mut BinderState,
    arena: &NodeArena,
    pattern: NodeIndex,
    kind: VarKind,
    decl_node: NodeIndex,
    scope: ScopeId,
) {
    let flags = if kind == VarKind::Var {
        SymbolFlags::VARIABLE
    } else {
        SymbolFlags::VARIABLE | SymbolFlags::BLOCK_SCOPED
    };
    // `var` hoists to the nearest function/global scope; `let`/`const`
    // declare directly into the block scope they appear in.
    let target_scope = if kind == VarKind::Var {
        state.scopes.nearest_var_scope(scope)
    } else {
        scope
    };
    for_each_bound_name(arena, pattern, &mut |name, span| {
        state.declare(target_scope, name, flags, decl_node, span);
    });
}

fn for_each_bound_name(arena: &NodeArena, pattern: NodeIndex, f: &mut impl FnMut(Atom, Span)) {
    let span = arena.span(pattern);
    match arena.get(pattern) {
        Node::Identifier(name) => f(*name, span),
        Node::ArrayPattern { elements, rest } => {
            for el in elements.iter().flatten() {
                for_each_bound_name(arena, el.pattern, f);
            }
            if let Some(r) = rest {
                for_each_bound_name(arena, *r, f);
            }
        }
        Node::ObjectPattern { properties, rest } => {
            for prop in properties {
                for_each_bound_name(arena, prop.value, f);
            }
            if let Some(r) = rest {
                for_each_bound_name(arena, *r, f);
            }
        }
        _ => {}
    }
}

fn bind_statement(state: &mut BinderState, arena: &NodeArena, stmt: NodeIndex, scope: ScopeId) {
    let span = arena.span(stmt);
    match arena.get(stmt).clone() {
        Node::VarDecl { declarations, .. } => {
            for (_pattern, type_ann, init) in declarations {
                if let Some(t) = type_ann {
                    bind_type(state, arena, t, scope);
                }
                if let Some(init) = init {
                    bind_expr(state, arena, init, scope);
                }
            }
        }
        Node::ExprStmt(e) => bind_expr(state, arena, e, scope),
        Node::If { cond, then_branch, else_branch } => {
            bind_expr(state, arena, cond, scope);
            bind_statement(state, arena, then_branch, scope);
            if let Some(e) = else_branch {
                bind_statement(state, arena, e, scope);
            }
        }
        Node::While { cond, body } | Node::DoWhile { body, cond } => {
            bind_expr(state, arena, cond, scope);
            bind_statement(state, arena, body, scope);
        }
        Node::For { init, test, update, body } => {
            let for_scope = state.push_scope(ScopeKind::Block, scope, stmt);
            if let Some(i) = init {
                bind_statement(state, arena, i, for_scope);
            }
            if let Some(t) = test {
                bind_expr(state, arena, t, for_scope);
            }
            if let Some(u) = update {
                bind_expr(state, arena, u, for_scope);
            }
            bind_statement(state, arena, body, for_scope);
        }
        Node::ForOf { decl_kind, pattern, iterable, body, .. } => {
            bind_expr(state, arena, iterable, scope);
            let loop_scope = state.push_scope(ScopeKind::Block, scope, stmt);
            if let Some(kind) = decl_kind {
                declare_pattern(state, arena, pattern, kind, stmt, loop_scope);
            } else {
                bind_assignment_pattern(state, arena, pattern, loop_scope);
            }
            bind_statement(state, arena, body, loop_scope);
        }
        Node::ForIn { decl_kind, pattern, object, body } => {
            bind_expr(state, arena, object, scope);
            let loop_scope = state.push_scope(ScopeKind::Block, scope, stmt);
            if let Some(kind) = decl_kind {
                declare_pattern(state, arena, pattern, kind, stmt, loop_scope);
            } else {
                bind_assignment_pattern(state, arena, pattern, loop_scope);
            }
            bind_statement(state, arena, body, loop_scope);
        }
        Node::Block(stmts) => {
            let block_scope = state.push_scope(ScopeKind::Block, scope, stmt);
            hoist_statements(state, arena, &stmts, block_scope);
            for s in stmts {
                bind_statement(state, arena, s, block_scope);
            }
        }
        Node::Sequence(exprs) => {
            for e in exprs {
                bind_expr(state, arena, e, scope);
            }
        }
        Node::Return(e) => {
            if let Some(e) = e {
                bind_expr(state, arena, e, scope);
            }
        }
        Node::TryCatch { try_block, catch_param, catch_type_ann, catch_block, finally_block } => {
            bind_statement(state, arena, try_block, scope);
            if let Some(cb) = catch_block {
                let catch_scope = state.push_scope(ScopeKind::Block, scope, cb);
                if let Some(param) = catch_param {
                    for_each_bound_name(arena, param, &mut |name, sp| {
                        state.declare(catch_scope, name, SymbolFlags::CATCH_PARAMETER, param, sp);
                    });
                }
                if let Some(t) = catch_type_ann {
                    bind_type(state, arena, t, catch_scope);
                }
                bind_statement(state, arena, cb, catch_scope);
            }
            if let Some(f) = finally_block {
                bind_statement(state, arena, f, scope);
            }
        }
        Node::Throw(e) => bind_expr(state, arena, e, scope),
        Node::Switch { discriminant, cases } => {
            bind_expr(state, arena, discriminant, scope);
            let switch_scope = state.push_scope(ScopeKind::Block, scope, stmt);
            for case in cases {
                if let Some(test) = case.test {
                    bind_expr(state, arena, test, switch_scope);
                }
                for s in case.body {
                    bind_statement(state, arena, s, switch_scope);
                }
            }
        }
        Node::LabeledStatement { body, .. } => bind_statement(state, arena, body, scope),
        Node::Function(sig) => bind_function(state, arena, stmt, &sig, scope),
        Node::Class { .. } => bind_class(state, arena, stmt, scope),
        Node::Interface { type_params, extends, members, .. } => {
            let iface_scope = state.push_scope(ScopeKind::Block, scope, stmt);
            bind_type_params(state, arena, &type_params, iface_scope);
            for e in extends {
                bind_type(state, arena, e, iface_scope);
            }
            for m in members {
                if let Some(t) = m.type_node {
                    bind_type(state, arena, t, iface_scope);
                }
            }
        }
        Node::Enum { members, .. } => {
            for (_, init) in members {
                if let Some(init) = init {
                    bind_expr(state, arena, init, scope);
                }
            }
        }
        Node::TypeAlias { type_params, value, .. } => {
            let alias_scope = state.push_scope(ScopeKind::Block, scope, stmt);
            bind_type_params(state, arena, &type_params, alias_scope);
            bind_type(state, arena, value, alias_scope);
        }
        Node::Namespace { body, .. } => {
            let ns_scope = state.push_scope(ScopeKind::Module, scope, stmt);
            hoist_statements(state, arena, &body, ns_scope);
            for s in body {
                bind_statement(state, arena, s, ns_scope);
            }
        }
        Node::Export { decl, .. } => {
            if let Some(d) = decl {
                hoist_statement(state, arena, d, scope);
                bind_statement(state, arena, d, scope);
            }
        }
        Node::Import { .. } | Node::ImportAlias { .. } | Node::Empty | Node::Break(_) | Node::Continue(_) => {}
        _ => {
            let _ = span;
        }
    }
}

fn bind_type_params(state: &mut BinderState, arena: &NodeArena, params: &[tsz_parser::TypeParamDecl], scope: ScopeId) {
    for p in params {
        let id = state.new_symbol(p.name, SymbolFlags::TYPE_ALIAS);
        state.scopes.get_mut(scope).declare_own(p.name, id);
        if let Some(c) = p.constraint {
            bind_type(state, arena, c, scope);
        }
        if let Some(d) = p.default {
            bind_type(state, arena, d, scope);
        }
    }
}

fn bind_function(state: &mut BinderState, arena: &NodeArena, node: NodeIndex, sig: &tsz_parser::FunctionSig, scope: ScopeId) {
    if sig.modifiers.is_generator() && sig.modifiers.is_async() {
        state.features.set(FileFeatures::ASYNC_GENERATORS);
    } else if sig.modifiers.is_generator() {
        state.features.set(FileFeatures::GENERATORS);
    } else if sig.modifiers.is_async() {
        state.features.set(FileFeatures::ASYNC);
    }

    let fn_scope = state.push_scope(ScopeKind::Function, scope, node);
    bind_type_params(state, arena, &sig.type_params, fn_scope);
    bind_params(state, arena, &sig.params, fn_scope, node);
    if let Some(rt) = sig.return_type {
        bind_type(state, arena, rt, fn_scope);
    }
    if let Some(body) = sig.body {
        match arena.get(body).clone() {
            Node::Block(stmts) => {
                hoist_statements(state, arena, &stmts, fn_scope);
                for s in stmts {
                    bind_statement(state, arena, s, fn_scope);
                }
            }
            _ => bind_expr(state, arena, body, fn_scope),
        }
    }
}

fn bind_params(state: &mut BinderState, arena: &NodeArena, params: &[Param], scope: ScopeId, decl_node: NodeIndex) {
    for param in params {
        if let Some(t) = param.type_ann {
            bind_type(state, arena, t, scope);
        }
        if let Some(d) = param.default {
            bind_expr(state, arena, d, scope);
        }
        for_each_bound_name(arena, param.pattern, &mut |name, span| {
            state.declare(scope, name, SymbolFlags::PARAMETER, decl_node, span);
        });
    }
}

fn bind_class(state: &mut BinderState, arena: &NodeArena, node: NodeIndex, scope: ScopeId) {
    let Node::Class { type_params, super_class, super_type_args, implements, members, .. } = arena.get(node).clone() else {
        return;
    };
    let class_scope = state.push_scope(ScopeKind::Class, scope, node);
    bind_type_params(state, arena, &type_params, class_scope);
    if let Some(sup) = super_class {
        bind_expr(state, arena, sup, scope);
    }
    for t in super_type_args {
        bind_type(state, arena, t, class_scope);
    }
    for i in implements {
        bind_type(state, arena, i, class_scope);
    }
    for member in members {
        if let Some(t) = member.type_ann {
            bind_type(state, arena, t, class_scope);
        }
        if let Some(init) = member.initializer {
            bind_expr(state, arena, init, class_scope);
        }
        if let Some(sig) = member.sig {
            // Members have no `NodeIndex` of their own (`ClassMember` only
            // carries a `Span`), so method scopes aren't registered in
            // `node_scope` the way function/block scopes are; the checker
            // re-derives them by walking `members` alongside this binder.
            let method_scope = state.scopes.push(ScopeKind::Function, Some(class_scope));
            bind_type_params(state, arena, &sig.type_params, method_scope);
            bind_params(state, arena, &sig.params, method_scope, node);
            if let Some(rt) = sig.return_type {
                bind_type(state, arena, rt, method_scope);
            }
            if let Some(body) = sig.body {
                if let Node::Block(stmts) = arena.get(body).clone() {
                    hoist_statements(state, arena, &stmts, method_scope);
                    for s in stmts {
                        bind_statement(state, arena, s, method_scope);
                    }
                }
            }
        }
    }
}

/// Binds a pattern used as a destructuring-*assignment* target (`[a, b] =
/// pair`), as opposed to a declaration pattern: every bound identifier is
/// resolved against existing scope rather than declared fresh.
fn bind_assignment_pattern(state: &mut BinderState, arena: &NodeArena, pattern: NodeIndex, scope: ScopeId) {
    let span = arena.span(pattern);
    match arena.get(pattern).clone() {
        Node::Identifier(name) => state.resolve_reference(scope, name, pattern, span),
        Node::ArrayPattern { elements, rest } => {
            for el in elements.into_iter().flatten() {
                bind_assignment_pattern(state, arena, el.pattern, scope);
                if let Some(d) = el.default {
                    bind_expr(state, arena, d, scope);
                }
            }
            if let Some(r) = rest {
                bind_assignment_pattern(state, arena, r, scope);
            }
        }
        Node::ObjectPattern { properties, rest } => {
            for prop in properties {
                if let PropertyKey::Computed(c) = prop.key {
                    bind_expr(state, arena, c, scope);
                }
                bind_assignment_pattern(state, arena, prop.value, scope);
                if let Some(d) = prop.default {
                    bind_expr(state, arena, d, scope);
                }
            }
            if let Some(r) = rest {
                bind_assignment_pattern(state, arena, r, scope);
            }
        }
        _ => bind_expr(state, arena, pattern, scope),
    }
}

fn bind_expr(state: &mut BinderState, arena: &NodeArena, expr: NodeIndex, scope: ScopeId) {
    let span = arena.span(expr);
    match arena.get(expr).clone() {
        Node::Identifier(name) => state.resolve_reference(scope, name, expr, span),
        Node::Binary { left, right, .. } | Node::Logical { left, right, .. } | Node::NullishCoalescing { left, right } => {
            bind_expr(state, arena, left, scope);
            bind_expr(state, arena, right, scope);
        }
        Node::Unary { operand, .. }
        | Node::Grouping(operand)
        | Node::Spread(operand)
        | Node::Await(operand)
        | Node::NonNullAssertion(operand)
        | Node::PrefixIncrement { operand, .. }
        | Node::PostfixIncrement { operand, .. } => bind_expr(state, arena, operand, scope),
        Node::Call { callee, type_args, args, .. } | Node::New { callee, type_args, args } => {
            bind_expr(state, arena, callee, scope);
            for t in type_args {
                bind_type(state, arena, t, scope);
            }
            for a in args {
                bind_expr(state, arena, a.value, scope);
            }
        }
        Node::Get { object, .. } => bind_expr(state, arena, object, scope),
        Node::GetIndex { object, index, .. } => {
            bind_expr(state, arena, object, scope);
            bind_expr(state, arena, index, scope);
        }
        Node::Assign { target, value } => {
            bind_assignment_pattern(state, arena, target, scope);
            bind_expr(state, arena, value, scope);
        }
        Node::CompoundSet { target, value, .. } => {
            bind_expr(state, arena, target, scope);
            bind_expr(state, arena, value, scope);
        }
        Node::Ternary { cond, then_expr, else_expr } => {
            bind_expr(state, arena, cond, scope);
            bind_expr(state, arena, then_expr, scope);
            bind_expr(state, arena, else_expr, scope);
        }
        Node::TemplateLiteral { expressions, .. } => {
            for e in expressions {
                bind_expr(state, arena, e, scope);
            }
        }
        Node::TaggedTemplate { tag, quasi } => {
            bind_expr(state, arena, tag, scope);
            bind_expr(state, arena, quasi, scope);
        }
        Node::ArrayLiteral(elements) => {
            for el in elements {
                match el {
                    tsz_parser::ArrayElement::Item(e) | tsz_parser::ArrayElement::Spread(e) => {
                        bind_expr(state, arena, e, scope);
                    }
                    tsz_parser::ArrayElement::Hole => {}
                }
            }
        }
        Node::ObjectLiteral(props) => {
            for p in props {
                if let PropertyKey::Computed(c) = p.key {
                    bind_expr(state, arena, c, scope);
                }
                bind_expr(state, arena, p.value, scope);
            }
        }
        Node::ArrowFunction(sig) => bind_function(state, arena, expr, &sig, scope),
        Node::Yield { argument, .. } => {
            if let Some(a) = argument {
                bind_expr(state, arena, a, scope);
            }
        }
        Node::TypeAssertion { type_node, expr: inner } => {
            bind_type(state, arena, type_node, scope);
            bind_expr(state, arena, inner, scope);
        }
        Node::This | Node::Super | Node::NumberLit(_) | Node::BigIntLit(_) | Node::StringLit(_)
        | Node::BoolLit(_) | Node::NullLit | Node::UndefinedLit => {}
        Node::ArrayPattern { .. } | Node::ObjectPattern { .. } => {
            bind_assignment_pattern(state, arena, expr, scope);
        }
        _ => {
            let _ = span;
            debug!("bind_expr: unhandled node kind at {:?}", expr);
        }
    }
}

fn bind_type(state: &mut BinderState, arena: &NodeArena, type_node: NodeIndex, scope: ScopeId) {
    let Node::Type(t) = arena.get(type_node).clone() else {
        return;
    };
    use tsz_parser::TypeNode;
    match t {
        TypeNode::Reference { type_args, .. } => {
            for a in type_args {
                bind_type(state, arena, a, scope);
            }
        }
        TypeNode::QualifiedReference { type_args, .. } => {
            for a in type_args {
                bind_type(state, arena, a, scope);
            }
        }
        TypeNode::Array(t) | TypeNode::Keyof(t) | TypeNode::Parenthesized(t) | TypeNode::Rest(t) | TypeNode::Optional(t) => {
            bind_type(state, arena, t, scope);
        }
        TypeNode::Tuple { elements } => {
            for e in elements {
                bind_type(state, arena, e.type_node, scope);
            }
        }
        TypeNode::ObjectLiteral { members } => {
            for m in members {
                if let Some(t) = m.type_node {
                    bind_type(state, arena, t, scope);
                }
            }
        }
        TypeNode::Function { type_params, params, return_type } => {
            let fn_scope = state.scopes.push(ScopeKind::Function, Some(scope));
            bind_type_params(state, arena, &type_params, fn_scope);
            for p in &params {
                if let Some(t) = p.type_ann {
                    bind_type(state, arena, t, fn_scope);
                }
            }
            bind_type(state, arena, return_type, fn_scope);
        }
        TypeNode::Union(members) | TypeNode::Intersection(members) => {
            for m in members {
                bind_type(state, arena, m, scope);
            }
        }
        TypeNode::IndexedAccess { obj, index } => {
            bind_type(state, arena, obj, scope);
            bind_type(state, arena, index, scope);
        }
        TypeNode::Mapped { constraint, value, as_clause, .. } => {
            let mapped_scope = state.scopes.push(ScopeKind::Block, Some(scope));
            bind_type(state, arena, constraint, mapped_scope);
            bind_type(state, arena, value, mapped_scope);
            if let Some(a) = as_clause {
                bind_type(state, arena, a, mapped_scope);
            }
        }
        TypeNode::Conditional { check, extends, true_type, false_type } => {
            bind_type(state, arena, check, scope);
            bind_type(state, arena, extends, scope);
            bind_type(state, arena, true_type, scope);
            bind_type(state, arena, false_type, scope);
        }
        TypeNode::Predicate { asserted, .. } => bind_type(state, arena, asserted, scope),
        TypeNode::Literal(_) | TypeNode::Infer(_) | TypeNode::Typeof(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsz_parser::Parser;

    fn bind(src: &str) -> BinderState {
        let parser = Parser::new(src, "test.ts");
        let (program, arena, interner, parse_diags) = parser.parse_program();
        assert!(parse_diags.is_empty(), "parse errors: {parse_diags:?}");
        bind_program(&arena, &interner, program, "test.ts")
    }

    #[test]
    fn resolves_let_binding() {
        let state = bind("let x = 1; x + 1;");
        assert!(state.diagnostics.is_empty());
    }

    #[test]
    fn reports_cannot_find_name() {
        let state = bind("y;");
        assert_eq!(state.diagnostics.len(), 1);
        assert_eq!(state.diagnostics[0].code, codes::CANNOT_FIND_NAME);
    }

    #[test]
    fn reports_duplicate_identifier() {
        let state = bind("let x = 1; let x = 2;");
        assert_eq!(state.diagnostics.len(), 1);
        assert_eq!(state.diagnostics[0].code, codes::DUPLICATE_IDENTIFIER);
    }

    #[test]
    fn later_function_declaration_merges_instead_of_duplicating() {
        let state = bind("function f() {} function f() {}");
        assert!(state.diagnostics.is_empty());
    }

    #[test]
    fn var_hoists_past_block_scope() {
        let state = bind("if (true) { var x = 1; } x;");
        assert!(state.diagnostics.is_empty());
    }

    #[test]
    fn block_scoped_let_does_not_leak_out_of_block() {
        let state = bind("if (true) { let x = 1; } x;");
        assert_eq!(state.diagnostics.len(), 1);
        assert_eq!(state.diagnostics[0].code, codes::CANNOT_FIND_NAME);
    }

    #[test]
    fn destructuring_declaration_binds_every_name() {
        let state = bind("let { a, b: [c, d] } = obj; a + c + d;");
        // `obj` and `b` on the right-hand side's property key aren't
        // references, but the bare `obj` identifier is.
        assert_eq!(state.diagnostics.len(), 1);
        assert_eq!(state.diagnostics[0].code, codes::CANNOT_FIND_NAME);
    }

    #[test]
    fn known_globals_resolve_without_diagnostics() {
        let state = bind("console.log(Math.max(1, 2));");
        assert!(state.diagnostics.is_empty());
    }

    #[test]
    fn async_generator_function_sets_feature_flag() {
        let state = bind("async function* g() { yield 1; }");
        assert_eq!(state.features, FileFeatures::ASYNC_GENERATORS);
    }

    #[test]
    fn catch_parameter_is_scoped_to_catch_block() {
        let state = bind("try {} catch (e) { e; }");
        assert!(state.diagnostics.is_empty());
    }
}
