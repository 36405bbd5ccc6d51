//! Suspension Analyzer: for each `async`/generator/async
//! generator function body, enumerate `await`/`yield`/`yield*` suspension
//! points, the locals that must be hoisted to survive them, and the
//! enclosing try/catch/finally regions each point needs to re-enter on
//! resume.
//!
//! **Liveness approximation.** Real liveness (a local is live at a point
//! only if some path from that point reads it before the next write) needs
//! a dataflow pass. This analyzer uses the same simplification TypeScript's
//! own ES5 downlevel generator transform uses: hoist *every* local declared
//! in the function body unconditionally (locals stop being block-scoped
//! the moment the function becomes a flat dispatch-table state machine
//! anyway), and report a point's `live_locals` as every hoisted local
//! declared lexically before it. This over-approximates liveness — it
//! never misses a local that must survive a suspension — at the cost of
//! keeping a few locals alive in the state record longer than strictly
//! necessary.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use tsz_common::Atom;
use tsz_parser::{ArrayElement, FunctionSig, Node, NodeArena, NodeIndex, PropertyKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspensionKind {
    Await,
    Yield,
    YieldStar,
}

#[derive(Debug, Clone)]
pub struct SuspensionPoint {
    pub node: NodeIndex,
    /// Resume-state index; suspension points are numbered in program order
    /// starting at 0.
    pub id: u32,
    pub kind: SuspensionKind,
    pub live_locals: BTreeSet<Atom>,
    pub try_region_id: Option<u32>,
    pub try_depth: u32,
}

#[derive(Debug, Clone)]
pub struct TryRegion {
    pub id: u32,
    pub parent_id: Option<u32>,
    pub has_suspension_in_try: bool,
    pub has_suspension_in_catch: bool,
    pub has_suspension_in_finally: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SuspensionPlan {
    pub suspension_points: Vec<SuspensionPoint>,
    pub hoisted_locals: BTreeSet<Atom>,
    pub hoisted_parameters: BTreeSet<Atom>,
    /// For-of enumerators that cross a suspension point and must be hoisted
    /// alongside locals.
    pub hoisted_for_of_iterables: BTreeSet<NodeIndex>,
    pub try_regions: Vec<TryRegion>,
}

impl SuspensionPlan {
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.suspension_points.len() + 1
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RegionSection {
    Try,
    Catch,
    Finally,
}

struct Analyzer<'a> {
    arena: &'a NodeArena,
    hoisted_locals: BTreeSet<Atom>,
    hoisted_for_of: BTreeSet<NodeIndex>,
    declared_so_far: BTreeSet<Atom>,
    points: Vec<SuspensionPoint>,
    regions: Vec<TryRegion>,
    region_stack: Vec<(u32, RegionSection)>,
    next_region: u32,
}

impl<'a> Analyzer<'a> {
    fn new(arena: &'a NodeArena) -> Self {
        Analyzer {
            arena,
            hoisted_locals: BTreeSet::new(),
            hoisted_for_of: BTreeSet::new(),
            declared_so_far: BTreeSet::new(),
            points: Vec::new(),
            regions: Vec::new(),
            region_stack: Vec::new(),
            next_region: 0,
        }
    }

    fn declare(&mut self, name: Atom) {
        self.hoisted_locals.insert(name);
        self.declared_so_far.insert(name);
    }

    fn declare_pattern(&mut self, pattern: NodeIndex) {
        match self.arena.get(pattern).clone() {
            Node::Identifier(name) => self.declare(name),
            Node::ArrayPattern { elements, rest } => {
                for el in elements.into_iter().flatten() {
                    self.declare_pattern(el.pattern);
                }
                if let Some(r) = rest {
                    self.declare_pattern(r);
                }
            }
            Node::ObjectPattern { properties, rest } => {
                for prop in properties {
                    self.declare_pattern(prop.value);
                }
                if let Some(r) = rest {
                    self.declare_pattern(r);
                }
            }
            _ => {}
        }
    }

    fn record_point(&mut self, node: NodeIndex, kind: SuspensionKind) {
        let id = u32::try_from(self.points.len()).expect("suspension point count overflow");
        let (try_region_id, try_depth) = match self.region_stack.last() {
            Some(&(region, section)) => {
                let region_entry = &mut self.regions[region as usize];
                match section {
                    RegionSection::Try => region_entry.has_suspension_in_try = true,
                    RegionSection::Catch => region_entry.has_suspension_in_catch = true,
                    RegionSection::Finally => region_entry.has_suspension_in_finally = true,
                }
                (Some(region), u32::try_from(self.region_stack.len()).unwrap_or(u32::MAX))
            }
            None => (None, 0),
        };
        self.points.push(SuspensionPoint {
            node,
            id,
            kind,
            live_locals: self.declared_so_far.clone(),
            try_region_id,
            try_depth,
        });
    }

    fn walk_statement(&mut self, stmt: NodeIndex) {
        match self.arena.get(stmt).clone() {
            Node::Block(stmts) => {
                for s in stmts {
                    self.walk_statement(s);
                }
            }
            Node::VarDecl { declarations, .. } => {
                for (pattern, _, init) in declarations {
                    if let Some(init) = init {
                        self.walk_expr(init);
                    }
                    self.declare_pattern(pattern);
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
                self.declare_pattern(pattern);
                let before = self.points.len();
                self.walk_statement(body);
                if self.points.len() != before {
                    self.hoisted_for_of.insert(stmt);
                }
            }
            Node::ForIn { pattern, object, body, .. } => {
                self.walk_expr(object);
                self.declare_pattern(pattern);
                self.walk_statement(body);
            }
            Node::Return(e) => {
                if let Some(e) = e {
                    self.walk_expr(e);
                }
            }
            Node::TryCatch { try_block, catch_param, catch_block, finally_block, .. } => {
                let region_id = self.next_region;
                self.next_region += 1;
                let parent_id = self.region_stack.last().map(|&(r, _)| r);
                self.regions.push(TryRegion {
                    id: region_id,
                    parent_id,
                    has_suspension_in_try: false,
                    has_suspension_in_catch: false,
                    has_suspension_in_finally: false,
                });

                self.region_stack.push((region_id, RegionSection::Try));
                self.walk_statement(try_block);
                self.region_stack.pop();

                if let Some(cb) = catch_block {
                    if let Some(param) = catch_param {
                        self.declare_pattern(param);
                    }
                    self.region_stack.push((region_id, RegionSection::Catch));
                    self.walk_statement(cb);
                    self.region_stack.pop();
                }
                if let Some(f) = finally_block {
                    self.region_stack.push((region_id, RegionSection::Finally));
                    self.walk_statement(f);
                    self.region_stack.pop();
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
            // Nested function/class declarations have their own,
            // independent suspension plan; don't descend.
            Node::Function(_) | Node::Class { .. } => {}
            Node::Enum { members, .. } => {
                for (_, init) in members {
                    if let Some(init) = init {
                        self.walk_expr(init);
                    }
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

    fn walk_expr(&mut self, expr: NodeIndex) {
        match self.arena.get(expr).clone() {
            Node::Await(operand) => {
                self.walk_expr(operand);
                self.record_point(expr, SuspensionKind::Await);
            }
            Node::Yield { delegate, argument } => {
                if let Some(a) = argument {
                    self.walk_expr(a);
                }
                self.record_point(expr, if delegate { SuspensionKind::YieldStar } else { SuspensionKind::Yield });
            }
            Node::Binary { left, right, .. } | Node::Logical { left, right, .. } | Node::NullishCoalescing { left, right } => {
                self.walk_expr(left);
                self.walk_expr(right);
            }
            Node::Unary { operand, .. }
            | Node::Grouping(operand)
            | Node::Spread(operand)
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
                self.walk_expr(target);
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
            // A nested arrow is its own function boundary with its own
            // suspension plan — except it shares the *enclosing* state
            // machine only if it is non-async/non-generator itself, in
            // which case it has no suspension points of its own and needs
            // no separate walk here.
            Node::ArrowFunction(_) => {}
            Node::TypeAssertion { expr: inner, .. } => self.walk_expr(inner),
            _ => {}
        }
    }
}

/// Analyze one function body for suspension points. `sig.body` must be the
/// function's block body (expression-bodied arrows cannot themselves
/// contain statements, but they can contain `await`, which this still
/// finds by walking the expression instead of a block).
#[must_use]
pub fn plan_suspensions(arena: &NodeArena, sig: &FunctionSig) -> SuspensionPlan {
    let mut analyzer = Analyzer::new(arena);
    for param in &sig.params {
        for_each_param_name(arena, param.pattern, &mut |name| {
            analyzer.hoisted_locals.insert(name);
        });
    }
    let hoisted_parameters = analyzer.hoisted_locals.clone();
    if let Some(body) = sig.body {
        match arena.get(body) {
            Node::Block(_) => analyzer.walk_statement(body),
            _ => analyzer.walk_expr(body),
        }
    }
    SuspensionPlan {
        suspension_points: analyzer.points,
        hoisted_locals: analyzer.hoisted_locals,
        hoisted_parameters,
        hoisted_for_of_iterables: analyzer.hoisted_for_of,
        try_regions: analyzer.regions,
    }
}

fn for_each_param_name(arena: &NodeArena, pattern: NodeIndex, f: &mut impl FnMut(Atom)) {
    match arena.get(pattern) {
        Node::Identifier(name) => f(*name),
        Node::ArrayPattern { elements, rest } => {
            for el in elements.iter().flatten() {
                for_each_param_name(arena, el.pattern, f);
            }
            if let Some(r) = rest {
                for_each_param_name(arena, *r, f);
            }
        }
        Node::ObjectPattern { properties, rest } => {
            for prop in properties {
                for_each_param_name(arena, prop.value, f);
            }
            if let Some(r) = rest {
                for_each_param_name(arena, *r, f);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsz_parser::Parser;

    fn sig_of(src: &str) -> (NodeArena, FunctionSig) {
        let parser = Parser::new(src, "test.ts");
        let (program, arena, _interner, diags) = parser.parse_program();
        assert!(diags.is_empty(), "parse errors: {diags:?}");
        let Node::Program(stmts) = arena.get(program).clone() else { unreachable!() };
        for s in stmts {
            if let Node::Function(sig) = arena.get(s).clone() {
                return (arena, sig);
            }
        }
        panic!("no function found in {src}");
    }

    #[test]
    fn counts_await_points_and_state_count() {
        let (arena, sig) = sig_of("async function f() { await a(); await b(); }");
        let plan = plan_suspensions(&arena, &sig);
        assert_eq!(plan.suspension_points.len(), 2);
        assert_eq!(plan.state_count(), 3);
        assert!(plan.suspension_points.iter().all(|p| p.kind == SuspensionKind::Await));
    }

    #[test]
    fn yield_star_is_tagged_distinctly() {
        let (arena, sig) = sig_of("function* f() { yield* g(); }");
        let plan = plan_suspensions(&arena, &sig);
        assert_eq!(plan.suspension_points.len(), 1);
        assert_eq!(plan.suspension_points[0].kind, SuspensionKind::YieldStar);
    }

    #[test]
    fn locals_declared_before_a_suspension_are_live_at_it() {
        let (arena, sig) = sig_of("async function f() { let x = 1; await g(); let y = 2; }");
        let plan = plan_suspensions(&arena, &sig);
        assert_eq!(plan.suspension_points.len(), 1);
        let live = &plan.suspension_points[0].live_locals;
        assert_eq!(live.len(), 1); // only `x`, not `y` (declared after the point)
        assert_eq!(plan.hoisted_locals.len(), 2); // but both `x` and `y` are still hoisted
    }

    #[test]
    fn try_region_flags_record_which_section_suspends() {
        let (arena, sig) = sig_of("async function f() { try { await a(); } catch (e) { await b(); } finally { c(); } }");
        let plan = plan_suspensions(&arena, &sig);
        assert_eq!(plan.try_regions.len(), 1);
        let region = &plan.try_regions[0];
        assert!(region.has_suspension_in_try);
        assert!(region.has_suspension_in_catch);
        assert!(!region.has_suspension_in_finally);
        assert!(plan.suspension_points.iter().all(|p| p.try_region_id == Some(0)));
    }

    #[test]
    fn nested_function_suspension_points_are_not_counted() {
        let (arena, sig) = sig_of("async function f() { function inner() { } await g(); }");
        let plan = plan_suspensions(&arena, &sig);
        assert_eq!(plan.suspension_points.len(), 1);
    }
}
