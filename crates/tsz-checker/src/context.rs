//! Shared mutable state threaded through the type-check walk. Kept as a plain struct of borrowed
//! collaborators plus owned output tables.

use rustc_hash::FxHashMap;

use tsz_binder::{BinderState, SymbolId};
use tsz_common::{diagnostics::codes, CheckerOptions, Diagnostic, Interner, Span};
use tsz_lowering::closure::ClosurePlanResult;
use tsz_parser::{NodeArena, NodeIndex};
use tsz_solver::{NarrowingContext, TypeId, TypeInterner};

/// Side table from AST node identity to `TypeId`.
/// Never mutated after type checking completes for a top-level statement
/// batch (enforced by `check`'s caller discipline, not the type itself).
pub type TypeMap = FxHashMap<NodeIndex, TypeId>;

/// Collected as a batch of diagnostics rather than a single message: errors
/// accumulate per top-level statement and checking continues past the
/// first one.
#[derive(Debug, Clone)]
pub struct TypeCheckError {
    pub diagnostics: Vec<Diagnostic>,
}

impl std::fmt::Display for TypeCheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for d in &self.diagnostics {
            writeln!(f, "{}: {}", d.code, d.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for TypeCheckError {}

/// Per-function bookkeeping pushed while checking a function body: its
/// declared/inferred return type target, whether it is async/generator
/// (changes how `return`/`yield`/`await` type-check), and the narrowing
/// context at function entry (captured variables start unnarrowed: a
/// closure must not trust narrowings established before it captured them).
#[derive(Clone)]
pub struct FunctionFrame {
    pub expected_return: Option<TypeId>,
    pub is_async: bool,
    pub is_generator: bool,
    pub yielded_types: Vec<TypeId>,
    pub returned_types: Vec<TypeId>,
}

pub struct CheckerState<'a> {
    pub arena: &'a NodeArena,
    pub atoms: &'a Interner,
    pub types: &'a TypeInterner,
    pub binder: &'a BinderState,
    pub options: CheckerOptions,
    pub type_map: TypeMap,
    /// Declared (possibly widened) type of each bound symbol, populated as
    /// declarations are checked in program order.
    pub symbol_types: FxHashMap<SymbolId, TypeId>,
    pub diagnostics: Vec<Diagnostic>,
    /// Current narrowing context: a single context threads
    /// through a control-flow region in program order; nested regions save
    /// and restore it around their own narrowing.
    pub narrowing: NarrowingContext,
    pub functions: Vec<FunctionFrame>,
    /// Per-function free-variable capture sets, computed once up front by
    /// the same Closure/Display-Class Planner the lowering stage uses, so
    /// `check_function_sig` can invalidate narrowings a closure captures
    /// without re-deriving capture analysis itself.
    pub closures: ClosurePlanResult,
    file: String,
}

impl<'a> CheckerState<'a> {
    #[must_use]
    pub fn new(
        arena: &'a NodeArena,
        atoms: &'a Interner,
        types: &'a TypeInterner,
        binder: &'a BinderState,
        options: CheckerOptions,
        file: impl Into<String>,
    ) -> Self {
        CheckerState {
            arena,
            atoms,
            types,
            binder,
            options,
            type_map: TypeMap::default(),
            symbol_types: FxHashMap::default(),
            diagnostics: Vec::new(),
            narrowing: NarrowingContext::empty(),
            functions: Vec::new(),
            closures: ClosurePlanResult::default(),
            file: file.into(),
        }
    }

    pub fn record_type(&mut self, node: NodeIndex, ty: TypeId) -> TypeId {
        self.type_map.insert(node, ty);
        ty
    }

    #[must_use]
    pub fn type_of(&self, node: NodeIndex) -> Option<TypeId> {
        self.type_map.get(&node).copied()
    }

    pub fn error(&mut self, code: u32, span: Span, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::error(code, self.file.clone(), span, message));
    }

    pub fn not_assignable(&mut self, span: Span, target: TypeId, source: TypeId) {
        let target_name = self.describe(target);
        let source_name = self.describe(source);
        self.error(
            codes::TYPE_NOT_ASSIGNABLE,
            span,
            format!("Type '{source_name}' is not assignable to type '{target_name}'."),
        );
    }

    /// Best-effort human-readable rendering of a `TypeId`, for diagnostics
    /// only (never consulted by the type relations themselves).
    #[must_use]
    pub fn describe(&self, ty: TypeId) -> String {
        crate::expr::describe_type(self.types, ty)
    }

    pub fn current_function(&mut self) -> Option<&mut FunctionFrame> {
        self.functions.last_mut()
    }
}
