//! Centralized limits and thresholds.
//!
//! Recursion limits prevent stack overflow on pathological (or malicious)
//! input; iteration limits prevent infinite loops in fixed-point algorithms
//! (flow analysis, union/intersection normalization) from hanging the
//! compiler instead of reporting a diagnostic.

// =============================================================================
// Recursion Depth Limits (Parser / Checker / Solver)
// =============================================================================

/// Maximum depth for expression type checking. Deeply nested ternaries,
/// calls, or property accesses bail out with `TypeCheckError::TooComplex`
/// past this depth rather than overflowing the stack.
pub const MAX_EXPR_CHECK_DEPTH: u32 = 500;

/// Maximum depth for generic type instantiation. A recursive generic alias
/// that doesn't converge (`type T<X> = T<X[]>`) is caught here and reported
/// as a constraint-violation diagnostic instead of recursing forever.
pub const MAX_INSTANTIATION_DEPTH: u32 = 50;

/// Maximum depth for the checker's own AST recursion (statement/declaration
/// walking), distinct from expression-check depth.
pub const MAX_CHECKER_RECURSION_DEPTH: u32 = 50;

/// Maximum call-graph depth tracked for recursive-function return-type
/// inference (a function whose return type depends on calling itself).
pub const MAX_CALL_DEPTH: u32 = 20;

/// Maximum recursion depth for the subtype relation (`compatible`). Deeply
/// recursive structural types are capped here.
pub const MAX_SUBTYPE_DEPTH: u32 = 100;

/// Maximum parser recursion depth for nested expressions/statements.
pub const MAX_PARSER_RECURSION_DEPTH: u32 = 1_000;

/// Maximum AST depth accepted by any single pass walking the whole tree
/// (binder, lowering, emitter).
pub const MAX_AST_DEPTH: u32 = 500;

// =============================================================================
// Narrowing Engine limits
// =============================================================================

/// Maximum persistent `NarrowingContext` chain length before the engine
/// flattens it into a fresh map. Bounds worst-case lookup cost in a function
/// with thousands of sequential narrowing sites.
pub const MAX_NARROWING_CHAIN_DEPTH: u32 = 2_000;

// =============================================================================
// Closure planner / suspension lowering limits
// =============================================================================

/// Maximum nesting depth of closures considered for capture analysis.
pub const MAX_CLOSURE_NESTING_DEPTH: u32 = 200;

/// Maximum number of suspension points tracked in a single function body.
/// Functions with more `await`/`yield`/`yield*` sites than this are rejected
/// with `EmitError::TooManySuspensionPoints` rather than producing a state
/// machine with an unreasonably large dispatch table.
pub const MAX_SUSPENSION_POINTS: u32 = 10_000;

// =============================================================================
// Fixed-point / iteration limits
// =============================================================================

/// Maximum number of worklist iterations for definite-assignment / flow
/// analysis before giving up and treating the result as conservative.
pub const MAX_FLOW_ANALYSIS_ITERATIONS: u32 = 100_000;

/// Maximum number of keys expanded by a single mapped type. Prevents a
/// mapped type over a huge union from allocating unbounded memory.
pub const MAX_MAPPED_KEYS: usize = 2_000;

// =============================================================================
// Capacity hints (not hard limits, used for pre-allocation/inlining)
// =============================================================================

/// Inline element count for union/intersection/tuple member lists before
/// `SmallVec` spills to the heap. Most real-world unions are small
/// (`T | undefined`, `T | null`, a handful of discriminant variants).
pub const TYPE_LIST_INLINE: usize = 4;

/// Inline element count for function parameter lists.
pub const PARAM_LIST_INLINE: usize = 4;
