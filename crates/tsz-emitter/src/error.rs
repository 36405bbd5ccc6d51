//! `EmitError`/`CompileError`: planning-phase
//! and structural failures the bytecode back-end cannot lower, as opposed
//! to a `RuntimeError` raised while the emitted artifact later executes.
//! Both are fatal for the current emission — no partial artifact is ever
//! written — so `emit()` returns one eagerly rather than collecting a
//! batch the way `check()` does for type errors.

use tsz_common::Span;
use tsz_parser::NodeIndex;

/// A planning phase determined the AST violates an invariant the back-end
/// cannot lower.
#[derive(Debug, Clone, PartialEq)]
pub enum EmitError {
    /// A free variable read inside a nested function was not resolved to
    /// any enclosing environment by the closure planner.
    UnresolvedCapture { node: NodeIndex, span: Span },
    /// The suspension analyzer reported more live suspension points than
    /// `tsz_common::limits` allows to lower into a single dispatch table.
    TooManySuspensionPoints { node: NodeIndex, span: Span },
    /// A `yield`/`yield*`/`await` appeared somewhere the state-machine
    /// lowering does not (yet) support resuming into — e.g. inside the
    /// test expression of a `for` loop's update clause, which would need
    /// splitting the loop header across dispatch states.
    UnsupportedSuspensionPosition { node: NodeIndex, span: Span, reason: String },
    Serialization(String),
    /// A structural issue unique to ahead-of-time lowering, as opposed to
    /// something the closure/suspension planners already rejected.
    Compile(CompileError),
}

impl std::fmt::Display for EmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmitError::UnresolvedCapture { node, .. } => {
                write!(f, "unresolved capture at node {node:?}")
            }
            EmitError::TooManySuspensionPoints { node, .. } => {
                write!(f, "too many suspension points in function at node {node:?}")
            }
            EmitError::UnsupportedSuspensionPosition { node, reason, .. } => {
                write!(f, "unsupported suspension position at node {node:?}: {reason}")
            }
            EmitError::Serialization(msg) => write!(f, "artifact serialization failed: {msg}"),
            EmitError::Compile(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for EmitError {}

impl From<CompileError> for EmitError {
    fn from(err: CompileError) -> Self {
        EmitError::Compile(err)
    }
}

/// Input program has structural issues unique to ahead-of-time lowering.
#[derive(Debug, Clone, PartialEq)]
pub enum CompileError {
    ComputedClassFieldName { node: NodeIndex, span: Span },
    /// A decorator was present; the decorator runtime is an explicit
    /// external collaborator, so the emitter refuses rather
    /// than silently dropping it.
    DecoratorRequiresRuntimeCollaborator { node: NodeIndex, span: Span },
    DestructuringPatternTooComplex { node: NodeIndex, span: Span },
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::ComputedClassFieldName { node, .. } => {
                write!(f, "computed class field name not permitted at node {node:?}")
            }
            CompileError::DecoratorRequiresRuntimeCollaborator { node, .. } => {
                write!(f, "decorator at node {node:?} requires the external decorator runtime collaborator")
            }
            CompileError::DestructuringPatternTooComplex { node, .. } => {
                write!(f, "destructuring pattern too complex to lower at node {node:?}")
            }
        }
    }
}

impl std::error::Error for CompileError {}
