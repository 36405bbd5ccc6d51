//! The loadable bytecode artifact: a namespace `Program` hosting top-level functions as
//! static members, classes as nominal types, state machines as nested
//! anonymous types with numeric suffixes, and the process-wide display
//! class as a static slot on `Program`.

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;

/// Where a closure's upvalue comes from at construction time: an index into
/// the *defining* function's own captured-environment list (never a direct
/// field access — environments are non-owning-shared, so the emitter always
/// goes through one more level of indirection than a field offset would
/// need).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpvalueSource {
    /// Capture the environment currently held in the *enclosing* function's
    /// own `uses_outer_environments[index]` (i.e. forward an already-held
    /// reference down another level).
    FromEnclosingOuter { index: u32 },
    /// Capture the enclosing function's *own* freshly allocated
    /// environment (the enclosing function is the one whose scope defines
    /// the captured variable).
    FromEnclosingOwn,
}

/// A synthesized display class: one field per captured
/// variable plus, optionally, a field holding a non-owning reference to the
/// `this` of the scope that created it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayClassArtifact {
    pub id: u32,
    pub field_names: Vec<String>,
    pub has_this_field: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateMachineKind {
    Async,
    Generator,
    AsyncGenerator,
}

/// A resumable object's compiled shape. Unlike a plain `FunctionArtifact`, the body is
/// one single `Chunk` containing inline `Await`/`Yield`/`YieldStar`
/// suspend instructions at their natural control-flow position (so
/// ordinary `if`/`while`/`try` lowering is reused unchanged); `resume_ips`
/// is the dispatch table giving the instruction index to jump to for each
/// resume state instead of fragmenting the body into one chunk per state.
/// This only works because the compiler only
/// ever emits a suspend op when the value stack holds exactly the
/// suspended value itself (see `tsz-emitter`'s `EmitError::
/// UnsupportedSuspensionPosition`) — nothing else is ever "in flight"
/// across a suspend, so resuming into the same chunk at a later
/// instruction index needs no stack snapshot/restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateMachineArtifact {
    pub kind: StateMachineKind,
    /// `suspension_points.len() + 1`.
    pub state_count: u32,
    /// Hoisted field names in allocation order; `GetEnvironmentField`/
    /// `SetEnvironmentField` inside the chunk index into this, not into
    /// the enclosing function's own locals (every hoisted name crosses a
    /// suspension, so it cannot live on the Rust call stack the way an
    /// ordinary local's slot does).
    pub fields: Vec<String>,
    pub chunk: Chunk,
    /// `resume_ips[i]` is the instruction index to jump to when `state ==
    /// i`; state `-1` always resumes at instruction 0.
    pub resume_ips: Vec<u32>,
    /// Try-region metadata carried over from `tsz_lowering::TryRegion`,
    /// flattened to the fields the driver needs to re-enter a region on
    /// resume and to route a post-resume exception to the right handler.
    pub try_regions: Vec<TryRegionArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TryRegionArtifact {
    pub id: u32,
    pub parent_id: Option<u32>,
    pub has_suspension_in_finally: bool,
    /// Instruction index of the `catch` block entry, if this region has one.
    pub catch_ip: Option<u32>,
    /// Instruction index of the `finally` block entry, if this region has
    /// one.
    pub finally_ip: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionArtifact {
    pub name: Option<String>,
    /// Required-parameter count.
    pub arity: u32,
    pub has_rest: bool,
    pub chunk: Chunk,
    /// This function's own display class, if any of its nested functions
    /// capture something it defines.
    pub environment: Option<u32>,
    pub environment_fields: Vec<String>,
    /// How to build each entry of `OpCode::GetUpvalue`/`SetUpvalue` at
    /// `Closure` construction time, in the order the body's `GetUpvalue`
    /// indices reference them.
    pub upvalues: Vec<UpvalueSource>,
    /// Present only for suspension-bearing functions; when
    /// `Some`, `chunk` above is unused (construction goes straight to
    /// building the state object from `state_machine.states[0]`).
    pub state_machine: Option<StateMachineArtifact>,
}

impl FunctionArtifact {
    #[must_use]
    pub fn is_state_machine(&self) -> bool {
        self.state_machine.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMemberArtifact {
    pub name: String,
    pub function: u32,
    pub is_static: bool,
}

/// A nominal class type: fields
/// default-initialize at construction, methods/getters/setters reference
/// compiled functions by index so multiple instances share one body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassArtifact {
    pub name: String,
    /// Index into `Artifact::classes`.
    pub super_class: Option<u32>,
    /// Index into `Artifact::functions`; `None` for a class with no
    /// explicit constructor (default: forward all args to `super(...)` if
    /// there is a superclass, otherwise a no-op).
    pub constructor: Option<u32>,
    pub methods: Vec<ClassMemberArtifact>,
    pub getters: Vec<ClassMemberArtifact>,
    pub setters: Vec<ClassMemberArtifact>,
    /// Instance field names with a default-initializer chunk index into
    /// `Artifact::functions` (a thunk run against the new instance during
    /// construction, before the constructor body), or `None` for fields
    /// with no initializer (left as `undefined`).
    pub fields: Vec<(String, Option<u32>)>,
}

/// The artifact's top-level entry point: `Program`'s own statement list,
/// compiled exactly like a function body with no parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub functions: Vec<FunctionArtifact>,
    pub classes: Vec<ClassArtifact>,
    pub display_classes: Vec<DisplayClassArtifact>,
    /// `Program`'s top-level code (index into `functions`).
    pub entry: u32,
    /// The top-level captured-variable environment, published as a static slot
    /// on `Program` rather than scattered globals. `None` when
    /// nothing at top level is captured by a nested function.
    pub process_display_class: Option<u32>,
}

impl Artifact {
    #[must_use]
    pub fn new(entry: u32) -> Self {
        Artifact {
            functions: Vec::new(),
            classes: Vec::new(),
            display_classes: Vec::new(),
            entry,
            process_display_class: None,
        }
    }

    /// Serializes the artifact to the loadable byte format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, crate::error::EmitError> {
        bincode::serialize(self).map_err(|e| crate::error::EmitError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, crate::error::EmitError> {
        bincode::deserialize(bytes).map_err(|e| crate::error::EmitError::Serialization(e.to_string()))
    }
}
