//! Bytecode artifact emitter: lowers a checked AST into a loadable
//! `Artifact` of `Chunk`s, consuming `tsz-lowering`'s closure and
//! state-machine plans.
//!
//! Module layout: `chunk` (the per-function instruction stream and constant
//! pool), `artifact` (the whole-program output shape: functions, classes,
//! display classes), `error` (planning-phase and structural emit failures),
//! `compiler` (per-function compiler state: locals, capture resolution,
//! loop/try bookkeeping), `emit` (the statement/expression walk that drives
//! all of the above).

pub mod artifact;
pub mod chunk;
pub mod compiler;
pub mod emit;
pub mod error;

pub use artifact::{
    Artifact, ClassArtifact, ClassMemberArtifact, DisplayClassArtifact, FunctionArtifact, StateMachineArtifact, StateMachineKind,
    TryRegionArtifact, UpvalueSource,
};
pub use chunk::{Chunk, Constant, OpCode};
pub use emit::emit;
pub use error::{CompileError, EmitError};
