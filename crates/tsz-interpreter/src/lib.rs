//! The tree-walking interpreter, its iteration bridge, and the
//! cooperative task driver (spec §4.5, §5).
//!
//! `interpret(ast, type_map) -> completion` is the crate's public surface
//! entry point; everything else here is either its supporting state
//! (`Environment`, `Value`, `Completion`) or the two collaborator-facing
//! pieces it hosts (`iteration::IterationBridge`, `task::MicrotaskQueue`).

pub mod completion;
pub mod coroutine;
pub mod environment;
pub mod globals;
pub mod interpreter;
pub mod iteration;
pub mod strings;
pub mod task;
pub mod value;

pub use completion::Completion;
pub use environment::Environment;
pub use interpreter::{interpret, Interpreter};
pub use iteration::{HostCalls, IterationBridge};
pub use strings::AtomTable;
pub use task::{new_shared_queue, MicrotaskQueue, PromiseHandle, SharedQueue};
pub use value::{FunctionValue, NativeFn, Value};
