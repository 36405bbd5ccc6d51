//! Name binding and lexical scope resolution.
//!
//! The binder walks a parsed `Program` once, building the static scope
//! chain (`scope::ScopeArena`) and the symbol table (`symbol::Symbol`),
//! and resolving every identifier reference against it. The checker
//! consumes the resulting `BinderState` rather than re-resolving names
//! itself.

pub mod binder;
pub mod scope;
pub mod symbol;

pub use binder::{bind_program, BinderState, FileFeatures};
pub use scope::{Scope, ScopeArena, ScopeId, ScopeKind};
pub use symbol::{Symbol, SymbolFlags, SymbolId};
