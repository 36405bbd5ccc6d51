//! Recursive-descent parser and AST types for the tsz TypeScript compiler.
//!
//! Converts a `Token` stream (via `tsz_scanner::Lexer`) into an arena-indexed
//! AST (`NodeArena`). The AST here is purely syntactic:
//! type annotations are kept as `TypeNode` (as written), separate from the
//! solver's resolved `TypeId`/`TypeInfo` universe built on top of it later.

pub mod node;
pub mod parser;

pub use node::{
    AccessModifier, Argument, ArrayElement, ClassMember, ClassMemberKind, FunctionModifiers,
    FunctionSig, Node, NodeArena, NodeIndex, NodeList, ObjectPatternProperty, ObjectProperty,
    Param, PatternElement, PropertyKey, SwitchCase, TupleTypeElement, TypeMember, TypeNode,
    TypeParamDecl, VarKind,
};
pub use parser::Parser;
