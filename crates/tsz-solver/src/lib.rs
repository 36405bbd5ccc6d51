//! The Type System Core and Narrowing Engine.
//!
//! `TypeInfo` is implemented as the arena-interned triple `TypeId` /
//! `TypeInterner` / `TypeData`.

pub mod evaluate;
pub mod instantiate;
pub mod intern;
pub mod narrowing;
pub mod subtype;
pub mod substitute;
pub mod types;
pub mod unify;
pub mod widen;

pub use evaluate::evaluate_type;
pub use intern::{FunctionShapeId, ListId, ObjectShapeId, TypeDatabase, TypeId, TypeInterner};
pub use narrowing::{ElementKey, NarrowingContext, NarrowingPath};
pub use subtype::{compatible, SubtypeChecker};
pub use substitute::{substitute_type, TypeSubstitution};
pub use types::{
    ClassShape, ConditionalType, DefId, EnumKind, EnumShape, FunctionShape, IndexSignature,
    Intrinsic, LiteralValue, MappedModifier, MappedType, ObjectFlags, ObjectShape, OrderedFloat,
    ParamInfo, PropertyInfo, SymbolRef, TupleElement, TypeData, TypeParamInfo, TypePredicate,
    Visibility,
};
pub use unify::InferenceContext;
pub use widen::widen_type;
