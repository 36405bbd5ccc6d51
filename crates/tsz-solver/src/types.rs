//! The closed `TypeData` union plus the auxiliary
//! structs its composite variants hold.
//!
//! `TypeData` itself never appears loose in the rest of the workspace:
//! callers hold a `TypeId` and go through `TypeInterner::lookup` to see the
//! shape, the same "arena+index idiom" `tsz-parser`'s `NodeArena`/`NodeIndex`
//! pair already establishes.

use std::hash::{Hash, Hasher};

use tsz_common::Atom;

use crate::intern::{ListId, ObjectShapeId};

/// Bit-for-bit hashable wrapper around `f64` so numeric literal types can
/// live as `TypeData` enum payloads in a structural-dedup hash table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedFloat(pub f64);

impl Eq for OrderedFloat {}

impl Hash for OrderedFloat {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Normalize -0.0 to 0.0 and NaN to a single bit pattern so that
        // structurally-equal literal types always collide to one TypeId.
        let bits = if self.0 == 0.0 {
            0u64
        } else if self.0.is_nan() {
            u64::MAX
        } else {
            self.0.to_bits()
        };
        bits.hash(state);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    String(Atom),
    Number(OrderedFloat),
    Boolean(bool),
    BigInt(Atom),
}

/// A definition identity for generic classes/interfaces/functions, and for
/// nominal classes/enums. Nominal cycles (class <-> instance, generic def
/// <-> instantiation) resolve through this id, never a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolRef(pub Atom);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyInfo {
    pub name: Atom,
    pub type_id: crate::intern::TypeId,
    pub optional: bool,
    pub readonly: bool,
    pub visibility: Visibility,
}

impl PropertyInfo {
    #[must_use]
    pub fn new(name: Atom, type_id: crate::intern::TypeId) -> Self {
        PropertyInfo {
            name,
            type_id,
            optional: false,
            readonly: false,
            visibility: Visibility::Public,
        }
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }
}

bitflags::bitflags! {
    /// Object-literal freshness and other shape-level flags used by the
    /// excess-property check.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u8 {
        /// A "fresh" object literal, eligible for excess-property checking.
        /// Cleared once the value is widened into a variable binding.
        const FRESH = 1 << 0;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSignature {
    pub key_type: crate::intern::TypeId,
    pub value_type: crate::intern::TypeId,
    pub readonly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectShape {
    pub properties: Vec<PropertyInfo>,
    pub string_index: Option<IndexSignature>,
    pub number_index: Option<IndexSignature>,
    pub symbol_index: Option<IndexSignature>,
    pub flags: ObjectFlags,
}

impl ObjectShape {
    #[must_use]
    pub fn find(&self, name: Atom) -> Option<&PropertyInfo> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub name: Option<Atom>,
    pub type_id: crate::intern::TypeId,
    pub optional: bool,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypePredicate {
    pub param_name: Atom,
    pub asserted_type: crate::intern::TypeId,
    pub is_assertion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub params: Vec<ParamInfo>,
    pub this_type: Option<crate::intern::TypeId>,
    pub return_type: crate::intern::TypeId,
    pub type_params: Vec<TypeParamInfo>,
    pub type_predicate: Option<TypePredicate>,
    pub is_constructor: bool,
    pub is_method: bool,
}

impl FunctionShape {
    #[must_use]
    pub fn required_count(&self) -> usize {
        self.params
            .iter()
            .take_while(|p| !p.optional && !p.rest)
            .count()
    }

    #[must_use]
    pub fn has_rest(&self) -> bool {
        self.params.last().is_some_and(|p| p.rest)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleElement {
    pub type_id: crate::intern::TypeId,
    pub name: Option<Atom>,
    pub optional: bool,
    pub rest: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeParamInfo {
    pub name: Atom,
    pub constraint: Option<crate::intern::TypeId>,
    pub default: Option<crate::intern::TypeId>,
    pub is_const: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MappedModifier {
    Add,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MappedType {
    pub type_param: TypeParamInfo,
    pub constraint: crate::intern::TypeId,
    pub name_type: Option<crate::intern::TypeId>,
    pub template: crate::intern::TypeId,
    pub optional_modifier: Option<MappedModifier>,
    pub readonly_modifier: Option<MappedModifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConditionalType {
    pub check_type: crate::intern::TypeId,
    pub extends_type: crate::intern::TypeId,
    pub true_type: crate::intern::TypeId,
    pub false_type: crate::intern::TypeId,
    pub is_distributive: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnumKind {
    Numeric,
    String,
    Const,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassShape {
    pub name: Atom,
    pub super_class: Option<DefId>,
    pub type_params: Vec<TypeParamInfo>,
    pub instance_shape: ObjectShapeId,
    pub static_shape: ObjectShapeId,
    pub is_abstract: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumShape {
    pub name: Atom,
    pub members: Vec<(Atom, LiteralValue)>,
    pub kind: EnumKind,
}

/// `Intrinsic` covers every zero-payload primitive-ish variant: the ones
/// that get a reserved low `TypeId` constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Any,
    Unknown,
    Never,
    Void,
    Null,
    Undefined,
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
    Error,
}

/// The closed tagged union describing a type's shape once interned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeData {
    Intrinsic(Intrinsic),
    Literal(LiteralValue),
    Array(crate::intern::TypeId),
    Tuple(ListId),
    Object(ObjectShapeId),
    Function(crate::intern::FunctionShapeId),
    Union(ListId),
    Intersection(ListId),
    Promise(crate::intern::TypeId),
    Generator(crate::intern::TypeId),
    AsyncGenerator(crate::intern::TypeId),
    Class(DefId),
    Instance(DefId),
    Enum(DefId),
    TypeParameter(TypeParamInfo),
    /// An uninstantiated generic class/interface/function definition.
    Generic(DefId),
    InstantiatedGeneric { def: DefId, args: ListId },
    KeyOf(crate::intern::TypeId),
    IndexedAccess { obj: crate::intern::TypeId, index: crate::intern::TypeId },
    Mapped(MappedType),
    Conditional(ConditionalType),
}
