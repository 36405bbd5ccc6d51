//! `TypeId` / `TypeInterner` — the structurally-deduplicated type arena.
//!
//! Every `TypeData` value is interned exactly once; equal shapes collapse to
//! the same `TypeId`. This is what makes `compatible(A, A)` and union/intersection normalization cheap: a `TypeId` is a `Copy` `u32`, and reference equality
//! on the arena slot *is* structural equality.
//!
//! Single-threaded by design: the whole core runs a single-threaded
//! cooperative execution model, so this interner is a plain `RefCell`
//! table rather than a lock-guarded cache — nothing ever interns types
//! from more than one thread.

use std::cell::RefCell;

use rustc_hash::FxHashMap;
use tsz_common::{Atom, Interner};

use crate::types::{
    ClassShape, DefId, EnumShape, FunctionShape, Intrinsic, LiteralValue, MappedType, ObjectShape,
    PropertyInfo, TupleElement, TypeData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectShapeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionShapeId(pub u32);

macro_rules! intrinsic_const {
    ($name:ident, $idx:expr) => {
        pub const $name: TypeId = TypeId($idx);
    };
}

impl TypeId {
    intrinsic_const!(ANY, 0);
    intrinsic_const!(UNKNOWN, 1);
    intrinsic_const!(NEVER, 2);
    intrinsic_const!(VOID, 3);
    intrinsic_const!(NULL, 4);
    intrinsic_const!(UNDEFINED, 5);
    intrinsic_const!(STRING, 6);
    intrinsic_const!(NUMBER, 7);
    intrinsic_const!(BOOLEAN, 8);
    intrinsic_const!(BIGINT, 9);
    intrinsic_const!(SYMBOL, 10);
    intrinsic_const!(ERROR, 11);

    const FIRST_DYNAMIC: u32 = 12;
}

/// Read-only query surface over an interner, implemented by `TypeInterner`
/// (and usable as `&dyn TypeDatabase` by callers that only need to look
/// types up, not intern new ones).
pub trait TypeDatabase {
    fn lookup(&self, id: TypeId) -> Option<TypeData>;
    fn resolve_atom(&self, atom: Atom) -> std::rc::Rc<str>;
    fn type_list(&self, id: ListId) -> Vec<TypeId>;
    fn tuple_list(&self, id: ListId) -> Vec<TupleElement>;
    fn object_shape(&self, id: ObjectShapeId) -> ObjectShape;
    fn function_shape(&self, id: FunctionShapeId) -> FunctionShape;
    fn class_shape(&self, id: DefId) -> Option<ClassShape>;
    fn enum_shape(&self, id: DefId) -> Option<EnumShape>;
}

#[derive(Default)]
struct Tables {
    types: Vec<TypeData>,
    type_lookup: FxHashMap<TypeData, TypeId>,
    type_lists: Vec<Vec<TypeId>>,
    type_list_lookup: FxHashMap<Vec<TypeId>, ListId>,
    tuple_lists: Vec<Vec<TupleElement>>,
    object_shapes: Vec<ObjectShape>,
    object_shape_lookup: FxHashMap<ObjectShape, ObjectShapeId>,
    function_shapes: Vec<FunctionShape>,
    function_shape_lookup: FxHashMap<FunctionShape, FunctionShapeId>,
    classes: Vec<Option<ClassShape>>,
    enums: Vec<Option<EnumShape>>,
}

pub struct TypeInterner {
    atoms: Interner,
    tables: RefCell<Tables>,
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeInterner {
    #[must_use]
    pub fn new() -> Self {
        let atoms = Interner::new();
        let mut tables = Tables::default();
        for intrinsic in [
            Intrinsic::Any,
            Intrinsic::Unknown,
            Intrinsic::Never,
            Intrinsic::Void,
            Intrinsic::Null,
            Intrinsic::Undefined,
            Intrinsic::String,
            Intrinsic::Number,
            Intrinsic::Boolean,
            Intrinsic::BigInt,
            Intrinsic::Symbol,
            Intrinsic::Error,
        ] {
            let data = TypeData::Intrinsic(intrinsic);
            let id = TypeId(u32::try_from(tables.types.len()).unwrap());
            tables.type_lookup.insert(data.clone(), id);
            tables.types.push(data);
        }
        debug_assert_eq!(tables.types.len() as u32, TypeId::FIRST_DYNAMIC);
        TypeInterner {
            atoms,
            tables: RefCell::new(tables),
        }
    }

    #[must_use]
    pub fn intern_string(&self, s: &str) -> Atom {
        self.atoms.intern(s)
    }

    /// Structurally intern `data`, returning its canonical `TypeId`.
    pub fn intern(&self, data: TypeData) -> TypeId {
        let mut tables = self.tables.borrow_mut();
        if let Some(&id) = tables.type_lookup.get(&data) {
            return id;
        }
        let id = TypeId(u32::try_from(tables.types.len()).expect("type arena overflow"));
        tables.type_lookup.insert(data.clone(), id);
        tables.types.push(data);
        id
    }

    fn intern_list(&self, list: Vec<TypeId>) -> ListId {
        let mut tables = self.tables.borrow_mut();
        if let Some(&id) = tables.type_list_lookup.get(&list) {
            return id;
        }
        let id = ListId(u32::try_from(tables.type_lists.len()).expect("list arena overflow"));
        tables.type_list_lookup.insert(list.clone(), id);
        tables.type_lists.push(list);
        id
    }

    pub fn literal_string(&self, s: &str) -> TypeId {
        let atom = self.intern_string(s);
        self.intern(TypeData::Literal(LiteralValue::String(atom)))
    }

    pub fn literal_number(&self, n: f64) -> TypeId {
        self.intern(TypeData::Literal(LiteralValue::Number(
            crate::types::OrderedFloat(n),
        )))
    }

    pub fn literal_boolean(&self, b: bool) -> TypeId {
        self.intern(TypeData::Literal(LiteralValue::Boolean(b)))
    }

    pub fn array(&self, element: TypeId) -> TypeId {
        self.intern(TypeData::Array(element))
    }

    pub fn promise(&self, inner: TypeId) -> TypeId {
        // Promise<Promise<T>> collapses to Promise<T>.
        if let Some(TypeData::Promise(t)) = self.lookup(inner) {
            return self.intern(TypeData::Promise(t));
        }
        self.intern(TypeData::Promise(inner))
    }

    pub fn generator(&self, inner: TypeId) -> TypeId {
        self.intern(TypeData::Generator(inner))
    }

    pub fn async_generator(&self, inner: TypeId) -> TypeId {
        self.intern(TypeData::AsyncGenerator(inner))
    }

    pub fn keyof(&self, inner: TypeId) -> TypeId {
        self.intern(TypeData::KeyOf(inner))
    }

    pub fn indexed_access(&self, obj: TypeId, index: TypeId) -> TypeId {
        self.intern(TypeData::IndexedAccess { obj, index })
    }

    pub fn mapped(&self, mapped: MappedType) -> TypeId {
        self.intern(TypeData::Mapped(mapped))
    }

    pub fn conditional(&self, cond: crate::types::ConditionalType) -> TypeId {
        self.intern(TypeData::Conditional(cond))
    }

    pub fn type_parameter(&self, info: crate::types::TypeParamInfo) -> TypeId {
        self.intern(TypeData::TypeParameter(info))
    }

    pub fn instantiated_generic(&self, def: DefId, args: Vec<TypeId>) -> TypeId {
        let args = self.intern_list(args);
        self.intern(TypeData::InstantiatedGeneric { def, args })
    }

    pub fn tuple(&self, elements: Vec<TupleElement>) -> TypeId {
        let mut tables = self.tables.borrow_mut();
        let id = ListId(u32::try_from(tables.tuple_lists.len()).expect("tuple arena overflow"));
        tables.tuple_lists.push(elements);
        drop(tables);
        self.intern(TypeData::Tuple(id))
    }

    pub fn object(&self, properties: Vec<PropertyInfo>) -> TypeId {
        self.object_with_indices(properties, None, None, None)
    }

    pub fn object_with_indices(
        &self,
        mut properties: Vec<PropertyInfo>,
        string_index: Option<crate::types::IndexSignature>,
        number_index: Option<crate::types::IndexSignature>,
        symbol_index: Option<crate::types::IndexSignature>,
    ) -> TypeId {
        properties.sort_by_key(|p| p.name);
        let shape = ObjectShape {
            properties,
            string_index,
            number_index,
            symbol_index,
            flags: crate::types::ObjectFlags::empty(),
        };
        let shape_id = {
            let mut tables = self.tables.borrow_mut();
            if let Some(&id) = tables.object_shape_lookup.get(&shape) {
                id
            } else {
                let id = ObjectShapeId(
                    u32::try_from(tables.object_shapes.len()).expect("object arena overflow"),
                );
                tables.object_shape_lookup.insert(shape.clone(), id);
                tables.object_shapes.push(shape);
                id
            }
        };
        self.intern(TypeData::Object(shape_id))
    }

    pub fn fresh_object(&self, properties: Vec<PropertyInfo>) -> TypeId {
        let mut tables = self.tables.borrow_mut();
        let mut shape = ObjectShape {
            properties,
            string_index: None,
            number_index: None,
            symbol_index: None,
            flags: crate::types::ObjectFlags::FRESH,
        };
        shape.properties.sort_by_key(|p| p.name);
        let id = ObjectShapeId(
            u32::try_from(tables.object_shapes.len()).expect("object arena overflow"),
        );
        tables.object_shapes.push(shape);
        drop(tables);
        self.intern(TypeData::Object(id))
    }

    pub fn function(&self, shape: FunctionShape) -> TypeId {
        let shape_id = {
            let mut tables = self.tables.borrow_mut();
            if let Some(&id) = tables.function_shape_lookup.get(&shape) {
                id
            } else {
                let id = FunctionShapeId(
                    u32::try_from(tables.function_shapes.len()).expect("function arena overflow"),
                );
                tables.function_shape_lookup.insert(shape.clone(), id);
                tables.function_shapes.push(shape);
                id
            }
        };
        self.intern(TypeData::Function(shape_id))
    }

    /// Flatten nested unions, dedup members, and collapse: empty -> Never,
    /// singleton -> that element.
    pub fn union(&self, members: Vec<TypeId>) -> TypeId {
        let mut flat: Vec<TypeId> = Vec::with_capacity(members.len());
        for m in members {
            if m == TypeId::NEVER {
                continue;
            }
            match self.lookup(m) {
                Some(TypeData::Union(list)) => flat.extend(self.type_list(list)),
                _ => flat.push(m),
            }
        }
        flat.sort_unstable();
        flat.dedup();
        if flat.is_empty() {
            return TypeId::NEVER;
        }
        if flat.len() == 1 {
            return flat[0];
        }
        if flat.contains(&TypeId::ANY) {
            return TypeId::ANY;
        }
        let list = self.intern_list(flat);
        self.intern(TypeData::Union(list))
    }

    pub fn union2(&self, a: TypeId, b: TypeId) -> TypeId {
        self.union(vec![a, b])
    }

    pub fn union3(&self, a: TypeId, b: TypeId, c: TypeId) -> TypeId {
        self.union(vec![a, b, c])
    }

    /// Flatten nested intersections and apply the absorption/contradiction
    /// rules.
    pub fn intersection(&self, members: Vec<TypeId>) -> TypeId {
        let mut flat: Vec<TypeId> = Vec::with_capacity(members.len());
        for m in members {
            match self.lookup(m) {
                Some(TypeData::Intersection(list)) => flat.extend(self.type_list(list)),
                _ => flat.push(m),
            }
        }
        flat.sort_unstable();
        flat.dedup();
        if flat.iter().any(|&t| t == TypeId::NEVER) {
            return TypeId::NEVER;
        }
        if flat.iter().any(|&t| t == TypeId::ANY) {
            return TypeId::ANY;
        }
        flat.retain(|&t| t != TypeId::UNKNOWN);
        if flat.is_empty() {
            return TypeId::UNKNOWN;
        }
        if flat.len() == 1 {
            return flat[0];
        }

        // Two (or more) distinct primitives intersect to Never.
        let primitive_count = flat
            .iter()
            .filter(|&&t| self.is_plain_primitive(t))
            .count();
        if primitive_count > 1 {
            return TypeId::NEVER;
        }

        // Merge object-like members into one shape; conflicting property
        // types at the same key collapse that property's type to Never.
        let object_shapes: Vec<ObjectShapeId> = flat
            .iter()
            .filter_map(|&t| match self.lookup(t) {
                Some(TypeData::Object(shape_id)) => Some(shape_id),
                _ => None,
            })
            .collect();
        if object_shapes.len() >= 2 && object_shapes.len() == flat.len() {
            let mut merged: FxHashMap<Atom, TypeId> = FxHashMap::default();
            for shape_id in &object_shapes {
                let shape = self.object_shape(*shape_id);
                for prop in shape.properties {
                    merged
                        .entry(prop.name)
                        .and_modify(|existing| {
                            if *existing != prop.type_id {
                                *existing = TypeId::NEVER;
                            }
                        })
                        .or_insert(prop.type_id);
                }
            }
            let props = merged
                .into_iter()
                .map(|(name, type_id)| PropertyInfo::new(name, type_id))
                .collect();
            return self.object(props);
        }

        let list = self.intern_list(flat);
        self.intern(TypeData::Intersection(list))
    }

    fn is_plain_primitive(&self, t: TypeId) -> bool {
        matches!(
            self.lookup(t),
            Some(TypeData::Intrinsic(
                Intrinsic::String
                    | Intrinsic::Number
                    | Intrinsic::Boolean
                    | Intrinsic::BigInt
                    | Intrinsic::Symbol
                    | Intrinsic::Null
                    | Intrinsic::Undefined
                    | Intrinsic::Void
            ))
        )
    }

    pub fn define_class(&self, shape: ClassShape) -> DefId {
        let mut tables = self.tables.borrow_mut();
        let id = DefId(u32::try_from(tables.classes.len()).expect("class registry overflow"));
        tables.classes.push(Some(shape));
        id
    }

    pub fn define_enum(&self, shape: EnumShape) -> DefId {
        let mut tables = self.tables.borrow_mut();
        let id = DefId(u32::try_from(tables.enums.len()).expect("enum registry overflow"));
        tables.enums.push(Some(shape));
        id
    }
}

impl TypeDatabase for TypeInterner {
    fn lookup(&self, id: TypeId) -> Option<TypeData> {
        self.tables.borrow().types.get(id.0 as usize).cloned()
    }

    fn resolve_atom(&self, atom: Atom) -> std::rc::Rc<str> {
        self.atoms.resolve(atom)
    }

    fn type_list(&self, id: ListId) -> Vec<TypeId> {
        self.tables
            .borrow()
            .type_lists
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn tuple_list(&self, id: ListId) -> Vec<TupleElement> {
        self.tables
            .borrow()
            .tuple_lists
            .get(id.0 as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn object_shape(&self, id: ObjectShapeId) -> ObjectShape {
        self.tables.borrow().object_shapes[id.0 as usize].clone()
    }

    fn function_shape(&self, id: FunctionShapeId) -> FunctionShape {
        self.tables.borrow().function_shapes[id.0 as usize].clone()
    }

    fn class_shape(&self, id: DefId) -> Option<ClassShape> {
        self.tables
            .borrow()
            .classes
            .get(id.0 as usize)
            .and_then(|c| c.clone())
    }

    fn enum_shape(&self, id: DefId) -> Option<EnumShape> {
        self.tables
            .borrow()
            .enums
            .get(id.0 as usize)
            .and_then(|e| e.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsics_are_stable_constants() {
        let interner = TypeInterner::new();
        assert_eq!(
            interner.lookup(TypeId::STRING),
            Some(TypeData::Intrinsic(Intrinsic::String))
        );
        assert_eq!(
            interner.lookup(TypeId::ANY),
            Some(TypeData::Intrinsic(Intrinsic::Any))
        );
    }

    #[test]
    fn structural_dedup() {
        let interner = TypeInterner::new();
        let a = interner.literal_string("hi");
        let b = interner.literal_string("hi");
        assert_eq!(a, b);
    }

    #[test]
    fn union_singleton_collapses() {
        let interner = TypeInterner::new();
        let u = interner.union(vec![TypeId::STRING]);
        assert_eq!(u, TypeId::STRING);
    }

    #[test]
    fn union_empty_is_never() {
        let interner = TypeInterner::new();
        assert_eq!(interner.union(vec![]), TypeId::NEVER);
    }

    #[test]
    fn union_flattens_and_dedups() {
        let interner = TypeInterner::new();
        let inner = interner.union2(TypeId::STRING, TypeId::NUMBER);
        let outer = interner.union(vec![inner, TypeId::NUMBER, TypeId::BOOLEAN]);
        let Some(TypeData::Union(list)) = interner.lookup(outer) else {
            panic!("expected union");
        };
        let mut members = interner.type_list(list);
        members.sort_unstable_by_key(|t| t.0);
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn intersection_distinct_primitives_is_never() {
        let interner = TypeInterner::new();
        assert_eq!(
            interner.intersection(vec![TypeId::STRING, TypeId::NUMBER]),
            TypeId::NEVER
        );
    }

    #[test]
    fn intersection_any_absorbs() {
        let interner = TypeInterner::new();
        assert_eq!(interner.intersection(vec![TypeId::ANY, TypeId::STRING]), TypeId::ANY);
    }

    #[test]
    fn intersection_unknown_is_identity() {
        let interner = TypeInterner::new();
        assert_eq!(
            interner.intersection(vec![TypeId::UNKNOWN, TypeId::STRING]),
            TypeId::STRING
        );
    }

    #[test]
    fn intersection_merges_object_properties() {
        let interner = TypeInterner::new();
        let a = interner.object(vec![PropertyInfo::new(interner.intern_string("x"), TypeId::STRING)]);
        let b = interner.object(vec![PropertyInfo::new(interner.intern_string("y"), TypeId::NUMBER)]);
        let merged = interner.intersection(vec![a, b]);
        let Some(TypeData::Object(shape_id)) = interner.lookup(merged) else {
            panic!("expected object");
        };
        assert_eq!(interner.object_shape(shape_id).properties.len(), 2);
    }

    #[test]
    fn promise_of_promise_collapses() {
        let interner = TypeInterner::new();
        let inner = interner.promise(TypeId::NUMBER);
        let nested = interner.promise(inner);
        assert_eq!(nested, inner);
    }
}
