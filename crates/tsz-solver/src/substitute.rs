//! Type-parameter substitution.
//!
//! "Substitution must traverse every composite kind above; failing to
//! traverse a kind leaks unresolved type parameters into runtime
//! compatibility checks"
//! `substitute_type` matches every `TypeData` variant rather than falling
//! back to "return unchanged" for anything composite.

use rustc_hash::FxHashMap;
use tsz_common::Atom;

use crate::intern::{TypeId, TypeInterner};
use crate::types::{
    ConditionalType, FunctionShape, MappedType, ParamInfo, PropertyInfo, TupleElement, TypeData,
    TypeParamInfo,
};

#[derive(Debug, Default, Clone)]
pub struct TypeSubstitution {
    bindings: FxHashMap<Atom, TypeId>,
}

impl TypeSubstitution {
    #[must_use]
    pub fn new() -> Self {
        TypeSubstitution::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn insert(&mut self, name: Atom, type_id: TypeId) {
        self.bindings.insert(name, type_id);
    }

    #[must_use]
    pub fn get(&self, name: Atom) -> Option<TypeId> {
        self.bindings.get(&name).copied()
    }

    /// Zip `type_params` with `type_args` positionally; a parameter with no
    /// corresponding argument defaults to its constraint, or `Any` if it has
    /// none.
    #[must_use]
    pub fn from_args(
        interner: &TypeInterner,
        type_params: &[TypeParamInfo],
        type_args: &[TypeId],
    ) -> Self {
        let mut subst = TypeSubstitution::new();
        for (i, param) in type_params.iter().enumerate() {
            let arg = type_args
                .get(i)
                .copied()
                .or(param.constraint)
                .unwrap_or(TypeId::ANY);
            let _ = interner;
            subst.insert(param.name, arg);
        }
        subst
    }
}

/// Recursively replace every `TypeParameter` leaf named in `subst`.
pub fn substitute_type(interner: &TypeInterner, subst: &TypeSubstitution, type_id: TypeId) -> TypeId {
    if subst.is_empty() {
        return type_id;
    }
    let Some(data) = interner.lookup(type_id) else {
        return type_id;
    };
    match data {
        TypeData::TypeParameter(info) => subst.get(info.name).unwrap_or(type_id),

        TypeData::Array(elem) => interner.array(substitute_type(interner, subst, elem)),
        TypeData::Promise(inner) => interner.promise(substitute_type(interner, subst, inner)),
        TypeData::Generator(inner) => interner.generator(substitute_type(interner, subst, inner)),
        TypeData::AsyncGenerator(inner) => {
            interner.async_generator(substitute_type(interner, subst, inner))
        }
        TypeData::KeyOf(inner) => interner.keyof(substitute_type(interner, subst, inner)),

        TypeData::IndexedAccess { obj, index } => interner.indexed_access(
            substitute_type(interner, subst, obj),
            substitute_type(interner, subst, index),
        ),

        TypeData::Union(list) => {
            let members = interner
                .type_list(list)
                .into_iter()
                .map(|t| substitute_type(interner, subst, t))
                .collect();
            interner.union(members)
        }
        TypeData::Intersection(list) => {
            let members = interner
                .type_list(list)
                .into_iter()
                .map(|t| substitute_type(interner, subst, t))
                .collect();
            interner.intersection(members)
        }

        TypeData::Tuple(list) => {
            let elements = interner
                .tuple_list(list)
                .into_iter()
                .map(|e| TupleElement {
                    type_id: substitute_type(interner, subst, e.type_id),
                    ..e
                })
                .collect();
            interner.tuple(elements)
        }

        TypeData::Object(shape_id) => {
            let shape = interner.object_shape(shape_id);
            let properties = shape
                .properties
                .into_iter()
                .map(|p| PropertyInfo {
                    type_id: substitute_type(interner, subst, p.type_id),
                    ..p
                })
                .collect();
            let string_index = shape.string_index.map(|idx| crate::types::IndexSignature {
                value_type: substitute_type(interner, subst, idx.value_type),
                ..idx
            });
            let number_index = shape.number_index.map(|idx| crate::types::IndexSignature {
                value_type: substitute_type(interner, subst, idx.value_type),
                ..idx
            });
            interner.object_with_indices(properties, string_index, number_index, shape.symbol_index)
        }

        TypeData::Function(shape_id) => {
            let shape = interner.function_shape(shape_id);
            let params = shape
                .params
                .into_iter()
                .map(|p| ParamInfo {
                    type_id: substitute_type(interner, subst, p.type_id),
                    ..p
                })
                .collect();
            interner.function(FunctionShape {
                params,
                this_type: shape.this_type.map(|t| substitute_type(interner, subst, t)),
                return_type: substitute_type(interner, subst, shape.return_type),
                ..shape
            })
        }

        TypeData::Mapped(mapped) => interner.mapped(MappedType {
            constraint: substitute_type(interner, subst, mapped.constraint),
            name_type: mapped.name_type.map(|t| substitute_type(interner, subst, t)),
            template: substitute_type(interner, subst, mapped.template),
            ..mapped
        }),

        TypeData::Conditional(cond) => interner.conditional(ConditionalType {
            check_type: substitute_type(interner, subst, cond.check_type),
            extends_type: substitute_type(interner, subst, cond.extends_type),
            true_type: substitute_type(interner, subst, cond.true_type),
            false_type: substitute_type(interner, subst, cond.false_type),
            is_distributive: cond.is_distributive,
        }),

        TypeData::InstantiatedGeneric { def, args } => {
            let args = interner
                .type_list(args)
                .into_iter()
                .map(|t| substitute_type(interner, subst, t))
                .collect();
            interner.instantiated_generic(def, args)
        }

        // Leaf/nominal variants with no type-parameter-bearing payload.
        TypeData::Intrinsic(_)
        | TypeData::Literal(_)
        | TypeData::Class(_)
        | TypeData::Instance(_)
        | TypeData::Enum(_)
        | TypeData::Generic(_) => type_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_bare_parameter() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let param = interner.type_parameter(TypeParamInfo {
            name: t,
            constraint: None,
            default: None,
            is_const: false,
        });
        let mut subst = TypeSubstitution::new();
        subst.insert(t, TypeId::STRING);
        assert_eq!(substitute_type(&interner, &subst, param), TypeId::STRING);
    }

    #[test]
    fn substitute_traverses_array_and_object() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let param = interner.type_parameter(TypeParamInfo {
            name: t,
            constraint: None,
            default: None,
            is_const: false,
        });
        let arr = interner.array(param);
        let obj = interner.object(vec![PropertyInfo::new(interner.intern_string("items"), arr)]);

        let mut subst = TypeSubstitution::new();
        subst.insert(t, TypeId::NUMBER);
        let result = substitute_type(&interner, &subst, obj);

        let Some(TypeData::Object(shape_id)) = interner.lookup(result) else {
            panic!("expected object");
        };
        let shape = interner.object_shape(shape_id);
        let Some(TypeData::Array(elem)) = interner.lookup(shape.properties[0].type_id) else {
            panic!("expected array property");
        };
        assert_eq!(elem, TypeId::NUMBER);
    }

    #[test]
    fn from_args_defaults_missing_to_any() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let params = vec![TypeParamInfo {
            name: t,
            constraint: None,
            default: None,
            is_const: false,
        }];
        let subst = TypeSubstitution::from_args(&interner, &params, &[]);
        assert_eq!(subst.get(t), Some(TypeId::ANY));
    }
}
