//! Generic instantiation: turn `Generic(def)` + type arguments into an
//! `InstantiatedGeneric`, with its members substituted eagerly enough that
//! the checker and subtype checker never have to special-case "unsubstituted
//! generic body".

use std::cell::Cell;

use crate::intern::{TypeDatabase, TypeId, TypeInterner};
use crate::substitute::{substitute_type, TypeSubstitution};
use crate::types::TypeParamInfo;

/// Recursion guard for instantiating a generic whose own body refers back
/// to itself (e.g. `type Tree<T> = { value: T, children: Tree<T>[] }`).
/// Matches the recursion-depth limits `tsz_common::limits` already reserves
/// a category for.
pub const MAX_INSTANTIATION_DEPTH: usize = 64;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Instantiate a generic definition's body with concrete `type_args` bound
/// to `type_params`, substituting throughout.
pub fn instantiate_generic(
    interner: &TypeInterner,
    type_params: &[TypeParamInfo],
    body: TypeId,
    type_args: &[TypeId],
) -> TypeId {
    let depth = DEPTH.with(|d| {
        let v = d.get() + 1;
        d.set(v);
        v
    });
    let result = if depth > MAX_INSTANTIATION_DEPTH {
        TypeId::ERROR
    } else {
        let subst = TypeSubstitution::from_args(interner, type_params, type_args);
        let substituted = substitute_type(interner, &subst, body);
        crate::evaluate::evaluate_type(interner, substituted)
    };
    DEPTH.with(|d| d.set(d.get() - 1));
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PropertyInfo, TypeData};

    #[test]
    fn instantiates_generic_body() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let param_info = TypeParamInfo {
            name: t,
            constraint: None,
            default: None,
            is_const: false,
        };
        let param_ty = interner.type_parameter(param_info.clone());
        let body = interner.object(vec![PropertyInfo::new(interner.intern_string("value"), param_ty)]);

        let result = instantiate_generic(&interner, &[param_info], body, &[TypeId::STRING]);
        let Some(TypeData::Object(shape_id)) = interner.lookup(result) else {
            panic!("expected object");
        };
        assert_eq!(interner.object_shape(shape_id).properties[0].type_id, TypeId::STRING);
    }
}
