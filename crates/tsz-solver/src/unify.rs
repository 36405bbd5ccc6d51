//! Type-argument inference for generic call sites. Unifies each formal parameter type with the
//! corresponding argument type, collecting bindings via `ena`'s union-find
//! table (see DESIGN.md).

use ena::unify::{EqUnifyValue, InPlaceUnificationTable, UnifyKey};
use rustc_hash::FxHashMap;
use tsz_common::Atom;

use crate::intern::{TypeDatabase, TypeId, TypeInterner};
use crate::substitute::TypeSubstitution;
use crate::types::{TypeData, TypeParamInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct InferKey(u32);

impl UnifyKey for InferKey {
    type Value = Option<TypeId>;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        InferKey(u)
    }

    fn tag() -> &'static str {
        "InferKey"
    }
}

impl EqUnifyValue for TypeId {}

/// Collects `TypeParameter -> TypeId` candidate bindings while unifying a
/// generic call's formal parameter types against its argument types.
pub struct InferenceContext<'a> {
    interner: &'a TypeInterner,
    table: InPlaceUnificationTable<InferKey>,
    keys: FxHashMap<Atom, InferKey>,
    /// Conflicting bindings for one type parameter widen to a union rather
    /// than failing outright.
    candidates: FxHashMap<Atom, Vec<TypeId>>,
}

impl<'a> InferenceContext<'a> {
    #[must_use]
    pub fn new(interner: &'a TypeInterner, type_params: &[TypeParamInfo]) -> Self {
        let mut table = InPlaceUnificationTable::new();
        let mut keys = FxHashMap::default();
        for param in type_params {
            let key = table.new_key(None);
            keys.insert(param.name, key);
        }
        InferenceContext {
            interner,
            table,
            keys,
            candidates: FxHashMap::default(),
        }
    }

    fn record(&mut self, name: Atom, candidate: TypeId) {
        self.candidates.entry(name).or_default().push(candidate);
        if let Some(&key) = self.keys.get(&name) {
            let _ = self.table.unify_var_value(key, Some(candidate));
        }
    }

    /// Unify `param_type` (the declared parameter type, possibly containing
    /// bare type parameters) against `arg_type` (the argument's inferred
    /// type), recording any type-parameter bindings this reveals.
    pub fn unify(&mut self, param_type: TypeId, arg_type: TypeId) {
        let Some(param_data) = self.interner.lookup(param_type) else {
            return;
        };
        match param_data {
            TypeData::TypeParameter(info) if self.keys.contains_key(&info.name) => {
                self.record(info.name, arg_type);
            }
            TypeData::Array(elem) => {
                if let Some(TypeData::Array(arg_elem)) = self.interner.lookup(arg_type) {
                    self.unify(elem, arg_elem);
                } else if let Some(TypeData::Tuple(list)) = self.interner.lookup(arg_type) {
                    for t in self.interner.tuple_list(list) {
                        self.unify(elem, t.type_id);
                    }
                }
            }
            TypeData::Promise(inner) => {
                if let Some(TypeData::Promise(arg_inner)) = self.interner.lookup(arg_type) {
                    self.unify(inner, arg_inner);
                }
            }
            TypeData::Function(shape_id) => {
                if let Some(TypeData::Function(arg_shape_id)) = self.interner.lookup(arg_type) {
                    let shape = self.interner.function_shape(shape_id);
                    let arg_shape = self.interner.function_shape(arg_shape_id);
                    for (p, a) in shape.params.iter().zip(arg_shape.params.iter()) {
                        self.unify(p.type_id, a.type_id);
                    }
                    self.unify(shape.return_type, arg_shape.return_type);
                }
            }
            TypeData::InstantiatedGeneric { def, args } => {
                if let Some(TypeData::InstantiatedGeneric { def: arg_def, args: arg_args }) =
                    self.interner.lookup(arg_type)
                {
                    if def == arg_def {
                        let params = self.interner.type_list(args);
                        let arg_params = self.interner.type_list(arg_args);
                        for (p, a) in params.iter().zip(arg_params.iter()) {
                            self.unify(*p, *a);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Finish inference: absent bindings default to the parameter's
    /// constraint or `Any`; multiple conflicting candidates widen to a union.
    #[must_use]
    pub fn finish(self, type_params: &[TypeParamInfo]) -> TypeSubstitution {
        let mut subst = TypeSubstitution::new();
        for param in type_params {
            let resolved = match self.candidates.get(&param.name) {
                Some(candidates) if candidates.len() == 1 => candidates[0],
                Some(candidates) if candidates.len() > 1 => self.interner.union(candidates.clone()),
                _ => param.constraint.unwrap_or(TypeId::ANY),
            };
            subst.insert(param.name, resolved);
        }
        subst
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_simple_parameter() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let params = vec![TypeParamInfo {
            name: t,
            constraint: None,
            default: None,
            is_const: false,
        }];
        let param_ty = interner.type_parameter(params[0].clone());

        let mut ctx = InferenceContext::new(&interner, &params);
        ctx.unify(param_ty, TypeId::STRING);
        let subst = ctx.finish(&params);
        assert_eq!(subst.get(t), Some(TypeId::STRING));
    }

    #[test]
    fn infers_through_array() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let params = vec![TypeParamInfo {
            name: t,
            constraint: None,
            default: None,
            is_const: false,
        }];
        let param_ty = interner.type_parameter(params[0].clone());
        let array_param = interner.array(param_ty);
        let array_arg = interner.array(TypeId::NUMBER);

        let mut ctx = InferenceContext::new(&interner, &params);
        ctx.unify(array_param, array_arg);
        let subst = ctx.finish(&params);
        assert_eq!(subst.get(t), Some(TypeId::NUMBER));
    }

    #[test]
    fn conflicting_bindings_widen_to_union() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let params = vec![TypeParamInfo {
            name: t,
            constraint: None,
            default: None,
            is_const: false,
        }];
        let param_ty = interner.type_parameter(params[0].clone());

        let mut ctx = InferenceContext::new(&interner, &params);
        ctx.unify(param_ty, TypeId::STRING);
        ctx.unify(param_ty, TypeId::NUMBER);
        let subst = ctx.finish(&params);
        let resolved = subst.get(t).unwrap();
        assert!(matches!(interner.lookup(resolved), Some(TypeData::Union(_))));
    }

    #[test]
    fn missing_binding_defaults_to_constraint() {
        let interner = TypeInterner::new();
        let t = interner.intern_string("T");
        let params = vec![TypeParamInfo {
            name: t,
            constraint: Some(TypeId::STRING),
            default: None,
            is_const: false,
        }];
        let ctx = InferenceContext::new(&interner, &params);
        let subst = ctx.finish(&params);
        assert_eq!(subst.get(t), Some(TypeId::STRING));
    }
}
