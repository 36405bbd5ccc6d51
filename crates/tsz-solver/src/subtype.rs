//! Structural compatibility.
//!
//! The relation is asymmetric: `is_subtype_of(source, target)` answers
//! "does `target ← source` hold", i.e. can a value of `source`'s type flow
//! into a slot declared `target`.

use rustc_hash::FxHashSet;

use crate::intern::{TypeDatabase, TypeId};
use crate::types::{Intrinsic, TypeData};

pub struct SubtypeChecker<'a> {
    db: &'a dyn TypeDatabase,
    /// Guards against infinite recursion on structurally-recursive types
    ///: once a `(source, target)` pair is
    /// on the stack, assume it holds and unwind, the standard coinductive
    /// subtyping trick.
    assuming: FxHashSet<(TypeId, TypeId)>,
}

impl<'a> SubtypeChecker<'a> {
    #[must_use]
    pub fn new(db: &'a dyn TypeDatabase) -> Self {
        SubtypeChecker {
            db,
            assuming: FxHashSet::default(),
        }
    }

    /// `target ← source`.
    pub fn is_subtype_of(&mut self, source: TypeId, target: TypeId) -> bool {
        if source == target {
            return true;
        }
        let pair = (source, target);
        if self.assuming.contains(&pair) {
            return true;
        }

        let Some(target_data) = self.db.lookup(target) else {
            return false;
        };
        let Some(source_data) = self.db.lookup(source) else {
            return false;
        };

        // Any / Unknown / Never short-circuits.
        if target == TypeId::ANY || source == TypeId::ANY {
            return true;
        }
        if target == TypeId::UNKNOWN {
            return true;
        }
        if source == TypeId::UNKNOWN {
            return target == TypeId::ANY || target == TypeId::UNKNOWN;
        }
        if source == TypeId::NEVER {
            return true;
        }
        if target == TypeId::NEVER {
            return false;
        }

        self.assuming.insert(pair);
        let result = self.is_subtype_inner(source, &source_data, target, &target_data);
        self.assuming.remove(&pair);
        result
    }

    fn is_subtype_inner(
        &mut self,
        source: TypeId,
        source_data: &TypeData,
        target: TypeId,
        target_data: &TypeData,
    ) -> bool {
        // Union target: exists i with Ui <- S.
        if let TypeData::Union(list) = target_data {
            return self
                .db
                .type_list(*list)
                .into_iter()
                .any(|member| self.is_subtype_of(source, member));
        }
        // Union source: for all i, T <- Ui.
        if let TypeData::Union(list) = source_data {
            return self
                .db
                .type_list(*list)
                .into_iter()
                .all(|member| self.is_subtype_of(member, target));
        }
        // Intersection target: A&B <- S iff A <- S and B <- S.
        if let TypeData::Intersection(list) = target_data {
            return self
                .db
                .type_list(*list)
                .into_iter()
                .all(|member| self.is_subtype_of(source, member));
        }
        // Intersection source: T <- A&B iff T <- A or T <- B.
        if let TypeData::Intersection(list) = source_data {
            return self
                .db
                .type_list(*list)
                .into_iter()
                .any(|member| self.is_subtype_of(member, target));
        }

        match (source_data, target_data) {
            // Literal to its widened primitive, never the reverse.
            (TypeData::Literal(lit), TypeData::Intrinsic(prim)) => literal_matches_primitive(lit, *prim),
            (TypeData::Literal(a), TypeData::Literal(b)) => a == b,
            (TypeData::Intrinsic(_), TypeData::Literal(_)) => false,

            (TypeData::Intrinsic(a), TypeData::Intrinsic(b)) => a == b,

            (TypeData::Array(s_elem), TypeData::Array(t_elem)) => {
                self.is_subtype_of(*s_elem, *t_elem)
            }
            (TypeData::Tuple(s_list), TypeData::Array(t_elem)) => self
                .db
                .tuple_list(*s_list)
                .into_iter()
                .all(|e| self.is_subtype_of(e.type_id, *t_elem)),
            (TypeData::Tuple(s_list), TypeData::Tuple(t_list)) => {
                self.tuple_subtype(*s_list, *t_list)
            }

            (TypeData::Object(s_shape), TypeData::Object(t_shape)) => {
                self.object_subtype(*s_shape, *t_shape, source)
            }
            (TypeData::Instance(a), TypeData::Instance(b)) => {
                a == b || self.class_extends(*a, *b)
            }

            (TypeData::Function(s_fn), TypeData::Function(t_fn)) => {
                self.function_subtype(*s_fn, *t_fn)
            }

            (TypeData::Promise(s_inner), TypeData::Promise(t_inner)) => {
                self.is_subtype_of(*s_inner, *t_inner)
            }
            (TypeData::Generator(s_inner), TypeData::Generator(t_inner)) => {
                self.is_subtype_of(*s_inner, *t_inner)
            }
            (TypeData::AsyncGenerator(s_inner), TypeData::AsyncGenerator(t_inner)) => {
                self.is_subtype_of(*s_inner, *t_inner)
            }

            (TypeData::Enum(a), TypeData::Enum(b)) => a == b,

            (
                TypeData::InstantiatedGeneric { def: s_def, args: s_args },
                TypeData::InstantiatedGeneric { def: t_def, args: t_args },
            ) => {
                // Invariant by default.
                s_def == t_def
                    && {
                        let s_args = self.db.type_list(*s_args);
                        let t_args = self.db.type_list(*t_args);
                        s_args.len() == t_args.len()
                            && s_args
                                .iter()
                                .zip(t_args.iter())
                                .all(|(&s, &t)| self.is_subtype_of(s, t) && self.is_subtype_of(t, s))
                    }
            }

            _ => {
                let _ = (source, target);
                false
            }
        }
    }

    fn tuple_subtype(&mut self, s_list: crate::intern::ListId, t_list: crate::intern::ListId) -> bool {
        let s_elems = self.db.tuple_list(s_list);
        let t_elems = self.db.tuple_list(t_list);
        let s_required = s_elems.iter().filter(|e| !e.optional && !e.rest).count();
        let t_required = t_elems.iter().filter(|e| !e.optional && !e.rest).count();
        if s_required < t_required {
            return false;
        }
        let t_has_rest = t_elems.last().is_some_and(|e| e.rest);
        if !t_has_rest && s_elems.len() != t_elems.len() && !s_elems.last().is_some_and(|e| e.rest) {
            return false;
        }
        for (s_elem, t_elem) in s_elems.iter().zip(t_elems.iter()) {
            if !self.is_subtype_of(s_elem.type_id, t_elem.type_id) {
                return false;
            }
        }
        true
    }

    fn object_subtype(
        &mut self,
        s_shape: crate::intern::ObjectShapeId,
        t_shape: crate::intern::ObjectShapeId,
        source: TypeId,
    ) -> bool {
        let s = self.db.object_shape(s_shape);
        let t = self.db.object_shape(t_shape);
        for prop in &t.properties {
            match s.find(prop.name) {
                Some(s_prop) => {
                    if !self.is_subtype_of(s_prop.type_id, prop.type_id) {
                        return false;
                    }
                }
                None => {
                    if let Some(idx) = &t.string_index {
                        if self.is_subtype_of(prop.type_id, idx.value_type) {
                            continue;
                        }
                    }
                    if !prop.optional {
                        return false;
                    }
                }
            }
        }
        if s.flags.contains(crate::types::ObjectFlags::FRESH) && t.string_index.is_none() {
            let known: FxHashSet<_> = t.properties.iter().map(|p| p.name).collect();
            for prop in &s.properties {
                if !known.contains(&prop.name) {
                    return false;
                }
            }
        }
        let _ = source;
        true
    }

    fn function_subtype(
        &mut self,
        s_shape: crate::intern::FunctionShapeId,
        t_shape: crate::intern::FunctionShapeId,
    ) -> bool {
        let s = self.db.function_shape(s_shape);
        let t = self.db.function_shape(t_shape);
        if s.required_count() > t.required_count() {
            return false;
        }
        // Parameters are contravariant: each target param must flow into
        // the matching source param.
        for (s_param, t_param) in s.params.iter().zip(t.params.iter()) {
            if !self.is_subtype_of(t_param.type_id, s_param.type_id) {
                return false;
            }
        }
        if s.has_rest() && !t.has_rest() && t.params.len() < s.params.len() {
            return false;
        }
        // Return type is covariant.
        self.is_subtype_of(s.return_type, t.return_type)
    }

    fn class_extends(&self, a: crate::types::DefId, b: crate::types::DefId) -> bool {
        let mut current = self.db.class_shape(a);
        while let Some(shape) = current {
            if let Some(sup) = shape.super_class {
                if sup == b {
                    return true;
                }
                current = self.db.class_shape(sup);
            } else {
                break;
            }
        }
        false
    }
}

fn literal_matches_primitive(lit: &crate::types::LiteralValue, prim: Intrinsic) -> bool {
    matches!(
        (lit, prim),
        (crate::types::LiteralValue::String(_), Intrinsic::String)
            | (crate::types::LiteralValue::Number(_), Intrinsic::Number)
            | (crate::types::LiteralValue::Boolean(_), Intrinsic::Boolean)
            | (crate::types::LiteralValue::BigInt(_), Intrinsic::BigInt)
    )
}

/// Convenience free function reading as `target ← source`: is `source`
/// assignable to `target`?
pub fn compatible(db: &dyn TypeDatabase, target: TypeId, source: TypeId) -> bool {
    SubtypeChecker::new(db).is_subtype_of(source, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::TypeInterner;
    use crate::types::PropertyInfo;

    #[test]
    fn reflexive() {
        let interner = TypeInterner::new();
        let mut checker = SubtypeChecker::new(&interner);
        assert!(checker.is_subtype_of(TypeId::STRING, TypeId::STRING));
    }

    #[test]
    fn literal_to_primitive_one_way() {
        let interner = TypeInterner::new();
        let lit = interner.literal_string("a");
        let mut checker = SubtypeChecker::new(&interner);
        assert!(checker.is_subtype_of(lit, TypeId::STRING));
        assert!(!checker.is_subtype_of(TypeId::STRING, lit));
    }

    #[test]
    fn union_target_any_member() {
        let interner = TypeInterner::new();
        let u = interner.union2(TypeId::STRING, TypeId::NUMBER);
        let mut checker = SubtypeChecker::new(&interner);
        assert!(checker.is_subtype_of(TypeId::STRING, u));
        assert!(!checker.is_subtype_of(TypeId::BOOLEAN, u));
    }

    #[test]
    fn excess_property_rejected_on_fresh_literal() {
        let interner = TypeInterner::new();
        let target = interner.object(vec![PropertyInfo::new(interner.intern_string("x"), TypeId::STRING)]);
        let fresh = interner.fresh_object(vec![
            PropertyInfo::new(interner.intern_string("x"), TypeId::STRING),
            PropertyInfo::new(interner.intern_string("y"), TypeId::NUMBER),
        ]);
        let mut checker = SubtypeChecker::new(&interner);
        assert!(!checker.is_subtype_of(fresh, target));
    }

    #[test]
    fn excess_property_allowed_once_widened() {
        let interner = TypeInterner::new();
        let target = interner.object(vec![PropertyInfo::new(interner.intern_string("x"), TypeId::STRING)]);
        let widened = interner.object(vec![
            PropertyInfo::new(interner.intern_string("x"), TypeId::STRING),
            PropertyInfo::new(interner.intern_string("y"), TypeId::NUMBER),
        ]);
        let mut checker = SubtypeChecker::new(&interner);
        assert!(checker.is_subtype_of(widened, target));
    }

    #[test]
    fn function_params_contravariant_return_covariant() {
        let interner = TypeInterner::new();
        let narrow_param = crate::types::ParamInfo {
            name: None,
            type_id: interner.literal_string("a"),
            optional: false,
            rest: false,
        };
        let wide_param = crate::types::ParamInfo {
            name: None,
            type_id: TypeId::STRING,
            optional: false,
            rest: false,
        };
        let source = interner.function(crate::types::FunctionShape {
            params: vec![wide_param],
            this_type: None,
            return_type: interner.literal_string("x"),
            type_params: vec![],
            type_predicate: None,
            is_constructor: false,
            is_method: false,
        });
        let target = interner.function(crate::types::FunctionShape {
            params: vec![narrow_param],
            this_type: None,
            return_type: TypeId::STRING,
            type_params: vec![],
            type_predicate: None,
            is_constructor: false,
            is_method: false,
        });
        let mut checker = SubtypeChecker::new(&interner);
        assert!(checker.is_subtype_of(source, target));
    }
}
