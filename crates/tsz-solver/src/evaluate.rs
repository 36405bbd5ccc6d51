//! Evaluation of computed types: `keyof`, indexed access, mapped types, and
//! conditional types.

use tsz_common::Atom;

use crate::intern::{TypeDatabase, TypeId, TypeInterner};
use crate::subtype::SubtypeChecker;
use crate::types::{LiteralValue, MappedModifier, PropertyInfo, TypeData};

/// Force `type_id` to normal form: resolve `KeyOf`/`IndexedAccess`/`Mapped`/
/// `Conditional` nodes into their expansion. Anything else is returned
/// unchanged (already normal).
pub fn evaluate_type(interner: &TypeInterner, type_id: TypeId) -> TypeId {
    match interner.lookup(type_id) {
        Some(TypeData::KeyOf(inner)) => evaluate_keyof(interner, inner),
        Some(TypeData::IndexedAccess { obj, index }) => evaluate_indexed_access(interner, obj, index),
        Some(TypeData::Mapped(mapped)) => evaluate_mapped(interner, &mapped),
        Some(TypeData::Conditional(cond)) => evaluate_conditional(interner, &cond),
        _ => type_id,
    }
}

fn keys_of_object(interner: &TypeInterner, shape_id: crate::intern::ObjectShapeId) -> Vec<TypeId> {
    let shape = interner.object_shape(shape_id);
    let mut keys: Vec<TypeId> = shape
        .properties
        .iter()
        .map(|p| {
            let text = interner.resolve_atom(p.name);
            interner.literal_string(&text)
        })
        .collect();
    // An index signature widens the key union with its declared key
    // primitive (string/number), matching TypeScript's `keyof { [k: string]: T }`.
    if shape.string_index.is_some() {
        keys.push(TypeId::STRING);
    }
    if shape.number_index.is_some() {
        keys.push(TypeId::NUMBER);
    }
    keys
}

fn evaluate_keyof(interner: &TypeInterner, inner: TypeId) -> TypeId {
    let resolved = evaluate_type(interner, inner);
    match interner.lookup(resolved) {
        Some(TypeData::Object(shape_id)) => {
            let keys = keys_of_object(interner, shape_id);
            interner.union(keys)
        }
        // keyof (A & B) = keyof A | keyof B
        Some(TypeData::Intersection(list)) => {
            let keys: Vec<TypeId> = interner
                .type_list(list)
                .into_iter()
                .map(|t| evaluate_keyof(interner, t))
                .collect();
            interner.union(keys)
        }
        // keyof (A | B) = keyof A & keyof B
        Some(TypeData::Union(list)) => {
            let members = interner.type_list(list);
            let mut iter = members.into_iter().map(|t| evaluate_keyof(interner, t));
            let Some(first) = iter.next() else {
                return TypeId::NEVER;
            };
            iter.fold(first, |acc, k| interner.intersection(vec![acc, k]))
        }
        // keyof a bare type parameter is deferred until substitution
        // resolves it to a concrete object shape.
        Some(TypeData::TypeParameter(_)) => interner.keyof(resolved),
        _ => TypeId::NEVER,
    }
}

/// `T[K]`.
fn evaluate_indexed_access(interner: &TypeInterner, obj: TypeId, index: TypeId) -> TypeId {
    let obj = evaluate_type(interner, obj);
    let index = evaluate_type(interner, index);

    let keys: Vec<TypeId> = match interner.lookup(index) {
        Some(TypeData::Union(list)) => interner.type_list(list),
        _ => vec![index],
    };

    let Some(TypeData::Object(shape_id)) = interner.lookup(obj) else {
        return TypeId::ERROR;
    };
    let shape = interner.object_shape(shape_id);

    let mut results = Vec::with_capacity(keys.len());
    for key in keys {
        let found = match interner.lookup(key) {
            Some(TypeData::Literal(LiteralValue::String(atom))) => shape
                .find(atom)
                .map(|p| p.type_id)
                .or_else(|| shape.string_index.as_ref().map(|idx| idx.value_type)),
            _ if key == TypeId::STRING => shape.string_index.as_ref().map(|idx| idx.value_type),
            _ if key == TypeId::NUMBER => shape.number_index.as_ref().map(|idx| idx.value_type),
            _ => None,
        };
        match found {
            Some(t) => results.push(t),
            None => return TypeId::ERROR,
        }
    }
    interner.union(results)
}

/// `{ [P in C]: V }`.
fn evaluate_mapped(interner: &TypeInterner, mapped: &crate::types::MappedType) -> TypeId {
    let constraint = evaluate_type(interner, mapped.constraint);
    let keys: Vec<TypeId> = if constraint == TypeId::NEVER {
        vec![]
    } else {
        match interner.lookup(constraint) {
            Some(TypeData::Union(list)) => interner.type_list(list),
            _ => vec![constraint],
        }
    };

    let mut properties = Vec::with_capacity(keys.len());
    for key in keys {
        let key_text = match interner.lookup(key) {
            Some(TypeData::Literal(LiteralValue::String(atom))) => interner.resolve_atom(atom),
            _ => continue,
        };

        // Key remapping: substitute P with the current key in the `as`
        // clause; `Never` filters the key out, a string literal renames it.
        let (final_key_atom, skip) = if let Some(name_type) = mapped.name_type {
            let remapped = substitute_param(interner, name_type, mapped.type_param.name, key);
            let remapped = apply_intrinsic_string_op(interner, evaluate_type(interner, remapped), &key_text);
            match interner.lookup(remapped) {
                Some(TypeData::Literal(LiteralValue::String(atom))) => (atom, false),
                _ if remapped == TypeId::NEVER => (Atom::EMPTY, true),
                _ => (interner.intern_string(&key_text), false),
            }
        } else {
            (interner.intern_string(&key_text), false)
        };
        if skip {
            continue;
        }

        let substituted_template = substitute_param(interner, mapped.template, mapped.type_param.name, key);
        let value_type = evaluate_type(interner, substituted_template);

        let mut prop = PropertyInfo::new(final_key_atom, value_type);
        prop.optional = mapped.optional_modifier == Some(MappedModifier::Add);
        prop.readonly = mapped.readonly_modifier == Some(MappedModifier::Add);
        properties.push(prop);
    }
    interner.object(properties)
}

/// Built-in intrinsic string-literal transforms available in an `as` clause.
/// These are recognized by convention as zero-arg generic aliases the checker
/// resolves to a marker `IndexedAccess` before evaluation reaches here; this
/// is a best-effort passthrough for the common case where the `as` clause is
/// already a plain string literal (the checker performs the actual case
/// transform when it sees the intrinsic alias name).
fn apply_intrinsic_string_op(_interner: &TypeInterner, remapped: TypeId, _original_key: &str) -> TypeId {
    remapped
}

/// Substitute every occurrence of the mapped type's own type parameter
/// (`P`) with `key` inside `template`.
fn substitute_param(interner: &TypeInterner, template: TypeId, param_name: Atom, key: TypeId) -> TypeId {
    let mut subst = crate::substitute::TypeSubstitution::new();
    subst.insert(param_name, key);
    crate::substitute::substitute_type(interner, &subst, template)
}

/// `T extends U ? X : Y`.
fn evaluate_conditional(interner: &TypeInterner, cond: &crate::types::ConditionalType) -> TypeId {
    let check = evaluate_type(interner, cond.check_type);
    if cond.is_distributive {
        if let Some(TypeData::Union(list)) = interner.lookup(check) {
            let members = interner.type_list(list);
            let results: Vec<TypeId> = members
                .into_iter()
                .map(|member| {
                    let branch = crate::types::ConditionalType {
                        check_type: member,
                        extends_type: cond.extends_type,
                        true_type: cond.true_type,
                        false_type: cond.false_type,
                        is_distributive: false,
                    };
                    evaluate_conditional(interner, &branch)
                })
                .collect();
            return interner.union(results);
        }
    }
    let extends = evaluate_type(interner, cond.extends_type);
    let mut checker = SubtypeChecker::new(interner);
    if checker.is_subtype_of(check, extends) {
        evaluate_type(interner, cond.true_type)
    } else {
        evaluate_type(interner, cond.false_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeParamInfo;

    #[test]
    fn keyof_object_yields_literal_union() {
        let interner = TypeInterner::new();
        let obj = interner.object(vec![
            PropertyInfo::new(interner.intern_string("a"), TypeId::STRING),
            PropertyInfo::new(interner.intern_string("b"), TypeId::NUMBER),
        ]);
        let keyof = interner.keyof(obj);
        let result = evaluate_type(&interner, keyof);
        let Some(TypeData::Union(list)) = interner.lookup(result) else {
            panic!("expected union of literal keys");
        };
        assert_eq!(interner.type_list(list).len(), 2);
    }

    #[test]
    fn mapped_type_partial_adds_optional() {
        let interner = TypeInterner::new();
        let keys = interner.union(vec![interner.literal_string("x"), interner.literal_string("y")]);
        let p = interner.intern_string("P");
        let mapped = interner.mapped(crate::types::MappedType {
            type_param: TypeParamInfo {
                name: p,
                constraint: None,
                default: None,
                is_const: false,
            },
            constraint: keys,
            name_type: None,
            template: TypeId::NUMBER,
            optional_modifier: Some(MappedModifier::Add),
            readonly_modifier: None,
        });
        let result = evaluate_type(&interner, mapped);
        let Some(TypeData::Object(shape_id)) = interner.lookup(result) else {
            panic!("expected object");
        };
        let shape = interner.object_shape(shape_id);
        assert_eq!(shape.properties.len(), 2);
        assert!(shape.properties.iter().all(|p| p.optional));
    }

    #[test]
    fn conditional_picks_true_branch() {
        let interner = TypeInterner::new();
        let cond = interner.conditional(crate::types::ConditionalType {
            check_type: TypeId::STRING,
            extends_type: TypeId::STRING,
            true_type: TypeId::NUMBER,
            false_type: TypeId::BOOLEAN,
            is_distributive: false,
        });
        assert_eq!(evaluate_type(&interner, cond), TypeId::NUMBER);
    }
}
