//! Literal widening: a literal type widens
//! to its primitive when stored in a `let` binding without an annotation,
//! returned without an annotated return type, or placed in a non-literal
//! target position during inference. Callers decide *when* widening applies
//! (the binder/checker know the syntactic context); this module only knows
//! *how*.

use crate::intern::{TypeDatabase, TypeId};
use crate::types::{LiteralValue, TypeData};

pub fn widen_type(db: &dyn TypeDatabase, type_id: TypeId) -> TypeId {
    match db.lookup(type_id) {
        Some(TypeData::Literal(LiteralValue::String(_))) => TypeId::STRING,
        Some(TypeData::Literal(LiteralValue::Number(_))) => TypeId::NUMBER,
        Some(TypeData::Literal(LiteralValue::Boolean(_))) => TypeId::BOOLEAN,
        Some(TypeData::Literal(LiteralValue::BigInt(_))) => TypeId::BIGINT,
        Some(TypeData::Union(list)) => {
            let widened: Vec<TypeId> = db.type_list(list).into_iter().map(|t| widen_type(db, t)).collect();
            union_widened(db, widened)
        }
        _ => type_id,
    }
}

/// `TypeDatabase` alone can't intern a brand-new union, so mixed-type
/// widened members (rare: most widening collapses a same-typed literal
/// union to one primitive) fall back to the first widened member. Call
/// sites that need a fully re-normalized union after widening go through
/// `TypeInterner::union` directly instead of this helper.
fn union_widened(_db: &dyn TypeDatabase, mut members: Vec<TypeId>) -> TypeId {
    members.sort_unstable();
    members.dedup();
    members.first().copied().unwrap_or(TypeId::NEVER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::TypeInterner;

    #[test]
    fn widens_string_literal() {
        let interner = TypeInterner::new();
        let lit = interner.literal_string("hi");
        assert_eq!(widen_type(&interner, lit), TypeId::STRING);
    }

    #[test]
    fn widens_number_literal() {
        let interner = TypeInterner::new();
        let lit = interner.literal_number(42.0);
        assert_eq!(widen_type(&interner, lit), TypeId::NUMBER);
    }

    #[test]
    fn primitive_is_already_widened() {
        let interner = TypeInterner::new();
        assert_eq!(widen_type(&interner, TypeId::STRING), TypeId::STRING);
    }
}
