//! The persistent `NarrowingContext`.
//!
//! Implemented as an `Rc`-shared cons list rather than a cloned hash map:
//! pushing a narrowing (the hot path — every `if`/`&&`/ternary branch does
//! this) is O(1) and structurally shares everything below it, avoiding an
//! O(n) clone per nesting level (see DESIGN.md for why no external
//! persistent-map crate is pulled in for this).

use std::rc::Rc;

use tsz_common::Atom;

use crate::intern::TypeId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementKey {
    String(Atom),
    Number(i64),
}

/// A narrowing key: a variable or a property/element access chain off one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NarrowingPath {
    Variable(Atom),
    PropertyAccess(Rc<NarrowingPath>, Atom),
    ElementAccess(Rc<NarrowingPath>, ElementKey),
}

impl NarrowingPath {
    #[must_use]
    pub fn property(base: &Rc<NarrowingPath>, name: Atom) -> Rc<NarrowingPath> {
        Rc::new(NarrowingPath::PropertyAccess(Rc::clone(base), name))
    }

    /// `self` is a prefix of `other`, or vice-versa.
    #[must_use]
    pub fn overlaps(&self, other: &NarrowingPath) -> bool {
        Self::is_prefix(self, other) || Self::is_prefix(other, self)
    }

    fn is_prefix(prefix: &NarrowingPath, whole: &NarrowingPath) -> bool {
        if prefix == whole {
            return true;
        }
        match whole {
            NarrowingPath::Variable(_) => false,
            NarrowingPath::PropertyAccess(base, _) => Self::is_prefix(prefix, base),
            NarrowingPath::ElementAccess(base, _) => Self::is_prefix(prefix, base),
        }
    }
}

struct Node {
    path: Rc<NarrowingPath>,
    type_id: TypeId,
    next: Option<Rc<Node>>,
}

/// Persistent map `NarrowingPath -> TypeId`. Cloning a context
/// is a pointer bump; `insert` prepends a new head; `get` walks from the
/// head so the most recently inserted narrowing for a path always wins.
#[derive(Clone, Default)]
pub struct NarrowingContext {
    head: Option<Rc<Node>>,
}

impl NarrowingContext {
    #[must_use]
    pub fn empty() -> Self {
        NarrowingContext::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    #[must_use]
    pub fn insert(&self, path: Rc<NarrowingPath>, type_id: TypeId) -> NarrowingContext {
        NarrowingContext {
            head: Some(Rc::new(Node {
                path,
                type_id,
                next: self.head.clone(),
            })),
        }
    }

    #[must_use]
    pub fn get(&self, path: &NarrowingPath) -> Option<TypeId> {
        let mut cur = self.head.as_ref();
        while let Some(node) = cur {
            if &*node.path == path {
                return Some(node.type_id);
            }
            cur = node.next.as_ref();
        }
        None
    }

    /// Assignment to `path` invalidates every narrowing whose key overlaps
    /// it. Only the first (most recent) entry
    /// for each surviving path is kept, so the result has no shadowed dups.
    #[must_use]
    pub fn invalidate(&self, path: &NarrowingPath) -> NarrowingContext {
        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        let mut cur = self.head.as_ref();
        while let Some(node) = cur {
            if !node.path.overlaps(path) && seen.insert(node.path.clone()) {
                entries.push((node.path.clone(), node.type_id));
            }
            cur = node.next.as_ref();
        }
        entries.into_iter().rev().fold(NarrowingContext::empty(), |ctx, (p, t)| ctx.insert(p, t))
    }

    /// Join-point merge: for each path present in both contexts, union the
    /// two narrowed types; a path present in only one is dropped.
    #[must_use]
    pub fn merge(&self, other: &NarrowingContext, interner: &crate::intern::TypeInterner) -> NarrowingContext {
        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();
        let mut cur = self.head.as_ref();
        while let Some(node) = cur {
            if seen.insert(node.path.clone()) {
                if let Some(other_ty) = other.get(&node.path) {
                    let merged = interner.union(vec![node.type_id, other_ty]);
                    entries.push((node.path.clone(), merged));
                }
            }
            cur = node.next.as_ref();
        }
        entries.into_iter().rev().fold(NarrowingContext::empty(), |ctx, (p, t)| ctx.insert(p, t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::TypeInterner;

    fn var(interner: &TypeInterner, name: &str) -> Rc<NarrowingPath> {
        Rc::new(NarrowingPath::Variable(interner.intern_string(name)))
    }

    #[test]
    fn insert_and_get() {
        let interner = TypeInterner::new();
        let x = var(&interner, "x");
        let ctx = NarrowingContext::empty().insert(Rc::clone(&x), TypeId::STRING);
        assert_eq!(ctx.get(&x), Some(TypeId::STRING));
    }

    #[test]
    fn later_insert_shadows_earlier() {
        let interner = TypeInterner::new();
        let x = var(&interner, "x");
        let ctx = NarrowingContext::empty()
            .insert(Rc::clone(&x), TypeId::STRING)
            .insert(Rc::clone(&x), TypeId::NUMBER);
        assert_eq!(ctx.get(&x), Some(TypeId::NUMBER));
    }

    #[test]
    fn invalidate_drops_prefix_and_suffix_paths() {
        let interner = TypeInterner::new();
        let x = var(&interner, "x");
        let prop = NarrowingPath::property(&x, interner.intern_string("y"));
        let ctx = NarrowingContext::empty()
            .insert(Rc::clone(&x), TypeId::STRING)
            .insert(Rc::clone(&prop), TypeId::NUMBER);
        let invalidated = ctx.invalidate(&x);
        assert_eq!(invalidated.get(&x), None);
        assert_eq!(invalidated.get(&prop), None);
    }

    #[test]
    fn invalidate_keeps_unrelated_paths() {
        let interner = TypeInterner::new();
        let x = var(&interner, "x");
        let y = var(&interner, "y");
        let ctx = NarrowingContext::empty()
            .insert(Rc::clone(&x), TypeId::STRING)
            .insert(Rc::clone(&y), TypeId::NUMBER);
        let invalidated = ctx.invalidate(&x);
        assert_eq!(invalidated.get(&y), Some(TypeId::NUMBER));
    }

    #[test]
    fn merge_unions_common_paths_and_drops_unique() {
        let interner = TypeInterner::new();
        let x = var(&interner, "x");
        let y = var(&interner, "y");
        let a = NarrowingContext::empty()
            .insert(Rc::clone(&x), TypeId::STRING)
            .insert(Rc::clone(&y), TypeId::NUMBER);
        let b = NarrowingContext::empty().insert(Rc::clone(&x), TypeId::BOOLEAN);
        let merged = a.merge(&b, &interner);
        assert_eq!(merged.get(&y), None);
        let merged_x = merged.get(&x).unwrap();
        assert!(matches!(
            interner.lookup(merged_x),
            Some(crate::types::TypeData::Union(_))
        ));
    }
}
