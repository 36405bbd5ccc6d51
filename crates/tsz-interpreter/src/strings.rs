//! A frozen `Atom -> Arc<str>` snapshot, taken once before interpretation
//! starts.
//!
//! `tsz_common::Interner` is `Rc`-backed (single-threaded by design, see its
//! own doc comment), so it cannot be shared into a generator/async body's
//! spawned thread (`coroutine.rs`). Every atom a program will ever resolve
//! at runtime — identifiers, property names, string literals — is already
//! interned by the time parsing and checking finish, so resolving the
//! whole table to `Arc<str>` up front and sharing that instead costs one
//! pass over the interner and never touches it again.

use std::sync::Arc;

use tsz_common::{Atom, Interner};

#[derive(Clone)]
pub struct AtomTable(Arc<Vec<Arc<str>>>);

impl AtomTable {
    #[must_use]
    pub fn snapshot(interner: &Interner) -> Self {
        let table = (0..interner.len())
            .map(|i| {
                let atom = Atom::from_raw(u32::try_from(i).expect("interner index overflow"));
                Arc::from(&*interner.resolve(atom))
            })
            .collect();
        AtomTable(Arc::new(table))
    }

    #[must_use]
    pub fn resolve(&self, atom: Atom) -> Arc<str> {
        self.0.get(atom.index() as usize).cloned().unwrap_or_else(|| Arc::from(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_resolves_every_interned_atom() {
        let interner = Interner::new();
        let hello = interner.intern("hello");
        let world = interner.intern("world");
        let table = AtomTable::snapshot(&interner);
        assert_eq!(&*table.resolve(hello), "hello");
        assert_eq!(&*table.resolve(world), "world");
    }

    #[test]
    fn snapshot_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AtomTable>();
    }
}
