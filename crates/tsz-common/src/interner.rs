//! String interning for identifier and property-name deduplication.
//!
//! Every identifier, property key, and literal-string payload that flows
//! through the scanner, parser, solver, and emitter is interned into an
//! `Atom` — a cheap `Copy` handle — rather than carried around as an owned
//! `String`. This keeps `TypeData::Literal`/`PropertyInfo` small and makes
//! atom equality a single integer comparison instead of a string compare.

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;

/// A interned string handle. Cheap to copy, compares by identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(u32);

impl Atom {
    /// The empty string. Always interned first, so it is always index 0.
    pub const EMPTY: Atom = Atom(0);

    /// Reconstruct an `Atom` from an index previously obtained via
    /// [`Atom::index`]. Only meaningful when `index` came from the same
    /// `Interner` the resulting `Atom` is later resolved against.
    #[must_use]
    pub const fn from_raw(index: u32) -> Atom {
        Atom(index)
    }

    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// A single-threaded string interner.
///
/// Not `Sync`; each parse/check pass owns its own `Interner` (or shares one
/// behind an `Rc`), mirroring how a single compilation unit's identifiers
/// are deduplicated independently of other units.
pub struct Interner {
    inner: RefCell<InternerInner>,
}

struct InternerInner {
    strings: Vec<Rc<str>>,
    lookup: FxHashMap<Rc<str>, Atom>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        let mut strings = Vec::with_capacity(64);
        let mut lookup = FxHashMap::default();
        let empty: Rc<str> = Rc::from("");
        strings.push(Rc::clone(&empty));
        lookup.insert(empty, Atom::EMPTY);
        Self {
            inner: RefCell::new(InternerInner { strings, lookup }),
        }
    }

    /// Intern `text`, returning its `Atom`. Repeated calls with equal text
    /// return the same `Atom`.
    pub fn intern(&self, text: &str) -> Atom {
        let mut inner = self.inner.borrow_mut();
        if let Some(atom) = inner.lookup.get(text) {
            return *atom;
        }
        let rc: Rc<str> = Rc::from(text);
        let atom = Atom(u32::try_from(inner.strings.len()).expect("interner overflow"));
        inner.strings.push(Rc::clone(&rc));
        inner.lookup.insert(rc, atom);
        atom
    }

    /// Resolve an `Atom` back to its string contents.
    ///
    /// # Panics
    /// Panics if `atom` was not produced by this interner.
    #[must_use]
    pub fn resolve(&self, atom: Atom) -> Rc<str> {
        let inner = self.inner.borrow();
        Rc::clone(
            inner
                .strings
                .get(atom.0 as usize)
                .expect("Atom from a different interner"),
        )
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false // the empty string is always interned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_same_atom() {
        let interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_different_atom() {
        let interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("world");
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_round_trips() {
        let interner = Interner::new();
        let atom = interner.intern("x");
        assert_eq!(&*interner.resolve(atom), "x");
    }

    #[test]
    fn empty_string_is_atom_zero() {
        let interner = Interner::new();
        let atom = interner.intern("");
        assert_eq!(atom, Atom::EMPTY);
    }
}
