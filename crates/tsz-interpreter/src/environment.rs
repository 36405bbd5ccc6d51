//! The runtime counterpart of `tsz-binder`'s static `ScopeArena`: a lexically nested chain of bindings, resolved by
//! name at evaluation time rather than by the binder's pre-resolved
//! `SymbolId`. Kept separate from the static scope chain because the
//! interpreter creates a fresh `Environment` per call, while the binder's
//! scopes are one-per-file and shared across every evaluation of that file.

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;
use tsz_common::Atom;

use crate::value::Value;

struct Frame {
    bindings: FxHashMap<Atom, Value>,
    parent: Option<Environment>,
}

/// Cheap to clone (an `Arc` around the frame); cloning an `Environment`
/// shares the same bindings, which is exactly what a closure needs when it
/// captures its defining environment.
#[derive(Clone)]
pub struct Environment(Arc<Mutex<Frame>>);

impl Environment {
    #[must_use]
    pub fn root() -> Self {
        Environment(Arc::new(Mutex::new(Frame { bindings: FxHashMap::default(), parent: None })))
    }

    #[must_use]
    pub fn child(&self) -> Self {
        Environment(Arc::new(Mutex::new(Frame { bindings: FxHashMap::default(), parent: Some(self.clone()) })))
    }

    /// Declare `name` in this environment's own frame, shadowing any outer
    /// binding of the same name.
    pub fn declare(&self, name: Atom, value: Value) {
        self.0.lock().expect("environment mutex poisoned").bindings.insert(name, value);
    }

    #[must_use]
    pub fn get(&self, name: Atom) -> Option<Value> {
        let frame = self.0.lock().expect("environment mutex poisoned");
        if let Some(v) = frame.bindings.get(&name) {
            return Some(v.clone());
        }
        frame.parent.as_ref().and_then(|p| p.get(name))
    }

    /// Walk outward assigning to the nearest frame that already declares
    /// `name`; returns `false` if no such frame exists (an undeclared
    /// assignment target, which the checker should already have rejected).
    pub fn assign(&self, name: Atom, value: Value) -> bool {
        let mut frame = self.0.lock().expect("environment mutex poisoned");
        if frame.bindings.contains_key(&name) {
            frame.bindings.insert(name, value);
            return true;
        }
        match &frame.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(frame);
                parent.assign(name, value)
            }
            None => false,
        }
    }
}
