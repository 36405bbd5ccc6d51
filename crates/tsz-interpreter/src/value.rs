//! Runtime values. Every aggregate is `Arc<Mutex<_>>` rather than the
//! `Rc<RefCell<_>>` a purely single-OS-thread interpreter would use: a
//! generator/async activation runs its body on a dedicated OS thread that
//! rendezvous with its driver (`coroutine.rs`), using host coroutines to
//! implement `await`/`yield` suspension. Because a `Value`
//! can be captured by a closure that later runs on either side of that
//! rendezvous, every `Value` must be `Send + Sync`; the rendezvous channel
//! itself (zero-capacity) guarantees only one side ever actually touches a
//! shared cell at a time, so the `Mutex` is never contended in practice.

use std::fmt;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;

use tsz_common::Atom;
use tsz_parser::{FunctionSig, NodeArena};

use crate::coroutine::GeneratorHandle;
use crate::task::PromiseHandle;

/// Object keys are plain `Arc<str>`, not `Atom`: a computed property name
/// (`obj[expr]`) only exists as a runtime string, and resolving it through
/// the compile-time `Interner` would need interner access from inside a
/// spawned generator/async thread (the `Interner` is `Rc`-based and not
/// `Send`). `Interpreter::atom_text` resolves a parse-time `Atom` to its
/// `Arc<str>` once, from a snapshot table built before any thread spawns,
/// so every object key — static or computed — ends up as the same kind of
/// handle.
pub type ObjectRef = Arc<Mutex<IndexMap<Arc<str>, Value>>>;
pub type ArrayRef = Arc<Mutex<Vec<Value>>>;

/// A host-provided callable (`console.log`, `Promise.resolve`, ...):
/// the built-in module registry and error reporter collaborators (spec §6)
/// are the only source of these, never user source. Boxed as a trait
/// object rather than a plain `fn` pointer so a native function can close
/// over interpreter-held state (e.g. the `Promise` executor's `resolve`/
/// `reject` pair closing over the promise they settle).
pub type NativeFn = Arc<dyn Fn(&mut crate::interpreter::Interpreter, Option<Value>, Vec<Value>) -> Result<Value, crate::completion::Completion> + Send + Sync>;

#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    Object(ObjectRef),
    Array(ArrayRef),
    Function(Arc<FunctionValue>),
    Native(NativeFn),
    Generator(Arc<GeneratorHandle>),
    Promise(Arc<PromiseHandle>),
}

/// A closure value: the function's syntax plus the environment it closed
/// over, .3. `home_arena` is cheap to share (`NodeArena`
/// holds no interior mutability, so it is naturally `Send + Sync`) and
/// lets a `Value::Function` be called long after the `Interpreter` that
/// created it has returned.
pub struct FunctionValue {
    pub name: Option<Atom>,
    pub sig: FunctionSig,
    pub closure: crate::environment::Environment,
    /// `this` bound at call time for a plain method call; arrows never set
    /// this and instead resolve `this` lexically through `closure`.
    pub bound_this: Option<Value>,
    pub home_arena: Arc<NodeArena>,
    /// Set only for a class's synthesized constructor function: its
    /// instance method table and field initializers, installed onto each
    /// new instance by `Interpreter::eval_new`. `None` for ordinary
    /// functions and arrows.
    pub class_methods: Option<Arc<IndexMap<Arc<str>, Value>>>,
    pub class_fields: Option<Arc<Vec<(Atom, Option<tsz_parser::NodeIndex>)>>>,
}

impl Value {
    #[must_use]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    #[must_use]
    pub fn object(entries: IndexMap<Arc<str>, Value>) -> Self {
        Value::Object(Arc::new(Mutex::new(entries)))
    }

    #[must_use]
    pub fn empty_object() -> Self {
        Value::Object(Arc::new(Mutex::new(IndexMap::new())))
    }

    #[must_use]
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Arc::new(Mutex::new(items)))
    }

    /// JavaScript's `typeof`, with `typeof null === "object"`.
    #[must_use]
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) | Value::Array(_) | Value::Generator(_) | Value::Promise(_) => "object",
            Value::Function(_) | Value::Native(_) => "function",
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Array(_) | Value::Function(_) | Value::Native(_) | Value::Generator(_) | Value::Promise(_) => true,
        }
    }

    #[must_use]
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(n), Value::Str(s)) | (Value::Str(s), Value::Number(n)) => {
                s.parse::<f64>().map(|parsed| parsed == *n).unwrap_or(false)
            }
            _ => self.strict_eq(other),
        }
    }

    #[must_use]
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Array(items) => items
                .lock()
                .expect("value mutex poisoned")
                .iter()
                .map(Value::to_js_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Function(_) | Value::Native(_) => "function".to_string(),
            Value::Generator(_) => "[object Generator]".to_string(),
            Value::Promise(_) => "[object Promise]".to_string(),
        }
    }
}

/// JavaScript's `Number#toString()`: integral values print without a
/// trailing `.0`.
#[must_use]
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_js_string())
    }
}
