//! The handful of host built-ins the interpreter resolves on an otherwise
//! unbound identifier (`console`, `Promise`, `Math`): looked up lazily
//! rather than pre-declared in the root `Environment`, since declaring them
//! there would mean building them before a program's `AtomTable` snapshot
//! exists. `Math.random()` is deliberately absent — every other source of
//! nondeterminism in this interpreter (timers, scheduling order) is already
//! pinned to a logical clock, and a real RNG would be the one remaining way
//! for two runs of the same program to disagree.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::interpreter::Interpreter;
use crate::value::{NativeFn, Value};

fn native(f: impl Fn(&mut Interpreter, Option<Value>, Vec<Value>) -> Result<Value, crate::completion::Completion> + Send + Sync + 'static) -> Value {
    let f: NativeFn = Arc::new(f);
    Value::Native(f)
}

fn object(entries: Vec<(&str, Value)>) -> Value {
    let mut map = IndexMap::new();
    for (k, v) in entries {
        map.insert(Arc::from(k), v);
    }
    Value::object(map)
}

#[must_use]
pub fn lookup(name: &str) -> Option<Value> {
    match name {
        "console" => Some(console()),
        "Promise" => Some(promise_ctor()),
        "Math" => Some(math()),
        _ => None,
    }
}

fn console() -> Value {
    fn print(prefix: &str, args: Vec<Value>) {
        let line = args.iter().map(Value::to_js_string).collect::<Vec<_>>().join(" ");
        if prefix.is_empty() {
            println!("{line}");
        } else {
            eprintln!("{line}");
        }
    }
    object(vec![
        ("log", native(|_i, _this, args| { print("", args); Ok(Value::Undefined) })),
        ("info", native(|_i, _this, args| { print("", args); Ok(Value::Undefined) })),
        ("warn", native(|_i, _this, args| { print("warn", args); Ok(Value::Undefined) })),
        ("error", native(|_i, _this, args| { print("error", args); Ok(Value::Undefined) })),
    ])
}

/// A tagged ordinary object rather than a new `Value` variant: `new
/// Promise(...)` recognizes it via `__ctor_tag` in `eval_new`, and its
/// static methods close directly over `Interpreter`'s promise helpers.
fn promise_ctor() -> Value {
    object(vec![
        ("__ctor_tag", Value::string("Promise")),
        ("resolve", native(|i, _this, mut args| Ok(i.promise_resolve(args.drain(..).next().unwrap_or(Value::Undefined))))),
        ("reject", native(|i, _this, mut args| Ok(i.promise_reject(args.drain(..).next().unwrap_or(Value::Undefined))))),
        ("all", native(|i, _this, mut args| Ok(i.promise_all(args.drain(..).next().unwrap_or(Value::Undefined))))),
    ])
}

fn math() -> Value {
    fn num(args: &[Value], i: usize) -> f64 {
        args.get(i).map(value_to_number).unwrap_or(f64::NAN)
    }
    fn value_to_number(v: &Value) -> f64 {
        match v {
            Value::Number(n) => *n,
            Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
            Value::Bool(b) => if *b { 1.0 } else { 0.0 },
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            _ => f64::NAN,
        }
    }
    object(vec![
        ("PI", Value::Number(std::f64::consts::PI)),
        ("E", Value::Number(std::f64::consts::E)),
        ("floor", native(|_i, _this, args| Ok(Value::Number(num(&args, 0).floor())))),
        ("ceil", native(|_i, _this, args| Ok(Value::Number(num(&args, 0).ceil())))),
        ("round", native(|_i, _this, args| Ok(Value::Number(num(&args, 0).round())))),
        ("trunc", native(|_i, _this, args| Ok(Value::Number(num(&args, 0).trunc())))),
        ("abs", native(|_i, _this, args| Ok(Value::Number(num(&args, 0).abs())))),
        ("sqrt", native(|_i, _this, args| Ok(Value::Number(num(&args, 0).sqrt())))),
        ("pow", native(|_i, _this, args| Ok(Value::Number(num(&args, 0).powf(num(&args, 1)))))),
        ("max", native(|_i, _this, args| Ok(Value::Number(args.iter().map(value_to_number).fold(f64::NEG_INFINITY, f64::max))))),
        ("min", native(|_i, _this, args| Ok(Value::Number(args.iter().map(value_to_number).fold(f64::INFINITY, f64::min))))),
    ])
}
