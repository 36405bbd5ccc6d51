//! The iteration bridge: a uniform `move_next`/`current`
//! wrapper over host-native sequences, strings, user `[Symbol.iterator]`
//! objects, and user `[Symbol.asyncIterator]` objects, so `for-of`, spread,
//! destructuring and `for-await-of` in the evaluator all drive the same
//! small interface regardless of what they're iterating.

use crate::completion::Completion;
use crate::value::Value;

/// A host-native source the interpreter already holds materialized (an
/// array, or a string decomposed into its Unicode scalar values — string
/// iteration walks code points, not UTF-16 code units).
enum HostSource {
    Array(Vec<Value>),
    CodePoints(Vec<char>),
}

enum Source {
    Host(HostSource),
    /// A user object with a callable `next` (bound to the iterator object
    /// as receiver), reached through `[Symbol.iterator]()`/
    /// `[Symbol.asyncIterator]()` having already been called once to
    /// obtain it.
    User(Value),
}

/// Calls into the evaluator needed to drive a user-defined iterator: fetch
/// a property and call a value as a function. Implemented by
/// `interpreter.rs`'s `Interpreter`, kept as a trait here so this module
/// doesn't depend on the evaluator's concrete type.
pub trait HostCalls {
    fn get_property(&mut self, object: &Value, name: &str) -> Result<Value, Completion>;
    fn call(&mut self, callee: &Value, this: Option<Value>, args: Vec<Value>) -> Result<Value, Completion>;
}

/// The wrapper type itself. `current` holds the most recent `move_next`
/// result; `done` is sticky once set, matching the real iterator protocol
/// ("once done, stays done" for every spec-compliant iterator this bridge
/// is expected to see).
pub struct IterationBridge {
    source: Source,
    index: usize,
    current: Value,
    done: bool,
}

impl IterationBridge {
    #[must_use]
    pub fn from_array(items: Vec<Value>) -> Self {
        IterationBridge { source: Source::Host(HostSource::Array(items)), index: 0, current: Value::Undefined, done: false }
    }

    #[must_use]
    pub fn from_string(s: &str) -> Self {
        IterationBridge { source: Source::Host(HostSource::CodePoints(s.chars().collect())), index: 0, current: Value::Undefined, done: false }
    }

    /// `iterator` must already be the object returned by
    /// `[Symbol.iterator]()`/`[Symbol.asyncIterator]()`, i.e. the thing
    /// `next()` is called on, not the iterable itself.
    #[must_use]
    pub fn from_user_iterator(iterator: Value) -> Self {
        IterationBridge { source: Source::User(iterator), index: 0, current: Value::Undefined, done: false }
    }

    #[must_use]
    pub fn current(&self) -> Value {
        self.current.clone()
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Advance the bridge, returning `Ok(!done)`. For a user source this
    /// calls `next()` on the iterator with itself as receiver, then reads
    /// the `done` and `value` properties off the returned record.
    pub fn move_next(&mut self, host: &mut dyn HostCalls) -> Result<bool, Completion> {
        if self.done {
            return Ok(false);
        }
        match &self.source {
            Source::Host(HostSource::Array(items)) => {
                if self.index < items.len() {
                    self.current = items[self.index].clone();
                    self.index += 1;
                    Ok(true)
                } else {
                    self.done = true;
                    Ok(false)
                }
            }
            Source::Host(HostSource::CodePoints(chars)) => {
                if self.index < chars.len() {
                    self.current = Value::string(chars[self.index].to_string());
                    self.index += 1;
                    Ok(true)
                } else {
                    self.done = true;
                    Ok(false)
                }
            }
            Source::User(iterator) => {
                let iterator = iterator.clone();
                let next_fn = host.get_property(&iterator, "next")?;
                let record = host.call(&next_fn, Some(iterator), Vec::new())?;
                let done = host.get_property(&record, "done")?.is_truthy();
                let value = host.get_property(&record, "value")?;
                self.current = value;
                if done {
                    self.done = true;
                }
                Ok(!done)
            }
        }
    }

    /// `for-of` acquires an iterator at entry and must invoke the
    /// iterator's `return()` (if present) on any exit path. A no-op
    /// for host sources, which have no such hook.
    pub fn close(&mut self, host: &mut dyn HostCalls) -> Result<(), Completion> {
        if self.done {
            return Ok(());
        }
        if let Source::User(iterator) = &self.source {
            let iterator = iterator.clone();
            let return_fn = host.get_property(&iterator, "return")?;
            if matches!(return_fn, Value::Function(_)) {
                host.call(&return_fn, Some(iterator), Vec::new())?;
            }
        }
        self.done = true;
        Ok(())
    }

    /// Replace the most recently produced value without advancing, used by
    /// `for-await-of` once it has awaited a promise-valued `next()` record.
    pub fn replace_current(&mut self, value: Value) {
        self.current = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoHostCalls;
    impl HostCalls for NoHostCalls {
        fn get_property(&mut self, _object: &Value, _name: &str) -> Result<Value, Completion> {
            unreachable!("host sources never call back into the evaluator")
        }
        fn call(&mut self, _callee: &Value, _this: Option<Value>, _args: Vec<Value>) -> Result<Value, Completion> {
            unreachable!("host sources never call back into the evaluator")
        }
    }

    #[test]
    fn array_bridge_yields_items_in_order_then_stops() {
        let mut bridge = IterationBridge::from_array(vec![Value::Number(1.0), Value::Number(2.0)]);
        let mut host = NoHostCalls;
        assert!(bridge.move_next(&mut host).unwrap());
        assert_eq!(bridge.current().to_js_string(), "1");
        assert!(bridge.move_next(&mut host).unwrap());
        assert_eq!(bridge.current().to_js_string(), "2");
        assert!(!bridge.move_next(&mut host).unwrap());
        assert!(bridge.is_done());
    }

    #[test]
    fn string_bridge_iterates_code_points() {
        let mut bridge = IterationBridge::from_string("ab");
        let mut host = NoHostCalls;
        assert!(bridge.move_next(&mut host).unwrap());
        assert_eq!(bridge.current().to_js_string(), "a");
        assert!(bridge.move_next(&mut host).unwrap());
        assert_eq!(bridge.current().to_js_string(), "b");
        assert!(!bridge.move_next(&mut host).unwrap());
    }

    #[test]
    fn close_on_a_finished_host_bridge_is_a_no_op() {
        let mut bridge = IterationBridge::from_array(vec![]);
        let mut host = NoHostCalls;
        assert!(!bridge.move_next(&mut host).unwrap());
        assert!(bridge.close(&mut host).is_ok());
    }
}
