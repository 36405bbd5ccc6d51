//! Explicit `Completion` sum type. Every
//! statement evaluator returns one instead of using Rust panics or `?` to
//! unwind `return`/`break`/`continue`/`throw` — those four all need to run
//! pending `finally` blocks on the way out, which a plain `Result` can't
//! express uniformly.

use tsz_common::Atom;

use crate::value::Value;

#[derive(Debug, Clone)]
pub enum Completion {
    Normal(Value),
    Return(Value),
    Break(Option<Atom>),
    Continue(Option<Atom>),
    Throw(Value),
}

impl Completion {
    #[must_use]
    pub fn is_abrupt(&self) -> bool {
        !matches!(self, Completion::Normal(_))
    }

    #[must_use]
    pub fn value(self) -> Value {
        match self {
            Completion::Normal(v) | Completion::Return(v) | Completion::Throw(v) => v,
            Completion::Break(_) | Completion::Continue(_) => Value::Undefined,
        }
    }
}

/// Runs `finally` block evaluation and re-threads its own completion with
/// the completion it is wrapping: `finally` always runs, and an abrupt
/// completion from `finally` itself overrides whatever `try`/`catch`
/// produced; otherwise the original completion propagates.
#[must_use]
pub fn combine_with_finally(original: Completion, finally_result: Completion) -> Completion {
    if finally_result.is_abrupt() {
        finally_result
    } else {
        original
    }
}
