//! The cooperative task driver: a FIFO microtask queue for settled-promise continuations plus
//! a timer queue for delayed callbacks, pumped from `interpreter.rs`'s main
//! loop after the synchronous entry point returns. Everything here runs on
//! the driver thread; only the rendezvous in `coroutine.rs` ever crosses to
//! another OS thread, and it blocks the driver while doing so, so the
//! observable ordering is exactly as if there were one thread throughout.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::value::Value;

/// A queue shared between the top-level driver and every spawned
/// generator/async activation's own `Interpreter`. A nested async call
/// (an async function awaiting another async function that itself
/// suspends) schedules its eventual settlement onto this same queue rather
/// than a private one nobody ever pops. Locks are held only across a
/// single scheduling operation, never across the blocking OS-thread
/// rendezvous in `coroutine.rs`, so two threads never actually contend for
/// the lock in this cooperative, one-side-runs-at-a-time model.
pub type SharedQueue = Arc<Mutex<MicrotaskQueue>>;

#[must_use]
pub fn new_shared_queue() -> SharedQueue {
    Arc::new(Mutex::new(MicrotaskQueue::new()))
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Settlement {
    Pending,
    Fulfilled,
    Rejected,
}

struct PromiseState {
    settlement: Settlement,
    value: Value,
    /// Continuations registered by `.then`/an `await`, run FIFO once this
    /// promise settles.
    reactions: Vec<Reaction>,
}

/// Visible within the crate so `interpreter.rs` can dispatch a popped
/// reaction directly: a `.then` callback call needs `Interpreter::call_function`,
/// which this module doesn't have access to.
pub(crate) enum Reaction {
    /// An `await`ing generator/async activation to resume once this promise
    /// settles, carrying the fulfilled value or the rejection reason.
    Resume(Arc<crate::coroutine::GeneratorHandle>),
    /// A plain `.then(onFulfilled, onRejected)` callback pair; `None` means
    /// that arm was omitted and the settlement passes through unchanged.
    Then { on_fulfilled: Option<Value>, on_rejected: Option<Value>, result: Arc<PromiseHandle> },
}

/// A JS-visible `Promise`. Settling one is idempotent: the first
/// `resolve`/`reject` wins and later calls are ignored, matching the real
/// `Promise` executor contract.
pub struct PromiseHandle {
    state: Mutex<PromiseState>,
}

impl PromiseHandle {
    #[must_use]
    pub fn pending() -> Arc<Self> {
        Arc::new(PromiseHandle { state: Mutex::new(PromiseState { settlement: Settlement::Pending, value: Value::Undefined, reactions: Vec::new() }) })
    }

    #[must_use]
    pub fn resolved(value: Value) -> Arc<Self> {
        let handle = Self::pending();
        handle.settle(Settlement::Fulfilled, value, &new_shared_queue());
        handle
    }

    #[must_use]
    pub fn rejected(reason: Value) -> Arc<Self> {
        let handle = Self::pending();
        handle.settle(Settlement::Rejected, reason, &new_shared_queue());
        handle
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state.lock().expect("promise mutex poisoned").settlement != Settlement::Pending
    }

    /// Settle the promise and schedule every already-registered reaction as
    /// a microtask. A second call after the
    /// first settlement is a silent no-op.
    pub fn settle(&self, settlement: Settlement, value: Value, queue: &SharedQueue) {
        let reactions = {
            let mut state = self.state.lock().expect("promise mutex poisoned");
            if state.settlement != Settlement::Pending {
                return;
            }
            state.settlement = settlement;
            state.value = value.clone();
            std::mem::take(&mut state.reactions)
        };
        if reactions.is_empty() {
            return;
        }
        let mut q = queue.lock().expect("microtask queue mutex poisoned");
        for reaction in reactions {
            q.schedule_reaction(reaction, settlement, value.clone());
        }
    }

    pub fn fulfill(self: &Arc<Self>, value: Value, queue: &SharedQueue) {
        self.settle(Settlement::Fulfilled, value, queue);
    }

    pub fn reject(self: &Arc<Self>, reason: Value, queue: &SharedQueue) {
        self.settle(Settlement::Rejected, reason, queue);
    }

    /// Register `generator` to resume when this promise settles. If it has
    /// already settled, schedules the resumption as a fresh microtask
    /// immediately rather than running it synchronously, preserving
    /// "always asynchronous" `await` semantics even for already-resolved
    /// promises.
    pub fn await_into(self: &Arc<Self>, generator: Arc<crate::coroutine::GeneratorHandle>, queue: &SharedQueue) {
        let mut state = self.state.lock().expect("promise mutex poisoned");
        if state.settlement == Settlement::Pending {
            state.reactions.push(Reaction::Resume(generator));
        } else {
            let settlement = state.settlement;
            let value = state.value.clone();
            drop(state);
            queue.lock().expect("microtask queue mutex poisoned").schedule_reaction(Reaction::Resume(generator), settlement, value);
        }
    }

    /// Register a `.then(onFulfilled, onRejected)` pair, returning the
    /// promise chained from whichever callback actually runs.
    pub fn then_into(self: &Arc<Self>, on_fulfilled: Option<Value>, on_rejected: Option<Value>, queue: &SharedQueue) -> Arc<PromiseHandle> {
        let result = PromiseHandle::pending();
        let mut state = self.state.lock().expect("promise mutex poisoned");
        let reaction = Reaction::Then { on_fulfilled, on_rejected, result: result.clone() };
        if state.settlement == Settlement::Pending {
            state.reactions.push(reaction);
        } else {
            let settlement = state.settlement;
            let value = state.value.clone();
            drop(state);
            queue.lock().expect("microtask queue mutex poisoned").schedule_reaction(reaction, settlement, value);
        }
        result
    }
}

/// A deferred callback registered via a timer (`setTimeout`-style). Ordered
/// by `due`, a logical tick count rather than wall-clock time so execution
/// stays deterministic.
struct TimerEntry {
    due: u64,
    callback: Reaction,
}

/// The FIFO microtask queue plus the delay-ordered timer queue, owned by
/// whatever drives the interpreter's top-level evaluation. Lives behind a
/// [`SharedQueue`] so every activation's `Interpreter` schedules onto the
/// same instance.
pub struct MicrotaskQueue {
    microtasks: VecDeque<(Reaction, Settlement, Value)>,
    timers: Vec<TimerEntry>,
    clock: u64,
}

impl MicrotaskQueue {
    #[must_use]
    pub fn new() -> Self {
        MicrotaskQueue { microtasks: VecDeque::new(), timers: Vec::new(), clock: 0 }
    }

    fn schedule_reaction(&mut self, reaction: Reaction, settlement: Settlement, value: Value) {
        self.microtasks.push_back((reaction, settlement, value));
    }

    pub(crate) fn schedule_timer(&mut self, delay_ticks: u64, callback: Reaction) {
        self.timers.push(TimerEntry { due: self.clock + delay_ticks.max(1), callback });
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.microtasks.is_empty() && self.timers.is_empty()
    }

    /// Pop the next ready reaction: a queued microtask if any are pending,
    /// otherwise the earliest-due timer (advancing the logical clock to
    /// meet it), otherwise `None` once both queues are empty. Locked and
    /// called one item at a time by `interpreter.rs`'s drain loop, never
    /// held across the cross-thread resume rendezvous.
    pub(crate) fn pop_ready(&mut self) -> Option<(Reaction, Settlement, Value)> {
        if let Some(next) = self.microtasks.pop_front() {
            return Some(next);
        }
        if self.timers.is_empty() {
            return None;
        }
        self.timers.sort_by_key(|t| t.due);
        let next = self.timers.remove(0);
        self.clock = next.due;
        Some((next.callback, Settlement::Fulfilled, Value::Undefined))
    }
}

impl Default for MicrotaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub use Settlement as PromiseSettlement;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolving_a_pending_promise_schedules_its_reactions() {
        let promise = PromiseHandle::pending();
        let queue = new_shared_queue();
        let generator = crate::coroutine::GeneratorHandle::spawn_generator(tsz_parser::FunctionModifiers::Async, |s| {
            match s.suspend(crate::coroutine::YieldSignal::Awaited(Value::Undefined)) {
                Ok(v) => crate::completion::Completion::Return(v),
                Err(c) => c,
            }
        });
        promise.await_into(generator, &queue);
        assert!(!queue.lock().unwrap().is_idle());
        promise.fulfill(Value::Number(7.0), &queue);
        let popped = queue.lock().unwrap().pop_ready();
        assert!(popped.is_some());
    }

    #[test]
    fn double_settlement_is_ignored() {
        let promise = PromiseHandle::pending();
        let queue = new_shared_queue();
        promise.fulfill(Value::Number(1.0), &queue);
        promise.fulfill(Value::Number(2.0), &queue);
        assert!(promise.is_settled());
    }

    #[test]
    fn timers_run_after_microtasks_are_drained() {
        let queue = new_shared_queue();
        assert!(queue.lock().unwrap().is_idle());
        let generator = crate::coroutine::GeneratorHandle::spawn_generator(tsz_parser::FunctionModifiers::Generator, |_s| crate::completion::Completion::Normal(Value::Undefined));
        queue.lock().unwrap().schedule_timer(5, Reaction::Resume(generator));
        assert!(!queue.lock().unwrap().is_idle());
        let mut ticks = 0;
        while queue.lock().unwrap().pop_ready().is_some() {
            ticks += 1;
        }
        assert_eq!(ticks, 1);
    }
}
