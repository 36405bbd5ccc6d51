//! Host-coroutine implementation of suspension. A
//! generator/async activation's body runs on its own OS thread; it
//! rendezvous with its driver over a pair of zero-capacity channels, so
//! exactly one side is ever actually executing at a time — single-threaded
//! cooperative behavior observable from the outside, implemented with real
//! OS threads instead of a hand-rolled dispatch table. `tsz-emitter`'s
//! bytecode backend lowers the same suspension semantics into a portable,
//! ahead-of-time dispatch-table representation; this crate is the
//! tree-walking reference backend.
//!
//! Because `return(v)`/`throw(err)` injected into a suspended body are
//! delivered as an ordinary `Completion::Return`/`Completion::Throw` at the
//! exact point the body is blocked (the `yield`/`await` expression), the
//! interpreter's existing `try`/`finally` handling runs pending `finally` blocks for free — no
//! separate "try-region re-entry" bookkeeping is needed the way the
//! ahead-of-time emitter's dispatch table requires it.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tsz_parser::FunctionModifiers;

use crate::completion::Completion;
use crate::value::Value;

/// What the driver sends into a suspended body to resume it.
pub enum ResumeSignal {
    /// `.next(v)` / an awaited promise resolving with `v`.
    Next(Value),
    /// `.throw(err)` / an awaited promise rejecting with `err`.
    Throw(Value),
    /// `.return(v)`: injects an abrupt `Return` at the suspension point so
    /// any enclosing `finally` still runs.
    Return(Value),
}

/// What a suspended body sends out to its driver.
pub enum YieldSignal {
    /// `yield v` (or one forwarded step of `yield* iter`).
    Yielded(Value),
    /// `await x`: the driver must resolve `x` (registering a microtask
    /// continuation if it is a promise) and eventually call
    /// [`GeneratorHandle::resume`] with the settled value.
    Awaited(Value),
    /// The body ran to completion (normally, via `return`, or via an
    /// escaping `throw`).
    Done(Completion),
}

/// Handed to the interpreter's expression evaluator while it is running
/// inside a spawned body; `suspend` is called at every `await`/`yield`
/// site. Blocks the body's OS thread until the driver resumes it.
pub struct Suspender {
    to_driver: SyncSender<YieldSignal>,
    from_driver: Receiver<ResumeSignal>,
}

impl Suspender {
    /// Send `signal` to the driver and block for the resumption. Returns
    /// `Ok(value)` to continue evaluating with that value (the result of
    /// `await`/`yield`), or `Err(completion)` when the driver injected a
    /// `return`/`throw` that must propagate as an abrupt completion from
    /// the suspension expression itself.
    pub fn suspend(&self, signal: YieldSignal) -> Result<Value, Completion> {
        if self.to_driver.send(signal).is_err() {
            // Driver dropped its receiver (abandoned the generator);
            // there is no one left to resume us. Treat as an abandoned
            // `return(undefined)` so pending `finally` blocks still run.
            return Err(Completion::Return(Value::Undefined));
        }
        match self.from_driver.recv() {
            Ok(ResumeSignal::Next(v)) => Ok(v),
            Ok(ResumeSignal::Throw(v)) => Err(Completion::Throw(v)),
            Ok(ResumeSignal::Return(v)) => Err(Completion::Return(v)),
            Err(_) => Err(Completion::Return(Value::Undefined)),
        }
    }
}

/// The driver-side handle to a spawned generator/async activation.
pub struct GeneratorHandle {
    pub kind: FunctionModifiers,
    to_body: Mutex<Option<SyncSender<ResumeSignal>>>,
    from_body: Mutex<Receiver<YieldSignal>>,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl GeneratorHandle {
    /// Spawn a generator body: the thread blocks immediately, waiting for
    /// the first `.next()` call, since a generator's body does not start
    /// running until it is first pulled.
    pub fn spawn_generator(kind: FunctionModifiers, body: impl FnOnce(&Suspender) -> Completion + Send + 'static) -> Arc<GeneratorHandle> {
        let (resume_tx, resume_rx) = sync_channel::<ResumeSignal>(0);
        let (yield_tx, yield_rx) = sync_channel::<YieldSignal>(0);

        let join = thread::spawn(move || {
            let first = match resume_rx.recv() {
                Ok(signal) => signal,
                Err(_) => return,
            };
            let suspender = Suspender { to_driver: yield_tx.clone(), from_driver: resume_rx };
            let completion = match first {
                ResumeSignal::Next(_) => body(&suspender),
                ResumeSignal::Throw(v) => Completion::Throw(v),
                ResumeSignal::Return(v) => Completion::Return(v),
            };
            let _ = yield_tx.send(YieldSignal::Done(completion));
        });

        Arc::new(GeneratorHandle {
            kind,
            to_body: Mutex::new(Some(resume_tx)),
            from_body: Mutex::new(yield_rx),
            join: Mutex::new(Some(join)),
        })
    }

    /// Spawn an async body: it starts running immediately on its own
    /// thread, and this call blocks until it either completes or
    /// hits its first suspension point, returning that first signal
    /// alongside the handle used to resume it past later `await`s.
    pub fn spawn_async(body: impl FnOnce(&Suspender) -> Completion + Send + 'static) -> (Arc<GeneratorHandle>, YieldSignal) {
        let (resume_tx, resume_rx) = sync_channel::<ResumeSignal>(0);
        let (yield_tx, yield_rx) = sync_channel::<YieldSignal>(0);

        let done_tx = yield_tx.clone();
        let join = thread::spawn(move || {
            let suspender = Suspender { to_driver: yield_tx, from_driver: resume_rx };
            let completion = body(&suspender);
            let _ = done_tx.send(YieldSignal::Done(completion));
        });

        let handle = Arc::new(GeneratorHandle {
            kind: FunctionModifiers::Async,
            to_body: Mutex::new(Some(resume_tx)),
            from_body: Mutex::new(yield_rx),
            join: Mutex::new(Some(join)),
        });
        let first = handle.from_body.lock().expect("generator channel mutex poisoned").recv().unwrap_or(YieldSignal::Done(Completion::Normal(Value::Undefined)));
        if matches!(first, YieldSignal::Done(_)) {
            *handle.to_body.lock().expect("generator channel mutex poisoned") = None;
        }
        (handle, first)
    }

    /// Resume a suspended body, blocking until it yields/awaits again or
    /// completes. Resuming an already-completed generator is a documented
    /// no-op that reports `Done` again (mirrors the real iterator protocol:
    /// calling `.next()` after `done: true` keeps returning `done: true`).
    pub fn resume(&self, signal: ResumeSignal) -> YieldSignal {
        let sender = {
            let guard = self.to_body.lock().expect("generator channel mutex poisoned");
            guard.clone()
        };
        let Some(sender) = sender else {
            return YieldSignal::Done(Completion::Normal(Value::Undefined));
        };
        if sender.send(signal).is_err() {
            *self.to_body.lock().expect("generator channel mutex poisoned") = None;
            return YieldSignal::Done(Completion::Normal(Value::Undefined));
        }
        let result = self
            .from_body
            .lock()
            .expect("generator channel mutex poisoned")
            .recv()
            .unwrap_or(YieldSignal::Done(Completion::Normal(Value::Undefined)));
        if matches!(result, YieldSignal::Done(_)) {
            *self.to_body.lock().expect("generator channel mutex poisoned") = None;
            if let Some(handle) = self.join.lock().expect("generator channel mutex poisoned").take() {
                let _ = handle.join();
            }
        }
        result
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.to_body.lock().expect("generator channel mutex poisoned").is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_yields_in_order_then_completes() {
        let handle = GeneratorHandle::spawn_generator(FunctionModifiers::Generator, |s| {
            let r1 = s.suspend(YieldSignal::Yielded(Value::Number(1.0)));
            if r1.is_err() {
                return r1.unwrap_err();
            }
            let r2 = s.suspend(YieldSignal::Yielded(Value::Number(2.0)));
            if let Err(c) = r2 {
                return c;
            }
            Completion::Return(Value::Number(3.0))
        });

        match handle.resume(ResumeSignal::Next(Value::Undefined)) {
            YieldSignal::Yielded(Value::Number(n)) => assert_eq!(n, 1.0),
            _ => panic!("expected first yield"),
        }
        match handle.resume(ResumeSignal::Next(Value::Undefined)) {
            YieldSignal::Yielded(Value::Number(n)) => assert_eq!(n, 2.0),
            _ => panic!("expected second yield"),
        }
        match handle.resume(ResumeSignal::Next(Value::Undefined)) {
            YieldSignal::Done(Completion::Return(Value::Number(n))) => assert_eq!(n, 3.0),
            _ => panic!("expected completion"),
        }
        assert!(handle.is_done());
    }

    #[test]
    fn return_injected_mid_suspension_runs_as_an_abrupt_completion() {
        let handle = GeneratorHandle::spawn_generator(FunctionModifiers::Generator, |s| match s.suspend(YieldSignal::Yielded(Value::Number(1.0))) {
            Ok(_) => Completion::Normal(Value::Undefined),
            Err(c) => c,
        });
        handle.resume(ResumeSignal::Next(Value::Undefined));
        match handle.resume(ResumeSignal::Return(Value::Number(99.0))) {
            YieldSignal::Done(Completion::Return(Value::Number(n))) => assert_eq!(n, 99.0),
            _ => panic!("expected injected return to complete the generator"),
        }
    }

    #[test]
    fn async_body_runs_to_first_await_on_construction() {
        let (_handle, first) = GeneratorHandle::spawn_async(|s| match s.suspend(YieldSignal::Awaited(Value::Number(41.0))) {
            Ok(v) => Completion::Return(v),
            Err(c) => c,
        });
        match first {
            YieldSignal::Awaited(Value::Number(n)) => assert_eq!(n, 41.0),
            _ => panic!("expected the async body to run up to its first await eagerly"),
        }
    }
}
