//! # Machine - Reference Execution Capability
//!
//! Runs programs whose whole pending state is an explicit value, so that
//! "capturing the stack" is just taking ownership of that value.
//!
//! ## Core Principles
//!
//! 1. **Step-driven execution**: a [`Program`] advances one step at a time;
//!    a suspension point is offered before every step
//! 2. **Capture = move**: when the controller suspends, the remaining program
//!    becomes the [`Continuation`] and the run loop returns
//! 3. **Nested units**: [`Cx::nested`] runs an inner program to completion
//!    with the delimit depth raised, so the controller leaves it alone

pub mod programs;

#[cfg(test)]
mod tests;

use std::cell::{Cell, RefCell};
use std::rc::Weak;

use tracing::{trace, warn};

use crate::runtime::{CaptureCallback, Controller, ExecutionCapability, SuspensionPoint};

/* ===================== Program ===================== */

/// Result of executing one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step<T> {
    /// More work remains
    Continue,
    /// More work remains and the next suspension point is forced
    Yield,
    /// Execution complete
    Done(T),
}

/// A resumable computation
pub trait Program: 'static {
    type Output;

    fn step(&mut self, cx: &Cx<'_>) -> Step<Self::Output>;
}

/// How a run of the machine ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    /// Captured at a suspension point; the continuation went to the controller
    Suspended,
}

impl<T> Outcome<T> {
    pub fn is_suspended(&self) -> bool {
        matches!(self, Outcome::Suspended)
    }

    pub fn done(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Suspended => None,
        }
    }
}

/// A captured program, resumable exactly once
#[derive(Debug)]
pub struct Continuation<P> {
    id: u64,
    program: P,
}

impl<P> Continuation<P> {
    /// Unique per machine, in capture order
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn program(&self) -> &P {
        &self.program
    }
}

/* ===================== Step Context ===================== */

/// Handed to [`Program::step`]
pub struct Cx<'a> {
    depth: &'a Cell<usize>,
    point: Option<&'a dyn SuspensionPoint>,
}

impl Cx<'_> {
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Run `program` synchronously to completion as a nested unit.
    ///
    /// Suspension points are still offered before each inner step, at the
    /// raised depth.
    pub fn nested<Q: Program>(&self, mut program: Q) -> Q::Output {
        self.depth.set(self.depth.get() + 1);
        let mut force = false;
        let output = loop {
            if let Some(point) = self.point {
                point.suspend(force);
            }
            match program.step(self) {
                Step::Continue => force = false,
                Step::Yield => force = true,
                Step::Done(value) => break value,
            }
        };
        self.depth.set(self.depth.get() - 1);
        output
    }
}

/* ===================== Machine ===================== */

pub struct Machine<P: Program> {
    suspended: Cell<bool>,
    depth: Cell<usize>,
    next_id: Cell<u64>,
    pending: RefCell<Option<CaptureCallback<Continuation<P>>>>,
    point: RefCell<Option<Weak<dyn SuspensionPoint>>>,
    last_captured: Cell<Option<u64>>,
    last_resumed: Cell<Option<u64>>,
}

impl<P: Program> Machine<P> {
    pub fn new() -> Self {
        Self {
            suspended: Cell::new(false),
            depth: Cell::new(0),
            next_id: Cell::new(0),
            pending: RefCell::new(None),
            point: RefCell::new(None),
            last_captured: Cell::new(None),
            last_resumed: Cell::new(None),
        }
    }

    /// Run `program` at top level under `controller`
    pub fn start(&self, program: P, controller: &Controller<Self>) -> Outcome<P::Output> {
        *self.point.borrow_mut() = Some(controller.suspension_point());
        self.drive(program, false)
    }

    pub fn last_captured(&self) -> Option<u64> {
        self.last_captured.get()
    }

    pub fn last_resumed(&self) -> Option<u64> {
        self.last_resumed.get()
    }

    /// Step `program` until it finishes or is captured.
    ///
    /// A resumed program continues right after the suspension point it was
    /// captured at, so `resumed` skips the first point.
    fn drive(&self, mut program: P, resumed: bool) -> Outcome<P::Output> {
        let point = self.point.borrow().as_ref().and_then(Weak::upgrade);
        self.depth.set(self.depth.get() + 1);

        let mut force = false;
        let mut skip_point = resumed;
        loop {
            if let Some(point) = point.as_ref().filter(|_| !skip_point) {
                point.suspend(force);
            }
            skip_point = false;

            if self.suspended.get() {
                // Leave the delimited region before handing the program out:
                // the callback may resume it right away.
                self.depth.set(self.depth.get() - 1);
                self.capture(program);
                return Outcome::Suspended;
            }

            let cx = Cx {
                depth: &self.depth,
                point: point.as_deref(),
            };
            match program.step(&cx) {
                Step::Continue => force = false,
                Step::Yield => force = true,
                Step::Done(value) => {
                    self.depth.set(self.depth.get() - 1);
                    if let Some(point) = &point {
                        point.on_end();
                    }
                    return Outcome::Done(value);
                }
            }
        }
    }

    fn capture(&self, program: P) {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.last_captured.set(Some(id));
        trace!(id, "continuation captured");

        let callback = self.pending.borrow_mut().take();
        match callback {
            Some(callback) => callback(Continuation { id, program }),
            None => warn!(id, "suspended without a capture request, continuation dropped"),
        }
    }
}

impl<P: Program> Default for Machine<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Program> ExecutionCapability for Machine<P> {
    type Continuation = Continuation<P>;
    type Output = Outcome<P::Output>;

    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn set_suspended(&self, suspended: bool) {
        self.suspended.set(suspended);
    }

    fn delimit_depth(&self) -> usize {
        self.depth.get()
    }

    fn capture_cc(&self, callback: CaptureCallback<Self::Continuation>) {
        *self.pending.borrow_mut() = Some(callback);
    }

    fn resume_from_suspension(&self, continuation: Self::Continuation) -> Self::Output {
        trace!(id = continuation.id, "resuming continuation");
        self.last_resumed.set(Some(continuation.id));
        self.suspended.set(false);
        self.drive(continuation.program, true)
    }
}

