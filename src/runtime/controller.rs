//! Suspend/resume controller
//!
//! Gates every suspension point offered by a running program and owns the
//! single continuation slot.
//!
//! ## Lifecycle
//!
//! ```text
//! Running --suspend() yields--> CaptureRequested --continuation delivered--> Suspended
//!    ^                                                                          |
//!    +---------------- resume (scheduled or resume_from_captured) --------------+
//!                                                                               |
//!                                        on_yield() == false: Parked <----------+
//! ```
//!
//! A parked program stays parked until someone calls
//! [`Controller::resume_from_captured`]. If nobody does, it is terminated.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, info, trace};

use super::capability::{ExecutionCapability, SuspensionPoint};
use super::estimator::ElapsedTimeEstimator;
use super::host::Host;
use crate::error::{Error, Result};

/* ===================== Phase ===================== */

/// Where the controlled program is in the suspend/resume cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    /// `capture_cc` was called; the continuation has not been delivered yet
    CaptureRequested,
    /// Continuation stored, resumption scheduled on the host
    Suspended,
    /// Continuation stored, nothing scheduled
    Parked,
}

/// Continuation slot. `Empty` is the "no continuation available" sentinel.
///
/// Each capture is tagged with a generation so a scheduled resumption only
/// ever consumes the continuation it was queued for.
enum Slot<K> {
    Empty,
    Captured(u64, K),
}

/* ===================== Hooks ===================== */

type Predicate = Rc<dyn Fn() -> bool>;

struct Hooks {
    may_yield: Predicate,
    on_yield: Predicate,
    on_end: Rc<dyn Fn()>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            may_yield: Rc::new(|| false),
            on_yield: Rc::new(|| true),
            on_end: Rc::new(|| {}),
        }
    }
}

/* ===================== Controller ===================== */

struct Inner<C: ExecutionCapability> {
    me: Weak<Inner<C>>,
    rts: Rc<C>,
    host: Rc<dyn Host>,
    estimator: Box<dyn ElapsedTimeEstimator>,
    yield_interval: Duration,
    hooks: RefCell<Hooks>,
    slot: RefCell<Slot<C::Continuation>>,
    phase: Cell<Phase>,
    generation: Cell<u64>,
    stopped: Cell<bool>,
}

/// Handle to a suspend/resume controller.
///
/// Cloning is cheap; every clone drives the same continuation slot.
pub struct Controller<C: ExecutionCapability> {
    inner: Rc<Inner<C>>,
}

impl<C: ExecutionCapability> Clone for Controller<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: ExecutionCapability> Controller<C> {
    /// Create a controller with default hooks: never yield on request,
    /// always reschedule after a yield, do nothing at the end.
    ///
    /// Use [`ControllerBuilder`](super::ControllerBuilder) to also install
    /// hooks or a forced-stop deadline.
    pub fn new(
        rts: Rc<C>,
        host: Rc<dyn Host>,
        estimator: Box<dyn ElapsedTimeEstimator>,
        yield_interval: Duration,
    ) -> Self {
        let inner = Rc::new_cyclic(|me| Inner {
            me: me.clone(),
            rts,
            host,
            estimator,
            yield_interval,
            hooks: RefCell::new(Hooks::default()),
            slot: RefCell::new(Slot::Empty),
            phase: Cell::new(Phase::Running),
            generation: Cell::new(0),
            stopped: Cell::new(false),
        });
        Self { inner }
    }

    /// Offer a suspension point. Called by the program at every
    /// compiler-inserted point.
    ///
    /// # Panics
    ///
    /// Panics if the program is already suspended. That means the program
    /// kept running after a capture, and no state after it can be trusted.
    pub fn suspend(&self, force: bool) {
        self.inner.suspend(force);
    }

    /// Resume a suspended program from the stored continuation and pass
    /// through whatever resuming produces.
    ///
    /// The slot is emptied before resuming, so a second call fails with
    /// [`Error::NotPaused`] instead of replaying the same continuation.
    pub fn resume_from_captured(&self) -> Result<C::Output> {
        self.inner.resume_from_captured()
    }

    /// Stop rescheduling: the next yield parks the program.
    ///
    /// Cooperative only. The program stops at its next yielding suspension
    /// point, not before.
    pub fn force_stop(&self) {
        self.inner.force_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.get()
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase.get()
    }

    /// True while a continuation is stored and not yet consumed
    pub fn has_continuation(&self) -> bool {
        matches!(*self.inner.slot.borrow(), Slot::Captured(..))
    }

    /// Yield whenever `f` returns true, regardless of elapsed time.
    pub fn set_may_yield(&self, f: impl Fn() -> bool + 'static) {
        self.inner.hooks.borrow_mut().may_yield = Rc::new(f);
    }

    /// Decide at capture time whether to reschedule (`true`) or park (`false`).
    pub fn set_on_yield(&self, f: impl Fn() -> bool + 'static) {
        self.inner.hooks.borrow_mut().on_yield = Rc::new(f);
    }

    pub fn set_on_end(&self, f: impl Fn() + 'static) {
        self.inner.hooks.borrow_mut().on_end = Rc::new(f);
    }

    /// Run the end-of-program hook.
    pub fn on_end(&self) {
        self.inner.on_end();
    }

    /// Non-owning handle for the execution machinery to call back into.
    ///
    /// Calls through the handle are ignored once every `Controller` clone
    /// has been dropped.
    pub fn suspension_point(&self) -> Weak<dyn SuspensionPoint> {
        let weak: Weak<dyn SuspensionPoint> = self.inner.me.clone();
        weak
    }
}

impl<C: ExecutionCapability> SuspensionPoint for Controller<C> {
    fn suspend(&self, force: bool) {
        self.inner.suspend(force);
    }

    fn on_end(&self) {
        self.inner.on_end();
    }
}

/* ===================== State Machine ===================== */

impl<C: ExecutionCapability> Inner<C> {
    fn suspend(&self, force: bool) {
        assert!(!self.rts.is_suspended(), "already suspended");

        // Dynamically invoked inner units run to completion.
        if self.rts.delimit_depth() > 1 {
            trace!(depth = self.rts.delimit_depth(), "suspension point ignored while nested");
            return;
        }

        if !(force || self.may_yield() || self.estimator.elapsed_time() >= self.yield_interval) {
            return;
        }

        debug!(force, "yielding");
        self.estimator.reset();
        self.rts.set_suspended(true);
        self.phase.set(Phase::CaptureRequested);

        let me = self.me.clone();
        self.rts.capture_cc(Box::new(move |continuation| {
            if let Some(inner) = me.upgrade() {
                inner.on_capture(continuation);
            }
        }));
    }

    fn on_capture(&self, continuation: C::Continuation) {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        if let Slot::Captured(..) = self.slot.replace(Slot::Captured(generation, continuation)) {
            debug!("replaced a stale parked continuation");
        }

        let on_yield = self.hooks.borrow().on_yield.clone();
        if on_yield() {
            self.phase.set(Phase::Suspended);
            let me = self.me.clone();
            self.host.defer(Box::new(move || {
                if let Some(inner) = me.upgrade() {
                    inner.resume_scheduled(generation);
                }
            }));
        } else {
            debug!("continuation captured, program parked");
            self.phase.set(Phase::Parked);
        }
    }

    /// Deferred resumption queued by `on_capture` for capture `generation`.
    fn resume_scheduled(&self, generation: u64) {
        let continuation = match self.slot.replace(Slot::Empty) {
            Slot::Captured(stored, continuation) if stored == generation => continuation,
            other => {
                // Consumed by an explicit resume; a newer capture stays put.
                self.slot.replace(other);
                debug!(generation, "scheduled resume skipped, continuation already consumed");
                return;
            }
        };

        debug!(generation, "resuming scheduled continuation");
        self.phase.set(Phase::Running);
        let _ = self.rts.resume_from_suspension(continuation);
    }

    fn resume_from_captured(&self) -> Result<C::Output> {
        // Empty the slot before resuming so the same continuation can never
        // run twice.
        let Slot::Captured(_, continuation) = self.slot.replace(Slot::Empty) else {
            return Err(Error::NotPaused);
        };

        debug!("resuming captured continuation");
        self.phase.set(Phase::Running);
        Ok(self.rts.resume_from_suspension(continuation))
    }

    fn force_stop(&self) {
        info!("forced stop: the next yield parks the program");
        self.stopped.set(true);
        self.hooks.borrow_mut().on_yield = Rc::new(|| false);
    }

    fn may_yield(&self) -> bool {
        let may_yield = self.hooks.borrow().may_yield.clone();
        may_yield()
    }

    fn on_end(&self) {
        let on_end = self.hooks.borrow().on_end.clone();
        on_end();
    }
}

impl<C: ExecutionCapability> SuspensionPoint for Inner<C> {
    fn suspend(&self, force: bool) {
        Inner::suspend(self, force);
    }

    fn on_end(&self) {
        Inner::on_end(self);
    }
}
