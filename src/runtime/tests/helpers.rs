//! Test doubles for the controller's collaborators

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::runtime::{
    CaptureCallback, Controller, ControllerBuilder, Deferred, ElapsedTimeEstimator,
    ExecutionCapability, Host,
};

pub const YIELD_INTERVAL: Duration = Duration::from_millis(50);

/* ===================== Host ===================== */

/// Host that only records what it is asked to run
#[derive(Default)]
pub struct ManualHost {
    queue: RefCell<VecDeque<Deferred>>,
    timers: RefCell<Vec<(Duration, Deferred)>>,
}

impl ManualHost {
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn timers(&self) -> Vec<Duration> {
        self.timers.borrow().iter().map(|(delay, _)| *delay).collect()
    }

    /// Run queued callbacks, including ones they enqueue, until none remain
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    /// Run one queued callback
    pub fn run_one(&self) -> bool {
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    pub fn fire_timers(&self) {
        let timers = std::mem::take(&mut *self.timers.borrow_mut());
        for (_, task) in timers {
            task();
        }
    }
}

impl Host for ManualHost {
    fn defer(&self, task: Deferred) {
        self.queue.borrow_mut().push_back(task);
    }

    fn defer_after(&self, delay: Duration, task: Deferred) {
        self.timers.borrow_mut().push((delay, task));
    }
}

/* ===================== Estimator ===================== */

/// Estimator whose elapsed time is set by the test
#[derive(Clone, Default)]
pub struct FakeClock {
    elapsed: Rc<Cell<Duration>>,
    resets: Rc<Cell<u32>>,
}

impl FakeClock {
    pub fn set(&self, elapsed: Duration) {
        self.elapsed.set(elapsed);
    }

    pub fn resets(&self) -> u32 {
        self.resets.get()
    }
}

impl ElapsedTimeEstimator for FakeClock {
    fn elapsed_time(&self) -> Duration {
        self.elapsed.get()
    }

    fn reset(&self) {
        self.elapsed.set(Duration::ZERO);
        self.resets.set(self.resets.get() + 1);
    }
}

/* ===================== Capability ===================== */

/// Continuation handed out by [`FakeRts`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token(pub u32);

/// Capability that captures on demand and records every resumption
pub struct FakeRts {
    suspended: Cell<bool>,
    depth: Cell<usize>,
    captures: Cell<u32>,
    pending: RefCell<Option<CaptureCallback<Token>>>,
    resumed: RefCell<Vec<Token>>,
}

impl FakeRts {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            suspended: Cell::new(false),
            depth: Cell::new(1),
            captures: Cell::new(0),
            pending: RefCell::new(None),
            resumed: RefCell::new(Vec::new()),
        })
    }

    pub fn set_depth(&self, depth: usize) {
        self.depth.set(depth);
    }

    pub fn captures(&self) -> u32 {
        self.captures.get()
    }

    pub fn resumed(&self) -> Vec<Token> {
        self.resumed.borrow().clone()
    }

    pub fn has_pending_capture(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Finish the requested capture by delivering `token`
    pub fn deliver(&self, token: Token) {
        let callback = self
            .pending
            .borrow_mut()
            .take()
            .expect("no capture requested");
        callback(token);
    }
}

impl ExecutionCapability for FakeRts {
    type Continuation = Token;
    type Output = u32;

    fn is_suspended(&self) -> bool {
        self.suspended.get()
    }

    fn set_suspended(&self, suspended: bool) {
        self.suspended.set(suspended);
    }

    fn delimit_depth(&self) -> usize {
        self.depth.get()
    }

    fn capture_cc(&self, callback: CaptureCallback<Token>) {
        self.captures.set(self.captures.get() + 1);
        *self.pending.borrow_mut() = Some(callback);
    }

    fn resume_from_suspension(&self, continuation: Token) -> u32 {
        self.suspended.set(false);
        self.resumed.borrow_mut().push(continuation);
        continuation.0 * 10
    }
}

/* ===================== Setup ===================== */

pub struct Fixture {
    pub rts: Rc<FakeRts>,
    pub host: Rc<ManualHost>,
    pub clock: FakeClock,
    pub controller: Controller<FakeRts>,
}

/// Controller over fakes with a 50ms yield interval
pub fn fixture() -> Fixture {
    fixture_with(|builder| builder)
}

pub fn fixture_with(
    configure: impl FnOnce(ControllerBuilder<FakeRts>) -> ControllerBuilder<FakeRts>,
) -> Fixture {
    let rts = FakeRts::new();
    let host = Rc::new(ManualHost::default());
    let clock = FakeClock::default();

    let builder = ControllerBuilder::new(rts.clone(), host.clone())
        .yield_interval(YIELD_INTERVAL)
        .estimator(clock.clone());
    let controller = configure(builder).build();

    Fixture {
        rts,
        host,
        clock,
        controller,
    }
}

/// Force a suspension and deliver `token` as its continuation
pub fn suspend_with(fixture: &Fixture, token: Token) {
    fixture.controller.suspend(true);
    fixture.rts.deliver(token);
}
