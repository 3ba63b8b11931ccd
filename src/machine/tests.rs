//! Round-trip tests: programs suspended and resumed through a controller

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use super::programs::Counter;
use super::{Cx, Machine, Outcome, Program, Step};
use crate::error::Error;
use crate::runtime::{
    Controller, ControllerBuilder, CountdownEstimator, Deferred, ExecutionCapability, Host, Phase,
};

#[derive(Default)]
struct QueueHost {
    queue: RefCell<VecDeque<Deferred>>,
}

impl QueueHost {
    fn run_one(&self) -> bool {
        let task = self.queue.borrow_mut().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Host for QueueHost {
    fn defer(&self, task: Deferred) {
        self.queue.borrow_mut().push_back(task);
    }

    fn defer_after(&self, _delay: Duration, _task: Deferred) {}
}

/// Appends each step number to a shared log; optionally forces a yield
/// after every step.
struct Script {
    next: u32,
    len: u32,
    force_each: bool,
    log: Rc<RefCell<Vec<u32>>>,
}

impl Program for Script {
    type Output = u32;

    fn step(&mut self, _cx: &Cx<'_>) -> Step<u32> {
        if self.next == self.len {
            return Step::Done(self.len);
        }
        self.next += 1;
        self.log.borrow_mut().push(self.next);
        if self.force_each {
            Step::Yield
        } else {
            Step::Continue
        }
    }
}

fn setup<P: Program>(
    configure: impl FnOnce(ControllerBuilder<Machine<P>>) -> ControllerBuilder<Machine<P>>,
) -> (Rc<Machine<P>>, Rc<QueueHost>, Controller<Machine<P>>) {
    let machine = Rc::new(Machine::new());
    let host = Rc::new(QueueHost::default());
    let builder = ControllerBuilder::new(machine.clone(), host.clone())
        .yield_interval(Duration::from_secs(3600))
        .estimator(CountdownEstimator::new(Duration::from_millis(1)));
    (machine, host, configure(builder).build())
}

fn script(len: u32, force_each: bool) -> (Script, Rc<RefCell<Vec<u32>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let script = Script {
        next: 0,
        len,
        force_each,
        log: log.clone(),
    };
    (script, log)
}

#[test]
fn test_runs_to_completion_without_yielding() {
    let (machine, host, controller) = setup::<Script>(|builder| builder);
    let (program, log) = script(5, false);

    let outcome = machine.start(program, &controller);

    assert_eq!(outcome, Outcome::Done(5));
    assert_eq!(*log.borrow(), vec![1, 2, 3, 4, 5]);
    assert_eq!(host.run_pending(), 0);
    assert_eq!(machine.last_captured(), None);
}

#[test]
fn test_round_trip_preserves_program_order() {
    let (machine, host, controller) = setup::<Script>(|builder| builder);
    let (program, log) = script(6, true);
    let ended = Rc::new(Cell::new(0));
    {
        let ended = ended.clone();
        controller.set_on_end(move || ended.set(ended.get() + 1));
    }

    let outcome = machine.start(program, &controller);
    assert!(outcome.is_suspended());
    assert_eq!(*log.borrow(), vec![1]);

    // One scheduled resumption per forced yield.
    assert_eq!(host.run_pending(), 6);

    assert_eq!(*log.borrow(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(ended.get(), 1);
    assert!(!machine.is_suspended());
    assert!(!controller.has_continuation());
}

#[test]
fn test_scheduled_resume_uses_captured_continuation() {
    let (machine, host, controller) = setup::<Script>(|builder| builder);
    let (program, _log) = script(3, true);

    machine.start(program, &controller);
    let captured = machine.last_captured();
    assert_eq!(captured, Some(0));

    assert!(host.run_one());

    assert_eq!(machine.last_resumed(), captured);
}

#[test]
fn test_parked_program_resumes_explicitly() {
    let (machine, host, controller) = setup::<Script>(|builder| builder.on_yield(|| false));
    let (program, log) = script(4, true);

    assert!(machine.start(program, &controller).is_suspended());
    assert_eq!(controller.phase(), Phase::Parked);
    assert_eq!(host.run_pending(), 0);
    assert_eq!(*log.borrow(), vec![1]);

    // Each explicit resume runs until the next forced yield.
    let outcome = controller.resume_from_captured().unwrap();
    assert!(outcome.is_suspended());
    assert_eq!(*log.borrow(), vec![1, 2]);

    controller.set_on_yield(|| true);
    controller.resume_from_captured().unwrap();
    host.run_pending();

    assert_eq!(*log.borrow(), vec![1, 2, 3, 4]);
    assert!(matches!(
        controller.resume_from_captured(),
        Err(Error::NotPaused)
    ));
}

#[test]
fn test_explicit_resume_returns_program_output() {
    let (machine, _host, controller) = setup::<Script>(|builder| builder.on_yield(|| false));
    let (program, _log) = script(3, false);
    let first = Rc::new(Cell::new(true));
    {
        let first = first.clone();
        controller.set_may_yield(move || first.replace(false));
    }

    assert!(machine.start(program, &controller).is_suspended());

    let outcome = controller.resume_from_captured().unwrap();
    assert_eq!(outcome, Outcome::Done(3));
}

#[test]
fn test_nested_units_are_never_interrupted() {
    let (machine, host, controller) = setup::<Counter>(|builder| builder.may_yield(|| true));
    let ticks = Rc::new(RefCell::new(Vec::new()));
    let program = {
        let ticks = ticks.clone();
        Counter::new(6)
            .nested(2, 10)
            .on_tick(move |n| ticks.borrow_mut().push(n))
    };

    assert!(machine.start(program, &controller).is_suspended());
    host.run_pending();

    // The first point and the one after each tick yield; the 33 points
    // inside nested counters do not.
    assert_eq!(machine.last_captured(), Some(6));
    assert_eq!(*ticks.borrow(), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(machine.delimit_depth(), 0);
}

/// Forces a yield from inside a nested unit on every inner step
struct Forcing {
    remaining: u32,
}

impl Program for Forcing {
    type Output = u32;

    fn step(&mut self, _cx: &Cx<'_>) -> Step<u32> {
        if self.remaining == 0 {
            return Step::Done(0);
        }
        self.remaining -= 1;
        Step::Yield
    }
}

struct Outer {
    done: bool,
    depth_seen: Rc<Cell<usize>>,
}

impl Program for Outer {
    type Output = ();

    fn step(&mut self, cx: &Cx<'_>) -> Step<()> {
        if self.done {
            return Step::Done(());
        }
        self.done = true;
        self.depth_seen.set(cx.depth());
        cx.nested(Forcing { remaining: 5 });
        Step::Continue
    }
}

#[test]
fn test_forced_yield_inside_nested_unit_is_ignored() {
    let (machine, _host, controller) = setup::<Outer>(|builder| builder);
    let depth_seen = Rc::new(Cell::new(0));
    let program = Outer {
        done: false,
        depth_seen: depth_seen.clone(),
    };

    let outcome = machine.start(program, &controller);

    assert_eq!(outcome, Outcome::Done(()));
    assert_eq!(depth_seen.get(), 1);
    assert_eq!(machine.last_captured(), None);
}

#[test]
fn test_counter_yields_on_time_budget() {
    let machine = Rc::new(Machine::new());
    let host = Rc::new(QueueHost::default());
    let controller = ControllerBuilder::new(machine.clone(), host.clone())
        .yield_interval(Duration::from_millis(10))
        .estimator(CountdownEstimator::new(Duration::from_millis(1)))
        .build();

    assert!(machine.start(Counter::new(100), &controller).is_suspended());
    let resumes = host.run_pending();

    // Every tenth consulted point yields: before ticks 10, 20, ..., 100.
    assert_eq!(resumes, 10);
    assert_eq!(machine.last_captured(), Some(9));
}
