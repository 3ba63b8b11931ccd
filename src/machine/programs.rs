//! Ready-made programs

use std::rc::Rc;

use super::{Cx, Program, Step};

/// Counts from zero up to `limit`, one number per step.
///
/// Every `nested_every` ticks it runs an inner counter of `nested_len`
/// steps as a nested unit before moving on.
pub struct Counter {
    count: u64,
    limit: u64,
    nested: Option<(u64, u64)>,
    on_tick: Option<Rc<dyn Fn(u64)>>,
}

impl Counter {
    pub fn new(limit: u64) -> Self {
        Self {
            count: 0,
            limit,
            nested: None,
            on_tick: None,
        }
    }

    pub fn nested(mut self, every: u64, len: u64) -> Self {
        self.nested = (every > 0).then_some((every, len));
        self
    }

    /// Called with each number as it is counted
    pub fn on_tick(mut self, f: impl Fn(u64) + 'static) -> Self {
        self.on_tick = Some(Rc::new(f));
        self
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Program for Counter {
    type Output = u64;

    fn step(&mut self, cx: &Cx<'_>) -> Step<u64> {
        if self.count >= self.limit {
            return Step::Done(self.count);
        }

        self.count += 1;
        if let Some(on_tick) = &self.on_tick {
            on_tick(self.count);
        }

        if let Some((every, len)) = self.nested {
            if self.count % every == 0 {
                cx.nested(Counter::new(len));
            }
        }

        Step::Continue
    }
}
