//! Controller construction and the forced-stop policy
//!
//! # Example
//!
//! ```rust,ignore
//! use yieldpoint_core::runtime::{init, LocalHost};
//!
//! // Inside a tokio LocalSet
//! let controller = init(machine.clone(), Rc::new(LocalHost), &opts)?;
//!
//! // Custom hooks
//! let controller = ControllerBuilder::new(machine, Rc::new(LocalHost))
//!     .yield_interval(Duration::from_millis(50))
//!     .stop_after(Duration::from_secs(2))
//!     .may_yield(|| false)
//!     .build();
//! ```

use std::rc::Rc;
use std::time::Duration;

use tracing::debug;

use super::capability::ExecutionCapability;
use super::controller::Controller;
use super::estimator::{make_estimator, ElapsedTimeEstimator, ExactEstimator};
use super::host::Host;
use crate::config::RuntimeOpts;
use crate::error::Result;

/// Builder for a [`Controller`] with hooks and an optional stop deadline
pub struct ControllerBuilder<C: ExecutionCapability> {
    rts: Rc<C>,
    host: Rc<dyn Host>,
    estimator: Option<Box<dyn ElapsedTimeEstimator>>,
    yield_interval: Duration,
    stop_after: Option<Duration>,
    may_yield: Option<Box<dyn Fn() -> bool>>,
    on_yield: Option<Box<dyn Fn() -> bool>>,
    on_end: Option<Box<dyn Fn()>>,
}

impl<C: ExecutionCapability> ControllerBuilder<C> {
    /// Start from the default options: exact clock, default yield interval,
    /// no deadline, default hooks
    pub fn new(rts: Rc<C>, host: Rc<dyn Host>) -> Self {
        Self {
            rts,
            host,
            estimator: None,
            yield_interval: Duration::from_millis(RuntimeOpts::default().yield_interval_ms),
            stop_after: None,
            may_yield: None,
            on_yield: None,
            on_end: None,
        }
    }

    /// Take the yield interval, estimator and deadline from `opts`
    pub fn options(mut self, opts: &RuntimeOpts) -> Self {
        self.yield_interval = opts.yield_interval();
        self.estimator = Some(make_estimator(opts));
        self.stop_after = opts.stop();
        self
    }

    pub fn yield_interval(mut self, interval: Duration) -> Self {
        self.yield_interval = interval;
        self
    }

    pub fn estimator(mut self, estimator: impl ElapsedTimeEstimator + 'static) -> Self {
        self.estimator = Some(Box::new(estimator));
        self
    }

    /// Arm the forced-stop timer when the controller is built
    pub fn stop_after(mut self, deadline: Duration) -> Self {
        self.stop_after = Some(deadline);
        self
    }

    pub fn may_yield(mut self, f: impl Fn() -> bool + 'static) -> Self {
        self.may_yield = Some(Box::new(f));
        self
    }

    pub fn on_yield(mut self, f: impl Fn() -> bool + 'static) -> Self {
        self.on_yield = Some(Box::new(f));
        self
    }

    pub fn on_end(mut self, f: impl Fn() + 'static) -> Self {
        self.on_end = Some(Box::new(f));
        self
    }

    /// Build the controller and arm the forced-stop timer, if any.
    ///
    /// With a deadline the host must be able to run timers at this point
    /// (for [`LocalHost`](super::LocalHost): inside a `LocalSet`).
    pub fn build(self) -> Controller<C> {
        let estimator = self
            .estimator
            .unwrap_or_else(|| Box::new(ExactEstimator::new()));
        let controller = Controller::new(self.rts, self.host.clone(), estimator, self.yield_interval);

        if let Some(f) = self.may_yield {
            controller.set_may_yield(f);
        }
        if let Some(f) = self.on_yield {
            controller.set_on_yield(f);
        }
        if let Some(f) = self.on_end {
            controller.set_on_end(f);
        }

        if let Some(deadline) = self.stop_after {
            arm_forced_stop(&controller, self.host.as_ref(), deadline);
        }

        controller
    }
}

/// Construct a controller from runtime options.
///
/// Validates `opts` first. When `opts.stop_secs` is set, a one-shot timer
/// forces a stop once it elapses.
pub fn init<C: ExecutionCapability>(
    rts: Rc<C>,
    host: Rc<dyn Host>,
    opts: &RuntimeOpts,
) -> Result<Controller<C>> {
    opts.validate()?;
    Ok(ControllerBuilder::new(rts, host).options(opts).build())
}

fn arm_forced_stop<C: ExecutionCapability>(controller: &Controller<C>, host: &dyn Host, deadline: Duration) {
    debug!(?deadline, "arming forced stop");
    let controller = controller.clone();
    host.defer_after(deadline, Box::new(move || controller.force_stop()));
}
