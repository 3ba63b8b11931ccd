//! # Suspend/Resume Runtime
//!
//! Lets a program without native continuations be paused at any point the
//! program offers, and resumed later from exactly that point.
//!
//! ## Core Principles
//!
//! 1. **Cooperative**: the program calls [`Controller::suspend`] at every
//!    suspension point; nothing is ever preempted
//! 2. **Time-budgeted**: a point yields when forced, when `may_yield` says
//!    so, or when the estimated time since the last yield reaches the yield
//!    interval
//! 3. **Single-use continuations**: one slot, consumed before resuming
//! 4. **Nested units are atomic**: no yielding while `delimit_depth > 1`
//!
//! Capturing and resuming are delegated to an [`ExecutionCapability`];
//! scheduling the resumption is delegated to a [`Host`].

pub mod capability;
pub mod controller;
pub mod estimator;
pub mod host;
pub mod init;

#[cfg(test)]
mod tests;

pub use capability::{CaptureCallback, ExecutionCapability, SuspensionPoint};
pub use controller::{Controller, Phase};
pub use estimator::{
    make_estimator, CountdownEstimator, ElapsedTimeEstimator, ExactEstimator, VelocityEstimator,
};
pub use host::{Deferred, Host, LocalHost};
pub use init::{init, ControllerBuilder};
