//! Capabilities the controller consumes from the execution machinery
//!
//! The controller never owns program state. It reads and flips the
//! suspension flag, checks the nesting depth, and asks the capability to
//! capture or resume a continuation. Implementations are expected to be
//! shared through `Rc`, so every method takes `&self`.

/// Callback handed to [`ExecutionCapability::capture_cc`].
///
/// Invoked exactly once with the continuation for the pending execution.
pub type CaptureCallback<K> = Box<dyn FnOnce(K)>;

/// Continuation capture and resumption primitives plus suspension state.
pub trait ExecutionCapability: 'static {
    /// Opaque representation of one pending execution state
    type Continuation: 'static;

    /// Whatever resuming a continuation eventually produces
    type Output;

    /// True while execution is parked
    fn is_suspended(&self) -> bool;

    fn set_suspended(&self, suspended: bool);

    /// Nesting counter for dynamically invoked inner units.
    ///
    /// Top-level execution runs at depth 1.
    fn delimit_depth(&self) -> usize;

    /// Capture the pending execution state and deliver it to `callback`.
    ///
    /// Further progress of the program stops until the continuation is
    /// handed back to [`resume_from_suspension`](Self::resume_from_suspension).
    fn capture_cc(&self, callback: CaptureCallback<Self::Continuation>);

    /// Resume exactly at the capture point of `continuation`.
    fn resume_from_suspension(&self, continuation: Self::Continuation) -> Self::Output;
}

/// What a running program calls into at compiler-inserted points.
pub trait SuspensionPoint {
    /// Offer the runtime a chance to pause. `force` always yields unless
    /// execution is nested.
    fn suspend(&self, force: bool);

    /// The program ran to completion.
    fn on_end(&self);
}
