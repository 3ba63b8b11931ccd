//! The host's single-threaded scheduler
//!
//! Suspension never blocks a thread. A paused program is resumed from a
//! callback that the host runs on a later turn of its event loop, after any
//! work already pending.

use std::time::Duration;

/// A task the host runs later, on its own thread.
pub type Deferred = Box<dyn FnOnce()>;

/// Deferred-callback queue and one-shot timer of the host event loop.
pub trait Host {
    /// Run `task` on a later turn, after currently pending work.
    fn defer(&self, task: Deferred);

    /// Run `task` once `delay` has elapsed.
    fn defer_after(&self, delay: Duration, task: Deferred);
}

/// Host backed by the tokio `LocalSet` the caller is running inside.
///
/// Both methods panic when called outside a `LocalSet` context, as
/// `tokio::task::spawn_local` does.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalHost;

impl Host for LocalHost {
    fn defer(&self, task: Deferred) {
        tokio::task::spawn_local(async move {
            task();
        });
    }

    fn defer_after(&self, delay: Duration, task: Deferred) {
        tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}
