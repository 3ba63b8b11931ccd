//! Error types for the suspend/resume runtime

use thiserror::Error;

/// Errors reported by the runtime and its configuration layer.
///
/// Double-suspend is not represented here: it is an invariant violation and
/// aborts via a failed assertion in [`Controller::suspend`](crate::runtime::Controller::suspend).
#[derive(Debug, Error)]
pub enum Error {
    /// `resume_from_captured()` found no stored continuation
    #[error("program is not paused. (Did you call .resume() twice?)")]
    NotPaused,

    #[error("failed to load runtime options: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Args(#[from] clap::Error),

    #[error("invalid runtime option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
