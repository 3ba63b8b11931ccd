pub mod cli;
pub mod config;
pub mod error;
pub mod machine;
pub mod runtime;

// Re-export main types
pub use config::{EstimatorKind, RuntimeOpts};
pub use error::{Error, Result};
pub use runtime::{init, Controller, ControllerBuilder, Phase};
