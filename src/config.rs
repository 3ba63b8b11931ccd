//! Runtime options
//!
//! Options come from, in increasing priority: built-in defaults, an optional
//! TOML file, and `YIELDPOINT_*` environment variables. Programs embedding
//! the runtime can instead parse them from command-line flags with
//! [`RuntimeOpts::from_args`].

use std::path::Path;
use std::time::Duration;

use clap::{Args, Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable prefix for option overrides
pub const ENV_PREFIX: &str = "YIELDPOINT";

/// Strategy used to estimate time since the last yield
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EstimatorKind {
    /// Read the monotonic clock at every suspension point
    Exact,
    /// Count suspension points, each worth `time_per_elapsed_ms`
    Countdown,
    /// Extrapolate from the measured rate of suspension points
    Velocity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Args)]
#[serde(default)]
pub struct RuntimeOpts {
    /// Time budget between yields, in milliseconds
    #[arg(short = 'y', long = "yield", default_value_t = 100)]
    pub yield_interval_ms: u64,

    /// Elapsed-time estimator
    #[arg(long, value_enum, default_value_t = EstimatorKind::Velocity)]
    pub estimator: EstimatorKind,

    /// Milliseconds each suspension point is worth (countdown estimator)
    #[arg(long = "time-per-elapsed", default_value_t = 1)]
    pub time_per_elapsed_ms: u64,

    /// Milliseconds of estimated time between clock samples (velocity estimator)
    #[arg(long = "resample", default_value_t = 100)]
    pub resample_interval_ms: u64,

    /// Stop rescheduling the program after this many seconds
    #[arg(long = "stop")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_secs: Option<f64>,
}

impl Default for RuntimeOpts {
    fn default() -> Self {
        Self {
            yield_interval_ms: 100,
            estimator: EstimatorKind::Velocity,
            time_per_elapsed_ms: 1,
            resample_interval_ms: 100,
            stop_secs: None,
        }
    }
}

#[derive(Parser)]
#[command(no_binary_name = true)]
struct RuntimeArgs {
    #[command(flatten)]
    opts: RuntimeOpts,
}

impl RuntimeOpts {
    /// Load options from defaults, `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let opts: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        opts.validate()?;
        Ok(opts)
    }

    /// Parse runtime flags such as `--yield 50 --stop 2`
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let opts = RuntimeArgs::try_parse_from(args)?.opts;
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<()> {
        if self.yield_interval_ms == 0 {
            return Err(invalid("yield_interval_ms", "must be greater than zero"));
        }
        if self.time_per_elapsed_ms == 0 {
            return Err(invalid("time_per_elapsed_ms", "must be greater than zero"));
        }
        if self.resample_interval_ms == 0 {
            return Err(invalid("resample_interval_ms", "must be greater than zero"));
        }
        if let Some(stop) = self.stop_secs {
            if Duration::try_from_secs_f64(stop).is_err() {
                return Err(invalid("stop_secs", format!("expected a non-negative number of seconds, got {stop}")));
            }
        }
        Ok(())
    }

    pub fn yield_interval(&self) -> Duration {
        Duration::from_millis(self.yield_interval_ms)
    }

    /// Forced-stop deadline, if any. Out-of-range values, which `validate`
    /// rejects, yield no deadline.
    pub fn stop(&self) -> Option<Duration> {
        self.stop_secs.and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidOption {
        name,
        reason: reason.into(),
    }
}
