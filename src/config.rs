//! Runtime configuration.

use std::env;
use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::error::Error;

/// Environment variable selecting the process-wide device class.
pub const ENV_DEVICE: &str = "PARVEC_DEVICE";
pub const ENV_REDUCTION_FACTOR: &str = "PARVEC_REDUCTION_FACTOR";
pub const ENV_REDUCTION_THRESHOLD: &str = "PARVEC_REDUCTION_THRESHOLD";
pub const ENV_BUILD_OPTIONS: &str = "PARVEC_BUILD_OPTIONS";

/// Class of compute device a runtime runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    Gpu,
    Cpu,
    /// In-process reference device
    Host,
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceClass::Gpu => "gpu",
            DeviceClass::Cpu => "cpu",
            DeviceClass::Host => "host",
        };
        f.write_str(name)
    }
}

impl FromStr for DeviceClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpu" => Ok(DeviceClass::Gpu),
            "cpu" => Ok(DeviceClass::Cpu),
            "host" => Ok(DeviceClass::Host),
            other => Err(Error::DeviceUnavailable(format!(
                "unknown device class '{other}'"
            ))),
        }
    }
}

/// Tuning knobs shared by every array on a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Device class used by [`Runtime::global`](crate::Runtime::global)
    pub preferred_class: DeviceClass,
    /// Number of elements each work item folds per reduction pass
    pub reduction_factor: usize,
    /// Below this many elements a reduction finishes on the host
    pub reduction_threshold: usize,
    /// First allocation made by `push_back` on an empty array
    pub initial_capacity: usize,
    /// Extra OpenCL compiler flags
    pub build_options: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            preferred_class: DeviceClass::Gpu,
            reduction_factor: 16,
            reduction_threshold: 64,
            initial_capacity: 8,
            build_options: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `PARVEC_*` environment variables.
    ///
    /// Unparseable or out-of-range values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DEVICE) {
            match value.parse() {
                Ok(class) => config.preferred_class = class,
                Err(e) => warn!("ignoring {ENV_DEVICE}={value}: {e}"),
            }
        }
        if let Some(factor) = parse_at_least(&lookup, ENV_REDUCTION_FACTOR, 2) {
            config.reduction_factor = factor;
        }
        if let Some(threshold) = parse_at_least(&lookup, ENV_REDUCTION_THRESHOLD, 1) {
            config.reduction_threshold = threshold;
        }
        if let Some(options) = lookup(ENV_BUILD_OPTIONS) {
            config.build_options = options;
        }

        config
    }

    pub fn with_preferred_class(mut self, class: DeviceClass) -> Self {
        self.preferred_class = class;
        self
    }

    /// Sets the per-pass folding factor. Values below 2 are clamped to 2.
    pub fn with_reduction_factor(mut self, factor: usize) -> Self {
        self.reduction_factor = factor.max(2);
        self
    }

    pub fn with_reduction_threshold(mut self, threshold: usize) -> Self {
        self.reduction_threshold = threshold.max(1);
        self
    }

    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity.max(1);
        self
    }

    pub fn with_build_options(mut self, options: impl Into<String>) -> Self {
        self.build_options = options.into();
        self
    }
}

fn parse_at_least(lookup: &impl Fn(&str) -> Option<String>, key: &str, min: usize) -> Option<usize> {
    let value = lookup(key)?;
    match value.trim().parse::<usize>() {
        Ok(n) if n >= min => Some(n),
        Ok(n) => {
            warn!("ignoring {key}={n}: must be at least {min}");
            None
        }
        Err(e) => {
            warn!("ignoring {key}={value}: {e}");
            None
        }
    }
}
