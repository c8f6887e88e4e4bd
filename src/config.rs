//! VM configuration
//!
//! [`Config`] gathers every tunable of a [`Vm`](crate::interpreter::engine::Vm):
//! heap size, collector choice and thresholds, and the iteration budget given
//! to each heap traversal. Defaults come from
//! [`constants`](crate::interpreter::constants); the binary overrides them from
//! command-line flags.
//!
//! ```
//! use ufork::config::{Config, GcStrategy};
//!
//! let config = Config::default()
//!     .with_heap_capacity(4096)
//!     .with_gc(GcStrategy::Incremental);
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::str::FromStr;

use crate::interpreter::constants::{
    DEFAULT_HEAP_CAPACITY, GC_CRITICAL, GC_LOW_WATER, GC_STRIDE, GC_TOP_MARGIN,
};
use crate::memory::value::START;

/// Which collector reclaims unreachable cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GcStrategy {
    /// Stop-the-world mark-sweep at safepoints
    #[default]
    MarkSweep,
    /// Tri-color collection, one bounded step per instruction
    Incremental,
    /// Mark-sweep only when the host asks for it
    Manual,
}

impl fmt::Display for GcStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GcStrategy::MarkSweep => "mark-sweep",
            GcStrategy::Incremental => "incremental",
            GcStrategy::Manual => "manual",
        })
    }
}

impl FromStr for GcStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mark-sweep" | "marksweep" | "ms" => Ok(GcStrategy::MarkSweep),
            "incremental" | "inc" => Ok(GcStrategy::Incremental),
            "manual" | "off" => Ok(GcStrategy::Manual),
            other => Err(ConfigError::UnknownGc(other.to_string())),
        }
    }
}

/// Invalid configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("heap capacity {capacity} is too small (minimum {minimum})")]
    HeapTooSmall { capacity: usize, minimum: usize },

    #[error("unknown gc strategy `{0}` (expected mark-sweep, incremental or manual)")]
    UnknownGc(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Tunables for one VM instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Total cells, reserved prefix included
    pub heap_capacity: usize,
    pub gc: GcStrategy,
    pub gc_top_margin: usize,
    pub gc_low_water: usize,
    pub gc_critical: usize,
    pub gc_stride: usize,
    /// Iteration budget per traversal; 0 means "heap capacity"
    pub sanity: usize,
    /// Log every busy re-queue and thread spawn
    pub trace_dispatch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            heap_capacity: DEFAULT_HEAP_CAPACITY,
            gc: GcStrategy::default(),
            gc_top_margin: GC_TOP_MARGIN,
            gc_low_water: GC_LOW_WATER,
            gc_critical: GC_CRITICAL,
            gc_stride: GC_STRIDE,
            sanity: 0,
            trace_dispatch: false,
        }
    }
}

impl Config {
    /// Smallest heap that still leaves room to run anything
    pub const MIN_HEAP: usize = START + 64;

    pub fn with_heap_capacity(mut self, cells: usize) -> Self {
        self.heap_capacity = cells;
        self
    }

    pub fn with_gc(mut self, gc: GcStrategy) -> Self {
        self.gc = gc;
        self
    }

    pub fn with_sanity(mut self, sanity: usize) -> Self {
        self.sanity = sanity;
        self
    }

    pub fn with_trace_dispatch(mut self, on: bool) -> Self {
        self.trace_dispatch = on;
        self
    }

    /// Budget actually handed to traversals
    pub fn effective_sanity(&self) -> usize {
        if self.sanity == 0 {
            self.heap_capacity
        } else {
            self.sanity
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heap_capacity < Self::MIN_HEAP {
            return Err(ConfigError::HeapTooSmall {
                capacity: self.heap_capacity,
                minimum: Self::MIN_HEAP,
            });
        }
        if self.gc_stride == 0 {
            return Err(ConfigError::Zero("gc_stride"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        assert_eq!(config.heap_capacity, 16 * 1024);
        assert_eq!(config.gc, GcStrategy::MarkSweep);
        assert_eq!(config.effective_sanity(), 16 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_tiny_heap() {
        let config = Config::default().with_heap_capacity(8);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HeapTooSmall { capacity: 8, .. })
        ));
    }

    #[test]
    fn test_parse_gc_strategy() {
        assert_eq!("incremental".parse(), Ok(GcStrategy::Incremental));
        assert_eq!("mark-sweep".parse(), Ok(GcStrategy::MarkSweep));
        assert!("copying".parse::<GcStrategy>().is_err());
    }
}
