use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod blocking_queue;
pub use blocking_queue::BlockingQueue;

// ============================================================================
// PHASE
// ============================================================================

/// One of the two states a signal head can show.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Phase {
    #[default]
    Red = 0,
    Green = 1,
}

impl Phase {
    /// The phase the light switches to next.
    pub fn toggled(self) -> Self {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Red,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Inverse of [`Phase::as_u8`]. Any non-zero value reads as green.
    pub fn from_u8(raw: u8) -> Self {
        if raw == 0 {
            Phase::Red
        } else {
            Phase::Green
        }
    }

    pub fn is_green(self) -> bool {
        self == Phase::Green
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Red => f.write_str("red"),
            Phase::Green => f.write_str("green"),
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

pub const DEFAULT_MIN_CYCLE_MS: u64 = 4000;
pub const DEFAULT_MAX_CYCLE_MS: u64 = 6000;
pub const DEFAULT_TICK_MS: u64 = 1;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("min_cycle_ms ({min}) must be lower than max_cycle_ms ({max})")]
    EmptyCycleRange { min: u64, max: u64 },
    #[error("tick_ms must be greater than zero")]
    ZeroTick,
    #[error("tick_ms ({tick}) must not exceed min_cycle_ms ({min})")]
    TickTooLong { tick: u64, min: u64 },
}

/// Timing parameters for the phase cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SignalConfig {
    /// Lower bound (inclusive) of a phase duration in milliseconds
    pub min_cycle_ms: u64,
    /// Upper bound (exclusive) of a phase duration in milliseconds
    pub max_cycle_ms: u64,
    /// Sleep between two iterations of the cycle loop
    pub tick_ms: u64,
    /// Draw a fresh duration after every toggle instead of reusing the first one
    pub reroll_each_cycle: bool,
    /// Fixed RNG seed for reproducible schedules
    pub seed: Option<u64>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            min_cycle_ms: DEFAULT_MIN_CYCLE_MS,
            max_cycle_ms: DEFAULT_MAX_CYCLE_MS,
            tick_ms: DEFAULT_TICK_MS,
            reroll_each_cycle: true,
            seed: None,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_cycle_ms >= self.max_cycle_ms {
            return Err(ConfigError::EmptyCycleRange {
                min: self.min_cycle_ms,
                max: self.max_cycle_ms,
            });
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if self.tick_ms > self.min_cycle_ms {
            return Err(ConfigError::TickTooLong {
                tick: self.tick_ms,
                min: self.min_cycle_ms,
            });
        }
        Ok(())
    }

    /// Half-open range a phase duration is drawn from.
    pub fn cycle_range(&self) -> std::ops::Range<Duration> {
        Duration::from_millis(self.min_cycle_ms)..Duration::from_millis(self.max_cycle_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
