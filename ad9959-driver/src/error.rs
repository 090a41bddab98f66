use std::time::Duration;

use ad9959_core::{bus::BusError, channel::ChannelError, registers::UnknownRegister};
use thiserror::Error;

/// An interface for error handling in ad9959-driver.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum DriverError {
    /// The frequency cannot be represented as a nonzero 32-bit tuning word
    /// at the current system clock.
    #[error("Frequency ({hz:.3} Hz) is out of range ([{min:.3} Hz, {max:.3} Hz])")]
    FrequencyOutOfRange { hz: f64, min: f64, max: f64 },

    /// The phase is outside the half-open `[0, 360)` degree domain.
    #[error("Phase ({0} deg) is out of range ([0 deg, 360 deg))")]
    PhaseOutOfRange(f64),

    /// The amplitude scale is outside `(0, 1]` or rounds to a zero word.
    #[error("Amplitude scale ({0}) is out of range ((0, 1])")]
    AmplitudeOutOfRange(f64),

    /// The multiplier is neither 1 nor within `[4, 20]`.
    #[error("Multiplier ({0}) must be 1 or lie in [4, 20]")]
    InvalidMultiplier(u8),

    /// The effective system clock leaves the chip's operating range.
    #[error("System clock ({hz:.4e} Hz) is out of range ([1e8 Hz, 5e8 Hz])")]
    ClockOutOfRange { hz: f64 },

    /// The sweep step interval leaves the 8-bit ramp-rate range at the
    /// quarter-clock timebase.
    #[error("Sweep step interval ({interval:?}) is out of range ([{min:?}, {max:?}])")]
    IntervalOutOfRange {
        interval: Duration,
        min: Duration,
        max: Duration,
    },

    /// The sweep end points collapse onto the same tuning word.
    #[error("Sweep start word ({start:#010X}) must lie below end word ({end:#010X})")]
    SweepRangeEmpty { start: u32, end: u32 },

    /// The current divider is not one of the chip's four scales.
    #[error("Current divider ({0}) must be 1, 2, 4 or 8")]
    InvalidDivider(u8),

    /// Error in the channel selection.
    #[error("{0}")]
    Channel(#[from] ChannelError),

    /// Internal register-map invariant break.
    #[error("{0}")]
    UnknownRegister(#[from] UnknownRegister),

    /// Error in the bus transport, propagated unchanged.
    #[error("{0}")]
    Bus(#[from] BusError),
}
