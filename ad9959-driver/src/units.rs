use crate::{clock::SystemClock, error::DriverError};

/// Phase resolution of the 14-bit phase offset word, in degrees.
pub const PHASE_STEP_DEG: f64 = 360.0 / (1 << 14) as f64;

/// Amplitude resolution of the 10-bit scale factor.
///
/// The denominator is `2^10 - 1`, not `2^10`: a full-scale request must not
/// spill an eleventh bit into the register.
pub const AMPLITUDE_STEP: f64 = 1.0 / 1023.0;

const PHASE_WORD_MASK: u16 = (1 << 14) - 1;
const AMPLITUDE_WORD_MAX: u16 = (1 << 10) - 1;

/// A 32-bit frequency tuning word.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FrequencyWord(pub u32);

impl core::fmt::Debug for FrequencyWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

impl FrequencyWord {
    /// Converts a frequency in Hz at the given system clock.
    ///
    /// Fails if the rounded word is zero or exceeds `2^32 - 1`.
    pub fn from_hz(hz: f64, clock: &SystemClock) -> Result<Self, DriverError> {
        let step = clock.ftw_step();
        let word = (hz / step).round();
        if !(1.0..=u32::MAX as f64).contains(&word) {
            return Err(DriverError::FrequencyOutOfRange {
                hz,
                min: step,
                max: u32::MAX as f64 * step,
            });
        }
        Ok(Self(word as u32))
    }

    /// The frequency this word produces at the given system clock.
    ///
    /// Lossy inverse of [`from_hz`](Self::from_hz): the result is exact for
    /// the word but within one LSB (`effective_hz / 2^32`) of the original
    /// request.
    #[must_use]
    pub fn to_hz(self, clock: &SystemClock) -> f64 {
        f64::from(self.0) * clock.ftw_step()
    }

    /// Big-endian image for the 4-byte tuning-word registers.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

/// A 14-bit phase offset word.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PhaseWord(pub u16);

impl core::fmt::Debug for PhaseWord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06X}", self.0)
    }
}

impl PhaseWord {
    /// Converts a phase in degrees; the domain is half-open `[0, 360)`.
    pub fn from_degrees(deg: f64) -> Result<Self, DriverError> {
        if !(0.0..360.0).contains(&deg) {
            return Err(DriverError::PhaseOutOfRange(deg));
        }
        // Requests within half an LSB of 360 deg wrap to zero.
        Ok(Self((deg / PHASE_STEP_DEG).round() as u16 & PHASE_WORD_MASK))
    }

    #[must_use]
    pub fn to_degrees(self) -> f64 {
        f64::from(self.0) * PHASE_STEP_DEG
    }

    /// Big-endian image for the 2-byte CPOW registers; upper two bits zero.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

/// A 10-bit amplitude scale factor, or the scaling-disabled sentinel.
///
/// A scale of exactly 1 disables amplitude scaling altogether instead of
/// writing the maximal word: the chip still attenuates slightly at
/// `0x3FF`, so full scale must clear the ASF-enable bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmplitudeWord {
    /// Amplitude scaling switched off; the output runs at full scale.
    Disabled,
    /// Amplitude scaling active with the given 10-bit word.
    Scaled(u16),
}

impl AmplitudeWord {
    /// Converts a unitless scale; the domain is `(0, 1]`.
    pub fn from_scale(scale: f64) -> Result<Self, DriverError> {
        if scale == 1.0 {
            return Ok(Self::Disabled);
        }
        Ok(Self::Scaled(amplitude_ramp_word(scale)?))
    }

    #[must_use]
    pub fn to_scale(self) -> f64 {
        match self {
            Self::Disabled => 1.0,
            Self::Scaled(word) => f64::from(word) * AMPLITUDE_STEP,
        }
    }
}

/// Converts a scale in `(0, 1]` to its plain numeric 10-bit word.
///
/// Sweep end points live in ramp registers with no disable sentinel, so full
/// scale maps to `0x3FF` here, unlike [`AmplitudeWord::from_scale`].
pub fn amplitude_ramp_word(scale: f64) -> Result<u16, DriverError> {
    if !(0.0..=1.0).contains(&scale) {
        return Err(DriverError::AmplitudeOutOfRange(scale));
    }
    let word = (scale / AMPLITUDE_STEP).round();
    if !(1.0..=f64::from(AMPLITUDE_WORD_MAX)).contains(&word) {
        return Err(DriverError::AmplitudeOutOfRange(scale));
    }
    Ok(word as u16)
}

/// Top-justifies a 10-bit ramp destination into its 32-bit register image.
///
/// The chip expects the value's MSB at bit 31 (`CW1[31:22]`,
/// `RDW[31:22]`, `FDW[31:22]` for amplitude sweeps); the alignment is
/// byte-for-byte significant.
#[must_use]
pub const fn msb_justified(word: u16) -> [u8; 4] {
    ((word as u32) << 22).to_be_bytes()
}
