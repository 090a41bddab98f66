use std::time::Duration;

use derive_more::Display;
use derive_new::new;

use crate::error::DriverError;

/// Lower bound of the chip's system clock, inclusive.
pub const SYSCLK_MIN: f64 = 100e6;
/// Upper bound of the chip's system clock, inclusive.
pub const SYSCLK_MAX: f64 = 500e6;

/// Above this the VCO gain bit must be set.
const VCO_GAIN_THRESHOLD: f64 = 225e6;
/// FR1\[23\]; selects the high VCO gain range.
const VCO_GAIN_BIT: u8 = 0x80;
/// Open band `(160 MHz, 255 MHz)` where neither datasheet VCO range applies.
const AMBIGUOUS_BAND_LO: f64 = 160e6;
const AMBIGUOUS_BAND_HI: f64 = 255e6;

/// Non-fatal diagnostic: the multiplier was programmed, but the resulting
/// clock lies in a band the datasheet gives no operation guarantee for.
#[derive(new, Debug, Display, Clone, Copy, PartialEq)]
#[display(
    "System clock ({effective_hz:.4e} Hz) lies between 160 MHz and 255 MHz; operation is not guaranteed"
)]
pub struct ClockBandWarning {
    pub effective_hz: f64,
}

/// Reference clock and PLL multiplier bookkeeping.
///
/// Every conversion and sweep computation is parameterized by
/// [`effective_hz`](Self::effective_hz); changing the clock ripples into all
/// subsequent register images but never touches the bus itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemClock {
    reference_hz: f64,
    multiplier: u8,
}

impl SystemClock {
    #[must_use]
    pub const fn new(reference_hz: f64) -> Self {
        Self {
            reference_hz,
            multiplier: 1,
        }
    }

    #[must_use]
    pub const fn reference_hz(&self) -> f64 {
        self.reference_hz
    }

    #[must_use]
    pub const fn multiplier(&self) -> u8 {
        self.multiplier
    }

    /// The effective system clock in Hz.
    #[must_use]
    pub fn effective_hz(&self) -> f64 {
        self.reference_hz * f64::from(self.multiplier)
    }

    /// One frequency-tuning-word LSB in Hz.
    #[must_use]
    pub fn ftw_step(&self) -> f64 {
        self.effective_hz() / 2f64.powi(32)
    }

    /// The shortest sweep step interval the ramp-rate timer can express.
    #[must_use]
    pub fn min_interval(&self) -> Duration {
        Duration::from_secs_f64(4.0 / self.effective_hz())
    }

    /// The longest sweep step interval the ramp-rate timer can express.
    #[must_use]
    pub fn max_interval(&self) -> Duration {
        Duration::from_secs_f64(255.0 * 4.0 / self.effective_hz())
    }

    /// Updates the reference frequency.
    ///
    /// Pure bookkeeping: if the effective clock changes, the caller must
    /// re-push the FR1 multiplier register itself.
    pub fn set_reference(&mut self, hz: f64) {
        self.reference_hz = hz;
    }

    /// Validates `multiplier` and builds the new FR1 image from the live
    /// register bytes.
    ///
    /// The charge-pump bits and bytes 1..2 of `fr1` are preserved. The VCO
    /// gain bit is set above 225 MHz and cleared below 160 MHz; in the
    /// ambiguous band a [`ClockBandWarning`] is returned alongside success.
    /// On error the clock state is left untouched.
    pub fn set_multiplier(
        &mut self,
        multiplier: u8,
        fr1: [u8; 3],
    ) -> Result<([u8; 3], Option<ClockBandWarning>), DriverError> {
        if multiplier != 1 && !(4..=20).contains(&multiplier) {
            return Err(DriverError::InvalidMultiplier(multiplier));
        }
        let effective_hz = self.reference_hz * f64::from(multiplier);
        if !(SYSCLK_MIN..=SYSCLK_MAX).contains(&effective_hz) {
            return Err(DriverError::ClockOutOfRange { hz: effective_hz });
        }

        let charge_pump = fr1[0] & 0x03;
        let byte0 = match multiplier {
            1 => charge_pump,
            m if effective_hz > VCO_GAIN_THRESHOLD => charge_pump | m << 2 | VCO_GAIN_BIT,
            m => charge_pump | m << 2,
        };
        let warning = (AMBIGUOUS_BAND_LO < effective_hz && effective_hz < AMBIGUOUS_BAND_HI)
            .then(|| ClockBandWarning::new(effective_hz));

        self.multiplier = multiplier;
        Ok(([byte0, fr1[1], fr1[2]], warning))
    }
}
