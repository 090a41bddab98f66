use std::time::Duration;

use ad9959_core::{channel::ChannelMask, registers::Register};
use derive_new::new;

use crate::{
    clock::SystemClock,
    error::DriverError,
    units::{amplitude_ramp_word, msb_justified, FrequencyWord},
};

/// Step-rate timer granularity of a frequency sweep.
pub const FREQUENCY_STEP_TICK: Duration = Duration::from_micros(1);
/// Step-rate timer granularity of an amplitude sweep.
pub const AMPLITUDE_STEP_TICK: Duration = Duration::from_micros(2);

/// The parameter a linear sweep ramps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    Frequency,
    Amplitude,
}

impl SweepKind {
    const fn tick(self) -> Duration {
        match self {
            SweepKind::Frequency => FREQUENCY_STEP_TICK,
            SweepKind::Amplitude => AMPLITUDE_STEP_TICK,
        }
    }

    /// AFP-select bits for CFR byte 0.
    ///
    /// The constants differ between the two sweep profiles and are kept
    /// exactly as observed on hardware; see the datasheet before unifying.
    const fn afp_select(self) -> u8 {
        match self {
            SweepKind::Frequency => 0x80,
            SweepKind::Amplitude => 0x40,
        }
    }

    /// The start-point register of this sweep profile.
    const fn start_register(self) -> Register {
        match self {
            SweepKind::Frequency => Register::CFTW0,
            SweepKind::Amplitude => Register::ACR,
        }
    }
}

/// Everything the chip needs to run one two-level linear sweep.
///
/// Transient: built per request, consumed into register writes, never
/// persisted. The rising words/rates apply while the profile pin is high,
/// the falling ones while it is low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSpec {
    pub kind: SweepKind,
    pub channels: ChannelMask,
    pub start_word: u32,
    pub end_word: u32,
    pub rising_step_word: u32,
    pub falling_step_word: u32,
    /// Rising step interval in quarter-clock ticks (RSRR byte).
    pub rising_rate: u8,
    /// Falling step interval in quarter-clock ticks (FSRR byte).
    pub falling_rate: u8,
    pub no_dwell: bool,
}

/// The staged register writes of one sweep program, in commit order.
#[derive(new, Debug, Clone, PartialEq)]
#[new(visibility = "pub(crate)")]
pub struct SweepImage {
    spec: SweepSpec,
    writes: Vec<(Register, Vec<u8>)>,
}

impl SweepImage {
    #[must_use]
    pub const fn spec(&self) -> &SweepSpec {
        &self.spec
    }

    #[must_use]
    pub fn writes(&self) -> &[(Register, Vec<u8>)] {
        &self.writes
    }
}

/// Validates a linear sweep from `start` up to `end` over `duration` and
/// computes its words and rates, without needing any register state.
///
/// `start` must lie below `end` in physical units; a down-going request is
/// expressed by driving the profile pin low against the very same image.
/// Everything that can be rejected is rejected here, so a caller can fail
/// before its first bus transfer.
pub fn plan(
    kind: SweepKind,
    channels: ChannelMask,
    start: f64,
    end: f64,
    duration: Duration,
    no_dwell: bool,
    clock: &SystemClock,
) -> Result<SweepSpec, DriverError> {
    // Durations below one tick collapse to a single step at the raw duration.
    let step_count = (duration.as_nanos() / kind.tick().as_nanos()).max(1) as f64;
    let interval = duration.as_secs_f64() / step_count;

    let min = 4.0 / clock.effective_hz();
    let max = 255.0 * min;
    if !(min..=max).contains(&interval) {
        return Err(DriverError::IntervalOutOfRange {
            interval: Duration::from_secs_f64(interval),
            min: clock.min_interval(),
            max: clock.max_interval(),
        });
    }
    let rate = (interval * clock.effective_hz() / 4.0).round() as u8;

    let step = (end - start) / step_count;
    let (start_word, end_word, step_word) = match kind {
        SweepKind::Frequency => (
            FrequencyWord::from_hz(start, clock)?.0,
            FrequencyWord::from_hz(end, clock)?.0,
            FrequencyWord::from_hz(step, clock)?.0,
        ),
        SweepKind::Amplitude => (
            u32::from(amplitude_ramp_word(start)?),
            u32::from(amplitude_ramp_word(end)?),
            u32::from(amplitude_ramp_word(step)?),
        ),
    };

    if start_word >= end_word {
        return Err(DriverError::SweepRangeEmpty {
            start: start_word,
            end: end_word,
        });
    }
    Ok(SweepSpec {
        kind,
        channels,
        start_word,
        end_word,
        rising_step_word: step_word,
        falling_step_word: step_word,
        rising_rate: rate,
        falling_rate: rate,
        no_dwell,
    })
}

/// Computes the full register image for a linear sweep; [`plan`] followed
/// by [`SweepSpec::image`].
#[allow(clippy::too_many_arguments)]
pub fn program(
    kind: SweepKind,
    channels: ChannelMask,
    start: f64,
    end: f64,
    duration: Duration,
    no_dwell: bool,
    clock: &SystemClock,
    cfr: [u8; 3],
    fr1: [u8; 3],
) -> Result<SweepImage, DriverError> {
    Ok(plan(kind, channels, start, end, duration, no_dwell, clock)?.image(cfr, fr1))
}

/// Computes the decoy spec used to prime a ramp-down: the same end points,
/// traversed in a single step at the minimum interval — the shortest sweep
/// the hardware can express.
pub fn decoy(
    kind: SweepKind,
    channels: ChannelMask,
    start: f64,
    end: f64,
    no_dwell: bool,
    clock: &SystemClock,
) -> Result<SweepSpec, DriverError> {
    let (start_word, end_word) = match kind {
        SweepKind::Frequency => (
            FrequencyWord::from_hz(start, clock)?.0,
            FrequencyWord::from_hz(end, clock)?.0,
        ),
        SweepKind::Amplitude => (
            u32::from(amplitude_ramp_word(start)?),
            u32::from(amplitude_ramp_word(end)?),
        ),
    };
    if start_word >= end_word {
        return Err(DriverError::SweepRangeEmpty {
            start: start_word,
            end: end_word,
        });
    }
    Ok(SweepSpec {
        kind,
        channels,
        start_word,
        end_word,
        rising_step_word: end_word - start_word,
        falling_step_word: end_word - start_word,
        rising_rate: 1,
        falling_rate: 1,
        no_dwell,
    })
}

impl SweepSpec {
    /// Assembles the ordered register writes for this sweep.
    ///
    /// `cfr` and `fr1` are the live register bytes: both are
    /// read-modify-write so unrelated bits survive.
    #[must_use]
    pub fn image(&self, cfr: [u8; 3], fr1: [u8; 3]) -> SweepImage {
        let spec = *self;
        let mut writes = Vec::with_capacity(7);

        // The sweep feature needs two-level modulation; drop FR1[9:8] if set.
        if fr1[1] & 0x03 != 0 {
            writes.push((Register::FR1, vec![fr1[0], fr1[1] & 0xFC, fr1[2]]));
        }

        writes.push((
            Register::CFR,
            vec![
                spec.kind.afp_select(),
                // Linear-sweep enable, optional no-dwell, preserved low bits.
                0x40 | u8::from(spec.no_dwell) << 7 | (cfr[1] & 0x03),
                cfr[2],
            ],
        ));

        let start = match spec.kind {
            SweepKind::Frequency => spec.start_word.to_be_bytes().to_vec(),
            // Start word low-justified in ACR, every other amplitude mode off.
            SweepKind::Amplitude => {
                vec![0x00, (spec.start_word >> 8) as u8 & 0x03, spec.start_word as u8]
            }
        };
        writes.push((spec.kind.start_register(), start));

        let destination = |word: u32| match spec.kind {
            SweepKind::Frequency => word.to_be_bytes().to_vec(),
            SweepKind::Amplitude => msb_justified(word as u16).to_vec(),
        };
        writes.push((Register::CW1, destination(spec.end_word)));
        writes.push((Register::RDW, destination(spec.rising_step_word)));
        writes.push((Register::FDW, destination(spec.falling_step_word)));

        // Falling ramp-rate byte first, rising second.
        writes.push((Register::LSR, vec![spec.falling_rate, spec.rising_rate]));

        SweepImage::new(spec, writes)
    }
}
