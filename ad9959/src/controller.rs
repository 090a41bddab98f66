use std::time::Duration;

use ad9959_core::{
    bus::{Bus, IoLine, IoLines, Level},
    channel::{Channel, ChannelMask},
    registers::Register,
};
use ad9959_driver::{
    clock::{ClockBandWarning, SystemClock},
    error::DriverError,
    sweep::{self, SweepImage, SweepKind},
    units::{AmplitudeWord, FrequencyWord, PhaseWord, AMPLITUDE_STEP},
};
use derive_more::Display;
use derive_new::new;
use getset::{CopyGetters, Getters, MutGetters};

use crate::error::Ad9959Error;

/// A single-tone output request, in physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output {
    /// Frequency in Hz.
    Frequency(f64),
    /// Phase offset in degrees, `[0, 360)`.
    Phase(f64),
    /// Unitless amplitude scale, `(0, 1]`.
    Amplitude(f64),
}

/// Where a channel stands in the stage/commit/trigger sweep protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepPhase {
    /// No sweep staged.
    #[default]
    Idle,
    /// A sweep image sits in the chip's I/O buffer, not yet applied.
    Programmed,
    /// The image is applied; the profile pin has not been driven yet.
    Committed,
    /// The profile pin was driven against the committed image.
    Running,
    /// A dwelling sweep reached its destination and holds it.
    ///
    /// The chip gives no ramp-complete signal, so a [`Running`](Self::Running)
    /// channel moves here (or back to idle, for no-dwell) when the next
    /// operation addresses it.
    Held,
}

impl SweepPhase {
    /// Whether the chip has run an up ramp on this channel already; that is
    /// what arms a subsequent ramp-down.
    const fn primed(self) -> bool {
        matches!(self, SweepPhase::Running | SweepPhase::Held)
    }
}

/// Non-fatal diagnostic from [`Ad9959::start_sweep`]: a down-going sweep was
/// staged without commit, so the ramp-down decoy priming has not run and is
/// still owed before the profile pins are driven.
#[derive(new, Debug, Display, Clone, Copy, PartialEq, Eq)]
#[display("Ramp-down priming is still owed on channels {channels:?}")]
pub struct PrimingPending {
    pub channels: ChannelMask,
}

/// The controller's shadow of one channel's last commanded values.
///
/// Shadows track what was *requested*, not what the chip holds: with
/// `commit = false` the two diverge until the next update pulse.
#[derive(Debug, Clone, Copy, PartialEq, Getters, CopyGetters)]
pub struct ChannelState {
    /// Last commanded frequency in Hz.
    #[getset(get_copy = "pub")]
    frequency_hz: f64,
    /// Last commanded phase offset in degrees.
    #[getset(get_copy = "pub")]
    phase_deg: f64,
    /// Last commanded amplitude scale.
    #[getset(get_copy = "pub")]
    amplitude: f64,
    /// Last commanded full-scale current divider (1, 2, 4 or 8).
    #[getset(get_copy = "pub")]
    current_divider: u8,
    /// Sweep protocol phase.
    #[getset(get_copy = "pub")]
    sweep: SweepPhase,
    /// Whether the last staged sweep holds its destination (dwell).
    dwell: bool,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            frequency_hz: 0.0,
            phase_deg: 0.0,
            amplitude: 1.0,
            current_divider: 1,
            sweep: SweepPhase::Idle,
            dwell: false,
        }
    }
}

/// Values decoded back from the chip's registers, as the bus reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveState {
    pub frequency_hz: f64,
    pub phase_deg: f64,
    pub amplitude: f64,
    pub current_divider: u8,
}

enum ConvertedOutput {
    Frequency(FrequencyWord),
    Phase(PhaseWord),
    Amplitude(AmplitudeWord),
}

/// An AD9959 behind a register bus and a handful of digital lines.
///
/// All mutating operations validate and convert before the first bus
/// transfer, write through the chip's I/O buffer, and apply the buffer with
/// an update pulse when `commit` is requested.
#[derive(Getters, CopyGetters, MutGetters)]
pub struct Ad9959<T: Bus + IoLines> {
    #[getset(get = "pub", get_mut = "pub")]
    transport: T,
    /// The clock every conversion is computed against.
    #[getset(get = "pub")]
    clock: SystemClock,
    states: [ChannelState; 4],
    line_levels: [Level; 4],
}

impl<T: Bus + IoLines> Ad9959<T> {
    /// Creates a controller over `transport` with the given reference clock.
    ///
    /// Nothing is written; call
    /// [`reset_and_initialize`](Self::reset_and_initialize) to bring the
    /// chip into a known state.
    pub fn new(transport: T, reference_hz: f64) -> Self {
        Self {
            transport,
            clock: SystemClock::new(reference_hz),
            states: [ChannelState::default(); 4],
            line_levels: [Level::Low; 4],
        }
    }

    /// Pulses master reset, then programs the PLL multiplier, full-scale
    /// current on all channels, and a single-channel (channel 0) selection,
    /// applied with one update pulse.
    ///
    /// Returns the clock-band warning, if the multiplier raised one.
    pub fn reset_and_initialize(
        &mut self,
        multiplier: u8,
    ) -> Result<Option<ClockBandWarning>, Ad9959Error> {
        // Validate before the reset pulse so a bad multiplier cannot leave
        // the chip wiped but unconfigured.
        {
            let mut probe = self.clock;
            probe.set_multiplier(multiplier, [0x00; 3])?;
        }

        tracing::debug!(multiplier, "reset and initialize");
        self.pulse(IoLine::Reset)?;
        self.states = [ChannelState::default(); 4];
        self.line_levels = [Level::Low; 4];

        let warning = self.set_multiplier(multiplier, false)?;
        self.set_current(ChannelMask::ALL, 1, false)?;
        self.select(Channel::Ch0.into())?;
        self.commit()?;
        Ok(warning)
    }

    /// Sets a single-tone frequency, phase or amplitude on `channels`.
    ///
    /// Any staged or running sweep on those channels is disabled: the CFR
    /// mode bits are cleared back to single tone before the value register
    /// is written.
    pub fn set_output(
        &mut self,
        channels: ChannelMask,
        output: Output,
        commit: bool,
    ) -> Result<(), Ad9959Error> {
        let converted = match output {
            Output::Frequency(hz) => {
                ConvertedOutput::Frequency(FrequencyWord::from_hz(hz, &self.clock)?)
            }
            Output::Phase(deg) => ConvertedOutput::Phase(PhaseWord::from_degrees(deg)?),
            Output::Amplitude(scale) => {
                ConvertedOutput::Amplitude(AmplitudeWord::from_scale(scale)?)
            }
        };
        self.observe_ramps(channels);

        self.select(channels)?;
        // Leave sweep mode, keeping only the current-divider bits.
        let cfr = self.read_reg::<3>(Register::CFR)?;
        self.write_reg(Register::CFR, &[0x00, cfr[1] & 0x03, cfr[2]])?;

        match converted {
            ConvertedOutput::Frequency(word) => {
                self.write_reg(Register::CFTW0, &word.to_be_bytes())?;
            }
            ConvertedOutput::Phase(word) => {
                self.write_reg(Register::CPOW0, &word.to_be_bytes())?;
            }
            ConvertedOutput::Amplitude(word) => {
                let acr = self.read_reg::<3>(Register::ACR)?;
                let bytes = match word {
                    // Clear the ASF-enable bit; the word bits are dont-care.
                    AmplitudeWord::Disabled => [acr[0], acr[1] & 0b1110_1100, 0x00],
                    AmplitudeWord::Scaled(word) => [
                        acr[0],
                        ((acr[1] >> 2) & 0b11_1011) << 2 | 0x10 | (word >> 8) as u8,
                        word as u8,
                    ],
                };
                self.write_reg(Register::ACR, &bytes)?;
                self.reassert_current(channels)?;
            }
        }

        for ch in channels.iter() {
            let state = &mut self.states[ch.index()];
            match output {
                Output::Frequency(hz) => state.frequency_hz = hz,
                Output::Phase(deg) => state.phase_deg = deg,
                Output::Amplitude(scale) => state.amplitude = scale,
            }
            state.sweep = SweepPhase::Idle;
        }

        if commit {
            self.commit()?;
        }
        Ok(())
    }

    /// Sets the full-scale output current divider (1, 2, 4 or 8) on
    /// `channels`.
    pub fn set_current(
        &mut self,
        channels: ChannelMask,
        divider: u8,
        commit: bool,
    ) -> Result<(), Ad9959Error> {
        let bits = divider_bits(divider)?;
        self.observe_ramps(channels);
        self.select(channels)?;
        let cfr = self.read_reg::<3>(Register::CFR)?;
        self.write_reg(Register::CFR, &[cfr[0], cfr[1] & 0xFC | bits, cfr[2]])?;
        channels
            .iter()
            .for_each(|ch| self.states[ch.index()].current_divider = divider);
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    /// Stages (and optionally commits and triggers) a linear sweep from
    /// `start` to `end` over `duration` on `channels`.
    ///
    /// `start > end` requests a down-going ramp: the image is programmed
    /// low-to-high and the profile pins are driven *low* to traverse it
    /// backwards. With `no_dwell` the output snaps back to the start point
    /// on reaching the destination instead of holding it.
    ///
    /// `trigger` drives the profile pins and requires `commit`; a staged
    /// image the chip has not applied cannot run.
    ///
    /// Returns [`PrimingPending`] when a staged-only down-going request
    /// still owes the ramp-down priming sequence.
    #[tracing::instrument(skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub fn start_sweep(
        &mut self,
        channels: ChannelMask,
        kind: SweepKind,
        start: f64,
        end: f64,
        duration: Duration,
        no_dwell: bool,
        commit: bool,
        trigger: bool,
    ) -> Result<Option<PrimingPending>, Ad9959Error> {
        if trigger && !commit {
            return Err(Ad9959Error::TriggerWithoutCommit);
        }
        let down = start > end;
        let (low, high) = if down { (end, start) } else { (start, end) };

        // Everything that can be rejected is rejected before the first bus
        // write; a failed request leaves no stray staged bytes.
        let spec = sweep::plan(kind, channels, low, high, duration, no_dwell, &self.clock)?;

        self.observe_ramps(channels);
        // A down ramp armed while its profile pin already sits low never
        // fires: the chip wants to have finished an up ramp first. Prime it
        // by committing the shortest possible decoy sweep beforehand.
        let needs_priming = down
            && channels.iter().any(|ch| {
                self.line_levels[ch.index()] == Level::Low
                    && !self.states[ch.index()].sweep.primed()
            });
        let decoy = (needs_priming && commit)
            .then(|| sweep::decoy(kind, channels, low, high, no_dwell, &self.clock))
            .transpose()?;

        self.select(channels)?;
        let cfr = self.read_reg::<3>(Register::CFR)?;
        let fr1 = self.read_reg::<3>(Register::FR1)?;

        if let Some(decoy) = decoy {
            tracing::debug!("priming ramp-down with a minimal decoy sweep");
            self.stage(&decoy.image(cfr, fr1))?;
            self.commit()?;
        }
        let pending = (needs_priming && !commit).then(|| {
            tracing::warn!(
                "down-going sweep staged without commit; ramp-down priming left to the caller"
            );
            PrimingPending::new(channels)
        });

        self.stage(&spec.image(cfr, fr1))?;
        for ch in channels.iter() {
            let state = &mut self.states[ch.index()];
            state.sweep = SweepPhase::Programmed;
            state.dwell = !no_dwell;
            match kind {
                SweepKind::Frequency => state.frequency_hz = start,
                SweepKind::Amplitude => state.amplitude = start,
            }
        }

        if commit {
            self.commit()?;
            channels
                .iter()
                .for_each(|ch| self.states[ch.index()].sweep = SweepPhase::Committed);
            if trigger {
                let level = if down { Level::Low } else { Level::High };
                for ch in channels.iter() {
                    if level == Level::High && self.line_levels[ch.index()] == Level::High {
                        // An already-high pin shows the chip no edge.
                        self.set_line(IoLine::Profile(ch), Level::Low)?;
                    }
                    self.set_line(IoLine::Profile(ch), level)?;
                    self.states[ch.index()].sweep = SweepPhase::Running;
                }
            }
        }
        Ok(pending)
    }

    /// Updates the reference clock frequency. Bookkeeping only: if the
    /// effective clock changed, re-program the multiplier to push FR1.
    pub fn set_clock_reference(&mut self, hz: f64) {
        self.clock.set_reference(hz);
        tracing::debug!(
            reference_hz = hz,
            effective_hz = self.clock.effective_hz(),
            "reference clock updated"
        );
    }

    /// Programs the PLL multiplier (1 or 4..=20) into FR1.
    ///
    /// Returns a warning when the effective clock lands in the band the
    /// datasheet gives no operation guarantee for.
    pub fn set_multiplier(
        &mut self,
        multiplier: u8,
        commit: bool,
    ) -> Result<Option<ClockBandWarning>, Ad9959Error> {
        let fr1 = self.read_reg::<3>(Register::FR1)?;
        let (image, warning) = self.clock.set_multiplier(multiplier, fr1)?;
        if let Some(warning) = &warning {
            tracing::warn!("{}", warning);
        }
        self.write_reg(Register::FR1, &image)?;
        if commit {
            self.commit()?;
        }
        Ok(warning)
    }

    /// The channels the chip's CSR currently addresses.
    pub fn active_channels(&mut self) -> Result<ChannelMask, Ad9959Error> {
        let csr = self.read_reg::<1>(Register::CSR)?;
        Ok(ChannelMask::from_csr(csr[0]))
    }

    /// Reads the single-tone registers back and decodes them into physical
    /// units, for the channels currently selected.
    ///
    /// Reads go through the chip's I/O buffer, so uncommitted writes are
    /// visible here before an update pulse applies them.
    pub fn read_state(&mut self) -> Result<LiveState, Ad9959Error> {
        let ftw = u32::from_be_bytes(self.read_reg::<4>(Register::CFTW0)?);
        let pow = u16::from_be_bytes(self.read_reg::<2>(Register::CPOW0)?);
        let acr = self.read_reg::<3>(Register::ACR)?;
        let cfr = self.read_reg::<3>(Register::CFR)?;

        // ASF-enable clear means the scaler is bypassed, i.e. full scale.
        let amplitude = if acr[1] & 0x10 == 0 {
            1.0
        } else {
            f64::from(u16::from(acr[1] & 0x03) << 8 | u16::from(acr[2])) * AMPLITUDE_STEP
        };

        Ok(LiveState {
            frequency_hz: FrequencyWord(ftw).to_hz(&self.clock),
            phase_deg: PhaseWord(pow & 0x3FFF).to_degrees(),
            amplitude,
            current_divider: divider_from_bits(cfr[1]),
        })
    }

    /// The controller's shadow state for `channel`.
    #[must_use]
    pub fn channel_state(&self, channel: Channel) -> &ChannelState {
        &self.states[channel.index()]
    }

    /// The chip gives no ramp-complete signal, so a channel left `Running`
    /// is reclassified when the next operation addresses it: a dwelling
    /// sweep holds its destination, a no-dwell sweep has snapped back.
    fn observe_ramps(&mut self, channels: ChannelMask) {
        for ch in channels.iter() {
            let state = &mut self.states[ch.index()];
            if state.sweep == SweepPhase::Running {
                state.sweep = if state.dwell {
                    SweepPhase::Held
                } else {
                    SweepPhase::Idle
                };
            }
        }
    }

    fn select(&mut self, channels: ChannelMask) -> Result<(), Ad9959Error> {
        self.write_reg(Register::CSR, &[channels.csr_byte()])
    }

    fn stage(&mut self, image: &SweepImage) -> Result<(), Ad9959Error> {
        image
            .writes()
            .iter()
            .try_for_each(|(reg, bytes)| self.write_reg(*reg, bytes))
    }

    /// Every amplitude write to ACR clobbers its low CFR neighbours on some
    /// board revisions; reassert the shadowed divider per channel, then
    /// restore the caller's selection.
    fn reassert_current(&mut self, channels: ChannelMask) -> Result<(), Ad9959Error> {
        for ch in channels.iter() {
            let bits = divider_bits(self.states[ch.index()].current_divider)?;
            self.select(ch.into())?;
            let cfr = self.read_reg::<3>(Register::CFR)?;
            self.write_reg(Register::CFR, &[cfr[0], cfr[1] & 0xFC | bits, cfr[2]])?;
        }
        self.select(channels)
    }

    fn write_reg(&mut self, reg: Register, data: &[u8]) -> Result<(), Ad9959Error> {
        debug_assert_eq!(reg.len(), data.len());
        tracing::trace!(?reg, ?data, "register write");
        Ok(self.transport.write(reg.address(), data)?)
    }

    fn read_reg<const N: usize>(&mut self, reg: Register) -> Result<[u8; N], Ad9959Error> {
        debug_assert_eq!(reg.len(), N);
        let mut buf = [0u8; N];
        self.transport.read(reg.address(), &mut buf)?;
        Ok(buf)
    }

    fn set_line(&mut self, line: IoLine, level: Level) -> Result<(), Ad9959Error> {
        if let IoLine::Profile(ch) = line {
            self.line_levels[ch.index()] = level;
        }
        Ok(self.transport.set(line, level)?)
    }

    fn pulse(&mut self, line: IoLine) -> Result<(), Ad9959Error> {
        self.set_line(line, Level::Low)?;
        self.set_line(line, Level::High)?;
        self.set_line(line, Level::Low)
    }

    /// Pulses I/O update, applying every buffered register write at once.
    fn commit(&mut self) -> Result<(), Ad9959Error> {
        tracing::trace!("update pulse");
        self.pulse(IoLine::Update)
    }
}

/// CFR\[9:8\] encoding of the full-scale current divider.
const fn divider_bits(divider: u8) -> Result<u8, DriverError> {
    match divider {
        1 => Ok(0b11),
        2 => Ok(0b01),
        4 => Ok(0b10),
        8 => Ok(0b00),
        _ => Err(DriverError::InvalidDivider(divider)),
    }
}

const fn divider_from_bits(cfr1: u8) -> u8 {
    match cfr1 & 0x03 {
        0b11 => 1,
        0b01 => 2,
        0b10 => 4,
        _ => 8,
    }
}
