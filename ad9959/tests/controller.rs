use std::time::Duration;

use ad9959::{
    bus::{Audit, Transaction},
    prelude::*,
};
use approx::assert_abs_diff_eq;

const FTW_40MHZ: [u8; 4] = 343_597_384u32.to_be_bytes();
const FTW_80MHZ: [u8; 4] = 687_194_767u32.to_be_bytes();

/// A freshly initialized controller at a 500 MHz effective clock.
fn controller() -> Ad9959<Audit> {
    let mut dev = Ad9959::new(Audit::new(), 50e6);
    dev.reset_and_initialize(10).unwrap();
    dev
}

fn mask(indices: &[u8]) -> ChannelMask {
    ChannelMask::from_indices(indices.iter().copied()).unwrap()
}

#[test]
fn initialization_sequence() -> anyhow::Result<()> {
    let mut dev = Ad9959::new(Audit::new(), 50e6);
    let warning = dev.reset_and_initialize(10)?;
    assert_eq!(None, warning);
    assert_eq!(500e6, dev.clock().effective_hz());

    let audit = dev.transport();
    // Multiplier 10 with VCO gain, full-scale current, channel 0 selected,
    // all applied by a single update pulse.
    assert_eq!(vec![0xA8, 0x00, 0x00], audit.active(Register::FR1));
    assert_eq!(vec![0x00, 0x03, 0x00], audit.active(Register::CFR));
    assert_eq!(vec![0x12], audit.active(Register::CSR));
    assert_eq!(1, audit.commits());

    assert_eq!(
        ChannelMask::from(Channel::Ch0),
        dev.active_channels()?
    );
    Ok(())
}

#[test]
fn initialization_rejects_bad_clock_before_touching_the_chip() {
    let mut dev = Ad9959::new(Audit::new(), 50.0001e6);
    assert!(matches!(
        dev.reset_and_initialize(10),
        Err(Ad9959Error::Driver(DriverError::ClockOutOfRange { .. }))
    ));
    assert!(dev.transport().log().is_empty());

    let mut dev = Ad9959::new(Audit::new(), 50e6);
    assert!(matches!(
        dev.reset_and_initialize(3),
        Err(Ad9959Error::Driver(DriverError::InvalidMultiplier(3)))
    ));
    assert!(dev.transport().log().is_empty());
}

#[test]
fn initialization_reports_the_clock_band_warning() -> anyhow::Result<()> {
    let mut dev = Ad9959::new(Audit::new(), 50e6);
    let warning = dev.reset_and_initialize(4)?;
    assert_eq!(Some(ClockBandWarning::new(200e6)), warning);
    Ok(())
}

#[test]
fn committed_frequency_reads_back() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(40e6), true)?;

    assert_eq!(FTW_40MHZ.to_vec(), dev.transport().active(Register::CFTW0));
    assert_eq!(40e6, dev.channel_state(Channel::Ch0).frequency_hz());
    assert_eq!(SweepPhase::Idle, dev.channel_state(Channel::Ch0).sweep());

    let state = dev.read_state()?;
    assert_abs_diff_eq!(40e6, state.frequency_hz, epsilon = dev.clock().ftw_step());
    assert_eq!(1.0, state.amplitude);
    assert_eq!(1, state.current_divider);
    Ok(())
}

#[test]
fn uncommitted_write_diverges_from_the_applied_registers() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(40e6), true)?;
    dev.set_output(mask(&[0]), Output::Frequency(80e6), false)?;

    // Shadow and I/O buffer hold the new value, the applied register the old.
    assert_eq!(80e6, dev.channel_state(Channel::Ch0).frequency_hz());
    assert_eq!(FTW_40MHZ.to_vec(), dev.transport().active(Register::CFTW0));
    assert_eq!(
        Some(FTW_80MHZ.as_slice()),
        dev.transport().staged(Register::CFTW0)
    );

    // Readback goes through the buffer, so it already sees the new value.
    let state = dev.read_state()?;
    assert_abs_diff_eq!(80e6, state.frequency_hz, epsilon = dev.clock().ftw_step());
    Ok(())
}

#[test]
fn full_scale_amplitude_bypasses_the_scaler() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_current(mask(&[0]), 4, true)?;
    dev.set_output(mask(&[0]), Output::Amplitude(1.0), true)?;

    let acr = dev.transport().active(Register::ACR);
    assert_eq!(0, acr[1] & 0x10);
    assert_eq!(1.0, dev.read_state()?.amplitude);

    // The divider bits survive the amplitude write.
    assert_eq!(4, dev.read_state()?.current_divider);
    assert_eq!(0b10, dev.transport().active(Register::CFR)[1] & 0x03);
    Ok(())
}

#[test]
fn scaled_amplitude_reads_back() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Amplitude(0.5), true)?;

    // 0.5 * 1023 rounds to word 512.
    assert_eq!(
        vec![0x00, 0x12, 0x00],
        dev.transport().active(Register::ACR)
    );
    assert_abs_diff_eq!(0.5, dev.read_state()?.amplitude, epsilon = 1.0 / 1023.0);
    assert_eq!(0.5, dev.channel_state(Channel::Ch0).amplitude());
    Ok(())
}

#[test]
fn phase_reads_back() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Phase(180.0), true)?;
    assert_eq!(vec![0x20, 0x00], dev.transport().active(Register::CPOW0));
    assert_abs_diff_eq!(180.0, dev.read_state()?.phase_deg);
    Ok(())
}

#[rstest::rstest]
#[case(1, 0b11)]
#[case(2, 0b01)]
#[case(4, 0b10)]
#[case(8, 0b00)]
fn current_divider_encoding(#[case] divider: u8, #[case] bits: u8) {
    let mut dev = controller();
    dev.set_current(ChannelMask::ALL, divider, true).unwrap();
    assert_eq!(bits, dev.transport().active(Register::CFR)[1] & 0x03);
    assert_eq!(divider, dev.read_state().unwrap().current_divider);
    assert_eq!(divider, dev.channel_state(Channel::Ch2).current_divider());
}

#[test]
fn invalid_current_divider() {
    let mut dev = controller();
    assert!(matches!(
        dev.set_current(ChannelMask::ALL, 3, true),
        Err(Ad9959Error::Driver(DriverError::InvalidDivider(3)))
    ));
}

#[test]
fn selection_follows_the_last_write() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[1, 3]), Output::Frequency(10e6), false)?;
    assert_eq!(mask(&[1, 3]), dev.active_channels()?);
    Ok(())
}

#[test]
fn up_sweep_with_dwell_holds_the_end_point() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(40e6), true)?;
    dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        40e6,
        80e6,
        Duration::from_secs(1),
        false,
        true,
        true,
    )?;

    assert_eq!(SweepPhase::Running, dev.channel_state(Channel::Ch0).sweep());
    let state = dev.read_state()?;
    assert_abs_diff_eq!(80e6, state.frequency_hz, epsilon = dev.clock().ftw_step());
    Ok(())
}

#[test]
fn no_dwell_sweep_snaps_back_to_the_start() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(40e6), true)?;
    dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        40e6,
        80e6,
        Duration::from_secs(1),
        true,
        true,
        true,
    )?;

    let state = dev.read_state()?;
    assert_abs_diff_eq!(40e6, state.frequency_hz, epsilon = dev.clock().ftw_step());
    Ok(())
}

#[test]
fn down_sweep_from_idle_is_primed_with_a_decoy() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(80e6), true)?;
    dev.transport_mut().clear_log();

    dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        80e6,
        40e6,
        Duration::from_secs(1),
        false,
        true,
        true,
    )?;

    // Decoy commit, then the real commit, and only then the profile pin.
    assert_eq!(2, dev.transport().commits());
    let log = dev.transport().log();
    let last_update = log
        .iter()
        .rposition(|t| matches!(t, Transaction::Line { line: IoLine::Update, .. }))
        .unwrap();
    let profile = log
        .iter()
        .position(|t| matches!(t, Transaction::Line { line: IoLine::Profile(_), .. }))
        .unwrap();
    assert!(last_update < profile);
    assert_eq!(SweepPhase::Running, dev.channel_state(Channel::Ch0).sweep());
    Ok(())
}

#[test]
fn running_channel_needs_no_second_decoy() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(80e6), true)?;
    dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        80e6,
        40e6,
        Duration::from_secs(1),
        false,
        true,
        true,
    )?;

    dev.transport_mut().clear_log();
    dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        80e6,
        40e6,
        Duration::from_secs(1),
        false,
        true,
        true,
    )?;
    assert_eq!(1, dev.transport().commits());
    Ok(())
}

#[test]
fn rejected_sweep_stages_nothing() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.transport_mut().clear_log();

    // 3 us is above the ramp-rate ceiling at 500 MHz.
    assert!(matches!(
        dev.start_sweep(
            mask(&[1, 3]),
            SweepKind::Amplitude,
            0.1,
            0.9,
            Duration::from_micros(3),
            false,
            true,
            false,
        ),
        Err(Ad9959Error::Driver(DriverError::IntervalOutOfRange { .. }))
    ));

    // In particular no channel-select byte: the next committed operation
    // must not silently re-scope to [1, 3].
    assert_eq!(None, dev.transport().staged(Register::CSR));
    assert!(dev.transport().log().is_empty());
    dev.set_multiplier(10, true)?;
    assert_eq!(ChannelMask::from(Channel::Ch0), dev.active_channels()?);
    Ok(())
}

#[test]
fn running_channel_settles_when_the_next_operation_arrives() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(40e6), true)?;
    dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        40e6,
        80e6,
        Duration::from_secs(1),
        false,
        true,
        true,
    )?;
    assert_eq!(SweepPhase::Running, dev.channel_state(Channel::Ch0).sweep());

    // A dwelling sweep holds its destination.
    dev.set_current(mask(&[0]), 1, true)?;
    assert_eq!(SweepPhase::Held, dev.channel_state(Channel::Ch0).sweep());

    // A no-dwell sweep has snapped back, so it settles to idle instead.
    dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        40e6,
        80e6,
        Duration::from_secs(1),
        true,
        true,
        true,
    )?;
    dev.set_current(mask(&[0]), 1, true)?;
    assert_eq!(SweepPhase::Idle, dev.channel_state(Channel::Ch0).sweep());
    Ok(())
}

#[test]
fn staged_only_down_sweep_reports_priming_owed() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(80e6), true)?;
    dev.transport_mut().clear_log();

    let pending = dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        80e6,
        40e6,
        Duration::from_secs(1),
        false,
        false,
        false,
    )?;
    assert_eq!(Some(PrimingPending::new(mask(&[0]))), pending);
    assert_eq!(0, dev.transport().commits());

    // Committing the same request runs the decoy itself; nothing is owed.
    let pending = dev.start_sweep(
        mask(&[0]),
        SweepKind::Frequency,
        80e6,
        40e6,
        Duration::from_secs(1),
        false,
        true,
        true,
    )?;
    assert_eq!(None, pending);
    assert_eq!(2, dev.transport().commits());
    Ok(())
}

#[test]
fn trigger_without_commit_is_rejected_up_front() {
    let mut dev = controller();
    dev.transport_mut().clear_log();
    assert_eq!(
        Err(Ad9959Error::TriggerWithoutCommit),
        dev.start_sweep(
            mask(&[0]),
            SweepKind::Frequency,
            40e6,
            80e6,
            Duration::from_secs(1),
            false,
            false,
            true,
        )
    );
    assert!(dev.transport().log().is_empty());
}

#[test]
fn sweep_validation_errors_propagate() {
    let mut dev = controller();
    assert!(matches!(
        dev.start_sweep(
            mask(&[0]),
            SweepKind::Amplitude,
            0.1,
            0.9,
            Duration::from_micros(3),
            false,
            true,
            false,
        ),
        Err(Ad9959Error::Driver(DriverError::IntervalOutOfRange { .. }))
    ));
    assert!(matches!(
        dev.start_sweep(
            mask(&[0]),
            SweepKind::Frequency,
            40e6,
            40e6,
            Duration::from_secs(1),
            false,
            true,
            false,
        ),
        Err(Ad9959Error::Driver(DriverError::SweepRangeEmpty { .. }))
    ));
}

#[test]
fn broken_transport_surfaces_and_leaves_the_shadow_alone() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_output(mask(&[0]), Output::Frequency(40e6), true)?;

    dev.transport_mut().break_down();
    assert!(matches!(
        dev.set_output(mask(&[0]), Output::Frequency(80e6), true),
        Err(Ad9959Error::Driver(DriverError::Bus(_)))
    ));
    assert_eq!(40e6, dev.channel_state(Channel::Ch0).frequency_hz());

    dev.transport_mut().repair();
    dev.set_output(mask(&[0]), Output::Frequency(80e6), true)?;
    assert_eq!(80e6, dev.channel_state(Channel::Ch0).frequency_hz());
    Ok(())
}

#[test]
fn reference_change_reshapes_later_conversions() -> anyhow::Result<()> {
    let mut dev = controller();
    dev.set_clock_reference(25e6);
    assert_eq!(250e6, dev.clock().effective_hz());

    // Same request, new clock: a different tuning word.
    dev.set_output(mask(&[0]), Output::Frequency(40e6), true)?;
    assert_eq!(
        FTW_80MHZ.to_vec(),
        dev.transport().active(Register::CFTW0)
    );
    Ok(())
}
