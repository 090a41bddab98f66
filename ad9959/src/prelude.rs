pub use ad9959_core::{
    bus::{Bus, BusError, Combined, IoLine, IoLines, Level},
    channel::{Channel, ChannelMask},
    registers::Register,
};
pub use ad9959_driver::{
    clock::{ClockBandWarning, SystemClock},
    error::DriverError,
    sweep::SweepKind,
};

pub use crate::{
    controller::{Ad9959, ChannelState, LiveState, Output, PrimingPending, SweepPhase},
    error::Ad9959Error,
};
