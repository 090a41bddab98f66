use derive_more::Display;
use thiserror::Error;

use crate::channel::Channel;

/// An error produced by a transport.
#[derive(Error, Debug, Display, PartialEq, Eq, Clone)]
#[display("{}", msg)]
pub struct BusError {
    msg: String,
}

impl BusError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// The blocking register bus of the chip.
///
/// Both operations always transfer the register's full declared width; the
/// controller never issues partial transfers.
pub trait Bus: Send {
    /// Writes `data` to the register at `address`.
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError>;

    /// Reads the register at `address` into `buf`.
    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError>;
}

impl Bus for Box<dyn Bus> {
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError> {
        self.as_mut().write(address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.as_mut().read(address, buf)
    }
}

/// A digital line of the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IoLine {
    /// Master reset.
    Reset,
    /// I/O update; a pulse applies every buffered register write at once.
    Update,
    /// A channel's profile pin. Its *level* selects the ramp direction.
    Profile(Channel),
}

/// A digital line level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    #[default]
    Low,
    High,
}

/// The digital output lines attached to the chip.
pub trait IoLines: Send {
    /// Drives `line` to `level` and leaves it there.
    fn set(&mut self, line: IoLine, level: Level) -> Result<(), BusError>;
}

impl IoLines for Box<dyn IoLines> {
    fn set(&mut self, line: IoLine, level: Level) -> Result<(), BusError> {
        self.as_mut().set(line, level)
    }
}

/// Glues two independent transports into the single collaborator the
/// controller expects.
#[derive(Debug)]
pub struct Combined<B, L> {
    pub bus: B,
    pub lines: L,
}

impl<B: Bus, L: Send> Bus for Combined<B, L> {
    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), BusError> {
        self.bus.write(address, data)
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), BusError> {
        self.bus.read(address, buf)
    }
}

impl<B: Send, L: IoLines> IoLines for Combined<B, L> {
    fn set(&mut self, line: IoLine, level: Level) -> Result<(), BusError> {
        self.lines.set(line, level)
    }
}
