use ad9959_core::{bus::BusError, channel::ChannelError};
use ad9959_driver::DriverError;
use thiserror::Error;

/// An interface for error handling in the controller.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum Ad9959Error {
    /// Error in validation, conversion or the bus transport.
    #[error("{0}")]
    Driver(#[from] DriverError),

    /// A trigger can only follow a commit; a staged-only sweep has nothing
    /// to run yet.
    #[error("Trigger requires commit in the same call")]
    TriggerWithoutCommit,
}

impl From<BusError> for Ad9959Error {
    fn from(e: BusError) -> Self {
        Self::Driver(DriverError::Bus(e))
    }
}

impl From<ChannelError> for Ad9959Error {
    fn from(e: ChannelError) -> Self {
        Self::Driver(DriverError::Channel(e))
    }
}
