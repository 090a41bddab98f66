pub mod clock;
pub mod error;
pub mod sweep;
pub mod units;

pub use clock::{ClockBandWarning, SystemClock};
pub use error::DriverError;
pub use sweep::{SweepImage, SweepKind, SweepSpec};
pub use units::{AmplitudeWord, FrequencyWord, PhaseWord};
