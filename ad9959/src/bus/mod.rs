#[cfg(feature = "bus-audit")]
mod audit;

#[cfg(feature = "bus-audit")]
pub use audit::{Audit, Transaction};
