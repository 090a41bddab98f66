pub mod bus;
pub mod controller;
pub mod error;
pub mod prelude;

pub use ad9959_driver as driver;

pub use controller::Ad9959;
pub use error::Ad9959Error;
