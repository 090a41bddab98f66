pub mod bus;
pub mod channel;
pub mod registers;
