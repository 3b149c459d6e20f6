//! Host adapters for the coprocessor: the character-device register channel,
//! a USB keyboard report source and logger setup.

pub mod device;
pub mod keeb;
pub mod logger;

pub use device::CharDevice;
pub use keeb::Keeb;
