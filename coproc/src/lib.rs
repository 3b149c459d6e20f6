//! Host-side control of a CHIP-8 coprocessor.
//!
//! The coprocessor keeps the whole virtual machine (registers, memory,
//! framebuffer and run state) in hardware and exposes it through a small
//! register file. This crate encodes register operations into wire
//! transactions, checks them before they reach the hardware and sequences
//! sessions on top: bring-up, run control, single stepping and input.

pub mod builder;
pub mod codec;
pub mod error;
pub mod frame;
pub mod gatekeeper;
pub mod keypad;
pub mod register;
pub mod session;
pub mod sim;
pub mod status;
pub mod transport;
pub mod validator;

pub use builder::SessionBuilder;
pub use error::{Error, TransportError};
pub use frame::{Frame, FrameView};
pub use keypad::{translate, Action, KeyReport, ReportSource};
pub use register::{CoprocessorState, KeyState, RegisterId};
pub use session::{LoadReport, Phase, Session};
pub use status::Status;
pub use transport::{Shared, Transport};

#[cfg(feature = "embedded-graphics")]
pub use embedded_graphics;
