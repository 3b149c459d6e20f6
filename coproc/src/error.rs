use std::io;

use thiserror::Error;

use crate::codec::Direction;
use crate::register::{CoprocessorState, RegisterId};

/// Failure of the physical channel to the coprocessor
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("register channel unreachable: {0}")]
    Unreachable(#[from] io::Error),
    #[error("coprocessor refused the transaction")]
    Refused,
    #[error("malformed response: expected {expected} bytes, got {got}")]
    Malformed { expected: usize, got: usize },
    #[error("register channel lock poisoned")]
    Poisoned,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("transaction rejected: {direction:?} {register:?} with value {value:#x}")]
    Rejected {
        register: RegisterId,
        direction: Direction,
        value: u32,
    },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("undecodable response {raw:#x} from {register:?}")]
    Malformed { register: RegisterId, raw: u32 },
    #[error("instruction requires single-step state, coprocessor is {0:?}")]
    NotSingleStepping(CoprocessorState),
    #[error("memory writes are refused while the coprocessor is running")]
    Running,
    #[error("session builder is missing {0}")]
    Incomplete(&'static str),
    #[error("bring-up interrupted")]
    Interrupted,
    #[error("session has not been brought up")]
    NotBroughtUp,
    #[error("memory address {0:#x} outside of 0x000-0xFFF")]
    AddressOutOfRange(u32),
    #[error("pixel ({x}, {y}) outside of the 64x32 framebuffer")]
    PixelOutOfBounds { x: u8, y: u8 },
}

impl Error {
    /// Whether the error came from the channel rather than from the host's own checks
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
