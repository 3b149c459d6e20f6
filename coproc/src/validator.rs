//! Gatekeeping of transactions before they reach the coprocessor.
//!
//! A malformed transaction cannot be rolled back once the hardware has seen
//! it, so every exchange is checked here against the register's contract.

use core::convert::TryFrom;

use crate::codec::Direction;
use crate::register::{Access, CoprocessorState, RegisterId, STACK_DEPTH};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    Allow,
    /// Allowed, but the read request word has to be written first
    AllowWithImplicitWrite,
    Reject,
}

pub fn validate(address: RegisterId, proposed_value: u32, direction: Direction) -> Verdict {
    if !address.exists() || proposed_value & !address.payload_mask() != 0 {
        return Verdict::Reject;
    }

    match (address, direction) {
        (RegisterId::StackPointer, Direction::Write) if proposed_value >= STACK_DEPTH as u32 => {
            Verdict::Reject
        }
        (RegisterId::State, Direction::Write)
            if CoprocessorState::try_from(proposed_value).is_err() =>
        {
            Verdict::Reject
        }
        (_, Direction::Read) if address.access() == Access::ReadViaRequest => {
            Verdict::AllowWithImplicitWrite
        }
        _ => Verdict::Allow,
    }
}
