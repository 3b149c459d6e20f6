//! Register file of the coprocessor as seen from the host.
//!
//! Every register is reachable through a single 8-bit address placed in the
//! top byte of a wire word. The remaining 24 bits carry the payload, whose
//! layout depends on the register:
//!
//! ```text
//! 31      24 23                                   0
//! +---------+--------------------------------------+
//! | address |               payload                |
//! +---------+--------------------------------------+
//! ```
//!
//! `Memory` and `Framebuffer` share one address between reads and writes.
//! The direction is a flag inside the payload and a read has to be preceded by
//! a request word pushed through the write channel.

use core::convert::TryFrom;

/// Bit position of the register address inside a wire word
pub const ADDRESS_SHIFT: u32 = 24;
/// Mask of the payload part of a wire word
pub const PAYLOAD_MASK: u32 = 0x00FF_FFFF;

/// Number of general purpose registers
pub const V_COUNT: u8 = 16;
/// Deepest stack the hardware can hold, valid pointer values are `0..STACK_DEPTH`
pub const STACK_DEPTH: u8 = 64;

/// Size of the addressable memory window
pub const MEMORY_SIZE: usize = 0x1000;
/// Highest memory address
pub const MEMORY_END: u16 = 0x0FFF;
/// Where programs are loaded and where the program counter starts
pub const PROGRAM_START: u16 = 0x0200;
/// Longest program that fits between `PROGRAM_START` and `MEMORY_END`
pub const PROGRAM_CAPACITY: usize = MEMORY_SIZE - PROGRAM_START as usize;

/// Framebuffer dimensions
pub const WIDTH: usize = 64;
pub const HEIGHT: usize = 32;

/// Addressable registers of the coprocessor
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum RegisterId {
    /// General purpose register `V0..VF`, index has to be below 16
    V(u8),
    I,
    SoundTimer,
    DelayTimer,
    StackPointer,
    StackPush,
    ProgramCounter,
    KeyPress,
    State,
    Memory,
    Framebuffer,
    Instruction,
}

/// How a register may be accessed by the host
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Access {
    /// Plain register, written and read directly
    ReadWrite,
    /// Writes have a side effect, reads carry no meaning
    WriteOnly,
    /// Shared read/write address, a read needs a request word written first
    ReadViaRequest,
}

impl RegisterId {
    /// Every register except the sixteen `V` registers, in address order
    pub const SPECIAL: [RegisterId; 11] = [
        RegisterId::I,
        RegisterId::SoundTimer,
        RegisterId::DelayTimer,
        RegisterId::StackPointer,
        RegisterId::StackPush,
        RegisterId::ProgramCounter,
        RegisterId::KeyPress,
        RegisterId::State,
        RegisterId::Memory,
        RegisterId::Framebuffer,
        RegisterId::Instruction,
    ];

    /// Address of the register on the bus
    ///
    /// `V` registers with an index above 15 do not exist; their index is
    /// returned unchanged so the validator can refuse them.
    pub fn address(&self) -> u8 {
        match *self {
            RegisterId::V(n) => n,
            RegisterId::I => 0x10,
            RegisterId::SoundTimer => 0x11,
            RegisterId::DelayTimer => 0x12,
            RegisterId::StackPointer => 0x13,
            RegisterId::StackPush => 0x14,
            RegisterId::ProgramCounter => 0x15,
            RegisterId::KeyPress => 0x16,
            RegisterId::State => 0x17,
            RegisterId::Memory => 0x18,
            RegisterId::Framebuffer => 0x19,
            RegisterId::Instruction => 0x1A,
        }
    }

    pub fn from_address(address: u8) -> Option<Self> {
        if address < V_COUNT {
            return Some(RegisterId::V(address));
        }
        Self::SPECIAL
            .iter()
            .copied()
            .find(|reg| reg.address() == address)
    }

    /// Whether the id names a register that exists on the bus
    pub fn exists(&self) -> bool {
        match *self {
            RegisterId::V(n) => n < V_COUNT,
            _ => true,
        }
    }

    pub fn access(&self) -> Access {
        match *self {
            RegisterId::StackPush => Access::WriteOnly,
            RegisterId::Memory | RegisterId::Framebuffer => Access::ReadViaRequest,
            _ => Access::ReadWrite,
        }
    }

    /// Bits of the payload the register actually uses
    pub fn payload_mask(&self) -> u32 {
        match *self {
            RegisterId::V(_)
            | RegisterId::SoundTimer
            | RegisterId::DelayTimer
            | RegisterId::StackPointer => 0xFF,
            RegisterId::I | RegisterId::StackPush | RegisterId::Instruction => 0xFFFF,
            RegisterId::ProgramCounter => 0x0FFF,
            RegisterId::KeyPress => 0x1F,
            RegisterId::State => 0x03,
            RegisterId::Memory => 0x001F_FFFF,
            RegisterId::Framebuffer => 0x1FFF,
        }
    }
}

/// Run state held by the coprocessor's own state register
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CoprocessorState {
    Paused,
    Running,
    SingleStep,
}

impl CoprocessorState {
    pub fn bits(self) -> u32 {
        match self {
            CoprocessorState::Paused => 0,
            CoprocessorState::Running => 1,
            CoprocessorState::SingleStep => 2,
        }
    }
}

impl TryFrom<u32> for CoprocessorState {
    type Error = u32;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            0 => Ok(CoprocessorState::Paused),
            1 => Ok(CoprocessorState::Running),
            2 => Ok(CoprocessorState::SingleStep),
            other => Err(other),
        }
    }
}

/// Content of the single key slot of the coprocessor
///
/// Only one key can be registered at a time; this is how the hardware's key
/// register is built.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct KeyState {
    pub pressed: bool,
    pub code: u8,
}

impl KeyState {
    pub const RELEASED: KeyState = KeyState {
        pressed: false,
        code: 0,
    };

    pub fn pressed(code: u8) -> Self {
        Self {
            pressed: true,
            code: code & 0x0F,
        }
    }

    pub fn bits(self) -> u32 {
        (self.pressed as u32) << 4 | (self.code & 0x0F) as u32
    }

    pub fn from_bits(bits: u32) -> Self {
        Self {
            pressed: bits & 0x10 != 0,
            code: (bits & 0x0F) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addresses_are_unique() {
        let mut seen = [false; 256];
        let all = (0..V_COUNT)
            .map(RegisterId::V)
            .chain(RegisterId::SPECIAL.iter().copied());
        for reg in all {
            let addr = reg.address() as usize;
            assert!(!seen[addr], "{:?} shares address {:#04x}", reg, addr);
            seen[addr] = true;
        }
    }

    #[test]
    fn address_lookup() {
        assert_eq!(RegisterId::from_address(0x0A), Some(RegisterId::V(0xA)));
        assert_eq!(RegisterId::from_address(0x17), Some(RegisterId::State));
        assert_eq!(RegisterId::from_address(0x1A), Some(RegisterId::Instruction));
        assert_eq!(RegisterId::from_address(0x1B), None);
        for reg in RegisterId::SPECIAL.iter() {
            assert_eq!(RegisterId::from_address(reg.address()), Some(*reg));
        }
    }

    #[test]
    fn shared_addresses_need_request() {
        assert_eq!(RegisterId::Memory.access(), Access::ReadViaRequest);
        assert_eq!(RegisterId::Framebuffer.access(), Access::ReadViaRequest);
        assert_eq!(RegisterId::StackPush.access(), Access::WriteOnly);
        assert_eq!(RegisterId::V(3).access(), Access::ReadWrite);
        assert!(!RegisterId::V(16).exists());
    }

    #[test]
    fn state_bits() {
        for state in [
            CoprocessorState::Paused,
            CoprocessorState::Running,
            CoprocessorState::SingleStep,
        ]
        .iter()
        {
            assert_eq!(CoprocessorState::try_from(state.bits()), Ok(*state));
        }
        assert_eq!(CoprocessorState::try_from(3), Err(3));
    }

    #[test]
    fn key_packing() {
        assert_eq!(KeyState::pressed(0x5).bits(), 0b1_0101);
        assert_eq!(KeyState::RELEASED.bits(), 0);
        assert_eq!(KeyState::from_bits(0b1_1111), KeyState::pressed(0xF));
    }
}
