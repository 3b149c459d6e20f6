//! Translation between typed register operations and wire transactions.
//!
//! A write is always a single exchange. A read of a plain register is a single
//! exchange as well, while reads of `Memory` and `Framebuffer` are planned as a
//! request word pushed through the write channel followed by the fetch:
//!
//! ```
//! use coproc::codec::{Direction, RegisterRead};
//! use coproc::register::RegisterId;
//!
//! let plan = RegisterRead::Memory { address: 0x200 }.plan().unwrap();
//! let request = plan.request.unwrap();
//!
//! assert_eq!(request.direction, Direction::Write);
//! assert_eq!(request.value, 0x0002_0000);
//! assert_eq!(plan.fetch.address, RegisterId::Memory);
//! assert_eq!(plan.fetch.direction, Direction::Read);
//! ```

use core::convert::TryFrom;

use crate::error::Error;
use crate::register::{
    CoprocessorState, KeyState, RegisterId, ADDRESS_SHIFT, HEIGHT, MEMORY_END, PAYLOAD_MASK, WIDTH,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Direction {
    Read,
    Write,
}

/// One request/response exchange with the register file
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
    pub address: RegisterId,
    pub direction: Direction,
    pub value: u32,
    /// Filled in by the transport
    pub result: u32,
}

impl Transaction {
    pub fn write(address: RegisterId, value: u32) -> Self {
        Self {
            address,
            direction: Direction::Write,
            value,
            result: 0,
        }
    }

    pub fn read(address: RegisterId, value: u32) -> Self {
        Self {
            address,
            direction: Direction::Read,
            value,
            result: 0,
        }
    }

    /// Physical word put on the bus
    pub fn word(&self) -> u32 {
        (self.address.address() as u32) << ADDRESS_SHIFT | (self.value & PAYLOAD_MASK)
    }
}

/// Payload of the shared memory address
///
/// `write` flag at bit 20, address in bits 19..8, data in bits 7..0
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MemoryWord {
    pub write: bool,
    pub address: u16,
    pub data: u8,
}

impl MemoryWord {
    const WRITE_FLAG: u32 = 1 << 20;

    pub fn pack(self) -> u32 {
        let flag = if self.write { Self::WRITE_FLAG } else { 0 };
        flag | ((self.address & MEMORY_END) as u32) << 8 | self.data as u32
    }

    pub fn unpack(value: u32) -> Self {
        Self {
            write: value & Self::WRITE_FLAG != 0,
            address: (value >> 8 & 0x0FFF) as u16,
            data: (value & 0xFF) as u8,
        }
    }
}

/// Payload of the shared framebuffer address
///
/// `write` flag at bit 12, pixel at bit 11, x in bits 10..5, y in bits 4..0
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PixelWord {
    pub write: bool,
    pub on: bool,
    pub x: u8,
    pub y: u8,
}

impl PixelWord {
    const WRITE_FLAG: u32 = 1 << 12;
    const PIXEL_BIT: u32 = 1 << 11;

    pub fn pack(self) -> u32 {
        let flag = if self.write { Self::WRITE_FLAG } else { 0 };
        let on = if self.on { Self::PIXEL_BIT } else { 0 };
        flag | on | ((self.x & 0x3F) as u32) << 5 | (self.y & 0x1F) as u32
    }

    pub fn unpack(value: u32) -> Self {
        Self {
            write: value & Self::WRITE_FLAG != 0,
            on: value & Self::PIXEL_BIT != 0,
            x: (value >> 5 & 0x3F) as u8,
            y: (value & 0x1F) as u8,
        }
    }
}

/// Typed write to one register
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterWrite {
    V { x: u8, value: u8 },
    I(u16),
    SoundTimer(u8),
    DelayTimer(u8),
    StackPointer(u8),
    StackPush(u16),
    ProgramCounter(u16),
    KeyPress(KeyState),
    State(CoprocessorState),
    Memory { address: u16, data: u8 },
    Framebuffer { x: u8, y: u8, on: bool },
    Instruction(u16),
}

/// Typed read of one register
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RegisterRead {
    V(u8),
    I,
    SoundTimer,
    DelayTimer,
    StackPointer,
    ProgramCounter,
    KeyPress,
    State,
    Memory { address: u16 },
    Framebuffer { x: u8, y: u8 },
    Instruction,
}

/// Exchanges needed to read a register
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReadPlan {
    /// Request word that has to be written before the fetch
    pub request: Option<Transaction>,
    pub fetch: Transaction,
}

/// Decoded result of a read
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Value {
    Byte(u8),
    Word(u16),
    Address(u16),
    Key(KeyState),
    State(CoprocessorState),
    Pixel(bool),
}

impl Value {
    /// Raw payload the value was decoded from
    pub fn bits(self) -> u32 {
        match self {
            Value::Byte(b) => b as u32,
            Value::Word(w) | Value::Address(w) => w as u32,
            Value::Key(key) => key.bits(),
            Value::State(state) => state.bits(),
            Value::Pixel(on) => on as u32,
        }
    }
}

fn check_address(address: u16) -> Result<(), Error> {
    if address <= MEMORY_END {
        Ok(())
    } else {
        Err(Error::AddressOutOfRange(address as u32))
    }
}

fn check_pixel(x: u8, y: u8) -> Result<(), Error> {
    if (x as usize) < WIDTH && (y as usize) < HEIGHT {
        Ok(())
    } else {
        Err(Error::PixelOutOfBounds { x, y })
    }
}

impl RegisterWrite {
    pub fn register(&self) -> RegisterId {
        match *self {
            RegisterWrite::V { x, .. } => RegisterId::V(x),
            RegisterWrite::I(_) => RegisterId::I,
            RegisterWrite::SoundTimer(_) => RegisterId::SoundTimer,
            RegisterWrite::DelayTimer(_) => RegisterId::DelayTimer,
            RegisterWrite::StackPointer(_) => RegisterId::StackPointer,
            RegisterWrite::StackPush(_) => RegisterId::StackPush,
            RegisterWrite::ProgramCounter(_) => RegisterId::ProgramCounter,
            RegisterWrite::KeyPress(_) => RegisterId::KeyPress,
            RegisterWrite::State(_) => RegisterId::State,
            RegisterWrite::Memory { .. } => RegisterId::Memory,
            RegisterWrite::Framebuffer { .. } => RegisterId::Framebuffer,
            RegisterWrite::Instruction(_) => RegisterId::Instruction,
        }
    }

    /// Build the write transaction
    ///
    /// Values wider than the register are truncated to its payload, except for
    /// memory and framebuffer addressing which has to be in range.
    pub fn encode(&self) -> Result<Transaction, Error> {
        let value = match *self {
            RegisterWrite::V { value, .. } => value as u32,
            RegisterWrite::I(value) => value as u32,
            RegisterWrite::SoundTimer(value)
            | RegisterWrite::DelayTimer(value)
            | RegisterWrite::StackPointer(value) => value as u32,
            RegisterWrite::StackPush(value) => value as u32,
            RegisterWrite::ProgramCounter(pc) => (pc % 0x1000) as u32,
            RegisterWrite::KeyPress(key) => key.bits(),
            RegisterWrite::State(state) => state.bits(),
            RegisterWrite::Memory { address, data } => {
                check_address(address)?;
                MemoryWord {
                    write: true,
                    address,
                    data,
                }
                .pack()
            }
            RegisterWrite::Framebuffer { x, y, on } => {
                check_pixel(x, y)?;
                PixelWord {
                    write: true,
                    on,
                    x,
                    y,
                }
                .pack()
            }
            RegisterWrite::Instruction(opcode) => opcode as u32,
        };
        Ok(Transaction::write(self.register(), value))
    }
}

impl RegisterRead {
    pub fn register(&self) -> RegisterId {
        match *self {
            RegisterRead::V(x) => RegisterId::V(x),
            RegisterRead::I => RegisterId::I,
            RegisterRead::SoundTimer => RegisterId::SoundTimer,
            RegisterRead::DelayTimer => RegisterId::DelayTimer,
            RegisterRead::StackPointer => RegisterId::StackPointer,
            RegisterRead::ProgramCounter => RegisterId::ProgramCounter,
            RegisterRead::KeyPress => RegisterId::KeyPress,
            RegisterRead::State => RegisterId::State,
            RegisterRead::Memory { .. } => RegisterId::Memory,
            RegisterRead::Framebuffer { .. } => RegisterId::Framebuffer,
            RegisterRead::Instruction => RegisterId::Instruction,
        }
    }

    pub fn plan(&self) -> Result<ReadPlan, Error> {
        let register = self.register();
        let request = match *self {
            RegisterRead::Memory { address } => {
                check_address(address)?;
                Some(
                    MemoryWord {
                        write: false,
                        address,
                        data: 0,
                    }
                    .pack(),
                )
            }
            RegisterRead::Framebuffer { x, y } => {
                check_pixel(x, y)?;
                Some(
                    PixelWord {
                        write: false,
                        on: false,
                        x,
                        y,
                    }
                    .pack(),
                )
            }
            _ => None,
        };
        Ok(ReadPlan {
            request: request.map(|word| Transaction::write(register, word)),
            fetch: Transaction::read(register, request.unwrap_or(0)),
        })
    }

    pub fn decode(&self, raw: u32) -> Result<Value, Error> {
        let value = match *self {
            RegisterRead::V(_)
            | RegisterRead::SoundTimer
            | RegisterRead::DelayTimer
            | RegisterRead::StackPointer
            | RegisterRead::Memory { .. } => Value::Byte((raw & 0xFF) as u8),
            RegisterRead::I | RegisterRead::Instruction => Value::Word((raw & 0xFFFF) as u16),
            RegisterRead::ProgramCounter => Value::Address((raw % 0x1000) as u16),
            RegisterRead::KeyPress => Value::Key(KeyState::from_bits(raw)),
            RegisterRead::State => {
                Value::State(CoprocessorState::try_from(raw).map_err(|raw| Error::Malformed {
                    register: RegisterId::State,
                    raw,
                })?)
            }
            RegisterRead::Framebuffer { .. } => Value::Pixel(raw & 1 != 0),
        };
        Ok(value)
    }
}
