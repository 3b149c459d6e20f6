//! Software register file standing in for the coprocessor.
//!
//! It stores what is written and answers reads, following the same shared
//! address protocol as the hardware. It does not execute CHIP-8 programs: a
//! written instruction only advances the program counter. Used for tests and
//! for dry runs without the hardware attached.

use std::io;

use bitvec::prelude::*;
use heapless::consts::U64;
use log::trace;

use crate::codec::{Direction, MemoryWord, PixelWord, Transaction};
use crate::error::TransportError;
use crate::register::{
    CoprocessorState, KeyState, RegisterId, ADDRESS_SHIFT, HEIGHT, MEMORY_SIZE, PAYLOAD_MASK,
    STACK_DEPTH,
};
use crate::transport::Transport;

pub struct SimCoprocessor {
    v: [u8; 16],
    i: u16,
    pc: u16,
    sound_timer: u8,
    delay_timer: u8,
    stack: heapless::Vec<u16, U64>,
    key: KeyState,
    state: CoprocessorState,
    memory: [u8; MEMORY_SIZE],
    gfx: [BitArray<Msb0, [u32; 2]>; HEIGHT],
    memory_request: u16,
    pixel_request: (u8, u8),
    executed: Vec<u16>,
    history: Vec<Transaction>,
    stuck: Option<(u16, u8)>,
    budget: Option<usize>,
    releases: usize,
}

impl SimCoprocessor {
    /// Fresh register file, state after power-on is undefined on hardware and
    /// `Running` here so bring-up has something to pause
    pub fn new() -> Self {
        Self {
            v: [0; 16],
            i: 0,
            pc: 0,
            sound_timer: 0,
            delay_timer: 0,
            stack: heapless::Vec::new(),
            key: KeyState::RELEASED,
            state: CoprocessorState::Running,
            memory: [0; MEMORY_SIZE],
            gfx: [BitArray::zeroed(); HEIGHT],
            memory_request: 0,
            pixel_request: (0, 0),
            executed: Vec::new(),
            history: Vec::new(),
            stuck: None,
            budget: None,
            releases: 0,
        }
    }

    /// Fill memory with garbage, as left over by a previous program
    pub fn scribble(mut self, byte: u8) -> Self {
        self.memory.iter_mut().for_each(|m| *m = byte);
        self
    }

    /// Make a memory cell ignore writes and always read `value`
    pub fn stick(mut self, address: u16, value: u8) -> Self {
        self.stuck = Some((address, value));
        self.memory[address as usize] = value;
        self
    }

    /// Let only `count` more transactions through, the rest fail as unreachable
    pub fn fail_after(mut self, count: usize) -> Self {
        self.budget = Some(count);
        self
    }

    /// Decrement both timers once, as the hardware does at its own rate
    pub fn tick_timers(&mut self) {
        self.sound_timer = self.sound_timer.saturating_sub(1);
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.gfx[y][x]
    }

    pub fn state(&self) -> CoprocessorState {
        self.state
    }

    pub fn key(&self) -> KeyState {
        self.key
    }

    pub fn stack(&self) -> &[u16] {
        &self.stack
    }

    /// Opcodes executed in single-step mode
    pub fn executed(&self) -> &[u16] {
        &self.executed
    }

    /// Every transaction that reached the register file, in order
    pub fn history(&self) -> &[Transaction] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn releases(&self) -> usize {
        self.releases
    }

    fn refuse<T>() -> Result<T, TransportError> {
        Err(TransportError::Refused)
    }

    fn write(&mut self, address: RegisterId, value: u32) -> Result<(), TransportError> {
        match address {
            RegisterId::V(x) if x < 16 => self.v[x as usize] = value as u8,
            RegisterId::V(_) => return Self::refuse(),
            RegisterId::I => self.i = value as u16,
            RegisterId::SoundTimer => self.sound_timer = value as u8,
            RegisterId::DelayTimer => self.delay_timer = value as u8,
            RegisterId::StackPointer => {
                let depth = value as usize;
                if depth >= STACK_DEPTH as usize {
                    return Self::refuse();
                }
                while self.stack.len() > depth {
                    self.stack.pop();
                }
                while self.stack.len() < depth {
                    self.stack.push(0).or(Self::refuse())?;
                }
            }
            RegisterId::StackPush => self.stack.push(value as u16).or(Self::refuse())?,
            RegisterId::ProgramCounter => self.pc = (value & 0x0FFF) as u16,
            RegisterId::KeyPress => self.key = KeyState::from_bits(value),
            RegisterId::State => {
                self.state = match value {
                    0 => CoprocessorState::Paused,
                    1 => CoprocessorState::Running,
                    2 => CoprocessorState::SingleStep,
                    _ => return Self::refuse(),
                }
            }
            RegisterId::Memory => {
                let word = MemoryWord::unpack(value);
                if !word.write {
                    self.memory_request = word.address;
                } else if self.stuck.map(|(addr, _)| addr) != Some(word.address) {
                    self.memory[word.address as usize] = word.data;
                }
            }
            RegisterId::Framebuffer => {
                let word = PixelWord::unpack(value);
                if word.write {
                    self.gfx[word.y as usize].set(word.x as usize, word.on);
                } else {
                    self.pixel_request = (word.x, word.y);
                }
            }
            RegisterId::Instruction => {
                if self.state != CoprocessorState::SingleStep {
                    return Self::refuse();
                }
                self.executed.push(value as u16);
                self.pc = (self.pc + 2) & 0x0FFF;
                self.state = CoprocessorState::Paused;
            }
        }
        Ok(())
    }

    fn read(&self, address: RegisterId) -> Result<u32, TransportError> {
        let value = match address {
            RegisterId::V(x) if x < 16 => self.v[x as usize] as u32,
            RegisterId::V(_) => return Self::refuse(),
            RegisterId::I => self.i as u32,
            RegisterId::SoundTimer => self.sound_timer as u32,
            RegisterId::DelayTimer => self.delay_timer as u32,
            RegisterId::StackPointer => self.stack.len() as u32,
            RegisterId::StackPush => 0,
            RegisterId::ProgramCounter => self.pc as u32,
            RegisterId::KeyPress => self.key.bits(),
            RegisterId::State => self.state.bits(),
            RegisterId::Memory => self.memory[self.memory_request as usize] as u32,
            RegisterId::Framebuffer => {
                let (x, y) = self.pixel_request;
                self.gfx[y as usize][x as usize] as u32
            }
            RegisterId::Instruction => {
                let pc = self.pc as usize;
                let high = self.memory[pc] as u32;
                let low = self.memory[(pc + 1) % MEMORY_SIZE] as u32;
                high << 8 | low
            }
        };
        Ok(value)
    }
}

impl Default for SimCoprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for SimCoprocessor {
    fn send(&mut self, mut transaction: Transaction) -> Result<Transaction, TransportError> {
        if self.releases > 0 {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "channel released").into());
        }
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "channel lost").into());
            }
            *budget -= 1;
        }

        // decode from the wire word, as the register file sees it
        let word = transaction.word();
        trace!("sim {:?} word={:#010x}", transaction.direction, word);
        let address =
            RegisterId::from_address((word >> ADDRESS_SHIFT) as u8).ok_or(TransportError::Refused)?;
        let value = word & PAYLOAD_MASK;
        match transaction.direction {
            Direction::Write => self.write(address, value)?,
            Direction::Read => transaction.result = self.read(address)?,
        }
        self.history.push(transaction);
        Ok(transaction)
    }

    fn release(&mut self) -> Result<(), TransportError> {
        self.releases += 1;
        Ok(())
    }
}
