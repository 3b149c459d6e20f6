//! Orchestration of a coprocessor session.
//!
//! A session owns the gatekeeper and through it the transport. It brings the
//! coprocessor from an unknown state to a paused, loaded program, then drives
//! run control and input. Any error returned from here is fatal for the
//! session: the caller is expected to `terminate` it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::codec::{RegisterRead, RegisterWrite};
use crate::error::Error;
use crate::frame::Frame;
use crate::gatekeeper::Gatekeeper;
use crate::keypad::Action;
use crate::register::{
    CoprocessorState, KeyState, MEMORY_END, PROGRAM_CAPACITY, PROGRAM_START, V_COUNT,
};
use crate::status::Status;
use crate::transport::Transport;

/// Glyphs for hex digits `0..=F`, five rows each, loaded at address 0
#[rustfmt::skip]
pub const FONT_SET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// Host-side view of where the session is
///
/// Only tracks what the host last commanded. The coprocessor's own state
/// register is authoritative, see `Session::status`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Phase {
    Uninitialized,
    Paused,
    Running,
    SingleStep,
    Terminated,
}

/// Outcome of a bring-up
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LoadReport {
    pub font_bytes: usize,
    pub rom_bytes: usize,
    /// The ROM did not fit between `0x200` and `0xFFF`
    pub truncated: bool,
    pub zero_filled: usize,
    /// Addresses whose read-back differed from what was written
    pub mismatches: Vec<u16>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

pub struct Session<T: Transport> {
    gate: Gatekeeper<T>,
    rom: Vec<u8>,
    phase: Phase,
    last_load: Option<LoadReport>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            gate: Gatekeeper::new(transport),
            rom: Vec::new(),
            phase: Phase::Uninitialized,
            last_load: None,
            interrupt: None,
        }
    }

    /// Abandon bring-up between transactions once `flag` is raised
    ///
    /// The coprocessor is paused before anything else is written, so an
    /// interrupted bring-up leaves it `Paused`.
    pub fn interruptible(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn check_interrupt(&self) -> Result<(), Error> {
        match self.interrupt.as_ref() {
            Some(flag) if flag.load(Ordering::SeqCst) => {
                info!("bring-up interrupted");
                Err(Error::Interrupted)
            }
            _ => Ok(()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Program bytes as loaded, after truncation
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    pub fn last_load(&self) -> Option<&LoadReport> {
        self.last_load.as_ref()
    }

    pub fn gatekeeper(&mut self) -> &mut Gatekeeper<T> {
        &mut self.gate
    }

    fn ensure_up(&self) -> Result<(), Error> {
        match self.phase {
            Phase::Uninitialized | Phase::Terminated => Err(Error::NotBroughtUp),
            _ => Ok(()),
        }
    }

    fn write_verified(
        &mut self,
        address: u16,
        data: u8,
        report: &mut LoadReport,
    ) -> Result<(), Error> {
        self.check_interrupt()?;
        self.gate.write(RegisterWrite::Memory { address, data })?;
        let back = self.gate.read_memory(address)?;
        if back != data {
            warn!(
                "memory integrity fault at {:#05x}: wrote {:#04x}, read back {:#04x}",
                address, data, back
            );
            report.mismatches.push(address);
        }
        Ok(())
    }

    /// Bring the coprocessor to a paused state with `rom` loaded
    ///
    /// Verification mismatches are logged and collected in the report, they
    /// do not stop the load. A raised interrupt flag does, with
    /// `Error::Interrupted`.
    pub fn bring_up(&mut self, rom: &[u8]) -> Result<LoadReport, Error> {
        let mut report = LoadReport::default();

        self.gate
            .write(RegisterWrite::State(CoprocessorState::Paused))?;
        self.phase = Phase::Paused;

        for (address, &glyph) in FONT_SET.iter().enumerate() {
            self.write_verified(address as u16, glyph, &mut report)?;
        }
        report.font_bytes = FONT_SET.len();
        debug!("font set loaded");

        let loaded = rom.len().min(PROGRAM_CAPACITY);
        if loaded < rom.len() {
            warn!(
                "program is {} bytes, only the first {} fit in memory",
                rom.len(),
                loaded
            );
            report.truncated = true;
        }
        for (offset, &byte) in rom[..loaded].iter().enumerate() {
            self.write_verified(PROGRAM_START + offset as u16, byte, &mut report)?;
        }
        report.rom_bytes = loaded;

        let first_free = PROGRAM_START as usize + loaded;
        for address in first_free..=MEMORY_END as usize {
            self.check_interrupt()?;
            self.gate.write(RegisterWrite::Memory {
                address: address as u16,
                data: 0,
            })?;
        }
        report.zero_filled = MEMORY_END as usize + 1 - first_free;
        self.check_interrupt()?;

        for x in 0..V_COUNT {
            self.gate.write(RegisterWrite::V { x, value: 0 })?;
        }
        self.gate.write(RegisterWrite::I(0))?;
        self.gate.write(RegisterWrite::StackPointer(0))?;
        self.gate.write(RegisterWrite::DelayTimer(0))?;
        self.gate.write(RegisterWrite::SoundTimer(0))?;
        self.gate.write(RegisterWrite::ProgramCounter(PROGRAM_START))?;
        self.gate.write(RegisterWrite::KeyPress(KeyState::RELEASED))?;

        self.rom = rom[..loaded].to_vec();
        info!(
            "brought up with {} program bytes, {} verification faults",
            report.rom_bytes,
            report.mismatches.len()
        );
        self.last_load = Some(report.clone());
        Ok(report)
    }

    fn set_state(&mut self, state: CoprocessorState, phase: Phase) -> Result<(), Error> {
        self.ensure_up()?;
        self.gate.write(RegisterWrite::State(state))?;
        debug!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), Error> {
        self.set_state(CoprocessorState::Running, Phase::Running)
    }

    pub fn pause(&mut self) -> Result<(), Error> {
        self.set_state(CoprocessorState::Paused, Phase::Paused)
    }

    pub fn enter_single_step(&mut self) -> Result<(), Error> {
        self.set_state(CoprocessorState::SingleStep, Phase::SingleStep)
    }

    /// Execute one instruction
    ///
    /// The live state has to be `SingleStep`; the coprocessor falls back to
    /// `Paused` once the instruction completes.
    pub fn step(&mut self, opcode: u16) -> Result<(), Error> {
        self.ensure_up()?;
        let state = self.gate.read_state()?;
        if state != CoprocessorState::SingleStep {
            return Err(Error::NotSingleStepping(state));
        }
        self.gate.write(RegisterWrite::Instruction(opcode))?;
        self.phase = Phase::Paused;
        Ok(())
    }

    /// Run bring-up again, with a new program or the one already loaded
    pub fn reset(&mut self, rom: Option<&[u8]>) -> Result<LoadReport, Error> {
        let rom = match rom {
            Some(rom) => rom.to_vec(),
            None => {
                self.ensure_up()?;
                self.rom.clone()
            }
        };
        info!("resetting coprocessor");
        self.bring_up(&rom)
    }

    pub fn status(&mut self) -> Result<Status, Error> {
        self.gate.status()
    }

    pub fn write_memory(&mut self, address: u16, data: u8) -> Result<(), Error> {
        self.ensure_up()?;
        if self.gate.read_state()? == CoprocessorState::Running {
            return Err(Error::Running);
        }
        self.gate.write(RegisterWrite::Memory { address, data })
    }

    pub fn read_memory(&mut self, address: u16) -> Result<u8, Error> {
        self.gate.read_memory(address)
    }

    pub fn write_pixel(&mut self, x: u8, y: u8, on: bool) -> Result<(), Error> {
        self.gate.write(RegisterWrite::Framebuffer { x, y, on })
    }

    pub fn read_pixel(&mut self, x: u8, y: u8) -> Result<bool, Error> {
        self.gate.read_pixel(x, y)
    }

    pub fn push_stack(&mut self, address: u16) -> Result<(), Error> {
        self.gate.write(RegisterWrite::StackPush(address))
    }

    pub fn stack_pointer(&mut self) -> Result<u8, Error> {
        self.gate.read_byte(RegisterRead::StackPointer)
    }

    pub fn set_key(&mut self, key: KeyState) -> Result<(), Error> {
        self.gate.write(RegisterWrite::KeyPress(key))
    }

    pub fn frame(&mut self) -> Result<Frame, Error> {
        self.gate.frame()
    }

    /// Carry out what the input translator asked for
    pub fn apply(&mut self, action: Action) -> Result<(), Error> {
        match action {
            Action::Keypad(code) => self.set_key(KeyState::pressed(code)),
            Action::Release => self.set_key(KeyState::RELEASED),
            Action::Start => self.start(),
            Action::Pause => self.pause(),
            Action::Reset => self.reset(None).map(|_| ()),
        }
    }

    /// End the session and release the channel
    ///
    /// Consuming the session makes a second release impossible. The transport
    /// is handed back for inspection.
    pub fn terminate(mut self) -> Result<T, Error> {
        info!("terminating session");
        self.phase = Phase::Terminated;
        self.gate.transport_mut().release()?;
        Ok(self.gate.into_inner())
    }
}
