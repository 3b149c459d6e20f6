//! Single path from logical register operations to the transport.
//!
//! Every exchange goes codec, validator, transport, codec. When the validator
//! rejects any phase of an operation nothing is sent at all, so a two-phase
//! read never leaves a dangling request behind.

use log::trace;

use crate::codec::{RegisterRead, RegisterWrite, Transaction, Value};
use crate::error::Error;
use crate::frame::Frame;
use crate::register::{CoprocessorState, HEIGHT, WIDTH};
use crate::status::Status;
use crate::transport::Transport;
use crate::validator::{validate, Verdict};

pub struct Gatekeeper<T> {
    transport: T,
}

fn approve(transaction: &Transaction) -> Result<Verdict, Error> {
    match validate(transaction.address, transaction.value, transaction.direction) {
        Verdict::Reject => Err(Error::Rejected {
            register: transaction.address,
            direction: transaction.direction,
            value: transaction.value,
        }),
        verdict => Ok(verdict),
    }
}

impl<T: Transport> Gatekeeper<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    fn exchange(&mut self, transaction: Transaction) -> Result<Transaction, Error> {
        trace!(
            "{:?} {:?} word={:#010x}",
            transaction.direction,
            transaction.address,
            transaction.word()
        );
        Ok(self.transport.send(transaction)?)
    }

    pub fn write(&mut self, write: RegisterWrite) -> Result<(), Error> {
        let transaction = write.encode()?;
        approve(&transaction)?;
        self.exchange(transaction).map(|_| ())
    }

    pub fn read(&mut self, read: RegisterRead) -> Result<Value, Error> {
        let plan = read.plan()?;

        if let Some(request) = plan.request.as_ref() {
            approve(request)?;
        }
        approve(&plan.fetch)?;

        if let Some(request) = plan.request {
            self.exchange(request)?;
        }
        let fetched = self.exchange(plan.fetch)?;
        read.decode(fetched.result)
    }

    fn mismatch(read: RegisterRead, value: Value) -> Error {
        Error::Malformed {
            register: read.register(),
            raw: value.bits(),
        }
    }

    pub fn read_byte(&mut self, read: RegisterRead) -> Result<u8, Error> {
        match self.read(read)? {
            Value::Byte(byte) => Ok(byte),
            other => Err(Self::mismatch(read, other)),
        }
    }

    pub fn read_word(&mut self, read: RegisterRead) -> Result<u16, Error> {
        match self.read(read)? {
            Value::Word(word) | Value::Address(word) => Ok(word),
            other => Err(Self::mismatch(read, other)),
        }
    }

    pub fn read_state(&mut self) -> Result<CoprocessorState, Error> {
        match self.read(RegisterRead::State)? {
            Value::State(state) => Ok(state),
            other => Err(Self::mismatch(RegisterRead::State, other)),
        }
    }

    pub fn read_memory(&mut self, address: u16) -> Result<u8, Error> {
        self.read_byte(RegisterRead::Memory { address })
    }

    pub fn read_pixel(&mut self, x: u8, y: u8) -> Result<bool, Error> {
        let read = RegisterRead::Framebuffer { x, y };
        match self.read(read)? {
            Value::Pixel(on) => Ok(on),
            other => Err(Self::mismatch(read, other)),
        }
    }

    pub fn status(&mut self) -> Result<Status, Error> {
        let state = self.read_state()?;
        let pc = self.read_word(RegisterRead::ProgramCounter)?;
        let instruction = self.read_word(RegisterRead::Instruction)?;
        let i = self.read_word(RegisterRead::I)?;
        let sp = self.read_byte(RegisterRead::StackPointer)?;
        let delay_timer = self.read_byte(RegisterRead::DelayTimer)?;
        let sound_timer = self.read_byte(RegisterRead::SoundTimer)?;
        let key = match self.read(RegisterRead::KeyPress)? {
            Value::Key(key) => key,
            other => return Err(Self::mismatch(RegisterRead::KeyPress, other)),
        };
        let mut v = [0; 16];
        for (x, reg) in v.iter_mut().enumerate() {
            *reg = self.read_byte(RegisterRead::V(x as u8))?;
        }

        Ok(Status {
            state,
            pc,
            i,
            sp,
            delay_timer,
            sound_timer,
            key,
            instruction,
            v,
        })
    }

    /// Read the whole framebuffer, two exchanges per pixel
    pub fn frame(&mut self) -> Result<Frame, Error> {
        let mut frame = Frame::new();
        for y in 0..HEIGHT {
            for x in 0..WIDTH {
                let on = self.read_pixel(x as u8, y as u8)?;
                frame
                    .set_bit(x, y, on)
                    .map_err(|_| Error::PixelOutOfBounds {
                        x: x as u8,
                        y: y as u8,
                    })?;
            }
        }
        Ok(frame)
    }
}
