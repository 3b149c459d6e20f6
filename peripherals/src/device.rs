//! Register channel over the coprocessor's character device.
//!
//! Each transaction is written as one 8-byte little-endian record:
//!
//! ```text
//! 0        4          8
//! +--------+----------+
//! |  word  | direction|   direction: 0 write, 1 read
//! +--------+----------+
//! ```
//!
//! A read is answered with the 4-byte little-endian register content.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use log::{debug, trace};

use coproc::codec::{Direction, Transaction};
use coproc::{Transport, TransportError};

pub const DEFAULT_PATH: &str = "/dev/chip8";

const RECORD_LENGTH: usize = 8;
const RESULT_LENGTH: usize = 4;
/// Errno the driver answers with when it refuses a transaction
const EINVAL: i32 = 22;

fn classify(err: io::Error) -> TransportError {
    if err.raw_os_error() == Some(EINVAL) {
        TransportError::Refused
    } else {
        TransportError::Unreachable(err)
    }
}

fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Transport over any byte stream speaking the record protocol
pub struct CharDevice<D = File> {
    handle: Option<D>,
}

impl CharDevice<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path.as_ref())?;
        debug!("opened register channel {}", path.as_ref().display());
        Ok(Self::from_handle(file))
    }
}

impl<D: Read + Write> CharDevice<D> {
    pub fn from_handle(handle: D) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_released(&self) -> bool {
        self.handle.is_none()
    }
}

impl<D: Read + Write> Transport for CharDevice<D> {
    fn send(&mut self, mut transaction: Transaction) -> Result<Transaction, TransportError> {
        let handle = self.handle.as_mut().ok_or_else(|| {
            TransportError::Unreachable(io::Error::new(
                io::ErrorKind::NotConnected,
                "register channel already released",
            ))
        })?;

        let direction: u32 = match transaction.direction {
            Direction::Write => 0,
            Direction::Read => 1,
        };
        let mut record = [0u8; RECORD_LENGTH];
        record[..4].copy_from_slice(&transaction.word().to_le_bytes());
        record[4..].copy_from_slice(&direction.to_le_bytes());
        handle.write_all(&record).map_err(classify)?;

        if transaction.direction == Direction::Read {
            let mut result = [0u8; RESULT_LENGTH];
            let got = read_full(handle, &mut result).map_err(classify)?;
            if got != RESULT_LENGTH {
                return Err(TransportError::Malformed {
                    expected: RESULT_LENGTH,
                    got,
                });
            }
            transaction.result = u32::from_le_bytes(result);
        }
        trace!("{:#010x} -> {:#010x}", transaction.word(), transaction.result);
        Ok(transaction)
    }

    fn release(&mut self) -> Result<(), TransportError> {
        match self.handle.take() {
            Some(mut handle) => {
                handle.flush().map_err(classify)?;
                debug!("register channel released");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
