use core::fmt;

use crate::register::{CoprocessorState, KeyState};

/// Point-in-time view of the coprocessor registers
///
/// Every field is a separate round trip, the hardware may move on between
/// them while `Running`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Status {
    pub state: CoprocessorState,
    pub pc: u16,
    pub i: u16,
    pub sp: u8,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub key: KeyState,
    /// Opcode stored at `pc`
    pub instruction: u16,
    pub v: [u8; 16],
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} pc={:#05x} op={:#06x} i={:#05x} sp={} dt={} st={}",
            self.state, self.pc, self.instruction, self.i, self.sp, self.delay_timer, self.sound_timer
        )?;
        if self.key.pressed {
            write!(f, " key={:X}", self.key.code)?;
        }
        f.write_str(" |")?;
        for v in self.v.iter() {
            write!(f, " {:02x}", v)?;
        }
        Ok(())
    }
}
