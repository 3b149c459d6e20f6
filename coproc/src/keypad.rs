//! Translation of keyboard scan reports into keypad presses and control actions.
//!
//! The coprocessor keeps a single key slot, so only the first key slot of a
//! report is looked at and modifiers are ignored.

use std::collections::VecDeque;

/// Keypad codes laid out the way the 4x4 COSMAC keypad reads
///
/// ```text
/// 1 2 3 C
/// 4 5 6 D
/// 7 8 9 E
/// A 0 B F
/// ```
pub const SCAN_GRID: [[u8; 4]; 4] = [
    [0x1, 0x2, 0x3, 0xC],
    [0x4, 0x5, 0x6, 0xD],
    [0x7, 0x8, 0x9, 0xE],
    [0xA, 0x0, 0xB, 0xF],
];

/// HID usage codes of the left keyboard block, same shape as `SCAN_GRID`
///
/// ```text
/// 1 2 3 4
/// Q W E R
/// A S D F
/// Z X C V
/// ```
pub const LAYOUT: [[u8; 4]; 4] = [
    [0x1E, 0x1F, 0x20, 0x21],
    [0x14, 0x1A, 0x08, 0x15],
    [0x04, 0x16, 0x07, 0x09],
    [0x1D, 0x1B, 0x06, 0x19],
];

pub const KEY_START: u8 = 0x28; // Enter
pub const KEY_PAUSE: u8 = 0x13; // P
pub const KEY_RESET: u8 = 0x12; // O

/// Boot-protocol keyboard report
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct KeyReport {
    pub modifiers: u8,
    pub keycodes: [u8; 6],
}

impl KeyReport {
    pub const LENGTH: usize = 8;

    /// Parse a report, `None` when fewer than eight bytes were received
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::LENGTH {
            return None;
        }
        let mut keycodes = [0; 6];
        keycodes.copy_from_slice(&bytes[2..Self::LENGTH]);
        Some(Self {
            modifiers: bytes[0],
            keycodes,
        })
    }

    /// Report with a single key down
    pub fn single(keycode: u8) -> Self {
        Self {
            modifiers: 0,
            keycodes: [keycode, 0, 0, 0, 0, 0],
        }
    }

    pub fn primary(&self) -> u8 {
        self.keycodes[0]
    }
}

impl From<[u8; 8]> for KeyReport {
    fn from(bytes: [u8; 8]) -> Self {
        let mut keycodes = [0; 6];
        keycodes.copy_from_slice(&bytes[2..]);
        Self {
            modifiers: bytes[0],
            keycodes,
        }
    }
}

/// What a report asks of the coprocessor
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Keypad key `0x0..=0xF` held down
    Keypad(u8),
    Start,
    Pause,
    Reset,
    /// Nothing recognized is held, the key slot is cleared
    Release,
}

/// Keypad code for a HID usage code, if it belongs to the keypad block
pub fn keypad_code(keycode: u8) -> Option<u8> {
    LAYOUT.iter().zip(SCAN_GRID.iter()).find_map(|(row, codes)| {
        row.iter()
            .position(|&k| k == keycode)
            .map(|col| codes[col])
    })
}

pub fn translate(report: &KeyReport) -> Action {
    match report.primary() {
        KEY_START => Action::Start,
        KEY_PAUSE => Action::Pause,
        KEY_RESET => Action::Reset,
        keycode => keypad_code(keycode).map_or(Action::Release, Action::Keypad),
    }
}

/// Producer of keyboard reports
///
/// `poll` never blocks: `WouldBlock` means no new report arrived since the
/// last call.
pub trait ReportSource {
    type Error;

    fn poll(&mut self) -> nb::Result<KeyReport, Self::Error>;
}

impl<S: ReportSource + ?Sized> ReportSource for Box<S> {
    type Error = S::Error;

    fn poll(&mut self) -> nb::Result<KeyReport, Self::Error> {
        (**self).poll()
    }
}

/// Reports queued up front, handed out one per poll
#[derive(Clone, Debug, Default)]
pub struct Replay(VecDeque<KeyReport>);

impl Replay {
    pub fn new<I: IntoIterator<Item = KeyReport>>(reports: I) -> Self {
        Self(reports.into_iter().collect())
    }

    pub fn push(&mut self, report: KeyReport) {
        self.0.push_back(report);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ReportSource for Replay {
    type Error = core::convert::Infallible;

    fn poll(&mut self) -> nb::Result<KeyReport, Self::Error> {
        self.0.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypad_five() {
        // W sits in the middle of the second row
        assert_eq!(translate(&KeyReport::single(0x1A)), Action::Keypad(5));
    }

    #[test]
    fn whole_grid() {
        for (row, codes) in LAYOUT.iter().zip(SCAN_GRID.iter()) {
            for (&keycode, &code) in row.iter().zip(codes.iter()) {
                assert_eq!(translate(&KeyReport::single(keycode)), Action::Keypad(code));
            }
        }
        let mut seen = [false; 16];
        SCAN_GRID
            .iter()
            .flat_map(|row| row.iter())
            .for_each(|&code| seen[code as usize] = true);
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn control_keys() {
        assert_eq!(translate(&KeyReport::single(KEY_START)), Action::Start);
        assert_eq!(translate(&KeyReport::single(KEY_PAUSE)), Action::Pause);
        assert_eq!(translate(&KeyReport::single(KEY_RESET)), Action::Reset);
    }

    #[test]
    fn unmapped_releases() {
        assert_eq!(translate(&KeyReport::default()), Action::Release);
        // 'G'
        assert_eq!(translate(&KeyReport::single(0x0A)), Action::Release);
    }

    #[test]
    fn only_first_slot_counts() {
        let report = KeyReport::from([0x02, 0, 0x0A, 0x1A, 0, 0, 0, 0]);
        assert_eq!(report.modifiers, 0x02);
        assert_eq!(translate(&report), Action::Release);

        let report = KeyReport::from([0xFF, 0, 0x1A, KEY_START, 0, 0, 0, 0]);
        assert_eq!(translate(&report), Action::Keypad(5));
    }

    #[test]
    fn short_report() {
        assert_eq!(KeyReport::from_bytes(&[0, 0, 0x1A]), None);
        assert_eq!(
            KeyReport::from_bytes(&[0, 0, 0x1A, 0, 0, 0, 0, 0]),
            Some(KeyReport::single(0x1A))
        );
    }

    #[test]
    fn replay_drains_then_blocks() {
        let mut source = Replay::new(vec![KeyReport::single(KEY_START)]);
        assert_eq!(source.poll().unwrap(), KeyReport::single(KEY_START));
        assert!(matches!(source.poll(), Err(nb::Error::WouldBlock)));
    }
}
