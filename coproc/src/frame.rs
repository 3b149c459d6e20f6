use bitvec::prelude::*;
#[cfg(feature = "embedded-graphics")]
use embedded_graphics::{image::ImageRaw, pixelcolor::BinaryColor};

use crate::register::{HEIGHT, WIDTH};

pub(crate) const MEM_LENGTH: usize = WIDTH * HEIGHT / 8;

/// Snapshot of the coprocessor framebuffer, read pixel by pixel
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Frame([u8; MEM_LENGTH]);

/// A shared view over a `Frame`
///
/// Rows are stored top to bottom, each as a run of bits from left to right.
/// A lit pixel is a set bit.
///
/// #Note:
/// Can return ImageRaw instance with `embedded-graphics` feature on.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct FrameView<'a>(&'a [u8; MEM_LENGTH]);

impl<'a> FrameView<'a> {
    /// View the raw memory of a frame
    pub fn as_raw(&self) -> &'a [u8] {
        self.0
    }

    pub fn get_bit(&self, x: usize, y: usize) -> Option<&bool> {
        self.iter_rows_as_bitslices()
            .nth(y)
            .map(|row| row.get(x))
            .flatten()
    }

    pub fn iter_rows_as_bitslices(&self) -> impl Iterator<Item = &'a BitSlice<Msb0, u8>> {
        self.0.chunks(WIDTH / 8).map(|row| row.view_bits::<_>())
    }

    /// Number of lit pixels
    pub fn lit(&self) -> usize {
        self.iter_rows_as_bitslices().map(|row| row.count_ones()).sum()
    }

    #[cfg(feature = "embedded-graphics")]
    pub fn as_raw_image(&self) -> ImageRaw<'a, BinaryColor> {
        ImageRaw::new(self.0, WIDTH as u32, HEIGHT as u32)
    }
}

impl Frame {
    pub fn new() -> Self {
        Self([0; MEM_LENGTH])
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView(&self.0)
    }

    pub(crate) fn set_bit(&mut self, x: usize, y: usize, val: bool) -> Result<(), &'static str> {
        self.0
            .chunks_mut(WIDTH / 8)
            .map(|row| row.view_bits_mut::<Msb0>())
            .nth(y)
            .map(|row| row.get_mut(x).map(|mut bit| *bit = val))
            .flatten()
            .ok_or("Pixel index out of bounds")
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for row in self.view().iter_rows_as_bitslices() {
            for bit in row.iter() {
                f.write_str(if *bit { "#" } else { "." })?;
            }
            f.write_str("\n")?;
        }
        Ok(())
    }
}
