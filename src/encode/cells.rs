/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024-2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/encode/cells.rs

    A writer for raw FM and MFM bit cells.
*/

use bit_vec::BitVec;

/// Accumulates raw bit cells, two cells per data bit.
#[derive(Clone, Debug, Default)]
pub struct CellWriter {
    cells: BitVec,
    prev: bool,
}

impl CellWriter {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline]
    pub fn push(&mut self, cell: bool) {
        self.cells.push(cell);
    }

    pub fn zeros(&mut self, n: usize) {
        self.cells.grow(n, false);
    }

    /// Set the last data bit written, which determines the clock of the next MFM bit.
    pub fn set_prev(&mut self, bit: bool) {
        self.prev = bit;
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &BitVec {
        &self.cells
    }

    pub fn into_cells(self) -> BitVec {
        self.cells
    }

    /// Write an FM byte with the given clock pattern. Each bit is a clock cell and a data cell,
    /// each followed by an empty cell.
    pub fn fm_byte(&mut self, byte: u8, clock: u8) {
        for i in (0..8).rev() {
            self.push(clock & (1 << i) != 0);
            self.push(false);
            self.push(byte & (1 << i) != 0);
            self.push(false);
        }
        self.prev = false;
    }

    /// Write an MFM byte. A clock cell is set between two zero data bits, except at bit
    /// `missing_clock` (counted from the msb), which is used for the A1 and C2 sync marks.
    pub fn mfm_byte(&mut self, byte: u8, missing_clock: Option<usize>) {
        for i in 0..8 {
            let bit = byte & (0x80 >> i) != 0;
            self.push(!self.prev && !bit && missing_clock != Some(i));
            self.push(bit);
            self.prev = bit;
        }
    }
}
