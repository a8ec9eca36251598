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

    src/encode/rx02.rs

    DEC RX02 modified MFM encoding, used for the data fields of RX02
    double density sectors.
*/

use crate::encode::cells::CellWriter;

/// Encodes RX02 modified MFM. Data bits are buffered in a five bit window so that the data
/// sequence (0)11110 can be written as 1000100010 instead of the normal MFM pattern.
///
/// A virtual 0 bit precedes each field, so a field that begins with 11110 is handled. Each
/// field is followed by an FF byte, so a field never ends with 01111.
#[derive(Copy, Clone, Debug, Default)]
pub struct Rx02Encoder {
    accum: u32,
    bitcnt: u32,
}

impl Rx02Encoder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn push_bit(&mut self, bit: bool, w: &mut CellWriter) {
        self.accum = (self.accum << 1) | bit as u32;
        self.bitcnt += 1;

        if self.bitcnt == 5 {
            if self.accum & 0x3f == 0x1e {
                for cell in [true, false, false, false, true, false, false, false, true, false] {
                    w.push(cell);
                }
                self.bitcnt = 0;
            }
            else {
                w.push(self.accum & (3 << 4) == 0);
                w.push(self.accum & (1 << 4) != 0);
                self.bitcnt -= 1;
            }
        }
    }

    pub fn push_byte(&mut self, byte: u8, w: &mut CellWriter) {
        for i in (0..8).rev() {
            self.push_bit(byte & (1 << i) != 0, w);
        }
        w.set_prev(byte & 1 != 0);
    }

    /// Write out any buffered bits with normal MFM clocking.
    pub fn flush(&mut self, w: &mut CellWriter) {
        while self.bitcnt > 0 {
            self.bitcnt -= 1;
            w.push(self.accum & (3 << self.bitcnt) == 0);
            w.push(self.accum & (1 << self.bitcnt) != 0);
        }
    }
}
