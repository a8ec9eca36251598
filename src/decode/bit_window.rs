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

    src/decode/bit_window.rs

    A 64-bit shift window over the raw clock/data bit stream.
*/

/// Shift window of the most recent 64 raw bits, with a parallel window holding the RX02
/// transformed bits and a count of the bits not yet consumed by byte extraction.
#[derive(Clone, Debug, Default)]
pub struct BitWindow {
    accum: u64,
    taccum: u64,
    count: i32,
}

impl BitWindow {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, bit: bool) {
        self.accum = (self.accum << 1) | bit as u64;
        self.taccum = (self.taccum << 1) | bit as u64;
        self.count += 1;
    }

    /// The number of buffered bits.
    #[inline]
    pub fn count(&self) -> i32 {
        self.count
    }

    /// The most recent `n` bits.
    #[inline]
    pub fn recent(&self, n: u32) -> u64 {
        if n >= 64 {
            self.accum
        }
        else {
            self.accum & ((1u64 << n) - 1)
        }
    }

    /// The whole window shifted right by `shift` bits.
    #[inline]
    pub fn shifted(&self, shift: u32) -> u64 {
        self.accum >> shift
    }

    /// Force the buffered bit count. Used to byte-align when a mark is recognized, either
    /// repeating bits (when raised) or dropping them (when lowered).
    #[inline]
    pub fn snap(&mut self, count: i32) {
        self.count = count;
    }

    /// Discard `n` of the oldest buffered bits.
    #[inline]
    pub fn consume(&mut self, n: i32) {
        self.count -= n;
    }

    /// Undo the RX02 modified MFM transform in the parallel window. On an even bit count, a
    /// window ending in `1000` is rewritten as `0101`.
    #[inline]
    pub fn untransform_rx02(&mut self) {
        if self.count >= 4 && (self.count & 1) == 0 && (self.accum & 0xF) == 0x8 {
            self.taccum = (self.taccum & !0xF) | 0x5;
        }
    }

    /// Extract the data bits of the FM byte in the upper half of the window.
    pub fn top_fm_byte(&self) -> u8 {
        let mut val = 0u8;
        for i in 0..8 {
            val |= (((self.accum >> (4 * i + 1 + 32)) & 1) as u8) << i;
        }
        val
    }

    /// Extract the data bits of the MFM byte in the top 16 bits of the window, optionally from
    /// the RX02 transformed window.
    pub fn top_mfm_byte(&self, transformed: bool) -> u8 {
        let src = if transformed { self.taccum } else { self.accum };
        let mut val = 0u8;
        for i in 0..8 {
            val |= (((src >> (2 * i + 48)) & 1) as u8) << i;
        }
        val
    }
}

/// Returns true if the 16 raw bits at the bottom of `window` carry valid MFM clocks: each clock
/// bit is set exactly when both neighboring data bits are clear.
#[inline]
pub fn mfm_valid_clock(window: u64) -> bool {
    let expected = !((window >> 1) | (window << 1)) & 0xAAAA;
    expected == (window & 0xAAAA)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_bits(w: &mut BitWindow, bits: u64, n: u32) {
        for i in (0..n).rev() {
            w.push((bits >> i) & 1 != 0);
        }
    }

    #[test]
    fn test_mfm_byte() {
        // 0x4E encoded as MFM with a preceding 0 data bit.
        let mut w = BitWindow::new();
        push_bits(&mut w, 0x9254, 16);
        push_bits(&mut w, 0, 48);
        assert_eq!(w.top_mfm_byte(false), 0x4E);
        assert_eq!(w.count(), 64);
    }

    #[test]
    fn test_fm_byte() {
        // FM 0xFE as 32 raw clock/data bits.
        let mut w = BitWindow::new();
        push_bits(&mut w, 0xaaa222a8, 32);
        push_bits(&mut w, 0, 32);
        assert_eq!(w.top_fm_byte(), 0xFE);
    }

    #[test]
    fn test_valid_clock() {
        assert!(mfm_valid_clock(0x9254));
        assert!(mfm_valid_clock(0xAAAA));
        assert!(!mfm_valid_clock(0x4489));
        assert!(mfm_valid_clock(0x5555));
    }

    #[test]
    fn test_recent() {
        let mut w = BitWindow::new();
        push_bits(&mut w, 0x8aa222aa8, 36);
        assert_eq!(w.recent(36), 0x8aa222aa8);
        assert_eq!(w.recent(4), 0x8);
    }
}
