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

    src/encode/bit_timing.rs

    Conversion of a stream of raw bit cells into flux pulse intervals, with
    write precompensation and optional dithering.
*/

use bit_vec::BitVec;

/// Converts bit cells to flux intervals. Each 1 cell ends an interval, but an interval is only
/// emitted once the following interval is known, so that precompensation can shift a
/// transition away from a close neighbor.
#[derive(Clone, Debug)]
pub struct BitTimer {
    /// Ticks per bit cell.
    mult: f64,
    /// Precompensation in ticks.
    precomp: f64,
    dither: bool,
    prev_err: f64,
    prev_adj: f64,
    len: i32,
    next_len: i32,
}

impl BitTimer {
    /// Create a timer for a sample clock in Hz, a bit cell width in ticks and a precompensation
    /// in nanoseconds.
    pub fn new(sample_freq: u32, mult: f64, precomp_ns: f64) -> Self {
        BitTimer {
            mult,
            precomp: precomp_ns * sample_freq as f64 / 1e9,
            dither: false,
            prev_err: 0.0,
            prev_adj: 0.0,
            len: 0,
            next_len: -1,
        }
    }

    /// Carry each interval's rounding error into the next, so that the average data rate is
    /// exact.
    pub fn with_dither(mut self, dither: bool) -> Self {
        self.dither = dither;
        self
    }

    /// Push one bit cell, returning an interval in ticks if one was completed.
    pub fn push(&mut self, bit: bool) -> Option<u32> {
        self.next_len += 1;
        if !bit {
            return None;
        }

        let mut ticks = None;
        if self.len > 0 {
            // Move the transition between a short and a long interval toward the long one.
            let adj = if self.len == 2 && self.next_len > 2 {
                -self.precomp
            }
            else if self.len > 2 && self.next_len == 2 {
                self.precomp
            }
            else {
                0.0
            };

            let fticks = self.len as f64 * self.mult - self.prev_adj + adj - self.prev_err;
            let iticks = (fticks + 0.5).max(0.0) as u32;
            self.prev_adj = adj;
            if self.dither {
                self.prev_err = iticks as f64 - fticks;
            }
            ticks = Some(iticks);
        }

        self.len = self.next_len;
        self.next_len = 0;
        ticks
    }

    /// Time a complete cell stream. A final transition is appended so that the last interval
    /// of the stream is emitted.
    pub fn time_cells(&mut self, cells: &BitVec) -> Vec<u32> {
        let mut pulses = Vec::with_capacity(cells.len() / 2);
        pulses.extend(cells.iter().filter_map(|bit| self.push(bit)));
        pulses.extend(self.push(true));
        pulses
    }
}

/// Interpolate write precompensation linearly across tracks, from `low` on the outermost track
/// to `high` on the innermost.
pub fn precomp_for_track(low: f64, high: f64, track: usize, tracks: usize) -> f64 {
    if tracks <= 1 {
        return low;
    }
    let t = track.min(tracks - 1) as f64;
    let n = (tracks - 1) as f64;
    ((n - t) * low + t * high) / n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(s: &str) -> BitVec {
        s.chars().map(|c| c == '1').collect()
    }

    #[test]
    fn test_intervals_without_precomp() {
        let mut timer = BitTimer::new(72_000_000, 144.0, 0.0);
        // Intervals of 2, 3 and 4 cells, and the final one ended by the flush.
        let pulses = timer.time_cells(&cells("1010010001"));
        assert_eq!(pulses, vec![288, 432, 576]);
    }

    #[test]
    fn test_precomp_shifts_transition() {
        // 140ns at 72MHz is 10.08 ticks.
        let mut timer = BitTimer::new(72_000_000, 144.0, 140.0);
        let pulses = timer.time_cells(&cells("101000101"));
        // Short before long is shortened, long before short is lengthened.
        assert_eq!(pulses[0], 278);
        assert_eq!(pulses[1], 576 + 10 + 10);
        assert_eq!(pulses[2], 278);
    }

    #[test]
    fn test_dither_preserves_total() {
        let mut timer = BitTimer::new(72_000_000, 100.4, 0.0).with_dither(true);
        let pulses = timer.time_cells(&cells(&"10".repeat(100)));
        let total: u32 = pulses.iter().sum();
        let expected = pulses.len() as f64 * 200.8;
        assert!((total as f64 - expected).abs() < 1.0);
    }

    #[test]
    fn test_precomp_interpolation() {
        assert_eq!(precomp_for_track(100.0, 200.0, 0, 80), 100.0);
        assert_eq!(precomp_for_track(100.0, 200.0, 79, 80), 200.0);
        assert_eq!(precomp_for_track(140.0, 140.0, 40, 80), 140.0);
        assert_eq!(precomp_for_track(100.0, 200.0, 0, 1), 100.0);
    }
}
