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

    src/dmk/secsize.rs

    Sector size lookup from an ID field size code.
*/

use crate::types::{DmkEncoding, DmkQuirks};

/// The largest size code honored when decoding. A WD179x ignores the higher order bits.
pub const MAX_SIZE_CODE_READ: u8 = 3;
/// The largest size code honored when encoding.
pub const MAX_SIZE_CODE_ENCODE: u8 = 7;

/// Return the data field length in bytes, excluding the DAM and CRC, for a sector with the
/// given size code.
///
/// FM size codes above `max_code` are treated as the non-IBM WD1771 encoding, where the size
/// is 16 times the code.
pub fn secsize(code: u8, encoding: DmkEncoding, max_code: u8, quirks: DmkQuirks) -> usize {
    let modulus = max_code as usize + 1;
    let mut size = match encoding {
        DmkEncoding::Mfm => 128 << (code as usize % modulus),
        DmkEncoding::Rx02 => 256 << (code as usize % modulus),
        DmkEncoding::Fm | DmkEncoding::Mixed => {
            if code <= max_code {
                128 << code
            }
            else {
                16 * code as usize
            }
        }
    };

    if quirks.contains(DmkQuirks::EXTRA_DATA) {
        size += 4;
    }
    size
}
