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

    src/util.rs

    Utility functions for CRC calculation and tolerance comparisons.
*/

/// The CRC-16/IBM-3740 (CCITT) polynomial used by both FM and MFM sector fields.
pub const CRC_CCITT_POLY: u16 = 0x1021;
/// The initial CRC value for FM fields.
pub const CRC_SEED_FM: u16 = 0xFFFF;
/// The CRC value after preloading 0xFFFF with three 0xA1 MFM premark bytes.
pub const CRC_SEED_MFM: u16 = 0xCDB4;

const fn build_crc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_CCITT_POLY
            }
            else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC_TABLE: [u16; 256] = build_crc_table();

/// Update a running CRC-16 register with a single byte.
#[inline]
pub fn crc_ibm_3740_byte(crc: u16, byte: u8) -> u16 {
    (crc << 8) ^ CRC_TABLE[((crc >> 8) as u8 ^ byte) as usize]
}

/// Calculate the CRC-16/IBM-3740 of a slice, starting with `start` or 0xFFFF.
/// A slice that ends with its own big-endian CRC produces a residual of 0.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    data.iter()
        .fold(start.unwrap_or(CRC_SEED_FM), |crc, byte| crc_ibm_3740_byte(crc, *byte))
}

/// Return true if `a` is within `tolerance` (a fraction of `b`) of `b`.
pub fn approx_eq<T: Into<f64>>(a: T, b: T, tolerance: f64) -> bool {
    let a: f64 = a.into();
    let b: f64 = b.into();
    (a - b).abs() <= (b * tolerance).abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mfm_seed() {
        assert_eq!(crc_ibm_3740(&[0xA1, 0xA1, 0xA1], None), CRC_SEED_MFM);
    }

    #[test]
    fn test_crc_check_value() {
        // CRC-16/IBM-3740 check value
        assert_eq!(crc_ibm_3740(b"123456789", None), 0x29B1);
    }

    #[test]
    fn test_crc_residual() {
        let mut field = vec![0xA1, 0xA1, 0xA1, 0xFE, 0x00, 0x00, 0x01, 0x02];
        let crc = crc_ibm_3740(&field, None);
        field.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc_ibm_3740(&field, None), 0);

        // Any single bit flip must be detected.
        for byte in 0..field.len() {
            for bit in 0..8 {
                let mut corrupt = field.clone();
                corrupt[byte] ^= 1 << bit;
                assert_ne!(crc_ibm_3740(&corrupt, None), 0, "flip at byte {} bit {}", byte, bit);
            }
        }
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(0x1900u16, 0x1900u16, 0.04));
        assert!(approx_eq(0x1980u16, 0x1900u16, 0.04));
        assert!(!approx_eq(0x1A80u16, 0x1900u16, 0.04));
        assert!(approx_eq(299.0f32, 300.0f32, 0.01));
    }
}
