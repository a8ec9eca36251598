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

    src/dmk/mod.rs

    The DMK track image container: constants, header, track records and
    whole-image reading and writing.

    A DMK image is a 16 byte header followed by fixed-length track records.
    Each track record begins with a 128 byte table of 64 little-endian u16
    sector mark entries, followed by the raw decoded track bytes.
*/

pub mod header;
pub mod image;
pub mod secsize;
pub mod track;

pub use secsize::secsize;

pub const DMK_HEADER_SIZE: usize = 0x10;
/// Space reserved at the start of each track for the sector mark table.
pub const DMK_TRACK_HEADER_SIZE: usize = 0x80;

pub const DMK_MAX_SIDES: usize = 2;
pub const DMK_MAX_SECTORS: usize = 64;
pub const DMK_MAX_TRACKS: usize = 88;

/// Sector mark entry flag: the sector is MFM encoded.
pub const DMK_MFM_FLAG: u16 = 0x8000;
/// Sector mark entry flag: the sector had an error. Only used in memory; cleared on write.
pub const DMK_BAD_FLAG: u16 = 0x4000;
pub const DMK_IDAM_MASK: u16 = 0x3fff;

// Track lengths used by the DMK emulator.
pub const EMU_TRACK_LEN_5SD: u16 = 0x0CC0;
pub const EMU_TRACK_LEN_5: u16 = 0x1900;
pub const EMU_TRACK_LEN_8SD: u16 = 0x14E0;
pub const EMU_TRACK_LEN_8: u16 = 0x2940;
pub const EMU_TRACK_LEN_3HD: u16 = 0x3180;

// Track lengths for reads from media, allowing for a drive up to 2% slow.
pub const READ_TRACK_LEN_5SD: u16 = 0x0D00;
pub const READ_TRACK_LEN_5: u16 = 0x1980;
pub const READ_TRACK_LEN_8SD: u16 = 0x1560;
pub const READ_TRACK_LEN_8: u16 = 0x2A40;
pub const READ_TRACK_LEN_3HD: u16 = 0x3260;
pub const READ_TRACK_LEN_MIN: u16 = READ_TRACK_LEN_5SD;
pub const READ_TRACK_LEN_MAX: u16 = READ_TRACK_LEN_3HD;

/// Offset of the first ID mark from the start of the track data when a track is not anchored
/// to the index hole or an IAM.
pub const GAP1PLUS: usize = 48;
