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

    src/dmk/header.rs

    The 16 byte DMK file header.
*/

use std::io::{Read, Seek, Write};

use binrw::{binrw, BinRead, BinWrite};

use crate::{
    dmk::{DMK_IDAM_MASK, DMK_MAX_TRACKS, DMK_TRACK_HEADER_SIZE},
    types::{DmkOptions, DmkQuirks},
    DmkFluxError,
    Result,
};

pub const DMK_WRITE_PROTECTED: u8 = 0xFF;

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(little)]
pub struct DmkHeader {
    pub write_protect: u8,
    pub tracks: u8,
    /// Length of each track record, including the sector mark table.
    pub track_len: u16,
    #[br(map = |x: u8| DmkOptions::from_bits_retain(x))]
    #[bw(map = |x: &DmkOptions| x.bits())]
    pub options: DmkOptions,
    #[br(map = |x: u8| DmkQuirks::from_bits_retain(x))]
    #[bw(map = |x: &DmkQuirks| x.bits())]
    pub quirks: DmkQuirks,
    pub reserved: [u8; 6],
    /// Non-zero when the image was written by an emulator for a real disk format.
    pub real_format: u32,
}

impl Default for DmkHeader {
    fn default() -> Self {
        DmkHeader {
            write_protect: 0,
            tracks: 0,
            track_len: 0,
            options: DmkOptions::empty(),
            quirks: DmkQuirks::empty(),
            reserved: [0; 6],
            real_format: 0,
        }
    }
}

impl DmkHeader {
    pub fn new(tracks: u8, track_len: u16) -> Self {
        DmkHeader {
            tracks,
            track_len,
            ..Default::default()
        }
    }

    pub fn sides(&self) -> usize {
        self.options.sides()
    }

    pub fn fm_times(&self) -> usize {
        self.options.fm_times()
    }

    pub fn write_protected(&self) -> bool {
        self.write_protect == DMK_WRITE_PROTECTED
    }

    /// The file offset of the record for the given track and side.
    pub fn track_offset(&self, track: usize, side: usize) -> u64 {
        super::DMK_HEADER_SIZE as u64 + ((track * self.sides() + side) as u64 * self.track_len as u64)
    }

    /// Read and validate a header.
    pub fn read_validated<RS: Read + Seek>(reader: &mut RS) -> Result<Self> {
        let header = DmkHeader::read(reader)?;
        header.validate()?;
        Ok(header)
    }

    pub fn write_to<WS: Write + Seek>(&self, writer: &mut WS) -> Result<()> {
        BinWrite::write(self, writer)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.write_protect != 0 && self.write_protect != DMK_WRITE_PROTECTED {
            return Err(DmkFluxError::InvalidHeader(format!(
                "bad write protect byte: {:02X}",
                self.write_protect
            )));
        }
        if self.tracks as usize > DMK_MAX_TRACKS {
            return Err(DmkFluxError::InvalidHeader(format!("too many tracks: {}", self.tracks)));
        }
        if (self.track_len as usize) <= DMK_TRACK_HEADER_SIZE || self.track_len > DMK_IDAM_MASK + 1 {
            return Err(DmkFluxError::InvalidHeader(format!(
                "bad track length: {:04X}",
                self.track_len
            )));
        }
        Ok(())
    }
}
