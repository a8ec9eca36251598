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

    src/dmk/track.rs

    A single DMK track record held in one byte buffer: the 128 byte sector
    mark table followed by raw track data.
*/

use crate::dmk::{
    DMK_BAD_FLAG,
    DMK_IDAM_MASK,
    DMK_MAX_SECTORS,
    DMK_MFM_FLAG,
    DMK_TRACK_HEADER_SIZE,
    READ_TRACK_LEN_MAX,
};

/// Return the track offset encoded in a sector mark entry.
#[inline]
pub fn mark_offset(entry: u16) -> usize {
    (entry & DMK_IDAM_MASK) as usize
}

#[inline]
pub fn mark_is_mfm(entry: u16) -> bool {
    entry & DMK_MFM_FLAG != 0
}

#[inline]
pub fn mark_is_bad(entry: u16) -> bool {
    entry & DMK_BAD_FLAG != 0
}

/// A DMK track. Offsets into the track, including those in the sector mark table, count from
/// the start of the record, so the first data byte is at offset 128.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DmkTrack {
    buf: Vec<u8>,
    len: usize,
}

impl Default for DmkTrack {
    fn default() -> Self {
        DmkTrack::new(READ_TRACK_LEN_MAX as usize)
    }
}

impl DmkTrack {
    /// Create an empty track able to hold `capacity` bytes including the mark table.
    pub fn new(capacity: usize) -> Self {
        DmkTrack {
            buf: vec![0; capacity.max(DMK_TRACK_HEADER_SIZE)],
            len: 0,
        }
    }

    /// Create a track from a record as stored in a DMK file.
    pub fn from_record(record: &[u8]) -> Self {
        let mut buf = record.to_vec();
        if buf.len() < DMK_TRACK_HEADER_SIZE {
            buf.resize(DMK_TRACK_HEADER_SIZE, 0);
        }
        DmkTrack {
            len: buf.len(),
            buf,
        }
    }

    /// Produce a file record of `track_len` bytes. Bad sector flags are cleared, and the
    /// data is truncated or zero padded to fit.
    pub fn to_record(&self, track_len: usize) -> Vec<u8> {
        let mut record = vec![0; track_len.max(DMK_TRACK_HEADER_SIZE)];
        for i in 0..DMK_MAX_SECTORS {
            let entry = self.mark(i) & !DMK_BAD_FLAG;
            record[i * 2..i * 2 + 2].copy_from_slice(&entry.to_le_bytes());
        }

        let copy_len = self.len.min(record.len());
        if copy_len > DMK_TRACK_HEADER_SIZE {
            record[DMK_TRACK_HEADER_SIZE..copy_len].copy_from_slice(&self.buf[DMK_TRACK_HEADER_SIZE..copy_len]);
        }
        record
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The used length of the track, including the mark table.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) {
        self.len = len.min(self.buf.len());
    }

    /// The used part of the track, including the mark table.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The full track buffer up to capacity.
    pub fn buf(&self) -> &[u8] {
        &self.buf
    }

    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// The used track data following the mark table.
    pub fn data(&self) -> &[u8] {
        &self.buf[DMK_TRACK_HEADER_SIZE..self.len.max(DMK_TRACK_HEADER_SIZE)]
    }

    /// The length of the used track data.
    pub fn data_len(&self) -> usize {
        self.len.saturating_sub(DMK_TRACK_HEADER_SIZE)
    }

    /// Return the raw sector mark table entry at `idx`, or 0 if out of range.
    pub fn mark(&self, idx: usize) -> u16 {
        if idx >= DMK_MAX_SECTORS {
            return 0;
        }
        u16::from_le_bytes([self.buf[idx * 2], self.buf[idx * 2 + 1]])
    }

    pub fn set_mark(&mut self, idx: usize, entry: u16) {
        if idx < DMK_MAX_SECTORS {
            self.buf[idx * 2..idx * 2 + 2].copy_from_slice(&entry.to_le_bytes());
        }
    }

    /// Iterate over the sector mark table entries in rotational order, up to the first unused
    /// entry.
    pub fn marks(&self) -> impl Iterator<Item = u16> + '_ {
        (0..DMK_MAX_SECTORS).map(|i| self.mark(i)).take_while(|e| *e != 0)
    }

    pub fn mark_ct(&self) -> usize {
        self.marks().count()
    }

    pub fn clear_marks(&mut self) {
        self.buf[..DMK_TRACK_HEADER_SIZE].fill(0);
    }

    /// Rotate the track data so that the byte at buffer offset `hole` becomes the first data
    /// byte, adjusting the sector mark table to match. Sectors recorded after the hole move to
    /// the front of the table.
    pub fn rotate(&mut self, hole: usize) {
        if hole < DMK_TRACK_HEADER_SIZE || hole >= self.len {
            return;
        }
        let amount = hole - DMK_TRACK_HEADER_SIZE;
        if amount == 0 {
            return;
        }
        let rotate_size = self.data_len() - amount;

        self.buf[DMK_TRACK_HEADER_SIZE..self.len].rotate_left(amount);

        let marks: Vec<u16> = self.marks().collect();
        let split = marks
            .iter()
            .position(|e| mark_offset(*e).saturating_sub(DMK_TRACK_HEADER_SIZE) >= amount)
            .unwrap_or(marks.len());

        let moved = |e: u16, off: usize| (e & !DMK_IDAM_MASK) | (off as u16 & DMK_IDAM_MASK);
        let rotated = marks[split..]
            .iter()
            .map(|e| moved(*e, mark_offset(*e) - amount))
            .chain(marks[..split].iter().map(|e| moved(*e, mark_offset(*e) + rotate_size)));

        for (i, entry) in rotated.enumerate() {
            self.set_mark(i, entry);
        }

        log::trace!(
            "DmkTrack::rotate(): rotated {} bytes, {} of {} sectors moved to front",
            amount,
            marks.len() - split,
            marks.len()
        );
    }

    /// Return the buffer offset of the sector at `idx` in rotational order.
    pub fn sector_offset(&self, idx: usize) -> Option<usize> {
        if idx >= DMK_MAX_SECTORS {
            return None;
        }
        let off = mark_offset(self.mark(idx));

        if off < DMK_TRACK_HEADER_SIZE || off > READ_TRACK_LEN_MAX as usize - 10 || off + 7 > self.buf.len() {
            return None;
        }
        Some(off)
    }

    /// Return the number of bytes from the sector at `idx` to the next sector, or to the end
    /// of the track data for the last sector. Misordered sectors have no valid length.
    pub fn sector_len(&self, idx: usize) -> Option<usize> {
        let s0 = self.sector_offset(idx)?;

        match self.sector_offset(idx + 1) {
            Some(s1) if s0 >= s1 => None,
            Some(s1) => Some(s1 - s0),
            None => self.data_len().checked_sub(s0 - DMK_TRACK_HEADER_SIZE),
        }
    }

    /// Return the sector number from the ID field of the sector at `idx`. A doubled FM ID
    /// field is recognized by a repeated mark byte.
    pub fn sector_number(&self, idx: usize) -> Option<u8> {
        let off = self.sector_offset(idx)?;
        let id = &self.buf[off..];
        Some(if id[1] == 0xFE { id[6] } else { id[3] })
    }

    /// The data between the start of the track and the first sector, if there is any.
    pub fn preamble(&self) -> Option<&[u8]> {
        let s0 = self.sector_offset(0)?;
        if s0 <= DMK_TRACK_HEADER_SIZE {
            return None;
        }
        Some(&self.buf[DMK_TRACK_HEADER_SIZE..s0])
    }
}
