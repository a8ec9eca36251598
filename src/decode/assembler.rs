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

    src/decode/assembler.rs

    Assembles the bytes recovered by the bit decoder into one attempt's DMK
    track: positions the track start, records sector marks, detects
    wraparound and tracks the index hole.
*/

use crate::{
    decode::DecoderOptions,
    dmk::{
        track::{mark_offset, DmkTrack},
        DMK_BAD_FLAG,
        DMK_IDAM_MASK,
        DMK_MAX_SECTORS,
        DMK_MFM_FLAG,
        DMK_TRACK_HEADER_SIZE,
        GAP1PLUS,
        READ_TRACK_LEN_MIN,
    },
    types::{DmkEncoding, TrackFault, TrackStats},
};

/// Outcome of offering an ID address mark to the assembler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IdMarkResult {
    /// The assembler is not accepting bytes.
    OutOfRange,
    /// The mark could not be recorded, either because the track buffer is exhausted or
    /// because the mark table is full. A full table is counted as an error.
    Dropped,
    /// The mark was recorded and its byte written.
    Recorded,
}

pub struct TrackAssembler {
    track: DmkTrack,
    cursor: usize,
    idam_ct: usize,
    hole: Option<usize>,
    ignore: i32,
    ignored: i32,
    full: bool,
    iam_pos: Option<usize>,
    awaiting_iam: bool,
    use_hole: bool,
    index_edge: u32,
    single_density: bool,
    accum_sectors: bool,
    overflowed: bool,
    stats: TrackStats,
}

impl TrackAssembler {
    pub fn new(opts: &DecoderOptions) -> Self {
        TrackAssembler {
            track: DmkTrack::new(opts.capacity),
            cursor: DMK_TRACK_HEADER_SIZE,
            idam_ct: 0,
            hole: None,
            ignore: opts.ignore,
            ignored: 0,
            full: false,
            iam_pos: opts.iam_pos,
            awaiting_iam: opts.iam_pos.is_some(),
            use_hole: opts.use_hole,
            index_edge: 0,
            single_density: opts.single_density,
            accum_sectors: opts.accum_sectors,
            overflowed: false,
            stats: TrackStats::new(),
        }
    }

    /// The write cursor, as an offset from the start of the track record.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Returns true if no sector has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.idam_ct == 0
    }

    pub fn idam_ct(&self) -> usize {
        self.idam_ct
    }

    pub fn hole(&self) -> Option<usize> {
        self.hole
    }

    pub fn index_edge(&self) -> u32 {
        self.index_edge
    }

    pub fn awaiting_iam(&self) -> bool {
        self.awaiting_iam
    }

    pub fn stats(&self) -> &TrackStats {
        &self.stats
    }

    pub fn track(&self) -> &DmkTrack {
        &self.track
    }

    /// Returns true if flux pulses should be dropped because the track is anchored to the index
    /// hole and the hole has not been seen yet.
    pub fn blocked(&self) -> bool {
        self.use_hole && self.hole.is_none()
    }

    /// Returns true while data before the start of the track is being skipped.
    pub fn awaiting_start(&self) -> bool {
        match self.iam_pos {
            None => !self.use_hole && self.is_empty(),
            Some(_) => self.awaiting_iam,
        }
    }

    /// Check whether the assembler accepts another byte. `field_open` is true while a data or
    /// extra CRC field is still being read, which lets a sector straddling the final index hole
    /// complete. Each call consumes one byte of the configured ignore count.
    pub fn in_range(&mut self, field_open: bool) -> bool {
        if self.full {
            return false;
        }
        if self.ignored < self.ignore {
            self.ignored += 1;
            return false;
        }
        if self.use_hole && self.index_edge >= 3 && !field_open {
            log::trace!("TrackAssembler::in_range(): stopping at index edge {}", self.index_edge);
            self.full = true;
            return false;
        }
        true
    }

    /// Write a byte to the track. FM bytes are stored twice unless the image is single density.
    pub fn on_byte(&mut self, byte: u8, encoding: DmkEncoding, field_open: bool) {
        if !self.in_range(field_open) {
            return;
        }
        self.put(byte);
        if encoding == DmkEncoding::Fm && !self.single_density {
            self.put(byte);
        }
    }

    fn put(&mut self, byte: u8) {
        if self.cursor <= self.track.capacity() - 2 {
            self.track.buf_mut()[self.cursor] = byte;
            self.cursor += 1;
        }
        else if !self.overflowed {
            log::warn!(
                "TrackAssembler::put(): track buffer overflow at {:04X}",
                self.cursor
            );
            self.overflowed = true;
            self.stats.faults.push(TrackFault::StreamBufferOverflow);
        }
    }

    /// Move the bytes written so far so that the cursor lands `pos` bytes after the start of
    /// the track data. Missing leading bytes are filled with gap bytes for the encoding.
    fn reposition(&mut self, pos: usize, encoding: DmkEncoding) {
        let start = DMK_TRACK_HEADER_SIZE;
        let written = self.cursor - start;
        let pos = pos.min(self.track.capacity() - 2 - start);
        let buf = self.track.buf_mut();

        if written < pos {
            buf.copy_within(start..start + written, start + pos - written);
            let fill = if encoding == DmkEncoding::Mfm { 0x4E } else { 0xFF };
            buf[start..start + pos - written].fill(fill);
        }
        else {
            buf.copy_within(start + written - pos..start + written, start);
        }
        self.cursor = start + pos;
    }

    /// Handle an index address mark. Returns false if the mark was not accepted.
    pub fn on_index_mark(&mut self, byte: u8, encoding: DmkEncoding, field_open: bool) -> bool {
        if !self.in_range(field_open) {
            return false;
        }

        if let Some(iam_pos) = self.iam_pos {
            let written = self.cursor - DMK_TRACK_HEADER_SIZE;

            if self.awaiting_iam || self.is_empty() {
                // Any earlier IAM without a following sector is taken to be noise.
                let pos = if encoding == DmkEncoding::Fm && !self.single_density {
                    iam_pos * 2
                }
                else {
                    iam_pos
                };
                self.reposition(pos, encoding);
                self.awaiting_iam = false;
            }
            else if written > (self.track.capacity() - DMK_TRACK_HEADER_SIZE) * 95 / 100 {
                log::debug!("TrackAssembler::on_index_mark(): stopping before second IAM");
                self.full = true;
                return false;
            }
        }

        self.on_byte(byte, encoding, field_open);
        true
    }

    /// Handle an ID address mark, recording a sector mark entry for it.
    pub fn on_id_mark(&mut self, byte: u8, encoding: DmkEncoding, field_open: bool) -> IdMarkResult {
        if !self.in_range(field_open) {
            return IdMarkResult::OutOfRange;
        }

        if !self.awaiting_iam && self.awaiting_start() {
            self.reposition(GAP1PLUS, encoding);
        }

        let mut entry = self.cursor as u16 & DMK_IDAM_MASK;
        if encoding == DmkEncoding::Mfm {
            entry |= DMK_MFM_FLAG;
        }

        if self.cursor >= self.track.capacity() {
            return IdMarkResult::Dropped;
        }

        if self.idam_ct >= DMK_MAX_SECTORS {
            log::warn!("TrackAssembler::on_id_mark(): too many IDAMs on track");
            self.fault(TrackFault::TooManyIdamsOnTrack);
            return IdMarkResult::Dropped;
        }

        if self.accum_sectors {
            self.stats.enc_sec[self.idam_ct] = encoding;
        }
        self.track.set_mark(self.idam_ct, entry);
        self.idam_ct += 1;
        log::trace!(
            "TrackAssembler::on_id_mark(): sector {} {} at {:04X}",
            self.idam_ct - 1,
            encoding,
            self.cursor
        );

        self.on_byte(byte, encoding, field_open);
        IdMarkResult::Recorded
    }

    /// Handle an index hole. The first hole records the track start.
    pub fn on_index(&mut self) {
        if self.hole.is_none() {
            self.hole = Some(self.cursor);
            log::trace!("TrackAssembler::on_index(): hole at {:04X}", self.cursor);

            if self.ignore < 0 {
                for _ in 0..-self.ignore {
                    self.put(0xFF);
                }
            }
        }
        self.index_edge += 1;
    }

    /// Count an error.
    pub fn fault(&mut self, fault: TrackFault) {
        self.stats.faults.push(fault);
        if fault.is_error() {
            self.stats.errcount += 1;
        }
    }

    /// Count an error against the most recent sector and flag it bad. When sectors are being
    /// accumulated across reads, a sector already flagged bad is not counted again, so one
    /// sector contributes one error at most.
    pub fn sector_fault(&mut self, fault: TrackFault, coalesce: bool) {
        let already_bad = self.last_mark().map(|e| e & DMK_BAD_FLAG != 0).unwrap_or(false);

        if coalesce && self.accum_sectors && already_bad {
            self.stats.faults.push(fault);
        }
        else {
            self.fault(fault);
        }
        if self.accum_sectors {
            self.flag_last_bad();
        }
    }

    /// Count a good sector.
    pub fn good_sector(&mut self, encoding: DmkEncoding) {
        self.stats.good_sectors += 1;
        self.stats.enc_count[encoding.idx()] += 1;
    }

    fn last_mark(&self) -> Option<u16> {
        match self.idam_ct {
            0 => None,
            n => Some(self.track.mark(n - 1)),
        }
    }

    fn flag_last_bad(&mut self) {
        if let Some(entry) = self.last_mark() {
            self.track.set_mark(self.idam_ct - 1, entry | DMK_BAD_FLAG);
        }
    }

    /// Remove the most recent sector mark.
    pub fn pop_mark(&mut self) {
        if self.idam_ct > 0 {
            self.idam_ct -= 1;
            self.track.set_mark(self.idam_ct, 0);
        }
    }

    /// Once most of a track has been read, detect an ID field identical to the first one on
    /// the track. It is the first sector seen again, so its mark is removed and the track is
    /// complete. Returns true on wraparound.
    pub fn check_wraparound(&mut self) -> bool {
        let min_data = (READ_TRACK_LEN_MIN as usize - DMK_TRACK_HEADER_SIZE) * 95 / 100;
        if self.cursor - DMK_TRACK_HEADER_SIZE < min_data || self.idam_ct < 2 {
            return false;
        }

        let first = self.track.mark(0);
        let last = self.track.mark(self.idam_ct - 1);
        if mark_offset(first) == mark_offset(last) || (first & DMK_MFM_FLAG) != (last & DMK_MFM_FLAG) {
            return false;
        }

        let cmp_len = if first & DMK_MFM_FLAG != 0 || self.single_density {
            5
        }
        else {
            10
        };

        let buf = self.track.buf();
        let (a, b) = (mark_offset(first), mark_offset(last));
        if b + cmp_len > buf.len() || buf[a..a + cmp_len] != buf[b..b + cmp_len] {
            return false;
        }

        log::debug!(
            "TrackAssembler::check_wraparound(): wraparound at {:04X} after {} sectors",
            b,
            self.idam_ct - 1
        );
        self.pop_mark();
        self.stats.wraparound = true;
        self.full = true;
        true
    }

    /// Finish the track, returning it with its statistics. The caller is expected to have
    /// resolved any open sector fields. When anchored to the index hole, the data is rotated so
    /// that the hole is at the start of the track.
    pub fn finish(mut self) -> (DmkTrack, TrackStats) {
        self.track.set_len(self.cursor);

        if self.use_hole {
            if let Some(hole) = self.hole {
                self.track.rotate(hole);
            }
        }

        (self.track, self.stats)
    }
}
