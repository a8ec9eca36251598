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

    src/merge.rs

    Merging of repeated reads of a track. Bad sectors in a new read are
    replaced with good copies of the same sector from the best previous
    read, and the best of the new read, the repaired read and the previous
    best is kept.

    The approach is simple-minded: it cannot cope with sectors that appear
    to be missing because of damage to their ID or data address marks.
*/

use crate::{
    dmk::{
        track::{mark_is_bad, DmkTrack},
        DMK_IDAM_MASK,
        DMK_MAX_SECTORS,
        DMK_TRACK_HEADER_SIZE,
        READ_TRACK_LEN_MAX,
    },
    types::TrackStats,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Pick {
    Previous,
    Current,
    Repaired,
}

/// A track under construction from the sectors of other tracks.
struct Splice {
    track: DmkTrack,
    cursor: usize,
    idam_ct: usize,
}

impl Splice {
    fn new(capacity: usize) -> Self {
        Splice {
            track: DmkTrack::new(capacity),
            cursor: DMK_TRACK_HEADER_SIZE,
            idam_ct: 0,
        }
    }

    fn fits(&self, len: usize) -> bool {
        self.cursor + len <= self.track.capacity().min(READ_TRACK_LEN_MAX as usize)
    }

    fn copy(&mut self, src: &[u8]) {
        self.track.buf_mut()[self.cursor..self.cursor + src.len()].copy_from_slice(src);
        self.cursor += src.len();
    }

    /// Copy the data between the start of `src` and its first sector, which may be empty.
    /// Returns false if it doesn't fit.
    fn copy_preamble(&mut self, src: &DmkTrack) -> bool {
        let pre = src.preamble().unwrap_or(&[]);
        if !self.fits(pre.len()) {
            return false;
        }
        self.copy(pre);
        true
    }

    /// Append sector `idx` of `src`, keeping the flags of its mark table entry. Returns false,
    /// leaving the splice unchanged, if the sector can't be taken.
    fn copy_sector(&mut self, src: &DmkTrack, idx: usize, len: usize) -> bool {
        let off = match src.sector_offset(idx) {
            Some(off) if off + len <= src.buf().len() => off,
            _ => return false,
        };
        if self.idam_ct >= DMK_MAX_SECTORS || !self.fits(len) {
            return false;
        }
        let entry = (src.mark(idx) & !DMK_IDAM_MASK) | (self.cursor as u16 & DMK_IDAM_MASK);
        self.track.set_mark(self.idam_ct, entry);
        self.idam_ct += 1;
        self.copy(&src.buf()[off..off + len]);
        true
    }

    /// Append sector `idx` of `src`, preceded by the preamble of `src` if it is the first
    /// sector of the splice. Nothing is appended unless both fit.
    fn take_sector(&mut self, src: &DmkTrack, idx: usize, len: usize, with_preamble: bool) -> bool {
        let start = self.cursor;
        if with_preamble && !self.copy_preamble(src) {
            return false;
        }
        if !self.copy_sector(src, idx, len) {
            self.cursor = start;
            return false;
        }
        true
    }

    fn finish(mut self) -> DmkTrack {
        self.track.set_len(self.cursor);
        self.track
    }
}

/// Merge a new read of a track with the best previous read, returning the new best and its
/// statistics.
///
/// Each bad sector of `new` is replaced with the first good sector of `prev` bearing the same
/// sector number. The first sector of the track can only be replaced by the first sector of
/// `prev`, along with its preamble. The result with the fewest errors is kept, preferring the
/// previous best when it is no worse.
pub fn merge_sectors(
    prev: &DmkTrack,
    prev_stats: &TrackStats,
    new: &DmkTrack,
    new_stats: &TrackStats,
) -> (DmkTrack, TrackStats) {
    if new_stats.errcount == 0 {
        let mut stats = new_stats.clone();
        stats.reused_sectors = 0;
        return (new.clone(), stats);
    }

    let mut splice = Splice::new(new.capacity().max(READ_TRACK_LEN_MAX as usize));
    let mut splice_stats = new_stats.clone();
    splice_stats.reused_sectors = 0;
    let mut overflow = false;

    let mut cur = 0;
    while let Some(cur_off) = new.sector_offset(cur) {
        let mut replaced = false;

        if mark_is_bad(new.mark(cur)) {
            let secnum = new.sector_number(cur);

            let mut p = 0;
            while prev.sector_offset(p).is_some() {
                let idx = p;
                p += 1;

                if prev.sector_number(idx) != secnum || mark_is_bad(prev.mark(idx)) {
                    continue;
                }
                // The first sector carries the preamble, which only makes sense to take from
                // the first sector of the previous read.
                if cur == 0 && idx != 0 {
                    continue;
                }
                let len = match prev.sector_len(idx) {
                    Some(len) if len > 0 => len,
                    _ => continue,
                };
                if !splice.take_sector(prev, idx, len, cur == 0) {
                    continue;
                }
                log::debug!(
                    "merge_sectors(): reusing sector {:02X} from previous read",
                    secnum.unwrap_or(0)
                );

                let encoding = prev_stats.sector_encoding(idx);
                splice_stats.reused_sectors += 1;
                splice_stats.good_sectors += 1;
                if let Some(e) = splice_stats.enc_sec.get_mut(cur) {
                    *e = encoding;
                }
                splice_stats.enc_count[encoding.idx()] += 1;
                // Every bad sector should have an error, but be careful.
                splice_stats.errcount = splice_stats.errcount.saturating_sub(1);
                replaced = true;
                break;
            }
        }

        if !replaced {
            // Keep the sector as read, good or bad.
            let kept = match new.sector_len(cur) {
                Some(len) => splice.take_sector(new, cur, len, cur == 0),
                None => false,
            };
            if !kept {
                overflow = true;
            }
        }

        log::trace!("merge_sectors(): sector {} at {:04X} replaced: {}", cur, cur_off, replaced);
        cur += 1;
    }

    let mut best = Pick::Current;
    let mut best_err = new_stats.errcount;
    let mut best_reused = 0;

    if !overflow && splice_stats.errcount < best_err {
        best = Pick::Repaired;
        best_err = splice_stats.errcount;
        best_reused = splice_stats.reused_sectors;
    }

    if !prev.is_empty() && (prev_stats.errcount, prev_stats.reused_sectors) <= (best_err, best_reused) {
        best = Pick::Previous;
    }

    log::debug!(
        "merge_sectors(): errors new {} repaired {}{} previous {}, using {:?}",
        new_stats.errcount,
        splice_stats.errcount,
        if overflow { " (overflow)" } else { "" },
        prev_stats.errcount,
        best
    );

    match best {
        Pick::Current => {
            let mut stats = new_stats.clone();
            stats.reused_sectors = 0;
            (new.clone(), stats)
        }
        Pick::Repaired => (splice.finish(), splice_stats),
        Pick::Previous => (prev.clone(), prev_stats.clone()),
    }
}
