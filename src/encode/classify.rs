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

    src/encode/classify.rs

    The first encoding pass: determine how each byte of a DMK track is to be
    written, and clean up the gap bytes in front of each address mark.
*/

use bit_vec::BitVec;

use crate::{
    dmk::{
        secsize,
        secsize::MAX_SIZE_CODE_ENCODE,
        track::{mark_is_mfm, mark_offset, DmkTrack},
        DMK_MAX_SECTORS,
        DMK_TRACK_HEADER_SIZE,
    },
    encode::EncoderOptions,
    types::{DmkEncoding, DmkQuirks},
};

/// FM zero bytes written ahead of an address mark. Six is nominal.
pub const FM_GAP3Z: usize = 4;
/// MFM zero bytes written ahead of the sync bytes of an address mark. Twelve is nominal, but
/// three is too few.
pub const MFM_GAP3Z: usize = 8;

const NO_MARK: usize = 0x7fff;

/// How a byte is written.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ByteClass {
    /// A padding byte in a doubled FM area; not written.
    #[default]
    Skip,
    /// FM with an FF clock.
    Fm,
    /// FM with a D7 clock.
    FmIam,
    /// FM with a C7 clock.
    FmAm,
    Mfm,
    /// MFM C2 with a missing clock.
    MfmIam,
    /// MFM A1 with a missing clock.
    MfmAm,
    /// DEC modified MFM.
    Rx02,
}

impl ByteClass {
    pub fn is_mfm(&self) -> bool {
        matches!(self, ByteClass::Mfm | ByteClass::MfmIam | ByteClass::MfmAm)
    }

    pub fn is_mark(&self) -> bool {
        matches!(
            self,
            ByteClass::FmIam | ByteClass::FmAm | ByteClass::MfmIam | ByteClass::MfmAm
        )
    }

    /// A single letter for trace output.
    pub fn letter(&self) -> char {
        match self {
            ByteClass::Skip => '-',
            ByteClass::Fm => 'F',
            ByteClass::FmIam => 'I',
            ByteClass::FmAm => 'A',
            ByteClass::Mfm => 'M',
            ByteClass::MfmIam => 'J',
            ByteClass::MfmAm => 'B',
            ByteClass::Rx02 => 'X',
        }
    }
}

/// A track with a class for each byte position.
#[derive(Clone, Debug)]
pub struct ClassifiedTrack {
    /// The track bytes, including the mark table, with gaps in front of marks cleaned up.
    pub bytes: Vec<u8>,
    /// The class of each byte. Positions inside the mark table are Skip.
    pub classes: Vec<ByteClass>,
    /// Set at the last byte of each sector's data field.
    pub sector_end: BitVec,
    /// The position of the index address mark, if one was found.
    pub iam: Option<usize>,
}

impl ClassifiedTrack {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= DMK_TRACK_HEADER_SIZE
    }

    pub fn class(&self, pos: usize) -> ByteClass {
        self.classes.get(pos).copied().unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MarkKind {
    Index,
    Address,
}

struct Classifier<'a> {
    opts: &'a EncoderOptions,
    bytes: Vec<u8>,
    classes: Vec<ByteClass>,
    sector_end: BitVec,
}

impl Classifier<'_> {
    /// Classify an address mark at `p` and rewrite the gap in front of it.
    fn mark(&mut self, p: usize, base: ByteClass, kind: MarkKind) {
        let fmt = self.opts.fm_times;
        if base == ByteClass::Fm {
            self.classes[p] = match kind {
                MarkKind::Index => ByteClass::FmIam,
                MarkKind::Address => ByteClass::FmAm,
            };
            let start = p.saturating_sub(FM_GAP3Z * fmt).max(DMK_TRACK_HEADER_SIZE);
            for i in start..p {
                self.bytes[i] = 0;
                self.classes[i] = if fmt == 2 && i & 1 == 1 {
                    ByteClass::Skip
                }
                else {
                    ByteClass::Fm
                };
            }
        }
        else {
            self.classes[p] = ByteClass::Mfm;
            let (sync, class) = match kind {
                MarkKind::Index => (0xC2, ByteClass::MfmIam),
                MarkKind::Address => (0xA1, ByteClass::MfmAm),
            };
            let sync_start = p.saturating_sub(3).max(DMK_TRACK_HEADER_SIZE);
            for i in sync_start..p {
                self.bytes[i] = sync;
                self.classes[i] = class;
            }
            let gap_start = p.saturating_sub(3 + MFM_GAP3Z).max(DMK_TRACK_HEADER_SIZE);
            for i in gap_start..sync_start {
                self.bytes[i] = 0;
                self.classes[i] = ByteClass::Mfm;
            }
        }
    }

    /// The size code of the ID field at `idam`.
    fn size_code(&self, idam: usize, base: ByteClass) -> u8 {
        let stride = if base == ByteClass::Fm { self.opts.fm_times } else { 1 };
        self.bytes.get(idam + 4 * stride).copied().unwrap_or(0)
    }
}

fn mark_class(entry: u16) -> ByteClass {
    if mark_is_mfm(entry) {
        ByteClass::Mfm
    }
    else {
        ByteClass::Fm
    }
}

/// Classify the bytes of `track`, up to the length limit of `opts`.
///
/// The mark table drives the pass: the byte at each mark entry must be an FE ID address mark,
/// and a data address mark is searched for in the window where a WD179x would accept one.
pub fn classify(track: &DmkTrack, opts: &EncoderOptions) -> ClassifiedTrack {
    let end = opts.track_end(track);
    let fmt = opts.fm_times;

    let mut c = Classifier {
        opts,
        bytes: track.buf()[..end].to_vec(),
        classes: vec![ByteClass::Skip; end],
        sector_end: BitVec::from_elem(end, false),
    };

    let mut marks = (0..DMK_MAX_SECTORS)
        .map(|i| track.mark(i))
        .take_while(|e| *e != 0 && *e != 0xffff);

    let (mut next_idam, mut next_base) = match marks.next() {
        Some(e) => (mark_offset(e), mark_class(e)),
        None => (NO_MARK, ByteClass::Fm),
    };
    let first_idam = if next_idam == NO_MARK { 0 } else { next_idam };

    let mut base = next_base;
    let mut idam = 0;
    let mut dam_min = 0;
    let mut dam_max = 0;
    let mut iam = None;
    let mut skip = false;
    let mut rx02_data = 0usize;
    let mut sector_data = 0usize;

    for p in DMK_TRACK_HEADER_SIZE..end {
        if p >= next_idam {
            idam = next_idam;
            base = next_base;
            match marks.next() {
                Some(e) => {
                    next_idam = mark_offset(e);
                    next_base = mark_class(e);
                }
                None => {
                    next_idam = NO_MARK;
                    next_base = base;
                }
            }

            if base == ByteClass::Fm {
                dam_min = idam + 7 * fmt;
                dam_max = dam_min + 30 * fmt;
            }
            else {
                dam_min = idam + 7;
                dam_max = dam_min + 43;
            }
        }

        let byte = c.bytes[p];

        if p == idam && byte == 0xFE {
            skip = true;
            c.mark(p, base, MarkKind::Address);
        }
        else if p >= dam_min && p <= dam_max && matches!(byte, 0xF8..=0xFB | 0xFD) {
            // Don't find another DAM inside the data.
            dam_max = 0;
            skip = true;
            c.mark(p, base, MarkKind::Address);

            let code = c.size_code(idam, base);
            if opts.rx02 && matches!(byte, 0xF9 | 0xFD) {
                rx02_data = 2 + secsize(code, DmkEncoding::Rx02, MAX_SIZE_CODE_ENCODE, DmkQuirks::empty());
                // The CRC is followed by one RX02 FF.
                if let Some(b) = c.bytes.get_mut(fmt + p + rx02_data) {
                    *b = 0xFF;
                }
                rx02_data += 1;
            }
            else {
                let enc = if base == ByteClass::Fm {
                    DmkEncoding::Fm
                }
                else {
                    DmkEncoding::Mfm
                };
                sector_data = secsize(code, enc, MAX_SIZE_CODE_ENCODE, opts.quirks) + 2 + opts.extra_bytes;
            }
        }
        else if p <= first_idam
            && iam.is_none()
            && byte == 0xFC
            && ((base == ByteClass::Mfm && c.bytes[p - 1] == 0xC2)
                || (base == ByteClass::Fm && matches!(c.bytes[p - fmt], 0x00 | 0xFF)))
        {
            iam = Some(p);
            skip = true;
            c.mark(p, base, MarkKind::Index);
        }
        else if rx02_data > 0 {
            if fmt == 2 && skip {
                // The doubled DAM.
                skip = false;
            }
            else {
                c.classes[p] = ByteClass::Rx02;
                rx02_data -= 1;
                if rx02_data == 0 {
                    c.sector_end.set(p, true);
                }
            }
        }
        else if base == ByteClass::Fm && fmt == 2 && skip {
            // Odd distance from an address mark.
            skip = false;
        }
        else {
            c.classes[p] = base;
            skip = !skip;
            if sector_data > 0 {
                sector_data -= 1;
                if sector_data == 0 {
                    c.sector_end.set(p, true);
                }
            }
        }
    }

    if sector_data > 0 || rx02_data > 0 {
        log::debug!(
            "classify(): last sector extends {} bytes past the end of the track",
            sector_data.max(rx02_data)
        );
    }

    ClassifiedTrack {
        bytes: c.bytes,
        classes: c.classes,
        sector_end: c.sector_end,
        iam,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmk::{DMK_MFM_FLAG, EMU_TRACK_LEN_5, EMU_TRACK_LEN_8};

    fn mfm_track() -> DmkTrack {
        let mut track = DmkTrack::new(EMU_TRACK_LEN_5 as usize);
        track.set_len(EMU_TRACK_LEN_5 as usize);
        track.buf_mut()[DMK_TRACK_HEADER_SIZE..].fill(0x4E);

        let idam = 0x100;
        let buf = track.buf_mut();
        buf[0xE0] = 0xFC;
        buf[idam..idam + 5].copy_from_slice(&[0xFE, 0, 0, 1, 2]);
        buf[idam + 22] = 0xFB;
        track.set_mark(0, DMK_MFM_FLAG | idam as u16);
        track
    }

    #[test]
    fn test_mfm_marks_cleaned() {
        let mut track = mfm_track();
        // Leave the IAM sync bytes in place so the IAM is recognized.
        track.buf_mut()[0xDD..0xE0].fill(0xC2);

        let ct = classify(&track, &EncoderOptions::default());
        assert_eq!(ct.iam, Some(0xE0));
        assert_eq!(ct.class(0xE0), ByteClass::Mfm);
        assert_eq!(ct.class(0xDF), ByteClass::MfmIam);
        assert_eq!(&ct.bytes[0xD5..0xDD], &[0u8; 8]);

        assert_eq!(&ct.bytes[0xFD..0x100], &[0xA1; 3]);
        assert_eq!(ct.class(0xFD), ByteClass::MfmAm);
        assert_eq!(ct.bytes[0xFC], 0);
        assert_eq!(ct.bytes[0xF5], 0);
        assert_eq!(ct.bytes[0xF4], 0x4E);

        let dam = 0x100 + 22;
        assert_eq!(&ct.bytes[dam - 3..dam], &[0xA1; 3]);
        // 512 data bytes and a CRC.
        assert!(ct.sector_end[dam + 512 + 2]);
        assert!(!ct.sector_end[dam + 512 + 1]);
    }

    #[test]
    fn test_iam_needs_sync() {
        let track = mfm_track();
        let ct = classify(&track, &EncoderOptions::default());
        assert_eq!(ct.iam, None);
    }

    #[test]
    fn test_doubled_fm() {
        let mut track = DmkTrack::new(EMU_TRACK_LEN_5 as usize);
        track.set_len(EMU_TRACK_LEN_5 as usize);
        track.buf_mut()[DMK_TRACK_HEADER_SIZE..].fill(0xFF);
        let idam = 0x100;
        let id = [0xFE, 0xFE, 0, 0, 0, 0, 1, 1, 0, 0];
        track.buf_mut()[idam..idam + id.len()].copy_from_slice(&id);
        track.set_mark(0, idam as u16);

        let ct = classify(&track, &EncoderOptions::default());
        assert_eq!(ct.class(idam), ByteClass::FmAm);
        assert_eq!(ct.class(idam + 1), ByteClass::Skip);
        assert_eq!(ct.class(idam + 2), ByteClass::Fm);
        assert_eq!(ct.class(idam + 3), ByteClass::Skip);
        assert_eq!(&ct.bytes[idam - 8..idam], &[0u8; 8]);
        assert!(ct.classes[..DMK_TRACK_HEADER_SIZE].iter().all(|c| *c == ByteClass::Skip));
    }

    #[test]
    fn test_rx02_field() {
        let mut track = DmkTrack::new(EMU_TRACK_LEN_8 as usize);
        track.set_len(EMU_TRACK_LEN_8 as usize);
        track.buf_mut()[DMK_TRACK_HEADER_SIZE..].fill(0xFF);
        let idam = 0x100;
        let id = [0xFE, 0xFE, 0, 0, 0, 0, 1, 1, 1, 1];
        track.buf_mut()[idam..idam + id.len()].copy_from_slice(&id);
        let dam = idam + 40;
        track.buf_mut()[dam] = 0xFD;
        track.buf_mut()[dam + 1] = 0xFD;
        track.set_mark(0, idam as u16);

        let opts = EncoderOptions {
            rx02: true,
            ..Default::default()
        };
        let ct = classify(&track, &opts);
        assert_eq!(ct.class(dam), ByteClass::FmAm);
        assert_eq!(ct.class(dam + 1), ByteClass::Skip);
        assert_eq!(ct.class(dam + 2), ByteClass::Rx02);
        // 512 data bytes, a CRC and the trailing FF.
        let last = dam + 1 + 512 + 2 + 1;
        assert_eq!(ct.class(last), ByteClass::Rx02);
        assert!(ct.sector_end[last]);
        assert_eq!(ct.class(last + 1), ByteClass::Fm);
        assert_eq!(ct.bytes[last], 0xFF);
    }
}
