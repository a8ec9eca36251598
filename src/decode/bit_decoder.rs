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

    src/decode/bit_decoder.rs

    The FM/MFM/RX02 bit decoder. Flux pulses are classified into runs of
    clock/data bit cells, which are shifted through a 64-bit window where
    address marks are recognized and bytes are framed. Framed bytes are
    dispatched by field role to a TrackAssembler, with the ID and data
    field CRCs checked along the way.
*/

use crate::{
    decode::{
        assembler::{IdMarkResult, TrackAssembler},
        bit_window::{mfm_valid_clock, BitWindow},
        media::{MediaEncoding, PulseClassifier},
        DecoderOptions,
    },
    dmk::secsize::{secsize, MAX_SIZE_CODE_READ},
    types::{DmkEncoding, DmkQuirks, TrackFault},
    util::{crc_ibm_3740_byte, CRC_SEED_FM, CRC_SEED_MFM},
};

/// Bits after a data field during which no new mark is recognized.
const WRITE_SPLICE: i32 = 32;
/// The ID field byte count at which the post-ID gap is considered over.
const POST_ID_GAP_END: i32 = 18;
/// Length of the extra CRC-checked field enabled by the EXTRA_CRC quirk.
const EXTRA_CRC_LEN: i32 = 6;

const PREMARK_A1: u8 = 0xA1;
const PREMARK_C2: u8 = 0xC2;

// 36 raw bits ending an FM mark: the mark byte and its missing-clock pattern, preceded by the
// last data bit of the 00 gap byte.
const FM_IAM: u64 = 0x8aa2a2a88;
const FM_IAM_QUIRKY: u64 = 0x8aa222a88;
const FM_IDAM: u64 = 0x8aa222aa8;
const FM_DAM_F8: u64 = 0x8aa222888;
const FM_DAM_F9: u64 = 0x8aa22288a;
const FM_DAM_FA: u64 = 0x8aa2228a8;
const FM_DAM_FB: u64 = 0x8aa2228aa;
const FM_DAM_FD: u64 = 0x8aa222a8a;
const FM_BACKWARD_AM: u64 = 0xa222a8888;

// 32 raw bits of two MFM premark bytes with missing clocks.
const MFM_C2C2: u32 = 0x52245224;
const MFM_A1A1: u32 = 0x44894489;
const MFM_A1A1_QUIRKY: u32 = 0x448944a9;
const MFM_GAP_FFFF: u32 = 0x55555555;
const MFM_GAP_4E4E: u32 = 0x92549254;

const FM_CLOCKS_MASK: u64 = 0xdddddddd;
const FM_CLOCKS: u64 = 0x88888888;

pub struct BitDecoder {
    classifier: PulseClassifier,
    window: BitWindow,
    usr_encoding: DmkEncoding,
    cur_encoding: DmkEncoding,
    quirks: DmkQuirks,
    rx02_seen: bool,
    premark: u8,
    mark_after: i32,
    write_splice: i32,
    sizecode: u8,
    curcyl: u8,
    crc: u16,
    ibyte: i32,
    dbyte: i32,
    ebyte: i32,
    field_size: usize,
    awaiting_dam: bool,
    valid_id: bool,
    backward_am: u32,
    cyl_seen: Option<u8>,
    secsize: Option<usize>,
    first_encoding: Option<DmkEncoding>,
}

impl BitDecoder {
    pub fn new(opts: &DecoderOptions, media: MediaEncoding) -> Self {
        BitDecoder {
            classifier: PulseClassifier::new(media, opts.encoding, opts.quirks),
            window: BitWindow::new(),
            usr_encoding: opts.encoding,
            cur_encoding: DmkEncoding::Mixed,
            quirks: opts.quirks,
            rx02_seen: opts.rx02_seen,
            premark: 0,
            mark_after: -1,
            write_splice: 0,
            sizecode: 0,
            curcyl: 0,
            crc: 0,
            ibyte: -1,
            dbyte: -1,
            ebyte: -1,
            field_size: 0,
            awaiting_dam: false,
            valid_id: false,
            backward_am: 0,
            cyl_seen: None,
            secsize: None,
            first_encoding: None,
        }
    }

    /// The encoding currently being decoded.
    pub fn encoding(&self) -> DmkEncoding {
        self.cur_encoding
    }

    /// The number of address marks seen that look like marks read backward, as from the far
    /// side of a flippy disk.
    pub fn backward_am(&self) -> u32 {
        self.backward_am
    }

    /// The cylinder number in the ID field of the last good sector.
    pub fn cyl_seen(&self) -> Option<u8> {
        self.cyl_seen
    }

    /// The data length of the last good sector.
    pub fn secsize(&self) -> Option<usize> {
        self.secsize
    }

    /// The encoding of the first good sector.
    pub fn first_encoding(&self) -> Option<DmkEncoding> {
        self.first_encoding
    }

    /// Returns true while a data field or an extra CRC field is being read.
    #[inline]
    pub fn field_open(&self) -> bool {
        self.dbyte != -1 || self.ebyte != -1
    }

    #[inline]
    fn fields_idle(&self) -> bool {
        self.ibyte == -1 && self.dbyte == -1 && self.ebyte == -1
    }

    fn change_encoding(&mut self, encoding: DmkEncoding) {
        if self.cur_encoding != encoding {
            log::trace!("BitDecoder::change_encoding(): {} -> {}", self.cur_encoding, encoding);
            self.cur_encoding = encoding;
        }
    }

    /// Decode one flux pulse interval, in sample clock ticks.
    pub fn feed(&mut self, pulse: u32, asm: &mut TrackAssembler) {
        let len = self.classifier.classify(pulse);
        self.push_bit(true, asm);
        for _ in 1..len {
            self.push_bit(false, asm);
        }
    }

    /// Push enough bits through the window to emit any bytes still buffered. The bits follow the
    /// current bit phase so that they look like MFM 00 bytes rather than an FF gap.
    pub fn flush(&mut self, asm: &mut TrackAssembler) {
        for _ in 0..64 {
            let bit = self.window.count() & 1 == 0;
            self.push_bit(bit, asm);
        }
    }

    /// Resolve fields left open at the end of the stream. An ID field that was cut off is taken
    /// to be the first sector wrapping around and is removed.
    pub fn finish(&mut self, asm: &mut TrackAssembler) {
        if !asm.is_empty() {
            self.check_missing_dam(asm);
        }

        if self.ibyte != -1 {
            log::debug!("BitDecoder::finish(): incomplete sector ID, assuming wraparound");
            asm.pop_mark();
            self.ibyte = -1;
        }
        if self.dbyte != -1 {
            log::warn!("BitDecoder::finish(): incomplete sector data");
            asm.fault(TrackFault::IncompleteSectorField);
            self.dbyte = -1;
        }
        if self.ebyte != -1 {
            log::warn!("BitDecoder::finish(): incomplete extra data");
            asm.fault(TrackFault::IncompleteSectorField);
            self.ebyte = -1;
        }
    }

    fn write(&self, asm: &mut TrackAssembler, byte: u8) {
        // The DMK format doesn't tag DAMs, so noise between an ID field and its DAM must not
        // look like one.
        let byte = if self.awaiting_dam && (0xF8..=0xFD).contains(&byte) {
            0xF0
        }
        else {
            byte
        };
        asm.on_byte(byte, self.cur_encoding, self.field_open());
    }

    fn check_missing_dam(&mut self, asm: &mut TrackAssembler) {
        let fault = if self.awaiting_dam {
            TrackFault::MissingDataAddressMark
        }
        else if self.dbyte > 0 {
            TrackFault::IncompleteSectorField
        }
        else {
            return;
        };

        log::warn!("BitDecoder::check_missing_dam(): {} at {:04X}", fault, asm.cursor());
        self.awaiting_dam = false;
        self.valid_id = false;
        self.ibyte = -1;
        self.dbyte = -1;
        self.ebyte = -1;
        asm.sector_fault(fault, false);
    }

    fn check_fm_marks(&mut self, asm: &TrackAssembler) {
        match self.window.recent(36) {
            FM_IAM_QUIRKY if !self.quirks.contains(DmkQuirks::IAM) => {}
            FM_IAM | FM_IAM_QUIRKY | FM_IDAM | FM_DAM_F8 | FM_DAM_F9 | FM_DAM_FA | FM_DAM_FB | FM_DAM_FD => {
                self.change_encoding(DmkEncoding::Fm);

                let count = self.window.count();
                if (48..64).contains(&count) {
                    // Byte align by repeating bits.
                    self.window.snap(64);
                }
                else if count > 32 && count < 48 {
                    // Byte align by dropping bits.
                    self.window.snap(32);
                }
                self.mark_after = 32;
                self.premark = 0;
            }
            FM_BACKWARD_AM => {
                // Avoid firing on a quirky IAM, and on noise or splices once the track is known
                // to be readable.
                if self.mark_after > 0 || asm.stats().good_sectors > 0 {
                    return;
                }
                self.change_encoding(DmkEncoding::Fm);
                self.backward_am += 1;
                log::debug!("BitDecoder::check_fm_marks(): backward address mark");
            }
            _ => {}
        }
    }

    fn check_mfm_marks(&mut self) {
        let extra = self.quirks.contains(DmkQuirks::EXTRA);
        let count = self.window.count();

        match self.window.recent(32) as u32 {
            MFM_C2C2 => {
                self.change_encoding(DmkEncoding::Mfm);
                self.premark = PREMARK_C2;
                if count > 48 && count < 64 {
                    self.window.snap(64);
                }
                self.mark_after = self.window.count();
            }
            MFM_A1A1_QUIRKY if !self.quirks.contains(DmkQuirks::PREMARK) => {}
            MFM_A1A1 | MFM_A1A1_QUIRKY => {
                self.change_encoding(DmkEncoding::Mfm);
                self.premark = PREMARK_A1;
                if count > 48 && count < 64 {
                    self.window.snap(64);
                }
                self.mark_after = self.window.count();
            }
            MFM_GAP_FFFF
                if !extra
                    && self.cur_encoding == DmkEncoding::Mfm
                    && self.mark_after < 0
                    && self.fields_idle()
                    && count & 1 == 0 =>
            {
                // FF FF in a gap is more likely 00 00 read half a cell off.
                self.window.consume(1);
            }
            MFM_GAP_4E4E if !extra && self.mark_after < 0 && self.fields_idle() => {
                self.change_encoding(DmkEncoding::Mfm);
                if count > 48 && count < 64 {
                    self.window.snap(48);
                }
            }
            _ => {}
        }
    }

    /// Frame a byte from the top of the window. Returns None if an FM bit slip correction left
    /// too few bits.
    fn frame_byte(&mut self) -> Option<u8> {
        match self.cur_encoding {
            DmkEncoding::Fm | DmkEncoding::Mixed => {
                if self.mark_after != 0 && (self.window.shifted(32) & FM_CLOCKS_MASK) != FM_CLOCKS {
                    for i in 1..=3 {
                        if (self.window.shifted(32 - i) & FM_CLOCKS_MASK) == FM_CLOCKS {
                            // Ignore the oldest bits.
                            self.window.consume(i as i32);
                            if self.window.count() < 64 {
                                return None;
                            }
                            break;
                        }
                    }
                }
                let val = self.window.top_fm_byte();
                self.window.snap(32);
                Some(val)
            }
            DmkEncoding::Mfm => {
                let val = self.window.top_mfm_byte(false);
                self.window.snap(48);
                Some(val)
            }
            DmkEncoding::Rx02 => {
                let val = self.window.top_mfm_byte(true);
                self.window.snap(48);
                Some(val)
            }
        }
    }

    /// Dispatch a byte that follows a recognized mark. Returns true if the byte was fully handled
    /// as a mark.
    fn dispatch_mark(&mut self, val: u8, asm: &mut TrackAssembler) -> bool {
        let mfm = self.cur_encoding == DmkEncoding::Mfm;

        match val {
            0xFC => {
                if mfm && self.premark != PREMARK_C2 {
                    return false;
                }
                self.check_missing_dam(asm);
                log::trace!("BitDecoder::dispatch_mark(): IAM ({}) at {:04X}", self.cur_encoding, asm.cursor());
                if asm.on_index_mark(val, self.cur_encoding, self.field_open()) {
                    self.awaiting_dam = false;
                    self.valid_id = false;
                }
                self.ibyte = -1;
                self.dbyte = -1;
                self.ebyte = -1;
                true
            }
            0xFE => {
                if (mfm && self.premark != PREMARK_A1) || asm.awaiting_iam() {
                    return false;
                }
                self.check_missing_dam(asm);
                match asm.on_id_mark(val, self.cur_encoding, self.field_open()) {
                    IdMarkResult::OutOfRange => {}
                    IdMarkResult::Dropped => {
                        self.awaiting_dam = false;
                        self.valid_id = false;
                    }
                    IdMarkResult::Recorded => {
                        self.awaiting_dam = false;
                        self.valid_id = false;
                        self.ibyte = 0;
                    }
                }

                let seed = if mfm && !self.quirks.contains(DmkQuirks::ID_CRC) {
                    CRC_SEED_MFM
                }
                else {
                    CRC_SEED_FM
                };
                self.crc = crc_ibm_3740_byte(seed, val);
                self.dbyte = -1;
                self.ebyte = -1;
                true
            }
            0xF8..=0xFB | 0xFD => {
                if asm.awaiting_start() || !asm.in_range(self.field_open()) {
                    return false;
                }
                if mfm && self.premark != PREMARK_A1 {
                    return false;
                }
                if !self.awaiting_dam {
                    log::warn!("BitDecoder::dispatch_mark(): unexpected DAM {:02X} at {:04X}", val, asm.cursor());
                    asm.fault(TrackFault::UnexpectedDataAddressMark);
                    return false;
                }

                self.awaiting_dam = false;
                self.write(asm, val);

                let rx02_allowed = matches!(self.usr_encoding, DmkEncoding::Mixed | DmkEncoding::Rx02);
                let rx02_known = self.rx02_seen
                    || asm.stats().enc_count[DmkEncoding::Rx02.idx()] > 0
                    || self.usr_encoding == DmkEncoding::Rx02;
                if rx02_allowed && (val == 0xFD || (val == 0xF9 && rx02_known)) {
                    self.change_encoding(DmkEncoding::Rx02);
                }

                let seed = if self.cur_encoding == DmkEncoding::Mfm && !self.quirks.contains(DmkQuirks::DATA_CRC) {
                    CRC_SEED_MFM
                }
                else {
                    CRC_SEED_FM
                };
                self.crc = crc_ibm_3740_byte(seed, val);
                self.ibyte = -1;
                self.field_size = secsize(self.sizecode, self.cur_encoding, MAX_SIZE_CODE_READ, self.quirks);
                self.dbyte = self.field_size as i32 + 2;
                self.ebyte = -1;
                log::trace!(
                    "BitDecoder::dispatch_mark(): DAM {:02X} ({}), {} bytes",
                    val,
                    self.cur_encoding,
                    self.field_size
                );
                true
            }
            0x80 => {
                // A premark read backward.
                if mfm && self.premark == PREMARK_C2 {
                    self.backward_am += 1;
                    log::debug!("BitDecoder::dispatch_mark(): backward address mark");
                }
                false
            }
            _ => {
                // Probably a wraparound or a write splice, so not an error.
                log::debug!(
                    "BitDecoder::dispatch_mark(): dangling premark before {:02X} at {:04X}",
                    val,
                    asm.cursor()
                );
                false
            }
        }
    }

    fn id_byte(&mut self, val: u8, asm: &mut TrackAssembler) {
        match self.ibyte {
            0 => self.curcyl = val,
            3 => self.sizecode = val,
            6 => {
                if self.crc == 0 {
                    log::trace!(
                        "BitDecoder::id_byte(): good ID, cyl {} size code {}",
                        self.curcyl,
                        self.sizecode
                    );
                    self.valid_id = true;
                }
                else {
                    log::warn!("BitDecoder::id_byte(): bad ID CRC at {:04X}", asm.cursor());
                    asm.sector_fault(TrackFault::BadIdCrc, false);
                    self.ibyte = -1;
                }

                self.awaiting_dam = true;
                if asm.check_wraparound() {
                    self.awaiting_dam = false;
                    self.ibyte = -1;
                }
            }
            POST_ID_GAP_END => self.ibyte = -1,
            _ => {}
        }
    }

    fn field_complete(&mut self, asm: &mut TrackAssembler) {
        if self.dbyte == 0 {
            if self.crc == 0 {
                if self.valid_id {
                    if asm.stats().good_sectors == 0 {
                        self.first_encoding = Some(self.cur_encoding);
                    }
                    asm.good_sector(self.cur_encoding);
                    self.cyl_seen = Some(self.curcyl);
                    self.secsize = Some(self.field_size);
                }
            }
            else {
                log::warn!("BitDecoder::field_complete(): bad data CRC at {:04X}", asm.cursor());
                asm.sector_fault(TrackFault::BadDataCrc, true);
            }

            self.dbyte = -1;
            self.valid_id = false;
            self.write_splice = WRITE_SPLICE;
            if self.cur_encoding == DmkEncoding::Rx02 {
                self.change_encoding(DmkEncoding::Fm);
            }
            if self.quirks.contains(DmkQuirks::EXTRA_CRC) {
                self.ebyte = EXTRA_CRC_LEN;
                self.crc = CRC_SEED_FM;
            }
        }

        if self.ebyte == 0 {
            if self.crc != 0 {
                log::warn!("BitDecoder::field_complete(): bad extra CRC at {:04X}", asm.cursor());
                asm.sector_fault(TrackFault::BadExtraCrc, true);
            }
            self.ebyte = -1;
            self.write_splice = WRITE_SPLICE;
        }
    }

    /// Push one raw clock or data bit.
    pub fn push_bit(&mut self, bit: bool, asm: &mut TrackAssembler) {
        if asm.is_full() {
            return;
        }

        self.window.push(bit);
        if self.mark_after >= 0 {
            self.mark_after -= 1;
        }
        if self.write_splice > 0 {
            self.write_splice -= 1;
        }

        if self.usr_encoding != DmkEncoding::Mfm
            && self.window.count() >= 36
            && self.write_splice == 0
            && (self.cur_encoding != DmkEncoding::Mfm || (self.fields_idle() && self.mark_after == -1))
        {
            self.check_fm_marks(asm);
        }

        if self.usr_encoding != DmkEncoding::Fm
            && self.usr_encoding != DmkEncoding::Rx02
            && self.window.count() >= 32
            && self.write_splice == 0
        {
            self.check_mfm_marks();
        }

        self.window.untransform_rx02();

        if self.window.count() < 64 {
            return;
        }

        let val = match self.frame_byte() {
            Some(val) => val,
            None => return,
        };

        if self.mark_after == 0 {
            self.mark_after = -1;
            if self.dispatch_mark(val, asm) {
                return;
            }
        }

        self.id_byte(val, asm);
        self.write(asm, val);

        if self.ibyte >= 0 {
            self.ibyte += 1;
        }
        if self.dbyte > 0 {
            self.dbyte -= 1;
        }
        if self.ebyte > 0 {
            self.ebyte -= 1;
        }
        self.crc = crc_ibm_3740_byte(self.crc, val);

        self.field_complete(asm);

        // Detect a bad MFM clock pattern ahead of time, since it needs 17 bits to see.
        if self.cur_encoding == DmkEncoding::Mfm
            && self.window.count() == 48
            && !mfm_valid_clock(self.window.shifted(32))
            && mfm_valid_clock(self.window.shifted(31))
        {
            self.window.consume(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dmk::DMK_TRACK_HEADER_SIZE, util::crc_ibm_3740};

    fn push_mfm(dec: &mut BitDecoder, asm: &mut TrackAssembler, bytes: &[u8], prev: &mut bool) {
        for byte in bytes {
            for i in (0..8).rev() {
                let bit = (byte >> i) & 1 != 0;
                dec.push_bit(!*prev && !bit, asm);
                dec.push_bit(bit, asm);
                *prev = bit;
            }
        }
    }

    fn push_raw(dec: &mut BitDecoder, asm: &mut TrackAssembler, word: u16, prev: &mut bool) {
        for i in (0..16).rev() {
            dec.push_bit((word >> i) & 1 != 0, asm);
        }
        *prev = word & 1 != 0;
    }

    fn decoder() -> (BitDecoder, TrackAssembler) {
        let opts = DecoderOptions {
            use_hole: false,
            ..Default::default()
        };
        (
            BitDecoder::new(&opts, MediaEncoding::new(72_000_000.0, 4.0)),
            TrackAssembler::new(&opts),
        )
    }

    fn mfm_sector(dec: &mut BitDecoder, asm: &mut TrackAssembler, sector: u8, corrupt: bool) {
        let mut prev = false;
        push_mfm(dec, asm, &[0x4E; 16], &mut prev);
        push_mfm(dec, asm, &[0x00; 12], &mut prev);
        for _ in 0..3 {
            push_raw(dec, asm, 0x4489, &mut prev);
        }
        let id = [0xFE, 1, 0, sector, 1];
        let crc = crc_ibm_3740(&id, Some(CRC_SEED_MFM));
        push_mfm(dec, asm, &id, &mut prev);
        push_mfm(dec, asm, &crc.to_be_bytes(), &mut prev);
        push_mfm(dec, asm, &[0x4E; 22], &mut prev);
        push_mfm(dec, asm, &[0x00; 12], &mut prev);
        for _ in 0..3 {
            push_raw(dec, asm, 0x4489, &mut prev);
        }
        let mut data = vec![0xFB];
        data.extend((0..256).map(|i| (i as u8).wrapping_mul(sector)));
        let mut crc = crc_ibm_3740(&data, Some(CRC_SEED_MFM));
        if corrupt {
            crc ^= 1;
        }
        push_mfm(dec, asm, &data, &mut prev);
        push_mfm(dec, asm, &crc.to_be_bytes(), &mut prev);
        push_mfm(dec, asm, &[0x4E; 24], &mut prev);
    }

    #[test]
    fn test_mfm_sectors() {
        let (mut dec, mut asm) = decoder();
        mfm_sector(&mut dec, &mut asm, 1, false);
        mfm_sector(&mut dec, &mut asm, 2, false);
        dec.flush(&mut asm);
        dec.finish(&mut asm);

        assert_eq!(dec.encoding(), DmkEncoding::Mfm);
        assert_eq!(asm.stats().good_sectors, 2);
        assert_eq!(asm.stats().errcount, 0);
        assert_eq!(asm.idam_ct(), 2);
        assert_eq!(dec.cyl_seen(), Some(1));
        assert_eq!(dec.secsize(), Some(256));

        let track = asm.track();
        let off = track.sector_offset(0).unwrap();
        assert_eq!(off, DMK_TRACK_HEADER_SIZE + 48);
        assert_eq!(&track.buf()[off - 3..off + 5], &[0xA1, 0xA1, 0xA1, 0xFE, 1, 0, 1, 1]);
    }

    #[test]
    fn test_bad_data_crc() {
        let (mut dec, mut asm) = decoder();
        mfm_sector(&mut dec, &mut asm, 1, true);
        mfm_sector(&mut dec, &mut asm, 2, false);
        dec.flush(&mut asm);
        dec.finish(&mut asm);

        assert_eq!(asm.stats().good_sectors, 1);
        assert_eq!(asm.stats().errcount, 1);
        assert_eq!(asm.stats().fault_ct(TrackFault::BadDataCrc), 1);
        assert_ne!(asm.track().mark(0) & crate::dmk::DMK_BAD_FLAG, 0);
        assert_eq!(asm.track().mark(1) & crate::dmk::DMK_BAD_FLAG, 0);
    }

    #[test]
    fn test_missing_dam() {
        let (mut dec, mut asm) = decoder();
        let mut prev = false;
        push_mfm(&mut dec, &mut asm, &[0x00; 12], &mut prev);
        for _ in 0..3 {
            push_raw(&mut dec, &mut asm, 0x4489, &mut prev);
        }
        let id = [0xFE, 0, 0, 1, 2];
        let crc = crc_ibm_3740(&id, Some(CRC_SEED_MFM));
        push_mfm(&mut dec, &mut asm, &id, &mut prev);
        push_mfm(&mut dec, &mut asm, &crc.to_be_bytes(), &mut prev);
        push_mfm(&mut dec, &mut asm, &[0x4E; 60], &mut prev);
        mfm_sector(&mut dec, &mut asm, 2, false);
        dec.flush(&mut asm);
        dec.finish(&mut asm);

        assert_eq!(asm.stats().fault_ct(TrackFault::MissingDataAddressMark), 1);
        assert_eq!(asm.stats().errcount, 1);
        assert_eq!(asm.stats().good_sectors, 1);
    }

    #[test]
    fn test_truncated_data_field() {
        let (mut dec, mut asm) = decoder();
        let mut prev = false;
        push_mfm(&mut dec, &mut asm, &[0x00; 12], &mut prev);
        for _ in 0..3 {
            push_raw(&mut dec, &mut asm, 0x4489, &mut prev);
        }
        let id = [0xFE, 0, 0, 1, 2];
        let crc = crc_ibm_3740(&id, Some(CRC_SEED_MFM));
        push_mfm(&mut dec, &mut asm, &id, &mut prev);
        push_mfm(&mut dec, &mut asm, &crc.to_be_bytes(), &mut prev);
        push_mfm(&mut dec, &mut asm, &[0x4E; 22], &mut prev);
        push_mfm(&mut dec, &mut asm, &[0x00; 12], &mut prev);
        for _ in 0..3 {
            push_raw(&mut dec, &mut asm, 0x4489, &mut prev);
        }
        push_mfm(&mut dec, &mut asm, &[0xFB; 100], &mut prev);
        dec.flush(&mut asm);
        dec.finish(&mut asm);

        assert_eq!(asm.stats().good_sectors, 0);
        assert_eq!(asm.stats().fault_ct(TrackFault::IncompleteSectorField), 1);
        assert_eq!(asm.stats().errcount, 1);
    }
}
