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

    src/encode/mod.rs

    Encoding of DMK tracks into flux pulse intervals for writing.

    Encoding is done in three passes over a track. Bytes are classified by
    how they are to be written, the classified bytes are written out as raw
    FM, MFM or RX02 bit cells, and the bit cells are timed into flux
    intervals with write precompensation.
*/

pub mod bit_timing;
pub mod cells;
pub mod classify;
pub mod rx02;

use bit_vec::BitVec;

use crate::{
    dmk::{header::DmkHeader, track::DmkTrack, DMK_TRACK_HEADER_SIZE},
    encode::{
        bit_timing::BitTimer,
        cells::CellWriter,
        classify::{classify, ByteClass},
        rx02::Rx02Encoder,
    },
    gw::flux_stream::{FluxStreamEncoder, GwStreamParams},
    types::{DmkQuirks, DriveKind},
    DmkFluxError,
    Result,
};

/// The default write precompensation, in nanoseconds.
pub const DEFAULT_PRECOMP_NS: f64 = 140.0;
/// The largest flux stream built for a single track write.
pub const WRITE_BUFFER_LIMIT: usize = 500_000;
/// Bytes after the data CRC when the image has the EXTRA or EXTRA_CRC quirk.
pub const EXTRA_BYTES: usize = 6;
pub const DEFAULT_FILL_LEN: usize = 64;

/// What to write after the end of the track data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FillMode {
    /// Gap bytes in the encoding of the last byte written: 4E in MFM, FF in FM.
    #[default]
    Standard,
    /// No transitions.
    Erase,
    /// Very long transitions, one per byte time.
    LongTransitions,
    /// Stop writing, leaving the old data in place.
    Leave,
    FmByte(u8),
    MfmByte(u8),
}

/// Options controlling the encoding of tracks.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderOptions {
    /// Sample clock of the flux stream, in Hz.
    pub sample_freq: u32,
    /// Ticks per raw bit cell: half an FM bit cell.
    pub ticks_per_cell: f64,
    pub precomp_ns: f64,
    pub dither: bool,
    pub fill: FillMode,
    /// Fill length in bytes.
    pub fill_len: usize,
    /// Start writing so the index address mark lands this many bytes after the index hole.
    pub iam_pos: Option<usize>,
    /// Bytes following each data CRC.
    pub extra_bytes: usize,
    /// The image contains RX02 sectors.
    pub rx02: bool,
    /// The number of times each FM byte is stored.
    pub fm_times: usize,
    pub quirks: DmkQuirks,
    /// Limit the track data written to this many bytes after the mark table.
    pub data_len: Option<usize>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions::new(72_000_000, DriveKind::Dd)
    }
}

impl EncoderOptions {
    /// Create options for a sample clock and drive kind, with the drive's nominal bit cell.
    pub fn new(sample_freq: u32, kind: DriveKind) -> Self {
        EncoderOptions {
            sample_freq,
            ticks_per_cell: kind.fm_bitcell_us() / 2.0 * sample_freq as f64 / 1e6,
            precomp_ns: DEFAULT_PRECOMP_NS,
            dither: false,
            fill: FillMode::Standard,
            fill_len: DEFAULT_FILL_LEN,
            iam_pos: None,
            extra_bytes: 0,
            rx02: false,
            fm_times: 2,
            quirks: DmkQuirks::empty(),
            data_len: None,
        }
    }

    /// Create options for writing the tracks of an image with the given header.
    pub fn for_image(header: &DmkHeader, sample_freq: u32, kind: DriveKind) -> Self {
        let extra = header.quirks.intersects(DmkQuirks::EXTRA_CRC | DmkQuirks::EXTRA);
        EncoderOptions {
            extra_bytes: if extra { EXTRA_BYTES } else { 0 },
            rx02: header.options.contains(crate::types::DmkOptions::RX02),
            fm_times: header.fm_times(),
            quirks: header.quirks,
            ..EncoderOptions::new(sample_freq, kind)
        }
    }

    pub fn with_precomp(mut self, precomp_ns: f64) -> Self {
        self.precomp_ns = precomp_ns;
        self
    }

    pub fn with_fill(mut self, fill: FillMode, fill_len: usize) -> Self {
        self.fill = fill;
        self.fill_len = fill_len;
        self
    }

    /// The end of the part of `track` to be written.
    pub fn track_end(&self, track: &DmkTrack) -> usize {
        match self.data_len {
            Some(len) if DMK_TRACK_HEADER_SIZE + len < track.len() => DMK_TRACK_HEADER_SIZE + len,
            _ => track.len(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sample_freq == 0 {
            return Err(DmkFluxError::ParameterError("sample frequency of 0".to_string()));
        }
        if !(self.ticks_per_cell.is_finite() && self.ticks_per_cell >= 1.0) {
            return Err(DmkFluxError::UnsupportedEncoding(format!(
                "bit cell of {} ticks",
                self.ticks_per_cell
            )));
        }
        if !matches!(self.fm_times, 1 | 2) {
            return Err(DmkFluxError::UnsupportedEncoding(format!(
                "FM bytes stored {} times",
                self.fm_times
            )));
        }
        if !(self.precomp_ns.is_finite() && self.precomp_ns >= 0.0) {
            return Err(DmkFluxError::ParameterError(format!(
                "precompensation of {}ns",
                self.precomp_ns
            )));
        }
        Ok(())
    }
}

/// Encodes DMK tracks into flux pulse intervals.
#[derive(Clone, Debug)]
pub struct FluxEncoder {
    opts: EncoderOptions,
}

impl FluxEncoder {
    pub fn new(opts: EncoderOptions) -> Result<Self> {
        opts.validate()?;
        Ok(FluxEncoder { opts })
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.opts
    }

    /// Set the write precompensation, as it varies from track to track.
    pub fn set_precomp(&mut self, precomp_ns: f64) {
        self.opts.precomp_ns = precomp_ns.max(0.0);
    }

    /// Encode a track into raw bit cells.
    pub fn encode_cells(&self, track: &DmkTrack) -> Result<BitVec> {
        let ct = classify(track, &self.opts);
        let end = ct.len();

        let mut ignore = 0isize;
        if let Some(pos) = self.opts.iam_pos {
            match ct.iam {
                Some(iam) => ignore = iam as isize - DMK_TRACK_HEADER_SIZE as isize - pos as isize,
                None => log::warn!("FluxEncoder::encode_cells(): no index address mark on track"),
            }
        }

        let mut w = CellWriter::new();
        let mut rx02 = Rx02Encoder::new();
        let mut class = ct.class(DMK_TRACK_HEADER_SIZE);
        let mut prev_class = ByteClass::Skip;

        for p in (DMK_TRACK_HEADER_SIZE as isize + ignore)..end as isize {
            let byte = if p >= DMK_TRACK_HEADER_SIZE as isize {
                class = ct.class(p as usize);
                ct.bytes[p as usize]
            }
            else if class.is_mfm() {
                0x4E
            }
            else {
                0xFF
            };

            if class != ByteClass::Skip && class != prev_class {
                log::trace!("FluxEncoder::encode_cells(): <{}> at {:04X}", class.letter(), p);
                prev_class = class;
            }

            match class {
                ByteClass::Skip => {}
                ByteClass::Fm => w.fm_byte(byte, 0xFF),
                ByteClass::FmIam => w.fm_byte(byte, 0xD7),
                ByteClass::FmAm => w.fm_byte(byte, 0xC7),
                ByteClass::Mfm => w.mfm_byte(byte, None),
                ByteClass::MfmIam => w.mfm_byte(byte, Some(4)),
                ByteClass::MfmAm => w.mfm_byte(byte, Some(5)),
                ByteClass::Rx02 => {
                    if p <= DMK_TRACK_HEADER_SIZE as isize || ct.class(p as usize - 1) != ByteClass::Rx02 {
                        rx02.reset();
                    }
                    rx02.push_byte(byte, &mut w);
                    let next = if p + 1 >= DMK_TRACK_HEADER_SIZE as isize {
                        ct.class((p + 1) as usize)
                    }
                    else {
                        class
                    };
                    if next != ByteClass::Rx02 {
                        rx02.flush(&mut w);
                    }
                }
            }
        }
        rx02.flush(&mut w);

        self.fill(class, &mut w);
        Ok(w.into_cells())
    }

    fn fill(&self, last: ByteClass, w: &mut CellWriter) {
        let n = self.opts.fill_len;
        match self.opts.fill {
            FillMode::Standard if last.is_mfm() => (0..n).for_each(|_| w.mfm_byte(0x4E, None)),
            FillMode::Standard => (0..n).for_each(|_| w.fm_byte(0xFF, 0xFF)),
            FillMode::Erase => {
                if n > 0 {
                    w.zeros(n * 16);
                    w.push(true);
                }
            }
            FillMode::LongTransitions => {
                for _ in 0..n {
                    w.push(true);
                    w.zeros(15);
                }
                if n > 0 {
                    w.push(true);
                }
            }
            FillMode::Leave => {}
            FillMode::FmByte(b) => (0..n).for_each(|_| w.fm_byte(b, 0xFF)),
            FillMode::MfmByte(b) => (0..n).for_each(|_| w.mfm_byte(b, None)),
        }
    }

    /// Encode a track into flux intervals in sample clock ticks.
    pub fn encode(&self, track: &DmkTrack) -> Result<Vec<u32>> {
        let cells = self.encode_cells(track)?;
        let mut timer = BitTimer::new(self.opts.sample_freq, self.opts.ticks_per_cell, self.opts.precomp_ns)
            .with_dither(self.opts.dither);
        let pulses = timer.time_cells(&cells);

        log::debug!(
            "FluxEncoder::encode(): {} bit cells, {} pulses, precomp {:.0}ns",
            cells.len(),
            pulses.len(),
            self.opts.precomp_ns
        );
        Ok(pulses)
    }

    /// Encode a track into a flux stream ready for a write command.
    pub fn encode_stream(&self, track: &DmkTrack, params: &GwStreamParams) -> Result<Vec<u8>> {
        let pulses = self.encode(track)?;
        let mut stream = FluxStreamEncoder::new(*params).with_limit(WRITE_BUFFER_LIMIT);
        stream.extend(pulses.into_iter().filter(|t| *t > 0))?;
        stream.finish()
    }
}
