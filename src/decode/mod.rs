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

    src/decode/mod.rs

    Decoding of flux streams into DMK tracks.

    A ReadAttempt decodes one read of a track. Flux stream events are fed to
    a BitDecoder, which frames bytes and hands them to a TrackAssembler.
*/

pub mod assembler;
pub mod bit_decoder;
pub mod bit_window;
pub mod media;

use std::{
    ops::ControlFlow,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    decode::{assembler::TrackAssembler, bit_decoder::BitDecoder, media::MediaEncoding},
    dmk::{track::DmkTrack, READ_TRACK_LEN_MAX},
    gw::flux_stream::{FluxEvent, FluxStreamDecoder},
    types::{DmkEncoding, DmkQuirks, TrackStats},
    Result,
};

/// Options controlling the decoding of a single track read.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecoderOptions {
    /// The encoding to decode. `Mixed` detects FM and MFM marks as they appear.
    pub encoding: DmkEncoding,
    pub quirks: DmkQuirks,
    /// Start the track at the index hole and stop at the third index edge.
    pub use_hole: bool,
    /// Position the first index address mark this many bytes after the start of the track.
    pub iam_pos: Option<usize>,
    /// A positive count skips that many bytes at the start of the read; a negative count inserts
    /// that many fill bytes at the index hole.
    pub ignore: i32,
    /// The size of the track buffer, including the sector mark table.
    pub capacity: usize,
    /// Store FM bytes once instead of twice.
    pub single_density: bool,
    /// Flag bad sectors in the mark table and record sector encodings, so reads can be merged.
    pub accum_sectors: bool,
    /// RX02 sectors have already been seen on the disk.
    pub rx02_seen: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        DecoderOptions {
            encoding: DmkEncoding::Mixed,
            quirks: DmkQuirks::empty(),
            use_hole: true,
            iam_pos: None,
            ignore: 0,
            capacity: READ_TRACK_LEN_MAX as usize,
            single_density: false,
            accum_sectors: true,
            rx02_seen: false,
        }
    }
}

/// The result of a single track read.
#[derive(Clone, Debug)]
pub struct AttemptOutcome {
    pub track: DmkTrack,
    pub stats: TrackStats,
    /// Address marks that appeared to be read backward.
    pub backward_am: u32,
    /// The cylinder number of the last good sector.
    pub cyl_seen: Option<u8>,
    /// The data length of the last good sector.
    pub secsize: Option<usize>,
    /// The encoding of the first good sector.
    pub first_encoding: Option<DmkEncoding>,
    /// The mean period between index holes, in sample clock ticks.
    pub index_period: Option<f64>,
    /// The read was stopped by the cancellation flag.
    pub cancelled: bool,
}

impl AttemptOutcome {
    /// The measured rotational speed of the drive, if at least two index holes were seen.
    pub fn rpm(&self, sample_freq: u32) -> Option<f64> {
        self.index_period
            .filter(|p| *p > 0.0)
            .map(|p| 60.0 * sample_freq as f64 / p)
    }
}

/// Decodes one read of a track from flux stream events.
pub struct ReadAttempt {
    stream: FluxStreamDecoder,
    decoder: BitDecoder,
    assembler: TrackAssembler,
    cancel: Option<Arc<AtomicBool>>,
    cancelled: bool,
    carry: Vec<u8>,
    first_index: Option<u32>,
    last_index: Option<u32>,
    revs: u32,
}

impl ReadAttempt {
    pub fn new(opts: &DecoderOptions, media: MediaEncoding) -> Self {
        ReadAttempt {
            stream: FluxStreamDecoder::new(),
            decoder: BitDecoder::new(opts, media),
            assembler: TrackAssembler::new(opts),
            cancel: None,
            cancelled: false,
            carry: Vec::new(),
            first_index: None,
            last_index: None,
            revs: 0,
        }
    }

    /// Stop decoding when `flag` is set. The flag is checked once per pulse.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Returns true once no more input is needed: the track is full, the read was cancelled,
    /// or the stream terminator was seen.
    pub fn is_done(&self) -> bool {
        self.assembler.is_full() || self.cancelled || self.stream.terminated()
    }

    pub fn assembler(&self) -> &TrackAssembler {
        &self.assembler
    }

    /// Feed a flux pulse interval in sample clock ticks.
    pub fn feed_pulse(&mut self, ticks: u32) -> ControlFlow<()> {
        if let Some(cancel) = &self.cancel {
            if cancel.load(Ordering::Relaxed) {
                if !self.cancelled {
                    log::debug!("ReadAttempt::feed_pulse(): read cancelled");
                }
                self.cancelled = true;
                return ControlFlow::Break(());
            }
        }

        if self.assembler.blocked() {
            return ControlFlow::Continue(());
        }

        self.decoder.feed(ticks, &mut self.assembler);

        if self.assembler.is_full() {
            ControlFlow::Break(())
        }
        else {
            ControlFlow::Continue(())
        }
    }

    /// Feed an index hole at an absolute stream position in ticks.
    pub fn feed_index(&mut self, ticks: u32) {
        if self.first_index.is_none() {
            self.first_index = Some(ticks);
        }
        else {
            self.revs += 1;
        }
        self.last_index = Some(ticks);
        self.assembler.on_index();
    }

    pub fn feed_event(&mut self, event: FluxEvent) -> ControlFlow<()> {
        match event {
            FluxEvent::Pulse(ticks) => self.feed_pulse(ticks),
            FluxEvent::Index(ticks) => {
                self.feed_index(ticks);
                ControlFlow::Continue(())
            }
            FluxEvent::Space(_) | FluxEvent::Astable(_) => ControlFlow::Continue(()),
        }
    }

    /// Feed raw flux stream bytes. A multibyte sequence split across calls is held until the
    /// rest of it arrives. Returns true once no more input is needed.
    pub fn feed_stream(&mut self, bytes: &[u8]) -> Result<bool> {
        if self.is_done() {
            return Ok(true);
        }

        let mut input = std::mem::take(&mut self.carry);
        input.extend_from_slice(bytes);

        let mut stream = std::mem::take(&mut self.stream);
        let consumed = stream.decode(&input, |e| self.feed_event(e));
        self.stream = stream;
        let consumed = consumed?;

        if !self.is_done() {
            self.carry = input.split_off(consumed);
        }
        Ok(self.is_done())
    }

    /// Flush the decoder and resolve the track.
    pub fn finish(mut self) -> AttemptOutcome {
        self.decoder.flush(&mut self.assembler);
        self.decoder.finish(&mut self.assembler);

        let index_period = match (self.first_index, self.last_index) {
            (Some(first), Some(last)) if self.revs > 0 => Some(last.wrapping_sub(first) as f64 / self.revs as f64),
            _ => None,
        };

        let (track, stats) = self.assembler.finish();

        log::debug!(
            "ReadAttempt::finish(): {} sectors, {} good, {} errors, length {:04X}{}",
            track.mark_ct(),
            stats.good_sectors,
            stats.errcount,
            track.len(),
            if stats.wraparound { ", wraparound" } else { "" }
        );

        AttemptOutcome {
            track,
            stats,
            backward_am: self.decoder.backward_am(),
            cyl_seen: self.decoder.cyl_seen(),
            secsize: self.decoder.secsize(),
            first_encoding: self.decoder.first_encoding(),
            index_period,
            cancelled: self.cancelled,
        }
    }
}

/// Decode a complete flux stream read as a single attempt.
pub fn decode_stream(stream: &[u8], opts: &DecoderOptions, media: MediaEncoding) -> Result<AttemptOutcome> {
    let mut attempt = ReadAttempt::new(opts, media);
    attempt.feed_stream(stream)?;
    Ok(attempt.finish())
}
