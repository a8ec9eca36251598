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

    tests/disk_io.rs

    Read and write whole disks through a simulated drive.
*/

mod common;

use std::collections::HashMap;

use common::*;
use dmkflux::{
    dmk::{track::mark_offset, EMU_TRACK_LEN_5},
    prelude::*,
    reader::RestartReason,
    Result,
};

/// A drive holding the flux pulses of each track. Weak tracks return a different set of pulses
/// on each successive read.
#[derive(Default)]
struct SimDrive {
    cyl: u8,
    head: u8,
    motor: bool,
    tracks: HashMap<(u8, u8), Vec<u32>>,
    weak: HashMap<(u8, u8), Vec<Vec<u32>>>,
    reads: HashMap<(u8, u8), usize>,
    writes: usize,
}

impl SimDrive {
    fn load(&mut self, cyl: u8, head: u8, track: &DmkTrack) {
        self.tracks.insert((cyl, head), encode_pulses(track));
    }

    fn load_weak(&mut self, cyl: u8, head: u8, reads: &[DmkTrack]) {
        self.weak
            .insert((cyl, head), reads.iter().map(encode_pulses).collect());
    }

    fn reads(&self, cyl: u8, head: u8) -> usize {
        self.reads.get(&(cyl, head)).copied().unwrap_or(0)
    }
}

impl DriveControl for SimDrive {
    fn sample_freq(&self) -> u32 {
        SAMPLE_FREQ
    }

    fn seek(&mut self, cyl: u8) -> Result<()> {
        self.cyl = cyl;
        Ok(())
    }

    fn head(&mut self, head: u8) -> Result<()> {
        self.head = head;
        Ok(())
    }

    fn motor(&mut self, on: bool) -> Result<()> {
        self.motor = on;
        Ok(())
    }

    fn read_flux(&mut self, _revs: u16, _ticks: u32) -> Result<Vec<u8>> {
        assert!(self.motor);
        let key = (self.cyl, self.head);
        let n = self.reads(key.0, key.1);
        self.reads.insert(key, n + 1);

        if let Some(weak) = self.weak.get(&key) {
            return Ok(read_stream(weak[n % weak.len()].iter().copied()));
        }
        match self.tracks.get(&key) {
            Some(pulses) => Ok(read_stream(pulses.iter().copied())),
            // Unformatted: a steady run of transitions with no marks.
            None => Ok(read_stream((0..2000).flat_map(|_| [288, 432, 576]))),
        }
    }

    fn write_flux(&mut self, stream: &[u8], _cue: bool, _terminate: bool) -> Result<usize> {
        assert!(self.motor);
        let pulses = FluxStreamDecoder::new()
            .decode_all(stream)?
            .into_iter()
            .filter_map(|e| match e {
                FluxEvent::Pulse(t) => Some(t),
                _ => None,
            })
            .collect();
        self.tracks.insert((self.cyl, self.head), pulses);
        self.writes += 1;
        Ok(stream.len())
    }
}

fn encode_pulses(track: &DmkTrack) -> Vec<u32> {
    let encoder = FluxEncoder::new(encoder_options()).unwrap();
    encoder.encode(track).unwrap().into_iter().filter(|t| *t > 0).collect()
}

/// A copy of a track with one byte of the data of sector `idx` changed.
fn corrupt(track: &DmkTrack, idx: usize) -> DmkTrack {
    let mut track = track.clone();
    let off = mark_offset(track.mark(idx)) + 200;
    track.buf_mut()[off] ^= 0x80;
    track
}

fn assert_track_matches(read: &DmkTrack, original: &DmkTrack) {
    assert_eq!(&read.data()[..original.data_len()], original.data());
    assert_eq!(read.marks().collect::<Vec<_>>(), original.marks().collect::<Vec<_>>());
}

#[test]
fn test_read_disk_with_retries() {
    init();
    let mut drive = SimDrive::default();
    for c in 0..4 {
        for h in 0..2 {
            drive.load(c, h, &build_mfm_track(c, h));
        }
    }
    // Each read of cylinder 2 head 0 damages a different sector.
    let weak = build_mfm_track(2, 0);
    drive.load_weak(2, 0, &[corrupt(&weak, 2), corrupt(&weak, 5)]);
    // Cylinder 3 head 1 always fails in the same sector.
    let bad = build_mfm_track(3, 1);
    drive.load_weak(3, 1, &[corrupt(&bad, 8)]);

    let mut reader = DiskReader::new(
        drive,
        ReadPolicy::fixed(4, 2, 1).with_retries(2),
        DecoderOptions::default(),
        media(),
    );
    let image = reader.read_disk().unwrap();

    assert_eq!(image.track_ct(), 4);
    assert_eq!(image.header.sides(), 2);

    let stats = reader.stats().clone();
    assert_eq!(stats.retries_total, 3);
    assert_eq!(stats.errcount_total, 1);
    assert_eq!(stats.err_tracks, 1);
    assert_eq!(stats.good_tracks, 7);
    assert_eq!(stats.good_sectors_total, 8 * SECTOR_CT as u32 - 1);
    assert_eq!(stats.enc_count_total[DmkEncoding::Mfm.idx()], 8 * SECTOR_CT as u32 - 1);

    // The weak track was repaired from its two reads.
    assert_track_matches(image.track(2, 0).unwrap(), &weak);
    assert_track_matches(image.track(0, 1).unwrap(), &build_mfm_track(0, 1));

    let drive = reader.into_inner();
    assert!(!drive.motor);
    assert_eq!(drive.reads(2, 0), 2);
    assert_eq!(drive.reads(3, 1), 3);
    assert_eq!(drive.reads(1, 1), 1);
}

#[test]
fn test_read_disk_guesses_geometry() {
    init();
    let mut drive = SimDrive::default();
    for c in 0..35 {
        drive.load(c, 0, &build_mfm_track(c, 0));
    }

    let mut reader = DiskReader::new(drive, ReadPolicy::default(), DecoderOptions::default(), media());
    let image = reader.read_disk().unwrap();

    // The second side is empty and there are no sectors past track 34.
    assert_eq!(image.header.tracks, 35);
    assert_eq!(image.header.sides(), 1);
    assert_eq!(reader.controller().policy().sides, 1);
    assert_eq!(reader.controller().policy().steps, 1);
    assert_eq!(reader.stats().good_sectors_total, 35 * SECTOR_CT as u32);
    assert_eq!(reader.stats().good_tracks, 35);
    assert_eq!(reader.stats().errcount_total, 0);
    assert_track_matches(image.track(34, 0).unwrap(), &build_mfm_track(34, 0));
}

#[test]
fn test_restart_reason_rereads() {
    assert!(RestartReason::DoubleStep.rereads());
    assert!(!RestartReason::SingleSided.rereads());
}

#[test]
fn test_write_then_read_back() {
    init();
    let mut image = DmkImage::new(DmkHeader::new(3, EMU_TRACK_LEN_5));
    for t in 0..3 {
        for s in 0..2 {
            image.set_track(t as usize, s as usize, build_mfm_track(t, s)).unwrap();
        }
    }

    let mut writer = DiskWriter::new(SimDrive::default(), encoder_options(), WritePolicy::default()).unwrap();
    assert_eq!(writer.write_disk(&image).unwrap(), 3);
    let drive = writer.into_inner();
    assert_eq!(drive.writes, 6);
    assert!(!drive.motor);

    let mut reader = DiskReader::new(drive, ReadPolicy::fixed(3, 2, 1), DecoderOptions::default(), media());
    let read = reader.read_disk().unwrap();

    assert_eq!(reader.stats().errcount_total, 0);
    assert_eq!(reader.stats().retries_total, 0);
    for t in 0..3 {
        for s in 0..2 {
            assert_track_matches(read.track(t, s).unwrap(), image.track(t, s).unwrap());
        }
    }
}

#[test]
fn test_cancelled_read() {
    init();
    let mut drive = SimDrive::default();
    drive.load(0, 0, &build_mfm_track(0, 0));

    let mut reader = DiskReader::new(drive, ReadPolicy::fixed(10, 1, 1), DecoderOptions::default(), media());
    reader.cancel_flag().store(true, std::sync::atomic::Ordering::Relaxed);

    let image = reader.read_disk().unwrap();
    assert_eq!(image.header.tracks, 0);
    assert!(!reader.into_inner().motor);
}
