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

    tests/common/mod.rs

    Common support routines for tests
*/
#![allow(dead_code)]

use dmkflux::{
    dmk::{DMK_MFM_FLAG, DMK_TRACK_HEADER_SIZE, EMU_TRACK_LEN_5},
    prelude::*,
    util::crc_ibm_3740,
};

use hex::encode;
use sha1::{Digest, Sha1};

pub const SAMPLE_FREQ: u32 = 72_000_000;
pub const SECTOR_CT: u8 = 9;
pub const SECTOR_SIZE: usize = 512;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn compute_slice_hash(slice: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(slice);
    let result = hasher.finalize();

    encode(result)
}

/// A data pattern unique to each sector.
pub fn sector_pattern(sector: u8) -> Vec<u8> {
    (0..SECTOR_SIZE)
        .map(|i| (sector as usize * 7 + i * 13) as u8)
        .collect()
}

/// Append a CRC protected MFM field, including its three A1 premarks.
fn push_mfm_field(d: &mut Vec<u8>, field: &[u8]) {
    d.extend_from_slice(&[0xA1; 3]);
    let crc = crc_ibm_3740(&[0xA1, 0xA1, 0xA1], None);
    let crc = crc_ibm_3740(field, Some(crc));
    d.extend_from_slice(field);
    d.extend_from_slice(&crc.to_be_bytes());
}

/// Build a well formed MFM track: an index address mark followed by nine 512 byte sectors,
/// padded with gap bytes to the standard 5.25" track length.
pub fn build_mfm_track(cylinder: u8, head: u8) -> DmkTrack {
    let track_len = EMU_TRACK_LEN_5 as usize;
    let mut d = Vec::with_capacity(track_len);
    let mut idams = Vec::new();

    d.extend_from_slice(&[0x4E; 80]);
    d.extend_from_slice(&[0x00; 12]);
    d.extend_from_slice(&[0xC2, 0xC2, 0xC2, 0xFC]);
    d.extend_from_slice(&[0x4E; 50]);

    for s in 1..=SECTOR_CT {
        d.extend_from_slice(&[0x00; 12]);
        idams.push((DMK_TRACK_HEADER_SIZE + d.len() + 3) as u16 | DMK_MFM_FLAG);
        push_mfm_field(&mut d, &[0xFE, cylinder, head, s, 2]);

        d.extend_from_slice(&[0x4E; 22]);
        d.extend_from_slice(&[0x00; 12]);
        let mut data = vec![0xFB];
        data.extend(sector_pattern(s));
        push_mfm_field(&mut d, &data);
        d.extend_from_slice(&[0x4E; 40]);
    }
    finish_track(d, idams, track_len, 0x4E)
}

pub const FM_SECTOR_CT: u8 = 5;
pub const FM_SECTOR_SIZE: usize = 256;
pub const RX02_SECTOR_CT: u8 = 4;
pub const RX02_SECTOR_SIZE: usize = 512;
/// FM bytes from an ID address mark to its data address mark.
pub const FM_DAM_DISTANCE: usize = 7 + 11 + 6;

/// Append FM bytes, each stored `times` times as in a DMK image.
fn push_fm(d: &mut Vec<u8>, bytes: &[u8], times: usize) {
    for b in bytes {
        for _ in 0..times {
            d.push(*b);
        }
    }
}

/// Append FM bytes followed by their CRC.
fn push_fm_field(d: &mut Vec<u8>, field: &[u8], times: usize) {
    let crc = crc_ibm_3740(field, None);
    push_fm(d, field, times);
    push_fm(d, &crc.to_be_bytes(), times);
}

fn fm_id_field(d: &mut Vec<u8>, idams: &mut Vec<u16>, id: &[u8], times: usize) {
    push_fm(d, &[0x00; 6], times);
    idams.push((DMK_TRACK_HEADER_SIZE + d.len()) as u16);
    push_fm_field(d, id, times);
    push_fm(d, &[0xFF; 11], times);
    push_fm(d, &[0x00; 6], times);
}

fn finish_track(mut d: Vec<u8>, idams: Vec<u16>, track_len: usize, fill: u8) -> DmkTrack {
    d.resize(track_len - DMK_TRACK_HEADER_SIZE, fill);

    let mut track = DmkTrack::new(track_len);
    track.buf_mut()[DMK_TRACK_HEADER_SIZE..].copy_from_slice(&d);
    track.set_len(track_len);
    for (i, idam) in idams.into_iter().enumerate() {
        track.set_mark(i, idam);
    }
    track
}

/// Build an FM track of five 256 byte sectors with no index address mark. Each FM byte is
/// stored `times` times.
pub fn build_fm_track(cylinder: u8, times: usize) -> DmkTrack {
    let mut d = Vec::new();
    let mut idams = Vec::new();

    push_fm(&mut d, &[0xFF; 40], times);
    for s in 1..=FM_SECTOR_CT {
        fm_id_field(&mut d, &mut idams, &[0xFE, cylinder, 0, s, 1], times);

        let mut data = vec![0xFB];
        data.extend_from_slice(&sector_pattern(s)[..FM_SECTOR_SIZE]);
        push_fm_field(&mut d, &data, times);
        push_fm(&mut d, &[0xFF; 27], times);
    }
    finish_track(d, idams, DMK_TRACK_HEADER_SIZE + 3000 * times, 0xFF)
}

/// Build an RX02 track: doubled FM ID fields and data address marks, with 512 byte data fields
/// in modified MFM stored once, each followed by an FF byte.
pub fn build_rx02_track(cylinder: u8) -> DmkTrack {
    let mut d = Vec::new();
    let mut idams = Vec::new();

    push_fm(&mut d, &[0xFF; 40], 2);
    for s in 1..=RX02_SECTOR_CT {
        fm_id_field(&mut d, &mut idams, &[0xFE, cylinder, 0, s, 1], 2);

        let mut data = vec![0xFD];
        data.extend(sector_pattern(s));
        let crc = crc_ibm_3740(&data, None);
        push_fm(&mut d, &[0xFD], 2);
        d.extend_from_slice(&data[1..]);
        d.extend_from_slice(&crc.to_be_bytes());
        d.push(0xFF);
        push_fm(&mut d, &[0xFF; 27], 2);
    }
    finish_track(d, idams, DMK_TRACK_HEADER_SIZE + 6000, 0xFF)
}

/// The encoder options used to write test tracks: a 4µs FM bit cell at 72MHz.
pub fn encoder_options() -> EncoderOptions {
    EncoderOptions::new(SAMPLE_FREQ, DriveKind::Dd)
}

pub fn media() -> MediaEncoding {
    MediaEncoding::for_drive(DriveKind::Dd, SAMPLE_FREQ)
}

/// Encode a track and wrap the pulses in a read stream as a device would return it, with an
/// index hole before the first pulse of the track.
pub fn read_stream(pulses: impl IntoIterator<Item = u32>) -> Vec<u8> {
    let mut stream = FluxStreamEncoder::new(GwStreamParams::new(SAMPLE_FREQ));
    stream.push(288).unwrap();
    stream.push_index(0).unwrap();
    stream.extend(pulses).unwrap();
    stream.finish().unwrap()
}

pub fn encode_read_stream(track: &DmkTrack) -> Vec<u8> {
    let encoder = FluxEncoder::new(encoder_options()).unwrap();
    read_stream(encoder.encode(track).unwrap().into_iter().filter(|t| *t > 0))
}

/// Decoder options for a read that starts at the index hole.
pub fn decoder_options() -> DecoderOptions {
    DecoderOptions::default()
}
