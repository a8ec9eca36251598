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

    tests/dmk_file.rs

    Tests for reading and writing DMK files.
*/

mod common;

use std::io::Cursor;

use common::*;
use dmkflux::{
    decode::decode_stream,
    dmk::{DMK_BAD_FLAG, DMK_HEADER_SIZE, DMK_TRACK_HEADER_SIZE, EMU_TRACK_LEN_5},
    prelude::*,
};

fn build_image(tracks: u8) -> DmkImage {
    let mut header = DmkHeader::new(tracks, EMU_TRACK_LEN_5);
    header.quirks = DmkQuirks::empty();
    let mut image = DmkImage::new(header);
    for t in 0..tracks {
        for s in 0..2 {
            image.set_track(t as usize, s as usize, build_mfm_track(t, s)).unwrap();
        }
    }
    image
}

#[test]
fn test_file_layout() {
    init();
    let image = build_image(2);
    let mut cursor = Cursor::new(Vec::new());
    image.write(&mut cursor).unwrap();
    let buf = cursor.into_inner();

    let track_len = EMU_TRACK_LEN_5 as usize;
    assert_eq!(buf.len(), DMK_HEADER_SIZE + 4 * track_len);
    assert_eq!(buf[0], 0);
    assert_eq!(buf[1], 2);
    assert_eq!(u16::from_le_bytes([buf[2], buf[3]]), EMU_TRACK_LEN_5);
    assert_eq!(buf[4], 0);

    // Track 1 side 0 is the third record.
    let rec = &buf[DMK_HEADER_SIZE + 2 * track_len..DMK_HEADER_SIZE + 3 * track_len];
    let expected = build_mfm_track(1, 0);
    assert_eq!(compute_slice_hash(rec), compute_slice_hash(expected.as_bytes()));
}

#[test]
fn test_file_round_trip() {
    init();
    let image = build_image(3);
    let mut cursor = Cursor::new(Vec::new());
    image.write(&mut cursor).unwrap();

    let read = DmkImage::read(&mut cursor).unwrap();
    assert_eq!(read.header, image.header);
    assert_eq!(read.track_ct(), 3);
    for t in 0..3 {
        for s in 0..2 {
            let a = image.track(t, s).unwrap();
            let b = read.track(t, s).unwrap();
            assert_eq!(a.as_bytes(), b.as_bytes(), "track {} side {} differs", t, s);
        }
    }
}

#[test]
fn test_single_sided_file() {
    init();
    let mut image = build_image(2);
    image.set_single_sided(true);

    let mut cursor = Cursor::new(Vec::new());
    image.write(&mut cursor).unwrap();
    assert_eq!(
        cursor.get_ref().len(),
        DMK_HEADER_SIZE + 2 * EMU_TRACK_LEN_5 as usize
    );

    let read = DmkImage::read(&mut cursor).unwrap();
    assert_eq!(read.header.sides(), 1);
    assert_eq!(read.track(1, 0).unwrap().as_bytes(), image.track(1, 0).unwrap().as_bytes());
    assert_eq!(read.track(1, 1).unwrap().mark_ct(), 0);
}

#[test]
fn test_decoded_track_saved() {
    init();
    // A read track carries bad sector flags, which must not reach the file.
    let mut original = build_mfm_track(0, 0);
    let off = dmkflux::dmk::track::mark_offset(original.mark(2)) + 64;
    original.buf_mut()[off] ^= 0x01;

    let outcome = decode_stream(&encode_read_stream(&original), &decoder_options(), media()).unwrap();
    assert_eq!(outcome.stats.errcount, 1);
    assert_ne!(outcome.track.mark(2) & DMK_BAD_FLAG, 0);

    let mut image = DmkImage::new(DmkHeader::new(1, EMU_TRACK_LEN_5));
    image.set_track(0, 0, outcome.track).unwrap();
    let track_len = image.optimal_track_len();
    assert!(track_len as usize >= EMU_TRACK_LEN_5 as usize);
    image.header.track_len = track_len;

    let mut cursor = Cursor::new(Vec::new());
    image.write(&mut cursor).unwrap();
    let read = DmkImage::read(&mut cursor).unwrap();

    let track = read.track(0, 0).unwrap();
    assert_eq!(track.mark_ct(), SECTOR_CT as usize);
    assert!(track.marks().all(|m| m & DMK_BAD_FLAG == 0));
    assert_eq!(
        &track.data()[..original.data_len()],
        original.data(),
    );
    assert!(track.len() > DMK_TRACK_HEADER_SIZE);
}
