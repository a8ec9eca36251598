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

    tests/merge.rs

    Merge decoded reads of a track.
*/

mod common;

use common::*;
use dmkflux::{
    decode::{decode_stream, AttemptOutcome},
    dmk::track::{mark_is_bad, mark_offset},
    prelude::*,
};

fn read(track: &DmkTrack) -> AttemptOutcome {
    decode_stream(&encode_read_stream(track), &decoder_options(), media()).unwrap()
}

fn damaged(track: &DmkTrack, sectors: &[usize]) -> DmkTrack {
    let mut track = track.clone();
    for idx in sectors {
        let off = mark_offset(track.mark(*idx)) + 300;
        track.buf_mut()[off] ^= 0xFF;
    }
    track
}

#[test]
fn test_merge_clean_is_idempotent() {
    init();
    let clean = read(&build_mfm_track(7, 0));
    assert_eq!(clean.stats.errcount, 0);

    let (merged, stats) = merge_sectors(&clean.track, &clean.stats, &clean.track, &clean.stats);
    assert_eq!(merged.as_bytes(), clean.track.as_bytes());
    assert_eq!(stats.errcount, 0);
    assert_eq!(stats.good_sectors, SECTOR_CT as u32);
    assert_eq!(stats.reused_sectors, 0);
}

#[test]
fn test_merge_repairs_disjoint_damage() {
    init();
    let original = build_mfm_track(9, 1);
    let a = read(&damaged(&original, &[0, 4]));
    let b = read(&damaged(&original, &[2, 7]));
    assert_eq!(a.stats.errcount, 2);
    assert_eq!(b.stats.errcount, 2);

    let (merged, stats) = merge_sectors(&a.track, &a.stats, &b.track, &b.stats);

    assert_eq!(stats.errcount, 0);
    assert_eq!(stats.reused_sectors, 2);
    assert_eq!(stats.good_sectors, SECTOR_CT as u32);
    assert!(merged.marks().all(|m| !mark_is_bad(m)));
    assert_eq!(&merged.data()[..original.data_len()], original.data());
}

#[test]
fn test_merge_never_worse() {
    init();
    let original = build_mfm_track(1, 0);
    let a = read(&damaged(&original, &[3]));
    let b = read(&damaged(&original, &[3, 5, 6]));

    let (_, forward) = merge_sectors(&a.track, &a.stats, &b.track, &b.stats);
    assert!(forward.errcount <= a.stats.errcount.min(b.stats.errcount));

    let (merged, backward) = merge_sectors(&b.track, &b.stats, &a.track, &a.stats);
    assert!(backward.errcount <= a.stats.errcount.min(b.stats.errcount));
    assert_eq!(backward.errcount, 1);
    assert!(mark_is_bad(merged.mark(3)));
}

#[test]
fn test_merge_first_sector_with_preamble() {
    init();
    let original = build_mfm_track(0, 0);
    let a = read(&damaged(&original, &[5]));
    let b = read(&damaged(&original, &[0]));

    let (merged, stats) = merge_sectors(&a.track, &a.stats, &b.track, &b.stats);
    assert_eq!(stats.errcount, 0);
    assert_eq!(stats.reused_sectors, 1);
    assert_eq!(&merged.data()[..original.data_len()], original.data());
}
