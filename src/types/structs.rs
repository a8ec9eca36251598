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

    structs.rs

    Defines common structs
*/

use crate::{
    dmk::DMK_MAX_SECTORS,
    types::{DmkEncoding, TrackFault, ENCODING_CT},
};

/// Statistics gathered while decoding a single read of a track, or carried by the merged
/// composite of several reads.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackStats {
    /// Sectors with a valid ID field and a good data CRC.
    pub good_sectors: u32,
    /// Errors counted on the track. A sector contributes one error at most.
    pub errcount: u32,
    /// Sectors spliced in from a previous read by the merger.
    pub reused_sectors: u32,
    /// The encoding of each sector, indexed by the sector's position in the mark table.
    pub enc_sec: Vec<DmkEncoding>,
    /// Good sectors counted per encoding.
    pub enc_count: [u32; ENCODING_CT],
    /// Every fault seen, in the order seen. Coalesced faults still appear here.
    pub faults: Vec<TrackFault>,
    /// The track wrapped around to its first sector header before the read ended.
    pub wraparound: bool,
}

impl Default for TrackStats {
    fn default() -> Self {
        TrackStats {
            good_sectors: 0,
            errcount: 0,
            reused_sectors: 0,
            enc_sec: vec![DmkEncoding::Mixed; DMK_MAX_SECTORS],
            enc_count: [0; ENCODING_CT],
            faults: Vec::new(),
            wraparound: false,
        }
    }
}

impl TrackStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the encoding recorded for the sector at `idx` in the mark table.
    pub fn sector_encoding(&self, idx: usize) -> DmkEncoding {
        self.enc_sec.get(idx).copied().unwrap_or_default()
    }

    pub fn fault_ct(&self, fault: TrackFault) -> usize {
        self.faults.iter().filter(|f| **f == fault).count()
    }
}

/// Statistics accumulated over all tracks of a disk read.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskStats {
    pub retries_total: u32,
    pub good_sectors_total: u32,
    pub errcount_total: u32,
    pub enc_count_total: [u32; ENCODING_CT],
    /// Tracks finished with at least one error.
    pub err_tracks: u32,
    /// Tracks finished with no errors and at least one good sector.
    pub good_tracks: u32,
    /// The back side of track 0 looked like the front side of a flippy disk.
    pub flippy: bool,
}

impl DiskStats {
    /// Accumulate the final stats of one track.
    pub fn add_track(&mut self, stats: &TrackStats, retries: u32, flippy: bool) {
        self.retries_total += retries;
        self.good_sectors_total += stats.good_sectors;
        self.errcount_total += stats.errcount;

        for (total, ct) in self.enc_count_total.iter_mut().zip(stats.enc_count.iter()) {
            *total += *ct;
        }

        if stats.errcount > 0 {
            self.err_tracks += 1;
        }
        else if stats.good_sectors > 0 {
            self.good_tracks += 1;
        }

        if flippy {
            self.flippy = true;
        }
    }
}
