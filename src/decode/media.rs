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

    src/decode/media.rs

    Pulse interval thresholds for a media encoding, and classification of
    flux pulse intervals into bit cell runs.
*/

use crate::types::{DmkEncoding, DmkQuirks, DriveKind};

const DEFAULT_POSTCOMP: f64 = 0.5;

/// Decoder thresholds in sample clock ticks for one kind of media.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MediaEncoding {
    /// FM short/long threshold.
    pub fm_thresh: u32,
    /// MFM threshold below which a pulse is a single bit cell. Only used with the MFM clock quirk.
    pub mfm_thresh0: u32,
    /// MFM 2 cell / 3 cell threshold.
    pub mfm_thresh1: u32,
    /// MFM 3 cell / 4 cell threshold.
    pub mfm_thresh2: u32,
    /// Nominal MFM bit cell width.
    pub mfm_short: f64,
    /// Fraction of the previous pulse's timing error carried into the next classification.
    pub postcomp: f64,
}

impl MediaEncoding {
    /// Build thresholds for a sample clock frequency in Hz and a nominal FM bit cell width in
    /// microseconds.
    pub fn new(sample_freq: f64, fm_bitcell_us: f64) -> Self {
        let fm_cell = fm_bitcell_us * sample_freq / 1e6;
        let mfm_cell = fm_cell / 2.0;

        MediaEncoding {
            fm_thresh: (fm_cell * 1.5).round() as u32,
            mfm_thresh0: (mfm_cell * 1.5).round() as u32,
            mfm_thresh1: (mfm_cell * 2.5).round() as u32,
            mfm_thresh2: (mfm_cell * 3.5).round() as u32,
            mfm_short: mfm_cell.round(),
            postcomp: DEFAULT_POSTCOMP,
        }
    }

    pub fn for_drive(kind: DriveKind, sample_freq: u32) -> Self {
        Self::new(sample_freq as f64, kind.fm_bitcell_us())
    }

    pub fn with_postcomp(mut self, postcomp: f64) -> Self {
        self.postcomp = postcomp;
        self
    }
}

/// Maps flux pulse intervals to the number of bit cells they span, with a running
/// adjustment carrying a fraction of each pulse's timing error into the next.
#[derive(Clone, Debug)]
pub struct PulseClassifier {
    media: MediaEncoding,
    fm_only: bool,
    mfm_clock: bool,
    thresh_adj: f64,
}

impl PulseClassifier {
    pub fn new(media: MediaEncoding, user_encoding: DmkEncoding, quirks: DmkQuirks) -> Self {
        PulseClassifier {
            media,
            fm_only: user_encoding == DmkEncoding::Fm,
            mfm_clock: quirks.contains(DmkQuirks::MFM_CLOCK),
            thresh_adj: 0.0,
        }
    }

    pub fn media(&self) -> &MediaEncoding {
        &self.media
    }

    /// Return the number of bit cells (1 to 4) spanned by a pulse interval.
    pub fn classify(&mut self, pulse: u32) -> u32 {
        let adjusted = pulse as f64 + self.thresh_adj;
        let m = &self.media;

        let len = if self.fm_only {
            if adjusted <= m.fm_thresh as f64 {
                2
            }
            else {
                4
            }
        }
        else if self.mfm_clock && adjusted <= m.mfm_thresh0 as f64 {
            1
        }
        else if adjusted <= m.mfm_thresh1 as f64 {
            2
        }
        else if adjusted <= m.mfm_thresh2 as f64 {
            3
        }
        else {
            4
        };

        self.thresh_adj = (pulse as f64 - len as f64 * m.mfm_short) * m.postcomp;
        len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds() {
        let m = MediaEncoding::new(72_000_000.0, 4.0);
        assert_eq!(m.fm_thresh, 432);
        assert_eq!(m.mfm_thresh0, 216);
        assert_eq!(m.mfm_thresh1, 360);
        assert_eq!(m.mfm_thresh2, 504);
        assert_eq!(m.mfm_short, 144.0);
    }

    #[test]
    fn test_classify_mfm() {
        let m = MediaEncoding::new(72_000_000.0, 4.0);
        let mut pc = PulseClassifier::new(m, DmkEncoding::Mixed, DmkQuirks::empty());
        assert_eq!(pc.classify(288), 2);
        assert_eq!(pc.classify(432), 3);
        assert_eq!(pc.classify(576), 4);
        assert_eq!(pc.classify(1000), 4);
    }

    #[test]
    fn test_postcomp_carries_error() {
        let m = MediaEncoding::new(72_000_000.0, 4.0);
        let mut pc = PulseClassifier::new(m, DmkEncoding::Mixed, DmkQuirks::empty());
        // A long 2 cell pulse pushes the next borderline pulse into 3 cells.
        assert_eq!(pc.classify(350), 2);
        assert_eq!(pc.classify(330), 3);
    }

    #[test]
    fn test_classify_fm() {
        let m = MediaEncoding::new(72_000_000.0, 4.0);
        let mut pc = PulseClassifier::new(m, DmkEncoding::Fm, DmkQuirks::empty());
        assert_eq!(pc.classify(288), 2);
        assert_eq!(pc.classify(576), 4);
    }

    #[test]
    fn test_mfm_clock_quirk() {
        let m = MediaEncoding::new(72_000_000.0, 4.0);
        let mut pc = PulseClassifier::new(m, DmkEncoding::Mixed, DmkQuirks::MFM_CLOCK);
        assert_eq!(pc.classify(150), 1);
    }
}
