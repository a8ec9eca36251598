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

    src/writer.rs

    Writing DMK images to disk through a drive.
*/

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::{
    dmk::{image::DmkImage, track::DmkTrack, DMK_MAX_SIDES},
    encode::{bit_timing::precomp_for_track, EncoderOptions, FluxEncoder, DEFAULT_PRECOMP_NS},
    gw::{flux_stream::GwStreamParams, protocol::DriveControl},
    DmkFluxError,
    Result,
};

/// How an image is written.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WritePolicy {
    pub steps: u8,
    pub reverse_sides: bool,
    /// Sides of the drive.
    pub max_sides: usize,
    /// Write precompensation on the outermost track.
    pub precomp_low_ns: f64,
    /// Write precompensation on the innermost track.
    pub precomp_high_ns: f64,
}

impl Default for WritePolicy {
    fn default() -> Self {
        WritePolicy {
            steps: 1,
            reverse_sides: false,
            max_sides: DMK_MAX_SIDES,
            precomp_low_ns: DEFAULT_PRECOMP_NS,
            precomp_high_ns: DEFAULT_PRECOMP_NS,
        }
    }
}

/// Writes the tracks of a DMK image through a drive.
pub struct DiskWriter<D: DriveControl> {
    drive: D,
    encoder: FluxEncoder,
    params: GwStreamParams,
    policy: WritePolicy,
    cancel: Arc<AtomicBool>,
}

impl<D: DriveControl> DiskWriter<D> {
    pub fn new(drive: D, opts: EncoderOptions, policy: WritePolicy) -> Result<Self> {
        let params = GwStreamParams::new(opts.sample_freq);
        Ok(DiskWriter {
            drive,
            encoder: FluxEncoder::new(opts)?,
            params,
            policy,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn encoder(&self) -> &FluxEncoder {
        &self.encoder
    }

    pub fn into_inner(self) -> D {
        self.drive
    }

    /// Encode and write one track. Returns the size of the flux stream written.
    pub fn write_track(&mut self, track: usize, side: usize, data: &DmkTrack) -> Result<usize> {
        if side >= self.policy.max_sides {
            if data.mark_ct() == 0 {
                // Nothing to write here.
                return Ok(0);
            }
            return Err(DmkFluxError::ParameterError(format!(
                "drive has {} side(s) but track {} side {} has sectors",
                self.policy.max_sides, track, side
            )));
        }

        let stream = self.encoder.encode_stream(data, &self.params)?;

        let cyl = track * self.policy.steps as usize;
        self.drive.seek(cyl as u8)?;
        self.drive.head(side as u8 ^ self.policy.reverse_sides as u8)?;
        self.drive.write_flux(&stream, true, true)?;

        log::debug!(
            "DiskWriter::write_track(): track {} side {}: {} stream bytes, precomp {:.0}ns",
            track,
            side,
            stream.len(),
            self.encoder.options().precomp_ns
        );
        Ok(stream.len())
    }

    /// Write every track of an image, interpolating precompensation across tracks. Returns the
    /// number of tracks written. The motor is turned off afterward whether or not the write
    /// succeeded.
    pub fn write_disk(&mut self, image: &DmkImage) -> Result<usize> {
        self.drive.motor(true)?;
        let result = self.write_disk_inner(image);
        let motor = self.drive.motor(false);
        let written = result?;
        motor?;
        Ok(written)
    }

    fn write_disk_inner(&mut self, image: &DmkImage) -> Result<usize> {
        let tracks = image.track_ct();
        let sides = image.header.sides();
        let mut written = 0;

        for t in 0..tracks {
            self.encoder.set_precomp(precomp_for_track(
                self.policy.precomp_low_ns,
                self.policy.precomp_high_ns,
                t,
                tracks,
            ));

            for s in 0..sides {
                if self.cancel.load(Ordering::Relaxed) {
                    log::debug!("DiskWriter::write_disk(): write cancelled at track {}", t);
                    return Ok(written);
                }
                if let Some(data) = image.track(t, s) {
                    self.write_track(t, s, data)?;
                }
            }
            written += 1;
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmk::{header::DmkHeader, DMK_TRACK_HEADER_SIZE, EMU_TRACK_LEN_5};

    #[derive(Default)]
    struct RecordingDrive {
        cyl: u8,
        head: u8,
        motor: bool,
        writes: Vec<(u8, u8, usize)>,
    }

    impl DriveControl for RecordingDrive {
        fn sample_freq(&self) -> u32 {
            72_000_000
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
            Ok(vec![0])
        }

        fn write_flux(&mut self, stream: &[u8], cue: bool, terminate: bool) -> Result<usize> {
            assert!(cue && terminate);
            assert_eq!(stream.last(), Some(&0));
            self.writes.push((self.cyl, self.head, stream.len()));
            Ok(stream.len())
        }
    }

    fn image(tracks: u8) -> DmkImage {
        let mut image = DmkImage::new(DmkHeader::new(tracks, EMU_TRACK_LEN_5));
        for t in 0..tracks as usize {
            for s in 0..2 {
                let mut track = DmkTrack::new(EMU_TRACK_LEN_5 as usize);
                track.set_len(EMU_TRACK_LEN_5 as usize);
                track.buf_mut()[DMK_TRACK_HEADER_SIZE..].fill(0x4E);
                image.set_track(t, s, track).unwrap();
            }
        }
        image
    }

    #[test]
    fn test_write_disk() {
        let policy = WritePolicy {
            steps: 2,
            reverse_sides: true,
            ..Default::default()
        };
        let mut writer = DiskWriter::new(RecordingDrive::default(), EncoderOptions::default(), policy).unwrap();
        assert_eq!(writer.write_disk(&image(3)).unwrap(), 3);

        let drive = writer.into_inner();
        assert!(!drive.motor);
        let heads: Vec<_> = drive.writes.iter().map(|w| (w.0, w.1)).collect();
        assert_eq!(heads, vec![(0, 1), (0, 0), (2, 1), (2, 0), (4, 1), (4, 0)]);
    }

    #[test]
    fn test_single_sided_drive() {
        let policy = WritePolicy {
            max_sides: 1,
            ..Default::default()
        };
        let mut writer = DiskWriter::new(RecordingDrive::default(), EncoderOptions::default(), policy).unwrap();

        let mut image = image(1);
        // An empty back side is skipped.
        assert_eq!(writer.write_disk(&image).unwrap(), 1);

        if let Some(track) = image.track_mut(0, 1) {
            track.set_mark(0, 0x8000 | 0x100);
        }
        assert!(matches!(writer.write_disk(&image), Err(DmkFluxError::ParameterError(_))));
        assert!(!writer.into_inner().motor);
    }
}
