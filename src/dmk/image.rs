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

    src/dmk/image.rs

    Reading and writing of complete DMK images.
*/

use std::io::{Read, Seek, SeekFrom, Write};

use crate::{
    dmk::{header::DmkHeader, track::DmkTrack, DMK_MAX_SIDES, DMK_MAX_TRACKS, DMK_TRACK_HEADER_SIZE},
    types::DmkOptions,
    DmkFluxError,
    Result,
};

/// A DMK image: a header and a grid of tracks indexed by track and side.
#[derive(Clone, Debug, Default)]
pub struct DmkImage {
    pub header: DmkHeader,
    tracks: Vec<[DmkTrack; DMK_MAX_SIDES]>,
}

impl DmkImage {
    pub fn new(header: DmkHeader) -> Self {
        let mut image = DmkImage {
            header,
            tracks: Vec::new(),
        };
        image.tracks.resize_with(image.header.tracks as usize, Default::default);
        image
    }

    /// Read a DMK image.
    pub fn read<RS: Read + Seek>(reader: &mut RS) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;
        let header = DmkHeader::read_validated(reader)?;
        let track_len = header.track_len as usize;

        log::debug!(
            "DmkImage::read(): {} tracks, {} side(s), track length {:04X}, options: {:?}, quirks: {:?}",
            header.tracks,
            header.sides(),
            track_len,
            header.options,
            header.quirks
        );

        let track_ct = header.tracks as usize;
        let mut image = DmkImage {
            header,
            tracks: Vec::with_capacity(track_ct),
        };

        let mut record = vec![0u8; track_len];
        for t in 0..track_ct {
            let mut sides: [DmkTrack; DMK_MAX_SIDES] = Default::default();
            for (s, side) in sides.iter_mut().enumerate().take(image.header.sides()) {
                reader.seek(SeekFrom::Start(image.header.track_offset(t, s)))?;
                reader.read_exact(&mut record).map_err(|e| {
                    log::error!("DmkImage::read(): Track {} side {} is truncated: {}", t, s, e);
                    DmkFluxError::IoError(e.to_string())
                })?;
                *side = DmkTrack::from_record(&record);
            }
            image.tracks.push(sides);
        }

        Ok(image)
    }

    /// Write the image. Each track is written as a record of the header's track length, with
    /// bad sector flags cleared.
    pub fn write<WS: Write + Seek>(&self, writer: &mut WS) -> Result<()> {
        if (self.header.track_len as usize) <= DMK_TRACK_HEADER_SIZE {
            return Err(DmkFluxError::ParameterError(format!(
                "track length {:04X} is too short",
                self.header.track_len
            )));
        }

        writer.seek(SeekFrom::Start(0))?;
        self.header.write_to(writer)?;

        let empty = DmkTrack::new(DMK_TRACK_HEADER_SIZE);
        for t in 0..self.header.tracks as usize {
            for s in 0..self.header.sides() {
                let track = self.track(t, s).unwrap_or(&empty);
                writer.write_all(&track.to_record(self.header.track_len as usize))?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    pub fn track_ct(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, track: usize, side: usize) -> Option<&DmkTrack> {
        self.tracks.get(track).and_then(|t| t.get(side))
    }

    pub fn track_mut(&mut self, track: usize, side: usize) -> Option<&mut DmkTrack> {
        self.tracks.get_mut(track).and_then(|t| t.get_mut(side))
    }

    /// Store a track, growing the image (and the header track count) as needed.
    pub fn set_track(&mut self, track: usize, side: usize, data: DmkTrack) -> Result<()> {
        if track >= DMK_MAX_TRACKS || side >= DMK_MAX_SIDES {
            return Err(DmkFluxError::ParameterError(format!(
                "track {} side {} out of range",
                track, side
            )));
        }
        if track >= self.tracks.len() {
            self.set_track_ct(track + 1);
        }
        self.tracks[track][side] = data;
        Ok(())
    }

    /// Set the number of tracks, truncating or adding empty tracks.
    pub fn set_track_ct(&mut self, tracks: usize) {
        let tracks = tracks.min(DMK_MAX_TRACKS);
        self.tracks.resize_with(tracks, Default::default);
        self.header.tracks = tracks as u8;
    }

    pub fn set_single_sided(&mut self, single: bool) {
        self.header.options.set(DmkOptions::SINGLE_SIDED, single);
    }

    /// Return the smallest header track length that holds every track of the image.
    pub fn optimal_track_len(&self) -> u16 {
        let sides = self.header.sides();
        self.tracks
            .iter()
            .flat_map(|t| t.iter().take(sides))
            .map(|t| t.len() as u16)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmk::EMU_TRACK_LEN_5;
    use std::io::Cursor;

    fn test_track(fill: u8, len: usize) -> DmkTrack {
        let mut track = DmkTrack::new(len);
        track.set_len(len);
        track.buf_mut()[DMK_TRACK_HEADER_SIZE..].fill(fill);
        track.set_mark(0, 0xC000 | 0x100);
        track
    }

    #[test]
    fn test_image_round_trip() {
        let mut header = DmkHeader::new(0, EMU_TRACK_LEN_5);
        header.options = DmkOptions::SINGLE_SIDED;
        let mut image = DmkImage::new(header);

        image.set_track(0, 0, test_track(0xE5, 0x1800)).unwrap();
        image.set_track(1, 0, test_track(0x4E, 0x1880)).unwrap();
        assert_eq!(image.header.tracks, 2);
        assert_eq!(image.optimal_track_len(), 0x1880);

        let mut cursor = Cursor::new(Vec::new());
        image.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(bytes.len(), 16 + 2 * EMU_TRACK_LEN_5 as usize);

        let read_back = DmkImage::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(read_back.track_ct(), 2);

        let t1 = read_back.track(1, 0).unwrap();
        assert_eq!(t1.len(), EMU_TRACK_LEN_5 as usize);
        // Bad flag is not persisted.
        assert_eq!(t1.mark(0), 0x8000 | 0x100);
        assert_eq!(t1.data()[0], 0x4E);
        assert_eq!(t1.data()[0x1880 - DMK_TRACK_HEADER_SIZE], 0);
    }

    #[test]
    fn test_truncated_image() {
        let mut image = DmkImage::new(DmkHeader::new(0, EMU_TRACK_LEN_5));
        image.set_track(0, 0, test_track(0xE5, 0x1800)).unwrap();
        image.set_track(0, 1, test_track(0xE5, 0x1800)).unwrap();

        let mut cursor = Cursor::new(Vec::new());
        image.write(&mut cursor).unwrap();
        let mut bytes = cursor.into_inner();
        bytes.truncate(bytes.len() - 10);

        assert!(DmkImage::read(&mut Cursor::new(bytes)).is_err());
    }
}
