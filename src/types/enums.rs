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

    enums.rs

    Defines common enum types
*/
use std::{
    fmt,
    fmt::{Display, Formatter},
};

use strum::{EnumIter, FromRepr};

use crate::{dmk, util::approx_eq};

/// The data encoding of a sector or of the decoder's current state.
/// * `Mixed` is the default user selection. The decoder accepts both FM and MFM marks and
///   switches between them as they are seen.
/// * `Fm` and `Mfm` restrict decoding to a single encoding.
/// * `Rx02` is DEC's modified MFM as used by the RX02 drive. Its sector headers are FM.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter, FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DmkEncoding {
    #[default]
    Mixed = 0,
    Fm = 1,
    Mfm = 2,
    Rx02 = 3,
}

/// The number of [DmkEncoding] variants, used to size per-encoding counters.
pub const ENCODING_CT: usize = 4;

impl DmkEncoding {
    /// Return the index of this encoding into a per-encoding counter array.
    #[inline]
    pub fn idx(&self) -> usize {
        *self as usize
    }
}

impl Display for DmkEncoding {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DmkEncoding::Mixed => write!(f, "autodetect"),
            DmkEncoding::Fm => write!(f, "FM"),
            DmkEncoding::Mfm => write!(f, "MFM"),
            DmkEncoding::Rx02 => write!(f, "RX02"),
        }
    }
}

/// A recoverable fault found while decoding a single track read. Faults never abort an
/// attempt; they are counted in [TrackStats](crate::types::TrackStats) and used by the retry
/// policy to decide whether another read is worthwhile.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackFault {
    BadIdCrc,
    BadDataCrc,
    BadExtraCrc,
    MissingDataAddressMark,
    IncompleteSectorField,
    TooManyIdamsOnTrack,
    UnexpectedDataAddressMark,
    StreamBufferOverflow,
}

impl TrackFault {
    /// Returns true if this fault is counted in a track's error count.
    pub fn is_error(&self) -> bool {
        !matches!(self, TrackFault::StreamBufferOverflow)
    }
}

impl Display for TrackFault {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TrackFault::BadIdCrc => write!(f, "bad ID CRC"),
            TrackFault::BadDataCrc => write!(f, "bad data CRC"),
            TrackFault::BadExtraCrc => write!(f, "bad extra CRC"),
            TrackFault::MissingDataAddressMark => write!(f, "missing DAM"),
            TrackFault::IncompleteSectorField => write!(f, "incomplete sector"),
            TrackFault::TooManyIdamsOnTrack => write!(f, "too many IDAMs on track"),
            TrackFault::UnexpectedDataAddressMark => write!(f, "unexpected DAM"),
            TrackFault::StreamBufferOverflow => write!(f, "track buffer overflow"),
        }
    }
}

/// The density select level to drive on the floppy bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DensitySelect {
    Double,
    High,
}

/// The kind of drive and media combination in use. Each kind implies a rotational speed and
/// a data rate, which in turn determine the decoder thresholds and the encoder bit cell.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DriveKind {
    /// 5.25" SD/DD disk in a 1.2MB drive (360 RPM, 300kbps MFM)
    Dd525In1200k = 1,
    /// 5.25" SD/DD disk in a 360K/720K drive, or a 3.5" SD/DD disk (300 RPM, 250kbps MFM)
    Dd = 2,
    /// 5.25" HD disk, or an 8" SD/DD disk (360 RPM, 500kbps MFM)
    Hd525Or8 = 3,
    /// 3.5" HD disk (300 RPM, 500kbps MFM)
    Hd35 = 4,
}

impl Display for DriveKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DriveKind::Dd525In1200k => write!(f, "5.25\" SD/DD disk in 1.2MB drive"),
            DriveKind::Dd => write!(f, "5.25\" SD/DD disk in 360KB/720KB drive, or 3.5\" SD/DD disk"),
            DriveKind::Hd525Or8 => write!(f, "5.25\" HD disk, or 8\" SD/DD disk"),
            DriveKind::Hd35 => write!(f, "3.5\" HD disk"),
        }
    }
}

impl DriveKind {
    /// The nominal rotational speed of the drive.
    pub fn rpm(&self) -> f64 {
        match self {
            DriveKind::Dd525In1200k | DriveKind::Hd525Or8 => 360.0,
            DriveKind::Dd | DriveKind::Hd35 => 300.0,
        }
    }

    /// The nominal FM bit cell width in microseconds. An MFM bit cell is half of this.
    pub fn fm_bitcell_us(&self) -> f64 {
        match self {
            // A 250kbps disk spun 20% faster reads at 300kbps.
            DriveKind::Dd525In1200k => 4.0 * (300.0 / 360.0),
            DriveKind::Dd => 4.0,
            DriveKind::Hd525Or8 | DriveKind::Hd35 => 2.0,
        }
    }

    pub fn density_select(&self) -> DensitySelect {
        match self {
            DriveKind::Dd525In1200k | DriveKind::Dd => DensitySelect::Double,
            DriveKind::Hd525Or8 | DriveKind::Hd35 => DensitySelect::High,
        }
    }

    /// The DMK track length an emulator would use for a disk read in this kind of drive.
    pub fn dmk_track_len(&self) -> u16 {
        match self {
            DriveKind::Dd525In1200k | DriveKind::Dd => dmk::EMU_TRACK_LEN_5,
            DriveKind::Hd525Or8 => dmk::EMU_TRACK_LEN_8,
            DriveKind::Hd35 => dmk::EMU_TRACK_LEN_3HD,
        }
    }

    /// Guess the kind of drive from the measured drive speed and the DMK header track length
    /// of an image to be written. Track lengths are compared with a 4% tolerance.
    pub fn guess(rpm: f64, track_len: u16) -> Option<DriveKind> {
        let near = |nominal: u16| approx_eq(track_len as f64, nominal as f64, 0.04);

        if rpm > 342.0 && rpm < 378.0 {
            if near(dmk::EMU_TRACK_LEN_5) || near(dmk::EMU_TRACK_LEN_5SD) {
                return Some(DriveKind::Dd525In1200k);
            }
            else if near(dmk::EMU_TRACK_LEN_8) || near(dmk::EMU_TRACK_LEN_8SD) {
                return Some(DriveKind::Hd525Or8);
            }
        }
        else if rpm > 285.0 && rpm < 315.0 {
            if near(dmk::EMU_TRACK_LEN_5) || near(dmk::EMU_TRACK_LEN_5SD) {
                return Some(DriveKind::Dd);
            }
            else if near(dmk::EMU_TRACK_LEN_3HD) {
                return Some(DriveKind::Hd35);
            }
        }
        None
    }

    /// Detect the kind of drive from a measured drive speed and flux pulse rate in kHz.
    pub fn detect(rpm: f64, pulse_rate_khz: f64) -> Option<DriveKind> {
        if rpm > 270.0 && rpm < 330.0 {
            if pulse_rate_khz > 225.0 && pulse_rate_khz < 287.5 {
                return Some(DriveKind::Dd);
            }
            else if pulse_rate_khz > 450.0 && pulse_rate_khz < 575.5 {
                return Some(DriveKind::Hd35);
            }
        }
        else if rpm > 330.0 && rpm < 396.0 {
            if pulse_rate_khz > 270.0 && pulse_rate_khz < 345.0 {
                return Some(DriveKind::Dd525In1200k);
            }
            else if pulse_rate_khz > 450.0 && pulse_rate_khz < 575.0 {
                return Some(DriveKind::Hd525Or8);
            }
        }
        None
    }
}
