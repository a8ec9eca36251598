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

    src/lib.rs

    dmkflux is a transcoder between floppy disk flux transition streams, as
    produced and consumed by a Greaseweazle device, and DMK track images.

    The read path is:
        flux stream bytes -> FluxStreamDecoder -> BitDecoder -> TrackAssembler
        -> merge_sectors(), repeated for each retry of a track.

    The write path is:
        DmkTrack -> FluxEncoder -> FluxStreamEncoder, once per track.
*/

pub mod decode;
pub mod dmk;
pub mod encode;
pub mod gw;
pub mod merge;
pub mod reader;
pub mod types;
pub mod util;
pub mod writer;

use thiserror::Error;

use crate::gw::protocol::{GwAck, GwCommand};

pub const DEFAULT_SECTOR_SIZE: usize = 512;

/// The hard error type for dmkflux. Sector-level faults found while decoding a track are not
/// errors; they are counted in [TrackStats](crate::types::TrackStats) instead.
#[derive(Clone, Debug, Error)]
pub enum DmkFluxError {
    #[error("An IO error occurred: {0}")]
    IoError(String),
    #[error("A binary parsing error occurred: {0}")]
    BinRwError(String),
    #[error("A flux interval of zero ticks cannot be encoded")]
    ZeroFluxInterval,
    #[error("Flux interval of {0} ticks is out of range for the flux stream encoding")]
    FluxIntervalRange(u32),
    #[error("Invalid flux stream opcode: {0}")]
    InvalidFluxOpcode(u8),
    #[error("The flux encoding buffer was exhausted")]
    EncodeBufferExhausted,
    #[error("Unsupported encoding configuration: {0}")]
    UnsupportedEncoding(String),
    #[error("Device command {command} failed with status: {status}")]
    TransportFailure { command: GwCommand, status: GwAck },
    #[error("Unexpected reply from device: {0}")]
    UnexpectedReply(String),
    #[error("Invalid DMK header: {0}")]
    InvalidHeader(String),
    #[error("Invalid parameters were specified to a library function: {0}")]
    ParameterError(String),
}

impl From<std::io::Error> for DmkFluxError {
    fn from(e: std::io::Error) -> Self {
        DmkFluxError::IoError(e.to_string())
    }
}

impl From<binrw::Error> for DmkFluxError {
    fn from(e: binrw::Error) -> Self {
        DmkFluxError::BinRwError(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DmkFluxError>;

pub mod prelude {
    pub use crate::{
        decode::{
            media::{MediaEncoding, PulseClassifier},
            AttemptOutcome,
            DecoderOptions,
            ReadAttempt,
        },
        dmk::{header::DmkHeader, image::DmkImage, track::DmkTrack},
        encode::{EncoderOptions, FillMode, FluxEncoder},
        gw::{
            flux_stream::{FluxEvent, FluxStreamDecoder, FluxStreamEncoder, GwStreamParams},
            protocol::{DriveControl, GwDevice},
        },
        merge::merge_sectors,
        reader::{AttemptResult, DiskReader, ReadPolicy, RetryController},
        writer::{DiskWriter, WritePolicy},
        types::{DiskStats, DmkEncoding, DmkOptions, DmkQuirks, DriveKind, TrackFault, TrackStats},
        DmkFluxError,
    };
}
