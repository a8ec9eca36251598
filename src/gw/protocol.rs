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

    src/gw/protocol.rs

    The Greaseweazle command protocol, and a device driver over any
    Read + Write transport.

    Each command is sent as {opcode, total length, params...} and answered
    with {opcode echo, status}, optionally followed by a reply payload when
    the status is Okay.
*/

use std::{
    fmt,
    fmt::{Display, Formatter},
    io::{Cursor, Read, Write},
};

use binrw::{binrw, BinRead, BinWrite};
use strum::{EnumIter, FromRepr};

use crate::{
    gw::flux_stream::index_period,
    types::{DensitySelect, DriveKind},
    DmkFluxError,
    Result,
};

const GET_INFO_FIRMWARE: u8 = 0;
const PARAMS_DELAYS: u8 = 0;
const PIN_DENSITY_SELECT: u8 = 2;
const DEFAULT_WRITE_RETRIES: u32 = 5;
const READ_CHUNK_SIZE: usize = 4096;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GwCommand {
    GetInfo = 0,
    Update = 1,
    Seek = 2,
    Head = 3,
    SetParams = 4,
    GetParams = 5,
    Motor = 6,
    ReadFlux = 7,
    WriteFlux = 8,
    GetFluxStatus = 9,
    GetIndexTimes = 10,
    SwitchFwMode = 11,
    Select = 12,
    Deselect = 13,
    SetBusType = 14,
    SetPin = 15,
    Reset = 16,
    EraseFlux = 17,
    SourceBytes = 18,
    SinkBytes = 19,
    GetPin = 20,
    TestMode = 21,
    NoClickStep = 22,
}

impl Display for GwCommand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            GwCommand::GetInfo => "Get Info",
            GwCommand::Update => "Update",
            GwCommand::Seek => "Seek",
            GwCommand::Head => "Head",
            GwCommand::SetParams => "Set Params",
            GwCommand::GetParams => "Get Params",
            GwCommand::Motor => "Motor",
            GwCommand::ReadFlux => "Read Flux",
            GwCommand::WriteFlux => "Write Flux",
            GwCommand::GetFluxStatus => "Get Flux Status",
            GwCommand::GetIndexTimes => "Get Index Times",
            GwCommand::SwitchFwMode => "Switch FW Mode",
            GwCommand::Select => "Select",
            GwCommand::Deselect => "Deselect",
            GwCommand::SetBusType => "Set Bus Type",
            GwCommand::SetPin => "Set Pin",
            GwCommand::Reset => "Reset",
            GwCommand::EraseFlux => "Erase Flux",
            GwCommand::SourceBytes => "Source Bytes",
            GwCommand::SinkBytes => "Sink Bytes",
            GwCommand::GetPin => "Get Pin",
            GwCommand::TestMode => "Test Mode",
            GwCommand::NoClickStep => "No Click Step",
        };
        write!(f, "{}", name)
    }
}

/// Command status codes.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, FromRepr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GwAck {
    Okay = 0,
    BadCommand = 1,
    NoIndex = 2,
    NoTrk0 = 3,
    FluxOverflow = 4,
    FluxUnderflow = 5,
    WriteProtected = 6,
    NoUnit = 7,
    NoBus = 8,
    BadUnit = 9,
    BadPin = 10,
    BadCylinder = 11,
    OutOfSram = 12,
    OutOfFlash = 13,
}

impl Display for GwAck {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let desc = match self {
            GwAck::Okay => "Okay",
            GwAck::BadCommand => "Bad Command",
            GwAck::NoIndex => "No Index",
            GwAck::NoTrk0 => "Track 0 Not Found",
            GwAck::FluxOverflow => "Flux Overflow",
            GwAck::FluxUnderflow => "Flux Underflow",
            GwAck::WriteProtected => "Disk is Write Protected",
            GwAck::NoUnit => "No Drive Unit Selected",
            GwAck::NoBus => "No Bus Type Specified",
            GwAck::BadUnit => "Invalid Unit Number",
            GwAck::BadPin => "Invalid Pin",
            GwAck::BadCylinder => "Invalid Cylinder",
            GwAck::OutOfSram => "Out of SRAM",
            GwAck::OutOfFlash => "Out of Flash",
        };
        write!(f, "{}", desc)
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum GwBusType {
    None = 0,
    #[default]
    IbmPc = 1,
    Shugart = 2,
    Apple2 = 3,
}

/// The firmware information block returned by GetInfo.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[binrw]
#[brw(little)]
pub struct GwInfo {
    pub fw_major: u8,
    pub fw_minor: u8,
    pub is_main_firmware: u8,
    pub max_cmd: u8,
    pub sample_freq: u32,
    pub hw_model: u8,
    pub hw_submodel: u8,
    pub usb_speed: u8,
    pub reserved: [u8; 21],
}

/// Drive timing delays in microseconds (milliseconds for `seek_settle`), and the motor
/// auto-off timeout in milliseconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[binrw]
#[brw(little)]
pub struct GwDelays {
    pub select_delay: u16,
    pub step_delay: u16,
    pub seek_settle: u16,
    pub motor_delay: u16,
    pub auto_off: u16,
}

const GW_INFO_LEN: usize = 32;
const GW_DELAYS_LEN: usize = 10;

/// Abstract control of a floppy drive able to read and write flux streams.
pub trait DriveControl {
    /// The sample clock frequency of flux streams, in Hz.
    fn sample_freq(&self) -> u32;

    fn seek(&mut self, cyl: u8) -> Result<()>;

    fn head(&mut self, head: u8) -> Result<()>;

    fn motor(&mut self, on: bool) -> Result<()>;

    /// Read a flux stream. `revs` is the number of index-to-index revolutions to read, and
    /// `ticks` limits the read by time; zero disables either limit. The returned stream ends
    /// with its terminator.
    fn read_flux(&mut self, revs: u16, ticks: u32) -> Result<Vec<u8>>;

    /// Write an encoded flux stream. Returns the number of bytes written.
    fn write_flux(&mut self, stream: &[u8], cue_at_index: bool, terminate_at_index: bool) -> Result<usize>;

    /// Measure the rotational period of the disk in nanoseconds from one revolution.
    fn rotation_period_ns(&mut self) -> Result<f64> {
        let stream = self.read_flux(1, 0)?;
        match index_period(&stream)? {
            Some(ticks) if ticks > 0 => Ok(ticks as f64 * (1e9 / self.sample_freq() as f64)),
            _ => Err(DmkFluxError::UnexpectedReply(
                "no index period found in flux stream".to_string(),
            )),
        }
    }

    /// Measure the rotational speed of the disk.
    fn rpm(&mut self) -> Result<f64> {
        Ok(60e9 / self.rotation_period_ns()?)
    }
}

/// A Greaseweazle device on a byte transport, such as a serial port.
pub struct GwDevice<T: Read + Write> {
    port: T,
    info: GwInfo,
    drive: u8,
    write_retries: u32,
    pending: Vec<u8>,
}

impl<T: Read + Write> GwDevice<T> {
    /// Open a device on a transport, querying its firmware information.
    pub fn new(port: T) -> Result<Self> {
        let mut device = GwDevice {
            port,
            info: GwInfo::default(),
            drive: 0,
            write_retries: DEFAULT_WRITE_RETRIES,
            pending: Vec::new(),
        };

        device.info = device.get_info()?;
        log::debug!(
            "GwDevice::new(): firmware v{}.{}, model {}.{}, sample frequency {}Hz",
            device.info.fw_major,
            device.info.fw_minor,
            device.info.hw_model,
            device.info.hw_submodel,
            device.info.sample_freq
        );
        Ok(device)
    }

    pub fn info(&self) -> &GwInfo {
        &self.info
    }

    pub fn set_write_retries(&mut self, retries: u32) {
        self.write_retries = retries;
    }

    pub fn into_inner(self) -> T {
        self.port
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let from_pending = buf.len().min(self.pending.len());
        buf[..from_pending].copy_from_slice(&self.pending[..from_pending]);
        self.pending.drain(..from_pending);
        self.port.read_exact(&mut buf[from_pending..])?;
        Ok(())
    }

    fn send(&mut self, command: GwCommand, params: &[u8], reply: Option<&mut [u8]>) -> Result<()> {
        let mut frame = Vec::with_capacity(2 + params.len());
        frame.push(command as u8);
        frame.push((2 + params.len()) as u8);
        frame.extend_from_slice(params);
        self.port.write_all(&frame)?;
        self.port.flush()?;

        let mut ack = [0u8; 2];
        self.read_exact(&mut ack)?;

        if ack[0] != command as u8 {
            log::error!(
                "GwDevice::send(): {} command echo mismatch: got {:02X}",
                command,
                ack[0]
            );
            return Err(DmkFluxError::UnexpectedReply(format!(
                "command {} echoed as {:02X}",
                command, ack[0]
            )));
        }

        match GwAck::from_repr(ack[1]) {
            Some(GwAck::Okay) => {}
            Some(status) => {
                log::debug!("GwDevice::send(): {} failed: {}", command, status);
                return Err(DmkFluxError::TransportFailure { command, status });
            }
            None => {
                return Err(DmkFluxError::UnexpectedReply(format!(
                    "command {} returned unknown status {:02X}",
                    command, ack[1]
                )));
            }
        }

        if let Some(reply) = reply {
            self.read_exact(reply)?;
        }
        Ok(())
    }

    pub fn get_info(&mut self) -> Result<GwInfo> {
        let mut reply = [0u8; GW_INFO_LEN];
        self.send(GwCommand::GetInfo, &[GET_INFO_FIRMWARE], Some(&mut reply))?;
        Ok(GwInfo::read(&mut Cursor::new(&reply[..]))?)
    }

    pub fn get_params(&mut self) -> Result<GwDelays> {
        let mut reply = [0u8; GW_DELAYS_LEN];
        self.send(
            GwCommand::GetParams,
            &[PARAMS_DELAYS, GW_DELAYS_LEN as u8],
            Some(&mut reply),
        )?;
        Ok(GwDelays::read(&mut Cursor::new(&reply[..]))?)
    }

    pub fn set_params(&mut self, delays: &GwDelays) -> Result<()> {
        let mut params = Cursor::new(vec![PARAMS_DELAYS]);
        params.set_position(1);
        delays.write(&mut params)?;
        self.send(GwCommand::SetParams, &params.into_inner(), None)
    }

    pub fn select(&mut self, drive: u8) -> Result<()> {
        self.send(GwCommand::Select, &[drive], None)
    }

    pub fn deselect(&mut self) -> Result<()> {
        self.send(GwCommand::Deselect, &[], None)
    }

    pub fn set_bus_type(&mut self, bus: GwBusType) -> Result<()> {
        self.send(GwCommand::SetBusType, &[bus as u8], None)
    }

    pub fn set_pin(&mut self, pin: u8, level: bool) -> Result<()> {
        self.send(GwCommand::SetPin, &[pin, level as u8], None)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.send(GwCommand::Reset, &[], None)
    }

    pub fn get_flux_status(&mut self) -> Result<()> {
        self.send(GwCommand::GetFluxStatus, &[], None)
    }

    /// Select a drive, set its density select line and start its motor.
    pub fn set_drive(&mut self, drive: u8, density: DensitySelect) -> Result<()> {
        self.drive = drive;
        self.select(drive)?;
        self.set_pin(PIN_DENSITY_SELECT, density == DensitySelect::High)?;
        DriveControl::motor(self, true)
    }

    /// Select a drive using the density select level of a kind of drive.
    pub fn set_drive_kind(&mut self, drive: u8, kind: DriveKind) -> Result<()> {
        self.set_drive(drive, kind.density_select())
    }

    /// Stop the motor and deselect the drive.
    pub fn unset_drive(&mut self) -> Result<()> {
        DriveControl::motor(self, false)?;
        self.deselect()
    }

    fn read_stream(&mut self) -> Result<Vec<u8>> {
        let mut stream = std::mem::take(&mut self.pending);
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(end) = stream.iter().position(|b| *b == 0) {
                self.pending = stream.split_off(end + 1);
                return Ok(stream);
            }
            let n = self.port.read(&mut chunk)?;
            if n == 0 {
                log::error!("GwDevice::read_stream(): transport closed after {} bytes", stream.len());
                return Err(DmkFluxError::IoError("unexpected end of flux stream".to_string()));
            }
            stream.extend_from_slice(&chunk[..n]);
        }
    }
}

impl<T: Read + Write> DriveControl for GwDevice<T> {
    fn sample_freq(&self) -> u32 {
        self.info.sample_freq
    }

    fn seek(&mut self, cyl: u8) -> Result<()> {
        self.send(GwCommand::Seek, &[cyl], None)
    }

    fn head(&mut self, head: u8) -> Result<()> {
        self.send(GwCommand::Head, &[head], None)
    }

    fn motor(&mut self, on: bool) -> Result<()> {
        let drive = self.drive;
        self.send(GwCommand::Motor, &[drive, on as u8], None)
    }

    fn read_flux(&mut self, revs: u16, ticks: u32) -> Result<Vec<u8>> {
        let revs = if revs > 0 { revs + 1 } else { 0 };
        let mut params = [0u8; 6];
        params[0..4].copy_from_slice(&ticks.to_le_bytes());
        params[4..6].copy_from_slice(&revs.to_le_bytes());
        self.send(GwCommand::ReadFlux, &params, None)?;

        // Flux status must be collected even when the stream read fails.
        let stream = self.read_stream();
        self.get_flux_status()?;
        let stream = stream?;

        log::trace!("GwDevice::read_flux(): read {} bytes", stream.len());
        Ok(stream)
    }

    fn write_flux(&mut self, stream: &[u8], cue_at_index: bool, terminate_at_index: bool) -> Result<usize> {
        let mut retry = 0;
        loop {
            self.send(
                GwCommand::WriteFlux,
                &[cue_at_index as u8, terminate_at_index as u8],
                None,
            )?;
            self.port.write_all(stream)?;
            self.port.flush()?;

            let mut sync = [0u8; 1];
            self.read_exact(&mut sync)?;

            match self.get_flux_status() {
                Ok(()) => return Ok(stream.len()),
                Err(DmkFluxError::TransportFailure {
                    status: GwAck::FluxUnderflow,
                    ..
                }) if retry < self.write_retries => {
                    retry += 1;
                    log::warn!("GwDevice::write_flux(): flux underflow, retry {}", retry);
                }
                Err(e) => return Err(e),
            }
        }
    }
}
