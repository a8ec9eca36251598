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

    src/gw/flux_stream.rs

    Encoding and decoding of the Greaseweazle flux stream wire format.

    The stream is a sequence of escape-coded flux intervals in device sample
    clock ticks:

        0           end of stream
        1-249       a flux transition after that many ticks
        250-254 n   a flux transition after 250 + (b - 250) * 255 + n - 1 ticks
        255 op v28  an out-of-band opcode with a 28-bit operand

    Each byte of a 28-bit operand carries 7 value bits in bits 1-7, with bit
    0 always set so that no operand byte can be mistaken for the terminator.
*/

use std::ops::ControlFlow;

use strum::FromRepr;

use crate::{DmkFluxError, Result};

/// Largest interval that can be sent as a single byte.
pub const FLUX_DIRECT_MAX: u32 = 249;
/// Largest interval that can be sent with the two-byte form.
pub const FLUX_SHORT_MAX: u32 = 250 + 5 * 255 - 1;
/// Operands of the out-of-band opcodes are 28 bits wide.
pub const FLUX_OPERAND_MAX: u32 = (1 << 28) - 1;
/// The longest encoding produced for one interval: a space and an astable period.
pub const FLUX_CODE_MAX: usize = 12;

const FLUX_ESCAPE: u8 = 255;
const FLUX_TERMINATOR: u8 = 0;

/// Opcodes following a 255 escape byte.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromRepr)]
pub enum FluxOpcode {
    Index = 1,
    Space = 2,
    Astable = 3,
}

/// An event decoded from a flux stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FluxEvent {
    /// A flux transition, carrying the interval since the previous transition.
    Pulse(u32),
    /// An index hole, carrying its absolute position in the stream in ticks.
    Index(u32),
    /// A span with no transition. It is folded into the next pulse interval.
    Space(u32),
    /// A no-flux area written as an astable oscillation with the given period.
    Astable(u32),
}

/// Parameters for encoding a flux stream to be written.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GwStreamParams {
    /// Intervals longer than this are written as a no-flux area. None disables them.
    pub nfa_thresh: Option<u32>,
    /// Period of the astable oscillation used inside a no-flux area.
    pub nfa_period: u32,
    /// Length of the sacrificial final flux appended before the terminator.
    pub dummy_flux: u32,
}

impl GwStreamParams {
    /// Build the default stream parameters for a sample clock: a 150µs no-flux threshold, a
    /// 1.25µs astable period and a 100µs dummy flux.
    pub fn new(sample_freq: u32) -> Self {
        let f = sample_freq as f64;
        GwStreamParams {
            nfa_thresh: Some((150e-6 * f + 0.5) as u32),
            nfa_period: (1.25e-6 * f + 0.5) as u32,
            dummy_flux: (100e-6 * f + 0.5) as u32,
        }
    }

    pub fn without_nfa(mut self) -> Self {
        self.nfa_thresh = None;
        self
    }
}

/// Read a 28-bit operand from 4 bytes.
#[inline]
pub fn read_28(b: &[u8]) -> u32 {
    ((b[0] as u32 & 0xfe) >> 1) | ((b[1] as u32 & 0xfe) << 6) | ((b[2] as u32 & 0xfe) << 13) | ((b[3] as u32 & 0xfe) << 20)
}

/// Write a 28-bit operand as 4 bytes.
#[inline]
pub fn write_28(v: u32, out: &mut Vec<u8>) {
    out.push((1 | (v << 1)) as u8);
    out.push((1 | (v >> 6)) as u8);
    out.push((1 | (v >> 13)) as u8);
    out.push((1 | (v >> 20)) as u8);
}

/// Encode a single flux interval, appending the encoded bytes to `out`.
/// Returns the number of bytes appended.
pub fn encode_ticks(ticks: u32, params: &GwStreamParams, out: &mut Vec<u8>) -> Result<usize> {
    let start = out.len();

    if ticks == 0 {
        return Err(DmkFluxError::ZeroFluxInterval);
    }
    if ticks > FLUX_OPERAND_MAX {
        return Err(DmkFluxError::FluxIntervalRange(ticks));
    }

    if ticks <= FLUX_DIRECT_MAX {
        out.push(ticks as u8);
    }
    else if params.nfa_thresh.is_some_and(|thresh| ticks > thresh) {
        out.push(FLUX_ESCAPE);
        out.push(FluxOpcode::Space as u8);
        write_28(ticks, out);
        out.push(FLUX_ESCAPE);
        out.push(FluxOpcode::Astable as u8);
        write_28(params.nfa_period, out);
    }
    else {
        let high = (ticks - 250) / 255;
        if high < 5 {
            out.push(250 + high as u8);
            out.push(1 + ((ticks - 250) % 255) as u8);
        }
        else {
            out.push(FLUX_ESCAPE);
            out.push(FluxOpcode::Space as u8);
            write_28(ticks - FLUX_DIRECT_MAX, out);
            out.push(FLUX_DIRECT_MAX as u8);
        }
    }

    Ok(out.len() - start)
}

/// Builds an encoded flux stream for a write command from a sequence of intervals.
pub struct FluxStreamEncoder {
    params: GwStreamParams,
    buf: Vec<u8>,
    limit: Option<usize>,
}

impl FluxStreamEncoder {
    pub fn new(params: GwStreamParams) -> Self {
        FluxStreamEncoder {
            params,
            buf: Vec::with_capacity(100_000),
            limit: None,
        }
    }

    /// Limit the size of the encoded stream. Pushing an interval that may not fit fails with
    /// [DmkFluxError::EncodeBufferExhausted].
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn push(&mut self, ticks: u32) -> Result<()> {
        if let Some(limit) = self.limit {
            if self.buf.len() + FLUX_CODE_MAX >= limit {
                return Err(DmkFluxError::EncodeBufferExhausted);
            }
        }
        encode_ticks(ticks, &self.params, &mut self.buf)?;
        Ok(())
    }

    /// Mark an index hole `ticks` after the last flux transition, as a device does in a read
    /// stream.
    pub fn push_index(&mut self, ticks: u32) -> Result<()> {
        if ticks > FLUX_OPERAND_MAX {
            return Err(DmkFluxError::FluxIntervalRange(ticks));
        }
        if let Some(limit) = self.limit {
            if self.buf.len() + FLUX_CODE_MAX >= limit {
                return Err(DmkFluxError::EncodeBufferExhausted);
            }
        }
        self.buf.push(FLUX_ESCAPE);
        self.buf.push(FluxOpcode::Index as u8);
        write_28(ticks, &mut self.buf);
        Ok(())
    }

    pub fn extend<I: IntoIterator<Item = u32>>(&mut self, ticks: I) -> Result<()> {
        for t in ticks {
            self.push(t)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finish the stream. A sacrificial dummy flux is appended so that the last real flux is
    /// written in full, followed by the terminator.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        encode_ticks(self.params.dummy_flux, &self.params, &mut self.buf)?;
        self.buf.push(FLUX_TERMINATOR);
        Ok(self.buf)
    }
}

/// Decodes a flux stream read from the device. The decoder keeps its running tick position
/// between calls so that a stream may be decoded in pieces.
#[derive(Default)]
pub struct FluxStreamDecoder {
    ticks: u32,
    last_pulse: u32,
    terminated: bool,
}

impl FluxStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once the stream terminator has been decoded.
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// The running tick position of the stream.
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Decode as much of `buf` as possible, passing each event to `f`. Decoding stops at the
    /// terminator, at the end of the buffer, before a truncated multibyte sequence, or when `f`
    /// returns [ControlFlow::Break].
    ///
    /// Returns the number of bytes consumed. If this is less than the buffer length, the
    /// unconsumed bytes should be passed again with any following bytes.
    pub fn decode<F>(&mut self, buf: &[u8], mut f: F) -> Result<usize>
    where
        F: FnMut(FluxEvent) -> ControlFlow<()>,
    {
        let mut pos = 0;

        while pos < buf.len() && !self.terminated {
            let c = buf[pos];

            let event = match c {
                FLUX_TERMINATOR => {
                    self.terminated = true;
                    pos += 1;
                    break;
                }
                FLUX_ESCAPE => {
                    if buf.len() - pos < 6 {
                        break;
                    }
                    let opcode = buf[pos + 1];
                    let v = read_28(&buf[pos + 2..pos + 6]);
                    let event = match FluxOpcode::from_repr(opcode) {
                        Some(FluxOpcode::Index) => FluxEvent::Index(self.ticks.wrapping_add(v)),
                        Some(FluxOpcode::Space) => {
                            self.ticks = self.ticks.wrapping_add(v);
                            FluxEvent::Space(v)
                        }
                        Some(FluxOpcode::Astable) => FluxEvent::Astable(v),
                        None => {
                            log::error!("FluxStreamDecoder::decode(): Invalid opcode {} at offset {}", opcode, pos);
                            return Err(DmkFluxError::InvalidFluxOpcode(opcode));
                        }
                    };
                    pos += 6;
                    event
                }
                1..=249 => {
                    pos += 1;
                    self.pulse(c as u32)
                }
                _ => {
                    if buf.len() - pos < 2 {
                        break;
                    }
                    let ticks = 250 + (c as u32 - 250) * 255 + buf[pos + 1] as u32 - 1;
                    pos += 2;
                    self.pulse(ticks)
                }
            };

            if f(event).is_break() {
                break;
            }
        }

        Ok(pos)
    }

    /// Decode a complete buffer into a vector of events.
    pub fn decode_all(&mut self, buf: &[u8]) -> Result<Vec<FluxEvent>> {
        let mut events = Vec::new();
        self.decode(buf, |e| {
            events.push(e);
            ControlFlow::Continue(())
        })?;
        Ok(events)
    }

    fn pulse(&mut self, ticks: u32) -> FluxEvent {
        self.ticks = self.ticks.wrapping_add(ticks);
        let interval = self.ticks.wrapping_sub(self.last_pulse);
        self.last_pulse = self.ticks;
        FluxEvent::Pulse(interval)
    }
}

/// Measure the period between the last two index holes of a stream, in ticks.
pub fn index_period(buf: &[u8]) -> Result<Option<u32>> {
    let mut index = [None, None];
    FluxStreamDecoder::new().decode(buf, |e| {
        if let FluxEvent::Index(t) = e {
            index[0] = index[1];
            index[1] = Some(t);
        }
        ControlFlow::Continue(())
    })?;

    Ok(match index {
        [Some(i0), Some(i1)] => Some(i1.wrapping_sub(i0)),
        _ => None,
    })
}
