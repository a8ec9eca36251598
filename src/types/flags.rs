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

    flags.rs

    Defines common bitflags
*/

use bitflags::bitflags;

bitflags! {
    /// Option bits stored in byte 4 of a DMK header.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[rustfmt::skip]
    pub struct DmkOptions: u8 {
        #[doc = "Image has only one side"]
        const SINGLE_SIDED      = 0b0001_0000;
        #[doc = "Image contains RX02 encoded sectors"]
        const RX02              = 0b0010_0000;
        #[doc = "FM bytes are stored once instead of doubled"]
        const SINGLE_DENSITY    = 0b0100_0000;
        #[doc = "Obsolete, unused"]
        const IGNORE_DENSITY    = 0b1000_0000;
    }
}

bitflags! {
    /// Quirk bits stored in byte 5 of a DMK header. Each quirk relaxes or alters one detail of
    /// decoding and encoding to cope with non-standard controllers.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[rustfmt::skip]
    pub struct DmkQuirks: u8 {
        #[doc = "MFM ID field CRC does not include the A1 premarks"]
        const ID_CRC            = 0b0000_0001;
        #[doc = "MFM data field CRC does not include the A1 premarks"]
        const DATA_CRC          = 0b0000_0010;
        #[doc = "Accept an A1 premark with a corrupted clock pattern"]
        const PREMARK           = 0b0000_0100;
        #[doc = "Extra bytes follow sectors; disable gap heuristics"]
        const EXTRA             = 0b0000_1000;
        #[doc = "An extra 6 byte CRC-checked field follows each data field"]
        const EXTRA_CRC         = 0b0001_0000;
        #[doc = "Data fields carry 4 extra bytes before the CRC"]
        const EXTRA_DATA        = 0b0010_0000;
        #[doc = "Accept the FM index address mark with a corrupted clock pattern"]
        const IAM               = 0b0100_0000;
        #[doc = "Decode very short MFM transitions as a single bit"]
        const MFM_CLOCK         = 0b1000_0000;
    }
}

impl DmkOptions {
    /// The number of times each FM byte is stored in a track buffer.
    pub fn fm_times(&self) -> usize {
        if self.contains(DmkOptions::SINGLE_DENSITY) {
            1
        }
        else {
            2
        }
    }

    pub fn sides(&self) -> usize {
        if self.contains(DmkOptions::SINGLE_SIDED) {
            1
        }
        else {
            2
        }
    }
}
