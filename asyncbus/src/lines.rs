//! The channel layout of the bus and snapshots of its line states.
//!
//! | Channel | Line          |
//! |---------|---------------|
//! | 0       | Read strobe   |
//! | 1       | Write strobe  |
//! | 2-7     | Address A0-A5 |
//! | 8-15    | Data D0-D7    |

use std::{fmt, ops::Range};

use derive_more::{From, Into};

use crate::error::DecodeError;

#[derive(From, Into, Debug, Default, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChannelId(pub usize);

pub const NUM_ADDRESS_LINES: usize = 6;
pub const NUM_DATA_LINES: usize = 8;
pub const NUM_CHANNELS: usize = 2 + NUM_ADDRESS_LINES + NUM_DATA_LINES;

pub const READ_STROBE: ChannelId = ChannelId(0);
pub const WRITE_STROBE: ChannelId = ChannelId(1);

const ADDRESS_LINES: Range<usize> = 2..2 + NUM_ADDRESS_LINES;
const DATA_LINES: Range<usize> = ADDRESS_LINES.end..NUM_CHANNELS;

/// The state of every channel at one sample. Bit `i` of the raw form is
/// channel `i`.
#[derive(Eq, PartialEq, Clone, Copy, Default, Hash)]
pub struct LineVector([bool; NUM_CHANNELS]);

impl LineVector {
    /// Build from one entry per channel. Anything other than exactly
    /// `NUM_CHANNELS` entries is rejected rather than padded or truncated.
    pub fn from_lines(lines: &[bool]) -> Result<Self, DecodeError> {
        <[bool; NUM_CHANNELS]>::try_from(lines)
            .map(Self)
            .map_err(|_| DecodeError::MalformedChannelCount {
                expected: NUM_CHANNELS,
                actual: lines.len(),
            })
    }

    pub fn from_bits(bits: u16) -> Self {
        let mut lines = [false; NUM_CHANNELS];
        for (i, line) in lines.iter_mut().enumerate() {
            *line = bits >> i & 1 != 0;
        }
        Self(lines)
    }

    /// Build from the named fields. Address bits above A5 are ignored.
    pub fn from_fields(read_strobe: bool, write_strobe: bool, address: u8, data: u8) -> Self {
        let address = (address as u16) & ((1 << NUM_ADDRESS_LINES) - 1);
        Self::from_bits(
            read_strobe as u16
                | (write_strobe as u16) << 1
                | address << ADDRESS_LINES.start
                | (data as u16) << DATA_LINES.start,
        )
    }

    pub fn bits(&self) -> u16 {
        self.0
            .iter()
            .enumerate()
            .fold(0, |bits, (i, &line)| bits | (line as u16) << i)
    }

    pub fn lines(&self) -> &[bool] {
        &self.0
    }

    /// Panics if the channel is out of range.
    pub fn line(&self, channel: ChannelId) -> bool {
        self.0[channel.0]
    }

    /// None if the channel is out of range.
    pub fn get(&self, channel: ChannelId) -> Option<bool> {
        self.0.get(channel.0).copied()
    }

    pub fn read_strobe(&self) -> bool {
        self.line(READ_STROBE)
    }

    pub fn write_strobe(&self) -> bool {
        self.line(WRITE_STROBE)
    }

    /// A0 first.
    pub fn address_bits(&self) -> &[bool] {
        &self.0[ADDRESS_LINES]
    }

    /// D0 first.
    pub fn data_bits(&self) -> &[bool] {
        &self.0[DATA_LINES]
    }
}

impl fmt::Debug for LineVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LineVector({:#06x})", self.bits())
    }
}

impl fmt::LowerHex for LineVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.bits(), f)
    }
}
