//! MIDI channel addressing and per-instrument channel profiles.

use serde::{Deserialize, Serialize};

/// Wire-level MIDI channel (0-15, where 0 = channel 1).
///
/// Construction saturates instead of rejecting: user-facing numbers outside
/// 1-16 snap to the nearest bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub struct MidiChannel(u8);

impl MidiChannel {
    /// GM percussion channel (user-facing 10).
    pub const DRUMS: MidiChannel = MidiChannel(9);

    /// From a user-facing channel number (1-16).
    pub fn from_number(number: i32) -> Self {
        Self((number.clamp(1, 16) - 1) as u8)
    }

    /// From a wire-level index (0-15).
    pub fn from_index(index: u8) -> Self {
        Self(index.min(15))
    }

    /// Wire-level index, OR-ed into the status byte.
    #[inline]
    pub fn index(self) -> u8 {
        self.0
    }

    /// User-facing channel number (1-16).
    #[inline]
    pub fn number(self) -> i32 {
        i32::from(self.0) + 1
    }
}

impl From<i32> for MidiChannel {
    fn from(number: i32) -> Self {
        Self::from_number(number)
    }
}

impl From<MidiChannel> for i32 {
    fn from(channel: MidiChannel) -> Self {
        channel.number()
    }
}

impl std::fmt::Display for MidiChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ch{}", self.number())
    }
}

/// A named channel assignment for one logical instrument.
///
/// Instruments differ only in the channel they default to, so a single
/// value type covers all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub channel: MidiChannel,
}

impl Instrument {
    pub fn new(name: impl Into<String>, channel: i32) -> Self {
        Self {
            name: name.into(),
            channel: MidiChannel::from_number(channel),
        }
    }

    pub fn drums() -> Self {
        Self {
            name: "Drums".to_string(),
            channel: MidiChannel::DRUMS,
        }
    }
}
