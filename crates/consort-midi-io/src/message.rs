//! Channel voice message encoding.
//!
//! Every numeric argument is floored and clamped to its legal MIDI range
//! before it reaches the wire, so fractional or out-of-range callers still
//! produce well-formed bytes.

use crate::channel::MidiChannel;
use smallvec::SmallVec;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const CONTROL_CHANGE: u8 = 0xB0;
const PROGRAM_CHANGE: u8 = 0xC0;
const PITCH_BEND: u8 = 0xE0;

/// Channel Mode controller "All Notes Off".
pub const ALL_NOTES_OFF_CC: u8 = 123;

pub const PITCH_BEND_MIN: i32 = -8192;
pub const PITCH_BEND_MAX: i32 = 8191;
pub const PITCH_BEND_CENTER: u16 = 8192;

/// Floor and clamp to a 7-bit data byte (0-127). NaN encodes as 0.
#[inline]
pub fn data_byte(value: impl Into<f64>) -> u8 {
    let value = value.into();
    if value.is_nan() {
        return 0;
    }
    value.floor().clamp(0.0, 127.0) as u8
}

/// Floor and clamp a signed bend (-8192 to 8191), then bias to unsigned
/// 14-bit (0 to 16383). NaN encodes as center.
#[inline]
pub fn pitch_bend_value(value: impl Into<f64>) -> u16 {
    let value = value.into();
    if value.is_nan() {
        return PITCH_BEND_CENTER;
    }
    let signed = value
        .floor()
        .clamp(f64::from(PITCH_BEND_MIN), f64::from(PITCH_BEND_MAX)) as i32;
    (signed + i32::from(PITCH_BEND_CENTER)) as u16
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiOutputMessage {
    bytes: SmallVec<[u8; 3]>,
}

impl MidiOutputMessage {
    fn channel_voice(status: u8, channel: MidiChannel, data: &[u8]) -> Self {
        let mut bytes = SmallVec::new();
        bytes.push(status | channel.index());
        bytes.extend_from_slice(data);
        Self { bytes }
    }

    pub fn note_on(channel: MidiChannel, note: impl Into<f64>, velocity: impl Into<f64>) -> Self {
        Self::channel_voice(NOTE_ON, channel, &[data_byte(note), data_byte(velocity)])
    }

    pub fn note_off(channel: MidiChannel, note: impl Into<f64>, velocity: impl Into<f64>) -> Self {
        Self::channel_voice(NOTE_OFF, channel, &[data_byte(note), data_byte(velocity)])
    }

    pub fn control_change(
        channel: MidiChannel,
        controller: impl Into<f64>,
        value: impl Into<f64>,
    ) -> Self {
        Self::channel_voice(
            CONTROL_CHANGE,
            channel,
            &[data_byte(controller), data_byte(value)],
        )
    }

    pub fn program_change(channel: MidiChannel, program: impl Into<f64>) -> Self {
        Self::channel_voice(PROGRAM_CHANGE, channel, &[data_byte(program)])
    }

    /// `value`: signed 14-bit (-8192 to 8191), sent LSB first.
    pub fn pitch_bend(channel: MidiChannel, value: impl Into<f64>) -> Self {
        let unsigned = pitch_bend_value(value);
        let lsb = (unsigned & 0x7F) as u8;
        let msb = ((unsigned >> 7) & 0x7F) as u8;
        Self::channel_voice(PITCH_BEND, channel, &[lsb, msb])
    }

    pub fn all_notes_off(channel: MidiChannel) -> Self {
        Self::channel_voice(CONTROL_CHANGE, channel, &[ALL_NOTES_OFF_CC, 0])
    }

    /// Unvalidated bytes, passed through as given.
    pub fn raw(bytes: &[u8]) -> Self {
        Self {
            bytes: SmallVec::from_slice(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes.into_vec()
    }

    pub fn status(&self) -> Option<u8> {
        self.bytes.first().copied()
    }
}

impl AsRef<[u8]> for MidiOutputMessage {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
