//! # Consort - Hardware MIDI Output
//!
//! Drive external instruments from Rust: find MIDI output devices, pick one,
//! and send channel messages to it.
//!
//! ## Architecture
//!
//! Consort is an umbrella crate that coordinates:
//! - **consort-midi-io** - Device discovery and connection, channel message
//!   encoding, timed note release
//!
//! ## Quick Start
//!
//! ```ignore
//! use consort::prelude::*;
//!
//! let manager = DeviceManager::builder()
//!     .client_name("my-app")
//!     .build()?;
//!
//! if manager.initialize() && manager.connect_by_name("Synth") {
//!     let lead = manager.endpoint(1);
//!     lead.send_program_change(81)?;
//!     lead.play_note(64, 100, Duration::from_millis(400))?;
//!
//!     let drums = manager.instrument_endpoint(&Instrument::drums());
//!     drums.note_on(36, 120)?;
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Hardware MIDI output
//! - `midi-hardware` - midir-backed `MidirBackend` (without it, supply a
//!   `MidiBackend` such as `VirtualBackend`)

mod error;
pub use error::{Error, Result};

/// Re-export of consort-midi-io for direct access
pub use consort_midi_io as midi;

pub use consort_midi_io::{
    ChannelEndpoint, DeviceEvent, DeviceInfo, DeviceManager, DeviceManagerBuilder,
    DeviceManagerConfig, Instrument, MidiBackend, MidiChannel, MidiOutputMessage, OutputPort,
    VirtualBackend, VirtualPort,
};

#[cfg(feature = "midi-hardware")]
pub use consort_midi_io::MidirBackend;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{Error, Result};

    // Devices
    pub use crate::{DeviceEvent, DeviceInfo, DeviceManager, DeviceManagerConfig};

    // Output
    pub use crate::{ChannelEndpoint, Instrument, MidiChannel, OutputPort};

    pub use std::time::Duration;
}
