//! MIDI output subsystem for Consort.
//!
//! Provides device discovery and connection, channel-bound message encoding,
//! and timed note release.
//!
//! Feature gates: `midi-io` (hardware output via midir).

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::DeviceManagerConfig;

mod channel;
pub use channel::{Instrument, MidiChannel};

pub mod message;
pub use message::MidiOutputMessage;

pub(crate) mod port;
pub use port::{
    DeviceChangeCallback, DeviceEvent, DeviceInfo, DeviceManager, DeviceManagerBuilder,
    OutputPort, SUBSCRIBER_CAPACITY,
};

pub mod backend;
pub use backend::{MidiBackend, VirtualBackend, VirtualPort};

#[cfg(feature = "midi-io")]
pub use backend::{MidirBackend, MidirOutputPort};

mod endpoint;
pub use endpoint::ChannelEndpoint;

mod scheduler;
