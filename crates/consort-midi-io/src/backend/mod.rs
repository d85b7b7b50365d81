//! Platform MIDI access.
//!
//! A backend grants (or denies) access and enumerates the output ports the
//! platform currently exposes. `MidirBackend` talks to hardware;
//! `VirtualBackend` is an in-memory stand-in.

#[cfg(feature = "midi-io")]
mod midir_backend;
mod virtual_backend;

#[cfg(feature = "midi-io")]
pub use midir_backend::{MidirBackend, MidirOutputPort};
pub use virtual_backend::{VirtualBackend, VirtualPort};

use crate::error::Result;
use crate::port::OutputPort;
use std::sync::Arc;

pub trait MidiBackend: Send + Sync {
    /// Ask the platform for MIDI output access. Blocks until it answers.
    fn request_access(&self) -> Result<()>;

    /// Output ports in platform enumeration order.
    fn output_ports(&self) -> Result<Vec<Arc<dyn OutputPort>>>;
}

impl<B: MidiBackend + ?Sized> MidiBackend for Arc<B> {
    fn request_access(&self) -> Result<()> {
        (**self).request_access()
    }

    fn output_ports(&self) -> Result<Vec<Arc<dyn OutputPort>>> {
        (**self).output_ports()
    }
}
