//! Output port capability and device management.
//!
//! A port is anything that accepts raw MIDI bytes and has a display name.
//! The `DeviceManager` tracks which ports a backend currently exposes and
//! which one the application has selected.

mod manager;

pub use manager::{
    DeviceChangeCallback, DeviceEvent, DeviceManager, DeviceManagerBuilder, SUBSCRIBER_CAPACITY,
};

use crate::error::Result;
use std::sync::Arc;

/// Destination for encoded MIDI bytes, owned by the host platform.
pub trait OutputPort: Send + Sync {
    fn name(&self) -> &str;

    fn send(&self, bytes: &[u8]) -> Result<()>;
}

impl std::fmt::Debug for dyn OutputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPort")
            .field("name", &self.name())
            .finish()
    }
}

/// Position and name of one entry in the available-ports snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
}

pub(crate) fn describe(ports: &[Arc<dyn OutputPort>]) -> Vec<DeviceInfo> {
    ports
        .iter()
        .enumerate()
        .map(|(index, port)| DeviceInfo {
            index,
            name: port.name().to_string(),
        })
        .collect()
}
