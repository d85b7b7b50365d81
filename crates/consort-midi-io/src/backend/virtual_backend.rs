//! In-memory backend with recording ports.

use super::MidiBackend;
use crate::error::{Error, Result};
use crate::port::OutputPort;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Port that records every message written to it.
#[derive(Debug)]
pub struct VirtualPort {
    name: String,
    sent: Mutex<Vec<Vec<u8>>>,
    failing: AtomicBool,
}

impl VirtualPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn take_sent(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Make subsequent sends fail, as a vanished device would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl OutputPort for VirtualPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, bytes: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::Acquire) {
            return Err(Error::MidiPort(format!(
                "virtual port '{}' is unavailable",
                self.name
            )));
        }
        self.sent.lock().push(bytes.to_vec());
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct VirtualBackend {
    ports: RwLock<Vec<Arc<VirtualPort>>>,
    denied: AtomicBool,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backend = Self::new();
        for name in names {
            backend.add_port(name);
        }
        backend
    }

    /// Refuse subsequent access requests.
    pub fn set_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::Release);
    }

    pub fn add_port(&self, name: impl Into<String>) -> Arc<VirtualPort> {
        let port = Arc::new(VirtualPort::new(name));
        self.ports.write().push(Arc::clone(&port));
        port
    }

    /// Removes every port with this name. Returns whether any was removed.
    pub fn remove_port(&self, name: &str) -> bool {
        let mut ports = self.ports.write();
        let before = ports.len();
        ports.retain(|port| port.name() != name);
        ports.len() != before
    }

    pub fn port(&self, name: &str) -> Option<Arc<VirtualPort>> {
        self.ports
            .read()
            .iter()
            .find(|port| port.name() == name)
            .cloned()
    }
}

impl MidiBackend for VirtualBackend {
    fn request_access(&self) -> Result<()> {
        if self.denied.load(Ordering::Acquire) {
            Err(Error::AccessUnavailable(
                "virtual MIDI access denied".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn output_ports(&self) -> Result<Vec<Arc<dyn OutputPort>>> {
        Ok(self
            .ports
            .read()
            .iter()
            .map(|port| Arc::clone(port) as Arc<dyn OutputPort>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_records_messages() {
        let port = VirtualPort::new("Synth");
        port.send(&[0x90, 60, 100]).unwrap();
        port.send(&[0x80, 60, 0]).unwrap();

        assert_eq!(port.sent_count(), 2);
        assert_eq!(port.take_sent(), vec![vec![0x90, 60, 100], vec![0x80, 60, 0]]);
        assert_eq!(port.sent_count(), 0);
    }

    #[test]
    fn test_failing_port() {
        let port = VirtualPort::new("Gone");
        port.set_failing(true);
        assert!(matches!(port.send(&[0xF8]), Err(Error::MidiPort(_))));
        assert_eq!(port.sent_count(), 0);

        port.set_failing(false);
        assert!(port.send(&[0xF8]).is_ok());
    }

    #[test]
    fn test_backend_enumeration_order() {
        let backend = VirtualBackend::with_ports(["A", "B", "C"]);
        backend.request_access().unwrap();

        let names: Vec<String> = backend
            .output_ports()
            .unwrap()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        assert_eq!(names, vec!["A", "B", "C"]);

        assert!(backend.remove_port("B"));
        assert!(!backend.remove_port("B"));
        assert_eq!(backend.output_ports().unwrap().len(), 2);
    }

    #[test]
    fn test_denied_access() {
        let backend = VirtualBackend::new();
        backend.set_denied(true);
        assert!(matches!(
            backend.request_access(),
            Err(Error::AccessUnavailable(_))
        ));
    }
}
