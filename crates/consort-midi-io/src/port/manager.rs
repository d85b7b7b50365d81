//! Output device manager
//!
//! Tracks the output ports a backend exposes and which one is connected.
//! Snapshots are swapped atomically; a background thread re-enumerates on an
//! interval and announces add/remove changes.

use super::{describe, DeviceInfo, OutputPort};
use crate::backend::MidiBackend;
use crate::channel::Instrument;
use crate::config::DeviceManagerConfig;
use crate::endpoint::ChannelEndpoint;
use crate::error::Result;
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Undrained events a subscriber may hold before it is dropped.
pub const SUBSCRIBER_CAPACITY: usize = 64;

/// Invoked with the fresh device list after every topology change.
pub type DeviceChangeCallback = Arc<dyn Fn(&[DeviceInfo]) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    TopologyChanged { devices: Vec<DeviceInfo> },
}

struct DeviceManagerInner {
    backend: Box<dyn MidiBackend>,
    config: DeviceManagerConfig,
    available: ArcSwap<Vec<Arc<dyn OutputPort>>>,
    connected: ArcSwap<Option<Arc<dyn OutputPort>>>,
    initialized: AtomicBool,
    change_callback: RwLock<Option<DeviceChangeCallback>>,
    subscribers: Mutex<Vec<Sender<DeviceEvent>>>,
}

impl DeviceManagerInner {
    fn refresh(&self) -> bool {
        if !self.initialized.load(Ordering::Acquire) {
            return false;
        }

        let ports = match self.backend.output_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!("MIDI output enumeration failed: {}", e);
                return false;
            }
        };

        let unchanged = {
            let current = self.available.load();
            current.len() == ports.len()
                && current
                    .iter()
                    .zip(ports.iter())
                    .all(|(old, new)| old.name() == new.name())
        };
        if unchanged {
            return false;
        }

        let devices = describe(&ports);
        self.available.store(Arc::new(ports));
        info!("MIDI outputs changed: {} available", devices.len());

        if let Some(name) = self.connected_name() {
            if !devices.iter().any(|device| device.name == name) {
                debug!("Connected MIDI output '{}' is no longer listed", name);
            }
        }

        self.notify(&devices);
        true
    }

    fn notify(&self, devices: &[DeviceInfo]) {
        // Cloned out so the callback may replace itself.
        let callback = self.change_callback.read().clone();
        if let Some(callback) = callback {
            callback(devices);
        }

        self.subscribers.lock().retain(|subscriber| {
            let event = DeviceEvent::TopologyChanged {
                devices: devices.to_vec(),
            };
            match subscriber.try_send(event) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Dropping MIDI topology subscriber: {} events undrained",
                        SUBSCRIBER_CAPACITY
                    );
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }

    fn connected_name(&self) -> Option<String> {
        let current = self.connected.load();
        (**current).as_ref().map(|port| port.name().to_string())
    }
}

struct TopologyWatcher {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct DeviceManager {
    inner: Arc<DeviceManagerInner>,
    watcher: Mutex<Option<TopologyWatcher>>,
}

impl DeviceManager {
    pub fn builder() -> DeviceManagerBuilder {
        DeviceManagerBuilder::default()
    }

    /// Default configuration over the given backend.
    pub fn with_backend(backend: impl MidiBackend + 'static) -> Self {
        Self::from_parts(Box::new(backend), DeviceManagerConfig::default(), None)
    }

    fn from_parts(
        backend: Box<dyn MidiBackend>,
        config: DeviceManagerConfig,
        change_callback: Option<DeviceChangeCallback>,
    ) -> Self {
        Self {
            inner: Arc::new(DeviceManagerInner {
                backend,
                config,
                available: ArcSwap::from_pointee(Vec::new()),
                connected: ArcSwap::from_pointee(None),
                initialized: AtomicBool::new(false),
                change_callback: RwLock::new(change_callback),
                subscribers: Mutex::new(Vec::new()),
            }),
            watcher: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &DeviceManagerConfig {
        &self.inner.config
    }

    // ==================== Access ====================

    /// Request platform MIDI access and take the first output snapshot.
    ///
    /// Blocks until the backend answers. Returns `false` and leaves the
    /// manager empty if access is unsupported or denied. Safe to call again;
    /// each call re-requests access.
    pub fn initialize(&self) -> bool {
        let backend = &self.inner.backend;
        match backend.request_access().and_then(|()| backend.output_ports()) {
            Ok(ports) => {
                info!("MIDI access granted: {} output(s) available", ports.len());
                self.inner.available.store(Arc::new(ports));
                self.inner.initialized.store(true, Ordering::Release);
                self.start_watcher();

                if let Some(fragment) = self.inner.config.auto_connect.as_deref() {
                    if !self.connect_by_name(fragment) {
                        warn!("No MIDI output matching '{}' to auto-connect", fragment);
                    }
                }
                true
            }
            Err(e) => {
                warn!("MIDI access unavailable: {}", e);
                self.inner.initialized.store(false, Ordering::Release);
                self.inner.available.store(Arc::new(Vec::new()));
                self.inner.connected.store(Arc::new(None));
                false
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Re-enumerate now. Returns whether the device list changed; on change
    /// the snapshot is replaced before listeners run.
    pub fn refresh(&self) -> bool {
        self.inner.refresh()
    }

    fn start_watcher(&self) {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return;
        }

        let (shutdown, shutdown_receiver) = bounded::<()>(1);
        let inner = Arc::clone(&self.inner);
        let interval = self.inner.config.poll_interval();

        let spawned = thread::Builder::new()
            .name("midi-hotplug-thread".to_string())
            .spawn(move || Self::watch_topology(inner, shutdown_receiver, interval));

        match spawned {
            Ok(handle) => *watcher = Some(TopologyWatcher { shutdown, handle }),
            Err(e) => warn!("Failed to spawn MIDI hotplug thread: {}", e),
        }
    }

    fn watch_topology(
        inner: Arc<DeviceManagerInner>,
        shutdown_receiver: Receiver<()>,
        interval: Duration,
    ) {
        loop {
            match shutdown_receiver.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    inner.refresh();
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    // ==================== Devices ====================

    /// Current output snapshot, in platform enumeration order.
    pub fn list_devices(&self) -> Arc<Vec<Arc<dyn OutputPort>>> {
        self.inner.available.load_full()
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        describe(&self.inner.available.load())
    }

    pub fn device_count(&self) -> usize {
        self.inner.available.load().len()
    }

    // ==================== Connection ====================

    /// Select the output at `index` of the current snapshot, replacing any
    /// previous connection. Returns `false` and changes nothing if the
    /// manager is not initialized or the index is out of range.
    pub fn connect(&self, index: usize) -> bool {
        if !self.is_initialized() {
            debug!("Cannot connect MIDI output {}: access not initialized", index);
            return false;
        }

        let available = self.inner.available.load();
        match available.get(index) {
            Some(port) => {
                self.connect_port(index, port);
                true
            }
            None => {
                debug!(
                    "MIDI output index {} out of range ({} available)",
                    index,
                    available.len()
                );
                false
            }
        }
    }

    /// Connect the first output whose name contains `name`, ignoring case.
    pub fn connect_by_name(&self, name: &str) -> bool {
        if !self.is_initialized() {
            debug!("Cannot connect MIDI output '{}': access not initialized", name);
            return false;
        }

        // Match and store from one snapshot; the watcher may swap it at any time.
        let needle = name.to_lowercase();
        let available = self.inner.available.load();
        let found = available
            .iter()
            .enumerate()
            .find(|(_, port)| port.name().to_lowercase().contains(&needle));

        match found {
            Some((index, port)) => {
                self.connect_port(index, port);
                true
            }
            None => {
                debug!("No MIDI output device found matching '{}'", name);
                false
            }
        }
    }

    fn connect_port(&self, index: usize, port: &Arc<dyn OutputPort>) {
        info!("Connected MIDI output {}: {}", index, port.name());
        self.inner.connected.store(Arc::new(Some(Arc::clone(port))));
    }

    pub fn disconnect(&self) {
        if let Some(name) = self.connected_name() {
            info!("Disconnected MIDI output: {}", name);
        }
        self.inner.connected.store(Arc::new(None));
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load().is_some()
    }

    pub fn connected_name(&self) -> Option<String> {
        self.inner.connected_name()
    }

    pub fn connected_port(&self) -> Option<Arc<dyn OutputPort>> {
        let current = self.inner.connected.load();
        (**current).clone()
    }

    /// Endpoint on the connected port, or an unbound one if none is connected.
    pub fn endpoint(&self, channel: i32) -> ChannelEndpoint {
        ChannelEndpoint::new(self.connected_port(), channel)
    }

    pub fn instrument_endpoint(&self, instrument: &Instrument) -> ChannelEndpoint {
        ChannelEndpoint::for_instrument(self.connected_port(), instrument)
    }

    // ==================== Notifications ====================

    /// Replaces any previously set callback.
    pub fn set_change_callback<F>(&self, callback: F)
    where
        F: Fn(&[DeviceInfo]) + Send + Sync + 'static,
    {
        *self.inner.change_callback.write() = Some(Arc::new(callback));
    }

    pub fn clear_change_callback(&self) {
        *self.inner.change_callback.write() = None;
    }

    /// Independent stream of topology events. Dropping the receiver
    /// unsubscribes. A receiver left holding `SUBSCRIBER_CAPACITY` undrained
    /// events is unsubscribed too; it sees the channel disconnect once drained.
    pub fn subscribe(&self) -> Receiver<DeviceEvent> {
        let (sender, receiver) = bounded(SUBSCRIBER_CAPACITY);
        self.inner.subscribers.lock().push(sender);
        receiver
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.lock().take() {
            let _ = watcher.shutdown.send(());
            if watcher.handle.thread().id() != thread::current().id() {
                let _ = watcher.handle.join();
            }
        }
    }
}

impl std::fmt::Debug for DeviceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceManager")
            .field("initialized", &self.is_initialized())
            .field("num_devices", &self.device_count())
            .field("connected", &self.connected_name())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// # Example
/// ```ignore
/// let manager = DeviceManager::builder()
///     .client_name("stage-rig")
///     .poll_interval(Duration::from_millis(250))
///     .auto_connect("IAC")
///     .build()?;
///
/// if manager.initialize() {
///     let keys = manager.endpoint(1);
///     keys.note_on(60, 100)?;
/// }
/// ```
#[derive(Default)]
pub struct DeviceManagerBuilder {
    config: DeviceManagerConfig,
    backend: Option<Box<dyn MidiBackend>>,
    change_callback: Option<DeviceChangeCallback>,
}

impl DeviceManagerBuilder {
    pub fn config(mut self, config: DeviceManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    pub fn auto_connect(mut self, name: impl Into<String>) -> Self {
        self.config.auto_connect = Some(name.into());
        self
    }

    /// Defaults to the hardware backend when the `midi-io` feature is on.
    pub fn backend(mut self, backend: impl MidiBackend + 'static) -> Self {
        self.backend = Some(Box::new(backend));
        self
    }

    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&[DeviceInfo]) + Send + Sync + 'static,
    {
        self.change_callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<DeviceManager> {
        self.config.validate()?;

        let backend = match self.backend {
            Some(backend) => backend,
            None => default_backend(&self.config)?,
        };

        Ok(DeviceManager::from_parts(
            backend,
            self.config,
            self.change_callback,
        ))
    }
}

#[cfg(feature = "midi-io")]
fn default_backend(config: &DeviceManagerConfig) -> Result<Box<dyn MidiBackend>> {
    Ok(Box::new(crate::backend::MidirBackend::new(
        config.client_name.clone(),
    )?))
}

#[cfg(not(feature = "midi-io"))]
fn default_backend(_config: &DeviceManagerConfig) -> Result<Box<dyn MidiBackend>> {
    Err(crate::error::Error::InvalidConfig(
        "no MIDI backend configured (enable the `midi-io` feature or supply one)".to_string(),
    ))
}
