//! Hardware MIDI output via midir, with connections owned by a dedicated thread.

use super::MidiBackend;
use crate::error::{Error, Result};
use crate::port::OutputPort;
use crossbeam_channel::{bounded, Receiver, Sender};
use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

const COMMAND_QUEUE_SIZE: usize = 1024;

enum MidiOutputCommand {
    Send { port: String, bytes: Vec<u8> },
    Shutdown,
}

/// Hardware output port. Bytes are queued to the output thread, which opens
/// the underlying connection on first use.
pub struct MidirOutputPort {
    name: String,
    command_sender: Sender<MidiOutputCommand>,
}

impl OutputPort for MidirOutputPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, bytes: &[u8]) -> Result<()> {
        self.command_sender
            .try_send(MidiOutputCommand::Send {
                port: self.name.clone(),
                bytes: bytes.to_vec(),
            })
            .map_err(|e| {
                Error::MidiPort(format!(
                    "MIDI output command channel full or disconnected: {}",
                    e
                ))
            })
    }
}

pub struct MidirBackend {
    client_name: String,
    command_sender: Sender<MidiOutputCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Result<Self> {
        let client_name = client_name.into();
        let (command_sender, command_receiver) = bounded(COMMAND_QUEUE_SIZE);

        let thread_client_name = client_name.clone();
        let worker = thread::Builder::new()
            .name("midi-output-thread".to_string())
            .spawn(move || {
                Self::midi_output_thread(thread_client_name, command_receiver);
            })?;

        Ok(Self {
            client_name,
            command_sender,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    fn midi_output_thread(client_name: String, command_receiver: Receiver<MidiOutputCommand>) {
        let mut connections: HashMap<String, MidiOutputConnection> = HashMap::new();

        while let Ok(command) = command_receiver.recv() {
            let (port, bytes) = match command {
                MidiOutputCommand::Send { port, bytes } => (port, bytes),
                MidiOutputCommand::Shutdown => break,
            };

            send_cached(
                &mut connections,
                port,
                &bytes,
                |name| Self::connect_to_port(&client_name, name),
                |connection, bytes| connection.send(bytes),
            );
        }

        for (name, connection) in connections.drain() {
            debug!("Closing MIDI output '{}'", name);
            connection.close();
        }
    }

    fn connect_to_port(client_name: &str, port_name: &str) -> Result<MidiOutputConnection> {
        let midi_output = MidiOutput::new(client_name)?;

        let port = midi_output
            .ports()
            .into_iter()
            .find(|port| {
                midi_output
                    .port_name(port)
                    .map(|name| name == port_name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| {
                Error::MidiDevice(format!("MIDI output device '{}' not found", port_name))
            })?;

        Ok(midi_output.connect(&port, port_name)?)
    }
}

/// Send through the cached connection for `port`, opening it on first use.
/// A failed send evicts the connection so the next message reopens it.
fn send_cached<C, E: Display>(
    connections: &mut HashMap<String, C>,
    port: String,
    bytes: &[u8],
    open: impl FnOnce(&str) -> Result<C>,
    send: impl FnOnce(&mut C, &[u8]) -> std::result::Result<(), E>,
) -> bool {
    if !connections.contains_key(&port) {
        match open(&port) {
            Ok(connection) => {
                info!("Opened MIDI output '{}'", port);
                connections.insert(port.clone(), connection);
            }
            Err(e) => {
                warn!("Cannot open MIDI output '{}': {}", port, e);
                return false;
            }
        }
    }

    let Some(connection) = connections.get_mut(&port) else {
        return false;
    };
    match send(connection, bytes) {
        Ok(()) => true,
        Err(e) => {
            warn!("MIDI send to '{}' failed, closing connection: {}", port, e);
            connections.remove(&port);
            false
        }
    }
}

impl MidiBackend for MidirBackend {
    fn request_access(&self) -> Result<()> {
        MidiOutput::new(&self.client_name)?;
        Ok(())
    }

    fn output_ports(&self) -> Result<Vec<Arc<dyn OutputPort>>> {
        let midi_output = MidiOutput::new(&self.client_name)?;
        let ports = midi_output
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                let name = midi_output
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Unknown Device {}", index));
                Arc::new(MidirOutputPort {
                    name,
                    command_sender: self.command_sender.clone(),
                }) as Arc<dyn OutputPort>
            })
            .collect();
        Ok(ports)
    }
}

impl Drop for MidirBackend {
    fn drop(&mut self) {
        let _ = self.command_sender.send(MidiOutputCommand::Shutdown);
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}
