//! Channel-bound MIDI output.
//!
//! A `ChannelEndpoint` turns musical calls into channel voice messages for
//! one fixed channel and writes them to whatever port is bound. With no
//! port bound, every send is skipped and reports success.
//!
//! # Example
//! ```ignore
//! let keys = ChannelEndpoint::new(manager.connected_port(), 1);
//! keys.send_program_change(4)?;
//! keys.play_note(60, 100, Duration::from_millis(250))?;
//!
//! let drums = ChannelEndpoint::for_instrument(manager.connected_port(), &Instrument::drums());
//! drums.note_on(36, 127)?;
//! ```

use crate::channel::{Instrument, MidiChannel};
use crate::error::Result;
use crate::message::MidiOutputMessage;
use crate::port::OutputPort;
use crate::scheduler;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Shared, swappable reference to the bound port. Pending releases hold a
/// clone so they observe later `unbind` calls.
pub(crate) type PortSlot = Arc<ArcSwap<Option<Arc<dyn OutputPort>>>>;

/// Clones share the same port slot.
#[derive(Clone)]
pub struct ChannelEndpoint {
    port: PortSlot,
    channel: MidiChannel,
}

impl ChannelEndpoint {
    /// `channel` is user-facing (1-16) and saturates at the bounds.
    pub fn new(port: Option<Arc<dyn OutputPort>>, channel: i32) -> Self {
        Self::with_channel(port, MidiChannel::from_number(channel))
    }

    pub fn with_channel(port: Option<Arc<dyn OutputPort>>, channel: MidiChannel) -> Self {
        Self {
            port: Arc::new(ArcSwap::from_pointee(port)),
            channel,
        }
    }

    pub fn for_instrument(port: Option<Arc<dyn OutputPort>>, instrument: &Instrument) -> Self {
        Self::with_channel(port, instrument.channel)
    }

    pub fn channel(&self) -> MidiChannel {
        self.channel
    }

    pub fn bind(&self, port: Arc<dyn OutputPort>) {
        self.port.store(Arc::new(Some(port)));
    }

    /// Also stops any pending `play_note` releases from reaching the port.
    pub fn unbind(&self) {
        self.port.store(Arc::new(None));
    }

    pub fn is_bound(&self) -> bool {
        self.port.load().is_some()
    }

    pub fn port_name(&self) -> Option<String> {
        let current = self.port.load();
        (**current).as_ref().map(|port| port.name().to_string())
    }

    fn send(&self, message: &MidiOutputMessage) -> Result<()> {
        let current = self.port.load();
        match &**current {
            Some(port) => port.send(message.as_bytes()),
            None => {
                debug!("Cannot send MIDI message on {}: no port bound", self.channel);
                Ok(())
            }
        }
    }

    pub fn note_on(&self, note: impl Into<f64>, velocity: impl Into<f64>) -> Result<()> {
        self.send(&MidiOutputMessage::note_on(self.channel, note, velocity))
    }

    pub fn note_off(&self, note: impl Into<f64>, velocity: impl Into<f64>) -> Result<()> {
        self.send(&MidiOutputMessage::note_off(self.channel, note, velocity))
    }

    /// Note off with release velocity 0.
    pub fn release(&self, note: impl Into<f64>) -> Result<()> {
        self.note_off(note, 0)
    }

    /// Note on now, note off (velocity 0) after `duration`.
    ///
    /// The release is fire-and-forget. It is dropped if the endpoint is
    /// unbound by the time it is due. A duration too long for the system
    /// clock leaves the note held.
    pub fn play_note(
        &self,
        note: impl Into<f64>,
        velocity: impl Into<f64>,
        duration: Duration,
    ) -> Result<()> {
        if !self.is_bound() {
            debug!("Skipping timed note on {}: no port bound", self.channel);
            return Ok(());
        }

        let note = note.into();
        self.note_on(note, velocity)?;
        scheduler::schedule_release(
            Arc::clone(&self.port),
            MidiOutputMessage::note_off(self.channel, note, 0),
            duration,
        )
    }

    pub fn send_cc(&self, controller: impl Into<f64>, value: impl Into<f64>) -> Result<()> {
        self.send(&MidiOutputMessage::control_change(
            self.channel,
            controller,
            value,
        ))
    }

    pub fn send_program_change(&self, program: impl Into<f64>) -> Result<()> {
        self.send(&MidiOutputMessage::program_change(self.channel, program))
    }

    /// `value`: -8192 to 8191, 0 = center.
    pub fn send_pitch_bend(&self, value: impl Into<f64>) -> Result<()> {
        self.send(&MidiOutputMessage::pitch_bend(self.channel, value))
    }

    /// Written as given; no clamping or validation.
    pub fn send_raw_midi(&self, bytes: &[u8]) -> Result<()> {
        self.send(&MidiOutputMessage::raw(bytes))
    }

    pub fn all_notes_off(&self) -> Result<()> {
        self.send(&MidiOutputMessage::all_notes_off(self.channel))
    }
}

impl std::fmt::Debug for ChannelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelEndpoint")
            .field("channel", &self.channel)
            .field("port", &self.port_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VirtualPort;
    use crate::error::Error;
    use std::thread;

    fn endpoint_on(channel: i32) -> (ChannelEndpoint, Arc<VirtualPort>) {
        let port = Arc::new(VirtualPort::new("Test Out"));
        let shared: Arc<dyn OutputPort> = port.clone();
        let endpoint = ChannelEndpoint::new(Some(shared), channel);
        (endpoint, port)
    }

    #[test]
    fn test_note_on_channel_mapping() {
        let (ch1, port) = endpoint_on(1);
        ch1.note_on(60, 100).unwrap();
        let (ch10, port10) = endpoint_on(10);
        ch10.note_on(60, 100).unwrap();

        assert_eq!(port.sent(), vec![vec![0x90, 60, 100]]);
        assert_eq!(port10.sent(), vec![vec![0x99, 60, 100]]);
    }

    #[test]
    fn test_channel_construction_saturates() {
        let stored: Vec<u8> = [0, 1, 16, 17, -5]
            .into_iter()
            .map(|n| ChannelEndpoint::new(None, n).channel().index())
            .collect();
        assert_eq!(stored, vec![0, 0, 15, 15, 0]);
    }

    #[test]
    fn test_all_operations_encode() {
        let (endpoint, port) = endpoint_on(2);
        endpoint.note_off(60, 64).unwrap();
        endpoint.release(61).unwrap();
        endpoint.send_cc(74, 90).unwrap();
        endpoint.send_program_change(200).unwrap();
        endpoint.send_pitch_bend(0).unwrap();
        endpoint.send_raw_midi(&[0xF8]).unwrap();
        endpoint.all_notes_off().unwrap();

        assert_eq!(
            port.sent(),
            vec![
                vec![0x81, 60, 64],
                vec![0x81, 61, 0],
                vec![0xB1, 74, 90],
                vec![0xC1, 127],
                vec![0xE1, 0x00, 0x40],
                vec![0xF8],
                vec![0xB1, 123, 0],
            ]
        );
    }

    #[test]
    fn test_out_of_range_inputs_stay_in_range() {
        let (endpoint, port) = endpoint_on(1);
        endpoint.note_on(-12, 300).unwrap();
        endpoint.note_on(60.7, 99.99).unwrap();
        endpoint.send_cc(128.0_f32, -0.01_f32).unwrap();

        for bytes in port.sent() {
            assert!(bytes[1..].iter().all(|b| *b <= 127), "{bytes:?}");
        }
        assert_eq!(port.sent()[0], vec![0x90, 0, 127]);
        assert_eq!(port.sent()[1], vec![0x90, 60, 99]);
        assert_eq!(port.sent()[2], vec![0xB0, 127, 0]);
    }

    #[test]
    fn test_raw_bypasses_clamping() {
        let (endpoint, port) = endpoint_on(16);
        endpoint.send_raw_midi(&[0x93, 200, 255]).unwrap();
        assert_eq!(port.sent(), vec![vec![0x93, 200, 255]]);
    }

    #[test]
    fn test_unbound_endpoint_is_silent() {
        let endpoint = ChannelEndpoint::new(None, 1);
        assert!(!endpoint.is_bound());
        assert!(endpoint.note_on(60, 100).is_ok());
        assert!(endpoint.note_off(60, 0).is_ok());
        assert!(endpoint.send_cc(7, 100).is_ok());
        assert!(endpoint.send_program_change(1).is_ok());
        assert!(endpoint.send_pitch_bend(100).is_ok());
        assert!(endpoint.send_raw_midi(&[0xF8]).is_ok());
        assert!(endpoint.play_note(60, 100, Duration::from_millis(5)).is_ok());
        assert!(endpoint.all_notes_off().is_ok());
    }

    #[test]
    fn test_bind_and_unbind() {
        let port = Arc::new(VirtualPort::new("Late"));
        let endpoint = ChannelEndpoint::new(None, 3);
        endpoint.note_on(60, 1).unwrap();

        endpoint.bind(port.clone());
        assert_eq!(endpoint.port_name().as_deref(), Some("Late"));
        endpoint.note_on(60, 1).unwrap();

        endpoint.unbind();
        endpoint.note_on(60, 1).unwrap();

        assert_eq!(port.sent(), vec![vec![0x92, 60, 1]]);
    }

    #[test]
    fn test_clones_share_binding() {
        let (endpoint, port) = endpoint_on(1);
        let clone = endpoint.clone();
        endpoint.unbind();
        clone.note_on(60, 100).unwrap();
        assert_eq!(port.sent_count(), 0);
    }

    #[test]
    fn test_play_note_sends_release_after_delay() {
        let (endpoint, port) = endpoint_on(1);
        endpoint.play_note(64, 90, Duration::from_millis(50)).unwrap();

        assert_eq!(port.sent(), vec![vec![0x90, 64, 90]]);

        thread::sleep(Duration::from_millis(250));
        assert_eq!(port.sent(), vec![vec![0x90, 64, 90], vec![0x80, 64, 0]]);
    }

    #[test]
    fn test_play_note_release_skipped_after_unbind() {
        let (endpoint, port) = endpoint_on(1);
        endpoint.play_note(64, 90, Duration::from_millis(60)).unwrap();
        endpoint.unbind();

        thread::sleep(Duration::from_millis(250));
        assert_eq!(port.sent(), vec![vec![0x90, 64, 90]]);
    }

    #[test]
    fn test_play_note_unbounded_duration() {
        let (endpoint, port) = endpoint_on(3);
        endpoint.play_note(60, 100, Duration::MAX).unwrap();
        endpoint.play_note(62, 100, Duration::from_millis(20)).unwrap();

        thread::sleep(Duration::from_millis(250));
        assert_eq!(
            port.sent(),
            vec![vec![0x92, 60, 100], vec![0x92, 62, 100], vec![0x82, 62, 0]]
        );
    }

    #[test]
    fn test_overlapping_notes_each_release() {
        let (endpoint, port) = endpoint_on(1);
        endpoint.play_note(60, 100, Duration::from_millis(30)).unwrap();
        endpoint.play_note(60, 80, Duration::from_millis(60)).unwrap();

        thread::sleep(Duration::from_millis(300));
        let offs = port
            .sent()
            .iter()
            .filter(|bytes| bytes[0] == 0x80 && bytes[1] == 60)
            .count();
        assert_eq!(offs, 2);
    }

    #[test]
    fn test_release_survives_endpoint_drop() {
        let (endpoint, port) = endpoint_on(1);
        endpoint.play_note(48, 70, Duration::from_millis(30)).unwrap();
        drop(endpoint);

        thread::sleep(Duration::from_millis(250));
        assert_eq!(port.sent().last(), Some(&vec![0x80, 48, 0]));
    }

    #[test]
    fn test_port_failure_propagates() {
        let (endpoint, port) = endpoint_on(1);
        port.set_failing(true);
        assert!(matches!(endpoint.note_on(60, 100), Err(Error::MidiPort(_))));
    }

    #[test]
    fn test_instrument_endpoint() {
        let port = Arc::new(VirtualPort::new("Kit"));
        let shared: Arc<dyn OutputPort> = port.clone();
        let drums = ChannelEndpoint::for_instrument(Some(shared), &Instrument::drums());
        drums.note_on(36, 127).unwrap();
        assert_eq!(port.sent(), vec![vec![0x99, 36, 127]]);
    }
}
