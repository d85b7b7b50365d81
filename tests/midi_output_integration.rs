//! MIDI output integration tests through the umbrella crate.
//!
//! Uses the in-memory backend, so no hardware is needed.
//!
//! Run with:
//! ```bash
//! cargo test -p consort --test midi_output_integration
//! ```

use consort::prelude::*;
use consort::VirtualBackend;
use std::sync::Arc;

fn test_manager(names: &[&str]) -> (DeviceManager, Arc<VirtualBackend>) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let backend = Arc::new(VirtualBackend::with_ports(names.iter().copied()));
    let manager = DeviceManager::builder()
        .backend(backend.clone())
        .poll_interval(Duration::from_secs(3600))
        .build()
        .expect("Failed to create test manager");
    (manager, backend)
}

/// One endpoint per instrument, all sharing the connected port.
#[test]
fn test_ensemble_on_one_port() -> Result<()> {
    let (manager, backend) = test_manager(&["Multitimbral Synth"]);
    assert!(manager.initialize());
    assert!(manager.connect_by_name("synth"));

    let parts = [
        Instrument::new("Bass", 2),
        Instrument::new("Pad", 3),
        Instrument::drums(),
    ];
    let endpoints: Vec<ChannelEndpoint> = parts
        .iter()
        .map(|part| manager.instrument_endpoint(part))
        .collect();

    for endpoint in &endpoints {
        endpoint.note_on(48, 96)?;
    }
    endpoints[1].send_cc(1, 64)?;

    let statuses: Vec<u8> = backend
        .port("Multitimbral Synth")
        .expect("port exists")
        .sent()
        .iter()
        .map(|bytes| bytes[0])
        .collect();
    assert_eq!(statuses, vec![0x91, 0x92, 0x99, 0xB2]);
    Ok(())
}

#[test]
fn test_clamp_law_through_prelude() -> Result<()> {
    let (manager, backend) = test_manager(&["Out"]);
    manager.initialize();
    manager.connect(0);
    let endpoint = manager.endpoint(17);
    assert_eq!(endpoint.channel(), MidiChannel::from_number(16));

    endpoint.note_on(127.5, -3)?;
    endpoint.send_program_change(200)?;
    endpoint.send_pitch_bend(9000)?;

    let sent = backend.port("Out").expect("port exists").sent();
    assert_eq!(sent[0], vec![0x9F, 127, 0]);
    assert_eq!(sent[1], vec![0xCF, 127]);
    assert_eq!(sent[2], vec![0xEF, 0x7F, 0x7F]);
    Ok(())
}

#[test]
fn test_umbrella_error_from_builder() {
    let result: Result<DeviceManager> = DeviceManager::builder()
        .backend(VirtualBackend::new())
        .client_name("")
        .build()
        .map_err(Error::from);
    assert!(matches!(result, Err(Error::Midi(_))));
}
