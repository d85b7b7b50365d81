use consort_midi_io::DeviceManager;

fn main() {
    tracing_subscriber::fmt::init();

    let manager = DeviceManager::builder()
        .client_name("list-devices")
        .build()
        .unwrap();

    if !manager.initialize() {
        println!("MIDI output access unavailable");
        return;
    }

    println!("=== MIDI Output Devices ===");
    let devices = manager.devices();
    if devices.is_empty() {
        println!("  (none found)");
    }
    for dev in &devices {
        println!("  [{}] {}", dev.index, dev.name);
    }
}
