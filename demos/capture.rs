use std::time::Duration;

use camera_pull::platform::DylibBackend;
use camera_pull::{CameraManager, DeviceParams, PollResult};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let backend = DylibBackend::from_env().expect("failed to load native camera library");
    let manager = CameraManager::new(backend);

    match manager.version() {
        Ok(version) => println!("Native library version {version}"),
        Err(e) => println!("Native library version unavailable: {e}"),
    }

    // Discover devices
    let devices = manager
        .discover_devices()
        .expect("failed to discover devices");
    println!("Found {} camera(s):", devices.len());
    for (i, dev) in devices.iter().enumerate() {
        println!("  [{}] {}", i, dev.serial);
        for format in dev.parsed_formats().take(10) {
            match format {
                Ok(f) => println!(
                    "       {} {}x{} @ {} fps",
                    f.name, f.size.width, f.size.height, f.frame_rate
                ),
                Err(e) => println!("       {e}"),
            }
        }
        if dev.formats.len() > 10 {
            println!("       ... and {} more", dev.formats.len() - 10);
        }
    }

    // Device from the command line, else the first one found
    let name = match std::env::args().nth(1) {
        Some(name) => name,
        None => match devices.first() {
            Some(dev) => dev.serial.clone(),
            None => {
                println!("No cameras found.");
                return;
            }
        },
    };

    let params = DeviceParams::default()
        .with_format("Yuv_8_88")
        .with_frame_rate(30);
    println!("\nOpening {name} with {}", params.to_json().unwrap_or_default());

    let mut session = manager
        .open(&name, &params)
        .expect("failed to open device");
    if let Some(message) = session.advisory() {
        println!("Device says: {message}");
    }

    let target_frames: u64 = 60;
    let mut ticks = 0u32;
    while session.stats().frames < target_frames && ticks < 3000 {
        ticks += 1;
        match session.poll() {
            PollResult::Frame(frame) => {
                let total_bytes: usize = frame.planes().iter().map(|p| p.data.len()).sum();
                let formats: Vec<String> = frame.pixel_formats().map(|f| f.to_string()).collect();
                println!(
                    "Frame ts={} {}x{} planes={} [{}] bytes={}",
                    frame.timestamp(),
                    frame.size().width,
                    frame.size().height,
                    frame.planes().len(),
                    formats.join(", "),
                    total_bytes,
                );
            }
            PollResult::NoFrame => std::thread::sleep(Duration::from_millis(10)),
            PollResult::Failed(e) => println!("Frame lost: {e}"),
        }
    }

    let stats = session.stats();
    session.close().expect("failed to close device");
    println!(
        "\nDone. Captured {} frames ({} lost, {} buffer allocations).",
        stats.frames, stats.failed_frames, stats.reallocations
    );

    manager.shutdown().expect("failed to shut down native library");
}
