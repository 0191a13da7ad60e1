//! End-to-end scenarios: a synthetic terrain map on disk, a live pipeline,
//! and a channel sink standing in for the simulator bridge.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use sim_link::{
    message_channel, sink_channel, AircraftStatus, NavigationDisplay, Side, SimMessage,
    SinkEvent, TerrainRenderingMode,
};
use terrain_nd::nd::config::{RenderSettings, BACKGROUND_RGBA, MAP_START_OFFSET_Y};
use terrain_nd::nd::data::shared_transitions;
use terrain_nd::nd::pipeline;

const INNSBRUCK_LAT: f64 = 47.26081085;
const INNSBRUCK_LON: f64 = 11.34965897;

/// Write a 1°×1° terrain map with flat tiles around Innsbruck.
fn write_terrain_map(name: &str, elevation: i16) -> PathBuf {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&180i16.to_le_bytes());
    bytes.extend_from_slice(&360i16.to_le_bytes());
    bytes.push(1);
    bytes.push(1);
    bytes.extend_from_slice(&1u16.to_le_bytes());
    for lat in 46..=48 {
        for lon in 10..=12 {
            bytes.extend_from_slice(&(lat as f32).to_le_bytes());
            bytes.extend_from_slice(&(lon as f32).to_le_bytes());
            bytes.extend_from_slice(&10u16.to_le_bytes());
            bytes.extend_from_slice(&10u16.to_le_bytes());
            for _ in 0..100 {
                bytes.extend_from_slice(&elevation.to_le_bytes());
            }
        }
    }
    let path = std::env::temp_dir().join(format!(
        "terrain-nd-{}-{}.map",
        name,
        std::process::id()
    ));
    std::fs::write(&path, bytes).expect("terrain map written");
    path
}

struct Harness {
    messages: Sender<SimMessage>,
    events: Receiver<SinkEvent>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Harness {
    fn start(name: &str) -> Self {
        let settings = RenderSettings {
            terrain_map: Some(write_terrain_map(name, 1900)),
            visibility_range_nm: 40.0,
            http_port: 0,
            verbose: false,
        };
        let (message_tx, message_rx) = message_channel(32);
        let (sink, events) = sink_channel(1024);
        let shutdown = Arc::new(AtomicBool::new(false));
        let transitions = shared_transitions();

        let worker_shutdown = shutdown.clone();
        let worker = std::thread::spawn(move || {
            pipeline::run(
                settings,
                message_rx,
                Arc::new(sink),
                transitions,
                worker_shutdown,
            )
            .expect("pipeline run");
        });

        Self {
            messages: message_tx,
            events,
            shutdown,
            worker: Some(worker),
        }
    }

    fn send_status(&self, capt: NavigationDisplay) {
        let status = AircraftStatus {
            adiru_data_valid: true,
            latitude: INNSBRUCK_LAT,
            longitude: INNSBRUCK_LON,
            altitude: 1904,
            heading: 260.0,
            vertical_speed: 0,
            gear_is_down: true,
            destination_data_valid: false,
            destination_latitude: 0.0,
            destination_longitude: 0.0,
            nd_capt: capt,
            nd_fo: NavigationDisplay::inactive(),
            rendering_mode: TerrainRenderingMode::ArcMode,
        };
        self.messages
            .send(SimMessage::AircraftStatusUpdate(Box::new(status)))
            .expect("status delivered");
    }

    fn next_event(&self, timeout: Duration) -> Option<SinkEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    fn stop(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        drop(self.messages);
        if let Some(worker) = self.worker.take() {
            // Drain so the encoder never blocks on a full sink.
            let events = self.events.clone();
            let drainer = std::thread::spawn(move || while events.recv().is_ok() {});
            worker.join().expect("worker joined");
            drop(self.events);
            let _ = drainer.join();
        }
    }
}

fn arc_display(range_nm: u32, active: bool) -> NavigationDisplay {
    NavigationDisplay {
        active,
        arc_mode: true,
        range_nm,
        efis_mode: 0,
    }
}

#[test]
fn startup_sweep_emits_first_frame_with_metadata() {
    let harness = Harness::start("startup");
    harness.send_status(arc_display(10, true));

    // First emission: metadata announcing the new sweep.
    let metadata = loop {
        match harness.next_event(Duration::from_secs(30)) {
            Some(SinkEvent::Metadata { side, metadata }) => {
                assert_eq!(side, Side::Capt);
                break metadata;
            }
            Some(SinkEvent::Frame { .. }) => panic!("frame before metadata"),
            None => panic!("no emission within timeout"),
        }
    };
    assert!(metadata.first_frame);
    assert_eq!(metadata.display_range, 10);
    assert_eq!(metadata.display_mode, 0);
    assert!(metadata.frame_byte_count > 0);
    // Terrain at 1,904 ft with gear down keeps the minimum above the
    // look-down band floor.
    assert!(metadata.minimum_elevation >= 1904 - 2000);

    // The paired frame is a full-canvas PNG with background outside the map
    // region.
    let png = loop {
        match harness.next_event(Duration::from_secs(10)) {
            Some(SinkEvent::Frame { png, .. }) => break png,
            Some(SinkEvent::Metadata { .. }) => continue,
            None => panic!("frame missing"),
        }
    };
    let decoded = image::load_from_memory(&png).expect("valid png").to_rgba8();
    assert_eq!(decoded.dimensions(), (768, 768));
    assert_eq!(decoded.get_pixel(0, 0).0, BACKGROUND_RGBA);
    assert_eq!(decoded.get_pixel(767, 767).0, BACKGROUND_RGBA);
    assert_eq!(
        decoded.get_pixel(384, (MAP_START_OFFSET_Y - 1) as u32).0,
        BACKGROUND_RGBA
    );

    // One sweep is at most 23 transition frames, and only its first frame
    // carries the first-frame flag.
    let mut frames = 1usize;
    let mut first_flags = 1usize;
    let deadline = Instant::now() + Duration::from_secs(4);
    while Instant::now() < deadline && frames < 24 {
        match harness.next_event(Duration::from_millis(500)) {
            Some(SinkEvent::Frame { .. }) => frames += 1,
            Some(SinkEvent::Metadata { metadata, .. }) => {
                if metadata.first_frame {
                    first_flags += 1;
                }
            }
            None => break,
        }
    }
    assert!(frames >= 2, "sweep produced only {frames} frames");
    assert_eq!(first_flags, 1, "first-frame flag repeated");

    harness.stop();
}

#[test]
fn range_change_resets_and_restarts_the_sweep() {
    let harness = Harness::start("range-change");
    harness.send_status(arc_display(10, true));

    // Wait for the first sweep to be underway.
    let mut seen_frames = 0;
    while seen_frames < 3 {
        match harness.next_event(Duration::from_secs(30)) {
            Some(SinkEvent::Frame { .. }) => seen_frames += 1,
            Some(_) => {}
            None => panic!("first sweep never started"),
        }
    }

    harness.send_status(arc_display(20, true));

    // A reset metadata must arrive, then a fresh sweep at the new range.
    let mut saw_reset = false;
    let deadline = Instant::now() + Duration::from_secs(30);
    let restart = loop {
        assert!(Instant::now() < deadline, "no restart after reconfiguration");
        match harness.next_event(Duration::from_secs(10)) {
            Some(SinkEvent::Metadata { metadata, .. }) => {
                if metadata.is_reset() {
                    saw_reset = true;
                    assert_eq!(metadata.display_range, 0);
                    assert_eq!(metadata.frame_byte_count, 0);
                } else if saw_reset && metadata.first_frame {
                    break metadata;
                }
            }
            Some(SinkEvent::Frame { .. }) => {}
            None => panic!("emission stalled"),
        }
    };
    assert_eq!(restart.display_range, 20);

    harness.stop();
}

#[test]
fn deactivation_emits_reset_and_stops_frames() {
    let harness = Harness::start("deactivate");
    harness.send_status(arc_display(10, true));

    // Let the first sweep start.
    loop {
        match harness.next_event(Duration::from_secs(30)) {
            Some(SinkEvent::Frame { .. }) => break,
            Some(_) => {}
            None => panic!("no frames emitted"),
        }
    }

    harness.send_status(arc_display(10, false));

    let deadline = Instant::now() + Duration::from_secs(30);
    loop {
        assert!(Instant::now() < deadline, "reset metadata missing");
        match harness.next_event(Duration::from_secs(10)) {
            Some(SinkEvent::Metadata { metadata, .. }) if metadata.is_reset() => break,
            Some(_) => {}
            None => panic!("emission stalled before reset"),
        }
    }

    // Allow in-flight encode jobs to drain, then expect silence.
    std::thread::sleep(Duration::from_millis(500));
    while harness.next_event(Duration::from_millis(10)).is_some() {}
    assert!(
        harness.next_event(Duration::from_millis(2000)).is_none(),
        "frames emitted while deactivated"
    );

    harness.stop();
}
