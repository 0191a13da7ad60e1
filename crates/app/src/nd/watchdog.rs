//! Stall detection for the render loop, the encode stage, and each
//! display's sweep pacing.
//!
//! Rather than generic heartbeats, the monitor tracks *expected* activity
//! derived from the display schedule: a side mid-sweep owes a tick every
//! [`SWEEP_TICK_MS`], a waiting side owes a render within
//! [`RENDER_INTERVAL_MS`], and an idle side owes nothing. Each producer
//! arms its own deadline; the watchdog thread only compares clocks.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::thread;
use std::time::Duration;

use tracing::error;

use sim_link::Side;

use crate::nd::config::{RENDER_INTERVAL_MS, SWEEP_TICK_MS};
use crate::nd::data::current_millis;

const WATCHDOG_POLL_INTERVAL_MS: u64 = 500;
/// A 40 ms sweep tick may slip this far before the side counts as stuck.
const SWEEP_STALL_MS: u64 = SWEEP_TICK_MS * 50;
/// Margin on top of the inter-frame pause before a pending render counts
/// as stuck.
const RENDER_STALL_MARGIN_MS: u64 = 3_500;
/// The worker loop turns over every 250 ms at the latest.
const WORKER_STALL_MS: u64 = 5_000;
/// The encoder wakes at least twice a second even when idle.
const ENCODER_STALL_MS: u64 = 5_000;
const STARTUP_GRACE_MS: u64 = 5_000;

/// Sentinel for "no activity owed".
const DISARMED: u64 = 0;

/// What the watchdog found wedged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum StalledStage {
    Worker,
    Encoder,
    Display(Side),
}

impl StalledStage {
    pub(crate) fn label(self) -> &'static str {
        match self {
            StalledStage::Worker => "render-worker",
            StalledStage::Encoder => "encoding",
            StalledStage::Display(Side::Capt) => "display-capt",
            StalledStage::Display(Side::Fo) => "display-fo",
        }
    }
}

/// Deadlines owed by the pipeline, in milliseconds since the epoch.
pub(crate) struct RenderHealth {
    worker_deadline: AtomicU64,
    encoder_deadline: AtomicU64,
    capt_deadline: AtomicU64,
    fo_deadline: AtomicU64,
    tripped: AtomicBool,
    stalled: Mutex<Option<StalledStage>>,
}

impl RenderHealth {
    pub(crate) fn new() -> Self {
        let grace = current_millis().saturating_add(STARTUP_GRACE_MS);
        Self {
            worker_deadline: AtomicU64::new(grace),
            encoder_deadline: AtomicU64::new(grace),
            capt_deadline: AtomicU64::new(DISARMED),
            fo_deadline: AtomicU64::new(DISARMED),
            tripped: AtomicBool::new(false),
            stalled: Mutex::new(None),
        }
    }

    fn side_deadline(&self, side: Side) -> &AtomicU64 {
        match side {
            Side::Capt => &self.capt_deadline,
            Side::Fo => &self.fo_deadline,
        }
    }

    /// The worker loop completed another turn.
    pub(crate) fn worker_alive(&self) {
        self.worker_deadline
            .store(current_millis() + WORKER_STALL_MS, Ordering::Relaxed);
    }

    /// The encoder woke up, idle or not.
    pub(crate) fn encoder_alive(&self) {
        self.encoder_deadline
            .store(current_millis() + ENCODER_STALL_MS, Ordering::Relaxed);
    }

    /// A sweep is running on `side`; the next tick is owed shortly.
    pub(crate) fn expect_sweep_tick(&self, side: Side) {
        self.side_deadline(side)
            .store(current_millis() + SWEEP_STALL_MS, Ordering::Relaxed);
    }

    /// `side` finished a sweep or is retrying; the next render is owed
    /// within the inter-frame pause.
    pub(crate) fn expect_render(&self, side: Side) {
        let deadline = current_millis() + RENDER_INTERVAL_MS + RENDER_STALL_MARGIN_MS;
        self.side_deadline(side).store(deadline, Ordering::Relaxed);
    }

    /// `side` went idle; it owes no further activity.
    pub(crate) fn side_idle(&self, side: Side) {
        self.side_deadline(side).store(DISARMED, Ordering::Relaxed);
    }

    /// First stage whose armed deadline has passed.
    pub(crate) fn stalled_stage(&self, now: u64) -> Option<StalledStage> {
        if now > self.worker_deadline.load(Ordering::Relaxed) {
            return Some(StalledStage::Worker);
        }
        if now > self.encoder_deadline.load(Ordering::Relaxed) {
            return Some(StalledStage::Encoder);
        }
        for side in Side::BOTH {
            let deadline = self.side_deadline(side).load(Ordering::Relaxed);
            if deadline != DISARMED && now > deadline {
                return Some(StalledStage::Display(side));
            }
        }
        None
    }

    pub(crate) fn trip(&self, stage: StalledStage) {
        if let Ok(mut guard) = self.stalled.lock() {
            *guard = Some(stage);
        }
        self.tripped.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    pub(crate) fn stall_reason(&self) -> &'static str {
        match self.stalled.lock() {
            Ok(guard) => guard.map(StalledStage::label).unwrap_or("watchdog"),
            Err(_) => "watchdog",
        }
    }
}

pub(crate) fn spawn_watchdog(
    health: Arc<RenderHealth>,
    running: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("nd-watchdog".into())
        .spawn(move || {
            while running.load(Ordering::Relaxed) && !shutdown.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(WATCHDOG_POLL_INTERVAL_MS));
                if let Some(stage) = health.stalled_stage(current_millis()) {
                    error!(
                        "Watchdog detected stalled {} stage; requesting pipeline restart",
                        stage.label()
                    );
                    health.trip(stage);
                    running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        })
        .expect("failed to spawn watchdog thread")
}
