//! Per-side scheduling: a deadline queue drives render ticks and sweep
//! ticks, and an epoch counter per side invalidates everything scheduled
//! before a reconfiguration.
//!
//! ```text
//! Idle ──(config.active)──▶ Rendering ──(sweep done)──▶ Waiting
//!   ▲                                                      │
//!   └────────────(reconfiguration / deactivation)◀─────────┘
//!                         Waiting ──(1500 ms)──▶ Rendering
//! ```

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use sim_link::Side;

use crate::nd::config::{DisplayConfig, STARTUP_STAGGER_MS};
use crate::nd::data::ThresholdData;
use sim_link::FrameMetadata;

/// Work items the queue can fire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimerAction {
    /// Start rendering a new frame for the side.
    Render,
    /// Advance the side's sweep by one angular step.
    SweepTick,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimerEntry {
    pub deadline: Instant,
    pub seq: u64,
    pub side: Side,
    /// Side epoch at scheduling time; stale entries are dropped on pop.
    pub epoch: u64,
    pub action: TimerAction,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse so the BinaryHeap pops the earliest deadline first.
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deadline-ordered timer queue for both sides.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<TimerEntry>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, side: Side, epoch: u64, action: TimerAction, delay: Duration) {
        self.seq += 1;
        self.heap.push(TimerEntry {
            deadline: Instant::now() + delay,
            seq: self.seq,
            side,
            epoch,
            action,
        });
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|entry| entry.deadline)
    }

    /// Pop the next entry whose deadline has passed.
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerEntry> {
        if self.heap.peek().is_some_and(|entry| entry.deadline <= now) {
            self.heap.pop()
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

/// Lifecycle phase of one side.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SidePhase {
    Idle,
    Rendering,
    Waiting,
}

/// A sweep in progress.
pub struct SweepState {
    pub start_angle: f64,
    pub current_angle: f64,
    /// Fully composed canvas of the frame being revealed.
    pub new_canvas: Vec<u8>,
    pub metadata: FrameMetadata,
    pub thresholds: ThresholdData,
    /// Whether the next emitted frame is the first of this sweep.
    pub first_of_sweep: bool,
}

/// All mutable state of one display side.
pub struct SideState {
    pub side: Side,
    pub config: DisplayConfig,
    pub phase: SidePhase,
    /// Bumped on reconfiguration; timers and encode jobs carry the epoch
    /// they were created under.
    pub epoch: u64,
    pub last_canvas: Option<Vec<u8>>,
    pub sweep: Option<SweepState>,
    pub startup: Instant,
    pub reset_rendering_data: bool,
}

impl SideState {
    pub fn new(side: Side, now: Instant) -> Self {
        // The first officer's phase leads the captain's so the two sweeps
        // stay offset.
        let startup = match side {
            Side::Capt => now,
            Side::Fo => now - Duration::from_millis(STARTUP_STAGGER_MS),
        };
        Self {
            side,
            config: DisplayConfig::inactive(),
            phase: SidePhase::Idle,
            epoch: 0,
            last_canvas: None,
            sweep: None,
            startup,
            reset_rendering_data: false,
        }
    }

    /// Invalidate all in-flight work for this side.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.phase = SidePhase::Idle;
        self.sweep = None;
        self.last_canvas = None;
        self.reset_rendering_data = true;
    }
}
