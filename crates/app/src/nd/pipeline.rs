//! Render worker: consumes simulator messages, drives the per-side
//! schedulers, and feeds the encode stage.
//!
//! Everything that touches the world-map cache or per-side state runs on
//! this single thread; the simulator connector and the encoder communicate
//! with it purely through channels. Position updates are coalesced: the
//! inbound queue is drained before timers fire, so a render tick always
//! observes the latest state.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Once,
};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, error, info, warn};

use render_kernels::PatternMap;
use sim_link::{
    load_terrain_map, AircraftStatus, FrameMetadata, FrameSink, Side, SimMessage,
};
use terrain_core::geo::Coordinate;
use terrain_core::tiles::TileStore;
use terrain_core::worldmap::WorldMapCache;
use terrain_core::AircraftState;

use crate::nd::compositor::{embed_map, initial_sweep_angle, strip_metadata, sweep_frame};
use crate::nd::config::{
    DisplayConfig, RenderSettings, RENDER_INTERVAL_MS, SWEEP_ANGULAR_STEP, SWEEP_FINAL_ANGLE,
    SWEEP_TICK_MS,
};
use crate::nd::data::{SharedTransitions, SideMap, ThresholdData};
use crate::nd::encoding::{clear_transition, spawn_encode_worker, EncodeJob, SideEpochs};
use crate::nd::patternmap::pattern_map_for;
use crate::nd::renderer::{render_side_frame, warmup};
use crate::nd::scheduler::{SidePhase, SideState, SweepState, TimerAction, TimerQueue};
use crate::nd::watchdog::{spawn_watchdog, RenderHealth};

/// Poll ceiling of the worker loop; also bounds shutdown latency.
const WORKER_POLL_MS: u64 = 250;
const ENCODE_QUEUE_DEPTH: usize = 8;

/// Run the render worker, restarting on recoverable faults.
pub fn run(
    settings: RenderSettings,
    messages: Receiver<SimMessage>,
    sink: Arc<dyn FrameSink>,
    transitions: SharedTransitions,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();
    let handler_shutdown = shutdown.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler({
            let handler_shutdown = handler_shutdown.clone();
            move || {
                handler_shutdown.store(true, Ordering::SeqCst);
            }
        }) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let mut attempt: u32 = 0;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match run_pipeline_once(
            &settings,
            messages.clone(),
            sink.clone(),
            transitions.clone(),
            shutdown.clone(),
        )? {
            PipelineOutcome::Graceful => break,
            PipelineOutcome::Restart(reason) => {
                attempt = attempt.saturating_add(1);
                warn!("Render worker restart requested (reason: {reason}), attempt #{attempt}");
                thread::sleep(Duration::from_secs(1));
            }
        }
    }
    Ok(())
}

/// Result of a single worker run.
enum PipelineOutcome {
    Graceful,
    Restart(&'static str),
}

fn run_pipeline_once(
    settings: &RenderSettings,
    messages: Receiver<SimMessage>,
    sink: Arc<dyn FrameSink>,
    transitions: SharedTransitions,
    shutdown: Arc<AtomicBool>,
) -> Result<PipelineOutcome> {
    let pipeline_span = tracing::info_span!(
        "nd.pipeline",
        visibility_range = settings.visibility_range_nm,
        port = settings.http_port
    );
    let _pipeline_guard = pipeline_span.enter();

    let store = match settings.terrain_map.as_deref() {
        Some(path) => match load_terrain_map(path) {
            Ok((map, decoder)) => {
                info!(tiles = map.tile_count(), "terrain map loaded");
                TileStore::new(map, decoder, settings.visibility_range_nm)
            }
            Err(err) => {
                error!("terrain map {} unusable ({err}); starting with an empty world", path.display());
                TileStore::empty(settings.visibility_range_nm)
            }
        },
        None => {
            warn!("no terrain map configured; starting with an empty world");
            TileStore::empty(settings.visibility_range_nm)
        }
    };

    let health = Arc::new(RenderHealth::new());
    let running = Arc::new(AtomicBool::new(true));
    let watchdog_handle = spawn_watchdog(health.clone(), running.clone(), shutdown.clone());

    let epochs = Arc::new(SideEpochs::default());
    let (encode_tx, encode_rx) = crossbeam_channel::bounded::<EncodeJob>(ENCODE_QUEUE_DEPTH);
    let encode_handle = spawn_encode_worker(
        encode_rx,
        sink.clone(),
        transitions.clone(),
        epochs.clone(),
        health.clone(),
        running.clone(),
    );

    warmup(&pattern_map_for(sim_link::TerrainRenderingMode::ArcMode))
        .context("render kernel warm-up failed")?;

    let now = Instant::now();
    let mut worker = RenderWorker {
        store,
        world: WorldMapCache::new(),
        sides: SideMap::new(SideState::new(Side::Capt, now), SideState::new(Side::Fo, now)),
        aircraft: None,
        patterns: None,
        queue: TimerQueue::new(),
        epochs,
        encode_tx,
        sink: sink.clone(),
        transitions,
        health: health.clone(),
    };

    while running.load(Ordering::Relaxed) {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        health.worker_alive();

        let timeout = worker
            .queue
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_millis(WORKER_POLL_MS))
            .min(Duration::from_millis(WORKER_POLL_MS));
        match messages.recv_timeout(timeout) {
            Ok(message) => worker.handle_message(message),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("simulator channel closed, stopping render worker");
                break;
            }
        }
        // Coalesce: a render tick always sees the latest state.
        while let Ok(message) = messages.try_recv() {
            worker.handle_message(message);
        }

        let now = Instant::now();
        while let Some(entry) = worker.queue.pop_due(now) {
            if entry.epoch != worker.sides.get(entry.side).epoch {
                continue;
            }
            match entry.action {
                TimerAction::Render => worker.render_tick(entry.side),
                TimerAction::SweepTick => worker.sweep_tick(entry.side),
            }
        }
    }

    // Abnormal termination still tells every active consumer that its
    // frame stream ended.
    if health.is_tripped() {
        for side in Side::BOTH {
            if worker.sides.get(side).config.active {
                let _ = worker.sink.send_metadata(side, &FrameMetadata::reset());
            }
        }
    }

    debug!("Stopping render worker");
    worker.queue.clear();
    running.store(false, Ordering::SeqCst);
    drop(worker);
    let _ = encode_handle.join();
    let _ = watchdog_handle.join();

    if health.is_tripped() {
        return Ok(PipelineOutcome::Restart(health.stall_reason()));
    }
    Ok(PipelineOutcome::Graceful)
}

/// Single-threaded state of the render worker.
struct RenderWorker {
    store: TileStore,
    world: WorldMapCache,
    sides: SideMap<SideState>,
    aircraft: Option<AircraftState>,
    patterns: Option<Arc<PatternMap>>,
    queue: TimerQueue,
    epochs: Arc<SideEpochs>,
    encode_tx: Sender<EncodeJob>,
    sink: Arc<dyn FrameSink>,
    transitions: SharedTransitions,
    health: Arc<RenderHealth>,
}

impl RenderWorker {
    fn handle_message(&mut self, message: SimMessage) {
        match message {
            SimMessage::ConnectionLost => {
                info!("simulator connection lost; stopping both displays");
                for side in Side::BOTH {
                    self.stop_side(side);
                }
                self.world.release();
                self.aircraft = None;
            }
            SimMessage::PositionUpdate(position) => {
                let position = Coordinate::new(position.latitude, position.longitude);
                if let Some(aircraft) = self.aircraft.as_mut() {
                    aircraft.position = position;
                }
                self.world.update_position(&mut self.store, position);
            }
            SimMessage::AircraftStatusUpdate(status) => self.handle_status(*status),
        }
    }

    fn handle_status(&mut self, status: AircraftStatus) {
        if self.patterns.is_none() {
            self.patterns = Some(Arc::new(pattern_map_for(status.rendering_mode)));
            debug!(mode = ?status.rendering_mode, "stipple pattern map initialised");
        }

        if status.adiru_data_valid {
            let position = Coordinate::new(status.latitude, status.longitude);
            self.aircraft = Some(AircraftState {
                position,
                altitude: status.altitude,
                heading: status.heading,
                vertical_speed: status.vertical_speed,
                gear_is_down: status.gear_is_down,
                destination: status.destination_data_valid.then(|| {
                    Coordinate::new(status.destination_latitude, status.destination_longitude)
                }),
            });
            self.world.update_position(&mut self.store, position);
        } else {
            warn!("aircraft status without valid inertial data; rendering paused");
            self.aircraft = None;
        }

        self.apply_config(Side::Capt, DisplayConfig::from_message(&status.nd_capt));
        self.apply_config(Side::Fo, DisplayConfig::from_message(&status.nd_fo));
    }

    fn apply_config(&mut self, side: Side, next: DisplayConfig) {
        let state = self.sides.get_mut(side);
        if !state.config.requires_reset(&next) {
            state.config = next;
            return;
        }

        let was_running = state.phase != SidePhase::Idle;
        state.config = next;
        if was_running {
            state.reset();
            let epoch = state.epoch;
            self.epochs.set(side, epoch);
            clear_transition(&self.transitions, side);
            self.health.side_idle(side);
            metrics::counter!("nd_resets_total", "side" => side.label()).increment(1);
            if self.sink.send_metadata(side, &FrameMetadata::reset()).is_err() {
                warn!(side = side.label(), "reset metadata could not be delivered");
            }
        }
        if next.active {
            let epoch = self.sides.get(side).epoch;
            self.health.expect_render(side);
            self.queue
                .schedule(side, epoch, TimerAction::Render, Duration::ZERO);
        }
    }

    /// Deactivate a side, e.g. on connection loss.
    fn stop_side(&mut self, side: Side) {
        self.health.side_idle(side);
        let state = self.sides.get_mut(side);
        let was_running = state.phase != SidePhase::Idle;
        state.config.active = false;
        if was_running {
            state.reset();
            let epoch = state.epoch;
            self.epochs.set(side, epoch);
            clear_transition(&self.transitions, side);
            if self.sink.send_metadata(side, &FrameMetadata::reset()).is_err() {
                warn!(side = side.label(), "reset metadata could not be delivered");
            }
        }
    }

    fn render_tick(&mut self, side: Side) {
        let Some(patterns) = self.patterns.clone() else {
            warn!(side = side.label(), "no display configuration yet; render tick skipped");
            return;
        };
        let Some(aircraft) = self.aircraft else {
            warn!(side = side.label(), "no aircraft position; render tick skipped");
            let epoch = self.sides.get(side).epoch;
            self.health.expect_render(side);
            self.queue.schedule(
                side,
                epoch,
                TimerAction::Render,
                Duration::from_millis(RENDER_INTERVAL_MS),
            );
            return;
        };

        self.world.update_position(&mut self.store, aircraft.position);

        let state = self.sides.get_mut(side);
        if !state.config.active {
            state.phase = SidePhase::Idle;
            self.health.side_idle(side);
            return;
        }

        let render_span = tracing::info_span!(
            "nd.render",
            side = side.label(),
            range = state.config.range_nm,
            arc = state.config.arc_mode
        );
        let _render_guard = render_span.enter();
        let render_start = Instant::now();

        let frame = match render_side_frame(&self.world, &aircraft, &state.config, &patterns) {
            Ok(frame) => frame,
            Err(err) => {
                error!(side = side.label(), "render failed: {err:#}");
                let epoch = state.epoch;
                self.health.expect_render(side);
                self.queue.schedule(
                    side,
                    epoch,
                    TimerAction::Render,
                    Duration::from_millis(RENDER_INTERVAL_MS),
                );
                return;
            }
        };
        metrics::histogram!("nd_render_seconds").record(render_start.elapsed().as_secs_f64());

        let map_rgba = strip_metadata(&frame);
        let new_canvas = embed_map(&map_rgba, &state.config);
        let elevations = frame.thresholds.metadata(frame.cutoff_altitude);

        let fresh_sweep = state.last_canvas.is_none();
        let start_angle = if fresh_sweep {
            initial_sweep_angle(state.startup.elapsed().as_millis() as u64)
        } else {
            0.0
        };

        state.phase = SidePhase::Rendering;
        state.reset_rendering_data = false;
        state.sweep = Some(SweepState {
            start_angle,
            current_angle: start_angle,
            new_canvas,
            metadata: FrameMetadata {
                minimum_elevation: elevations.minimum,
                minimum_elevation_mode: elevations.minimum_mode,
                maximum_elevation: elevations.maximum,
                maximum_elevation_mode: elevations.maximum_mode,
                first_frame: fresh_sweep,
                display_range: state.config.range_nm,
                display_mode: state.config.efis_mode,
                frame_byte_count: 0,
            },
            thresholds: ThresholdData::from_thresholds(&frame.thresholds, frame.cutoff_altitude),
            first_of_sweep: true,
        });
        let epoch = state.epoch;
        self.health.expect_sweep_tick(side);
        self.queue
            .schedule(side, epoch, TimerAction::SweepTick, Duration::ZERO);
    }

    fn sweep_tick(&mut self, side: Side) {
        let state = self.sides.get_mut(side);
        let Some(sweep) = state.sweep.as_mut() else {
            return;
        };

        sweep.current_angle = (sweep.current_angle + SWEEP_ANGULAR_STEP).min(SWEEP_FINAL_ANGLE);
        let canvas = sweep_frame(
            &sweep.new_canvas,
            state.last_canvas.as_deref(),
            &state.config,
            sweep.start_angle,
            sweep.current_angle,
        );

        let first_emit = sweep.first_of_sweep;
        sweep.first_of_sweep = false;
        let mut metadata = sweep.metadata;
        metadata.first_frame = metadata.first_frame && first_emit;

        let job = EncodeJob {
            side,
            canvas,
            metadata,
            thresholds: sweep.thresholds,
            epoch: state.epoch,
            starts_transition: first_emit,
        };
        match self.encode_tx.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(side = side.label(), "encode backlog, transition frame dropped");
                metrics::counter!("nd_dropped_frames_total").increment(1);
            }
            Err(TrySendError::Disconnected(_)) => {
                error!("encode stage terminated unexpectedly");
                return;
            }
        }

        let epoch = state.epoch;
        if sweep.current_angle >= SWEEP_FINAL_ANGLE {
            if let Some(done) = state.sweep.take() {
                state.last_canvas = Some(done.new_canvas);
            }
            state.phase = SidePhase::Waiting;
            self.health.expect_render(side);
            self.queue.schedule(
                side,
                epoch,
                TimerAction::Render,
                Duration::from_millis(RENDER_INTERVAL_MS),
            );
        } else {
            self.health.expect_sweep_tick(side);
            self.queue.schedule(
                side,
                epoch,
                TimerAction::SweepTick,
                Duration::from_millis(SWEEP_TICK_MS),
            );
        }
    }
}
