use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use super::metrics::MetricsAccumulator;
use super::{InputSnapshot, MetricsHandle, Scene, SceneCommand};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target_tps: u32,
    pub max_frame_delta: Duration,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval: Duration,
    /// Stop after this many ticks; `None` runs until the scene quits.
    pub max_ticks: Option<u64>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            target_tps: 60,
            max_frame_delta: Duration::from_millis(250),
            max_ticks_per_frame: 5,
            metrics_log_interval: Duration::from_secs(1),
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks_run: u64,
    pub quit_requested: bool,
}

/// Supplies one input snapshot per simulation tick.
pub trait InputSource {
    fn snapshot_for_tick(&mut self, tick: u64) -> InputSnapshot;
}

/// No input at all; the simulation advances on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn snapshot_for_tick(&mut self, _tick: u64) -> InputSnapshot {
        InputSnapshot::empty()
    }
}

/// Replays a queue of snapshots, one per tick, then falls back to idle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInput {
    queue: VecDeque<InputSnapshot>,
}

impl ScriptedInput {
    pub fn new(snapshots: impl IntoIterator<Item = InputSnapshot>) -> Self {
        Self {
            queue: snapshots.into_iter().collect(),
        }
    }

    pub fn push(&mut self, snapshot: InputSnapshot) {
        self.queue.push_back(snapshot);
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl InputSource for ScriptedInput {
    fn snapshot_for_tick(&mut self, _tick: u64) -> InputSnapshot {
        self.queue.pop_front().unwrap_or_default()
    }
}

pub fn run_headless(
    config: LoopConfig,
    scene: &mut dyn Scene,
    input: &mut dyn InputSource,
) -> LoopSummary {
    run_headless_with_metrics(config, scene, input, MetricsHandle::default())
}

/// Fixed-timestep driver without a window. Real time is accumulated and
/// converted into whole ticks; a frame that would need more than
/// `max_ticks_per_frame` ticks drops the backlog instead of spiralling.
pub fn run_headless_with_metrics(
    config: LoopConfig,
    scene: &mut dyn Scene,
    input: &mut dyn InputSource,
    metrics_handle: MetricsHandle,
) -> LoopSummary {
    let target_tps = config.target_tps.max(1);
    let max_frame_delta =
        normalize_non_zero_duration(config.max_frame_delta, Duration::from_millis(250));
    let max_ticks_per_frame = config.max_ticks_per_frame.max(1);
    let metrics_log_interval =
        normalize_non_zero_duration(config.metrics_log_interval, Duration::from_secs(1));
    let fixed_dt = Duration::from_secs_f64(1.0 / target_tps as f64);
    let fixed_dt_seconds = fixed_dt.as_secs_f32();

    info!(
        target_tps,
        max_frame_delta_ms = max_frame_delta.as_millis() as u64,
        max_ticks_per_frame,
        metrics_log_interval_ms = metrics_log_interval.as_millis() as u64,
        max_ticks = ?config.max_ticks,
        "loop_config"
    );

    scene.load();
    if let Some(title) = scene.debug_title() {
        info!(title = title.as_str(), "scene_loaded");
    }

    let mut summary = LoopSummary {
        ticks_run: 0,
        quit_requested: false,
    };
    let mut accumulator = Duration::ZERO;
    let mut last_frame_instant = Instant::now();
    let mut metrics_accumulator = MetricsAccumulator::new(metrics_log_interval);

    'frames: loop {
        let now = Instant::now();
        let raw_frame_dt = now.saturating_duration_since(last_frame_instant);
        last_frame_instant = now;
        accumulator = accumulator.saturating_add(clamp_frame_delta(raw_frame_dt, max_frame_delta));

        let step_plan = plan_sim_steps(accumulator, fixed_dt, max_ticks_per_frame);
        for _ in 0..step_plan.ticks_to_run {
            if config
                .max_ticks
                .is_some_and(|max_ticks| summary.ticks_run >= max_ticks)
            {
                break 'frames;
            }
            let snapshot = input.snapshot_for_tick(summary.ticks_run);
            let command = if snapshot.quit_requested() {
                SceneCommand::Quit
            } else {
                scene.update(fixed_dt_seconds, &snapshot)
            };
            summary.ticks_run = summary.ticks_run.saturating_add(1);
            metrics_accumulator.record_tick();
            if command == SceneCommand::Quit {
                summary.quit_requested = true;
                break 'frames;
            }
        }
        accumulator = step_plan.remaining_accumulator;
        if !step_plan.dropped_backlog.is_zero() {
            metrics_accumulator.record_dropped(step_plan.dropped_backlog);
            warn!(
                dropped_backlog_ms = step_plan.dropped_backlog.as_millis() as u64,
                max_ticks_per_frame, "sim_clamp_triggered"
            );
        }

        metrics_accumulator.record_frame(raw_frame_dt);
        if let Some(snapshot) = metrics_accumulator.maybe_snapshot(Instant::now()) {
            metrics_handle.publish(snapshot);
            info!(
                tps = snapshot.tps,
                frame_time_ms = snapshot.frame_time_ms,
                dropped_backlog_ms = snapshot.dropped_backlog_ms,
                "loop_metrics"
            );
        }

        thread::sleep(fixed_dt.saturating_sub(accumulator));
    }

    scene.unload();
    info!(
        ticks_run = summary.ticks_run,
        quit_requested = summary.quit_requested,
        "loop_finished"
    );
    summary
}

#[derive(Debug, Clone, Copy)]
struct StepPlan {
    ticks_to_run: u32,
    remaining_accumulator: Duration,
    dropped_backlog: Duration,
}

fn plan_sim_steps(
    mut accumulator: Duration,
    fixed_dt: Duration,
    max_ticks_per_frame: u32,
) -> StepPlan {
    let mut ticks_to_run = 0u32;
    while accumulator >= fixed_dt && ticks_to_run < max_ticks_per_frame {
        accumulator = accumulator.saturating_sub(fixed_dt);
        ticks_to_run = ticks_to_run.saturating_add(1);
    }

    let dropped_backlog = if accumulator >= fixed_dt {
        std::mem::take(&mut accumulator)
    } else {
        Duration::ZERO
    };
    StepPlan {
        ticks_to_run,
        remaining_accumulator: accumulator,
        dropped_backlog,
    }
}

fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
