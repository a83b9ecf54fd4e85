//! `grinder simulate`: the real controller against a simulated bench.
//!
//! A scenario thread plays the barista: it places the cup, waits for the
//! shot to end, then lifts the cup and stops the run.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use eyre::{Result, WrapErr};
use grinder_config::TomlFileStore;
use grinder_core::mocks::MemoryStore;
use grinder_core::{CalibrationProfile, Controller, ProcessState, StatusBoard, StatusSnapshot};
use grinder_hardware::{SimBench, SimEncoder, SimParams};
use grinder_traits::clock::Clock;
use grinder_traits::{MonotonicClock, SettingsStore};
use serde_json::json;

use crate::Ctx;
use crate::display::FramePrinter;

const POLL: Duration = Duration::from_millis(50);
/// How long the empty scale is watched after the cup is lifted.
const AFTERMATH: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct SimOptions {
    pub seconds: f64,
    pub cup: Option<f64>,
    pub place_after_ms: u64,
    pub lift_after_ms: u64,
    pub grind_rate: f64,
    pub store: Option<PathBuf>,
}

pub fn simulate(ctx: &Ctx, opts: &SimOptions) -> Result<()> {
    if !(opts.seconds.is_finite() && opts.seconds > 0.0) {
        eyre::bail!("--seconds must be > 0");
    }
    if !(opts.grind_rate.is_finite() && opts.grind_rate > 0.0) {
        eyre::bail!("--grind-rate must be > 0");
    }
    match &opts.store {
        Some(path) => {
            let store = TomlFileStore::open(path)
                .wrap_err_with(|| format!("opening settings store {}", path.display()))?;
            simulate_with(ctx, opts, store)
        }
        None => simulate_with(ctx, opts, MemoryStore::default()),
    }
}

fn simulate_with<S: SettingsStore>(ctx: &Ctx, opts: &SimOptions, store: S) -> Result<()> {
    let profile = CalibrationProfile::load(&store, &ctx.controller.defaults);
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    // Counts per gram match the stored factor so the sim reads true grams.
    let bench = SimBench::new(
        SimParams {
            counts_per_gram: profile.scale_factor,
            grind_rate_gps: opts.grind_rate,
            ..SimParams::default()
        },
        Arc::clone(&clock),
    );

    let mut controller = Controller::builder()
        .with_sensor(bench.load_cell())
        .with_actuator(bench.grinder())
        .with_input(SimEncoder::default())
        .with_store(store)
        .with_config(ctx.controller.clone())
        .with_clock(clock)
        .try_build()?;

    let board = controller.status();
    let frames = FramePrinter::spawn(Arc::clone(&board), ctx.json);
    let scenario = {
        let bench = bench.clone();
        let board = Arc::clone(&board);
        let stop = Arc::clone(&ctx.stop);
        let plan = Plan {
            cup: opts.cup,
            place_after: Duration::from_millis(opts.place_after_ms),
            lift_after: Duration::from_millis(opts.lift_after_ms),
        };
        thread::Builder::new()
            .name("scenario".into())
            .spawn(move || play(&bench, &board, &stop, &plan))
            .wrap_err("starting scenario thread")?
    };

    let res = controller.run_for(Duration::from_secs_f64(opts.seconds), &ctx.stop);
    ctx.stop.store(true, Ordering::Relaxed);
    let outcome = scenario
        .join()
        .map_err(|_| eyre::eyre!("scenario thread panicked"))?;
    drop(frames);
    res?;

    tracing::info!(
        grinder_starts = bench.grinder_starts(),
        load_g = bench.load_g(),
        "simulation finished"
    );
    report(ctx.json, opts.cup, outcome, &controller.snapshot())
}

struct Plan {
    cup: Option<f64>,
    place_after: Duration,
    lift_after: Duration,
}

/// Returns the snapshot taken just before the cup was lifted, if a shot ended.
fn play(
    bench: &SimBench,
    board: &StatusBoard,
    stop: &AtomicBool,
    plan: &Plan,
) -> Option<StatusSnapshot> {
    let cup = plan.cup?;
    if !sleep_unless_stopped(stop, plan.place_after) {
        return None;
    }
    bench.set_load(cup);
    tracing::info!(cup_g = cup, "cup placed");

    loop {
        if stop.load(Ordering::Relaxed) {
            return None;
        }
        let state = board.snapshot().state;
        if matches!(
            state,
            ProcessState::GrindingFinished | ProcessState::GrindingFailed
        ) {
            break;
        }
        thread::sleep(POLL);
    }

    // Let the dose settle so the learned offset is part of the result.
    let finished = board.snapshot().state == ProcessState::GrindingFinished;
    if finished && !sleep_unless_stopped(stop, plan.lift_after) {
        return Some(board.snapshot());
    }
    let result = board.snapshot();
    bench.set_load(0.0);
    tracing::info!("cup lifted");
    sleep_unless_stopped(stop, AFTERMATH);
    stop.store(true, Ordering::Relaxed);
    Some(result)
}

fn sleep_unless_stopped(stop: &AtomicBool, d: Duration) -> bool {
    let until = Instant::now() + d;
    while Instant::now() < until {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(POLL.min(until.saturating_duration_since(Instant::now())));
    }
    !stop.load(Ordering::Relaxed)
}

fn report(
    json: bool,
    cup: Option<f64>,
    outcome: Option<StatusSnapshot>,
    last: &StatusSnapshot,
) -> Result<()> {
    let Some(shot) = outcome else {
        if cup.is_some() {
            eyre::bail!("simulation ended before the shot finished");
        }
        if json {
            println!(
                "{}",
                json!({
                    "event": "summary",
                    "state": last.state.as_str(),
                    "weight_g": last.weight_g,
                    "shot_count": last.profile.shot_count,
                })
            );
        } else {
            println!("Idle run finished at {:.1}g", last.weight_g);
        }
        return Ok(());
    };

    if shot.state == ProcessState::GrindingFailed {
        let reason = shot
            .fail_reason
            .ok_or_else(|| eyre::eyre!("shot failed without a reason"))?;
        return Err(eyre::Report::new(reason));
    }

    let dose = shot.dose_g.unwrap_or(0.0);
    let target = shot
        .session
        .map_or(shot.profile.target_weight_g, |s| s.target_weight_g);
    let elapsed_ms = shot.grind_elapsed_ms.unwrap_or(0);
    if json {
        println!(
            "{}",
            json!({
                "event": "summary",
                "state": shot.state.as_str(),
                "dose_g": dose,
                "target_g": target,
                "elapsed_ms": elapsed_ms,
                "offset_g": last.profile.offset_g,
                "shot_count": last.profile.shot_count,
            })
        );
    } else {
        #[allow(clippy::cast_precision_loss)]
        let secs = elapsed_ms as f64 / 1000.0;
        println!(
            "Shot finished: {dose:.1}g (target {target:.1}g) in {secs:.1}s; offset now {:.2}g, shots {}",
            last.profile.offset_g, last.profile.shot_count
        );
    }
    Ok(())
}
