//! `run`, `profile`, `self-check` and `health`.

use std::time::Duration;

use eyre::{Result, WrapErr};
use grinder_config::TomlFileStore;
use grinder_core::CalibrationProfile;
use grinder_core::profile::ProfileField;
use grinder_traits::LoadCell;
use serde_json::json;

use crate::Ctx;
use crate::cli::ProfileAction;

#[cfg(feature = "hardware")]
pub fn run(ctx: &Ctx) -> Result<()> {
    use grinder_core::Controller;
    use grinder_hardware::{GpioEncoder, RelayActuator};

    let sensor = open_load_cell(ctx)?;
    let pins = &ctx.cfg.pins;
    let relay = RelayActuator::open(pins.grinder_relay, ctx.cfg.hardware.relay_active_high)
        .wrap_err("open relay")?;
    let encoder = GpioEncoder::open(pins.encoder_a, pins.encoder_b, pins.encoder_button)
        .wrap_err("open encoder")?;
    let store = TomlFileStore::open(&ctx.cfg.store.path)?;

    let mut controller = Controller::builder()
        .with_sensor(sensor)
        .with_actuator(relay)
        .with_input(encoder)
        .with_store(store)
        .with_config(ctx.controller.clone())
        .try_build()?;

    tracing::info!(store = %ctx.cfg.store.path, "grinder controller starting");
    let _frames = crate::display::FramePrinter::spawn(controller.status(), ctx.json);
    controller.run(&ctx.stop)
}

#[cfg(not(feature = "hardware"))]
pub fn run(_ctx: &Ctx) -> Result<()> {
    eyre::bail!(
        "`grinder run` needs GPIO access: this binary was built without the `hardware` feature"
    )
}

#[cfg(feature = "hardware")]
fn open_load_cell(ctx: &Ctx) -> Result<grinder_hardware::Hx711LoadCell> {
    use grinder_hardware::hx711::{GAIN_A_128, Hx711, Hx711LoadCell};

    let pins = &ctx.cfg.pins;
    let adc = Hx711::open(pins.hx711_dt, pins.hx711_sck, GAIN_A_128).wrap_err("open hx711")?;
    Ok(Hx711LoadCell::new(adc, ctx.cfg.hardware.samples_per_read))
}

#[cfg(not(feature = "hardware"))]
fn open_load_cell(ctx: &Ctx) -> Result<grinder_hardware::SimLoadCell> {
    use std::sync::Arc;

    use grinder_hardware::{SimBench, SimParams};
    use grinder_traits::MonotonicClock;

    let params = SimParams {
        counts_per_gram: ctx.controller.defaults.scale_factor,
        ..SimParams::default()
    };
    Ok(SimBench::new(params, Arc::new(MonotonicClock::new())).load_cell())
}

pub fn profile(ctx: &Ctx, action: ProfileAction) -> Result<()> {
    let mut store = TomlFileStore::open(&ctx.cfg.store.path)?;
    let defaults = &ctx.controller.defaults;
    let mut p = CalibrationProfile::load(&store, defaults);

    if let ProfileAction::Reset = action {
        p.reset_to_factory(defaults);
        for field in ProfileField::ALL {
            if matches!(field, ProfileField::ScaleFactor | ProfileField::ShotCount) {
                continue;
            }
            p.persist(&mut store, field)?;
        }
        tracing::info!(path = %store.path().display(), "settings reset to factory defaults");
    }

    let grind_mode = if p.grind_mode { "continuous" } else { "impulse" };
    if ctx.json {
        println!(
            "{}",
            json!({
                "store": store.path().display().to_string(),
                "scale_factor": p.scale_factor,
                "target_weight_g": p.target_weight_g,
                "offset_g": p.offset_g,
                "cup_weight_g": p.cup_weight_g,
                "scale_mode": p.scale_mode,
                "grind_mode": grind_mode,
                "sleep_timeout_ms": p.sleep_timeout_ms,
                "shot_count": p.shot_count,
            })
        );
    } else {
        println!("Settings ({})", store.path().display());
        println!("  scale factor : {:.4}", p.scale_factor);
        println!("  target       : {:.1} g", p.target_weight_g);
        println!("  offset       : {:.2} g", p.offset_g);
        println!("  cup weight   : {:.1} g", p.cup_weight_g);
        println!(
            "  scale mode   : {}",
            if p.scale_mode { "scale only" } else { "grind by weight" }
        );
        println!("  grinder      : {grind_mode}");
        println!("  sleep after  : {} s", p.sleep_timeout_ms / 1000);
        println!("  shots        : {}", p.shot_count);
    }
    Ok(())
}

/// Open the load cell with the stored scale factor and take a few readings.
pub fn self_check(ctx: &Ctx) -> Result<()> {
    const ATTEMPTS: u32 = 5;

    let store = TomlFileStore::open(&ctx.cfg.store.path)?;
    let profile = CalibrationProfile::load(&store, &ctx.controller.defaults);
    let mut cell = open_load_cell(ctx)?;
    cell.set_scale_factor(profile.scale_factor)
        .map_err(|e| eyre::eyre!("setting scale factor: {e}"))?;

    let timeout = Duration::from_millis(ctx.cfg.timeouts.sensor_ms);
    let mut reading = None;
    for attempt in 1..=ATTEMPTS {
        match cell.try_read_grams(timeout) {
            Ok(Some(g)) => {
                reading = Some(g);
                break;
            }
            Ok(None) => tracing::debug!(attempt, "load cell not ready"),
            Err(e) => return Err(eyre::eyre!("load cell read failed: {e}")),
        }
    }
    let Some(grams) = reading else {
        return Err(grinder_core::GrinderError::Timeout.into());
    };

    let source = if cfg!(feature = "hardware") { "hx711" } else { "sim" };
    if ctx.json {
        println!(
            "{}",
            json!({ "status": "ok", "source": source, "weight_g": grams })
        );
    } else {
        println!("ok: {source} load cell responding ({grams:.1} g)");
    }
    Ok(())
}

pub fn health(ctx: &Ctx) -> Result<()> {
    let store = TomlFileStore::open(&ctx.cfg.store.path)
        .wrap_err_with(|| format!("opening settings store {}", ctx.cfg.store.path))?;
    if ctx.json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "config": ctx.config_path.display().to_string(),
                "store": store.path().display().to_string(),
                "hardware": cfg!(feature = "hardware"),
            })
        );
    } else {
        println!("ok");
        println!("  version  : {}", env!("CARGO_PKG_VERSION"));
        println!("  config   : {}", ctx.config_path.display());
        println!("  store    : {}", store.path().display());
        println!("  hardware : {}", cfg!(feature = "hardware"));
    }
    Ok(())
}
