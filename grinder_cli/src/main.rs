mod cli;
mod commands;
mod display;
mod error_fmt;
mod simulate;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::{Result, WrapErr};
use grinder_config::Config;
use grinder_core::ControllerCfg;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

/// Everything a subcommand needs once the config is loaded.
pub struct Ctx {
    pub config_path: PathBuf,
    pub cfg: Config,
    pub controller: ControllerCfg,
    pub json: bool,
    pub stop: Arc<AtomicBool>,
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .wrap_err("installing Ctrl-C handler")?;
    }

    let ctx = Ctx {
        config_path: cli.config,
        controller: ControllerCfg::from(&cfg),
        cfg,
        json: cli.json,
        stop,
    };

    match cli.cmd {
        Commands::Run => commands::run(&ctx),
        Commands::Simulate {
            seconds,
            cup,
            place_after_ms,
            lift_after_ms,
            grind_rate,
            store,
        } => simulate::simulate(
            &ctx,
            &simulate::SimOptions {
                seconds,
                cup,
                place_after_ms,
                lift_after_ms,
                grind_rate,
                store,
            },
        ),
        Commands::Profile { action } => commands::profile(&ctx, action),
        Commands::SelfCheck => commands::self_check(&ctx),
        Commands::Health => commands::health(&ctx),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let cfg = grinder_config::load_toml(&text).wrap_err("invalid configuration")?;
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

fn init_tracing(json: bool, level: &str, logging: &grinder_config::Logging) -> Result<()> {
    let level = logging.level.as_deref().map_or(level, |cfg_level| {
        // An explicit --log-level wins over the config file.
        if level == "info" { cfg_level } else { level }
    });
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(fmt::layer().json().with_writer(std::io::stderr).boxed());
    } else {
        layers.push(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        );
    }

    if let Some(file) = logging.file.as_deref() {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file {file:?} has no file name"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            "never" => tracing_appender::rolling::never(dir, name),
            other => eyre::bail!("invalid configuration: logging.rotation {other:?}"),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        layers.push(fmt::layer().json().with_ansi(false).with_writer(writer).boxed());
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .wrap_err("installing tracing subscriber")?;
    Ok(())
}
