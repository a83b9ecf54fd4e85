//! Background acquisition.
//!
//! Spawns a thread that reads the shared load cell, runs the `SignalFilter`
//! and sends timestamped results over a bounded channel. Timestamp and value
//! travel together in one message, so the consumer never sees one without
//! the other.
//!
//! Each `Sampler` owns exactly one thread, stopped and joined on drop.
use crossbeam_channel as xch;
use grinder_traits::LoadCell;
use grinder_traits::clock::Clock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::FilterCfg;
use crate::filter::SignalFilter;
use crate::hw_error::map_hw_error;

const CHANNEL_CAPACITY: usize = 256;
/// Pause after a failed read so a dead sensor cannot spin the thread.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Sample { ts_ms: u64, grams: f64 },
    NotReady { ts_ms: u64 },
}

/// Switches the control task flips on the acquisition thread.
#[derive(Debug, Clone, Default)]
pub struct SamplerFlags {
    reset_filter: Arc<AtomicBool>,
    diagnostics: Arc<AtomicBool>,
}

impl SamplerFlags {
    /// Ask the thread to drop filter state before the next reading.
    pub fn request_filter_reset(&self) {
        self.reset_filter.store(true, Ordering::Release);
    }

    /// Log every reading at info level while set.
    pub fn set_diagnostics(&self, on: bool) {
        self.diagnostics.store(on, Ordering::Relaxed);
    }

    pub fn diagnostics(&self) -> bool {
        self.diagnostics.load(Ordering::Relaxed)
    }
}

pub struct Sampler {
    rx: xch::Receiver<Reading>,
    flags: SamplerFlags,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl Sampler {
    pub fn spawn<L, C>(
        sensor: Arc<Mutex<L>>,
        filter_cfg: FilterCfg,
        timeout: Duration,
        clock: C,
        epoch: Instant,
    ) -> Self
    where
        L: LoadCell + Send + 'static,
        C: Clock + Send + Sync + 'static,
    {
        let (tx, rx) = xch::bounded(CHANNEL_CAPACITY);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let flags = SamplerFlags::default();
        let thread_flags = flags.clone();

        let join_handle = std::thread::spawn(move || {
            let mut filter = SignalFilter::new(filter_cfg);
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("Sampler thread received shutdown signal");
                    break;
                }
                if thread_flags.reset_filter.swap(false, Ordering::AcqRel) {
                    tracing::debug!("filter reset");
                    filter.reset();
                }

                let result = match sensor.lock() {
                    Ok(mut cell) => cell.try_read_grams(timeout),
                    Err(_) => {
                        tracing::error!("load cell mutex poisoned, stopping acquisition");
                        break;
                    }
                };
                let ts_ms = clock.ms_since(epoch);

                let msg = match result {
                    Ok(Some(raw)) => match filter.apply(raw) {
                        Some(grams) => {
                            if thread_flags.diagnostics() {
                                tracing::info!(raw_g = raw, grams, ts_ms, "readout");
                            } else {
                                tracing::trace!(raw_g = raw, grams, ts_ms, "readout");
                            }
                            Some(Reading::Sample { ts_ms, grams })
                        }
                        None => None,
                    },
                    Ok(None) => {
                        tracing::debug!(ts_ms, "load cell not ready");
                        Some(Reading::NotReady { ts_ms })
                    }
                    Err(e) => {
                        tracing::warn!(error = %map_hw_error(&*e), "load cell read failed");
                        Some(Reading::NotReady { ts_ms })
                    }
                };

                let backoff = matches!(msg, Some(Reading::NotReady { .. }));
                if let Some(msg) = msg {
                    match tx.try_send(msg) {
                        Ok(()) => {}
                        Err(xch::TrySendError::Full(_)) => {
                            tracing::warn!("reading dropped, control task is behind");
                        }
                        Err(xch::TrySendError::Disconnected(_)) => {
                            tracing::debug!("Sampler consumer disconnected, exiting thread");
                            break;
                        }
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                if backoff {
                    clock.sleep(RETRY_BACKOFF);
                }
            }
            tracing::trace!("Sampler thread exiting cleanly");
        });

        Self {
            rx,
            flags,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn receiver(&self) -> xch::Receiver<Reading> {
        self.rx.clone()
    }

    pub fn flags(&self) -> SamplerFlags {
        self.flags.clone()
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // Exits after the in-flight read, bounded by the sensor timeout.
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("Sampler thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "Sampler thread panicked during shutdown");
                }
            }
        }
    }
}
