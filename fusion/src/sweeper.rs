//! Background eviction sweeper
//!
//! Runs the registry's eviction pass on a fixed interval from a dedicated
//! single-thread runtime. Shutdown goes through a oneshot channel rather
//! than a blocking sleep loop, so teardown is immediate and clean.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::runtime::Runtime;

use crate::engine::Engine;
use crate::error::{EngineError, Result};

/// Handle to the running sweeper. Dropping it stops the task.
pub struct Sweeper {
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    _runtime: Runtime,
}

impl Sweeper {
    /// Start sweeping `engine` at its configured interval.
    pub fn start(engine: Engine) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("eviction-sweeper")
            .enable_all()
            .build()
            .map_err(|e| EngineError::other(format!("failed to build sweeper runtime: {}", e)))?;

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let interval_ms = engine.config.sweep_interval_ms;

        runtime.spawn(async move {
            sweep_loop(engine, interval_ms, shutdown_rx).await;
        });

        Ok(Self {
            shutdown_tx: Some(shutdown_tx),
            _runtime: runtime,
        })
    }

    /// Stop the sweep task. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn sweep_loop(
    engine: Engine,
    interval_ms: u64,
    mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    log::info!("eviction sweeper started (interval {} ms)", interval_ms);

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    let mut cycles = 0u64;
    let mut total_evicted = 0usize;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                cycles += 1;
                let (evicted, released) = engine.sweep_now(epoch_ms());
                total_evicted += evicted;

                if evicted > 0 || released > 0 {
                    log::debug!(
                        "sweep cycle {}: evicted {}, finalized {} slots",
                        cycles,
                        evicted,
                        released
                    );
                }
                if cycles % 300 == 0 {
                    log::info!(
                        "sweeper: {} cycles, {} identities evicted total",
                        cycles,
                        total_evicted
                    );
                }
            }
            _ = &mut shutdown_rx => {
                log::info!("eviction sweeper shutting down after {} cycles", cycles);
                break;
            }
        }
    }
}

/// Wall-clock milliseconds; cameras stamp frames on the same epoch.
fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::engine::Engine;

    #[test]
    fn test_start_and_shutdown_cleanly() {
        let mut config = EngineConfig::default();
        config.sweep_interval_ms = 10;
        let (engine, _events_rx) = Engine::new(config).unwrap();

        let mut sweeper = Sweeper::start(engine).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        sweeper.shutdown();
        sweeper.shutdown(); // idempotent
    }
}
