use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;

use super::repository::EntryRepository;

/// Background driver for the repository's periodic expiry tick.
///
/// The scheduler is the session's only long-lived resource; it is stopped and
/// joined on drop so the tick never acts on torn-down state.
pub struct SweepScheduler {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl SweepScheduler {
    pub fn spawn(
        repository: Arc<Mutex<EntryRepository>>,
        interval: Duration,
    ) -> Result<Self> {
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let ticker = tick(interval);
        let handle = thread::Builder::new()
            .name("fadelog-sweeper".into())
            .spawn(move || loop {
                select! {
                    recv(ticker) -> _ => {
                        let expired = repository.lock().tick();
                        if expired > 0 {
                            tracing::info!(expired, "periodic sweep evicted expired entries");
                        }
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            })
            .context("spawning sweep scheduler thread")?;
        Ok(Self {
            shutdown: shutdown_tx,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let _ = self.shutdown.try_send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}
