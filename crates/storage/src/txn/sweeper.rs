#![forbid(unsafe_code)]

use crate::IndexError;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Fixed-delay ticker: `tick` runs, then the thread waits `delay` before the
/// next run. Dropping the sweeper stops and joins it.
pub(super) struct Sweeper {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub(super) fn start(
        delay: Duration,
        tick: impl Fn() + Send + 'static,
    ) -> Result<Self, IndexError> {
        let (stop, stopped) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("transaction-sweeper".to_string())
            .spawn(move || {
                loop {
                    match stopped.recv_timeout(delay) {
                        Err(RecvTimeoutError::Timeout) => tick(),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::debug!("transaction sweeper stopped");
            })?;
        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(delay_ms, "transaction sweeper started");
        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    pub(super) fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("transaction sweeper panicked");
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
