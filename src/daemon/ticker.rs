use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::{storage::kv::KeyValueStore, timer::controller::PomodoroTimer, utils::clock::Clock};

/// Drives the persisted countdown forward on a fixed interval.
pub struct TimerTicker<S> {
    timer: Arc<PomodoroTimer<S>>,
    shutdown: CancellationToken,
    tick_frequency: Duration,
    time_provider: Arc<dyn Clock>,
}

impl<S: KeyValueStore> TimerTicker<S> {
    pub fn new(
        timer: Arc<PomodoroTimer<S>>,
        shutdown: CancellationToken,
        tick_frequency: Duration,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            timer,
            shutdown,
            tick_frequency,
            time_provider,
        }
    }

    /// Executes the ticker event loop.
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let mut tick_point = self.time_provider.instant();
        loop {
            tick_point += self.tick_frequency;

            let snapshot = self.timer.tick().await;
            if snapshot.running {
                debug!("{} countdown, {}s left", snapshot.mode, snapshot.time_left);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(tick_point) => ()
            }
        }
    }
}
