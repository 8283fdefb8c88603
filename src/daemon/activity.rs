use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::{
    activity_api::ActivitySource, productivity::idle::IdleDetector, storage::kv::KeyValueStore,
    utils::clock::Clock,
};

/// Feeds system input activity into an [IdleDetector] and runs its idle check periodically.
pub struct ActivityMonitor<S> {
    source: Box<dyn ActivitySource>,
    detector: Arc<IdleDetector<S>>,
    shutdown: CancellationToken,
    poll_frequency: Duration,
    check_frequency: Duration,
    time_provider: Arc<dyn Clock>,
}

impl<S: KeyValueStore> ActivityMonitor<S> {
    pub fn new(
        source: Box<dyn ActivitySource>,
        detector: Arc<IdleDetector<S>>,
        shutdown: CancellationToken,
        poll_frequency: Duration,
        check_frequency: Duration,
        time_provider: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            detector,
            shutdown,
            poll_frequency,
            check_frequency,
            time_provider,
        }
    }

    /// The last input moment counts as an interaction. The detector ignores moments it already
    /// knows about.
    fn poll(&mut self) -> Result<()> {
        let idle_ms = self.source.get_idle_time()?;
        let last_input =
            self.time_provider.time() - chrono::Duration::milliseconds(idle_ms as i64);
        self.detector.record_activity_at(last_input);
        Ok(())
    }

    /// Executes the monitor event loop.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<()> {
        let mut poll_point = self.time_provider.instant();
        let mut check_point = poll_point + self.check_frequency;
        loop {
            poll_point += self.poll_frequency;

            if let Err(e) = self.poll() {
                error!("Encountered an error during activity polling {:?}", e)
            }

            if self.time_provider.instant() >= check_point {
                check_point += self.check_frequency;
                match self.detector.check_idle().await {
                    Some(minutes) => info!("User was idle for {minutes} minutes"),
                    None => debug!("Idle check found no idle time"),
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.time_provider.sleep_until(poll_point) => ()
            }
        }
    }
}
