use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use activity::ActivityMonitor;
use ticker::TimerTicker;

use crate::{
    activity_api::{ActivitySource, GenericActivitySource},
    productivity::{idle::IdleDetector, recorder::Recorder},
    storage::{
        file_store::FileStore,
        kv::{JsonStore, KeyValueStore},
    },
    timer::controller::PomodoroTimer,
    utils::{
        clock::{DefaultClock, SharedClock},
        dir::store_path,
    },
};

pub mod activity;
pub mod args;
pub mod shutdown;
pub mod ticker;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Represents the starting point for the daemon
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    let store = JsonStore::new(Arc::new(FileStore::new(store_path(&dir))?));
    std::env::set_current_dir("/")?;

    let clock: SharedClock = Arc::new(DefaultClock);
    let shutdown_token = CancellationToken::new();

    let ticker = create_ticker(store.clone(), &shutdown_token, clock.clone());

    let monitor = match GenericActivitySource::new() {
        Ok(source) => Some(create_monitor(
            store,
            Box::new(source),
            &shutdown_token,
            clock,
        )),
        Err(e) => {
            warn!("Running without idle monitoring {e:?}");
            None
        }
    };

    info!("Daemon started");
    let (_, ticker_result, monitor_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        ticker.run(),
        async {
            match monitor {
                Some(monitor) => monitor.run().await,
                None => {
                    shutdown_token.cancelled().await;
                    Ok(())
                }
            }
        },
    );

    if let Err(ticker_result) = ticker_result {
        error!("Timer ticker got an error {:?}", ticker_result);
    }

    if let Err(monitor_result) = monitor_result {
        error!("Activity monitor got an error {:?}", monitor_result);
    }

    info!("Daemon stopped");
    Ok(())
}

fn create_ticker<S: KeyValueStore + Clone>(
    store: JsonStore<S>,
    shutdown_token: &CancellationToken,
    clock: SharedClock,
) -> TimerTicker<S> {
    let recorder = Arc::new(Recorder::new(store.clone(), clock.clone()));
    let timer = Arc::new(PomodoroTimer::new(store, recorder, clock.clone()));
    TimerTicker::new(
        timer,
        shutdown_token.clone(),
        DEFAULT_TICK_INTERVAL,
        clock,
    )
}

fn create_monitor<S: KeyValueStore + Clone>(
    store: JsonStore<S>,
    source: Box<dyn ActivitySource>,
    shutdown_token: &CancellationToken,
    clock: SharedClock,
) -> ActivityMonitor<S> {
    ActivityMonitor::new(
        source,
        Arc::new(IdleDetector::new(store, clock.clone())),
        shutdown_token.clone(),
        DEFAULT_POLL_INTERVAL,
        DEFAULT_IDLE_CHECK_INTERVAL,
        clock,
    )
}

#[cfg(test)]
mod daemon_tests {
    use std::{sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::Duration as ChronoDuration;
    use tokio_util::sync::CancellationToken;

    use crate::{
        activity_api::MockActivitySource,
        daemon::{create_monitor, create_ticker},
        productivity::aggregate::AggregateStore,
        storage::{entities::decode_sessions, keys, kv::JsonStore, memory_store::MemoryStore},
        timer::state::{TimerMode, TimerSnapshot},
        utils::{
            clock::{test_clock::ManualClock, Clock},
            logging::TEST_LOGGING,
        },
    };

    /// Runs both daemon loops for a bit over a minute of virtual time.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_daemon() -> Result<()> {
        *TEST_LOGGING;
        let store = JsonStore::new(Arc::new(MemoryStore::new()));
        let clock = ManualClock::new();
        store
            .write(
                keys::TIMER_STATE,
                &TimerSnapshot {
                    mode: TimerMode::Work,
                    time_left: 30,
                    running: true,
                    last_updated: clock.time() - ChronoDuration::minutes(1),
                    selected_tags: vec!["Deep Work".into()],
                    session_start: None,
                },
            )
            .await;

        let mut source = MockActivitySource::new();
        source.expect_get_idle_time().returning(|| Ok(10 * 60 * 1000));

        let shutdown_token = CancellationToken::new();
        let ticker = create_ticker(store.clone(), &shutdown_token, Arc::new(clock.clone()));
        let monitor = create_monitor(
            store.clone(),
            Box::new(source),
            &shutdown_token,
            Arc::new(clock.clone()),
        );
        // The detector starts counting when it's created
        clock.advance(ChronoDuration::minutes(10));

        let (_, ticker_result, monitor_result) = tokio::join!(
            async {
                tokio::time::sleep(Duration::from_millis(60_500)).await;
                shutdown_token.cancel()
            },
            ticker.run(),
            monitor.run(),
        );
        ticker_result?;
        monitor_result?;

        let sessions = decode_sessions(store.read_value(keys::POMODORO_SESSIONS).await);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].tags, vec!["Deep Work".to_string()]);

        let aggregates = AggregateStore::new(store, Arc::new(clock.clone()));
        let today = aggregates.today().await;
        assert_eq!(today.total_pomodoro_completed, 1);
        assert_eq!(today.idle_time, 10);
        Ok(())
    }
}
