use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, error, info, warn};

use crate::{
    productivity::recorder::Recorder,
    storage::{
        entities::{Tag, TimerSession, OTHER_TAG},
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::{
        clock::SharedClock,
        percentage::{share_percentage, Percentage},
        time::rounded_minutes,
    },
};

use super::state::{
    reconcile, FinishedCountdown, TimerLengths, TimerMode, TimerSnapshot, DEFAULT_WORK_MINUTES,
};

/// A log line celebrates every this many finished work sessions.
pub const SESSION_MILESTONE: u32 = 5;

/// Longest work countdown that can be configured, in minutes.
pub const MAX_WORK_MINUTES: u32 = 24 * 60;

/// Pomodoro countdown backed by the persisted snapshot.
///
/// Several processes drive the same countdown, so nothing is cached: every operation reloads
/// the snapshot, reconciles it with the wall clock, applies its change and saves it again.
pub struct PomodoroTimer<S> {
    store: JsonStore<S>,
    recorder: Arc<Recorder<S>>,
    clock: SharedClock,
}

impl<S: KeyValueStore> PomodoroTimer<S> {
    pub fn new(store: JsonStore<S>, recorder: Arc<Recorder<S>>, clock: SharedClock) -> Self {
        Self {
            store,
            recorder,
            clock,
        }
    }

    pub async fn work_minutes(&self) -> u32 {
        self.store
            .read::<u32>(keys::POMODORO_LENGTH)
            .await
            .filter(|v| (1..=MAX_WORK_MINUTES).contains(v))
            .unwrap_or(DEFAULT_WORK_MINUTES)
    }

    pub async fn lengths(&self) -> TimerLengths {
        TimerLengths::from_work_minutes(self.work_minutes().await)
    }

    /// Brings the persisted countdown up to date, finishing it when it ran out in the meantime.
    /// Without a stored snapshot this is an idle work countdown at full length.
    ///
    /// The cli and the daemon can both see the same countdown run out. Only the one that replaces
    /// the snapshot it read records the session, the other one starts over from the new snapshot.
    pub async fn restore(&self) -> TimerSnapshot {
        loop {
            if let Some(snapshot) = self.try_restore().await {
                return snapshot;
            }
            debug!("Countdown changed while finishing it, restoring again");
        }
    }

    async fn try_restore(&self) -> Option<TimerSnapshot> {
        let lengths = self.lengths().await;
        let now = self.clock.time();
        let Some(stored) = self.store.read_value(keys::TIMER_STATE).await else {
            return Some(TimerSnapshot::fresh(lengths, now));
        };
        let Ok(snapshot) = serde_json::from_value::<TimerSnapshot>(stored.clone())
            .inspect_err(|e| warn!("Stored countdown has unexpected shape {e}"))
        else {
            return Some(TimerSnapshot::fresh(lengths, now));
        };
        if !snapshot.running {
            return Some(snapshot);
        }

        let result = reconcile(snapshot, now, lengths);
        let Some(finished) = result.finished else {
            self.save(&result.snapshot).await;
            return Some(result.snapshot);
        };
        match self
            .store
            .compare_and_write(keys::TIMER_STATE, &stored, &result.snapshot)
            .await
        {
            Ok(true) => self.finish(finished).await,
            Ok(false) => return None,
            // The stored countdown stays as it was, so a later restore finishes it
            Err(e) => error!("Failed to save the finished countdown {e:?}"),
        }
        Some(result.snapshot)
    }

    pub async fn save(&self, snapshot: &TimerSnapshot) {
        self.store.write(keys::TIMER_STATE, snapshot).await;
    }

    /// Advances a running countdown, called once per second by the daemon.
    pub async fn tick(&self) -> TimerSnapshot {
        self.restore().await
    }

    pub async fn start(&self) -> TimerSnapshot {
        let mut snapshot = self.restore().await;
        if snapshot.running {
            return snapshot;
        }

        let now = self.clock.time();
        if snapshot.mode == TimerMode::Work && snapshot.session_start.is_none() {
            snapshot.session_start = Some(now);
        }
        snapshot.running = true;
        snapshot.last_updated = now;
        self.save(&snapshot).await;
        info!("Started {} countdown, {}s left", snapshot.mode, snapshot.time_left);
        snapshot
    }

    pub async fn pause(&self) -> TimerSnapshot {
        let mut snapshot = self.restore().await;
        if !snapshot.running {
            return snapshot;
        }

        snapshot.running = false;
        snapshot.last_updated = self.clock.time();
        self.save(&snapshot).await;
        info!("Paused {} countdown, {}s left", snapshot.mode, snapshot.time_left);
        snapshot
    }

    pub async fn toggle(&self) -> TimerSnapshot {
        if self.restore().await.running {
            self.pause().await
        } else {
            self.start().await
        }
    }

    /// Stops the countdown and puts the current mode back to full length.
    pub async fn reset(&self) -> TimerSnapshot {
        let snapshot = self.restore().await;
        self.restart_in(snapshot.mode, snapshot).await
    }

    pub async fn switch_mode(&self, mode: TimerMode) -> TimerSnapshot {
        let snapshot = self.restore().await;
        self.restart_in(mode, snapshot).await
    }

    async fn restart_in(&self, mode: TimerMode, mut snapshot: TimerSnapshot) -> TimerSnapshot {
        snapshot.mode = mode;
        snapshot.time_left = self.lengths().await.of(mode);
        snapshot.running = false;
        snapshot.last_updated = self.clock.time();
        snapshot.session_start = None;
        self.save(&snapshot).await;
        debug!("Countdown reset to {mode}");
        snapshot
    }

    /// Tags the next recorded work session gets.
    pub async fn select_tags(&self, tags: Vec<Tag>) -> TimerSnapshot {
        let mut snapshot = self.restore().await;
        snapshot.selected_tags = tags;
        self.save(&snapshot).await;
        snapshot
    }

    /// Persists the work length. An idle work countdown picks it up right away.
    pub async fn set_work_minutes(&self, minutes: u32) -> Result<TimerSnapshot> {
        if !(1..=MAX_WORK_MINUTES).contains(&minutes) {
            bail!("Work length must be between 1 and {MAX_WORK_MINUTES} minutes");
        }
        let mut snapshot = self.restore().await;
        self.store.write(keys::POMODORO_LENGTH, &minutes).await;

        if snapshot.mode == TimerMode::Work && !snapshot.running {
            snapshot.time_left = minutes * 60;
            snapshot.session_start = None;
            snapshot.last_updated = self.clock.time();
            self.save(&snapshot).await;
        }
        info!("Work length set to {minutes} minutes");
        Ok(snapshot)
    }

    /// Share of the current countdown still left.
    pub async fn progress(&self, snapshot: &TimerSnapshot) -> Percentage {
        let total = self.lengths().await.of(snapshot.mode);
        share_percentage(snapshot.time_left as f64, total as f64)
    }

    /// The work session in progress, as an unfinished session.
    pub async fn active_session(&self) -> Option<TimerSession> {
        let snapshot = self.restore().await;
        if !snapshot.running || snapshot.mode != TimerMode::Work {
            return None;
        }

        let lengths = self.lengths().await;
        let spent = lengths.work.saturating_sub(snapshot.time_left);
        Some(TimerSession {
            id: "active-session".into(),
            start_time: snapshot.session_start_or_estimate(lengths),
            end_time: None,
            duration: rounded_minutes(chrono::Duration::seconds(spent as i64)),
            completed: false,
            associated_task_id: None,
            tags: snapshot.selected_tags,
        })
    }

    /// Work sessions finished over the whole lifetime of the store.
    pub async fn sessions_completed(&self) -> u32 {
        self.store
            .read::<u32>(keys::SESSIONS_COMPLETED)
            .await
            .unwrap_or(0)
    }

    async fn finish(&self, finished: FinishedCountdown) {
        info!("{} countdown finished", finished.mode);
        if finished.mode != TimerMode::Work {
            return;
        }

        let now = self.clock.time();
        let tags = if finished.tags.is_empty() {
            vec![OTHER_TAG.to_owned()]
        } else {
            finished.tags
        };
        let session = TimerSession {
            id: now.timestamp_millis().to_string(),
            start_time: finished.started,
            end_time: Some(now),
            duration: rounded_minutes(now - finished.started),
            completed: true,
            associated_task_id: None,
            tags,
        };
        self.recorder.record_pomodoro_session(&session).await;

        let count = self.sessions_completed().await + 1;
        self.store.write(keys::SESSIONS_COMPLETED, &count).await;
        if count % SESSION_MILESTONE == 0 {
            info!("Milestone reached, {count} pomodoro sessions completed");
        }
    }
}
