use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::{
    storage::{
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::clock::SharedClock,
};

use super::aggregate::AggregateStore;

/// Minutes without interaction after which the gap counts as idle time.
pub const IDLE_THRESHOLD_MINUTES: i64 = 5;

/// Credits stretches without user interaction to the idle time of the current day.
///
/// The last activity moment lives in memory only. The enabled flag is persisted, so another
/// process can switch detection on and off.
pub struct IdleDetector<S> {
    store: JsonStore<S>,
    aggregates: AggregateStore<S>,
    clock: SharedClock,
    last_activity: Mutex<DateTime<Utc>>,
}

impl<S: KeyValueStore + Clone> IdleDetector<S> {
    pub fn new(store: JsonStore<S>, clock: SharedClock) -> Self {
        Self {
            aggregates: AggregateStore::new(store.clone(), clock.clone()),
            last_activity: Mutex::new(clock.time()),
            store,
            clock,
        }
    }
}

impl<S: KeyValueStore> IdleDetector<S> {
    pub async fn is_enabled(&self) -> bool {
        self.store
            .read::<bool>(keys::IDLE_DETECTION)
            .await
            .unwrap_or(true)
    }

    /// Enabling restarts the idle window from now.
    pub async fn set_enabled(&self, enabled: bool) {
        self.store.write(keys::IDLE_DETECTION, &enabled).await;
        if enabled {
            self.record_activity();
        }
        info!("Idle detection enabled: {enabled}");
    }

    pub fn record_activity(&self) {
        self.record_activity_at(self.clock.time());
    }

    /// Marks an interaction that happened at `moment`. Older moments than the current one are
    /// ignored.
    pub fn record_activity_at(&self, moment: DateTime<Utc>) {
        let mut last = self.last_activity.lock().unwrap_or_else(|e| e.into_inner());
        if moment > *last {
            *last = moment;
        }
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Credits the whole minutes since the last activity to today when they exceed the
    /// threshold. Returns the credited minutes.
    pub async fn check_idle(&self) -> Option<u64> {
        if !self.is_enabled().await {
            return None;
        }

        let now = self.clock.time();
        let gap = now - self.last_activity();
        if gap <= Duration::minutes(IDLE_THRESHOLD_MINUTES) {
            debug!("Not idle, last activity {}s ago", gap.num_seconds());
            return None;
        }

        let minutes = gap.num_minutes().max(0) as u64;
        let mut aggregate = self.aggregates.today().await;
        aggregate.idle_time += minutes;
        self.aggregates.save(&aggregate).await;

        *self.last_activity.lock().unwrap_or_else(|e| e.into_inner()) = now;
        info!("Credited {minutes} idle minutes");
        Some(minutes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use crate::{
        productivity::aggregate::AggregateStore,
        storage::{kv::JsonStore, memory_store::MemoryStore},
        utils::clock::{test_clock::ManualClock, Clock},
    };

    use super::IdleDetector;

    fn detector(
        clock: &ManualClock,
    ) -> (IdleDetector<Arc<MemoryStore>>, AggregateStore<Arc<MemoryStore>>) {
        let store = JsonStore::new(Arc::new(MemoryStore::new()));
        (
            IdleDetector::new(store.clone(), Arc::new(clock.clone())),
            AggregateStore::new(store, Arc::new(clock.clone())),
        )
    }

    #[tokio::test]
    async fn test_seven_idle_minutes_are_credited() {
        let clock = ManualClock::new();
        let (detector, aggregates) = detector(&clock);

        clock.advance(Duration::seconds(7 * 60 + 20));

        assert_eq!(detector.check_idle().await, Some(7));
        assert_eq!(aggregates.today().await.idle_time, 7);
        assert_eq!(detector.last_activity(), clock.time());

        // Window restarted, nothing more to credit right away
        assert_eq!(detector.check_idle().await, None);
        assert_eq!(aggregates.today().await.idle_time, 7);
    }

    #[tokio::test]
    async fn test_recent_activity_credits_nothing() {
        let clock = ManualClock::new();
        let (detector, aggregates) = detector(&clock);

        clock.advance(Duration::minutes(4));
        detector.record_activity();
        clock.advance(Duration::minutes(4));

        assert_eq!(detector.check_idle().await, None);
        assert_eq!(aggregates.today().await.idle_time, 0);
    }

    #[tokio::test]
    async fn test_disabled_detector_credits_nothing() {
        let clock = ManualClock::new();
        let (detector, aggregates) = detector(&clock);

        detector.set_enabled(false).await;
        assert!(!detector.is_enabled().await);
        clock.advance(Duration::minutes(30));

        assert_eq!(detector.check_idle().await, None);
        assert_eq!(aggregates.today().await.idle_time, 0);

        detector.set_enabled(true).await;
        assert_eq!(detector.check_idle().await, None);
    }

    #[tokio::test]
    async fn test_older_activity_is_ignored() {
        let clock = ManualClock::new();
        let (detector, _) = detector(&clock);
        let start = clock.time();

        detector.record_activity_at(start - Duration::minutes(10));

        assert_eq!(detector.last_activity(), start);
    }
}
