use chrono::{Days, NaiveDate};
use tracing::{debug, info};

use crate::{
    storage::{
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::{clock::SharedClock, time::date_to_record_name},
};

/// Number of consecutive local days the dashboard was used on.
pub struct Streak<S> {
    store: JsonStore<S>,
    clock: SharedClock,
}

impl<S: KeyValueStore> Streak<S> {
    pub fn new(store: JsonStore<S>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Stored streak, 0 before the first visit.
    pub async fn current(&self) -> u32 {
        self.store.read::<u32>(keys::STREAK).await.unwrap_or(0)
    }

    /// Counts a visit today. A visit the day after the last one extends the streak, another
    /// visit on the same day keeps it and anything else starts over at 1.
    pub async fn record_visit(&self) -> u32 {
        let today = self.clock.today();
        let last_visit = self
            .store
            .read::<String>(keys::LAST_VISIT)
            .await
            .and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok());

        let current = self.current().await;
        let streak = match last_visit {
            Some(last) if last == today => current.max(1),
            Some(last) if today.checked_sub_days(Days::new(1)) == Some(last) => current + 1,
            _ => 1,
        };

        if last_visit != Some(today) {
            self.store.write(keys::LAST_VISIT, &date_to_record_name(today)).await;
            info!("Visit streak is {streak} days");
        }
        if streak != current {
            debug!("Streak changed from {current} to {streak}");
            self.store.write(keys::STREAK, &streak).await;
        }
        streak
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use crate::{
        storage::{keys, kv::JsonStore, memory_store::MemoryStore},
        utils::clock::test_clock::ManualClock,
    };

    use super::Streak;

    fn streak(clock: &ManualClock) -> (Streak<Arc<MemoryStore>>, JsonStore<Arc<MemoryStore>>) {
        let store = JsonStore::new(Arc::new(MemoryStore::new()));
        (Streak::new(store.clone(), Arc::new(clock.clone())), store)
    }

    #[tokio::test]
    async fn test_first_visit_starts_at_one() {
        let clock = ManualClock::new();
        let (streak, store) = streak(&clock);

        assert_eq!(streak.current().await, 0);
        assert_eq!(streak.record_visit().await, 1);
        assert_eq!(
            store.read::<String>(keys::LAST_VISIT).await.as_deref(),
            Some("2018-07-04")
        );
    }

    #[tokio::test]
    async fn test_same_day_keeps_streak() {
        let clock = ManualClock::new();
        let (streak, _) = streak(&clock);
        streak.record_visit().await;
        clock.advance(Duration::days(1));
        streak.record_visit().await;

        clock.advance(Duration::minutes(5));

        assert_eq!(streak.record_visit().await, 2);
        assert_eq!(streak.current().await, 2);
    }

    #[tokio::test]
    async fn test_next_day_extends_streak() {
        let clock = ManualClock::new();
        let (streak, _) = streak(&clock);

        for expected in 1..=4 {
            assert_eq!(streak.record_visit().await, expected);
            clock.advance(Duration::days(1));
        }
    }

    #[tokio::test]
    async fn test_gap_resets_streak() {
        let clock = ManualClock::new();
        let (streak, store) = streak(&clock);
        streak.record_visit().await;
        clock.advance(Duration::days(1));
        assert_eq!(streak.record_visit().await, 2);

        clock.advance(Duration::days(3));

        assert_eq!(streak.record_visit().await, 1);
        assert_eq!(store.read::<u32>(keys::STREAK).await, Some(1));
    }

    #[tokio::test]
    async fn test_malformed_last_visit_starts_over() {
        let clock = ManualClock::new();
        let (streak, store) = streak(&clock);
        store.write(keys::STREAK, &9).await;
        store.write(keys::LAST_VISIT, "Wed Jul 04 2018").await;

        assert_eq!(streak.record_visit().await, 1);
    }
}
