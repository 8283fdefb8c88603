use std::{collections::BTreeMap, fmt::Display};

use chrono::NaiveDate;
use clap::ValueEnum;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    storage::{
        entities::{AggregatePatch, DailyAggregate},
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::{clock::SharedClock, time::days_ending_at},
};

use super::tags::load_tags;

/// Window of days used by statistics and history queries. Every range ends today.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    Day,
    Week,
    Month,
}

impl DateRange {
    pub fn days(self) -> u64 {
        match self {
            DateRange::Day => 1,
            DateRange::Week => 7,
            DateRange::Month => 30,
        }
    }

    /// Dates of the range ending at `today`, oldest first.
    pub fn dates(self, today: NaiveDate) -> Vec<NaiveDate> {
        days_ending_at(today, self.days())
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateRange::Day => write!(f, "day"),
            DateRange::Week => write!(f, "week"),
            DateRange::Month => write!(f, "month"),
        }
    }
}

/// Daily aggregates, one per calendar date. Aggregates are created lazily and only ever grow.
pub struct AggregateStore<S> {
    store: JsonStore<S>,
    clock: SharedClock,
}

impl<S: KeyValueStore> AggregateStore<S> {
    pub fn new(store: JsonStore<S>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Reads the aggregate for `date`. A missing aggregate is created with a zero bucket for every
    /// currently active tag and persisted right away, so following reads return the same value.
    pub async fn get_or_create(&self, date: NaiveDate) -> DailyAggregate {
        let key = keys::aggregate_key(date);
        if let Some(aggregate) = self.store.read::<DailyAggregate>(&key).await {
            return aggregate;
        }

        let tags = load_tags(&self.store).await;
        let aggregate = DailyAggregate::empty(date, &tags);
        debug!("Creating aggregate {key}");
        self.store.write(&key, &aggregate).await;
        aggregate
    }

    pub async fn today(&self) -> DailyAggregate {
        self.get_or_create(self.clock.today()).await
    }

    /// Shallow merge of `patch` into the stored aggregate.
    pub async fn update(&self, date: NaiveDate, patch: AggregatePatch) {
        let mut aggregate = self.get_or_create(date).await;
        patch.apply(&mut aggregate);
        self.save(&aggregate).await;
    }

    /// Overwrites the aggregate stored for `aggregate.date`.
    pub async fn save(&self, aggregate: &DailyAggregate) {
        self.store
            .write(&keys::aggregate_key(aggregate.date), aggregate)
            .await;
    }

    pub async fn get_range(&self, range: DateRange) -> Vec<DailyAggregate> {
        self.get_range_ending(range, self.clock.today()).await
    }

    /// Like [AggregateStore::get_range], for a range ending at `end` instead of today.
    pub async fn get_range_ending(&self, range: DateRange, end: NaiveDate) -> Vec<DailyAggregate> {
        let dates = range.dates(end);
        // Seeds the tags once instead of in every missing day
        load_tags(&self.store).await;
        join_all(dates.into_iter().map(|date| self.get_or_create(date))).await
    }

    /// Every stored aggregate by its storage key.
    pub async fn all(&self) -> BTreeMap<String, DailyAggregate> {
        let mut result = BTreeMap::new();
        for key in self.store.keys_with_prefix(keys::AGGREGATE_PREFIX).await {
            if keys::aggregate_date(&key).is_none() {
                continue;
            }
            match self.store.read::<DailyAggregate>(&key).await {
                Some(aggregate) => {
                    result.insert(key, aggregate);
                }
                None => warn!("Skipping unreadable aggregate {key}"),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc};

    use anyhow::Result;
    use chrono::{Duration, NaiveDate};
    use tempfile::tempdir;

    use crate::{
        storage::{
            entities::{AggregatePatch, DEFAULT_TAGS},
            file_store::FileStore,
            keys,
            kv::JsonStore,
            memory_store::MemoryStore,
        },
        utils::clock::{test_clock::ManualClock, Clock},
    };

    use super::{AggregateStore, DateRange};

    fn aggregates(clock: &ManualClock) -> AggregateStore<Arc<MemoryStore>> {
        AggregateStore::new(
            JsonStore::new(Arc::new(MemoryStore::new())),
            Arc::new(clock.clone()),
        )
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let clock = ManualClock::new();
        let store = aggregates(&clock);
        let date = NaiveDate::from_ymd_opt(2020, 2, 2).unwrap();

        let first = store.get_or_create(date).await;
        assert_eq!(first.total_tasks_completed, 0);
        assert_eq!(first.total_pomodoro_completed, 0);
        assert_eq!(first.total_time_spent, 0);
        assert_eq!(first.idle_time, 0);
        assert_eq!(first.task_time_by_tag.len(), DEFAULT_TAGS.len());
        assert!(first.task_time_by_tag.values().all(|v| *v == 0.));

        let second = store.get_or_create(date).await;
        assert_eq!(first, second);
        assert!(store.store.read_value(&keys::aggregate_key(date)).await.is_some());
    }

    #[tokio::test]
    async fn test_update_replaces_tag_map() {
        let clock = ManualClock::new();
        let store = aggregates(&clock);
        let date = clock.today();

        store
            .update(
                date,
                AggregatePatch {
                    idle_time: Some(12),
                    task_time_by_tag: Some(BTreeMap::from([("Solo".to_string(), 3.)])),
                    ..Default::default()
                },
            )
            .await;

        let aggregate = store.today().await;
        assert_eq!(aggregate.idle_time, 12);
        assert_eq!(
            aggregate.task_time_by_tag,
            BTreeMap::from([("Solo".to_string(), 3.)])
        );
        assert_eq!(aggregate.total_tasks_completed, 0);
    }

    #[tokio::test]
    async fn test_ranges_end_today_oldest_first() {
        let clock = ManualClock::new();
        let store = aggregates(&clock);
        let today = clock.today();

        let day = store.get_range(DateRange::Day).await;
        assert_eq!(day.len(), 1);
        assert_eq!(day[0].date, today);

        let week = store.get_range(DateRange::Week).await;
        assert_eq!(week.len(), 7);
        assert_eq!(week[0].date, today - Duration::days(6));
        assert_eq!(week[6].date, today);

        let month = store.get_range(DateRange::Month).await;
        assert_eq!(month.len(), 30);
        assert_eq!(month[0].date, today - Duration::days(29));

        assert_eq!(store.all().await.len(), 30);
    }

    #[tokio::test]
    async fn test_range_on_fresh_file_store() -> Result<()> {
        let dir = tempdir()?;
        let clock = ManualClock::new();
        let store = AggregateStore::new(
            JsonStore::new(Arc::new(FileStore::new(dir.path().to_owned())?)),
            Arc::new(clock.clone()),
        );

        let month = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            store.get_range(DateRange::Month),
        )
        .await?;

        assert_eq!(month.len(), 30);
        assert!(month
            .iter()
            .all(|v| v.task_time_by_tag.len() == DEFAULT_TAGS.len()));
        assert_eq!(store.all().await.len(), 30);
        Ok(())
    }
}
