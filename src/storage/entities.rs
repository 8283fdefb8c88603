use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// User defined category label. Tags are plain strings, equality is case sensitive.
pub type Tag = String;

/// Receives time of completions that carry no tags.
pub const OTHER_TAG: &str = "Other";

pub const DEFAULT_TAGS: [&str; 5] = ["Deep Work", "Meetings", "Learning", "Admin", OTHER_TAG];

/// Item of the todo list.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub completed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<DateTime<Utc>>,
    pub tags: Vec<Tag>,
    /// Whole minutes.
    pub time_spent: u32,
}

impl Task {
    pub fn new(id: String, text: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at,
            completed_at: None,
            tags: vec![],
            time_spent: 0,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|v| v == tag)
    }
}

/// Shape tasks had before tags existed. Older records carry a single `category` instead.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    id: String,
    text: String,
    #[serde(default)]
    completed: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    completed_at: Option<DateTime<Utc>>,
    tags: Option<Vec<Tag>>,
    category: Option<Tag>,
    #[serde(default)]
    time_spent: u32,
}

impl From<StoredTask> for Task {
    fn from(
        StoredTask {
            id,
            text,
            completed,
            created_at,
            completed_at,
            tags,
            category,
            time_spent,
        }: StoredTask,
    ) -> Self {
        let tags = match (tags, category) {
            (Some(tags), _) => tags,
            (None, Some(category)) => vec![category],
            (None, None) => vec![],
        };
        Task {
            id,
            text,
            completed,
            created_at,
            completed_at,
            tags,
            time_spent,
        }
    }
}

/// Decodes a stored task list. Entries that can't be decoded are dropped one by one instead of
/// losing the whole list.
pub fn decode_tasks(value: Option<Value>) -> Vec<Task> {
    decode_list::<StoredTask>(value)
        .into_iter()
        .map(Task::from)
        .collect()
}

/// Decodes a stored session list, dropping malformed entries.
pub fn decode_sessions(value: Option<Value>) -> Vec<TimerSession> {
    decode_list(value)
}

fn decode_list<T: DeserializeOwned>(value: Option<Value>) -> Vec<T> {
    match value {
        None => vec![],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| {
                serde_json::from_value::<T>(item.clone())
                    .inspect_err(|e| warn!("Dropping malformed entry {item}: {e}"))
                    .ok()
            })
            .collect(),
        Some(other) => {
            warn!("Expected a list, found {other}");
            vec![]
        }
    }
}

/// One pomodoro work countdown.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    pub id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    /// Stored as 0 while the session hasn't ended.
    #[serde(with = "zero_as_none_ser")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole minutes of wall clock time between start and end.
    pub duration: u32,
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associated_task_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl TimerSession {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|v| v == tag)
    }
}

mod zero_as_none_ser {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(end: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(end.map_or(0, |v| v.timestamp_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = i64::deserialize(deserializer)?;
        if millis == 0 {
            return Ok(None);
        }
        DateTime::from_timestamp_millis(millis)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("timestamp {millis} out of range")))
    }
}

/// Per calendar day rollup of everything that was completed on that day.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub total_tasks_completed: u32,
    pub total_pomodoro_completed: u32,
    /// Whole minutes.
    pub total_time_spent: u64,
    /// Minutes per tag. Multi tag completions are split evenly, so values can be fractional.
    #[serde(default)]
    pub task_time_by_tag: BTreeMap<Tag, f64>,
    /// Whole minutes.
    #[serde(default)]
    pub idle_time: u64,
}

impl DailyAggregate {
    /// Zeroed aggregate with a bucket for each of `tags`.
    pub fn empty<'a>(date: NaiveDate, tags: impl IntoIterator<Item = &'a Tag>) -> Self {
        Self {
            date,
            total_tasks_completed: 0,
            total_pomodoro_completed: 0,
            total_time_spent: 0,
            task_time_by_tag: tags.into_iter().map(|tag| (tag.clone(), 0.)).collect(),
            idle_time: 0,
        }
    }

    /// Adds `minutes` to the total and splits them evenly between `tags`. Untagged time goes to
    /// [OTHER_TAG].
    pub fn credit_time(&mut self, tags: &[Tag], minutes: u32) {
        self.total_time_spent += minutes as u64;
        if tags.is_empty() {
            *self
                .task_time_by_tag
                .entry(OTHER_TAG.to_owned())
                .or_insert(0.) += minutes as f64;
            return;
        }

        let share = minutes as f64 / tags.len() as f64;
        for tag in tags {
            *self.task_time_by_tag.entry(tag.clone()).or_insert(0.) += share;
        }
    }
}

/// Partial update for [DailyAggregate]. Present fields replace stored ones, the tag map included.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct AggregatePatch {
    pub total_tasks_completed: Option<u32>,
    pub total_pomodoro_completed: Option<u32>,
    pub total_time_spent: Option<u64>,
    pub task_time_by_tag: Option<BTreeMap<Tag, f64>>,
    pub idle_time: Option<u64>,
}

impl AggregatePatch {
    pub fn apply(self, aggregate: &mut DailyAggregate) {
        if let Some(v) = self.total_tasks_completed {
            aggregate.total_tasks_completed = v;
        }
        if let Some(v) = self.total_pomodoro_completed {
            aggregate.total_pomodoro_completed = v;
        }
        if let Some(v) = self.total_time_spent {
            aggregate.total_time_spent = v;
        }
        if let Some(v) = self.task_time_by_tag {
            aggregate.task_time_by_tag = v;
        }
        if let Some(v) = self.idle_time {
            aggregate.idle_time = v;
        }
    }
}

/// Per task stopwatch. `start_time` is `None` (stored as 0) while the task isn't being timed.
#[derive(PartialEq, Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskTimer {
    #[serde(with = "zero_as_none_ser")]
    pub start_time: Option<DateTime<Utc>>,
    /// Whole minutes accumulated by earlier runs.
    pub total_time: u32,
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use super::{decode_sessions, decode_tasks, DailyAggregate, Tag, TimerSession, OTHER_TAG};

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 7, 4).unwrap()
    }

    #[test]
    fn test_credit_time_splits_evenly() {
        let mut aggregate = DailyAggregate::empty(test_date(), &[]);
        aggregate.credit_time(&["A".into(), "B".into()], 10);

        assert_eq!(aggregate.total_time_spent, 10);
        assert_eq!(aggregate.task_time_by_tag["A"], 5.);
        assert_eq!(aggregate.task_time_by_tag["B"], 5.);
    }

    #[test]
    fn test_credit_time_untagged_goes_to_other() {
        let tags: Vec<Tag> = vec!["Admin".into()];
        let mut aggregate = DailyAggregate::empty(test_date(), &tags);
        aggregate.credit_time(&[], 7);

        assert_eq!(aggregate.task_time_by_tag[OTHER_TAG], 7.);
        assert_eq!(aggregate.task_time_by_tag["Admin"], 0.);
    }

    #[test]
    fn test_aggregate_without_tag_map_decodes() {
        let aggregate: DailyAggregate = serde_json::from_value(json!({
            "date": "2018-07-04",
            "totalTasksCompleted": 2,
            "totalPomodoroCompleted": 1,
            "totalTimeSpent": 30,
            "idleTime": 0,
        }))
        .unwrap();

        assert!(aggregate.task_time_by_tag.is_empty());
        assert_eq!(aggregate.total_tasks_completed, 2);
    }

    #[test]
    fn test_legacy_tasks_are_migrated() {
        let tasks = decode_tasks(Some(json!([
            { "id": "1", "text": "write", "completed": false, "createdAt": 1000, "category": "Learning", "timeSpent": 3 },
            { "id": "2", "text": "read", "completed": true, "createdAt": 2000, "completedAt": 3000 },
            { "text": "no id" },
        ])));

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].tags, vec!["Learning".to_string()]);
        assert_eq!(tasks[0].time_spent, 3);
        assert!(tasks[1].tags.is_empty());
        assert_eq!(tasks[1].completed_at.map(|v| v.timestamp_millis()), Some(3000));
    }

    #[test]
    fn test_running_session_end_is_zero() {
        let session = TimerSession {
            id: "1".into(),
            start_time: Utc.timestamp_millis_opt(1000).unwrap(),
            end_time: None,
            duration: 0,
            completed: false,
            associated_task_id: None,
            tags: vec![],
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["endTime"], json!(0));

        let decoded = decode_sessions(Some(json!([value, "garbage"])));
        assert_eq!(decoded, vec![session]);
    }
}
