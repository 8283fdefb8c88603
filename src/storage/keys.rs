//! Names of every key focusboard keeps in the store. The store itself doesn't enforce any
//! namespacing, so all of them live here.

use chrono::NaiveDate;

use crate::utils::time::date_to_record_name;

pub const TODOS: &str = "todos";
pub const COMPLETED_TASKS: &str = "completed_tasks";
pub const POMODORO_SESSIONS: &str = "pomodoro_sessions";
pub const TIMER_STATE: &str = "pomodoroTimerState";
pub const TAGS: &str = "productivity_tags";
pub const TAG_COLORS: &str = "productivity_tag_colors";
pub const COMPLETED_TODAY: &str = "completedToday";
pub const COMPLETED_DATE: &str = "completedDate";
pub const TASK_TIMERS: &str = "taskTimers";
pub const POMODORO_LENGTH: &str = "pomodoroLength";
pub const SESSIONS_COMPLETED: &str = "pomodoroSessions";
pub const IDLE_DETECTION: &str = "idleDetection";
pub const STREAK: &str = "streak";
pub const LAST_VISIT: &str = "lastVisit";

pub const AGGREGATE_PREFIX: &str = "productivity_";

pub fn aggregate_key(date: NaiveDate) -> String {
    format!("{AGGREGATE_PREFIX}{}", date_to_record_name(date))
}

/// Tags and colors share the aggregate prefix, so only keys ending in an actual date count.
pub fn aggregate_date(key: &str) -> Option<NaiveDate> {
    let suffix = key.strip_prefix(AGGREGATE_PREFIX)?;
    NaiveDate::parse_from_str(suffix, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{aggregate_date, aggregate_key, TAGS, TAG_COLORS};

    #[test]
    fn test_aggregate_keys_round_trip_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 11, 3).unwrap();
        assert_eq!(aggregate_key(date), "productivity_2024-11-03");
        assert_eq!(aggregate_date(&aggregate_key(date)), Some(date));
    }

    #[test]
    fn test_tag_keys_are_not_aggregates() {
        assert_eq!(aggregate_date(TAGS), None);
        assert_eq!(aggregate_date(TAG_COLORS), None);
        assert_eq!(aggregate_date("todos"), None);
    }
}
