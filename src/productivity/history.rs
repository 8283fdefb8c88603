use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::{
    storage::{
        entities::{decode_sessions, decode_tasks, Task, TimerSession},
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::{clock::SharedClock, time::local_day_start},
};

use super::aggregate::DateRange;

/// Read only queries over the task and session histories.
pub struct History<S> {
    store: JsonStore<S>,
    clock: SharedClock,
}

impl<S: KeyValueStore> History<S> {
    pub fn new(store: JsonStore<S>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn all_sessions(&self) -> Vec<TimerSession> {
        decode_sessions(self.store.read_value(keys::POMODORO_SESSIONS).await)
    }

    pub async fn sessions_by_tag(&self, tag: &str) -> Vec<TimerSession> {
        let mut sessions = self.all_sessions().await;
        sessions.retain(|v| v.has_tag(tag));
        sessions
    }

    /// Current todo list, completed entries included.
    pub async fn all_tasks(&self) -> Vec<Task> {
        decode_tasks(self.store.read_value(keys::TODOS).await)
    }

    pub async fn tasks_by_tag(&self, tag: &str) -> Vec<Task> {
        let mut tasks = self.all_tasks().await;
        tasks.retain(|v| v.has_tag(tag));
        tasks
    }

    /// Completed history followed by completed todos that aren't in it yet. The first entry with
    /// a given id wins.
    pub async fn completed_tasks(&self) -> Vec<Task> {
        let history = decode_tasks(self.store.read_value(keys::COMPLETED_TASKS).await);
        let todos = self.all_tasks().await;

        let mut seen = HashSet::new();
        history
            .into_iter()
            .chain(todos.into_iter().filter(|v| v.completed))
            .filter(|task| seen.insert(task.id.clone()))
            .collect()
    }

    /// Completed tasks that were finished (or created, when the finish moment is unknown) on or
    /// after local midnight of the first day of `range`.
    pub async fn tasks_in_range(&self, range: DateRange) -> Vec<Task> {
        let start = self.range_start(range);
        let mut tasks = self.completed_tasks().await;
        tasks.retain(|task| task.completed_at.unwrap_or(task.created_at) >= start);
        tasks
    }

    pub async fn top_tasks_by_time_spent(
        &self,
        range: DateRange,
        tag: Option<&str>,
        limit: usize,
    ) -> Vec<Task> {
        let mut tasks = self.tasks_in_range(range).await;
        if let Some(tag) = tag {
            tasks.retain(|v| v.has_tag(tag));
        }
        // Stable, ties keep their history order
        tasks.sort_by(|a, b| b.time_spent.cmp(&a.time_spent));
        tasks.truncate(limit);
        tasks
    }

    /// Completed sessions that ended today and aren't linked to a task yet, newest first.
    pub async fn unlinked_sessions_today(&self) -> Vec<TimerSession> {
        let start = self.range_start(DateRange::Day);
        let mut sessions = self.all_sessions().await;
        sessions.retain(|session| {
            session.completed
                && session.associated_task_id.is_none()
                && session.end_time.unwrap_or(session.start_time) >= start
        });
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions
    }

    fn range_start(&self, range: DateRange) -> DateTime<Utc> {
        local_day_start(self.clock.time(), range.days() - 1)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, Utc};

    use crate::{
        productivity::aggregate::DateRange,
        storage::{
            entities::{Task, TimerSession},
            keys,
            kv::JsonStore,
            memory_store::MemoryStore,
        },
        utils::clock::{test_clock::ManualClock, Clock},
    };

    use super::History;

    fn task(id: &str, tags: &[&str], time_spent: u32, completed_at: Option<DateTime<Utc>>) -> Task {
        let created = completed_at.unwrap_or_else(Utc::now) - Duration::hours(1);
        let mut task = Task::new(id.into(), format!("task {id}"), created);
        task.tags = tags.iter().map(|v| v.to_string()).collect();
        task.time_spent = time_spent;
        task.completed = completed_at.is_some();
        task.completed_at = completed_at;
        task
    }

    fn session(id: &str, end: DateTime<Utc>, completed: bool, linked: bool) -> TimerSession {
        TimerSession {
            id: id.into(),
            start_time: end - Duration::minutes(25),
            end_time: Some(end),
            duration: 25,
            completed,
            associated_task_id: linked.then(|| "t".to_string()),
            tags: vec!["Deep Work".into()],
        }
    }

    fn history(clock: &ManualClock) -> (History<Arc<MemoryStore>>, JsonStore<Arc<MemoryStore>>) {
        let store = JsonStore::new(Arc::new(MemoryStore::new()));
        (History::new(store.clone(), Arc::new(clock.clone())), store)
    }

    #[tokio::test]
    async fn test_completed_tasks_merge_history_first() {
        let clock = ManualClock::new();
        let (history, store) = history(&clock);
        let now = clock.time();

        let mut recorded = task("1", &[], 10, Some(now));
        recorded.text = "from history".into();
        store
            .write(keys::COMPLETED_TASKS, &vec![recorded.clone()])
            .await;
        store
            .write(
                keys::TODOS,
                &vec![
                    task("1", &[], 10, Some(now)),
                    task("2", &[], 3, Some(now)),
                    task("3", &[], 3, None),
                ],
            )
            .await;

        let completed = history.completed_tasks().await;
        let ids: Vec<_> = completed.iter().map(|v| v.id.as_str()).collect();

        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(completed[0].text, "from history");
        assert_eq!(history.all_tasks().await.len(), 3);
    }

    #[tokio::test]
    async fn test_top_tasks_respects_range_tag_and_limit() {
        let clock = ManualClock::new();
        let (history, store) = history(&clock);
        let now = clock.time();

        store
            .write(
                keys::COMPLETED_TASKS,
                &vec![
                    task("old", &["Admin"], 500, Some(now - Duration::days(3))),
                    task("a", &["Admin"], 10, Some(now)),
                    task("b", &["Admin", "Learning"], 40, Some(now)),
                    task("c", &["Learning"], 90, Some(now)),
                    task("d", &["Admin"], 20, Some(now)),
                ],
            )
            .await;

        let top_day: Vec<_> = history
            .top_tasks_by_time_spent(DateRange::Day, Some("Admin"), 2)
            .await
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(top_day, vec!["b", "d"]);

        let top_week = history
            .top_tasks_by_time_spent(DateRange::Week, None, 5)
            .await;
        assert_eq!(top_week[0].id, "old");
        assert_eq!(top_week.len(), 5);
    }

    #[tokio::test]
    async fn test_sessions_by_tag() {
        let clock = ManualClock::new();
        let (history, store) = history(&clock);
        let mut other = session("2", clock.time(), true, false);
        other.tags = vec!["Other".into()];
        store
            .write(
                keys::POMODORO_SESSIONS,
                &vec![session("1", clock.time(), true, false), other],
            )
            .await;

        assert_eq!(history.sessions_by_tag("Other").await.len(), 1);
        assert_eq!(history.sessions_by_tag("Deep Work").await[0].id, "1");
        assert!(history.sessions_by_tag("Admin").await.is_empty());
    }

    #[tokio::test]
    async fn test_unlinked_sessions_today_newest_first() {
        let clock = ManualClock::new();
        let (history, store) = history(&clock);
        let now = clock.time();

        store
            .write(
                keys::POMODORO_SESSIONS,
                &vec![
                    session("yesterday", now - Duration::days(1), true, false),
                    session("early", now - Duration::minutes(60), true, false),
                    session("late", now, true, false),
                    session("linked", now, true, true),
                    session("abandoned", now, false, false),
                ],
            )
            .await;

        let ids: Vec<_> = history
            .unlinked_sessions_today()
            .await
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["late", "early"]);
    }
}
