use anyhow::{bail, Result};
use tracing::info;

use crate::{
    storage::{
        entities::{decode_sessions, decode_tasks, Task, TimerSession},
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::{clock::SharedClock, time::local_date},
};

use super::{
    aggregate::AggregateStore,
    observers::{Observers, SubscriptionId},
};

#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    TaskCompleted(Task),
    SessionRecorded(TimerSession),
    SessionLinked { session_id: String, task_id: String },
}

/// Turns completion events into aggregate updates plus a history entry.
///
/// Contributions are additive only. Nothing here ever takes time back out of an aggregate.
pub struct Recorder<S> {
    store: JsonStore<S>,
    aggregates: AggregateStore<S>,
    clock: SharedClock,
    observers: Observers<RecorderEvent>,
}

impl<S: KeyValueStore + Clone> Recorder<S> {
    pub fn new(store: JsonStore<S>, clock: SharedClock) -> Self {
        Self {
            aggregates: AggregateStore::new(store.clone(), clock.clone()),
            store,
            clock,
            observers: Observers::default(),
        }
    }
}

impl<S: KeyValueStore> Recorder<S> {
    /// Credits a completed task to today's aggregate and appends it to the completed history.
    pub async fn record_task_completion(&self, task: &Task) {
        let mut aggregate = self.aggregates.get_or_create(self.clock.today()).await;
        aggregate.total_tasks_completed += 1;
        aggregate.credit_time(&task.tags, task.time_spent);
        self.aggregates.save(&aggregate).await;

        let mut history = decode_tasks(self.store.read_value(keys::COMPLETED_TASKS).await);
        history.push(task.clone());
        self.store.write(keys::COMPLETED_TASKS, &history).await;

        info!("Recorded completion of task {} ({}m)", task.id, task.time_spent);
        self.observers
            .notify(&RecorderEvent::TaskCompleted(task.clone()));
    }

    /// Appends `session` to the session history. Only completed sessions count towards the
    /// aggregate of the day the session ended on.
    pub async fn record_pomodoro_session(&self, session: &TimerSession) {
        if session.completed {
            let ended = session.end_time.unwrap_or_else(|| self.clock.time());
            let mut aggregate = self.aggregates.get_or_create(local_date(ended)).await;
            aggregate.total_pomodoro_completed += 1;
            aggregate.credit_time(&session.tags, session.duration);
            self.aggregates.save(&aggregate).await;
        }

        let mut sessions = self.sessions().await;
        sessions.push(session.clone());
        self.store.write(keys::POMODORO_SESSIONS, &sessions).await;

        info!(
            "Recorded session {} ({}m, completed: {})",
            session.id, session.duration, session.completed
        );
        self.observers
            .notify(&RecorderEvent::SessionRecorded(session.clone()));
    }

    /// Links a recorded session to a task and adds the session duration to the task's time.
    pub async fn sync_session_with_task(&self, session_id: &str, task_id: &str) -> Result<()> {
        let mut sessions = self.sessions().await;
        let Some(session) = sessions.iter_mut().find(|v| v.id == session_id) else {
            bail!("No session with id {session_id}");
        };
        let mut tasks = decode_tasks(self.store.read_value(keys::TODOS).await);
        let Some(task) = tasks.iter_mut().find(|v| v.id == task_id) else {
            bail!("No task with id {task_id}");
        };

        session.associated_task_id = Some(task_id.to_owned());
        task.time_spent += session.duration;
        self.store.write(keys::POMODORO_SESSIONS, &sessions).await;
        self.store.write(keys::TODOS, &tasks).await;

        info!("Linked session {session_id} with task {task_id}");
        self.observers.notify(&RecorderEvent::SessionLinked {
            session_id: session_id.to_owned(),
            task_id: task_id.to_owned(),
        });
        Ok(())
    }

    async fn sessions(&self) -> Vec<TimerSession> {
        decode_sessions(self.store.read_value(keys::POMODORO_SESSIONS).await)
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&RecorderEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}
