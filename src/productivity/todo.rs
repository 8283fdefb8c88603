use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::{
    storage::{
        entities::{decode_tasks, Task, TaskTimer},
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::{
        clock::SharedClock,
        time::{local_day_start, rounded_minutes},
    },
};

use super::{
    observers::{Observers, SubscriptionId},
    recorder::Recorder,
};

/// A log line celebrates every this many tasks completed in a day.
pub const COMPLETION_MILESTONE: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoEvent {
    TasksUpdated,
}

type TaskTimers = BTreeMap<String, TaskTimer>;

/// The todo list together with per task time tracking.
pub struct TodoList<S> {
    store: JsonStore<S>,
    recorder: Arc<Recorder<S>>,
    clock: SharedClock,
    observers: Observers<TodoEvent>,
}

impl<S: KeyValueStore> TodoList<S> {
    pub fn new(store: JsonStore<S>, recorder: Arc<Recorder<S>>, clock: SharedClock) -> Self {
        Self {
            store,
            recorder,
            clock,
            observers: Observers::default(),
        }
    }

    pub async fn tasks(&self) -> Vec<Task> {
        decode_tasks(self.store.read_value(keys::TODOS).await)
    }

    pub async fn get(&self, id: &str) -> Option<Task> {
        self.tasks().await.into_iter().find(|v| v.id == id)
    }

    pub async fn add(&self, text: &str) -> Result<Task> {
        let text = text.trim();
        if text.is_empty() {
            bail!("Task text can't be empty");
        }

        let mut tasks = self.tasks().await;
        let now = self.clock.time();
        let task = Task::new(next_id(&tasks, now), text.to_owned(), now);
        tasks.push(task.clone());
        self.commit(&tasks).await;
        info!("Added task {}", task.id);
        Ok(task)
    }

    /// Completing a task folds its tracked time into `time_spent` and records the completion.
    /// Reopening only clears the completion flag, recorded statistics stay as they are.
    pub async fn toggle(&self, id: &str) -> Result<Task> {
        let mut tasks = self.tasks().await;
        let task = find_task(&mut tasks, id)?;
        let now = self.clock.time();

        if task.completed {
            task.completed = false;
            task.completed_at = None;
            let task = task.clone();
            self.commit(&tasks).await;
            info!("Reopened task {id}");
            return Ok(task);
        }

        let mut timers = self.timers().await;
        if let Some(timer) = timers.remove(id) {
            task.time_spent += timer.total_time + running_minutes(&timer, now);
            self.store.write(keys::TASK_TIMERS, &timers).await;
        }
        task.completed = true;
        task.completed_at = Some(now);
        let task = task.clone();
        self.commit(&tasks).await;

        self.recorder.record_task_completion(&task).await;
        let count = self.bump_completed_today().await;
        if count % COMPLETION_MILESTONE == 0 {
            info!("Milestone reached, {count} tasks completed today");
        }
        Ok(task)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut tasks = self.tasks().await;
        let before = tasks.len();
        tasks.retain(|v| v.id != id);
        if tasks.len() == before {
            bail!("No task with id {id}");
        }

        let mut timers = self.timers().await;
        if timers.remove(id).is_some() {
            self.store.write(keys::TASK_TIMERS, &timers).await;
        }
        self.commit(&tasks).await;
        info!("Deleted task {id}");
        Ok(())
    }

    /// Returns false when the task already had the tag.
    pub async fn add_tag(&self, id: &str, tag: &str) -> Result<bool> {
        let mut tasks = self.tasks().await;
        let task = find_task(&mut tasks, id)?;
        if task.has_tag(tag) {
            return Ok(false);
        }
        task.tags.push(tag.to_owned());
        self.commit(&tasks).await;
        Ok(true)
    }

    /// Returns false when the task didn't have the tag.
    pub async fn remove_tag(&self, id: &str, tag: &str) -> Result<bool> {
        let mut tasks = self.tasks().await;
        let task = find_task(&mut tasks, id)?;
        if !task.has_tag(tag) {
            return Ok(false);
        }
        task.tags.retain(|v| v != tag);
        self.commit(&tasks).await;
        Ok(true)
    }

    /// Adds a signed number of minutes to the task. The result never drops below zero.
    pub async fn adjust_time(&self, id: &str, minutes: i64) -> Result<u32> {
        let mut tasks = self.tasks().await;
        let task = find_task(&mut tasks, id)?;
        let adjusted = (task.time_spent as i64 + minutes).clamp(0, u32::MAX as i64) as u32;
        task.time_spent = adjusted;
        self.commit(&tasks).await;
        Ok(adjusted)
    }

    /// Starts timing the task, or pauses it when it is the one being timed. Only one task is
    /// timed at a time. Returns whether the task is now being timed.
    pub async fn toggle_timer(&self, id: &str) -> Result<bool> {
        if self.get(id).await.is_none() {
            bail!("No task with id {id}");
        }
        let now = self.clock.time();
        let mut timers = self.timers().await;

        for (other, timer) in timers.iter_mut() {
            if other != id && timer.start_time.is_some() {
                debug!("Pausing timer of task {other}");
                pause(timer, now);
            }
        }

        let timer = timers.entry(id.to_owned()).or_default();
        let started = if timer.start_time.is_some() {
            pause(timer, now);
            false
        } else {
            timer.start_time = Some(now);
            true
        };

        self.store.write(keys::TASK_TIMERS, &timers).await;
        info!("Task {id} timing: {started}");
        Ok(started)
    }

    /// Id of the task being timed right now.
    pub async fn active_task(&self) -> Option<String> {
        self.timers()
            .await
            .into_iter()
            .find(|(_, timer)| timer.start_time.is_some())
            .map(|(id, _)| id)
    }

    /// Minutes tracked for `id` that haven't been added to the task yet.
    pub async fn tracked_minutes(&self, id: &str) -> u32 {
        self.timers()
            .await
            .get(id)
            .map(|timer| timer.total_time + running_minutes(timer, self.clock.time()))
            .unwrap_or(0)
    }

    /// Tasks completed since local midnight. The counter starts over on a new day.
    pub async fn completed_today(&self) -> u32 {
        let today = self.today_stamp();
        let date = self.store.read::<i64>(keys::COMPLETED_DATE).await;
        if date != Some(today) {
            return 0;
        }
        self.store
            .read::<u32>(keys::COMPLETED_TODAY)
            .await
            .unwrap_or(0)
    }

    async fn bump_completed_today(&self) -> u32 {
        let count = self.completed_today().await + 1;
        self.store.write(keys::COMPLETED_TODAY, &count).await;
        self.store
            .write(keys::COMPLETED_DATE, &self.today_stamp())
            .await;
        count
    }

    fn today_stamp(&self) -> i64 {
        local_day_start(self.clock.time(), 0).timestamp_millis()
    }

    async fn timers(&self) -> TaskTimers {
        self.store.read_or_default(keys::TASK_TIMERS).await
    }

    async fn commit(&self, tasks: &[Task]) {
        self.store.write(keys::TODOS, tasks).await;
        self.observers.notify(&TodoEvent::TasksUpdated);
    }

    pub fn subscribe(
        &self,
        callback: impl Fn(&TodoEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

fn find_task<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|v| v.id == id)
        .ok_or_else(|| anyhow!("No task with id {id}"))
}

/// Millisecond timestamp, bumped until it doesn't collide with an existing id.
fn next_id(tasks: &[Task], now: DateTime<Utc>) -> String {
    let mut candidate = now.timestamp_millis();
    while tasks.iter().any(|v| v.id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

fn running_minutes(timer: &TaskTimer, now: DateTime<Utc>) -> u32 {
    timer
        .start_time
        .map(|start| rounded_minutes(Duration::seconds((now - start).num_seconds())))
        .unwrap_or(0)
}

fn pause(timer: &mut TaskTimer, now: DateTime<Utc>) {
    timer.total_time += running_minutes(timer, now);
    timer.start_time = None;
}
