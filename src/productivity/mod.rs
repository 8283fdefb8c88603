//! Tasks, tags and the statistics built from them.
//!
//! Every component works against a shared [JsonStore] and reads what it needs on each call, so
//! the cli and the daemon can work on the same store at the same time. [Dashboard] wires the
//! components together.

pub mod aggregate;
pub mod history;
pub mod idle;
pub mod insights;
pub mod observers;
pub mod recorder;
pub mod streak;
pub mod tags;
pub mod todo;
pub mod transfer;

use std::{path::Path, sync::Arc};

use anyhow::Result;

use crate::{
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

use aggregate::AggregateStore;
use history::History;
use idle::IdleDetector;
use recorder::Recorder;
use streak::Streak;
use tags::TagRegistry;
use todo::TodoList;
use transfer::DataTransfer;

pub struct Dashboard<S> {
    pub tags: Arc<TagRegistry<S>>,
    pub aggregates: AggregateStore<S>,
    pub recorder: Arc<Recorder<S>>,
    pub todos: TodoList<S>,
    pub timer: PomodoroTimer<S>,
    pub history: History<S>,
    pub idle: Arc<IdleDetector<S>>,
    pub streak: Streak<S>,
    pub transfer: DataTransfer<S>,
}

impl<S: KeyValueStore + Clone> Dashboard<S> {
    pub fn new(store: JsonStore<S>, clock: SharedClock) -> Self {
        let tags = Arc::new(TagRegistry::new(store.clone()));
        let recorder = Arc::new(Recorder::new(store.clone(), clock.clone()));
        Self {
            aggregates: AggregateStore::new(store.clone(), clock.clone()),
            todos: TodoList::new(store.clone(), recorder.clone(), clock.clone()),
            timer: PomodoroTimer::new(store.clone(), recorder.clone(), clock.clone()),
            history: History::new(store.clone(), clock.clone()),
            idle: Arc::new(IdleDetector::new(store.clone(), clock.clone())),
            streak: Streak::new(store.clone(), clock.clone()),
            transfer: DataTransfer::new(store, tags.clone(), clock),
            tags,
            recorder,
        }
    }
}

pub type FileDashboard = Dashboard<Arc<FileStore>>;

/// Opens the store kept under `application_path` with the system clock.
pub fn open_dashboard(application_path: &Path) -> Result<FileDashboard> {
    let store = FileStore::new(store_path(application_path))?;
    Ok(Dashboard::new(
        JsonStore::new(Arc::new(store)),
        Arc::new(DefaultClock),
    ))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::{
        storage::{kv::JsonStore, memory_store::MemoryStore},
        utils::clock::test_clock::ManualClock,
    };

    use super::{open_dashboard, recorder::RecorderEvent, Dashboard};

    #[tokio::test]
    async fn test_completion_reaches_recorder_subscribers() {
        let dashboard = Dashboard::new(
            JsonStore::new(Arc::new(MemoryStore::new())),
            Arc::new(ManualClock::new()),
        );
        let completed = Arc::new(AtomicU32::new(0));
        {
            let completed = completed.clone();
            dashboard.recorder.subscribe(move |event| {
                if matches!(event, RecorderEvent::TaskCompleted(_)) {
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let task = dashboard.todos.add("ship it").await.unwrap();
        dashboard.todos.toggle(&task.id).await.unwrap();

        assert_eq!(completed.load(Ordering::SeqCst), 1);
        assert_eq!(dashboard.aggregates.today().await.total_tasks_completed, 1);
    }

    #[tokio::test]
    async fn test_file_dashboard_persists_between_opens() -> Result<()> {
        let dir = tempdir()?;
        {
            let dashboard = open_dashboard(dir.path())?;
            dashboard.todos.add("persisted").await?;
            dashboard.tags.add_tag("Reading").await?;
        }

        let dashboard = open_dashboard(dir.path())?;
        assert_eq!(dashboard.todos.tasks().await[0].text, "persisted");
        assert!(dashboard
            .tags
            .list_tags()
            .await
            .contains(&"Reading".to_string()));
        Ok(())
    }
}
