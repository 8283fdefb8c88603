use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::{
    storage::{
        entities::{decode_sessions, decode_tasks, DailyAggregate, Tag, Task, TimerSession},
        keys,
        kv::{JsonStore, KeyValueStore},
    },
    utils::clock::SharedClock,
};

use super::{
    aggregate::AggregateStore,
    tags::{TagEvent, TagRegistry},
};

/// Fields an import document can't do without.
const REQUIRED_FIELDS: [&str; 4] = ["productivityData", "pomodoroSessions", "tasks", "tags"];

/// Everything the dashboard tracks, as a single json document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Aggregates by their storage key.
    pub productivity_data: BTreeMap<String, DailyAggregate>,
    pub pomodoro_sessions: Vec<TimerSession>,
    pub tasks: Vec<Task>,
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_colors: Option<BTreeMap<Tag, String>>,
    #[serde(default)]
    pub export_date: Option<DateTime<Utc>>,
}

pub struct DataTransfer<S> {
    store: JsonStore<S>,
    aggregates: AggregateStore<S>,
    tags: Arc<TagRegistry<S>>,
    clock: SharedClock,
}

impl<S: KeyValueStore + Clone> DataTransfer<S> {
    pub fn new(store: JsonStore<S>, tags: Arc<TagRegistry<S>>, clock: SharedClock) -> Self {
        Self {
            aggregates: AggregateStore::new(store.clone(), clock.clone()),
            store,
            tags,
            clock,
        }
    }
}

impl<S: KeyValueStore> DataTransfer<S> {
    pub async fn export(&self) -> ExportDocument {
        ExportDocument {
            productivity_data: self.aggregates.all().await,
            pomodoro_sessions: decode_sessions(
                self.store.read_value(keys::POMODORO_SESSIONS).await,
            ),
            tasks: decode_tasks(self.store.read_value(keys::TODOS).await),
            tags: self.tags.list_tags().await,
            tag_colors: Some(self.tags.color_overrides().await),
            export_date: Some(self.clock.time()),
        }
    }

    pub async fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export().await)?)
    }

    /// Replaces stored data with the content of `json`. The whole document is validated first,
    /// so a rejected document leaves the store untouched.
    pub async fn import_json(&self, json: &str) -> Result<()> {
        let document = parse_document(json)?;

        self.store.write(keys::TAGS, &document.tags).await;
        if let Some(colors) = &document.tag_colors {
            self.store.write(keys::TAG_COLORS, colors).await;
        }
        self.store
            .write(keys::POMODORO_SESSIONS, &document.pomodoro_sessions)
            .await;
        self.store.write(keys::TODOS, &document.tasks).await;
        for (key, aggregate) in document.productivity_data.iter() {
            self.store.write(key, aggregate).await;
        }

        info!(
            "Imported {} aggregates, {} sessions, {} tasks",
            document.productivity_data.len(),
            document.pomodoro_sessions.len(),
            document.tasks.len()
        );
        self.tags.notify(TagEvent::TagsChanged);
        Ok(())
    }
}

fn parse_document(json: &str) -> Result<ExportDocument> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Object(fields) = &value else {
        bail!("Import document must be a json object");
    };
    for field in REQUIRED_FIELDS {
        if matches!(fields.get(field), None | Some(Value::Null)) {
            bail!("Import document is missing {field}");
        }
    }

    let document: ExportDocument = serde_json::from_value(value)
        .map_err(|e| anyhow!("Import document is malformed: {e}"))?;
    if let Some(key) = document
        .productivity_data
        .keys()
        .find(|key| keys::aggregate_date(key).is_none())
    {
        bail!("{key} is not a productivity data key");
    }
    Ok(document)
}
