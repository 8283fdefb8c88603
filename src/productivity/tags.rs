use std::collections::BTreeMap;

use anyhow::{bail, Result};
use tracing::{info, warn};

use crate::storage::{
    entities::{Tag, DEFAULT_TAGS},
    keys,
    kv::{JsonStore, KeyValueStore},
};

use super::observers::{Observers, SubscriptionId};

/// Colors handed out to tags without an explicit color.
pub const TAG_PALETTE: [&str; 10] = [
    "#3b82f6", // Blue
    "#8b5cf6", // Purple
    "#10b981", // Green
    "#f59e0b", // Amber
    "#6b7280", // Gray
    "#ef4444", // Red
    "#0ea5e9", // Sky
    "#a855f7", // Violet
    "#eab308", // Yellow
    "#ec4899", // Pink
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEvent {
    TagsChanged,
    ColorsChanged,
}

/// The set of active tags and their display colors.
///
/// Removing a tag only removes it from the active set. Aggregates, tasks and sessions that
/// already reference it keep it.
pub struct TagRegistry<S> {
    store: JsonStore<S>,
    observers: Observers<TagEvent>,
}

impl<S: KeyValueStore> TagRegistry<S> {
    pub fn new(store: JsonStore<S>) -> Self {
        Self {
            store,
            observers: Observers::default(),
        }
    }

    pub async fn list_tags(&self) -> Vec<Tag> {
        load_tags(&self.store).await
    }

    /// Returns false when the tag already exists.
    pub async fn add_tag(&self, name: &str) -> Result<bool> {
        if name.trim().is_empty() {
            bail!("Tag name can't be empty");
        }
        let mut tags = self.list_tags().await;
        if tags.iter().any(|v| v == name) {
            return Ok(false);
        }
        tags.push(name.to_owned());
        self.store.write(keys::TAGS, &tags).await;
        info!("Added tag {name}");
        self.observers.notify(&TagEvent::TagsChanged);
        Ok(true)
    }

    /// Returns false when the tag wasn't active.
    pub async fn remove_tag(&self, name: &str) -> bool {
        let mut tags = self.list_tags().await;
        let before = tags.len();
        tags.retain(|v| v != name);
        if tags.len() == before {
            return false;
        }
        self.store.write(keys::TAGS, &tags).await;
        info!("Removed tag {name}");
        self.observers.notify(&TagEvent::TagsChanged);
        true
    }

    pub async fn get_color(&self, tag: &str) -> String {
        self.color_overrides()
            .await
            .remove(tag)
            .unwrap_or_else(|| default_tag_color(tag).to_owned())
    }

    pub async fn set_color(&self, tag: &str, color: &str) {
        let mut colors = self.color_overrides().await;
        colors.insert(tag.to_owned(), color.to_owned());
        self.store.write(keys::TAG_COLORS, &colors).await;
        self.observers.notify(&TagEvent::ColorsChanged);
    }

    /// Effective color of every active tag.
    pub async fn colors(&self) -> BTreeMap<Tag, String> {
        let overrides = self.color_overrides().await;
        self.list_tags()
            .await
            .into_iter()
            .map(|tag| {
                let color = overrides
                    .get(&tag)
                    .cloned()
                    .unwrap_or_else(|| default_tag_color(&tag).to_owned());
                (tag, color)
            })
            .collect()
    }

    /// Only the colors that were set explicitly.
    pub async fn color_overrides(&self) -> BTreeMap<Tag, String> {
        self.store.read_or_default(keys::TAG_COLORS).await
    }

    pub fn subscribe(&self, callback: impl Fn(&TagEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub(crate) fn notify(&self, event: TagEvent) {
        self.observers.notify(&event);
    }
}

/// Reads the active tags, seeding and persisting the defaults the first time. A corrupted value
/// yields the defaults without overwriting it.
pub async fn load_tags<S: KeyValueStore>(store: &JsonStore<S>) -> Vec<Tag> {
    let defaults = || DEFAULT_TAGS.iter().map(|v| v.to_string()).collect::<Vec<_>>();
    match store.read_value(keys::TAGS).await {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("Stored tags are malformed {e}");
            defaults()
        }),
        None => {
            let tags = defaults();
            store.write(keys::TAGS, &tags).await;
            tags
        }
    }
}

/// Palette color picked from the sum of the tag's UTF-16 code units, so a tag always gets the
/// same color without storing anything.
pub fn default_tag_color(tag: &str) -> &'static str {
    let sum = tag.encode_utf16().map(|v| v as usize).sum::<usize>();
    TAG_PALETTE[sum % TAG_PALETTE.len()]
}
