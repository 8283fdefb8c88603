use std::{future::Future, ops::Deref};

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{error, warn};

/// Interface for abstracting the raw key-value backend.
pub trait KeyValueStore {
    /// Reads the raw value for `key`. A missing key is `Ok(None)`.
    fn read_raw(&self, key: &str) -> impl Future<Output = Result<Option<String>>>;

    fn write_raw(&self, key: &str, value: String) -> impl Future<Output = Result<()>>;

    /// Writes `value` only when `expected` accepts the value currently stored, checking and
    /// writing as one step. Returns whether the value was written.
    fn compare_and_write_raw(
        &self,
        key: &str,
        expected: impl FnOnce(Option<&str>) -> bool + Send,
        value: String,
    ) -> impl Future<Output = Result<bool>>;

    /// Every key currently present, in no particular order.
    fn keys(&self) -> impl Future<Output = Result<Vec<String>>>;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn read_raw(&self, key: &str) -> impl Future<Output = Result<Option<String>>> {
        self.deref().read_raw(key)
    }

    fn write_raw(&self, key: &str, value: String) -> impl Future<Output = Result<()>> {
        self.deref().write_raw(key, value)
    }

    fn compare_and_write_raw(
        &self,
        key: &str,
        expected: impl FnOnce(Option<&str>) -> bool + Send,
        value: String,
    ) -> impl Future<Output = Result<bool>> {
        self.deref().compare_and_write_raw(key, expected, value)
    }

    fn keys(&self) -> impl Future<Output = Result<Vec<String>>> {
        self.deref().keys()
    }
}

/// JSON layer over a [KeyValueStore]. Reads never fail: anything missing or malformed is
/// reported as absent. Writes are logged and dropped on failure.
#[derive(Debug, Clone)]
pub struct JsonStore<S> {
    inner: S,
}

impl<S: KeyValueStore> JsonStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub async fn read_value(&self, key: &str) -> Option<Value> {
        let raw = match self.inner.read_raw(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read {key}: {e:?}");
                return None;
            }
        };

        serde_json::from_str(&raw)
            .inspect_err(|e| warn!("Value under {key} is not valid json {e}"))
            .ok()
    }

    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read_value(key).await?;
        serde_json::from_value(value)
            .inspect_err(|e| warn!("Value under {key} has unexpected shape {e}"))
            .ok()
    }

    pub async fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.read(key).await.unwrap_or_default()
    }

    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!("Failed to encode value for {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.inner.write_raw(key, raw).await {
            error!("Failed to write {key}: {e:?}");
        }
    }

    /// Writes `value` only when the stored value is still `expected`. Values are compared as
    /// json, so formatting doesn't matter. Returns whether the value was written.
    pub async fn compare_and_write<T: Serialize + ?Sized>(
        &self,
        key: &str,
        expected: &Value,
        value: &T,
    ) -> Result<bool> {
        let raw = serde_json::to_string(value)?;
        let matches = |current: Option<&str>| {
            current
                .and_then(|v| serde_json::from_str::<Value>(v).ok())
                .is_some_and(|v| &v == expected)
        };
        self.inner.compare_and_write_raw(key, matches, raw).await
    }

    /// Keys starting with `prefix`, sorted.
    pub async fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        let mut keys = match self.inner.keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!("Failed to list keys: {e:?}");
                return vec![];
            }
        };
        keys.retain(|key| key.starts_with(prefix));
        keys.sort();
        keys
    }
}
