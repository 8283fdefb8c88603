use std::{collections::BTreeMap, sync::Mutex};

use anyhow::{anyhow, Result};

use super::kv::KeyValueStore;

/// Process local store. Used in tests and anywhere persistence isn't wanted.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    async fn read_raw(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("Memory store poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn write_raw(&self, key: &str, value: String) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("Memory store poisoned"))?;
        values.insert(key.to_owned(), value);
        Ok(())
    }

    async fn compare_and_write_raw(
        &self,
        key: &str,
        expected: impl FnOnce(Option<&str>) -> bool + Send,
        value: String,
    ) -> Result<bool> {
        let mut values = self.values.lock().map_err(|_| anyhow!("Memory store poisoned"))?;
        if !expected(values.get(key).map(|v| v.as_str())) {
            return Ok(false);
        }
        values.insert(key.to_owned(), value);
        Ok(true)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("Memory store poisoned"))?;
        Ok(values.keys().cloned().collect())
    }
}
