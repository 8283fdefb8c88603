use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Result};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Mutex as AsyncMutex,
};
use tracing::{debug, instrument};

use super::kv::KeyValueStore;

const VALUE_EXTENSION: &str = "json";
const LOCK_EXTENSION: &str = "lock";
const TEMP_EXTENSION: &str = "tmp";

/// The main realization of [KeyValueStore]. Every key is a `<key>.json` file inside of the store
/// directory.
///
/// The cli and the daemon use the same directory at the same time, so every access goes through
/// a per key lock file: shared for reads, exclusive for writes. Writes land in a temporary file
/// first and are renamed over the value, so a reader never sees a half written value.
///
/// File locks block the thread, so within the process every key is guarded by an async mutex
/// first. A file lock is then only ever waited on while another process holds it.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    key_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            key_locks: Mutex::default(),
        })
    }

    fn file_for(&self, key: &str, extension: &str) -> Result<PathBuf> {
        let is_plain_name = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !is_plain_name {
            bail!("Key {key:?} can't be used as a file name");
        }
        Ok(self.dir.join(format!("{key}.{extension}")))
    }

    fn key_lock(&self, key: &str) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .key_locks
            .lock()
            .map_err(|_| anyhow!("Key locks poisoned"))?;
        Ok(locks.entry(key.to_owned()).or_default().clone())
    }

    async fn open_lock(&self, key: &str) -> Result<File> {
        let path = self.file_for(key, LOCK_EXTENSION)?;
        Ok(File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .await?)
    }
}

async fn read_value_file(path: &Path) -> std::io::Result<Option<String>> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut content = String::new();
    file.read_to_string(&mut content).await?;
    Ok(Some(content))
}

async fn replace_value_file(path: &Path, temp_path: &Path, value: &str) -> std::io::Result<()> {
    let mut temp = File::create(temp_path).await?;
    temp.write_all(value.as_bytes()).await?;
    temp.flush().await?;
    temp.sync_all().await?;
    tokio::fs::rename(temp_path, path).await
}

impl KeyValueStore for FileStore {
    #[instrument(skip(self))]
    async fn read_raw(&self, key: &str) -> Result<Option<String>> {
        let path = self.file_for(key, VALUE_EXTENSION)?;
        let key_lock = self.key_lock(key)?;
        let _guard = key_lock.lock().await;
        let lock = self.open_lock(key).await?;
        lock.lock_shared()?;

        let result = read_value_file(&path).await;

        lock.unlock_async().await?;
        Ok(result?)
    }

    #[instrument(skip(self, value))]
    async fn write_raw(&self, key: &str, value: String) -> Result<()> {
        let path = self.file_for(key, VALUE_EXTENSION)?;
        let temp_path = self.file_for(key, TEMP_EXTENSION)?;
        let key_lock = self.key_lock(key)?;
        let _guard = key_lock.lock().await;
        let lock = self.open_lock(key).await?;
        lock.lock_exclusive()?;

        let result = replace_value_file(&path, &temp_path, &value).await;

        lock.unlock_async().await?;
        debug!("Wrote {} bytes into {path:?}", value.len());
        Ok(result?)
    }

    #[instrument(skip(self, expected, value))]
    async fn compare_and_write_raw(
        &self,
        key: &str,
        expected: impl FnOnce(Option<&str>) -> bool + Send,
        value: String,
    ) -> Result<bool> {
        let path = self.file_for(key, VALUE_EXTENSION)?;
        let temp_path = self.file_for(key, TEMP_EXTENSION)?;
        let key_lock = self.key_lock(key)?;
        let _guard = key_lock.lock().await;
        let lock = self.open_lock(key).await?;
        lock.lock_exclusive()?;

        let result = async {
            let current = read_value_file(&path).await?;
            if !expected(current.as_deref()) {
                return Ok(false);
            }
            replace_value_file(&path, &temp_path, &value).await?;
            Ok::<_, std::io::Error>(true)
        }
        .await;

        lock.unlock_async().await?;
        Ok(result?)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut keys = vec![];
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|v| v.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|v| v.to_str()) {
                keys.push(stem.to_owned());
            }
        }
        Ok(keys)
    }
}
