use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::{productivity::Dashboard, storage::kv::KeyValueStore};

/// Writes the export document to `output`, or to stdout.
pub async fn process_export_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    output: Option<PathBuf>,
) -> Result<()> {
    let json = dashboard.transfer.export_json().await?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, json).await?;
            info!("Exported into {path:?}");
            println!("Exported into {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub async fn process_import_command<S: KeyValueStore + Clone>(
    dashboard: &Dashboard<S>,
    file: PathBuf,
) -> Result<()> {
    let json = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| anyhow!("Can't read {}: {e}", file.display()))?;
    dashboard.transfer.import_json(&json).await?;
    println!("Imported {}", file.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use tempfile::tempdir;

    use crate::{
        productivity::Dashboard,
        storage::{kv::JsonStore, memory_store::MemoryStore},
        utils::clock::test_clock::ManualClock,
    };

    use super::{process_export_command, process_import_command};

    fn dashboard() -> Dashboard<Arc<MemoryStore>> {
        Dashboard::new(
            JsonStore::new(Arc::new(MemoryStore::new())),
            Arc::new(ManualClock::new()),
        )
    }

    #[tokio::test]
    async fn test_export_file_imports_elsewhere() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("export.json");
        let source = dashboard();
        source.tags.add_tag("Reading").await?;
        let task = source.todos.add("read").await?;
        source.todos.toggle(&task.id).await?;

        process_export_command(&source, Some(path.clone())).await?;
        let target = dashboard();
        process_import_command(&target, path).await?;

        assert!(target.tags.list_tags().await.contains(&"Reading".to_string()));
        assert_eq!(target.todos.tasks().await, source.todos.tasks().await);
        assert_eq!(target.aggregates.today().await.total_tasks_completed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();

        let result = process_import_command(&dashboard(), dir.path().join("nothing.json")).await;

        assert!(result.is_err());
    }
}
