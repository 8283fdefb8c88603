use std::{
    env, io,
    path::{Path, PathBuf},
};

use anyhow::Result;

const APPLICATION_DIR_NAME: &str = "focusboard";

/// Resolves the default directory holding the store and the logs, creating it when missing.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = {
        #[cfg(windows)]
        {
            let mut path = env::var("APPDATA")
                .map(PathBuf::from)
                .map_err(|_| anyhow::anyhow!("APPDATA should be present on Windows"))?;
            path.push(APPLICATION_DIR_NAME);
            path
        }
        #[cfg(not(windows))]
        {
            let mut path = env::var("XDG_STATE_HOME")
                .map(PathBuf::from)
                .or_else(|_| {
                    env::var("HOME").map(|home| {
                        let mut path = PathBuf::from(home);
                        path.push(".local/state");
                        path
                    })
                })
                .map_err(|_| anyhow::anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?;
            path.push(APPLICATION_DIR_NAME);
            path
        }
    };

    ensure_dir(path)
}

/// Uses `dir` when given, otherwise the default application directory. The result is absolute
/// since the daemon leaves its working directory.
pub fn resolve_application_path(dir: Option<PathBuf>) -> Result<PathBuf> {
    dir.map_or_else(create_application_default_path, ensure_dir)
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(std::path::absolute(path)?),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(std::path::absolute(path)?),
        Err(v) => Err(v.into()),
    }
}

pub fn store_path(application_path: &Path) -> PathBuf {
    application_path.join("store")
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{resolve_application_path, store_path};

    #[test]
    fn test_given_dir_is_created() {
        let dir = tempdir().unwrap();
        let app_dir = dir.path().join("nested").join("focusboard");

        let resolved = resolve_application_path(Some(app_dir.clone())).unwrap();

        assert!(resolved.is_absolute());
        assert!(resolved.is_dir());
        assert_eq!(store_path(&resolved), resolved.join("store"));
    }
}
