//! Flat-file JSON persistence.
//!
//! Each data file is a single JSON document (usually an array) that is read
//! whole, changed in memory and written back whole. A per-file async mutex
//! serializes those read-modify-write cycles inside this process; writes go to
//! a sibling temp file that is renamed over the original.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::{
    Comment, DashboardSettings, FilterPreset, Issue, Notification, Settings, User,
};
use crate::seed;

type Seed<T> = Box<dyn Fn() -> T + Send + Sync>;

pub struct JsonFile<T> {
    path: PathBuf,
    lock: Mutex<()>,
    seed: Seed<T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// A file whose initial contents are `T::default()`.
    pub fn new(path: impl Into<PathBuf>) -> Self
    where
        T: Default,
    {
        Self::seeded(path, T::default)
    }

    /// A file that is created from `seed` the first time it is read.
    pub fn seeded(path: impl Into<PathBuf>, seed: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            seed: Box::new(seed),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> Result<T, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    /// Loads the document, hands it to `f` and persists it if `f` succeeds.
    pub async fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut T) -> Result<R, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let out = f(&mut doc)?;
        self.save(&doc).await?;
        Ok(out)
    }

    async fn load(&self) -> Result<T, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) if raw.trim().is_empty() => self.initialize().await,
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
                path: self.path.clone(),
                source,
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => self.initialize().await,
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn initialize(&self) -> Result<T, StoreError> {
        let doc = (self.seed)();
        self.save(&doc).await?;
        log::info!("initialized data file {:?}", self.path);
        Ok(doc)
    }

    async fn save(&self, doc: &T) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }

        let body = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, body).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}

/// Every data file the service owns.
pub struct Store {
    pub issues: JsonFile<Vec<Issue>>,
    pub comments: JsonFile<Vec<Comment>>,
    pub users: JsonFile<Vec<User>>,
    pub settings: JsonFile<Settings>,
    pub presets: JsonFile<Vec<FilterPreset>>,
    pub notifications: JsonFile<Vec<Notification>>,
    pub dashboard_settings: JsonFile<BTreeMap<String, DashboardSettings>>,
}

impl Store {
    pub fn open(config: &Config) -> Self {
        let dir = &config.data_dir;
        let salt = config.password_salt.clone();

        Self {
            issues: JsonFile::new(dir.join("issues.json")),
            comments: JsonFile::new(dir.join("comments.json")),
            users: JsonFile::seeded(dir.join("users.json"), move || seed::users(&salt)),
            settings: JsonFile::seeded(dir.join("settings.json"), || seed::SETTINGS.clone()),
            presets: JsonFile::seeded(dir.join("filter-presets.json"), seed::presets),
            notifications: JsonFile::new(dir.join("notifications.json")),
            dashboard_settings: JsonFile::new(dir.join("dashboard-settings.json")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::Arc;

    #[tokio::test]
    async fn missing_file_is_seeded_and_written() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<String>> =
            JsonFile::seeded(dir.path().join("names.json"), || vec!["seed".to_string()]);

        assert_eq!(file.read().await.unwrap(), vec!["seed".to_string()]);
        let raw = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(raw, "[\n  \"seed\"\n]");
    }

    #[tokio::test]
    async fn failed_update_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(dir.path().join("n.json"));
        file.update(|v| {
            v.push(1);
            Ok::<_, ApiError>(())
        })
        .await
        .unwrap();

        let res = file
            .update(|v| {
                v.push(2);
                Err::<(), _>(ApiError::bad_request("nope"))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(file.read().await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let file: JsonFile<Vec<u32>> = JsonFile::new(path);
        assert!(matches!(file.read().await, Err(StoreError::Parse { .. })));
    }

    #[tokio::test]
    async fn concurrent_updates_in_one_process_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let file: Arc<JsonFile<Vec<u32>>> = Arc::new(JsonFile::new(dir.path().join("n.json")));

        let tasks: Vec<_> = (0..20)
            .map(|n| {
                let file = Arc::clone(&file);
                tokio::spawn(async move {
                    file.update(|v| {
                        v.push(n);
                        Ok::<_, StoreError>(())
                    })
                    .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let mut stored = file.read().await.unwrap();
        stored.sort_unstable();
        assert_eq!(stored, (0..20).collect::<Vec<_>>());
    }
}
