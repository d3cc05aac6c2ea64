use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bundle::Bundle;
use crate::error::StorageError;
use crate::model::{Account, Notification};
use crate::session::Session;

pub const ACTIVE_USER_KEY: &str = "activeUser";
pub const USERS_LIST_KEY: &str = "usersList";

pub fn bundle_key(account_id: Uuid) -> String {
    format!("data_{account_id}")
}

pub fn notifications_key(account_id: Uuid) -> String {
    format!("notifications_{account_id}")
}

/// String-keyed, string-valued persistence. Every value is a whole JSON document.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Debug)]
pub struct FileStore {
    pub data_dir: PathBuf,
}

impl FileStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> Result<Self, StorageError> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir).map_err(|source| StorageError::Io {
            path: data_dir.clone(),
            source,
        })?;

        info!(data_dir = %data_dir.display(), "opened datastore");
        Ok(Self { data_dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    #[tracing::instrument(skip(self))]
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => {
                debug!(file = %path.display(), bytes = raw.len(), "read key");
                Ok(Some(raw))
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    #[tracing::instrument(skip(self, value))]
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        debug!(file = %path.display(), bytes = value.len(), "writing key atomically");

        let io_err = |source: std::io::Error| StorageError::Io {
            path: path.clone(),
            source,
        };
        let mut temp = NamedTempFile::new_in(&self.data_dir).map_err(io_err)?;
        temp.write_all(value.as_bytes()).map_err(io_err)?;
        temp.flush().map_err(io_err)?;
        temp.persist(&path).map_err(|err| io_err(err.error))?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Typed access to the three kinds of stored documents.
pub struct DataStore {
    kv: Box<dyn KeyValueStore>,
}

impl DataStore {
    pub fn new(kv: Box<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    pub fn open_dir(data_dir: &Path) -> Result<Self, StorageError> {
        Ok(Self::new(Box::new(FileStore::open(data_dir)?)))
    }

    #[tracing::instrument(skip(self))]
    pub fn load_accounts(&self) -> Result<Vec<Account>, StorageError> {
        Ok(self.read_json(USERS_LIST_KEY)?.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, accounts), fields(count = accounts.len()))]
    pub fn save_accounts(&mut self, accounts: &[Account]) -> Result<(), StorageError> {
        self.write_json(USERS_LIST_KEY, accounts)
    }

    #[tracing::instrument(skip(self))]
    pub fn load_session(&self) -> Result<Option<Session>, StorageError> {
        self.read_json(ACTIVE_USER_KEY)
    }

    #[tracing::instrument(skip(self, session), fields(user = %session.user.id))]
    pub fn save_session(&mut self, session: &Session) -> Result<(), StorageError> {
        self.write_json(ACTIVE_USER_KEY, session)
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_session(&mut self) -> Result<(), StorageError> {
        self.kv.remove(ACTIVE_USER_KEY)
    }

    /// Missing bundles read as empty. A bundle from a newer schema is refused.
    #[tracing::instrument(skip(self))]
    pub fn load_bundle(&self, account_id: Uuid) -> Result<Bundle, StorageError> {
        let key = bundle_key(account_id);
        let Some(bundle) = self.read_json::<Bundle>(&key)? else {
            debug!(%key, "no stored bundle; using empty defaults");
            return Ok(Bundle::default());
        };
        bundle.upgrade()
    }

    #[tracing::instrument(skip(self, bundle), fields(
        tasks = bundle.tasks.len(),
        inventory = bundle.inventory.len(),
        recipes = bundle.recipes.len()
    ))]
    pub fn save_bundle(&mut self, account_id: Uuid, bundle: &Bundle) -> Result<(), StorageError> {
        self.write_json(&bundle_key(account_id), bundle)
    }

    /// The account's recent notifications, newest first, stored under their
    /// own key outside the bundle.
    #[tracing::instrument(skip(self))]
    pub fn load_notifications(&self, account_id: Uuid) -> Result<Vec<Notification>, StorageError> {
        Ok(self.read_json(&notifications_key(account_id))?.unwrap_or_default())
    }

    #[tracing::instrument(skip(self, notifications), fields(count = notifications.len()))]
    pub fn save_notifications(
        &mut self,
        account_id: Uuid,
        notifications: &[Notification],
    ) -> Result<(), StorageError> {
        self.write_json(&notifications_key(account_id), notifications)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.kv.get(key)? else {
            return Ok(None);
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn write_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.kv.set(key, &raw)
    }
}

impl std::fmt::Debug for DataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStore").finish_non_exhaustive()
    }
}
