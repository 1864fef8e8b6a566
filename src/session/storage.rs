//! Durable key/value storage backing the session.
//!
//! The layout is a flat string map; every session field lives under its own key
//! and all of them are removed together on logout or expiry.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use thiserror::Error;
use tracing::{debug, warn};

use crate::util::lock::mutex_lock;

const SOURCE: &str = "session::storage";

pub const ACCESS_TOKEN: &str = "accessToken";
pub const CLIENT: &str = "client";
pub const UID: &str = "uid";
pub const EXPIRY: &str = "expiry";
pub const NAME: &str = "name";
pub const EMAIL: &str = "email";
pub const NICKNAME: &str = "nickname";
pub const ROLE: &str = "role";
pub const SELECTED_COURSE_ID: &str = "selectedCourseId";

/// Every key the session writes, in write order.
pub const SESSION_KEYS: [&str; 9] = [
    ACCESS_TOKEN,
    CLIENT,
    UID,
    EXPIRY,
    NAME,
    EMAIL,
    NICKNAME,
    ROLE,
    SELECTED_COURSE_ID,
];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write session storage `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode session storage: {0}")]
    Encode(#[from] serde_json::Error),
}

/// String key/value storage that survives process restarts.
///
/// Reads never fail; a missing or unreadable value reads as `None`.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Process-local storage, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.values, SOURCE, "memory.len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        mutex_lock(&self.values, SOURCE, "memory.get").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        mutex_lock(&self.values, SOURCE, "memory.set").insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        mutex_lock(&self.values, SOURCE, "memory.remove").remove(key);
        Ok(())
    }
}

/// JSON object file holding the key/value map.
///
/// The whole map is rewritten on every change. A corrupt file is treated as
/// empty so a damaged session simply reads as signed out.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = read_map(&path);
        debug!(path = %path.display(), keys = values.len(), "Session storage opened");
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let encoded = serde_json::to_vec_pretty(values)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&self.path, encoded).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        mutex_lock(&self.values, SOURCE, "file.get").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = mutex_lock(&self.values, SOURCE, "file.set");
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = mutex_lock(&self.values, SOURCE, "file.remove");
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&values)
    }
}

fn read_map(path: &Path) -> BTreeMap<String, String> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return BTreeMap::new(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Session storage unreadable; starting empty");
            return BTreeMap::new();
        }
    };

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        warn!(path = %path.display(), error = %err, "Session storage corrupt; starting empty");
        BTreeMap::new()
    })
}
