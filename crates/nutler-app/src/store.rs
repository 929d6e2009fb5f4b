//! Persisted session identity.
//!
//! The only thing that survives a restart is the id of the last user who
//! joined, stored under [`SESSION_KEY`]. The session controller reaches it
//! through the [`SessionStore`] port; [`FileSessionStore`] is the on-disk
//! implementation, a small JSON object shared with other local settings.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use nutler_proto::UserId;
use serde_json::{Map, Value};
use thiserror::Error;

/// Storage key holding the cached user id.
pub const SESSION_KEY: &str = "nutler.userId";

/// Errors from the persistence port.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("session store I/O: {0}")]
    Io(#[from] io::Error),

    /// The stored value is not a user id
    #[error("session store corrupt: {0}")]
    Corrupt(String),
}

/// Persistence port for the cached user id.
pub trait SessionStore: Send {
    /// Cached id, `None` when nothing was stored.
    fn load_session_id(&self) -> Result<Option<UserId>, StoreError>;

    /// Cache an id, replacing any previous one.
    fn save_session_id(&mut self, user_id: UserId) -> Result<(), StoreError>;

    /// Forget the cached id.
    fn clear_session_id(&mut self) -> Result<(), StoreError>;
}

/// JSON-file backed [`SessionStore`].
///
/// The id may be stored as a number or as a numeric string. Unrelated keys
/// in the same file are preserved. Writes go through a temporary file and a
/// rename so a crash never leaves a half-written file behind.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<Map<String, Value>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(StoreError::Corrupt(format!("expected object, found {other}"))),
            Err(err) => Err(StoreError::Corrupt(err.to_string())),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let body = serde_json::to_vec_pretty(map)
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load_session_id(&self) -> Result<Option<UserId>, StoreError> {
        let map = self.read_map()?;
        match map.get(SESSION_KEY) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => parse_id(value).map(Some),
        }
    }

    fn save_session_id(&mut self, user_id: UserId) -> Result<(), StoreError> {
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!(%reason, "replacing corrupt session file");
                Map::new()
            },
            Err(err) => return Err(err),
        };
        map.insert(SESSION_KEY.to_string(), Value::from(user_id));
        self.write_map(&map)
    }

    fn clear_session_id(&mut self) -> Result<(), StoreError> {
        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(StoreError::Corrupt(reason)) => {
                tracing::warn!(%reason, "discarding corrupt session file");
                return self.write_map(&Map::new());
            },
            Err(err) => return Err(err),
        };
        if map.remove(SESSION_KEY).is_none() {
            return Ok(());
        }
        self.write_map(&map)
    }
}

fn parse_id(value: &Value) -> Result<UserId, StoreError> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| StoreError::Corrupt(format!("{SESSION_KEY} is not a user id: {value}")))
}
