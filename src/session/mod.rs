use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to read session file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write session file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt session file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Bearer token plus the user record returned at login.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: serde_json::Value,
}

/// Persistent holder for the current session. No expiry.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> Result<Option<Session>, SessionError>;

    fn set(&self, session: &Session) -> Result<(), SessionError>;

    fn clear(&self) -> Result<(), SessionError>;

    fn token(&self) -> Result<Option<String>, SessionError> {
        Ok(self.get()?.map(|s| s.token))
    }
}

// On-disk shape: the two entries a browser would keep in local storage.
#[derive(Debug, Default, Deserialize, Serialize)]
struct StoredEntries {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Clone, Debug)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Result<Option<Session>, SessionError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Read {
                    path: self.display(),
                    source: e,
                })
            }
        };
        let entries: StoredEntries =
            serde_json::from_str(&contents).map_err(|e| SessionError::Corrupt {
                path: self.display(),
                source: e,
            })?;
        let Some(token) = entries.access_token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let user = match entries.user.as_deref() {
            Some(raw) => serde_json::from_str(raw).map_err(|e| SessionError::Corrupt {
                path: self.display(),
                source: e,
            })?,
            None => serde_json::Value::Null,
        };
        Ok(Some(Session { token, user }))
    }

    fn set(&self, session: &Session) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SessionError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        let entries = StoredEntries {
            access_token: Some(session.token.clone()),
            user: Some(session.user.to_string()),
        };
        let contents = serde_json::to_string_pretty(&entries).map_err(|e| SessionError::Corrupt {
            path: self.display(),
            source: e,
        })?;
        // write-then-rename so both entries land together
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| SessionError::Write {
            path: tmp.display().to_string(),
            source: e,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| SessionError::Write {
            path: self.display(),
            source: e,
        })?;
        debug!(path = %self.display(), "session stored");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Write {
                path: self.display(),
                source: e,
            }),
        }
    }
}

/// Process-local store, used by tests and embedders that manage tokens themselves.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Result<Option<Session>, SessionError> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone())
    }

    fn set(&self, session: &Session) -> Result<(), SessionError> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}
