//! Session persistence backends.
//!
//! The file backend keeps every session in one JSON document, each entry
//! next to the SHA-256 digest of its serialized form. Writes go to a
//! temporary sibling first and are renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use alloy::primitives::hex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use rusty_wc_core::{PortError, Session, SessionPersistencePort};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    entries: Vec<StoreEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreEntry {
    digest: String,
    session: Value,
}

fn entry_digest(session: &Value) -> Result<String, PortError> {
    let bytes = serde_json::to_vec(session)
        .map_err(|e| PortError::Storage(format!("encode session: {e}")))?;
    Ok(hex::encode_prefixed(Sha256::digest(&bytes)))
}

#[derive(Debug, Clone)]
pub struct FileSessionPersistence {
    path: PathBuf,
}

impl FileSessionPersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "sessions.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionPersistencePort for FileSessionPersistence {
    /// A missing or unreadable document is an empty store. Entries whose
    /// digest does not match are skipped.
    fn load_sessions(&self) -> Result<Vec<Value>, PortError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session store yet");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(PortError::Storage(format!(
                    "read {}: {e}",
                    self.path.display()
                )))
            }
        };

        let file: StoreFile = match serde_json::from_slice(&raw) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "session store is corrupt; starting empty");
                return Ok(Vec::new());
            }
        };
        if file.version != STORE_VERSION {
            warn!(path = %self.path.display(), version = file.version, "unknown session store version; starting empty");
            return Ok(Vec::new());
        }

        let mut sessions = Vec::with_capacity(file.entries.len());
        for (idx, entry) in file.entries.into_iter().enumerate() {
            match entry_digest(&entry.session) {
                Ok(digest) if digest.eq_ignore_ascii_case(&entry.digest) => {
                    sessions.push(entry.session)
                }
                _ => warn!(index = idx, "session entry failed integrity check; dropping"),
            }
        }
        Ok(sessions)
    }

    fn save_sessions(&self, sessions: &[Session]) -> Result<(), PortError> {
        let mut entries = Vec::with_capacity(sessions.len());
        for session in sessions {
            let session = serde_json::to_value(session)
                .map_err(|e| PortError::Storage(format!("encode session: {e}")))?;
            entries.push(StoreEntry {
                digest: entry_digest(&session)?,
                session,
            });
        }
        let content = serde_json::to_vec_pretty(&StoreFile {
            version: STORE_VERSION,
            entries,
        })
        .map_err(|e| PortError::Storage(format!("encode session store: {e}")))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| PortError::Storage(format!("create {}: {e}", dir.display())))?;
        }
        let temp_path = self.temp_path();
        fs::write(&temp_path, content)
            .map_err(|e| PortError::Storage(format!("write {}: {e}", temp_path.display())))?;
        fs::rename(&temp_path, &self.path)
            .map_err(|e| PortError::Storage(format!("rename {}: {e}", temp_path.display())))?;
        debug!(path = %self.path.display(), count = sessions.len(), "session store written");
        Ok(())
    }
}

/// Volatile backend. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionPersistence {
    inner: Arc<Mutex<Vec<Value>>>,
}

impl InMemorySessionPersistence {
    /// Seeds raw records, including ones that will not parse.
    pub fn with_records(records: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(records)),
        }
    }

    pub fn records(&self) -> Result<Vec<Value>, PortError> {
        let g = self
            .inner
            .lock()
            .map_err(|e| PortError::Storage(format!("session store lock poisoned: {e}")))?;
        Ok(g.clone())
    }
}

impl SessionPersistencePort for InMemorySessionPersistence {
    fn load_sessions(&self) -> Result<Vec<Value>, PortError> {
        self.records()
    }

    fn save_sessions(&self, sessions: &[Session]) -> Result<(), PortError> {
        let records = sessions
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PortError::Storage(format!("encode session: {e}")))?;
        let mut g = self
            .inner
            .lock()
            .map_err(|e| PortError::Storage(format!("session store lock poisoned: {e}")))?;
        *g = records;
        Ok(())
    }
}
