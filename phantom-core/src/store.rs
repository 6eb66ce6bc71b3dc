//! Session persistence.
//!
//! A session is stored as one `SessionRecord`: the full `GameState` plus the
//! suspend point it is parked at. Writes are guarded by an optimistic
//! revision check so two drivers racing on the same session cannot silently
//! overwrite each other. `FileStore` holds an OS lock on a per-session lock
//! file while it checks and replaces a record, so the check also holds
//! across store instances and processes sharing one directory.

use crate::state::{GameResult, GameState, Phase, SuspendPoint};
use async_trait::async_trait;
use fd_lock::RwLock as FileLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Session {session_id} was modified concurrently: expected revision {expected}, found {found}")]
    Conflict {
        session_id: String,
        expected: u64,
        found: u64,
    },

    #[error("Session {0} has a suspend point that does not match its state")]
    CheckpointMismatch(String),

    #[error("Session {0} is being written by another store")]
    Locked(String),
}

/// Current record format version.
pub const SAVE_VERSION: u32 = 1;

/// One persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Record format version for compatibility checking.
    pub version: u32,

    pub session_id: String,

    /// When the record was written, seconds since the Unix epoch.
    pub saved_at: String,

    pub state: GameState,

    /// Which phase-table cell is waiting for input.
    pub suspend_point: SuspendPoint,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, state: GameState, suspend_point: SuspendPoint) -> Self {
        Self {
            version: SAVE_VERSION,
            session_id: session_id.into(),
            saved_at: timestamp_now(),
            state,
            suspend_point,
        }
    }

    /// Check the version and that the suspend point matches the state.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.version != SAVE_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SAVE_VERSION,
                found: self.version,
            });
        }
        let expected = SuspendPoint::for_state(&self.state);
        if expected.as_ref() != Some(&self.suspend_point) || self.state.suspend_point != self.suspend_point {
            return Err(StoreError::CheckpointMismatch(self.session_id.clone()));
        }
        Ok(())
    }
}

/// Storage for session records, atomic per session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session, or `None` if it was never saved.
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Save a session. `state.revision` must be one more than the stored
    /// revision (a missing record counts as revision 0).
    async fn save(
        &self,
        session_id: &str,
        state: &GameState,
        suspend_point: &SuspendPoint,
    ) -> Result<(), StoreError>;
}

fn check_revision(session_id: &str, stored: Option<u64>, incoming: u64) -> Result<(), StoreError> {
    let found = stored.unwrap_or(0);
    let expected = incoming.saturating_sub(1);
    if incoming == 0 || found != expected {
        return Err(StoreError::Conflict {
            session_id: session_id.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

/// In-memory store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let records = self.records.read().await;
        match records.get(session_id) {
            Some(record) => {
                record.validate()?;
                Ok(Some(record.clone()))
            }
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        session_id: &str,
        state: &GameState,
        suspend_point: &SuspendPoint,
    ) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let stored = records.get(session_id).map(|r| r.state.revision);
        check_revision(session_id, stored, state.revision)?;
        records.insert(
            session_id.to_string(),
            SessionRecord::new(session_id, state.clone(), suspend_point.clone()),
        );
        Ok(())
    }
}

/// One pretty-printed JSON file per session in a directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a session id.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize(session_id)))
    }

    /// Lock file guarding writes to a session's record.
    fn lock_path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.lock", sanitize(session_id)))
    }

    async fn read_record(path: &Path) -> Result<Option<SessionRecord>, StoreError> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: SessionRecord = serde_json::from_str(&content)?;
        record.validate()?;
        Ok(Some(record))
    }

    /// List stored sessions without loading their full state.
    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, StoreError> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                if let Ok(info) = SessionInfo::peek(&path).await {
                    sessions.push(info);
                }
            }
        }

        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let path = self.path_for(session_id);
        debug!(session_id, path = %path.display(), "Loading session");
        Self::read_record(&path).await
    }

    async fn save(
        &self,
        session_id: &str,
        state: &GameState,
        suspend_point: &SuspendPoint,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(session_id);

        let lock_file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path_for(session_id))?;
        let mut file_lock = FileLock::new(lock_file);
        let _held = file_lock
            .try_write()
            .map_err(|_| StoreError::Locked(session_id.to_string()))?;

        let stored = Self::read_record(&path).await?.map(|r| r.state.revision);
        check_revision(session_id, stored, state.revision)?;

        let record = SessionRecord::new(session_id, state.clone(), suspend_point.clone());
        let content = serde_json::to_string_pretty(&record)?;
        let tmp = self
            .dir
            .join(format!("{}.{}.tmp", sanitize(session_id), Uuid::new_v4().simple()));
        fs::write(&tmp, content).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            fs::remove_file(&tmp).await.ok();
            return Err(e.into());
        }

        debug!(session_id, revision = state.revision, "Session saved");
        Ok(())
    }
}

/// Lightweight description of a stored session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: String,
    pub saved_at: String,
    pub round_number: u32,
    pub phase: Phase,
    pub finished: bool,
}

impl SessionInfo {
    async fn peek(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).await?;

        // Parse just enough to describe the session
        #[derive(Deserialize)]
        struct PartialState {
            round_number: u32,
            phase: Phase,
            game_result: Option<GameResult>,
        }

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            session_id: String,
            saved_at: String,
            state: PartialState,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(StoreError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(Self {
            session_id: partial.session_id,
            saved_at: partial.saved_at,
            round_number: partial.state.round_number,
            phase: partial.state.phase,
            finished: partial.state.game_result.is_some(),
        })
    }
}

/// Session id reduced to characters that are safe in a file name.
fn sanitize(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Current time as seconds since the Unix epoch.
fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}
