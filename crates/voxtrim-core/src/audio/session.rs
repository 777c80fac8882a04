//! Live encoder sessions keyed by output format and sample rate

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::format::WriterKey;
use super::writer::StreamingWriter;
use crate::error::{Error, Result};

pub(crate) type SharedWriter = Arc<Mutex<Box<dyn StreamingWriter>>>;

/// Identifies one open session. Returned when the session opens and passed
/// back for every later chunk of the same stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    key: WriterKey,
    id: Uuid,
}

impl SessionHandle {
    pub fn key(&self) -> WriterKey {
        self.key
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

struct LiveSession {
    id: Uuid,
    writer: SharedWriter,
}

/// Map from writer key to the live encoder-writer of that session.
///
/// Cloning shares the same map. At most one session per key is live at a
/// time; opening a second one fails with [`Error::SessionConflict`].
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<WriterKey, LiveSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<WriterKey, LiveSession>> {
        // Every update is a single insert or remove; a poisoned map is still consistent.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `writer` as the live session for `key`
    pub(crate) fn insert(
        &self,
        key: WriterKey,
        writer: Box<dyn StreamingWriter>,
    ) -> Result<SessionHandle> {
        let mut sessions = self.sessions();
        if sessions.contains_key(&key) {
            return Err(Error::SessionConflict(key.to_string()));
        }

        let id = Uuid::new_v4();
        sessions.insert(
            key,
            LiveSession {
                id,
                writer: Arc::new(Mutex::new(writer)),
            },
        );
        info!("Opened session {} for {}", id, key);
        Ok(SessionHandle { key, id })
    }

    pub(crate) fn writer(&self, handle: &SessionHandle) -> Result<SharedWriter> {
        match self.sessions().get(&handle.key) {
            Some(session) if session.id == handle.id => Ok(Arc::clone(&session.writer)),
            _ => Err(Error::UnknownSession {
                key: handle.key.to_string(),
                id: handle.id.to_string(),
            }),
        }
    }

    /// Remove the session if `handle` still owns its key
    pub(crate) fn remove(&self, handle: &SessionHandle) -> bool {
        let mut sessions = self.sessions();
        match sessions.get(&handle.key) {
            Some(session) if session.id == handle.id => {
                sessions.remove(&handle.key);
                debug!("Removed session {} for {}", handle.id, handle.key);
                true
            }
            _ => false,
        }
    }

    /// Drop a session without finalizing its writer.
    ///
    /// Returns `false` if the session already finished or never existed.
    pub fn abort(&self, handle: &SessionHandle) -> bool {
        let removed = self.remove(handle);
        if removed {
            warn!("Aborted session {} for {} before its final chunk", handle.id, handle.key);
        }
        removed
    }

    /// Handle of the live session for `key`, if any
    pub fn handle_for(&self, key: &WriterKey) -> Option<SessionHandle> {
        self.sessions().get(key).map(|session| SessionHandle {
            key: *key,
            id: session.id,
        })
    }

    pub fn contains(&self, key: &WriterKey) -> bool {
        self.sessions().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions().is_empty()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.sessions().keys().map(|key| key.to_string()).collect();
        f.debug_struct("SessionRegistry").field("sessions", &keys).finish()
    }
}
