//! Session registry.
//!
//! Each remote session gets its own [`Engine`] and [`FrameReader`], addressed by a
//! [`SessionId`]. The registry hands out cloned [`Session`] handles; callers drop
//! the registry borrow before working on a session, so independent sessions only
//! contend on their own engine lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::info;

use super::engine::{Engine, FrameReader};
use super::error::{DecodeError, Result};

/// Identifier of one remote session.
pub type SessionId = u64;

/// Shared handle to the engine and reader of one session.
#[derive(Debug, Clone)]
pub struct Session {
    engine: Arc<Mutex<Engine>>,
    reader: Arc<Mutex<FrameReader>>,
}

impl Session {
    fn new() -> Self {
        let (engine, reader) = Engine::new();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            reader: Arc::new(Mutex::new(reader)),
        }
    }

    /// Locks this session's engine. Holding the guard makes the caller the single writer.
    pub fn engine(&self) -> MutexGuard<'_, Engine> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks this session's reader. Resize acknowledgements made through it are
    /// seen by every handle to the session.
    pub fn reader(&self) -> MutexGuard<'_, FrameReader> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the sessions of one viewer process.
#[derive(Debug)]
pub struct SessionRegistry {
    next_id: SessionId,
    sessions: HashMap<SessionId, Session>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            sessions: HashMap::new(),
        }
    }

    /// Creates a new, uninitialized session and returns its id. Ids start at 1.
    pub fn create(&mut self) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        self.sessions.insert(id, Session::new());
        info!("Created framebuffer session {}", id);
        id
    }

    /// Returns a handle to the session, usable after the registry borrow ends.
    pub fn get(&self, id: SessionId) -> Result<Session> {
        self.sessions.get(&id).cloned().ok_or(DecodeError::UnknownSession(id))
    }

    /// Ends a session. Its framebuffer is freed once outstanding handles are dropped.
    pub fn remove(&mut self, id: SessionId) -> Result<Session> {
        let session = self.sessions.remove(&id).ok_or(DecodeError::UnknownSession(id))?;
        info!("Destroyed framebuffer session {}", id);
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
