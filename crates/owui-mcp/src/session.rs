//! Per-connection protocol session

use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

/// One client connection. `Closed` is terminal.
#[derive(Debug)]
pub struct Session {
    id: String,
    state: Mutex<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(SessionState::Uninitialized),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.lock()
    }

    /// Returns false if the session was already closed
    pub fn mark_ready(&self) -> bool {
        let mut state = self.lock();
        if *state == SessionState::Closed {
            return false;
        }
        *state = SessionState::Ready;
        true
    }

    pub fn close(&self) {
        *self.lock() = SessionState::Closed;
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
