//! Session registry.
//!
//! This module provides a thread-safe registry that creates, looks up,
//! renames, deletes, and enumerates PTY sessions. Sessions whose shell exits
//! are removed automatically through the exit callback each session is
//! started with.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use protocol::SessionSummary;
use uuid::Uuid;

use super::history::HistoryStore;
use super::multiplexer::DEFAULT_QUEUE_CAPACITY;
use super::pty::{PtySession, SessionError, SessionId, SpawnOptions, DEFAULT_COLS, DEFAULT_ROWS};

/// Length of generated session IDs, in hex characters.
const SESSION_ID_LEN: usize = 8;

/// Trait for session registry operations.
///
/// Implementations must be thread-safe and suitable for concurrent access
/// from request handlers.
pub trait SessionManager: Send + Sync {
    /// Spawns a new session. An empty name defaults to the generated ID.
    fn create(&self, name: &str) -> Result<SessionInfo, SessionError>;

    /// Looks up a live session.
    fn get(&self, session_id: &str) -> Option<Arc<PtySession>>;

    /// Lists all live sessions, oldest first.
    fn list(&self) -> Vec<SessionInfo>;

    /// Changes a session's display name.
    fn rename(&self, session_id: &str, name: &str) -> Result<(), SessionError>;

    /// Removes and closes a session, then deletes its history log.
    fn delete(&self, session_id: &str) -> Result<(), SessionError>;

    /// Closes every live session and empties the registry.
    ///
    /// Returns how many sessions were closed.
    fn close_all(&self) -> usize;

    /// Returns the number of live sessions.
    fn count(&self) -> usize;
}

/// Snapshot of a session's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Unique session identifier.
    pub id: SessionId,
    /// Display name.
    pub name: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Process ID of the shell.
    pub pid: Option<u32>,
    /// Current terminal rows.
    pub rows: u16,
    /// Current terminal columns.
    pub cols: u16,
    /// Number of attached consumers.
    pub consumers: usize,
}

impl SessionInfo {
    fn from_session(session: &PtySession) -> Self {
        let (rows, cols) = session.size();
        Self {
            id: session.id().clone(),
            name: session.name(),
            created_at: session.created_at(),
            pid: session.pid(),
            rows,
            cols,
            consumers: session.consumer_count(),
        }
    }

    /// Converts to the listing entry sent to clients.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary::new(self.id.clone(), self.name.clone(), self.created_at)
    }
}

/// Settings applied to every session the registry creates.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Shell executable to launch.
    pub shell: String,
    /// Value of `TERM` for the shell.
    pub term: String,
    /// Maximum number of live sessions.
    pub max_sessions: usize,
    /// Output queue capacity for each consumer.
    pub queue_capacity: usize,
}

impl ManagerConfig {
    /// Settings with default limits for the given shell.
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            term: "xterm-256color".to_string(),
            max_sessions: 32,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Shared registry state. Exit callbacks hold a weak reference to it.
struct Registry {
    sessions: DashMap<SessionId, Arc<PtySession>>,
    history: HistoryStore,
    config: ManagerConfig,
}

impl Registry {
    /// Generates an ID not currently in use.
    fn fresh_id(&self) -> SessionId {
        loop {
            let mut id = Uuid::new_v4().simple().to_string();
            id.truncate(SESSION_ID_LEN);
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    fn spawn_options(&self, id: SessionId, name: &str) -> SpawnOptions {
        SpawnOptions {
            id,
            name: name.to_string(),
            shell: self.config.shell.clone(),
            term: self.config.term.clone(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            queue_capacity: self.config.queue_capacity,
        }
    }

    /// Exit callback target. An entry that is already gone was deleted
    /// explicitly and has been torn down by that path.
    fn on_process_exit(&self, session_id: &SessionId) {
        match self.sessions.remove(session_id) {
            Some((_, session)) => {
                session.close();
                tracing::info!(session_id = %session_id, "Shell exited, session auto-removed");
            }
            None => {
                tracing::debug!(session_id = %session_id, "Shell exited after session was removed");
            }
        }
    }
}

/// Thread-safe session registry implementation using DashMap.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct SessionManagerImpl {
    inner: Arc<Registry>,
}

impl SessionManagerImpl {
    /// Creates an empty registry storing history logs under `history_dir`.
    pub fn new(config: ManagerConfig, history_dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            inner: Arc::new(Registry {
                sessions: DashMap::new(),
                history: HistoryStore::new(history_dir),
                config,
            }),
        }
    }

    /// Returns the history store.
    pub fn history(&self) -> &HistoryStore {
        &self.inner.history
    }

    fn exit_callback(&self) -> super::pty::ExitCallback {
        let registry: Weak<Registry> = Arc::downgrade(&self.inner);
        Box::new(move |session_id| {
            if let Some(registry) = registry.upgrade() {
                registry.on_process_exit(&session_id);
            }
        })
    }
}

impl SessionManager for SessionManagerImpl {
    fn create(&self, name: &str) -> Result<SessionInfo, SessionError> {
        let max = self.inner.config.max_sessions;
        if self.inner.sessions.len() >= max {
            return Err(SessionError::LimitReached(max));
        }

        let session = loop {
            let id = self.inner.fresh_id();
            let session = PtySession::spawn(
                self.inner.spawn_options(id.clone(), name),
                self.inner.history.clone(),
            )?;

            let inserted = match self.inner.sessions.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&session));
                    true
                }
                Entry::Occupied(_) => false,
            };
            if inserted {
                break session;
            }
            // A concurrent create took the same ID first.
            session.close();
        };

        // Inserted before starting, so an immediate exit finds the entry.
        if let Err(e) = session.start(self.exit_callback()) {
            self.inner.sessions.remove(session.id());
            session.close();
            return Err(e);
        }

        let info = SessionInfo::from_session(&session);
        tracing::info!(
            session_id = %info.id,
            name = %info.name,
            pid = ?info.pid,
            "Created new session"
        );
        Ok(info)
    }

    fn get(&self, session_id: &str) -> Option<Arc<PtySession>> {
        self.inner
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    fn list(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .inner
            .sessions
            .iter()
            .map(|entry| SessionInfo::from_session(entry.value()))
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    fn rename(&self, session_id: &str, name: &str) -> Result<(), SessionError> {
        let session = self
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        session.set_name(name);
        tracing::info!(session_id = %session_id, name = %name, "Renamed session");
        Ok(())
    }

    fn delete(&self, session_id: &str) -> Result<(), SessionError> {
        let (_, session) = self
            .inner
            .sessions
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        // Teardown happens after the map entry is released.
        session.close();
        if let Err(e) = self.inner.history.remove(session_id) {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to remove history log");
        }

        tracing::info!(session_id = %session_id, "Session deleted");
        Ok(())
    }

    fn close_all(&self) -> usize {
        let ids: Vec<SessionId> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        let mut closed = 0;
        for id in ids {
            if let Some((_, session)) = self.inner.sessions.remove(&id) {
                session.close();
                closed += 1;
            }
        }

        tracing::info!(closed, "Closed all sessions");
        closed
    }

    fn count(&self) -> usize {
        self.inner.sessions.len()
    }
}
