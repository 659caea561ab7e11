//! PTY session management.
//!
//! A session owns one shell process attached to a pseudo-terminal, an
//! append-only history log, and the set of consumers currently viewing it.
//!
//! Two background threads run per session once [`PtySession::start`] is called:
//!
//! - the **output pump** reads the PTY, appends each chunk to the history log
//!   and fans it out to every consumer without blocking;
//! - the **process watcher** waits for the shell to exit, closes the PTY and
//!   invokes the exit callback exactly once.

use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use protocol::SessionSummary;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use super::history::HistoryStore;
use super::multiplexer::{Consumer, ConsumerId, ConsumerSet, ConsumerStats, DEFAULT_QUEUE_CAPACITY};

/// Unique identifier for a session.
pub type SessionId = String;

/// Callback invoked once with the session ID when the shell process exits.
pub type ExitCallback = Box<dyn FnOnce(SessionId) + Send + 'static>;

/// Errors that can occur during session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The session was not found.
    #[error("session not found: {0}")]
    NotFound(SessionId),

    /// The session has already been closed.
    #[error("session already terminated: {0}")]
    AlreadyTerminated(SessionId),

    /// Failed to open the PTY or spawn the shell.
    #[error("failed to spawn PTY: {0}")]
    SpawnFailed(String),

    /// Failed to open the history log. Any spawned process was killed.
    #[error("failed to open history log {}: {source}", path.display())]
    HistoryOpenFailed {
        /// The history file that could not be opened.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to write input to, or resize, the PTY.
    #[error("failed to write to PTY: {0}")]
    WriteFailed(String),

    /// The registry already holds the maximum number of sessions.
    #[error("session limit reached ({0})")]
    LimitReached(usize),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Buffer size for reading from PTY.
const READ_BUFFER_SIZE: usize = 4096;

/// Initial terminal geometry.
pub const DEFAULT_ROWS: u16 = 24;
pub const DEFAULT_COLS: u16 = 80;

/// Parameters for spawning a session.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    /// Session identifier; also names the history file.
    pub id: SessionId,
    /// Display name. Empty means "use the ID".
    pub name: String,
    /// Shell executable to launch.
    pub shell: String,
    /// Value of `TERM` for the shell.
    pub term: String,
    /// Initial rows.
    pub rows: u16,
    /// Initial columns.
    pub cols: u16,
    /// Output queue capacity for each consumer.
    pub queue_capacity: usize,
}

impl SpawnOptions {
    /// Options with default geometry, `TERM`, and queue capacity.
    pub fn new(id: impl Into<SessionId>, shell: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            shell: shell.into(),
            term: "xterm-256color".to_string(),
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// PTY handles that are only needed once the background threads start.
struct PendingIo {
    reader: Box<dyn Read + Send>,
    child: Box<dyn Child + Send + Sync>,
}

/// History log and consumers, guarded together.
///
/// The pump appends and broadcasts under this lock, and attach reads the
/// history and registers under it, so a new consumer sees every byte exactly
/// once: either in its replay or in its queue.
struct Fanout {
    history: Option<File>,
    consumers: ConsumerSet,
    closed: bool,
}

/// A PTY session with a shell process.
pub struct PtySession {
    id: SessionId,
    name: Mutex<String>,
    created_at: DateTime<Utc>,
    pid: Option<u32>,
    size: Mutex<(u16, u16)>,
    queue_capacity: usize,
    history_store: HistoryStore,

    master: Mutex<Option<Box<dyn MasterPty + Send>>>,
    writer: Mutex<Option<Box<dyn Write + Send>>>,
    killer: Mutex<Box<dyn ChildKiller + Send + Sync>>,
    pending: Mutex<Option<PendingIo>>,
    fanout: Mutex<Fanout>,
    on_exit: Mutex<Option<ExitCallback>>,

    closed: AtomicBool,
    pty_closed: AtomicBool,
    exited: AtomicBool,
    output_ended: CancellationToken,
    process_exited: CancellationToken,
}

/// Locks a mutex, recovering the data if a previous holder panicked.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Kills and reaps a child whose session could not be completed.
fn abort_child(child: &mut Box<dyn Child + Send + Sync>) {
    let _ = child.kill();
    let _ = child.wait();
}

impl PtySession {
    /// Spawns the shell on a new PTY and opens the history log.
    ///
    /// The output pump and process watcher are not running until
    /// [`start`](Self::start) is called; output produced before then stays in
    /// the kernel's PTY buffer. On any failure the process is killed and the
    /// PTY closed before returning.
    pub fn spawn(options: SpawnOptions, history: HistoryStore) -> Result<Arc<Self>, SessionError> {
        let SpawnOptions {
            id,
            name,
            shell,
            term,
            rows,
            cols,
            queue_capacity,
        } = options;

        let pair = native_pty_system()
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::SpawnFailed(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&shell);
        cmd.env("TERM", &term);

        let mut child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SessionError::SpawnFailed(format!("{}: {}", shell, e)))?;

        // Only the child may hold the slave side, otherwise reads never see EOF.
        drop(pair.slave);

        let io = pair
            .master
            .try_clone_reader()
            .and_then(|reader| Ok((reader, pair.master.take_writer()?)));
        let (reader, writer) = match io {
            Ok(io) => io,
            Err(e) => {
                abort_child(&mut child);
                return Err(SessionError::SpawnFailed(e.to_string()));
            }
        };

        let history_file = match history.open(&id) {
            Ok(file) => file,
            Err(source) => {
                abort_child(&mut child);
                return Err(SessionError::HistoryOpenFailed {
                    path: history.path_for(&id),
                    source,
                });
            }
        };

        let pid = child.process_id();
        let killer = child.clone_killer();
        let name = if name.is_empty() { id.clone() } else { name };

        tracing::info!(
            session_id = %id,
            pid = ?pid,
            shell = %shell,
            "Spawned PTY session"
        );

        Ok(Arc::new(Self {
            id,
            name: Mutex::new(name),
            created_at: Utc::now(),
            pid,
            size: Mutex::new((rows, cols)),
            queue_capacity,
            history_store: history,
            master: Mutex::new(Some(pair.master)),
            writer: Mutex::new(Some(writer)),
            killer: Mutex::new(killer),
            pending: Mutex::new(Some(PendingIo { reader, child })),
            fanout: Mutex::new(Fanout {
                history: Some(history_file),
                consumers: ConsumerSet::new(),
                closed: false,
            }),
            on_exit: Mutex::new(None),
            closed: AtomicBool::new(false),
            pty_closed: AtomicBool::new(false),
            exited: AtomicBool::new(false),
            output_ended: CancellationToken::new(),
            process_exited: CancellationToken::new(),
        }))
    }

    /// Registers the exit callback and starts the output pump and process
    /// watcher. Calling it again is a no-op.
    pub fn start(self: &Arc<Self>, on_exit: ExitCallback) -> Result<(), SessionError> {
        let Some(io) = lock(&self.pending).take() else {
            tracing::warn!(session_id = %self.id, "Session already started");
            return Ok(());
        };
        *lock(&self.on_exit) = Some(on_exit);

        let pump = Arc::clone(self);
        thread::Builder::new()
            .name(format!("pty-pump-{}", self.id))
            .spawn(move || pump.run_output_pump(io.reader))
            .map_err(|e| SessionError::SpawnFailed(format!("output pump: {}", e)))?;

        let watcher = Arc::clone(self);
        let child = io.child;
        thread::Builder::new()
            .name(format!("pty-wait-{}", self.id))
            .spawn(move || watcher.run_process_watcher(child))
            .map_err(|e| SessionError::SpawnFailed(format!("process watcher: {}", e)))?;
        Ok(())
    }

    /// Reads process output until the PTY reports EOF or an error.
    fn run_output_pump(self: Arc<Self>, mut reader: Box<dyn Read + Send>) {
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];
        loop {
            match reader.read(&mut buffer) {
                Ok(0) => {
                    tracing::debug!(session_id = %self.id, "PTY EOF");
                    break;
                }
                Ok(n) => self.record_and_broadcast(Bytes::copy_from_slice(&buffer[..n])),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // EIO is the normal end of a Linux PTY once the shell is gone.
                    tracing::debug!(session_id = %self.id, error = %e, "PTY read ended");
                    break;
                }
            }
        }
        self.output_ended.cancel();
    }

    /// Appends a chunk to the history log, then offers it to every consumer.
    fn record_and_broadcast(&self, chunk: Bytes) {
        let mut fanout = lock(&self.fanout);
        if let Some(file) = fanout.history.as_mut() {
            if let Err(e) = file.write_all(&chunk) {
                tracing::error!(session_id = %self.id, error = %e, "Failed to append history");
            }
        }
        fanout.consumers.broadcast(&chunk);
    }

    /// Blocks until the shell exits, then closes the PTY and fires the callback.
    fn run_process_watcher(self: Arc<Self>, mut child: Box<dyn Child + Send + Sync>) {
        match child.wait() {
            Ok(status) => tracing::info!(
                session_id = %self.id,
                exit_code = status.exit_code(),
                "Shell process exited"
            ),
            Err(e) => tracing::warn!(session_id = %self.id, error = %e, "Failed to wait for shell"),
        }
        self.exited.store(true, Ordering::SeqCst);
        self.close_pty();
        self.process_exited.cancel();

        let callback = lock(&self.on_exit).take();
        if let Some(callback) = callback {
            callback(self.id.clone());
        }
    }

    /// Returns the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> String {
        lock(&self.name).clone()
    }

    /// Sets the display name.
    pub fn set_name(&self, name: impl Into<String>) {
        *lock(&self.name) = name.into();
    }

    /// Returns the creation time.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the process ID of the shell, if available.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Returns the current terminal size as `(rows, cols)`.
    pub fn size(&self) -> (u16, u16) {
        *lock(&self.size)
    }

    /// Returns a listing entry for this session.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary::new(self.id.clone(), self.name(), self.created_at)
    }

    /// Returns whether [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns whether the shell process has exited.
    pub fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Waits until the shell process has exited.
    pub async fn wait_exit(&self) {
        self.process_exited.cancelled().await;
    }

    /// Waits until the output pump has stopped.
    pub async fn wait_output_ended(&self) {
        self.output_ended.cancelled().await;
    }

    /// Registers a new consumer.
    ///
    /// On a closed session the consumer is returned already terminated.
    pub fn attach_consumer(&self) -> Consumer {
        let mut fanout = lock(&self.fanout);
        let consumer = fanout.consumers.add(self.queue_capacity);
        if fanout.closed {
            fanout.consumers.remove(consumer.id());
        }
        consumer
    }

    /// Registers a new consumer and returns the history recorded so far.
    ///
    /// Every byte the pump produced before the call is in the returned history
    /// and every byte after it is delivered to the consumer's queue.
    pub async fn attach_with_history(
        self: &Arc<Self>,
    ) -> Result<(Consumer, Vec<u8>), SessionError> {
        let session = Arc::clone(self);
        tokio::task::spawn_blocking(move || session.attach_with_history_blocking())
            .await
            .map_err(|e| SessionError::Io(io::Error::other(e)))?
    }

    fn attach_with_history_blocking(&self) -> Result<(Consumer, Vec<u8>), SessionError> {
        let mut fanout = lock(&self.fanout);
        if fanout.closed {
            return Err(SessionError::AlreadyTerminated(self.id.clone()));
        }
        let history = self.history_store.read(&self.id)?;
        let consumer = fanout.consumers.add(self.queue_capacity);
        Ok((consumer, history))
    }

    /// Removes a consumer and fires its termination signal. Idempotent.
    pub fn detach_consumer(&self, id: ConsumerId) -> Option<ConsumerStats> {
        let stats = lock(&self.fanout).consumers.remove(id);
        if let Some(ref stats) = stats {
            tracing::debug!(
                session_id = %self.id,
                consumer_id = id,
                sent = stats.messages_sent,
                dropped = stats.messages_dropped,
                "Consumer detached"
            );
        }
        stats
    }

    /// Returns the number of attached consumers.
    pub fn consumer_count(&self) -> usize {
        lock(&self.fanout).consumers.len()
    }

    /// Returns delivery statistics for one consumer.
    pub fn consumer_stats(&self, id: ConsumerId) -> Option<ConsumerStats> {
        lock(&self.fanout).consumers.stats(id)
    }

    /// Writes data to the PTY (the keyboard side of the terminal).
    ///
    /// Blocks while the terminal's input buffer is full.
    pub fn write_input(&self, data: &[u8]) -> Result<(), SessionError> {
        let mut guard = lock(&self.writer);
        if self.pty_closed.load(Ordering::SeqCst) {
            guard.take();
        }
        let writer = guard.as_mut().ok_or_else(|| self.pty_closed_error())?;
        let result = writer.write_all(data).and_then(|()| writer.flush());

        // close_pty skips the writer while a write holds it.
        if result.is_err() || self.pty_closed.load(Ordering::SeqCst) {
            guard.take();
        }
        result.map_err(|e| SessionError::WriteFailed(e.to_string()))
    }

    /// Resizes the PTY. Callers reject zero dimensions before calling.
    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), SessionError> {
        let master = lock(&self.master);
        let master = master.as_ref().ok_or_else(|| self.pty_closed_error())?;
        master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SessionError::WriteFailed(format!("resize: {}", e)))?;

        *lock(&self.size) = (rows, cols);
        tracing::debug!(session_id = %self.id, rows, cols, "Resized PTY");
        Ok(())
    }

    fn pty_closed_error(&self) -> SessionError {
        SessionError::WriteFailed(format!("session {} PTY is closed", self.id))
    }

    /// Drops our ends of the PTY. Safe to call repeatedly.
    ///
    /// Never waits for the writer lock. A write blocked on a full input buffer
    /// holds it until the shell dies, and then drops the writer itself.
    fn close_pty(&self) {
        self.pty_closed.store(true, Ordering::SeqCst);
        let writer = match self.writer.try_lock() {
            Ok(mut guard) => guard.take(),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().take(),
            Err(TryLockError::WouldBlock) => None,
        };
        let master = lock(&self.master).take();
        drop(writer);
        drop(master);
    }

    /// Tears the session down: kills the shell if it is still running, closes
    /// the PTY and the history log, and terminates every consumer.
    ///
    /// A second call is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Kill first: the hangup is what unblocks a writer stuck on a full PTY.
        if let Some(mut io) = lock(&self.pending).take() {
            // Never started: nobody else will reap the child.
            abort_child(&mut io.child);
        } else if !self.has_exited() {
            if let Err(e) = lock(&self.killer).kill() {
                tracing::debug!(
                    session_id = %self.id,
                    error = %e,
                    "Kill failed, shell already gone"
                );
            }
        }

        self.close_pty();

        let detached = {
            let mut fanout = lock(&self.fanout);
            fanout.closed = true;
            fanout.history.take();
            fanout.consumers.close_all()
        };

        tracing::info!(session_id = %self.id, consumers = detached, "Session closed");
    }
}

impl std::fmt::Debug for PtySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PtySession")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("pid", &self.pid)
            .field("closed", &self.is_closed())
            .finish()
    }
}
