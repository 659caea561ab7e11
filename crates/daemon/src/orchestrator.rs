//! Daemon orchestrator for wiring together all components.
//!
//! This module provides the `DaemonOrchestrator` that builds the session
//! registry and the auth service from configuration, serves the HTTP surface,
//! runs the token sweep and tears all of it down in order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{self, AppState};
use crate::auth::AuthService;
use crate::config::{Config, DEFAULT_PASSWORD};
use crate::session::{ManagerConfig, SessionManager, SessionManagerImpl};
use crate::transport::HeartbeatConfig;

/// Bound on waiting for in-flight HTTP requests at shutdown.
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(15);

/// Daemon orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorState {
    /// Initial state, not started.
    Stopped,
    /// Starting up, binding the listener.
    Starting,
    /// Running and accepting connections.
    Running,
    /// Shutting down gracefully.
    ShuttingDown,
}

/// Daemon orchestrator that manages all subsystems.
pub struct DaemonOrchestrator {
    config: Config,
    state: Arc<RwLock<OrchestratorState>>,
    sessions: Arc<SessionManagerImpl>,
    auth: Arc<AuthService>,
    shutdown_token: CancellationToken,
    local_addr: Option<SocketAddr>,
    server: Option<JoinHandle<std::io::Result<()>>>,
    sweeper: Option<JoinHandle<()>>,
}

impl DaemonOrchestrator {
    /// Creates a new daemon orchestrator. Nothing is bound until [`start`](Self::start).
    pub fn new(config: Config) -> Result<Self> {
        config.validate().context("Invalid configuration")?;

        let manager_config = ManagerConfig {
            shell: config.session.shell.clone(),
            term: config.session.term.clone(),
            max_sessions: config.session.max_sessions,
            queue_capacity: config.session.output_queue_capacity,
        };
        let sessions = Arc::new(SessionManagerImpl::new(manager_config, config.history_dir()));
        let auth = AuthService::with_cost(
            &config.auth.password,
            config.auth.token_ttl(),
            config.auth.bcrypt_cost,
        )
        .context("Failed to hash password")?;
        let auth = Arc::new(auth);

        Ok(Self {
            config,
            state: Arc::new(RwLock::new(OrchestratorState::Stopped)),
            sessions,
            auth,
            shutdown_token: CancellationToken::new(),
            local_addr: None,
            server: None,
            sweeper: None,
        })
    }

    /// Returns the current state.
    pub async fn state(&self) -> OrchestratorState {
        *self.state.read().await
    }

    /// Starts the daemon: binds the listener, serves the router and starts
    /// the token sweep.
    pub async fn start(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != OrchestratorState::Stopped {
                anyhow::bail!("Orchestrator is already running");
            }
            *state = OrchestratorState::Starting;
        }

        info!("Starting daemon orchestrator...");

        if let Err(e) = self.bind_and_serve().await {
            *self.state.write().await = OrchestratorState::Stopped;
            return Err(e);
        }

        *self.state.write().await = OrchestratorState::Running;
        info!("Daemon orchestrator started successfully");
        Ok(())
    }

    async fn bind_and_serve(&mut self) -> Result<()> {
        let history_dir = self.config.history_dir();
        std::fs::create_dir_all(&history_dir)
            .with_context(|| format!("Failed to create directory: {}", history_dir.display()))?;

        if self.config.auth.password == DEFAULT_PASSWORD {
            warn!("Using the default password; set CONDUCTOR_PASSWORD or [auth] password");
        }

        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let local_addr = listener.local_addr().context("Failed to read bound address")?;

        let state = AppState {
            sessions: Arc::clone(&self.sessions) as Arc<dyn SessionManager>,
            auth: Arc::clone(&self.auth),
            heartbeat: HeartbeatConfig::from(&self.config.transport),
        };
        let app = api::router(state);

        let shutdown = self.shutdown_token.clone();
        self.server = Some(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        }));
        info!(addr = %local_addr, "Server listening");

        self.sweeper = Some(self.auth.tokens().spawn_sweeper(
            self.config.auth.sweep_interval(),
            self.shutdown_token.child_token(),
        ));
        debug!("Started token sweeper");

        self.local_addr = Some(local_addr);
        Ok(())
    }

    /// Stops the daemon orchestrator gracefully.
    ///
    /// Sessions are closed first so that every attached connection ends,
    /// then the server drains and the sweeper stops.
    pub async fn stop(&mut self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == OrchestratorState::Stopped {
                return Ok(());
            }
            if *state == OrchestratorState::ShuttingDown {
                anyhow::bail!("Orchestrator is already shutting down");
            }
            *state = OrchestratorState::ShuttingDown;
        }

        info!("Stopping daemon orchestrator...");

        let sessions = Arc::clone(&self.sessions);
        let closed = tokio::task::spawn_blocking(move || sessions.close_all())
            .await
            .context("Session teardown task failed")?;
        info!(closed, "Closed all sessions");

        self.shutdown_token.cancel();

        if let Some(server) = self.server.take() {
            match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, server).await {
                Ok(Ok(Ok(()))) => debug!("Server stopped"),
                Ok(Ok(Err(e))) => warn!(error = %e, "Server exited with error"),
                Ok(Err(e)) => warn!(error = %e, "Server task failed"),
                Err(_) => warn!(
                    timeout = ?SERVER_SHUTDOWN_TIMEOUT,
                    "Server did not stop in time; abandoning open connections"
                ),
            }
        }

        if let Some(sweeper) = self.sweeper.take() {
            if let Err(e) = sweeper.await {
                warn!(error = %e, "Token sweeper task failed");
            }
        }

        *self.state.write().await = OrchestratorState::Stopped;
        info!("Daemon orchestrator stopped");
        Ok(())
    }

    /// Address the server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the session manager.
    pub fn session_manager(&self) -> &Arc<SessionManagerImpl> {
        &self.sessions
    }

    /// Returns the auth service.
    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// Returns the shutdown token for external tasks to observe shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
