//! Unix-socket listener with backpressure.
//!
//! # Responsibilities
//! - Bind the local stream endpoint at a configured absolute path
//! - Remove any stale socket file left by a previous run before binding
//! - Apply the configured socket mode
//! - Enforce max_connections via semaphore
//! - Graceful handling of accept errors

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug)]
pub enum ListenerError {
    /// Socket path is not absolute.
    RelativePath(PathBuf),
    /// Failed to remove a stale socket file.
    RemoveStale(std::io::Error),
    /// Failed to bind to the socket path.
    Bind(std::io::Error),
    /// Failed to apply the configured socket mode.
    Permissions(std::io::Error),
    /// Failed to accept a connection.
    Accept(std::io::Error),
}

impl std::fmt::Display for ListenerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerError::RelativePath(p) => {
                write!(f, "Socket path must be absolute: {}", p.display())
            }
            ListenerError::RemoveStale(e) => write!(f, "Failed to remove stale socket: {}", e),
            ListenerError::Bind(e) => write!(f, "Failed to bind: {}", e),
            ListenerError::Permissions(e) => write!(f, "Failed to set socket mode: {}", e),
            ListenerError::Accept(e) => write!(f, "Failed to accept: {}", e),
        }
    }
}

impl std::error::Error for ListenerError {}

/// A bounded unix-socket listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is
/// reached, new connections wait until a slot becomes available, so a
/// flood of clients cannot exhaust the process.
pub struct GatewayListener {
    /// The underlying unix-socket listener.
    inner: UnixListener,
    /// Path the socket is bound at, kept for cleanup.
    path: PathBuf,
    /// Semaphore limiting concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl GatewayListener {
    /// Bind at the configured socket path with connection limits.
    ///
    /// Construction fails if the path is not absolute. Any pre-existing
    /// file at the path is removed first so a crashed previous instance
    /// does not block the bind.
    pub fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let path = config.socket_path.clone();
        if !path.is_absolute() {
            return Err(ListenerError::RelativePath(path));
        }

        if path.exists() {
            std::fs::remove_file(&path).map_err(ListenerError::RemoveStale)?;
            tracing::debug!(socket = %path.display(), "Removed stale socket file");
        }

        let listener = UnixListener::bind(&path).map_err(ListenerError::Bind)?;

        if let Some(mode) = config.socket_mode {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(mode);
            std::fs::set_permissions(&path, perms).map_err(ListenerError::Permissions)?;
        }

        tracing::info!(
            socket = %path.display(),
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            path,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Waits when the limit has been reached. Returns the stream and a
    /// permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(UnixStream, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| {
                ListenerError::Accept(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "connection limiter closed",
                ))
            })?;

        let (stream, _addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, ConnectionPermit { _permit: permit }))
    }

    /// Path this listener is bound at.
    pub fn local_path(&self) -> &Path {
        &self.path
    }

    /// Current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Remove the socket file. Called once the accept loop has stopped.
    pub fn cleanup(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!(socket = %self.path.display(), error = %e, "Socket cleanup failed");
        }
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the slot is released back to the pool, even if the
/// connection handler panicked.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}
