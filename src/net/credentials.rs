//! Kernel-reported peer identity for unix-socket connections.
//!
//! # Responsibilities
//! - Query the peer's process id, user id and group id right after accept
//! - Attach that triple to every request parsed from the connection
//!
//! The triple comes from the kernel via the peer-credential socket option,
//! so unlike anything carried in the request bytes it cannot be forged by
//! the client. It is the only identity signal authenticators may trust
//! without further verification.

use serde::Serialize;
use tokio::net::UnixStream;

/// Identity of the process on the other end of a unix-socket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeerCredentials {
    /// Process id of the peer. Zero when the platform does not report one.
    pub pid: i32,
    /// Effective user id of the peer.
    pub uid: u32,
    /// Effective group id of the peer.
    pub gid: u32,
}

impl PeerCredentials {
    /// Read the peer credentials of a connected stream.
    pub fn from_stream(stream: &UnixStream) -> std::io::Result<Self> {
        let cred = stream.peer_cred()?;
        Ok(Self {
            pid: cred.pid().unwrap_or(0),
            uid: cred.uid(),
            gid: cred.gid(),
        })
    }
}

impl std::fmt::Display for PeerCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pid={} uid={} gid={}", self.pid, self.uid, self.gid)
    }
}
