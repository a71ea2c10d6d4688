//! Local transport layer.
//!
//! # Data Flow
//! ```text
//! bind (listener.rs) → accept → peer identity (credentials.rs)
//!                             → per-connection unit (tracked in connection.rs)
//! ```

pub mod connection;
pub mod credentials;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use credentials::PeerCredentials;
pub use listener::{ConnectionPermit, GatewayListener, ListenerError};
