//! HTTP-over-local-transport framing.
//!
//! # Data Flow
//! ```text
//! bytes → request.rs (bounded parse) → server.rs (gate → route → consumer)
//!       → response.rs (serialize + flush)
//! ```
//!
//! Errors carry their status code (error.rs) and are converted into
//! responses exactly once, at the connection boundary in server.rs.

pub mod error;
pub mod request;
pub mod response;
pub mod server;

pub use error::HttpError;
pub use request::{Request, RequestTarget};
pub use response::{Response, ResponseBody};
pub use server::{GatewayServer, GatewayState};
