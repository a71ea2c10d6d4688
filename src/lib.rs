//! Local secret-store gateway.
//!
//! A server listening on a unix socket that authenticates every incoming
//! request against pluggable authenticators and routes it to the consumer
//! registered at the longest matching path prefix, before that consumer
//! touches any secret material.
//!
//! ```text
//!  client ──unix socket──▶ net (listener, peer credentials)
//!                           │ one spawned unit per connection
//!                           ▼
//!                          http (bounded parse → gate → route → consumer
//!                                → serialize)
//!                           │                │
//!                      security (gate,   routing (innermost-prefix
//!                      authenticators)    resolution with trail)
//! ```
//!
//! Consumers and authenticators are capabilities behind the `plugin`
//! traits; the registries are an immutable snapshot taken at startup and
//! shared read-only with every connection.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod plugin;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::{GatewayServer, HttpError, Request, Response};
pub use lifecycle::Shutdown;
pub use net::{GatewayListener, PeerCredentials};
pub use plugin::{
    Authenticator, AuthenticatorRegistry, Consumer, ConsumerRegistry, HandlerError,
};
