//! Capability interfaces between the gateway core and its plugins.
//!
//! Two kinds of plugin exist. Authenticators inspect a request and may
//! mark it authenticated, optionally attaching identity attributes.
//! Consumers are bound to an absolute path prefix and produce a response
//! for requests routed under that prefix. The core holds both behind
//! immutable registries snapshotted at startup and never calls anything
//! else on them.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;

use crate::http::error::HttpError;
use crate::http::request::Request;
use crate::http::response::Response;

/// A boxed future, the object-safe shape plugin methods return.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Error surfaced by a plugin.
///
/// A plugin that wants a specific status answered raises `Http`; anything
/// else is an internal fault the pipeline maps to 500. An authenticator
/// that is merely inapplicable to a request must return `Ok(())`, not an
/// error.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("internal plugin failure: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(error))
    }
}

/// A plugin that may mark a request as authenticated.
///
/// On success the implementation calls [`Request::mark_authenticated`]
/// and may attach further identity attributes. The gate runs every
/// registered authenticator regardless of earlier outcomes.
pub trait Authenticator: Send + Sync {
    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<(), HandlerError>>;
}

/// A plugin bound to a path prefix that produces the response for
/// requests routed below that prefix.
pub trait Consumer: Send + Sync {
    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>>;
}

/// Error raised while building a registry snapshot.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("at least one consumer must be registered")]
    NoConsumers,
    #[error("consumer prefix must be an absolute path: {0:?}")]
    RelativePrefix(String),
}

/// Immutable mapping from absolute path prefix to consumer.
///
/// Construction fails when the mapping is empty or any key is not an
/// absolute path; after that the snapshot is shared read-only across
/// every connection.
#[derive(Clone, Default)]
pub struct ConsumerRegistry {
    inner: HashMap<String, Arc<dyn Consumer>>,
}

impl ConsumerRegistry {
    pub fn builder() -> ConsumerRegistryBuilder {
        ConsumerRegistryBuilder::default()
    }

    pub fn get(&self, prefix: &str) -> Option<&Arc<dyn Consumer>> {
        self.inner.get(prefix)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.inner.keys().map(String::as_str)
    }
}

#[derive(Default)]
pub struct ConsumerRegistryBuilder {
    entries: Vec<(String, Arc<dyn Consumer>)>,
}

impl ConsumerRegistryBuilder {
    pub fn mount(mut self, prefix: impl Into<String>, consumer: Arc<dyn Consumer>) -> Self {
        self.entries.push((prefix.into(), consumer));
        self
    }

    pub fn build(self) -> Result<ConsumerRegistry, RegistryError> {
        if self.entries.is_empty() {
            return Err(RegistryError::NoConsumers);
        }
        let mut inner = HashMap::with_capacity(self.entries.len());
        for (prefix, consumer) in self.entries {
            if !prefix.starts_with('/') {
                return Err(RegistryError::RelativePrefix(prefix));
            }
            inner.insert(prefix, consumer);
        }
        Ok(ConsumerRegistry { inner })
    }
}

/// Ordered mapping from name to authenticator.
///
/// May be empty; the gate treats an empty registry as deny-all. Iteration
/// order is registration order, which defines the order authenticators
/// run in.
#[derive(Clone, Default)]
pub struct AuthenticatorRegistry {
    inner: Vec<(String, Arc<dyn Authenticator>)>,
}

impl AuthenticatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        self.inner.push((name.into(), authenticator));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Authenticator>)> {
        self.inner.iter().map(|(name, auth)| (name.as_str(), auth))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
