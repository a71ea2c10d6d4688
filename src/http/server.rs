//! Connection handling and the request pipeline.
//!
//! # Responsibilities
//! - Accept connections and run each one in its own spawned unit
//! - Parse, attach peer identity, authenticate, route, dispatch
//! - Convert structured errors into status-coded responses exactly once,
//!   at the connection boundary
//! - Contain faults: a panicking or failing plugin answers 500 and never
//!   reaches the acceptor or a sibling connection
//! - Close quietly on transport timeout; the peer is assumed gone
//!
//! The only state crossing the unit boundary is one immutable snapshot of
//! the registries taken at startup.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use tokio::sync::broadcast;
use tokio::time::timeout;

use crate::config::GatewayConfig;
use crate::http::error::HttpError;
use crate::http::request::{read_request, ParseError, Request};
use crate::http::response::{CloseHint, Response, ResponseWriter};
use crate::net::{ConnectionGuard, ConnectionTracker, GatewayListener, ListenerError, PeerCredentials};
use crate::observability::metrics;
use crate::plugin::{AuthenticatorRegistry, ConsumerRegistry, HandlerError};
use crate::routing;
use crate::security::gate;

/// Immutable snapshot shared read-only with every connection unit.
pub struct GatewayState {
    pub consumers: ConsumerRegistry,
    pub authenticators: AuthenticatorRegistry,
    pub server_string: String,
    pub io_timeout: Duration,
}

/// The gateway server: registries plus the accept loop.
pub struct GatewayServer {
    state: Arc<GatewayState>,
    tracker: ConnectionTracker,
}

impl GatewayServer {
    pub fn new(
        config: &GatewayConfig,
        consumers: ConsumerRegistry,
        authenticators: AuthenticatorRegistry,
    ) -> Self {
        Self {
            state: Arc::new(GatewayState {
                consumers,
                authenticators,
                server_string: config.listener.server_string.clone(),
                io_timeout: Duration::from_secs(config.listener.io_timeout_secs),
            }),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Run the accept loop until the shutdown signal fires.
    ///
    /// Each accepted connection is handed to a spawned unit immediately;
    /// the loop never waits for one to finish.
    pub async fn run(
        self,
        listener: GatewayListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if self.state.authenticators.is_empty() {
            tracing::warn!("No authenticators configured; every request will be rejected");
        }
        tracing::info!(
            socket = %listener.local_path().display(),
            consumers = self.state.consumers.len(),
            authenticators = self.state.authenticators.len(),
            "Gateway serving"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, permit) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::error!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    let state = Arc::clone(&self.state);
                    let guard = self.tracker.track();
                    tokio::spawn(async move {
                        metrics::connection_opened();
                        handle_connection(state, stream, guard).await;
                        metrics::connection_closed();
                        drop(permit);
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received; no longer accepting");
                    break;
                }
            }
        }

        let remaining = self.tracker.drain(Duration::from_secs(5)).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Connections still open after drain deadline");
        }
        listener.cleanup();
        Ok(())
    }
}

/// Serve one connection start to finish.
///
/// The framing is HTTP/1.0: usually a single request, more when the peer
/// negotiated keep-alive. The unit exits when the connection closes and
/// never serves another one.
async fn handle_connection(state: Arc<GatewayState>, stream: UnixStream, guard: ConnectionGuard) {
    let connection_id = guard.id();
    let credentials = match PeerCredentials::from_stream(&stream) {
        Ok(creds) => creds,
        Err(e) => {
            tracing::error!(connection_id = %connection_id, error = %e, "Peer credentials unavailable");
            return;
        }
    };
    tracing::debug!(connection_id = %connection_id, peer = %credentials, "Connection open");

    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = ResponseWriter::new(write_half, state.server_string.clone());

    loop {
        let request = match timeout(state.io_timeout, read_request(&mut reader, credentials)).await
        {
            Err(_) => {
                tracing::warn!(connection_id = %connection_id, "Transport read timed out; peer assumed gone");
                return;
            }
            Ok(Err(ParseError::ConnectionClosed)) => return,
            Ok(Err(ParseError::Io(e))) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "Transport read failed");
                return;
            }
            Ok(Err(ParseError::Protocol(e))) => {
                respond_error(&mut writer, state.io_timeout, &e, connection_id).await;
                return;
            }
            Ok(Ok(request)) => request,
        };

        let keep_alive = request.keep_alive();
        let request_id = request.id;
        let method = request.method.clone();
        let path = request.path.clone();
        let start = Instant::now();

        let outcome = dispatch(&state, request).await;
        let status = match &outcome {
            Ok(response) => response.code.unwrap_or(200),
            Err(e) => e.code,
        };
        metrics::record_request(&method, status, start);
        tracing::info!(
            connection_id = %connection_id,
            request_id = %request_id,
            method = %method,
            path = %path,
            status = status,
            peer = %credentials,
            "Request handled"
        );

        match outcome {
            Err(e) => {
                respond_error(&mut writer, state.io_timeout, &e, connection_id).await;
                return;
            }
            Ok(response) => {
                match timeout(state.io_timeout, writer.write_response(response)).await {
                    Err(_) => {
                        tracing::warn!(connection_id = %connection_id, "Transport write timed out; peer assumed gone");
                        return;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "Transport write failed");
                        return;
                    }
                    Ok(Ok(CloseHint::Close)) => return,
                    Ok(Ok(CloseHint::KeepOpen)) => {
                        if !keep_alive {
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Run the pipeline for one request, containing every failure mode.
///
/// Structured errors keep their status; internal faults and panics are
/// logged and mapped to 500. Nothing escapes to the caller except a
/// writable outcome.
async fn dispatch(state: &GatewayState, mut request: Request) -> Result<Response, HttpError> {
    let request_id = request.id;
    let result = std::panic::AssertUnwindSafe(pipeline(state, &mut request))
        .catch_unwind()
        .await;
    match result {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(HandlerError::Http(e))) => Err(e),
        Ok(Err(HandlerError::Internal(e))) => {
            tracing::error!(request_id = %request_id, error = %e, "Handler failed");
            Err(HttpError::internal())
        }
        Err(panic) => {
            tracing::error!(
                request_id = %request_id,
                panic = %panic_message(&panic),
                "Handler panicked"
            );
            Err(HttpError::internal())
        }
    }
}

/// Authentication gate, then consumer routing, then the consumer itself.
///
/// The gate runs first even for malformed paths, so a request that would
/// fail both checks is answered 403, not 400.
async fn pipeline(state: &GatewayState, request: &mut Request) -> Result<Response, HandlerError> {
    gate::enforce(&state.authenticators, request).await?;

    let matched = routing::resolve(&state.consumers, &request.path)?;
    if !matched.trail.is_empty() {
        request.trail = Some(matched.trail);
    }
    tracing::debug!(
        request_id = %request.id,
        prefix = %matched.prefix,
        "Consumer matched"
    );
    matched.consumer.handle(request).await
}

async fn respond_error<W>(
    writer: &mut ResponseWriter<W>,
    io_timeout: Duration,
    error: &HttpError,
    connection_id: crate::net::ConnectionId,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    match timeout(io_timeout, writer.write_error(error)).await {
        Err(_) => {
            tracing::warn!(connection_id = %connection_id, "Transport write timed out; peer assumed gone");
        }
        Ok(Err(e)) => {
            tracing::debug!(connection_id = %connection_id, error = %e, "Failed to write error response");
        }
        Ok(Ok(())) => {}
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
