//! Gateway daemon.
//!
//! Loads configuration, wires the reference plugins, and serves until a
//! shutdown signal arrives. The in-memory secret consumer mounted at
//! `/secrets` exists so a fresh install is exercisable end to end;
//! production deployments mount their own consumers through the library.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::RwLock;

use vaultgate::config::{self, AuthConfig};
use vaultgate::lifecycle::{signals, Shutdown};
use vaultgate::observability::{logging, metrics};
use vaultgate::plugin::{
    AuthenticatorRegistry, BoxFuture, Consumer, ConsumerRegistry, HandlerError,
};
use vaultgate::security::{CredsAuthenticator, HeaderAuthenticator};
use vaultgate::{GatewayListener, GatewayServer, HttpError, Request, Response};

#[derive(Parser)]
#[command(name = "vaultgate", about = "Local secret-store gateway", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the socket path from the configuration.
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = config::resolve_config(cli.config.as_deref())?;
    if let Some(socket) = cli.socket {
        config.listener.socket_path = socket;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vaultgate starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let authenticators = build_authenticators(&config.auth);
    let consumers = ConsumerRegistry::builder()
        .mount("/secrets", Arc::new(MemoryStore::default()))
        .build()?;

    let listener = GatewayListener::bind(&config.listener)?;

    let shutdown = Shutdown::new();
    signals::spawn_handler(&shutdown);

    let server = GatewayServer::new(&config, consumers, authenticators);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn build_authenticators(auth: &AuthConfig) -> AuthenticatorRegistry {
    let mut registry = AuthenticatorRegistry::new();
    if let Some(creds) = &auth.creds {
        registry = registry.register(
            "creds",
            Arc::new(CredsAuthenticator::new(
                creds.allowed_uids.iter().copied(),
                creds.allowed_gids.iter().copied(),
            )),
        );
    }
    if let Some(header) = &auth.header {
        registry = registry.register(
            "header",
            Arc::new(HeaderAuthenticator::new(
                header.name.clone(),
                header.value.clone(),
            )),
        );
    }
    registry
}

/// Reference in-memory secret consumer.
///
/// The key is the trail below the mount point joined with `/`; a request
/// for the mount point itself lists the stored names. Values live only as
/// long as the process.
#[derive(Default)]
struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl Consumer for MemoryStore {
    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>> {
        Box::pin(async move {
            let key = request
                .trail
                .as_ref()
                .map(|trail| trail.join("/"))
                .unwrap_or_default();

            match (request.method.as_str(), key.is_empty()) {
                ("GET", true) => {
                    let entries = self.entries.read().await;
                    let mut names: Vec<&String> = entries.keys().collect();
                    names.sort();
                    Ok(Response::json(&serde_json::json!({ "keys": names })))
                }
                ("GET", false) => {
                    let entries = self.entries.read().await;
                    match entries.get(&key) {
                        Some(value) => Ok(Response::json(
                            &serde_json::json!({ "name": key, "value": value }),
                        )),
                        None => Err(HttpError::not_found().into()),
                    }
                }
                ("PUT", false) => {
                    let body = request
                        .body
                        .take()
                        .ok_or_else(|| HttpError::bad_request("missing request body"))?;
                    let value = String::from_utf8(body)
                        .map_err(|_| HttpError::bad_request("secret value must be UTF-8"))?;
                    self.entries.write().await.insert(key.clone(), value);
                    let mut response = Response::json(&serde_json::json!({ "name": key }));
                    response.code = Some(201);
                    Ok(response)
                }
                ("DELETE", false) => {
                    if self.entries.write().await.remove(&key).is_some() {
                        Ok(Response::with_code(204))
                    } else {
                        Err(HttpError::not_found().into())
                    }
                }
                _ => Err(HttpError::new(405, "unsupported method").into()),
            }
        })
    }
}
