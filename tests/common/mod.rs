//! Shared harness for the integration suite.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use vaultgate::config::GatewayConfig;
use vaultgate::lifecycle::Shutdown;
use vaultgate::plugin::{
    Authenticator, AuthenticatorRegistry, BoxFuture, Consumer, ConsumerRegistry, HandlerError,
};
use vaultgate::{GatewayListener, GatewayServer, HttpError, Request, Response};
use vaultgate_sdk::GatewayClient;

/// A gateway bound to a socket in its own temp directory, torn down when
/// the handle drops.
pub struct TestGateway {
    pub socket_path: PathBuf,
    shutdown: Shutdown,
    _dir: TempDir,
}

impl TestGateway {
    pub async fn start(
        consumers: ConsumerRegistry,
        authenticators: AuthenticatorRegistry,
    ) -> Self {
        Self::start_with(consumers, authenticators, |_| {}).await
    }

    /// Start with a configuration tweak applied before binding.
    pub async fn start_with(
        consumers: ConsumerRegistry,
        authenticators: AuthenticatorRegistry,
        tweak: impl FnOnce(&mut GatewayConfig),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("gateway.sock");

        let mut config = GatewayConfig::default();
        config.listener.socket_path = socket_path.clone();
        config.listener.io_timeout_secs = 5;
        tweak(&mut config);

        // Binding is synchronous, so the socket exists once this returns.
        let listener = GatewayListener::bind(&config.listener).unwrap();
        let server = GatewayServer::new(&config, consumers, authenticators);

        let shutdown = Shutdown::new();
        let rx = shutdown.subscribe();
        tokio::spawn(async move {
            let _ = server.run(listener, rx).await;
        });

        Self {
            socket_path,
            shutdown,
            _dir: dir,
        }
    }

    pub fn client(&self) -> GatewayClient {
        GatewayClient::new(&self.socket_path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Authenticator that grants every request.
pub struct AllowAll;

impl Authenticator for AllowAll {
    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            request.mark_authenticated();
            Ok(())
        })
    }
}

/// Authenticator that never grants but counts its invocations and stamps
/// an attribute, to observe that the gate ran it.
pub struct Bystander {
    pub invocations: Arc<AtomicUsize>,
}

impl Bystander {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let invocations = Arc::new(AtomicUsize::new(0));
        (
            Self {
                invocations: invocations.clone(),
            },
            invocations,
        )
    }
}

impl Authenticator for Bystander {
    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            request.set_attribute("bystander_ran", serde_json::json!(true));
            Ok(())
        })
    }
}

/// Consumer that reflects the request back as JSON.
pub struct EchoConsumer;

impl Consumer for EchoConsumer {
    fn handle<'a>(
        &'a self,
        request: &'a mut Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>> {
        Box::pin(async move {
            let attributes: serde_json::Map<String, serde_json::Value> = request
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok(Response::json(&serde_json::json!({
                "method": request.method,
                "path": request.path,
                "trail": request.trail,
                "query": request.query,
                "pid": request.credentials.pid,
                "uid": request.credentials.uid,
                "attributes": attributes,
                "body_len": request.body.as_ref().map(|b| b.len()),
            })))
        })
    }
}

/// Consumer that fails with an internal error.
pub struct FailingConsumer;

impl Consumer for FailingConsumer {
    fn handle<'a>(
        &'a self,
        _request: &'a mut Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>> {
        Box::pin(async {
            Err(HandlerError::internal(std::io::Error::new(
                std::io::ErrorKind::Other,
                "backing store unreachable",
            )))
        })
    }
}

/// Consumer that panics.
pub struct PanickingConsumer;

impl Consumer for PanickingConsumer {
    fn handle<'a>(
        &'a self,
        _request: &'a mut Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>> {
        Box::pin(async { panic!("consumer blew up") })
    }
}

/// Consumer that answers with a fixed status code.
pub struct StatusConsumer(pub u16);

impl Consumer for StatusConsumer {
    fn handle<'a>(
        &'a self,
        _request: &'a mut Request,
    ) -> BoxFuture<'a, Result<Response, HandlerError>> {
        let code = self.0;
        Box::pin(async move { Err(HttpError::from_code(code).into()) })
    }
}

/// One-entry consumer registry.
pub fn single_consumer(prefix: &str, consumer: Arc<dyn Consumer>) -> ConsumerRegistry {
    ConsumerRegistry::builder()
        .mount(prefix, consumer)
        .build()
        .unwrap()
}

/// Registry with only the allow-all authenticator.
pub fn allow_all() -> AuthenticatorRegistry {
    AuthenticatorRegistry::new().register("allow", Arc::new(AllowAll))
}
