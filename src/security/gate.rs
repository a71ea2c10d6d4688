//! Fail-closed authentication gate.
//!
//! # Responsibilities
//! - Reject every request when no authenticator is configured
//! - Run every configured authenticator, in registration order,
//!   regardless of earlier outcomes
//! - Accept only when an authenticator has marked the request valid
//!
//! # Design Decisions
//! - Absence of configuration is never "allow all"
//! - No short-circuit on early success: later authenticators may layer
//!   additional identity attributes onto the same request

use crate::http::error::HttpError;
use crate::http::request::Request;
use crate::plugin::{AuthenticatorRegistry, HandlerError};

/// Run the gate against one request.
///
/// An authenticator error is a genuine internal fault and aborts the
/// request; inapplicable authenticators are expected to no-op instead.
pub async fn enforce(
    registry: &AuthenticatorRegistry,
    request: &mut Request,
) -> Result<(), HandlerError> {
    if registry.is_empty() {
        tracing::warn!(request_id = %request.id, "No authenticators configured, rejecting");
        return Err(HttpError::forbidden().into());
    }

    for (name, authenticator) in registry.iter() {
        authenticator.handle(request).await.map_err(|e| {
            tracing::error!(
                request_id = %request.id,
                authenticator = name,
                error = %e,
                "Authenticator failed"
            );
            e
        })?;
    }

    if !request.is_authenticated() {
        tracing::info!(
            request_id = %request.id,
            peer = %request.credentials,
            "Authentication did not succeed"
        );
        return Err(HttpError::forbidden().into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::PeerCredentials;
    use crate::plugin::{Authenticator, BoxFuture};
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn request() -> Request {
        Request {
            id: uuid::Uuid::new_v4(),
            credentials: PeerCredentials {
                pid: 1,
                uid: 1000,
                gid: 1000,
            },
            method: "GET".into(),
            path: "/secrets".into(),
            query: HashMap::new(),
            target: crate::http::request::RequestTarget {
                raw: "/secrets".into(),
                path: "/secrets".into(),
                query: None,
                fragment: None,
            },
            version: "HTTP/1.0".into(),
            headers: HashMap::new(),
            body: None,
            valid_auth: None,
            trail: None,
            attributes: BTreeMap::new(),
        }
    }

    struct Grant;
    impl Authenticator for Grant {
        fn handle<'a>(
            &'a self,
            request: &'a mut Request,
        ) -> BoxFuture<'a, Result<(), HandlerError>> {
            Box::pin(async move {
                request.mark_authenticated();
                Ok(())
            })
        }
    }

    struct Count(Arc<AtomicUsize>);
    impl Authenticator for Count {
        fn handle<'a>(
            &'a self,
            _request: &'a mut Request,
        ) -> BoxFuture<'a, Result<(), HandlerError>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(()) })
        }
    }

    fn code_of(err: HandlerError) -> u16 {
        match err {
            HandlerError::Http(e) => e.code,
            HandlerError::Internal(e) => panic!("unexpected internal error: {}", e),
        }
    }

    #[tokio::test]
    async fn empty_registry_rejects_everything() {
        let registry = AuthenticatorRegistry::new();
        let mut req = request();
        let err = enforce(&registry, &mut req).await.err().unwrap();
        assert_eq!(code_of(err), 403);
    }

    #[tokio::test]
    async fn unconvinced_authenticators_mean_forbidden() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = AuthenticatorRegistry::new()
            .register("count", Arc::new(Count(counter.clone())));
        let mut req = request();
        let err = enforce(&registry, &mut req).await.err().unwrap();
        assert_eq!(code_of(err), 403);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_authenticators_run_even_after_grant() {
        let counter = Arc::new(AtomicUsize::new(0));
        let registry = AuthenticatorRegistry::new()
            .register("grant", Arc::new(Grant))
            .register("count", Arc::new(Count(counter.clone())));
        let mut req = request();
        enforce(&registry, &mut req).await.unwrap();
        assert!(req.is_authenticated());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn authenticator_fault_aborts_request() {
        struct Broken;
        impl Authenticator for Broken {
            fn handle<'a>(
                &'a self,
                _request: &'a mut Request,
            ) -> BoxFuture<'a, Result<(), HandlerError>> {
                Box::pin(async {
                    Err(HandlerError::internal(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "backend unreachable",
                    )))
                })
            }
        }

        let registry = AuthenticatorRegistry::new().register("broken", Arc::new(Broken));
        let mut req = request();
        let err = enforce(&registry, &mut req).await.err().unwrap();
        assert!(matches!(err, HandlerError::Internal(_)));
    }
}
