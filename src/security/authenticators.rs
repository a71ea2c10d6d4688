//! Reference authenticators.
//!
//! Both are deliberately small: the peer-credential authenticator trusts
//! only the kernel-reported identity of the connected process, and the
//! header authenticator trusts a header that a fronting proxy is expected
//! to have verified. Each one no-ops when it does not apply; the gate
//! handles the deny.

use std::collections::HashSet;

use crate::http::request::Request;
use crate::plugin::{Authenticator, BoxFuture, HandlerError};

/// Grants access when the peer's kernel-reported uid or gid is in a
/// configured allow-list.
pub struct CredsAuthenticator {
    allowed_uids: HashSet<u32>,
    allowed_gids: HashSet<u32>,
}

impl CredsAuthenticator {
    pub fn new(
        allowed_uids: impl IntoIterator<Item = u32>,
        allowed_gids: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            allowed_uids: allowed_uids.into_iter().collect(),
            allowed_gids: allowed_gids.into_iter().collect(),
        }
    }
}

impl Authenticator for CredsAuthenticator {
    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let creds = request.credentials;
            if self.allowed_uids.contains(&creds.uid) || self.allowed_gids.contains(&creds.gid) {
                tracing::debug!(request_id = %request.id, peer = %creds, "Peer credentials accepted");
                request.mark_authenticated();
                request.set_attribute("auth_uid", serde_json::json!(creds.uid));
                request.set_attribute("auth_gid", serde_json::json!(creds.gid));
            }
            Ok(())
        })
    }
}

/// Grants access when a configured header is present, optionally
/// requiring an exact value. The header value is recorded as the
/// `remote_user` identity attribute for consumers.
pub struct HeaderAuthenticator {
    name: String,
    required_value: Option<String>,
}

impl HeaderAuthenticator {
    pub fn new(name: impl Into<String>, required_value: Option<String>) -> Self {
        Self {
            name: name.into(),
            required_value,
        }
    }
}

impl Authenticator for HeaderAuthenticator {
    fn handle<'a>(&'a self, request: &'a mut Request) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move {
            let value = match request.header(&self.name) {
                Some(v) => v.to_string(),
                None => return Ok(()),
            };
            if let Some(required) = &self.required_value {
                if &value != required {
                    return Ok(());
                }
            }
            tracing::debug!(request_id = %request.id, header = %self.name, "Header credential accepted");
            request.mark_authenticated();
            request.set_attribute("remote_user", serde_json::json!(value));
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::PeerCredentials;
    use std::collections::{BTreeMap, HashMap};

    fn request_with(uid: u32, headers: &[(&str, &str)]) -> Request {
        Request {
            id: uuid::Uuid::new_v4(),
            credentials: PeerCredentials {
                pid: 7,
                uid,
                gid: uid,
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
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
                .collect(),
            body: None,
            valid_auth: None,
            trail: None,
            attributes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn creds_match_grants_and_attaches_attributes() {
        let auth = CredsAuthenticator::new([1000], []);
        let mut req = request_with(1000, &[]);
        auth.handle(&mut req).await.unwrap();
        assert!(req.is_authenticated());
        assert_eq!(req.attribute("auth_uid"), Some(&serde_json::json!(1000)));
    }

    #[tokio::test]
    async fn creds_mismatch_is_a_noop() {
        let auth = CredsAuthenticator::new([0], []);
        let mut req = request_with(1000, &[]);
        auth.handle(&mut req).await.unwrap();
        assert!(req.valid_auth.is_none());
        assert!(req.attributes.is_empty());
    }

    #[tokio::test]
    async fn gid_match_is_sufficient() {
        let auth = CredsAuthenticator::new([], [1000]);
        let mut req = request_with(1000, &[]);
        auth.handle(&mut req).await.unwrap();
        assert!(req.is_authenticated());
    }

    #[tokio::test]
    async fn header_presence_grants_and_records_remote_user() {
        let auth = HeaderAuthenticator::new("X-Gateway-User", None);
        let mut req = request_with(1, &[("X-Gateway-User", "alice")]);
        auth.handle(&mut req).await.unwrap();
        assert!(req.is_authenticated());
        assert_eq!(
            req.attribute("remote_user"),
            Some(&serde_json::json!("alice"))
        );
    }

    #[tokio::test]
    async fn header_value_mismatch_is_a_noop() {
        let auth = HeaderAuthenticator::new("X-Gateway-User", Some("expected".into()));
        let mut req = request_with(1, &[("X-Gateway-User", "other")]);
        auth.handle(&mut req).await.unwrap();
        assert!(req.valid_auth.is_none());
    }

    #[tokio::test]
    async fn missing_header_is_a_noop() {
        let auth = HeaderAuthenticator::new("X-Gateway-User", None);
        let mut req = request_with(1, &[]);
        auth.handle(&mut req).await.unwrap();
        assert!(req.valid_auth.is_none());
    }
}
