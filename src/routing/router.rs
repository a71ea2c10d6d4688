//! Longest-prefix consumer resolution.
//!
//! # Responsibilities
//! - Resolve the innermost registered prefix covering a request path
//! - Collect the trailing segments below the matched prefix, in order
//! - Reject non-absolute paths and paths no prefix covers
//!
//! # Design Decisions
//! - Exact-match-first, rightmost-segment-peeling walk: the full path is
//!   tried first and shortened one segment per miss, so a deeper
//!   registered prefix always beats a shallower ancestor
//! - Pure function of (path, registry): no state, no side effects

use std::sync::Arc;

use crate::http::error::HttpError;
use crate::plugin::{Consumer, ConsumerRegistry};

/// Outcome of a successful resolution.
pub struct RouteMatch {
    /// The registered prefix that matched.
    pub prefix: String,
    pub consumer: Arc<dyn Consumer>,
    /// Path segments between the prefix and the full request path,
    /// left-to-right. Empty when the path matched a prefix exactly.
    pub trail: Vec<String>,
}

/// Resolve a request path against the registry.
///
/// Fails with 400 for a non-absolute path and 404 when no registered
/// prefix covers any ancestor of the path, the root included.
pub fn resolve(registry: &ConsumerRegistry, path: &str) -> Result<RouteMatch, HttpError> {
    if !path.starts_with('/') {
        return Err(HttpError::bad_request("request path must be absolute"));
    }

    let mut candidate = path.to_string();
    let mut trail: Vec<String> = Vec::new();
    loop {
        if let Some(consumer) = registry.get(&candidate) {
            return Ok(RouteMatch {
                prefix: candidate,
                consumer: Arc::clone(consumer),
                trail,
            });
        }
        if candidate == "/" {
            return Err(HttpError::not_found());
        }
        let (parent, segment) = split_last_segment(&candidate);
        trail.insert(0, segment);
        candidate = parent;
    }
}

/// Split an absolute path into its parent and final segment.
/// `/a/b` → (`/a`, `b`), `/a` → (`/`, `a`), `/a/` → (`/a`, ``).
fn split_last_segment(path: &str) -> (String, String) {
    let idx = path.rfind('/').unwrap_or(0);
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    (parent.to_string(), path[idx + 1..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Request;
    use crate::http::response::Response;
    use crate::plugin::{BoxFuture, HandlerError};

    struct Tagged(String);

    impl Consumer for Tagged {
        fn handle<'a>(
            &'a self,
            _request: &'a mut Request,
        ) -> BoxFuture<'a, Result<Response, HandlerError>> {
            let tag = self.0.clone();
            Box::pin(async move { Ok(Response::new().text(tag)) })
        }
    }

    fn registry(prefixes: &[&str]) -> ConsumerRegistry {
        let mut builder = ConsumerRegistry::builder();
        for prefix in prefixes {
            builder = builder.mount(*prefix, Arc::new(Tagged(prefix.to_string())));
        }
        builder.build().unwrap()
    }

    #[test]
    fn exact_match_has_no_trail() {
        let reg = registry(&["/secrets"]);
        let matched = resolve(&reg, "/secrets").unwrap();
        assert_eq!(matched.prefix, "/secrets");
        assert!(matched.trail.is_empty());
    }

    #[test]
    fn trailing_segments_keep_original_order() {
        let reg = registry(&["/secrets"]);
        let matched = resolve(&reg, "/secrets/app1/key1").unwrap();
        assert_eq!(matched.prefix, "/secrets");
        assert_eq!(matched.trail, vec!["app1", "key1"]);
    }

    #[test]
    fn innermost_prefix_wins_over_ancestor() {
        let reg = registry(&["/a", "/a/x"]);
        let matched = resolve(&reg, "/a/x/y").unwrap();
        assert_eq!(matched.prefix, "/a/x");
        assert_eq!(matched.trail, vec!["y"]);
    }

    #[test]
    fn root_prefix_catches_everything_else() {
        let reg = registry(&["/", "/secrets"]);
        let matched = resolve(&reg, "/other/thing").unwrap();
        assert_eq!(matched.prefix, "/");
        assert_eq!(matched.trail, vec!["other", "thing"]);
    }

    #[test]
    fn unmatched_path_is_404() {
        let reg = registry(&["/secrets"]);
        let err = resolve(&reg, "/config/app").err().unwrap();
        assert_eq!(err.code, 404);
    }

    #[test]
    fn root_request_without_root_prefix_is_404() {
        let reg = registry(&["/secrets"]);
        let err = resolve(&reg, "/").err().unwrap();
        assert_eq!(err.code, 404);
    }

    #[test]
    fn non_absolute_path_is_400() {
        let reg = registry(&["/secrets"]);
        let err = resolve(&reg, "secrets/app").err().unwrap();
        assert_eq!(err.code, 400);
    }

    #[test]
    fn trailing_slash_yields_empty_final_segment() {
        let reg = registry(&["/secrets"]);
        let matched = resolve(&reg, "/secrets/").unwrap();
        assert_eq!(matched.prefix, "/secrets");
        assert_eq!(matched.trail, vec![""]);
    }

    #[test]
    fn resolution_is_pure() {
        let reg = registry(&["/a", "/a/x"]);
        for _ in 0..3 {
            let matched = resolve(&reg, "/a/x/y/z").unwrap();
            assert_eq!(matched.prefix, "/a/x");
            assert_eq!(matched.trail, vec!["y", "z"]);
        }
    }
}
