//! Request record and the bounded HTTP/1.0 parser.
//!
//! # Responsibilities
//! - Read the request line under the 65536-byte bound
//! - Decompose the target into path, decoded query multimap and fragment
//! - Read the header block under line and count bounds
//! - Read the body only when a positive content-length is declared,
//!   rejecting declared lengths above the 10 MiB cap before reading
//! - Attach a request id as early as possible for tracing
//!
//! # Design Decisions
//! - Limits are enforced before any expensive read (early rejection)
//! - The path component keeps its raw encoding; only the query string is
//!   percent-decoded
//! - Header lookup is case-insensitive, first occurrence wins

use std::collections::{BTreeMap, HashMap};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use url::form_urlencoded;
use uuid::Uuid;

use crate::http::error::HttpError;
use crate::net::PeerCredentials;

/// Upper bound on any single line (request line or header line),
/// including the line terminator.
pub const MAX_LINE_LENGTH: usize = 65536;

/// Upper bound on a declared request body.
pub const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Upper bound on the number of header lines in one request.
pub const MAX_HEADER_COUNT: usize = 100;

/// The request target split into its components.
///
/// `raw` preserves the target exactly as the client sent it; `path` is the
/// path-only component with query and fragment stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    pub raw: String,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

/// One parsed request, scoped to a single connection's lifetime.
///
/// This is the entire contract between the core and the plugin ecosystem:
/// authenticators mutate `valid_auth` and `attributes`, the router fills
/// `trail`, consumers read everything.
#[derive(Debug)]
pub struct Request {
    /// Request id attached at parse time, for log correlation only.
    pub id: Uuid,
    /// Kernel-reported identity of the connected peer. Immutable and never
    /// derived from request content.
    pub credentials: PeerCredentials,
    pub method: String,
    /// Path component of the target, query and fragment stripped.
    pub path: String,
    /// Decoded query parameters; repeated names keep every value in order.
    pub query: HashMap<String, Vec<String>>,
    /// Full parsed target, in case a plugin needs more than `path`.
    pub target: RequestTarget,
    pub version: String,
    /// Header mapping, lowercase names, first occurrence wins.
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
    /// Set strictly by authenticators; absent until one succeeds.
    pub valid_auth: Option<bool>,
    /// Path segments below the matched consumer prefix, original order.
    pub trail: Option<Vec<String>>,
    /// Plugin-contributed identity attributes.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl Request {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Mark the request as authenticated. Only authenticators call this;
    /// the core never defaults it.
    pub fn mark_authenticated(&mut self) {
        self.valid_auth = Some(true);
    }

    pub fn is_authenticated(&self) -> bool {
        self.valid_auth == Some(true)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: serde_json::Value) {
        self.attributes.insert(name.into(), value);
    }

    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// HTTP/1.0 keep-alive negotiation: 1.1 stays open unless told to
    /// close, anything else closes unless asked to stay open.
    pub fn keep_alive(&self) -> bool {
        let connection = self.header("connection").map(|v| v.to_ascii_lowercase());
        if self.version.eq_ignore_ascii_case("HTTP/1.1") {
            connection.as_deref() != Some("close")
        } else {
            connection.as_deref() == Some("keep-alive")
        }
    }
}

/// Why a request could not be produced from the stream.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The peer closed the connection before sending a request.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// Protocol violation, answered with its status code before closing.
    #[error("{0}")]
    Protocol(HttpError),
    #[error("transport read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One bounded line read off the stream.
enum Line {
    /// Clean end of stream before any byte.
    Eof,
    /// The line exceeded the bound; the caller decides the status.
    TooLong,
    /// A complete line, terminator stripped.
    Complete(String),
}

/// Read one line, bounded at `limit` bytes including the terminator.
async fn read_line_bounded<R>(reader: &mut R, limit: usize) -> Result<Line, std::io::Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = reader.take(limit as u64 + 1);
    let n = limited.read_until(b'\n', &mut buf).await?;
    if n == 0 {
        return Ok(Line::Eof);
    }
    if buf.len() > limit {
        return Ok(Line::TooLong);
    }
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
    Ok(Line::Complete(String::from_utf8_lossy(&buf).into_owned()))
}

/// Read and parse one request from the connection's stream.
///
/// The kernel-reported peer identity is attached verbatim; nothing in the
/// request bytes can influence it.
pub async fn read_request<R>(
    reader: &mut R,
    credentials: PeerCredentials,
) -> Result<Request, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let request_line = match read_line_bounded(reader, MAX_LINE_LENGTH).await? {
        Line::Eof => return Err(ParseError::ConnectionClosed),
        Line::TooLong => return Err(ParseError::Protocol(HttpError::line_too_long())),
        Line::Complete(line) => line,
    };
    if request_line.is_empty() {
        return Err(ParseError::ConnectionClosed);
    }

    let mut parts = request_line.split_whitespace();
    let (method, raw_target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v), None) if v.starts_with("HTTP/") => (m, t, v),
        _ => {
            return Err(ParseError::Protocol(HttpError::bad_request(
                "malformed request line",
            )))
        }
    };

    let target = split_target(raw_target);
    let query = decode_query(target.query.as_deref());

    let mut headers: HashMap<String, String> = HashMap::new();
    loop {
        let line = match read_line_bounded(reader, MAX_LINE_LENGTH).await? {
            Line::Eof => return Err(ParseError::ConnectionClosed),
            Line::TooLong => {
                return Err(ParseError::Protocol(HttpError::header_block_too_large()))
            }
            Line::Complete(line) => line,
        };
        if line.is_empty() {
            break;
        }
        if headers.len() >= MAX_HEADER_COUNT {
            return Err(ParseError::Protocol(HttpError::header_block_too_large()));
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            ParseError::Protocol(HttpError::bad_request("malformed header line"))
        })?;
        headers
            .entry(name.trim().to_ascii_lowercase())
            .or_insert_with(|| value.trim().to_string());
    }

    let body = read_body(reader, &headers).await?;

    Ok(Request {
        id: Uuid::new_v4(),
        credentials,
        method: method.to_string(),
        path: target.path.clone(),
        query,
        target,
        version: version.to_string(),
        headers,
        body,
        valid_auth: None,
        trail: None,
        attributes: BTreeMap::new(),
    })
}

/// Read the body if and only if a positive content-length was declared.
/// A declared length above the cap is rejected before any body byte is
/// read into memory.
async fn read_body<R>(
    reader: &mut R,
    headers: &HashMap<String, String>,
) -> Result<Option<Vec<u8>>, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let length = match headers.get("content-length") {
        None => return Ok(None),
        Some(raw) => raw.parse::<usize>().map_err(|_| {
            ParseError::Protocol(HttpError::bad_request("invalid content-length"))
        })?,
    };
    if length > MAX_BODY_SIZE {
        return Err(ParseError::Protocol(HttpError::payload_too_large()));
    }
    if length == 0 {
        return Ok(None);
    }
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.map_err(ParseError::Io)?;
    Ok(Some(body))
}

fn split_target(raw: &str) -> RequestTarget {
    let (without_fragment, fragment) = match raw.split_once('#') {
        Some((head, frag)) => (head, Some(frag.to_string())),
        None => (raw, None),
    };
    let (path, query) = match without_fragment.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (without_fragment.to_string(), None),
    };
    RequestTarget {
        raw: raw.to_string(),
        path,
        query,
        fragment,
    }
}

/// Decode a query string into a name → values multimap. Repeats keep their
/// order; pairs with an empty value are dropped.
fn decode_query(query: Option<&str>) -> HashMap<String, Vec<String>> {
    let mut decoded: HashMap<String, Vec<String>> = HashMap::new();
    if let Some(q) = query {
        for (name, value) in form_urlencoded::parse(q.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            decoded
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }
    decoded
}
