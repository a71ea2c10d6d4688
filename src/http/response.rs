//! Response record and serialization onto the transport.
//!
//! # Responsibilities
//! - Emit the status line (default 200), identification headers, then
//!   every consumer-provided header verbatim in the order given
//! - Stream file-like bodies in bounded chunks; write discrete values as
//!   UTF-8 bytes; mark the connection for closure when no body exists
//! - Flush the transport buffer unconditionally, error branches included
//!
//! # Design Decisions
//! - No header deduplication or canonicalization: what the consumer
//!   returns is what goes on the wire
//! - Header emission and the final flush form one atomic step as far as
//!   the peer can observe: it either sees a complete response or a close

use chrono::Utc;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::http::error::{reason_phrase, HttpError};

/// Body of a response produced by a consumer.
pub enum ResponseBody {
    /// No body. The connection is closed after the headers as the
    /// end-of-response signal.
    None,
    /// A discrete value, written as its UTF-8 byte representation.
    Text(String),
    /// Raw bytes, written as-is.
    Bytes(Vec<u8>),
    /// A streamable byte source, copied to the transport in bounded
    /// chunks and then released.
    Stream(Box<dyn AsyncRead + Send + Unpin>),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::None => write!(f, "None"),
            ResponseBody::Text(t) => write!(f, "Text({} bytes)", t.len()),
            ResponseBody::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            ResponseBody::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// Response returned by a consumer, immutable once returned.
#[derive(Debug)]
pub struct Response {
    /// Status code; a missing code means 200.
    pub code: Option<u16>,
    /// Headers emitted verbatim, in order, no deduplication.
    pub headers: Vec<(String, String)>,
    pub body: ResponseBody,
}

impl Response {
    pub fn new() -> Self {
        Self {
            code: None,
            headers: Vec::new(),
            body: ResponseBody::None,
        }
    }

    pub fn with_code(code: u16) -> Self {
        Self {
            code: Some(code),
            ..Self::new()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = ResponseBody::Text(body.into());
        self
    }

    pub fn bytes(mut self, body: Vec<u8>) -> Self {
        self.body = ResponseBody::Bytes(body);
        self
    }

    pub fn stream(mut self, source: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        self.body = ResponseBody::Stream(source);
        self
    }

    /// JSON body with content-type and content-length set.
    pub fn json(value: &serde_json::Value) -> Self {
        let body = value.to_string();
        Self::new()
            .header("Content-Type", "application/json")
            .header("Content-Length", body.len().to_string())
            .text(body)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the connection must close once the response is on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseHint {
    KeepOpen,
    Close,
}

/// Serializes response records onto one connection's write half.
pub struct ResponseWriter<W> {
    writer: BufWriter<W>,
    server_string: String,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(writer: W, server_string: impl Into<String>) -> Self {
        Self {
            writer: BufWriter::new(writer),
            server_string: server_string.into(),
        }
    }

    /// Write a consumer response. Returns whether the connection must
    /// close because the response carried no body.
    pub async fn write_response(&mut self, response: Response) -> std::io::Result<CloseHint> {
        let code = response.code.unwrap_or(200);
        self.write_head(code, &response.headers).await?;

        let hint = match response.body {
            ResponseBody::None => CloseHint::Close,
            ResponseBody::Text(text) => {
                self.writer.write_all(text.as_bytes()).await?;
                CloseHint::KeepOpen
            }
            ResponseBody::Bytes(bytes) => {
                self.writer.write_all(&bytes).await?;
                CloseHint::KeepOpen
            }
            ResponseBody::Stream(mut source) => {
                tokio::io::copy(&mut source, &mut self.writer).await?;
                drop(source);
                CloseHint::KeepOpen
            }
        };

        self.writer.flush().await?;
        Ok(hint)
    }

    /// Write a minimal status-coded error response. Always closes.
    pub async fn write_error(&mut self, error: &HttpError) -> std::io::Result<()> {
        let mut body = format!("{} {}", error.code, reason_phrase(error.code));
        if let Some(message) = &error.message {
            body.push_str(": ");
            body.push_str(message);
        }
        body.push('\n');

        let headers = vec![
            ("Content-Type".to_string(), "text/plain; charset=utf-8".to_string()),
            ("Content-Length".to_string(), body.len().to_string()),
            ("Connection".to_string(), "close".to_string()),
        ];
        self.write_head(error.code, &headers).await?;
        self.writer.write_all(body.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Flush whatever is buffered. Used on error branches so a partially
    /// written response is never left sitting in the buffer.
    pub async fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush().await
    }

    async fn write_head(
        &mut self,
        code: u16,
        headers: &[(String, String)],
    ) -> std::io::Result<()> {
        let status = format!("HTTP/1.0 {} {}\r\n", code, reason_phrase(code));
        self.writer.write_all(status.as_bytes()).await?;

        let server = format!("Server: {}\r\n", self.server_string);
        self.writer.write_all(server.as_bytes()).await?;
        let date = format!("Date: {}\r\n", imf_fixdate());
        self.writer.write_all(date.as_bytes()).await?;

        for (name, value) in headers {
            let line = format!("{}: {}\r\n", name, value);
            self.writer.write_all(line.as_bytes()).await?;
        }
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }
}

/// Current time in IMF-fixdate format for the Date header.
fn imf_fixdate() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
