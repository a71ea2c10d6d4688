//! Minimal HTTP/1.0 client speaking over the gateway's unix socket.
//!
//! One connection per request: the gateway closes the connection after a
//! response unless keep-alive was negotiated, and callers of this SDK
//! never need that.

use std::io;
use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

/// A parsed gateway response.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Case-insensitive header lookup, first occurrence wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_slice(&self.body)
    }
}

/// Client bound to one gateway socket path.
pub struct GatewayClient {
    socket_path: PathBuf,
}

impl GatewayClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Send one request and read the full response.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<&[u8]>,
    ) -> io::Result<ApiResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).await?;

        let mut head = format!("{} {} HTTP/1.0\r\n", method, path);
        for (name, value) in headers {
            head.push_str(&format!("{}: {}\r\n", name, value));
        }
        if let Some(body) = body {
            head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        head.push_str("\r\n");

        stream.write_all(head.as_bytes()).await?;
        if let Some(body) = body {
            stream.write_all(body).await?;
        }

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await?;
        parse_response(&raw)
    }

    pub async fn get(&self, path: &str) -> io::Result<ApiResponse> {
        self.request("GET", path, &[], None).await
    }

    pub async fn put(&self, path: &str, body: &[u8]) -> io::Result<ApiResponse> {
        self.request("PUT", path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> io::Result<ApiResponse> {
        self.request("DELETE", path, &[], None).await
    }
}

fn parse_response(raw: &[u8]) -> io::Result<ApiResponse> {
    let head_end = find_head_end(raw)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing header terminator"))?;
    let head = std::str::from_utf8(&raw[..head_end])
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "non-UTF-8 response head"))?;
    let body = raw[head_end + 4..].to_vec();

    let mut lines = head.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "empty response"))?;
    let mut parts = status_line.splitn(3, ' ');
    let _version = parts
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed status line"))?;
    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed status code"))?;
    let reason = parts.next().unwrap_or("").to_string();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed header"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(ApiResponse {
        status,
        reason,
        headers,
        body,
    })
}

fn find_head_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_response() {
        let raw = b"HTTP/1.0 404 Not Found\r\nServer: VaultGate/0.1\r\nContent-Length: 14\r\n\r\n404 Not Found\n";
        let response = parse_response(raw).unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.reason, "Not Found");
        assert_eq!(response.header("server"), Some("VaultGate/0.1"));
        assert_eq!(response.body_text(), "404 Not Found\n");
    }

    #[test]
    fn truncated_response_is_invalid() {
        assert!(parse_response(b"HTTP/1.0 200 OK\r\n").is_err());
    }
}
