//! HTTP Game Service client built on [`reqwest`].
//!
//! This module provides [`HttpGameService`], a [`GameService`] implementation
//! that speaks the Game Service's plain HTTP contract:
//!
//! - `GET /game-state` → JSON snapshot ([`SnapshotFormat::Structured`])
//! - `GET /state` → legacy text dump ([`SnapshotFormat::Text`])
//! - `POST /command` with `{"command": "..."}` → `{"response": "..."}`
//!
//! The poll task and the command path share one connection pool and may
//! have requests in flight at the same time.
//!
//! # Feature gate
//!
//! This module is only available when the `transport-http` feature is enabled
//! (it is enabled by default).
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> salvo_client::Result<()> {
//! use salvo_client::{GameService, HttpConfig, HttpGameService};
//!
//! let service = HttpGameService::new(HttpConfig::new("127.0.0.1:8080"))?;
//! let snapshot = service.fetch_state().await?.decode()?;
//! println!("{}", snapshot.own);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Result, SalvoError};
use crate::protocol::{CommandRequest, CommandResponse};
use crate::service::GameService;
use crate::snapshot::RawSnapshot;

/// Default timeout for one request, connect to last body byte.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on a response body. A 10×10 snapshot is well under 1 KiB.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Which snapshot encoding to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotFormat {
    /// JSON from `GET /game-state`.
    #[default]
    Structured,
    /// Text dump from `GET /state`.
    Text,
}

impl SnapshotFormat {
    fn path(self) -> &'static str {
        match self {
            Self::Structured => "/game-state",
            Self::Text => "/state",
        }
    }
}

/// Configuration for an [`HttpGameService`].
///
/// # Example
///
/// ```
/// use salvo_client::transports::http::{HttpConfig, SnapshotFormat};
/// use std::time::Duration;
///
/// let config = HttpConfig::new("localhost:8080")
///     .with_request_timeout(Duration::from_secs(2))
///     .with_snapshot_format(SnapshotFormat::Text);
/// assert_eq!(config.address, "localhost:8080");
/// assert_eq!(config.max_body_bytes, 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// `host:port` of the Game Service, or a base URL such as
    /// `https://game.example`.
    pub address: String,
    /// Timeout for one request, including connect and reading the body.
    ///
    /// Defaults to **5 seconds**.
    pub request_timeout: Duration,
    /// Snapshot encoding to fetch. Defaults to [`SnapshotFormat::Structured`].
    pub snapshot_format: SnapshotFormat,
    /// Largest response body accepted, in bytes. Defaults to **1 MiB**.
    pub max_body_bytes: usize,
}

impl HttpConfig {
    /// Create a configuration for the service at `address`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            snapshot_format: SnapshotFormat::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the snapshot encoding to fetch.
    #[must_use]
    pub fn with_snapshot_format(mut self, format: SnapshotFormat) -> Self {
        self.snapshot_format = format;
        self
    }

    /// Set the response body cap.
    #[must_use]
    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Full URL for `path`. A bare `host:port` is reached over `http`.
    fn url(&self, path: &str) -> String {
        let base = self.address.trim_end_matches('/');
        if base.contains("://") {
            format!("{base}{path}")
        } else {
            format!("http://{base}{path}")
        }
    }
}

/// A [`GameService`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGameService {
    config: HttpConfig,
    client: reqwest::Client,
}

impl HttpGameService {
    /// Create a service client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SalvoError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SalvoError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Check the status of `response` and read its body as text.
    ///
    /// # Errors
    ///
    /// [`SalvoError::HttpStatus`] for a non-2xx status,
    /// [`SalvoError::Timeout`] if the body does not arrive in time, or
    /// [`SalvoError::Transport`] if the body is too large or not UTF-8.
    async fn read_body(&self, mut response: reqwest::Response) -> Result<String> {
        let status = response.status();
        if !status.is_success() {
            return Err(SalvoError::HttpStatus {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        let max = self.config.max_body_bytes;
        let too_large = || SalvoError::Transport(format!("response body exceeds {max} bytes"));
        if response
            .content_length()
            .is_some_and(|len| len > max as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(from_reqwest)? {
            if body.len() + chunk.len() > max {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        String::from_utf8(body)
            .map_err(|_| SalvoError::Transport("response body is not UTF-8".into()))
    }
}

#[async_trait]
impl GameService for HttpGameService {
    async fn fetch_state(&self) -> Result<RawSnapshot> {
        let format = self.config.snapshot_format;
        let url = self.config.url(format.path());
        debug!(%url, "fetching game state");
        let response = self.client.get(&url).send().await.map_err(from_reqwest)?;
        let body = self.read_body(response).await?;
        match format {
            SnapshotFormat::Structured => RawSnapshot::from_json(&body),
            SnapshotFormat::Text => Ok(RawSnapshot::Text(body)),
        }
    }

    async fn send_command(&self, request: CommandRequest) -> Result<CommandResponse> {
        let url = self.config.url("/command");
        debug!(%url, command = %request.command, "sending command");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(from_reqwest)?;
        parse_reply(self.read_body(response).await?)
    }
}

/// Interpret a `POST /command` body.
///
/// A JSON object must carry `response`. Older services answer with bare
/// text, which is taken as the reply unchanged.
fn parse_reply(body: String) -> Result<CommandResponse> {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(serde_json::Value::Object(_)) => serde_json::from_str(&body)
            .map_err(|e| SalvoError::MalformedReply(format!("{e}: {body}"))),
        Ok(serde_json::Value::String(response)) => Ok(CommandResponse { response }),
        _ => Ok(CommandResponse { response: body }),
    }
}

fn from_reqwest(e: reqwest::Error) -> SalvoError {
    if e.is_timeout() {
        SalvoError::Timeout
    } else {
        SalvoError::Transport(e.to_string())
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::board::{CellState, Coordinate};
    use std::sync::{Arc, Mutex as StdMutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn http_service_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HttpGameService>();
    }

    #[test]
    fn bare_address_gets_http_scheme() {
        let config = HttpConfig::new("127.0.0.1:8080");
        assert_eq!(config.url("/state"), "http://127.0.0.1:8080/state");
        let config = HttpConfig::new("https://game.example/");
        assert_eq!(config.url("/command"), "https://game.example/command");
    }

    #[test]
    fn reply_forms() {
        let reply = parse_reply(r#"{"response":"Hit!"}"#.into()).unwrap();
        assert_eq!(reply.response, "Hit!");
        let reply = parse_reply(r#""Miss!""#.into()).unwrap();
        assert_eq!(reply.response, "Miss!");
        let reply = parse_reply("Game stopped".into()).unwrap();
        assert_eq!(reply.response, "Game stopped");
        let err = parse_reply(r#"{"error":"not your turn"}"#.into()).unwrap_err();
        assert!(matches!(err, SalvoError::MalformedReply(ref m) if m.contains("not your turn")));
    }

    // ── Mock-server helpers ──────────────────────────────────────────────

    /// Read one request (headers plus `Content-Length` body) from `stream`.
    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let len = text[..end]
                    .to_lowercase()
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:").map(str::to_string))
                    .map(|v| v.trim().parse::<usize>().unwrap())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    /// Start a one-shot HTTP server that answers with `response` verbatim.
    /// Returns its address and a slot holding the request it received.
    async fn start_raw_server(response: String) -> (String, Arc<StdMutex<Option<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(StdMutex::new(None));
        let slot = Arc::clone(&seen);

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_request(&mut stream).await;
            *slot.lock().unwrap() = Some(request);
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        (addr.to_string(), seen)
    }

    /// Start a one-shot HTTP server answering with `status` and `body`.
    async fn start_mock_server(
        status: &'static str,
        body: String,
    ) -> (String, Arc<StdMutex<Option<String>>>) {
        start_raw_server(format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
        .await
    }

    fn service(addr: String) -> HttpGameService {
        HttpGameService::new(HttpConfig::new(addr)).unwrap()
    }

    // ── Mock-server tests ────────────────────────────────────────────────

    #[tokio::test]
    async fn fetch_state_reads_game_state_json() {
        let mut my_board = vec![vec![0u8; 10]; 10];
        my_board[2][2] = 1;
        let body = serde_json::json!({
            "myBoard": my_board,
            "enemyBoard": vec![vec![1u8; 10]; 10],
            "gameOver": false
        })
        .to_string();
        let (addr, seen) = start_mock_server("200 OK", body).await;

        let snapshot = service(addr).fetch_state().await.unwrap().decode().unwrap();
        assert_eq!(
            snapshot.own.get(Coordinate::new(2, 2)).unwrap(),
            CellState::Ship
        );
        assert_eq!(snapshot.enemy.count(CellState::Ship), 0);

        let request = seen.lock().unwrap().clone().unwrap();
        assert!(request.starts_with("GET /game-state HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn text_format_uses_the_state_endpoint() {
        let body = "Your ships:\nS.\n..\nEnemy ships:\n.X\nO.\n".to_string();
        let (addr, seen) = start_mock_server("200 OK", body).await;

        let config = HttpConfig::new(addr).with_snapshot_format(SnapshotFormat::Text);
        let raw = HttpGameService::new(config)
            .unwrap()
            .fetch_state()
            .await
            .unwrap();
        assert!(matches!(raw, RawSnapshot::Text(_)));
        let snapshot = raw.decode().unwrap();
        assert_eq!(
            snapshot.enemy.get(Coordinate::new(1, 0)).unwrap(),
            CellState::Hit
        );

        let request = seen.lock().unwrap().clone().unwrap();
        assert!(request.starts_with("GET /state HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn chunked_body_is_read() {
        let (addr, _seen) = start_raw_server(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n\
             4\r\nGame\r\n8\r\n started\r\n0\r\n\r\n"
                .to_string(),
        )
        .await;
        let reply = service(addr)
            .send_command(CommandRequest {
                command: "start".into(),
            })
            .await
            .unwrap();
        assert_eq!(reply.response, "Game started");
    }

    #[tokio::test]
    async fn send_command_posts_json() {
        let body = r#"{"response":"Hit! Your turn again."}"#.to_string();
        let (addr, seen) = start_mock_server("200 OK", body).await;

        let reply = service(addr)
            .send_command(CommandRequest {
                command: "shot 3 4".into(),
            })
            .await
            .unwrap();
        assert_eq!(reply.response, "Hit! Your turn again.");

        let request = seen.lock().unwrap().clone().unwrap();
        assert!(request.starts_with("POST /command HTTP/1.1\r\n"));
        assert!(request
            .to_lowercase()
            .contains("content-type: application/json\r\n"));
        assert!(request.ends_with(r#"{"command":"shot 3 4"}"#));
    }

    #[tokio::test]
    async fn plain_text_reply_is_accepted() {
        let (addr, _seen) = start_mock_server("200 OK", "Game stopped".to_string()).await;
        let reply = service(addr)
            .send_command(CommandRequest {
                command: "stop".into(),
            })
            .await
            .unwrap();
        assert_eq!(reply.response, "Game stopped");
    }

    #[tokio::test]
    async fn json_reply_without_response_is_rejected() {
        let (addr, _seen) =
            start_mock_server("200 OK", r#"{"error":"not your turn"}"#.to_string()).await;
        let err = service(addr)
            .send_command(CommandRequest {
                command: "shot 1 1".into(),
            })
            .await
            .unwrap_err();
        assert!(
            matches!(err, SalvoError::MalformedReply(ref m) if m.contains("not your turn")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn server_error_status_is_reported() {
        let (addr, _seen) =
            start_mock_server("500 Internal Server Error", "boom".to_string()).await;
        let err = service(addr).fetch_state().await.unwrap_err();
        assert!(matches!(
            err,
            SalvoError::HttpStatus { status: 500, ref reason } if reason == "Internal Server Error"
        ));
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let (addr, _seen) = start_mock_server("200 OK", "{\"myBoard\": 7}".to_string()).await;
        let err = service(addr).fetch_state().await.unwrap_err();
        assert!(matches!(err, SalvoError::MalformedSnapshot(_)));
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (addr, _seen) = start_mock_server("200 OK", "x".repeat(64)).await;
        let config = HttpConfig::new(addr).with_max_body_bytes(16);
        let err = HttpGameService::new(config)
            .unwrap()
            .fetch_state()
            .await
            .unwrap_err();
        assert!(matches!(err, SalvoError::Transport(ref m) if m.contains("exceeds 16 bytes")));
    }

    #[tokio::test]
    async fn oversized_chunked_body_is_rejected() {
        let (addr, _seen) = start_raw_server(
            "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n\
             a\r\n0123456789\r\na\r\n0123456789\r\n0\r\n\r\n"
                .to_string(),
        )
        .await;
        let config = HttpConfig::new(addr)
            .with_snapshot_format(SnapshotFormat::Text)
            .with_max_body_bytes(15);
        let err = HttpGameService::new(config)
            .unwrap()
            .fetch_state()
            .await
            .unwrap_err();
        assert!(matches!(err, SalvoError::Transport(_)), "{err:?}");
    }

    #[tokio::test]
    async fn connection_refused_is_a_transport_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = service(addr).fetch_state().await.unwrap_err();
        assert!(matches!(err, SalvoError::Transport(_)));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            std::future::pending::<()>().await;
        });

        let config = HttpConfig::new(addr).with_request_timeout(Duration::from_millis(50));
        let err = HttpGameService::new(config)
            .unwrap()
            .fetch_state()
            .await
            .unwrap_err();
        assert!(matches!(err, SalvoError::Timeout));
    }
}
