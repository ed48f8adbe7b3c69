//! The [`Transport`] trait and its reqwest-backed [`SecureTransport`].

use std::collections::BTreeMap;
use std::error::Error as _;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;

use super::request::{validate_url, ApiRequest};
use super::response::{check_status, ApiResponse};
use crate::config::ApiConfig;
use crate::security::{pinned_client_config, KeyPinner, TlsSetupError};

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Everything that can go wrong between building a request and holding a
/// successful response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Invalid server URL")]
    InvalidUrl,

    #[error("No internet connection")]
    NoConnection,

    #[error("Request timed out")]
    Timeout,

    #[error("Request was cancelled")]
    Cancelled,

    /// Host unreachable, refused, or failed certificate pinning.
    #[error("Speech server is unavailable")]
    ServerUnavailable,

    #[error("Failed to parse server response: {0}")]
    Decoding(String),

    #[error("Failed to encode request: {0}")]
    Encoding(String),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("Access forbidden")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Server error (code: {status})")]
    ServerError { status: u16 },

    #[error("{}", wait_message("Rate limit exceeded", .retry_after))]
    RateLimitExceeded { retry_after: Option<Duration> },

    #[error("{}", wait_message("Generation rate limit exceeded", .retry_after))]
    GenerationRateLimitExceeded { retry_after: Option<Duration> },

    #[error("Validation error: {}", join_fields(.fields))]
    Validation { fields: BTreeMap<String, String> },

    #[error("{message}")]
    Api {
        message: String,
        code: Option<String>,
    },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

fn wait_message(prefix: &str, retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(wait) => format!("{prefix}. Try again in {} seconds.", wait.as_secs()),
        None => format!("{prefix}. Please wait before trying again."),
    }
}

fn join_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, msg)| format!("{field}: {msg}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl TransportError {
    /// Whether the same request may succeed if simply tried again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::NoConnection
            | TransportError::Timeout
            | TransportError::ServerUnavailable
            | TransportError::RateLimitExceeded { .. }
            | TransportError::GenerationRateLimitExceeded { .. } => true,
            TransportError::ServerError { status } => *status >= 500,
            _ => false,
        }
    }

    /// Server-suggested wait, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransportError::RateLimitExceeded { retry_after }
            | TransportError::GenerationRateLimitExceeded { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::InvalidUrl
        } else if e.is_connect() {
            if dropped_connection(&e) {
                TransportError::NoConnection
            } else {
                TransportError::ServerUnavailable
            }
        } else if e.is_body() || e.is_request() {
            TransportError::NoConnection
        } else if e.is_decode() {
            TransportError::Decoding(e.to_string())
        } else {
            TransportError::Unknown(e.to_string())
        }
    }
}

/// An established connection went away (as opposed to never being made).
fn dropped_connection(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<io::Error>() {
            return matches!(
                io.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            );
        }
        source = err.source();
    }
    false
}

/// The client could not be constructed.
#[derive(Debug, Error)]
pub enum TransportSetupError {
    #[error(transparent)]
    Tls(#[from] TlsSetupError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Async HTTP transport.
///
/// Implementors must be `Send + Sync` so one instance can be shared as
/// `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`.  Non-2xx statuses come back as errors.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;

    /// Perform `request` and return the raw body.
    async fn fetch_bytes(&self, request: ApiRequest) -> Result<Vec<u8>, TransportError> {
        Ok(self.send(request).await?.body)
    }

    /// Abort every request currently in flight.  Later requests are unaffected.
    fn cancel_all(&self);
}

/// Perform `request` and decode the body as `T`.
pub async fn send_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: ApiRequest,
) -> Result<T, TransportError> {
    transport.send(request).await?.json()
}

// ---------------------------------------------------------------------------
// SecureTransport
// ---------------------------------------------------------------------------

/// reqwest client whose TLS trust goes through the key pinner.
///
/// Cancellation: every request subscribes to a generation counter before it
/// starts; [`cancel_all`](Transport::cancel_all) bumps the counter, which
/// wakes exactly the requests subscribed at that moment.
pub struct SecureTransport {
    client: reqwest::Client,
    cancel: watch::Sender<u64>,
}

impl SecureTransport {
    /// Build a pinned client with the configured timeout.
    pub fn new(config: &ApiConfig, pinner: Arc<KeyPinner>) -> Result<Self, TransportSetupError> {
        let tls = pinned_client_config(pinner)?;
        let client = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(config.timeout())
            .build()?;
        Ok(Self::from_client(client))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: reqwest::Client) -> Self {
        let (cancel, _) = watch::channel(0);
        Self { client, cancel }
    }

    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = validate_url(&request.url)?;
        log::debug!("request: {} to {}", request.method.as_str(), request.host());

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .header(ACCEPT, "application/json");
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let header = |name| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };
        let retry_after = header(RETRY_AFTER);
        let content_type = header(CONTENT_TYPE);
        let body = response.bytes().await?.to_vec();
        log::debug!("response: {status} ({} bytes)", body.len());

        check_status(status, retry_after.as_deref(), &body)?;
        Ok(ApiResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Transport for SecureTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let mut cancelled = self.cancel.subscribe();
        tokio::select! {
            result = self.execute(request) => result,
            _ = cancelled.changed() => {
                log::debug!("request cancelled");
                Err(TransportError::Cancelled)
            }
        }
    }

    fn cancel_all(&self) {
        self.cancel.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response per connection, forever.
    async fn serve(status_line: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let head = format!(
                        "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    );
                    let _ = socket.write_all(head.as_bytes()).await;
                    let _ = socket.write_all(&body).await;
                });
            }
        });
        format!("http://{addr}")
    }

    /// Accept connections and never answer.
    async fn serve_hung() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });
        format!("http://{addr}")
    }

    fn transport() -> SecureTransport {
        SecureTransport::from_client(reqwest::Client::new())
    }

    #[tokio::test]
    async fn fetch_bytes_returns_body() {
        let base = serve("200 OK", vec![7u8; 12345]).await;
        let bytes = transport()
            .fetch_bytes(ApiRequest::get(format!("{base}/audio")))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 12345);
    }

    #[tokio::test]
    async fn send_json_decodes_body() {
        let base = serve("200 OK", br#"{"status":"ok"}"#.to_vec()).await;
        let t = transport();
        let value: serde_json::Value = send_json(&t, ApiRequest::get(format!("{base}/health")))
            .await
            .unwrap();
        assert_eq!(value["status"], "ok");

        let err = send_json::<Vec<u32>>(&t, ApiRequest::get(format!("{base}/health")))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Decoding(_)));
    }

    #[tokio::test]
    async fn error_status_is_mapped() {
        let base = serve("401 Unauthorized", b"{}".to_vec()).await;
        let err = transport()
            .send(ApiRequest::get(format!("{base}/x")))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::Unauthorized);
    }

    #[tokio::test]
    async fn invalid_url_never_hits_the_network() {
        let err = transport()
            .send(ApiRequest::get("ftp://example.test/file"))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::InvalidUrl);
    }

    #[tokio::test]
    async fn refused_connection_is_server_unavailable() {
        // Bind then drop so the port is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport()
            .send(ApiRequest::get(format!("http://{addr}/")))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::ServerUnavailable);
    }

    #[tokio::test]
    async fn cancel_all_aborts_in_flight_only() {
        let hung = serve_hung().await;
        let t = Arc::new(transport());

        let pending = {
            let t = Arc::clone(&t);
            tokio::spawn(async move { t.send(ApiRequest::get(format!("{hung}/slow"))).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        t.cancel_all();

        let result = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("cancel should resolve the request")
            .unwrap();
        assert_eq!(result.unwrap_err(), TransportError::Cancelled);

        // A request started after the cancel is unaffected.
        let base = serve("200 OK", b"{}".to_vec()).await;
        assert!(t.send(ApiRequest::get(format!("{base}/"))).await.is_ok());
    }

    #[test]
    fn retryable_classification() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::ServerError { status: 502 }.is_retryable());
        assert!(!TransportError::ServerError { status: 400 }.is_retryable());
        assert!(!TransportError::Unauthorized.is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }

    #[test]
    fn messages_are_human_readable() {
        let err = TransportError::GenerationRateLimitExceeded {
            retry_after: Some(Duration::from_secs(42)),
        };
        assert_eq!(
            err.to_string(),
            "Generation rate limit exceeded. Try again in 42 seconds."
        );

        let fields = BTreeMap::from([("speed".to_string(), "too fast".to_string())]);
        assert_eq!(
            TransportError::Validation { fields }.to_string(),
            "Validation error: speed: too fast"
        );
    }

    #[tokio::test]
    async fn pinned_transport_builds_from_defaults() {
        let pins = crate::security::PinSet::from_config(&crate::config::PinningConfig::default())
            .unwrap();
        let t = SecureTransport::new(&ApiConfig::default(), Arc::new(KeyPinner::new(pins)));
        assert!(t.is_ok());
    }
}
