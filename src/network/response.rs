//! Successful responses and the HTTP status → [`TransportError`] mapping.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::transport::TransportError;

// ---------------------------------------------------------------------------
// ApiResponse
// ---------------------------------------------------------------------------

/// A response whose status already passed [`check_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::Decoding(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Error bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FieldDetail {
    field: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct NestedError {
    message: String,
    code: Option<String>,
}

/// The two error body shapes we understand: the flat
/// `{error, code, details, retry_after}` form and OpenAI's
/// `{error: {message, code}}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireError {
    Flat {
        error: String,
        code: Option<String>,
        #[serde(default)]
        details: Vec<FieldDetail>,
        retry_after: Option<f64>,
    },
    Nested {
        error: NestedError,
    },
}

/// Normalized error body.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorBody {
    pub message: String,
    pub code: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub retry_after: Option<Duration>,
}

/// Parse an error body; `None` if it matches neither known shape.
pub fn parse_error_body(body: &[u8]) -> Option<ErrorBody> {
    let wire: WireError = serde_json::from_slice(body).ok()?;
    Some(match wire {
        WireError::Flat {
            error,
            code,
            details,
            retry_after,
        } => ErrorBody {
            message: error,
            code,
            fields: details.into_iter().map(|d| (d.field, d.message)).collect(),
            retry_after: retry_after.and_then(|s| Duration::try_from_secs_f64(s).ok()),
        },
        WireError::Nested { error } => ErrorBody {
            message: error.message,
            code: error.code,
            ..ErrorBody::default()
        },
    })
}

/// `Retry-After` header in its delta-seconds form.  HTTP dates are ignored.
pub fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

// ---------------------------------------------------------------------------
// Status mapping
// ---------------------------------------------------------------------------

/// Map a response status (plus body and `Retry-After` header) to success or
/// a typed error.
pub fn check_status(
    status: u16,
    retry_after_header: Option<&str>,
    body: &[u8],
) -> Result<(), TransportError> {
    match status {
        200..=299 => Ok(()),
        400 => match parse_error_body(body) {
            Some(err) if err.code.as_deref() == Some("VALIDATION_ERROR") => {
                Err(TransportError::Validation { fields: err.fields })
            }
            Some(err) => Err(TransportError::Api {
                message: err.message,
                code: err.code,
            }),
            None => Err(TransportError::ServerError { status }),
        },
        401 => Err(TransportError::Unauthorized),
        403 => Err(TransportError::Forbidden),
        404 => Err(TransportError::NotFound),
        429 => {
            let parsed = parse_error_body(body);
            match parsed.as_ref().and_then(|e| e.code.as_deref()) {
                Some("RATE_LIMIT_EXCEEDED") => Err(TransportError::RateLimitExceeded {
                    retry_after: parsed.and_then(|e| e.retry_after),
                }),
                Some("GENERATION_RATE_LIMIT_EXCEEDED") => {
                    Err(TransportError::GenerationRateLimitExceeded {
                        retry_after: parsed.and_then(|e| e.retry_after),
                    })
                }
                _ => Err(TransportError::RateLimitExceeded {
                    retry_after: retry_after_header.and_then(parse_retry_after_header),
                }),
            }
        }
        _ => Err(TransportError::ServerError { status }),
    }
}
