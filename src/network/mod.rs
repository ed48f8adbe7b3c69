//! Network layer: pinned HTTPS transport and client-side rate limiting.
//!
//! # Modules
//! * [`request`]   : [`ApiRequest`], [`SpeechRequest`], URL validation.
//! * [`response`]  : [`ApiResponse`] and the status → error mapping.
//! * [`transport`] : [`Transport`] trait, [`SecureTransport`], [`TransportError`].
//! * [`rate_limit`]: [`RateLimiter`], the two-tier sliding window.

pub mod rate_limit;
pub mod request;
pub mod response;
pub mod transport;

pub use rate_limit::{Admission, RateLimiter};
pub use request::{join_endpoint, validate_url, ApiRequest, HttpMethod, SpeechRequest};
pub use response::{check_status, parse_error_body, ApiResponse, ErrorBody};
pub use transport::{send_json, SecureTransport, Transport, TransportError, TransportSetupError};
