//! Outgoing request descriptions.
//!
//! An [`ApiRequest`] is plain data; the transport turns it into a reqwest
//! call.  [`SpeechRequest`] is the one payload the app actually sends.

use serde::Serialize;

use super::transport::TransportError;
use crate::models::GenerationConfig;

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

// ---------------------------------------------------------------------------
// URL validation
// ---------------------------------------------------------------------------

/// Parse `url`, accepting only `http`/`https` URLs that name a host.
pub fn validate_url(url: &str) -> Result<reqwest::Url, TransportError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| TransportError::InvalidUrl)?;
    let scheme_ok = matches!(parsed.scheme(), "http" | "https");
    let has_host = parsed.host_str().is_some_and(|h| !h.is_empty());
    if !scheme_ok || !has_host {
        log::error!("rejected URL with scheme {:?}", parsed.scheme());
        return Err(TransportError::InvalidUrl);
    }
    Ok(parsed)
}

/// `base` + `endpoint`, tolerating a trailing slash on `base`.
pub fn join_endpoint(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

// ---------------------------------------------------------------------------
// ApiRequest
// ---------------------------------------------------------------------------

/// A fully described HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// POST with `body` serialized as JSON.
    pub fn post_json<T: Serialize + ?Sized>(
        url: impl Into<String>,
        body: &T,
    ) -> Result<Self, TransportError> {
        let bytes =
            serde_json::to_vec(body).map_err(|e| TransportError::Encoding(e.to_string()))?;
        Ok(Self {
            body: Some(bytes),
            ..Self::new(HttpMethod::Post, url)
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Host part of the URL, for log lines.
    pub fn host(&self) -> String {
        reqwest::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .unwrap_or_else(|| "unknown".into())
    }
}

// ---------------------------------------------------------------------------
// SpeechRequest
// ---------------------------------------------------------------------------

/// JSON body of `POST /audio/speech`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    pub response_format: String,
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl SpeechRequest {
    pub const ENDPOINT: &'static str = "/audio/speech";

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            model: config.model().to_string(),
            input: config.input().to_string(),
            voice: config.voice().to_string(),
            response_format: config.response_format().to_string(),
            speed: config.speed(),
            instructions: config
                .instructions()
                .filter(|s| !s.is_empty())
                .map(str::to_owned),
        }
    }

    /// Build the authenticated request against `base_url`.
    pub fn into_api_request(
        self,
        base_url: &str,
        api_key: &str,
    ) -> Result<ApiRequest, TransportError> {
        let url = join_endpoint(base_url, Self::ENDPOINT);
        Ok(ApiRequest::post_json(url, &self)?.with_bearer(api_key))
    }
}
