//! The network seam: one request in, one fully-read response out.

use reqwest::header::{HeaderMap, AUTHORIZATION, COOKIE, LOCATION, PROXY_AUTHORIZATION};
use reqwest::Url;
use std::collections::HashSet;
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::error::{Error, Result, TransportError};

/// HTTP method supported by the access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outgoing request.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    /// `None` means no deadline.
    pub timeout: Option<Duration>,
}

/// Bytes, headers and status of a completed request.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of a header, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// All values of a header in received order.
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Turn a non-2xx status into [`Error::Status`]. `url` must already be masked.
    pub fn error_for_status(self, url: &str) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Status {
                status: self.status,
                url: url.to_string(),
            })
        }
    }

    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.body).map_err(|e| Error::parse("response body", e))
    }
}

/// Executes requests. Implementations must read the whole body before returning.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &Request) -> std::result::Result<RawResponse, TransportError>;
}

/// Maximum redirect hops followed for one request.
pub const MAX_REDIRECTS: usize = 10;

/// Credential headers dropped when a redirect leaves the original origin.
const CREDENTIAL_HEADERS: [&str; 4] = ["authorization", "cookie", "proxy-authorization", "key"];

/// Transport backed by a blocking `reqwest` client.
///
/// Content decoding is left to [`super::HttpClient`]; the client here never
/// asks reqwest to decompress. Redirects are followed here rather than by
/// reqwest, whose redirect handler logs the requesting URL verbatim. reqwest
/// still logs each `Location` target at debug level under the `reqwest`
/// target; the CLI caps that target at warn.
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(None::<Duration>)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl ReqwestTransport {
    fn send(
        &self,
        method: Method,
        url: &str,
        request: &Request,
        headers: &HeaderMap,
    ) -> std::result::Result<RawResponse, TransportError> {
        let mut builder = match method {
            Method::Get => self.client.get(url),
            Method::Head => self.client.head(url),
        };
        builder = builder.headers(headers.clone());
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().map_err(classify)?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: &Request) -> std::result::Result<RawResponse, TransportError> {
        let mut url = Url::parse(&request.url)
            .map(String::from)
            .unwrap_or_else(|_| request.url.clone());
        let mut headers = request.headers.clone();
        let mut visited = HashSet::new();

        for _ in 0..=MAX_REDIRECTS {
            visited.insert(url.clone());
            let response = self.send(request.method, &url, request, &headers)?;
            let next = match redirect_target(&url, &response)? {
                Some(next) => next,
                None => return Ok(response),
            };
            if visited.contains(&next) {
                return Err(TransportError::RedirectLoop("revisited a URL".to_string()));
            }
            if !same_origin(&url, &next) {
                for name in CREDENTIAL_HEADERS {
                    headers.remove(name);
                }
            }
            url = next;
        }

        Err(TransportError::RedirectLoop(format!("stopped after {} redirects", MAX_REDIRECTS)))
    }
}

/// Resolve the `Location` of a redirect response against the request URL.
///
/// Returns `None` for anything that is not a followable redirect.
fn redirect_target(
    current: &str,
    response: &RawResponse,
) -> std::result::Result<Option<String>, TransportError> {
    if !matches!(response.status, 301 | 302 | 303 | 307 | 308) {
        return Ok(None);
    }
    let location = match response.header(LOCATION.as_str()) {
        Some(location) => location,
        None => return Ok(None),
    };
    let base = Url::parse(current).map_err(|e| TransportError::Other(format!("invalid URL: {}", e)))?;
    let next = base
        .join(location)
        .map_err(|e| TransportError::Other(format!("invalid redirect location: {}", e)))?;
    match next.scheme() {
        "http" | "https" => Ok(Some(next.to_string())),
        other => Err(TransportError::UnsupportedScheme(format!(
            "redirect to unsupported scheme {:?}",
            other
        ))),
    }
}

fn same_origin(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

/// Map a reqwest failure onto the retry classification.
fn classify(err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    let message = err.to_string();

    if err.is_timeout() {
        return TransportError::Timeout;
    }
    if err.is_redirect() {
        return TransportError::RedirectLoop(message);
    }
    if err.is_builder() {
        return TransportError::UnsupportedScheme(message);
    }
    if is_tls_failure(&err) {
        return TransportError::Tls(message);
    }
    if err.is_connect() {
        return TransportError::Connect(message);
    }
    TransportError::Other(message)
}

fn is_tls_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(e) = source {
        let text = e.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("unknownissuer") {
            return true;
        }
        source = e.source();
    }
    false
}
