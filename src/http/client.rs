//! Retrying HTTP client shared by every provider.

use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::disposition::parse_content_disposition;
use super::mask::mask_secrets;
use super::transport::{Method, RawResponse, ReqwestTransport, Request, Transport};
use crate::config::HttpConfig;
use crate::error::{Error, Result};

/// HTTP client with uniform retry, timeout, decoding and masking rules.
///
/// Cloning is cheap; clones share the transport and its connection pool.
#[derive(Clone)]
pub struct HttpClient {
    transport: Arc<dyn Transport>,
    config: HttpConfig,
}

impl HttpClient {
    /// Create a client backed by the network.
    pub fn new(config: HttpConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    /// Create a client over a caller-supplied transport.
    pub fn with_transport(transport: Arc<dyn Transport>, config: HttpConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// GET with no extra headers and the configured timeout.
    pub fn get(&self, url: &str, secrets: &[&str]) -> Result<RawResponse> {
        self.request(url, Method::Get, &HeaderMap::new(), secrets, self.config.timeout)
    }

    /// Perform a request.
    ///
    /// A zero `timeout` applies no deadline. Transport failures and 5xx
    /// statuses other than 501 are retried; 429 fails immediately with
    /// [`Error::Quota`]. A GET that succeeds with an empty body is an
    /// [`Error::EmptyBody`]. Statuses below 500 are otherwise returned to the
    /// caller, which decides how to read them.
    pub fn request(
        &self,
        url: &str,
        method: Method,
        headers: &HeaderMap,
        secrets: &[&str],
        timeout: Duration,
    ) -> Result<RawResponse> {
        let masked_url = mask_secrets(url, secrets);
        check_scheme(url, &masked_url)?;

        let mut request_headers = headers.clone();
        if !request_headers.contains_key(ACCEPT_ENCODING) {
            request_headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        }
        let request = Request {
            method,
            url: url.to_string(),
            headers: request_headers,
            timeout: if timeout.is_zero() { None } else { Some(timeout) },
        };

        let attempts = self.config.retry_max + 1;
        let mut last_failure = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let wait = self.config.backoff(attempt - 1);
                log::debug!(
                    "{} {} retrying in {:?} (attempt {}/{})",
                    method,
                    masked_url,
                    wait,
                    attempt + 1,
                    attempts
                );
                thread::sleep(wait);
            }

            log::debug!("{} {}", method, masked_url);
            let response = match self.transport.execute(&request) {
                Ok(response) => response,
                Err(e) => {
                    let message = mask_secrets(&e.to_string(), secrets);
                    if !e.is_retryable() {
                        return Err(Error::Transport(format!("{} {}: {}", method, masked_url, message)));
                    }
                    log::warn!("{} {} failed: {}", method, masked_url, message);
                    last_failure = message;
                    continue;
                }
            };

            if response.status == 429 {
                return Err(Error::Quota(format!(
                    "{} {} returned 429 Too Many Requests",
                    method, masked_url
                )));
            }

            if response.status >= 500 && response.status != 501 {
                log::warn!("{} {} returned status {}", method, masked_url, response.status);
                last_failure = format!("status {}", response.status);
                continue;
            }

            return finish(response, method, &masked_url);
        }

        Err(Error::Transport(format!(
            "{} {} giving up after {} attempt(s): {}",
            method, masked_url, attempts, last_failure
        )))
    }

    /// Download `url` to `path`.
    ///
    /// When `path` is an existing directory the file is named after the last
    /// segment of the URL path. Otherwise `path` is the file itself and its
    /// parent directory must already exist. The file is written atomically.
    pub fn download_file(&self, url: &str, path: &Path, secrets: &[&str]) -> Result<PathBuf> {
        let masked_url = mask_secrets(url, secrets);
        let target = resolve_download_path(url, path).map_err(|e| match e {
            Error::Config(msg) => Error::Config(mask_secrets(&msg, secrets)),
            other => other,
        })?;

        let response = self
            .request(url, Method::Get, &HeaderMap::new(), secrets, self.config.timeout)?
            .error_for_status(&masked_url)?;

        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&response.body)?;
        tmp.flush()?;
        tmp.persist(&target).map_err(|e| Error::Io(e.error))?;

        log::info!(
            "Downloaded {} to {} ({} bytes)",
            masked_url,
            target.display(),
            response.body.len()
        );
        Ok(target)
    }

    /// One-shot request returning a single header value.
    pub fn resource_header(&self, url: &str, method: Method, name: &str, secrets: &[&str]) -> Result<String> {
        let masked_url = mask_secrets(url, secrets);
        let response = self
            .request(url, method, &HeaderMap::new(), secrets, self.config.timeout)?
            .error_for_status(&masked_url)?;

        response
            .header(name)
            .map(str::to_string)
            .ok_or_else(|| Error::Parse(format!("header {} missing from {} {}", name, method, masked_url)))
    }

    /// Issue a HEAD and return the `filename` parameter of `Content-Disposition`.
    pub fn content_disposition_filename(&self, url: &str, secrets: &[&str]) -> Result<String> {
        let value = self.resource_header(url, Method::Head, "content-disposition", secrets)?;
        let disposition = parse_content_disposition(&value)?;
        disposition
            .filename()
            .map(str::to_string)
            .ok_or_else(|| Error::Parse(format!("no filename in content-disposition {:?}", value)))
    }
}

/// Decode and validate a response that will not be retried.
fn finish(mut response: RawResponse, method: Method, masked_url: &str) -> Result<RawResponse> {
    let gzipped = response
        .header_values(CONTENT_ENCODING.as_str())
        .iter()
        .any(|v| v.trim().eq_ignore_ascii_case("gzip"));

    if gzipped && !response.body.is_empty() {
        let mut decoded = Vec::new();
        GzDecoder::new(&response.body[..])
            .read_to_end(&mut decoded)
            .map_err(|e| Error::Transport(format!("{} {}: gzip decoding failed: {}", method, masked_url, e)))?;
        response.body = decoded;
        response.headers.remove(CONTENT_ENCODING);
        response.headers.remove(CONTENT_LENGTH);
    }

    if method == Method::Get && response.body.is_empty() && response.status < 400 {
        return Err(Error::EmptyBody {
            status: response.status,
        });
    }

    Ok(response)
}

fn check_scheme(url: &str, masked_url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Transport(format!("invalid URL {}: {}", masked_url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Transport(format!(
            "unsupported protocol scheme {:?} in {}",
            other, masked_url
        ))),
    }
}

/// Decide where [`HttpClient::download_file`] writes.
pub fn resolve_download_path(url: &str, path: &Path) -> Result<PathBuf> {
    if path.is_dir() {
        let name = url_basename(url)
            .ok_or_else(|| Error::Config(format!("cannot derive a file name from {}", url)))?;
        return Ok(path.join(name));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(Error::Config(format!(
            "parent directory {} does not exist",
            parent.display()
        )));
    }
    Ok(path.to_path_buf())
}

fn url_basename(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::http::{MockReply, MockTransport};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;

    fn client(mock: &Arc<MockTransport>) -> HttpClient {
        HttpClient::with_transport(mock.clone(), HttpConfig::default().with_retry_wait(Duration::ZERO, Duration::ZERO))
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_get_returns_body() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/ips", RawResponse::new(200, "10.0.0.0/8\n"));

        let resp = client(&mock).get("https://example.com/ips", &[]).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, b"10.0.0.0/8\n");
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_gzip_is_decoded() {
        let mock = Arc::new(MockTransport::new());
        let mut resp = RawResponse::new(200, gzip(b"hello world"));
        resp.headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        mock.route("https://example.com/gz", resp);

        let resp = client(&mock).get("https://example.com/gz", &[]).unwrap();
        assert_eq!(resp.body, b"hello world");
        assert!(resp.header("content-encoding").is_none());
    }

    #[test]
    fn test_accept_encoding_sent() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/x", RawResponse::new(200, "x"));
        client(&mock).get("https://example.com/x", &[]).unwrap();
        let sent = mock.requests();
        assert_eq!(sent[0].headers.get(ACCEPT_ENCODING).unwrap(), "gzip");
    }

    #[test]
    fn test_429_is_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/q", RawResponse::new(429, "slow down"));

        let err = client(&mock).get("https://example.com/q", &[]).unwrap_err();
        assert!(err.is_quota());
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_5xx_is_retried_then_succeeds() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/r", RawResponse::new(503, "busy"));
        mock.route("https://example.com/r", RawResponse::new(200, "ok"));

        let resp = client(&mock).get("https://example.com/r", &[]).unwrap();
        assert_eq!(resp.body, b"ok");
        assert_eq!(mock.request_count(), 2);
    }

    #[test]
    fn test_5xx_gives_up_after_retry_max() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/down", RawResponse::new(502, "bad gateway"));

        let err = client(&mock).get("https://example.com/down", &[]).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        // default retry_max = 2, so three attempts in total
        assert_eq!(mock.request_count(), 3);
    }

    #[test]
    fn test_501_is_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/ni", RawResponse::new(501, "nope"));

        let resp = client(&mock).get("https://example.com/ni", &[]).unwrap();
        assert_eq!(resp.status, 501);
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_tls_error_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.route_reply(
            "https://example.com/tls",
            MockReply::Error(TransportError::Tls("unknown issuer".into())),
        );

        let err = client(&mock).get("https://example.com/tls", &[]).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_redirect_loop_not_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.route_reply(
            "https://example.com/loop",
            MockReply::Error(TransportError::RedirectLoop("revisited a URL".into())),
        );

        let err = client(&mock).get("https://example.com/loop", &[]).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("redirect loop"));
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_zero_timeout_means_no_deadline() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/t", RawResponse::new(200, "ok"));
        let client = client(&mock);

        client
            .request("https://example.com/t", Method::Get, &HeaderMap::new(), &[], Duration::ZERO)
            .unwrap();
        client
            .request("https://example.com/t", Method::Get, &HeaderMap::new(), &[], Duration::from_secs(7))
            .unwrap();

        let sent = mock.requests();
        assert_eq!(sent[0].timeout, None);
        assert_eq!(sent[1].timeout, Some(Duration::from_secs(7)));
    }

    #[test]
    fn test_network_error_retried() {
        let mock = Arc::new(MockTransport::new());
        mock.route_reply(
            "https://example.com/flaky",
            MockReply::Error(TransportError::Connect("connection reset".into())),
        );
        mock.route("https://example.com/flaky", RawResponse::new(200, "ok"));

        let resp = client(&mock).get("https://example.com/flaky", &[]).unwrap();
        assert_eq!(resp.body, b"ok");
        assert_eq!(mock.request_count(), 2);
    }

    #[test]
    fn test_unsupported_scheme() {
        let mock = Arc::new(MockTransport::new());
        let err = client(&mock).get("ftp://example.com/file", &[]).unwrap_err();
        assert!(err.to_string().contains("unsupported protocol scheme"));
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_empty_body_with_success_status() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/empty", RawResponse::new(200, ""));

        match client(&mock).get("https://example.com/empty", &[]) {
            Err(Error::EmptyBody { status }) => assert_eq!(status, 200),
            other => panic!("unexpected: {:?}", other.map(|r| r.status)),
        }
    }

    #[test]
    fn test_secrets_masked_in_errors() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/dl?key=s3cr3t", RawResponse::new(503, ""));

        let err = client(&mock)
            .get("https://example.com/dl?key=s3cr3t", &["s3cr3t"])
            .unwrap_err();
        let message = err.to_string();
        assert!(!message.contains("s3cr3t"));
        assert!(message.contains("key=******"));
    }

    #[test]
    fn test_content_disposition_filename() {
        let mock = Arc::new(MockTransport::new());
        let mut resp = RawResponse::new(200, "");
        resp.headers.insert(
            "content-disposition",
            HeaderValue::from_static("attachment; filename=GeoLite2-ASN-CSV_20220705.zip"),
        );
        mock.route("https://example.com/db?key=k", resp);

        let name = client(&mock)
            .content_disposition_filename("https://example.com/db?key=k", &["k"])
            .unwrap();
        assert_eq!(name, "GeoLite2-ASN-CSV_20220705.zip");
        assert_eq!(mock.requests()[0].method, Method::Head);
    }

    #[test]
    fn test_content_disposition_missing() {
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/none", RawResponse::new(200, ""));
        assert!(client(&mock)
            .content_disposition_filename("https://example.com/none", &[])
            .is_err());
    }

    #[test]
    fn test_download_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/files/ranges.json", RawResponse::new(200, "{}"));

        let path = client(&mock)
            .download_file("https://example.com/files/ranges.json", dir.path(), &[])
            .unwrap();
        assert_eq!(path, dir.path().join("ranges.json"));
        assert_eq!(fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn test_download_to_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("custom.json");
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/files/ranges.json", RawResponse::new(200, "[]"));

        let path = client(&mock)
            .download_file("https://example.com/files/ranges.json", &target, &[])
            .unwrap();
        assert_eq!(path, target);
        assert_eq!(fs::read(&target).unwrap(), b"[]");
    }

    #[test]
    fn test_download_missing_parent_fails_without_request() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("out.json");
        let mock = Arc::new(MockTransport::new());
        mock.route("https://example.com/out.json", RawResponse::new(200, "[]"));

        assert!(client(&mock)
            .download_file("https://example.com/out.json", &target, &[])
            .is_err());
        assert!(!target.exists());
        assert!(!dir.path().join("missing").exists());
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn test_resolve_download_path_rules() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            resolve_download_path("https://h/a/b/file.zip?x=1", dir.path()).unwrap(),
            dir.path().join("file.zip")
        );
        assert!(resolve_download_path("https://h/", dir.path()).is_err());
    }
}
