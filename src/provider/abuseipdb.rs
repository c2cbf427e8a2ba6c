//! AbuseIPDB blacklist API.
//!
//! Requires an API key, sent in the `Key` header and masked in every
//! diagnostic. The free tier allows a handful of calls per day; a 429 is
//! surfaced as a quota error and never retried.

use serde::Deserialize;

use super::{fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, Record, TimestampedList};
use crate::error::{Error, Result};
use crate::http::{mask_secrets, HeaderMap, HeaderValue, HttpClient, Method, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;
use crate::timestamp::parse_offset;

pub const DOWNLOAD_URL: &str = "https://api.abuseipdb.com/api/v2/blacklist";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "abuseipdb",
    full_name: "AbuseIPDB",
    category: HostCategory::Security,
    source_url: "https://docs.abuseipdb.com/#blacklist-endpoint",
    download_url: DOWNLOAD_URL,
    default_format: Format::Raw,
    filename: Some("abuseipdb.json"),
};

#[derive(Debug, Clone, Default)]
pub struct AbuseIpDbConfig {
    pub api_key: String,
    /// `confidenceMinimum`; zero leaves it to the API default
    pub confidence_minimum: u8,
    /// `limit`; zero leaves it to the API default
    pub limit: u32,
    pub url: Option<String>,
}

impl AbuseIpDbConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Request URL with the nonzero query parameters attached.
    pub fn request_url(&self) -> String {
        let base = self.url.as_deref().unwrap_or(DOWNLOAD_URL);
        let mut params = Vec::new();
        if self.confidence_minimum > 0 {
            params.push(format!("confidenceMinimum={}", self.confidence_minimum));
        }
        if self.limit > 0 {
            params.push(format!("limit={}", self.limit));
        }
        if params.is_empty() {
            return base.to_string();
        }
        let separator = if base.contains('?') { '&' } else { '?' };
        format!("{}{}{}", base, separator, params.join("&"))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blacklist {
    meta: Meta,
    #[serde(default)]
    data: Vec<Entry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    generated_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    ip_address: String,
    country_code: Option<String>,
    abuse_confidence_score: Option<u8>,
    last_reported_at: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    errors: Vec<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    detail: String,
    status: Option<u16>,
}

pub struct AbuseIpDb {
    client: HttpClient,
    config: AbuseIpDbConfig,
}

impl AbuseIpDb {
    pub fn new(client: HttpClient, config: AbuseIpDbConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(Error::Config("an AbuseIPDB API key is required".to_string()));
        }
        Ok(Self { client, config })
    }
}

impl Provider for AbuseIpDb {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        let secrets = [self.config.api_key.as_str()];
        let url = self.config.request_url();

        let mut headers = HeaderMap::new();
        headers.insert(
            "key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|_| Error::Config("API key is not a valid header value".to_string()))?,
        );
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let timeout = self.client.config().timeout;
        let response = self.client.request(&url, Method::Get, &headers, &secrets, timeout)?;
        if response.status >= 400 {
            return Err(match parse_error_envelope(&response.body) {
                Some(detail) => Error::Api {
                    status: response.status,
                    detail: mask_secrets(&detail, &secrets),
                },
                None => Error::Status {
                    status: response.status,
                    url: mask_secrets(&url, &secrets),
                },
            });
        }
        response.error_for_status(&mask_secrets(&url, &secrets))
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::Timestamped)
    }
}

/// Diagnostic from an `{"errors": [{"detail", "status"}]}` body.
///
/// Uses the first error; further errors are noted by count.
pub fn parse_error_envelope(bytes: &[u8]) -> Option<String> {
    let envelope: ErrorEnvelope = serde_json::from_slice(bytes).ok()?;
    let first = envelope.errors.first()?;
    let mut message = match first.status {
        Some(status) => format!("{} (status {})", first.detail, status),
        None => first.detail.clone(),
    };
    if envelope.errors.len() > 1 {
        message.push_str(&format!(" (+{} more errors)", envelope.errors.len() - 1));
    }
    Some(message)
}

pub fn process(bytes: &[u8]) -> Result<TimestampedList> {
    let blacklist: Blacklist = serde_json::from_slice(bytes).map_err(|e| Error::parse("abuseipdb blacklist", e))?;
    let timestamp = parse_offset(&blacklist.meta.generated_at)?;

    let mut records = Vec::with_capacity(blacklist.data.len());
    for entry in blacklist.data {
        let mut record = Record::new(entry.ip_address.parse::<Prefix>()?);
        record.country = entry.country_code;
        record.confidence = entry.abuse_confidence_score;
        record.last_reported = entry.last_reported_at.as_deref().map(parse_offset).transpose()?;
        records.push(record);
    }

    Ok(TimestampedList {
        timestamp,
        sync_token: None,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{mock_client, ok};

    #[test]
    fn test_process_blacklist() {
        let list = process(crate::fixtures::ABUSEIPDB).unwrap();
        assert_eq!(list.timestamp.to_rfc3339(), "2022-07-06T21:18:45+00:00");
        assert_eq!(list.records.len(), 1);
        let r = &list.records[0];
        assert_eq!(r.prefix.to_string(), "104.255.199.22/32");
        assert_eq!(r.country.as_deref(), Some("US"));
        assert_eq!(r.confidence, Some(100));
        assert_eq!(r.last_reported.unwrap().to_rfc3339(), "2022-07-06T21:17:02+00:00");
    }

    #[test]
    fn test_request_url_params() {
        let mut config = AbuseIpDbConfig::new("k");
        assert_eq!(config.request_url(), DOWNLOAD_URL);
        config.confidence_minimum = 90;
        config.limit = 1000;
        assert_eq!(
            config.request_url(),
            format!("{}?confidenceMinimum=90&limit=1000", DOWNLOAD_URL)
        );
        config.confidence_minimum = 0;
        assert_eq!(config.request_url(), format!("{}?limit=1000", DOWNLOAD_URL));
    }

    #[test]
    fn test_error_envelope() {
        let one = parse_error_envelope(crate::fixtures::ABUSEIPDB_ERROR).unwrap();
        assert!(one.starts_with("Authentication failed."));
        assert!(one.ends_with("(status 401)"));

        let two = br#"{"errors":[{"detail":"a","status":422},{"detail":"b","status":422}]}"#;
        assert_eq!(parse_error_envelope(two).unwrap(), "a (status 422) (+1 more errors)");
        assert!(parse_error_envelope(b"{}").is_none());
        assert!(parse_error_envelope(br#"{"errors": []}"#).is_none());
    }

    #[test]
    fn test_fetch_sends_key_and_parses_api_error() {
        let (mock, client) = mock_client();
        mock.route(DOWNLOAD_URL, RawResponse::new(401, crate::fixtures::ABUSEIPDB_ERROR.to_vec()));

        let provider = AbuseIpDb::new(client, AbuseIpDbConfig::new("test-key")).unwrap();
        match provider.fetch() {
            Err(Error::Api { status, detail }) => {
                assert_eq!(status, 401);
                assert!(!detail.contains("test-key"));
            }
            other => panic!("unexpected {:?}", other),
        }
        let request = &mock.requests()[0];
        assert_eq!(request.headers.get("key").unwrap(), "test-key");
        assert_eq!(request.headers.get("accept").unwrap(), "application/json");
    }

    #[test]
    fn test_quota_not_retried() {
        let (mock, client) = mock_client();
        mock.route(DOWNLOAD_URL, RawResponse::new(429, "slow down"));
        let provider = AbuseIpDb::new(client, AbuseIpDbConfig::new("test-key")).unwrap();
        assert!(provider.fetch().unwrap_err().is_quota());
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_fetch_ok() {
        let (mock, client) = mock_client();
        mock.route(DOWNLOAD_URL, ok(crate::fixtures::ABUSEIPDB));
        let provider = AbuseIpDb::new(client, AbuseIpDbConfig::new("test-key")).unwrap();
        let document = provider.fetch().unwrap();
        assert_eq!(document.raw.as_deref(), Some(crate::fixtures::ABUSEIPDB));
    }

    #[test]
    fn test_key_required() {
        let (_, client) = mock_client();
        assert!(matches!(
            AbuseIpDb::new(client, AbuseIpDbConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_malformed() {
        assert!(process(b"").is_err());
        assert!(process(br#"{"meta": {"generatedAt": "2022-07-06T21:18:45Z"}, "data": []}"#).is_err());
        assert!(process(br#"{"meta": {"generatedAt": "2022-07-06T21:18:45+00:00"}, "data": [{"ipAddress": "x"}]}"#).is_err());
    }
}
