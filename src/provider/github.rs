//! GitHub `meta` endpoint.

use serde_json::Value;

use super::{fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, PrefixList};
use crate::error::{Error, Result};
use crate::http::{HeaderMap, HeaderValue, HttpClient, Method, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;

pub const DOWNLOAD_URL: &str = "https://api.github.com/meta";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "github",
    full_name: "GitHub",
    category: HostCategory::Other,
    source_url: "https://docs.github.com/en/authentication/keeping-your-account-and-data-secure/about-githubs-ip-addresses",
    download_url: DOWNLOAD_URL,
    default_format: Format::Raw,
    filename: Some("github.json"),
};

pub struct GitHub {
    client: HttpClient,
    url: String,
}

impl GitHub {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            url: DOWNLOAD_URL.to_string(),
        }
    }
}

impl Provider for GitHub {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("application/vnd.github+json"));
        let timeout = self.client.config().timeout;
        self.client
            .request(&self.url, Method::Get, &headers, &[], timeout)?
            .error_for_status(&self.url)
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::Prefixes)
    }
}

/// Flatten every array of prefix strings, in key order.
///
/// Arrays holding anything other than prefixes (SSH keys, domains) and
/// non-array values are ignored.
pub fn process(bytes: &[u8]) -> Result<PrefixList> {
    let meta: Value = serde_json::from_slice(bytes).map_err(|e| Error::parse("github meta", e))?;
    let object = meta
        .as_object()
        .ok_or_else(|| Error::parse("github meta", "expected a JSON object"))?;

    let mut prefixes = Vec::new();
    for (key, value) in object {
        let Some(items) = value.as_array() else {
            continue;
        };
        let parsed: Vec<Option<Prefix>> = items
            .iter()
            .map(|item| item.as_str().and_then(|s| s.parse().ok()))
            .collect();
        // A key is a prefix list when any of its elements parses
        if !items.is_empty() && parsed.iter().all(Option::is_none) {
            log::debug!("Ignoring non-prefix GitHub meta key {}", key);
            continue;
        }
        for (item, prefix) in items.iter().zip(parsed) {
            match prefix {
                Some(prefix) => prefixes.push(prefix),
                None => log::warn!("Skipping unparseable GitHub meta entry {}: {}", key, item),
            }
        }
    }

    Ok(PrefixList::new(prefixes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_in_key_order() {
        let list = process(crate::fixtures::GITHUB).unwrap();
        let rendered: Vec<String> = list.prefixes.iter().map(|p| p.to_string()).collect();
        assert_eq!(
            rendered,
            vec![
                "192.30.252.0/22",
                "2a0a:a440::/29",
                "140.82.112.0/20",
                "143.55.64.0/20",
                "192.30.252.0/22"
            ]
        );
    }

    #[test]
    fn test_bad_entry_keeps_rest_of_key() {
        let body = br#"{
            "hooks": ["192.30.252.0/22", "10.0.0.1/8", 7],
            "ssh_keys": ["ssh-ed25519 AAAAC3NzaC1lZDI1NTE5"],
            "domains": {"website": ["*.github.com"]},
            "web": ["140.82.112.0/20"]
        }"#;
        let list = process(body).unwrap();
        let rendered: Vec<String> = list.prefixes.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["192.30.252.0/22", "140.82.112.0/20"]);
    }

    #[test]
    fn test_malformed() {
        assert!(process(b"").is_err());
        assert!(process(b"[\"10.0.0.0/8\"]").is_err());
        assert!(process(b"{\"hooks\": [").is_err());
        assert!(process(b"{}").unwrap().prefixes.is_empty());
    }
}
