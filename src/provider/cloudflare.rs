//! Cloudflare publishes one plain-text list per address family.

use super::lines::{parse_lines, LineMode};
use super::{fetch_ok, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, PrefixList};
use crate::error::Result;
use crate::http::{HttpClient, RawResponse};
use crate::render::Format;

pub const IPV4_URL: &str = "https://www.cloudflare.com/ips-v4";
pub const IPV6_URL: &str = "https://www.cloudflare.com/ips-v6";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "cloudflare",
    full_name: "Cloudflare",
    category: HostCategory::Cdn,
    source_url: "https://www.cloudflare.com/ips/",
    download_url: IPV4_URL,
    default_format: Format::Lines,
    filename: Some("cloudflare.txt"),
};

/// Family selection. Neither flag set means both families.
#[derive(Debug, Clone, Default)]
pub struct CloudflareConfig {
    pub ipv4: bool,
    pub ipv6: bool,
    pub mode: LineMode,
    pub ipv4_url: Option<String>,
    pub ipv6_url: Option<String>,
}

impl CloudflareConfig {
    fn urls(&self) -> Vec<&str> {
        let both = self.ipv4 == self.ipv6;
        let mut urls = Vec::with_capacity(2);
        if both || self.ipv4 {
            urls.push(self.ipv4_url.as_deref().unwrap_or(IPV4_URL));
        }
        if both || self.ipv6 {
            urls.push(self.ipv6_url.as_deref().unwrap_or(IPV6_URL));
        }
        urls
    }
}

pub struct Cloudflare {
    client: HttpClient,
    config: CloudflareConfig,
}

impl Cloudflare {
    pub fn new(client: HttpClient, config: CloudflareConfig) -> Self {
        Self { client, config }
    }
}

impl Provider for Cloudflare {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    /// Bodies of the selected lists joined in IPv4, IPv6 order.
    fn fetch_raw(&self) -> Result<RawResponse> {
        let mut combined: Option<RawResponse> = None;
        for url in self.config.urls() {
            let response = fetch_ok(&self.client, url, &[])?;
            combined = Some(match combined {
                None => response,
                Some(mut acc) => {
                    if !acc.body.is_empty() && !acc.body.ends_with(b"\n") {
                        acc.body.push(b'\n');
                    }
                    acc.body.extend_from_slice(&response.body);
                    acc
                }
            });
        }
        // urls() always yields at least one entry
        Ok(combined.unwrap_or_else(|| RawResponse::new(200, Vec::new())))
    }

    fn fetch(&self) -> Result<Document> {
        let raw = self.fetch_raw()?;
        let prefixes = process(&raw.body, self.config.mode)?;
        log::info!("Fetched {} Cloudflare prefixes", prefixes.prefixes.len());
        Ok(Document::new(Doc::Prefixes(prefixes), Some(raw.body)))
    }
}

pub fn process(bytes: &[u8], mode: LineMode) -> Result<PrefixList> {
    Ok(PrefixList::new(parse_lines(bytes, mode)?))
}
