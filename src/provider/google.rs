//! JSON prefix bundles in the Google layout, also used by Bingbot.
//!
//! ```json
//! {"syncToken": "1678795528178", "creationTime": "2023-03-14T12:25:28.178520",
//!  "prefixes": [{"ipv4Prefix": "34.1.208.0/20", "service": "Google Cloud", "scope": "africa-south1"}]}
//! ```

use serde::Deserialize;

use super::{fetch_ok, fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, Record, TimestampedList};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;
use crate::timestamp::parse_micros;

pub const GCP: Descriptor = Descriptor {
    short_name: "gcp",
    full_name: "Google Cloud Platform",
    category: HostCategory::Cloud,
    source_url: "https://cloud.google.com/compute/docs/faq#find_ip_range",
    download_url: "https://www.gstatic.com/ipranges/cloud.json",
    default_format: Format::Raw,
    filename: Some("gcp.json"),
};

pub const GOOGLE: Descriptor = Descriptor {
    short_name: "google",
    full_name: "Google",
    category: HostCategory::Search,
    source_url: "https://support.google.com/a/answer/10026322",
    download_url: "https://www.gstatic.com/ipranges/goog.json",
    default_format: Format::Raw,
    filename: Some("google.json"),
};

pub const GOOGLEBOT: Descriptor = Descriptor {
    short_name: "googlebot",
    full_name: "Googlebot",
    category: HostCategory::Crawlers,
    source_url: "https://developers.google.com/search/docs/crawling-indexing/verifying-googlebot",
    download_url: "https://developers.google.com/static/search/apis/ipranges/googlebot.json",
    default_format: Format::Raw,
    filename: Some("googlebot.json"),
};

pub const GOOGLESC: Descriptor = Descriptor {
    short_name: "googlesc",
    full_name: "Google Special Crawlers",
    category: HostCategory::Crawlers,
    source_url: "https://developers.google.com/search/docs/crawling-indexing/verifying-googlebot",
    download_url: "https://developers.google.com/static/search/apis/ipranges/special-crawlers.json",
    default_format: Format::Raw,
    filename: Some("googlesc.json"),
};

pub const GOOGLEUTF: Descriptor = Descriptor {
    short_name: "googleutf",
    full_name: "Google User-Triggered Fetchers",
    category: HostCategory::Crawlers,
    source_url: "https://developers.google.com/search/docs/crawling-indexing/verifying-googlebot",
    download_url: "https://developers.google.com/static/search/apis/ipranges/user-triggered-fetchers.json",
    default_format: Format::Raw,
    filename: Some("googleutf.json"),
};

pub const BINGBOT: Descriptor = Descriptor {
    short_name: "bingbot",
    full_name: "Bingbot",
    category: HostCategory::Crawlers,
    source_url: "https://www.bing.com/webmasters/help/how-to-verify-bingbot-3905dc26",
    download_url: "https://www.bing.com/toolbox/bingbot.json",
    default_format: Format::Raw,
    filename: Some("bingbot.json"),
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bundle {
    sync_token: Option<String>,
    creation_time: Option<String>,
    #[serde(default)]
    prefixes: Vec<Entry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Entry {
    ipv4_prefix: Option<String>,
    ipv6_prefix: Option<String>,
    service: Option<String>,
    scope: Option<String>,
}

/// One Google-layout feed, selected by descriptor.
pub struct GoogleFeed {
    descriptor: &'static Descriptor,
    client: HttpClient,
    url: String,
}

impl GoogleFeed {
    pub fn new(descriptor: &'static Descriptor, client: HttpClient) -> Self {
        Self {
            descriptor,
            client,
            url: descriptor.download_url.to_string(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

impl Provider for GoogleFeed {
    fn descriptor(&self) -> &'static Descriptor {
        self.descriptor
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        fetch_ok(&self.client, &self.url, &[])
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::Timestamped)
    }
}

/// Parse a Google-layout bundle. Entries keep their upstream order.
pub fn process(bytes: &[u8]) -> Result<TimestampedList> {
    let bundle: Bundle = serde_json::from_slice(bytes).map_err(|e| Error::parse("prefix bundle", e))?;

    let creation_time = bundle
        .creation_time
        .ok_or_else(|| Error::parse("prefix bundle", "missing creationTime"))?;
    let timestamp = parse_micros(&creation_time)?;

    let mut records = Vec::with_capacity(bundle.prefixes.len());
    for entry in bundle.prefixes {
        let text = match (entry.ipv4_prefix, entry.ipv6_prefix) {
            (Some(v4), _) => v4,
            (None, Some(v6)) => v6,
            (None, None) => {
                return Err(Error::parse("prefix bundle", "entry without ipv4Prefix or ipv6Prefix"));
            }
        };
        let mut record = Record::new(text.parse::<Prefix>()?);
        record.service = entry.service;
        record.scope = entry.scope;
        records.push(record);
    }

    Ok(TimestampedList {
        timestamp,
        sync_token: bundle.sync_token,
        records,
    })
}
