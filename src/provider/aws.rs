//! Amazon Web Services `ip-ranges.json`.

use serde::Deserialize;

use super::{fetch_ok, fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, Record, TimestampedList};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;
use crate::timestamp::parse_dashed;

pub const DOWNLOAD_URL: &str = "https://ip-ranges.amazonaws.com/ip-ranges.json";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "aws",
    full_name: "Amazon Web Services",
    category: HostCategory::Cloud,
    source_url: "https://docs.aws.amazon.com/vpc/latest/userguide/aws-ip-ranges.html",
    download_url: DOWNLOAD_URL,
    default_format: Format::Raw,
    filename: Some("aws.json"),
};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpRanges {
    sync_token: String,
    create_date: String,
    #[serde(default)]
    prefixes: Vec<V4Entry>,
    #[serde(default, rename = "ipv6_prefixes")]
    ipv6_prefixes: Vec<V6Entry>,
}

#[derive(Deserialize)]
struct V4Entry {
    ip_prefix: Prefix,
    region: Option<String>,
    service: Option<String>,
    network_border_group: Option<String>,
}

#[derive(Deserialize)]
struct V6Entry {
    ipv6_prefix: Prefix,
    region: Option<String>,
    service: Option<String>,
    network_border_group: Option<String>,
}

fn record(prefix: Prefix, region: Option<String>, service: Option<String>, nbg: Option<String>) -> Record {
    let mut record = Record::new(prefix);
    record.region = region;
    record.service = service;
    record.network_border_group = nbg;
    record
}

pub struct Aws {
    client: HttpClient,
    url: String,
}

impl Aws {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            url: DOWNLOAD_URL.to_string(),
        }
    }
}

impl Provider for Aws {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        fetch_ok(&self.client, &self.url, &[])
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::Timestamped)
    }
}

/// IPv4 records followed by IPv6 records, each in feed order.
pub fn process(bytes: &[u8]) -> Result<TimestampedList> {
    let ranges: IpRanges = serde_json::from_slice(bytes).map_err(|e| Error::parse("aws ip ranges", e))?;
    let timestamp = parse_dashed(&ranges.create_date)?;

    let mut records = Vec::with_capacity(ranges.prefixes.len() + ranges.ipv6_prefixes.len());
    for e in ranges.prefixes {
        records.push(record(e.ip_prefix, e.region, e.service, e.network_border_group));
    }
    for e in ranges.ipv6_prefixes {
        records.push(record(e.ipv6_prefix, e.region, e.service, e.network_border_group));
    }

    Ok(TimestampedList {
        timestamp,
        sync_token: Some(ranges.sync_token),
        records,
    })
}
