//! Oracle Cloud Infrastructure public IP ranges, grouped by region.

use serde::Deserialize;

use super::{fetch_ok, fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, Region, RegionalDoc, TaggedPrefix};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;
use crate::timestamp::parse_micros;

pub const DOWNLOAD_URL: &str = "https://docs.oracle.com/en-us/iaas/tools/public_ip_ranges.json";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "oci",
    full_name: "Oracle Cloud Infrastructure",
    category: HostCategory::Cloud,
    source_url: "https://docs.oracle.com/en-us/iaas/Content/General/Concepts/addressranges.htm",
    download_url: DOWNLOAD_URL,
    default_format: Format::Raw,
    filename: Some("oci.json"),
};

#[derive(Deserialize)]
struct Ranges {
    last_updated_timestamp: String,
    regions: Vec<RawRegion>,
}

#[derive(Deserialize)]
struct RawRegion {
    region: String,
    cidrs: Vec<RawCidr>,
}

#[derive(Deserialize)]
struct RawCidr {
    cidr: Prefix,
    #[serde(default)]
    tags: Vec<String>,
}

pub struct Oci {
    client: HttpClient,
    url: String,
}

impl Oci {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            url: DOWNLOAD_URL.to_string(),
        }
    }
}

impl Provider for Oci {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        fetch_ok(&self.client, &self.url, &[])
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::Regional)
    }
}

pub fn process(bytes: &[u8]) -> Result<RegionalDoc> {
    let ranges: Ranges = serde_json::from_slice(bytes).map_err(|e| Error::parse("oci ranges", e))?;
    let last_updated = parse_micros(&ranges.last_updated_timestamp)?;

    let regions = ranges
        .regions
        .into_iter()
        .map(|r| Region {
            name: r.region,
            cidrs: r
                .cidrs
                .into_iter()
                .map(|c| TaggedPrefix { cidr: c.cidr, tags: c.tags })
                .collect(),
        })
        .collect();

    Ok(RegionalDoc { last_updated, regions })
}
