//! Geolocation feeds: one record per prefix with country, region, city and
//! postal code, published as CSV or as a JSON geofeed.

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;

use super::{fetch_ok, fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, Record, RecordList};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;

pub const DIGITALOCEAN: Descriptor = Descriptor {
    short_name: "digitalocean",
    full_name: "DigitalOcean",
    category: HostCategory::Hosting,
    source_url: "https://docs.digitalocean.com/products/platform/",
    download_url: "https://www.digitalocean.com/geo/google.csv",
    default_format: Format::Raw,
    filename: Some("digitalocean.csv"),
};

pub const LINODE: Descriptor = Descriptor {
    short_name: "linode",
    full_name: "Linode",
    category: HostCategory::Hosting,
    source_url: "https://www.linode.com/docs/guides/",
    download_url: "https://geoip.linode.com/",
    default_format: Format::Raw,
    filename: Some("linode.csv"),
};

pub const ICLOUDPR: Descriptor = Descriptor {
    short_name: "icloudpr",
    full_name: "iCloud Private Relay",
    category: HostCategory::Other,
    source_url: "https://developer.apple.com/support/prepare-your-network-for-icloud-private-relay/",
    download_url: "https://mask-api.icloud.com/egress-ip-ranges.csv",
    default_format: Format::Raw,
    filename: Some("icloudpr.csv"),
};

pub const VULTR: Descriptor = Descriptor {
    short_name: "vultr",
    full_name: "Vultr",
    category: HostCategory::Hosting,
    source_url: "https://www.vultr.com/resources/faq/",
    download_url: "https://geofeed.constant.com/?json",
    default_format: Format::Raw,
    filename: Some("vultr.json"),
};

/// First column name of the DigitalOcean header row.
const DIGITALOCEAN_HEADER: &str = "network";

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Parse positional geofeed rows: prefix, country, region, city, postal code.
///
/// Lines starting with `#` are skipped. When `header` is given, a first row
/// whose first column equals it is treated as a header.
fn parse_geo_csv(bytes: &[u8], context: &str, header: Option<&str>) -> Result<RecordList> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(Trim::All)
        .from_reader(bytes);

    let mut records = Vec::new();
    for (n, row) in reader.records().enumerate() {
        let row = row.map_err(|e| Error::parse(context, e))?;
        let first = row.get(0).unwrap_or_default();
        if n == 0 && header.map_or(false, |h| first.eq_ignore_ascii_case(h)) {
            continue;
        }
        if row.iter().all(str::is_empty) {
            continue;
        }

        let prefix: Prefix = first
            .parse()
            .map_err(|e| Error::parse(context, format!("row {}: {}", n + 1, e)))?;
        let mut record = Record::new(prefix);
        record.country = non_empty(row.get(1));
        record.region = non_empty(row.get(2));
        record.city = non_empty(row.get(3));
        record.postal_code = non_empty(row.get(4));
        records.push(record);
    }

    Ok(RecordList { records })
}

/// DigitalOcean CSV: `network,countrycode,citycode,cityname,zipcode`.
///
/// The `citycode` column (e.g. `DE-HE`) is kept as the region.
pub fn process_digitalocean(bytes: &[u8]) -> Result<RecordList> {
    parse_geo_csv(bytes, "digitalocean csv", Some(DIGITALOCEAN_HEADER))
}

/// Linode CSV with a commented header block.
pub fn process_linode(bytes: &[u8]) -> Result<RecordList> {
    parse_geo_csv(bytes, "linode csv", None)
}

/// iCloud Private Relay egress ranges, no header.
pub fn process_icloudpr(bytes: &[u8]) -> Result<RecordList> {
    parse_geo_csv(bytes, "icloud private relay csv", None)
}

#[derive(Deserialize)]
struct Geofeed {
    subnets: Vec<Subnet>,
}

#[derive(Deserialize)]
struct Subnet {
    ip_prefix: Prefix,
    alpha2code: Option<String>,
    region: Option<String>,
    city: Option<String>,
    postal_code: Option<String>,
}

/// Vultr JSON geofeed.
pub fn process_vultr(bytes: &[u8]) -> Result<RecordList> {
    let feed: Geofeed = serde_json::from_slice(bytes).map_err(|e| Error::parse("vultr geofeed", e))?;
    let records = feed
        .subnets
        .into_iter()
        .map(|s| {
            let mut record = Record::new(s.ip_prefix);
            record.country = non_empty(s.alpha2code.as_deref());
            record.region = non_empty(s.region.as_deref());
            record.city = non_empty(s.city.as_deref());
            record.postal_code = non_empty(s.postal_code.as_deref());
            record
        })
        .collect();
    Ok(RecordList { records })
}

macro_rules! record_feed {
    ($name:ident, $descriptor:expr, $process:path) => {
        pub struct $name {
            client: HttpClient,
            url: String,
        }

        impl $name {
            pub fn new(client: HttpClient) -> Self {
                Self {
                    client,
                    url: $descriptor.download_url.to_string(),
                }
            }
        }

        impl Provider for $name {
            fn descriptor(&self) -> &'static Descriptor {
                &$descriptor
            }

            fn fetch_raw(&self) -> Result<RawResponse> {
                fetch_ok(&self.client, &self.url, &[])
            }

            fn fetch(&self) -> Result<Document> {
                fetch_parsed(self.fetch_raw()?, $process, Doc::Records)
            }
        }
    };
}

record_feed!(DigitalOcean, DIGITALOCEAN, process_digitalocean);
record_feed!(Linode, LINODE, process_linode);
record_feed!(ICloudPrivateRelay, ICLOUDPR, process_icloudpr);
record_feed!(Vultr, VULTR, process_vultr);
