//! Zscaler cloud enforcement node ranges.
//!
//! The feed nests ranges under the cloud name, then `continent : <name>`,
//! then `city : <name>`.

use serde::Deserialize;
use serde_json::{Map, Value};

use super::{fetch_ok, fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, Record, RecordList};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;

pub const DOWNLOAD_URL: &str = "https://config.zscaler.com/api/zscaler.net/cenr/json";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "zscaler",
    full_name: "Zscaler",
    category: HostCategory::Security,
    source_url: "https://config.zscaler.com/zscaler.net/cenr",
    download_url: DOWNLOAD_URL,
    default_format: Format::Raw,
    filename: Some("zscaler.json"),
};

const CONTINENT_KEY: &str = "continent : ";
const CITY_KEY: &str = "city : ";

#[derive(Deserialize)]
struct Node {
    #[serde(default)]
    range: String,
    #[serde(default)]
    hostname: String,
}

pub struct Zscaler {
    client: HttpClient,
    url: String,
}

impl Zscaler {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            url: DOWNLOAD_URL.to_string(),
        }
    }
}

impl Provider for Zscaler {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        fetch_ok(&self.client, &self.url, &[])
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::Records)
    }
}

fn object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| Error::parse("zscaler ranges", format!("{} is not an object", what)))
}

/// One record per node with a range; continent becomes the region.
pub fn process(bytes: &[u8]) -> Result<RecordList> {
    let root: Value = serde_json::from_slice(bytes).map_err(|e| Error::parse("zscaler ranges", e))?;

    let mut records = Vec::new();
    for (cloud, continents) in object(&root, "document")? {
        for (continent, cities) in object(continents, cloud)? {
            let continent_name = continent.strip_prefix(CONTINENT_KEY).unwrap_or(continent);
            for (city, nodes) in object(cities, continent)? {
                let city_name = city.strip_prefix(CITY_KEY).unwrap_or(city);
                let nodes: Vec<Node> =
                    serde_json::from_value(nodes.clone()).map_err(|e| Error::parse("zscaler ranges", e))?;
                for node in nodes {
                    if node.range.trim().is_empty() {
                        continue;
                    }
                    let mut record = Record::new(node.range.parse::<Prefix>()?);
                    record.region = Some(continent_name.to_string());
                    record.city = Some(city_name.to_string());
                    if !node.hostname.is_empty() {
                        record.hostname = Some(node.hostname);
                    }
                    record.tags = vec![cloud.clone()];
                    records.push(record);
                }
            }
        }
    }

    Ok(RecordList { records })
}
