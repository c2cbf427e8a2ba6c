//! Fastly public IP list.

use serde::Deserialize;

use super::{fetch_ok, fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, FamilyPrefixes};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;

pub const DOWNLOAD_URL: &str = "https://api.fastly.com/public-ip-list";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "fastly",
    full_name: "Fastly",
    category: HostCategory::Cdn,
    source_url: "https://docs.fastly.com/en/guides/accessing-fastlys-ip-ranges",
    download_url: DOWNLOAD_URL,
    default_format: Format::Raw,
    filename: Some("fastly.json"),
};

#[derive(Deserialize)]
struct PublicIpList {
    #[serde(default)]
    addresses: Vec<Prefix>,
    #[serde(default)]
    ipv6_addresses: Vec<Prefix>,
}

pub struct Fastly {
    client: HttpClient,
    url: String,
}

impl Fastly {
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            url: DOWNLOAD_URL.to_string(),
        }
    }
}

impl Provider for Fastly {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        fetch_ok(&self.client, &self.url, &[])
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::Families)
    }
}

pub fn process(bytes: &[u8]) -> Result<FamilyPrefixes> {
    let list: PublicIpList = serde_json::from_slice(bytes).map_err(|e| Error::parse("fastly ip list", e))?;
    if list.addresses.iter().any(Prefix::is_ipv6) || list.ipv6_addresses.iter().any(Prefix::is_ipv4) {
        return Err(Error::parse("fastly ip list", "prefix listed under the wrong family"));
    }
    Ok(FamilyPrefixes {
        ipv4: list.addresses,
        ipv6: list.ipv6_addresses,
    })
}
