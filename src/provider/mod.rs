//! Provider registry and the fetch/parse contract shared by every adapter.
//!
//! Each adapter module exposes a static [`Descriptor`], a pure `process`
//! function turning upstream bytes into a [`crate::doc::Doc`] shape, and a type
//! implementing [`Provider`] on top of an [`HttpClient`].

mod abuseipdb;
mod asn;
mod aws;
mod azure;
mod cloudflare;
mod csv_feeds;
mod fastly;
mod github;
mod google;
pub mod lines;
mod maxmind;
mod oci;
mod url;
mod zscaler;

pub use abuseipdb::{AbuseIpDb, AbuseIpDbConfig};
pub use asn::{AsnAggregator, HETZNER, M247, OVH, RIPESTAT_URL_TEMPLATE, SCALEWAY};
pub use aws::Aws;
pub use azure::{Azure, AzureConfig, DOWNLOAD_PAGE_URL as AZURE_DOWNLOAD_PAGE_URL, MIRROR_URL as AZURE_MIRROR_URL};
pub use cloudflare::{
    Cloudflare, CloudflareConfig, IPV4_URL as CLOUDFLARE_IPV4_URL, IPV6_URL as CLOUDFLARE_IPV6_URL,
};
pub use csv_feeds::{DigitalOcean, ICloudPrivateRelay, Linode, Vultr};
pub use fastly::Fastly;
pub use github::GitHub;
pub use google::{GoogleFeed, BINGBOT, GCP, GOOGLE, GOOGLEBOT, GOOGLESC, GOOGLEUTF};
pub use lines::{parse_lines, LineMode};
pub use maxmind::{Edition, GeoIpFormat, MaxMind, MaxMindConfig};
pub use oci::Oci;
pub use url::{UrlFeed, UrlFeedConfig};
pub use zscaler::Zscaler;

pub mod process {
    //! Pure parsers, one per adapter, usable without network access.
    pub use super::abuseipdb::{parse_error_envelope, process as abuseipdb};
    pub use super::asn::process as ripestat;
    pub use super::aws::process as aws;
    pub use super::azure::{find_download_url as azure_download_url, process as azure};
    pub use super::cloudflare::process as cloudflare;
    pub use super::csv_feeds::{
        process_digitalocean as digitalocean, process_icloudpr as icloudpr, process_linode as linode,
        process_vultr as vultr,
    };
    pub use super::fastly::process as fastly;
    pub use super::github::process as github;
    pub use super::google::process as google;
    pub use super::maxmind::version_from_filename as maxmind_version;
    pub use super::oci::process as oci;
    pub use super::zscaler::process as zscaler;
}

use std::fmt;
use std::str::FromStr;

use crate::doc::Document;
use crate::error::{Error, Result};
use crate::http::{mask_secrets, HttpClient, RawResponse};
use crate::render::Format;

/// Coarse classification shown in the index document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCategory {
    Cloud,
    Cdn,
    Hosting,
    Crawlers,
    Security,
    Search,
    Other,
}

impl HostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostCategory::Cloud => "cloud",
            HostCategory::Cdn => "cdn",
            HostCategory::Hosting => "hosting",
            HostCategory::Crawlers => "crawlers",
            HostCategory::Security => "security",
            HostCategory::Search => "search",
            HostCategory::Other => "other",
        }
    }
}

impl fmt::Display for HostCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cloud" => Ok(HostCategory::Cloud),
            "cdn" => Ok(HostCategory::Cdn),
            "hosting" => Ok(HostCategory::Hosting),
            "crawlers" => Ok(HostCategory::Crawlers),
            "security" => Ok(HostCategory::Security),
            "search" => Ok(HostCategory::Search),
            "other" => Ok(HostCategory::Other),
            other => Err(Error::Config(format!("unknown host category: {}", other))),
        }
    }
}

/// Immutable identity of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Lowercase identifier, also the subcommand name
    pub short_name: &'static str,
    pub full_name: &'static str,
    pub category: HostCategory,
    /// Human-readable documentation of the feed
    pub source_url: &'static str,
    pub download_url: &'static str,
    /// Output used by the publisher and when no format is requested
    pub default_format: Format,
    /// Conventional file name in a published working tree
    pub filename: Option<&'static str>,
}

/// Uniform fetch contract implemented by every adapter.
pub trait Provider: Send + Sync {
    fn descriptor(&self) -> &'static Descriptor;

    /// Upstream bytes as received, with headers and status.
    fn fetch_raw(&self) -> Result<RawResponse>;

    /// Fetch and parse into the provider's document shape.
    fn fetch(&self) -> Result<Document>;
}

/// Descriptors of every provider, ordered by short name.
pub fn descriptors() -> Vec<&'static Descriptor> {
    let mut all = vec![
        &abuseipdb::DESCRIPTOR,
        &aws::DESCRIPTOR,
        &azure::DESCRIPTOR,
        &BINGBOT,
        &cloudflare::DESCRIPTOR,
        &csv_feeds::DIGITALOCEAN,
        &fastly::DESCRIPTOR,
        &GCP,
        &github::DESCRIPTOR,
        &GOOGLE,
        &GOOGLEBOT,
        &GOOGLESC,
        &GOOGLEUTF,
        &HETZNER,
        &csv_feeds::ICLOUDPR,
        &csv_feeds::LINODE,
        &M247,
        &maxmind::DESCRIPTOR,
        &oci::DESCRIPTOR,
        &OVH,
        &SCALEWAY,
        &url::DESCRIPTOR,
        &csv_feeds::VULTR,
        &zscaler::DESCRIPTOR,
    ];
    all.sort_by_key(|d| d.short_name);
    all
}

/// Look up a descriptor by short name.
pub fn descriptor(short_name: &str) -> Option<&'static Descriptor> {
    descriptors().into_iter().find(|d| d.short_name == short_name)
}

/// Build a provider that needs no credentials or user input.
pub fn keyless(short_name: &str, client: &HttpClient) -> Option<Box<dyn Provider>> {
    let client = client.clone();
    let provider: Box<dyn Provider> = match short_name {
        "aws" => Box::new(Aws::new(client)),
        "azure" => Box::new(Azure::new(client, AzureConfig::default())),
        "bingbot" => Box::new(GoogleFeed::new(&BINGBOT, client)),
        "cloudflare" => Box::new(Cloudflare::new(client, CloudflareConfig::default())),
        "digitalocean" => Box::new(DigitalOcean::new(client)),
        "fastly" => Box::new(Fastly::new(client)),
        "gcp" => Box::new(GoogleFeed::new(&GCP, client)),
        "github" => Box::new(GitHub::new(client)),
        "google" => Box::new(GoogleFeed::new(&GOOGLE, client)),
        "googlebot" => Box::new(GoogleFeed::new(&GOOGLEBOT, client)),
        "googlesc" => Box::new(GoogleFeed::new(&GOOGLESC, client)),
        "googleutf" => Box::new(GoogleFeed::new(&GOOGLEUTF, client)),
        "hetzner" => Box::new(AsnAggregator::hetzner(client)),
        "icloudpr" => Box::new(ICloudPrivateRelay::new(client)),
        "linode" => Box::new(Linode::new(client)),
        "m247" => Box::new(AsnAggregator::m247(client)),
        "oci" => Box::new(Oci::new(client)),
        "ovh" => Box::new(AsnAggregator::ovh(client)),
        "scaleway" => Box::new(AsnAggregator::scaleway(client)),
        "vultr" => Box::new(Vultr::new(client)),
        "zscaler" => Box::new(Zscaler::new(client)),
        _ => return None,
    };
    Some(provider)
}

/// Short names excluded from publishing: they need credentials, produce
/// files rather than a document, or take their sources from the user.
pub const UNPUBLISHED: &[&str] = &["abuseipdb", "maxmind", "url"];

/// Providers the publisher synchronizes, in registry order.
pub fn publishable(client: &HttpClient) -> Vec<Box<dyn Provider>> {
    descriptors()
        .into_iter()
        .filter(|d| !UNPUBLISHED.contains(&d.short_name))
        .filter_map(|d| keyless(d.short_name, client))
        .collect()
}

/// GET `url` and require a 2xx status.
pub(crate) fn fetch_ok(client: &HttpClient, url: &str, secrets: &[&str]) -> Result<RawResponse> {
    let response = client.get(url, secrets)?;
    response.error_for_status(&mask_secrets(url, secrets))
}

/// Fetch the single payload of a provider and parse it.
pub(crate) fn fetch_parsed<T>(
    response: RawResponse,
    process: impl FnOnce(&[u8]) -> Result<T>,
    wrap: impl FnOnce(T) -> crate::doc::Doc,
) -> Result<Document> {
    let parsed = process(&response.body)?;
    Ok(Document::new(wrap(parsed), Some(response.body)))
}
