//! Hosting networks described by the prefixes their ASNs announce.
//!
//! One RIPEstat query is issued per ASN, in the configured order, and the
//! results are merged by family. Any failed query fails the whole fetch.

use serde::Deserialize;

use super::{fetch_ok, Descriptor, HostCategory, Provider};
use crate::doc::{AsnDoc, Doc, Document, FamilyPrefixes};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::prefix::Prefix;
use crate::render::Format;

/// Announced-prefixes endpoint; `{asn}` is replaced by the number.
pub const RIPESTAT_URL_TEMPLATE: &str = "https://stat.ripe.net/data/announced-prefixes/data.json?resource=AS{asn}";

pub const HETZNER: Descriptor = Descriptor {
    short_name: "hetzner",
    full_name: "Hetzner",
    category: HostCategory::Hosting,
    source_url: "https://docs.hetzner.com/general/others/ip-addresses/",
    download_url: RIPESTAT_URL_TEMPLATE,
    default_format: Format::Json,
    filename: Some("hetzner.json"),
};

pub const M247: Descriptor = Descriptor {
    short_name: "m247",
    full_name: "M247",
    category: HostCategory::Hosting,
    source_url: "https://m247.com/",
    download_url: RIPESTAT_URL_TEMPLATE,
    default_format: Format::Json,
    filename: Some("m247.json"),
};

pub const OVH: Descriptor = Descriptor {
    short_name: "ovh",
    full_name: "OVHcloud",
    category: HostCategory::Hosting,
    source_url: "https://www.ovhcloud.com/",
    download_url: RIPESTAT_URL_TEMPLATE,
    default_format: Format::Json,
    filename: Some("ovh.json"),
};

pub const SCALEWAY: Descriptor = Descriptor {
    short_name: "scaleway",
    full_name: "Scaleway",
    category: HostCategory::Hosting,
    source_url: "https://www.scaleway.com/",
    download_url: RIPESTAT_URL_TEMPLATE,
    default_format: Format::Json,
    filename: Some("scaleway.json"),
};

const HETZNER_ASNS: &[u32] = &[24940, 213230, 212317];
const M247_ASNS: &[u32] = &[9009];
const OVH_ASNS: &[u32] = &[16276, 35540];
const SCALEWAY_ASNS: &[u32] = &[12876, 29447];

#[derive(Deserialize)]
struct Announced {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    messages: Vec<Vec<String>>,
    data: Option<AnnouncedData>,
}

#[derive(Deserialize)]
struct AnnouncedData {
    #[serde(default)]
    prefixes: Vec<AnnouncedPrefix>,
}

#[derive(Deserialize)]
struct AnnouncedPrefix {
    prefix: Prefix,
}

/// Provider built from a fixed ASN list.
pub struct AsnAggregator {
    descriptor: &'static Descriptor,
    asns: Vec<u32>,
    client: HttpClient,
    url_template: String,
}

impl AsnAggregator {
    pub fn new(descriptor: &'static Descriptor, asns: &[u32], client: HttpClient) -> Self {
        Self {
            descriptor,
            asns: asns.to_vec(),
            client,
            url_template: RIPESTAT_URL_TEMPLATE.to_string(),
        }
    }

    pub fn hetzner(client: HttpClient) -> Self {
        Self::new(&HETZNER, HETZNER_ASNS, client)
    }

    pub fn m247(client: HttpClient) -> Self {
        Self::new(&M247, M247_ASNS, client)
    }

    pub fn ovh(client: HttpClient) -> Self {
        Self::new(&OVH, OVH_ASNS, client)
    }

    pub fn scaleway(client: HttpClient) -> Self {
        Self::new(&SCALEWAY, SCALEWAY_ASNS, client)
    }

    /// Use a different endpoint; the template must contain `{asn}`.
    pub fn with_url_template(mut self, template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{asn}") {
            return Err(Error::Config(format!("ASN URL template {:?} lacks {{asn}}", template)));
        }
        self.url_template = template;
        Ok(self)
    }

    pub fn asns(&self) -> &[u32] {
        &self.asns
    }

    pub fn url_for(&self, asn: u32) -> String {
        self.url_template.replace("{asn}", &asn.to_string())
    }

    /// Query every ASN in order and merge the results.
    pub fn aggregate(&self) -> Result<AsnDoc> {
        let mut doc = AsnDoc {
            asns: self.asns.clone(),
            ..Default::default()
        };

        for &asn in &self.asns {
            let response = fetch_ok(&self.client, &self.url_for(asn), &[])?;
            let families = process(&response.body)?;
            log::debug!(
                "AS{} announces {} IPv4 and {} IPv6 prefixes",
                asn,
                families.ipv4.len(),
                families.ipv6.len()
            );
            doc.ipv4.extend(families.ipv4);
            doc.ipv6.extend(families.ipv6);
        }

        log::info!(
            "Fetched {} prefixes for {} from {} ASN(s)",
            doc.ipv4.len() + doc.ipv6.len(),
            self.descriptor.full_name,
            self.asns.len()
        );
        Ok(doc)
    }
}

impl Provider for AsnAggregator {
    fn descriptor(&self) -> &'static Descriptor {
        self.descriptor
    }

    /// There is no single upstream payload to return.
    fn fetch_raw(&self) -> Result<RawResponse> {
        Err(Error::Unsupported(format!(
            "{} is assembled from {} ASN queries and has no raw payload",
            self.descriptor.short_name,
            self.asns.len()
        )))
    }

    fn fetch(&self) -> Result<Document> {
        Ok(Document::assembled(Doc::Asn(self.aggregate()?)))
    }
}

/// Prefixes of one RIPEstat announced-prefixes response, split by family.
pub fn process(bytes: &[u8]) -> Result<FamilyPrefixes> {
    let announced: Announced =
        serde_json::from_slice(bytes).map_err(|e| Error::parse("announced prefixes", e))?;

    if let Some(status) = announced.status.as_deref() {
        if status != "ok" {
            let detail = announced
                .messages
                .iter()
                .filter_map(|m| m.last())
                .cloned()
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::Api {
                status: announced.status_code.unwrap_or_default(),
                detail: if detail.is_empty() { status.to_string() } else { detail },
            });
        }
    }

    let data = announced
        .data
        .ok_or_else(|| Error::parse("announced prefixes", "missing data"))?;
    let mut families = FamilyPrefixes::default();
    for p in data.prefixes {
        families.push(p.prefix);
    }
    Ok(families)
}
