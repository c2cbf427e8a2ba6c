//! Canonical document model produced by provider adapters.
//!
//! Every adapter parses its feed into one of the [`Doc`] shapes. Prefix order
//! inside a document always matches the upstream feed.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::prefix::Prefix;
use crate::timestamp::Timestamp;

/// Ordered prefixes from a plain feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefixList {
    pub prefixes: Vec<Prefix>,
}

impl PrefixList {
    pub fn new(prefixes: Vec<Prefix>) -> Self {
        Self { prefixes }
    }
}

/// A prefix with the attributes a provider attaches to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub prefix: Prefix,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_border_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reported: Option<Timestamp>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Record {
    /// A record carrying only its prefix.
    pub fn new(prefix: Prefix) -> Self {
        Self {
            prefix,
            country: None,
            region: None,
            city: None,
            postal_code: None,
            service: None,
            scope: None,
            network_border_group: None,
            hostname: None,
            confidence: None,
            last_reported: None,
            tags: Vec::new(),
        }
    }

    /// Attribute values by column name, for CSV output.
    pub(crate) fn column(&self, name: &str) -> Option<String> {
        match name {
            "prefix" => Some(self.prefix.to_string()),
            "country" => self.country.clone(),
            "region" => self.region.clone(),
            "city" => self.city.clone(),
            "postal_code" => self.postal_code.clone(),
            "service" => self.service.clone(),
            "scope" => self.scope.clone(),
            "network_border_group" => self.network_border_group.clone(),
            "hostname" => self.hostname.clone(),
            "confidence" => self.confidence.map(|c| c.to_string()),
            "last_reported" => self.last_reported.map(|t| t.to_rfc3339()),
            "tags" if !self.tags.is_empty() => Some(self.tags.join(";")),
            _ => None,
        }
    }
}

/// Column order used when records are written as CSV.
pub(crate) const RECORD_COLUMNS: &[&str] = &[
    "prefix",
    "country",
    "region",
    "city",
    "postal_code",
    "service",
    "scope",
    "network_border_group",
    "hostname",
    "confidence",
    "last_reported",
    "tags",
];

/// Ordered records from a tabular feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecordList {
    pub records: Vec<Record>,
}

/// Records stamped with the provider's publication instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampedList {
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_token: Option<String>,
    pub records: Vec<Record>,
}

/// A prefix and its tags inside a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaggedPrefix {
    pub cidr: Prefix,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub name: String,
    pub cidrs: Vec<TaggedPrefix>,
}

/// Regions in provider order, each with its tagged prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionalDoc {
    pub last_updated: Timestamp,
    pub regions: Vec<Region>,
}

/// Service tag catalogue; serializes back to the provider's own JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTagsDoc {
    pub change_number: u64,
    pub cloud: String,
    pub values: Vec<ServiceTag>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTag {
    pub name: String,
    pub id: String,
    pub properties: ServiceTagProperties,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTagProperties {
    pub change_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_service: Option<String>,
    pub address_prefixes: Vec<Prefix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_features: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Prefixes split by address family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamilyPrefixes {
    pub ipv4: Vec<Prefix>,
    pub ipv6: Vec<Prefix>,
}

impl FamilyPrefixes {
    /// Append to the list matching the prefix's family.
    pub fn push(&mut self, prefix: Prefix) {
        if prefix.is_ipv4() {
            self.ipv4.push(prefix);
        } else {
            self.ipv6.push(prefix);
        }
    }
}

/// Prefixes announced by a set of ASNs, merged in ASN order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AsnDoc {
    pub asns: Vec<u32>,
    pub ipv4: Vec<Prefix>,
    pub ipv6: Vec<Prefix>,
}

/// One downloaded GeoLite2 database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeoIpDatabase {
    pub edition: String,
    /// Eight-digit date from the archive name
    pub version: String,
    pub archive: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_root: Option<PathBuf>,
    pub files: Vec<PathBuf>,
}

/// Local artifacts produced by the geolocation vendor adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeoIpFetchResult {
    pub databases: Vec<GeoIpDatabase>,
}

/// Prefixes mapped to the feeds that listed them, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    entries: Vec<(Prefix, Vec<String>)>,
    index: HashMap<Prefix, usize>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `source` lists `prefix`. A source is kept once per prefix.
    pub fn insert(&mut self, prefix: Prefix, source: &str) {
        match self.index.get(&prefix) {
            Some(&i) => {
                let sources = &mut self.entries[i].1;
                if !sources.iter().any(|s| s == source) {
                    sources.push(source.to_string());
                }
            }
            None => {
                self.index.insert(prefix, self.entries.len());
                self.entries.push((prefix, vec![source.to_string()]));
            }
        }
    }

    pub fn sources(&self, prefix: &Prefix) -> Option<&[String]> {
        self.index.get(prefix).map(|&i| self.entries[i].1.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Prefix, &[String])> {
        self.entries.iter().map(|(p, s)| (p, s.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for SourceMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (prefix, sources) in &self.entries {
            map.serialize_entry(&prefix.to_string(), sources)?;
        }
        map.end()
    }
}

/// A parsed provider document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Doc {
    Prefixes(PrefixList),
    Timestamped(TimestampedList),
    Records(RecordList),
    Regional(RegionalDoc),
    ServiceTags(ServiceTagsDoc),
    Families(FamilyPrefixes),
    Asn(AsnDoc),
    GeoIp(GeoIpFetchResult),
    Sources(SourceMap),
}

impl Doc {
    /// Short name of the document shape.
    pub fn kind(&self) -> &'static str {
        match self {
            Doc::Prefixes(_) => "prefix list",
            Doc::Timestamped(_) => "timestamped list",
            Doc::Records(_) => "record list",
            Doc::Regional(_) => "regional document",
            Doc::ServiceTags(_) => "service tags",
            Doc::Families(_) => "family lists",
            Doc::Asn(_) => "ASN aggregate",
            Doc::GeoIp(_) => "GeoIP fetch result",
            Doc::Sources(_) => "source map",
        }
    }

    /// Every prefix in document order.
    pub fn prefixes(&self) -> Vec<Prefix> {
        match self {
            Doc::Prefixes(list) => list.prefixes.clone(),
            Doc::Timestamped(list) => list.records.iter().map(|r| r.prefix).collect(),
            Doc::Records(list) => list.records.iter().map(|r| r.prefix).collect(),
            Doc::Regional(doc) => doc
                .regions
                .iter()
                .flat_map(|r| r.cidrs.iter().map(|c| c.cidr))
                .collect(),
            Doc::ServiceTags(doc) => doc
                .values
                .iter()
                .flat_map(|v| v.properties.address_prefixes.iter().copied())
                .collect(),
            Doc::Families(f) => f.ipv4.iter().chain(f.ipv6.iter()).copied().collect(),
            Doc::Asn(doc) => doc.ipv4.iter().chain(doc.ipv6.iter()).copied().collect(),
            Doc::GeoIp(_) => Vec::new(),
            Doc::Sources(map) => map.iter().map(|(p, _)| *p).collect(),
        }
    }
}

/// A document together with the upstream bytes it was parsed from.
///
/// `raw` is `None` for documents assembled from several requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub doc: Doc,
    pub raw: Option<Vec<u8>>,
}

impl Document {
    pub fn new(doc: Doc, raw: Option<Vec<u8>>) -> Self {
        Self { doc, raw }
    }

    /// Document with no single upstream payload.
    pub fn assembled(doc: Doc) -> Self {
        Self { doc, raw: None }
    }
}
