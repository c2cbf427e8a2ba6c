//! Output renderers for provider documents.

use std::fmt;
use std::str::FromStr;

use crate::doc::{Doc, Document, RECORD_COLUMNS};
use crate::error::{Error, Result};

/// Output format selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Upstream bytes, untouched
    Raw,
    Json,
    Yaml,
    Csv,
    /// One prefix per line
    Lines,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Raw => "raw",
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Csv => "csv",
            Format::Lines => "lines",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(Format::Raw),
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "csv" => Ok(Format::Csv),
            "lines" | "txt" => Ok(Format::Lines),
            other => Err(Error::Config(format!(
                "unknown format {:?} (expected json, yaml, csv, lines or raw)",
                other
            ))),
        }
    }
}

/// Render a document in the requested format. JSON is pretty-printed.
pub fn render(document: &Document, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Raw => render_raw(document),
        Format::Json => render_json(&document.doc, true),
        Format::Yaml => render_yaml(&document.doc),
        Format::Csv => render_csv(&document.doc),
        Format::Lines => render_lines(&document.doc),
    }
}

/// The upstream payload the document was parsed from.
pub fn render_raw(document: &Document) -> Result<Vec<u8>> {
    document.raw.clone().ok_or_else(|| {
        Error::Unsupported(format!(
            "raw output is not available for a {} assembled from several requests",
            document.doc.kind()
        ))
    })
}

/// Canonical JSON; `pretty` uses two-space indentation.
pub fn render_json(doc: &Doc, pretty: bool) -> Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(doc)?
    } else {
        serde_json::to_vec(doc)?
    };
    Ok(bytes)
}

pub fn render_yaml(doc: &Doc) -> Result<Vec<u8>> {
    Ok(serde_yaml::to_string(doc)?.into_bytes())
}

/// Newline-terminated prefixes in document order.
pub fn render_lines(doc: &Doc) -> Result<Vec<u8>> {
    let prefixes = doc.prefixes();
    if prefixes.is_empty() {
        return Err(Error::NoPrefixes);
    }

    let mut out = String::with_capacity(prefixes.len() * 20);
    for prefix in &prefixes {
        out.push_str(&prefix.to_string());
        out.push('\n');
    }
    Ok(out.into_bytes())
}

/// CSV rows for documents that map onto a table.
pub fn render_csv(doc: &Doc) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    match doc {
        Doc::Prefixes(list) => {
            writer.write_record(["prefix"])?;
            for prefix in &list.prefixes {
                writer.write_record([prefix.to_string()])?;
            }
        }
        Doc::Records(list) => write_records(&mut writer, &list.records)?,
        Doc::Timestamped(list) => write_records(&mut writer, &list.records)?,
        Doc::Regional(regional) => {
            writer.write_record(["region", "prefix", "tags"])?;
            for region in &regional.regions {
                for cidr in &region.cidrs {
                    writer.write_record([region.name.clone(), cidr.cidr.to_string(), cidr.tags.join(";")])?;
                }
            }
        }
        Doc::ServiceTags(tags) => {
            writer.write_record(["name", "region", "system_service", "prefix"])?;
            for value in &tags.values {
                for prefix in &value.properties.address_prefixes {
                    writer.write_record([
                        value.name.clone(),
                        value.properties.region.clone().unwrap_or_default(),
                        value.properties.system_service.clone().unwrap_or_default(),
                        prefix.to_string(),
                    ])?;
                }
            }
        }
        Doc::Families(families) => {
            writer.write_record(["family", "prefix"])?;
            write_families(&mut writer, &families.ipv4, &families.ipv6)?;
        }
        Doc::Asn(asn) => {
            writer.write_record(["family", "prefix"])?;
            write_families(&mut writer, &asn.ipv4, &asn.ipv6)?;
        }
        Doc::Sources(map) => {
            writer.write_record(["prefix", "sources"])?;
            for (prefix, sources) in map.iter() {
                writer.write_record([prefix.to_string(), sources.join(";")])?;
            }
        }
        Doc::GeoIp(_) => {
            return Err(Error::Unsupported(format!("CSV output for a {}", doc.kind())));
        }
    }

    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn write_records(writer: &mut csv::Writer<Vec<u8>>, records: &[crate::doc::Record]) -> Result<()> {
    // Only columns that carry a value somewhere in the document
    let columns: Vec<&str> = RECORD_COLUMNS
        .iter()
        .copied()
        .filter(|c| *c == "prefix" || records.iter().any(|r| r.column(c).is_some()))
        .collect();

    writer.write_record(&columns)?;
    for record in records {
        let row: Vec<String> = columns
            .iter()
            .map(|c| record.column(c).unwrap_or_default())
            .collect();
        writer.write_record(&row)?;
    }
    Ok(())
}

fn write_families(
    writer: &mut csv::Writer<Vec<u8>>,
    ipv4: &[crate::prefix::Prefix],
    ipv6: &[crate::prefix::Prefix],
) -> Result<()> {
    for prefix in ipv4 {
        writer.write_record(["ipv4".to_string(), prefix.to_string()])?;
    }
    for prefix in ipv6 {
        writer.write_record(["ipv6".to_string(), prefix.to_string()])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::{FamilyPrefixes, GeoIpFetchResult, PrefixList, Record, RecordList};
    use crate::prefix::Prefix;

    fn p(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_lines_trailing_newline_and_order() {
        let doc = Doc::Prefixes(PrefixList::new(vec![p("162.158.0.0/16"), p("2606:4700::/32")]));
        assert_eq!(render_lines(&doc).unwrap(), b"162.158.0.0/16\n2606:4700::/32\n");
    }

    #[test]
    fn test_lines_empty_doc_fails() {
        let doc = Doc::Prefixes(PrefixList::default());
        assert!(matches!(render_lines(&doc), Err(Error::NoPrefixes)));
        let doc = Doc::GeoIp(GeoIpFetchResult::default());
        assert!(matches!(render_lines(&doc), Err(Error::NoPrefixes)));
    }

    #[test]
    fn test_json_two_space_indent() {
        let doc = Doc::Prefixes(PrefixList::new(vec![p("10.0.0.0/8")]));
        let json = String::from_utf8(render_json(&doc, true).unwrap()).unwrap();
        assert_eq!(json, "{\n  \"prefixes\": [\n    \"10.0.0.0/8\"\n  ]\n}");
        let compact = String::from_utf8(render_json(&doc, false).unwrap()).unwrap();
        assert_eq!(compact, r#"{"prefixes":["10.0.0.0/8"]}"#);
    }

    #[test]
    fn test_yaml() {
        let doc = Doc::Prefixes(PrefixList::new(vec![p("10.0.0.0/8")]));
        let yaml = String::from_utf8(render_yaml(&doc).unwrap()).unwrap();
        assert!(yaml.contains("prefixes:"));
        assert!(yaml.contains("10.0.0.0/8"));
    }

    #[test]
    fn test_csv_records_only_used_columns() {
        let mut r = Record::new(p("207.154.192.0/20"));
        r.country = Some("DE".into());
        r.city = Some("Frankfurt".into());
        let doc = Doc::Records(RecordList { records: vec![r] });
        let csv = String::from_utf8(render_csv(&doc).unwrap()).unwrap();
        assert_eq!(csv, "prefix,country,city\n207.154.192.0/20,DE,Frankfurt\n");
    }

    #[test]
    fn test_csv_families() {
        let mut f = FamilyPrefixes::default();
        f.push(p("2001:db8::/32"));
        f.push(p("10.0.0.0/8"));
        let csv = String::from_utf8(render_csv(&Doc::Families(f)).unwrap()).unwrap();
        assert_eq!(csv, "family,prefix\nipv4,10.0.0.0/8\nipv6,2001:db8::/32\n");
    }

    #[test]
    fn test_raw_requires_payload() {
        let doc = Doc::Prefixes(PrefixList::new(vec![p("10.0.0.0/8")]));
        let with_raw = Document::new(doc.clone(), Some(b"10.0.0.0/8\n".to_vec()));
        assert_eq!(render_raw(&with_raw).unwrap(), b"10.0.0.0/8\n");
        assert!(render_raw(&Document::assembled(doc)).is_err());
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("lines".parse::<Format>().unwrap(), Format::Lines);
        assert!("xml".parse::<Format>().is_err());
    }
}
