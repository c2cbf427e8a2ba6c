//! MaxMind GeoLite2 databases.
//!
//! Unlike the other adapters this one produces files: each edition is
//! downloaded into a root directory under the name MaxMind suggests in
//! `Content-Disposition`, and CSV archives can be extracted in place.
//!
//! Layout under the root:
//!
//! ```text
//! GeoLite2-ASN-CSV_20220705.zip
//! GeoLite2-ASN-CSV_20220705/GeoLite2-ASN-Blocks-IPv4.csv
//! GeoLite2-ASN-CSV_20220705/GeoLite2-ASN-Blocks-IPv6.csv
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::{Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, GeoIpDatabase, GeoIpFetchResult};
use crate::error::{Error, Result};
use crate::http::{mask_secrets, HttpClient, RawResponse};
use crate::render::Format;
use crate::unzip::{all_present, extract_zip};

pub const DOWNLOAD_URL: &str = "https://download.maxmind.com/app/geoip_download";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "maxmind",
    full_name: "MaxMind GeoLite2",
    category: HostCategory::Other,
    source_url: "https://dev.maxmind.com/geoip/geolite2-free-geolocation-data",
    download_url: DOWNLOAD_URL,
    default_format: Format::Json,
    filename: None,
};

/// GeoLite2 database variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edition {
    Asn,
    Country,
    City,
}

impl Edition {
    /// Edition id without the format suffix.
    pub fn id(&self) -> &'static str {
        match self {
            Edition::Asn => "GeoLite2-ASN",
            Edition::Country => "GeoLite2-Country",
            Edition::City => "GeoLite2-City",
        }
    }

    /// Files a CSV archive of this edition unpacks to.
    pub fn csv_files(&self) -> &'static [&'static str] {
        match self {
            Edition::Asn => &["GeoLite2-ASN-Blocks-IPv4.csv", "GeoLite2-ASN-Blocks-IPv6.csv"],
            Edition::Country => &[
                "GeoLite2-Country-Blocks-IPv4.csv",
                "GeoLite2-Country-Blocks-IPv6.csv",
                "GeoLite2-Country-Locations-en.csv",
            ],
            Edition::City => &[
                "GeoLite2-City-Blocks-IPv4.csv",
                "GeoLite2-City-Blocks-IPv6.csv",
                "GeoLite2-City-Locations-en.csv",
            ],
        }
    }

    /// Parse a comma-separated list such as `asn,country`.
    pub fn parse_list(s: &str) -> Result<Vec<Edition>> {
        let mut editions = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let edition: Edition = part.parse()?;
            if !editions.contains(&edition) {
                editions.push(edition);
            }
        }
        if editions.is_empty() {
            return Err(Error::Config("at least one edition is required".to_string()));
        }
        Ok(editions)
    }
}

impl FromStr for Edition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asn" => Ok(Edition::Asn),
            "country" => Ok(Edition::Country),
            "city" => Ok(Edition::City),
            other => Err(Error::Config(format!(
                "unknown edition {:?} (expected asn, country or city)",
                other
            ))),
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Distribution format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeoIpFormat {
    /// Zipped CSV files
    #[default]
    Csv,
    /// Binary database in a tar.gz; never extracted
    Mmdb,
}

impl FromStr for GeoIpFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(GeoIpFormat::Csv),
            "mmdb" => Ok(GeoIpFormat::Mmdb),
            other => Err(Error::Config(format!("unknown database format {:?} (expected csv or mmdb)", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaxMindConfig {
    pub license_key: String,
    pub editions: Vec<Edition>,
    pub format: GeoIpFormat,
    /// Unpack CSV archives after download
    pub extract: bool,
    /// Existing directory receiving archives and extracted files
    pub root: PathBuf,
    pub url: Option<String>,
}

impl MaxMindConfig {
    pub fn new(license_key: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            license_key: license_key.into(),
            editions: vec![Edition::Asn],
            format: GeoIpFormat::Csv,
            extract: false,
            root: root.into(),
            url: None,
        }
    }

    /// Authenticated download URL for one edition.
    pub fn edition_url(&self, edition: Edition) -> String {
        let (id_suffix, suffix) = match self.format {
            GeoIpFormat::Csv => ("-CSV", "zip"),
            GeoIpFormat::Mmdb => ("", "tar.gz"),
        };
        format!(
            "{}?edition_id={}{}&license_key={}&suffix={}",
            self.url.as_deref().unwrap_or(DOWNLOAD_URL),
            edition.id(),
            id_suffix,
            self.license_key,
            suffix
        )
    }
}

pub struct MaxMind {
    client: HttpClient,
    config: MaxMindConfig,
}

impl MaxMind {
    pub fn new(client: HttpClient, config: MaxMindConfig) -> Result<Self> {
        if config.license_key.trim().is_empty() {
            return Err(Error::Config("a MaxMind license key is required".to_string()));
        }
        if config.editions.is_empty() {
            return Err(Error::Config("at least one edition is required".to_string()));
        }
        if config.extract && config.format == GeoIpFormat::Mmdb {
            return Err(Error::Config("only CSV archives can be extracted".to_string()));
        }
        Ok(Self { client, config })
    }

    /// Download (and optionally extract) every configured edition.
    pub fn download(&self) -> Result<GeoIpFetchResult> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(Error::Config(format!("download path {} is not a directory", root.display())));
        }

        let mut result = GeoIpFetchResult::default();
        for &edition in &self.config.editions {
            result.databases.push(self.download_edition(edition, root)?);
        }
        Ok(result)
    }

    fn download_edition(&self, edition: Edition, root: &Path) -> Result<GeoIpDatabase> {
        let secrets = [self.config.license_key.as_str()];
        let url = self.config.edition_url(edition);

        let filename = self
            .client
            .content_disposition_filename(&url, &secrets)
            .map_err(|e| self.rejection(e, &url, &secrets))?;
        let basename = Path::new(&filename)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| *n == filename)
            .ok_or_else(|| Error::parse("content-disposition", format!("unsafe file name {:?}", filename)))?;
        let version = version_from_filename(basename)?;

        let archive = root.join(basename);
        if archive.is_file() {
            log::info!("{} already present, skipping download", archive.display());
        } else {
            self.client
                .download_file(&url, &archive, &secrets)
                .map_err(|e| self.rejection(e, &url, &secrets))?;
        }

        let mut database = GeoIpDatabase {
            edition: edition.id().to_string(),
            version,
            archive: archive.clone(),
            extracted_root: None,
            files: vec![archive.clone()],
        };

        if self.config.extract {
            let extracted = root.join(archive_stem(basename));
            let expected = edition.csv_files();
            if all_present(&extracted, expected) {
                log::info!("{} already extracted, skipping", extracted.display());
            } else {
                extract_zip(&archive, root)?;
                if !all_present(&extracted, expected) {
                    return Err(Error::Extraction(format!(
                        "{} did not contain the expected {} files",
                        archive.display(),
                        edition
                    )));
                }
            }
            database.files = expected.iter().map(|f| extracted.join(f)).collect();
            database.extracted_root = Some(extracted);
        }

        Ok(database)
    }

    /// Turn a 4xx status into [`Error::Api`] carrying MaxMind's reason.
    ///
    /// HEAD responses have no body, so the reason is read from a fresh GET.
    fn rejection(&self, err: Error, url: &str, secrets: &[&str]) -> Error {
        let status = match err {
            Error::Status { status, .. } if (400..500).contains(&status) => status,
            other => return other,
        };
        match self.client.get(url, secrets) {
            Ok(response) if response.status >= 400 => {
                let detail = String::from_utf8_lossy(&response.body).trim().to_string();
                let detail = if detail.is_empty() {
                    format!("request rejected with status {}", response.status)
                } else {
                    detail
                };
                Error::Api {
                    status: response.status,
                    detail: mask_secrets(&detail, secrets),
                }
            }
            Ok(_) => Error::Api {
                status,
                detail: "request rejected".to_string(),
            },
            Err(e) => e,
        }
    }
}

impl Provider for MaxMind {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    /// Archives are written to disk, never returned.
    fn fetch_raw(&self) -> Result<RawResponse> {
        Err(Error::Unsupported("MaxMind archives are downloaded to files".to_string()))
    }

    fn fetch(&self) -> Result<Document> {
        Ok(Document::assembled(Doc::GeoIp(self.download()?)))
    }
}

/// File name without `.zip` or `.tar.gz`.
fn archive_stem(filename: &str) -> &str {
    filename
        .strip_suffix(".zip")
        .or_else(|| filename.strip_suffix(".tar.gz"))
        .unwrap_or(filename)
}

/// Eight-digit date after the last `_` of an archive name.
pub fn version_from_filename(filename: &str) -> Result<String> {
    let stem = archive_stem(filename);
    let version = stem
        .rsplit_once('_')
        .map(|(_, v)| v)
        .filter(|v| v.len() == 8 && v.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::parse("archive name", format!("no version in {:?}", filename)))?;
    Ok(version.to_string())
}
