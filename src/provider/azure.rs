//! Microsoft Azure service tags.
//!
//! Microsoft only links the weekly file from an HTML download page. By default
//! the adapter reads a maintained mirror of the current file; with
//! [`AzureConfig::scrape`] set it fetches the page and follows the link.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{fetch_ok, fetch_parsed, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, ServiceTagsDoc};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::render::Format;

/// Download page linking the current service tag file.
pub const DOWNLOAD_PAGE_URL: &str = "https://www.microsoft.com/en-us/download/confirmation.aspx?id=56519";

/// Mirror of the current public service tag file.
pub const MIRROR_URL: &str =
    "https://raw.githubusercontent.com/femueller/cloud-ip-ranges/master/microsoft-azure-ip-ranges.json";

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "azure",
    full_name: "Microsoft Azure",
    category: HostCategory::Cloud,
    source_url: "https://www.microsoft.com/en-us/download/details.aspx?id=56519",
    download_url: MIRROR_URL,
    default_format: Format::Raw,
    filename: Some("azure.json"),
};

static DOWNLOAD_LINK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"https://download\.microsoft\.com/download/[0-9A-Za-z/\-]+/ServiceTags_Public_\d+\.json")
        .expect("valid regex")
});

#[derive(Debug, Clone, Default)]
pub struct AzureConfig {
    /// Follow the link on the download page instead of reading the mirror
    pub scrape: bool,
    pub page_url: Option<String>,
    pub mirror_url: Option<String>,
}

pub struct Azure {
    client: HttpClient,
    config: AzureConfig,
}

impl Azure {
    pub fn new(client: HttpClient, config: AzureConfig) -> Self {
        Self { client, config }
    }

    /// URL of the service tag file to download.
    pub fn resolve_url(&self) -> Result<String> {
        if !self.config.scrape {
            return Ok(self.config.mirror_url.as_deref().unwrap_or(MIRROR_URL).to_string());
        }

        let page_url = self.config.page_url.as_deref().unwrap_or(DOWNLOAD_PAGE_URL);
        let page = fetch_ok(&self.client, page_url, &[])?;
        let url = find_download_url(page.text()?)
            .ok_or_else(|| Error::parse("azure download page", "no service tag link found"))?;
        log::debug!("Resolved Azure service tags to {}", url);
        Ok(url)
    }
}

impl Provider for Azure {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    fn fetch_raw(&self) -> Result<RawResponse> {
        let url = self.resolve_url()?;
        fetch_ok(&self.client, &url, &[])
    }

    fn fetch(&self) -> Result<Document> {
        fetch_parsed(self.fetch_raw()?, process, Doc::ServiceTags)
    }
}

/// First service tag link in an HTML page.
pub fn find_download_url(html: &str) -> Option<String> {
    DOWNLOAD_LINK.find(html).map(|m| m.as_str().to_string())
}

pub fn process(bytes: &[u8]) -> Result<ServiceTagsDoc> {
    serde_json::from_slice(bytes).map_err(|e| Error::parse("azure service tags", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{mock_client, ok};
    use crate::render::render_json;

    const PAGE: &str = r#"<html><body>
<a href="https://download.microsoft.com/download/7/1/D/71D86715-5596-4529-9B13-DA13A5DE5B63/ServiceTags_Public_20230313.json" class="mscom-link">click here</a>
</body></html>"#;

    #[test]
    fn test_find_download_url() {
        assert_eq!(
            find_download_url(PAGE).as_deref(),
            Some("https://download.microsoft.com/download/7/1/D/71D86715-5596-4529-9B13-DA13A5DE5B63/ServiceTags_Public_20230313.json")
        );
        assert!(find_download_url("<html></html>").is_none());
    }

    #[test]
    fn test_json_round_trip_is_semantically_equal() {
        let doc = process(crate::fixtures::AZURE).unwrap();
        assert_eq!(doc.change_number, 244);
        assert_eq!(doc.values[0].properties.address_prefixes.len(), 2);

        let rendered = render_json(&Doc::ServiceTags(doc), true).unwrap();
        let before: serde_json::Value = serde_json::from_slice(crate::fixtures::AZURE).unwrap();
        let after: serde_json::Value = serde_json::from_slice(&rendered).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_absent_properties_stay_absent() {
        let input = br#"{"changeNumber": 3, "cloud": "Public", "values": [
            {"name": "AzureCloud", "id": "AzureCloud", "properties": {"changeNumber": 3, "addressPrefixes": ["13.64.0.0/11"]}},
            {"name": "AzureCloud.westus", "id": "AzureCloud.westus", "properties": {"changeNumber": 1, "region": "westus", "regionId": 0, "platform": "", "systemService": "", "addressPrefixes": ["13.64.0.0/16"]}}
        ]}"#;
        let doc = process(input).unwrap();
        assert_eq!(doc.values[0].properties.region, None);
        assert_eq!(doc.values[1].properties.region.as_deref(), Some("westus"));
        assert_eq!(doc.values[1].properties.region_id, Some(0));

        let rendered = render_json(&Doc::ServiceTags(doc), true).unwrap();
        let before: serde_json::Value = serde_json::from_slice(input).unwrap();
        let after: serde_json::Value = serde_json::from_slice(&rendered).unwrap();
        assert_eq!(before, after);
        let first = after["values"][0]["properties"].as_object().unwrap();
        assert!(!first.contains_key("region"));
        assert!(!first.contains_key("systemService"));
    }

    #[test]
    fn test_scrape_path() {
        let (mock, client) = mock_client();
        let file_url = "https://download.microsoft.com/download/7/1/D/71D86715-5596-4529-9B13-DA13A5DE5B63/ServiceTags_Public_20230313.json";
        mock.route(DOWNLOAD_PAGE_URL, ok(PAGE.as_bytes()));
        mock.route(file_url, ok(crate::fixtures::AZURE));

        let config = AzureConfig {
            scrape: true,
            ..Default::default()
        };
        let document = Azure::new(client, config).fetch().unwrap();
        assert_eq!(document.raw.as_deref(), Some(crate::fixtures::AZURE));
        let urls: Vec<String> = mock.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec![DOWNLOAD_PAGE_URL.to_string(), file_url.to_string()]);
    }

    #[test]
    fn test_default_uses_mirror() {
        let (mock, client) = mock_client();
        mock.route(MIRROR_URL, ok(crate::fixtures::AZURE));
        let document = Azure::new(client, AzureConfig::default()).fetch().unwrap();
        assert!(!document.doc.prefixes().is_empty());
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn test_malformed() {
        assert!(process(b"").is_err());
        assert!(process(br#"{"changeNumber": 1}"#).is_err());
        assert!(process(br#"{"changeNumber": 1, "cloud": "Public", "values": [{"name": "x", "id": "x", "properties": {"changeNumber": 1, "addressPrefixes": ["bogus"]}}]}"#).is_err());
    }
}
