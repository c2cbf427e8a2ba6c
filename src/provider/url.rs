//! Prefix lists at user-supplied URLs.

use super::lines::{parse_lines, LineMode};
use super::{fetch_ok, Descriptor, HostCategory, Provider};
use crate::doc::{Doc, Document, SourceMap};
use crate::error::{Error, Result};
use crate::http::{HttpClient, RawResponse};
use crate::render::Format;

pub const DESCRIPTOR: Descriptor = Descriptor {
    short_name: "url",
    full_name: "URL feed",
    category: HostCategory::Other,
    source_url: "",
    download_url: "",
    default_format: Format::Json,
    filename: None,
};

#[derive(Debug, Clone, Default)]
pub struct UrlFeedConfig {
    pub urls: Vec<String>,
    pub mode: LineMode,
}

pub struct UrlFeed {
    client: HttpClient,
    config: UrlFeedConfig,
}

impl UrlFeed {
    pub fn new(client: HttpClient, config: UrlFeedConfig) -> Result<Self> {
        if config.urls.is_empty() {
            return Err(Error::Config("at least one URL is required".to_string()));
        }
        Ok(Self { client, config })
    }

    /// Fetch every URL in order and map each prefix to the URLs listing it.
    pub fn collect(&self) -> Result<SourceMap> {
        let mut map = SourceMap::new();
        for url in &self.config.urls {
            let response = fetch_ok(&self.client, url, &[])?;
            let prefixes = parse_lines(&response.body, self.config.mode)?;
            log::info!("{} lists {} prefixes", url, prefixes.len());
            for prefix in prefixes {
                map.insert(prefix, url);
            }
        }
        Ok(map)
    }
}

impl Provider for UrlFeed {
    fn descriptor(&self) -> &'static Descriptor {
        &DESCRIPTOR
    }

    /// The body of a single URL. Several URLs have no single payload.
    fn fetch_raw(&self) -> Result<RawResponse> {
        match self.config.urls.as_slice() {
            [url] => fetch_ok(&self.client, url, &[]),
            urls => Err(Error::Unsupported(format!(
                "raw output needs exactly one URL, got {}",
                urls.len()
            ))),
        }
    }

    fn fetch(&self) -> Result<Document> {
        Ok(Document::assembled(Doc::Sources(self.collect()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::testing::{mock_client, ok};
    use crate::render::render_lines;

    #[test]
    fn test_sources_per_prefix() {
        let (mock, client) = mock_client();
        mock.route("https://a.example/list", ok(b"# a\n10.0.0.0/8\n192.0.2.1\n"));
        mock.route("https://b.example/list", ok(b"10.0.0.0/8\n2001:db8::/32\n"));

        let config = UrlFeedConfig {
            urls: vec!["https://a.example/list".into(), "https://b.example/list".into()],
            mode: LineMode::Strict,
        };
        let feed = UrlFeed::new(client, config).unwrap();
        let document = feed.fetch().unwrap();
        let Doc::Sources(map) = &document.doc else {
            panic!("expected source map");
        };
        assert_eq!(map.len(), 3);
        assert_eq!(
            map.sources(&"10.0.0.0/8".parse().unwrap()).unwrap(),
            &["https://a.example/list".to_string(), "https://b.example/list".to_string()]
        );
        assert_eq!(
            render_lines(&document.doc).unwrap(),
            b"10.0.0.0/8\n192.0.2.1/32\n2001:db8::/32\n"
        );
        assert!(feed.fetch_raw().is_err());
    }

    #[test]
    fn test_failure_aborts() {
        let (mock, client) = mock_client();
        mock.route("https://a.example/list", ok(b"10.0.0.0/8\n"));
        let config = UrlFeedConfig {
            urls: vec!["https://a.example/list".into(), "https://missing.example/".into()],
            ..Default::default()
        };
        assert!(UrlFeed::new(client, config).unwrap().fetch().is_err());
    }

    #[test]
    fn test_requires_urls() {
        let (_, client) = mock_client();
        assert!(UrlFeed::new(client, UrlFeedConfig::default()).is_err());
    }
}
