//! Canned provider payloads and the mock transports serving them.
//!
//! Setting `IP_FETCHER_MOCK_<PROVIDER>=true` makes the command line use
//! [`mock_transport`] for that provider instead of the network.

use crate::http::{HeaderValue, MockTransport, RawResponse};
use crate::provider::{self, RIPESTAT_URL_TEMPLATE};

pub const ABUSEIPDB: &[u8] = include_bytes!("../testdata/abuseipdb.json");
pub const ABUSEIPDB_ERROR: &[u8] = include_bytes!("../testdata/abuseipdb-error.json");
pub const AWS: &[u8] = include_bytes!("../testdata/aws.json");
pub const AZURE: &[u8] = include_bytes!("../testdata/azure.json");
pub const AZURE_DOWNLOAD_PAGE: &[u8] = include_bytes!("../testdata/azure-download.html");
pub const BINGBOT: &[u8] = include_bytes!("../testdata/bingbot.json");
pub const CLOUDFLARE_IPV4: &[u8] = include_bytes!("../testdata/cloudflare-ips-v4.txt");
pub const CLOUDFLARE_IPV6: &[u8] = include_bytes!("../testdata/cloudflare-ips-v6.txt");
pub const DIGITALOCEAN: &[u8] = include_bytes!("../testdata/digitalocean.csv");
pub const FASTLY: &[u8] = include_bytes!("../testdata/fastly.json");
pub const GCP: &[u8] = include_bytes!("../testdata/gcp.json");
pub const GITHUB: &[u8] = include_bytes!("../testdata/github.json");
pub const GOOGLE: &[u8] = include_bytes!("../testdata/google.json");
pub const GOOGLEBOT: &[u8] = include_bytes!("../testdata/googlebot.json");
pub const GOOGLESC: &[u8] = include_bytes!("../testdata/googlesc.json");
pub const GOOGLEUTF: &[u8] = include_bytes!("../testdata/googleutf.json");
pub const ICLOUDPR: &[u8] = include_bytes!("../testdata/icloudpr.csv");
pub const LINODE: &[u8] = include_bytes!("../testdata/linode.csv");
pub const MAXMIND_ASN_CSV: &[u8] = include_bytes!("../testdata/GeoLite2-ASN-CSV_20220705.zip");
pub const MAXMIND_ASN_CSV_NAME: &str = "GeoLite2-ASN-CSV_20220705.zip";
pub const OCI: &[u8] = include_bytes!("../testdata/oci.json");
pub const VULTR: &[u8] = include_bytes!("../testdata/vultr.json");
pub const ZSCALER: &[u8] = include_bytes!("../testdata/zscaler.json");

/// Announced-prefixes responses by ASN.
pub const RIPESTAT: &[(u32, &[u8])] = &[
    (9009, include_bytes!("../testdata/ripestat-AS9009.json")),
    (12876, include_bytes!("../testdata/ripestat-AS12876.json")),
    (16276, include_bytes!("../testdata/ripestat-AS16276.json")),
    (24940, include_bytes!("../testdata/ripestat-AS24940.json")),
    (29447, include_bytes!("../testdata/ripestat-AS29447.json")),
    (35540, include_bytes!("../testdata/ripestat-AS35540.json")),
    (212317, include_bytes!("../testdata/ripestat-AS212317.json")),
    (213230, include_bytes!("../testdata/ripestat-AS213230.json")),
];

fn ok(body: &[u8]) -> RawResponse {
    RawResponse::new(200, body.to_vec())
}

/// Mock serving the fixtures of one provider at its real endpoints.
///
/// Requests are matched ignoring the query string where the endpoint takes
/// user-supplied parameters (API keys, editions). The MaxMind mock serves
/// the ASN edition only.
pub fn mock_transport(short_name: &str) -> Option<MockTransport> {
    let mock = MockTransport::new();
    let url = |name: &str| provider::descriptor(name).map(|d| d.download_url).unwrap_or_default();

    match short_name {
        "abuseipdb" => mock.route(url("abuseipdb"), ok(ABUSEIPDB)),
        "aws" => mock.route(url("aws"), ok(AWS)),
        "azure" => {
            mock.route(provider::AZURE_MIRROR_URL, ok(AZURE));
            mock.route(provider::AZURE_DOWNLOAD_PAGE_URL, ok(AZURE_DOWNLOAD_PAGE));
            if let Some(link) = std::str::from_utf8(AZURE_DOWNLOAD_PAGE)
                .ok()
                .and_then(provider::process::azure_download_url)
            {
                mock.route(&link, ok(AZURE));
            }
        }
        "bingbot" => mock.route(url("bingbot"), ok(BINGBOT)),
        "cloudflare" => {
            mock.route(provider::CLOUDFLARE_IPV4_URL, ok(CLOUDFLARE_IPV4));
            mock.route(provider::CLOUDFLARE_IPV6_URL, ok(CLOUDFLARE_IPV6));
        }
        "digitalocean" => mock.route(url("digitalocean"), ok(DIGITALOCEAN)),
        "fastly" => mock.route(url("fastly"), ok(FASTLY)),
        "gcp" => mock.route(url("gcp"), ok(GCP)),
        "github" => mock.route(url("github"), ok(GITHUB)),
        "google" => mock.route(url("google"), ok(GOOGLE)),
        "googlebot" => mock.route(url("googlebot"), ok(GOOGLEBOT)),
        "googlesc" => mock.route(url("googlesc"), ok(GOOGLESC)),
        "googleutf" => mock.route(url("googleutf"), ok(GOOGLEUTF)),
        "hetzner" | "m247" | "ovh" | "scaleway" => {
            for (asn, body) in RIPESTAT {
                mock.route(&RIPESTAT_URL_TEMPLATE.replace("{asn}", &asn.to_string()), ok(body));
            }
        }
        "icloudpr" => mock.route(url("icloudpr"), ok(ICLOUDPR)),
        "linode" => mock.route(url("linode"), ok(LINODE)),
        "maxmind" => {
            let mut response = ok(MAXMIND_ASN_CSV);
            response.headers.insert(
                "content-disposition",
                HeaderValue::from_static("attachment; filename=GeoLite2-ASN-CSV_20220705.zip"),
            );
            mock.route(url("maxmind"), response);
        }
        "oci" => mock.route(url("oci"), ok(OCI)),
        "vultr" => mock.route(url("vultr"), ok(VULTR)),
        "zscaler" => mock.route(url("zscaler"), ok(ZSCALER)),
        _ => return None,
    }
    Some(mock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::http::HttpClient;
    use crate::render::render;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_every_publishable_provider_renders_from_fixtures() {
        let config = HttpConfig::default().with_retry_max(0).with_retry_wait(Duration::ZERO, Duration::ZERO);
        let names: Vec<&str> = provider::descriptors()
            .iter()
            .map(|d| d.short_name)
            .filter(|n| !provider::UNPUBLISHED.contains(n))
            .collect();

        for name in names {
            let mock = mock_transport(name).unwrap();
            let client = HttpClient::with_transport(Arc::new(mock), config.clone());
            let provider = provider::keyless(name, &client).unwrap();
            let document = provider.fetch().unwrap_or_else(|e| panic!("{}: {}", name, e));
            let format = provider.descriptor().default_format;
            let bytes = render(&document, format).unwrap_or_else(|e| panic!("{}: {}", name, e));
            assert!(!bytes.is_empty(), "{}", name);
            assert!(!document.doc.prefixes().is_empty(), "{}", name);
        }
    }

    #[test]
    fn test_unknown_provider() {
        assert!(mock_transport("nope").is_none());
        assert!(mock_transport("url").is_none());
    }

    #[test]
    fn test_maxmind_name_matches_fixture() {
        assert_eq!(
            provider::process::maxmind_version(MAXMIND_ASN_CSV_NAME).unwrap(),
            "20220705"
        );
    }
}
