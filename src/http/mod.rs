//! HTTP access layer.
//!
//! All provider traffic goes through [`HttpClient`], which owns:
//! - bounded retries with exponential backoff
//! - the 429 quota rule (never retried)
//! - per-request deadlines
//! - transparent `Content-Encoding: gzip` decoding
//! - secret masking in every log line and error string that reproduces a URL
//!
//! The network itself sits behind the [`Transport`] trait so tests and the
//! `IP_FETCHER_MOCK_<PROVIDER>` switch can substitute [`MockTransport`].

mod client;
mod disposition;
mod mask;
mod mock;
mod transport;

pub use client::{resolve_download_path, HttpClient};
pub use disposition::{parse_content_disposition, ContentDisposition};
pub use mask::mask_secrets;
pub use mock::{MockReply, MockTransport};
pub use transport::{Method, RawResponse, ReqwestTransport, Request, Transport};

pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
