//! ip-fetcher - fetch, normalise and publish provider IP ranges.
//!
//! Cloud platforms, CDNs, hosting companies, crawlers and security feeds
//! each publish the address ranges they use, every one in its own format.
//! This crate downloads those feeds, parses them into typed documents and
//! renders them back out as upstream bytes, JSON, YAML, CSV or one prefix
//! per line.
//!
//! # Features
//!
//! - **Provider adapters**: 24 feeds behind one [`Provider`] contract
//! - **Canonical prefixes**: [`Prefix`] rejects host bits and promotes bare
//!   addresses to host routes
//! - **Resilient HTTP**: bounded retries, quota detection and secret masking
//! - **Replaceable transport**: every adapter runs offline against
//!   [`http::MockTransport`]
//! - **Publishing**: change-detecting commits into a git working tree plus a
//!   generated index
//!
//! # Quick Start
//!
//! ```ignore
//! use ip_fetcher::{provider, render, Format, HttpClient, HttpConfig};
//!
//! let client = HttpClient::new(HttpConfig::default())?;
//! let oci = provider::keyless("oci", &client).unwrap();
//! let document = oci.fetch()?;
//! let lines = render(&document, Format::Lines)?;
//! ```
//!
//! # Offline use
//!
//! Setting `IP_FETCHER_MOCK_<PROVIDER>=true` makes the command line serve
//! that provider from the fixtures embedded in [`fixtures`].

mod error;
mod prefix;

pub mod config;
pub mod doc;
pub mod fixtures;
pub mod http;
pub mod provider;
pub mod publish;
pub mod render;
pub mod save;
pub mod timestamp;
pub mod unzip;

// Re-export core types
pub use error::{Error, Result, TransportError};
pub use prefix::Prefix;

pub use config::{HttpConfig, PublishConfig};
pub use doc::{Doc, Document};
pub use http::HttpClient;
pub use provider::{Descriptor, HostCategory, Provider};
pub use render::{render, Format};
