//! Canonical IP prefixes.

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// An IPv4 or IPv6 CIDR block in canonical form.
///
/// The host bits below the prefix length are always zero. A bare address is
/// accepted wherever a prefix is expected and promoted to a host route
/// (`/32` for IPv4, `/128` for IPv6).
///
/// # Examples
/// ```
/// use ip_fetcher::Prefix;
///
/// let p: Prefix = "104.255.199.22".parse().unwrap();
/// assert_eq!(p.to_string(), "104.255.199.22/32");
/// assert!(p.is_ipv4());
///
/// assert!("10.0.0.1/8".parse::<Prefix>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix(IpNet);

impl Prefix {
    /// Build from an `IpNet`, rejecting one with host bits set.
    pub fn new(net: IpNet) -> Result<Self> {
        if net.trunc() != net {
            return Err(Error::Parse(format!(
                "non-canonical prefix {} (expected {})",
                net,
                net.trunc()
            )));
        }
        Ok(Self(net))
    }

    /// Host route for a single address.
    pub fn host(addr: IpAddr) -> Self {
        Self(IpNet::from(addr))
    }

    /// The wrapped network.
    pub fn net(&self) -> IpNet {
        self.0
    }

    /// Network address.
    pub fn addr(&self) -> IpAddr {
        self.0.network()
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.0, IpNet::V4(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.0, IpNet::V6(_))
    }
}

impl FromStr for Prefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::Parse("empty prefix".to_string()));
        }

        if s.contains('/') {
            // Try parsing as IPv4 CIDR first, then IPv6
            if let Ok(v4net) = s.parse::<Ipv4Net>() {
                return Prefix::new(IpNet::V4(v4net));
            }
            if let Ok(v6net) = s.parse::<Ipv6Net>() {
                return Prefix::new(IpNet::V6(v6net));
            }
            return Err(Error::Parse(format!("invalid CIDR: {}", s)));
        }

        s.parse::<IpAddr>()
            .map(Prefix::host)
            .map_err(|_| Error::Parse(format!("invalid address: {}", s)))
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Prefix> for IpNet {
    fn from(p: Prefix) -> Self {
        p.0
    }
}

impl Serialize for Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Prefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
