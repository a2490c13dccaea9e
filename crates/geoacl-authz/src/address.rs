//! CIDR address ranges used by the `address_range` rule dimension.
//!
//! # Purpose
//! Parses `network/prefix` signatures and answers containment checks for a
//! request's source address.
//!
//! # Key invariants
//! - The stored network is always masked to its prefix, so two signatures
//!   naming the same block compare equal (`10.0.0.7/8 == 10.0.0.0/8`).
//! - IPv4 ranges only contain IPv4 addresses; IPv4-mapped IPv6 addresses are
//!   unwrapped before comparison.
//!
//! # Examples
//! ```rust
//! use geoacl_authz::IpAddressRange;
//!
//! let range: IpAddressRange = "10.10.100.0/24".parse().expect("cidr");
//! assert!(range.contains(&"10.10.100.4".parse().unwrap()));
//! assert!(!range.contains(&"10.10.1.4".parse().unwrap()));
//! ```
use crate::{AuthzError, AuthzResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IpAddressRange {
    network: IpAddr,
    prefix: u8,
}

impl IpAddressRange {
    pub fn new(address: IpAddr, prefix: u8) -> AuthzResult<Self> {
        let max = max_prefix(&address);
        if prefix > max {
            return Err(AuthzError::InvalidAddressRange(format!(
                "{address}/{prefix}: prefix exceeds {max}"
            )));
        }
        Ok(Self {
            network: mask(address, prefix),
            prefix,
        })
    }

    pub fn network(&self) -> IpAddr {
        self.network
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    pub fn contains(&self, address: &IpAddr) -> bool {
        let address = match address {
            IpAddr::V6(v6) => v6
                .to_ipv4_mapped()
                .map(IpAddr::V4)
                .unwrap_or(IpAddr::V6(*v6)),
            v4 => *v4,
        };
        match (self.network, address) {
            (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => {
                mask(address, self.prefix) == self.network
            }
            _ => false,
        }
    }
}

fn max_prefix(address: &IpAddr) -> u8 {
    match address {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask(address: IpAddr, prefix: u8) -> IpAddr {
    match address {
        IpAddr::V4(v4) => {
            let bits = u32::from(v4);
            let masked = if prefix == 0 {
                0
            } else {
                bits & (u32::MAX << (32 - u32::from(prefix)))
            };
            IpAddr::V4(Ipv4Addr::from(masked))
        }
        IpAddr::V6(v6) => {
            let bits = u128::from(v6);
            let masked = if prefix == 0 {
                0
            } else {
                bits & (u128::MAX << (128 - u32::from(prefix)))
            };
            IpAddr::V6(Ipv6Addr::from(masked))
        }
    }
}

impl FromStr for IpAddressRange {
    type Err = AuthzError;

    fn from_str(value: &str) -> AuthzResult<Self> {
        let value = value.trim();
        let (address, prefix) = match value.split_once('/') {
            Some((address, prefix)) => (address, Some(prefix)),
            None => (value, None),
        };
        let address: IpAddr = address
            .parse()
            .map_err(|_| AuthzError::InvalidAddressRange(value.to_string()))?;
        let prefix = match prefix {
            Some(prefix) => prefix
                .parse::<u8>()
                .map_err(|_| AuthzError::InvalidAddressRange(value.to_string()))?,
            // A bare address is a single-host range.
            None => max_prefix(&address),
        };
        Self::new(address, prefix)
    }
}

impl TryFrom<String> for IpAddressRange {
    type Error = AuthzError;

    fn try_from(value: String) -> AuthzResult<Self> {
        value.parse()
    }
}

impl From<IpAddressRange> for String {
    fn from(value: IpAddressRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for IpAddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}
