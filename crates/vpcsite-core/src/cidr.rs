//! IPv4 CIDR helpers

use crate::error::{Result, TopologyError};
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

/// Parse a CIDR block, requiring the address to be the network address
pub fn parse_cidr(cidr: &str) -> Result<Ipv4Network> {
    let network: Ipv4Network = cidr.trim().parse().map_err(|e: ipnetwork::IpNetworkError| {
        TopologyError::InvalidCidr {
            cidr: cidr.to_string(),
            reason: e.to_string(),
        }
    })?;

    if network.ip() != network.network() {
        return Err(TopologyError::InvalidCidr {
            cidr: cidr.to_string(),
            reason: format!("ホスト部が0ではありません ({}/{} を指定してください)", network.network(), network.prefix()),
        });
    }

    Ok(network)
}

/// `0.0.0.0/0`
pub fn any_ipv4() -> Result<Ipv4Network> {
    Ipv4Network::new(Ipv4Addr::UNSPECIFIED, 0).map_err(|e| TopologyError::InvalidCidr {
        cidr: "0.0.0.0/0".to_string(),
        reason: e.to_string(),
    })
}

pub fn overlaps(a: &Ipv4Network, b: &Ipv4Network) -> bool {
    a.contains(b.network()) || b.contains(a.network())
}

/// Whether `inner` lies entirely within `outer`
pub fn contains_network(outer: &Ipv4Network, inner: &Ipv4Network) -> bool {
    outer.prefix() <= inner.prefix() && outer.contains(inner.network())
}

/// Fails with [`TopologyError::CidrOverlap`] when any two blocks share an address
pub fn ensure_disjoint(blocks: &[Ipv4Network]) -> Result<()> {
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            if overlaps(a, b) {
                return Err(TopologyError::CidrOverlap {
                    first: a.to_string(),
                    second: b.to_string(),
                });
            }
        }
    }
    Ok(())
}
