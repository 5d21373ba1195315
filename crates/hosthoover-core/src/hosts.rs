//! Subnet expansion into host addresses

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::IpNetwork;

use crate::error::CoreError;

/// Largest number of hosts a single run may target
pub const MAX_HOSTS: u128 = 65_536;

/// Usable host addresses of a subnet, in ascending order.
///
/// IPv4 drops the network and broadcast addresses except for /31 (both
/// addresses) and /32 (the single address). IPv6 drops the subnet-router
/// anycast address except for /127 and /128.
pub fn enumerate(range: &str) -> Result<Vec<IpAddr>, CoreError> {
    let invalid = |reason: String| CoreError::InvalidRange {
        range: range.to_string(),
        reason,
    };

    let network: IpNetwork = range.trim().parse().map_err(|e| invalid(format!("{e}")))?;

    let hosts: Vec<IpAddr> = match network {
        IpNetwork::V4(net) => {
            let host_bits = 32 - u32::from(net.prefix());
            let base = u32::from(net.network());
            let (first, count) = match host_bits {
                0 => (base, 1u64),
                1 => (base, 2),
                bits => (base + 1, (1u64 << bits) - 2),
            };
            if u128::from(count) > MAX_HOSTS {
                return Err(invalid(format!(
                    "{count} hosts exceeds the limit of {MAX_HOSTS}"
                )));
            }
            (0..count)
                .map(|offset| IpAddr::V4(Ipv4Addr::from(first + offset as u32)))
                .collect()
        }
        IpNetwork::V6(net) => {
            let host_bits = 128 - u32::from(net.prefix());
            if host_bits > 17 {
                return Err(invalid(format!(
                    "/{} holds more than {MAX_HOSTS} hosts",
                    net.prefix()
                )));
            }
            let base = u128::from(net.network());
            let (first, count) = match host_bits {
                0 => (base, 1u128),
                1 => (base, 2),
                bits => (base + 1, (1u128 << bits) - 1),
            };
            if count > MAX_HOSTS {
                return Err(invalid(format!(
                    "{count} hosts exceeds the limit of {MAX_HOSTS}"
                )));
            }
            (0..count)
                .map(|offset| IpAddr::V6(Ipv6Addr::from(first + offset)))
                .collect()
        }
    };

    if hosts.is_empty() {
        return Err(invalid("no usable host addresses".into()));
    }
    Ok(hosts)
}
