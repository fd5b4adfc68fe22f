//! Expands a range specification into the hosts a sweep should probe.

use std::net::IpAddr;
use std::str::FromStr;

use cidr_utils::cidr::{IpCidr, IpInet};
use log::debug;

use crate::error::InvalidRangeError;

/// Largest range the sweep will enumerate unless configured otherwise (a /16).
pub const DEFAULT_MAX_HOSTS: u64 = 65_536;

/// Parses `spec` and returns the usable hosts of its network, in address order.
///
/// Host bits do not need to be zero: `10.0.0.7/24` sweeps `10.0.0.0/24`.
/// A bare address, or a /32 (/128 for IPv6), is a range of exactly one host.
///
/// ```rust
/// # use pivoter::address::{enumerate, DEFAULT_MAX_HOSTS};
/// let hosts = enumerate("10.10.110.0/30", DEFAULT_MAX_HOSTS).unwrap();
/// assert_eq!(hosts.len(), 2);
/// ```
pub fn enumerate(spec: &str, max_hosts: u64) -> Result<Vec<IpAddr>, InvalidRangeError> {
    let network = parse_network(spec)?;

    let addresses = address_count(&network);
    if addresses > u128::from(max_hosts) {
        return Err(InvalidRangeError::TooLarge {
            spec: spec.to_owned(),
            addresses,
            limit: max_hosts,
        });
    }

    let all = network.iter().map(|inet| inet.address());
    let hosts: Vec<IpAddr> = match (network.first_address(), host_bits(&network)) {
        // /31, /32, /127 and /128 have no network or broadcast address to drop.
        (_, 0..=1) => all.collect(),
        (IpAddr::V4(_), _) => {
            let last = addresses - 1;
            all.enumerate()
                .filter(|(index, _)| *index != 0 && *index as u128 != last)
                .map(|(_, address)| address)
                .collect()
        }
        // IPv6 has no broadcast, only the subnet-router anycast address.
        (IpAddr::V6(_), _) => all.skip(1).collect(),
    };

    debug!("Range {} expands to {} usable hosts", spec, hosts.len());
    Ok(hosts)
}

/// Parses the network part of `spec` without enumerating anything.
fn parse_network(spec: &str) -> Result<IpCidr, InvalidRangeError> {
    let spec = spec.trim();
    let malformed = |reason: String| InvalidRangeError::Malformed {
        spec: spec.to_owned(),
        reason,
    };

    let Some((address, prefix)) = spec.split_once('/') else {
        let address = IpAddr::from_str(spec).map_err(|e| malformed(e.to_string()))?;
        return Ok(IpCidr::new_host(address));
    };

    // Full addresses only: `10.1/16` is not shorthand for `10.1.0.0/16`.
    let address = IpAddr::from_str(address).map_err(|e| malformed(e.to_string()))?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed(format!("invalid prefix length `{prefix}`")));
    }
    let prefix = u8::from_str(prefix)
        .map_err(|_| malformed(format!("invalid prefix length `{prefix}`")))?;

    IpInet::new(address, prefix)
        .map(|inet| inet.network())
        .map_err(|e| malformed(e.to_string()))
}

fn host_bits(network: &IpCidr) -> u8 {
    let family_bits = match network.first_address() {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    family_bits - network.network_length()
}

fn address_count(network: &IpCidr) -> u128 {
    match host_bits(network) {
        128 => u128::MAX,
        bits => 1u128 << bits,
    }
}

#[cfg(test)]
mod tests {
    use super::{enumerate, DEFAULT_MAX_HOSTS};
    use crate::error::InvalidRangeError;
    use parameterized::parameterized;
    use std::net::{IpAddr, Ipv4Addr};

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn slash_30_drops_network_and_broadcast() {
        let hosts = enumerate("10.10.110.0/30", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(hosts, [v4(10, 10, 110, 1), v4(10, 10, 110, 2)]);
    }

    #[test]
    fn slash_24_has_254_hosts_in_order() {
        let hosts = enumerate("192.168.1.0/24", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(hosts.len(), 254);
        assert_eq!(hosts.first(), Some(&v4(192, 168, 1, 1)));
        assert_eq!(hosts.last(), Some(&v4(192, 168, 1, 254)));
        assert!(!hosts.contains(&v4(192, 168, 1, 0)));
        assert!(!hosts.contains(&v4(192, 168, 1, 255)));
    }

    #[test]
    fn host_bits_are_masked_off() {
        let strict = enumerate("10.0.0.0/29", DEFAULT_MAX_HOSTS).unwrap();
        let loose = enumerate("10.0.0.5/29", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(strict, loose);
        assert_eq!(loose.len(), 6);
    }

    #[parameterized(spec = {
        "10.0.0.9/32", "10.0.0.9", " 10.0.0.9 ",
    })]
    fn single_address_is_one_host(spec: &str) {
        let hosts = enumerate(spec, DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(hosts, [v4(10, 0, 0, 9)]);
    }

    #[test]
    fn slash_31_keeps_both_addresses() {
        let hosts = enumerate("10.0.0.8/31", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(hosts, [v4(10, 0, 0, 8), v4(10, 0, 0, 9)]);
    }

    #[test]
    fn ipv6_skips_subnet_router_anycast() {
        let hosts = enumerate("fd00::/126", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(
            hosts,
            ["fd00::1", "fd00::2", "fd00::3"]
                .iter()
                .map(|h| h.parse::<IpAddr>().unwrap())
                .collect::<Vec<_>>()
        );
        assert_eq!(enumerate("fd00::1/128", DEFAULT_MAX_HOSTS).unwrap().len(), 1);
    }

    #[parameterized(spec = {
        "", "im_wrong", "300.10.1.1/24", "10.0.0.0/33", "10.0.0.0/", "10.0.0/24", "fd00::/129",
        "10/8", "10.1/32", "10.0.0.0/+8", "10.0.0.0/24/1", "/24",
    })]
    fn malformed_ranges_are_rejected(spec: &str) {
        assert!(matches!(
            enumerate(spec, DEFAULT_MAX_HOSTS),
            Err(InvalidRangeError::Malformed { .. })
        ));
    }

    #[test]
    fn oversized_ranges_are_rejected_before_enumeration() {
        let err = enumerate("10.0.0.0/8", DEFAULT_MAX_HOSTS).unwrap_err();
        assert_eq!(
            err,
            InvalidRangeError::TooLarge {
                spec: "10.0.0.0/8".to_owned(),
                addresses: 1 << 24,
                limit: DEFAULT_MAX_HOSTS,
            }
        );
        assert!(err.to_string().contains("--max-hosts"));
        assert!(enumerate("fd00::/64", DEFAULT_MAX_HOSTS).is_err());
        assert_eq!(enumerate("10.0.0.0/16", DEFAULT_MAX_HOSTS).unwrap().len(), 65_534);
    }

    #[test]
    fn raised_limit_admits_larger_ranges() {
        assert_eq!(enumerate("10.0.0.0/15", 1 << 17).unwrap().len(), (1 << 17) - 2);
    }
}
