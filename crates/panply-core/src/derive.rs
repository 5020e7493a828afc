// ── Derived values ──
//
// Pure helpers that compute config values from resolved inputs.

use std::net::{IpAddr, Ipv6Addr};

use ipnet::IpNet;

use crate::error::CoreError;

/// First usable host of a subnet: the address after the network address.
///
/// The cloud subnet router lives there, so it is the next hop for the
/// untrust default route. Host bits in the input are ignored
/// (`10.0.1.77/24` gives `10.0.1.1`); `/31`, `/32` and `/128` have no
/// separate network address and yield their first address.
pub fn first_usable_host(cidr: &str) -> Result<IpAddr, CoreError> {
    let net: IpNet = cidr.trim().parse().map_err(|e| CoreError::InvalidInput {
        key: "untrust_subnet_cidr".into(),
        reason: format!("'{cidr}' is not a CIDR prefix: {e}"),
    })?;

    match net.trunc() {
        IpNet::V4(v4) => v4.hosts().next().map(IpAddr::V4).ok_or_else(|| {
            CoreError::InvalidInput {
                key: "untrust_subnet_cidr".into(),
                reason: format!("'{cidr}' has no usable host"),
            }
        }),
        IpNet::V6(v6) => {
            let network = u128::from(v6.network());
            let host = if v6.prefix_len() >= 127 {
                network
            } else {
                network + 1
            };
            Ok(IpAddr::V6(Ipv6Addr::from(host)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_24() {
        assert_eq!(first_usable_host("10.0.0.0/24").unwrap().to_string(), "10.0.0.1");
    }

    #[test]
    fn host_bits_are_ignored() {
        assert_eq!(first_usable_host("10.0.1.77/24").unwrap().to_string(), "10.0.1.1");
    }

    #[test]
    fn non_octet_prefix() {
        assert_eq!(
            first_usable_host("10.0.1.128/25").unwrap().to_string(),
            "10.0.1.129"
        );
    }

    #[test]
    fn point_to_point() {
        assert_eq!(first_usable_host("10.0.0.4/31").unwrap().to_string(), "10.0.0.4");
        assert_eq!(first_usable_host("10.0.0.9/32").unwrap().to_string(), "10.0.0.9");
    }

    #[test]
    fn ipv6() {
        assert_eq!(
            first_usable_host("2001:db8:1::/64").unwrap().to_string(),
            "2001:db8:1::1"
        );
    }

    #[test]
    fn rejects_non_cidr() {
        let err = first_usable_host("10.0.0.0").unwrap_err();
        assert!(matches!(err, CoreError::InvalidInput { ref key, .. } if key == "untrust_subnet_cidr"));
    }
}
