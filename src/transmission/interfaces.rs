//! Host addresses a client can reach the bridge on.

use std::net::{IpAddr, Ipv4Addr};

use tracing::debug;

use super::TransportError;

/// Non-loopback IPv4 addresses of this host, in interface order.
///
/// # Errors
/// Returns [`TransportError::Interfaces`] if the OS refuses to list
/// interfaces.
pub fn ipv4_addresses() -> Result<Vec<Ipv4Addr>, TransportError> {
    let interfaces = local_ip_address::list_afinet_netifas()
        .map_err(|e| TransportError::Interfaces(e.to_string()))?;

    for (name, ip) in &interfaces {
        debug!(interface = %name, %ip, "Found interface address");
    }

    Ok(routable_ipv4(interfaces.into_iter().map(|(_, ip)| ip)))
}

/// Keeps IPv4 addresses a remote client could reach, without duplicates.
pub(crate) fn routable_ipv4(addresses: impl IntoIterator<Item = IpAddr>) -> Vec<Ipv4Addr> {
    let mut selected = Vec::new();
    for address in addresses {
        let IpAddr::V4(v4) = address else {
            continue;
        };
        if v4.is_loopback() || v4.is_unspecified() || selected.contains(&v4) {
            continue;
        }
        selected.push(v4);
    }
    selected
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;

    #[test]
    fn drops_loopback_ipv6_and_duplicates() {
        let input = [
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3)),
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
        ];

        assert_eq!(
            routable_ipv4(input),
            vec![Ipv4Addr::new(192, 168, 1, 20), Ipv4Addr::new(10, 0, 0, 3)]
        );
    }

    #[test]
    fn empty_when_only_loopback() {
        assert!(routable_ipv4([IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2))]).is_empty());
    }
}
