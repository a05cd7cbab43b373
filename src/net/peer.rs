//! Peer identity for admission control.
//!
//! # Responsibilities
//! - Group remote peers into network keys for the per-peer connection cap
//! - Detect loopback peers, which are exempt from that cap
//!
//! # Design Decisions
//! - IPv4 peers are keyed by full address, IPv6 peers by /56 prefix
//!   (one customer site typically receives a /56 delegation)
//! - IPv4-mapped IPv6 peers are keyed as their IPv4 address, so dual-stack
//!   listeners count a v4 client the same way on either socket family

use std::net::{IpAddr, Ipv6Addr};

/// Grouping key identifying the network a peer belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PeerKey {
    /// Unix-domain peer; all local clients share one key.
    Unix,
    /// IPv4 peer, keyed by full address.
    V4(std::net::Ipv4Addr),
    /// IPv6 peer, keyed by the first 56 bits of the address.
    V6([u8; 7]),
}

impl PeerKey {
    /// Derive the key for a remote IP address.
    pub fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => PeerKey::V4(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => PeerKey::V4(v4),
                None => {
                    let octets = v6.octets();
                    let mut prefix = [0u8; 7];
                    prefix.copy_from_slice(&octets[..7]);
                    PeerKey::V6(prefix)
                }
            },
        }
    }
}

impl std::fmt::Display for PeerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerKey::Unix => write!(f, "unix"),
            PeerKey::V4(addr) => write!(f, "{}", addr),
            PeerKey::V6(prefix) => {
                let mut octets = [0u8; 16];
                octets[..7].copy_from_slice(prefix);
                write!(f, "{}/56", Ipv6Addr::from(octets))
            }
        }
    }
}

/// Whether a peer address is loopback for cap-exemption purposes.
///
/// Covers IPv4 `127.0.0.0/8`, IPv6 `::1`, and IPv4-mapped
/// `::ffff:127.0.0.0/104`.
pub fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.to_ipv4_mapped().is_some_and(|v4| v4.is_loopback())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_v4_key_is_full_address() {
        let a = PeerKey::from_ip("10.0.0.1".parse().unwrap());
        let b = PeerKey::from_ip("10.0.0.2".parse().unwrap());
        assert_ne!(a, b);
        assert_eq!(a, PeerKey::V4(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_v6_key_is_56_bit_prefix() {
        let a = PeerKey::from_ip("2001:db8:aaaa:bb01::1".parse().unwrap());
        let b = PeerKey::from_ip("2001:db8:aaaa:bb42::9".parse().unwrap());
        let c = PeerKey::from_ip("2001:db8:bbbb:bb01::1".parse().unwrap());
        // Same /56, different low bits: same key.
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mapped_v4_keys_as_v4() {
        let mapped = PeerKey::from_ip("::ffff:10.0.0.1".parse().unwrap());
        let plain = PeerKey::from_ip("10.0.0.1".parse().unwrap());
        assert_eq!(mapped, plain);
    }

    #[test]
    fn test_display() {
        assert_eq!(PeerKey::Unix.to_string(), "unix");
        assert_eq!(
            PeerKey::from_ip("10.1.2.3".parse().unwrap()).to_string(),
            "10.1.2.3"
        );
        assert_eq!(
            PeerKey::from_ip("2001:db8::1".parse().unwrap()).to_string(),
            "2001:db8::/56"
        );
    }

    #[test]
    fn test_loopback_detection() {
        assert!(is_loopback("127.0.0.1".parse().unwrap()));
        assert!(is_loopback("127.255.0.9".parse().unwrap()));
        assert!(is_loopback("::1".parse().unwrap()));
        assert!(is_loopback("::ffff:127.0.0.1".parse().unwrap()));
        assert!(!is_loopback("10.0.0.1".parse().unwrap()));
        assert!(!is_loopback("::2".parse().unwrap()));
        assert!(!is_loopback("::ffff:10.0.0.1".parse().unwrap()));
    }
}
