/* src/trust.rs */

//! Ready-made trust predicates for [`ClientIpDetector::with_xff`].
//!
//! A predicate answers "is this address one of my proxies". Anything more
//! specific than these helpers is just a closure.
//!
//! [`ClientIpDetector::with_xff`]: crate::ClientIpDetector::with_xff

use std::net::{IpAddr, Ipv6Addr};
use std::sync::Arc;

/// Shared predicate deciding whether an address is a trusted proxy hop.
pub type TrustPredicate = Arc<dyn Fn(IpAddr) -> bool + Send + Sync>;

/// Trust exactly the given addresses.
///
/// Addresses are canonicalized, so an IPv4-mapped IPv6 entry matches its IPv4
/// form and vice versa.
///
/// # Examples
///
/// ```rust
/// use clientip::trust::trust_ips;
///
/// let trusted = trust_ips(["10.0.0.1".parse().unwrap()]);
/// assert!(trusted("::ffff:10.0.0.1".parse().unwrap()));
/// assert!(!trusted("10.0.0.2".parse().unwrap()));
/// ```
pub fn trust_ips(ips: impl IntoIterator<Item = IpAddr>) -> TrustPredicate {
    let ips: Vec<IpAddr> = ips.into_iter().map(|ip| ip.to_canonical()).collect();
    Arc::new(move |ip: IpAddr| ips.contains(&ip.to_canonical()))
}

/// Trust loopback, private, link-local and unique-local addresses.
pub fn trust_private() -> TrustPredicate {
    Arc::new(is_private_ip)
}

/// Trust nothing. Forwarding headers are never used.
pub fn trust_none() -> TrustPredicate {
    Arc::new(|_: IpAddr| false)
}

/// Trust every hop. The outermost forwarded address always wins, which is only
/// safe when the service is unreachable except through proxies you control.
pub fn trust_all() -> TrustPredicate {
    Arc::new(|_: IpAddr| true)
}

/// Check if IP is private/internal.
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local(),
        IpAddr::V6(ipv6) => {
            ipv6.is_loopback() || is_unique_local(ipv6) || is_unicast_link_local(ipv6)
        }
    }
}

/// `fc00::/7`
fn is_unique_local(ip: Ipv6Addr) -> bool {
    ip.segments()[0] & 0xfe00 == 0xfc00
}

/// `fe80::/10`
fn is_unicast_link_local(ip: Ipv6Addr) -> bool {
    ip.segments()[0] & 0xffc0 == 0xfe80
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_trust_ips() {
        let trusted = trust_ips([ip("10.137.0.0"), ip("2001:db8::1")]);
        assert!(trusted(ip("10.137.0.0")));
        assert!(trusted(ip("2001:db8::1")));
        assert!(!trusted(ip("10.137.0.1")));
    }

    #[test]
    fn test_trust_private() {
        let trusted = trust_private();
        assert!(trusted(ip("10.1.2.3")));
        assert!(trusted(ip("192.168.1.1")));
        assert!(trusted(ip("127.0.0.1")));
        assert!(trusted(ip("fd00::1")));
        assert!(trusted(ip("fe80::1")));
        assert!(trusted(ip("::ffff:172.16.0.1")));
        assert!(!trusted(ip("203.0.113.7")));
        assert!(!trusted(ip("2001:db8::1")));
        assert!(!trusted(ip("fec0::1")));
        assert!(!trusted(ip("fe00::1")));
    }

    #[test]
    fn test_trust_none_and_all() {
        assert!(!trust_none()(ip("127.0.0.1")));
        assert!(trust_all()(ip("203.0.113.7")));
    }
}
