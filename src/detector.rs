/* src/detector.rs */

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::forwarded::xff_detector;
use crate::request::{RequestMeta, parse_ip, parse_remote_addr};
use crate::trust::TrustPredicate;

/// A single detection strategy.
pub type Detector = Arc<dyn Fn(&RequestMeta) -> Option<IpAddr> + Send + Sync>;

/// Ordered chain of detectors.
///
/// Detectors are tried from the most recently added back to the first one, and
/// the first present, specified address wins. The default chain holds only the
/// connection peer detector, so anything added afterwards takes precedence
/// over it.
///
/// # Examples
///
/// ```rust
/// use clientip::{ClientIpDetector, RequestMeta};
/// use clientip::trust::trust_ips;
///
/// let detector = ClientIpDetector::new()
///     .with_xff(trust_ips(["10.0.0.1".parse().unwrap()]));
///
/// let request = RequestMeta::new()
///     .with_remote_addr("10.0.0.1:52100")
///     .with_header("X-Forwarded-For", "203.0.113.7");
///
/// assert_eq!(detector.detect(&request), Some("203.0.113.7".parse().unwrap()));
/// ```
#[derive(Clone)]
pub struct ClientIpDetector {
    detectors: Vec<Detector>,
}

impl Default for ClientIpDetector {
    fn default() -> Self {
        Self::empty().with_detector(remote_addr_detector)
    }
}

impl fmt::Debug for ClientIpDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientIpDetector")
            .field("detectors", &self.detectors.len())
            .finish()
    }
}

impl ClientIpDetector {
    /// Create a detector chain holding only the connection peer detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chain with no detectors at all, not even the peer address.
    pub fn empty() -> Self {
        Self {
            detectors: Vec::new(),
        }
    }

    /// Add a custom detector. It runs before every detector added earlier.
    pub fn with_detector<F>(mut self, detector: F) -> Self
    where
        F: Fn(&RequestMeta) -> Option<IpAddr> + Send + Sync + 'static,
    {
        self.detectors.push(Arc::new(detector));
        self
    }

    /// Add a detector reading the first value of `name`.
    ///
    /// Clients can set any header they like. Only use this for a header your
    /// edge proxy always overwrites, such as `X-Real-IP`.
    pub fn with_trusted_header(self, name: impl Into<String>) -> Self {
        self.with_detector(trusted_header_detector(name.into()))
    }

    /// Add a detector walking `X-Forwarded-For` back through the proxies
    /// accepted by `trusted`.
    ///
    /// The header is only consulted when the connection peer itself is
    /// trusted. Reading `X-Forwarded-For` without that check lets any client
    /// spoof its address.
    pub fn with_xff(self, trusted: TrustPredicate) -> Self {
        self.with_detector(xff_detector(trusted))
    }

    /// Number of configured detectors.
    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    /// Whether no detector is configured.
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Run the chain against a request.
    pub fn detect(&self, meta: &RequestMeta) -> Option<IpAddr> {
        for (index, detector) in self.detectors.iter().enumerate().rev() {
            match detector(meta) {
                Some(ip) if !ip.is_unspecified() => {
                    debug!(client_ip = %ip, detector = index, "Detected client IP");
                    return Some(ip);
                }
                Some(ip) => trace!(%ip, detector = index, "Skipping unspecified address"),
                None => {}
            }
        }
        None
    }
}

/// Detector returning the host of the connection peer address.
pub fn remote_addr_detector(meta: &RequestMeta) -> Option<IpAddr> {
    match parse_remote_addr(meta.remote_addr()?) {
        Ok(ip) => Some(ip),
        Err(err) => {
            trace!(error = %err, "Unusable remote address");
            None
        }
    }
}

/// Detector reading the first value of a trusted header.
pub fn trusted_header_detector(
    name: String,
) -> impl Fn(&RequestMeta) -> Option<IpAddr> + Send + Sync + 'static {
    move |meta: &RequestMeta| {
        let value = meta.header(&name)?.trim();
        if value.is_empty() {
            return None;
        }
        parse_ip(value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::{trust_ips, trust_none};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_remote_addr_default() {
        let detector = ClientIpDetector::new();
        let meta = RequestMeta::new().with_remote_addr("10.137.0.0:13456");
        assert_eq!(detector.detect(&meta), Some(ip("10.137.0.0")));
    }

    #[test]
    fn test_unparseable_remote_addr_is_undetermined() {
        let detector = ClientIpDetector::new();
        for addr in ["", "10.137.0.0", "garbage:80", "[::1"] {
            let meta = RequestMeta::new().with_remote_addr(addr);
            assert_eq!(detector.detect(&meta), None, "remote addr {addr:?}");
        }
        assert_eq!(detector.detect(&RequestMeta::new()), None);
    }

    #[test]
    fn test_unspecified_is_never_returned() {
        let detector = ClientIpDetector::new();
        let meta = RequestMeta::new().with_remote_addr("0.0.0.0:80");
        assert_eq!(detector.detect(&meta), None);

        let detector = ClientIpDetector::new().with_trusted_header("X-Real-IP");
        let meta = RequestMeta::new()
            .with_remote_addr("10.0.0.1:80")
            .with_header("X-Real-IP", "::");
        assert_eq!(detector.detect(&meta), Some(ip("10.0.0.1")));
    }

    #[test]
    fn test_last_added_runs_first() {
        let detector = ClientIpDetector::new()
            .with_detector(|_: &RequestMeta| Some(ip("192.0.2.1")))
            .with_detector(|_: &RequestMeta| Some(ip("192.0.2.2")));
        let meta = RequestMeta::new().with_remote_addr("10.0.0.1:80");
        assert_eq!(detector.detect(&meta), Some(ip("192.0.2.2")));
    }

    #[test]
    fn test_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let detector = ClientIpDetector::empty()
            .with_detector(move |_: &RequestMeta| {
                counter.fetch_add(1, Ordering::SeqCst);
                Some(ip("192.0.2.1"))
            })
            .with_detector(|_: &RequestMeta| Some(ip("192.0.2.2")));

        assert_eq!(detector.detect(&RequestMeta::new()), Some(ip("192.0.2.2")));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_falls_through_to_earlier_detectors() {
        let detector = ClientIpDetector::new().with_detector(|_: &RequestMeta| None);
        let meta = RequestMeta::new().with_remote_addr("10.0.0.1:80");
        assert_eq!(detector.detect(&meta), Some(ip("10.0.0.1")));
    }

    #[test]
    fn test_empty_chain_detects_nothing() {
        let detector = ClientIpDetector::empty();
        assert!(detector.is_empty());
        let meta = RequestMeta::new().with_remote_addr("10.0.0.1:80");
        assert_eq!(detector.detect(&meta), None);
    }

    #[test]
    fn test_trusted_header() {
        let detector = ClientIpDetector::new().with_trusted_header("X-Test-Ip");
        let meta = RequestMeta::new()
            .with_remote_addr("10.0.0.1:80")
            .with_header("x-test-ip", " 203.0.113.5 ")
            .with_header("x-test-ip", "203.0.113.6");
        assert_eq!(detector.detect(&meta), Some(ip("203.0.113.5")));
    }

    #[test]
    fn test_trusted_header_invalid_falls_back() {
        let detector = ClientIpDetector::new().with_trusted_header("X-Real-IP");
        for value in ["", "   ", "203.0.113.5, 10.0.0.2", "nope"] {
            let meta = RequestMeta::new()
                .with_remote_addr("10.0.0.1:80")
                .with_header("X-Real-IP", value);
            assert_eq!(detector.detect(&meta), Some(ip("10.0.0.1")), "header {value:?}");
        }
    }

    #[test]
    fn test_broken_xff_resolves_to_peer() {
        let detector = ClientIpDetector::new().with_xff(trust_ips(
            ["10.137.0.0", "10.137.0.6", "10.137.0.5", "10.137.0.4", "10.137.0.3"].map(ip),
        ));
        let meta = RequestMeta::new()
            .with_remote_addr("10.137.0.0:13456")
            .with_header("X-Forwarded-For", "10.137.0.1, 10.137.0.2, 10.137.0.3")
            .with_header("X-Forwarded-For", "10.137.0.4, 10.137.0.5, -, 10.137.0.6");
        assert_eq!(detector.detect(&meta), Some(ip("10.137.0.0")));
    }

    #[test]
    fn test_untrusted_peer_resolves_to_peer() {
        let detector = ClientIpDetector::new().with_xff(trust_none());
        let meta = RequestMeta::new()
            .with_remote_addr("198.51.100.4:443")
            .with_header("X-Forwarded-For", "203.0.113.1");
        assert_eq!(detector.detect(&meta), Some(ip("198.51.100.4")));
    }

    #[test]
    fn test_xff_outranks_trusted_header_when_added_later() {
        let detector = ClientIpDetector::new()
            .with_trusted_header("X-Real-IP")
            .with_xff(trust_ips([ip("10.0.0.1")]));
        let meta = RequestMeta::new()
            .with_remote_addr("10.0.0.1:80")
            .with_header("X-Real-IP", "203.0.113.5")
            .with_header("X-Forwarded-For", "203.0.113.9");
        assert_eq!(detector.detect(&meta), Some(ip("203.0.113.9")));
        assert_eq!(detector.len(), 3);
    }

    #[test]
    fn test_detection_is_idempotent() {
        let detector = ClientIpDetector::new().with_xff(trust_ips([ip("10.0.0.1")]));
        let meta = RequestMeta::new()
            .with_remote_addr("10.0.0.1:80")
            .with_header("X-Forwarded-For", "203.0.113.9, 10.0.0.7");
        assert_eq!(detector.detect(&meta), detector.detect(&meta));
        assert_eq!(detector.detect(&meta), Some(ip("10.0.0.7")));
    }

    #[test]
    fn test_degenerate_xff_values_resolve_to_peer() {
        let detector = ClientIpDetector::new().with_xff(trust_ips([ip("10.0.0.1")]));
        for value in ["0.0.0.0", "", "  "] {
            let meta = RequestMeta::new()
                .with_remote_addr("10.0.0.1:80")
                .with_header("X-Forwarded-For", value);
            assert_eq!(detector.detect(&meta), Some(ip("10.0.0.1")), "xff {value:?}");
        }
    }

    #[test]
    fn test_mapped_peer_is_trusted() {
        let detector = ClientIpDetector::new().with_xff(trust_ips([ip("10.0.0.1")]));
        let meta = RequestMeta::new()
            .with_remote_addr("[::ffff:10.0.0.1]:1")
            .with_header("X-Forwarded-For", "203.0.113.1");
        assert_eq!(detector.detect(&meta), Some(ip("203.0.113.1")));
    }
}
