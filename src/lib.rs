/* src/lib.rs */

//! # Client IP Detection
//!
//! Spoof-resistant detection of the client IP address of an HTTP request.
//!
//! Clients control every header they send, so a forwarding header is only
//! believed as far as it was written by proxies you trust. Detection runs an
//! ordered chain of detectors, newest first, and takes the first usable address.
//!
//! ## Features
//!
//! - Connection peer address detector (always present by default)
//! - Trusted-header detector for headers your edge proxy overwrites, like `X-Real-IP`
//! - `X-Forwarded-For` detector that walks the proxy chain backwards, accepting
//!   it only from trusted peers and stopping at the first untrusted hop
//! - Custom detectors
//! - Axum middleware with rejection and callback hooks via the `axum` feature
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use clientip::{ClientIpDetector, RequestMeta};
//! use clientip::trust::trust_ips;
//!
//! let proxy = "10.0.0.1".parse().unwrap();
//! let detector = ClientIpDetector::new()
//!     .with_trusted_header("X-Real-IP")
//!     .with_xff(trust_ips([proxy]));
//!
//! // A direct client cannot spoof X-Forwarded-For.
//! let direct = RequestMeta::new()
//!     .with_remote_addr("198.51.100.4:51000")
//!     .with_header("X-Forwarded-For", "203.0.113.1");
//! assert_eq!(detector.detect(&direct), Some("198.51.100.4".parse().unwrap()));
//!
//! // Through the proxy, the hop in front of it is the client.
//! let proxied = RequestMeta::new()
//!     .with_remote_addr("10.0.0.1:40000")
//!     .with_header("X-Forwarded-For", "192.0.2.9, 203.0.113.1");
//! assert_eq!(detector.detect(&proxied), Some("203.0.113.1".parse().unwrap()));
//! ```

pub mod detector;
pub mod error;
pub mod forwarded;
pub mod request;
pub mod trust;

#[cfg(feature = "axum")]
pub mod middleware;

pub use detector::{ClientIpDetector, Detector, remote_addr_detector, trusted_header_detector};
pub use error::{ClientIpError, Result};
pub use forwarded::{X_FORWARDED_FOR, xff_detector};
pub use request::{HeaderMap, RequestMeta, parse_ip, parse_remote_addr};
pub use trust::TrustPredicate;

#[cfg(feature = "axum")]
pub use middleware::{ClientIp, ClientIpLayer, ClientIpService};

/// Re-export commonly used types
pub use std::net::IpAddr;
