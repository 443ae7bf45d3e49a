/* src/request.rs */

use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::{ClientIpError, Result};

/// Header map used by [`RequestMeta`]: lowercase header name to every raw value
/// received for it, in arrival order.
pub type HeaderMap = HashMap<String, Vec<String>>;

/// The parts of an HTTP request that detectors look at.
///
/// Header names are matched case-insensitively. Repeated headers keep every
/// value in the order they were added, and values are stored raw, so a single
/// value may still hold a comma-separated list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    remote_addr: Option<String>,
    headers: HeaderMap,
}

impl RequestMeta {
    /// Create an empty request view with no peer address and no headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection peer address, in `host:port` form.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = Some(addr.into());
        self
    }

    /// Append a header value, keeping any values already present.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.append_header(name, value);
        self
    }

    /// Append a header value in place.
    pub fn append_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Connection peer address, if known.
    pub fn remote_addr(&self) -> Option<&str> {
        self.remote_addr.as_deref()
    }

    /// All values of a header, in arrival order.
    pub fn header_values(&self, name: &str) -> impl Iterator<Item = &str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// First value of a header.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).next()
    }
}

/// Parse a single address token.
///
/// The token is trimmed and the result canonicalized, so `::ffff:10.0.0.1`
/// and `10.0.0.1` compare equal.
///
/// # Examples
///
/// ```rust
/// use clientip::parse_ip;
///
/// assert_eq!(parse_ip(" 10.0.0.1 ").unwrap(), parse_ip("::ffff:10.0.0.1").unwrap());
/// assert!(parse_ip("-").is_err());
/// ```
pub fn parse_ip(value: &str) -> Result<IpAddr> {
    let value = value.trim();
    value
        .parse::<IpAddr>()
        .map(|ip| ip.to_canonical())
        .map_err(|_| ClientIpError::InvalidIpFormat(value.to_string()))
}

/// Parse the host of a `host:port` peer address as an IP.
pub fn parse_remote_addr(addr: &str) -> Result<IpAddr> {
    let host = split_host(addr.trim())
        .ok_or_else(|| ClientIpError::InvalidRemoteAddr(addr.to_string()))?;
    parse_ip(host).map_err(|_| ClientIpError::InvalidRemoteAddr(addr.to_string()))
}

/// Host part of `host:port` or `[host]:port`. A port separator is required and
/// an unbracketed host may not contain colons.
fn split_host(addr: &str) -> Option<&str> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        if port.contains(':') {
            return None;
        }
        return Some(host);
    }

    let (host, _port) = addr.rsplit_once(':')?;
    if host.contains(':') || host.contains('[') || host.contains(']') {
        return None;
    }
    Some(host)
}
