/* src/forwarded.rs */

//! Trusted-proxy walk over `X-Forwarded-For`.
//!
//! Each proxy appends the address it received the request from, so the header
//! reads `client, proxy1, proxy2` with the hop closest to us last. Any hop
//! can be lied about by whoever sits in front of it, so the chain is read from
//! the end and only as far as the hops are trusted.

use std::net::IpAddr;

use tracing::{debug, trace};

use crate::request::{RequestMeta, parse_ip, parse_remote_addr};
use crate::trust::TrustPredicate;

/// Name of the forwarding header.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Flatten every `X-Forwarded-For` value into one ordered chain.
///
/// Values are split on commas in header order. Tokens that do not parse stay
/// in the chain as `None` so the walk still stops at them.
pub fn forwarded_chain(meta: &RequestMeta) -> Vec<Option<IpAddr>> {
    meta.header_values(X_FORWARDED_FOR)
        .flat_map(|value| value.split(','))
        .map(|token| match parse_ip(token) {
            Ok(ip) => Some(ip),
            Err(err) => {
                trace!(error = %err, "Unparseable X-Forwarded-For entry");
                None
            }
        })
        .collect()
}

/// Outcome of walking a forwarding chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainWalk {
    /// Nearest hop that is not a trusted proxy.
    Untrusted(IpAddr),
    /// Every hop was trusted; holds the outermost entry.
    AllTrusted(IpAddr),
    /// The walk ran into an unparseable entry before finding an untrusted hop.
    Broken,
    /// No entries.
    Empty,
}

impl ChainWalk {
    /// The address this outcome attributes the request to, if any.
    pub fn ip(self) -> Option<IpAddr> {
        match self {
            ChainWalk::Untrusted(ip) | ChainWalk::AllTrusted(ip) => Some(ip),
            ChainWalk::Broken | ChainWalk::Empty => None,
        }
    }
}

/// Walk the chain from the closest hop outward.
pub fn walk_chain(chain: &[Option<IpAddr>], trusted: &dyn Fn(IpAddr) -> bool) -> ChainWalk {
    for hop in chain.iter().rev() {
        match *hop {
            None => return ChainWalk::Broken,
            Some(ip) if !trusted(ip) => return ChainWalk::Untrusted(ip),
            Some(_) => {}
        }
    }

    match chain.first() {
        Some(Some(ip)) => ChainWalk::AllTrusted(*ip),
        // A leading placeholder would have stopped the walk above.
        Some(None) => ChainWalk::Broken,
        None => ChainWalk::Empty,
    }
}

/// Detector reading `X-Forwarded-For`, but only when the connection peer
/// itself satisfies `trusted`.
///
/// An untrusted or unknown peer gets no say through forwarding headers at all.
/// A broken chain yields nothing, leaving the decision to lower-priority
/// detectors (by default the peer address).
pub fn xff_detector(
    trusted: TrustPredicate,
) -> impl Fn(&RequestMeta) -> Option<IpAddr> + Send + Sync {
    move |meta: &RequestMeta| {
        let peer = meta.remote_addr().map(parse_remote_addr)?.ok()?;
        if !trusted(peer) {
            if meta.header(X_FORWARDED_FOR).is_some() {
                debug!(%peer, "Ignoring X-Forwarded-For from untrusted peer");
            }
            return None;
        }

        let chain = forwarded_chain(meta);
        let walk = walk_chain(&chain, trusted.as_ref());
        trace!(%peer, hops = chain.len(), ?walk, "Walked X-Forwarded-For chain");
        walk.ip()
    }
}
