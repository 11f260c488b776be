//! Utility module
//!
//! This module provides common helpers used by every transport: turning a
//! `host:port` string into exactly one socket address.

use std::net::SocketAddr;

use tokio::net::lookup_host;

use crate::core::{Error, Result};

/// Resolves `addr` and requires exactly one candidate
///
/// An empty lookup is a [`Error::Resolve`]; more than one distinct candidate is
/// an [`Error::AmbiguousAddress`] rather than a silent pick.
pub async fn resolve_unique(addr: &str) -> Result<SocketAddr> {
    let mut candidates: Vec<SocketAddr> = lookup_host(addr)
        .await
        .map_err(|e| Error::resolve(addr, e))?
        .collect();
    candidates.sort();
    candidates.dedup();

    match candidates.as_slice() {
        [] => Err(Error::resolve(addr, "no addresses returned")),
        [single] => Ok(*single),
        many => Err(Error::AmbiguousAddress {
            addr: addr.to_string(),
            count: many.len(),
        }),
    }
}
