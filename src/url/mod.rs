//! URL handling module
//!
//! Host identity for admission control and the optional host allow-list.

mod domain;

use std::collections::HashSet;

pub use domain::extract_host;

/// Checks a host against an optional allow-list
///
/// With no allow-list every host is allowed. Hosts are compared exactly,
/// after the lowercasing that URL parsing applies.
pub fn is_host_allowed(host: &str, allowed: Option<&HashSet<String>>) -> bool {
    allowed.map_or(true, |hosts| hosts.contains(host))
}
