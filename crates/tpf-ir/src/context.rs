// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The per-call context propagated across transport hops.

use serde::{Deserialize, Serialize};

/// Per-request cache policy, carried in [`PipelineContext`] and enforced by the
/// cache policy enforcer on each unary-output item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CachePolicy {
    /// Pass through unchanged, preserving any recorded cache status. The default.
    PreferCache,
    /// Fail the item if no cache hit was recorded for this hop.
    CacheOnly,
    /// Substitute the cached value if a hit was recorded; otherwise pass through.
    SkipIfPresent,
    /// Fail the item with a cache-miss error if no cache hit was recorded.
    RequireCache,
    /// Pass through unchanged and clear any recorded cache status.
    BypassCache,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy::PreferCache
    }
}

/// The cache status recorded for a single hop, consumed by the cache policy enforcer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheStatus {
    /// A cached value was found and used.
    Hit,
    /// No cached value was found.
    Miss,
    /// Caching was bypassed for this hop.
    Bypass,
    /// The result of this hop was stored into the cache.
    Stored,
}

impl CacheStatus {
    /// The wire value carried in the `x-tpf-cache-status` response header.
    #[must_use]
    pub const fn header_value(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
            CacheStatus::Stored => "STORED",
        }
    }
}

/// The per-in-flight-operation context carried across transport hops via
/// `x-tpf-version`, `x-tpf-replay` and `x-tpf-cache-policy` headers.
///
/// Cleared on completion or cancellation by whichever interceptor bound it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineContext {
    /// An optional caller-supplied version tag, propagated unchanged.
    pub version: Option<String>,
    /// Whether this call is a replay of a previously-recorded operation.
    pub replay: bool,
    /// The cache policy to enforce for this call, if any was supplied.
    pub cache_policy: Option<CachePolicy>,
}

impl PipelineContext {
    /// The effective cache policy for this context: the declared policy, or the
    /// default (`PREFER_CACHE`) if none was supplied.
    #[must_use]
    pub fn effective_cache_policy(&self) -> CachePolicy {
        self.cache_policy.unwrap_or_default()
    }
}

/// Header name for the outbound version tag.
pub const HEADER_VERSION: &str = "x-tpf-version";
/// Header name for the outbound replay flag.
pub const HEADER_REPLAY: &str = "x-tpf-replay";
/// Header name for the outbound cache policy.
pub const HEADER_CACHE_POLICY: &str = "x-tpf-cache-policy";
/// Header name for the inbound cache status response.
pub const HEADER_CACHE_STATUS: &str = "x-tpf-cache-status";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_cache_policy_is_prefer_cache() {
        let context = PipelineContext::default();
        assert_eq!(context.effective_cache_policy(), CachePolicy::PreferCache);
    }

    #[test]
    fn cache_status_header_values_match_the_wire_contract() {
        assert_eq!(CacheStatus::Hit.header_value(), "HIT");
        assert_eq!(CacheStatus::Miss.header_value(), "MISS");
        assert_eq!(CacheStatus::Bypass.header_value(), "BYPASS");
        assert_eq!(CacheStatus::Stored.header_value(), "STORED");
    }
}
