// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The cache policy enforcer (§4.5): post-processes each per-item result of a
//! unary-output step against the in-flight call's cache policy.

use crate::error::RuntimeError;
use tpf_ir::context::{CacheStatus, CachePolicy};

/// The outcome of enforcing a cache policy against a single item.
pub enum Enforced<T> {
    /// The item is emitted, possibly substituted with a cached value.
    Emit(T),
    /// The item is dropped with no emission and no error (`CACHE_ONLY` miss).
    Drop,
}

/// Applies `policy` to a step's output `item`, given the `status` recorded for this
/// hop and an optional `cached_value` available under `SKIP_IF_PRESENT`.
///
/// Implements the cache policy law from the testable invariants:
/// - `BYPASS_CACHE`: pass through unchanged, clearing recorded status.
/// - `CACHE_ONLY`/`REQUIRE_CACHE` with no hit recorded: fail (`REQUIRE_CACHE`) or
///   drop (`CACHE_ONLY`) the item.
/// - `SKIP_IF_PRESENT` with a hit recorded: substitute the cached value.
/// - `PREFER_CACHE` (default): pass through, preserving recorded status.
pub fn enforce<T>(
    policy: CachePolicy,
    item: T,
    status: Option<CacheStatus>,
    cached_value: Option<T>,
) -> Result<Enforced<T>, RuntimeError> {
    match policy {
        CachePolicy::BypassCache => Ok(Enforced::Emit(item)),
        CachePolicy::PreferCache => Ok(Enforced::Emit(item)),
        CachePolicy::RequireCache => match status {
            Some(CacheStatus::Hit) => Ok(Enforced::Emit(item)),
            _ => Err(RuntimeError::CacheMiss),
        },
        CachePolicy::CacheOnly => match status {
            Some(CacheStatus::Hit) => Ok(Enforced::Emit(item)),
            _ => Ok(Enforced::Drop),
        },
        CachePolicy::SkipIfPresent => match (status, cached_value) {
            (Some(CacheStatus::Hit), Some(cached)) => Ok(Enforced::Emit(cached)),
            _ => Ok(Enforced::Emit(item)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(result: Result<Enforced<i32>, RuntimeError>) -> Option<i32> {
        match result {
            Ok(Enforced::Emit(v)) => Some(v),
            Ok(Enforced::Drop) => None,
            Err(_) => None,
        }
    }

    #[test]
    fn bypass_passes_through() {
        let result = enforce(CachePolicy::BypassCache, 1, Some(CacheStatus::Hit), None);
        assert_eq!(emitted(result), Some(1));
    }

    #[test]
    fn prefer_cache_passes_through_regardless_of_status() {
        let result = enforce(CachePolicy::PreferCache, 1, None, None);
        assert_eq!(emitted(result), Some(1));
    }

    #[test]
    fn skip_if_present_substitutes_cached_value_on_hit() {
        let result = enforce(CachePolicy::SkipIfPresent, 1, Some(CacheStatus::Hit), Some(99));
        assert_eq!(emitted(result), Some(99));
    }

    #[test]
    fn skip_if_present_passes_through_on_miss() {
        let result = enforce(CachePolicy::SkipIfPresent, 1, Some(CacheStatus::Miss), Some(99));
        assert_eq!(emitted(result), Some(1));
    }

    #[test]
    fn require_cache_fails_on_miss() {
        let result = enforce(CachePolicy::RequireCache, 1, Some(CacheStatus::Miss), None);
        assert!(matches!(result, Err(RuntimeError::CacheMiss)));
    }

    #[test]
    fn require_cache_emits_on_hit() {
        let result = enforce(CachePolicy::RequireCache, 1, Some(CacheStatus::Hit), None);
        assert_eq!(emitted(result), Some(1));
    }

    #[test]
    fn cache_only_drops_on_miss() {
        let result = enforce(CachePolicy::CacheOnly, 1, Some(CacheStatus::Miss), None);
        assert!(matches!(result, Ok(Enforced::Drop)));
    }

    #[test]
    fn cache_only_emits_on_hit() {
        let result = enforce(CachePolicy::CacheOnly, 1, Some(CacheStatus::Hit), None);
        assert_eq!(emitted(result), Some(1));
    }
}
