// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Request-local propagation of [`tpf_ir::context::PipelineContext`] across hops.
//!
//! Storage preference per the propagation contract: the runtime's native async-local
//! (`tokio::task_local!`) is used here since every run executes on the Tokio runtime;
//! a thread-local fallback is not required by this crate's supported host runtime.
//! The slot is always cleared on completion or cancellation by [`with_context`].

use tpf_ir::context::{CacheStatus, PipelineContext};

tokio::task_local! {
    static CURRENT_CONTEXT: std::cell::RefCell<PipelineContext>;
    static CURRENT_CACHE_STATUS: std::cell::Cell<Option<CacheStatus>>;
}

/// Runs `body` with `context` bound to the current task-local slot for its duration.
/// The slot (both the propagated context and the recorded cache status) is cleared
/// unconditionally when `body` returns, panics, or is cancelled, since it lives only
/// as long as the `scope` future itself.
pub async fn with_context<F, R>(context: PipelineContext, body: F) -> R
where
    F: std::future::Future<Output = R>,
{
    CURRENT_CONTEXT
        .scope(std::cell::RefCell::new(context), async move {
            CURRENT_CACHE_STATUS
                .scope(std::cell::Cell::new(None), body)
                .await
        })
        .await
}

/// Reads the currently-bound context, if any. Returns `None` when called outside a
/// [`with_context`] scope (e.g. outside any in-flight call).
pub fn try_current() -> Option<PipelineContext> {
    CURRENT_CONTEXT
        .try_with(|cell| cell.borrow().clone())
        .ok()
}

/// Records the cache status observed for the current hop, consumed by the cache
/// policy enforcer before the next step receives its input. A no-op outside a
/// [`with_context`] scope.
pub fn record_cache_status(status: CacheStatus) {
    let _ = CURRENT_CACHE_STATUS.try_with(|cell| cell.set(Some(status)));
}

/// Takes the cache status recorded for the current hop, clearing it so the next
/// hop starts from a clean slate. Returns `None` if nothing was recorded.
pub fn take_cache_status() -> Option<CacheStatus> {
    CURRENT_CACHE_STATUS
        .try_with(|cell| cell.take())
        .unwrap_or(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn context_is_readable_only_within_its_scope() {
        assert!(try_current().is_none());

        let context = PipelineContext {
            version: Some("v1".to_string()),
            replay: false,
            cache_policy: None,
        };
        with_context(context.clone(), async {
            assert_eq!(try_current(), Some(context));
        })
        .await;

        assert!(try_current().is_none());
    }

    #[tokio::test]
    async fn cache_status_round_trips_and_clears_on_take() {
        with_context(PipelineContext::default(), async {
            assert_eq!(take_cache_status(), None);
            record_cache_status(CacheStatus::Hit);
            assert_eq!(take_cache_status(), Some(CacheStatus::Hit));
            assert_eq!(take_cache_status(), None);
        })
        .await;
    }
}
