//! Ambient tenant binding
//!
//! A tenant id bound with [`run_with_tenant`] is visible to everything the wrapped
//! future polls, including awaited continuations, through [`current_tenant`].
//!
//! The binding is task-local. Work handed to `tokio::spawn` or a timer runs on a
//! different task and starts unbound: capture the `TenantId` value before
//! scheduling and wrap the spawned body in `run_with_tenant` again.

use std::future::Future;

use crate::error::DomainError;
use crate::value_objects::TenantId;

tokio::task_local! {
    static CURRENT_TENANT: TenantId;
}

/// Run `fut` with `tenant` bound as the current tenant.
///
/// Nested calls shadow the outer binding for the duration of the inner future.
pub fn run_with_tenant<F>(tenant: TenantId, fut: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    CURRENT_TENANT.scope(tenant, fut)
}

/// Synchronous counterpart of [`run_with_tenant`]
pub fn sync_with_tenant<R>(tenant: TenantId, f: impl FnOnce() -> R) -> R {
    CURRENT_TENANT.sync_scope(tenant, f)
}

/// The tenant bound to the current unit of work, if any
pub fn current_tenant() -> Option<TenantId> {
    CURRENT_TENANT.try_with(Clone::clone).ok()
}

/// The bound tenant, or a `SecurityViolation` naming the attempted operation
pub fn require_tenant(operation: &str) -> Result<TenantId, DomainError> {
    current_tenant().ok_or_else(|| DomainError::missing_tenant(operation))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[test]
    fn test_absent_outside_scope() {
        assert!(current_tenant().is_none());
        let err = require_tenant("find edges").unwrap_err();
        assert!(err.is_security());
    }

    #[tokio::test]
    async fn test_visible_across_awaits() {
        let seen = run_with_tenant(tenant("acme"), async {
            tokio::task::yield_now().await;
            let first = current_tenant();
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            (first, current_tenant())
        })
        .await;

        assert_eq!(seen.0, Some(tenant("acme")));
        assert_eq!(seen.1, Some(tenant("acme")));
        assert!(current_tenant().is_none());
    }

    #[tokio::test]
    async fn test_nested_scope_shadows_then_restores() {
        run_with_tenant(tenant("outer"), async {
            let inner = run_with_tenant(tenant("inner"), async { current_tenant() }).await;
            assert_eq!(inner, Some(tenant("inner")));
            assert_eq!(current_tenant(), Some(tenant("outer")));
        })
        .await;
    }

    #[tokio::test]
    async fn test_spawned_task_does_not_inherit() {
        let handle = run_with_tenant(tenant("acme"), async {
            tokio::spawn(async { current_tenant() })
        })
        .await;

        assert_eq!(handle.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_spawned_task_reenters_captured_tenant() {
        let handle = run_with_tenant(tenant("acme"), async {
            let captured = current_tenant().unwrap();
            tokio::spawn(run_with_tenant(captured, async { current_tenant() }))
        })
        .await;

        assert_eq!(handle.await.unwrap(), Some(tenant("acme")));
    }

    #[test]
    fn test_sync_scope() {
        let seen = sync_with_tenant(tenant("sync"), current_tenant);
        assert_eq!(seen, Some(tenant("sync")));
        assert!(current_tenant().is_none());
    }
}
