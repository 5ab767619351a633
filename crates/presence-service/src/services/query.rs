//! Presence reads for clients

use std::collections::HashMap;

use tracing::instrument;

use presence_cache::{OnlinePage, PresenceStore};
use presence_common::PresenceConfig;
use presence_core::{DomainError, PresenceRecord, UserId};

use super::error::{ServiceError, ServiceResult};

/// Read-side presence operations with request validation
#[derive(Debug, Clone)]
pub struct PresenceQueryService {
    store: PresenceStore,
    max_batch: usize,
}

impl PresenceQueryService {
    pub fn new(store: PresenceStore, config: &PresenceConfig) -> Self {
        Self {
            store,
            max_batch: config.max_batch,
        }
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    /// Records for the requested users. Ids without a record are left out.
    #[instrument(skip(self, user_ids), fields(count = user_ids.len()))]
    pub async fn get_presence(
        &self,
        user_ids: &[UserId],
    ) -> ServiceResult<HashMap<UserId, PresenceRecord>> {
        if user_ids.len() > self.max_batch {
            return Err(ServiceError::validation(format!(
                "at most {} user ids per request",
                self.max_batch
            )));
        }
        soften(self.store.get_many_presence(user_ids).await, "get presence")
    }

    /// One page of online users; follow `next_cursor` until it returns to `0`
    #[instrument(skip(self))]
    pub async fn get_online_users(&self, limit: usize, cursor: u64) -> ServiceResult<OnlinePage> {
        if limit == 0 || limit > self.max_batch {
            return Err(ServiceError::validation(format!(
                "limit must be between 1 and {}",
                self.max_batch
            )));
        }
        soften(self.store.scan_online(cursor, limit).await, "get online users")
    }
}

/// An unreachable store reads as empty
fn soften<T: Default>(result: Result<T, DomainError>, operation: &'static str) -> ServiceResult<T> {
    match result {
        Ok(value) => Ok(value),
        Err(e) if e.is_transient() => {
            tracing::warn!(operation, error = %e, "Presence store unavailable");
            Ok(T::default())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_cache::MemoryStore;
    use presence_core::{run_with_tenant, DeviceInfo, PresenceStatus, TenantId};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    fn tid(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    fn service() -> (Arc<MemoryStore>, PresenceStore, PresenceQueryService) {
        let kv = Arc::new(MemoryStore::new());
        let store = PresenceStore::new(kv.clone());
        let query = PresenceQueryService::new(store.clone(), &PresenceConfig::default());
        (kv, store, query)
    }

    async fn seed(store: &PresenceStore, users: &[(&str, PresenceStatus)]) {
        for (user, status) in users {
            let record = PresenceRecord::new(uid(user), *status, DeviceInfo::default());
            store.set_presence(&uid(user), &record, 60).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_get_presence_returns_only_known_users() {
        let (_, store, query) = service();
        run_with_tenant(tid("acme"), async {
            seed(&store, &[("a", PresenceStatus::Online), ("b", PresenceStatus::Offline)]).await;

            let found = query
                .get_presence(&[uid("a"), uid("b"), uid("zed")])
                .await
                .unwrap();
            assert_eq!(found.len(), 2);
            assert!(!found.contains_key(&uid("zed")));
        })
        .await;
    }

    #[tokio::test]
    async fn test_get_presence_rejects_oversized_batch() {
        let (_, _, query) = service();
        let ids: Vec<UserId> = (0..101).map(|i| uid(&format!("u{i}"))).collect();
        let err = run_with_tenant(tid("acme"), query.get_presence(&ids))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_online_users_paginate_without_duplicates() {
        let (_, store, query) = service();
        run_with_tenant(tid("acme"), async {
            let users: Vec<String> = (0..25).map(|i| format!("u{i:02}")).collect();
            for user in &users {
                seed(&store, &[(user.as_str(), PresenceStatus::Online)]).await;
            }
            seed(&store, &[("gone", PresenceStatus::Offline)]).await;

            let mut seen = HashSet::new();
            let mut cursor = 0;
            loop {
                let page = query.get_online_users(7, cursor).await.unwrap();
                for record in page.records {
                    assert!(seen.insert(record.user_id));
                }
                cursor = page.next_cursor;
                if cursor == 0 {
                    break;
                }
            }
            assert_eq!(seen.len(), 25);
        })
        .await;
    }

    #[tokio::test]
    async fn test_online_users_limit_bounds() {
        let (_, _, query) = service();
        run_with_tenant(tid("acme"), async {
            assert!(query.get_online_users(0, 0).await.unwrap_err().is_validation());
            assert!(query.get_online_users(101, 0).await.unwrap_err().is_validation());
        })
        .await;
    }

    #[tokio::test]
    async fn test_store_outage_reads_as_empty() {
        let (kv, _, query) = service();
        kv.set_unavailable(true);
        run_with_tenant(tid("acme"), async {
            assert!(query.get_presence(&[uid("a")]).await.unwrap().is_empty());
            let page = query.get_online_users(10, 0).await.unwrap();
            assert!(page.records.is_empty());
            assert_eq!(page.next_cursor, 0);
        })
        .await;
    }

    #[tokio::test]
    async fn test_unscoped_read_is_rejected() {
        let (_, _, query) = service();
        assert!(query.get_presence(&[uid("a")]).await.unwrap_err().is_security());
    }
}
