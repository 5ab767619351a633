//! Presence records in the key-value store.
//!
//! Records live under `presence:{tenant}:{user}`. The tenant always comes from the
//! ambient binding, so two tenants never share a key and a scan never crosses into
//! another tenant's records.

use std::collections::{BTreeSet, HashMap};

use presence_core::{
    require_tenant, DomainError, DomainResult, PresenceRecord, TenantId, UserId,
};

use crate::pool::RedisPoolError;
use crate::store::{KeyTtl, SharedKeyValueStore};

/// Key prefix for user presence
pub const PRESENCE_PREFIX: &str = "presence:";

/// One page of online users
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnlinePage {
    pub records: Vec<PresenceRecord>,
    /// `0` once the scan has covered the whole tenant
    pub next_cursor: u64,
}

/// Tenant-scoped presence record store
#[derive(Clone)]
pub struct PresenceStore {
    kv: SharedKeyValueStore,
}

impl std::fmt::Debug for PresenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceStore").finish_non_exhaustive()
    }
}

impl PresenceStore {
    #[must_use]
    pub fn new(kv: SharedKeyValueStore) -> Self {
        Self { kv }
    }

    /// Key for a user's record within a tenant
    #[must_use]
    pub fn presence_key(tenant_id: &TenantId, user_id: &UserId) -> String {
        format!("{PRESENCE_PREFIX}{tenant_id}:{user_id}")
    }

    /// Scan pattern covering one tenant's records
    #[must_use]
    pub fn tenant_pattern(tenant_id: &TenantId) -> String {
        format!("{PRESENCE_PREFIX}{tenant_id}:*")
    }

    fn key(operation: &str, user_id: &UserId) -> DomainResult<String> {
        let tenant_id = require_tenant(operation)?;
        Ok(Self::presence_key(&tenant_id, user_id))
    }

    fn decode(key: &str, raw: &str) -> Option<PresenceRecord> {
        match serde_json::from_str(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable presence record");
                None
            }
        }
    }

    /// Write a user's record with an expiry
    pub async fn set_presence(
        &self,
        user_id: &UserId,
        record: &PresenceRecord,
        ttl_secs: u64,
    ) -> DomainResult<()> {
        let key = Self::key("set presence", user_id)?;
        let value = serde_json::to_string(record).map_err(RedisPoolError::from)?;
        self.kv.set_ex(&key, &value, ttl_secs).await?;

        tracing::debug!(
            user_id = %user_id,
            status = %record.status,
            ttl_secs,
            "Set user presence"
        );
        Ok(())
    }

    /// A user's record, if one has not expired
    pub async fn get_presence(&self, user_id: &UserId) -> DomainResult<Option<PresenceRecord>> {
        let key = Self::key("get presence", user_id)?;
        let raw = self.kv.get(&key).await?;
        Ok(raw.and_then(|raw| Self::decode(&key, &raw)))
    }

    /// Records for every id that has one, fetched in a single round trip
    pub async fn get_many_presence(
        &self,
        user_ids: &[UserId],
    ) -> DomainResult<HashMap<UserId, PresenceRecord>> {
        let tenant_id = require_tenant("get many presence")?;
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = user_ids
            .iter()
            .map(|user_id| Self::presence_key(&tenant_id, user_id))
            .collect();
        let values = self.kv.mget(&keys).await?;

        Ok(user_ids
            .iter()
            .zip(keys.iter().zip(values))
            .filter_map(|(user_id, (key, raw))| {
                let record = Self::decode(key, &raw?)?;
                Some((user_id.clone(), record))
            })
            .collect())
    }

    /// One page of this tenant's non-offline records.
    ///
    /// Start with cursor `0` and pass back `next_cursor` until it is `0` again. A
    /// page may be empty while the cursor is non-zero.
    pub async fn scan_online(&self, cursor: u64, page_size: usize) -> DomainResult<OnlinePage> {
        let page = self.scan_records("scan online", cursor, page_size).await?;
        Ok(OnlinePage {
            records: page
                .records
                .into_iter()
                .filter(|record| record.status.is_live())
                .collect(),
            next_cursor: page.next_cursor,
        })
    }

    /// One page of all this tenant's records, offline ones included
    pub async fn scan_records(
        &self,
        operation: &str,
        cursor: u64,
        page_size: usize,
    ) -> DomainResult<OnlinePage> {
        let tenant_id = require_tenant(operation)?;
        let scan = self
            .kv
            .scan(cursor, &Self::tenant_pattern(&tenant_id), page_size)
            .await?;

        let records = if scan.keys.is_empty() {
            Vec::new()
        } else {
            let values = self.kv.mget(&scan.keys).await?;
            scan.keys
                .iter()
                .zip(values)
                .filter_map(|(key, raw)| Self::decode(key, &raw?))
                .collect()
        };

        Ok(OnlinePage {
            records,
            next_cursor: scan.cursor,
        })
    }

    /// Every tenant that currently holds at least one record.
    ///
    /// This is the one read that is not tenant-scoped; it yields tenant ids only,
    /// never records. Keys whose tenant segment does not parse are skipped.
    pub async fn tenants_with_records(&self, page_size: usize) -> DomainResult<Vec<TenantId>> {
        let pattern = format!("{PRESENCE_PREFIX}*");
        let mut tenants = BTreeSet::new();
        let mut cursor = 0;

        loop {
            let scan = self.kv.scan(cursor, &pattern, page_size.max(1)).await?;
            tenants.extend(scan.keys.iter().filter_map(|key| Self::tenant_of(key)));
            cursor = scan.cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(tenants.into_iter().collect())
    }

    fn tenant_of(key: &str) -> Option<TenantId> {
        let (tenant, _) = key.strip_prefix(PRESENCE_PREFIX)?.split_once(':')?;
        TenantId::parse(tenant).ok()
    }

    /// Set the expiry of a user's record. Returns false if there is no record.
    pub async fn set_expiry(&self, user_id: &UserId, ttl_secs: u64) -> DomainResult<bool> {
        let key = Self::key("set presence expiry", user_id)?;
        Ok(self.kv.expire(&key, ttl_secs).await?)
    }

    /// Remaining lifetime of a user's record
    pub async fn ttl(&self, user_id: &UserId) -> DomainResult<KeyTtl> {
        let key = Self::key("read presence ttl", user_id)?;
        Ok(self.kv.ttl(&key).await?)
    }

    /// Drop a user's record
    pub async fn remove(&self, user_id: &UserId) -> DomainResult<bool> {
        let key = Self::key("remove presence", user_id)?;
        Ok(self.kv.del(&key).await?)
    }

    /// Whether the backing store answers
    pub async fn ping(&self) -> Result<(), DomainError> {
        Ok(self.kv.ping().await?)
    }
}
