//! Test fixtures and data generators

use std::sync::atomic::{AtomicU64, Ordering};

use presence_core::{TenantId, UserId};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// A tenant no other test uses
pub fn unique_tenant() -> TenantId {
    TenantId::parse(format!("tenant{}", unique_suffix())).expect("valid tenant id")
}

pub fn user(raw: &str) -> UserId {
    UserId::parse(raw).expect("valid user id")
}
