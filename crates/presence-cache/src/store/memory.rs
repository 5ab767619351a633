//! In-process key-value store
//!
//! Expiry is measured on the tokio clock, so paused-time tests can advance it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::key_value::{KeyTtl, KeyValueStore, ScanPage};
use crate::pool::{RedisPoolError, RedisResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Key-value store held in memory.
///
/// Keys are kept ordered; a scan cursor is the position of the next key to examine.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the backing store were down
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Write a key with no expiry
    pub fn set_persistent(&self, key: &str, value: &str) {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> RedisResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RedisPoolError::ConnectionNotAvailable)
        } else {
            Ok(())
        }
    }

    fn live_value(entries: &mut BTreeMap<String, Entry>, key: &str) -> Option<String> {
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

/// Glob match supporting `*` and `?`, as used by `SCAN MATCH`
fn glob_match(pattern: &str, candidate: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let c: Vec<char> = candidate.chars().collect();
    let (mut pi, mut ci) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ci < c.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == c[ci]) {
            pi += 1;
            ci += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ci));
            pi += 1;
        } else if let Some((sp, sc)) = star {
            pi = sp + 1;
            ci = sc + 1;
            star = Some((sp, sc + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&ch| ch == '*')
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> RedisResult<Option<String>> {
        self.check()?;
        Ok(Self::live_value(&mut self.entries.lock(), key))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> RedisResult<()> {
        self.check()?;
        if ttl_secs == 0 {
            return Err(RedisPoolError::InvalidArgument("TTL must be positive".to_string()));
        }
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn mget(&self, keys: &[String]) -> RedisResult<Vec<Option<String>>> {
        self.check()?;
        let mut entries = self.entries.lock();
        Ok(keys
            .iter()
            .map(|key| Self::live_value(&mut entries, key))
            .collect())
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> RedisResult<ScanPage> {
        self.check()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.is_live(now));

        let start = cursor as usize;
        let end = start.saturating_add(count.max(1));
        let keys = entries
            .keys()
            .skip(start)
            .take(end - start)
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        let next = if end >= entries.len() { 0 } else { end as u64 };

        Ok(ScanPage { cursor: next, keys })
    }

    async fn expire(&self, key: &str, ttl_secs: u64) -> RedisResult<bool> {
        self.check()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) => {
                entry.expires_at = Some(now + Duration::from_secs(ttl_secs));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> RedisResult<KeyTtl> {
        self.check()?;
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(match entries.get(key) {
            Some(entry) if entry.is_live(now) => match entry.expires_at {
                None => KeyTtl::Persistent,
                // nearest second, as Redis reports it
                Some(at) => {
                    let millis = at.saturating_duration_since(now).as_millis();
                    KeyTtl::Seconds(((millis + 500) / 1000) as u64)
                }
            },
            _ => KeyTtl::Missing,
        })
    }

    async fn del(&self, key: &str) -> RedisResult<bool> {
        self.check()?;
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn ping(&self) -> RedisResult<()> {
        self.check()
    }
}
