//! Per-session, per-document-type result cache with a 24-hour TTL.
//!
//! Kept in-process and session-scoped by design: a restart loses caches and
//! users regenerate, which is an accepted privacy tradeoff rather than a
//! limitation to work around.

use chrono::{DateTime, Utc};
use finsight_core::{CacheConfig, CachedInsights, DocumentType, SessionId};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Cache usage counters, mirroring the shape the store crate's own
/// `CacheStats` would take if this were a pluggable backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entry_count: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// `Status(session_id)` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionCacheStatus {
    pub has_transaction_insights: bool,
    pub has_financial_insights: bool,
    pub transaction_expires_at: Option<DateTime<Utc>>,
    pub financial_expires_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// In-memory session cache. Safe for concurrent readers and writers: all
/// access goes through a single `RwLock` over the whole map, which is
/// sufficient at this cache's scale (bounded by active sessions, not by
/// document volume).
pub struct SessionCache {
    entries: RwLock<HashMap<(SessionId, DocumentType), CachedInsights>>,
    counters: RwLock<Counters>,
    ttl_hours: i64,
}

impl SessionCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            counters: RwLock::new(Counters::default()),
            ttl_hours: config.ttl_hours,
        }
    }

    /// `Put(session_id, document_type, agent_map)` — sets
    /// `expires_at = now + 24h` (or whatever TTL this cache was built with).
    pub async fn put(
        &self,
        session_id: SessionId,
        document_type: DocumentType,
        results: HashMap<finsight_core::AgentCategory, finsight_core::AgentResult>,
        now: DateTime<Utc>,
    ) -> CachedInsights {
        let cached = CachedInsights {
            results,
            generated_at: now,
            expires_at: now + chrono::Duration::hours(self.ttl_hours),
        };
        self.entries
            .write()
            .await
            .insert((session_id, document_type), cached.clone());
        cached
    }

    /// `Get(session_id, document_type) -> agent_map?` — returns `None` when
    /// absent or expired; expired entries are purged on access.
    pub async fn get(
        &self,
        session_id: SessionId,
        document_type: DocumentType,
        now: DateTime<Utc>,
    ) -> Option<CachedInsights> {
        let key = (session_id, document_type);
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(cached) if !cached.is_expired_at(now) => {
                    let cached = cached.clone();
                    drop(entries);
                    self.counters.write().await.hits += 1;
                    return Some(cached);
                }
                Some(_) => {}
                None => {
                    drop(entries);
                    self.counters.write().await.misses += 1;
                    return None;
                }
            }
        }
        // Expired: purge, then count as a miss.
        self.entries.write().await.remove(&key);
        let mut counters = self.counters.write().await;
        counters.misses += 1;
        counters.evictions += 1;
        None
    }

    /// `Clear(session_id, document_type?)` — removes matching entries.
    pub async fn clear(&self, session_id: SessionId, document_type: Option<DocumentType>) {
        let mut entries = self.entries.write().await;
        match document_type {
            Some(document_type) => {
                entries.remove(&(session_id, document_type));
            }
            None => {
                entries.retain(|(sid, _), _| *sid != session_id);
            }
        }
    }

    pub async fn status(&self, session_id: SessionId, now: DateTime<Utc>) -> SessionCacheStatus {
        let entries = self.entries.read().await;
        let transactions = entries.get(&(session_id, DocumentType::Transactions));
        let financial = entries.get(&(session_id, DocumentType::Financial));
        SessionCacheStatus {
            has_transaction_insights: transactions.is_some_and(|c| !c.is_expired_at(now)),
            has_financial_insights: financial.is_some_and(|c| !c.is_expired_at(now)),
            transaction_expires_at: transactions.map(|c| c.expires_at),
            financial_expires_at: financial.map(|c| c.expires_at),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let counters = self.counters.read().await;
        let entry_count = self.entries.read().await.len() as u64;
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            entry_count,
            evictions: counters.evictions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finsight_core::EntityIdType;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-08-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[tokio::test]
    async fn entry_is_readable_before_ttl_and_gone_after() {
        let cache = SessionCache::new(CacheConfig { ttl_hours: 24 });
        let session = SessionId::new_v4();
        let t0 = now();

        cache
            .put(session, DocumentType::Transactions, HashMap::new(), t0)
            .await;

        let just_before_expiry = t0 + chrono::Duration::hours(23) + chrono::Duration::minutes(59);
        assert!(cache
            .get(session, DocumentType::Transactions, just_before_expiry)
            .await
            .is_some());

        let just_after_expiry = t0 + chrono::Duration::hours(24) + chrono::Duration::minutes(1);
        assert!(cache
            .get(session, DocumentType::Transactions, just_after_expiry)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn status_reports_per_document_type_independently() {
        let cache = SessionCache::new(CacheConfig::default());
        let session = SessionId::new_v4();
        let t0 = now();
        cache
            .put(session, DocumentType::Transactions, HashMap::new(), t0)
            .await;

        let status = cache.status(session, t0).await;
        assert!(status.has_transaction_insights);
        assert!(!status.has_financial_insights);
    }

    #[tokio::test]
    async fn clear_without_document_type_removes_every_entry_for_the_session() {
        let cache = SessionCache::new(CacheConfig::default());
        let session = SessionId::new_v4();
        let t0 = now();
        cache
            .put(session, DocumentType::Transactions, HashMap::new(), t0)
            .await;
        cache
            .put(session, DocumentType::Financial, HashMap::new(), t0)
            .await;

        cache.clear(session, None).await;

        let status = cache.status(session, t0).await;
        assert!(!status.has_transaction_insights);
        assert!(!status.has_financial_insights);
    }
}
