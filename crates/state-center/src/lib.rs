use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use accessaudit_core_types::{AuditId, SessionId};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use perceiver_hub::AuditRecord;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("audit {0} already recorded")]
    DuplicateAudit(AuditId),
}

/// Audit history per browsing session. Records are immutable once appended.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn append(&self, record: Arc<AuditRecord>) -> Result<(), StoreError>;

    /// Records of one session in append order.
    fn history(&self, session: &SessionId) -> Vec<Arc<AuditRecord>>;

    /// Most recent audit of `url` in the session, if any.
    fn latest_for_url(&self, session: &SessionId, url: &str) -> Option<Arc<AuditRecord>>;

    /// Drops a session; returns how many records it held.
    fn end_session(&self, session: &SessionId) -> usize;

    /// Drops sessions untouched for longer than `max_idle`; returns how many.
    fn evict_idle(&self, max_idle: Duration) -> usize;

    fn session_count(&self) -> usize;
}

#[derive(Debug)]
struct SessionHistory {
    records: Vec<Arc<AuditRecord>>,
    latest_by_url: HashMap<String, usize>,
    last_touched: Instant,
}

impl SessionHistory {
    fn new() -> Self {
        Self {
            records: Vec::new(),
            latest_by_url: HashMap::new(),
            last_touched: Instant::now(),
        }
    }

    fn push(&mut self, record: Arc<AuditRecord>) -> Result<(), StoreError> {
        if self.records.iter().any(|r| r.id == record.id) {
            return Err(StoreError::DuplicateAudit(record.id.clone()));
        }
        self.latest_by_url
            .insert(record.url.clone(), self.records.len());
        self.records.push(record);
        self.last_touched = Instant::now();
        Ok(())
    }
}

/// Sharded in-memory store; sessions never contend on a global lock.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<SessionId, RwLock<SessionHistory>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn evict_idle_at(&self, now: Instant, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|session, history| {
            let idle = now.saturating_duration_since(history.read().last_touched);
            let keep = idle <= max_idle;
            if !keep {
                debug!(session = %session, idle_ms = idle.as_millis() as u64, "evicting idle session");
            }
            keep
        });
        before.saturating_sub(self.sessions.len())
    }

    pub fn record_count(&self) -> usize {
        self.sessions
            .iter()
            .map(|entry| entry.value().read().records.len())
            .sum()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn append(&self, record: Arc<AuditRecord>) -> Result<(), StoreError> {
        let session = record.session.clone();
        if let Some(entry) = self.sessions.get(&session) {
            return entry.value().write().push(record);
        }
        let entry = self
            .sessions
            .entry(session)
            .or_insert_with(|| RwLock::new(SessionHistory::new()));
        let result = entry.value().write().push(record);
        result
    }

    fn history(&self, session: &SessionId) -> Vec<Arc<AuditRecord>> {
        self.sessions
            .get(session)
            .map(|entry| entry.value().read().records.clone())
            .unwrap_or_default()
    }

    fn latest_for_url(&self, session: &SessionId, url: &str) -> Option<Arc<AuditRecord>> {
        let entry = self.sessions.get(session)?;
        let history = entry.value().read();
        history
            .latest_by_url
            .get(url)
            .and_then(|&index| history.records.get(index))
            .cloned()
    }

    fn end_session(&self, session: &SessionId) -> usize {
        self.sessions
            .remove(session)
            .map(|(_, history)| history.into_inner().records.len())
            .unwrap_or(0)
    }

    fn evict_idle(&self, max_idle: Duration) -> usize {
        self.evict_idle_at(Instant::now(), max_idle)
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
