//! In-memory session registry

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use promptlink_common::{RelayError, RelayResult, SessionId, SessionSummary};

use crate::session::SessionHandle;

/// Owns every session for the lifetime of the process (or until swept)
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<SessionId, Arc<SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: Arc<SessionHandle>) {
        self.sessions.insert(handle.id().clone(), handle);
    }

    pub fn get(&self, id: &SessionId) -> RelayResult<Arc<SessionHandle>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RelayError::session_not_found(id.as_str()))
    }

    pub fn remove(&self, id: &SessionId) -> Option<Arc<SessionHandle>> {
        self.sessions.remove(id).map(|(_, handle)| handle)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Session summaries, newest first
    pub async fn list(&self) -> Vec<SessionSummary> {
        // Collect handles first so no map shard stays locked across awaits
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.summary().await);
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Drop terminal sessions that completed more than `ttl` ago.
    ///
    /// Returns the number of sessions removed.
    pub async fn cleanup_expired(&self, ttl: Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365 * 100));
        let now = Utc::now();

        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect();

        let mut removed = 0;
        for handle in handles {
            let session = handle.snapshot().await;
            let expired = session.is_terminal()
                && session
                    .completed_at
                    .map(|done| now.signed_duration_since(done) >= ttl)
                    .unwrap_or(false);
            if expired && self.remove(handle.id()).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Cleaned up {} expired sessions", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use promptlink_common::{AgentDescriptor, AgentOutcome, Strategy};

    async fn completed_handle() -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(Session::new("p", Strategy::Panel, 1)));
        handle.start().await.unwrap();
        let agent = AgentDescriptor::new("a", "A", "vendor/a");
        handle.record(AgentOutcome::success(&agent, "ok")).await.unwrap();
        handle.finish().await.unwrap();
        handle
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = SessionStore::new();
        let result = store.get(&SessionId::from_string("missing"));
        assert!(matches!(result, Err(RelayError::NotFound { .. })));
    }

    #[tokio::test]
    async fn cleanup_only_removes_expired_terminal_sessions() {
        let store = SessionStore::new();
        let done = completed_handle().await;
        let running = Arc::new(SessionHandle::new(Session::new("p", Strategy::Chain, 2)));
        running.start().await.unwrap();

        store.insert(done.clone());
        store.insert(running.clone());

        assert_eq!(store.cleanup_expired(Duration::from_secs(3600)).await, 0);
        assert_eq!(store.cleanup_expired(Duration::ZERO).await, 1);
        assert!(store.get(done.id()).is_err());
        assert!(store.get(running.id()).is_ok());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = SessionStore::new();
        let first = completed_handle().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = completed_handle().await;
        store.insert(first.clone());
        store.insert(second.clone());

        let ids: Vec<String> = store.list().await.into_iter().map(|s| s.session_id).collect();
        assert_eq!(ids, vec![second.id().to_string(), first.id().to_string()]);
    }
}
