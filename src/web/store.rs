use std::collections::HashMap;
use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use super::traits::{SessionStore, StoreError};
use super::types::Session;
use crate::types::SessionId;

/// Lifetime of a session whose login has not completed.
const DEFAULT_PENDING_TTL: Duration = Duration::minutes(10);
const DEFAULT_SESSION_TTL: Duration = Duration::days(14);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    session: Session,
    expires_at: OffsetDateTime,
}

impl Entry {
    fn is_live(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

/// Process-local [`SessionStore`]. Sessions are lost on restart.
///
/// Every entry carries an expiry: a pending login lives a few minutes, a
/// logged-in session until its token expires (capped at the session TTL).
/// Expired entries are invisible to [`load`](SessionStore::load) and are
/// dropped on the next write. When the store is full, unfinished logins are
/// evicted first.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Entry>>>,
    pending_ttl: Duration,
    session_ttl: Duration,
    max_sessions: usize,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self {
            sessions: Arc::default(),
            pending_ttl: DEFAULT_PENDING_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            max_sessions: DEFAULT_MAX_SESSIONS,
        }
    }
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How long a login may stay unfinished (default 10 minutes).
    #[must_use]
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    /// Upper bound on a logged-in session (default 14 days).
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        self.sessions
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn expires_at(&self, session: &Session, now: OffsetDateTime) -> OffsetDateTime {
        match &session.oauth_token {
            Some(token) => {
                let cap = now.saturating_add(self.session_ttl);
                token.expires_at().map_or(cap, |at| at.min(cap))
            }
            None => now.saturating_add(self.pending_ttl),
        }
    }
}

fn drop_expired(map: &mut HashMap<SessionId, Entry>, now: OffsetDateTime) {
    map.retain(|_, entry| entry.is_live(now));
}

impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .sessions
            .read()
            .await
            .get(id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.session.clone()))
    }

    async fn save(&self, id: &SessionId, session: Session) -> Result<(), StoreError> {
        let now = OffsetDateTime::now_utc();
        let expires_at = self.expires_at(&session, now);

        let mut sessions = self.sessions.write().await;
        drop_expired(&mut sessions, now);
        if sessions.len() >= self.max_sessions && !sessions.contains_key(id) {
            sessions.retain(|_, entry| entry.session.oauth_token.is_some());
            tracing::warn!(remaining = sessions.len(), "Session store full, evicted pending logins");
            if sessions.len() >= self.max_sessions {
                return Err("session store is full".into());
            }
        }

        sessions.insert(id.clone(), Entry { session, expires_at });
        Ok(())
    }

    async fn take_state(&self, id: &SessionId) -> Result<Option<String>, StoreError> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .sessions
            .write()
            .await
            .get_mut(id)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.session.oauth_state.take()))
    }

    async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}
