use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{ApiKey, SessionId};
use crate::services::{CredentialStore, PipelineController, TransformClient};

/// State for one browser tab
pub struct Session {
    pub id: SessionId,
    pub controller: PipelineController,
    pub credentials: CredentialStore,
    pub created_at: DateTime<Utc>,
    last_seen: RwLock<DateTime<Utc>>,
}

impl Session {
    fn new(id: SessionId, client: Arc<TransformClient>, default_key: Option<ApiKey>) -> Self {
        let now = Utc::now();
        Self {
            id,
            controller: PipelineController::new(client),
            credentials: CredentialStore::new(default_key),
            created_at: now,
            last_seen: RwLock::new(now),
        }
    }

    /// Mark the session as used just now
    pub async fn touch(&self) {
        *self.last_seen.write().await = Utc::now();
    }

    /// When a request last reached this session
    pub async fn last_seen(&self) -> DateTime<Utc> {
        *self.last_seen.read().await
    }
}

/// Trait for session storage
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Find the session, creating a fresh one on first use
    async fn get_or_create(&self, id: &SessionId) -> Arc<Session>;

    /// Find an existing session
    async fn find(&self, id: &SessionId) -> Option<Arc<Session>>;

    /// Drop sessions unused for at least `max_idle`, returning how many went.
    ///
    /// Sessions with a run in flight or a live subscriber are kept.
    async fn evict_idle(&self, max_idle: chrono::Duration) -> usize;

    /// Number of live sessions
    async fn len(&self) -> usize;
}

/// Sessions held in process memory only
pub struct InMemorySessionRegistry {
    sessions: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
    client: Arc<TransformClient>,
    default_key: Option<ApiKey>,
}

impl InMemorySessionRegistry {
    pub fn new(client: Arc<TransformClient>, default_key: Option<ApiKey>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            client,
            default_key,
        }
    }
}

#[async_trait]
impl SessionRegistry for InMemorySessionRegistry {
    async fn get_or_create(&self, id: &SessionId) -> Arc<Session> {
        if let Some(session) = self.find(id).await {
            return session;
        }

        let mut sessions = self.sessions.write().await;
        // Another request may have created it between the two locks
        let session = sessions.entry(id.clone()).or_insert_with(|| {
            tracing::info!(session = %id, "New session");
            Arc::new(Session::new(
                id.clone(),
                self.client.clone(),
                self.default_key.clone(),
            ))
        });
        session.clone()
    }

    async fn find(&self, id: &SessionId) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        session.touch().await;
        Some(session)
    }

    async fn evict_idle(&self, max_idle: chrono::Duration) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        let mut expired = Vec::new();
        for session in sessions.values() {
            if now - session.last_seen().await < max_idle {
                continue;
            }
            // A run in flight or an open event stream means the tab is still there
            if session.controller.watcher_count() > 0 || session.controller.is_processing().await {
                continue;
            }
            expired.push(session.clone());
        }

        for session in &expired {
            sessions.remove(&session.id);
            tracing::info!(
                session = %session.id,
                created_at = %session.created_at,
                age_secs = (now - session.created_at).num_seconds(),
                "Evicted idle session"
            );
        }

        expired.len()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Periodically evict sessions idle for longer than `max_idle`
pub fn spawn_idle_sweeper<R>(
    sessions: Arc<R>,
    max_idle: std::time::Duration,
) -> tokio::task::JoinHandle<()>
where
    R: SessionRegistry + 'static,
{
    let period = (max_idle / 4).max(std::time::Duration::from_secs(1));
    let max_idle =
        chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::days(365));

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(period).await;
            let evicted = sessions.evict_idle(max_idle).await;
            if evicted > 0 {
                let remaining = sessions.len().await;
                tracing::debug!(evicted, remaining, "Session sweep");
            }
        }
    })
}
