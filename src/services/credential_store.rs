use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::models::ApiKey;

/// Where a session's resolved credential comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CredentialSource {
    /// Supplied by the user for this session
    Session,
    /// Server-wide default from configuration
    Server,
    None,
}

/// In-memory API key for one session.
///
/// The key is never persisted; it is only handed to the transform client
/// when a run starts.
pub struct CredentialStore {
    session_key: RwLock<Option<ApiKey>>,
    server_default: Option<ApiKey>,
}

impl CredentialStore {
    pub fn new(server_default: Option<ApiKey>) -> Self {
        Self {
            session_key: RwLock::new(None),
            server_default,
        }
    }

    pub async fn set(&self, key: ApiKey) {
        *self.session_key.write().await = Some(key);
    }

    pub async fn clear(&self) {
        *self.session_key.write().await = None;
    }

    /// The session key if set, otherwise the server default
    pub async fn resolve(&self) -> Option<ApiKey> {
        let session_key = self.session_key.read().await;
        session_key.clone().or_else(|| self.server_default.clone())
    }

    pub async fn source(&self) -> CredentialSource {
        if self.session_key.read().await.is_some() {
            CredentialSource::Session
        } else if self.server_default.is_some() {
            CredentialSource::Server
        } else {
            CredentialSource::None
        }
    }
}
