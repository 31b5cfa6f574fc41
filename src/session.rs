//! Identity/session boundary
//! Resolves a bearer token to a user id, rejecting missing or expired sessions

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use thiserror::Error;
use uuid::Uuid;

const SESSIONS_TREE: &str = "sessions";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    Unauthorized,
    #[error("session storage failed: {0}")]
    Store(String),
}

/// An issued session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Credential resolution boundary
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Resolve a bearer token to a user id
    async fn authenticate(&self, token: &str) -> Result<String, AuthError>;
}

/// Sled-backed session store
pub struct SledSessions {
    db: Arc<Db>,
}

impl SledSessions {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Issue a new session for a user
    pub fn issue(&self, user_id: &str, ttl: Duration) -> Result<Session, AuthError> {
        let session = Session {
            token: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            expires_at: Utc::now() + ttl,
        };
        let tree = self
            .db
            .open_tree(SESSIONS_TREE)
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let bytes = serde_json::to_vec(&session).map_err(|e| AuthError::Store(e.to_string()))?;
        tree.insert(session.token.as_bytes(), bytes)
            .map_err(|e| AuthError::Store(e.to_string()))?;
        tree.flush().map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(session)
    }
}

#[async_trait]
impl SessionProvider for SledSessions {
    async fn authenticate(&self, token: &str) -> Result<String, AuthError> {
        let tree = self
            .db
            .open_tree(SESSIONS_TREE)
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let bytes = tree
            .get(token.as_bytes())
            .map_err(|e| AuthError::Store(e.to_string()))?
            .ok_or(AuthError::Unauthorized)?;
        let session: Session =
            serde_json::from_slice(&bytes).map_err(|e| AuthError::Store(e.to_string()))?;
        if session.expires_at < Utc::now() {
            return Err(AuthError::Unauthorized);
        }
        Ok(session.user_id)
    }
}
