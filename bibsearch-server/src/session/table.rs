//! Session table
//!
//! Process-wide map from opaque token to suspended session. All three
//! operations take the lock briefly and never await while holding it, so the
//! table serializes concurrent `put`/`take_if_present`/`sweep` calls without
//! further coordination.

use super::Session;
use crate::error::{Error, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// Session token length in alphanumeric characters
pub const TOKEN_LENGTH: usize = 15;

/// Generate a fresh opaque session token from the thread-local CSPRNG
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// In-memory table of sessions awaiting selection
#[derive(Default)]
pub struct SessionTable {
    inner: Mutex<HashMap<String, Session>>,
}

impl SessionTable {
    pub fn new() -> Self {
        SessionTable::default()
    }

    /// Insert a suspended session under its token.
    ///
    /// Tokens come from a space large enough that a collision means something
    /// is deeply wrong; it is reported as an internal error, never resolved
    /// by overwriting the existing session.
    pub async fn put(&self, session: Session) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.contains_key(&session.token) {
            return Err(Error::Internal(format!(
                "session token collision: {}",
                session.token
            )));
        }
        inner.insert(session.token.clone(), session);
        Ok(())
    }

    /// Atomic lookup-and-remove, so a token is consumed exactly once no
    /// matter how many resume attempts race for it.
    pub async fn take_if_present(&self, token: &str) -> Option<Session> {
        self.inner.lock().await.remove(token)
    }

    /// Evict every session older than `ttl`.
    ///
    /// Evicted sessions are simply dropped; dropping the join handle detaches
    /// the abandoned translation, and its prompt response sender going away
    /// reads as an empty selection on the translator side.
    pub async fn sweep(&self, ttl: Duration) {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|_, session| session.created_at.elapsed() < ttl);
        let evicted = before - inner.len();
        if evicted > 0 {
            debug!(evicted, remaining = inner.len(), "swept expired sessions");
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
