//! Browser sessions holding access credentials
//!
//! Sessions live in process memory, keyed by a random uuid handed to the
//! browser in the `vd_session` cookie. Restarting the gateway signs every
//! user out. Sessions expire after a fixed lifetime; expired entries are
//! purged lazily on create.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::http::header::COOKIE;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;
use vitadock_auth::AccessCredential;

pub const SESSION_COOKIE: &str = "vd_session";
/// Carries signed temporary credential state in `client` store mode.
pub const CLIENT_STATE_COOKIE: &str = "vd_tc";

struct SessionEntry {
    credential: AccessCredential,
    created_at: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store an authorized credential under a fresh session id.
    pub async fn create(&self, credential: AccessCredential) -> Uuid {
        let id = Uuid::new_v4();
        let mut sessions = self.sessions.write().await;
        let ttl = self.ttl;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.created_at.elapsed() < ttl);
        if sessions.len() < before {
            debug!(purged = before - sessions.len(), "purged expired sessions");
        }
        sessions.insert(
            id,
            SessionEntry {
                credential,
                created_at: Instant::now(),
            },
        );
        id
    }

    /// Credential for a live session. Expired sessions read as unknown.
    pub async fn get(&self, id: &Uuid) -> Option<AccessCredential> {
        self.sessions
            .read()
            .await
            .get(id)
            .filter(|entry| entry.created_at.elapsed() < self.ttl)
            .map(|entry| entry.credential.clone())
    }

    /// Number of stored sessions, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Value of cookie `name` from the request's `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// `Set-Cookie` value scoped to the whole site, not readable from scripts.
pub fn set_cookie(name: &str, value: &str, max_age_secs: Option<u64>) -> String {
    match max_age_secs {
        Some(max_age) => {
            format!("{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite=Lax")
        }
        None => format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax"),
    }
}

pub fn clear_cookie(name: &str) -> String {
    set_cookie(name, "", Some(0))
}
