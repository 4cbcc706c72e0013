//! Temporary credential storage between the redirect and the callback
//!
//! Two backends implement [`TemporaryCredentialStore`]:
//!
//! - [`InMemoryStore`] keeps identifier → secret in process memory. Only
//!   usable when the callback is guaranteed to reach the same process.
//! - [`ClientPersistedStore`] hands the credential to the user agent as a
//!   signed [`ClientState`] (typically a cookie) so any process sharing the
//!   store key can complete the flow.
//!
//! The backend is chosen from configuration with [`build_store`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CredentialStoreMode;
use crate::credentials::TemporaryCredential;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Boxed future returned by store operations (keeps the trait dyn-compatible).
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Opaque value the caller must round-trip through the user agent.
///
/// Produced by [`ClientPersistedStore::save`]; embeds the temporary secret,
/// so its Debug output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientState(String);

impl ClientState {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientState([REDACTED])")
    }
}

/// Storage for temporary credentials during one authorization attempt.
pub trait TemporaryCredentialStore: Send + Sync {
    /// Backend name for logging ("memory", "client").
    fn name(&self) -> &str;

    /// Persist a temporary credential. Returns the state the caller must
    /// hand to the user agent, if the backend needs one.
    fn save(&self, credential: TemporaryCredential) -> StoreFuture<'_, Option<ClientState>>;

    /// Retrieve the secret for `identifier`, or `UnknownCredential`.
    fn lookup<'a>(
        &'a self,
        identifier: &'a str,
        client_state: Option<&'a ClientState>,
    ) -> StoreFuture<'a, Secret<String>>;

    /// Forget a credential once it has been exchanged.
    fn discard<'a>(&'a self, identifier: &'a str) -> StoreFuture<'a, ()>;
}

/// Build the backend selected by configuration.
///
/// `Client` mode requires a non-empty store key shared by every instance.
pub fn build_store(
    mode: CredentialStoreMode,
    store_key: Option<Secret<String>>,
    ttl: Duration,
) -> Result<Arc<dyn TemporaryCredentialStore>> {
    match mode {
        CredentialStoreMode::Memory => Ok(Arc::new(InMemoryStore::new(ttl))),
        CredentialStoreMode::Client => {
            let key = store_key.ok_or_else(|| {
                Error::Configuration("client credential store requires a store key".into())
            })?;
            Ok(Arc::new(ClientPersistedStore::new(key, ttl)?))
        }
    }
}

struct MemoryEntry {
    secret: Secret<String>,
    created_at: Instant,
}

/// Process-local store keyed by temporary identifier.
///
/// A single tokio Mutex makes `save` and `lookup` atomic per identifier.
/// Expired entries are purged lazily on every save.
pub struct InMemoryStore {
    ttl: Duration,
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl InMemoryStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live (possibly expired but not yet purged) entries.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl TemporaryCredentialStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn save(&self, credential: TemporaryCredential) -> StoreFuture<'_, Option<ClientState>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let ttl = self.ttl;
            entries.retain(|_, e| e.created_at.elapsed() < ttl);
            debug!(token = %credential.identifier, "saved temporary credential");
            entries.insert(
                credential.identifier,
                MemoryEntry {
                    secret: credential.secret,
                    created_at: Instant::now(),
                },
            );
            Ok(None)
        })
    }

    fn lookup<'a>(
        &'a self,
        identifier: &'a str,
        _client_state: Option<&'a ClientState>,
    ) -> StoreFuture<'a, Secret<String>> {
        Box::pin(async move {
            let entries = self.entries.lock().await;
            match entries.get(identifier) {
                Some(entry) if entry.created_at.elapsed() < self.ttl => Ok(entry.secret.clone()),
                Some(_) => Err(Error::UnknownCredential(format!(
                    "temporary credential {identifier} expired"
                ))),
                None => Err(Error::UnknownCredential(format!(
                    "no temporary credential stored for {identifier}"
                ))),
            }
        })
    }

    fn discard<'a>(&'a self, identifier: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let removed = self.entries.lock().await.remove(identifier);
            if removed.is_some() {
                debug!(token = identifier, "discarded temporary credential");
            }
            Ok(())
        })
    }
}

/// Signed payload carried by a [`ClientState`].
#[derive(Serialize, Deserialize)]
struct StatePayload {
    token: String,
    secret: String,
    /// Unix milliseconds at issue time
    issued_at: u64,
}

/// Stateless store: the credential travels with the user agent.
///
/// State format: `base64url(json payload) "." base64url(HMAC-SHA256(key, payload))`.
/// Any process holding the same key can verify it, so no server-side session
/// is needed. The payload is signed, not encrypted.
pub struct ClientPersistedStore {
    key: Secret<String>,
    ttl: Duration,
}

impl ClientPersistedStore {
    pub fn new(key: Secret<String>, ttl: Duration) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::Configuration("store key is empty".into()));
        }
        Ok(Self { key, ttl })
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(self.key.expose().as_bytes())
            .map_err(|e| Error::Configuration(format!("invalid store key: {e}")))
    }

    fn issue(&self, credential: &TemporaryCredential, now_millis: u64) -> Result<ClientState> {
        let payload = StatePayload {
            token: credential.identifier.clone(),
            secret: credential.secret.expose().clone(),
            issued_at: now_millis,
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| Error::Encoding(format!("serializing client state: {e}")))?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(json);

        let mut mac = self.mac()?;
        mac.update(payload_b64.as_bytes());
        let tag = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(ClientState(format!("{payload_b64}.{tag}")))
    }

    fn verify(
        &self,
        identifier: &str,
        state: Option<&ClientState>,
        now_millis: u64,
    ) -> Result<Secret<String>> {
        let unknown = |reason: &str| {
            Error::UnknownCredential(format!("temporary credential {identifier}: {reason}"))
        };

        let state = state.ok_or_else(|| unknown("no client state presented"))?;
        let (payload_b64, tag_b64) = state
            .as_str()
            .split_once('.')
            .ok_or_else(|| unknown("client state is malformed"))?;
        let tag = URL_SAFE_NO_PAD
            .decode(tag_b64)
            .map_err(|_| unknown("client state is malformed"))?;

        let mut mac = self.mac()?;
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&tag)
            .map_err(|_| unknown("client state signature mismatch"))?;

        let json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| unknown("client state is malformed"))?;
        let payload: StatePayload =
            serde_json::from_slice(&json).map_err(|_| unknown("client state is malformed"))?;

        if payload.token != identifier {
            return Err(unknown("client state belongs to another authorization"));
        }
        let age = now_millis.saturating_sub(payload.issued_at);
        if age > self.ttl.as_millis() as u64 {
            return Err(unknown("client state expired"));
        }
        Ok(Secret::new(payload.secret))
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl TemporaryCredentialStore for ClientPersistedStore {
    fn name(&self) -> &str {
        "client"
    }

    fn save(&self, credential: TemporaryCredential) -> StoreFuture<'_, Option<ClientState>> {
        Box::pin(async move {
            let state = self.issue(&credential, now_millis())?;
            debug!(token = %credential.identifier, "issued client state");
            Ok(Some(state))
        })
    }

    fn lookup<'a>(
        &'a self,
        identifier: &'a str,
        client_state: Option<&'a ClientState>,
    ) -> StoreFuture<'a, Secret<String>> {
        Box::pin(async move { self.verify(identifier, client_state, now_millis()) })
    }

    fn discard<'a>(&'a self, _identifier: &'a str) -> StoreFuture<'a, ()> {
        // Nothing held server-side; the state expires on its own.
        Box::pin(async { Ok(()) })
    }
}
