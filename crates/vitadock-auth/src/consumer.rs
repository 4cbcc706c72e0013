//! Three-legged authorization flow against VitaDock
//!
//! 1. [`Consumer::request_temporary_credential`] signs a request with the
//!    consumer secret only and receives a request token.
//! 2. [`Consumer::authorization_url`] appends that token to the user
//!    authorization page; the caller redirects the user agent there.
//! 3. [`Consumer::exchange`] looks the token's secret up again and trades
//!    the authorized request token for an access credential.
//!
//! [`Consumer::begin_authorization`] runs 1 and 2 and stores the temporary
//! credential in between; [`Consumer::complete_authorization`] runs 3 from a
//! provider callback. Each phase is one network round trip with no retries.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::ProviderConfig;
use crate::credentials::{AccessCredential, ConsumerIdentity, TemporaryCredential};
use crate::error::{Error, Result};
use crate::signer::OAuthParams;
use crate::store::{ClientState, TemporaryCredentialStore};
use crate::transport::{SignedRequest, parse_form_body, read_text};

/// Where to send the user agent, plus any state it must carry back.
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    pub url: Url,
    /// Temporary identifier embedded in `url`
    pub token: String,
    /// Present only with the client-persisted store
    pub client_state: Option<ClientState>,
}

/// What the provider hands back when redirecting to the callback.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub token: Option<String>,
    pub verifier: Option<String>,
    pub client_state: Option<ClientState>,
}

impl CallbackParams {
    /// Parse `oauth_token` and `oauth_verifier` from a callback query string.
    pub fn from_query(query: &str) -> Self {
        let fields = parse_form_body(query.trim_start_matches('?'));
        let non_empty = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            token: non_empty("oauth_token"),
            verifier: non_empty("oauth_verifier"),
            client_state: None,
        }
    }

    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or(""))
    }

    /// Attach the state the user agent presented (e.g. from a cookie).
    pub fn with_client_state(mut self, client_state: Option<ClientState>) -> Self {
        self.client_state = client_state;
        self
    }
}

/// VitaDock OAuth consumer.
///
/// Cheap to share behind an `Arc`; holds no per-flow state besides what the
/// credential store keeps.
pub struct Consumer {
    identity: ConsumerIdentity,
    provider: ProviderConfig,
    http: reqwest::Client,
    store: Arc<dyn TemporaryCredentialStore>,
}

impl Consumer {
    pub fn new(
        identity: ConsumerIdentity,
        provider: ProviderConfig,
        http: reqwest::Client,
        store: Arc<dyn TemporaryCredentialStore>,
    ) -> Result<Self> {
        provider.validate()?;
        Ok(Self {
            identity,
            provider,
            http,
            store,
        })
    }

    pub fn identity(&self) -> &ConsumerIdentity {
        &self.identity
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    pub fn store(&self) -> &Arc<dyn TemporaryCredentialStore> {
        &self.store
    }

    /// Phase 1: obtain a temporary credential.
    ///
    /// No token, no `oauth_callback`, no `realm`. Fails with
    /// `MalformedResponse` if the body lacks either field.
    pub async fn request_temporary_credential(&self) -> Result<TemporaryCredential> {
        let url = self.provider.temporary_credential_url()?;
        let response = SignedRequest {
            method: self.provider.temporary_credential_method.into(),
            url: &url,
            form: &[],
            oauth: OAuthParams::fresh(),
            token_secret: None,
            accept: None,
        }
        .send(&self.http, &self.identity)
        .await?;

        let body = read_text(response).await?;
        let fields = parse_form_body(&body);
        let identifier = required_field(&fields, "oauth_token")?;
        let secret = required_field(&fields, "oauth_token_secret")?;

        info!(token = %identifier, "obtained temporary credential");
        Ok(TemporaryCredential::new(identifier, secret))
    }

    /// Phase 2: user authorization URL carrying `oauth_token=<identifier>`.
    pub fn authorization_url(&self, credential: &TemporaryCredential) -> Result<Url> {
        let mut url = self.provider.authorization_url()?;
        url.query_pairs_mut()
            .append_pair("oauth_token", &credential.identifier);
        Ok(url)
    }

    /// Phases 1 and 2, storing the temporary credential in between.
    ///
    /// The credential is saved only after the provider's answer is fully
    /// parsed, so dropping this future never leaves a half-stored flow.
    pub async fn begin_authorization(&self) -> Result<AuthorizationRedirect> {
        let credential = self.request_temporary_credential().await?;
        let url = self.authorization_url(&credential)?;
        let token = credential.identifier.clone();
        let client_state = self.store.save(credential).await?;

        debug!(token = %token, store = self.store.name(), "authorization redirect ready");
        Ok(AuthorizationRedirect {
            url,
            token,
            client_state,
        })
    }

    /// Phase 3 from a provider callback.
    ///
    /// A callback without `oauth_token` is not a provider callback at all:
    /// returns `Absent` without touching the network.
    pub async fn complete_authorization(
        &self,
        callback: &CallbackParams,
    ) -> Result<AccessCredential> {
        let Some(token) = callback.token.as_deref() else {
            debug!("callback carries no oauth_token, authorization not completed");
            return Ok(AccessCredential::Absent);
        };
        self.exchange(
            token,
            callback.verifier.as_deref(),
            callback.client_state.as_ref(),
        )
        .await
    }

    /// Phase 3: trade the authorized temporary credential for an access
    /// credential.
    ///
    /// `UnknownCredential` aborts the flow before any request is sent.
    /// A provider answer without `oauth_token` yields `Absent`. Either answer
    /// consumes the temporary credential.
    pub async fn exchange(
        &self,
        token: &str,
        verifier: Option<&str>,
        client_state: Option<&ClientState>,
    ) -> Result<AccessCredential> {
        let temporary_secret = self.store.lookup(token, client_state).await.map_err(|e| {
            warn!(token, error = %e, "temporary credential lookup failed, aborting authorization");
            e
        })?;

        let mut oauth = OAuthParams::fresh().with_token(token);
        if let Some(verifier) = verifier {
            oauth = oauth.with_verifier(verifier);
        }

        let url = self.provider.access_credential_url()?;
        let response = SignedRequest {
            method: self.provider.access_credential_method.into(),
            url: &url,
            form: &[],
            oauth,
            token_secret: Some(&temporary_secret),
            accept: None,
        }
        .send(&self.http, &self.identity)
        .await?;

        let body = read_text(response).await?;
        let fields = parse_form_body(&body);

        let identifier = match fields.get("oauth_token").filter(|v| !v.is_empty()) {
            Some(identifier) => identifier.clone(),
            None => {
                self.store.discard(token).await?;
                info!(token, "provider returned no access token, authorization not granted");
                return Ok(AccessCredential::Absent);
            }
        };
        let secret = required_field(&fields, "oauth_token_secret")?;

        self.store.discard(token).await?;
        info!(access_token = %identifier, "authorization completed");
        Ok(AccessCredential::from_parts(identifier, secret))
    }
}

fn required_field(
    fields: &std::collections::HashMap<String, String>,
    name: &str,
) -> Result<String> {
    match fields.get(name) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(Error::MalformedResponse(format!(
            "{name} missing from provider response"
        ))),
    }
}
