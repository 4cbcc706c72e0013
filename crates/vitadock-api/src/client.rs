//! Authenticated request client
//!
//! Every call is signed with the consumer identity plus the access token,
//! whose secret is folded into the signing key. An `Absent` credential is
//! rejected before any network activity.

use chrono::{Days, NaiveDate, Utc};
use tracing::{debug, info};
use url::Url;
use vitadock_auth::transport::{SignedRequest, read_text};
use vitadock_auth::{
    AccessCredential, ConsumerIdentity, Error, OAuthParams, ProviderConfig, Result,
};

use crate::model::Thermodock;

const JSON: &str = "application/json";

/// Client for the VitaDock data API.
///
/// Cheap to clone: the inner `reqwest::Client` is reference counted.
#[derive(Debug, Clone)]
pub struct VitaDockClient {
    identity: ConsumerIdentity,
    provider: ProviderConfig,
    http: reqwest::Client,
}

impl VitaDockClient {
    pub fn new(
        identity: ConsumerIdentity,
        provider: ProviderConfig,
        http: reqwest::Client,
    ) -> Result<Self> {
        provider.validate()?;
        Ok(Self {
            identity,
            provider,
            http,
        })
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }

    /// Sign and send one request on behalf of the user behind `access`.
    ///
    /// Query parameters already on `url` and the `form` parameters are both
    /// part of the signature.
    pub async fn send(
        &self,
        access: &AccessCredential,
        method: reqwest::Method,
        url: &Url,
        form: &[(String, String)],
    ) -> Result<reqwest::Response> {
        self.send_with_accept(access, method, url, form, None).await
    }

    async fn send_with_accept(
        &self,
        access: &AccessCredential,
        method: reqwest::Method,
        url: &Url,
        form: &[(String, String)],
        accept: Option<&'static str>,
    ) -> Result<reqwest::Response> {
        let (token, token_secret) = access.token()?;
        SignedRequest {
            method,
            url,
            form,
            oauth: OAuthParams::fresh().with_token(token),
            token_secret: Some(token_secret),
            accept,
        }
        .send(&self.http, &self.identity)
        .await
    }

    /// Readings measured on or after `since`, at most `max_count` of them.
    pub async fn fetch_recent(
        &self,
        access: &AccessCredential,
        since: NaiveDate,
        max_count: u32,
    ) -> Result<Vec<Thermodock>> {
        let mut url = self.provider.thermodock_url()?;
        url.query_pairs_mut()
            .append_pair("max", &max_count.to_string())
            .append_pair("date_since", &since.format("%Y-%m-%d").to_string());

        let response = self
            .send_with_accept(access, reqwest::Method::GET, &url, &[], Some(JSON))
            .await?;
        let body = read_text(response).await?;
        let readings: Vec<Thermodock> = serde_json::from_str(&body)
            .map_err(|e| Error::MalformedResponse(format!("thermodock list: {e}")))?;

        debug!(count = readings.len(), %since, "fetched thermodock readings");
        Ok(readings)
    }

    /// Readings from the last `days` days (UTC).
    pub async fn fetch_last_days(
        &self,
        access: &AccessCredential,
        days: u64,
        max_count: u32,
    ) -> Result<Vec<Thermodock>> {
        let today = Utc::now().date_naive();
        let since = today
            .checked_sub_days(Days::new(days))
            .unwrap_or(NaiveDate::MIN);
        self.fetch_recent(access, since, max_count).await
    }

    /// Ask the provider to generate readings. Returns the opaque identifier
    /// it answers with.
    pub async fn submit(
        &self,
        access: &AccessCredential,
        payload: &[(String, String)],
    ) -> Result<String> {
        let url = self.provider.thermodock_generate_url()?;
        let response = self
            .send(access, reqwest::Method::POST, &url, payload)
            .await?;
        let body = read_text(response).await?;
        let id = body.trim();
        if id.is_empty() {
            return Err(Error::MalformedResponse(
                "generate returned an empty body".into(),
            ));
        }
        info!(id, "provider accepted generate request");
        Ok(id.to_string())
    }
}
