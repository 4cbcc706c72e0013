//! Provider endpoint configuration
//!
//! Immutable once built; the consumer and the API client each receive it at
//! construction. Deserializable so the gateway can embed it as `[provider]`
//! in its TOML file, with every field defaulting to VitaDock production.

use serde::Deserialize;
use url::Url;

use crate::constants::{
    ACCESS_CREDENTIAL_PATH, AUTHORIZATION_PATH, DEFAULT_BASE_URL, TEMPORARY_CREDENTIAL_PATH,
    THERMODOCK_GENERATE_PATH, THERMODOCK_PATH,
};
use crate::error::{Error, Result};

/// HTTP method used for a credential endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// Where temporary credentials live between redirect and callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStoreMode {
    /// Single process: keep them in memory
    #[default]
    Memory,
    /// Stateless servers: sign them into a client-held cookie
    Client,
}

/// VitaDock endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub temporary_credential_path: String,
    pub temporary_credential_method: HttpMethod,
    pub authorization_path: String,
    pub access_credential_path: String,
    pub access_credential_method: HttpMethod,
    pub thermodock_path: String,
    pub thermodock_generate_path: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            temporary_credential_path: TEMPORARY_CREDENTIAL_PATH.to_string(),
            temporary_credential_method: HttpMethod::Post,
            authorization_path: AUTHORIZATION_PATH.to_string(),
            access_credential_path: ACCESS_CREDENTIAL_PATH.to_string(),
            access_credential_method: HttpMethod::Post,
            thermodock_path: THERMODOCK_PATH.to_string(),
            thermodock_generate_path: THERMODOCK_GENERATE_PATH.to_string(),
        }
    }
}

impl ProviderConfig {
    /// Defaults pointed at a different origin (tests, staging).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Check that every endpoint resolves to an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        let base = self.base()?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(Error::Configuration(format!(
                "base_url must start with http:// or https://, got: {}",
                self.base_url
            )));
        }
        for path in [
            &self.temporary_credential_path,
            &self.authorization_path,
            &self.access_credential_path,
            &self.thermodock_path,
            &self.thermodock_generate_path,
        ] {
            self.endpoint(path)?;
        }
        Ok(())
    }

    pub fn temporary_credential_url(&self) -> Result<Url> {
        self.endpoint(&self.temporary_credential_path)
    }

    pub fn authorization_url(&self) -> Result<Url> {
        self.endpoint(&self.authorization_path)
    }

    pub fn access_credential_url(&self) -> Result<Url> {
        self.endpoint(&self.access_credential_path)
    }

    pub fn thermodock_url(&self) -> Result<Url> {
        self.endpoint(&self.thermodock_path)
    }

    pub fn thermodock_generate_url(&self) -> Result<Url> {
        self.endpoint(&self.thermodock_generate_path)
    }

    fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::Configuration(format!("invalid base_url {}: {e}", self.base_url)))
    }

    /// Paths are appended to the base URL's path, so a base of
    /// `https://host/prefix` keeps its prefix.
    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base()?;
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        Ok(url)
    }
}
