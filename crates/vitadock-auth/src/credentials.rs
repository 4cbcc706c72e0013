//! Consumer, temporary and access credentials
//!
//! Secrets are wrapped in `common::Secret` so they are redacted from Debug
//! output and zeroized on drop. Only the signer and the credential stores
//! call `expose()`.

use common::Secret;

use crate::error::{Error, Result};

/// The client application's registration with VitaDock.
///
/// Built once from configuration and shared by every flow.
#[derive(Debug, Clone)]
pub struct ConsumerIdentity {
    key: String,
    secret: Secret<String>,
}

impl ConsumerIdentity {
    /// Fails with `Configuration` if either the key or the secret is empty.
    pub fn new(key: impl Into<String>, secret: impl Into<Secret<String>>) -> Result<Self> {
        let key = key.into();
        let secret = secret.into();
        if key.trim().is_empty() {
            return Err(Error::Configuration("consumer key is not set".into()));
        }
        if secret.is_empty() {
            return Err(Error::Configuration("consumer secret is not set".into()));
        }
        Ok(Self { key, secret })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn secret(&self) -> &Secret<String> {
        &self.secret
    }
}

/// Request token issued by the temporary-credential endpoint.
///
/// Lives in a credential store between the redirect and the callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemporaryCredential {
    pub identifier: String,
    pub secret: Secret<String>,
}

impl TemporaryCredential {
    pub fn new(identifier: impl Into<String>, secret: impl Into<Secret<String>>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

/// Result of a completed authorization.
///
/// `Absent` means "not yet authorized": the caller should start a new flow.
/// An `Authorized` value always has a non-empty identifier and secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccessCredential {
    #[default]
    Absent,
    Authorized {
        identifier: String,
        secret: Secret<String>,
    },
}

impl AccessCredential {
    /// Build from the raw pair returned by the provider (or restored from a
    /// session). Either part empty yields `Absent`.
    pub fn from_parts(identifier: impl Into<String>, secret: impl Into<Secret<String>>) -> Self {
        let identifier = identifier.into();
        let secret = secret.into();
        if identifier.is_empty() || secret.is_empty() {
            return AccessCredential::Absent;
        }
        AccessCredential::Authorized { identifier, secret }
    }

    pub fn is_authorized(&self) -> bool {
        matches!(self, AccessCredential::Authorized { .. })
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            AccessCredential::Authorized { identifier, .. } => Some(identifier),
            AccessCredential::Absent => None,
        }
    }

    /// Token pair for signing, or `NotAuthorized` when absent.
    pub fn token(&self) -> Result<(&str, &Secret<String>)> {
        match self {
            AccessCredential::Authorized { identifier, secret } => Ok((identifier, secret)),
            AccessCredential::Absent => Err(Error::NotAuthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_identity_requires_key_and_secret() {
        assert!(matches!(
            ConsumerIdentity::new("", "secret"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            ConsumerIdentity::new("key", ""),
            Err(Error::Configuration(_))
        ));

        let consumer = ConsumerIdentity::new("key", "secret").unwrap();
        assert_eq!(consumer.key(), "key");
        assert_eq!(consumer.secret().expose(), "secret");
    }

    #[test]
    fn consumer_identity_debug_hides_secret() {
        let consumer = ConsumerIdentity::new("key", "very-secret").unwrap();
        let debug = format!("{consumer:?}");
        assert!(!debug.contains("very-secret"), "got: {debug}");
    }

    #[test]
    fn access_credential_defaults_to_absent() {
        assert_eq!(AccessCredential::default(), AccessCredential::Absent);
        assert!(!AccessCredential::default().is_authorized());
    }

    #[test]
    fn from_parts_with_empty_field_is_absent() {
        assert_eq!(AccessCredential::from_parts("", "sec"), AccessCredential::Absent);
        assert_eq!(AccessCredential::from_parts("FIN", ""), AccessCredential::Absent);
    }

    #[test]
    fn access_credential_equality_is_by_value() {
        let a = AccessCredential::from_parts("FIN", "sec");
        let b = AccessCredential::from_parts(String::from("FIN"), String::from("sec"));
        assert_eq!(a, b);
        assert_ne!(a, AccessCredential::from_parts("FIN", "other"));
        assert_eq!(a.identifier(), Some("FIN"));
    }

    #[test]
    fn absent_credential_token_is_not_authorized() {
        assert!(matches!(
            AccessCredential::Absent.token(),
            Err(Error::NotAuthorized)
        ));
        let cred = AccessCredential::from_parts("FIN", "sec");
        let (id, secret) = cred.token().unwrap();
        assert_eq!(id, "FIN");
        assert_eq!(secret.expose(), "sec");
    }
}
