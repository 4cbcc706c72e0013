//! Error types for VitaDock authorization and signing

/// Errors from signing, credential storage and the authorization flow.
///
/// Messages never carry consumer or token secrets.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider request failed ({}): {body}", describe_status(.status))]
    ProviderRequestFailed { status: Option<u16>, body: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("unknown temporary credential: {0}")]
    UnknownCredential(String),

    #[error("not authorized: no access credential available")]
    NotAuthorized,

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// Transport-level failure (connect, timeout, body read) with no HTTP status.
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        let body = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Error::ProviderRequestFailed { status: None, body }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "transport error".to_string(),
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failure_display_includes_status() {
        let err = Error::ProviderRequestFailed {
            status: Some(401),
            body: "signature_invalid".into(),
        };
        assert_eq!(
            err.to_string(),
            "provider request failed (status 401): signature_invalid"
        );
    }

    #[test]
    fn transport_failure_display_has_no_status() {
        let err = Error::ProviderRequestFailed {
            status: None,
            body: "connection refused".into(),
        };
        assert_eq!(
            err.to_string(),
            "provider request failed (transport error): connection refused"
        );
    }
}
