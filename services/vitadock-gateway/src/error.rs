//! Handler errors and their HTTP mapping

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

/// Errors a gateway handler can return.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] vitadock_auth::Error),

    #[error("no authorized session: visit /authorize first")]
    MissingSession,
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::MissingSession => StatusCode::UNAUTHORIZED,
            Error::Auth(e) => match e {
                vitadock_auth::Error::NotAuthorized => StatusCode::UNAUTHORIZED,
                vitadock_auth::Error::UnknownCredential(_) => StatusCode::BAD_REQUEST,
                vitadock_auth::Error::ProviderRequestFailed { .. }
                | vitadock_auth::Error::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
                vitadock_auth::Error::Configuration(_) | vitadock_auth::Error::Encoding(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// Stable label for the JSON body and metric outcomes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingSession => "missing_session",
            Error::Auth(e) => auth_error_kind(e),
        }
    }

    /// Message returned to the caller. Provider response bodies are logged,
    /// not forwarded.
    fn public_message(&self) -> String {
        match self {
            Error::Auth(vitadock_auth::Error::ProviderRequestFailed {
                status: Some(status),
                ..
            }) => format!("VitaDock rejected the request with status {status}"),
            Error::Auth(vitadock_auth::Error::ProviderRequestFailed { status: None, .. }) => {
                "VitaDock could not be reached".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub fn auth_error_kind(err: &vitadock_auth::Error) -> &'static str {
    match err {
        vitadock_auth::Error::Configuration(_) => "configuration",
        vitadock_auth::Error::ProviderRequestFailed { .. } => "provider_error",
        vitadock_auth::Error::MalformedResponse(_) => "malformed_response",
        vitadock_auth::Error::UnknownCredential(_) => "unknown_credential",
        vitadock_auth::Error::NotAuthorized => "not_authorized",
        vitadock_auth::Error::Encoding(_) => "encoding",
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self, kind = self.kind(), "request failed");
        }
        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.public_message(),
            }
        });
        (status, [(CONTENT_TYPE, "application/json")], body.to_string()).into_response()
    }
}
