//! Sending signed requests and reading provider responses
//!
//! One round trip per call, no retries. Transport failures (including
//! timeouts configured on the `reqwest::Client`) and non-2xx statuses both
//! surface as `ProviderRequestFailed`. Responses are consumed or dropped on
//! every path, which releases the connection.

use std::collections::HashMap;

use common::Secret;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, warn};
use url::Url;

use crate::credentials::ConsumerIdentity;
use crate::error::{Error, Result};
use crate::signer::{OAuthParams, SignatureContext, authorization_header};

/// A request to sign and send.
pub struct SignedRequest<'a> {
    pub method: reqwest::Method,
    pub url: &'a Url,
    /// Form body parameters; signed and sent as
    /// `application/x-www-form-urlencoded` when non-empty.
    pub form: &'a [(String, String)],
    pub oauth: OAuthParams,
    pub token_secret: Option<&'a Secret<String>>,
    pub accept: Option<&'static str>,
}

impl SignedRequest<'_> {
    /// Sign, send and check the status. Returns the successful response.
    pub async fn send(
        self,
        http: &reqwest::Client,
        consumer: &ConsumerIdentity,
    ) -> Result<reqwest::Response> {
        let ctx = SignatureContext {
            method: self.method.as_str(),
            url: self.url,
            form: self.form,
        };
        let header = authorization_header(&ctx, &self.oauth, consumer, self.token_secret)?;

        let mut request = http
            .request(self.method.clone(), self.url.clone())
            .header(AUTHORIZATION, header);
        if let Some(accept) = self.accept {
            request = request.header(ACCEPT, accept);
        }
        if !self.form.is_empty() {
            request = request.form(self.form);
        }

        debug!(
            method = %self.method,
            endpoint = self.url.path(),
            token = self.oauth.token.as_deref().unwrap_or("-"),
            "sending signed request"
        );
        let response = request.send().await.map_err(Error::transport)?;
        ensure_success(response).await
    }
}

/// Turn a non-2xx response into `ProviderRequestFailed`, keeping the body.
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let endpoint = response.url().path().to_string();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    warn!(status = status.as_u16(), endpoint, "provider rejected request");
    Err(Error::ProviderRequestFailed {
        status: Some(status.as_u16()),
        body,
    })
}

/// Read the full body as text.
pub async fn read_text(response: reqwest::Response) -> Result<String> {
    response.text().await.map_err(Error::transport)
}

/// Parse an `application/x-www-form-urlencoded` body. The first occurrence
/// of a repeated key wins.
pub fn parse_form_body(body: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(body.trim().as_bytes()) {
        fields
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parse_form_body_decodes_and_keeps_first() {
        let fields =
            parse_form_body("oauth_token=AB%2BC&oauth_token_secret=x+y&oauth_token=second\n");
        assert_eq!(fields["oauth_token"], "AB+C");
        assert_eq!(fields["oauth_token_secret"], "x y");
    }

    #[test]
    fn parse_form_body_empty() {
        assert!(parse_form_body("").is_empty());
    }

    #[tokio::test]
    async fn non_success_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fail"))
            .respond_with(ResponseTemplate::new(401).set_body_string("signature_invalid"))
            .mount(&server)
            .await;

        let consumer = ConsumerIdentity::new("ck", "cs").unwrap();
        let url = Url::parse(&format!("{}/fail", server.uri())).unwrap();
        let result = SignedRequest {
            method: reqwest::Method::GET,
            url: &url,
            form: &[],
            oauth: OAuthParams::fresh(),
            token_secret: None,
            accept: None,
        }
        .send(&reqwest::Client::new(), &consumer)
        .await;

        match result {
            Err(Error::ProviderRequestFailed { status, body }) => {
                assert_eq!(status, Some(401));
                assert_eq!(body, "signature_invalid");
            }
            other => panic!("expected ProviderRequestFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn connection_failure_has_no_status() {
        let consumer = ConsumerIdentity::new("ck", "cs").unwrap();
        // Port 1 is never listening in CI containers
        let url = Url::parse("http://127.0.0.1:1/unreachable").unwrap();
        let result = SignedRequest {
            method: reqwest::Method::POST,
            url: &url,
            form: &[],
            oauth: OAuthParams::fresh(),
            token_secret: None,
            accept: None,
        }
        .send(&reqwest::Client::new(), &consumer)
        .await;

        assert!(matches!(
            result,
            Err(Error::ProviderRequestFailed { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn timeout_surfaces_as_provider_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200).set_delay(std::time::Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(50))
            .build()
            .unwrap();
        let consumer = ConsumerIdentity::new("ck", "cs").unwrap();
        let url = Url::parse(&format!("{}/slow", server.uri())).unwrap();
        let result = SignedRequest {
            method: reqwest::Method::GET,
            url: &url,
            form: &[],
            oauth: OAuthParams::fresh(),
            token_secret: None,
            accept: None,
        }
        .send(&http, &consumer)
        .await;

        match result {
            Err(Error::ProviderRequestFailed { status: None, body }) => {
                assert!(body.contains("timed out"), "got: {body}");
            }
            other => panic!("expected timeout failure, got {other:?}"),
        }
    }
}
