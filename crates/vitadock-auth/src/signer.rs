//! Canonical request signing (RFC 5849 section 3.4, VitaDock variant)
//!
//! Builds the signature base string, signs it with HMAC-SHA256 and renders
//! the `Authorization: OAuth ...` header. Compared to stock OAuth 1.0a:
//!
//! - `realm` and `oauth_callback` are never signed nor sent
//! - the signature method is `HMAC-SHA256`
//! - nonce and timestamp come from [`crate::nonce`] (36 chars, milliseconds)
//!
//! Every function here is a pure function of its arguments; the only
//! randomness enters through [`OAuthParams::fresh`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use common::Secret;
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::HeaderValue;
use sha2::Sha256;
use url::Url;

use crate::constants::{FORBIDDEN_PARAMETERS, OAUTH_VERSION, SIGNATURE_METHOD};
use crate::credentials::ConsumerIdentity;
use crate::error::{Error, Result};
use crate::nonce::{generate_nonce, timestamp_millis};

type HmacSha256 = Hmac<Sha256>;

/// RFC 3986 unreserved characters pass through: ALPHA / DIGIT / "-" / "." / "_" / "~"
const OAUTH_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a string per RFC 3986 (uppercase hex, UTF-8 bytes).
pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, OAUTH_ENCODE_SET).to_string()
}

/// Protocol parameters for one signed request.
///
/// The consumer key is taken from the [`ConsumerIdentity`] at signing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthParams {
    pub nonce: String,
    pub timestamp: u64,
    pub token: Option<String>,
    pub verifier: Option<String>,
}

impl OAuthParams {
    /// Fresh nonce and timestamp, no token.
    pub fn fresh() -> Self {
        Self::fixed(generate_nonce(), timestamp_millis())
    }

    /// Caller-supplied nonce and timestamp.
    pub fn fixed(nonce: impl Into<String>, timestamp: u64) -> Self {
        Self {
            nonce: nonce.into(),
            timestamp,
            token: None,
            verifier: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.verifier = Some(verifier.into());
        self
    }

    /// All `oauth_*` pairs except the signature, in header order.
    fn pairs(&self, consumer_key: &str) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("oauth_consumer_key".to_string(), consumer_key.to_string()),
            ("oauth_nonce".to_string(), self.nonce.clone()),
            ("oauth_signature_method".to_string(), SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp".to_string(), self.timestamp.to_string()),
        ];
        if let Some(token) = &self.token {
            pairs.push(("oauth_token".to_string(), token.clone()));
        }
        if let Some(verifier) = &self.verifier {
            pairs.push(("oauth_verifier".to_string(), verifier.clone()));
        }
        pairs.push(("oauth_version".to_string(), OAUTH_VERSION.to_string()));
        pairs
    }
}

/// The request being signed: method, target URL (query included) and any
/// `application/x-www-form-urlencoded` body parameters.
#[derive(Debug, Clone, Copy)]
pub struct SignatureContext<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub form: &'a [(String, String)],
}

/// Split a URL into its base string URI and its decoded query parameters.
///
/// Scheme and host are already lowercased by `Url`, and default ports are
/// dropped. Query and fragment are not part of the base URI.
pub fn normalize_url(url: &Url) -> Result<(String, Vec<(String, String)>)> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::Encoding(format!("URL has no host: {}", url.scheme())))?;
    let base = match url.port() {
        Some(port) => format!("{}://{}:{}{}", url.scheme(), host, port, url.path()),
        None => format!("{}://{}{}", url.scheme(), host, url.path()),
    };
    let query = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    Ok((base, query))
}

/// Encode, filter and sort parameters into the normalized parameter string.
///
/// Sorted by encoded key, then encoded value. `realm` and `oauth_callback`
/// are dropped.
pub fn normalize_parameters(params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .filter(|(k, _)| !FORBIDDEN_PARAMETERS.contains(&k.as_str()))
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();
    encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// `METHOD&ENCODE(base_uri)&ENCODE(normalized parameters)`
pub fn signature_base_string(method: &str, base_uri: &str, params: &[(String, String)]) -> String {
    format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        percent_encode(base_uri),
        percent_encode(&normalize_parameters(params))
    )
}

/// `ENCODE(consumer_secret)&ENCODE(token_secret)`; an absent token secret
/// leaves the trailing `&`.
pub fn signing_key(consumer_secret: &str, token_secret: Option<&str>) -> String {
    format!(
        "{}&{}",
        percent_encode(consumer_secret),
        percent_encode(token_secret.unwrap_or(""))
    )
}

/// Raw HMAC-SHA256 signature over the base string.
pub fn sign(
    method: &str,
    base_uri: &str,
    params: &[(String, String)],
    consumer_secret: &str,
    token_secret: Option<&str>,
) -> Result<Vec<u8>> {
    if consumer_secret.is_empty() {
        return Err(Error::Configuration("consumer secret is not set".into()));
    }
    let base_string = signature_base_string(method, base_uri, params);
    let key = signing_key(consumer_secret, token_secret);

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Encoding(format!("invalid signing key: {e}")))?;
    mac.update(base_string.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Sign the request and render the `Authorization` header value.
///
/// Query parameters of `ctx.url` and `ctx.form` are signed but not repeated
/// in the header.
pub fn authorization_header(
    ctx: &SignatureContext<'_>,
    oauth: &OAuthParams,
    consumer: &ConsumerIdentity,
    token_secret: Option<&Secret<String>>,
) -> Result<HeaderValue> {
    let (base_uri, mut params) = normalize_url(ctx.url)?;
    params.extend(ctx.form.iter().cloned());

    let mut oauth_pairs = oauth.pairs(consumer.key());
    params.extend(oauth_pairs.iter().cloned());

    let signature = sign(
        ctx.method,
        &base_uri,
        &params,
        consumer.secret().expose(),
        token_secret.map(|s| s.expose().as_str()),
    )?;
    oauth_pairs.push(("oauth_signature".to_string(), STANDARD.encode(signature)));
    oauth_pairs.sort();

    let header = oauth_pairs
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", percent_encode(k), percent_encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    HeaderValue::from_str(&format!("OAuth {header}"))
        .map_err(|e| Error::Encoding(format!("authorization header: {e}")))
}

/// Parse the `key="value", ...` pairs of an `OAuth` authorization header.
///
/// Used by tests and diagnostics to inspect what was sent.
pub fn parse_authorization_header(value: &str) -> Vec<(String, String)> {
    let Some(rest) = value.strip_prefix("OAuth ") else {
        return Vec::new();
    };
    rest.split(", ")
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            let v = v.trim_matches('"');
            let decode = |s: &str| {
                percent_encoding::percent_decode_str(s)
                    .decode_utf8_lossy()
                    .into_owned()
            };
            Some((decode(k), decode(v)))
        })
        .collect()
}
