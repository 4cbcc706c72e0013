//! VitaDock OAuth constants
//!
//! Endpoint paths and the protocol values where VitaDock departs from stock
//! OAuth 1.0a. None of these are secrets; the consumer key and secret come
//! from configuration.

/// Production origin for both the OAuth endpoints and the data API
pub const DEFAULT_BASE_URL: &str = "https://vitacloud.medisanaspace.com";

/// Temporary credential ("unauthorized access") endpoint
pub const TEMPORARY_CREDENTIAL_PATH: &str = "/auth/unauthorizedaccesses";

/// User authorization page the user agent is redirected to
pub const AUTHORIZATION_PATH: &str = "/desiredaccessrights/request";

/// Access credential exchange endpoint
pub const ACCESS_CREDENTIAL_PATH: &str = "/auth/accesses/verify";

/// Thermometer readings collection
pub const THERMODOCK_PATH: &str = "/data/thermodocks";

/// Generates provider-side test readings and returns their identifier
pub const THERMODOCK_GENERATE_PATH: &str = "/data/thermodocks/generate";

/// VitaDock rejects the stock 8-character nonce.
pub const NONCE_LENGTH: usize = 36;

/// Value of `oauth_signature_method`; HMAC-SHA1 is not accepted.
pub const SIGNATURE_METHOD: &str = "HMAC-SHA256";

pub const OAUTH_VERSION: &str = "1.0";

/// Parameters that must never reach the provider, in the header or the
/// signature base string.
pub const FORBIDDEN_PARAMETERS: [&str; 2] = ["realm", "oauth_callback"];

/// How long a temporary credential stays retrievable after phase 1.
pub const TEMPORARY_CREDENTIAL_TTL_SECS: u64 = 600;
