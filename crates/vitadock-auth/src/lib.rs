//! VitaDock OAuth 1.0a (provider variant) authorization library
//!
//! Signs requests the way VitaDock expects (HMAC-SHA256, 36-character nonce,
//! millisecond timestamps, no `realm`, no `oauth_callback`) and drives the
//! three-legged flow that yields an access credential. This crate has no
//! dependency on the gateway binary and can be used on its own.
//!
//! Credential flow:
//! 1. `Consumer::begin_authorization()` obtains a temporary credential,
//!    stores it and returns the user authorization URL
//! 2. The caller redirects the user agent (and keeps any `ClientState`)
//! 3. `Consumer::complete_authorization()` exchanges the callback's token for
//!    an `AccessCredential`
//! 4. API calls are signed with the access credential via `transport::SignedRequest`

pub mod config;
pub mod constants;
pub mod consumer;
pub mod credentials;
pub mod error;
pub mod nonce;
pub mod signer;
pub mod store;
pub mod transport;

pub use config::{CredentialStoreMode, HttpMethod, ProviderConfig};
pub use consumer::{AuthorizationRedirect, CallbackParams, Consumer};
pub use credentials::{AccessCredential, ConsumerIdentity, TemporaryCredential};
pub use error::{Error, Result};
pub use nonce::{generate_nonce, timestamp_millis};
pub use signer::{OAuthParams, SignatureContext, authorization_header, sign};
pub use store::{
    ClientPersistedStore, ClientState, InMemoryStore, TemporaryCredentialStore, build_store,
};
