//! Signed access to the VitaDock data API
//!
//! Wraps outbound calls with an `Authorization: OAuth` header derived from a
//! previously obtained `AccessCredential`. The two operations the gateway
//! exposes are thin call sites over [`VitaDockClient::send`]:
//! - `fetch_recent`: time-bounded, capped read of thermometer readings
//! - `submit`: triggers provider-side generation, returns an opaque id

pub mod client;
pub mod model;

pub use client::VitaDockClient;
pub use model::Thermodock;
pub use vitadock_auth::{AccessCredential, Error, Result};
