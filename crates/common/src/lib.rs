//! Shared types for the VitaDock gateway workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
