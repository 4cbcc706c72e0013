//! Nonce and timestamp generation for signed requests
//!
//! VitaDock expects a 36-character nonce and a timestamp in milliseconds,
//! both fresh for every request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::RngExt;

use crate::constants::NONCE_LENGTH;

const ALPHANUMERIC: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of 62 that fits in a byte. Bytes at or above it are
/// rejected so every character is equally likely.
const REJECTION_BOUND: u8 = 248;

/// Highest timestamp handed out so far in this process.
static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Generate a random alphanumeric nonce of exactly `NONCE_LENGTH` characters.
///
/// Uses the thread-local CSPRNG, so concurrent callers never share state.
pub fn generate_nonce() -> String {
    let mut rng = rand::rng();
    let mut nonce = String::with_capacity(NONCE_LENGTH);
    let mut buf = [0u8; NONCE_LENGTH];

    while nonce.len() < NONCE_LENGTH {
        rng.fill(&mut buf);
        for &byte in &buf {
            if byte >= REJECTION_BOUND {
                continue;
            }
            nonce.push(ALPHANUMERIC[(byte % 62) as usize] as char);
            if nonce.len() == NONCE_LENGTH {
                break;
            }
        }
    }
    nonce
}

/// Milliseconds since the Unix epoch.
///
/// Never returns less than a value previously returned in this process, even
/// if the wall clock is stepped backwards.
pub fn timestamp_millis() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let previous = LAST_TIMESTAMP.fetch_max(now, Ordering::AcqRel);
    previous.max(now)
}
