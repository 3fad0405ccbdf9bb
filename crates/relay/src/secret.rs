// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers for handling secrets: masking for logs and display, constant-time
//! comparison, and API key generation.

use rand::distr::Alphanumeric;
use rand::Rng;

/// Most characters revealed at each end of a masked secret.
const REVEAL: usize = 4;

/// Prefix for generated API keys.
pub const API_KEY_PREFIX: &str = "sk-";

/// Length of the random part of a generated API key.
const API_KEY_RANDOM_LEN: usize = 48;

/// Mask a secret for logs and UI display.
///
/// Reveals up to four characters at each end and replaces the middle with
/// `****`. Each end shows at most a third of the secret, so short secrets
/// keep most of their middle hidden. Secrets of eight characters or fewer are
/// fully redacted.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= REVEAL * 2 {
        return "****".to_owned();
    }
    let reveal = REVEAL.min(chars.len() / 3);
    let head: String = chars[..reveal].iter().collect();
    let tail: String = chars[chars.len() - reveal..].iter().collect();
    format!("{head}****{tail}")
}

/// Mask the credential part of an `Authorization` header value, keeping the
/// scheme readable (`Bearer abcd****wxyz`).
pub fn mask_authorization(value: &str) -> String {
    match value.split_once(char::is_whitespace) {
        Some((scheme, credential)) => format!("{scheme} {}", mask_secret(credential.trim())),
        None => mask_secret(value),
    }
}

/// Constant-time string comparison to prevent timing side-channel attacks.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Generate a fresh API key secret (`sk-` followed by 48 alphanumerics).
pub fn generate_api_key() -> String {
    let random: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_RANDOM_LEN)
        .map(char::from)
        .collect();
    format!("{API_KEY_PREFIX}{random}")
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
