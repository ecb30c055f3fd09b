//! Username normalization
//!
//! Probes see the username as typed (trimmed), since some sites treat account
//! names case-sensitively. Cache and in-flight lookups are keyed by
//! [`username_key`], so requests differing only in case share work.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{NamehuntError, NamehuntResult};

static URL_SAFE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9:/?&=#._%+-]+$").expect("username pattern is a valid regex")
});

/// Trim and validate a raw username, keeping its case.
///
/// Fails with `INVALID_INPUT` when the result is empty, longer than
/// `max_len` characters, or contains characters outside the URL-safe set.
pub fn normalize_username(raw: &str, max_len: usize) -> NamehuntResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(NamehuntError::InvalidInput("username must not be empty".into()));
    }

    let len = trimmed.chars().count();
    if len > max_len {
        return Err(NamehuntError::InvalidInput(format!(
            "username is {} characters, limit is {}",
            len, max_len
        )));
    }

    if !URL_SAFE.is_match(trimmed) {
        return Err(NamehuntError::InvalidInput(
            "username must contain only valid URL characters".into(),
        ));
    }

    Ok(trimmed.to_string())
}

/// Case-folded key for the result cache and in-flight coalescing.
#[inline]
pub fn username_key(username: &str) -> String {
    username.trim().to_ascii_lowercase()
}
